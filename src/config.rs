//! JSON configuration for the static parameters.
//!
//! Every field is optional and falls back to the stock defaults, e.g.
//!
//! ```json
//! { "renderWidth": 2560, "renderHeight": 1440, "checkerboardMode": "Black",
//!   "regir": { "mode": "Grid", "gridSize": [32, 16, 32] } }
//! ```

use crate::context::ImportanceSamplingStaticParameters;
use crate::error::ContextResult;
use crate::regir::ReGirDynamicParameters;
use serde::Deserialize;
use std::path::Path;

/// Full config file: static parameters at the top level plus optional per-frame ReGIR values.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContextConfig {
    #[serde(flatten)]
    pub static_params: ImportanceSamplingStaticParameters,
    pub regir_dynamic: ReGirDynamicParameters,
}

impl ContextConfig {
    pub fn from_json(raw: &str) -> ContextResult<Self> {
        let config: ContextConfig = serde_json::from_str(raw)?;
        config.static_params.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> ContextResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        log::debug!("loaded config from {}", path.as_ref().display());
        Self::from_json(&raw)
    }
}

pub fn static_parameters_from_json(raw: &str) -> ContextResult<ImportanceSamplingStaticParameters> {
    Ok(ContextConfig::from_json(raw)?.static_params)
}

pub fn load_static_parameters(path: impl AsRef<Path>) -> ContextResult<ImportanceSamplingStaticParameters> {
    Ok(ContextConfig::load(path)?.static_params)
}
