//! Error types for context construction and buffer planning.
//!
//! Everything a caller can get wrong (render size, tile sizes, grid shape) is
//! reported as [`ContextError::InvalidConfiguration`] rather than a panic.

/// A single rejected static parameter.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationIssue {
    #[error("render dimensions must be non-zero, got {width}x{height}")]
    ZeroRenderDimension { width: u32, height: u32 },

    #[error("{field} must be a non-zero power of two, got {value}")]
    NotPowerOfTwo { field: &'static str, value: u32 },

    #[error("ReGIR lights per cell must be non-zero")]
    ZeroLightsPerCell,

    #[error("ReGIR grid dimensions must be non-zero, got {0:?}")]
    ZeroGridDimension([u32; 3]),

    #[error("onion layout needs {layer_groups} layer groups and {rings} rings, capacity is {max_layer_groups}/{max_rings}")]
    OnionCapacityExceeded {
        layer_groups: usize,
        rings: usize,
        max_layer_groups: usize,
        max_rings: usize,
    },

    #[error("{0} element count overflows u32")]
    SizeOverflow(&'static str),
}

/// Centralized error type for the sampling context
#[derive(thiserror::Error, Debug)]
pub enum ContextError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigurationIssue),

    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{label} size {bytes} exceeds device limit {limit}")]
    BufferTooLarge {
        label: &'static str,
        bytes: u64,
        limit: u64,
    },
}

impl ContextError {
    /// Category prefix used when the error is surfaced to a user.
    pub fn category(&self) -> &'static str {
        match self {
            ContextError::InvalidConfiguration(_) => "Config",
            ContextError::Parse(_) => "Parse",
            ContextError::Io(_) => "IO",
            ContextError::BufferTooLarge { .. } => "Buffer",
        }
    }

    pub fn is_invalid_configuration(&self) -> bool {
        matches!(self, ContextError::InvalidConfiguration(_))
    }
}

/// Result type alias for context operations
pub type ContextResult<T> = Result<T, ContextError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_converts_into_invalid_configuration() {
        let err: ContextError = ConfigurationIssue::ZeroLightsPerCell.into();
        assert!(err.is_invalid_configuration());
        assert_eq!(err.category(), "Config");
    }

    #[test]
    fn message_names_the_field() {
        let err = ConfigurationIssue::NotPowerOfTwo {
            field: "localLightRis.tileSize",
            value: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("localLightRis.tileSize"));
        assert!(msg.contains('3'));
    }
}
