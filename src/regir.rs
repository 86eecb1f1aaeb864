//! ReGIR: world-space cache of presampled lights, addressed by grid or onion cells.

use crate::error::{ConfigurationIssue, ContextResult};
use crate::onion::{OnionGrid, ReGirOnionParameters, build_onion};
use crate::ris_buffer::RisBufferSegmentAllocator;
use bytemuck::{Pod, Zeroable};
use serde::Deserialize;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Deserialize)]
pub enum ReGirMode {
    Disabled,
    Grid,
    #[default]
    Onion,
}

/// How lights are chosen when a cell is filled, or when a point falls outside the cache.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Deserialize)]
pub enum LocalLightSamplingMode {
    Uniform,
    #[default]
    PowerRis,
}

impl LocalLightSamplingMode {
    fn as_gpu(self) -> u32 {
        match self {
            LocalLightSamplingMode::Uniform => 0,
            LocalLightSamplingMode::PowerRis => 1,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReGirStaticParameters {
    pub mode: ReGirMode,
    pub lights_per_cell: u32,
    pub grid_size: [u32; 3],
    pub onion_detail_layers: u32,
    pub onion_coverage_layers: u32,
}

impl Default for ReGirStaticParameters {
    fn default() -> Self {
        Self {
            mode: ReGirMode::Onion,
            lights_per_cell: 512,
            grid_size: [16, 16, 16],
            onion_detail_layers: 5,
            onion_coverage_layers: 10,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReGirDynamicParameters {
    pub center: [f32; 3],
    pub cell_size: f32,
    pub sampling_jitter: f32,
    pub num_build_samples: u32,
    pub presampling_mode: LocalLightSamplingMode,
    pub fallback_sampling_mode: LocalLightSamplingMode,
}

impl Default for ReGirDynamicParameters {
    fn default() -> Self {
        Self {
            center: [0.0; 3],
            cell_size: 1.0,
            sampling_jitter: 1.0,
            num_build_samples: 8,
            presampling_mode: LocalLightSamplingMode::PowerRis,
            fallback_sampling_mode: LocalLightSamplingMode::PowerRis,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct ReGirCommonParameters {
    pub enable: u32,
    pub center: [f32; 3],
    pub cell_size: f32,
    pub sampling_jitter: f32,
    pub lights_per_cell: u32,
    pub ris_buffer_offset: u32,
    pub num_build_samples: u32,
    pub presampling_mode: u32,
    pub fallback_sampling_mode: u32,
    _pad: u32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct ReGirGridParameters {
    pub cells: [u32; 3],
    _pad: u32,
}

/// Everything the ReGIR shaders read for one frame.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct ReGirRuntimeParameters {
    pub common: ReGirCommonParameters,
    pub grid: ReGirGridParameters,
    pub onion: ReGirOnionParameters,
}

/// Light slots of a uniform grid: one run of `lights_per_cell` per cell.
pub fn uniform_grid_light_slot_count(grid_size: [u32; 3], lights_per_cell: u32) -> ContextResult<u32> {
    grid_size
        .iter()
        .try_fold(lights_per_cell, |acc, &n| acc.checked_mul(n))
        .ok_or_else(|| ConfigurationIssue::SizeOverflow("ReGIR grid light slots").into())
}

/// Frame-independent part of the ReGIR state, fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ReGirLayout {
    pub static_params: ReGirStaticParameters,
    /// Present in onion mode only.
    pub onion: Option<OnionGrid>,
    pub light_slot_count: u32,
    pub ris_buffer_offset: u32,
}

impl ReGirLayout {
    pub fn new(
        static_params: ReGirStaticParameters,
        allocator: &mut RisBufferSegmentAllocator,
    ) -> ContextResult<Self> {
        validate_static_parameters(&static_params)?;

        let (onion, light_slot_count) = match static_params.mode {
            ReGirMode::Disabled => (None, 0),
            ReGirMode::Grid => (
                None,
                uniform_grid_light_slot_count(static_params.grid_size, static_params.lights_per_cell)?,
            ),
            ReGirMode::Onion => {
                let onion = build_onion(
                    static_params.onion_detail_layers,
                    static_params.onion_coverage_layers,
                );
                let slots = onion
                    .total_cells()
                    .checked_mul(static_params.lights_per_cell)
                    .ok_or(ConfigurationIssue::SizeOverflow("ReGIR onion light slots"))?;
                (Some(onion), slots)
            }
        };

        let ris_buffer_offset = allocator.allocate_segment(light_slot_count)?;
        log::debug!(
            "ReGIR {:?}: {} light slots at RIS offset {}",
            static_params.mode,
            light_slot_count,
            ris_buffer_offset
        );

        Ok(Self {
            static_params,
            onion,
            light_slot_count,
            ris_buffer_offset,
        })
    }

    pub fn cell_count(&self) -> u32 {
        match self.static_params.mode {
            ReGirMode::Disabled => 0,
            ReGirMode::Grid => self.static_params.grid_size.iter().product(),
            ReGirMode::Onion => self.onion.as_ref().map_or(0, OnionGrid::total_cells),
        }
    }
}

fn validate_static_parameters(params: &ReGirStaticParameters) -> ContextResult<()> {
    if params.mode == ReGirMode::Disabled {
        return Ok(());
    }
    if params.lights_per_cell == 0 {
        return Err(ConfigurationIssue::ZeroLightsPerCell.into());
    }
    if params.mode == ReGirMode::Grid && params.grid_size.contains(&0) {
        return Err(ConfigurationIssue::ZeroGridDimension(params.grid_size).into());
    }
    Ok(())
}

/// Combine the fixed layout with this frame's dynamic values.
pub fn compute_runtime_parameters(
    layout: &ReGirLayout,
    dynamic: &ReGirDynamicParameters,
) -> ContextResult<ReGirRuntimeParameters> {
    let enabled = layout.static_params.mode != ReGirMode::Disabled;
    let common = ReGirCommonParameters {
        enable: enabled as u32,
        center: dynamic.center,
        cell_size: dynamic.cell_size,
        sampling_jitter: dynamic.sampling_jitter,
        lights_per_cell: layout.static_params.lights_per_cell,
        ris_buffer_offset: layout.ris_buffer_offset,
        num_build_samples: dynamic.num_build_samples,
        presampling_mode: dynamic.presampling_mode.as_gpu(),
        fallback_sampling_mode: dynamic.fallback_sampling_mode.as_gpu(),
        _pad: 0,
    };

    let grid = ReGirGridParameters {
        cells: layout.static_params.grid_size,
        _pad: 0,
    };

    let onion = match &layout.onion {
        Some(onion) => onion.to_gpu()?,
        None => ReGirOnionParameters::zeroed(),
    };

    Ok(ReGirRuntimeParameters { common, grid, onion })
}

/// ReGIR context: fixed layout plus the dynamic parameters of the current frame.
#[derive(Debug, Clone)]
pub struct ReGirContext {
    layout: ReGirLayout,
    dynamic: ReGirDynamicParameters,
}

impl ReGirContext {
    pub fn new(
        static_params: ReGirStaticParameters,
        allocator: &mut RisBufferSegmentAllocator,
    ) -> ContextResult<Self> {
        Ok(Self {
            layout: ReGirLayout::new(static_params, allocator)?,
            dynamic: ReGirDynamicParameters::default(),
        })
    }

    pub fn static_parameters(&self) -> &ReGirStaticParameters {
        &self.layout.static_params
    }

    pub fn layout(&self) -> &ReGirLayout {
        &self.layout
    }

    pub fn onion(&self) -> Option<&OnionGrid> {
        self.layout.onion.as_ref()
    }

    pub fn light_slot_count(&self) -> u32 {
        self.layout.light_slot_count
    }

    pub fn ris_buffer_offset(&self) -> u32 {
        self.layout.ris_buffer_offset
    }

    pub fn dynamic_parameters(&self) -> &ReGirDynamicParameters {
        &self.dynamic
    }

    pub fn set_dynamic_parameters(&mut self, dynamic: ReGirDynamicParameters) {
        self.dynamic = dynamic;
    }

    pub fn runtime_parameters(&self) -> ContextResult<ReGirRuntimeParameters> {
        compute_runtime_parameters(&self.layout, &self.dynamic)
    }
}
