//! ReSTIR DI: per-pixel reservoir resampling for direct lighting.

use crate::error::ContextResult;
use crate::neighbor_offsets::NeighborOffsetTable;
use crate::reservoir::{
    CheckerboardMode, ReservoirBufferParameters, calculate_reservoir_buffer_parameters,
};
use bytemuck::{Pod, Zeroable};
use serde::Deserialize;

/// Reservoir arrays cycled through by the DI passes.
pub const NUM_RESTIR_DI_RESERVOIR_BUFFERS: u32 = 3;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ReStirDiStaticParameters {
    pub neighbor_offset_count: u32,
    pub render_width: u32,
    pub render_height: u32,
    pub checkerboard_mode: CheckerboardMode,
}

impl Default for ReStirDiStaticParameters {
    fn default() -> Self {
        Self {
            neighbor_offset_count: 8192,
            render_width: 0,
            render_height: 0,
            checkerboard_mode: CheckerboardMode::Off,
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Deserialize)]
pub enum ResamplingMode {
    None,
    Temporal,
    Spatial,
    #[default]
    TemporalAndSpatial,
    FusedSpatiotemporal,
}

impl ResamplingMode {
    pub fn uses_temporal(self) -> bool {
        matches!(
            self,
            ResamplingMode::Temporal
                | ResamplingMode::TemporalAndSpatial
                | ResamplingMode::FusedSpatiotemporal
        )
    }

    pub fn uses_spatial(self) -> bool {
        matches!(
            self,
            ResamplingMode::Spatial
                | ResamplingMode::TemporalAndSpatial
                | ResamplingMode::FusedSpatiotemporal
        )
    }
}

/// Where initial candidates for local lights come from.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Deserialize)]
pub enum InitialLocalLightSamplingMode {
    Uniform,
    PowerRis,
    #[default]
    ReGirRis,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Deserialize)]
pub enum BiasCorrectionMode {
    Off,
    #[default]
    Basic,
    Pairwise,
    RayTraced,
}

#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InitialSamplingParameters {
    pub num_local_light_samples: u32,
    pub num_infinite_light_samples: u32,
    pub num_environment_samples: u32,
    pub num_brdf_samples: u32,
    pub brdf_cutoff: f32,
    pub enable_initial_visibility: bool,
    pub local_light_sampling_mode: InitialLocalLightSamplingMode,
}

impl Default for InitialSamplingParameters {
    fn default() -> Self {
        Self {
            num_local_light_samples: 8,
            num_infinite_light_samples: 1,
            num_environment_samples: 1,
            num_brdf_samples: 1,
            brdf_cutoff: 0.0,
            enable_initial_visibility: true,
            local_light_sampling_mode: InitialLocalLightSamplingMode::ReGirRis,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TemporalResamplingParameters {
    pub max_history_length: u32,
    pub bias_correction_mode: BiasCorrectionMode,
    pub depth_threshold: f32,
    pub normal_threshold: f32,
    pub enable_permutation_sampling: bool,
    pub enable_boiling_filter: bool,
    pub boiling_filter_strength: f32,
    /// Refreshed from the frame index by [`ReStirDiContext::set_frame_index`].
    #[serde(skip)]
    pub uniform_random_number: u32,
}

impl Default for TemporalResamplingParameters {
    fn default() -> Self {
        Self {
            max_history_length: 20,
            bias_correction_mode: BiasCorrectionMode::Basic,
            depth_threshold: 0.1,
            normal_threshold: 0.5,
            enable_permutation_sampling: true,
            enable_boiling_filter: true,
            boiling_filter_strength: 0.2,
            uniform_random_number: 0,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpatialResamplingParameters {
    pub num_samples: u32,
    pub num_disocclusion_boost_samples: u32,
    pub sampling_radius: f32,
    pub bias_correction_mode: BiasCorrectionMode,
    pub depth_threshold: f32,
    pub normal_threshold: f32,
}

impl Default for SpatialResamplingParameters {
    fn default() -> Self {
        Self {
            num_samples: 1,
            num_disocclusion_boost_samples: 8,
            sampling_radius: 32.0,
            bias_correction_mode: BiasCorrectionMode::Basic,
            depth_threshold: 0.1,
            normal_threshold: 0.5,
        }
    }
}

/// Reservoir array each DI pass reads or writes this frame.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ReStirDiBufferIndices {
    pub initial_sampling_output: u32,
    pub temporal_resampling_input: u32,
    pub temporal_resampling_output: u32,
    pub spatial_resampling_input: u32,
    pub spatial_resampling_output: u32,
    pub shading_input: u32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct ReStirDiRuntimeParameters {
    pub neighbor_offset_mask: u32,
    pub active_checkerboard_field: u32,
    _pad: [u32; 2],
}

/// Integer hash used to derive one uniform random number per frame.
pub fn jenkins_hash(mut a: u32) -> u32 {
    a = a.wrapping_add(0x7ed5_5d16).wrapping_add(a << 12);
    a = (a ^ 0xc761_c23c) ^ (a >> 19);
    a = a.wrapping_add(0x1656_67b1).wrapping_add(a << 5);
    a = a.wrapping_add(0xd3a2_646c) ^ (a << 9);
    a = a.wrapping_add(0xfd70_46c5).wrapping_add(a << 3);
    a = (a ^ 0xb55a_4f09) ^ (a >> 16);
    a
}

#[derive(Debug)]
pub struct ReStirDiContext {
    static_params: ReStirDiStaticParameters,
    reservoir_params: ReservoirBufferParameters,
    reservoir_element_count: u32,
    neighbor_offsets: NeighborOffsetTable,
    frame_index: u32,
    resampling_mode: ResamplingMode,
    buffer_indices: ReStirDiBufferIndices,
    last_frame_output_reservoir: u32,
    initial_sampling: InitialSamplingParameters,
    temporal_resampling: TemporalResamplingParameters,
    spatial_resampling: SpatialResamplingParameters,
}

impl ReStirDiContext {
    pub fn new(static_params: ReStirDiStaticParameters) -> ContextResult<Self> {
        let reservoir_params = calculate_reservoir_buffer_parameters(
            static_params.render_width,
            static_params.render_height,
            static_params.checkerboard_mode,
        )?;
        let reservoir_element_count =
            reservoir_params.element_count(NUM_RESTIR_DI_RESERVOIR_BUFFERS)?;
        let mut ctx = Self {
            static_params,
            reservoir_params,
            reservoir_element_count,
            neighbor_offsets: NeighborOffsetTable::new(static_params.neighbor_offset_count),
            frame_index: 0,
            resampling_mode: ResamplingMode::default(),
            buffer_indices: ReStirDiBufferIndices::default(),
            last_frame_output_reservoir: 0,
            initial_sampling: InitialSamplingParameters::default(),
            temporal_resampling: TemporalResamplingParameters::default(),
            spatial_resampling: SpatialResamplingParameters::default(),
        };
        ctx.update_buffer_indices();
        Ok(ctx)
    }

    pub fn static_parameters(&self) -> &ReStirDiStaticParameters {
        &self.static_params
    }

    pub fn reservoir_buffer_parameters(&self) -> ReservoirBufferParameters {
        self.reservoir_params
    }

    /// Elements needed to hold every DI reservoir array.
    pub fn reservoir_buffer_element_count(&self) -> u32 {
        self.reservoir_element_count
    }

    pub fn neighbor_offset_count(&self) -> u32 {
        self.static_params.neighbor_offset_count
    }

    /// Neighbor-offset table; generated on first use, cached afterwards.
    pub fn neighbor_offsets(&self) -> &NeighborOffsetTable {
        &self.neighbor_offsets
    }

    pub fn frame_index(&self) -> u32 {
        self.frame_index
    }

    /// Start a new frame: refresh the per-frame random number and rotate reservoir buffers.
    pub fn set_frame_index(&mut self, frame_index: u32) {
        self.frame_index = frame_index;
        self.temporal_resampling.uniform_random_number = jenkins_hash(frame_index);
        self.last_frame_output_reservoir = self.buffer_indices.shading_input;
        self.update_buffer_indices();
    }

    pub fn resampling_mode(&self) -> ResamplingMode {
        self.resampling_mode
    }

    pub fn set_resampling_mode(&mut self, mode: ResamplingMode) {
        self.resampling_mode = mode;
        self.update_buffer_indices();
    }

    pub fn buffer_indices(&self) -> ReStirDiBufferIndices {
        self.buffer_indices
    }

    pub fn initial_sampling_parameters(&self) -> &InitialSamplingParameters {
        &self.initial_sampling
    }

    pub fn set_initial_sampling_parameters(&mut self, params: InitialSamplingParameters) {
        self.initial_sampling = params;
    }

    pub fn temporal_resampling_parameters(&self) -> &TemporalResamplingParameters {
        &self.temporal_resampling
    }

    pub fn set_temporal_resampling_parameters(&mut self, params: TemporalResamplingParameters) {
        // The random number belongs to the frame, not to the caller's copy.
        let uniform_random_number = self.temporal_resampling.uniform_random_number;
        self.temporal_resampling = TemporalResamplingParameters {
            uniform_random_number,
            ..params
        };
    }

    pub fn spatial_resampling_parameters(&self) -> &SpatialResamplingParameters {
        &self.spatial_resampling
    }

    pub fn set_spatial_resampling_parameters(&mut self, params: SpatialResamplingParameters) {
        self.spatial_resampling = params;
    }

    pub fn runtime_parameters(&self) -> ReStirDiRuntimeParameters {
        ReStirDiRuntimeParameters {
            neighbor_offset_mask: self.static_params.neighbor_offset_count.wrapping_sub(1),
            active_checkerboard_field: self
                .static_params
                .checkerboard_mode
                .active_field(self.frame_index),
            _pad: [0; 2],
        }
    }

    fn update_buffer_indices(&mut self) {
        let n = NUM_RESTIR_DI_RESERVOIR_BUFFERS;
        let mode = self.resampling_mode;
        let mut idx = ReStirDiBufferIndices {
            initial_sampling_output: (self.last_frame_output_reservoir + 1) % n,
            temporal_resampling_input: self.last_frame_output_reservoir,
            ..Default::default()
        };

        if mode == ResamplingMode::FusedSpatiotemporal {
            idx.shading_input = idx.initial_sampling_output;
        } else {
            idx.temporal_resampling_output = (idx.temporal_resampling_input + 1) % n;
            idx.spatial_resampling_input = if mode.uses_temporal() {
                idx.temporal_resampling_output
            } else {
                idx.initial_sampling_output
            };
            idx.spatial_resampling_output = (idx.spatial_resampling_input + 1) % n;
            idx.shading_input = if mode.uses_spatial() {
                idx.spatial_resampling_output
            } else if mode.uses_temporal() {
                idx.temporal_resampling_output
            } else {
                idx.initial_sampling_output
            };
        }

        self.buffer_indices = idx;
    }
}
