//! ReSTIR GI: reservoir resampling of secondary-surface samples for indirect lighting.

use crate::reservoir::{
    CheckerboardMode, ReservoirBufferParameters, calculate_reservoir_buffer_parameters,
};
use crate::error::ContextResult;
use crate::restir_di::ResamplingMode;

pub const NUM_RESTIR_GI_RESERVOIR_BUFFERS: u32 = 2;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ReStirGiStaticParameters {
    pub render_width: u32,
    pub render_height: u32,
    pub checkerboard_mode: CheckerboardMode,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ReStirGiBufferIndices {
    pub secondary_surface_output: u32,
    pub temporal_resampling_input: u32,
    pub temporal_resampling_output: u32,
    pub spatial_resampling_input: u32,
    pub spatial_resampling_output: u32,
    pub final_shading_input: u32,
}

#[derive(Debug, Clone)]
pub struct ReStirGiContext {
    static_params: ReStirGiStaticParameters,
    reservoir_params: ReservoirBufferParameters,
    reservoir_element_count: u32,
    frame_index: u32,
    resampling_mode: ResamplingMode,
    buffer_indices: ReStirGiBufferIndices,
}

impl ReStirGiContext {
    pub fn new(static_params: ReStirGiStaticParameters) -> ContextResult<Self> {
        let reservoir_params = calculate_reservoir_buffer_parameters(
            static_params.render_width,
            static_params.render_height,
            static_params.checkerboard_mode,
        )?;
        let reservoir_element_count =
            reservoir_params.element_count(NUM_RESTIR_GI_RESERVOIR_BUFFERS)?;
        let mut ctx = Self {
            static_params,
            reservoir_params,
            reservoir_element_count,
            frame_index: 0,
            resampling_mode: ResamplingMode::default(),
            buffer_indices: ReStirGiBufferIndices::default(),
        };
        ctx.update_buffer_indices();
        Ok(ctx)
    }

    pub fn static_parameters(&self) -> &ReStirGiStaticParameters {
        &self.static_params
    }

    pub fn reservoir_buffer_parameters(&self) -> ReservoirBufferParameters {
        self.reservoir_params
    }

    pub fn reservoir_buffer_element_count(&self) -> u32 {
        self.reservoir_element_count
    }

    pub fn frame_index(&self) -> u32 {
        self.frame_index
    }

    pub fn set_frame_index(&mut self, frame_index: u32) {
        self.frame_index = frame_index;
        self.update_buffer_indices();
    }

    pub fn resampling_mode(&self) -> ResamplingMode {
        self.resampling_mode
    }

    pub fn set_resampling_mode(&mut self, mode: ResamplingMode) {
        self.resampling_mode = mode;
        self.update_buffer_indices();
    }

    pub fn buffer_indices(&self) -> ReStirGiBufferIndices {
        self.buffer_indices
    }

    fn update_buffer_indices(&mut self) {
        let parity = self.frame_index & 1;
        let mut idx = ReStirGiBufferIndices::default();

        match self.resampling_mode {
            ResamplingMode::None => {}
            ResamplingMode::Temporal => {
                idx.secondary_surface_output = parity;
                idx.temporal_resampling_input = parity ^ 1;
                idx.temporal_resampling_output = parity;
                idx.final_shading_input = parity;
            }
            ResamplingMode::Spatial => {
                idx.spatial_resampling_input = 0;
                idx.spatial_resampling_output = 1;
                idx.final_shading_input = 1;
            }
            ResamplingMode::TemporalAndSpatial => {
                idx.temporal_resampling_input = 1;
                idx.temporal_resampling_output = 0;
                idx.spatial_resampling_input = 0;
                idx.spatial_resampling_output = 1;
                idx.final_shading_input = 1;
            }
            ResamplingMode::FusedSpatiotemporal => {
                idx.secondary_surface_output = parity;
                idx.temporal_resampling_input = parity ^ 1;
                idx.spatial_resampling_output = parity;
                idx.final_shading_input = parity;
            }
        }

        self.buffer_indices = idx;
    }
}
