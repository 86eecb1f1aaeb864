//! Importance sampling context: one RIS buffer allocator shared by the DI, ReGIR
//! and GI contexts, plus the per-frame light buffer description.

use crate::error::{ConfigurationIssue, ContextResult};
use crate::regir::{LocalLightSamplingMode, ReGirContext, ReGirMode, ReGirStaticParameters};
use crate::reservoir::CheckerboardMode;
use crate::restir_di::{InitialLocalLightSamplingMode, ReStirDiContext, ReStirDiStaticParameters};
use crate::restir_gi::{ReStirGiContext, ReStirGiStaticParameters};
use crate::ris_buffer::{RisBufferParameters, RisBufferSegmentAllocator, RisBufferSegmentParameters};
use bytemuck::{Pod, Zeroable};
use serde::Deserialize;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportanceSamplingStaticParameters {
    pub render_width: u32,
    pub render_height: u32,
    pub checkerboard_mode: CheckerboardMode,
    pub neighbor_offset_count: u32,
    pub local_light_ris: RisBufferParameters,
    pub environment_light_ris: RisBufferParameters,
    pub regir: ReGirStaticParameters,
}

impl Default for ImportanceSamplingStaticParameters {
    fn default() -> Self {
        Self {
            render_width: 1920,
            render_height: 1080,
            checkerboard_mode: CheckerboardMode::Off,
            neighbor_offset_count: 8192,
            local_light_ris: RisBufferParameters::default(),
            environment_light_ris: RisBufferParameters::default(),
            regir: ReGirStaticParameters::default(),
        }
    }
}

impl ImportanceSamplingStaticParameters {
    /// Check everything the context relies on before any allocation happens.
    pub fn validate(&self) -> ContextResult<()> {
        if self.render_width == 0 || self.render_height == 0 {
            return Err(ConfigurationIssue::ZeroRenderDimension {
                width: self.render_width,
                height: self.render_height,
            }
            .into());
        }

        let pow2_fields = [
            ("localLightRis.tileSize", self.local_light_ris.tile_size),
            ("localLightRis.tileCount", self.local_light_ris.tile_count),
            ("environmentLightRis.tileSize", self.environment_light_ris.tile_size),
            ("environmentLightRis.tileCount", self.environment_light_ris.tile_count),
            ("neighborOffsetCount", self.neighbor_offset_count),
        ];
        for (field, value) in pow2_fields {
            // is_power_of_two() is false for zero
            if !value.is_power_of_two() {
                return Err(ConfigurationIssue::NotPowerOfTwo { field, value }.into());
            }
        }

        for (label, ris) in [
            ("local light RIS", self.local_light_ris),
            ("environment light RIS", self.environment_light_ris),
        ] {
            if ris.tile_size.checked_mul(ris.tile_count).is_none() {
                return Err(ConfigurationIssue::SizeOverflow(label).into());
            }
        }

        Ok(())
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct LightBufferRegion {
    pub first_light_index: u32,
    pub num_lights: u32,
    _pad: [u32; 2],
}

impl LightBufferRegion {
    pub fn new(first_light_index: u32, num_lights: u32) -> Self {
        Self {
            first_light_index,
            num_lights,
            _pad: [0; 2],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct EnvironmentLightParameters {
    pub light_present: u32,
    pub light_index: u32,
    _pad: [u32; 2],
}

impl EnvironmentLightParameters {
    pub fn present(light_index: u32) -> Self {
        Self {
            light_present: 1,
            light_index,
            _pad: [0; 2],
        }
    }
}

/// Where each light category lives in the light buffer, filled once per frame
/// by the light preparation pass.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct LightBufferParameters {
    pub local_light_buffer_region: LightBufferRegion,
    pub infinite_light_buffer_region: LightBufferRegion,
    pub environment_light_params: EnvironmentLightParameters,
}

#[derive(Debug)]
pub struct ImportanceSamplingContext {
    static_params: ImportanceSamplingStaticParameters,
    allocator: RisBufferSegmentAllocator,
    local_light_ris_segment: RisBufferSegmentParameters,
    environment_light_ris_segment: RisBufferSegmentParameters,
    light_buffer_params: LightBufferParameters,
    restir_di: ReStirDiContext,
    regir: ReGirContext,
    restir_gi: ReStirGiContext,
}

impl ImportanceSamplingContext {
    pub fn new(static_params: ImportanceSamplingStaticParameters) -> ContextResult<Self> {
        static_params.validate()?;

        let mut allocator = RisBufferSegmentAllocator::new();
        let local_light_ris_segment = RisBufferSegmentParameters::new(
            allocator.allocate_segment(static_params.local_light_ris.element_count())?,
            static_params.local_light_ris,
        );
        let environment_light_ris_segment = RisBufferSegmentParameters::new(
            allocator.allocate_segment(static_params.environment_light_ris.element_count())?,
            static_params.environment_light_ris,
        );

        let restir_di = ReStirDiContext::new(ReStirDiStaticParameters {
            neighbor_offset_count: static_params.neighbor_offset_count,
            render_width: static_params.render_width,
            render_height: static_params.render_height,
            checkerboard_mode: static_params.checkerboard_mode,
        })?;
        let regir = ReGirContext::new(static_params.regir, &mut allocator)?;
        let restir_gi = ReStirGiContext::new(ReStirGiStaticParameters {
            render_width: static_params.render_width,
            render_height: static_params.render_height,
            checkerboard_mode: static_params.checkerboard_mode,
        })?;

        log::info!(
            "importance sampling context {}x{} ({:?}): RIS buffer {} elements, ReGIR {:?} {} slots, {} DI reservoirs",
            static_params.render_width,
            static_params.render_height,
            static_params.checkerboard_mode,
            allocator.total_size_in_elements(),
            static_params.regir.mode,
            regir.light_slot_count(),
            restir_di.reservoir_buffer_element_count()
        );

        Ok(Self {
            static_params,
            allocator,
            local_light_ris_segment,
            environment_light_ris_segment,
            light_buffer_params: LightBufferParameters::default(),
            restir_di,
            regir,
            restir_gi,
        })
    }

    pub fn static_parameters(&self) -> &ImportanceSamplingStaticParameters {
        &self.static_params
    }

    /// The allocator is read-only once construction is done.
    pub fn ris_buffer_segment_allocator(&self) -> &RisBufferSegmentAllocator {
        &self.allocator
    }

    pub fn ris_buffer_element_count(&self) -> u32 {
        self.allocator.total_size_in_elements()
    }

    pub fn local_light_ris_buffer_segment(&self) -> &RisBufferSegmentParameters {
        &self.local_light_ris_segment
    }

    pub fn environment_light_ris_buffer_segment(&self) -> &RisBufferSegmentParameters {
        &self.environment_light_ris_segment
    }

    pub fn light_buffer_parameters(&self) -> &LightBufferParameters {
        &self.light_buffer_params
    }

    pub fn set_light_buffer_params(&mut self, params: LightBufferParameters) {
        self.light_buffer_params = params;
    }

    pub fn neighbor_offset_count(&self) -> u32 {
        self.static_params.neighbor_offset_count
    }

    pub fn restir_di_context(&self) -> &ReStirDiContext {
        &self.restir_di
    }

    pub fn restir_di_context_mut(&mut self) -> &mut ReStirDiContext {
        &mut self.restir_di
    }

    pub fn regir_context(&self) -> &ReGirContext {
        &self.regir
    }

    pub fn regir_context_mut(&mut self) -> &mut ReGirContext {
        &mut self.regir
    }

    pub fn restir_gi_context(&self) -> &ReStirGiContext {
        &self.restir_gi
    }

    pub fn restir_gi_context_mut(&mut self) -> &mut ReStirGiContext {
        &mut self.restir_gi
    }

    /// Advance every per-frame context to `frame_index`.
    pub fn set_frame_index(&mut self, frame_index: u32) {
        self.restir_di.set_frame_index(frame_index);
        self.restir_gi.set_frame_index(frame_index);
    }

    pub fn is_regir_enabled(&self) -> bool {
        self.static_params.regir.mode != ReGirMode::Disabled
            && self
                .restir_di
                .initial_sampling_parameters()
                .local_light_sampling_mode
                == InitialLocalLightSamplingMode::ReGirRis
    }

    /// Whether any active path reads the power-based local light RIS tiles.
    pub fn is_local_light_power_ris_enabled(&self) -> bool {
        match self
            .restir_di
            .initial_sampling_parameters()
            .local_light_sampling_mode
        {
            InitialLocalLightSamplingMode::Uniform => false,
            InitialLocalLightSamplingMode::PowerRis => true,
            InitialLocalLightSamplingMode::ReGirRis => {
                let dynamic = self.regir.dynamic_parameters();
                dynamic.presampling_mode == LocalLightSamplingMode::PowerRis
                    || dynamic.fallback_sampling_mode == LocalLightSamplingMode::PowerRis
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regir::ReGirDynamicParameters;
    use crate::restir_di::InitialSamplingParameters;

    fn params() -> ImportanceSamplingStaticParameters {
        ImportanceSamplingStaticParameters {
            local_light_ris: RisBufferParameters {
                tile_size: 1024,
                tile_count: 128,
            },
            environment_light_ris: RisBufferParameters {
                tile_size: 1024,
                tile_count: 128,
            },
            ..Default::default()
        }
    }

    #[test]
    fn segments_are_disjoint_and_total_includes_regir() {
        let ctx = ImportanceSamplingContext::new(params()).unwrap();
        let local = ctx.local_light_ris_buffer_segment().range();
        let env = ctx.environment_light_ris_buffer_segment().range();
        assert!(local.end <= env.start || env.end <= local.start);
        let total = ctx.ris_buffer_segment_allocator().total_size_in_elements();
        assert!(total >= 1024 * 128 * 2);
        assert_eq!(total, 1024 * 128 * 2 + ctx.regir_context().light_slot_count());
        assert_eq!(ctx.regir_context().ris_buffer_offset(), env.end);
    }

    #[test]
    fn non_power_of_two_tile_size_is_rejected() {
        let mut p = params();
        p.environment_light_ris.tile_size = 1000;
        let err = ImportanceSamplingContext::new(p).err().unwrap();
        assert!(err.is_invalid_configuration());
        assert!(err.to_string().contains("environmentLightRis.tileSize"));
    }

    #[test]
    fn zero_tile_count_is_rejected() {
        let mut p = params();
        p.local_light_ris.tile_count = 0;
        assert!(ImportanceSamplingContext::new(p).is_err());
    }

    #[test]
    fn ris_total_overflow_is_rejected() {
        let mut p = params();
        // Each segment is 2^31 elements on its own; together they exceed u32.
        p.local_light_ris = RisBufferParameters {
            tile_size: 65536,
            tile_count: 32768,
        };
        p.environment_light_ris = p.local_light_ris;
        assert!(p.validate().is_ok());
        let err = ImportanceSamplingContext::new(p).err().unwrap();
        assert!(err.is_invalid_configuration());
        assert!(err.to_string().contains("RIS buffer"));
    }

    #[test]
    fn regir_slots_past_u32_are_rejected() {
        let mut p = params();
        p.local_light_ris = RisBufferParameters {
            tile_size: 65536,
            tile_count: 32768,
        };
        p.regir = ReGirStaticParameters {
            mode: ReGirMode::Grid,
            grid_size: [1024, 1024, 1024],
            lights_per_cell: 2,
            ..Default::default()
        };
        assert!(ImportanceSamplingContext::new(p).err().unwrap().is_invalid_configuration());
    }

    #[test]
    fn oversized_render_is_rejected() {
        let mut p = params();
        p.render_width = 65536;
        p.render_height = 65536;
        let err = ImportanceSamplingContext::new(p).err().unwrap();
        assert!(err.is_invalid_configuration());
        assert!(err.to_string().contains("reservoir buffer"));
    }

    #[test]
    fn zero_render_size_is_rejected() {
        let mut p = params();
        p.render_height = 0;
        assert!(ImportanceSamplingContext::new(p).is_err());
    }

    #[test]
    fn light_buffer_params_round_trip() {
        let mut ctx = ImportanceSamplingContext::new(params()).unwrap();
        let lbp = LightBufferParameters {
            local_light_buffer_region: LightBufferRegion::new(0, 100),
            infinite_light_buffer_region: LightBufferRegion::new(100, 2),
            environment_light_params: EnvironmentLightParameters::present(102),
        };
        ctx.set_light_buffer_params(lbp);
        assert_eq!(*ctx.light_buffer_parameters(), lbp);
    }

    #[test]
    fn power_ris_follows_sampling_modes() {
        let mut ctx = ImportanceSamplingContext::new(params()).unwrap();
        assert!(ctx.is_regir_enabled());
        assert!(ctx.is_local_light_power_ris_enabled());

        ctx.regir_context_mut()
            .set_dynamic_parameters(ReGirDynamicParameters {
                presampling_mode: LocalLightSamplingMode::Uniform,
                fallback_sampling_mode: LocalLightSamplingMode::Uniform,
                ..Default::default()
            });
        assert!(!ctx.is_local_light_power_ris_enabled());

        ctx.restir_di_context_mut()
            .set_initial_sampling_parameters(InitialSamplingParameters {
                local_light_sampling_mode: InitialLocalLightSamplingMode::PowerRis,
                ..Default::default()
            });
        assert!(ctx.is_local_light_power_ris_enabled());
        assert!(!ctx.is_regir_enabled());
    }

    #[test]
    fn frame_index_reaches_both_contexts() {
        let mut ctx = ImportanceSamplingContext::new(params()).unwrap();
        ctx.set_frame_index(11);
        assert_eq!(ctx.restir_di_context().frame_index(), 11);
        assert_eq!(ctx.restir_gi_context().frame_index(), 11);
    }
}
