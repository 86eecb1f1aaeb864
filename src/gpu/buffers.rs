use crate::context::{ImportanceSamplingContext, LightBufferParameters};
use crate::error::{ContextError, ContextResult};
use crate::regir::ReGirRuntimeParameters;
use crate::reservoir::ReservoirBufferParameters;
use crate::restir_di::ReStirDiRuntimeParameters;
use crate::ris_buffer::RisBufferSegmentParameters;
use bytemuck::{Pod, Zeroable, bytes_of};
use wgpu::util::{BufferInitDescriptor, DeviceExt};
use wgpu::{Buffer, BufferDescriptor, BufferUsages, Device, Queue};

/// One RIS entry: packed light index + inverse pdf (uint2).
pub const RIS_ELEMENT_SIZE: u64 = 8;
/// Compacted light data stored next to each RIS entry (two uint4).
pub const RIS_LIGHT_DATA_SIZE: u64 = 32;
pub const PACKED_DI_RESERVOIR_SIZE: u64 = 32;
pub const PACKED_GI_RESERVOIR_SIZE: u64 = 32;
/// (x, y) pair of signed bytes.
const NEIGHBOR_OFFSET_SIZE: u64 = 2;
// Smallest storage binding every backend accepts.
const MIN_BUFFER_SIZE: u64 = 16;

/// Element counts every context buffer is sized from.
///
/// All counts come straight from the context, so buffer creation never
/// recomputes a size on its own.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BufferPlan {
    pub ris_elements: u32,
    pub regir_light_slots: u32,
    pub di_reservoir_elements: u32,
    pub gi_reservoir_elements: u32,
    pub neighbor_offset_count: u32,
}

impl BufferPlan {
    pub fn from_context(ctx: &ImportanceSamplingContext) -> Self {
        Self {
            ris_elements: ctx.ris_buffer_element_count(),
            regir_light_slots: ctx.regir_context().light_slot_count(),
            di_reservoir_elements: ctx.restir_di_context().reservoir_buffer_element_count(),
            gi_reservoir_elements: ctx.restir_gi_context().reservoir_buffer_element_count(),
            neighbor_offset_count: ctx.neighbor_offset_count(),
        }
    }

    pub fn ris_buffer_bytes(&self) -> u64 {
        self.ris_elements as u64 * RIS_ELEMENT_SIZE
    }

    pub fn ris_light_data_bytes(&self) -> u64 {
        self.ris_elements as u64 * RIS_LIGHT_DATA_SIZE
    }

    pub fn di_reservoir_bytes(&self) -> u64 {
        self.di_reservoir_elements as u64 * PACKED_DI_RESERVOIR_SIZE
    }

    pub fn gi_reservoir_bytes(&self) -> u64 {
        self.gi_reservoir_elements as u64 * PACKED_GI_RESERVOIR_SIZE
    }

    pub fn neighbor_offset_bytes(&self) -> u64 {
        self.neighbor_offset_count as u64 * NEIGHBOR_OFFSET_SIZE
    }

    pub fn total_bytes(&self) -> u64 {
        self.ris_buffer_bytes()
            + self.ris_light_data_bytes()
            + self.di_reservoir_bytes()
            + self.gi_reservoir_bytes()
            + self.neighbor_offset_bytes()
    }
}

/// Per-frame constants shared by the DI passes.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct FrameConstants {
    pub light_buffer: LightBufferParameters,
    pub local_light_ris: RisBufferSegmentParameters,
    pub environment_light_ris: RisBufferSegmentParameters,
    pub reservoir: ReservoirBufferParameters,
    pub restir_di: ReStirDiRuntimeParameters,
}

impl FrameConstants {
    pub fn from_context(ctx: &ImportanceSamplingContext) -> Self {
        Self {
            light_buffer: *ctx.light_buffer_parameters(),
            local_light_ris: *ctx.local_light_ris_buffer_segment(),
            environment_light_ris: *ctx.environment_light_ris_buffer_segment(),
            reservoir: ctx.restir_di_context().reservoir_buffer_parameters(),
            restir_di: ctx.restir_di_context().runtime_parameters(),
        }
    }
}

/// GPU buffers backing one importance sampling context.
pub struct ContextBuffers {
    pub plan: BufferPlan,
    pub ris_buffer: Buffer,
    pub ris_light_data_buffer: Buffer,
    pub di_reservoir_buffer: Buffer,
    pub gi_reservoir_buffer: Buffer,
    pub neighbor_offsets_buffer: Buffer,
    pub frame_constants_buffer: Buffer,
    pub regir_params_buffer: Buffer,
}

impl ContextBuffers {
    pub fn create(device: &Device, ctx: &ImportanceSamplingContext) -> ContextResult<Self> {
        let plan = BufferPlan::from_context(ctx);
        let limits = device.limits();
        let max_storage_buffer_binding_size = limits.max_storage_buffer_binding_size as u64;
        let max_buffer_size = limits.max_buffer_size;
        let check_storage_size = |label: &'static str, bytes: u64| -> ContextResult<u64> {
            let limit = max_storage_buffer_binding_size.min(max_buffer_size);
            if bytes > limit {
                return Err(ContextError::BufferTooLarge {
                    label,
                    bytes,
                    limit,
                });
            }
            Ok(bytes.max(MIN_BUFFER_SIZE))
        };

        let storage = |label: &'static str, bytes: u64| -> ContextResult<Buffer> {
            Ok(device.create_buffer(&BufferDescriptor {
                label: Some(label),
                size: check_storage_size(label, bytes)?,
                usage: BufferUsages::STORAGE | BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }))
        };

        let ris_buffer = storage("ris buffer", plan.ris_buffer_bytes())?;
        let ris_light_data_buffer = storage("ris light data buffer", plan.ris_light_data_bytes())?;
        let di_reservoir_buffer = storage("restir di reservoir buffer", plan.di_reservoir_bytes())?;
        let gi_reservoir_buffer = storage("restir gi reservoir buffer", plan.gi_reservoir_bytes())?;

        let offsets = ctx.restir_di_context().neighbor_offsets();
        check_storage_size("neighbor offsets buffer", plan.neighbor_offset_bytes())?;
        let neighbor_offsets_buffer = device.create_buffer_init(&BufferInitDescriptor {
            label: Some("neighbor offsets buffer"),
            contents: offsets.as_bytes(),
            usage: BufferUsages::STORAGE,
        });

        let frame_constants_buffer = device.create_buffer_init(&BufferInitDescriptor {
            label: Some("frame constants buffer"),
            contents: bytes_of(&FrameConstants::from_context(ctx)),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        });

        let regir_params: ReGirRuntimeParameters = ctx.regir_context().runtime_parameters()?;
        let regir_params_buffer = device.create_buffer_init(&BufferInitDescriptor {
            label: Some("regir params buffer"),
            contents: bytes_of(&regir_params),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        });

        log::debug!(
            "created context buffers: {} bytes of storage",
            plan.total_bytes()
        );

        Ok(Self {
            plan,
            ris_buffer,
            ris_light_data_buffer,
            di_reservoir_buffer,
            gi_reservoir_buffer,
            neighbor_offsets_buffer,
            frame_constants_buffer,
            regir_params_buffer,
        })
    }

    /// Upload this frame's constants. The context must be the one the buffers were created from.
    pub fn write_frame(&self, queue: &Queue, ctx: &ImportanceSamplingContext) -> ContextResult<()> {
        debug_assert_eq!(self.plan, BufferPlan::from_context(ctx));
        queue.write_buffer(
            &self.frame_constants_buffer,
            0,
            bytes_of(&FrameConstants::from_context(ctx)),
        );
        let regir_params = ctx.regir_context().runtime_parameters()?;
        queue.write_buffer(&self.regir_params_buffer, 0, bytes_of(&regir_params));
        Ok(())
    }
}
