mod buffers;

pub use buffers::{
    BufferPlan, ContextBuffers, FrameConstants, PACKED_DI_RESERVOIR_SIZE,
    PACKED_GI_RESERVOIR_SIZE, RIS_ELEMENT_SIZE, RIS_LIGHT_DATA_SIZE,
};
