pub mod config;
pub mod context;
pub mod error;
pub mod geometry;
pub mod gpu;
pub mod neighbor_offsets;
pub mod onion;
pub mod regir;
pub mod reservoir;
pub mod restir_di;
pub mod restir_gi;
pub mod ris_buffer;

pub use context::{ImportanceSamplingContext, ImportanceSamplingStaticParameters, LightBufferParameters};
pub use error::{ConfigurationIssue, ContextError, ContextResult};
