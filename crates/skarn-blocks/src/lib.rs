//! Block metadata and the injected read-only block registry.
#![forbid(unsafe_code)]

pub mod config;
pub mod registry;
pub mod types;

pub use registry::{BlockRegistry, RegistryError};
pub use types::{BlockId, BlockModel, BlockType, FlowStrength, ItemStack, ModelBox, Opacity};
