//! CPU meshing core: face visibility masks, liquid surfaces, and vertex
//! buffer assembly for 32-edge cuboids.
#![forbid(unsafe_code)]

pub mod atlas;
pub mod build;
pub mod face;
pub mod input;
pub mod liquid;
pub mod masks;
pub mod vertex;

pub use atlas::{TextureAtlas, TileUv, UnitAtlas};
pub use build::{BakeTiming, MeshParts, bake_cuboid, cuboid_bounds};
pub use face::Face;
pub use input::MeshInput;
pub use liquid::LiquidSurfaceBuilder;
pub use masks::{FaceMasks, FaceWriter};
pub use vertex::{Attribute, VERTEX_FLOATS, VERTEX_LAYOUT, VertexBuffer};
