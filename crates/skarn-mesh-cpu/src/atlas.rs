//! Texture atlas boundary. Atlas construction and tile packing live in
//! the rendering layer; the meshing core only asks for tile rectangles.

use skarn_blocks::BlockId;

use crate::face::Face;

/// One tile's UV rectangle within the atlas texture.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TileUv {
    pub u0: f32,
    pub v0: f32,
    pub u1: f32,
    pub v1: f32,
}

impl TileUv {
    pub const FULL: TileUv = TileUv {
        u0: 0.0,
        v0: 0.0,
        u1: 1.0,
        v1: 1.0,
    };

    /// Degenerate tile sampled by vertices with no overlay.
    pub const BLANK: TileUv = TileUv {
        u0: 0.0,
        v0: 0.0,
        u1: 0.0,
        v1: 0.0,
    };

    /// Interpolates at fractional coordinates within the tile.
    #[inline]
    pub fn at(self, fu: f32, fv: f32) -> [f32; 2] {
        [
            self.u0 + (self.u1 - self.u0) * fu,
            self.v0 + (self.v1 - self.v0) * fv,
        ]
    }
}

/// Injected UV lookup. Implementations are owned by the rendering layer
/// and shared with the bake worker, hence `Send + Sync`.
pub trait TextureAtlas: Send + Sync {
    /// Primary tile for a block face.
    fn block_tile(&self, block: BlockId, face: Face) -> TileUv;

    /// Auxiliary overlay tile for a damage level; 0 maps to a blank tile.
    fn overlay_tile(&self, damage: u8) -> TileUv;

    /// Tile for a dropped item's debris cube.
    fn item_tile(&self, item: u16) -> TileUv;
}

/// Whole-texture-per-tile atlas for tests and headless bakes.
pub struct UnitAtlas;

impl TextureAtlas for UnitAtlas {
    fn block_tile(&self, _block: BlockId, _face: Face) -> TileUv {
        TileUv::FULL
    }

    fn overlay_tile(&self, damage: u8) -> TileUv {
        if damage == 0 {
            TileUv::BLANK
        } else {
            TileUv::FULL
        }
    }

    fn item_tile(&self, _item: u16) -> TileUv {
        TileUv::FULL
    }
}
