//! Immutable neighbor-aware input bundle for one bake.

use std::sync::Arc;

use skarn_blocks::types::AIR;
use skarn_blocks::{BlockId, BlockRegistry};
use skarn_cuboid::{CUBOID_EDGE_I, ColumnHeightMap, Cuboid, MAX_LIGHT};

use crate::face::Face;

/// The target cuboid plus everything boundary-aware lookups may touch:
/// the 3x3x3 cuboid neighborhood (face neighbors for seam culling and
/// lighting, the rest for complex-model lookups) and the 3x3 column
/// height maps. Every neighbor slot may be empty; lookups then fall back
/// to documented defaults (air / fully lit / sky visible) since an
/// unloaded neighbor is a normal boundary condition.
#[derive(Clone)]
pub struct MeshInput {
    center: Arc<Cuboid>,
    height: Arc<ColumnHeightMap>,
    neighbors: [Option<Arc<Cuboid>>; 27],
    heights: [Option<Arc<ColumnHeightMap>>; 9],
}

#[inline]
fn nb_slot(dx: i32, dy: i32, dz: i32) -> usize {
    debug_assert!((-1..=1).contains(&dx) && (-1..=1).contains(&dy) && (-1..=1).contains(&dz));
    (((dx + 1) * 3 + (dy + 1)) * 3 + (dz + 1)) as usize
}

#[inline]
fn col_slot(dx: i32, dz: i32) -> usize {
    debug_assert!((-1..=1).contains(&dx) && (-1..=1).contains(&dz));
    ((dx + 1) * 3 + (dz + 1)) as usize
}

/// Splits a pseudo-local coordinate in `[-32, 64)` into a cuboid offset
/// and an in-cuboid coordinate.
#[inline]
fn split(c: i32) -> (i32, usize) {
    debug_assert!((-CUBOID_EDGE_I..2 * CUBOID_EDGE_I).contains(&c));
    (
        c.div_euclid(CUBOID_EDGE_I),
        c.rem_euclid(CUBOID_EDGE_I) as usize,
    )
}

impl MeshInput {
    pub fn new(center: Arc<Cuboid>, height: Arc<ColumnHeightMap>) -> Self {
        Self {
            center,
            height,
            neighbors: std::array::from_fn(|_| None),
            heights: std::array::from_fn(|_| None),
        }
    }

    pub fn with_neighbor(mut self, dx: i32, dy: i32, dz: i32, cuboid: Arc<Cuboid>) -> Self {
        assert!(
            (dx, dy, dz) != (0, 0, 0),
            "the center slot holds the target cuboid"
        );
        self.neighbors[nb_slot(dx, dy, dz)] = Some(cuboid);
        self
    }

    pub fn with_column_height(mut self, dx: i32, dz: i32, map: Arc<ColumnHeightMap>) -> Self {
        assert!((dx, dz) != (0, 0), "the center column map is fixed");
        self.heights[col_slot(dx, dz)] = Some(map);
        self
    }

    #[inline]
    pub fn center(&self) -> &Cuboid {
        &self.center
    }

    #[inline]
    pub fn height_map(&self) -> &ColumnHeightMap {
        &self.height
    }

    /// Face-adjacent neighbor, if loaded.
    #[inline]
    pub fn face_neighbor(&self, face: Face) -> Option<&Cuboid> {
        let (dx, dy, dz) = face.delta();
        self.neighbors[nb_slot(dx, dy, dz)].as_deref()
    }

    #[inline]
    fn cuboid_for(&self, dx: i32, dy: i32, dz: i32) -> Option<&Cuboid> {
        if (dx, dy, dz) == (0, 0, 0) {
            Some(&self.center)
        } else {
            self.neighbors[nb_slot(dx, dy, dz)].as_deref()
        }
    }

    /// Block at pseudo-local coordinates; air when the owning cuboid is
    /// not loaded.
    #[inline]
    pub fn block_at(&self, x: i32, y: i32, z: i32) -> BlockId {
        let (dx, lx) = split(x);
        let (dy, ly) = split(y);
        let (dz, lz) = split(z);
        self.cuboid_for(dx, dy, dz)
            .map(|c| c.block(lx, ly, lz))
            .unwrap_or(AIR)
    }

    /// Light at pseudo-local coordinates; fully lit when the owning
    /// cuboid is not loaded, so seam faces never render black while a
    /// neighbor streams in.
    #[inline]
    pub fn light_at(&self, x: i32, y: i32, z: i32) -> u8 {
        let (dx, lx) = split(x);
        let (dy, ly) = split(y);
        let (dz, lz) = split(z);
        self.cuboid_for(dx, dy, dz)
            .map(|c| c.light(lx, ly, lz))
            .unwrap_or(MAX_LIGHT)
    }

    /// Whether the block at pseudo-local coordinates is a fully opaque
    /// cube; false (non-occluding) when not loaded.
    #[inline]
    pub fn is_opaque(&self, reg: &BlockRegistry, x: i32, y: i32, z: i32) -> bool {
        let (dx, lx) = split(x);
        let (dy, ly) = split(y);
        let (dz, lz) = split(z);
        self.cuboid_for(dx, dy, dz)
            .map(|c| reg.is_opaque_cube(c.block(lx, ly, lz)))
            .unwrap_or(false)
    }

    /// World `y` of a center-local layer.
    #[inline]
    pub fn world_y(&self, y: usize) -> i32 {
        self.center.address().base().1 + y as i32
    }

    /// Whether an air cell in the column holding pseudo-local `(x, z)`
    /// sees the sky at world `y`. Consults the neighbor's height map when
    /// the coordinate leaves the cuboid; an absent map reads as open sky.
    #[inline]
    pub fn sky_open(&self, x: i32, z: i32, world_y: i32) -> bool {
        let (dx, lx) = split(x);
        let (dz, lz) = split(z);
        let map = if (dx, dz) == (0, 0) {
            Some(self.height.as_ref())
        } else {
            self.heights[col_slot(dx, dz)].as_deref()
        };
        map.map(|m| m.sky_open_at(lx, lz, world_y)).unwrap_or(true)
    }
}
