//! Cuboid snapshots: fixed 32-edge cubic regions of per-block aspect data.
#![forbid(unsafe_code)]

use std::collections::HashMap;

use skarn_blocks::types::AIR;
use skarn_blocks::{BlockId, BlockRegistry, ItemStack};

/// Blocks per cuboid edge.
pub const CUBOID_EDGE: usize = 32;
pub const CUBOID_EDGE_I: i32 = CUBOID_EDGE as i32;
/// Highest per-block light value; multiplier math divides by this.
pub const MAX_LIGHT: u8 = 15;

const VOLUME: usize = CUBOID_EDGE * CUBOID_EDGE * CUBOID_EDGE;

/// Cuboid position in cuboid units (world block = address * 32 + local).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct CuboidAddress {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl CuboidAddress {
    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }

    /// World coordinate of this cuboid's minimum corner.
    #[inline]
    pub fn base(self) -> (i32, i32, i32) {
        (
            self.x * CUBOID_EDGE_I,
            self.y * CUBOID_EDGE_I,
            self.z * CUBOID_EDGE_I,
        )
    }
}

/// Local block coordinates, each in `[0, 32)`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct BlockAddress {
    pub x: u8,
    pub y: u8,
    pub z: u8,
}

impl BlockAddress {
    /// Panics when any coordinate is outside the cuboid; out-of-range
    /// addresses conceptually belong to a neighbor and are a caller bug.
    #[inline]
    pub fn new(x: u8, y: u8, z: u8) -> Self {
        assert!(
            (x as usize) < CUBOID_EDGE && (y as usize) < CUBOID_EDGE && (z as usize) < CUBOID_EDGE,
            "block address ({x},{y},{z}) outside cuboid"
        );
        Self { x, y, z }
    }

    /// True when the block lies on any cuboid face (coordinate 0 or 31).
    #[inline]
    pub fn on_boundary(self) -> bool {
        let edge = (CUBOID_EDGE - 1) as u8;
        self.x == 0
            || self.x == edge
            || self.y == 0
            || self.y == edge
            || self.z == 0
            || self.z == edge
    }
}

#[inline]
fn idx(x: usize, y: usize, z: usize) -> usize {
    debug_assert!(x < CUBOID_EDGE && y < CUBOID_EDGE && z < CUBOID_EDGE);
    (y * CUBOID_EDGE + z) * CUBOID_EDGE + x
}

/// Immutable-from-the-mesher's-perspective snapshot of one cuboid's
/// per-block aspects. Dense arrays for block type, light, damage, and
/// orientation; sparse map for block inventories (dropped items).
#[derive(Clone, Debug)]
pub struct Cuboid {
    address: CuboidAddress,
    blocks: Vec<BlockId>,
    light: Vec<u8>,
    damage: Vec<u8>,
    orientation: Vec<u8>,
    inventories: HashMap<BlockAddress, Vec<ItemStack>>,
}

impl Cuboid {
    pub fn filled(address: CuboidAddress, block: BlockId) -> Self {
        Self {
            address,
            blocks: vec![block; VOLUME],
            light: vec![0; VOLUME],
            damage: vec![0; VOLUME],
            orientation: vec![0; VOLUME],
            inventories: HashMap::new(),
        }
    }

    pub fn empty(address: CuboidAddress) -> Self {
        Self::filled(address, AIR)
    }

    #[inline]
    pub fn address(&self) -> CuboidAddress {
        self.address
    }

    #[inline]
    pub fn block(&self, x: usize, y: usize, z: usize) -> BlockId {
        self.blocks[idx(x, y, z)]
    }

    #[inline]
    pub fn light(&self, x: usize, y: usize, z: usize) -> u8 {
        self.light[idx(x, y, z)]
    }

    #[inline]
    pub fn damage(&self, x: usize, y: usize, z: usize) -> u8 {
        self.damage[idx(x, y, z)]
    }

    #[inline]
    pub fn orientation(&self, x: usize, y: usize, z: usize) -> u8 {
        self.orientation[idx(x, y, z)]
    }

    #[inline]
    pub fn block_at(&self, addr: BlockAddress) -> BlockId {
        self.block(addr.x as usize, addr.y as usize, addr.z as usize)
    }

    #[inline]
    pub fn light_at(&self, addr: BlockAddress) -> u8 {
        self.light(addr.x as usize, addr.y as usize, addr.z as usize)
    }

    #[inline]
    pub fn inventory_at(&self, addr: BlockAddress) -> Option<&[ItemStack]> {
        self.inventories.get(&addr).map(|v| v.as_slice())
    }

    // Snapshot construction. The meshing core never calls these.

    pub fn set_block(&mut self, addr: BlockAddress, block: BlockId) -> &mut Self {
        self.blocks[idx(addr.x as usize, addr.y as usize, addr.z as usize)] = block;
        self
    }

    pub fn set_light(&mut self, addr: BlockAddress, light: u8) -> &mut Self {
        assert!(light <= MAX_LIGHT, "light {light} exceeds {MAX_LIGHT}");
        self.light[idx(addr.x as usize, addr.y as usize, addr.z as usize)] = light;
        self
    }

    pub fn set_damage(&mut self, addr: BlockAddress, damage: u8) -> &mut Self {
        self.damage[idx(addr.x as usize, addr.y as usize, addr.z as usize)] = damage;
        self
    }

    pub fn set_orientation(&mut self, addr: BlockAddress, orientation: u8) -> &mut Self {
        self.orientation[idx(addr.x as usize, addr.y as usize, addr.z as usize)] = orientation;
        self
    }

    pub fn set_inventory(&mut self, addr: BlockAddress, stacks: Vec<ItemStack>) -> &mut Self {
        if stacks.is_empty() {
            self.inventories.remove(&addr);
        } else {
            self.inventories.insert(addr, stacks);
        }
        self
    }

    /// Visits every non-air block. Traversal order is the dense storage
    /// order (y-major), which meshing relies on for deterministic output.
    pub fn for_each_block(&self, mut f: impl FnMut(BlockAddress, BlockId)) {
        for y in 0..CUBOID_EDGE {
            for z in 0..CUBOID_EDGE {
                for x in 0..CUBOID_EDGE {
                    let b = self.blocks[idx(x, y, z)];
                    if b != AIR {
                        f(
                            BlockAddress {
                                x: x as u8,
                                y: y as u8,
                                z: z as u8,
                            },
                            b,
                        );
                    }
                }
            }
        }
    }

    /// Visits every block with a non-empty inventory, in storage order, so
    /// repeated bakes of the same snapshot emit identical vertex data.
    pub fn for_each_inventory(&self, mut f: impl FnMut(BlockAddress, &[ItemStack])) {
        let mut addrs: Vec<BlockAddress> = self.inventories.keys().copied().collect();
        addrs.sort_by_key(|a| (a.y, a.z, a.x));
        for addr in addrs {
            f(addr, &self.inventories[&addr]);
        }
    }

    #[inline]
    pub fn has_blocks(&self) -> bool {
        self.blocks.iter().any(|&b| b != AIR)
    }
}

/// Highest opaque block's world `y` per (x, z) column of a cuboid column.
/// Used to decide whether sky light reaches a face.
#[derive(Clone, Debug)]
pub struct ColumnHeightMap {
    heights: Vec<i32>,
}

impl ColumnHeightMap {
    /// Column value when no opaque block exists anywhere in the column.
    pub const UNSET: i32 = i32::MIN;

    pub fn unset() -> Self {
        Self {
            heights: vec![Self::UNSET; CUBOID_EDGE * CUBOID_EDGE],
        }
    }

    pub fn from_fn(mut f: impl FnMut(usize, usize) -> i32) -> Self {
        let mut heights = vec![Self::UNSET; CUBOID_EDGE * CUBOID_EDGE];
        for z in 0..CUBOID_EDGE {
            for x in 0..CUBOID_EDGE {
                heights[z * CUBOID_EDGE + x] = f(x, z);
            }
        }
        Self { heights }
    }

    /// Convenience for tests and single-cuboid columns: scans one cuboid
    /// top-down for the highest opaque block per column.
    pub fn from_cuboid(cuboid: &Cuboid, reg: &BlockRegistry) -> Self {
        let base_y = cuboid.address().base().1;
        Self::from_fn(|x, z| {
            for y in (0..CUBOID_EDGE).rev() {
                if reg.is_opaque_cube(cuboid.block(x, y, z)) {
                    return base_y + y as i32;
                }
            }
            Self::UNSET
        })
    }

    #[inline]
    pub fn height(&self, x: usize, z: usize) -> i32 {
        debug_assert!(x < CUBOID_EDGE && z < CUBOID_EDGE);
        self.heights[z * CUBOID_EDGE + x]
    }

    /// True when an air cell at world `y` in this column sees the sky.
    #[inline]
    pub fn sky_open_at(&self, x: usize, z: usize, world_y: i32) -> bool {
        let h = self.height(x, z);
        h == Self::UNSET || world_y > h
    }
}
