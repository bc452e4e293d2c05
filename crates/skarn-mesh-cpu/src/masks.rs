//! XOR-toggle face visibility masks.
//!
//! Three bit planes (one per face-normal axis) record, per unit-square
//! boundary, whether a visible face exists there. Toggling the same plane
//! cell twice cancels, so a face shared by two included blocks disappears
//! without any per-face neighbor query: one O(blocks) toggle pass, then a
//! query pass. Plane positions 0 and 32 are the seam planes; pre-seeding a
//! neighbor's boundary layer into them culls or exposes seam faces without
//! the main pass ever touching the neighbor cuboid.

use skarn_blocks::BlockId;
use skarn_cuboid::{CUBOID_EDGE, Cuboid};

use crate::face::Face;

const E: usize = CUBOID_EDGE;
/// Plane positions per axis (both outer boundaries included).
const PLANES: usize = E + 1;
const PLANE_BITS: usize = PLANES * E * E;

pub(crate) struct Bitset {
    data: Vec<u64>,
}

impl Bitset {
    pub(crate) fn new(nbits: usize) -> Self {
        Self {
            data: vec![0; nbits.div_ceil(64)],
        }
    }

    #[inline]
    pub(crate) fn toggle(&mut self, i: usize) {
        self.data[i >> 6] ^= 1u64 << (i & 63);
    }

    #[inline]
    pub(crate) fn set(&mut self, i: usize) {
        self.data[i >> 6] |= 1u64 << (i & 63);
    }

    #[inline]
    pub(crate) fn get(&self, i: usize) -> bool {
        (self.data[i >> 6] >> (i & 63)) & 1 != 0
    }

    #[inline]
    pub(crate) fn clear(&mut self) {
        self.data.fill(0);
    }

    pub(crate) fn count_ones(&self) -> usize {
        self.data.iter().map(|w| w.count_ones() as usize).sum()
    }
}

/// Receives visible faces during `FaceMasks::build_faces`, and neighbor
/// boundary blocks during pre-seeding.
pub trait FaceWriter {
    /// The inclusion predicate shared by populate/pre-seed/emit for one
    /// mesh category.
    fn include(&self, block: BlockId) -> bool;

    /// One visible unit face of the block at local `(x,y,z)`.
    fn write_face(&mut self, x: usize, y: usize, z: usize, face: Face, block: BlockId);

    /// A neighbor cuboid's block just across the seam, at pseudo-local
    /// coordinates (one coordinate is -1 or 32). Default: ignored.
    fn edge_value(&mut self, _x: i32, _y: i32, _z: i32, _block: BlockId) {}
}

pub struct FaceMasks {
    /// Plane bitsets keyed by face-normal axis.
    px: Bitset,
    py: Bitset,
    pz: Bitset,
}

impl Default for FaceMasks {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceMasks {
    pub fn new() -> Self {
        Self {
            px: Bitset::new(PLANE_BITS),
            py: Bitset::new(PLANE_BITS),
            pz: Bitset::new(PLANE_BITS),
        }
    }

    #[inline]
    fn idx_x(plane: usize, y: usize, z: usize) -> usize {
        debug_assert!(plane < PLANES && y < E && z < E, "x-plane ({plane},{y},{z})");
        (plane * E + y) * E + z
    }

    #[inline]
    fn idx_y(plane: usize, x: usize, z: usize) -> usize {
        debug_assert!(plane < PLANES && x < E && z < E, "y-plane ({plane},{x},{z})");
        (plane * E + x) * E + z
    }

    #[inline]
    fn idx_z(plane: usize, x: usize, y: usize) -> usize {
        debug_assert!(plane < PLANES && x < E && y < E, "z-plane ({plane},{x},{y})");
        (plane * E + x) * E + y
    }

    /// Toggles all six face bits of every block passing `include`.
    /// Resets the masks first, so repeated populate calls with the same
    /// input produce the same masks instead of cancelling themselves.
    pub fn populate(&mut self, cuboid: &Cuboid, include: &dyn Fn(BlockId) -> bool) {
        self.px.clear();
        self.py.clear();
        self.pz.clear();
        for y in 0..E {
            for z in 0..E {
                for x in 0..E {
                    if include(cuboid.block(x, y, z)) {
                        self.px.toggle(Self::idx_x(x, y, z));
                        self.px.toggle(Self::idx_x(x + 1, y, z));
                        self.py.toggle(Self::idx_y(y, x, z));
                        self.py.toggle(Self::idx_y(y + 1, x, z));
                        self.pz.toggle(Self::idx_z(z, x, y));
                        self.pz.toggle(Self::idx_z(z + 1, x, y));
                    }
                }
            }
        }
    }

    /// Toggles the seam plane facing `toward` using the neighbor cuboid's
    /// boundary layer, cancelling faces shared across the seam. Every
    /// boundary cell is also reported through `edge.edge_value`, included
    /// or not, so grid-building writers can see what lies across the seam.
    pub fn pre_seed(
        &mut self,
        toward: Face,
        neighbor: &Cuboid,
        include: &dyn Fn(BlockId) -> bool,
        mut edge: Option<&mut dyn FaceWriter>,
    ) {
        let last = E - 1;
        match toward {
            Face::NegX | Face::PosX => {
                let (layer, plane, ex) = if toward == Face::NegX {
                    (last, 0, -1)
                } else {
                    (0, E, E as i32)
                };
                for y in 0..E {
                    for z in 0..E {
                        let b = neighbor.block(layer, y, z);
                        if let Some(w) = edge.as_deref_mut() {
                            w.edge_value(ex, y as i32, z as i32, b);
                        }
                        if include(b) {
                            self.px.toggle(Self::idx_x(plane, y, z));
                        }
                    }
                }
            }
            Face::NegY | Face::PosY => {
                let (layer, plane, ey) = if toward == Face::NegY {
                    (last, 0, -1)
                } else {
                    (0, E, E as i32)
                };
                for x in 0..E {
                    for z in 0..E {
                        let b = neighbor.block(x, layer, z);
                        if let Some(w) = edge.as_deref_mut() {
                            w.edge_value(x as i32, ey, z as i32, b);
                        }
                        if include(b) {
                            self.py.toggle(Self::idx_y(plane, x, z));
                        }
                    }
                }
            }
            Face::NegZ | Face::PosZ => {
                let (layer, plane, ez) = if toward == Face::NegZ {
                    (last, 0, -1)
                } else {
                    (0, E, E as i32)
                };
                for x in 0..E {
                    for y in 0..E {
                        let b = neighbor.block(x, y, layer);
                        if let Some(w) = edge.as_deref_mut() {
                            w.edge_value(x as i32, y as i32, ez, b);
                        }
                        if include(b) {
                            self.pz.toggle(Self::idx_z(plane, x, y));
                        }
                    }
                }
            }
        }
    }

    /// True when a visible face of the block at `(x,y,z)` exists in the
    /// given direction. Query-only; bits are never consumed here.
    #[inline]
    pub fn face_set(&self, x: usize, y: usize, z: usize, face: Face) -> bool {
        match face {
            Face::PosY => self.py.get(Self::idx_y(y + 1, x, z)),
            Face::NegY => self.py.get(Self::idx_y(y, x, z)),
            Face::PosX => self.px.get(Self::idx_x(x + 1, y, z)),
            Face::NegX => self.px.get(Self::idx_x(x, y, z)),
            Face::PosZ => self.pz.get(Self::idx_z(z + 1, x, y)),
            Face::NegZ => self.pz.get(Self::idx_z(z, x, y)),
        }
    }

    /// Re-scans the cuboid and reports, for every block passing
    /// `writer.include`, each still-set face bit. A set bit has exactly
    /// one included side, so no face is ever reported twice.
    pub fn build_faces(&self, cuboid: &Cuboid, writer: &mut dyn FaceWriter) {
        for y in 0..E {
            for z in 0..E {
                for x in 0..E {
                    let b = cuboid.block(x, y, z);
                    if !writer.include(b) {
                        continue;
                    }
                    for face in crate::face::ALL_FACES {
                        if self.face_set(x, y, z, face) {
                            writer.write_face(x, y, z, face, b);
                        }
                    }
                }
            }
        }
    }

    /// Total set bits across the three planes (diagnostics and tests).
    pub fn visible_face_count(&self) -> usize {
        self.px.count_ones() + self.py.count_ones() + self.pz.count_ones()
    }
}
