//! Procedurally sloped liquid surfaces.
//!
//! Consumes the same face-visibility callbacks as the cube writers but
//! accumulates per-cell flow-strength/wall-flag bytes into a y-layered
//! grid first (one ring cell of neighbor peek per side), then emits the
//! mesh in a second pass: sloped top quads whose corner heights blend the
//! 2x2 cells sharing each corner, plus full-height side and bottom walls.

use skarn_blocks::{BlockId, BlockRegistry, FlowStrength};
use skarn_cuboid::CUBOID_EDGE;
use skarn_geom::Vec3;

use crate::atlas::TextureAtlas;
use crate::face::{Face, SIDE_FACES};
use crate::input::MeshInput;
use crate::masks::{Bitset, FaceWriter};
use crate::vertex::VertexBuffer;

const E: usize = CUBOID_EDGE;
const E_I: i32 = E as i32;
/// Grid edge including the one-cell neighbor ring.
const GRID: usize = E + 2;

const STRENGTH_MASK: u8 = 0b11;
const FLAG_BOTTOM: u8 = 1 << 2;
/// Side wall flags, indexed in `SIDE_FACES` order (-X, +X, -Z, +Z).
const SIDE_FLAG_BASE: u8 = 3;

#[inline]
fn side_flag(face: Face) -> u8 {
    let slot = match face {
        Face::NegX => 0,
        Face::PosX => 1,
        Face::NegZ => 2,
        Face::PosZ => 3,
        _ => unreachable!("not a side face"),
    };
    1 << (SIDE_FLAG_BASE + slot)
}

pub struct LiquidSurfaceBuilder<'a> {
    reg: &'a BlockRegistry,
    /// Per y-layer, a (edge+2)^2 byte grid: bits 0-1 flow strength,
    /// bit 2 bottom wall, bits 3-6 side walls.
    cells: Vec<u8>,
    /// Liquid present one layer above the top of the cuboid, per (x, z);
    /// fed by the +Y pre-seed edge callback.
    above: Bitset,
}

#[inline]
fn cell_idx(x: i32, y: usize, z: i32) -> usize {
    debug_assert!(y < E, "liquid layer {y}");
    debug_assert!((-1..=E_I).contains(&x) && (-1..=E_I).contains(&z), "liquid cell ({x},{z})");
    (y * GRID + (z + 1) as usize) * GRID + (x + 1) as usize
}

impl<'a> LiquidSurfaceBuilder<'a> {
    pub fn new(reg: &'a BlockRegistry) -> Self {
        Self {
            reg,
            cells: vec![0; E * GRID * GRID],
            above: Bitset::new(E * E),
        }
    }

    /// Records a liquid block's strength. Called for every liquid block
    /// during the bake scan so that fully-enclosed cells still feed the
    /// corner height blend, and again by the face callbacks.
    pub fn note_liquid(&mut self, x: usize, y: usize, z: usize, block: BlockId) {
        if let Some(flow) = self.reg.flow(block) {
            let i = cell_idx(x as i32, y, z as i32);
            self.cells[i] = (self.cells[i] & !STRENGTH_MASK) | flow.code();
        }
    }

    #[inline]
    fn strength(&self, x: i32, y: usize, z: i32) -> u8 {
        self.cells[cell_idx(x, y, z)] & STRENGTH_MASK
    }

    /// True when liquid sits directly above the cell. Ring cells above
    /// the top layer are unknown and read as empty.
    #[inline]
    fn liquid_above(&self, x: i32, y: usize, z: i32) -> bool {
        if y + 1 < E {
            self.strength(x, y + 1, z) != 0
        } else if (0..E_I).contains(&x) && (0..E_I).contains(&z) {
            self.above.get(z as usize * E + x as usize)
        } else {
            false
        }
    }

    /// Surface height of a cell: 0 for no liquid, full height when
    /// liquid sits directly above, otherwise the strength's fraction.
    #[inline]
    fn height_of(&self, x: i32, y: usize, z: i32) -> f32 {
        match FlowStrength::from_code(self.strength(x, y, z)) {
            None => 0.0,
            Some(_) if self.liquid_above(x, y, z) => 1.0,
            Some(flow) => flow.surface_height(),
        }
    }

    /// Max height over the 2x2 cells sharing corner `(cx,cz)` of cell
    /// `(x,z)` — the 8-neighbor blend that makes adjoining surfaces meet.
    fn corner_height(&self, x: usize, y: usize, z: usize, cx: usize, cz: usize) -> f32 {
        let mut h = 0.0f32;
        for dz in 0..2 {
            for dx in 0..2 {
                let nx = x as i32 + cx as i32 - 1 + dx;
                let nz = z as i32 + cz as i32 - 1 + dz;
                h = h.max(self.height_of(nx, y, nz));
            }
        }
        h
    }

    /// Emits the accumulated surface. `side_open` decides whether a side
    /// or bottom wall is actually rendered; callers skip walls facing a
    /// fully opaque block. Top quads are never filtered.
    pub fn write_vertices(
        &self,
        input: &MeshInput,
        atlas: &dyn TextureAtlas,
        out: &mut VertexBuffer,
        side_open: &dyn Fn(Face, usize, usize, usize) -> bool,
    ) {
        let cuboid = input.center();
        let (bx, by, bz) = cuboid.address().base();
        for y in 0..E {
            for z in 0..E {
                for x in 0..E {
                    let flags = self.cells[cell_idx(x as i32, y, z as i32)];
                    if flags & STRENGTH_MASK == 0 {
                        continue;
                    }
                    let block = cuboid.block(x, y, z);
                    let overlay = atlas.overlay_tile(cuboid.damage(x, y, z));
                    let fx = (bx + x as i32) as f32;
                    let fy = (by + y as i32) as f32;
                    let fz = (bz + z as i32) as f32;
                    let wy = input.world_y(y);

                    let centre = self.height_of(x as i32, y, z as i32);
                    if !self.liquid_above(x as i32, y, z as i32) && centre > 0.0 {
                        self.emit_top(input, atlas, out, block, overlay, x, y, z, fx, fy, fz, wy);
                    }
                    if flags & FLAG_BOTTOM != 0 && side_open(Face::NegY, x, y, z) {
                        self.emit_wall(
                            input,
                            atlas,
                            out,
                            block,
                            overlay,
                            Face::NegY,
                            x,
                            y,
                            z,
                            fx,
                            fy,
                            fz,
                            wy,
                        );
                    }
                    for face in SIDE_FACES {
                        if flags & side_flag(face) != 0 && side_open(face, x, y, z) {
                            self.emit_wall(
                                input,
                                atlas,
                                out,
                                block,
                                overlay,
                                face,
                                x,
                                y,
                                z,
                                fx,
                                fy,
                                fz,
                                wy,
                            );
                        }
                    }
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_top(
        &self,
        input: &MeshInput,
        atlas: &dyn TextureAtlas,
        out: &mut VertexBuffer,
        block: BlockId,
        overlay: crate::atlas::TileUv,
        x: usize,
        y: usize,
        z: usize,
        fx: f32,
        fy: f32,
        fz: f32,
        wy: i32,
    ) {
        let h00 = self.corner_height(x, y, z, 0, 0);
        let h10 = self.corner_height(x, y, z, 1, 0);
        let h11 = self.corner_height(x, y, z, 1, 1);
        let h01 = self.corner_height(x, y, z, 0, 1);
        let corners = [
            Vec3::new(fx, fy + h00, fz),
            Vec3::new(fx + 1.0, fy + h10, fz),
            Vec3::new(fx + 1.0, fy + h11, fz + 1.0),
            Vec3::new(fx, fy + h01, fz + 1.0),
        ];
        let tile = atlas.block_tile(block, Face::PosY);
        let uvs = [
            tile.at(0.0, 0.0),
            tile.at(1.0, 0.0),
            tile.at(1.0, 1.0),
            tile.at(0.0, 1.0),
        ];
        let ovs = [
            overlay.at(0.0, 0.0),
            overlay.at(1.0, 0.0),
            overlay.at(1.0, 1.0),
            overlay.at(0.0, 1.0),
        ];
        let block_light = block_light_multiplier(input.light_at(x as i32, y as i32 + 1, z as i32));
        let sky = if input.sky_open(x as i32, z as i32, wy + 1) {
            1.0
        } else {
            0.0
        };
        out.push_quad(corners, Face::PosY.normal(), uvs, ovs, block_light, sky);
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_wall(
        &self,
        input: &MeshInput,
        atlas: &dyn TextureAtlas,
        out: &mut VertexBuffer,
        block: BlockId,
        overlay: crate::atlas::TileUv,
        face: Face,
        x: usize,
        y: usize,
        z: usize,
        fx: f32,
        fy: f32,
        fz: f32,
        wy: i32,
    ) {
        // Walls are full-height unit rectangles on the cell boundary.
        let corners = match face {
            Face::NegY => [
                Vec3::new(fx, fy, fz),
                Vec3::new(fx + 1.0, fy, fz),
                Vec3::new(fx + 1.0, fy, fz + 1.0),
                Vec3::new(fx, fy, fz + 1.0),
            ],
            Face::NegX => [
                Vec3::new(fx, fy, fz),
                Vec3::new(fx, fy + 1.0, fz),
                Vec3::new(fx, fy + 1.0, fz + 1.0),
                Vec3::new(fx, fy, fz + 1.0),
            ],
            Face::PosX => [
                Vec3::new(fx + 1.0, fy, fz),
                Vec3::new(fx + 1.0, fy + 1.0, fz),
                Vec3::new(fx + 1.0, fy + 1.0, fz + 1.0),
                Vec3::new(fx + 1.0, fy, fz + 1.0),
            ],
            Face::NegZ => [
                Vec3::new(fx, fy, fz),
                Vec3::new(fx, fy + 1.0, fz),
                Vec3::new(fx + 1.0, fy + 1.0, fz),
                Vec3::new(fx + 1.0, fy, fz),
            ],
            Face::PosZ => [
                Vec3::new(fx, fy, fz + 1.0),
                Vec3::new(fx, fy + 1.0, fz + 1.0),
                Vec3::new(fx + 1.0, fy + 1.0, fz + 1.0),
                Vec3::new(fx + 1.0, fy, fz + 1.0),
            ],
            Face::PosY => unreachable!("tops are emitted separately"),
        };
        let tile = atlas.block_tile(block, face);
        let uvs = [
            tile.at(0.0, 0.0),
            tile.at(0.0, 1.0),
            tile.at(1.0, 1.0),
            tile.at(1.0, 0.0),
        ];
        let ovs = [
            overlay.at(0.0, 0.0),
            overlay.at(0.0, 1.0),
            overlay.at(1.0, 1.0),
            overlay.at(1.0, 0.0),
        ];
        let (dx, dy, dz) = face.delta();
        let block_light =
            block_light_multiplier(input.light_at(x as i32 + dx, y as i32 + dy, z as i32 + dz));
        let sky = if input.sky_open(x as i32 + dx, z as i32 + dz, wy + dy) {
            0.5
        } else {
            0.0
        };
        out.push_quad(corners, face.normal(), uvs, ovs, block_light, sky);
    }

    /// Height a single cell would report, for tests.
    #[cfg(test)]
    pub(crate) fn probe_height(&self, x: i32, y: usize, z: i32) -> f32 {
        self.height_of(x, y, z)
    }
}

/// Block-light multiplier shared by all mesh categories.
#[inline]
pub fn block_light_multiplier(light: u8) -> f32 {
    0.1 + f32::from(light) / f32::from(skarn_cuboid::MAX_LIGHT)
}

impl FaceWriter for LiquidSurfaceBuilder<'_> {
    fn include(&self, block: BlockId) -> bool {
        self.reg.is_liquid(block)
    }

    fn write_face(&mut self, x: usize, y: usize, z: usize, face: Face, block: BlockId) {
        self.note_liquid(x, y, z, block);
        let i = cell_idx(x as i32, y, z as i32);
        match face {
            // Top visibility is re-derived from liquid-above at emission.
            Face::PosY => {}
            Face::NegY => self.cells[i] |= FLAG_BOTTOM,
            side => self.cells[i] |= side_flag(side),
        }
    }

    fn edge_value(&mut self, x: i32, y: i32, z: i32, block: BlockId) {
        let Some(flow) = self.reg.flow(block) else {
            return;
        };
        if y == E_I {
            // Liquid one layer above the cuboid top.
            if (0..E_I).contains(&x) && (0..E_I).contains(&z) {
                self.above.set(z as usize * E + x as usize);
            }
        } else if (0..E_I).contains(&y) {
            let i = cell_idx(x, y as usize, z);
            self.cells[i] = (self.cells[i] & !STRENGTH_MASK) | flow.code();
        }
        // y == -1: the cuboid below cannot affect our surface heights.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skarn_blocks::BlockType;

    fn reg() -> BlockRegistry {
        BlockRegistry::from_types(vec![
            BlockType::liquid("water_weak", FlowStrength::Weak),
            BlockType::liquid("water_strong", FlowStrength::Strong),
            BlockType::liquid("water_source", FlowStrength::Source),
        ])
        .unwrap()
    }

    #[test]
    fn height_ordering_follows_strength() {
        let reg = reg();
        let mut b = LiquidSurfaceBuilder::new(&reg);
        b.note_liquid(0, 0, 0, reg.id_by_name("water_weak").unwrap());
        b.note_liquid(1, 0, 0, reg.id_by_name("water_strong").unwrap());
        b.note_liquid(2, 0, 0, reg.id_by_name("water_source").unwrap());
        let weak = b.probe_height(0, 0, 0);
        let strong = b.probe_height(1, 0, 0);
        let source = b.probe_height(2, 0, 0);
        assert!(source > strong && strong > weak && weak > 0.0);
        assert_eq!(b.probe_height(3, 0, 0), 0.0);
    }

    #[test]
    fn liquid_above_forces_full_height() {
        let reg = reg();
        let weak = reg.id_by_name("water_weak").unwrap();
        let mut b = LiquidSurfaceBuilder::new(&reg);
        b.note_liquid(5, 3, 5, weak);
        b.note_liquid(5, 4, 5, weak);
        assert_eq!(b.probe_height(5, 3, 5), 1.0);
        assert_eq!(b.probe_height(5, 4, 5), FlowStrength::Weak.surface_height());
    }

    #[test]
    fn seam_edge_values_feed_ring_and_above() {
        let reg = reg();
        let source = reg.id_by_name("water_source").unwrap();
        let mut b = LiquidSurfaceBuilder::new(&reg);
        b.edge_value(-1, 7, 4, source);
        assert_eq!(b.probe_height(-1, 7, 4), FlowStrength::Source.surface_height());
        // Liquid above the top layer forces full height below.
        b.note_liquid(2, 31, 2, source);
        b.edge_value(2, 32, 2, source);
        assert_eq!(b.probe_height(2, 31, 2), 1.0);
    }
}
