//! Drives one bake: face masks per category, the liquid surface pass,
//! complex block models, and item debris, each into its own vertex buffer.

use std::time::Instant;

use skarn_blocks::{BlockId, BlockRegistry};
use skarn_cuboid::{CUBOID_EDGE_I, CuboidAddress};
use skarn_geom::{Aabb, Vec3};

use crate::atlas::{TextureAtlas, TileUv};
use crate::face::{ALL_FACES, Face};
use crate::input::MeshInput;
use crate::liquid::{LiquidSurfaceBuilder, block_light_multiplier};
use crate::masks::{FaceMasks, FaceWriter};
use crate::vertex::VertexBuffer;

/// Edge of one debris cube in block fractions.
const DEBRIS_EDGE: f32 = 0.25;
/// Debris cubes per row before wrapping to the next grid slot.
const DEBRIS_GRID: usize = 2;

/// The five independent buffers one bake produces. Reused as scratch
/// across bakes; `clear_keep_capacity` keeps the hot path allocation-free.
#[derive(Default, Clone)]
pub struct MeshParts {
    pub opaque: VertexBuffer,
    pub transparent: VertexBuffer,
    pub liquid: VertexBuffer,
    pub models: VertexBuffer,
    pub debris: VertexBuffer,
}

impl MeshParts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear_keep_capacity(&mut self) {
        self.opaque.clear_keep_capacity();
        self.transparent.clear_keep_capacity();
        self.liquid.clear_keep_capacity();
        self.models.clear_keep_capacity();
        self.debris.clear_keep_capacity();
    }

    pub fn is_empty(&self) -> bool {
        self.opaque.is_empty()
            && self.transparent.is_empty()
            && self.liquid.is_empty()
            && self.models.is_empty()
            && self.debris.is_empty()
    }
}

/// Wall-clock costs of one bake, reported with the result.
#[derive(Copy, Clone, Debug, Default)]
pub struct BakeTiming {
    pub solids_ms: u32,
    pub liquid_ms: u32,
    pub extras_ms: u32,
    pub total_ms: u32,
}

#[inline]
fn elapsed_ms(start: Instant) -> u32 {
    start.elapsed().as_millis().min(u128::from(u32::MAX)) as u32
}

/// World-space bounds of a cuboid's mesh.
pub fn cuboid_bounds(address: CuboidAddress) -> Aabb {
    let (bx, by, bz) = address.base();
    Aabb::new(
        Vec3::new(bx as f32, by as f32, bz as f32),
        Vec3::new(
            (bx + CUBOID_EDGE_I) as f32,
            (by + CUBOID_EDGE_I) as f32,
            (bz + CUBOID_EDGE_I) as f32,
        ),
    )
}

#[derive(Copy, Clone, Eq, PartialEq)]
enum CubeKind {
    Opaque,
    Transparent,
}

impl CubeKind {
    #[inline]
    fn matches(self, reg: &BlockRegistry, block: BlockId) -> bool {
        match self {
            CubeKind::Opaque => reg.is_opaque_cube(block),
            CubeKind::Transparent => reg.is_transparent_cube(block),
        }
    }
}

/// Rotates fractional UV coordinates by quarter turns (orientation aspect).
#[inline]
fn rotate_frac(fu: f32, fv: f32, turns: u8) -> (f32, f32) {
    match turns & 3 {
        0 => (fu, fv),
        1 => (fv, 1.0 - fu),
        2 => (1.0 - fu, 1.0 - fv),
        _ => (1.0 - fv, fu),
    }
}

/// Perimeter corners of a unit block face; winding is normalized later.
#[inline]
fn unit_face_corners(face: Face, fx: f32, fy: f32, fz: f32) -> [Vec3; 4] {
    match face {
        Face::PosY => [
            Vec3::new(fx, fy + 1.0, fz),
            Vec3::new(fx + 1.0, fy + 1.0, fz),
            Vec3::new(fx + 1.0, fy + 1.0, fz + 1.0),
            Vec3::new(fx, fy + 1.0, fz + 1.0),
        ],
        Face::NegY => [
            Vec3::new(fx, fy, fz),
            Vec3::new(fx + 1.0, fy, fz),
            Vec3::new(fx + 1.0, fy, fz + 1.0),
            Vec3::new(fx, fy, fz + 1.0),
        ],
        Face::PosX => [
            Vec3::new(fx + 1.0, fy, fz),
            Vec3::new(fx + 1.0, fy + 1.0, fz),
            Vec3::new(fx + 1.0, fy + 1.0, fz + 1.0),
            Vec3::new(fx + 1.0, fy, fz + 1.0),
        ],
        Face::NegX => [
            Vec3::new(fx, fy, fz),
            Vec3::new(fx, fy + 1.0, fz),
            Vec3::new(fx, fy + 1.0, fz + 1.0),
            Vec3::new(fx, fy, fz + 1.0),
        ],
        Face::PosZ => [
            Vec3::new(fx, fy, fz + 1.0),
            Vec3::new(fx, fy + 1.0, fz + 1.0),
            Vec3::new(fx + 1.0, fy + 1.0, fz + 1.0),
            Vec3::new(fx + 1.0, fy, fz + 1.0),
        ],
        Face::NegZ => [
            Vec3::new(fx, fy, fz),
            Vec3::new(fx, fy + 1.0, fz),
            Vec3::new(fx + 1.0, fy + 1.0, fz),
            Vec3::new(fx + 1.0, fy, fz),
        ],
    }
}

/// Fractional UV coordinates of a point on a face of the `[min, max]` box.
#[inline]
fn face_uv_frac(face: Face, p: Vec3, min: Vec3, max: Vec3) -> (f32, f32) {
    #[inline]
    fn frac(v: f32, lo: f32, hi: f32) -> f32 {
        if hi > lo { (v - lo) / (hi - lo) } else { 0.0 }
    }
    match face {
        Face::PosY | Face::NegY => (frac(p.x, min.x, max.x), frac(p.z, min.z, max.z)),
        Face::PosX | Face::NegX => (frac(p.z, min.z, max.z), frac(p.y, min.y, max.y)),
        Face::PosZ | Face::NegZ => (frac(p.x, min.x, max.x), frac(p.y, min.y, max.y)),
    }
}

/// Emits up to six faces of an axis-aligned box, with per-face material,
/// light, and sky choices.
fn emit_box(
    out: &mut VertexBuffer,
    min: Vec3,
    max: Vec3,
    tile_for: &dyn Fn(Face) -> TileUv,
    overlay: TileUv,
    block_light: f32,
    sky_for: &dyn Fn(Face) -> f32,
) {
    for face in ALL_FACES {
        let corners = match face {
            Face::PosY => [
                Vec3::new(min.x, max.y, min.z),
                Vec3::new(max.x, max.y, min.z),
                Vec3::new(max.x, max.y, max.z),
                Vec3::new(min.x, max.y, max.z),
            ],
            Face::NegY => [
                Vec3::new(min.x, min.y, min.z),
                Vec3::new(max.x, min.y, min.z),
                Vec3::new(max.x, min.y, max.z),
                Vec3::new(min.x, min.y, max.z),
            ],
            Face::PosX => [
                Vec3::new(max.x, min.y, min.z),
                Vec3::new(max.x, max.y, min.z),
                Vec3::new(max.x, max.y, max.z),
                Vec3::new(max.x, min.y, max.z),
            ],
            Face::NegX => [
                Vec3::new(min.x, min.y, min.z),
                Vec3::new(min.x, max.y, min.z),
                Vec3::new(min.x, max.y, max.z),
                Vec3::new(min.x, min.y, max.z),
            ],
            Face::PosZ => [
                Vec3::new(min.x, min.y, max.z),
                Vec3::new(min.x, max.y, max.z),
                Vec3::new(max.x, max.y, max.z),
                Vec3::new(max.x, min.y, max.z),
            ],
            Face::NegZ => [
                Vec3::new(min.x, min.y, min.z),
                Vec3::new(min.x, max.y, min.z),
                Vec3::new(max.x, max.y, min.z),
                Vec3::new(max.x, min.y, min.z),
            ],
        };
        let tile = tile_for(face);
        let mut uvs = [[0.0f32; 2]; 4];
        let mut ovs = [[0.0f32; 2]; 4];
        for (i, c) in corners.iter().enumerate() {
            let (fu, fv) = face_uv_frac(face, *c, min, max);
            uvs[i] = tile.at(fu, fv);
            ovs[i] = overlay.at(fu, fv);
        }
        out.push_quad(
            corners,
            face.normal(),
            uvs,
            ovs,
            block_light,
            sky_for(face),
        );
    }
}

/// Emits one textured quad per visible cube face reported by the masks.
struct CubeWriter<'a> {
    reg: &'a BlockRegistry,
    atlas: &'a dyn TextureAtlas,
    input: &'a MeshInput,
    out: &'a mut VertexBuffer,
    kind: CubeKind,
}

impl FaceWriter for CubeWriter<'_> {
    fn include(&self, block: BlockId) -> bool {
        self.kind.matches(self.reg, block)
    }

    fn write_face(&mut self, x: usize, y: usize, z: usize, face: Face, block: BlockId) {
        let cuboid = self.input.center();
        let (bx, by, bz) = cuboid.address().base();
        let (fx, fy, fz) = (
            (bx + x as i32) as f32,
            (by + y as i32) as f32,
            (bz + z as i32) as f32,
        );
        let corners = unit_face_corners(face, fx, fy, fz);

        let tile = self.atlas.block_tile(block, face);
        let overlay = self.atlas.overlay_tile(cuboid.damage(x, y, z));
        // Side textures of orientable blocks follow the orientation aspect.
        let turns = match face {
            Face::PosY | Face::NegY => 0,
            _ => {
                if self.reg.get(block).map(|ty| ty.orientable).unwrap_or(false) {
                    cuboid.orientation(x, y, z)
                } else {
                    0
                }
            }
        };
        let min = Vec3::new(fx, fy, fz);
        let max = Vec3::new(fx + 1.0, fy + 1.0, fz + 1.0);
        let mut uvs = [[0.0f32; 2]; 4];
        let mut ovs = [[0.0f32; 2]; 4];
        for (i, c) in corners.iter().enumerate() {
            let (fu, fv) = face_uv_frac(face, *c, min, max);
            let (ru, rv) = rotate_frac(fu, fv, turns);
            uvs[i] = tile.at(ru, rv);
            ovs[i] = overlay.at(fu, fv);
        }

        // Light comes from the cell the face looks into.
        let (dx, dy, dz) = face.delta();
        let (nx, ny, nz) = (x as i32 + dx, y as i32 + dy, z as i32 + dz);
        let block_light = block_light_multiplier(self.input.light_at(nx, ny, nz));
        let open = self.input.sky_open(nx, nz, self.input.world_y(y) + dy);
        let sky = match face {
            Face::PosY if open => 1.0,
            _ if open => 0.5,
            _ => 0.0,
        };
        self.out
            .push_quad(corners, face.normal(), uvs, ovs, block_light, sky);
    }
}

fn mesh_cubes(
    reg: &BlockRegistry,
    atlas: &dyn TextureAtlas,
    input: &MeshInput,
    masks: &mut FaceMasks,
    kind: CubeKind,
    out: &mut VertexBuffer,
) {
    let include = |b: BlockId| kind.matches(reg, b);
    masks.populate(input.center(), &include);
    for face in ALL_FACES {
        if let Some(nb) = input.face_neighbor(face) {
            masks.pre_seed(face, nb, &include, None);
        }
    }
    let mut writer = CubeWriter {
        reg,
        atlas,
        input,
        out,
        kind,
    };
    masks.build_faces(input.center(), &mut writer);
}

fn mesh_liquid(
    reg: &BlockRegistry,
    atlas: &dyn TextureAtlas,
    input: &MeshInput,
    masks: &mut FaceMasks,
    out: &mut VertexBuffer,
) {
    let cuboid = input.center();
    let mut liq = LiquidSurfaceBuilder::new(reg);
    // Record every liquid cell up front; fully-enclosed cells have no
    // visible faces but still pull corner heights up.
    cuboid.for_each_block(|addr, b| {
        if reg.is_liquid(b) {
            liq.note_liquid(addr.x as usize, addr.y as usize, addr.z as usize, b);
        }
    });
    let include = |b: BlockId| reg.is_liquid(b);
    masks.populate(cuboid, &include);
    for face in ALL_FACES {
        if let Some(nb) = input.face_neighbor(face) {
            masks.pre_seed(face, nb, &include, Some(&mut liq));
        }
    }
    masks.build_faces(cuboid, &mut liq);
    // Walls against fully opaque blocks are invisible; skip them here
    // rather than inside the builder (the top surface is never skipped).
    liq.write_vertices(input, atlas, out, &|face, x, y, z| {
        let (dx, dy, dz) = face.delta();
        !input.is_opaque(reg, x as i32 + dx, y as i32 + dy, z as i32 + dz)
    });
}

/// Max light over the six blocks adjacent to `(x,y,z)`. Complex models
/// have interior surfaces on all sides, so they borrow their brightest
/// neighbor instead of sampling per face.
fn adjacent_max_light(input: &MeshInput, x: usize, y: usize, z: usize) -> u8 {
    let mut best = 0u8;
    for face in ALL_FACES {
        let (dx, dy, dz) = face.delta();
        best = best.max(input.light_at(x as i32 + dx, y as i32 + dy, z as i32 + dz));
    }
    best
}

fn mesh_models_and_debris(
    reg: &BlockRegistry,
    atlas: &dyn TextureAtlas,
    input: &MeshInput,
    models: &mut VertexBuffer,
    debris: &mut VertexBuffer,
) {
    let cuboid = input.center();
    let (bx, by, bz) = cuboid.address().base();

    cuboid.for_each_block(|addr, block| {
        let Some(model) = reg.model(block) else {
            return;
        };
        let (x, y, z) = (addr.x as usize, addr.y as usize, addr.z as usize);
        let (fx, fy, fz) = (
            (bx + x as i32) as f32,
            (by + y as i32) as f32,
            (bz + z as i32) as f32,
        );
        let light = block_light_multiplier(adjacent_max_light(input, x, y, z));
        // Sky visibility one layer above the model's cell.
        let sky = if input.sky_open(x as i32, z as i32, input.world_y(y) + 1) {
            1.0
        } else {
            0.0
        };
        let overlay = atlas.overlay_tile(cuboid.damage(x, y, z));
        for mb in &model.boxes {
            let min = Vec3::new(fx + mb.min[0], fy + mb.min[1], fz + mb.min[2]);
            let max = Vec3::new(fx + mb.max[0], fy + mb.max[1], fz + mb.max[2]);
            emit_box(
                models,
                min,
                max,
                &|face| atlas.block_tile(block, face),
                overlay,
                light,
                &|_| sky,
            );
        }
    });

    cuboid.for_each_inventory(|addr, stacks| {
        let (x, y, z) = (addr.x as usize, addr.y as usize, addr.z as usize);
        let (fx, fy, fz) = (
            (bx + x as i32) as f32,
            (by + y as i32) as f32,
            (bz + z as i32) as f32,
        );
        let light = block_light_multiplier(cuboid.light(x, y, z));
        let wy = input.world_y(y);
        for (i, stack) in stacks.iter().enumerate() {
            let col = (i % DEBRIS_GRID) as f32;
            let row = ((i / DEBRIS_GRID) % DEBRIS_GRID) as f32;
            let inset = (1.0 / DEBRIS_GRID as f32 - DEBRIS_EDGE) / 2.0;
            let min = Vec3::new(
                fx + inset + col / DEBRIS_GRID as f32,
                fy,
                fz + inset + row / DEBRIS_GRID as f32,
            );
            let max = min + Vec3::new(DEBRIS_EDGE, DEBRIS_EDGE, DEBRIS_EDGE);
            let item = stack.item;
            emit_box(
                debris,
                min,
                max,
                &|_| atlas.item_tile(item),
                TileUv::BLANK,
                light,
                &|face| {
                    let open = input.sky_open(x as i32, z as i32, wy);
                    match face {
                        Face::PosY if open => 1.0,
                        _ if open => 0.5,
                        _ => 0.0,
                    }
                },
            );
        }
    });
}

/// Bakes one cuboid snapshot into `parts`. Pure CPU work; safe to run on
/// the background worker against an immutable `MeshInput`.
pub fn bake_cuboid(
    reg: &BlockRegistry,
    atlas: &dyn TextureAtlas,
    input: &MeshInput,
    parts: &mut MeshParts,
) -> BakeTiming {
    let t_total = Instant::now();
    parts.clear_keep_capacity();
    let mut masks = FaceMasks::new();

    let t_solids = Instant::now();
    mesh_cubes(reg, atlas, input, &mut masks, CubeKind::Opaque, &mut parts.opaque);
    mesh_cubes(
        reg,
        atlas,
        input,
        &mut masks,
        CubeKind::Transparent,
        &mut parts.transparent,
    );
    let solids_ms = elapsed_ms(t_solids);

    let t_liquid = Instant::now();
    mesh_liquid(reg, atlas, input, &mut masks, &mut parts.liquid);
    let liquid_ms = elapsed_ms(t_liquid);

    let t_extras = Instant::now();
    mesh_models_and_debris(reg, atlas, input, &mut parts.models, &mut parts.debris);
    let extras_ms = elapsed_ms(t_extras);

    let timing = BakeTiming {
        solids_ms,
        liquid_ms,
        extras_ms,
        total_ms: elapsed_ms(t_total),
    };
    let addr = input.center().address();
    log::debug!(
        target: "perf",
        "ms={} bake_cuboid address=({}, {}, {}) solids_ms={} liquid_ms={} extras_ms={} verts={}",
        timing.total_ms,
        addr.x,
        addr.y,
        addr.z,
        timing.solids_ms,
        timing.liquid_ms,
        timing.extras_ms,
        parts.opaque.vertex_count()
            + parts.transparent.vertex_count()
            + parts.liquid.vertex_count()
            + parts.models.vertex_count()
            + parts.debris.vertex_count(),
    );
    timing
}
