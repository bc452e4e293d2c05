use skarn_geom::Vec3;

/// One named vertex attribute and its width in f32 lanes. The renderer
/// derives its binding stride from this table; the meshing core is
/// agnostic to the concrete graphics API.
#[derive(Copy, Clone, Debug)]
pub struct Attribute {
    pub name: &'static str,
    pub floats: usize,
}

/// Interleaved layout of every vertex this crate produces: position,
/// normal, primary texture coordinates, overlay texture coordinates, and
/// the two per-vertex light multipliers (block light, sky light).
pub const VERTEX_LAYOUT: [Attribute; 6] = [
    Attribute {
        name: "position",
        floats: 3,
    },
    Attribute {
        name: "normal",
        floats: 3,
    },
    Attribute {
        name: "uv",
        floats: 2,
    },
    Attribute {
        name: "overlay_uv",
        floats: 2,
    },
    Attribute {
        name: "block_light",
        floats: 1,
    },
    Attribute {
        name: "sky_light",
        floats: 1,
    },
];

/// Floats per vertex (layout stride).
pub const VERTEX_FLOATS: usize = 12;

/// Non-indexed triangle-soup vertex data. Quads expand to two triangles,
/// six vertices, matching the renderer's draw path.
#[derive(Default, Clone)]
pub struct VertexBuffer {
    data: Vec<f32>,
}

impl VertexBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.data.len() / VERTEX_FLOATS
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Clears contents but keeps capacity; scratch buffers rely on this
    /// to stay allocation-free across bakes.
    #[inline]
    pub fn clear_keep_capacity(&mut self) {
        self.data.clear();
    }

    #[inline]
    fn push_vertex(
        &mut self,
        p: Vec3,
        n: Vec3,
        uv: [f32; 2],
        overlay: [f32; 2],
        block_light: f32,
        sky_light: f32,
    ) {
        self.data.extend_from_slice(&[
            p.x,
            p.y,
            p.z,
            n.x,
            n.y,
            n.z,
            uv[0],
            uv[1],
            overlay[0],
            overlay[1],
            block_light,
            sky_light,
        ]);
    }

    /// Appends a quad as two triangles. Corners are a perimeter walk;
    /// winding is corrected against the normal so callers may list the
    /// perimeter in either direction.
    pub fn push_quad(
        &mut self,
        corners: [Vec3; 4],
        n: Vec3,
        mut uvs: [[f32; 2]; 4],
        mut overlays: [[f32; 2]; 4],
        block_light: f32,
        sky_light: f32,
    ) {
        let mut vs = corners;
        let e1 = vs[1] - vs[0];
        let e2 = vs[2] - vs[0];
        if e1.cross(e2).dot(n) < 0.0 {
            vs.swap(1, 3);
            uvs.swap(1, 3);
            overlays.swap(1, 3);
        }
        for &i in &[0usize, 1, 2, 0, 2, 3] {
            self.push_vertex(vs[i], n, uvs[i], overlays[i], block_light, sky_light);
        }
    }
}
