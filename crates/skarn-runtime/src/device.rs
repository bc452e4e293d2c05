//! The injected rendering-device boundary. The manager owns buffer
//! lifetime; the device only uploads and deletes.

/// Opaque handle to one uploaded vertex buffer.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct BufferHandle(pub u64);

/// Minimal surface the meshing core needs from a rendering API. All calls
/// happen on the foreground thread.
pub trait MeshDevice {
    /// Uploads interleaved vertex data (see `skarn_mesh_cpu::VERTEX_LAYOUT`
    /// for the attribute order and stride) and returns a handle.
    fn upload(&mut self, vertices: &[f32]) -> BufferHandle;

    /// Releases a previously uploaded buffer.
    fn delete(&mut self, handle: BufferHandle);
}
