//! Cuboid mesh manager: foreground bake state, the single background
//! worker, and the bounded scratch-buffer pool.
//!
//! Ownership is split hard: the foreground owns every record and every
//! GPU-side handle; the worker only ever touches the immutable input
//! bundle and the scratch buffer it was lent. The two sides meet at a
//! request channel (blocking receive on the worker) and a response
//! channel (non-blocking drain on the foreground), so the render loop
//! never waits on a bake.
#![forbid(unsafe_code)]

mod device;

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, unbounded};
use hashbrown::HashMap;
use skarn_blocks::BlockRegistry;
use skarn_blocks::types::AIR;
use skarn_cuboid::{BlockAddress, CUBOID_EDGE, ColumnHeightMap, Cuboid, CuboidAddress};
use skarn_geom::Aabb;
use skarn_mesh_cpu::{
    BakeTiming, MeshInput, MeshParts, TextureAtlas, VertexBuffer, bake_cuboid, cuboid_bounds,
};

pub use device::{BufferHandle, MeshDevice};

/// Scratch buffer sets available for in-flight bakes. Bounds memory and
/// doubles as backpressure: with none free, dirtied cuboids simply stay
/// pending until a later frame returns a buffer.
pub const SCRATCH_POOL_SIZE: usize = 2;

/// Uploaded buffers for one cuboid. Null entries are valid and skipped
/// when drawing.
#[derive(Clone, Debug, Default)]
pub struct MeshSet {
    pub bounds: Aabb,
    pub opaque: Option<BufferHandle>,
    pub transparent: Option<BufferHandle>,
    pub liquid: Option<BufferHandle>,
    pub models: Option<BufferHandle>,
    pub debris: Option<BufferHandle>,
}

impl MeshSet {
    fn take_handles(&mut self) -> impl Iterator<Item = BufferHandle> {
        [
            self.opaque.take(),
            self.transparent.take(),
            self.liquid.take(),
            self.models.take(),
            self.debris.take(),
        ]
        .into_iter()
        .flatten()
    }
}

struct Record {
    cuboid: Arc<Cuboid>,
    height: Arc<ColumnHeightMap>,
    pending: bool,
    meshes: MeshSet,
}

struct BakeRequest {
    address: CuboidAddress,
    input: MeshInput,
    parts: MeshParts,
}

struct BakeResponse {
    address: CuboidAddress,
    parts: MeshParts,
    timing: BakeTiming,
}

enum WorkerMsg {
    Bake(BakeRequest),
    /// Wakes a blocked worker so it re-checks the stop flag.
    Wake,
}

pub struct MeshManager {
    records: HashMap<CuboidAddress, Record>,
    /// Enqueue order for pending cuboids; entries may be stale (pending
    /// flag cleared or cuboid removed) and are skipped on pop.
    pending_fifo: VecDeque<CuboidAddress>,
    scratch: Vec<MeshParts>,
    req_tx: Sender<WorkerMsg>,
    res_rx: Receiver<BakeResponse>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl MeshManager {
    /// Spawns the bake worker. `reg` and `atlas` are the injected
    /// read-only environment shared with the worker.
    pub fn new(reg: Arc<BlockRegistry>, atlas: Arc<dyn TextureAtlas>) -> Self {
        let (req_tx, req_rx) = unbounded::<WorkerMsg>();
        let (res_tx, res_rx) = unbounded::<BakeResponse>();
        let stop = Arc::new(AtomicBool::new(false));
        let worker = {
            let stop = stop.clone();
            thread::Builder::new()
                .name("skarn-bake".into())
                .spawn(move || {
                    while let Ok(msg) = req_rx.recv() {
                        // Checked on every wake; on shutdown the rest of
                        // the queue is discarded, not drained.
                        if stop.load(Ordering::Acquire) {
                            break;
                        }
                        let WorkerMsg::Bake(mut req) = msg else {
                            continue;
                        };
                        let timing = bake_cuboid(&reg, atlas.as_ref(), &req.input, &mut req.parts);
                        if res_tx
                            .send(BakeResponse {
                                address: req.address,
                                parts: req.parts,
                                timing,
                            })
                            .is_err()
                        {
                            break;
                        }
                    }
                })
                .expect("spawn bake worker")
        };
        Self {
            records: HashMap::new(),
            pending_fifo: VecDeque::new(),
            scratch: (0..SCRATCH_POOL_SIZE).map(|_| MeshParts::new()).collect(),
            req_tx,
            res_rx,
            stop,
            worker: Some(worker),
        }
    }

    /// Replaces (or first-loads) a cuboid snapshot and marks it pending.
    ///
    /// `changed == None` means first load: all six face neighbors are
    /// unconditionally dirtied, since their view of this seam flipped
    /// from absent to present. Otherwise only neighbors across a changed
    /// boundary block whose light or type actually differs from the
    /// previous snapshot are dirtied. With no previous snapshot the
    /// comparison degrades to dark air rather than failing.
    pub fn set_cuboid(
        &mut self,
        cuboid: Arc<Cuboid>,
        height: Arc<ColumnHeightMap>,
        changed: Option<&[BlockAddress]>,
    ) {
        let addr = cuboid.address();
        let prev = self.records.get(&addr).map(|r| r.cuboid.clone());
        match changed {
            None => {
                for (dx, dy, dz) in FACE_OFFSETS {
                    self.mark_pending(addr.offset(dx, dy, dz));
                }
            }
            Some(list) => {
                for &b in list {
                    if !b.on_boundary() {
                        continue;
                    }
                    let differs = match prev.as_deref() {
                        Some(p) => {
                            p.block_at(b) != cuboid.block_at(b)
                                || p.light_at(b) != cuboid.light_at(b)
                        }
                        None => cuboid.block_at(b) != AIR || cuboid.light_at(b) != 0,
                    };
                    if !differs {
                        continue;
                    }
                    let edge = (CUBOID_EDGE - 1) as u8;
                    for (coord, lo, hi) in [
                        (b.x, (-1, 0, 0), (1, 0, 0)),
                        (b.y, (0, -1, 0), (0, 1, 0)),
                        (b.z, (0, 0, -1), (0, 0, 1)),
                    ] {
                        if coord == 0 {
                            self.mark_pending(addr.offset(lo.0, lo.1, lo.2));
                        } else if coord == edge {
                            self.mark_pending(addr.offset(hi.0, hi.1, hi.2));
                        }
                    }
                }
            }
        }
        match self.records.entry(addr) {
            hashbrown::hash_map::Entry::Occupied(mut e) => {
                let rec = e.get_mut();
                rec.cuboid = cuboid;
                rec.height = height;
            }
            hashbrown::hash_map::Entry::Vacant(e) => {
                e.insert(Record {
                    cuboid,
                    height,
                    pending: false,
                    meshes: MeshSet {
                        bounds: cuboid_bounds(addr),
                        ..MeshSet::default()
                    },
                });
            }
        }
        self.mark_pending(addr);
    }

    /// Releases the cuboid's uploaded buffers. The cuboid must be known;
    /// removing an unknown address is a caller bug.
    pub fn remove_cuboid(&mut self, address: CuboidAddress, device: &mut dyn MeshDevice) {
        let mut rec = self.records.remove(&address).unwrap_or_else(|| {
            panic!(
                "remove_cuboid: unknown cuboid ({}, {}, {})",
                address.x, address.y, address.z
            )
        });
        for h in rec.meshes.take_handles() {
            device.delete(h);
        }
    }

    /// The single foreground/background synchronization point, called
    /// once per frame. Drains every finished bake (upload new buffers,
    /// then delete the replaced ones, so the cuboid never renders as
    /// nothing in between), returns scratch to the pool, and enqueues as
    /// many pending bakes as there are free scratch buffers.
    pub fn process_background(&mut self, device: &mut dyn MeshDevice) {
        let responses: Vec<BakeResponse> = self.res_rx.try_iter().collect();
        for resp in responses {
            let mut parts = resp.parts;
            if let Some(rec) = self.records.get_mut(&resp.address) {
                let new_set = MeshSet {
                    bounds: cuboid_bounds(resp.address),
                    opaque: upload_part(device, &parts.opaque),
                    transparent: upload_part(device, &parts.transparent),
                    liquid: upload_part(device, &parts.liquid),
                    models: upload_part(device, &parts.models),
                    debris: upload_part(device, &parts.debris),
                };
                let mut old = std::mem::replace(&mut rec.meshes, new_set);
                for h in old.take_handles() {
                    device.delete(h);
                }
                log::debug!(
                    target: "perf",
                    "ms={} bake_uploaded address=({}, {}, {})",
                    resp.timing.total_ms,
                    resp.address.x,
                    resp.address.y,
                    resp.address.z,
                );
            } else {
                // Removed while baking; coarse cancellation just drops it.
                log::debug!(
                    "discarding stale bake for removed cuboid ({}, {}, {})",
                    resp.address.x,
                    resp.address.y,
                    resp.address.z,
                );
            }
            parts.clear_keep_capacity();
            self.scratch.push(parts);
        }

        while !self.scratch.is_empty() {
            let Some(addr) = self.pop_pending() else {
                break;
            };
            let input = self.package_input(addr);
            // Cleared at enqueue time, not completion, so a later change
            // re-marks the cuboid and queues a follow-up bake.
            if let Some(rec) = self.records.get_mut(&addr) {
                rec.pending = false;
            }
            let parts = self.scratch.pop().expect("checked non-empty");
            let _ = self.req_tx.send(WorkerMsg::Bake(BakeRequest {
                address: addr,
                input,
                parts,
            }));
        }
    }

    /// Currently baked mesh sets, for the renderer to draw.
    pub fn mesh_sets(&self) -> impl Iterator<Item = (CuboidAddress, &MeshSet)> {
        self.records.iter().map(|(addr, rec)| (*addr, &rec.meshes))
    }

    #[inline]
    pub fn mesh_set(&self, address: CuboidAddress) -> Option<&MeshSet> {
        self.records.get(&address).map(|r| &r.meshes)
    }

    #[inline]
    pub fn is_pending(&self, address: CuboidAddress) -> bool {
        self.records
            .get(&address)
            .map(|r| r.pending)
            .unwrap_or(false)
    }

    /// (pending cuboids, free scratch buffers, known cuboids).
    pub fn debug_counts(&self) -> (usize, usize, usize) {
        let pending = self.records.values().filter(|r| r.pending).count();
        (pending, self.scratch.len(), self.records.len())
    }

    /// Signals the worker, joins it, and releases every remaining
    /// uploaded buffer. In-flight bakes are discarded, not drained.
    pub fn shutdown(mut self, device: &mut dyn MeshDevice) {
        self.stop.store(true, Ordering::Release);
        let _ = self.req_tx.send(WorkerMsg::Wake);
        if let Some(h) = self.worker.take() {
            let _ = h.join();
        }
        for (_, mut rec) in self.records.drain() {
            for h in rec.meshes.take_handles() {
                device.delete(h);
            }
        }
    }

    fn mark_pending(&mut self, address: CuboidAddress) {
        if let Some(rec) = self.records.get_mut(&address) {
            if !rec.pending {
                rec.pending = true;
                self.pending_fifo.push_back(address);
            }
        }
        // Unknown neighbors are simply not ours to bake yet.
    }

    fn pop_pending(&mut self) -> Option<CuboidAddress> {
        while let Some(addr) = self.pending_fifo.pop_front() {
            if self.records.get(&addr).map(|r| r.pending).unwrap_or(false) {
                return Some(addr);
            }
        }
        None
    }

    /// Packages the immutable bundle the worker reads: the cuboid, its
    /// column height map, the full 3x3x3 cuboid neighborhood (face
    /// neighbors feed seam culling; the rest feed complex-model lookups),
    /// and the 3x3 neighbor column height maps.
    fn package_input(&self, address: CuboidAddress) -> MeshInput {
        let rec = &self.records[&address];
        let mut input = MeshInput::new(rec.cuboid.clone(), rec.height.clone());
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    if (dx, dy, dz) == (0, 0, 0) {
                        continue;
                    }
                    if let Some(nb) = self.records.get(&address.offset(dx, dy, dz)) {
                        input = input.with_neighbor(dx, dy, dz, nb.cuboid.clone());
                    }
                }
            }
        }
        for dx in -1..=1 {
            for dz in -1..=1 {
                if (dx, dz) == (0, 0) {
                    continue;
                }
                if let Some(nb) = self.records.get(&address.offset(dx, 0, dz)) {
                    input = input.with_column_height(dx, dz, nb.height.clone());
                }
            }
        }
        input
    }
}

impl Drop for MeshManager {
    fn drop(&mut self) {
        if let Some(h) = self.worker.take() {
            self.stop.store(true, Ordering::Release);
            let _ = self.req_tx.send(WorkerMsg::Wake);
            let _ = h.join();
            if !self.records.is_empty() {
                log::warn!(
                    "mesh manager dropped without shutdown; {} cuboids keep device buffers alive",
                    self.records.len()
                );
            }
        }
    }
}

#[inline]
fn upload_part(device: &mut dyn MeshDevice, buf: &VertexBuffer) -> Option<BufferHandle> {
    if buf.is_empty() {
        None
    } else {
        Some(device.upload(buf.data()))
    }
}

const FACE_OFFSETS: [(i32, i32, i32); 6] = [
    (1, 0, 0),
    (-1, 0, 0),
    (0, 1, 0),
    (0, -1, 0),
    (0, 0, 1),
    (0, 0, -1),
];
