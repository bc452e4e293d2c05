use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use skarn_blocks::{BlockRegistry, BlockType, FlowStrength};
use skarn_cuboid::{BlockAddress, ColumnHeightMap, Cuboid, CuboidAddress};
use skarn_mesh_cpu::{UnitAtlas, VERTEX_FLOATS};
use skarn_runtime::{BufferHandle, MeshDevice, MeshManager, SCRATCH_POOL_SIZE};

#[derive(Debug, PartialEq)]
enum Event {
    Upload(u64, usize),
    Delete(u64),
}

#[derive(Default)]
struct RecordingDevice {
    next: u64,
    live: HashSet<u64>,
    events: Vec<Event>,
}

impl MeshDevice for RecordingDevice {
    fn upload(&mut self, vertices: &[f32]) -> BufferHandle {
        self.next += 1;
        self.live.insert(self.next);
        self.events
            .push(Event::Upload(self.next, vertices.len() / VERTEX_FLOATS));
        BufferHandle(self.next)
    }

    fn delete(&mut self, handle: BufferHandle) {
        assert!(self.live.remove(&handle.0), "double delete of {handle:?}");
        self.events.push(Event::Delete(handle.0));
    }
}

fn registry() -> Arc<BlockRegistry> {
    Arc::new(
        BlockRegistry::from_types(vec![
            BlockType::solid("stone"),
            BlockType::liquid("water_source", FlowStrength::Source),
        ])
        .unwrap(),
    )
}

fn manager(reg: &Arc<BlockRegistry>) -> MeshManager {
    let _ = env_logger::builder().is_test(true).try_init();
    MeshManager::new(reg.clone(), Arc::new(UnitAtlas))
}

fn snapshot(addr: CuboidAddress, blocks: &[(u8, u8, u8, &str)], reg: &BlockRegistry) -> Arc<Cuboid> {
    let mut c = Cuboid::empty(addr);
    for &(x, y, z, name) in blocks {
        c.set_block(BlockAddress::new(x, y, z), reg.id_by_name(name).unwrap());
    }
    Arc::new(c)
}

fn height_for(cuboid: &Cuboid, reg: &BlockRegistry) -> Arc<ColumnHeightMap> {
    Arc::new(ColumnHeightMap::from_cuboid(cuboid, reg))
}

/// Pumps `process_background` until `done` or a timeout; the worker is a
/// real thread, so tests poll the same way a render loop would.
fn pump(mgr: &mut MeshManager, dev: &mut RecordingDevice, done: impl Fn(&MeshManager) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        mgr.process_background(dev);
        if done(mgr) {
            return;
        }
        assert!(Instant::now() < deadline, "bake never completed");
        std::thread::sleep(Duration::from_millis(2));
    }
}

fn baked(mgr: &MeshManager, addr: CuboidAddress) -> bool {
    let (pending, free, _) = mgr.debug_counts();
    pending == 0 && free == SCRATCH_POOL_SIZE && mgr.mesh_set(addr).is_some()
}

#[test]
fn single_stone_block_uploads_one_opaque_buffer() {
    let reg = registry();
    let mut dev = RecordingDevice::default();
    let mut mgr = manager(&reg);
    let addr = CuboidAddress::new(0, 0, 0);
    let c = snapshot(addr, &[(5, 6, 7, "stone")], &reg);
    let h = height_for(&c, &reg);
    mgr.set_cuboid(c, h, None);
    pump(&mut mgr, &mut dev, |m| baked(m, addr));

    let set = mgr.mesh_set(addr).unwrap();
    assert!(set.opaque.is_some());
    assert!(set.transparent.is_none());
    assert!(set.liquid.is_none());
    assert!(set.models.is_none());
    assert!(set.debris.is_none());
    assert_eq!(dev.events, vec![Event::Upload(1, 36)]);
    mgr.shutdown(&mut dev);
    assert!(dev.live.is_empty());
}

#[test]
fn rebake_uploads_before_deleting_the_old_buffer() {
    let reg = registry();
    let mut dev = RecordingDevice::default();
    let mut mgr = manager(&reg);
    let addr = CuboidAddress::new(0, 0, 0);
    let c = snapshot(addr, &[(5, 6, 7, "stone")], &reg);
    let h = height_for(&c, &reg);
    mgr.set_cuboid(c, h.clone(), None);
    pump(&mut mgr, &mut dev, |m| baked(m, addr));
    let first = mgr.mesh_set(addr).unwrap().opaque.unwrap();

    let c2 = snapshot(addr, &[(5, 6, 7, "stone"), (9, 9, 9, "stone")], &reg);
    mgr.set_cuboid(c2, h, Some(&[BlockAddress::new(9, 9, 9)]));
    pump(&mut mgr, &mut dev, |m| {
        baked(m, addr) && m.mesh_set(addr).unwrap().opaque != Some(first)
    });

    let second = mgr.mesh_set(addr).unwrap().opaque.unwrap();
    assert_ne!(first, second);
    // The replacement is uploaded before the stale buffer is deleted.
    let upload_pos = dev
        .events
        .iter()
        .position(|e| matches!(e, Event::Upload(h, _) if *h == second.0))
        .unwrap();
    let delete_pos = dev
        .events
        .iter()
        .position(|e| matches!(e, Event::Delete(h) if *h == first.0))
        .unwrap();
    assert!(upload_pos < delete_pos);
    mgr.shutdown(&mut dev);
    assert!(dev.live.is_empty());
}

#[test]
fn first_load_marks_all_six_neighbors_pending() {
    let reg = registry();
    let mut dev = RecordingDevice::default();
    let mut mgr = manager(&reg);
    let center = CuboidAddress::new(0, 0, 0);

    // Load the six neighbors first and let them settle.
    for (dx, dy, dz) in [
        (1, 0, 0),
        (-1, 0, 0),
        (0, 1, 0),
        (0, -1, 0),
        (0, 0, 1),
        (0, 0, -1),
    ] {
        let addr = center.offset(dx, dy, dz);
        let c = snapshot(addr, &[], &reg);
        let h = height_for(&c, &reg);
        mgr.set_cuboid(c, h, None);
    }
    pump(&mut mgr, &mut dev, |m| m.debug_counts().0 == 0);

    let c = snapshot(center, &[], &reg);
    let h = height_for(&c, &reg);
    mgr.set_cuboid(c, h, None);
    let (pending, _, known) = mgr.debug_counts();
    assert_eq!(known, 7);
    // The new cuboid plus all six face neighbors.
    assert_eq!(pending, 7);
    mgr.shutdown(&mut dev);
}

#[test]
fn boundary_change_dirties_exactly_the_one_adjacent_cuboid() {
    let reg = registry();
    let mut dev = RecordingDevice::default();
    let mut mgr = manager(&reg);
    let lower = CuboidAddress::new(0, 0, 0);
    let upper = CuboidAddress::new(0, 1, 0);
    let west = CuboidAddress::new(-1, 0, 0);

    // Water in the upper cuboid resting on a stone floor below.
    let lo = snapshot(lower, &[(8, 31, 8, "stone")], &reg);
    let hi = snapshot(upper, &[(8, 0, 8, "water_source")], &reg);
    let we = snapshot(west, &[], &reg);
    let lo_h = height_for(&lo, &reg);
    mgr.set_cuboid(lo.clone(), lo_h, None);
    mgr.set_cuboid(hi.clone(), height_for(&hi, &reg), None);
    mgr.set_cuboid(we.clone(), height_for(&we, &reg), None);
    pump(&mut mgr, &mut dev, |m| m.debug_counts().0 == 0);

    // Remove the solid block under the water: a type change on the top
    // boundary face. Only the upper cuboid may be re-marked.
    let lo2 = snapshot(lower, &[], &reg);
    let lo2_h = height_for(&lo2, &reg);
    mgr.set_cuboid(lo2, lo2_h, Some(&[BlockAddress::new(8, 31, 8)]));
    assert!(mgr.is_pending(lower));
    assert!(mgr.is_pending(upper));
    assert!(!mgr.is_pending(west));

    // The re-bake must now expose the water's bottom wall: the liquid
    // buffer grows from 5 quads (top + four sides) to 6.
    pump(&mut mgr, &mut dev, |m| m.debug_counts().0 == 0);
    let liquid = mgr.mesh_set(upper).unwrap().liquid.unwrap();
    let verts = dev
        .events
        .iter()
        .find_map(|e| match e {
            Event::Upload(h, n) if *h == liquid.0 => Some(*n),
            _ => None,
        })
        .unwrap();
    assert_eq!(verts, 36);
    mgr.shutdown(&mut dev);
}

#[test]
fn unchanged_boundary_block_does_not_dirty_the_neighbor() {
    let reg = registry();
    let mut dev = RecordingDevice::default();
    let mut mgr = manager(&reg);
    let a = CuboidAddress::new(0, 0, 0);
    let b = CuboidAddress::new(1, 0, 0);

    let ca = snapshot(a, &[(31, 5, 5, "stone")], &reg);
    let cb = snapshot(b, &[], &reg);
    mgr.set_cuboid(ca.clone(), height_for(&ca, &reg), None);
    mgr.set_cuboid(cb.clone(), height_for(&cb, &reg), None);
    pump(&mut mgr, &mut dev, |m| m.debug_counts().0 == 0);

    // Same block value and light on the boundary: the neighbor's view is
    // unchanged, so only the edited cuboid re-bakes.
    let ca2 = snapshot(a, &[(31, 5, 5, "stone"), (2, 2, 2, "stone")], &reg);
    let h = height_for(&ca2, &reg);
    mgr.set_cuboid(
        ca2,
        h,
        Some(&[BlockAddress::new(31, 5, 5), BlockAddress::new(2, 2, 2)]),
    );
    assert!(mgr.is_pending(a));
    assert!(!mgr.is_pending(b));
    mgr.shutdown(&mut dev);
}

#[test]
fn scratch_pool_bounds_in_flight_bakes() {
    let reg = registry();
    let mut dev = RecordingDevice::default();
    let mut mgr = manager(&reg);
    for i in 0..3 {
        let addr = CuboidAddress::new(i, 0, 0);
        let c = snapshot(addr, &[(1, 1, 1, "stone")], &reg);
        let h = height_for(&c, &reg);
        mgr.set_cuboid(c, h, None);
    }
    let (pending, free, known) = mgr.debug_counts();
    assert_eq!((pending, free, known), (3, SCRATCH_POOL_SIZE, 3));

    // One frame may enqueue at most SCRATCH_POOL_SIZE bakes; the third
    // cuboid stays pending until a buffer comes back.
    mgr.process_background(&mut dev);
    let (pending, free, _) = mgr.debug_counts();
    assert_eq!(free, 0);
    assert_eq!(pending, 3 - SCRATCH_POOL_SIZE);

    pump(&mut mgr, &mut dev, |m| {
        m.debug_counts().0 == 0 && m.debug_counts().1 == SCRATCH_POOL_SIZE
    });
    mgr.shutdown(&mut dev);
    assert!(dev.live.is_empty());
}

#[test]
fn stale_bake_for_a_removed_cuboid_is_discarded() {
    let reg = registry();
    let mut dev = RecordingDevice::default();
    let mut mgr = manager(&reg);
    let addr = CuboidAddress::new(4, 0, 4);
    let c = snapshot(addr, &[(3, 3, 3, "stone")], &reg);
    let h = height_for(&c, &reg);
    mgr.set_cuboid(c, h, None);
    // Enqueue the bake, then forget the cuboid before draining.
    mgr.process_background(&mut dev);
    mgr.remove_cuboid(addr, &mut dev);

    pump(&mut mgr, &mut dev, |m| {
        m.debug_counts().1 == SCRATCH_POOL_SIZE
    });
    assert!(mgr.mesh_set(addr).is_none());
    assert!(dev.events.is_empty(), "stale bake must not upload");
    mgr.shutdown(&mut dev);
}

#[test]
#[should_panic(expected = "unknown cuboid")]
fn removing_an_unknown_cuboid_is_a_caller_bug() {
    let reg = registry();
    let mut dev = RecordingDevice::default();
    let mut mgr = manager(&reg);
    mgr.remove_cuboid(CuboidAddress::new(9, 9, 9), &mut dev);
}

#[test]
fn shutdown_releases_every_buffer_and_joins_the_worker() {
    let reg = registry();
    let mut dev = RecordingDevice::default();
    let mut mgr = manager(&reg);
    for i in 0..4 {
        let addr = CuboidAddress::new(i, 0, 0);
        let c = snapshot(addr, &[(2, 2, 2, "stone"), (8, 8, 8, "water_source")], &reg);
        let h = height_for(&c, &reg);
        mgr.set_cuboid(c, h, None);
    }
    pump(&mut mgr, &mut dev, |m| {
        m.debug_counts().0 == 0 && m.debug_counts().1 == SCRATCH_POOL_SIZE
    });
    assert!(!dev.live.is_empty());
    mgr.shutdown(&mut dev);
    assert!(dev.live.is_empty());
}
