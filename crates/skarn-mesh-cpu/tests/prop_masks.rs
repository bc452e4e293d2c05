use proptest::prelude::*;

use skarn_blocks::BlockId;
use skarn_cuboid::{BlockAddress, CUBOID_EDGE, Cuboid, CuboidAddress};
use skarn_mesh_cpu::{Face, FaceMasks, FaceWriter};

const E: usize = CUBOID_EDGE;
const FILL: BlockId = 1;

struct Counter {
    faces: usize,
}

impl FaceWriter for Counter {
    fn include(&self, block: BlockId) -> bool {
        block == FILL
    }
    fn write_face(&mut self, _x: usize, _y: usize, _z: usize, _face: Face, _block: BlockId) {
        self.faces += 1;
    }
}

fn coords() -> impl Strategy<Value = Vec<(u8, u8, u8)>> {
    // A handful of cells in a small corner keeps adjacency interesting.
    prop::collection::vec((0u8..6, 0u8..6, 0u8..6), 0..40)
}

fn cuboid_with(cells: &[(u8, u8, u8)]) -> Cuboid {
    let mut c = Cuboid::empty(CuboidAddress::new(0, 0, 0));
    for &(x, y, z) in cells {
        c.set_block(BlockAddress::new(x, y, z), FILL);
    }
    c
}

fn analytic_exposed_faces(c: &Cuboid) -> usize {
    let filled = |x: i32, y: i32, z: i32| {
        if x < 0 || y < 0 || z < 0 || x >= E as i32 || y >= E as i32 || z >= E as i32 {
            return false;
        }
        c.block(x as usize, y as usize, z as usize) == FILL
    };
    let mut n = 0;
    for y in 0..E as i32 {
        for z in 0..E as i32 {
            for x in 0..E as i32 {
                if !filled(x, y, z) {
                    continue;
                }
                for (dx, dy, dz) in [
                    (1, 0, 0),
                    (-1, 0, 0),
                    (0, 1, 0),
                    (0, -1, 0),
                    (0, 0, 1),
                    (0, 0, -1),
                ] {
                    if !filled(x + dx, y + dy, z + dz) {
                        n += 1;
                    }
                }
            }
        }
    }
    n
}

proptest! {
    // XOR toggling leaves exactly the analytically exposed faces set, and
    // every set bit is reported exactly once during the emit pass.
    #[test]
    fn mask_bits_match_naive_adjacency(cells in coords()) {
        let c = cuboid_with(&cells);
        let mut masks = FaceMasks::new();
        masks.populate(&c, &|b| b == FILL);
        let expected = analytic_exposed_faces(&c);
        prop_assert_eq!(masks.visible_face_count(), expected);
        let mut counter = Counter { faces: 0 };
        masks.build_faces(&c, &mut counter);
        prop_assert_eq!(counter.faces, expected);
    }

    // populate resets state: running it twice never doubles or cancels.
    #[test]
    fn repopulate_is_idempotent(cells in coords()) {
        let c = cuboid_with(&cells);
        let mut masks = FaceMasks::new();
        masks.populate(&c, &|b| b == FILL);
        let once = masks.visible_face_count();
        masks.populate(&c, &|b| b == FILL);
        prop_assert_eq!(masks.visible_face_count(), once);
        let mut counter = Counter { faces: 0 };
        masks.build_faces(&c, &mut counter);
        prop_assert_eq!(counter.faces, once);
    }
}

#[test]
fn isolated_block_has_six_faces_and_a_neighbor_cancels_one_pair() {
    let c = cuboid_with(&[(3, 3, 3)]);
    let mut masks = FaceMasks::new();
    masks.populate(&c, &|b| b == FILL);
    assert_eq!(masks.visible_face_count(), 6);

    let c2 = cuboid_with(&[(3, 3, 3), (4, 3, 3)]);
    masks.populate(&c2, &|b| b == FILL);
    assert_eq!(masks.visible_face_count(), 10);
    assert!(!masks.face_set(3, 3, 3, Face::PosX));
    assert!(!masks.face_set(4, 3, 3, Face::NegX));
    assert!(masks.face_set(3, 3, 3, Face::NegX));
    assert!(masks.face_set(4, 3, 3, Face::PosX));
}
