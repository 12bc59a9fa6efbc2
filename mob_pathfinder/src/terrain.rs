// Terrain access for the pathfinder.
//
// `TerrainSampler` is the boundary to whatever stores the world: it serves
// the `Voxel` at an integer coordinate and reports the world's vertical
// bounds. Collision queries (`collision_boxes`, `colliding_cells`) are
// provided methods built on `voxel()`, so a backend only has to implement
// lookup. The offload crate supplies a second implementation backed by a
// region snapshot that can fetch missing regions from the owning thread.
//
// `VoxelWorld` is the direct, in-memory implementation: a dense 3D grid
// stored as a flat `Vec<Voxel>` indexed by
// `x + z * size_x + y * size_x * size_z` relative to an origin corner.
// Out-of-bounds reads return `Air`; out-of-bounds writes are no-ops. Its
// vertical extent is clipped to what `VoxelCoord::pack` can key.
//
// See also: `voxel.rs` for per-voxel shapes, `walk.rs` for the classifier
// that consumes these queries, `mob_pathfinder_offload::snapshot` for the
// snapshot sampler.
//
// **Critical constraint: purity.** Samplers are read-only for the duration
// of a search. A voxel changing mid-search would desynchronize the
// evaluator's classification cache.

use log::warn;
use smallvec::SmallVec;

use crate::types::{Aabb, Facing, PACKED_Y_RANGE, VoxelCoord};
use crate::voxel::Voxel;

/// Read access to voxel terrain.
pub trait TerrainSampler {
    /// The voxel at `coord`. Coordinates outside the world return `Air`.
    fn voxel(&self, coord: VoxelCoord) -> Voxel;

    /// Lowest valid Y (inclusive). Must not be below
    /// `PACKED_Y_RANGE.start()`.
    fn min_y(&self) -> i32;

    /// Highest valid Y (exclusive). Must not exceed `PACKED_Y_RANGE.end()`,
    /// so the cell above the top layer still has a node key.
    fn max_y(&self) -> i32;

    /// Whether `coord` lies inside the world. The default only bounds Y;
    /// horizontal extent is unbounded.
    fn in_bounds(&self, coord: VoxelCoord) -> bool {
        coord.y >= self.min_y() && coord.y < self.max_y()
    }

    /// World-space collision boxes of the voxel at `coord`, with fence and
    /// wall arms reaching toward connecting neighbors.
    fn collision_boxes(&self, coord: VoxelCoord) -> SmallVec<[Aabb; 4]> {
        let voxel = self.voxel(coord);
        let mut boxes: SmallVec<[Aabb; 4]> = voxel
            .local_shapes()
            .into_iter()
            .map(|local| Aabb::local(coord, local))
            .collect();
        if matches!(voxel, Voxel::Fence | Voxel::Wall) {
            for side in Facing::HORIZONTAL {
                if !self.voxel(coord.side(side)).connects_to_post() {
                    continue;
                }
                if let Some(arm) = voxel.arm_shape(side) {
                    boxes.push(Aabb::local(coord, arm));
                }
            }
        }
        boxes
    }

    /// All cells whose collision geometry intersects `bb`, scanning a box
    /// expanded by one voxel on every side (tall posts reach into the voxel
    /// above them). With `first_only`, stops at the first hit.
    fn colliding_cells(&self, bb: &Aabb, first_only: bool) -> Vec<(VoxelCoord, Voxel)> {
        let min_x = (bb.min_x - 1.0).floor() as i32;
        let min_y = (bb.min_y - 1.0).floor() as i32;
        let min_z = (bb.min_z - 1.0).floor() as i32;
        let max_x = (bb.max_x + 1.0).floor() as i32;
        let max_y = (bb.max_y + 1.0).floor() as i32;
        let max_z = (bb.max_z + 1.0).floor() as i32;

        let mut hits = Vec::new();
        for z in min_z..=max_z {
            for x in min_x..=max_x {
                for y in min_y..=max_y {
                    let coord = VoxelCoord::new(x, y, z);
                    if self
                        .collision_boxes(coord)
                        .iter()
                        .any(|shape| shape.intersects(bb))
                    {
                        hits.push((coord, self.voxel(coord)));
                        if first_only {
                            return hits;
                        }
                    }
                }
            }
        }
        hits
    }
}

/// Dense 3D voxel grid.
#[derive(Clone, Debug, Default)]
pub struct VoxelWorld {
    /// Flat storage: index = x + z * size_x + y * size_x * size_z, relative
    /// to `origin`.
    voxels: Vec<Voxel>,
    /// World coordinate of the grid's minimum corner.
    pub origin: VoxelCoord,
    pub size_x: u32,
    pub size_y: u32,
    pub size_z: u32,
}

impl VoxelWorld {
    /// Create a new world filled with `Air`, with its minimum corner at 0,0,0.
    pub fn new(size_x: u32, size_y: u32, size_z: u32) -> Self {
        Self::with_origin(VoxelCoord::new(0, 0, 0), size_x, size_y, size_z)
    }

    /// Create a new world filled with `Air` whose minimum corner is `origin`.
    /// Layers outside `PACKED_Y_RANGE.start()..PACKED_Y_RANGE.end()` are
    /// dropped.
    pub fn with_origin(origin: VoxelCoord, size_x: u32, size_y: u32, size_z: u32) -> Self {
        let requested_top = i64::from(origin.y) + i64::from(size_y);
        let bottom = origin.y.clamp(*PACKED_Y_RANGE.start(), *PACKED_Y_RANGE.end());
        let top = requested_top.min(i64::from(*PACKED_Y_RANGE.end()));
        let clipped_y = (top - i64::from(bottom)).max(0) as u32;
        if bottom != origin.y || clipped_y != size_y {
            warn!(
                "world layers {}..{requested_top} clipped to {bottom}..{}",
                origin.y,
                i64::from(bottom) + i64::from(clipped_y)
            );
        }
        let origin = VoxelCoord::new(origin.x, bottom, origin.z);
        let total = (size_x as usize) * (clipped_y as usize) * (size_z as usize);
        Self {
            voxels: vec![Voxel::Air; total],
            origin,
            size_x,
            size_y: clipped_y,
            size_z,
        }
    }

    /// Check whether a coordinate is within the grid on all three axes.
    pub fn in_grid(&self, coord: VoxelCoord) -> bool {
        let x = coord.x - self.origin.x;
        let y = coord.y - self.origin.y;
        let z = coord.z - self.origin.z;
        x >= 0
            && y >= 0
            && z >= 0
            && (x as u32) < self.size_x
            && (y as u32) < self.size_y
            && (z as u32) < self.size_z
    }

    /// Convert a coordinate to a flat index. Returns `None` if out of bounds.
    fn index(&self, coord: VoxelCoord) -> Option<usize> {
        if self.in_grid(coord) {
            let x = (coord.x - self.origin.x) as usize;
            let y = (coord.y - self.origin.y) as usize;
            let z = (coord.z - self.origin.z) as usize;
            let sx = self.size_x as usize;
            let sz = self.size_z as usize;
            Some(x + z * sx + y * sx * sz)
        } else {
            None
        }
    }

    /// Read a voxel. Returns `Air` for out-of-bounds coordinates.
    pub fn get(&self, coord: VoxelCoord) -> Voxel {
        self.index(coord)
            .map(|i| self.voxels[i])
            .unwrap_or(Voxel::Air)
    }

    /// Write a voxel. No-op for out-of-bounds coordinates.
    pub fn set(&mut self, coord: VoxelCoord, voxel: Voxel) {
        if let Some(i) = self.index(coord) {
            self.voxels[i] = voxel;
        }
    }

    /// Fill the inclusive box between `a` and `b` with `voxel`.
    pub fn fill(&mut self, a: VoxelCoord, b: VoxelCoord, voxel: Voxel) {
        for x in a.x.min(b.x)..=a.x.max(b.x) {
            for y in a.y.min(b.y)..=a.y.max(b.y) {
                for z in a.z.min(b.z)..=a.z.max(b.z) {
                    self.set(VoxelCoord::new(x, y, z), voxel);
                }
            }
        }
    }
}

impl TerrainSampler for VoxelWorld {
    fn voxel(&self, coord: VoxelCoord) -> Voxel {
        self.get(coord)
    }

    fn min_y(&self) -> i32 {
        self.origin.y
    }

    fn max_y(&self) -> i32 {
        self.origin.y + self.size_y as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vec3;

    #[test]
    fn new_world_spans_origin_to_size() {
        let world = VoxelWorld::with_origin(VoxelCoord::new(-2, -4, -2), 4, 6, 4);
        assert_eq!((world.min_y(), world.max_y()), (-4, 2));
        assert!(world.in_grid(VoxelCoord::new(-2, -4, -2)));
        assert!(world.in_grid(VoxelCoord::new(1, 1, 1)));
        assert!(!world.in_grid(VoxelCoord::new(2, 1, 1)));
        assert!(!world.in_grid(VoxelCoord::new(1, 2, 1)));
        assert!(!world.in_grid(VoxelCoord::new(1, -5, 1)));
        assert_eq!(world.voxel(VoxelCoord::new(-1, -3, 0)), Voxel::Air);
    }

    #[test]
    fn reads_and_writes_are_relative_to_origin() {
        let mut world = VoxelWorld::with_origin(VoxelCoord::new(10, 60, -10), 4, 4, 4);
        world.set(VoxelCoord::new(10, 60, -10), Voxel::Solid);
        world.set(VoxelCoord::new(13, 63, -7), Voxel::Leaves);
        // The grid's local corner is not a world coordinate here.
        world.set(VoxelCoord::new(0, 0, 0), Voxel::Solid);
        assert_eq!(world.get(VoxelCoord::new(10, 60, -10)), Voxel::Solid);
        assert_eq!(world.get(VoxelCoord::new(13, 63, -7)), Voxel::Leaves);
        assert_eq!(world.get(VoxelCoord::new(0, 0, 0)), Voxel::Air);
        assert_eq!(world.get(VoxelCoord::new(11, 60, -10)), Voxel::Air);
    }

    #[test]
    fn writes_outside_height_bounds_are_dropped() {
        let mut world = VoxelWorld::with_origin(VoxelCoord::new(0, 60, 0), 4, 4, 4);
        world.set(VoxelCoord::new(1, world.max_y(), 1), Voxel::Solid);
        world.set(VoxelCoord::new(1, world.min_y() - 1, 1), Voxel::Solid);
        world.fill(VoxelCoord::new(0, 58, 0), VoxelCoord::new(0, 66, 0), Voxel::Solid);
        assert_eq!(world.get(VoxelCoord::new(1, 64, 1)), Voxel::Air);
        assert_eq!(world.get(VoxelCoord::new(1, 59, 1)), Voxel::Air);
        assert_eq!(world.get(VoxelCoord::new(0, 59, 0)), Voxel::Air);
        assert_eq!(world.get(VoxelCoord::new(0, 60, 0)), Voxel::Solid);
        assert_eq!(world.get(VoxelCoord::new(0, 63, 0)), Voxel::Solid);
        assert_eq!(world.get(VoxelCoord::new(0, 64, 0)), Voxel::Air);
    }

    #[test]
    fn height_is_clipped_to_packable_range() {
        let tall = VoxelWorld::with_origin(VoxelCoord::new(0, -600, 0), 2, 1400, 2);
        assert_eq!(tall.min_y(), *PACKED_Y_RANGE.start());
        assert_eq!(tall.max_y(), *PACKED_Y_RANGE.end());
        // Every layer plus the one above the top still packs.
        for y in tall.min_y()..=tall.max_y() {
            VoxelCoord::new(1, y, 1).pack();
        }

        let mut high = VoxelWorld::with_origin(VoxelCoord::new(0, 500, 0), 2, 64, 2);
        assert_eq!((high.min_y(), high.max_y()), (500, 511));
        high.set(VoxelCoord::new(0, 510, 0), Voxel::Solid);
        assert_eq!(high.get(VoxelCoord::new(0, 510, 0)), Voxel::Solid);

        let above = VoxelWorld::with_origin(VoxelCoord::new(0, 600, 0), 2, 8, 2);
        assert_eq!((above.min_y(), above.max_y()), (511, 511));
        assert_eq!(above.get(VoxelCoord::new(0, 600, 0)), Voxel::Air);
    }

    #[test]
    fn origin_shifts_indexing() {
        let mut world = VoxelWorld::with_origin(VoxelCoord::new(-8, -64, -8), 16, 128, 16);
        world.set(VoxelCoord::new(-8, -64, -8), Voxel::Solid);
        world.set(VoxelCoord::new(7, 63, 7), Voxel::Leaves);
        assert_eq!(world.get(VoxelCoord::new(-8, -64, -8)), Voxel::Solid);
        assert_eq!(world.get(VoxelCoord::new(7, 63, 7)), Voxel::Leaves);
        assert_eq!(world.get(VoxelCoord::new(8, 63, 7)), Voxel::Air);
        assert_eq!(world.min_y(), -64);
        assert_eq!(world.max_y(), 64);
    }

    #[test]
    fn sampler_bounds_only_check_height() {
        let world = VoxelWorld::new(4, 16, 4);
        assert!(world.in_bounds(VoxelCoord::new(-100, 0, 100)));
        assert!(!world.in_bounds(VoxelCoord::new(0, 16, 0)));
        assert!(!world.in_bounds(VoxelCoord::new(0, -1, 0)));
    }

    #[test]
    fn fence_gets_arms_toward_neighbors() {
        let mut world = VoxelWorld::new(8, 8, 8);
        let post = VoxelCoord::new(3, 1, 3);
        world.set(post, Voxel::Fence);
        assert_eq!(world.collision_boxes(post).len(), 1);
        world.set(post.side(Facing::East), Voxel::Fence);
        world.set(post.side(Facing::North), Voxel::Solid);
        assert_eq!(world.collision_boxes(post).len(), 3);
    }

    #[test]
    fn colliding_cells_finds_solid_under_box() {
        let mut world = VoxelWorld::new(8, 8, 8);
        world.set(VoxelCoord::new(2, 1, 2), Voxel::Solid);
        let inside = Aabb::around_feet(Vec3::new(2.5, 1.2, 2.5), 0.6, 1.8);
        let hits = world.colliding_cells(&inside, false);
        assert_eq!(hits, vec![(VoxelCoord::new(2, 1, 2), Voxel::Solid)]);

        let above = Aabb::around_feet(Vec3::new(2.5, 2.0, 2.5), 0.6, 1.8);
        assert!(world.colliding_cells(&above, true).is_empty());
    }

    #[test]
    fn fill_covers_inclusive_box() {
        let mut world = VoxelWorld::new(8, 8, 8);
        world.fill(VoxelCoord::new(3, 2, 3), VoxelCoord::new(1, 0, 1), Voxel::Solid);
        assert_eq!(world.get(VoxelCoord::new(1, 0, 1)), Voxel::Solid);
        assert_eq!(world.get(VoxelCoord::new(3, 2, 3)), Voxel::Solid);
        assert_eq!(world.get(VoxelCoord::new(4, 2, 3)), Voxel::Air);
    }
}
