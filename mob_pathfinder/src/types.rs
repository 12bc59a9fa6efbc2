// Core spatial types shared across the pathfinder.
//
// Defines integer voxel coordinates (`VoxelCoord`), continuous world-space
// positions (`Vec3`), axis-aligned bounding boxes (`Aabb`) used for entity
// collision sweeps, and horizontal facings (`Facing`) used for neighbor
// enumeration and door/gate geometry. All types derive `Serialize` and
// `Deserialize` so search inputs can cross the offload boundary.
//
// Coordinate conventions:
// - X: east  (positive) / west  (negative)
// - Y: up    (positive) / down  (negative)
// - Z: south (positive) / north (negative)
//
// **Critical constraint: hash packing.** Node identity is the packed 64-bit
// value from `VoxelCoord::pack()`. Coordinates outside `PACKED_Y_RANGE` on Y
// or outside ±2^26 on X/Z alias each other, so worlds must keep their height
// inside the packable range.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

// ---------------------------------------------------------------------------
// Voxel coordinates
// ---------------------------------------------------------------------------

/// Y values that survive `VoxelCoord::pack()` without aliasing.
pub const PACKED_Y_RANGE: RangeInclusive<i32> = -512..=511;

const PACK_XZ_BITS: u32 = 27;
const PACK_Y_BITS: u32 = 10;
const PACK_XZ_MASK: u64 = (1 << PACK_XZ_BITS) - 1;
const PACK_Y_MASK: u64 = (1 << PACK_Y_BITS) - 1;

/// A position in the 3D voxel grid. Each component is in voxel units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VoxelCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl VoxelCoord {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Manhattan distance between two coordinates.
    pub fn manhattan_distance(self, other: Self) -> u32 {
        ((self.x - other.x).unsigned_abs())
            + ((self.y - other.y).unsigned_abs())
            + ((self.z - other.z).unsigned_abs())
    }

    /// Squared Euclidean distance between two coordinates.
    pub fn distance_squared(self, other: Self) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dy = (self.y - other.y) as f32;
        let dz = (self.z - other.z) as f32;
        dx * dx + dy * dy + dz * dz
    }

    /// Euclidean distance between two coordinates.
    pub fn distance(self, other: Self) -> f32 {
        self.distance_squared(other).sqrt()
    }

    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    pub const fn up(self) -> Self {
        self.offset(0, 1, 0)
    }

    pub const fn down(self) -> Self {
        self.offset(0, -1, 0)
    }

    /// The horizontally adjacent coordinate in direction `facing`.
    pub fn side(self, facing: Facing) -> Self {
        let (dx, dz) = facing.offset();
        self.offset(dx, 0, dz)
    }

    /// Pack into a single integer key. Injective for Y in `PACKED_Y_RANGE`
    /// and X/Z within ±2^26.
    pub fn pack(self) -> u64 {
        debug_assert!(
            PACKED_Y_RANGE.contains(&self.y),
            "y={} outside packable range",
            self.y
        );
        let x = (self.x as i64 as u64) & PACK_XZ_MASK;
        let y = ((self.y - PACKED_Y_RANGE.start()) as u64) & PACK_Y_MASK;
        let z = (self.z as i64 as u64) & PACK_XZ_MASK;
        (x << (PACK_XZ_BITS + PACK_Y_BITS)) | (y << PACK_XZ_BITS) | z
    }

    /// World-space position of this voxel's minimum corner.
    pub fn corner(self) -> Vec3 {
        Vec3::new(self.x as f64, self.y as f64, self.z as f64)
    }

    /// World-space position of this voxel's bottom-center point.
    pub fn bottom_center(self) -> Vec3 {
        Vec3::new(self.x as f64 + 0.5, self.y as f64, self.z as f64 + 0.5)
    }
}

impl fmt::Display for VoxelCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Continuous positions
// ---------------------------------------------------------------------------

/// A world-space position (entity feet, eye point, sweep offset).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The voxel containing this position.
    pub fn floor(self) -> VoxelCoord {
        VoxelCoord::new(
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }

    pub fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn scale(self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor, self.z * factor)
    }

    pub fn length(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Bounding boxes
// ---------------------------------------------------------------------------

/// Tolerance for box intersection: touching faces do not collide.
const INTERSECT_EPSILON: f64 = 1e-5;

/// An axis-aligned bounding box in world space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min_x: f64,
    pub min_y: f64,
    pub min_z: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub max_z: f64,
}

impl Aabb {
    pub const fn new(
        min_x: f64,
        min_y: f64,
        min_z: f64,
        max_x: f64,
        max_y: f64,
        max_z: f64,
    ) -> Self {
        Self {
            min_x,
            min_y,
            min_z,
            max_x,
            max_y,
            max_z,
        }
    }

    /// Box for an entity of the given width/height standing at `feet`.
    pub fn around_feet(feet: Vec3, width: f64, height: f64) -> Self {
        let half = width / 2.0;
        Self::new(
            feet.x - half,
            feet.y,
            feet.z - half,
            feet.x + half,
            feet.y + height,
            feet.z + half,
        )
    }

    /// Box given in voxel-local units (0..1 per axis, Y may exceed 1),
    /// translated to world space at `coord`.
    pub fn local(coord: VoxelCoord, local: [f64; 6]) -> Self {
        let o = coord.corner();
        Self::new(
            o.x + local[0],
            o.y + local[1],
            o.z + local[2],
            o.x + local[3],
            o.y + local[4],
            o.z + local[5],
        )
    }

    pub fn offset(self, by: Vec3) -> Self {
        Self::new(
            self.min_x + by.x,
            self.min_y + by.y,
            self.min_z + by.z,
            self.max_x + by.x,
            self.max_y + by.y,
            self.max_z + by.z,
        )
    }

    pub fn x_len(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn y_len(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn z_len(&self) -> f64 {
        self.max_z - self.min_z
    }

    pub fn average_edge_length(&self) -> f64 {
        (self.x_len() + self.y_len() + self.z_len()) / 3.0
    }

    /// True if every edge is finite and longer than zero.
    pub fn has_volume(&self) -> bool {
        [self.x_len(), self.y_len(), self.z_len()]
            .iter()
            .all(|len| len.is_finite() && *len > 0.0)
    }

    /// True if the two boxes overlap by more than a hair on every axis.
    pub fn intersects(&self, other: &Aabb) -> bool {
        other.max_x - self.min_x > INTERSECT_EPSILON
            && self.max_x - other.min_x > INTERSECT_EPSILON
            && other.max_y - self.min_y > INTERSECT_EPSILON
            && self.max_y - other.min_y > INTERSECT_EPSILON
            && other.max_z - self.min_z > INTERSECT_EPSILON
            && self.max_z - other.min_z > INTERSECT_EPSILON
    }
}

// ---------------------------------------------------------------------------
// Facings
// ---------------------------------------------------------------------------

/// A horizontal direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Facing {
    /// -Z
    North,
    /// +Z
    South,
    /// -X
    West,
    /// +X
    East,
}

impl Facing {
    /// Enumeration order used for orthogonal neighbor generation.
    pub const HORIZONTAL: [Facing; 4] = [Facing::North, Facing::South, Facing::West, Facing::East];

    /// (dx, dz) unit step.
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Facing::North => (0, -1),
            Facing::South => (0, 1),
            Facing::West => (-1, 0),
            Facing::East => (1, 0),
        }
    }

    pub const fn opposite(self) -> Self {
        match self {
            Facing::North => Facing::South,
            Facing::South => Facing::North,
            Facing::West => Facing::East,
            Facing::East => Facing::West,
        }
    }

    /// Rotate 90 degrees clockwise when viewed from above.
    pub const fn clockwise(self) -> Self {
        match self {
            Facing::North => Facing::East,
            Facing::East => Facing::South,
            Facing::South => Facing::West,
            Facing::West => Facing::North,
        }
    }

    pub const fn counter_clockwise(self) -> Self {
        self.clockwise().opposite()
    }

    /// True for North/South, i.e. the facing runs along the Z axis.
    pub const fn is_z_axis(self) -> bool {
        matches!(self, Facing::North | Facing::South)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voxel_coord_manhattan_distance() {
        let a = VoxelCoord::new(0, 0, 0);
        let b = VoxelCoord::new(3, 4, 5);
        assert_eq!(a.manhattan_distance(b), 12);
        assert_eq!(b.manhattan_distance(a), 12);
    }

    #[test]
    fn euclidean_distance() {
        let a = VoxelCoord::new(0, 64, 0);
        let b = VoxelCoord::new(3, 68, 0);
        assert_eq!(a.distance_squared(b), 25.0);
        assert_eq!(a.distance(b), 5.0);
    }

    #[test]
    fn pack_is_injective_near_origin() {
        let mut seen = std::collections::BTreeSet::new();
        for x in -3..=3 {
            for y in [-512, -64, -1, 0, 1, 63, 64, 511] {
                for z in -3..=3 {
                    assert!(seen.insert(VoxelCoord::new(x, y, z).pack()));
                }
            }
        }
    }

    #[test]
    fn pack_distinguishes_far_coordinates() {
        let a = VoxelCoord::new(1_000_000, 10, -1_000_000);
        let b = VoxelCoord::new(-1_000_000, 10, 1_000_000);
        assert_ne!(a.pack(), b.pack());
    }

    #[test]
    fn floor_handles_negative_positions() {
        assert_eq!(Vec3::new(-0.5, 63.99, 2.0).floor(), VoxelCoord::new(-1, 63, 2));
    }

    #[test]
    fn side_follows_facing_offsets() {
        let c = VoxelCoord::new(5, 64, 5);
        assert_eq!(c.side(Facing::North), VoxelCoord::new(5, 64, 4));
        assert_eq!(c.side(Facing::South), VoxelCoord::new(5, 64, 6));
        assert_eq!(c.side(Facing::West), VoxelCoord::new(4, 64, 5));
        assert_eq!(c.side(Facing::East), VoxelCoord::new(6, 64, 5));
    }

    #[test]
    fn facing_rotation_cycles() {
        for f in Facing::HORIZONTAL {
            assert_eq!(f.clockwise().clockwise().clockwise().clockwise(), f);
            assert_eq!(f.clockwise().counter_clockwise(), f);
            assert_eq!(f.opposite().opposite(), f);
        }
    }

    #[test]
    fn touching_boxes_do_not_intersect() {
        let a = Aabb::new(0.0, 0.0, 0.0, 1.0, 1.0, 1.0);
        let b = Aabb::new(1.0, 0.0, 0.0, 2.0, 1.0, 1.0);
        assert!(!a.intersects(&b));
        let c = Aabb::new(0.5, 0.5, 0.5, 1.5, 1.5, 1.5);
        assert!(a.intersects(&c));
    }

    #[test]
    fn around_feet_is_centered() {
        let bb = Aabb::around_feet(Vec3::new(0.5, 64.0, 0.5), 0.6, 1.8);
        assert!((bb.x_len() - 0.6).abs() < 1e-9);
        assert!((bb.y_len() - 1.8).abs() < 1e-9);
        assert!((bb.min_x - 0.2).abs() < 1e-9);
    }
}
