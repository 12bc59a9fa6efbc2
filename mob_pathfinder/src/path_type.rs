// Terrain classifications and their traversal costs.
//
// `PathType` is the closed set of categories the walk evaluator assigns to
// voxels. Each has a default malus (additive cost penalty): negative means
// impassable, zero or positive is added to the edge cost. `default_malus()`
// is a pure lookup.
//
// `PathTypeCostMap` overrides maluses per search configuration. It is a
// fixed array indexed by `PathType` ordinal (no hashing on the hot path) and
// serializes as a `{ "water": 0.0, ... }` map for config files.
//
// `PathTypeSet` is a bitset over ordinals used to collect every
// classification an entity footprint touches. Iteration is in ordinal order,
// which is what makes footprint aggregation deterministic.
//
// **Critical constraint: ordinal order.** Variant order is load-bearing:
// footprint aggregation breaks ties by it. Do not reorder variants.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Malus of open, cost-free cells.
pub const OPEN_MALUS: f32 = 0.0;

/// Malus of impassable cells.
pub const BLOCKED_MALUS: f32 = -1.0;

/// A voxel's terrain category for pathfinding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathType {
    Blocked,
    Open,
    Walkable,
    /// A closed wooden door this mob can open and pass.
    WalkableDoor,
    Trapdoor,
    PowderSnow,
    DangerPowderSnow,
    Fence,
    Lava,
    Water,
    WaterBorder,
    Rail,
    UnpassableRail,
    DangerFire,
    DamageFire,
    DangerOther,
    DamageOther,
    DoorOpen,
    DoorWoodClosed,
    DoorIronClosed,
    Leaves,
    StickyHoney,
    Cocoa,
}

impl PathType {
    /// Number of variants.
    pub const COUNT: usize = 23;

    /// All variants in ordinal order.
    pub const ALL: [PathType; PathType::COUNT] = [
        PathType::Blocked,
        PathType::Open,
        PathType::Walkable,
        PathType::WalkableDoor,
        PathType::Trapdoor,
        PathType::PowderSnow,
        PathType::DangerPowderSnow,
        PathType::Fence,
        PathType::Lava,
        PathType::Water,
        PathType::WaterBorder,
        PathType::Rail,
        PathType::UnpassableRail,
        PathType::DangerFire,
        PathType::DamageFire,
        PathType::DangerOther,
        PathType::DamageOther,
        PathType::DoorOpen,
        PathType::DoorWoodClosed,
        PathType::DoorIronClosed,
        PathType::Leaves,
        PathType::StickyHoney,
        PathType::Cocoa,
    ];

    pub const fn ordinal(self) -> usize {
        self as usize
    }

    /// Cost penalty when no override is configured.
    pub const fn default_malus(self) -> f32 {
        match self {
            PathType::Blocked
            | PathType::PowderSnow
            | PathType::Fence
            | PathType::Lava
            | PathType::UnpassableRail
            | PathType::DamageOther
            | PathType::DoorWoodClosed
            | PathType::DoorIronClosed
            | PathType::Leaves => BLOCKED_MALUS,
            PathType::Water
            | PathType::WaterBorder
            | PathType::DangerFire
            | PathType::DangerOther
            | PathType::StickyHoney => 8.0,
            PathType::DamageFire => 16.0,
            PathType::Open
            | PathType::Walkable
            | PathType::WalkableDoor
            | PathType::Trapdoor
            | PathType::DangerPowderSnow
            | PathType::Rail
            | PathType::DoorOpen
            | PathType::Cocoa => OPEN_MALUS,
        }
    }

    /// Fences and closed doors only partly fill their voxel, so moving past
    /// them needs a real collision check.
    pub const fn has_partial_collision(self) -> bool {
        matches!(
            self,
            PathType::Fence | PathType::DoorWoodClosed | PathType::DoorIronClosed
        )
    }
}

// ---------------------------------------------------------------------------
// Classification set
// ---------------------------------------------------------------------------

/// Set of classifications, iterated in ordinal order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PathTypeSet(u32);

impl PathTypeSet {
    pub const fn new() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, path_type: PathType) {
        self.0 |= 1 << path_type.ordinal();
    }

    pub fn contains(&self, path_type: PathType) -> bool {
        self.0 & (1 << path_type.ordinal()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = PathType> + '_ {
        PathType::ALL.into_iter().filter(|t| self.contains(*t))
    }
}

// ---------------------------------------------------------------------------
// Cost overrides
// ---------------------------------------------------------------------------

/// Per-search malus overrides. Unset entries fall back to
/// `PathType::default_malus()`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<PathType, f32>", into = "BTreeMap<PathType, f32>")]
pub struct PathTypeCostMap {
    overrides: [Option<f32>; PathType::COUNT],
}

impl PathTypeCostMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Effective malus for `path_type`.
    pub fn malus(&self, path_type: PathType) -> f32 {
        self.overrides[path_type.ordinal()].unwrap_or(path_type.default_malus())
    }

    pub fn set_malus(&mut self, path_type: PathType, malus: f32) {
        self.overrides[path_type.ordinal()] = Some(malus);
    }

    /// Drop the override for `path_type`, restoring its default.
    pub fn reset_malus(&mut self, path_type: PathType) {
        self.overrides[path_type.ordinal()] = None;
    }

    pub fn clear(&mut self) {
        self.overrides = [None; PathType::COUNT];
    }
}

impl From<BTreeMap<PathType, f32>> for PathTypeCostMap {
    fn from(map: BTreeMap<PathType, f32>) -> Self {
        let mut costs = Self::new();
        for (path_type, malus) in map {
            costs.set_malus(path_type, malus);
        }
        costs
    }
}

impl From<PathTypeCostMap> for BTreeMap<PathType, f32> {
    fn from(costs: PathTypeCostMap) -> Self {
        PathType::ALL
            .into_iter()
            .filter_map(|t| costs.overrides[t.ordinal()].map(|m| (t, m)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinals_match_all_table() {
        for (i, t) in PathType::ALL.iter().enumerate() {
            assert_eq!(t.ordinal(), i, "{t:?} out of place");
        }
    }

    #[test]
    fn passable_hazards_carry_positive_penalties() {
        for t in [
            PathType::Water,
            PathType::WaterBorder,
            PathType::DangerFire,
            PathType::DangerOther,
            PathType::StickyHoney,
        ] {
            assert!(t.default_malus() > 0.0, "{t:?}");
        }
        assert_eq!(PathType::DamageFire.default_malus(), 16.0);
    }

    #[test]
    fn blockers_are_negative() {
        for t in [
            PathType::Blocked,
            PathType::Lava,
            PathType::Fence,
            PathType::Leaves,
            PathType::DoorIronClosed,
            PathType::UnpassableRail,
        ] {
            assert!(t.default_malus() < 0.0, "{t:?}");
        }
    }

    #[test]
    fn cost_map_falls_back_to_default() {
        let mut costs = PathTypeCostMap::new();
        assert_eq!(costs.malus(PathType::Water), 8.0);
        costs.set_malus(PathType::Water, 0.0);
        assert_eq!(costs.malus(PathType::Water), 0.0);
        assert_eq!(costs.malus(PathType::Lava), -1.0);
        costs.reset_malus(PathType::Water);
        assert_eq!(costs.malus(PathType::Water), 8.0);
    }

    #[test]
    fn cost_map_serializes_as_named_map() {
        let mut costs = PathTypeCostMap::new();
        costs.set_malus(PathType::DangerFire, 0.0);
        costs.set_malus(PathType::Water, -1.0);
        let json = serde_json::to_string(&costs).unwrap();
        assert_eq!(json, r#"{"water":-1.0,"danger_fire":0.0}"#);
        let restored: PathTypeCostMap = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, costs);
    }

    #[test]
    fn set_iterates_in_ordinal_order() {
        let mut set = PathTypeSet::new();
        set.insert(PathType::Cocoa);
        set.insert(PathType::Blocked);
        set.insert(PathType::Water);
        set.insert(PathType::Water);
        assert_eq!(set.len(), 3);
        let order: Vec<_> = set.iter().collect();
        assert_eq!(order, vec![PathType::Blocked, PathType::Water, PathType::Cocoa]);
        set.clear();
        assert!(set.is_empty());
    }
}
