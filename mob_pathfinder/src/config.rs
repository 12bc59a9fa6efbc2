// Data-driven pathfinder configuration.
//
// `MobProfile` is everything the walk evaluator needs to know about the
// moving entity: ability flags (doors, floating, fences, amphibious), body
// size, stance, and how far it may step up or fall. `SearchLimits` bounds a
// single search. `PathfinderConfig` bundles both with a `PathTypeCostMap` of
// malus overrides and loads from JSON.
//
// Every struct uses `#[serde(default)]`, so a config file only has to name
// the fields it changes:
//
//     { "mob": { "can_open_doors": true }, "costs": { "water": 0.0 } }
//
// See also: `walk.rs` which reads `MobProfile`, `pathfinding.rs` which reads
// `SearchLimits`, `path_type.rs` for `PathTypeCostMap`.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::path_type::PathTypeCostMap;
use crate::types::{Aabb, Vec3};
use crate::voxel::Liquid;

// ---------------------------------------------------------------------------
// Entity shape
// ---------------------------------------------------------------------------

/// Physical dimensions of a mob, in voxels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntitySize {
    pub width: f32,
    pub height: f32,
    /// Eye height above the feet, used for the submerged check.
    pub eye_height: f32,
}

impl Default for EntitySize {
    fn default() -> Self {
        Self {
            width: 0.6,
            height: 1.8,
            eye_height: 1.62,
        }
    }
}

impl EntitySize {
    /// Footprint width in whole voxels: `floor(width + 1)`.
    pub fn width_blocks(&self) -> i32 {
        (self.width + 1.0).floor() as i32
    }

    /// Footprint height in whole voxels: `floor(height + 1)`.
    pub fn height_blocks(&self) -> i32 {
        (self.height + 1.0).floor() as i32
    }
}

/// The evaluator configuration surface for one kind of mob.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MobProfile {
    /// Doors (open or openable) may be walked through.
    pub can_pass_doors: bool,
    /// Closed wooden doors may be opened.
    pub can_open_doors: bool,
    /// Swims at the surface instead of sinking.
    pub can_float: bool,
    pub can_walk_over_fences: bool,
    /// Treats water as standing ground.
    pub amphibious: bool,
    pub size: EntitySize,
    /// Current collision box. When unset, derived from `size` around the
    /// search's start position.
    pub bounding_box: Option<Aabb>,
    pub on_ground: bool,
    /// Highest ledge the mob can step onto without jumping.
    pub max_up_step: f32,
    /// Longest drop the mob will take, in voxels.
    pub max_fall_distance: u32,
    /// Liquids the mob can walk on top of.
    pub standable_liquids: Vec<Liquid>,
}

impl Default for MobProfile {
    fn default() -> Self {
        Self {
            can_pass_doors: true,
            can_open_doors: false,
            can_float: false,
            can_walk_over_fences: false,
            amphibious: false,
            size: EntitySize::default(),
            bounding_box: None,
            on_ground: true,
            max_up_step: 0.6,
            max_fall_distance: 3,
            standable_liquids: Vec::new(),
        }
    }
}

impl MobProfile {
    /// Footprint in whole voxels as `(width, height, depth)`.
    pub fn footprint(&self) -> (i32, i32, i32) {
        let w = self.size.width_blocks();
        (w, self.size.height_blocks(), w)
    }

    /// Collision box of the mob standing at `feet`. A configured box
    /// without volume is ignored.
    pub fn bounding_box_at(&self, feet: Vec3) -> Aabb {
        self.bounding_box.filter(Aabb::has_volume).unwrap_or_else(|| {
            Aabb::around_feet(
                feet,
                f64::from(self.size.width),
                f64::from(self.size.height),
            )
        })
    }

    pub fn can_stand_on(&self, liquid: Liquid) -> bool {
        self.standable_liquids.contains(&liquid)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.size.width > 0.0) {
            return Err(ConfigError::invalid(
                "mob.size.width",
                format!("must be positive, got {}", self.size.width),
            ));
        }
        if !(self.size.height > 0.0) {
            return Err(ConfigError::invalid(
                "mob.size.height",
                format!("must be positive, got {}", self.size.height),
            ));
        }
        if !(0.0..=self.size.height).contains(&self.size.eye_height) {
            return Err(ConfigError::invalid(
                "mob.size.eye_height",
                format!(
                    "must lie within 0..={}, got {}",
                    self.size.height, self.size.eye_height
                ),
            ));
        }
        if !(self.max_up_step >= 0.0) {
            return Err(ConfigError::invalid(
                "mob.max_up_step",
                format!("must not be negative, got {}", self.max_up_step),
            ));
        }
        if let Some(bb) = self.bounding_box.filter(|bb| !bb.has_volume()) {
            return Err(ConfigError::invalid(
                "mob.bounding_box",
                format!("every edge must be positive and finite, got {bb:?}"),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Search bounds
// ---------------------------------------------------------------------------

/// Bounds on a single search.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchLimits {
    /// Node-visit budget.
    pub max_visited_nodes: u32,
    /// Straight-line bound on expansion and on walked distance.
    pub max_distance_from_start: f32,
    /// Manhattan distance at which a node counts as at the target.
    pub reach_range: u32,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            max_visited_nodes: 256,
            max_distance_from_start: 32.0,
            reach_range: 1,
        }
    }
}

impl SearchLimits {
    pub fn new(max_visited_nodes: u32, max_distance_from_start: f32) -> Self {
        Self {
            max_visited_nodes,
            max_distance_from_start,
            ..Self::default()
        }
    }

    pub fn with_reach_range(mut self, reach_range: u32) -> Self {
        self.reach_range = reach_range;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_visited_nodes == 0 {
            return Err(ConfigError::invalid(
                "limits.max_visited_nodes",
                "must be at least 1",
            ));
        }
        if !(self.max_distance_from_start > 0.0) {
            return Err(ConfigError::invalid(
                "limits.max_distance_from_start",
                format!("must be positive, got {}", self.max_distance_from_start),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// Mob profile, search limits, and cost overrides, as loaded from a config
/// file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathfinderConfig {
    pub mob: MobProfile,
    pub limits: SearchLimits,
    pub costs: PathTypeCostMap,
}

impl PathfinderConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.mob.validate()?;
        self.limits.validate()
    }
}
