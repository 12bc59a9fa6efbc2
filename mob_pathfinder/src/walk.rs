// Ground-walking node evaluator.
//
// `WalkNodeEvaluator` is the `NodeEvaluator` for mobs that walk, step up
// ledges, fall down drops, and wade or swim through water. It works in three
// layers:
//
// 1. Classification. `raw_path_type` maps one `Voxel` to a `PathType` by a
//    priority-ordered match. `static_path_type` adds context: air over solid
//    footing becomes `Walkable`, footing hazards (fire, cactus, honey, powder
//    snow) override that, and walkable cells next to hazards or water are
//    demoted to `Danger*`/`WaterBorder`. `path_type_at` folds the
//    classification of every voxel the mob's footprint would cover, after
//    applying mob abilities (doors, rails), into one type.
// 2. Moves. `find_accepted_node` decides where a step toward a column lands:
//    on the same level, one step up (bounded by jump height and a corridor
//    collision check for narrow mobs), down through water, or down a drop
//    (bounded by max fall distance). `neighbors` runs it for the four
//    orthogonal and four diagonal directions and filters diagonals that
//    would cut corners.
// 3. Start resolution. `start_node` snaps the mob's position to the voxel it
//    is standing in, handling standable liquids, floating, and airborne
//    starts.
//
// Per-search state (node table, classification cache, anchor position) is
// skipped by serde, so the evaluator can be shipped to a worker thread as
// pure configuration.
//
// See also: `evaluator.rs` for the trait, `path_type.rs` for maluses,
// `config.rs` for `MobProfile`, `terrain.rs` for the collision queries.
//
// **Critical constraint: cache coherence.** `cached_path_type` memoizes by
// coordinate for the whole search. Terrain must not change while a search is
// prepared, and the cache is dropped by `prepare`/`done`.

use log::warn;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::config::{MobProfile, PathfinderConfig};
use crate::evaluator::{Neighbors, NodeEvaluator};
use crate::node::{NodeGraph, NodeId};
use crate::path_type::{PathType, PathTypeCostMap, PathTypeSet};
use crate::terrain::TerrainSampler;
use crate::types::{Aabb, Facing, Vec3, VoxelCoord};
use crate::voxel::{DoorMaterial, TraversalMedium, Voxel, is_pathfindable};

/// Lowest jump height any walker gets, slightly over one block so slabs and
/// fence-height floors can be climbed.
const DEFAULT_JUMP_HEIGHT: f64 = 1.125;

/// Tolerance subtracted from a liquid's surface in the submerged check.
const SURFACE_TOLERANCE: f64 = 0.111_111_1;

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Classification of a single voxel, ignoring its surroundings.
pub fn raw_path_type(voxel: Voxel) -> PathType {
    match voxel {
        Voxel::Air => PathType::Open,
        Voxel::Trapdoor { .. } | Voxel::LilyPad => PathType::Trapdoor,
        Voxel::PowderSnow => PathType::PowderSnow,
        Voxel::Cactus | Voxel::SweetBerryBush => PathType::DamageOther,
        Voxel::HoneyBlock => PathType::StickyHoney,
        Voxel::CocoaPod => PathType::Cocoa,
        Voxel::Water { .. } => PathType::Water,
        Voxel::Lava { .. } => PathType::Lava,
        v if v.is_burning() => PathType::DamageFire,
        Voxel::Door {
            open: true,
            ..
        } => PathType::DoorOpen,
        Voxel::Door {
            material: DoorMaterial::Wood,
            ..
        } => PathType::DoorWoodClosed,
        Voxel::Door {
            material: DoorMaterial::Iron,
            ..
        } => PathType::DoorIronClosed,
        Voxel::Rail => PathType::Rail,
        Voxel::Leaves => PathType::Leaves,
        Voxel::Fence | Voxel::Wall => PathType::Fence,
        Voxel::FenceGate { open: true, .. } => PathType::Open,
        Voxel::FenceGate { open: false, .. } => PathType::Blocked,
        v if is_pathfindable(v, TraversalMedium::Land) => PathType::Open,
        _ => PathType::Blocked,
    }
}

/// Classification of `coord` in context: footing and adjacent hazards, but
/// no mob-specific rules.
pub fn static_path_type(terrain: &dyn TerrainSampler, coord: VoxelCoord) -> PathType {
    let mut path_type = raw_path_type(terrain.voxel(coord));
    if path_type == PathType::Open && coord.y > terrain.min_y() {
        let below = raw_path_type(terrain.voxel(coord.down()));
        path_type = match below {
            PathType::Walkable | PathType::Open | PathType::Water | PathType::Lava => {
                PathType::Open
            }
            PathType::DamageFire => PathType::DamageFire,
            PathType::DamageOther => PathType::DamageOther,
            PathType::StickyHoney => PathType::StickyHoney,
            PathType::PowderSnow => PathType::DangerPowderSnow,
            _ => PathType::Walkable,
        };
    }
    if path_type == PathType::Walkable {
        path_type = neighbor_hazard(terrain, coord).unwrap_or(path_type);
    }
    path_type
}

/// Danger classification from the first hazardous voxel among the 26
/// surrounding `coord`, if any.
fn neighbor_hazard(terrain: &dyn TerrainSampler, coord: VoxelCoord) -> Option<PathType> {
    for dx in -1..=1 {
        for dy in -1..=1 {
            for dz in -1..=1 {
                if dx == 0 && dy == 0 && dz == 0 {
                    continue;
                }
                let voxel = terrain.voxel(coord.offset(dx, dy, dz));
                if voxel.is_contact_hazard() {
                    return Some(PathType::DangerOther);
                }
                if voxel.is_burning() {
                    return Some(PathType::DangerFire);
                }
                if voxel.is_water() {
                    return Some(PathType::WaterBorder);
                }
            }
        }
    }
    None
}

/// Height of the surface a mob standing in `coord` rests on: the top of the
/// voxel below's collision, or that voxel's base if it has none.
fn base_floor_level(terrain: &dyn TerrainSampler, coord: VoxelCoord) -> f64 {
    let below = coord.down();
    terrain
        .collision_boxes(below)
        .iter()
        .map(|b| b.max_y)
        .reduce(f64::max)
        .unwrap_or(f64::from(below.y))
}

/// True if any solid geometry intersects `bb` or it leaves the world.
fn has_collisions(terrain: &dyn TerrainSampler, bb: &Aabb) -> bool {
    let min = Vec3::new(bb.min_x, bb.min_y, bb.min_z).floor();
    let max = Vec3::new(bb.max_x, bb.max_y, bb.max_z).floor();
    !terrain.in_bounds(min)
        || !terrain.in_bounds(max)
        || !terrain.colliding_cells(bb, true).is_empty()
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

/// State scoped to one `prepare` → `done` cycle.
#[derive(Clone, Debug, Default)]
struct SearchState {
    graph: NodeGraph,
    path_types: FxHashMap<u64, PathType>,
    start: Vec3,
    prepared: bool,
}

/// Node evaluator for walking mobs.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WalkNodeEvaluator {
    mob: MobProfile,
    costs: PathTypeCostMap,
    #[serde(skip)]
    search: SearchState,
}

impl WalkNodeEvaluator {
    pub fn new(mob: MobProfile) -> Self {
        Self::with_costs(mob, PathTypeCostMap::default())
    }

    pub fn with_costs(mob: MobProfile, costs: PathTypeCostMap) -> Self {
        Self {
            mob,
            costs,
            search: SearchState::default(),
        }
    }

    pub fn from_config(config: &PathfinderConfig) -> Self {
        Self::with_costs(config.mob.clone(), config.costs.clone())
    }

    pub fn mob(&self) -> &MobProfile {
        &self.mob
    }

    /// Mutable cost overrides. Changes apply to the next search.
    pub fn costs_mut(&mut self) -> &mut PathTypeCostMap {
        &mut self.costs
    }

    pub fn is_prepared(&self) -> bool {
        self.search.prepared
    }

    /// Classification of `coord` for this mob: every voxel of the footprint
    /// anchored there is classified, and the results are folded with
    /// fences and unpassable rails dominating, then any impassable type,
    /// then the most expensive passable one.
    pub fn path_type_at(&self, terrain: &dyn TerrainSampler, coord: VoxelCoord) -> PathType {
        let (width, height, depth) = self.mob.footprint();
        let mob_pos = self.search.start.floor();
        let mut touched = PathTypeSet::new();
        let mut origin_type = PathType::Blocked;
        for dx in 0..width {
            for dy in 0..height {
                for dz in 0..depth {
                    let cell = coord.offset(dx, dy, dz);
                    let path_type =
                        self.apply_abilities(terrain, static_path_type(terrain, cell), mob_pos);
                    if dx == 0 && dy == 0 && dz == 0 {
                        origin_type = path_type;
                    }
                    touched.insert(path_type);
                }
            }
        }

        if touched.contains(PathType::Fence) {
            return PathType::Fence;
        }
        if touched.contains(PathType::UnpassableRail) {
            return PathType::UnpassableRail;
        }

        let mut impassable: Option<(PathType, f32)> = None;
        for path_type in touched.iter() {
            let malus = self.costs.malus(path_type);
            if malus < 0.0 && impassable.is_none_or(|(_, lowest)| malus < lowest) {
                impassable = Some((path_type, malus));
            }
        }
        if let Some((path_type, _)) = impassable {
            return path_type;
        }

        let mut best = PathType::Blocked;
        for path_type in touched.iter() {
            if self.costs.malus(path_type) >= self.costs.malus(best) {
                best = path_type;
            }
        }
        // Narrow mobs in open air are not charged for a zero-cost neighbor
        // type elsewhere in the footprint.
        if origin_type == PathType::Open && self.costs.malus(best) == 0.0 && width <= 1 {
            PathType::Open
        } else {
            best
        }
    }

    /// Adjust a static classification for what this mob can do.
    fn apply_abilities(
        &self,
        terrain: &dyn TerrainSampler,
        path_type: PathType,
        mob_pos: VoxelCoord,
    ) -> PathType {
        match path_type {
            PathType::DoorWoodClosed if self.mob.can_open_doors && self.mob.can_pass_doors => {
                PathType::WalkableDoor
            }
            PathType::DoorOpen if !self.mob.can_pass_doors => PathType::Blocked,
            PathType::Rail
                if !terrain.voxel(mob_pos).is_rail() && !terrain.voxel(mob_pos.down()).is_rail() =>
            {
                PathType::UnpassableRail
            }
            other => other,
        }
    }

    fn jump_height(&self) -> f64 {
        DEFAULT_JUMP_HEIGHT.max(f64::from(self.mob.max_up_step))
    }

    /// Floor level at `coord`; swimmers float at mid-voxel in water.
    fn floor_level(&self, terrain: &dyn TerrainSampler, coord: VoxelCoord) -> f64 {
        if (self.mob.can_float || self.mob.amphibious) && terrain.voxel(coord).is_water() {
            f64::from(coord.y) + 0.5
        } else {
            base_floor_level(terrain, coord)
        }
    }

    /// True if the mob's eyes are below the surface of the water they are in.
    fn is_submerged(&self, terrain: &dyn TerrainSampler) -> bool {
        let start = self.search.start;
        let eye_y = start.y + f64::from(self.mob.size.eye_height);
        let eye = Vec3::new(start.x, eye_y, start.z).floor();
        let voxel = terrain.voxel(eye);
        if !voxel.is_water() {
            return false;
        }
        let surface = f64::from(eye.y + 1) - (voxel.fluid_height_percent() - SURFACE_TOLERANCE);
        eye_y < surface
    }

    fn can_stand_on(&self, voxel: Voxel) -> bool {
        voxel.liquid().is_some_and(|liquid| self.mob.can_stand_on(liquid))
    }

    /// Tag the node at `coord` with `path_type`, keeping the worse of its
    /// old and new malus.
    fn node_with_cost_at_least(
        &mut self,
        coord: VoxelCoord,
        path_type: PathType,
        malus: f32,
    ) -> NodeId {
        let id = self.search.graph.get_or_create(coord);
        let node = self.search.graph.node_mut(id);
        node.path_type = path_type;
        node.cost_malus = node.cost_malus.max(malus);
        id
    }

    fn blocked_node(&mut self, coord: VoxelCoord) -> NodeId {
        let id = self.search.graph.get_or_create(coord);
        let node = self.search.graph.node_mut(id);
        node.path_type = PathType::Blocked;
        node.cost_malus = PathType::Blocked.default_malus();
        id
    }

    /// Sweep the mob's box from its start position to the center of
    /// `node`'s column and report whether it stays clear.
    fn can_reach_without_collision(&self, terrain: &dyn TerrainSampler, node: NodeId) -> bool {
        let start = self.search.start;
        let target = self.search.graph.node(node).coord.bottom_center();
        let delta = target.sub(start);
        let bb = self.mob.bounding_box_at(start);
        let edge = bb.average_edge_length();
        if !(edge.is_finite() && edge > 0.0) {
            return false;
        }
        let steps = (delta.length() / edge).ceil() as i32;
        if steps <= 0 {
            return true;
        }
        let step = delta.scale(1.0 / f64::from(steps));
        (1..=steps).all(|i| !has_collisions(terrain, &bb.offset(step.scale(f64::from(i)))))
    }

    fn is_neighbor_valid(&self, neighbor: Option<NodeId>, from: NodeId) -> bool {
        let Some(neighbor) = neighbor else {
            return false;
        };
        let graph = &self.search.graph;
        let n = graph.node(neighbor);
        !n.closed && (n.cost_malus >= 0.0 || graph.node(from).cost_malus < 0.0)
    }

    /// A diagonal move is allowed only if neither flanking orthogonal cell
    /// is higher than `from`, no doors are involved, and both flanks are
    /// passable, lower, or a fence pair narrow enough to slip between.
    fn is_diagonal_valid(
        &self,
        from: NodeId,
        x_side: Option<NodeId>,
        z_side: Option<NodeId>,
        diagonal: Option<NodeId>,
    ) -> bool {
        let (Some(x_side), Some(z_side), Some(diagonal)) = (x_side, z_side, diagonal) else {
            return false;
        };
        let graph = &self.search.graph;
        let (root, x_node, z_node, diag) = (
            graph.node(from),
            graph.node(x_side),
            graph.node(z_side),
            graph.node(diagonal),
        );
        if diag.closed {
            return false;
        }
        if x_node.coord.y > root.coord.y || z_node.coord.y > root.coord.y {
            return false;
        }
        if [x_node, z_node, diag]
            .iter()
            .any(|n| n.path_type == PathType::WalkableDoor)
        {
            return false;
        }
        let fence_gap = x_node.path_type == PathType::Fence
            && z_node.path_type == PathType::Fence
            && self.mob.size.width < 0.5;
        diag.cost_malus >= 0.0
            && (z_node.coord.y < root.coord.y || z_node.cost_malus >= 0.0 || fence_gap)
            && (x_node.coord.y < root.coord.y || x_node.cost_malus >= 0.0 || fence_gap)
    }

    /// Where a move toward column `coord` ends up, if anywhere.
    fn find_accepted_node(
        &mut self,
        terrain: &dyn TerrainSampler,
        coord: VoxelCoord,
        remaining_jump: i32,
        floor_level: f64,
        facing: Facing,
        origin_type: PathType,
    ) -> Option<NodeId> {
        if self.floor_level(terrain, coord) - floor_level > self.jump_height() {
            return None;
        }

        let mut result = None;
        let mut path_type = self.cached_path_type(terrain, coord);
        let malus = self.costs.malus(path_type);
        if malus >= 0.0 {
            result = Some(self.node_with_cost_at_least(coord, path_type, malus));
        }

        if let Some(id) = result {
            if origin_type.has_partial_collision()
                && self.search.graph.node(id).cost_malus >= 0.0
                && !self.can_reach_without_collision(terrain, id)
            {
                result = None;
            }
        }

        if path_type == PathType::Walkable || (self.mob.amphibious && path_type == PathType::Water)
        {
            return result;
        }

        let needs_step_up =
            result.is_none_or(|id| self.search.graph.node(id).cost_malus < 0.0);
        let can_step_up = remaining_jump > 0
            && (path_type != PathType::Fence || self.mob.can_walk_over_fences)
            && !matches!(
                path_type,
                PathType::UnpassableRail | PathType::Trapdoor | PathType::PowderSnow
            );
        if needs_step_up && can_step_up {
            result = self.find_accepted_node(
                terrain,
                coord.up(),
                remaining_jump - 1,
                floor_level,
                facing,
                origin_type,
            );
            if result.is_some_and(|id| self.blocks_step_up_corridor(terrain, coord, facing, id)) {
                result = None;
            }
        }

        if !self.mob.amphibious && path_type == PathType::Water && !self.mob.can_float {
            if self.cached_path_type(terrain, coord.down()) != PathType::Water {
                return result;
            }
            let mut cell = coord;
            while cell.y > terrain.min_y() {
                cell = cell.down();
                let below = self.cached_path_type(terrain, cell);
                if below != PathType::Water {
                    return result;
                }
                let malus = self.costs.malus(below);
                result = Some(self.node_with_cost_at_least(cell, below, malus));
            }
        }

        if path_type == PathType::Open {
            let mut fallen = 0;
            let mut cell = coord;
            while path_type == PathType::Open {
                cell = cell.down();
                if cell.y < terrain.min_y() {
                    return Some(self.blocked_node(coord));
                }
                if fallen >= self.mob.max_fall_distance {
                    return Some(self.blocked_node(cell));
                }
                fallen += 1;
                path_type = self.cached_path_type(terrain, cell);
                let malus = self.costs.malus(path_type);
                if path_type != PathType::Open && malus >= 0.0 {
                    result = Some(self.node_with_cost_at_least(cell, path_type, malus));
                    break;
                }
                if malus < 0.0 {
                    return Some(self.blocked_node(cell));
                }
            }
        }

        if path_type.has_partial_collision() && result.is_none() {
            let id = self.search.graph.get_or_create(coord);
            let node = self.search.graph.node_mut(id);
            node.closed = true;
            node.path_type = path_type;
            node.cost_malus = path_type.default_malus();
            result = Some(id);
        }

        result
    }

    /// For mobs narrower than a block stepping up into open space, check
    /// the corridor between the column they leave and the ledge they land
    /// on for overhanging geometry.
    fn blocks_step_up_corridor(
        &self,
        terrain: &dyn TerrainSampler,
        coord: VoxelCoord,
        facing: Facing,
        landed: NodeId,
    ) -> bool {
        let node = self.search.graph.node(landed);
        if !matches!(node.path_type, PathType::Open | PathType::Walkable)
            || self.mob.size.width >= 1.0
        {
            return false;
        }
        let half = f64::from(self.mob.size.width) / 2.0;
        let (dx, dz) = facing.offset();
        let cx = f64::from(coord.x - dx) + 0.5;
        let cz = f64::from(coord.z - dz) + 0.5;
        let leaving = Vec3::new(cx, f64::from(coord.y + 1), cz).floor();
        let y1 = base_floor_level(terrain, leaving);
        let y2 = base_floor_level(terrain, node.coord);
        let corridor = Aabb::new(
            cx - half,
            y1.min(y2) + 0.001,
            cz - half,
            cx + half,
            f64::from(self.mob.size.height) + y1.max(y2) - 0.002,
            cz + half,
        );
        has_collisions(terrain, &corridor)
    }
}

impl NodeEvaluator for WalkNodeEvaluator {
    fn prepare(&mut self, start: Vec3) {
        if self.search.prepared {
            warn!("evaluator prepared again without done(); discarding previous search at {start}");
            self.done();
        }
        self.search.graph.clear();
        self.search.path_types.clear();
        self.search.start = start;
        self.search.prepared = true;
    }

    fn done(&mut self) {
        self.search.graph.clear();
        self.search.path_types.clear();
        self.search.start = Vec3::default();
        self.search.prepared = false;
    }

    fn start_node(&mut self, terrain: &dyn TerrainSampler) -> NodeId {
        let start = self.search.start;
        let mut coord = start.floor();
        let mut voxel = terrain.voxel(coord);

        if self.can_stand_on(voxel) {
            while self.can_stand_on(voxel) {
                coord = coord.up();
                voxel = terrain.voxel(coord);
            }
            coord = coord.down();
        } else if self.mob.can_float && voxel.is_water() && self.is_submerged(terrain) {
            while voxel.is_source_water() {
                coord = coord.up();
                voxel = terrain.voxel(coord);
            }
            coord = coord.down();
        } else if self.mob.on_ground {
            coord.y = (start.y + 0.5).floor() as i32;
        } else {
            while (voxel.is_air() || is_pathfindable(voxel, TraversalMedium::Land))
                && coord.y > terrain.min_y()
            {
                coord = coord.down();
                voxel = terrain.voxel(coord);
            }
            coord = coord.up();
        }

        let path_type = self.cached_path_type(terrain, coord);
        let malus = self.costs.malus(path_type);
        let id = self.search.graph.get_or_create(coord);
        let node = self.search.graph.node_mut(id);
        node.path_type = path_type;
        node.cost_malus = malus;
        id
    }

    fn neighbors(&mut self, terrain: &dyn TerrainSampler, from: NodeId) -> Neighbors {
        let coord = self.search.graph.node(from).coord;
        let above = self.cached_path_type(terrain, coord.up());
        let here = self.cached_path_type(terrain, coord);
        let max_jump = if self.costs.malus(above) >= 0.0 && here != PathType::StickyHoney {
            f64::from(self.mob.max_up_step).max(1.0).floor() as i32
        } else {
            0
        };
        let floor_level = self.floor_level(terrain, coord);

        let mut out = SmallVec::new();
        let mut sides: [Option<NodeId>; 4] = [None; 4];
        for (i, facing) in Facing::HORIZONTAL.into_iter().enumerate() {
            let side = self.find_accepted_node(
                terrain,
                coord.side(facing),
                max_jump,
                floor_level,
                facing,
                here,
            );
            sides[i] = side;
            if let Some(id) = side.filter(|_| self.is_neighbor_valid(side, from)) {
                out.push(id);
            }
        }

        // HORIZONTAL is [North, South, West, East].
        for (z_idx, z_face) in [(0, Facing::North), (1, Facing::South)] {
            for (x_idx, x_face) in [(2, Facing::West), (3, Facing::East)] {
                let cell = coord.side(x_face).side(z_face);
                let diagonal =
                    self.find_accepted_node(terrain, cell, max_jump, floor_level, z_face, here);
                let valid = self.is_diagonal_valid(from, sides[x_idx], sides[z_idx], diagonal);
                if let Some(id) = diagonal.filter(|_| valid) {
                    out.push(id);
                }
            }
        }
        out
    }

    fn cached_path_type(&mut self, terrain: &dyn TerrainSampler, coord: VoxelCoord) -> PathType {
        if let Some(path_type) = self.search.path_types.get(&coord.pack()) {
            return *path_type;
        }
        let path_type = self.path_type_at(terrain, coord);
        self.search.path_types.insert(coord.pack(), path_type);
        path_type
    }

    fn path_type(&self, terrain: &dyn TerrainSampler, coord: VoxelCoord) -> PathType {
        self.path_type_at(terrain, coord)
    }

    fn costs(&self) -> &PathTypeCostMap {
        &self.costs
    }

    fn graph(&self) -> &NodeGraph {
        &self.search.graph
    }

    fn graph_mut(&mut self) -> &mut NodeGraph {
        &mut self.search.graph
    }
}
