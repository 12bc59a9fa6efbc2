// A* search driver over an evaluator's lazily built node graph.
//
// `search` is the core loop. The open set is the indexed min-heap from
// `open_set.rs` (not `std::collections::BinaryHeap`) because relaxing a node
// that is already open must lower its key in place. Nodes are created on
// demand by the evaluator as `neighbors()` reaches them; nothing is
// precomputed.
//
// The heuristic is straight-line distance to the nearest target. Every
// relaxed node's heuristic is scaled by `HEURISTIC_FUDGE`, which trades
// optimality for faster termination; the start node's is not. Each heuristic
// evaluation also feeds the targets' best-node tracking, which is what the
// fallback path is built from when no target is reached.
//
// Termination is always a normal outcome: a target came within reach range,
// the open set ran dry, or the visit budget ran out. The budget counter is
// incremented before each pop and the loop stops when it reaches
// `max_visited_nodes`, so at most `max_visited_nodes - 1` nodes are
// expanded.
//
// See also: `evaluator.rs` for the node source, `walk.rs` for the walking
// evaluator, `path.rs` for the result type, and the offload crate for
// running the same search on a worker thread.
//
// **Critical constraint: determinism.** A search is a pure function of the
// terrain, the evaluator configuration, and the inputs. Ties in the heap and
// in best-node tracking resolve by insertion order.

use log::debug;

use crate::config::SearchLimits;
use crate::evaluator::NodeEvaluator;
use crate::node::{NodeGraph, NodeId, Target};
use crate::open_set::OpenSet;
use crate::path::Path;
use crate::terrain::TerrainSampler;
use crate::types::{Vec3, VoxelCoord};

/// Multiplier on the heuristic of every node except the start.
pub const HEURISTIC_FUDGE: f32 = 1.5;

/// Find a path from the mob position `start` to `target`.
///
/// Always returns a path: when the target is out of reach within `limits`,
/// the path leads to the closest node found and `reached()` is false.
pub fn find_path<E: NodeEvaluator + ?Sized>(
    evaluator: &mut E,
    terrain: &dyn TerrainSampler,
    start: Vec3,
    target: VoxelCoord,
    limits: &SearchLimits,
) -> Path {
    run(evaluator, terrain, start, &[target], limits)
        .unwrap_or_else(|| Path::new(Vec::new(), target, false))
}

/// Find a path to whichever of `targets` is best: the shortest path among
/// reached targets, otherwise the path ending closest to its target.
/// Returns `None` only if `targets` is empty.
pub fn find_path_to_any<E: NodeEvaluator + ?Sized>(
    evaluator: &mut E,
    terrain: &dyn TerrainSampler,
    start: Vec3,
    targets: &[VoxelCoord],
    limits: &SearchLimits,
) -> Option<Path> {
    run(evaluator, terrain, start, targets, limits)
}

fn run<E: NodeEvaluator + ?Sized>(
    evaluator: &mut E,
    terrain: &dyn TerrainSampler,
    start: Vec3,
    goals: &[VoxelCoord],
    limits: &SearchLimits,
) -> Option<Path> {
    if goals.is_empty() {
        return None;
    }
    evaluator.prepare(start);
    let start_node = evaluator.start_node(terrain);
    let mut targets: Vec<Target> = goals.iter().map(|&coord| evaluator.goal(coord)).collect();
    let visited = search(evaluator, terrain, start_node, &mut targets, limits);
    let path = select_path(evaluator.graph(), &targets).map(|p| p.with_visited_nodes(visited));
    evaluator.done();

    if let Some(path) = &path {
        debug!(
            "path search from {start}: {path}, visited {visited}/{} nodes",
            limits.max_visited_nodes
        );
    }
    path
}

/// Run A* from `start` until a target is within reach, the open set is
/// empty, or the budget runs out. Updates each target's best node and
/// reached flag; returns the number of nodes expanded.
pub fn search<E: NodeEvaluator + ?Sized>(
    evaluator: &mut E,
    terrain: &dyn TerrainSampler,
    start: NodeId,
    targets: &mut [Target],
    limits: &SearchLimits,
) -> u32 {
    let mut open = OpenSet::new();
    let start_h = best_heuristic(evaluator.graph(), start, targets);
    let start_node = evaluator.graph_mut().node_mut(start);
    start_node.g = 0.0;
    start_node.h = start_h;
    start_node.f = start_h;
    let start_coord = start_node.coord;
    open.insert(evaluator.graph_mut(), start);

    let max_distance = limits.max_distance_from_start;
    let mut budget_used = 0u32;
    let mut expanded = 0u32;

    while !open.is_empty() {
        budget_used += 1;
        if budget_used >= limits.max_visited_nodes {
            break;
        }
        let Some(current) = open.pop(evaluator.graph_mut()) else {
            break;
        };
        expanded += 1;

        let node = evaluator.graph_mut().node_mut(current);
        node.closed = true;
        let (coord, g, walked) = (node.coord, node.g, node.walked_distance);

        let mut reached = false;
        for target in targets.iter_mut() {
            if coord.manhattan_distance(target.coord) <= limits.reach_range {
                target.set_reached(current);
                reached = true;
            }
        }
        if reached {
            break;
        }

        if coord.distance(start_coord) >= max_distance {
            continue;
        }

        for neighbor in evaluator.neighbors(terrain, current) {
            let n = evaluator.graph().node(neighbor);
            let step = coord.distance(n.coord);
            let walked_distance = walked + step;
            let tentative_g = g + step + n.cost_malus;
            if walked_distance >= max_distance || (n.in_open_set() && tentative_g >= n.g) {
                continue;
            }

            let h = best_heuristic(evaluator.graph(), neighbor, targets) * HEURISTIC_FUDGE;
            let graph = evaluator.graph_mut();
            let n = graph.node_mut(neighbor);
            n.came_from = Some(current);
            n.g = tentative_g;
            n.h = h;
            n.walked_distance = walked_distance;
            if n.in_open_set() {
                open.change_cost(graph, neighbor, tentative_g + h);
            } else {
                n.f = tentative_g + h;
                open.insert(graph, neighbor);
            }
        }
    }
    expanded
}

/// Distance from `node` to the nearest target, recording it as each
/// target's closest approach where it improves on the best so far.
fn best_heuristic(graph: &NodeGraph, node: NodeId, targets: &mut [Target]) -> f32 {
    let coord = graph.node(node).coord;
    let mut best = f32::MAX;
    for target in targets.iter_mut() {
        let distance = coord.distance(target.coord);
        target.update_best(distance, node);
        best = best.min(distance);
    }
    best
}

fn select_path(graph: &NodeGraph, targets: &[Target]) -> Option<Path> {
    let reached = targets
        .iter()
        .filter_map(|t| {
            t.reached_by
                .map(|end| reconstruct_path(graph, end, t.coord, true))
        })
        .min_by_key(Path::len);
    if reached.is_some() {
        return reached;
    }
    targets
        .iter()
        .filter_map(|t| {
            t.best_node
                .map(|end| reconstruct_path(graph, end, t.coord, false))
        })
        .min_by(|a, b| {
            a.dist_to_target()
                .total_cmp(&b.dist_to_target())
                .then_with(|| a.len().cmp(&b.len()))
        })
}

/// Follow back-pointers from `end` to the start and return the nodes in
/// start-to-end order.
pub fn reconstruct_path(graph: &NodeGraph, end: NodeId, target: VoxelCoord, reached: bool) -> Path {
    let mut nodes = Vec::new();
    let mut current = Some(end);
    while let Some(id) = current {
        let node = graph.node(id);
        nodes.push(node.clone());
        current = node.came_from;
    }
    nodes.reverse();
    Path::new(nodes, target, reached)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MobProfile;
    use crate::terrain::VoxelWorld;
    use crate::voxel::Voxel;
    use crate::walk::WalkNodeEvaluator;
    use std::collections::BTreeSet;

    /// 48x80x48 world centered on the origin with a stone floor at y=63.
    fn flat_world() -> VoxelWorld {
        let mut world = VoxelWorld::with_origin(VoxelCoord::new(-16, 0, -16), 48, 80, 48);
        world.fill(
            VoxelCoord::new(-16, 63, -16),
            VoxelCoord::new(31, 63, 31),
            Voxel::Solid,
        );
        world
    }

    const START: Vec3 = Vec3::new(0.5, 64.0, 0.5);

    fn assert_well_formed(path: &Path) {
        assert_eq!(path.nodes()[0].coord, VoxelCoord::new(0, 64, 0));
        let unique: BTreeSet<_> = path.coords().collect();
        assert_eq!(unique.len(), path.len(), "path revisits a voxel");
        for pair in path.nodes().windows(2) {
            assert!(pair[1].g >= pair[0].g);
        }
    }

    #[test]
    fn straight_line_on_flat_ground() {
        let world = flat_world();
        let mut eval = WalkNodeEvaluator::new(MobProfile::default());
        let target = VoxelCoord::new(5, 64, 0);
        let path = find_path(&mut eval, &world, START, target, &SearchLimits::new(200, 32.0));
        assert!(path.reached());
        assert!(path.len() <= 6, "{path}");
        assert!(path.dist_to_target() <= 1.0);
        assert_eq!(path.target(), target);
        assert_well_formed(&path);
        assert!(!eval.is_prepared());
    }

    #[test]
    fn enclosed_target_yields_closest_approach() {
        let mut world = flat_world();
        world.fill(
            VoxelCoord::new(9, 64, -1),
            VoxelCoord::new(11, 66, 1),
            Voxel::Solid,
        );
        let mut eval = WalkNodeEvaluator::new(MobProfile::default());
        let limits = SearchLimits::new(400, 32.0);
        let path = find_path(&mut eval, &world, START, VoxelCoord::new(10, 65, 0), &limits);
        assert!(!path.reached());
        assert_eq!(path.end_node().map(|n| n.coord), Some(VoxelCoord::new(8, 64, 0)));
        assert!(path.visited_nodes() < limits.max_visited_nodes);
        assert_well_formed(&path);
    }

    #[test]
    fn budget_allows_one_fewer_expansion_than_max() {
        let world = flat_world();
        let mut eval = WalkNodeEvaluator::new(MobProfile::default());
        let limits = SearchLimits::new(10, 64.0);
        let path = find_path(&mut eval, &world, START, VoxelCoord::new(30, 64, 0), &limits);
        assert!(!path.reached());
        assert_eq!(path.visited_nodes(), 9);
    }

    #[test]
    fn single_visit_budget_returns_start_only() {
        let world = flat_world();
        let mut eval = WalkNodeEvaluator::new(MobProfile::default());
        let limits = SearchLimits::new(1, 32.0);
        let path = find_path(&mut eval, &world, START, VoxelCoord::new(5, 64, 0), &limits);
        assert_eq!(path.len(), 1);
        assert_eq!(path.visited_nodes(), 0);
        assert!(!path.reached());
    }

    #[test]
    fn walked_distance_stays_under_bound() {
        let world = flat_world();
        let mut eval = WalkNodeEvaluator::new(MobProfile::default());
        let limits = SearchLimits::new(500, 4.0);
        let path = find_path(&mut eval, &world, START, VoxelCoord::new(20, 64, 0), &limits);
        assert!(!path.reached());
        assert!(path.nodes().iter().all(|n| n.walked_distance < 4.0));
        assert!(path.end_node().is_some_and(|n| n.coord.x <= 4));
        assert_well_formed(&path);
    }

    #[test]
    fn wider_reach_range_stops_earlier() {
        let world = flat_world();
        let mut eval = WalkNodeEvaluator::new(MobProfile::default());
        let target = VoxelCoord::new(8, 64, 0);
        let limits = SearchLimits::new(200, 32.0).with_reach_range(3);
        let path = find_path(&mut eval, &world, START, target, &limits);
        assert!(path.reached());
        assert!(path.end_node().is_some_and(|n| n.manhattan_distance(target) <= 3));
    }

    #[test]
    fn nearest_of_several_targets_wins() {
        let world = flat_world();
        let mut eval = WalkNodeEvaluator::new(MobProfile::default());
        let near = VoxelCoord::new(-3, 64, 0);
        let far = VoxelCoord::new(12, 64, 0);
        let path = find_path_to_any(
            &mut eval,
            &world,
            START,
            &[far, near],
            &SearchLimits::new(200, 32.0),
        )
        .unwrap();
        assert!(path.reached());
        assert_eq!(path.target(), near);
        assert!(path.dist_to_target() <= 1.0);
        assert_well_formed(&path);

        assert!(
            find_path_to_any(&mut eval, &world, START, &[], &SearchLimits::default()).is_none()
        );
    }

    #[test]
    fn reconstruct_follows_back_pointers() {
        let mut graph = NodeGraph::new();
        let a = graph.get_or_create(VoxelCoord::new(0, 64, 0));
        let b = graph.get_or_create(VoxelCoord::new(1, 64, 0));
        let c = graph.get_or_create(VoxelCoord::new(2, 64, 1));
        graph.node_mut(b).came_from = Some(a);
        graph.node_mut(c).came_from = Some(b);
        let path = reconstruct_path(&graph, c, VoxelCoord::new(3, 64, 1), false);
        let coords: Vec<_> = path.coords().collect();
        assert_eq!(
            coords,
            vec![
                VoxelCoord::new(0, 64, 0),
                VoxelCoord::new(1, 64, 0),
                VoxelCoord::new(2, 64, 1),
            ]
        );
        assert!(!path.reached());
    }
}
