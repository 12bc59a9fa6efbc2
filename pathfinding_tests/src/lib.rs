// Test-only fixtures for end-to-end pathfinding tests.
//
// Builds small voxel worlds with a known layout and runs one search through
// both execution modes: inline `find_path` and `find_path_offloaded` on a
// worker thread. The offloaded runner is a synchronous wrapper around
// `PathTask::poll` with a timeout, so a hung worker fails the test instead
// of stalling the run. Everything else goes through the same code paths a
// caller would use.
//
// See also: `tests/full_pipeline.rs` for the scenarios.

use std::cell::RefCell;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use mob_pathfinder::{
    Path, SearchLimits, TerrainSampler, Vec3, Voxel, VoxelCoord, VoxelWorld, WalkNodeEvaluator,
    find_path,
};
use mob_pathfinder_offload::{TaskStatus, find_path_offloaded};

/// Y of the stone floor in every fixture; mobs stand at `FLOOR_Y + 1`.
pub const FLOOR_Y: i32 = 63;

/// Feet position used by most scenarios.
pub const START: Vec3 = Vec3::new(0.5, 64.0, 0.5);

/// Upper bound on an offloaded search before the test is failed.
const POLL_TIMEOUT: Duration = Duration::from_secs(10);

/// Sleep between polls of an offloaded task.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// 48x80x48 world spanning -16..32 on X and Z with a stone floor.
pub fn flat_world() -> VoxelWorld {
    let mut world = VoxelWorld::with_origin(VoxelCoord::new(-16, 0, -16), 48, 80, 48);
    world.fill(
        VoxelCoord::new(-16, FLOOR_Y, -16),
        VoxelCoord::new(31, FLOOR_Y, 31),
        Voxel::Solid,
    );
    world
}

/// Fence line along X = `x` covering `z_min..=z_max`, one voxel above the
/// floor.
pub fn with_fence_line(mut world: VoxelWorld, x: i32, z_min: i32, z_max: i32) -> VoxelWorld {
    world.fill(
        VoxelCoord::new(x, FLOOR_Y + 1, z_min),
        VoxelCoord::new(x, FLOOR_Y + 1, z_max),
        Voxel::Fence,
    );
    world
}

/// Replace the floor along X = `x` with lava, across the whole world.
pub fn with_lava_trench(mut world: VoxelWorld, x: i32) -> VoxelWorld {
    let origin = world.origin;
    let z_max = origin.z + world.size_z as i32 - 1;
    world.fill(
        VoxelCoord::new(x, FLOOR_Y, origin.z),
        VoxelCoord::new(x, FLOOR_Y, z_max),
        Voxel::LAVA,
    );
    world
}

/// Solid 3x3x3 cube with `center` in the middle.
pub fn with_solid_cube(mut world: VoxelWorld, center: VoxelCoord) -> VoxelWorld {
    world.fill(center.offset(-1, -1, -1), center.offset(1, 1, 1), Voxel::Solid);
    world
}

/// Run a search inline.
pub fn run_inline(
    evaluator: &WalkNodeEvaluator,
    world: &VoxelWorld,
    start: Vec3,
    target: VoxelCoord,
    limits: &SearchLimits,
) -> Path {
    let mut evaluator = evaluator.clone();
    find_path(&mut evaluator, world, start, target, limits)
}

/// Run a search on a worker thread, servicing it from this thread until the
/// completion callback fires.
pub fn run_offloaded<W: TerrainSampler + Sync>(
    evaluator: &WalkNodeEvaluator,
    world: &W,
    start: Vec3,
    target: VoxelCoord,
    limits: &SearchLimits,
) -> Path {
    let slot = Rc::new(RefCell::new(None));
    let writer = Rc::clone(&slot);
    let mut task = find_path_offloaded(
        move |path| *writer.borrow_mut() = Some(path),
        evaluator,
        world,
        start,
        target,
        limits,
    )
    .expect("find_path_offloaded failed");

    let deadline = Instant::now() + POLL_TIMEOUT;
    loop {
        match task.poll(world) {
            TaskStatus::Running => {}
            TaskStatus::Finished => break,
            status => panic!("offloaded search ended with {status:?}"),
        }
        assert!(
            Instant::now() < deadline,
            "offloaded search did not finish within {POLL_TIMEOUT:?}"
        );
        thread::sleep(POLL_INTERVAL);
    }
    slot.borrow_mut()
        .take()
        .expect("task finished without calling back")
}

/// Run the same search both ways and check they agree.
pub fn run_both(
    evaluator: &WalkNodeEvaluator,
    world: &VoxelWorld,
    start: Vec3,
    target: VoxelCoord,
    limits: &SearchLimits,
) -> Path {
    let inline = run_inline(evaluator, world, start, target, limits);
    let offloaded = run_offloaded(evaluator, world, start, target, limits);
    assert!(
        inline.same_as(&offloaded),
        "inline {inline} and offloaded {offloaded} disagree"
    );
    assert_eq!(inline.reached(), offloaded.reached());
    assert_eq!(inline.visited_nodes(), offloaded.visited_nodes());
    inline
}
