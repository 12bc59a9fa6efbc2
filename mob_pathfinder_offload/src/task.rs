// Offloaded searches: submit on the owning thread, search on a worker.
//
// `find_path_offloaded` does everything that can fail up front on the
// caller's thread. It captures the regions covering the start/goal
// rectangle in parallel (rayon), then bincode-encodes the evaluator,
// positions, limits and those regions into one request. Only then is a
// worker thread spawned. The worker decodes the request into its own
// evaluator and a linked `SnapshotSampler`, then runs the ordinary
// `find_path`.
//
// Three channels connect the two sides:
// - worker → owner: `RegionPos` requests for regions outside the snapshot;
// - owner → worker: `RegionResponse` answers;
// - worker → owner: the final `WorkerOutcome`.
//
// The owner drives its side through `PathTask::poll` (non-blocking) or
// `PathTask::wait` (blocking). Both answer pending region requests from the
// live world and, once the outcome arrives, call the completion callback on
// the owner's thread. The pattern mirrors a relay main loop: the worker
// holds an `Arc<AtomicBool>` flag and `recv_timeout`s on its inbound
// channel so it can notice shutdown.
//
// See also: `snapshot.rs` for the worker's sampler and the blocking fetch,
// `mob_pathfinder::pathfinding` for the search itself.
//
// **Critical constraint: the callback runs at most once, and never after
// cancellation.** Cancelling (explicitly or by dropping the task) sets the
// flag, discards the callback, and detaches the worker; a search that
// finishes afterwards sends its result into a closed channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use log::{debug, error, trace};
use mob_pathfinder::{
    NodeEvaluator, Path, SearchLimits, TerrainSampler, Vec3, VoxelCoord, find_path,
};
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::snapshot::{Chunk, POLL_INTERVAL, RegionLink, RegionPos, RegionResponse, SnapshotSampler};

/// Encoded form of a search. `SearchRequestRef` is the borrowing twin used
/// for encoding; the two must keep identical field order.
#[derive(Deserialize)]
struct SearchRequest<E> {
    evaluator: E,
    start: Vec3,
    target: VoxelCoord,
    limits: SearchLimits,
    min_y: i32,
    max_y: i32,
    regions: Vec<Chunk>,
}

#[derive(Serialize)]
struct SearchRequestRef<'a, E> {
    evaluator: &'a E,
    start: Vec3,
    target: VoxelCoord,
    limits: SearchLimits,
    min_y: i32,
    max_y: i32,
    regions: &'a [Chunk],
}

enum WorkerOutcome {
    Finished(Path),
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    Running,
    /// The path was delivered to the completion callback.
    Finished,
    /// The worker could not run the search; no path was delivered.
    Failed,
    Cancelled,
}

/// Run a search on a worker thread.
///
/// `on_completion` is called with the resulting path from a later
/// `PathTask::poll` or `PathTask::wait` on the calling thread. Encoding and
/// thread-spawn failures are returned here, before any work is dispatched.
pub fn find_path_offloaded<E, W, F>(
    on_completion: F,
    evaluator: &E,
    world: &W,
    start: Vec3,
    target: VoxelCoord,
    limits: &SearchLimits,
) -> Result<PathTask>
where
    E: NodeEvaluator + Serialize + DeserializeOwned + 'static,
    W: TerrainSampler + Sync + ?Sized,
    F: FnOnce(Path) + 'static,
{
    let regions: Vec<Chunk> = RegionPos::span(start.floor(), target)
        .par_iter()
        .filter_map(|&pos| Chunk::capture(world, pos))
        .collect();
    let request = SearchRequestRef {
        evaluator,
        start,
        target,
        limits: *limits,
        min_y: world.min_y(),
        max_y: world.max_y(),
        regions: &regions,
    };
    let bytes = bincode::serialize(&request)?;
    debug!(
        "offloading search {start} -> {target}: {} regions, {} bytes",
        regions.len(),
        bytes.len()
    );

    let (request_tx, request_rx) = mpsc::channel();
    let (response_tx, response_rx) = mpsc::channel();
    let (outcome_tx, outcome_rx) = mpsc::channel();
    let cancelled = Arc::new(AtomicBool::new(false));
    let link = RegionLink::new(request_tx, response_rx, Arc::clone(&cancelled));

    let worker = thread::Builder::new()
        .name("path-worker".into())
        .spawn(move || run_worker::<E>(&bytes, link, outcome_tx))?;

    Ok(PathTask {
        status: TaskStatus::Running,
        on_completion: Some(Box::new(on_completion)),
        region_requests: request_rx,
        region_responses: response_tx,
        outcome: outcome_rx,
        cancelled,
        worker: Some(worker),
        regions_served: 0,
    })
}

fn run_worker<E: NodeEvaluator + DeserializeOwned>(
    bytes: &[u8],
    link: RegionLink,
    outcome: Sender<WorkerOutcome>,
) {
    let request: SearchRequest<E> = match bincode::deserialize(bytes) {
        Ok(request) => request,
        Err(err) => {
            error!("path worker could not decode its request: {err}");
            let _ = outcome.send(WorkerOutcome::Failed);
            return;
        }
    };
    let SearchRequest {
        mut evaluator,
        start,
        target,
        limits,
        min_y,
        max_y,
        regions,
    } = request;

    let prefetched = regions.len();
    let mut sampler = SnapshotSampler::linked(min_y, max_y, link);
    for chunk in regions {
        sampler.insert_region(chunk);
    }
    let path = find_path(&mut evaluator, &sampler, start, target, &limits);
    debug!(
        "path worker finished: {path}, {} regions used ({prefetched} prefetched)",
        sampler.region_count()
    );
    let _ = outcome.send(WorkerOutcome::Finished(path));
}

// ---------------------------------------------------------------------------
// Task handle
// ---------------------------------------------------------------------------

/// Owner-side handle to an offloaded search.
pub struct PathTask {
    status: TaskStatus,
    on_completion: Option<Box<dyn FnOnce(Path)>>,
    region_requests: Receiver<RegionPos>,
    region_responses: Sender<RegionResponse>,
    outcome: Receiver<WorkerOutcome>,
    cancelled: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    regions_served: usize,
}

impl PathTask {
    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// True once the task will deliver nothing further: finished, failed,
    /// or cancelled.
    pub fn is_finished(&self) -> bool {
        self.status != TaskStatus::Running
    }

    /// Region requests answered so far.
    pub fn regions_served(&self) -> usize {
        self.regions_served
    }

    /// Answer pending region requests from `world` and deliver the result if
    /// the worker is done. Never blocks.
    pub fn poll<W: TerrainSampler + ?Sized>(&mut self, world: &W) -> TaskStatus {
        if self.status != TaskStatus::Running {
            return self.status;
        }
        while let Ok(pos) = self.region_requests.try_recv() {
            self.serve(world, pos);
        }
        match self.outcome.try_recv() {
            Ok(WorkerOutcome::Finished(path)) => self.complete(path),
            Ok(WorkerOutcome::Failed) => self.fail(),
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                error!("path worker exited without a result");
                self.fail();
            }
        }
        self.status
    }

    /// Service the task until it leaves `Running`.
    pub fn wait<W: TerrainSampler + ?Sized>(&mut self, world: &W) -> TaskStatus {
        while self.poll(world) == TaskStatus::Running {
            match self.region_requests.recv_timeout(POLL_INTERVAL) {
                Ok(pos) => self.serve(world, pos),
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {}
            }
        }
        self.status
    }

    /// Stop the task. The callback is dropped without being called and any
    /// region fetch the worker is blocked on resolves as absent.
    pub fn cancel(&mut self) {
        if self.status != TaskStatus::Running {
            return;
        }
        debug!("path task cancelled");
        self.cancelled.store(true, Ordering::SeqCst);
        self.status = TaskStatus::Cancelled;
        self.on_completion = None;
        self.worker = None;
    }

    fn serve<W: TerrainSampler + ?Sized>(&mut self, world: &W, pos: RegionPos) {
        let chunk = Chunk::capture(world, pos);
        trace!(
            "serving region {pos} ({})",
            if chunk.is_some() { "present" } else { "absent" }
        );
        self.regions_served += 1;
        let _ = self.region_responses.send(RegionResponse { pos, chunk });
    }

    fn complete(&mut self, path: Path) {
        self.status = TaskStatus::Finished;
        self.join_worker();
        if let Some(callback) = self.on_completion.take() {
            callback(path);
        }
    }

    fn fail(&mut self) {
        self.status = TaskStatus::Failed;
        self.on_completion = None;
        self.join_worker();
    }

    fn join_worker(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!("path worker panicked");
            }
        }
    }
}

impl Drop for PathTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OffloadError;
    use mob_pathfinder::{
        MobProfile, NodeGraph, NodeId, PathType, PathTypeCostMap, Target, Voxel, VoxelWorld,
        WalkNodeEvaluator,
    };
    use mob_pathfinder::evaluator::Neighbors;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    const START: Vec3 = Vec3::new(0.5, 64.0, 0.5);

    fn flat_world() -> VoxelWorld {
        let mut world = VoxelWorld::with_origin(VoxelCoord::new(-16, 0, -16), 48, 80, 48);
        world.fill(
            VoxelCoord::new(-16, 63, -16),
            VoxelCoord::new(31, 63, 31),
            Voxel::Solid,
        );
        world
    }

    /// A world that exists only inside region (0, 0).
    struct Island(VoxelWorld);

    impl TerrainSampler for Island {
        fn voxel(&self, coord: VoxelCoord) -> Voxel {
            self.0.get(coord)
        }

        fn min_y(&self) -> i32 {
            self.0.min_y()
        }

        fn max_y(&self) -> i32 {
            self.0.max_y()
        }

        fn in_bounds(&self, coord: VoxelCoord) -> bool {
            self.0.in_grid(coord)
        }
    }

    fn island() -> Island {
        let mut world = VoxelWorld::new(16, 80, 16);
        world.fill(VoxelCoord::new(0, 63, 0), VoxelCoord::new(15, 63, 15), Voxel::Solid);
        Island(world)
    }

    fn capture_slot() -> (Rc<RefCell<Option<Path>>>, impl FnOnce(Path) + 'static) {
        let slot = Rc::new(RefCell::new(None));
        let writer = Rc::clone(&slot);
        (slot, move |path| *writer.borrow_mut() = Some(path))
    }

    #[test]
    fn offloaded_search_matches_inline() {
        let world = flat_world();
        let limits = SearchLimits::default();
        let target = VoxelCoord::new(6, 64, 0);
        let mut inline_eval = WalkNodeEvaluator::new(MobProfile::default());
        let inline = find_path(&mut inline_eval, &world, START, target, &limits);

        let (slot, on_done) = capture_slot();
        let eval = WalkNodeEvaluator::new(MobProfile::default());
        let mut task = find_path_offloaded(on_done, &eval, &world, START, target, &limits).unwrap();
        assert_eq!(task.wait(&world), TaskStatus::Finished);
        assert!(task.is_finished());

        let path = slot.borrow_mut().take().unwrap();
        assert!(path.reached());
        assert!(path.same_as(&inline));
        // The hazard scan around the start reaches into the regions west and
        // north of the snapshot.
        assert!(task.regions_served() > 0);
    }

    #[test]
    fn absent_regions_fence_the_search_in() {
        let world = island();
        let limits = SearchLimits::default();
        let target = VoxelCoord::new(30, 64, 5);
        let start = Vec3::new(2.5, 64.0, 2.5);
        let mut inline_eval = WalkNodeEvaluator::new(MobProfile::default());
        let inline = find_path(&mut inline_eval, &world, start, target, &limits);

        let (slot, on_done) = capture_slot();
        let eval = WalkNodeEvaluator::new(MobProfile::default());
        let mut task = find_path_offloaded(on_done, &eval, &world, start, target, &limits).unwrap();
        assert_eq!(task.wait(&world), TaskStatus::Finished);

        let path = slot.borrow_mut().take().unwrap();
        assert!(!path.reached());
        assert!(path.coords().all(|c| (0..16).contains(&c.x) && (0..16).contains(&c.z)));
        assert!(path.same_as(&inline));
    }

    #[test]
    fn cancelled_task_never_calls_back() {
        let world = flat_world();
        let called = Rc::new(Cell::new(false));
        let flag = Rc::clone(&called);
        let eval = WalkNodeEvaluator::new(MobProfile::default());
        let mut task = find_path_offloaded(
            move |_| flag.set(true),
            &eval,
            &world,
            START,
            VoxelCoord::new(12, 64, 12),
            &SearchLimits::default(),
        )
        .unwrap();

        task.cancel();
        assert_eq!(task.status(), TaskStatus::Cancelled);
        assert_eq!(task.poll(&world), TaskStatus::Cancelled);
        assert_eq!(task.wait(&world), TaskStatus::Cancelled);
        assert!(task.is_finished());
        assert!(!called.get());
    }

    #[test]
    fn undecodable_request_fails_the_worker() {
        let (request_tx, _request_rx) = mpsc::channel();
        let (_response_tx, response_rx) = mpsc::channel();
        let (outcome_tx, outcome_rx) = mpsc::channel();
        let link = RegionLink::new(request_tx, response_rx, Arc::new(AtomicBool::new(false)));

        run_worker::<WalkNodeEvaluator>(&[1, 2, 3], link, outcome_tx);
        assert!(matches!(outcome_rx.try_recv(), Ok(WorkerOutcome::Failed)));
    }

    /// Evaluator whose configuration refuses to serialize.
    #[derive(Deserialize)]
    struct Unencodable(WalkNodeEvaluator);

    impl Serialize for Unencodable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("not encodable"))
        }
    }

    impl NodeEvaluator for Unencodable {
        fn prepare(&mut self, start: Vec3) {
            self.0.prepare(start);
        }

        fn done(&mut self) {
            self.0.done();
        }

        fn start_node(&mut self, terrain: &dyn TerrainSampler) -> NodeId {
            self.0.start_node(terrain)
        }

        fn goal(&mut self, coord: VoxelCoord) -> Target {
            self.0.goal(coord)
        }

        fn neighbors(&mut self, terrain: &dyn TerrainSampler, node: NodeId) -> Neighbors {
            self.0.neighbors(terrain, node)
        }

        fn cached_path_type(
            &mut self,
            terrain: &dyn TerrainSampler,
            coord: VoxelCoord,
        ) -> PathType {
            self.0.cached_path_type(terrain, coord)
        }

        fn path_type(&self, terrain: &dyn TerrainSampler, coord: VoxelCoord) -> PathType {
            self.0.path_type(terrain, coord)
        }

        fn costs(&self) -> &PathTypeCostMap {
            self.0.costs()
        }

        fn graph(&self) -> &NodeGraph {
            self.0.graph()
        }

        fn graph_mut(&mut self) -> &mut NodeGraph {
            self.0.graph_mut()
        }
    }

    #[test]
    fn encoding_failure_is_reported_before_dispatch() {
        let world = flat_world();
        let called = Rc::new(Cell::new(false));
        let flag = Rc::clone(&called);
        let eval = Unencodable(WalkNodeEvaluator::new(MobProfile::default()));
        let result = find_path_offloaded(
            move |_| flag.set(true),
            &eval,
            &world,
            START,
            VoxelCoord::new(4, 64, 0),
            &SearchLimits::default(),
        );
        assert!(matches!(result, Err(OffloadError::Encode(_))));
        assert!(!called.get());
    }
}
