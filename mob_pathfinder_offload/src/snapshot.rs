// Region snapshots and the worker-side terrain sampler.
//
// Terrain crosses the thread boundary in regions: 16x16 full-height voxel
// columns keyed by `RegionPos` = `(x >> 4, z >> 4)`. The owning thread
// captures regions from its live world with `Chunk::capture`; the worker
// searches against a `SnapshotSampler` holding whatever regions it has been
// given.
//
// A sampler may be connected to its owner through a `RegionLink`. When the
// search touches a region the sampler does not hold, the link sends the
// region's position back to the owner and blocks on the response channel,
// waking every `POLL_INTERVAL` to check the task's cancellation flag. The
// owner answers with the captured region or `None` if it has no such region.
// Either answer is cached, so each region is requested at most once.
//
// Absent regions read as `Air` and report `in_bounds() == false`, which the
// walk evaluator treats as impassable. A cancelled task, a disconnected
// owner, and an unlinked sampler all resolve misses the same way.
//
// See also: `task.rs` for the owner side of the channel,
// `mob_pathfinder::terrain` for the `TerrainSampler` contract.
//
// **Critical constraint: no hang on shutdown.** `RegionLink::request` is the
// only place a search can block. It must return once the cancellation flag
// is set or the owner drops its end of either channel.

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use log::{trace, warn};
use mob_pathfinder::{TerrainSampler, Voxel, VoxelCoord};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Region edge length is `1 << REGION_SHIFT` voxels.
pub const REGION_SHIFT: i32 = 4;
pub const REGION_SIZE: i32 = 1 << REGION_SHIFT;

/// How often a blocked region request re-checks for cancellation.
pub const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Horizontal index of a region column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionPos {
    pub x: i32,
    pub z: i32,
}

impl RegionPos {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// The region holding `coord`. Rounds toward negative infinity.
    pub fn containing(coord: VoxelCoord) -> Self {
        Self {
            x: coord.x >> REGION_SHIFT,
            z: coord.z >> REGION_SHIFT,
        }
    }

    /// Minimum-corner voxel of the region at height `y`.
    pub fn origin(self, y: i32) -> VoxelCoord {
        VoxelCoord::new(self.x << REGION_SHIFT, y, self.z << REGION_SHIFT)
    }

    /// Every region in the rectangle spanned by the regions holding `a` and
    /// `b`, in row-major order.
    pub fn span(a: VoxelCoord, b: VoxelCoord) -> Vec<RegionPos> {
        let lo = Self::containing(VoxelCoord::new(a.x.min(b.x), 0, a.z.min(b.z)));
        let hi = Self::containing(VoxelCoord::new(a.x.max(b.x), 0, a.z.max(b.z)));
        (lo.z..=hi.z)
            .flat_map(|z| (lo.x..=hi.x).map(move |x| Self::new(x, z)))
            .collect()
    }
}

impl fmt::Display for RegionPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.z)
    }
}

// ---------------------------------------------------------------------------
// Chunk
// ---------------------------------------------------------------------------

/// A captured region: every voxel of one 16x16 column between the world's
/// vertical bounds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pos: RegionPos,
    min_y: i32,
    height: u32,
    /// index = x + z * 16 + (y - min_y) * 256, with x and z region-local.
    voxels: Vec<Voxel>,
}

impl Chunk {
    /// Copy region `pos` out of `world`. Returns `None` if the world does
    /// not contain the region, judged by the region's minimum corner.
    pub fn capture<W: TerrainSampler + ?Sized>(world: &W, pos: RegionPos) -> Option<Chunk> {
        let min_y = world.min_y();
        let max_y = world.max_y();
        if max_y <= min_y || !world.in_bounds(pos.origin(min_y)) {
            return None;
        }
        let height = (max_y - min_y) as u32;
        let base = pos.origin(min_y);
        let mut voxels = Vec::with_capacity((REGION_SIZE * REGION_SIZE) as usize * height as usize);
        for y in min_y..max_y {
            for z in 0..REGION_SIZE {
                for x in 0..REGION_SIZE {
                    voxels.push(world.voxel(VoxelCoord::new(base.x + x, y, base.z + z)));
                }
            }
        }
        Some(Chunk {
            pos,
            min_y,
            height,
            voxels,
        })
    }

    pub fn pos(&self) -> RegionPos {
        self.pos
    }

    /// The voxel at `coord`. `Air` outside this chunk.
    pub fn get(&self, coord: VoxelCoord) -> Voxel {
        if RegionPos::containing(coord) != self.pos {
            return Voxel::Air;
        }
        let y = coord.y - self.min_y;
        if y < 0 || y as u32 >= self.height {
            return Voxel::Air;
        }
        let x = coord.x - (self.pos.x << REGION_SHIFT);
        let z = coord.z - (self.pos.z << REGION_SHIFT);
        let index =
            (x + z * REGION_SIZE) as usize + y as usize * (REGION_SIZE * REGION_SIZE) as usize;
        self.voxels.get(index).copied().unwrap_or(Voxel::Air)
    }
}

/// The owner's answer to a region request. `chunk` is `None` when the owner
/// has no such region.
#[derive(Clone, Debug)]
pub struct RegionResponse {
    pub pos: RegionPos,
    pub chunk: Option<Chunk>,
}

// ---------------------------------------------------------------------------
// Link to the owner
// ---------------------------------------------------------------------------

/// Worker end of the region request channel.
pub struct RegionLink {
    requests: Sender<RegionPos>,
    responses: Receiver<RegionResponse>,
    cancelled: Arc<AtomicBool>,
}

impl RegionLink {
    pub fn new(
        requests: Sender<RegionPos>,
        responses: Receiver<RegionResponse>,
        cancelled: Arc<AtomicBool>,
    ) -> Self {
        Self {
            requests,
            responses,
            cancelled,
        }
    }

    /// Ask the owner for `pos` and block until it answers, the task is
    /// cancelled, or the owner goes away.
    fn request(&self, pos: RegionPos) -> Option<Chunk> {
        if self.cancelled.load(Ordering::SeqCst) {
            return None;
        }
        trace!("requesting region {pos}");
        if self.requests.send(pos).is_err() {
            return None;
        }
        loop {
            match self.responses.recv_timeout(POLL_INTERVAL) {
                Ok(response) if response.pos == pos => {
                    trace!(
                        "region {pos} answered ({})",
                        if response.chunk.is_some() { "present" } else { "absent" }
                    );
                    return response.chunk;
                }
                Ok(response) => {
                    trace!("ignoring unrequested region {}", response.pos);
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.cancelled.load(Ordering::SeqCst) {
                        warn!("region {pos} request abandoned: task cancelled");
                        return None;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Sampler
// ---------------------------------------------------------------------------

/// Terrain sampler over captured regions.
pub struct SnapshotSampler {
    min_y: i32,
    max_y: i32,
    /// `None` marks a region known to be absent.
    regions: RefCell<FxHashMap<RegionPos, Option<Chunk>>>,
    link: Option<RegionLink>,
}

impl SnapshotSampler {
    /// An unlinked sampler: regions not inserted are absent.
    pub fn new(min_y: i32, max_y: i32) -> Self {
        Self {
            min_y,
            max_y,
            regions: RefCell::new(FxHashMap::default()),
            link: None,
        }
    }

    /// A sampler that fetches missing regions through `link`.
    pub fn linked(min_y: i32, max_y: i32, link: RegionLink) -> Self {
        Self {
            link: Some(link),
            ..Self::new(min_y, max_y)
        }
    }

    pub fn insert_region(&mut self, chunk: Chunk) {
        self.regions.get_mut().insert(chunk.pos(), Some(chunk));
    }

    /// Number of regions resolved so far, present or absent.
    pub fn region_count(&self) -> usize {
        self.regions.borrow().len()
    }

    /// Look up `pos`, fetching it on first use. Returns whether the region
    /// is present.
    fn ensure_region(&self, pos: RegionPos) -> bool {
        if let Some(entry) = self.regions.borrow().get(&pos) {
            return entry.is_some();
        }
        let chunk = self.link.as_ref().and_then(|link| link.request(pos));
        let present = chunk.is_some();
        self.regions.borrow_mut().insert(pos, chunk);
        present
    }

    fn y_in_range(&self, y: i32) -> bool {
        y >= self.min_y && y < self.max_y
    }
}

impl TerrainSampler for SnapshotSampler {
    fn voxel(&self, coord: VoxelCoord) -> Voxel {
        if !self.y_in_range(coord.y) {
            return Voxel::Air;
        }
        let pos = RegionPos::containing(coord);
        if !self.ensure_region(pos) {
            return Voxel::Air;
        }
        self.regions
            .borrow()
            .get(&pos)
            .and_then(Option::as_ref)
            .map_or(Voxel::Air, |chunk| chunk.get(coord))
    }

    fn min_y(&self) -> i32 {
        self.min_y
    }

    fn max_y(&self) -> i32 {
        self.max_y
    }

    fn in_bounds(&self, coord: VoxelCoord) -> bool {
        self.y_in_range(coord.y) && self.ensure_region(RegionPos::containing(coord))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mob_pathfinder::VoxelWorld;
    use std::sync::mpsc;
    use std::thread;

    fn small_world() -> VoxelWorld {
        let mut world = VoxelWorld::with_origin(VoxelCoord::new(-16, 0, -16), 48, 8, 48);
        world.set(VoxelCoord::new(-1, 2, -1), Voxel::Solid);
        world.set(VoxelCoord::new(17, 3, 5), Voxel::WATER);
        world
    }

    #[test]
    fn region_of_negative_coords_rounds_down() {
        assert_eq!(RegionPos::containing(VoxelCoord::new(0, 9, 15)), RegionPos::new(0, 0));
        assert_eq!(RegionPos::containing(VoxelCoord::new(-1, 9, 16)), RegionPos::new(-1, 1));
        assert_eq!(RegionPos::containing(VoxelCoord::new(-16, 0, -17)), RegionPos::new(-1, -2));
        assert_eq!(RegionPos::new(-1, 2).origin(5), VoxelCoord::new(-16, 5, 32));
    }

    #[test]
    fn span_covers_the_rectangle() {
        let regions = RegionPos::span(VoxelCoord::new(20, 0, -3), VoxelCoord::new(-1, 0, 4));
        assert_eq!(
            regions,
            vec![
                RegionPos::new(-1, -1),
                RegionPos::new(0, -1),
                RegionPos::new(1, -1),
                RegionPos::new(-1, 0),
                RegionPos::new(0, 0),
                RegionPos::new(1, 0),
            ]
        );
    }

    #[test]
    fn captured_chunk_reads_back_world_voxels() {
        let world = small_world();
        let chunk = Chunk::capture(&world, RegionPos::new(-1, -1)).unwrap();
        assert_eq!(chunk.get(VoxelCoord::new(-1, 2, -1)), Voxel::Solid);
        assert_eq!(chunk.get(VoxelCoord::new(-2, 2, -1)), Voxel::Air);
        // Outside the chunk's column or height.
        assert_eq!(chunk.get(VoxelCoord::new(1, 2, -1)), Voxel::Air);
        assert_eq!(chunk.get(VoxelCoord::new(-1, 8, -1)), Voxel::Air);

        let other = Chunk::capture(&world, RegionPos::new(1, 0)).unwrap();
        assert_eq!(other.get(VoxelCoord::new(17, 3, 5)), Voxel::WATER);
    }

    #[test]
    fn unlinked_sampler_treats_missing_regions_as_absent() {
        let world = small_world();
        let mut sampler = SnapshotSampler::new(world.min_y(), world.max_y());
        sampler.insert_region(Chunk::capture(&world, RegionPos::new(-1, -1)).unwrap());

        assert_eq!(sampler.voxel(VoxelCoord::new(-1, 2, -1)), Voxel::Solid);
        assert!(sampler.in_bounds(VoxelCoord::new(-1, 2, -1)));
        assert_eq!(sampler.voxel(VoxelCoord::new(17, 3, 5)), Voxel::Air);
        assert!(!sampler.in_bounds(VoxelCoord::new(17, 3, 5)));
        assert!(!sampler.in_bounds(VoxelCoord::new(-1, 8, -1)));
        assert_eq!(sampler.region_count(), 2);
    }

    #[test]
    fn linked_sampler_fetches_from_owner() {
        let (req_tx, req_rx) = mpsc::channel();
        let (resp_tx, resp_rx) = mpsc::channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        let sampler = SnapshotSampler::linked(0, 8, RegionLink::new(req_tx, resp_rx, cancelled));

        let owner = thread::spawn(move || {
            let world = small_world();
            let mut served = 0;
            while let Ok(pos) = req_rx.recv() {
                served += 1;
                // Regions east of x = 48 are not loaded on the owner side.
                let chunk = (pos.x < 3).then(|| Chunk::capture(&world, pos)).flatten();
                if resp_tx.send(RegionResponse { pos, chunk }).is_err() {
                    break;
                }
            }
            served
        });

        assert_eq!(sampler.voxel(VoxelCoord::new(17, 3, 5)), Voxel::WATER);
        // Second read of the same region is served from the cache.
        assert_eq!(sampler.voxel(VoxelCoord::new(18, 3, 5)), Voxel::Air);
        assert!(sampler.in_bounds(VoxelCoord::new(-1, 2, -1)));
        // Not loaded by the owner: answered as absent.
        assert!(!sampler.in_bounds(VoxelCoord::new(100, 2, 0)));
        drop(sampler);

        assert_eq!(owner.join().unwrap(), 3);
    }

    #[test]
    fn cancelled_link_never_blocks() {
        let (req_tx, req_rx) = mpsc::channel();
        let (_resp_tx, resp_rx) = mpsc::channel();
        let cancelled = Arc::new(AtomicBool::new(true));
        let sampler = SnapshotSampler::linked(0, 8, RegionLink::new(req_tx, resp_rx, cancelled));

        assert_eq!(sampler.voxel(VoxelCoord::new(3, 3, 3)), Voxel::Air);
        assert!(req_rx.try_recv().is_err());
    }

    #[test]
    fn cancellation_releases_a_pending_request() {
        let (req_tx, req_rx) = mpsc::channel();
        let (_resp_tx, resp_rx) = mpsc::channel::<RegionResponse>();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);

        let worker = thread::spawn(move || {
            let sampler = SnapshotSampler::linked(0, 8, RegionLink::new(req_tx, resp_rx, flag));
            sampler.in_bounds(VoxelCoord::new(3, 3, 3))
        });

        // The owner sees the request but never answers; it cancels instead.
        assert_eq!(req_rx.recv().unwrap(), RegionPos::new(0, 0));
        cancelled.store(true, Ordering::SeqCst);
        assert!(!worker.join().unwrap());
    }

    #[test]
    fn dropped_owner_resolves_as_absent() {
        let (req_tx, req_rx) = mpsc::channel();
        let (resp_tx, resp_rx) = mpsc::channel::<RegionResponse>();
        drop(req_rx);
        drop(resp_tx);
        let cancelled = Arc::new(AtomicBool::new(false));
        let sampler = SnapshotSampler::linked(0, 8, RegionLink::new(req_tx, resp_rx, cancelled));
        assert!(!sampler.in_bounds(VoxelCoord::new(3, 3, 3)));
    }
}
