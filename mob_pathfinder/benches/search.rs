//! Benchmark path searches across an obstacle field.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use mob_pathfinder::{
    MobProfile, SearchLimits, Vec3, Voxel, VoxelCoord, VoxelWorld, WalkNodeEvaluator, find_path,
};

const SIZE: i32 = 96;
const FLOOR_Y: i32 = 63;

/// Stone floor with a deterministic scatter of two-high pillars, low steps,
/// and water pools.
fn obstacle_field() -> VoxelWorld {
    let mut world = VoxelWorld::new(SIZE as u32, 80, SIZE as u32);
    world.fill(
        VoxelCoord::new(0, FLOOR_Y, 0),
        VoxelCoord::new(SIZE - 1, FLOOR_Y, SIZE - 1),
        Voxel::Solid,
    );
    for x in 2..SIZE - 2 {
        for z in 2..SIZE - 2 {
            let hash = x.wrapping_mul(73_856_093) ^ z.wrapping_mul(19_349_663);
            match hash.rem_euclid(17) {
                0 | 1 => world.fill(
                    VoxelCoord::new(x, FLOOR_Y + 1, z),
                    VoxelCoord::new(x, FLOOR_Y + 2, z),
                    Voxel::Solid,
                ),
                2 => world.set(VoxelCoord::new(x, FLOOR_Y + 1, z), Voxel::Solid),
                3 => world.set(VoxelCoord::new(x, FLOOR_Y, z), Voxel::WATER),
                _ => {}
            }
        }
    }
    world
}

fn bench_find_path(c: &mut Criterion) {
    let world = obstacle_field();
    let start = Vec3::new(1.5, f64::from(FLOOR_Y + 1), 1.5);
    let mut group = c.benchmark_group("find_path");

    for distance in [16, 32, 64] {
        let target = VoxelCoord::new(1 + distance, FLOOR_Y + 1, 1 + distance / 2);
        let limits = SearchLimits::new(2048, distance as f32 * 2.0);
        group.bench_with_input(
            BenchmarkId::from_parameter(distance),
            &target,
            |b, &target| {
                let mut eval = WalkNodeEvaluator::new(MobProfile::default());
                b.iter(|| {
                    let path = find_path(&mut eval, &world, start, black_box(target), &limits);
                    black_box(path.len())
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_find_path);
criterion_main!(benches);
