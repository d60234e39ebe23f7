use boids_gpu_grid::{
    BruteForceFlock, CellRanges, ComputeRunner, CpuRunner, FlockingBackend, GridDescriptor,
    GridFlock, SimulationSettings,
};
use glam::Vec3;
use pretty_assertions::assert_eq;
use rand::{rngs::StdRng, Rng, SeedableRng};

const EXTENT: f32 = 54.0;
const RADIUS: f32 = 3.0;

fn population(count: usize, seed: u64) -> Vec<Vec3> {
    let mut rng = StdRng::seed_from_u64(seed);
    let half = EXTENT * 0.5;
    (0..count)
        .map(|_| {
            Vec3::new(
                rng.gen_range(-half..=half),
                rng.gen_range(-half..=half),
                rng.gen_range(-half..=half),
            )
        })
        .collect()
}

/// Sorted keys and values plus their ranges, built the way a tick builds them
fn build_index(
    grid: &GridDescriptor,
    positions: &[Vec3],
) -> (Vec<u32>, Vec<u32>, CellRanges) {
    let runner = CpuRunner::with_threads(4).unwrap();
    let padded = positions.len().next_power_of_two();
    let mut keys = vec![u32::MAX; padded];
    for (key, &p) in keys.iter_mut().zip(positions) {
        *key = grid.cell_of(p);
    }
    let mut values: Vec<u32> = (0..padded as u32).collect();
    runner.sort(&mut keys, &mut values, padded).unwrap();

    let ranges = CellRanges::new(grid.total_cells());
    ranges.rebuild(&runner, &keys, positions.len()).unwrap();
    (keys, values, ranges)
}

#[test]
fn grid_finds_exactly_the_brute_force_neighbours() {
    let grid = GridDescriptor::new(EXTENT, RADIUS).unwrap();
    let positions = population(3000, 7);
    let (_, values, ranges) = build_index(&grid, &positions);

    for (i, &p) in positions.iter().enumerate() {
        let mut via_grid: Vec<u32> = grid
            .neighbour_cells(grid.cell_of(p))
            .filter_map(|cell| ranges.range(cell))
            .flat_map(|range| values[range].iter().copied())
            .filter(|&j| j as usize != i && positions[j as usize].distance(p) <= RADIUS)
            .collect();
        via_grid.sort_unstable();

        let brute: Vec<u32> = positions
            .iter()
            .enumerate()
            .filter(|&(j, q)| j != i && q.distance(p) <= RADIUS)
            .map(|(j, _)| j as u32)
            .collect();

        assert_eq!(via_grid, brute, "agent {i} at {p}");
    }
}

#[test]
fn ranges_cover_every_sorted_slot() {
    let grid = GridDescriptor::new(EXTENT, RADIUS).unwrap();
    let positions = population(1000, 99);
    let (keys, _, ranges) = build_index(&grid, &positions);
    let sorted = &keys[..positions.len()];

    let mut covered = 0;
    for cell in 0..grid.total_cells() {
        match ranges.range(cell) {
            Some(range) => {
                assert!(sorted[range.clone()].iter().all(|&c| c == cell));
                assert!(range.start == 0 || sorted[range.start - 1] != cell);
                assert!(range.end == sorted.len() || sorted[range.end] != cell);
                covered += range.len();
            }
            None => assert!(!sorted.contains(&cell), "cell {cell} reported empty"),
        }
    }
    assert_eq!(covered, positions.len());
    assert_eq!(ranges.occupied_cells(), {
        let mut cells = sorted.to_vec();
        cells.dedup();
        cells.len()
    });
}

#[test]
fn agents_on_the_far_wall_hash_into_the_grid() {
    let grid = GridDescriptor::new(EXTENT, RADIUS).unwrap();
    let positions = vec![Vec3::splat(27.0), Vec3::splat(-27.0), Vec3::new(27.0, -27.0, 0.0)];
    let (_, _, ranges) = build_index(&grid, &positions);
    // cells 0, 4 * 81 + 8 and 728 in sorted order
    assert_eq!(ranges.range(0), Some(0..1));
    assert_eq!(ranges.range(332), Some(1..2));
    assert_eq!(ranges.range(grid.total_cells() - 1), Some(2..3));
}

#[test]
fn grid_flock_agrees_with_brute_force_flock() {
    let settings = SimulationSettings {
        boid_count: 500,
        spawn_radius: 12.0,
        rng_seed: Some(1234),
        ..SimulationSettings::default()
    };
    let (_, grid_params) = boids_gpu_grid::parameter_channel(settings.dynamic_parameters());
    let (_, brute_params) = boids_gpu_grid::parameter_channel(settings.dynamic_parameters());
    let grid = GridFlock::initialize(&settings, grid_params).unwrap();
    let brute = BruteForceFlock::initialize(&settings, brute_params).unwrap();
    assert_eq!(grid.positions(), brute.positions());

    for agent in 0..500 {
        let mut via_grid = grid.neighbours_of(agent);
        via_grid.sort_unstable();
        assert_eq!(via_grid, brute.neighbours_of(agent), "agent {agent}");
    }
}
