//! Neighbour-based steering: alignment, cohesion, separation and wall avoidance.

use core::sync::atomic::{AtomicU32, Ordering};

use glam::Vec3;
use shared::{
    grid::{cell_coords, linear_cell_index, offset_coords, STENCIL_OFFSETS},
    FlockParams, GridParams, ThreadId, CELL_EMPTY,
};

/// Running sums over the neighbours one agent has accepted so far
#[derive(Copy, Clone, Debug, Default)]
pub struct NeighbourAccumulator {
    align: Vec3,
    cohere: Vec3,
    separation: Vec3,
    count: u32,
}

impl NeighbourAccumulator {
    /// Within `neighbour_distance` and inside the field of view around `forward`.
    #[inline]
    pub fn is_neighbour(position: Vec3, forward: Vec3, other: Vec3, params: &FlockParams) -> bool {
        let diff = other - position;
        let dist_sq = diff.length_squared();
        if dist_sq <= 0.0 || dist_sq > params.neighbour_distance_sq() {
            return false;
        }
        forward.dot(diff) / dist_sq.sqrt() >= params.cos_half_fov
    }

    #[inline]
    pub fn add(
        &mut self,
        position: Vec3,
        other_position: Vec3,
        other_velocity: Vec3,
        params: &FlockParams,
    ) {
        self.align += other_velocity;
        self.cohere += other_position;
        let away = position - other_position;
        self.separation += away * (params.separation_radius / away.length_squared());
        self.count += 1;
    }

    /// Test `other` and accumulate it when it is a neighbour
    #[inline]
    pub fn consider(
        &mut self,
        position: Vec3,
        forward: Vec3,
        other_position: Vec3,
        other_velocity: Vec3,
        params: &FlockParams,
    ) {
        if Self::is_neighbour(position, forward, other_position, params) {
            self.add(position, other_position, other_velocity, params);
        }
    }

    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Weighted steering from the accumulated neighbours; zero with none.
    #[inline]
    pub fn steer(&self, position: Vec3, velocity: Vec3, params: &FlockParams) -> Vec3 {
        if self.count == 0 {
            return Vec3::ZERO;
        }
        let n = self.count as f32;

        let align = (self.align / n).normalize_or_zero() * params.max_speed - velocity;
        let cohere = (self.cohere / n - position).normalize_or_zero() * params.max_speed - velocity;
        let separation = self.separation / n;

        align * params.alignment_weight
            + cohere * params.cohesion_weight
            + separation * params.separation_weight
    }
}

/// Push away from every world wall closer than `avoidance_radius`.
#[inline]
pub fn boundary_avoidance(position: Vec3, params: &FlockParams, grid: &GridParams) -> Vec3 {
    let radius = params.avoidance_radius;
    if radius <= 0.0 {
        return Vec3::ZERO;
    }
    // floor for the wall distance so an agent on the wall gets a finite push
    let min_hit = 1e-3 * grid.cell_size;

    let mut push = Vec3::ZERO;
    for axis in 0..3 {
        let to_min = position[axis] - grid.min_bound;
        let to_max = grid.max_bound - position[axis];
        if to_min < radius {
            let hit = to_min.max(min_hit);
            push[axis] += radius / (hit * hit);
        }
        if to_max < radius {
            let hit = to_max.max(min_hit);
            push[axis] -= radius / (hit * hit);
        }
    }
    push * params.avoidance_weight
}

/// Call `visit` with every agent id stored in the cell containing `position`
/// and in each of its in-grid axis neighbours.
#[inline]
pub fn for_each_candidate<F: FnMut(u32)>(
    position: Vec3,
    grid: &GridParams,
    sorted_boid_ids: &[u32],
    cell_starts: &[AtomicU32],
    cell_ends: &[AtomicU32],
    mut visit: F,
) {
    let home = cell_coords(position, grid);
    for offset in STENCIL_OFFSETS {
        let Some(coords) = offset_coords(home, offset, grid.resolution) else {
            continue;
        };
        let cell = linear_cell_index(coords, grid.resolution) as usize;
        let start = cell_starts[cell].load(Ordering::Relaxed);
        if start == CELL_EMPTY {
            continue;
        }
        let end = cell_ends[cell].load(Ordering::Relaxed);
        for slot in start..end {
            visit(sorted_boid_ids[slot as usize]);
        }
    }
}

/// Behavior kernel: new acceleration for agent `thread_id` from the grid.
#[allow(clippy::too_many_arguments)]
#[inline]
pub fn flock_agent(
    thread_id: ThreadId,
    positions: &[Vec3],
    velocities: &[Vec3],
    sorted_boid_ids: &[u32],
    cell_starts: &[AtomicU32],
    cell_ends: &[AtomicU32],
    grid: &GridParams,
    params: &FlockParams,
) -> Vec3 {
    let i = thread_id.as_usize();
    let position = positions[i];
    let velocity = velocities[i];
    let forward = velocity.normalize_or_zero();

    let mut neighbours = NeighbourAccumulator::default();
    for_each_candidate(
        position,
        grid,
        sorted_boid_ids,
        cell_starts,
        cell_ends,
        |other| {
            let j = other as usize;
            if j != i {
                neighbours.consider(position, forward, positions[j], velocities[j], params);
            }
        },
    );

    neighbours.steer(position, velocity, params) + boundary_avoidance(position, params, grid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> FlockParams {
        FlockParams {
            boid_count: 2,
            neighbour_distance: 3.0,
            max_speed: 5.0,
            cos_half_fov: 0.5,
            separation_weight: 1.0,
            alignment_weight: 1.0,
            cohesion_weight: 1.0,
            avoidance_weight: 1.0,
            separation_radius: 1.0,
            avoidance_radius: 4.0,
            _pad: [0; 2],
        }
    }

    fn grid() -> GridParams {
        GridParams {
            min_bound: -27.0,
            max_bound: 27.0,
            cell_size: 6.0,
            resolution: 9,
            total_cells: 729,
            _pad: [0; 3],
        }
    }

    #[test]
    fn neighbours_respect_distance_and_field_of_view() {
        let p = params();
        let sees = |other| NeighbourAccumulator::is_neighbour(Vec3::ZERO, Vec3::X, other, &p);
        assert!(sees(Vec3::new(2.0, 0.0, 0.0)));
        // behind the agent
        assert!(!sees(Vec3::new(-2.0, 0.0, 0.0)));
        // too far
        assert!(!sees(Vec3::new(3.5, 0.0, 0.0)));
        // coincident positions never count
        assert!(!sees(Vec3::ZERO));
    }

    #[test]
    fn no_neighbours_means_no_steering() {
        let acc = NeighbourAccumulator::default();
        assert_eq!(acc.steer(Vec3::ZERO, Vec3::X, &params()), Vec3::ZERO);
    }

    #[test]
    fn separation_pushes_away_from_a_close_neighbour() {
        let mut p = params();
        p.alignment_weight = 0.0;
        p.cohesion_weight = 0.0;
        let mut acc = NeighbourAccumulator::default();
        acc.add(Vec3::ZERO, Vec3::new(0.5, 0.0, 0.0), Vec3::ZERO, &p);
        let steer = acc.steer(Vec3::ZERO, Vec3::X, &p);
        // (0 - 0.5) * 1.0 / 0.25
        assert!((steer.x + 2.0).abs() < 1e-5);
        assert_eq!(acc.count(), 1);
    }

    #[test]
    fn walls_push_inward_only_near_the_boundary() {
        let p = params();
        let g = grid();
        assert_eq!(boundary_avoidance(Vec3::ZERO, &p, &g), Vec3::ZERO);
        let near_max_x = boundary_avoidance(Vec3::new(25.0, 0.0, 0.0), &p, &g);
        assert!(near_max_x.x < 0.0);
        assert_eq!(near_max_x.y, 0.0);
        let near_min_y = boundary_avoidance(Vec3::new(0.0, -26.0, 0.0), &p, &g);
        assert!(near_min_y.y > 0.0);
    }

    #[test]
    fn candidates_come_from_the_stencil_cells() {
        let g = grid();
        let starts: Vec<AtomicU32> = (0..729).map(|_| AtomicU32::new(CELL_EMPTY)).collect();
        let ends: Vec<AtomicU32> = (0..729).map(|_| AtomicU32::new(CELL_EMPTY)).collect();
        // cell 0 holds slots [0, 2), cell 728 (far corner) holds slot [2, 3)
        starts[0].store(0, Ordering::Relaxed);
        ends[0].store(2, Ordering::Relaxed);
        starts[728].store(2, Ordering::Relaxed);
        ends[728].store(3, Ordering::Relaxed);
        let sorted_ids = [5u32, 9, 11];

        let mut seen = Vec::new();
        for_each_candidate(
            Vec3::splat(-20.0),
            &g,
            &sorted_ids,
            &starts,
            &ends,
            |id| seen.push(id),
        );
        assert_eq!(seen, vec![5, 9]);
    }
}
