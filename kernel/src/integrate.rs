use glam::Vec3;
use shared::{grid::cell_of, FlockParams, GridParams};

/// Advance one agent by `dt` and return the cell id of its new position.
///
/// Positions are confined to the grid bounds: a component that crosses a wall
/// is clamped onto it and its velocity component turned back inward, so the
/// grid's in-bounds precondition holds for every hashed position.
#[inline]
pub fn integrate_agent(
    position: &mut Vec3,
    velocity: &mut Vec3,
    acceleration: Vec3,
    dt: f32,
    params: &FlockParams,
    grid: &GridParams,
) -> u32 {
    let mut v = (*velocity + acceleration * dt).clamp_length_max(params.max_speed);
    let mut p = *position + v * dt;

    let lo = Vec3::splat(grid.min_bound);
    let hi = Vec3::splat(grid.max_bound);
    v = Vec3::select(p.cmplt(lo), v.abs(), v);
    v = Vec3::select(p.cmpgt(hi), -v.abs(), v);
    p = p.clamp(lo, hi);

    *position = p;
    *velocity = v;
    cell_of(p, grid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> FlockParams {
        FlockParams {
            boid_count: 1,
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
    fn velocity_is_clamped_to_max_speed() {
        let mut p = Vec3::ZERO;
        let mut v = Vec3::new(4.0, 0.0, 0.0);
        let burst = Vec3::new(100.0, 0.0, 0.0);
        integrate_agent(&mut p, &mut v, burst, 0.1, &params(), &grid());
        assert!((v.length() - 5.0).abs() < 1e-5);
        assert!((p.x - 0.5).abs() < 1e-5);
    }

    #[test]
    fn walls_reflect_and_confine() {
        let mut p = Vec3::new(26.9, 0.0, -26.9);
        let mut v = Vec3::new(5.0, 0.0, -5.0);
        let cell = integrate_agent(&mut p, &mut v, Vec3::ZERO, 1.0, &params(), &grid());
        assert_eq!(p.x, 27.0);
        assert_eq!(p.z, -27.0);
        assert!(v.x < 0.0 && v.z > 0.0);
        assert_eq!(cell, cell_of(p, &grid()));
        assert!(cell < grid().total_cells);
    }
}
