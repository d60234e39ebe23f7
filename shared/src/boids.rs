use bytemuck::{Pod, Zeroable};

/// Behavior uniforms read by the integrate and flock kernels.
///
/// The weights and the two radii can change between ticks; everything else is
/// fixed when the simulation starts.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct FlockParams {
    pub boid_count: u32,
    pub neighbour_distance: f32,
    pub max_speed: f32,
    /// `cos(field_of_view / 2)`, compared against the angle to a neighbour
    pub cos_half_fov: f32,
    pub separation_weight: f32,
    pub alignment_weight: f32,
    pub cohesion_weight: f32,
    pub avoidance_weight: f32,
    pub separation_radius: f32,
    pub avoidance_radius: f32,
    pub _pad: [u32; 2],
}

impl FlockParams {
    #[inline]
    pub fn neighbour_distance_sq(&self) -> f32 {
        self.neighbour_distance * self.neighbour_distance
    }
}

/// Argument record for an indexed, instanced indirect draw.
///
/// Field order matches what draw-indirect consumes verbatim.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct IndirectDrawArgs {
    pub index_count: u32,
    pub instance_count: u32,
    pub start_index: u32,
    pub base_vertex: u32,
    pub start_instance: u32,
}

impl IndirectDrawArgs {
    pub fn as_array(&self) -> [u32; 5] {
        [
            self.index_count,
            self.instance_count,
            self.start_index,
            self.base_vertex,
            self.start_instance,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_args_are_five_tightly_packed_words() {
        assert_eq!(core::mem::size_of::<IndirectDrawArgs>(), 5 * 4);
        let args = IndirectDrawArgs {
            index_count: 36,
            instance_count: 100,
            start_index: 0,
            base_vertex: 0,
            start_instance: 0,
        };
        let words: &[u32] = bytemuck::cast_slice(core::slice::from_ref(&args));
        assert_eq!(words, &args.as_array());
    }

    #[test]
    fn flock_params_are_uniform_sized() {
        assert_eq!(core::mem::size_of::<FlockParams>() % 16, 0);
    }
}
