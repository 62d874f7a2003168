use nalgebra::Vector3;

/// Offset of `slot`'s first component in a 3-wide buffer.
#[inline]
pub fn vec3_offset(slot: usize) -> usize {
    3 * slot
}

/// Flat per-slot particle storage (SoA): `position` and `velocity` hold
/// `[x, y, z]` triples, `size` holds one radius per slot.
///
/// Lengths are fixed at construction; changing the particle count means
/// building a new set.
#[derive(Debug, Clone)]
pub struct ParticleBuffers {
    position: Vec<f32>,
    velocity: Vec<f32>,
    size: Vec<f32>,
}

impl ParticleBuffers {
    pub fn new(count: usize) -> Self {
        Self {
            position: vec![0.0; 3 * count],
            velocity: vec![0.0; 3 * count],
            size: vec![1.0; count],
        }
    }

    pub fn len(&self) -> usize { self.size.len() }

    pub fn is_empty(&self) -> bool { self.size.is_empty() }

    pub fn positions(&self) -> &[f32] { &self.position }

    pub fn velocities(&self) -> &[f32] { &self.velocity }

    pub fn sizes(&self) -> &[f32] { &self.size }

    pub fn position(&self, slot: usize) -> Vector3<f32> {
        let o = vec3_offset(slot);
        Vector3::from_column_slice(&self.position[o..o + 3])
    }

    pub fn velocity(&self, slot: usize) -> Vector3<f32> {
        let o = vec3_offset(slot);
        Vector3::from_column_slice(&self.velocity[o..o + 3])
    }

    pub fn size(&self, slot: usize) -> f32 { self.size[slot] }

    pub fn set_position(&mut self, slot: usize, p: &Vector3<f32>) {
        let o = vec3_offset(slot);
        self.position[o..o + 3].copy_from_slice(p.as_slice());
    }

    pub fn set_velocity(&mut self, slot: usize, v: &Vector3<f32>) {
        let o = vec3_offset(slot);
        self.velocity[o..o + 3].copy_from_slice(v.as_slice());
    }

    pub fn set_size(&mut self, slot: usize, r: f32) { self.size[slot] = r; }

    /// Mutable views of all three arrays at once, for passes that walk
    /// every slot.
    pub(crate) fn split_mut(&mut self) -> (&mut [f32], &mut [f32], &[f32]) {
        (&mut self.position, &mut self.velocity, &self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lengths_follow_count() {
        let b = ParticleBuffers::new(7);
        assert_eq!(b.len(), 7);
        assert_eq!(b.positions().len(), 21);
        assert_eq!(b.velocities().len(), 21);
        assert_eq!(b.sizes().len(), 7);
        assert!(b.sizes().iter().all(|&s| s == 1.0));
    }

    #[test]
    fn slot_round_trip_uses_stride_three() {
        let mut b = ParticleBuffers::new(4);
        b.set_position(2, &Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(&b.positions()[6..9], &[1.0, 2.0, 3.0]);
        assert_eq!(b.position(2), Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(b.position(1), Vector3::zeros());
    }

    #[test]
    fn empty_set() {
        let b = ParticleBuffers::new(0);
        assert!(b.is_empty());
        assert!(b.positions().is_empty());
    }
}
