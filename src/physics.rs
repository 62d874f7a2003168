use crate::buffers::ParticleBuffers;
use crate::config::SimConfig;
use nalgebra::Vector3;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Fraction of the remaining distance slot 0 covers toward the target each tick.
pub const FOLLOW_LERP: f32 = 0.1;
/// Seed used when the configuration does not carry one.
pub const DEFAULT_SEED: u64 = 0x5eed_ba11;

/// Ball-pit integrator.
///
/// Owns the particle buffers and is their only writer. Slot 0 is the
/// attractor: while `controlled` it eases toward `target` and ignores forces,
/// otherwise it is an ordinary body.
#[derive(Debug, Clone)]
pub struct Physics {
    config: SimConfig,
    buffers: ParticleBuffers,
    target: Vector3<f32>,
    controlled: bool,
}

impl Physics {
    pub fn new(config: SimConfig) -> Self {
        let seed = config.seed.unwrap_or(DEFAULT_SEED);
        let mut rng = SmallRng::seed_from_u64(seed);
        let count = config.count;
        let mut buffers = ParticleBuffers::new(count);
        let target = Vector3::zeros();

        if count > 0 {
            buffers.set_position(0, &target);
            buffers.set_size(0, config.size0);
        }
        for i in 1..count {
            let p = Vector3::new(
                spread(&mut rng, 2.0 * config.max_x),
                spread(&mut rng, 2.0 * config.max_y),
                spread(&mut rng, 2.0 * config.max_z),
            );
            buffers.set_position(i, &p);
            buffers.set_size(i, between(&mut rng, config.min_size, config.max_size));
        }

        log::debug!("physics built: {} slots, seed {:#x}", count, seed);
        Self {
            controlled: config.control_sphere0,
            config,
            buffers,
            target,
        }
    }

    /// Same configuration with a different particle count. Buffers are
    /// rebuilt from scratch, the controlled flag and target carry over.
    pub fn with_count(&self, count: usize) -> Self {
        let mut next = Physics::new(SimConfig { count, ..self.config.clone() });
        next.controlled = self.controlled;
        next.target = self.target;
        next
    }

    pub fn len(&self) -> usize { self.buffers.len() }

    pub fn is_empty(&self) -> bool { self.buffers.is_empty() }

    pub fn config(&self) -> &SimConfig { &self.config }

    pub fn buffers(&self) -> &ParticleBuffers { &self.buffers }

    pub fn target(&self) -> Vector3<f32> { self.target }

    pub fn set_target(&mut self, target: Vector3<f32>) { self.target = target; }

    pub fn is_controlled(&self) -> bool { self.controlled }

    pub fn set_controlled(&mut self, controlled: bool) { self.controlled = controlled; }

    /// Half-extents of the containing box in X and Y, usually derived from
    /// the visible world size after a resize.
    pub fn set_world_bounds(&mut self, max_x: f32, max_y: f32) {
        self.config.max_x = max_x;
        self.config.max_y = max_y;
    }

    /// Overwrite one slot's kinematic state.
    pub fn place(&mut self, slot: usize, position: Vector3<f32>, velocity: Vector3<f32>) {
        self.buffers.set_position(slot, &position);
        self.buffers.set_velocity(slot, &velocity);
    }

    pub fn set_size(&mut self, slot: usize, radius: f32) {
        self.buffers.set_size(slot, radius);
    }

    /// Advance one tick. `dt` only scales gravity; velocity is applied
    /// per tick.
    pub fn update(&mut self, dt: f32) {
        let n = self.buffers.len();
        if n == 0 {
            return;
        }

        let mut start = 0;
        if self.controlled {
            start = 1;
            let p0 = self.buffers.position(0).lerp(&self.target, FOLLOW_LERP);
            self.buffers.set_position(0, &p0);
            self.buffers.set_velocity(0, &Vector3::zeros());
        }

        self.integrate(start, dt);
        self.resolve(start);
    }

    fn integrate(&mut self, start: usize, dt: f32) {
        let Self { config, buffers, .. } = self;
        let g = dt * config.gravity;
        let friction = config.friction;
        let max_v = config.max_velocity;
        let (pos, vel, size) = buffers.split_mut();
        let pos = &mut pos[3 * start..];
        let vel = &mut vel[3 * start..];
        let size = &size[start..];

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            pos.par_chunks_exact_mut(3)
                .zip(vel.par_chunks_exact_mut(3))
                .zip(size.par_iter())
                .for_each(|((p, v), &r)| integrate_slot(p, v, g * r, friction, max_v));
        }

        #[cfg(not(feature = "parallel"))]
        for ((p, v), &r) in pos.chunks_exact_mut(3).zip(vel.chunks_exact_mut(3)).zip(size) {
            integrate_slot(p, v, g * r, friction, max_v);
        }
    }

    /// Pairwise overlap correction, attractor push-out and wall containment.
    fn resolve(&mut self, start: usize) {
        let cfg = &self.config;
        let b = &mut self.buffers;
        let n = b.len();

        for i in start..n {
            let mut pos = b.position(i);
            let mut vel = b.velocity(i);
            let radius = b.size(i);

            for j in (i + 1)..n {
                let other_pos = b.position(j);
                let other_vel = b.velocity(j);
                let diff = other_pos - pos;
                let dist = diff.norm();
                let sum_radius = radius + b.size(j);
                if dist < sum_radius {
                    let overlap = sum_radius - dist;
                    let correction = normalize_or_zero(diff) * (0.5 * overlap);
                    let vel_correction = correction * vel.norm().max(1.0);
                    pos -= correction;
                    vel -= vel_correction;
                    b.set_position(j, &(other_pos + correction));
                    b.set_velocity(j, &(other_vel + correction * other_vel.norm().max(1.0)));
                }
            }

            if self.controlled {
                let diff = b.position(0) - pos;
                let d = diff.norm();
                let sum_radius0 = radius + b.size(0);
                if d < sum_radius0 {
                    let correction = normalize_or_zero(diff) * (sum_radius0 - d);
                    let vel_correction = correction * vel.norm().max(2.0);
                    pos -= correction;
                    vel -= vel_correction;
                }
            }

            if pos.x.abs() + radius > cfg.max_x {
                pos.x = sign(pos.x) * (cfg.max_x - radius);
                vel.x = -vel.x * cfg.wall_bounce;
            }
            if cfg.gravity == 0.0 {
                if pos.y.abs() + radius > cfg.max_y {
                    pos.y = sign(pos.y) * (cfg.max_y - radius);
                    vel.y = -vel.y * cfg.wall_bounce;
                }
            } else if pos.y - radius < -cfg.max_y {
                pos.y = -cfg.max_y + radius;
                vel.y = -vel.y * cfg.wall_bounce;
            }
            let max_boundary = cfg.max_z.max(cfg.max_size);
            if pos.z.abs() + radius > max_boundary {
                pos.z = sign(pos.z) * (cfg.max_z - radius);
                vel.z = -vel.z * cfg.wall_bounce;
            }

            b.set_position(i, &pos);
            b.set_velocity(i, &vel);
        }
    }
}

fn integrate_slot(p: &mut [f32], v: &mut [f32], fall: f32, friction: f32, max_v: f32) {
    let mut vel = Vector3::from_column_slice(v);
    vel.y -= fall;
    vel *= friction;
    clamp_length(&mut vel, max_v);
    let pos = Vector3::from_column_slice(p) + vel;
    p.copy_from_slice(pos.as_slice());
    v.copy_from_slice(vel.as_slice());
}

/// Scale `v` so its length lies in `[0, max]`. A negative `max` collapses it.
fn clamp_length(v: &mut Vector3<f32>, max: f32) {
    let len = v.norm();
    if len > 0.0 {
        *v *= len.min(max).max(0.0) / len;
    }
}

fn normalize_or_zero(v: Vector3<f32>) -> Vector3<f32> {
    let len = v.norm();
    if len > 0.0 { v / len } else { v }
}

/// Sign that maps zero to zero.
fn sign(x: f32) -> f32 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Uniform in `[-range / 2, range / 2]`.
fn spread(rng: &mut SmallRng, range: f32) -> f32 {
    range * (0.5 - rng.gen_range(0.0..1.0f32))
}

/// Uniform in `[lo, hi)`, tolerating `lo > hi`.
fn between(rng: &mut SmallRng, lo: f32, hi: f32) -> f32 {
    lo + rng.gen_range(0.0..1.0f32) * (hi - lo)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn still_config(count: usize) -> SimConfig {
        SimConfig {
            count,
            gravity: 0.0,
            friction: 1.0,
            max_velocity: 100.0,
            min_size: 0.5,
            max_size: 0.5,
            size0: 0.5,
            max_x: 50.0,
            max_y: 50.0,
            max_z: 50.0,
            seed: Some(7),
            ..SimConfig::default()
        }
    }

    #[test]
    fn initial_layout_within_bounds() {
        let cfg = SimConfig { seed: Some(1), ..SimConfig::default() };
        let phys = Physics::new(cfg.clone());
        assert_eq!(phys.len(), cfg.count);
        assert_eq!(phys.buffers().position(0), Vector3::zeros());
        assert_eq!(phys.buffers().size(0), cfg.size0);
        for i in 1..phys.len() {
            let p = phys.buffers().position(i);
            assert!(p.x.abs() <= cfg.max_x);
            assert!(p.y.abs() <= cfg.max_y);
            assert!(p.z.abs() <= cfg.max_z);
            let r = phys.buffers().size(i);
            assert!(r >= cfg.min_size && r <= cfg.max_size);
        }
    }

    #[test]
    fn same_seed_same_layout() {
        let cfg = SimConfig { seed: Some(42), ..SimConfig::default() };
        let a = Physics::new(cfg.clone());
        let b = Physics::new(cfg);
        assert_eq!(a.buffers().positions(), b.buffers().positions());
        assert_eq!(a.buffers().sizes(), b.buffers().sizes());
    }

    #[test]
    fn zero_count_is_noop() {
        let mut phys = Physics::new(SimConfig { count: 0, control_sphere0: true, ..SimConfig::default() });
        phys.update(0.016);
        assert!(phys.is_empty());
    }

    #[test]
    fn gravity_scales_with_size() {
        let mut cfg = still_config(3);
        cfg.gravity = 1.0;
        cfg.max_y = 1000.0;
        let mut phys = Physics::new(cfg);
        phys.place(1, Vector3::new(-10.0, 0.0, 0.0), Vector3::zeros());
        phys.place(2, Vector3::new(10.0, 0.0, 0.0), Vector3::zeros());
        phys.place(0, Vector3::new(0.0, 40.0, 0.0), Vector3::zeros());
        phys.set_size(1, 0.5);
        phys.set_size(2, 1.0);
        phys.update(0.1);
        let v1 = phys.buffers().velocity(1).y;
        let v2 = phys.buffers().velocity(2).y;
        assert!((v1 + 0.05).abs() < 1e-6, "{v1}");
        assert!((v2 + 0.1).abs() < 1e-6, "{v2}");
    }

    #[test]
    fn friction_and_velocity_clamp() {
        let mut cfg = still_config(2);
        cfg.friction = 0.5;
        cfg.max_velocity = 0.3;
        let mut phys = Physics::new(cfg);
        phys.place(0, Vector3::new(-20.0, 0.0, 0.0), Vector3::zeros());
        phys.place(1, Vector3::new(0.0, 0.0, 0.0), Vector3::new(2.0, 0.0, 0.0));
        phys.update(0.016);
        let v = phys.buffers().velocity(1);
        assert!((v.norm() - 0.3).abs() < 1e-6);
        assert!((phys.buffers().position(1).x - 0.3).abs() < 1e-6);
    }

    #[test]
    fn controlled_slot_eases_toward_target() {
        let mut cfg = still_config(1);
        cfg.control_sphere0 = true;
        let mut phys = Physics::new(cfg);
        phys.place(0, Vector3::zeros(), Vector3::new(1.0, 1.0, 1.0));
        phys.set_target(Vector3::new(10.0, 0.0, 0.0));
        phys.update(0.016);
        assert!((phys.buffers().position(0).x - 1.0).abs() < 1e-6);
        assert_eq!(phys.buffers().velocity(0), Vector3::zeros());
    }

    #[test]
    fn overlapping_pair_is_pushed_apart() {
        let mut phys = Physics::new(still_config(3));
        phys.place(0, Vector3::new(-30.0, 0.0, 0.0), Vector3::zeros());
        phys.place(1, Vector3::new(0.0, 0.0, 0.0), Vector3::zeros());
        phys.place(2, Vector3::new(0.6, 0.0, 0.0), Vector3::zeros());
        let before = 0.6f32;
        phys.update(0.016);
        let after = (phys.buffers().position(2) - phys.buffers().position(1)).norm();
        assert!((after - 1.0).abs() < 1e-5, "{after}");
        assert!((1.0 - after).abs() <= (1.0 - before).abs());
        // Opposing velocity corrections.
        assert!(phys.buffers().velocity(1).x < 0.0);
        assert!(phys.buffers().velocity(2).x > 0.0);
    }

    #[test]
    fn coincident_pair_does_not_produce_nan() {
        let mut phys = Physics::new(still_config(3));
        phys.place(0, Vector3::new(-30.0, 0.0, 0.0), Vector3::zeros());
        phys.place(1, Vector3::new(1.0, 1.0, 1.0), Vector3::zeros());
        phys.place(2, Vector3::new(1.0, 1.0, 1.0), Vector3::zeros());
        phys.update(0.016);
        assert!(phys.buffers().positions().iter().all(|x| x.is_finite()));
    }

    #[test]
    fn attractor_pushes_free_body_only() {
        let mut cfg = still_config(2);
        cfg.control_sphere0 = true;
        let mut phys = Physics::new(cfg);
        phys.place(0, Vector3::zeros(), Vector3::zeros());
        phys.place(1, Vector3::new(0.5, 0.0, 0.0), Vector3::zeros());
        phys.update(0.016);
        assert_eq!(phys.buffers().position(0), Vector3::zeros());
        let p1 = phys.buffers().position(1);
        assert!((p1.x - 1.0).abs() < 1e-6, "{p1:?}");
        // max(|v|, 2) scaling of the push.
        assert!((phys.buffers().velocity(1).x - 1.0).abs() < 1e-6);
    }

    #[test]
    fn wall_reflects_with_bounce() {
        let mut cfg = still_config(2);
        cfg.max_x = 5.0;
        let mut phys = Physics::new(cfg);
        phys.place(0, Vector3::new(-20.0, 20.0, 0.0), Vector3::zeros());
        phys.place(1, Vector3::new(30.0, 0.0, 0.0), Vector3::new(2.0, 0.0, 0.0));
        phys.update(0.016);
        let p = phys.buffers().position(1);
        let v = phys.buffers().velocity(1);
        assert!((p.x - 4.5).abs() < 1e-6);
        assert!((v.x + 0.95 * 2.0).abs() < 1e-6);
    }

    #[test]
    fn floor_only_with_gravity() {
        let mut cfg = still_config(2);
        cfg.gravity = 1.0;
        cfg.max_y = 5.0;
        let mut phys = Physics::new(cfg);
        phys.place(0, Vector3::new(-20.0, 0.0, 0.0), Vector3::zeros());
        phys.place(1, Vector3::new(0.0, 30.0, 0.0), Vector3::zeros());
        phys.update(0.0);
        assert_eq!(phys.buffers().position(1).y, 30.0);

        phys.place(1, Vector3::new(0.0, -30.0, 0.0), Vector3::new(0.0, -1.0, 0.0));
        phys.update(0.0);
        let p = phys.buffers().position(1);
        let v = phys.buffers().velocity(1);
        assert!((p.y + 4.5).abs() < 1e-6);
        assert!((v.y - 0.95).abs() < 1e-6);
    }

    #[test]
    fn ceiling_without_gravity() {
        let mut cfg = still_config(2);
        cfg.max_y = 5.0;
        let mut phys = Physics::new(cfg);
        phys.place(0, Vector3::new(-20.0, 0.0, 0.0), Vector3::zeros());
        phys.place(1, Vector3::new(0.0, 30.0, 0.0), Vector3::zeros());
        phys.update(0.016);
        assert!((phys.buffers().position(1).y - 4.5).abs() < 1e-6);
    }

    #[test]
    fn depth_uses_max_size_for_detection() {
        let mut cfg = still_config(2);
        cfg.max_z = 0.5;
        cfg.max_size = 2.0;
        let mut phys = Physics::new(cfg);
        phys.place(0, Vector3::new(-20.0, 0.0, 0.0), Vector3::zeros());
        phys.place(1, Vector3::new(0.0, 0.0, 1.2), Vector3::zeros());
        phys.set_size(1, 0.5);
        phys.update(0.016);
        // |z| + r = 1.7 < max(0.5, 2.0): untouched.
        assert_eq!(phys.buffers().position(1).z, 1.2);
        phys.place(1, Vector3::new(0.0, 0.0, 3.0), Vector3::zeros());
        phys.update(0.016);
        assert!((phys.buffers().position(1).z - 0.0).abs() < 1e-6);
    }

    #[test]
    fn negative_config_does_not_panic() {
        let cfg = SimConfig {
            count: 20,
            max_x: -3.0,
            max_y: -1.0,
            max_z: -2.0,
            min_size: 1.0,
            max_size: -1.0,
            friction: -0.5,
            max_velocity: -1.0,
            seed: Some(3),
            ..SimConfig::default()
        };
        let mut phys = Physics::new(cfg);
        for _ in 0..10 {
            phys.update(0.016);
        }
        assert_eq!(phys.len(), 20);
    }

    #[test]
    fn with_count_rebuilds_buffers() {
        let mut phys = Physics::new(SimConfig { count: 10, ..SimConfig::default() });
        phys.set_controlled(true);
        phys.set_target(Vector3::new(1.0, 2.0, 0.0));
        let next = phys.with_count(25);
        assert_eq!(next.len(), 25);
        assert_eq!(next.buffers().positions().len(), 75);
        assert!(next.is_controlled());
        assert_eq!(next.target(), Vector3::new(1.0, 2.0, 0.0));
        assert_eq!(next.config().count, 25);
    }
}
