//! Stock behaviours for background entities and the scene built from them.

use std::{cell::Cell, rc::Rc};

use cgmath::{InnerSpace, Quaternion, Rad, Rotation, Rotation3, Vector3};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    backend::RenderBackend,
    data_structures::{
        entity::{Behaviour, FrameInput},
        transform::Transform,
    },
    engine::Engine,
    world::SpawnMode,
};

/// Asteroids leaving `-BOUND..BOUND` on x re-enter at a corner.
const BOUND: f32 = 8.0;
const MIN_DRIFT: f32 = 0.01;

/// Drifts in a straight line and tumbles with its speed.
#[derive(Debug)]
pub struct Asteroid {
    rng: StdRng,
    velocity: Option<(f32, f32)>,
}

impl Asteroid {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            velocity: None,
        }
    }

    fn random_velocity(&mut self) -> (f32, f32) {
        let mut component = || {
            let speed: f32 = self.rng.gen_range(-2.0..2.0);
            if speed.abs() < MIN_DRIFT {
                MIN_DRIFT
            } else {
                speed
            }
        };
        (component(), component())
    }
}

impl Behaviour for Asteroid {
    fn update(&mut self, transform: &mut Transform, input: &FrameInput) {
        let (x_speed, y_speed) = match self.velocity {
            Some(velocity) => velocity,
            None => {
                let velocity = self.random_velocity();
                self.velocity = Some(velocity);
                velocity
            }
        };

        let mut position = transform.position();
        position.x += x_speed * input.dt;
        position.y += y_speed * input.dt;
        if position.x.abs() > BOUND {
            position.x = if self.rng.gen_bool(0.5) { -BOUND } else { BOUND };
            position.y = if self.rng.gen_bool(0.5) { -BOUND } else { BOUND };
            self.velocity = Some(self.random_velocity());
        }
        transform.set_position(position);

        transform.rotate(Quaternion::from_angle_x(Rad(input.dt * x_speed)));
        transform.rotate(Quaternion::from_angle_y(Rad(input.dt * y_speed)));
    }
}

const RING_MIN_SPEED: f32 = 0.5;
const RING_MAX_SPEED: f32 = 4.0;
const RING_ACCELERATION: f32 = 2.0;
const RING_DECELERATION: f32 = 0.5;
/// Rings are spread evenly over this many phase slots.
const RING_SLOTS: f32 = 12.0;

/// Orbits the z axis at the distance it was spawned at.
///
/// All rings sharing a `fast` flag speed up while it is set and slow down
/// again once it is cleared.
#[derive(Debug)]
pub struct Ring {
    fast: Rc<Cell<bool>>,
    speed: f32,
    time: f32,
    radius: Option<f32>,
}

impl Ring {
    pub fn new(index: usize, fast: Rc<Cell<bool>>) -> Self {
        Self {
            fast,
            speed: RING_MIN_SPEED,
            time: index as f32 / RING_SLOTS * std::f32::consts::TAU,
            radius: None,
        }
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }
}

impl Behaviour for Ring {
    fn update(&mut self, transform: &mut Transform, input: &FrameInput) {
        let position = transform.position();
        let radius = *self
            .radius
            .get_or_insert_with(|| position.x.hypot(position.y));

        self.speed = if self.fast.get() {
            (self.speed + RING_ACCELERATION * input.dt).min(RING_MAX_SPEED)
        } else {
            (self.speed - RING_DECELERATION * input.dt).max(RING_MIN_SPEED)
        };
        self.time += self.speed * input.dt;

        transform.set_position(Vector3::new(
            radius * self.time.cos(),
            radius * self.time.sin(),
            position.z,
        ));
        transform.rotate(Quaternion::from_angle_x(Rad(self.speed * input.dt / 5.5)));
        transform.rotate(Quaternion::from_angle_y(Rad(self.speed * input.dt / 3.5)));
    }
}

/// Points its +Z axis at the mouse.
#[derive(Debug, Default)]
pub struct Link;

impl Behaviour for Link {
    fn update(&mut self, transform: &mut Transform, input: &FrameInput) {
        let target = Vector3::new(input.mouse_ndc[0], -input.mouse_ndc[1], 0.0);
        if target.magnitude2() <= f32::EPSILON {
            return;
        }
        transform.set_rotation(Quaternion::between_vectors(
            Vector3::unit_z(),
            target.normalize(),
        ));
    }
}

pub const RING_COUNT: usize = 12;
pub const ASTEROID_COUNT: usize = 24;
const RING_RADIUS: f32 = 2.5;
const RING_DEPTH: f32 = -4.0;

/// Populate `engine` with the stock backdrop.
///
/// Rings and asteroids are instanced, the link is drawn on its own. Every
/// ring reads `fast`. Entities whose mesh fails to load are skipped; the
/// number of spawned entities is returned.
pub fn spawn_background<B: RenderBackend>(
    engine: &mut Engine<B>,
    fast: Rc<Cell<bool>>,
    seed: u64,
) -> usize {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut spawned = 0;

    for index in 0..RING_COUNT {
        let mut transform = Transform::from(Vector3::new(RING_RADIUS, 0.0, RING_DEPTH));
        transform.set_scale(Vector3::new(0.6, 0.6, 0.6));
        let ring = Ring::new(index, Rc::clone(&fast));
        if engine
            .spawn("ring", SpawnMode::Instanced, transform, Some(Box::new(ring)))
            .is_ok()
        {
            spawned += 1;
        }
    }

    for _ in 0..ASTEROID_COUNT {
        let position = Vector3::new(
            rng.gen_range(-BOUND..BOUND),
            rng.gen_range(-BOUND / 2.0..BOUND / 2.0),
            rng.gen_range(-14.0..-6.0),
        );
        let size = rng.gen_range(0.3..0.9);
        let mut transform = Transform::from(position);
        transform.set_scale(Vector3::new(size, size, size));
        let asteroid = Asteroid::new(rng.r#gen());
        if engine
            .spawn(
                "asteroid",
                SpawnMode::Instanced,
                transform,
                Some(Box::new(asteroid)),
            )
            .is_ok()
        {
            spawned += 1;
        }
    }

    let mut transform = Transform::default();
    transform.set_scale(Vector3::new(0.125, 0.125, 0.125));
    if engine
        .spawn("link", SpawnMode::Unique, transform, Some(Box::new(Link)))
        .is_ok()
    {
        spawned += 1;
    }

    log::info!("spawned {} background entities", spawned);
    spawned
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use approx::assert_relative_eq;
    use cgmath::{InnerSpace, Point3, Rotation, Vector3};

    use super::{Asteroid, BOUND, Link, RING_MAX_SPEED, RING_MIN_SPEED, Ring};
    use crate::data_structures::{
        entity::{Behaviour, FrameInput},
        transform::Transform,
    };

    fn input(mouse_ndc: [f32; 2], dt: f32) -> FrameInput {
        FrameInput {
            mouse_ndc,
            mouse_world: Point3::new(0.0, 0.0, 0.0),
            dt,
        }
    }

    #[test]
    fn asteroid_stays_within_bounds() {
        let mut asteroid = Asteroid::new(7);
        let mut transform = Transform::default();
        for _ in 0..10_000 {
            asteroid.update(&mut transform, &input([0.0, 0.0], 0.1));
            assert!(transform.position().x.abs() <= BOUND + 0.2 + f32::EPSILON);
        }
        assert!(transform.is_changed());
    }

    #[test]
    fn ring_keeps_its_radius_and_respects_speed_limits() {
        let fast = Rc::new(Cell::new(true));
        let mut ring = Ring::new(3, Rc::clone(&fast));
        let mut transform = Transform::from(Vector3::new(3.0, 4.0, -2.0));

        for _ in 0..100 {
            ring.update(&mut transform, &input([0.0, 0.0], 0.1));
        }
        assert_relative_eq!(ring.speed(), RING_MAX_SPEED);
        let position = transform.position();
        assert_relative_eq!(position.x.hypot(position.y), 5.0, epsilon = 1e-4);
        assert_relative_eq!(position.z, -2.0);

        fast.set(false);
        for _ in 0..200 {
            ring.update(&mut transform, &input([0.0, 0.0], 0.1));
        }
        assert_relative_eq!(ring.speed(), RING_MIN_SPEED);
    }

    #[test]
    fn link_faces_the_mouse() {
        let mut link = Link;
        let mut transform = Transform::default();
        link.update(&mut transform, &input([1.0, 0.0], 0.016));
        let facing = transform.rotation().rotate_vector(Vector3::unit_z());
        assert_relative_eq!(facing.normalize().x, 1.0, epsilon = 1e-5);

        link.update(&mut transform, &input([0.0, 1.0], 0.016));
        let facing = transform.rotation().rotate_vector(Vector3::unit_z());
        assert_relative_eq!(facing.y, -1.0, epsilon = 1e-5);
    }
}
