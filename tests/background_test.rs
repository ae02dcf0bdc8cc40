use std::{cell::Cell, rc::Rc};

use backdrop_ngin::{
    behaviours::{ASTEROID_COUNT, RING_COUNT, spawn_background},
    data_structures::transform::MODEL_RECORD_SIZE,
};

use crate::common::test_utils::{assert_frame_resources_alive, engine, last_frame, render};

mod common;

#[test]
fn stock_scene_draws_two_groups_and_one_link() {
    let mut engine = engine();
    engine.registry_mut().register_builtin();
    let fast = Rc::new(Cell::new(false));

    let spawned = spawn_background(&mut engine, Rc::clone(&fast), 42);
    assert_eq!(spawned, RING_COUNT + ASTEROID_COUNT + 1);
    assert_eq!(engine.world().len(), spawned);

    render(&mut engine).unwrap();
    let frame = last_frame(&engine);
    assert_eq!(frame.passes[0].draws.len(), 1);
    assert_eq!(frame.passes[1].draws.len(), 2);
    assert_frame_resources_alive(&engine, &frame);

    let asteroids = engine.world().groups().get("asteroid").unwrap();
    assert_eq!(
        engine.backend().buffer_size(asteroids.buffer().unwrap()),
        Some(ASTEROID_COUNT as u64 * MODEL_RECORD_SIZE)
    );
    assert_eq!(
        engine.world().groups().get("ring").unwrap().indirect_args()[1],
        RING_COUNT as u32
    );
}

#[test]
fn animated_scene_uploads_every_frame() {
    let mut engine = engine();
    engine.registry_mut().register_builtin();
    let fast = Rc::new(Cell::new(true));
    spawn_background(&mut engine, Rc::clone(&fast), 7);
    render(&mut engine).unwrap();

    for frame in 0..30 {
        if frame == 15 {
            fast.set(false);
        }
        engine.backend_mut().reset_upload_count();
        engine.update([0.25, -0.5], 1.0 / 60.0);
        render(&mut engine).unwrap();
        // both storage arrays and the link's uniform
        assert_eq!(engine.backend().upload_count(), 3);
    }
}

#[test]
fn missing_meshes_spawn_nothing() {
    let mut engine = engine();
    let spawned = spawn_background(&mut engine, Rc::new(Cell::new(false)), 1);
    assert_eq!(spawned, 0);
    assert!(engine.world().is_empty());
    render(&mut engine).unwrap();
}
