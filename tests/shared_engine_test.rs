use backdrop_ngin::{
    SpawnMode, backend::headless::HeadlessBackend, data_structures::transform::Transform,
    engine::DeviceState, shared::SharedEngine,
};
use futures::executor::block_on;

use crate::common::test_utils::engine;

mod common;

fn shared() -> SharedEngine<HeadlessBackend> {
    let mut engine = engine();
    engine
        .spawn("quad", SpawnMode::Instanced, Transform::default(), None)
        .unwrap();
    engine
        .spawn("triangle", SpawnMode::Unique, Transform::default(), None)
        .unwrap();
    SharedEngine::new(engine)
}

#[test]
fn frames_render_through_the_shared_engine() {
    let shared = shared();
    block_on(shared.frame().unwrap());
    block_on(shared.frame().unwrap());

    let frames = shared.with(|engine| engine.backend().frames().len());
    assert_eq!(frames, Some(2));
}

#[test]
fn busy_engine_refuses_calls_and_frames() {
    let shared = shared();
    let nested = shared.with(|_| (shared.with(|_| ()), shared.frame().is_none()));
    assert_eq!(nested, Some((None, true)));
}

#[test]
fn destroy_while_busy_runs_once_the_holder_is_done() {
    let shared = shared();
    block_on(shared.frame().unwrap());

    let deferred = shared.with(|engine| {
        let destroyed_now = shared.destroy();
        (destroyed_now, engine.state())
    });
    assert_eq!(deferred, Some((false, DeviceState::Active)));
    assert!(shared.is_destroy_requested());

    let state = shared.with(|engine| {
        (
            engine.state(),
            engine.backend().is_destroyed(),
            engine.registry().usage("quad"),
            engine.world().len(),
        )
    });
    assert_eq!(state, Some((DeviceState::Lost { explicit: true }, true, 0, 0)));
    assert!(shared.frame().is_none());
}

#[test]
fn destroy_when_idle_is_immediate() {
    let shared = shared();
    assert!(shared.destroy());
    assert!(shared.frame().is_none());
    assert_eq!(shared.with(|engine| engine.backend().live_buffers()), Some(0));
}
