use backdrop_ngin::{
    EngineError, SpawnMode,
    backend::LossReason,
    data_structures::transform::{MODEL_RECORD_SIZE, Transform},
    engine::DeviceState,
};

use crate::common::test_utils::{
    TestEngine, assert_frame_resources_alive, engine, last_frame, render,
};

mod common;

fn populated() -> TestEngine {
    let mut engine = engine();
    engine
        .spawn("triangle", SpawnMode::Unique, Transform::default(), None)
        .unwrap();
    engine
        .spawn("quad", SpawnMode::Instanced, Transform::default(), None)
        .unwrap();
    engine
        .spawn("quad", SpawnMode::Instanced, Transform::default(), None)
        .unwrap();
    render(&mut engine).unwrap();
    engine
}

#[test]
fn lost_device_is_recreated_and_the_scene_restored() {
    let mut engine = populated();
    let buffers = engine.backend().live_buffers();
    let bind_groups = engine.backend().live_bind_groups();
    let before = last_frame(&engine);

    engine.backend_mut().simulate_device_loss(LossReason::Unknown);
    render(&mut engine).unwrap();

    assert_eq!(engine.state(), DeviceState::Active);
    assert_eq!(engine.backend().recreations(), 1);
    assert_eq!(engine.backend().frames().len(), 2);
    assert_eq!(engine.backend().live_buffers(), buffers);
    assert_eq!(engine.backend().live_bind_groups(), bind_groups);

    let after = last_frame(&engine);
    assert_frame_resources_alive(&engine, &after);
    assert_eq!(after.passes[0].draws.len(), before.passes[0].draws.len());
    assert_eq!(after.passes[1].draws.len(), before.passes[1].draws.len());

    let group = engine.world().groups().get("quad").unwrap();
    assert_eq!(
        engine.backend().buffer_size(group.buffer().unwrap()),
        Some(2 * MODEL_RECORD_SIZE)
    );
    assert_eq!(group.indirect_args()[1], 2);

    render(&mut engine).unwrap();
    assert_eq!(engine.backend().recreations(), 1);
}

#[test]
fn destroy_is_final() {
    let mut engine = populated();
    engine.destroy();

    assert!(engine.backend().is_destroyed());
    assert_eq!(engine.state(), DeviceState::Lost { explicit: true });
    assert_eq!(engine.backend().live_buffers(), 0);
    assert_eq!(engine.registry().usage("quad"), 0);

    render(&mut engine).unwrap();
    render(&mut engine).unwrap();
    assert_eq!(engine.backend().frames().len(), 1);
    assert_eq!(engine.backend().recreations(), 0);

    engine.destroy();
    assert_eq!(engine.state(), DeviceState::Lost { explicit: true });
}

#[test]
fn loss_reported_as_destroyed_is_not_recovered() {
    let mut engine = populated();
    engine.backend_mut().simulate_device_loss(LossReason::Destroyed);

    render(&mut engine).unwrap();

    assert_eq!(engine.state(), DeviceState::Lost { explicit: true });
    assert_eq!(engine.backend().recreations(), 0);
    assert_eq!(engine.backend().frames().len(), 1);
    assert!(engine.world().is_empty());
    assert!(engine.world().groups().is_empty());
    assert!(!engine.registry().is_loaded("quad"));
    assert!(!engine.registry().is_loaded("triangle"));
}

#[test]
fn failed_recreation_is_fatal() {
    let mut engine = populated();
    engine.backend_mut().fail_next_recreate();
    engine.backend_mut().simulate_device_loss(LossReason::Unknown);

    assert!(matches!(render(&mut engine), Err(EngineError::DeviceLost(_))));
    assert_eq!(engine.state(), DeviceState::Lost { explicit: false });
    assert_eq!(engine.backend().recreations(), 0);

    assert!(matches!(render(&mut engine), Err(EngineError::DeviceLost(_))));
    assert_eq!(engine.backend().frames().len(), 1);
}

#[test]
fn destroy_after_failed_recreation_releases_the_scene() {
    let mut engine = populated();
    engine.backend_mut().fail_next_recreate();
    engine.backend_mut().simulate_device_loss(LossReason::Unknown);
    assert!(render(&mut engine).is_err());
    assert_eq!(engine.registry().usage("quad"), 2);

    engine.destroy();

    assert_eq!(engine.state(), DeviceState::Lost { explicit: true });
    assert!(engine.backend().is_destroyed());
    assert!(engine.world().is_empty());
    assert!(engine.world().groups().is_empty());
    assert_eq!(engine.registry().usage("quad"), 0);
    assert_eq!(engine.registry().usage("triangle"), 0);
    assert!(!engine.registry().is_loaded("quad"));
    assert_eq!(engine.backend().live_buffers(), 0);

    render(&mut engine).unwrap();
    assert_eq!(engine.backend().frames().len(), 1);
}
