use backdrop_ngin::{
    SpawnMode,
    backend::{BufferUsage, DrawKind, LoadOp, PipelineKind},
    data_structures::{
        entity::FrameInput,
        transform::{MODEL_RECORD_SIZE, Transform},
    },
};
use cgmath::{Point3, Vector3};

use crate::common::test_utils::{
    CLEAR, assert_frame_resources_alive, engine, last_frame, render,
};

mod common;

#[test]
fn unique_pass_clears_then_instance_pass_loads() {
    let mut engine = engine();
    engine
        .spawn("triangle", SpawnMode::Unique, Transform::default(), None)
        .unwrap();
    for x in 0..3 {
        let transform = Transform::from(Vector3::new(x as f32, 0.0, -2.0));
        engine
            .spawn("quad", SpawnMode::Instanced, transform, None)
            .unwrap();
    }

    render(&mut engine).unwrap();
    let frame = last_frame(&engine);

    assert_eq!(frame.passes.len(), 2);
    let (unique, instanced) = (&frame.passes[0], &frame.passes[1]);

    assert_eq!(unique.pipeline, PipelineKind::Unique);
    assert_eq!(unique.load, LoadOp::Clear(CLEAR));
    assert_eq!(unique.draws.len(), 1);
    assert_eq!(unique.draws[0].kind, DrawKind::Direct { index_count: 3 });

    assert_eq!(instanced.pipeline, PipelineKind::Instanced);
    assert_eq!(instanced.load, LoadOp::Load);
    assert_eq!(instanced.draws.len(), 1);
    assert!(matches!(instanced.draws[0].kind, DrawKind::Indirect { .. }));

    assert_frame_resources_alive(&engine, &frame);
}

#[test]
fn each_mesh_group_is_drawn_once() {
    let mut engine = engine();
    for _ in 0..4 {
        engine
            .spawn("quad", SpawnMode::Instanced, Transform::default(), None)
            .unwrap();
        engine
            .spawn("triangle", SpawnMode::Instanced, Transform::default(), None)
            .unwrap();
    }

    render(&mut engine).unwrap();
    let frame = last_frame(&engine);

    assert!(frame.passes[0].draws.is_empty());
    assert_eq!(frame.passes[0].load, LoadOp::Clear(CLEAR));
    assert_eq!(frame.passes[1].draws.len(), 2);
    assert_eq!(engine.world().groups().len(), 2);
}

#[test]
fn instance_storage_matches_the_live_count() {
    let mut engine = engine();
    let ids: Vec<_> = (0..3)
        .map(|_| {
            engine
                .spawn("quad", SpawnMode::Instanced, Transform::default(), None)
                .unwrap()
        })
        .collect();
    render(&mut engine).unwrap();

    let group = engine.world().groups().get("quad").unwrap();
    let storage = group.buffer().unwrap();
    assert_eq!(engine.backend().buffer_size(storage), Some(3 * MODEL_RECORD_SIZE));
    assert_eq!(
        engine.backend().buffer(storage).unwrap().usage,
        BufferUsage::Storage
    );
    assert_eq!(group.indirect_args(), [6, 3, 0, 0, 0]);
    let indirect = engine.backend().buffer(group.indirect_buffer().unwrap()).unwrap();
    assert_eq!(indirect.data, bytemuck::cast_slice::<u32, u8>(&[6, 3, 0, 0, 0]));

    engine.despawn(ids[1]);
    render(&mut engine).unwrap();
    let group = engine.world().groups().get("quad").unwrap();
    assert_eq!(
        engine.backend().buffer_size(group.buffer().unwrap()),
        Some(2 * MODEL_RECORD_SIZE)
    );
    assert_eq!(group.indirect_args()[1], 2);
    assert_frame_resources_alive(&engine, &last_frame(&engine));

    engine.despawn(ids[0]);
    engine.despawn(ids[2]);
    assert!(engine.world().groups().get("quad").is_none());
    render(&mut engine).unwrap();
    assert!(last_frame(&engine).passes[1].draws.is_empty());
}

#[test]
fn unchanged_frame_uploads_nothing() {
    let mut engine = engine();
    let unique = engine
        .spawn("triangle", SpawnMode::Unique, Transform::default(), None)
        .unwrap();
    engine
        .spawn("quad", SpawnMode::Instanced, Transform::default(), None)
        .unwrap();
    engine
        .spawn("quad", SpawnMode::Instanced, Transform::default(), None)
        .unwrap();

    render(&mut engine).unwrap();
    engine.backend_mut().reset_upload_count();
    render(&mut engine).unwrap();
    assert_eq!(engine.backend().upload_count(), 0);

    engine
        .world_mut()
        .entity_mut(unique)
        .unwrap()
        .set_position(Vector3::new(1.0, 0.0, 0.0));
    render(&mut engine).unwrap();
    assert_eq!(engine.backend().upload_count(), 1);

    engine.backend_mut().reset_upload_count();
    render(&mut engine).unwrap();
    assert_eq!(engine.backend().upload_count(), 0);
}

#[test]
fn moving_the_camera_rewrites_every_record() {
    let mut engine = engine();
    engine
        .spawn("triangle", SpawnMode::Unique, Transform::default(), None)
        .unwrap();
    engine
        .spawn("quad", SpawnMode::Instanced, Transform::default(), None)
        .unwrap();
    render(&mut engine).unwrap();
    engine.backend_mut().reset_upload_count();

    engine
        .world_mut()
        .camera_mut()
        .eye_mut()
        .set_position(Point3::new(0.0, 1.0, 5.0));
    render(&mut engine).unwrap();

    // the unique uniform and the quad group's storage array
    assert_eq!(engine.backend().upload_count(), 2);
    assert!(!engine.world().camera().eye().updated_view());
}

#[test]
fn colour_changes_reach_the_frame() {
    let mut engine = engine();
    render(&mut engine).unwrap();
    engine.backend_mut().reset_upload_count();

    engine.set_global_light_color([1.0, 0.0, 0.0, 1.0]);
    engine.set_clear_color([1.0, 1.0, 1.0, 1.0]);
    render(&mut engine).unwrap();

    assert_eq!(engine.backend().upload_count(), 1);
    assert_eq!(engine.world().light_color(), [1.0, 0.0, 0.0, 1.0]);
    assert_eq!(
        last_frame(&engine).passes[0].load,
        LoadOp::Clear([1.0, 1.0, 1.0, 1.0])
    );
}

#[test]
fn behaviours_run_in_update() {
    let mut engine = engine();
    let id = engine
        .spawn(
            "triangle",
            SpawnMode::Unique,
            Transform::default(),
            Some(Box::new(|transform: &mut Transform, input: &FrameInput| {
                transform.translate(Vector3::new(input.dt, 0.0, 0.0));
            })),
        )
        .unwrap();

    engine.update([0.0, 0.0], 0.5);
    engine.update([0.0, 0.0], 0.25);

    let position = engine.world().entity(id).unwrap().position();
    assert_eq!(position, Vector3::new(0.75, 0.0, 0.0));
}
