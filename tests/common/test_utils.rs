use backdrop_ngin::{
    Engine, EngineConfig, EngineError,
    backend::{Frame, headless::HeadlessBackend},
};

/// One triangle facing +Z, texel indices without any `vt` records.
pub const TRIANGLE_OBJ: &str = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1/1/1 2/1/1 3/1/1";

/// Two triangles sharing an edge; the shared corners must be emitted once.
pub const QUAD_OBJ: &str = "\
# unit quad
o quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 3
s off
f 1/1/1 2/2/1 3/3/1
f 1/1/1 3/3/1 4/4/1
";

pub const CLEAR: [f32; 4] = [0.1, 0.2, 0.3, 1.0];

pub type TestEngine = Engine<HeadlessBackend>;

/// A headless 800x600 engine with `triangle` and `quad` registered.
pub fn engine() -> TestEngine {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = EngineConfig::default().with_clear_color(CLEAR);
    let mut engine = Engine::with_backend(HeadlessBackend::new(800, 600), config);
    engine.registry_mut().register_source("triangle", TRIANGLE_OBJ);
    engine.registry_mut().register_source("quad", QUAD_OBJ);
    engine
}

pub fn render(engine: &mut TestEngine) -> Result<(), EngineError> {
    futures::executor::block_on(engine.render())
}

pub fn last_frame(engine: &TestEngine) -> Frame {
    engine
        .backend()
        .last_frame()
        .cloned()
        .expect("no frame was submitted")
}

/// Every handle a frame refers to is alive in the backend.
pub fn assert_frame_resources_alive(engine: &TestEngine, frame: &Frame) {
    let backend = engine.backend();
    assert!(backend.bind_group(frame.scene).is_some());
    for pass in &frame.passes {
        for draw in &pass.draws {
            assert!(backend.bind_group(draw.bind_group).is_some());
            assert!(backend.buffer(draw.geometry.vertices.buffer).is_some());
        }
    }
}
