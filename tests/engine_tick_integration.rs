//! Engine Tick Integration Tests
//!
//! These tests drive the engine root: scene staging into slots, the frame
//! loop with its delta clamping, multi-stage stepping and rendering, and a
//! full headless simulation of the demo arena.
//!
//! # Test Categories
//!
//! 1. **Scenes & slots** - staging, restaging, unknown scenes, teardown
//! 2. **Delta clamping** - step floor/ceiling, frame time limit
//! 3. **Frame loop** - manual clock, paused stages keep rendering
//! 4. **Simulation** - the demo arena stays contained over many frames

use emberengine::canvas::{Canvas, NullCanvas};
use emberengine::config::EngineConfig;
use emberengine::engine::{Engine, FrameClock, ManualClock};
use emberengine::error::EngineError;
use emberengine::game;
use emberengine::sprites::{Sprite, SpriteBuilder};
use emberengine::stage::Stage;
use emberengine::stage::scene::SceneOpts;

const MIN_STEP: f32 = 1.0 / 60.0;
const MAX_STEP: f32 = 1.0 / 15.0;

fn hud_scene(stage: &mut Stage, _engine: &mut Engine) {
    stage.insert(
        SpriteBuilder::new()
            .name("panel")
            .pos(10.0, 10.0)
            .dims(64.0, 16.0)
            .props(|p| p.render_always = true)
            .build(),
    );
}

fn play_scene(stage: &mut Stage, _engine: &mut Engine) {
    stage.insert(
        SpriteBuilder::new()
            .name("ball")
            .pos(100.0, 100.0)
            .dims(16.0, 16.0)
            .build(),
    );
}

fn engine_with_scenes() -> Engine {
    let mut engine = Engine::new(EngineConfig::new());
    engine.scene("hud", hud_scene, SceneOpts::default());
    engine.scene(
        "play",
        play_scene,
        SceneOpts {
            stage: Some(1),
            ..SceneOpts::default()
        },
    );
    engine
}

#[derive(Default)]
struct CountingCanvas {
    clears: u32,
    sprites: u32,
}

impl Canvas for CountingCanvas {
    fn clear(&mut self) {
        self.clears += 1;
    }

    fn draw_sprite(&mut self, _sprite: &Sprite) {
        self.sprites += 1;
    }
}

// =============================================================================
// CATEGORY 1: Scenes & slots
// =============================================================================

#[test]
fn staging_builds_into_the_requested_slot() {
    let mut engine = engine_with_scenes();

    let slot = engine.stage_scene("hud", None, None).unwrap();
    assert_eq!(slot, 0);
    assert!(engine.stage(0).is_some());
    assert_eq!(engine.stage(0).unwrap().select("panel").len(), 1);

    // The play scene carries its own default slot.
    let slot = engine.stage_scene("play", None, None).unwrap();
    assert_eq!(slot, 1);
    assert!(engine.stage(1).is_some());

    // An explicit slot wins over the scene default.
    let slot = engine.stage_scene("play", Some(2), None).unwrap();
    assert_eq!(slot, 2);
}

#[test]
fn unknown_scenes_error() {
    let mut engine = engine_with_scenes();
    let err = engine.stage_scene("nope", None, None).unwrap_err();
    assert!(matches!(err, EngineError::UnknownScene(name) if name == "nope"));
}

#[test]
fn restaging_replaces_the_previous_stage() {
    let mut engine = engine_with_scenes();
    engine.stage_scene("hud", Some(0), None).unwrap();
    engine.stage_scene("play", Some(0), None).unwrap();

    let stage = engine.stage(0).unwrap();
    assert!(stage.select("panel").is_empty());
    assert_eq!(stage.select("ball").len(), 1);
}

#[test]
fn clearing_stages_empties_every_slot() {
    let mut engine = engine_with_scenes();
    engine.stage_scene("hud", None, None).unwrap();
    engine.stage_scene("play", None, None).unwrap();

    engine.clear_stage(0);
    assert!(engine.stage(0).is_none());
    assert!(engine.stage(1).is_some());

    engine.clear_stages();
    assert!(engine.stage(1).is_none());
}

// =============================================================================
// CATEGORY 2: Delta clamping
// =============================================================================

#[test]
fn step_loop_clamps_deltas_into_the_step_window() {
    let mut engine = engine_with_scenes();
    engine.stage_scene("hud", None, None).unwrap();

    // A stalled frame advances at most the ceiling.
    engine.step_loop(10.0);
    assert!((engine.stage(0).unwrap().time - MAX_STEP).abs() < 1e-6);

    // A bogus negative delta advances the floor.
    engine.step_loop(-1.0);
    assert!((engine.stage(0).unwrap().time - MAX_STEP - MIN_STEP).abs() < 1e-6);

    // An in-range delta passes through untouched.
    engine.step_loop(0.02);
    assert!((engine.stage(0).unwrap().time - MAX_STEP - MIN_STEP - 0.02).abs() < 1e-6);
}

#[test]
fn tick_truncates_to_the_frame_time_limit() {
    let mut config = EngineConfig::new();
    config.frame_time_limit_ms = 50.0;
    let mut engine = Engine::new(config);
    engine.scene("hud", hud_scene, SceneOpts::default());
    engine.stage_scene("hud", None, None).unwrap();

    // 5 whole seconds of stall turn into a 50 ms step.
    engine.tick(5.0, &mut NullCanvas);
    assert!((engine.stage(0).unwrap().time - 0.05).abs() < 1e-6);
}

// =============================================================================
// CATEGORY 3: Frame loop
// =============================================================================

#[test]
fn game_loop_drains_the_clock_and_renders_each_frame() {
    let mut engine = engine_with_scenes();
    engine.stage_scene("hud", None, None).unwrap();

    let mut clock = ManualClock::fixed(10, MIN_STEP);
    let mut canvas = CountingCanvas::default();
    engine.game_loop(&mut clock, &mut canvas);

    assert!((engine.stage(0).unwrap().time - 10.0 * MIN_STEP).abs() < 1e-4);
    assert_eq!(canvas.clears, 10);
    // The panel renders always, once per frame.
    assert_eq!(canvas.sprites, 10);
    assert!(clock.next_frame().is_none());
}

#[test]
fn explicit_delta_sequences_clamp_per_frame() {
    let mut engine = engine_with_scenes();
    engine.stage_scene("hud", None, None).unwrap();

    let mut clock = ManualClock::from_deltas([1.0, 0.01, -1.0]);
    engine.game_loop(&mut clock, &mut NullCanvas);

    let expected = MAX_STEP + 0.01 + MIN_STEP;
    assert!((engine.stage(0).unwrap().time - expected).abs() < 1e-5);
}

#[test]
fn paused_stages_skip_stepping_but_keep_rendering() {
    let mut engine = engine_with_scenes();
    engine.stage_scene("hud", None, None).unwrap();
    engine.stage_scene("play", None, None).unwrap();

    engine.stage_mut(0).unwrap().pause();
    engine.step_loop(MIN_STEP);

    assert_eq!(engine.stage(0).unwrap().time, 0.0);
    assert!((engine.stage(1).unwrap().time - MIN_STEP).abs() < 1e-6);

    let mut canvas = CountingCanvas::default();
    engine.render_loop(&mut canvas);
    // The paused HUD's render-always panel still draws, alongside the
    // live stage's ball.
    assert_eq!(canvas.sprites, 2);
}

// =============================================================================
// CATEGORY 4: Simulation
// =============================================================================

#[test]
fn arena_simulation_stays_contained() {
    let mut engine = Engine::new(EngineConfig::new());
    game::register_scenes(&mut engine);
    engine.stage_scene("arena", None, None).unwrap();

    let mut rng = fastrand::Rng::with_seed(7);
    if let Some(stage) = engine.stage_mut(0) {
        game::spawn_bouncers(stage, 6, &mut rng);
    }

    // Ten seconds at 60 fps.
    let mut clock = ManualClock::fixed(600, MIN_STEP);
    engine.game_loop(&mut clock, &mut NullCanvas);

    let stage = engine.stage(0).unwrap();
    assert!((stage.time - 10.0).abs() < 1e-2);
    assert_eq!(stage.select("bouncer").len(), 6);

    // The walls are 32 units thick; nothing tunnels out of the arena.
    for &id in stage.select("bouncer") {
        let p = &stage.sprite(id).unwrap().props;
        assert!(p.x > 0.0 && p.x < 768.0, "bouncer escaped on x: {}", p.x);
        assert!(p.y > 0.0 && p.y < 448.0, "bouncer escaped on y: {}", p.y);
    }
}
