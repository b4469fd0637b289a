//! Engine root.
//!
//! The [`Engine`] owns what the stages share: the configuration, the sprite
//! sheet and scene registries, and the stage slots themselves. It drives the
//! per-frame pass — step every stage in slot order, then render every stage
//! in slot order — from deltas supplied by an external [`FrameClock`].
//!
//! Frame deltas are clamped twice, the way the host-facing loop needs:
//! the raw delta is truncated to `frame_time_limit_ms` (so a backgrounded
//! tab or a debugger pause never produces one giant step), and the step
//! loop further clamps into `[1/60, 1/15]` seconds.

use log::info;
use rustc_hash::FxHashMap;

use crate::canvas::Canvas;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::sprites::SpriteSheet;
use crate::stage::scene::{Scene, SceneFn, SceneOpts, SceneStore};
use crate::stage::{Stage, StageOptions};

const MIN_STEP: f32 = 1.0 / 60.0;
const MAX_STEP: f32 = 1.0 / 15.0;

/// External frame scheduling collaborator.
///
/// The engine pulls elapsed seconds once per display refresh; `None` means
/// the clock was cancelled and the loop ends. No particular timer mechanism
/// is assumed beyond "the value is the time since the previous frame".
pub trait FrameClock {
    fn next_frame(&mut self) -> Option<f32>;
}

/// A deterministic clock for tests and headless runs: a fixed number of
/// frames at a fixed delta, or an explicit list of deltas.
pub struct ManualClock {
    deltas: std::collections::VecDeque<f32>,
}

impl ManualClock {
    /// `frames` ticks of `dt` seconds each.
    pub fn fixed(frames: u32, dt: f32) -> Self {
        Self {
            deltas: (0..frames).map(|_| dt).collect(),
        }
    }

    /// An explicit delta sequence.
    pub fn from_deltas(deltas: impl IntoIterator<Item = f32>) -> Self {
        Self {
            deltas: deltas.into_iter().collect(),
        }
    }
}

impl FrameClock for ManualClock {
    fn next_frame(&mut self) -> Option<f32> {
        self.deltas.pop_front()
    }
}

pub struct Engine {
    pub options: EngineConfig,
    pub scenes: SceneStore,
    sheets: FxHashMap<String, SpriteSheet>,
    stages: Vec<Option<Stage>>,
    /// Stage currently being stepped/rendered/staged.
    pub active_stage: usize,
    running: bool,
}

impl Engine {
    pub fn new(options: EngineConfig) -> Self {
        Self {
            options,
            scenes: SceneStore::default(),
            sheets: FxHashMap::default(),
            stages: Vec::new(),
            active_stage: 0,
            running: false,
        }
    }

    // ---------------------------------------------------------------
    // Registries
    // ---------------------------------------------------------------

    pub fn add_sheet(&mut self, sheet: SpriteSheet) {
        self.sheets.insert(sheet.name.clone(), sheet);
    }

    pub fn sheet(&self, name: &str) -> Result<&SpriteSheet, EngineError> {
        self.sheets
            .get(name)
            .ok_or_else(|| EngineError::UnknownSheet(name.to_owned()))
    }

    /// Register a named scene.
    pub fn scene(&mut self, name: impl Into<String>, scene_fn: SceneFn, opts: SceneOpts) {
        self.scenes.insert(name, Scene { scene_fn, opts });
    }

    // ---------------------------------------------------------------
    // Stages
    // ---------------------------------------------------------------

    pub fn stage(&self, slot: usize) -> Option<&Stage> {
        self.stages.get(slot).and_then(|s| s.as_ref())
    }

    pub fn stage_mut(&mut self, slot: usize) -> Option<&mut Stage> {
        self.stages.get_mut(slot).and_then(|s| s.as_mut())
    }

    /// The stage in the active slot.
    pub fn active(&mut self) -> Option<&mut Stage> {
        self.stage_mut(self.active_stage)
    }

    /// Build a stage for a registered scene and run its setup function.
    ///
    /// The slot is taken from the argument, the scene's options, or slot 0.
    /// An existing stage in that slot is destroyed first. Returns the slot.
    pub fn stage_scene(
        &mut self,
        name: &str,
        slot: Option<usize>,
        opts: Option<SceneOpts>,
    ) -> Result<usize, EngineError> {
        let scene = self
            .scenes
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownScene(name.to_owned()))?;
        let slot = slot.or(scene.opts.stage).unwrap_or(0);

        if let Some(old) = self.stage_mut(slot) {
            old.destroy();
        }

        let mut options = StageOptions::from_config(&self.options);
        scene.opts.apply(&mut options);
        if let Some(overrides) = opts {
            overrides.apply(&mut options);
        }

        let mut stage = Stage::new(options);
        self.active_stage = slot;
        (scene.scene_fn)(&mut stage, self);

        if self.stages.len() <= slot {
            self.stages.resize_with(slot + 1, || None);
        }
        self.stages[slot] = Some(stage);
        self.active_stage = 0;
        info!("Staged scene '{}' into slot {}", name, slot);
        Ok(slot)
    }

    /// Destroy the stage in a slot.
    pub fn clear_stage(&mut self, slot: usize) {
        if let Some(stage) = self.stage_mut(slot) {
            stage.destroy();
        }
        if let Some(entry) = self.stages.get_mut(slot) {
            *entry = None;
        }
    }

    /// Destroy every stage.
    pub fn clear_stages(&mut self) {
        for slot in 0..self.stages.len() {
            if let Some(stage) = self.stage_mut(slot) {
                stage.destroy();
            }
        }
        self.stages.clear();
    }

    // ---------------------------------------------------------------
    // Frame loop
    // ---------------------------------------------------------------

    /// Step every stage in slot order with a clamped delta.
    pub fn step_loop(&mut self, dt: f32) {
        let dt = if dt < 0.0 {
            MIN_STEP
        } else if dt > MAX_STEP {
            MAX_STEP
        } else {
            dt
        };
        for slot in 0..self.stages.len() {
            self.active_stage = slot;
            if let Some(stage) = self.stages[slot].as_mut() {
                stage.step(dt);
            }
        }
        self.active_stage = 0;
    }

    /// Render every stage in slot order.
    pub fn render_loop(&mut self, canvas: &mut dyn Canvas) {
        canvas.clear();
        for slot in 0..self.stages.len() {
            self.active_stage = slot;
            if let Some(stage) = self.stages[slot].as_mut() {
                stage.render(canvas);
            }
        }
        self.active_stage = 0;
    }

    /// One full frame: clamp the raw delta to the frame time ceiling, step,
    /// render.
    pub fn tick(&mut self, dt: f32, canvas: &mut dyn Canvas) {
        let dt = dt.min(self.options.frame_time_limit_ms / 1000.0);
        self.step_loop(dt);
        self.render_loop(canvas);
    }

    /// Pull frames from the clock until it runs dry or the game pauses.
    pub fn game_loop(&mut self, clock: &mut dyn FrameClock, canvas: &mut dyn Canvas) {
        self.running = true;
        while self.running {
            let Some(dt) = clock.next_frame() else {
                break;
            };
            self.tick(dt, canvas);
        }
    }

    /// Deregister from the frame clock: the game loop exits after the
    /// current frame. Stages keep their state.
    pub fn pause_game(&mut self) {
        self.running = false;
    }

    /// Allow the game loop to run again (call `game_loop` to resume).
    pub fn unpause_game(&mut self) {
        self.running = true;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}
