//! Scenes.
//!
//! A scene is a named setup function plus per-scene stage options. Staging
//! a scene builds a fresh stage from the engine defaults merged with the
//! scene's options (and any per-call overrides), then runs the setup
//! function to populate it.

use rustc_hash::FxHashMap;

use crate::engine::Engine;
use crate::stage::{Stage, StageOptions};

/// Scene setup callback: populate the freshly created stage. The engine is
/// available for registry lookups (sheets, config).
pub type SceneFn = fn(stage: &mut Stage, engine: &mut Engine);

/// Per-scene overrides of the stage options; `None` keeps the default.
#[derive(Debug, Clone, Default)]
pub struct SceneOpts {
    pub sort: Option<bool>,
    pub grid_w: Option<f32>,
    pub grid_h: Option<f32>,
    pub max_collisions: Option<u32>,
    pub w: Option<f32>,
    pub h: Option<f32>,
    /// Default stage slot this scene loads into.
    pub stage: Option<usize>,
}

impl SceneOpts {
    /// Fold these overrides into a set of stage options.
    pub fn apply(&self, options: &mut StageOptions) {
        if let Some(sort) = self.sort {
            options.sort = sort;
        }
        if let Some(grid_w) = self.grid_w {
            options.grid_w = grid_w;
        }
        if let Some(grid_h) = self.grid_h {
            options.grid_h = grid_h;
        }
        if let Some(max) = self.max_collisions {
            options.max_collisions = max;
        }
        if let Some(w) = self.w {
            options.w = w;
        }
        if let Some(h) = self.h {
            options.h = h;
        }
    }
}

#[derive(Clone)]
pub struct Scene {
    pub scene_fn: SceneFn,
    pub opts: SceneOpts,
}

/// Named scene registry, owned by the engine.
#[derive(Default)]
pub struct SceneStore {
    scenes: FxHashMap<String, Scene>,
}

impl SceneStore {
    pub fn insert(&mut self, name: impl Into<String>, scene: Scene) {
        self.scenes.insert(name.into(), scene);
    }

    pub fn get(&self, name: &str) -> Option<&Scene> {
        self.scenes.get(name)
    }
}
