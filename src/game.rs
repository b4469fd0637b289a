//! Headless demo scene.
//!
//! Builds a walled arena out of a tile layer and scatters bouncing sprites
//! in it. Used by the demo binary to exercise the whole pipeline — stage
//! stepping, platformer integration, tile and sprite collision, bump
//! events — without a rendering backend.

use glam::Vec2;
use log::{debug, info};

use crate::components::{aibounce, platformer, viewport};
use crate::engine::Engine;
use crate::events::EventData;
use crate::sprites::{SPRITE_DEFAULT, SPRITE_ENEMY, SpriteBuilder, SpriteId};
use crate::stage::Stage;
use crate::stage::scene::SceneOpts;
use crate::tiles::{TileData, TileLayer};

/// Arena dimensions in tiles.
const ARENA_COLS: usize = 24;
const ARENA_ROWS: usize = 14;
const TILE_SIZE: f32 = 32.0;

/// Register the demo scenes on an engine.
pub fn register_scenes(engine: &mut Engine) {
    engine.scene("arena", arena_scene, SceneOpts::default());
}

/// A rectangle of wall tiles (id 1) around an empty interior.
fn arena_tiles() -> TileData {
    let mut tiles = vec![vec![0i32; ARENA_COLS]; ARENA_ROWS];
    for (y, row) in tiles.iter_mut().enumerate() {
        for (x, tile) in row.iter_mut().enumerate() {
            if y == 0 || y == ARENA_ROWS - 1 || x == 0 || x == ARENA_COLS - 1 {
                *tile = 1;
            }
        }
    }
    TileData::new(tiles).expect("arena grid is rectangular")
}

fn arena_scene(stage: &mut Stage, _engine: &mut Engine) {
    let layer = TileLayer::new(TILE_SIZE, TILE_SIZE, arena_tiles());
    stage.collision_layer(
        SpriteBuilder::new()
            .name("walls")
            .kind(SPRITE_DEFAULT)
            .tile_layer(layer)
            .build(),
    );

    viewport::attach(stage);
}

/// Scatter `count` bouncing boxes with random velocities.
pub fn spawn_bouncers(stage: &mut Stage, count: u32, rng: &mut fastrand::Rng) {
    let interior_w = (ARENA_COLS as f32 - 2.0) * TILE_SIZE;
    let interior_h = (ARENA_ROWS as f32 - 2.0) * TILE_SIZE;

    for i in 0..count {
        let x = TILE_SIZE + 16.0 + rng.f32() * (interior_w - 32.0);
        let y = TILE_SIZE + 16.0 + rng.f32() * (interior_h / 2.0);
        let vx = -80.0 + rng.f32() * 160.0;

        let id = stage.insert(
            SpriteBuilder::new()
                .name("bouncer")
                .pos(x, y)
                .dims(16.0, 16.0)
                .kind(SPRITE_DEFAULT | SPRITE_ENEMY)
                .z(i as f32)
                .props(|p| p.vx = vx)
                .build(),
        );
        platformer::attach(stage, id);
        aibounce::attach(stage, id, aibounce::Direction::Left);
        stage.on(id, "bump", id, log_bump);
    }
    info!("Spawned {} bouncers", count);
}

fn log_bump(stage: &mut Stage, owner: SpriteId, _target: SpriteId, data: &mut EventData) {
    let EventData::Hit(col) = data else {
        return;
    };
    let pos = stage
        .sprite(owner)
        .map(|s| Vec2::new(s.props.x, s.props.y))
        .unwrap_or(Vec2::ZERO);
    debug!(
        "bump: sprite {:?} at ({:.1}, {:.1}) normal ({:.2}, {:.2}) impact {:.1}",
        owner, pos.x, pos.y, col.normal.x, col.normal.y, col.impact
    );
}

/// Log a compact end-of-run summary of the stage contents.
pub fn summarize(stage: &Stage) {
    info!(
        "Stage holds {} items ({} bouncers) after {:.2}s of simulated time",
        stage.items().len(),
        stage.select("bouncer").len(),
        stage.time
    );
    for &id in stage.select("bouncer").iter().take(4) {
        if let Some(sprite) = stage.sprite(id) {
            info!(
                "  {:?}: pos ({:.1}, {:.1}) vel ({:.1}, {:.1})",
                id, sprite.props.x, sprite.props.y, sprite.props.vx, sprite.props.vy
            );
        }
    }
}
