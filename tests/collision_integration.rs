//! Collision & Geometry Integration Tests
//!
//! These tests exercise the geometry kernel and the SAT narrow phase the
//! way the stage uses them: world snapshots generated through insertion and
//! stepping, parent-child transform composition, and collision queries
//! through the broad phase.
//!
//! # Test Categories
//!
//! 1. **World snapshots** - fast path, rotation, scaling, memoization
//! 2. **Hierarchy** - parent transforms, moved propagation
//! 3. **Degenerate geometry** - zero-size guard
//! 4. **Queries** - broad-phase short-circuit, search

use glam::Vec2;

use emberengine::sprites::SpriteBuilder;
use emberengine::stage::{CollideOpts, Stage, StageOptions};

fn stage() -> Stage {
    Stage::new(StageOptions::default())
}

// =============================================================================
// CATEGORY 1: World snapshots
// =============================================================================

#[test]
fn unrotated_sprite_takes_fast_path() {
    let mut stage = stage();
    let id = stage.insert(SpriteBuilder::new().pos(50.0, 60.0).dims(10.0, 10.0).build());

    let sprite = stage.sprite(id).unwrap();
    let c = sprite.c.as_ref().unwrap();
    assert_eq!(c.x, 50.0);
    assert_eq!(c.y, 60.0);
    assert_eq!(c.w, 10.0);
    assert_eq!(c.h, 10.0);
    assert_eq!(c.cx, 5.0);
    // Points are local offsets plus position.
    assert_eq!(c.points[0], Vec2::new(45.0, 55.0));
    assert_eq!(c.points[2], Vec2::new(55.0, 65.0));
}

#[test]
fn rotated_sprite_gets_tight_transformed_bbox() {
    let mut stage = stage();
    let id = stage.insert(
        SpriteBuilder::new()
            .pos(50.0, 50.0)
            .dims(10.0, 10.0)
            .angle(45.0)
            .build(),
    );

    let sprite = stage.sprite(id).unwrap();
    let c = sprite.c.as_ref().unwrap();
    let diag = 10.0 * std::f32::consts::SQRT_2;
    // The bounding box follows the rotated shape, not the unrotated one.
    assert!((c.w - diag).abs() < 1e-3);
    assert!((c.h - diag).abs() < 1e-3);
    assert!((c.cx - diag / 2.0).abs() < 1e-3);
    assert_eq!(c.x, 50.0);
    assert_eq!(c.angle, 45.0);
}

#[test]
fn scaled_sprite_grows_its_bbox() {
    let mut stage = stage();
    let id = stage.insert(
        SpriteBuilder::new()
            .pos(0.0, 0.0)
            .dims(10.0, 10.0)
            .scale(2.0)
            .build(),
    );

    let c = stage.sprite(id).unwrap().c.as_ref().unwrap();
    assert!((c.w - 20.0).abs() < 1e-3);
    assert!((c.scale - 2.0).abs() < 1e-6);
}

#[test]
fn snapshot_refreshes_after_position_change() {
    let mut stage = stage();
    let id = stage.insert(SpriteBuilder::new().pos(0.0, 0.0).dims(10.0, 10.0).build());
    assert_eq!(stage.sprite(id).unwrap().c.as_ref().unwrap().x, 0.0);

    stage.sprite_mut(id).unwrap().props.x = 75.0;
    // Any collision entry point regenerates the stale snapshot.
    stage.collide(id, CollideOpts::default());
    assert_eq!(stage.sprite(id).unwrap().c.as_ref().unwrap().x, 75.0);
}

// =============================================================================
// CATEGORY 2: Hierarchy
// =============================================================================

#[test]
fn child_snapshot_composes_parent_transform() {
    let mut stage = stage();
    let parent = stage.insert(
        SpriteBuilder::new()
            .pos(100.0, 100.0)
            .dims(40.0, 40.0)
            .angle(90.0)
            .build(),
    );
    let child = stage.insert_into(
        SpriteBuilder::new().pos(10.0, 0.0).dims(10.0, 10.0).build(),
        Some(parent),
    );

    let c = stage.sprite(child).unwrap().c.as_ref().unwrap();
    // The parent's rotation carries the child's local +x offset onto +y.
    assert!((c.x - 100.0).abs() < 1e-3);
    assert!((c.y - 110.0).abs() < 1e-3);
    assert!((c.angle - 90.0).abs() < 1e-3);
}

#[test]
fn moving_a_container_refreshes_children_on_update() {
    let mut stage = stage();
    let parent = stage.insert(SpriteBuilder::new().pos(0.0, 0.0).dims(40.0, 40.0).build());
    let child = stage.insert_into(
        SpriteBuilder::new().pos(10.0, 0.0).dims(10.0, 10.0).build(),
        Some(parent),
    );
    // Children with a container keep local coordinates; insertion composed
    // them once already.
    let before = stage.sprite(child).unwrap().c.as_ref().unwrap().x;

    stage.sprite_mut(parent).unwrap().props.x = 30.0;
    stage.step(1.0 / 60.0);

    let after = stage.sprite(child).unwrap().c.as_ref().unwrap().x;
    assert!((after - before - 30.0).abs() < 1e-3);
}

// =============================================================================
// CATEGORY 3: Degenerate geometry
// =============================================================================

#[test]
fn zero_size_bbox_is_bumped_to_unit_extent() {
    let mut stage = stage();
    // Zero size and a rotation, forcing the matrix path where every
    // transformed point coincides.
    let id = stage.insert(
        SpriteBuilder::new()
            .pos(10.0, 10.0)
            .dims(0.0, 0.0)
            .angle(30.0)
            .build(),
    );

    let c = stage.sprite(id).unwrap().c.as_ref().unwrap();
    assert_eq!(c.w, 1.0);
    assert_eq!(c.h, 1.0);
}

#[test]
fn missing_points_get_default_rectangle_on_insert() {
    let mut stage = stage();
    let id = stage.insert(SpriteBuilder::new().dims(8.0, 6.0).build());
    let points = stage.sprite(id).unwrap().props.points.as_ref().unwrap().clone();
    assert_eq!(points.len(), 4);
    assert_eq!(points[0], Vec2::new(-4.0, -3.0));
    assert_eq!(points[2], Vec2::new(4.0, 3.0));
}

// =============================================================================
// CATEGORY 4: Queries
// =============================================================================

#[test]
fn distant_sprites_never_reach_narrow_phase() {
    let mut stage = stage();
    let a = stage.insert(SpriteBuilder::new().pos(0.0, 0.0).dims(10.0, 10.0).build());
    stage.insert(SpriteBuilder::new().pos(5000.0, 5000.0).dims(10.0, 10.0).build());

    assert!(stage.search(a, None).is_none());
}

#[test]
fn search_reports_overlap_without_resolution_passes() {
    let mut stage = stage();
    let a = stage.insert(SpriteBuilder::new().pos(0.0, 0.0).dims(10.0, 10.0).build());
    let b = stage.insert(SpriteBuilder::new().pos(8.0, 0.0).dims(10.0, 10.0).build());

    let col = stage.search(a, None).unwrap();
    assert_eq!(col.obj, Some(b));
    assert!((col.magnitude - 2.0).abs() < 1e-4);
    assert_eq!(col.normal.y, 0.0);

    // Symmetric query from the other side: same depth, flipped normal.
    let col_b = stage.search(b, None).unwrap();
    assert_eq!(col_b.obj, Some(a));
    assert!((col_b.magnitude - 2.0).abs() < 1e-4);
    assert!((col.normal.x + col_b.normal.x).abs() < 1e-5);
}

#[test]
fn collision_mask_filters_candidates() {
    use emberengine::sprites::{SPRITE_ENEMY, SPRITE_FRIENDLY};

    let mut stage = stage();
    let a = stage.insert(SpriteBuilder::new().pos(0.0, 0.0).dims(10.0, 10.0).build());
    stage.insert(
        SpriteBuilder::new()
            .pos(8.0, 0.0)
            .dims(10.0, 10.0)
            .kind(SPRITE_ENEMY)
            .build(),
    );

    assert!(stage.search(a, Some(SPRITE_FRIENDLY)).is_none());
    assert!(stage.search(a, Some(SPRITE_ENEMY)).is_some());
}
