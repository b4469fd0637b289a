//! Render surface contract.
//!
//! The engine core is headless: the render pass orders and culls sprites and
//! fires render events, but every actual draw goes through this trait. Hosts
//! implement it for their backend (a windowed renderer, a terminal, a test
//! recorder); [`NullCanvas`] is provided for headless runs.

use crate::math::Matrix2D;
use crate::sprites::Sprite;

/// Draw operations the stage render pass emits.
///
/// Every method has a no-op default so hosts only implement what their
/// backend needs.
pub trait Canvas {
    /// Clear the surface at the start of a render pass.
    fn clear(&mut self) {}

    /// Push the current transform state.
    fn save(&mut self) {}

    /// Pop the transform state.
    fn restore(&mut self) {}

    /// Translate the current transform.
    fn translate(&mut self, _x: f32, _y: f32) {}

    /// Scale the current transform.
    fn scale(&mut self, _sx: f32, _sy: f32) {}

    /// Replace the current transform with the sprite's world matrix.
    fn set_transform(&mut self, _m: &Matrix2D) {}

    /// Draw one sprite. The transform has already been set; the sprite's
    /// size/center props describe the rectangle to fill around the origin.
    fn draw_sprite(&mut self, _sprite: &Sprite) {}

    /// Draw one pre-rendered block of a tile layer.
    fn draw_tile_block(&mut self, _layer: &Sprite, _block_x: i32, _block_y: i32) {}
}

/// A canvas that draws nothing. Used by headless simulations and tests that
/// only care about stepping.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCanvas;

impl Canvas for NullCanvas {}
