//! Sprite sheets.
//!
//! A [`SpriteSheet`] describes a grid of equally sized frames inside a
//! texture asset, plus per-frame properties. The engine core never touches
//! the pixels; what it consumes are the tile dimensions and the
//! [`FrameProps`] collision overrides that tile layers turn into per-tile
//! collision polygons.

use glam::Vec2;
use rustc_hash::FxHashMap;
use serde::Deserialize;

/// Per-frame (per-tile-id) properties.
///
/// `points` is a collision polygon in *tile units* (0..1 across the tile),
/// converted to tile-centered world units by the consuming tile layer.
/// A `sensor` frame detects overlap but never participates in physical
/// separation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrameProps {
    #[serde(default)]
    pub points: Option<Vec<[f32; 2]>>,
    #[serde(default)]
    pub sensor: bool,
    #[serde(default)]
    pub w: Option<f32>,
    #[serde(default)]
    pub h: Option<f32>,
    /// Free-form extra properties carried through to collision contacts.
    #[serde(flatten)]
    pub extra: FxHashMap<String, serde_json::Value>,
}

/// Frame grid geometry and per-frame properties for one texture asset.
#[derive(Debug, Clone)]
pub struct SpriteSheet {
    pub name: String,
    pub asset: String,
    /// Total sheet size in pixels.
    pub w: f32,
    pub h: f32,
    /// Frame size.
    pub tile_w: f32,
    pub tile_h: f32,
    /// Start offset of the first frame.
    pub sx: f32,
    pub sy: f32,
    /// Spacing between frames (after the first).
    pub spacing_x: f32,
    pub spacing_y: f32,
    /// Frames per row, derived from the sheet width when not given.
    pub cols: u32,
    /// Total frame count.
    pub frames: u32,
    /// Per-frame collision overrides keyed by frame/tile id.
    pub frame_properties: FxHashMap<i32, FrameProps>,
}

impl SpriteSheet {
    /// Create a sheet for an asset of `w`×`h` pixels with `tile_w`×`tile_h`
    /// frames laid out left-to-right, top-to-bottom.
    pub fn new(name: impl Into<String>, asset: impl Into<String>, w: f32, h: f32, tile_w: f32, tile_h: f32) -> Self {
        let mut sheet = Self {
            name: name.into(),
            asset: asset.into(),
            w,
            h,
            tile_w,
            tile_h,
            sx: 0.0,
            sy: 0.0,
            spacing_x: 0.0,
            spacing_y: 0.0,
            cols: 0,
            frames: 0,
            frame_properties: FxHashMap::default(),
        };
        sheet.recount();
        sheet
    }

    /// Attach per-frame properties (collision overrides).
    pub fn with_frame_properties(mut self, props: FxHashMap<i32, FrameProps>) -> Self {
        self.frame_properties = props;
        self
    }

    /// Recompute `cols`/`frames` after geometry changes.
    pub fn recount(&mut self) {
        self.cols = (((self.w + self.spacing_x) / (self.tile_w + self.spacing_x)).floor() as u32).max(1);
        self.frames = self.cols * ((self.h / (self.tile_h + self.spacing_y)).floor() as u32);
    }

    /// Starting x position of a frame inside the texture.
    pub fn fx(&self, frame: u32) -> f32 {
        ((frame % self.cols) as f32 * (self.tile_w + self.spacing_x) + self.sx).floor()
    }

    /// Starting y position of a frame inside the texture.
    pub fn fy(&self, frame: u32) -> f32 {
        ((frame / self.cols) as f32 * (self.tile_h + self.spacing_y) + self.sy).floor()
    }

    /// Collision polygon for a tile id in tile-centered world units, if the
    /// frame overrides the default full-cell rectangle.
    pub fn frame_points(&self, tile: i32) -> Option<Vec<Vec2>> {
        let props = self.frame_properties.get(&tile)?;
        let pts = props.points.as_ref()?;
        Some(
            pts.iter()
                .map(|pt| {
                    Vec2::new(
                        pt[0] * self.tile_w - self.tile_w / 2.0,
                        pt[1] * self.tile_h - self.tile_h / 2.0,
                    )
                })
                .collect(),
        )
    }
}
