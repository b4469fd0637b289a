//! Tile layers: large static collidables backed by a tile grid.
//!
//! A [`TileLayer`] adapts a grid of tile ids into polygon collision queries:
//! the probe's bounding box is mapped to a tile-coordinate range, every
//! present (collidable) tile in that range becomes a collision proxy at its
//! world-space center, and the proxy with the largest penetration wins —
//! the layer reports at most one contact per query, modeling the whole
//! layer as a single obstacle.
//!
//! Sensor tiles are collected separately; they notify but never contribute
//! to physical separation.
//!
//! Submodules overview:
//! - [`data`] – dense rows-of-columns tile id storage (serde JSON)

pub mod data;

use glam::Vec2;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::collision::{self, Contact, ShapeRef, TileRef};
use crate::sprites::{ColBox, SpriteSheet};

pub use data::TileData;

const DEFAULT_BLOCK_TILE_W: u32 = 10;
const DEFAULT_BLOCK_TILE_H: u32 = 10;

/// Tile-value predicate (collidability, drawability).
pub type TilePredicate = fn(i32) -> bool;

fn tile_positive(tile: i32) -> bool {
    tile > 0
}

/// Precomputed collision proxy for one tile id: a polygon centered on the
/// tile plus the sensor flag and any extra frame properties.
#[derive(Debug, Clone)]
pub struct ColProxy {
    pub points: Vec<Vec2>,
    pub sensor: bool,
    pub extra: FxHashMap<String, serde_json::Value>,
}

fn centered_rect(w: f32, h: f32) -> Vec<Vec2> {
    let (hw, hh) = (w / 2.0, h / 2.0);
    vec![
        Vec2::new(-hw, -hh),
        Vec2::new(hw, -hh),
        Vec2::new(hw, hh),
        Vec2::new(-hw, hh),
    ]
}

/// A tile grid with collision proxies and a pre-render block cache.
///
/// The tile data array is the single source of truth: the collision
/// predicate reads it live, and [`TileLayer::set_tile`] invalidates any
/// cached pre-rendered block covering the mutated tile.
pub struct TileLayer {
    pub tile_w: f32,
    pub tile_h: f32,
    pub block_tile_w: u32,
    pub block_tile_h: u32,
    pub data: TileData,
    /// Which tile values collide. Default: any value > 0.
    pub collidable: TilePredicate,
    /// Which tile values draw. Default: any value > 0.
    pub drawable: TilePredicate,
    default_proxy: ColProxy,
    overrides: FxHashMap<i32, ColProxy>,
    /// Blocks with a live pre-rendered cache entry on the host's side.
    blocks: FxHashSet<(i32, i32)>,
}

impl TileLayer {
    pub fn new(tile_w: f32, tile_h: f32, data: TileData) -> Self {
        Self {
            tile_w,
            tile_h,
            block_tile_w: DEFAULT_BLOCK_TILE_W,
            block_tile_h: DEFAULT_BLOCK_TILE_H,
            data,
            collidable: tile_positive,
            drawable: tile_positive,
            default_proxy: ColProxy {
                points: centered_rect(tile_w, tile_h),
                sensor: false,
                extra: FxHashMap::default(),
            },
            overrides: FxHashMap::default(),
            blocks: FxHashSet::default(),
        }
    }

    /// Build per-tile collision proxies from a sheet's frame properties.
    pub fn with_sheet(mut self, sheet: &SpriteSheet) -> Self {
        for (&tile, props) in &sheet.frame_properties {
            let points = sheet
                .frame_points(tile)
                .unwrap_or_else(|| {
                    centered_rect(
                        props.w.unwrap_or(self.tile_w),
                        props.h.unwrap_or(self.tile_h),
                    )
                });
            self.overrides.insert(
                tile,
                ColProxy {
                    points,
                    sensor: props.sensor,
                    extra: props.extra.clone(),
                },
            );
        }
        self
    }

    /// Override which tile values collide.
    pub fn with_collidable(mut self, predicate: TilePredicate) -> Self {
        self.collidable = predicate;
        self
    }

    pub fn with_block_size(mut self, block_tile_w: u32, block_tile_h: u32) -> Self {
        self.block_tile_w = block_tile_w;
        self.block_tile_h = block_tile_h;
        self
    }

    pub fn rows(&self) -> usize {
        self.data.rows()
    }

    pub fn cols(&self) -> usize {
        self.data.cols()
    }

    /// Layer width in world units.
    pub fn w(&self) -> f32 {
        self.cols() as f32 * self.tile_w
    }

    /// Layer height in world units.
    pub fn h(&self) -> f32 {
        self.rows() as f32 * self.tile_h
    }

    pub fn block_w(&self) -> f32 {
        self.tile_w * self.block_tile_w as f32
    }

    pub fn block_h(&self) -> f32 {
        self.tile_h * self.block_tile_h as f32
    }

    pub fn tile(&self, x: i32, y: i32) -> Option<i32> {
        self.data.get(x, y)
    }

    /// True when the tile at (x, y) exists and collides.
    pub fn tile_present(&self, x: i32, y: i32) -> bool {
        self.data.get(x, y).is_some_and(|t| (self.collidable)(t))
    }

    /// Overwrite a tile and invalidate the covering pre-render block.
    /// Returns false outside the grid.
    pub fn set_tile(&mut self, x: i32, y: i32, tile: i32) -> bool {
        if !self.data.set(x, y, tile) {
            return false;
        }
        let block_x = x.div_euclid(self.block_tile_w as i32);
        let block_y = y.div_euclid(self.block_tile_h as i32);
        self.blocks.remove(&(block_x, block_y));
        true
    }

    /// Collision proxy for a tile id (override or the full-cell default).
    pub fn proxy_for(&self, tile: i32) -> &ColProxy {
        self.overrides.get(&tile).unwrap_or(&self.default_proxy)
    }

    /// Query the layer with a probe.
    ///
    /// `layer_pos` is the layer sprite's world position. Returns the
    /// largest-penetration solid contact (tile coordinates filled in) and
    /// the sensor tiles the probe overlapped, in scan order.
    pub fn collide(
        &self,
        layer_pos: Vec2,
        probe_box: &ColBox,
        probe_shape: ShapeRef<'_>,
    ) -> (Option<Contact>, SmallVec<[TileRef; 4]>) {
        let (min, max) = probe_box.bounds();
        let tile_start_x = ((min.x - layer_pos.x) / self.tile_w).floor() as i32;
        let tile_start_y = ((min.y - layer_pos.y) / self.tile_h).floor() as i32;
        let tile_end_x = ((max.x - layer_pos.x) / self.tile_w).ceil() as i32;
        let tile_end_y = ((max.y - layer_pos.y) / self.tile_h).ceil() as i32;

        let mut best: Option<Contact> = None;
        let mut sensors: SmallVec<[TileRef; 4]> = SmallVec::new();

        for tile_y in tile_start_y..=tile_end_y {
            for tile_x in tile_start_x..=tile_end_x {
                if !self.tile_present(tile_x, tile_y) {
                    continue;
                }
                let Some(tile) = self.data.get(tile_x, tile_y) else {
                    continue;
                };
                let proxy = self.proxy_for(tile);
                let center = Vec2::new(
                    tile_x as f32 * self.tile_w + layer_pos.x + self.tile_w / 2.0,
                    tile_y as f32 * self.tile_h + layer_pos.y + self.tile_h / 2.0,
                );
                let Some(mut col) = collision::collide(
                    probe_shape,
                    ShapeRef {
                        points: &proxy.points,
                        offset: Some(center),
                    },
                ) else {
                    continue;
                };

                let tile_ref = TileRef {
                    x: tile_x,
                    y: tile_y,
                    id: tile,
                };
                if proxy.sensor {
                    sensors.push(tile_ref);
                } else if best.as_ref().map(|b| b.magnitude < col.magnitude).unwrap_or(true) {
                    col.tile = Some(tile_ref);
                    best = Some(col);
                }
            }
        }

        (best, sensors)
    }

    /// True when the host holds a pre-rendered cache for this block.
    pub fn is_block_cached(&self, block_x: i32, block_y: i32) -> bool {
        self.blocks.contains(&(block_x, block_y))
    }

    /// Record that the host pre-rendered this block.
    pub fn mark_block_cached(&mut self, block_x: i32, block_y: i32) {
        self.blocks.insert((block_x, block_y));
    }

    /// Block-coordinate range covering a view rectangle.
    pub fn blocks_in_view(&self, layer_pos: Vec2, x: f32, y: f32, w: f32, h: f32) -> CellIter {
        let x1 = ((x - layer_pos.x) / self.block_w()).floor() as i32;
        let y1 = ((y - layer_pos.y) / self.block_h()).floor() as i32;
        let x2 = ((x + w - layer_pos.x) / self.block_w()).floor() as i32;
        let y2 = ((y + h - layer_pos.y) / self.block_h()).floor() as i32;
        // Clamp to blocks that actually exist.
        let max_x = (self.cols() as i32 - 1).div_euclid(self.block_tile_w as i32);
        let max_y = (self.rows() as i32 - 1).div_euclid(self.block_tile_h as i32);
        CellIter::new(x1.max(0), y1.max(0), x2.min(max_x), y2.min(max_y))
    }
}

/// Row-major iterator over an inclusive block range.
pub struct CellIter {
    x1: i32,
    x2: i32,
    y2: i32,
    x: i32,
    y: i32,
}

impl CellIter {
    fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            x1,
            x2,
            y2,
            x: x1,
            y: y1,
        }
    }
}

impl Iterator for CellIter {
    type Item = (i32, i32);

    fn next(&mut self) -> Option<(i32, i32)> {
        if self.y > self.y2 || self.x1 > self.x2 {
            return None;
        }
        let item = (self.x, self.y);
        self.x += 1;
        if self.x > self.x2 {
            self.x = self.x1;
            self.y += 1;
        }
        Some(item)
    }
}
