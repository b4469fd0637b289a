//! Geometry kernel.
//!
//! Submodules overview:
//! - [`matrix2d`] – 2D affine transform used to compute world-space collision
//!   polygons from local object-space points
//!
//! Vector math uses [`glam::Vec2`] throughout the engine.

pub mod matrix2d;

pub use matrix2d::Matrix2D;
