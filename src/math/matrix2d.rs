//! 2D affine transform.
//!
//! Column-style affine matrix with the six coefficients a,b,c,d,e,f laid out
//! the way canvas renderers expect:
//!
//! ```text
//! | a  c  e |   | x |
//! | b  d  f | * | y |
//! | 0  0  1 |   | 1 |
//! ```
//!
//! All mutating operations post-multiply, so the composition order reads
//! top-down at the call site: parent transform, then translate, then scale,
//! then rotate.

use glam::Vec2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix2D {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Default for Matrix2D {
    fn default() -> Self {
        Self::new()
    }
}

impl Matrix2D {
    /// Create an identity matrix.
    pub fn new() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
        }
    }

    /// Reset to the identity transform.
    pub fn identity(&mut self) -> &mut Self {
        *self = Self::new();
        self
    }

    /// Post-multiply by another matrix (apply `m` in local space).
    pub fn multiply(&mut self, m: &Matrix2D) -> &mut Self {
        let a = self.a * m.a + self.c * m.b;
        let b = self.b * m.a + self.d * m.b;
        let c = self.a * m.c + self.c * m.d;
        let d = self.b * m.c + self.d * m.d;
        let e = self.a * m.e + self.c * m.f + self.e;
        let f = self.b * m.e + self.d * m.f + self.f;
        self.a = a;
        self.b = b;
        self.c = c;
        self.d = d;
        self.e = e;
        self.f = f;
        self
    }

    /// Post-multiply by a translation.
    pub fn translate(&mut self, tx: f32, ty: f32) -> &mut Self {
        self.e += self.a * tx + self.c * ty;
        self.f += self.b * tx + self.d * ty;
        self
    }

    /// Post-multiply by a non-uniform scale.
    pub fn scale(&mut self, sx: f32, sy: f32) -> &mut Self {
        self.a *= sx;
        self.b *= sx;
        self.c *= sy;
        self.d *= sy;
        self
    }

    /// Post-multiply by a rotation in radians.
    pub fn rotate(&mut self, radians: f32) -> &mut Self {
        if radians == 0.0 {
            return self;
        }
        let (sin, cos) = radians.sin_cos();
        let a = self.a * cos + self.c * sin;
        let b = self.b * cos + self.d * sin;
        let c = self.a * -sin + self.c * cos;
        let d = self.b * -sin + self.d * cos;
        self.a = a;
        self.b = b;
        self.c = c;
        self.d = d;
        self
    }

    /// Post-multiply by a rotation in degrees.
    pub fn rotate_deg(&mut self, degrees: f32) -> &mut Self {
        if degrees == 0.0 {
            return self;
        }
        self.rotate(degrees * std::f32::consts::PI / 180.0)
    }

    /// X component of a transformed point.
    pub fn transform_x(&self, x: f32, y: f32) -> f32 {
        x * self.a + y * self.c + self.e
    }

    /// Y component of a transformed point.
    pub fn transform_y(&self, x: f32, y: f32) -> f32 {
        x * self.b + y * self.d + self.f
    }

    /// Transform a point.
    pub fn transform_point(&self, p: Vec2) -> Vec2 {
        Vec2::new(self.transform_x(p.x, p.y), self.transform_y(p.x, p.y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec2, b: Vec2) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn identity_leaves_points_alone() {
        let m = Matrix2D::new();
        assert_eq!(m.transform_point(Vec2::new(3.0, -7.0)), Vec2::new(3.0, -7.0));
    }

    #[test]
    fn translate_then_rotate_composes_in_local_space() {
        // Translate to (10, 0), then rotate 90 degrees: a local point (1, 0)
        // ends up at (10, 1) because the rotation happens around the
        // translated origin.
        let mut m = Matrix2D::new();
        m.translate(10.0, 0.0).rotate_deg(90.0);
        assert!(close(m.transform_point(Vec2::new(1.0, 0.0)), Vec2::new(10.0, 1.0)));
    }

    #[test]
    fn scale_applies_before_rotation() {
        let mut m = Matrix2D::new();
        m.translate(0.0, 0.0).scale(2.0, 2.0).rotate_deg(180.0);
        assert!(close(m.transform_point(Vec2::new(1.0, 0.0)), Vec2::new(-2.0, 0.0)));
    }

    #[test]
    fn multiply_matches_chained_application() {
        let mut parent = Matrix2D::new();
        parent.translate(5.0, 5.0).rotate_deg(90.0);

        let mut child = Matrix2D::new();
        child.multiply(&parent).translate(1.0, 0.0);

        // Child origin is the parent-space point (1, 0) rotated into world.
        let origin = child.transform_point(Vec2::ZERO);
        assert!(close(origin, Vec2::new(5.0, 6.0)));
    }
}
