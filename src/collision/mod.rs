//! Narrow-phase polygon collision.
//!
//! Separating Axis Theorem over convex polygons, run twice (once per
//! polygon's edge set) with the smaller-magnitude result winning, plus the
//! cheap AABB [`overlap`] test the broad phase uses to short-circuit before
//! any projection math runs.
//!
//! Sign convention: the reported `normal` points from the other object
//! toward the probe, `distance` is negative, and subtracting `separate`
//! from the probe's position resolves the overlap.

use glam::Vec2;

use crate::sprites::{ColBox, SpriteId};

/// Tile coordinates and id of a tile-layer contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRef {
    pub x: i32,
    pub y: i32,
    pub id: i32,
}

/// An ephemeral collision result. Recomputed per check; only carried across
/// passes of a multi-pass resolution, never across frames.
#[derive(Debug, Clone)]
pub struct Contact {
    /// Minimum translation vector: `distance * normal`.
    pub separate: Vec2,
    /// Unit contact normal, pointing toward the probe.
    pub normal: Vec2,
    /// Signed separation distance along the normal (≤ 0 while overlapping).
    pub distance: f32,
    /// Penetration depth, `distance.abs()`.
    pub magnitude: f32,
    /// Impact speed recorded by resolution handlers.
    pub impact: f32,
    /// The other colliding object, when it is a sprite or layer.
    pub obj: Option<SpriteId>,
    /// The colliding tile, when the other object is a tile layer.
    pub tile: Option<TileRef>,
}

impl Contact {
    fn new(distance: f32, magnitude: f32, normal: Vec2) -> Self {
        Self {
            separate: Vec2::new(distance * normal.x, distance * normal.y),
            normal,
            distance,
            magnitude,
            impact: 0.0,
            obj: None,
            tile: None,
        }
    }
}

/// A polygon handed to the SAT test.
///
/// `offset` is `Some(position)` for local-space points that still need the
/// object's world position applied, `None` for points already in world
/// space (a cached collision snapshot).
#[derive(Debug, Clone, Copy)]
pub struct ShapeRef<'a> {
    pub points: &'a [Vec2],
    pub offset: Option<Vec2>,
}

struct AxisResult {
    distance: f32,
    magnitude: f32,
    normal: Vec2,
}

/// One directed SAT pass: project both polygons onto every edge normal of
/// `p1`, tracking the smallest-overlap axis. `offset` shifts `p1` into
/// `p2`'s frame. Returns `None` on the first separating axis.
fn sat_pass(p1: &[Vec2], p2: &[Vec2], offset: Vec2, flip: bool) -> Option<AxisResult> {
    let mut shortest = f32::INFINITY;
    let mut best: Option<AxisResult> = None;

    for i in 0..p1.len() {
        let pt1 = p1[i];
        let pt2 = p1[(i + 1) % p1.len()];
        let mut normal = Vec2::new(-(pt2.y - pt1.y), pt2.x - pt1.x);
        let len = normal.length();
        if len > 0.0 {
            normal /= len;
        }

        let mut min1 = normal.dot(p1[0]);
        let mut max1 = min1;
        for pt in &p1[1..] {
            let d = normal.dot(*pt);
            min1 = min1.min(d);
            max1 = max1.max(d);
        }

        let mut min2 = normal.dot(p2[0]);
        let mut max2 = min2;
        for pt in &p2[1..] {
            let d = normal.dot(*pt);
            min2 = min2.min(d);
            max2 = max2.max(d);
        }

        let offset_len = normal.dot(offset);
        min1 += offset_len;
        max1 += offset_len;

        if min1 - max2 > 0.0 || min2 - max1 > 0.0 {
            return None;
        }

        let mut min_dist = -(max2 - min1);
        if flip {
            min_dist = -min_dist;
        }
        let min_dist_abs = min_dist.abs();
        // Strict comparison: on ties the first-found (lowest edge index)
        // axis wins, keeping results deterministic.
        if min_dist_abs < shortest {
            shortest = min_dist_abs;
            let (distance, normal) = if min_dist > 0.0 {
                (-min_dist, -normal)
            } else {
                (min_dist, normal)
            };
            best = Some(AxisResult {
                distance,
                magnitude: min_dist_abs,
                normal,
            });
        }
    }

    best
}

/// SAT collision between two convex polygons.
///
/// Both edge sets are tested; a single polygon's edges can report a
/// non-minimal separation for certain shape pairs, so the smaller-magnitude
/// of the two passes is the result. Exactly zero magnitude means the shapes
/// touch without overlapping and reports as no collision.
pub fn collide(a: ShapeRef, b: ShapeRef) -> Option<Contact> {
    let mut offset = Vec2::ZERO;
    if let Some(pos) = a.offset {
        offset += pos;
    }
    if let Some(pos) = b.offset {
        offset -= pos;
    }

    let first = sat_pass(a.points, b.points, offset, false)?;
    let second = sat_pass(b.points, a.points, -offset, true)?;

    let result = if second.magnitude < first.magnitude {
        second
    } else {
        first
    };
    if result.magnitude == 0.0 {
        return None;
    }
    Some(Contact::new(result.distance, result.magnitude, result.normal))
}

/// AABB-vs-AABB overlap. Exact edge contact counts as overlapping.
pub fn overlap(a: &ColBox, b: &ColBox) -> bool {
    let (a_min, a_max) = a.bounds();
    let (b_min, b_max) = b.bounds();
    !(a_max.y < b_min.y || a_min.y > b_max.y || a_max.x < b_min.x || a_min.x > b_max.x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(w: f32, h: f32) -> Vec<Vec2> {
        let (hw, hh) = (w / 2.0, h / 2.0);
        vec![
            Vec2::new(-hw, -hh),
            Vec2::new(hw, -hh),
            Vec2::new(hw, hh),
            Vec2::new(-hw, hh),
        ]
    }

    fn at(points: &[Vec2], pos: Vec2) -> ShapeRef<'_> {
        ShapeRef {
            points,
            offset: Some(pos),
        }
    }

    #[test]
    fn two_unit_overlap_along_x() {
        // Two 10x10 boxes, centers 8 apart on the x axis: 2 units deep.
        let pa = rect(10.0, 10.0);
        let pb = rect(10.0, 10.0);
        let col = collide(at(&pa, Vec2::ZERO), at(&pb, Vec2::new(8.0, 0.0))).unwrap();

        assert_eq!(col.magnitude, 2.0);
        assert_eq!(col.normal.y, 0.0);
        assert_eq!(col.normal.x.abs(), 1.0);
        assert_eq!(col.separate.length(), 2.0);
        assert_eq!(col.separate.y, 0.0);
    }

    #[test]
    fn symmetry_same_magnitude_opposite_normals() {
        let pa = rect(10.0, 10.0);
        let pb = rect(6.0, 14.0);
        let ab = collide(at(&pa, Vec2::ZERO), at(&pb, Vec2::new(6.0, 1.0))).unwrap();
        let ba = collide(at(&pb, Vec2::new(6.0, 1.0)), at(&pa, Vec2::ZERO)).unwrap();

        assert!((ab.magnitude - ba.magnitude).abs() < 1e-5);
        assert!((ab.normal + ba.normal).length() < 1e-5);
    }

    #[test]
    fn touching_edges_do_not_collide() {
        let pa = rect(10.0, 10.0);
        let pb = rect(10.0, 10.0);
        // Exactly adjacent: zero-magnitude overlap is "touching".
        assert!(collide(at(&pa, Vec2::ZERO), at(&pb, Vec2::new(10.0, 0.0))).is_none());
    }

    #[test]
    fn separated_boxes_return_none() {
        let pa = rect(10.0, 10.0);
        let pb = rect(10.0, 10.0);
        assert!(collide(at(&pa, Vec2::ZERO), at(&pb, Vec2::new(30.0, 0.0))).is_none());
    }

    #[test]
    fn separation_resolves_the_overlap() {
        let pa = rect(10.0, 10.0);
        let pb = rect(10.0, 10.0);
        let probe_pos = Vec2::new(0.0, -8.0); // probe above, overlapping by 2
        let col = collide(at(&pa, probe_pos), at(&pb, Vec2::ZERO)).unwrap();

        // Subtracting `separate` from the probe position must clear it.
        let resolved = probe_pos - col.separate;
        assert!(
            collide(at(&pa, resolved), at(&pb, Vec2::ZERO)).is_none(),
            "still colliding after applying separation"
        );
    }

    #[test]
    fn world_space_snapshot_points_need_no_offset() {
        // Same geometry expressed as pre-translated world points.
        let pa: Vec<Vec2> = rect(10.0, 10.0).iter().map(|p| *p + Vec2::new(8.0, 0.0)).collect();
        let pb = rect(10.0, 10.0);
        let col = collide(
            ShapeRef {
                points: &pa,
                offset: None,
            },
            at(&pb, Vec2::ZERO),
        )
        .unwrap();
        assert_eq!(col.magnitude, 2.0);
    }

    #[test]
    fn rotated_square_collides_with_smaller_overlap() {
        // A 10x10 square rotated 45 degrees has its corner, not its face,
        // nearest the other box; the reported penetration must be along the
        // diagonal axis and smaller than the unrotated case.
        let s = 5.0 * std::f32::consts::SQRT_2;
        let diamond = vec![
            Vec2::new(0.0, -s),
            Vec2::new(s, 0.0),
            Vec2::new(0.0, s),
            Vec2::new(-s, 0.0),
        ];
        let pb = rect(10.0, 10.0);
        let col = collide(at(&diamond, Vec2::new(11.0, 0.0)), at(&pb, Vec2::ZERO)).unwrap();
        assert!(col.magnitude > 0.0);
        assert!(col.magnitude < 2.0 + 1e-4);
        // Normal points from the box toward the diamond probe.
        assert!(col.normal.x > 0.0);
    }

    #[test]
    fn overlap_is_edge_inclusive() {
        let a = ColBox {
            x: 0.0,
            y: 0.0,
            cx: 5.0,
            cy: 5.0,
            w: 10.0,
            h: 10.0,
        };
        let touching = ColBox {
            x: 10.0,
            y: 0.0,
            cx: 5.0,
            cy: 5.0,
            w: 10.0,
            h: 10.0,
        };
        let apart = ColBox {
            x: 20.1,
            y: 0.0,
            cx: 5.0,
            cy: 5.0,
            w: 10.0,
            h: 10.0,
        };
        assert!(overlap(&a, &touching));
        assert!(!overlap(&a, &apart));
    }
}
