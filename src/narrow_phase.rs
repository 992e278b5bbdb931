//! SAT narrow phase with Sutherland-Hodgman style clipping.
//!
//! Two convex polygons are tested for separation along each polygon's own
//! edge normals; the axis with the smallest penetration becomes the
//! reference face, the other polygon's most anti-parallel edge becomes the
//! incident face, and the incident edge is clipped against the reference
//! face's side planes to produce up to two contact points.

use crate::manifold::{ContactPoint, Manifold};
use crate::math::{Vec2, EPSILON};
use crate::shape::Shape;

/// For each edge normal of `probe`, finds the minimum vertex-to-face
/// projection over every vertex of `target`. The maximum such value across
/// all of `probe`'s edges is the best (least negative, i.e. shallowest)
/// separating axis from `probe`'s perspective; a positive result means the
/// shapes are separated along that axis.
fn max_separation(probe: &Shape, target: &Shape) -> (f32, usize) {
    let mut best_separation = f32::NEG_INFINITY;
    let mut best_edge = 0;
    for i in 0..probe.vertex_count() {
        let normal = probe.edge_normal(i);
        let face_point = probe.world_vertex(i);
        let mut min_proj = f32::INFINITY;
        for j in 0..target.vertex_count() {
            let proj = normal.dot(target.world_vertex(j) - face_point);
            if proj < min_proj {
                min_proj = proj;
            }
        }
        if min_proj > best_separation {
            best_separation = min_proj;
            best_edge = i;
        }
    }
    (best_separation, best_edge)
}

/// Of `incident`'s edges, returns the one whose outward normal is most
/// anti-parallel to `reference_normal` -- the edge most likely to be the one
/// actually pressed against the reference face.
fn incident_edge_index(incident: &Shape, reference_normal: Vec2) -> usize {
    let mut best = 0;
    let mut best_dot = f32::INFINITY;
    for i in 0..incident.vertex_count() {
        let d = incident.edge_normal(i).dot(reference_normal);
        if d < best_dot {
            best_dot = d;
            best = i;
        }
    }
    best
}

/// Clips the segment `input` against the half-plane `normal . p <= offset`,
/// interpolating a new endpoint for any edge that crosses the plane.
fn clip_segment(input: &[Vec2; 2], normal: Vec2, offset: f32) -> Vec<Vec2> {
    let mut out = Vec::with_capacity(2);
    let d0 = normal.dot(input[0]) - offset;
    let d1 = normal.dot(input[1]) - offset;
    if d0 <= 0.0 {
        out.push(input[0]);
    }
    if d1 <= 0.0 {
        out.push(input[1]);
    }
    if d0 * d1 < 0.0 {
        let t = d0 / (d0 - d1);
        out.push(input[0] + (input[1] - input[0]) * t);
    }
    out
}

/// Runs SAT + clipping on `a` and `b`, writing the result into `out` (which
/// is cleared first). Returns `false` if the shapes do not overlap, in which
/// case `out` is left empty.
///
/// Two overlapping convex polygons can, in principle, produce zero surviving
/// clipped points if the penetration is extremely shallow and floating point
/// error pushes every candidate point just outside the reference face's side
/// planes. That case is treated as "no collision" here rather than as a bug.
pub fn collide(a: &Shape, b: &Shape, out: &mut Manifold) -> bool {
    out.clear();

    let (separation_a, edge_a) = max_separation(a, b);
    if separation_a > EPSILON {
        return false;
    }
    let (separation_b, edge_b) = max_separation(b, a);
    if separation_b > EPSILON {
        return false;
    }

    // Prefer `a` on ties so results are stable for symmetric configurations.
    let b_is_reference = separation_b > separation_a + 0.1 * EPSILON;

    let (reference, incident, ref_edge) = if b_is_reference {
        (b, a, edge_b)
    } else {
        (a, b, edge_a)
    };

    let ref_count = reference.vertex_count();
    let v1 = reference.world_vertex(ref_edge);
    let v2 = reference.world_vertex((ref_edge + 1) % ref_count);
    let ref_normal = reference.edge_normal(ref_edge);
    let tangent = (v2 - v1).normalize_or_zero();

    let inc_edge = incident_edge_index(incident, ref_normal);
    let inc_count = incident.vertex_count();
    let incident_segment = [
        incident.world_vertex(inc_edge),
        incident.world_vertex((inc_edge + 1) % inc_count),
    ];

    // Clip against the two side planes of the reference face.
    let clipped_low = clip_segment(&incident_segment, -tangent, -tangent.dot(v1));
    if clipped_low.len() < 2 {
        return false;
    }
    let clipped_low: [Vec2; 2] = [clipped_low[0], clipped_low[1]];
    let clipped = clip_segment(&clipped_low, tangent, tangent.dot(v2));
    if clipped.len() < 2 {
        return false;
    }

    for point in clipped {
        let depth = -(point - v1).dot(ref_normal);
        if depth >= 0.0 {
            out.push_point(ContactPoint { point, depth });
        }
    }

    if out.is_empty() {
        return false;
    }

    // Normal always points from A toward B.
    let normal = if b_is_reference { -ref_normal } else { ref_normal };
    out.set_normal(normal);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disjoint_boxes_do_not_collide() {
        let mut a = Shape::new_box(0.5, 0.5);
        a.set_position(Vec2::new(0.0, 0.0));
        let mut b = Shape::new_box(0.5, 0.5);
        b.set_position(Vec2::new(10.0, 0.0));
        let mut m = Manifold::new();
        assert!(!collide(&a, &b, &mut m));
        assert!(m.is_empty());
    }

    #[test]
    fn overlapping_unit_squares_produce_two_points_on_x_axis() {
        let mut a = Shape::new_box(0.5, 0.5);
        a.set_position(Vec2::new(0.0, 0.0));
        let mut b = Shape::new_box(0.5, 0.5);
        b.set_position(Vec2::new(0.8, 0.0));
        let mut m = Manifold::new();
        assert!(collide(&a, &b, &mut m));
        assert_eq!(m.contact_count(), 2);
        assert!((m.normal().x - 1.0).abs() < 1e-3);
        assert!(m.normal().y.abs() < 1e-3);
        for i in 0..m.contact_count() {
            assert!((m.depth(i) - 0.2).abs() < 1e-2);
        }
    }

    #[test]
    fn normal_points_from_a_to_b_when_b_is_reference() {
        let mut a = Shape::new_box(0.5, 0.5);
        a.set_position(Vec2::new(0.8, 0.0));
        let mut b = Shape::new_box(0.5, 0.5);
        b.set_position(Vec2::new(0.0, 0.0));
        let mut m = Manifold::new();
        assert!(collide(&a, &b, &mut m));
        // B is to the left of A here, so the normal (A -> B) should point
        // roughly in the -x direction.
        assert!(m.normal().x < 0.0);
    }
}
