//! Convex polygon shapes.
//!
//! A shape is authored with local-space vertices, a position, and a rotation.
//! Once assigned to a body it is locked: `vertices()` stays fixed for its
//! lifetime and only `set_position`/`set_rotation` may move it, each of which
//! invalidates and recomputes the cached world-space AABB.

use crate::aabb::Aabb;
use crate::math::Vec2;

#[derive(Debug, Clone)]
pub struct Shape {
    local_vertices: Vec<Vec2>,
    position: Vec2,
    rotation: f64,
    locked: bool,
    world_vertices: Vec<Vec2>,
    world_aabb: Aabb,
}

impl Shape {
    /// Builds a shape from local-space vertices (at least 3, wound
    /// consistently). Not yet locked -- callers may still mutate vertex data
    /// up until it is handed to a `Body`.
    pub fn new(local_vertices: Vec<Vec2>) -> Self {
        assert!(
            local_vertices.len() >= 3,
            "shape requires at least 3 vertices"
        );
        let mut shape = Shape {
            local_vertices,
            position: Vec2::ZERO,
            rotation: 0.0,
            locked: false,
            world_vertices: Vec::new(),
            world_aabb: Aabb::new(Vec2::ZERO, Vec2::ZERO),
        };
        shape.recompute();
        shape
    }

    pub fn new_box(half_width: f32, half_height: f32) -> Self {
        Shape::new(vec![
            Vec2::new(-half_width, -half_height),
            Vec2::new(half_width, -half_height),
            Vec2::new(half_width, half_height),
            Vec2::new(-half_width, half_height),
        ])
    }

    /// Called once by `Body::new`/`Body::set_shape`; forbids further vertex
    /// mutation.
    pub(crate) fn lock(&mut self) {
        self.locked = true;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn vertex_count(&self) -> usize {
        self.local_vertices.len()
    }

    /// World-space vertices, cyclic: edge `i` runs from vertex `i` to vertex
    /// `(i + 1) % n`.
    pub fn world_vertices(&self) -> &[Vec2] {
        &self.world_vertices
    }

    pub fn world_vertex(&self, i: usize) -> Vec2 {
        self.world_vertices[i % self.world_vertices.len()]
    }

    /// Outward edge normal for edge `i` (unit length, points away from the
    /// polygon interior for counter-clockwise winding).
    pub fn edge_normal(&self, i: usize) -> Vec2 {
        let n = self.world_vertices.len();
        let a = self.world_vertices[i % n];
        let b = self.world_vertices[(i + 1) % n];
        let edge = b - a;
        crate::math::right_perp(edge).normalize_or_zero()
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    pub fn world_aabb(&self) -> Aabb {
        self.world_aabb
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
        self.recompute();
    }

    pub fn set_rotation(&mut self, rotation: f64) {
        self.rotation = rotation;
        self.recompute();
    }

    pub fn set_position_and_rotation(&mut self, position: Vec2, rotation: f64) {
        self.position = position;
        self.rotation = rotation;
        self.recompute();
    }

    fn recompute(&mut self) {
        let (sin, cos) = self.rotation.sin_cos();
        let (sin, cos) = (sin as f32, cos as f32);
        self.world_vertices.clear();
        self.world_vertices.extend(self.local_vertices.iter().map(|v| {
            let rotated = Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos);
            rotated + self.position
        }));

        let mut min = self.world_vertices[0];
        let mut max = self.world_vertices[0];
        for v in &self.world_vertices[1..] {
            min = min.min(*v);
            max = max.max(*v);
        }
        self.world_aabb = Aabb::new(min, max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_aabb_matches_half_extents() {
        let mut s = Shape::new_box(1.0, 0.5);
        s.set_position(Vec2::new(2.0, 3.0));
        let aabb = s.world_aabb();
        assert!((aabb.min - Vec2::new(1.0, 2.5)).length() < 1e-5);
        assert!((aabb.max - Vec2::new(3.0, 3.5)).length() < 1e-5);
    }

    #[test]
    fn rotation_expands_aabb() {
        let mut s = Shape::new_box(1.0, 1.0);
        let unrotated = s.world_aabb();
        s.set_rotation(std::f64::consts::FRAC_PI_4);
        let rotated = s.world_aabb();
        assert!(rotated.area() > unrotated.area());
    }

    #[test]
    #[should_panic]
    fn degenerate_shape_panics() {
        Shape::new(vec![Vec2::ZERO, Vec2::X]);
    }
}
