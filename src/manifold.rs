//! Narrow-phase output: a contact normal plus up to two contact points.

use crate::math::Vec2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactPoint {
    pub point: Vec2,
    /// Penetration depth along the manifold normal; always >= 0.
    pub depth: f32,
}

/// At most two contact points, with a normal pointing from body A toward
/// body B. Reused across narrow-phase calls by the solver to avoid
/// per-pair allocation of the `Manifold` itself (the small point vector
/// still lives on the heap, but its capacity is reserved once and never
/// exceeds 2 entries).
#[derive(Debug, Clone, Default)]
pub struct Manifold {
    normal: Vec2,
    points: Vec<ContactPoint>,
}

impl Manifold {
    pub fn new() -> Self {
        Manifold {
            normal: Vec2::ZERO,
            points: Vec::with_capacity(2),
        }
    }

    pub fn clear(&mut self) {
        self.normal = Vec2::ZERO;
        self.points.clear();
    }

    pub fn copy_from(&mut self, other: &Manifold) {
        self.normal = other.normal;
        self.points.clear();
        self.points.extend_from_slice(&other.points);
    }

    pub fn set_normal(&mut self, normal: Vec2) {
        self.normal = normal;
    }

    pub fn push_point(&mut self, point: ContactPoint) {
        debug_assert!(self.points.len() < 2, "manifold never holds more than 2 points");
        self.points.push(point);
    }

    pub fn normal(&self) -> Vec2 {
        self.normal
    }

    pub fn contact_count(&self) -> usize {
        self.points.len()
    }

    pub fn contact_point(&self, i: usize) -> Vec2 {
        self.points[i].point
    }

    pub fn depth(&self, i: usize) -> f32 {
        self.points[i].depth
    }

    pub fn points(&self) -> &[ContactPoint] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
