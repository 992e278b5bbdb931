//! A single persistent contact between two bodies, created on first overlap
//! and carried across ticks so its warm-start accumulators survive.
//!
//! Bodies in this core are translate-only, so every point in a contact's
//! manifold shares the same relative velocity -- there is no lever arm from
//! a torque term to distinguish them. One pair of accumulators per contact
//! (rather than per manifold point) is therefore both sufficient and exact,
//! not an approximation.

use slotmap::new_key_type;

use crate::body::BodyHandle;
use crate::manifold::Manifold;

new_key_type! {
    /// Handle into a `ContactGraph`'s contact pool. Stable across ticks so
    /// that warm-start accumulators survive even though manifolds are
    /// refreshed every tick.
    pub struct ContactHandle;
}

#[derive(Debug, Clone)]
pub struct Contact {
    /// Non-static endpoint, per the solver's invariant that every contact
    /// has at least one dynamic participant.
    pub a: BodyHandle,
    pub b: BodyHandle,
    manifold: Manifold,
    accumulated_separation: f32,
    accumulated_friction: f32,
    bias: f32,
    /// `1 / (1/m_a + 1/m_b)`, recomputed whenever the manifold is refreshed.
    effective_mass: f32,
    pub(crate) handled_this_tick: bool,
    pub(crate) sleeping: bool,
}

impl Contact {
    pub(crate) fn new(a: BodyHandle, b: BodyHandle) -> Self {
        Contact {
            a,
            b,
            manifold: Manifold::new(),
            accumulated_separation: 0.0,
            accumulated_friction: 0.0,
            bias: 0.0,
            effective_mass: 0.0,
            handled_this_tick: true,
            sleeping: false,
        }
    }

    pub fn manifold(&self) -> &Manifold {
        &self.manifold
    }

    pub(crate) fn set_manifold(&mut self, manifold: &Manifold) {
        self.manifold.copy_from(manifold);
    }

    pub fn max_depth(&self) -> f32 {
        self.manifold
            .points()
            .iter()
            .map(|p| p.depth)
            .fold(0.0_f32, f32::max)
    }

    pub fn accumulated_separation(&self) -> f32 {
        self.accumulated_separation
    }

    pub(crate) fn set_accumulated_separation(&mut self, value: f32) {
        self.accumulated_separation = value;
    }

    pub fn accumulated_friction(&self) -> f32 {
        self.accumulated_friction
    }

    pub(crate) fn set_accumulated_friction(&mut self, value: f32) {
        self.accumulated_friction = value;
    }

    pub fn bias(&self) -> f32 {
        self.bias
    }

    pub(crate) fn set_bias(&mut self, bias: f32) {
        self.bias = bias;
    }

    pub fn effective_mass(&self) -> f32 {
        self.effective_mass
    }

    pub(crate) fn set_effective_mass(&mut self, mass: f32) {
        self.effective_mass = mass;
    }

    pub fn is_sleeping(&self) -> bool {
        self.sleeping
    }

    pub(crate) fn mark_handled(&mut self) {
        self.handled_this_tick = true;
    }
}
