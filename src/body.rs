//! Rigid body state.

use bitflags::bitflags;
use slotmap::new_key_type;

use crate::external::GameObjectId;
use crate::graph::GraphNodeHandle;
use crate::math::Vec2;
use crate::shape::Shape;
use crate::tree::TreeNodeHandle;

new_key_type! {
    /// Generation-checked handle into a `BodyFactory`'s arena.
    pub struct BodyHandle;
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BodyFlags: u8 {
        const COLLIDABLE          = 0b0000_0001;
        const SELECTABLE          = 0b0000_0010;
        const IGNORE_OWNER_PARENT = 0b0000_0100;
        const SLEEPING            = 0b0000_1000;
    }
}

impl Default for BodyFlags {
    fn default() -> Self {
        BodyFlags::COLLIDABLE | BodyFlags::SELECTABLE
    }
}

/// Surface properties used by the solver's restitution and friction terms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    /// Coefficient of restitution, clamped to `[0, 1]` by construction.
    pub restitution: f32,
    /// Coefficient of friction, clamped to `[0, 1]` by construction.
    pub friction: f32,
}

impl Material {
    pub fn new(restitution: f32, friction: f32) -> Self {
        Material {
            restitution: restitution.clamp(0.0, 1.0),
            friction: friction.clamp(0.0, 1.0),
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Material::new(0.0, 0.5)
    }
}

/// A single rigid body: a locked shape plus translational state.
///
/// Bodies do not store rotation-rate state -- this core is translate-only.
#[derive(Debug, Clone)]
pub struct Body {
    shape: Shape,
    mass: f32,
    inverse_mass: f32,
    velocity: Vec2,
    prev_velocity: Vec2,
    prev_acceleration: Vec2,
    pending_impulse: Vec2,
    material: Material,
    flags: BodyFlags,
    tree_node: Option<TreeNodeHandle>,
    graph_node: Option<GraphNodeHandle>,
    /// Owning game-object id, if any; used by the solver's partition pass and
    /// by `ignore_owner_parent` checks.
    pub owner: Option<GameObjectId>,
}

impl Body {
    /// Creates a body with the given (locked) shape and mass. `mass == 0.0`
    /// produces a static body, with its infinite inverse mass stored as
    /// exactly `0.0`.
    pub fn new(mut shape: Shape, mass: f32) -> crate::error::Result<Self> {
        if !(mass >= 0.0) || !mass.is_finite() {
            return Err(crate::error::PhysicsError::invalid_argument(
                "mass must be finite and non-negative",
            ));
        }
        shape.lock();
        let inverse_mass = if mass == 0.0 { 0.0 } else { 1.0 / mass };
        Ok(Body {
            shape,
            mass,
            inverse_mass,
            velocity: Vec2::ZERO,
            prev_velocity: Vec2::ZERO,
            prev_acceleration: Vec2::ZERO,
            pending_impulse: Vec2::ZERO,
            material: Material::default(),
            flags: BodyFlags::default(),
            tree_node: None,
            graph_node: None,
            owner: None,
        })
    }

    pub fn set_shape(&mut self, mut shape: Shape) {
        shape.lock();
        self.shape = shape;
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn shape_mut(&mut self) -> &mut Shape {
        &mut self.shape
    }

    pub fn set_mass(&mut self, mass: f32) -> crate::error::Result<()> {
        if !(mass >= 0.0) || !mass.is_finite() {
            return Err(crate::error::PhysicsError::invalid_argument(
                "mass must be finite and non-negative",
            ));
        }
        self.mass = mass;
        self.inverse_mass = if mass == 0.0 { 0.0 } else { 1.0 / mass };
        Ok(())
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn inverse_mass(&self) -> f32 {
        self.inverse_mass
    }

    pub fn is_static(&self) -> bool {
        self.inverse_mass == 0.0
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn prev_velocity(&self) -> Vec2 {
        self.prev_velocity
    }

    pub fn prev_acceleration(&self) -> Vec2 {
        self.prev_acceleration
    }

    pub fn set_velocity(&mut self, velocity: Vec2) -> crate::error::Result<()> {
        if !velocity.is_finite() {
            return Err(crate::error::PhysicsError::invalid_argument(
                "velocity must be finite",
            ));
        }
        self.velocity = velocity;
        Ok(())
    }

    /// Buffers an external impulse; folded into velocity at the start of the
    /// next tick's detection phase.
    pub fn add_impulse(&mut self, impulse: Vec2) {
        self.pending_impulse += impulse;
    }

    pub fn set_impulse(&mut self, impulse: Vec2) {
        self.pending_impulse = impulse;
    }

    pub fn pending_impulse(&self) -> Vec2 {
        self.pending_impulse
    }

    pub(crate) fn drain_pending_impulse(&mut self) -> Vec2 {
        core::mem::take(&mut self.pending_impulse)
    }

    /// Records `velocity` as the new velocity, moving the old one into
    /// `prev_velocity` (used to derive acceleration for Verlet integration).
    pub(crate) fn update_velocity(&mut self, new_velocity: Vec2) {
        self.prev_velocity = self.velocity;
        self.velocity = new_velocity;
    }

    /// Overwrites the velocity field without touching `prev_velocity`, used
    /// by the speed-limit clamp immediately before `update_velocity` shifts
    /// it into history.
    pub(crate) fn set_velocity_raw(&mut self, v: Vec2) {
        self.velocity = v;
    }

    /// Adds `delta` to the current velocity; used by warm-start and the
    /// iterative solver, which apply many small, pre-validated deltas per
    /// tick and would make the finite-check in `set_velocity` redundant
    /// overhead.
    pub(crate) fn apply_velocity_delta(&mut self, delta: Vec2) {
        self.velocity += delta;
    }

    pub(crate) fn set_prev_acceleration(&mut self, a: Vec2) {
        self.prev_acceleration = a;
    }

    pub fn material(&self) -> Material {
        self.material
    }

    pub fn set_material(&mut self, material: Material) {
        self.material = material;
    }

    pub fn flags(&self) -> BodyFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: BodyFlags) {
        self.flags = flags;
    }

    pub fn is_collidable(&self) -> bool {
        self.flags.contains(BodyFlags::COLLIDABLE)
    }

    pub fn set_collidable(&mut self, collidable: bool) {
        self.flags.set(BodyFlags::COLLIDABLE, collidable);
    }

    pub fn is_sleeping(&self) -> bool {
        self.flags.contains(BodyFlags::SLEEPING)
    }

    pub(crate) fn set_sleeping(&mut self, sleeping: bool) {
        self.flags.set(BodyFlags::SLEEPING, sleeping);
    }

    pub fn ignores_owner_parent(&self) -> bool {
        self.flags.contains(BodyFlags::IGNORE_OWNER_PARENT)
    }

    pub fn tree_node(&self) -> Option<TreeNodeHandle> {
        self.tree_node
    }

    pub(crate) fn set_tree_node(&mut self, handle: Option<TreeNodeHandle>) {
        self.tree_node = handle;
    }

    pub fn graph_node(&self) -> Option<GraphNodeHandle> {
        self.graph_node
    }

    pub(crate) fn set_graph_node(&mut self, handle: Option<GraphNodeHandle>) {
        self.graph_node = handle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_mass_is_static_with_zero_inverse_mass() {
        let body = Body::new(Shape::new_box(1.0, 1.0), 0.0).unwrap();
        assert!(body.is_static());
        assert_eq!(body.inverse_mass(), 0.0);
    }

    #[test]
    fn negative_mass_rejected() {
        assert!(Body::new(Shape::new_box(1.0, 1.0), -1.0).is_err());
    }

    #[test]
    fn positive_mass_has_reciprocal_inverse_mass() {
        let body = Body::new(Shape::new_box(1.0, 1.0), 2.0).unwrap();
        assert!(!body.is_static());
        assert!((body.inverse_mass() - 0.5).abs() < 1e-6);
    }
}
