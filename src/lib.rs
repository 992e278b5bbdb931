//! A fixed-timestep 2D rigid-body physics core.
//!
//! Three subsystems cooperate every tick: a dynamic [`tree::BoundingTree`]
//! pair (static and dynamic) prunes candidate pairs, [`narrow_phase`] runs
//! SAT plus Sutherland-Hodgman clipping to build a [`manifold::Manifold`],
//! and [`solver::Solver`] turns surviving contacts into velocity changes via
//! a sequential-impulse iteration with warm-starting, restitution, friction
//! clamping, and island-based sleeping coordinated through a
//! [`graph::ContactGraph`].
//!
//! Bodies translate only -- there is no rotational dynamics, no continuous
//! collision detection, and no constraint type beyond contact + friction.
//! The game-object/ECS layer, rendering, input, and asset loading are all
//! external collaborators, reached only through the traits in [`external`].
//!
//! ```
//! use physics2d::prelude::*;
//! use slotmap::SlotMap;
//!
//! struct Bodies(SlotMap<BodyHandle, Body>);
//!
//! impl BodyFactory for Bodies {
//!     type Iter<'a> = std::iter::Copied<std::slice::Iter<'a, BodyHandle>>
//!     where
//!         Self: 'a;
//!
//!     fn iter(&self) -> Self::Iter<'_> {
//!         // A real host would keep a persistent index list; for this
//!         // example any iterator of live handles will do.
//!         unimplemented!()
//!     }
//!     fn get(&self, handle: BodyHandle) -> Option<&Body> {
//!         self.0.get(handle)
//!     }
//!     fn get_mut(&mut self, handle: BodyHandle) -> Option<&mut Body> {
//!         self.0.get_mut(handle)
//!     }
//!     fn remove(&mut self, handle: BodyHandle) -> Option<Body> {
//!         self.0.remove(handle)
//!     }
//! }
//!
//! let config = SolverConfig::default();
//! let solver = Solver::new(1.0 / 60.0, config).unwrap();
//! assert_eq!(solver.global_acceleration(), Vec2::new(0.0, -9.8));
//! ```

pub mod aabb;
pub mod body;
pub mod contact;
pub mod error;
pub mod external;
pub mod graph;
pub mod manifold;
pub mod math;
pub mod narrow_phase;
pub mod shape;
pub mod solver;
pub mod tree;

/// Re-exports of the types most host code needs, mirroring the crate's
/// public surface without requiring a module path for each.
pub mod prelude {
    pub use crate::aabb::Aabb;
    pub use crate::body::{Body, BodyFlags, BodyHandle, Material};
    pub use crate::contact::{Contact, ContactHandle};
    pub use crate::error::{PhysicsError, Result};
    pub use crate::external::{BodyFactory, GameObject, GameObjectFactory, GameObjectId};
    pub use crate::graph::{Component, ContactGraph, GraphNodeHandle};
    pub use crate::manifold::{ContactPoint, Manifold};
    pub use crate::math::Vec2;
    pub use crate::shape::Shape;
    pub use crate::solver::{Solver, SolverConfig, SolverDiagnostics};
    pub use crate::tree::{BoundingTree, TreeNodeHandle};
}
