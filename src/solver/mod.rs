//! The fixed-timestep tick pipeline: partition bodies into the two
//! bounding trees, detect contacts, warm-start, run the sequential-impulse
//! iterations, integrate, and put settled islands to sleep.

pub mod diagnostics;

use std::time::Instant;

pub use diagnostics::SolverDiagnostics;

use crate::body::BodyHandle;
use crate::contact::ContactHandle;
use crate::error::{PhysicsError, Result};
use crate::external::{BodyFactory, GameObject, GameObjectFactory, GameObjectId};
use crate::graph::ContactGraph;
use crate::manifold::Manifold;
use crate::math::Vec2;
use crate::narrow_phase;
use crate::tree::BoundingTree;

/// Tunable thresholds for the solver, constructed once and immutable for the
/// life of a `Solver` except for `Solver::set_global_acceleration`.
#[derive(Debug, Clone, Copy)]
pub struct SolverConfig {
    pub gravity: Vec2,
    pub iterations: u32,
    pub max_speed: f32,
    pub min_collision_speed: f32,
    pub baumgarte: f32,
    pub penetration_slop: f32,
    pub separation_damping: f32,
    pub friction_damping: f32,
    pub sleep_speed_max: f32,
    pub sleep_delta_max: f32,
    pub sleep_enabled: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            gravity: Vec2::new(0.0, -9.8),
            iterations: 10,
            max_speed: 100.0,
            min_collision_speed: 1.0,
            baumgarte: 0.2,
            penetration_slop: 0.01,
            separation_damping: 0.8,
            friction_damping: 0.9,
            sleep_speed_max: 0.05,
            sleep_delta_max: 0.05,
            sleep_enabled: true,
        }
    }
}

/// Owns the broad-phase trees and contact graph and drives one fixed
/// timestep of simulation per `update` call. Does not own bodies or
/// game objects -- those are supplied per call through the `BodyFactory`
/// and `GameObjectFactory` traits.
pub struct Solver {
    timestep: f32,
    config: SolverConfig,
    static_tree: BoundingTree,
    dynamic_tree: BoundingTree,
    graph: ContactGraph,
    scratch_manifold: Manifold,
    diagnostics: SolverDiagnostics,
}

impl Solver {
    /// `timestep` must be in `(0, 1)` seconds and `config.iterations` must be
    /// greater than zero, or this returns `InvalidArgument`.
    ///
    /// There is no constructor parameter for a body-removal listener; unlike
    /// the ECS host this core was adapted from, the solver does not hold a
    /// long-lived reference to the body factory between ticks. Instead, a
    /// host removing a body should call `Solver::notify_body_removed` first
    /// so the tree/graph state is dropped before the slot is reused -- this
    /// plays the same role as the on-remove hook named in the external
    /// interfaces.
    pub fn new(timestep: f32, config: SolverConfig) -> Result<Self> {
        if !(timestep > 0.0 && timestep < 1.0) {
            return Err(PhysicsError::invalid_argument(
                "timestep must be in (0, 1) seconds",
            ));
        }
        if config.iterations == 0 {
            return Err(PhysicsError::invalid_argument(
                "iterations must be greater than zero",
            ));
        }
        Ok(Solver {
            timestep,
            config,
            static_tree: BoundingTree::new(),
            dynamic_tree: BoundingTree::new(),
            graph: ContactGraph::new(),
            scratch_manifold: Manifold::new(),
            diagnostics: SolverDiagnostics::default(),
        })
    }

    pub fn global_acceleration(&self) -> Vec2 {
        self.config.gravity
    }

    pub fn set_global_acceleration(&mut self, gravity: Vec2) {
        self.config.gravity = gravity;
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn diagnostics(&self) -> SolverDiagnostics {
        self.diagnostics
    }

    /// Drops `body`'s tree and graph state. Hosts must call this before
    /// recycling a `BodyHandle` slot.
    pub fn notify_body_removed(&mut self, body: BodyHandle) {
        self.static_tree.remove(body);
        self.dynamic_tree.remove(body);
        self.graph.remove_body(body);
    }

    /// Ad-hoc broad+narrow phase query, usable outside the fixed
    /// timestep loop. Idempotent; `out` must be empty on entry.
    pub fn collisions<BF: BodyFactory>(
        &self,
        body: BodyHandle,
        bodies: &BF,
        out: &mut Vec<BodyHandle>,
    ) -> Result<()> {
        if !out.is_empty() {
            return Err(PhysicsError::invalid_argument(
                "collisions output buffer must be empty",
            ));
        }
        let Some(this_body) = bodies.get(body) else {
            return Err(PhysicsError::not_found("body handle does not resolve"));
        };
        let aabb = this_body.shape().world_aabb();

        let mut candidates = Vec::new();
        self.static_tree.query(body, aabb, &mut candidates)?;
        self.dynamic_tree.query(body, aabb, &mut candidates)?;

        let mut manifold = Manifold::new();
        for candidate in candidates {
            let Some(other) = bodies.get(candidate) else {
                continue;
            };
            if narrow_phase::collide(this_body.shape(), other.shape(), &mut manifold) {
                out.push(candidate);
            }
        }
        Ok(())
    }

    /// Runs one fixed timestep: partition, detect, warm-start, sleep/wake,
    /// solve, integrate, synchronize.
    pub fn update<BF, GF>(&mut self, bodies: &mut BF, objects: &mut GF) -> Result<()>
    where
        BF: BodyFactory,
        GF: GameObjectFactory,
    {
        let handles: Vec<BodyHandle> = bodies.iter().collect();

        let t0 = Instant::now();
        self.partition(&handles, bodies, objects);
        let t1 = Instant::now();

        self.detect_contacts(&handles, bodies, objects);
        self.graph.drop_invalid_contacts(|h| bodies.is_alive(h));
        let t2 = Instant::now();

        self.warm_start(bodies);
        let t3 = Instant::now();

        if self.config.sleep_enabled {
            self.update_sleep_state(bodies);
        }
        let t4 = Instant::now();

        self.precompute_bias(bodies);
        for _ in 0..self.config.iterations {
            self.solve_iteration(bodies);
        }
        let t5 = Instant::now();

        self.integrate(&handles, bodies);
        self.synchronize(&handles, bodies, objects);
        let t6 = Instant::now();

        self.diagnostics = SolverDiagnostics {
            partition: t1 - t0,
            broad_and_narrow_phase: t2 - t1,
            warm_start: t3 - t2,
            sleep: t4 - t3,
            solve: t5 - t4,
            integrate: t6 - t5,
            active_contact_count: self.graph.iterate_active_contacts().count(),
            awake_body_count: handles
                .iter()
                .filter(|&&h| bodies.get(h).is_some_and(|b| !b.is_sleeping()))
                .count(),
        };
        Ok(())
    }

    fn partition<BF: BodyFactory, GF: GameObjectFactory>(
        &mut self,
        handles: &[BodyHandle],
        bodies: &mut BF,
        objects: &GF,
    ) {
        for &handle in handles {
            let orphaned = bodies
                .get(handle)
                .and_then(|b| b.owner)
                .is_some_and(|owner| objects.get(owner).is_none());
            if orphaned {
                self.notify_body_removed(handle);
                bodies.remove(handle);
                continue;
            }

            let Some(body) = bodies.get(handle) else {
                continue;
            };
            if body.is_collidable() {
                self.graph.add_body(handle);
            } else {
                self.graph.remove_body(handle);
            }

            let aabb = body.shape().world_aabb();
            if body.is_static() {
                self.dynamic_tree.remove(handle);
                if !self.static_tree.insert(handle, aabb) {
                    self.static_tree.update(handle, aabb);
                }
            } else {
                self.static_tree.remove(handle);
                if !self.dynamic_tree.insert(handle, aabb) {
                    self.dynamic_tree.update(handle, aabb);
                }
            }
        }
    }

    fn detect_contacts<BF: BodyFactory, GF: GameObjectFactory>(
        &mut self,
        handles: &[BodyHandle],
        bodies: &mut BF,
        objects: &GF,
    ) {
        for &handle in handles {
            let Some(body) = bodies.get_mut(handle) else {
                continue;
            };
            if body.is_static() || !body.is_collidable() {
                continue;
            }
            let impulse = body.drain_pending_impulse();
            let velocity = body.velocity() + impulse;
            body.set_velocity_raw(velocity);

            let Some(body) = bodies.get(handle) else {
                continue;
            };
            let aabb = body.shape().world_aabb();

            let mut candidates = Vec::new();
            let _ = self.static_tree.query(handle, aabb, &mut candidates);
            let mut dynamic_candidates = Vec::new();
            let _ = self.dynamic_tree.query(handle, aabb, &mut dynamic_candidates);
            candidates.extend(dynamic_candidates);

            for candidate in candidates {
                let existing = self.graph.get_contact(handle, candidate);
                if let Some(h) = existing {
                    if self.graph.contact(h).is_some_and(|c| c.handled_this_tick) {
                        // Already revalidated from the other body's side
                        // this tick; recomputing would be redundant.
                        continue;
                    }
                }

                let Some(body_a) = bodies.get(handle) else {
                    continue;
                };
                let Some(body_b) = bodies.get(candidate) else {
                    continue;
                };
                if !body_b.is_collidable() {
                    continue;
                }
                if Self::should_ignore_pair(body_a, body_b, objects) {
                    continue;
                }

                let colliding =
                    narrow_phase::collide(body_a.shape(), body_b.shape(), &mut self.scratch_manifold);

                match (colliding, existing) {
                    (true, Some(h)) => {
                        if let Some(contact) = self.graph.contact_mut(h) {
                            contact.set_manifold(&self.scratch_manifold);
                            contact.mark_handled();
                        }
                    }
                    (true, None) => {
                        let h = self.graph.add_contact(handle, candidate);
                        if let Some(contact) = self.graph.contact_mut(h) {
                            contact.set_manifold(&self.scratch_manifold);
                            contact.mark_handled();
                        }
                    }
                    (false, Some(_)) => {
                        self.graph.remove_contact(handle, candidate);
                    }
                    (false, None) => {}
                }
            }
        }
    }

    fn should_ignore_pair<GF: GameObjectFactory>(
        a: &crate::body::Body,
        b: &crate::body::Body,
        objects: &GF,
    ) -> bool {
        if !a.ignores_owner_parent() && !b.ignores_owner_parent() {
            return false;
        }
        let (Some(owner_a), Some(owner_b)) = (a.owner, b.owner) else {
            return false;
        };
        if owner_a == owner_b {
            return true;
        }
        if a.ignores_owner_parent() {
            if let Some(obj) = objects.get(owner_a) {
                if obj.parent() == Some(owner_b) {
                    return true;
                }
            }
        }
        if b.ignores_owner_parent() {
            if let Some(obj) = objects.get(owner_b) {
                if obj.parent() == Some(owner_a) {
                    return true;
                }
            }
        }
        false
    }

    fn warm_start<BF: BodyFactory>(&mut self, bodies: &mut BF) {
        let handles: Vec<ContactHandle> =
            self.graph.iterate_active_contacts().map(|(h, _)| h).collect();
        for handle in handles {
            let Some(contact) = self.graph.contact(handle) else {
                continue;
            };
            let (a, b, normal, accum_sep, accum_fric) = (
                contact.a,
                contact.b,
                contact.manifold().normal(),
                contact.accumulated_separation(),
                contact.accumulated_friction(),
            );
            let tangent_a = crate::math::left_perp(normal);
            let tangent_b = crate::math::right_perp(normal);

            if let Some(body_a) = bodies.get_mut(a) {
                let inv_a = body_a.inverse_mass();
                let delta = -normal * accum_sep * inv_a + tangent_a * accum_fric * inv_a;
                body_a.apply_velocity_delta(delta);
            }
            if let Some(body_b) = bodies.get_mut(b) {
                let inv_b = body_b.inverse_mass();
                let delta = normal * accum_sep * inv_b + tangent_b * accum_fric * inv_b;
                body_b.apply_velocity_delta(delta);
            }
        }
    }

    fn update_sleep_state<BF: BodyFactory>(&mut self, bodies: &mut BF) {
        self.graph.recompute_components();
        let sleep_speed_max = self.config.sleep_speed_max;
        let sleep_delta_max = self.config.sleep_delta_max;

        for i in 0..self.graph.component_count() {
            let eligible = self.graph.is_component_sleep_eligible(i, |handle| {
                bodies.get(handle).is_some_and(|body| {
                    body.is_static()
                        || (body.velocity().length() <= sleep_speed_max
                            && (body.velocity() - body.prev_velocity()).length() <= sleep_delta_max)
                })
            });
            if eligible {
                self.graph.sleep_component(i);
            } else {
                self.graph.wake_component(i);
            }
            for &handle in &self.graph.component(i).bodies.clone() {
                if let Some(body) = bodies.get_mut(handle) {
                    if !body.is_static() {
                        body.set_sleeping(eligible);
                    }
                }
            }
        }
    }

    fn precompute_bias<BF: BodyFactory>(&mut self, bodies: &mut BF) {
        let handles: Vec<ContactHandle> =
            self.graph.iterate_active_contacts().map(|(h, _)| h).collect();
        for handle in handles {
            let Some(contact) = self.graph.contact(handle) else {
                continue;
            };
            let (a, b, normal, depth) = (
                contact.a,
                contact.b,
                contact.manifold().normal(),
                contact.max_depth(),
            );
            let (Some(body_a), Some(body_b)) = (bodies.get(a), bodies.get(b)) else {
                continue;
            };
            let inv_a = body_a.inverse_mass();
            let inv_b = body_b.inverse_mass();
            debug_assert!(
                inv_a + inv_b > 0.0,
                "contact between two static bodies violates the solver's invariants"
            );
            let effective_mass = if inv_a + inv_b > 0.0 {
                1.0 / (inv_a + inv_b)
            } else {
                0.0
            };

            let v_rel = body_a.velocity() - body_b.velocity();
            let v_n = v_rel.dot(-normal);
            let e = body_a.material().restitution * body_b.material().restitution;
            let bias = if v_n < -self.config.min_collision_speed {
                (-e * v_n + self.config.baumgarte * (depth - self.config.penetration_slop).max(0.0))
                    * self.config.separation_damping
            } else {
                0.0
            };

            if let Some(contact) = self.graph.contact_mut(handle) {
                contact.set_bias(bias);
                contact.set_effective_mass(effective_mass);
            }
        }
    }

    fn solve_iteration<BF: BodyFactory>(&mut self, bodies: &mut BF) {
        let handles: Vec<ContactHandle> =
            self.graph.iterate_active_contacts().map(|(h, _)| h).collect();
        for handle in handles {
            self.solve_contact(handle, bodies);
        }
    }

    fn solve_contact<BF: BodyFactory>(&mut self, handle: ContactHandle, bodies: &mut BF) {
        let Some(contact) = self.graph.contact(handle) else {
            return;
        };
        let (a, b, normal, k, accum_sep, accum_fric, bias) = (
            contact.a,
            contact.b,
            contact.manifold().normal(),
            contact.effective_mass(),
            contact.accumulated_separation(),
            contact.accumulated_friction(),
            contact.bias(),
        );
        let (Some(mat_a), Some(mat_b)) = (
            bodies.get(a).map(|b| b.material()),
            bodies.get(b).map(|b| b.material()),
        ) else {
            return;
        };

        // Friction first, using the velocity as it stands at the start of
        // this iteration.
        let (inv_a, inv_b) = (
            bodies.get(a).map(|x| x.inverse_mass()).unwrap_or(0.0),
            bodies.get(b).map(|x| x.inverse_mass()).unwrap_or(0.0),
        );
        let tangent = crate::math::left_perp(normal);
        let v_rel = Self::relative_velocity(bodies, a, b);
        let lambda_f = -(v_rel.dot(tangent)) * k * self.config.friction_damping;
        let max_fric = mat_a.friction * mat_b.friction * accum_sep * self.config.friction_damping;
        let new_fric = (accum_fric + lambda_f).clamp(-max_fric, max_fric);
        let delta_f = new_fric - accum_fric;

        if let Some(body_a) = bodies.get_mut(a) {
            body_a.apply_velocity_delta(tangent * delta_f * inv_a);
        }
        if let Some(body_b) = bodies.get_mut(b) {
            body_b.apply_velocity_delta(-tangent * delta_f * inv_b);
        }

        // Separation, using the velocity as updated by the friction pass
        // just above.
        let v_rel = Self::relative_velocity(bodies, a, b);
        let v_n = v_rel.dot(-normal);
        let lambda = -(v_n - bias) * k;
        let new_sep = (accum_sep + lambda).max(0.0);
        let delta_s = new_sep - accum_sep;

        if let Some(body_a) = bodies.get_mut(a) {
            body_a.apply_velocity_delta(-normal * delta_s * inv_a);
        }
        if let Some(body_b) = bodies.get_mut(b) {
            body_b.apply_velocity_delta(normal * delta_s * inv_b);
        }

        if let Some(contact) = self.graph.contact_mut(handle) {
            contact.set_accumulated_friction(new_fric);
            contact.set_accumulated_separation(new_sep);
        }
    }

    fn relative_velocity<BF: BodyFactory>(bodies: &BF, a: BodyHandle, b: BodyHandle) -> Vec2 {
        let va = bodies.get(a).map(|x| x.velocity()).unwrap_or(Vec2::ZERO);
        let vb = bodies.get(b).map(|x| x.velocity()).unwrap_or(Vec2::ZERO);
        va - vb
    }

    fn integrate<BF: BodyFactory>(&mut self, handles: &[BodyHandle], bodies: &mut BF) {
        let h = self.timestep;
        let gravity = self.config.gravity;
        let max_speed = self.config.max_speed;

        for &handle in handles {
            let Some(body) = bodies.get_mut(handle) else {
                continue;
            };
            if body.is_static() || body.is_sleeping() {
                continue;
            }

            let raw_v = body.velocity();
            let speed = raw_v.length();
            let v = if speed > max_speed {
                raw_v * (max_speed / speed)
            } else {
                raw_v
            };
            body.set_velocity_raw(v);

            let prev_v = body.prev_velocity();
            let prev_a = body.prev_acceleration();

            // Velocity-Verlet position update using the previous tick's
            // acceleration.
            let dp = v * h + prev_a * (h * 0.5);
            let new_pos = body.shape().position() + dp;
            body.shape_mut().set_position(new_pos);

            // `a_new` is a velocity delta (acceleration already scaled by
            // `h`), per the `dp` term above treating `prev_a` the same way.
            let a_new = ((v - prev_v) + gravity + prev_a) * h;
            let v_new = v + a_new;
            body.update_velocity(v_new);
            body.set_prev_acceleration(a_new);
        }
    }

    fn synchronize<BF: BodyFactory, GF: GameObjectFactory>(
        &self,
        handles: &[BodyHandle],
        bodies: &BF,
        objects: &mut GF,
    ) {
        for &handle in handles {
            let Some(body) = bodies.get(handle) else {
                continue;
            };
            let Some(owner) = body.owner else {
                continue;
            };
            if let Some(obj) = objects.get_mut(owner) {
                obj.move_to_center(body.shape().position());
            }
        }
    }
}
