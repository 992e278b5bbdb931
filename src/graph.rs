//! The contact graph: an undirected multigraph over bodies whose
//! edges are contacts, used both to look up existing contacts by pair and to
//! group bodies into connected components for island sleeping.

use std::collections::HashMap;

use slotmap::{new_key_type, Key, SlotMap};

use crate::body::BodyHandle;
use crate::contact::{Contact, ContactHandle};

new_key_type! {
    /// Handle into a `ContactGraph`'s body-node arena.
    pub struct GraphNodeHandle;
}

struct GraphNode {
    body: BodyHandle,
    contacts: Vec<ContactHandle>,
}

/// A connected component of the contact graph, recomputed once per tick.
#[derive(Debug, Clone, Default)]
pub struct Component {
    pub bodies: Vec<BodyHandle>,
    pub sleeping: bool,
}

fn canonical_pair(a: BodyHandle, b: BodyHandle) -> (BodyHandle, BodyHandle) {
    if a.data().as_ffi() <= b.data().as_ffi() {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Default)]
pub struct ContactGraph {
    nodes: SlotMap<GraphNodeHandle, GraphNode>,
    body_index: HashMap<BodyHandle, GraphNodeHandle>,
    contacts: SlotMap<ContactHandle, Contact>,
    pair_index: HashMap<(BodyHandle, BodyHandle), ContactHandle>,
    components: Vec<Component>,
}

impl ContactGraph {
    pub fn new() -> Self {
        ContactGraph {
            nodes: SlotMap::with_key(),
            body_index: HashMap::new(),
            contacts: SlotMap::with_key(),
            pair_index: HashMap::new(),
            components: Vec::new(),
        }
    }

    pub fn contains_body(&self, body: BodyHandle) -> bool {
        self.body_index.contains_key(&body)
    }

    /// Adds `body` as a graph node if not already present. No-op otherwise.
    pub fn add_body(&mut self, body: BodyHandle) -> GraphNodeHandle {
        if let Some(&existing) = self.body_index.get(&body) {
            return existing;
        }
        let handle = self.nodes.insert(GraphNode {
            body,
            contacts: Vec::new(),
        });
        self.body_index.insert(body, handle);
        handle
    }

    /// Removes `body` and every contact incident to it.
    pub fn remove_body(&mut self, body: BodyHandle) {
        let Some(node_handle) = self.body_index.remove(&body) else {
            return;
        };
        let incident = self.nodes[node_handle].contacts.clone();
        for contact_handle in incident {
            if let Some(contact) = self.contacts.get(contact_handle) {
                let pair = canonical_pair(contact.a, contact.b);
                self.remove_contact_handle(contact_handle, pair);
            }
        }
        self.nodes.remove(node_handle);
    }

    pub fn get_contact(&self, a: BodyHandle, b: BodyHandle) -> Option<ContactHandle> {
        self.pair_index.get(&canonical_pair(a, b)).copied()
    }

    pub fn contact(&self, handle: ContactHandle) -> Option<&Contact> {
        self.contacts.get(handle)
    }

    pub fn contact_mut(&mut self, handle: ContactHandle) -> Option<&mut Contact> {
        self.contacts.get_mut(handle)
    }

    /// Creates a new contact between `a` and `b`, adding either endpoint as a
    /// graph node if it isn't one already. `a` and `b` must be distinct and
    /// must not already have a contact (callers check via `get_contact`
    /// first, per the solver's double-processing guard).
    pub fn add_contact(&mut self, a: BodyHandle, b: BodyHandle) -> ContactHandle {
        debug_assert_ne!(a, b, "a body cannot contact itself");
        let node_a = self.add_body(a);
        let node_b = self.add_body(b);

        let handle = self.contacts.insert(Contact::new(a, b));
        self.nodes[node_a].contacts.push(handle);
        self.nodes[node_b].contacts.push(handle);
        self.pair_index.insert(canonical_pair(a, b), handle);
        log::debug!("contact graph: created contact {handle:?} between {a:?} and {b:?}");
        handle
    }

    pub fn remove_contact(&mut self, a: BodyHandle, b: BodyHandle) -> bool {
        let pair = canonical_pair(a, b);
        match self.pair_index.get(&pair).copied() {
            Some(handle) => {
                self.remove_contact_handle(handle, pair);
                true
            }
            None => false,
        }
    }

    fn remove_contact_handle(&mut self, handle: ContactHandle, pair: (BodyHandle, BodyHandle)) {
        self.pair_index.remove(&pair);
        if let Some(contact) = self.contacts.remove(handle) {
            log::debug!(
                "contact graph: destroyed contact {handle:?} between {:?} and {:?}",
                contact.a,
                contact.b
            );
            for body in [contact.a, contact.b] {
                if let Some(&node) = self.body_index.get(&body) {
                    self.nodes[node].contacts.retain(|&h| h != handle);
                }
            }
        }
    }

    /// Drops every contact that was not re-validated during this tick's
    /// narrow-phase sweep, or whose endpoint no longer exists per
    /// `body_alive`. Clears the `handled` flag on every surviving contact for
    /// the next tick.
    pub fn drop_invalid_contacts(&mut self, body_alive: impl Fn(BodyHandle) -> bool) {
        let stale: Vec<(ContactHandle, (BodyHandle, BodyHandle))> = self
            .contacts
            .iter()
            .filter(|(_, c)| !c.handled_this_tick || !body_alive(c.a) || !body_alive(c.b))
            .map(|(h, c)| (h, canonical_pair(c.a, c.b)))
            .collect();
        for (handle, pair) in stale {
            self.remove_contact_handle(handle, pair);
        }
        for (_, contact) in self.contacts.iter_mut() {
            contact.handled_this_tick = false;
        }
    }

    /// All currently awake contacts, in graph insertion order.
    pub fn iterate_active_contacts(&self) -> impl Iterator<Item = (ContactHandle, &Contact)> {
        self.contacts.iter().filter(|(_, c)| !c.sleeping)
    }

    pub fn iterate_active_contacts_mut(
        &mut self,
    ) -> impl Iterator<Item = (ContactHandle, &mut Contact)> {
        self.contacts.iter_mut().filter(|(_, c)| !c.sleeping)
    }

    /// Recomputes connected components via iterative DFS. Must be called
    /// once per tick before the sleep/wake queries below are meaningful.
    pub fn recompute_components(&mut self) {
        self.components.clear();
        let mut visited: HashMap<GraphNodeHandle, bool> =
            self.nodes.keys().map(|k| (k, false)).collect();

        for start in self.nodes.keys() {
            if visited[&start] {
                continue;
            }
            let mut bodies = Vec::new();
            let mut stack = vec![start];
            visited.insert(start, true);
            while let Some(node_handle) = stack.pop() {
                let node = &self.nodes[node_handle];
                bodies.push(node.body);
                for &contact_handle in &node.contacts {
                    let Some(contact) = self.contacts.get(contact_handle) else {
                        continue;
                    };
                    for neighbor_body in [contact.a, contact.b] {
                        if let Some(&neighbor_node) = self.body_index.get(&neighbor_body) {
                            if !visited[&neighbor_node] {
                                visited.insert(neighbor_node, true);
                                stack.push(neighbor_node);
                            }
                        }
                    }
                }
            }
            self.components.push(Component {
                bodies,
                sleeping: false,
            });
        }
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn component(&self, index: usize) -> &Component {
        &self.components[index]
    }

    /// A component with a single body has no incident contact (every edge
    /// in the DFS that built it connects two distinct bodies), so it is
    /// never sleep-eligible regardless of per-body speed: a contactless
    /// body under acceleration must keep integrating, not freeze at rest on
    /// the tick it happens to start with zero velocity.
    pub fn is_component_sleep_eligible(
        &self,
        index: usize,
        eligible: impl Fn(BodyHandle) -> bool,
    ) -> bool {
        let component = &self.components[index];
        component.bodies.len() > 1 && component.bodies.iter().all(|&b| eligible(b))
    }

    pub fn sleep_component(&mut self, index: usize) {
        self.set_component_sleeping(index, true);
    }

    pub fn wake_component(&mut self, index: usize) {
        self.set_component_sleeping(index, false);
    }

    fn set_component_sleeping(&mut self, index: usize, sleeping: bool) {
        if self.components[index].sleeping != sleeping {
            log::debug!(
                "contact graph: component {index} ({} bodies) {}",
                self.components[index].bodies.len(),
                if sleeping { "sleeping" } else { "waking" }
            );
        }
        self.components[index].sleeping = sleeping;
        for &body in &self.components[index].bodies.clone() {
            if let Some(&node) = self.body_index.get(&body) {
                for &contact_handle in &self.nodes[node].contacts {
                    if let Some(contact) = self.contacts.get_mut(contact_handle) {
                        contact.sleeping = sleeping;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Body;
    use crate::shape::Shape;
    use slotmap::SlotMap;

    fn make_bodies(n: usize) -> Vec<BodyHandle> {
        let mut map: SlotMap<BodyHandle, Body> = SlotMap::with_key();
        (0..n)
            .map(|_| map.insert(Body::new(Shape::new_box(0.5, 0.5), 1.0).unwrap()))
            .collect()
    }

    #[test]
    fn add_then_remove_contact_restores_empty_state() {
        let bodies = make_bodies(2);
        let mut graph = ContactGraph::new();
        graph.add_contact(bodies[0], bodies[1]);
        assert!(graph.get_contact(bodies[0], bodies[1]).is_some());
        assert!(graph.remove_contact(bodies[1], bodies[0]));
        assert!(graph.get_contact(bodies[0], bodies[1]).is_none());
    }

    #[test]
    fn lookup_is_order_insensitive() {
        let bodies = make_bodies(2);
        let mut graph = ContactGraph::new();
        let h = graph.add_contact(bodies[0], bodies[1]);
        assert_eq!(graph.get_contact(bodies[1], bodies[0]), Some(h));
    }

    #[test]
    fn components_group_transitively_connected_bodies() {
        let bodies = make_bodies(3);
        let mut graph = ContactGraph::new();
        graph.add_contact(bodies[0], bodies[1]);
        graph.add_contact(bodies[1], bodies[2]);
        graph.recompute_components();
        assert_eq!(graph.component_count(), 1);
        assert_eq!(graph.component(0).bodies.len(), 3);
    }

    #[test]
    fn unhandled_contact_is_dropped() {
        let bodies = make_bodies(2);
        let mut graph = ContactGraph::new();
        let handle = graph.add_contact(bodies[0], bodies[1]);
        graph.contact_mut(handle).unwrap().handled_this_tick = false;
        graph.drop_invalid_contacts(|_| true);
        assert!(graph.get_contact(bodies[0], bodies[1]).is_none());
    }
}
