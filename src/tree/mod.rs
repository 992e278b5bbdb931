//! Dynamic AABB tree broad phase.
//!
//! Two independent instances of this tree are kept by the solver, one for
//! static bodies and one for dynamic bodies. Internal nodes cache the union
//! AABB and subtree height of their children and are kept height-balanced
//! with AVL rotations on insert; queries walk an explicit stack rather than
//! recursing so they have no call-depth limit tied to tree shape.

mod node;

pub use node::TreeNodeHandle;
use node::TreeNode;

use std::collections::HashMap;

use slotmap::SlotMap;

use crate::aabb::Aabb;
use crate::body::BodyHandle;
use crate::error::{PhysicsError, Result};

#[derive(Default)]
pub struct BoundingTree {
    nodes: SlotMap<TreeNodeHandle, TreeNode>,
    root: Option<TreeNodeHandle>,
    body_index: HashMap<BodyHandle, TreeNodeHandle>,
}

impl BoundingTree {
    pub fn new() -> Self {
        BoundingTree {
            nodes: SlotMap::with_key(),
            root: None,
            body_index: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn size(&self) -> usize {
        self.body_index.len()
    }

    pub fn root(&self) -> Option<TreeNodeHandle> {
        self.root
    }

    pub fn contains(&self, body: BodyHandle) -> bool {
        self.body_index.contains_key(&body)
    }

    pub fn node_aabb(&self, node: TreeNodeHandle) -> Aabb {
        self.nodes[node].aabb()
    }

    /// Inserts `body` with world-space bounds `aabb`. Returns `false` without
    /// modifying the tree if `body` is already present.
    pub fn insert(&mut self, body: BodyHandle, aabb: Aabb) -> bool {
        if self.body_index.contains_key(&body) {
            return false;
        }

        let leaf = self.nodes.insert(TreeNode::Leaf {
            body,
            aabb,
            parent: None,
        });
        self.body_index.insert(body, leaf);

        let Some(root) = self.root else {
            self.root = Some(leaf);
            return true;
        };

        // Descend to the sibling leaf whose post-insertion union area grows
        // least, breaking ties toward the left child.
        let mut current = root;
        loop {
            if self.nodes[current].is_leaf() {
                break;
            }
            let (left, right) = match self.nodes[current] {
                TreeNode::Internal { left, right, .. } => (left, right),
                TreeNode::Leaf { .. } => unreachable!(),
            };
            let left_area = self.nodes[left].aabb().union(&aabb).area();
            let right_area = self.nodes[right].aabb().union(&aabb).area();
            current = if left_area <= right_area { left } else { right };
        }
        let sibling = current;
        let old_parent = self.nodes[sibling].parent();
        let sibling_aabb = self.nodes[sibling].aabb();

        let new_internal = self.nodes.insert(TreeNode::Internal {
            aabb: sibling_aabb.union(&aabb),
            left: sibling,
            right: leaf,
            parent: old_parent,
            height: 1,
        });
        self.nodes[sibling].set_parent(Some(new_internal));
        self.nodes[leaf].set_parent(Some(new_internal));

        match old_parent {
            None => self.root = Some(new_internal),
            Some(p) => self.replace_child(p, sibling, new_internal),
        }

        self.fix_upward(new_internal);
        true
    }

    /// Removes `body` from the tree. Returns `false` if it was not present.
    pub fn remove(&mut self, body: BodyHandle) -> bool {
        let Some(&leaf) = self.body_index.get(&body) else {
            return false;
        };
        self.body_index.remove(&body);

        let parent = self.nodes[leaf].parent();
        self.nodes.remove(leaf);

        let Some(parent) = parent else {
            // leaf was the root
            self.root = None;
            return true;
        };

        let sibling = match self.nodes[parent] {
            TreeNode::Internal { left, right, .. } => {
                if left == leaf {
                    right
                } else {
                    left
                }
            }
            TreeNode::Leaf { .. } => unreachable!(),
        };
        let grandparent = self.nodes[parent].parent();
        self.nodes[sibling].set_parent(grandparent);
        self.nodes.remove(parent);

        match grandparent {
            None => self.root = Some(sibling),
            Some(gp) => {
                self.replace_child(gp, parent, sibling);
                self.fix_upward(gp);
            }
        }
        true
    }

    /// Refits `body`'s leaf to `new_aabb`. If the existing parent's AABB
    /// still contains the new bounds this is a no-op beyond updating the
    /// leaf's own cached AABB; otherwise falls back to remove + reinsert.
    pub fn update(&mut self, body: BodyHandle, new_aabb: Aabb) -> bool {
        let Some(&leaf) = self.body_index.get(&body) else {
            return false;
        };
        let parent = self.nodes[leaf].parent();
        let fits = match parent {
            Some(p) => self.nodes[p].aabb().contains(&new_aabb),
            None => true,
        };
        if fits {
            if let TreeNode::Leaf { aabb, .. } = &mut self.nodes[leaf] {
                *aabb = new_aabb;
            }
            false
        } else {
            self.remove(body);
            self.insert(body, new_aabb);
            true
        }
    }

    /// Finds every body (other than `exclude`) whose leaf AABB overlaps
    /// `query_aabb`, using an iterative DFS with an explicit stack.
    /// `out` must be empty on entry.
    pub fn query(&self, exclude: BodyHandle, query_aabb: Aabb, out: &mut Vec<BodyHandle>) -> Result<()> {
        if !out.is_empty() {
            return Err(PhysicsError::invalid_argument(
                "query output buffer must be empty",
            ));
        }
        let Some(root) = self.root else {
            return Ok(());
        };
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if !self.nodes[node].aabb().intersects(&query_aabb) {
                continue;
            }
            match self.nodes[node] {
                TreeNode::Leaf { body, .. } => {
                    if body != exclude {
                        out.push(body);
                    }
                }
                TreeNode::Internal { left, right, .. } => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
        Ok(())
    }

    fn replace_child(&mut self, parent: TreeNodeHandle, old_child: TreeNodeHandle, new_child: TreeNodeHandle) {
        if let TreeNode::Internal { left, right, .. } = &mut self.nodes[parent] {
            if *left == old_child {
                *left = new_child;
            } else {
                debug_assert_eq!(*right, old_child);
                *right = new_child;
            }
        } else {
            unreachable!("replace_child called on a leaf");
        }
    }

    /// Recomputes AABB/height from `node` up to the root, rebalancing each
    /// ancestor that has become AVL-unbalanced.
    fn fix_upward(&mut self, node: TreeNodeHandle) {
        let mut current = Some(node);
        while let Some(n) = current {
            self.refit(n);
            let balanced = self.rebalance(n);
            current = self.nodes[balanced].parent();
        }
    }

    fn refit(&mut self, node: TreeNodeHandle) {
        let (left, right) = match self.nodes[node] {
            TreeNode::Internal { left, right, .. } => (left, right),
            TreeNode::Leaf { .. } => return,
        };
        let new_aabb = self.nodes[left].aabb().union(&self.nodes[right].aabb());
        let new_height = 1 + self.nodes[left].height().max(self.nodes[right].height());
        if let TreeNode::Internal { aabb, height, .. } = &mut self.nodes[node] {
            *aabb = new_aabb;
            *height = new_height;
        }
    }

    /// Applies the LL/LR/RR/RL rotation appropriate to `node`'s balance
    /// factor, if any, and returns the handle that now occupies `node`'s old
    /// position in the tree (itself if no rotation was needed).
    fn rebalance(&mut self, node: TreeNodeHandle) -> TreeNodeHandle {
        let (left, right) = match self.nodes[node] {
            TreeNode::Internal { left, right, .. } => (left, right),
            TreeNode::Leaf { .. } => return node,
        };
        let balance = self.nodes[left].height() as i64 - self.nodes[right].height() as i64;

        if balance > 1 {
            let (left_left, left_right) = match self.nodes[left] {
                TreeNode::Internal { left, right, .. } => (left, right),
                TreeNode::Leaf { .. } => unreachable!(),
            };
            if self.nodes[left_left].height() >= self.nodes[left_right].height() {
                log::trace!("bounding tree: LL rotation at {node:?}");
                self.rotate_right(node) // LL
            } else {
                log::trace!("bounding tree: LR rotation at {node:?}");
                self.rotate_left(left); // LR: turn left-right case into left-left
                self.rotate_right(node)
            }
        } else if balance < -1 {
            let (right_left, right_right) = match self.nodes[right] {
                TreeNode::Internal { left, right, .. } => (left, right),
                TreeNode::Leaf { .. } => unreachable!(),
            };
            if self.nodes[right_right].height() >= self.nodes[right_left].height() {
                log::trace!("bounding tree: RR rotation at {node:?}");
                self.rotate_left(node) // RR
            } else {
                log::trace!("bounding tree: RL rotation at {node:?}");
                self.rotate_right(right); // RL: turn right-left case into right-right
                self.rotate_left(node)
            }
        } else {
            node
        }
    }

    /// Standard AVL right rotation: `node`'s left child becomes the new
    /// subtree root, `node` becomes its right child.
    fn rotate_right(&mut self, node: TreeNodeHandle) -> TreeNodeHandle {
        let (pivot, pivot_right) = match self.nodes[node] {
            TreeNode::Internal { left, .. } => {
                let pivot_right = match self.nodes[left] {
                    TreeNode::Internal { right, .. } => right,
                    TreeNode::Leaf { .. } => unreachable!(),
                };
                (left, pivot_right)
            }
            TreeNode::Leaf { .. } => unreachable!(),
        };
        let parent = self.nodes[node].parent();

        if let TreeNode::Internal { left, .. } = &mut self.nodes[node] {
            *left = pivot_right;
        }
        self.nodes[pivot_right].set_parent(Some(node));

        if let TreeNode::Internal { right, .. } = &mut self.nodes[pivot] {
            *right = node;
        }
        self.nodes[node].set_parent(Some(pivot));
        self.nodes[pivot].set_parent(parent);

        match parent {
            None => self.root = Some(pivot),
            Some(p) => self.replace_child(p, node, pivot),
        }

        self.refit(node);
        self.refit(pivot);
        pivot
    }

    /// Mirror image of `rotate_right`.
    fn rotate_left(&mut self, node: TreeNodeHandle) -> TreeNodeHandle {
        let (pivot, pivot_left) = match self.nodes[node] {
            TreeNode::Internal { right, .. } => {
                let pivot_left = match self.nodes[right] {
                    TreeNode::Internal { left, .. } => left,
                    TreeNode::Leaf { .. } => unreachable!(),
                };
                (right, pivot_left)
            }
            TreeNode::Leaf { .. } => unreachable!(),
        };
        let parent = self.nodes[node].parent();

        if let TreeNode::Internal { right, .. } = &mut self.nodes[node] {
            *right = pivot_left;
        }
        self.nodes[pivot_left].set_parent(Some(node));

        if let TreeNode::Internal { left, .. } = &mut self.nodes[pivot] {
            *left = node;
        }
        self.nodes[node].set_parent(Some(pivot));
        self.nodes[pivot].set_parent(parent);

        match parent {
            None => self.root = Some(pivot),
            Some(p) => self.replace_child(p, node, pivot),
        }

        self.refit(node);
        self.refit(pivot);
        pivot
    }

    /// Checks the height-balance invariant on every internal node; used by
    /// tests.
    #[cfg(test)]
    fn is_balanced(&self) -> bool {
        fn check(nodes: &SlotMap<TreeNodeHandle, TreeNode>, node: TreeNodeHandle) -> Option<u32> {
            match &nodes[node] {
                TreeNode::Leaf { .. } => Some(0),
                TreeNode::Internal { left, right, height, .. } => {
                    let lh = check(nodes, *left)?;
                    let rh = check(nodes, *right)?;
                    if (lh as i64 - rh as i64).abs() > 1 {
                        return None;
                    }
                    if *height != 1 + lh.max(rh) {
                        return None;
                    }
                    Some(*height)
                }
            }
        }
        match self.root {
            None => true,
            Some(r) => check(&self.nodes, r).is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Body;
    use crate::shape::Shape;
    use crate::math::Vec2;
    use slotmap::SlotMap;

    fn handles(n: usize) -> (SlotMap<BodyHandle, Body>, Vec<BodyHandle>) {
        let mut bodies = SlotMap::with_key();
        let mut out = Vec::new();
        for _ in 0..n {
            let h = bodies.insert(Body::new(Shape::new_box(0.5, 0.5), 1.0).unwrap());
            out.push(h);
        }
        (bodies, out)
    }

    fn aabb_at(x: f32, y: f32) -> Aabb {
        Aabb::from_center_half_extents(Vec2::new(x, y), Vec2::new(0.5, 0.5))
    }

    #[test]
    fn insert_then_remove_empties_tree() {
        let (_bodies, handles) = handles(3);
        let mut tree = BoundingTree::new();
        for (i, h) in handles.iter().enumerate() {
            tree.insert(*h, aabb_at(i as f32 * 2.0, 0.0));
        }
        assert_eq!(tree.size(), 3);
        for h in &handles {
            assert!(tree.remove(*h));
        }
        assert!(tree.is_empty());
        assert_eq!(tree.size(), 0);
    }

    #[test]
    fn duplicate_insert_returns_false() {
        let (_bodies, handles) = handles(1);
        let mut tree = BoundingTree::new();
        assert!(tree.insert(handles[0], aabb_at(0.0, 0.0)));
        assert!(!tree.insert(handles[0], aabb_at(0.0, 0.0)));
    }

    #[test]
    fn stays_balanced_after_many_inserts() {
        let (_bodies, handles) = handles(200);
        let mut tree = BoundingTree::new();
        for (i, h) in handles.iter().enumerate() {
            tree.insert(*h, aabb_at((i % 20) as f32 * 2.0, (i / 20) as f32 * 2.0));
            assert!(tree.is_balanced());
        }
    }

    #[test]
    fn query_excludes_self_and_finds_overlap() {
        let (_bodies, handles) = handles(3);
        let mut tree = BoundingTree::new();
        tree.insert(handles[0], aabb_at(0.0, 0.0));
        tree.insert(handles[1], aabb_at(0.9, 0.0)); // overlaps handles[0]
        tree.insert(handles[2], aabb_at(10.0, 10.0)); // isolated

        let mut out = Vec::new();
        tree.query(handles[0], aabb_at(0.0, 0.0), &mut out).unwrap();
        assert_eq!(out, vec![handles[1]]);
    }

    #[test]
    fn query_requires_empty_output_buffer() {
        let (_bodies, handles) = handles(1);
        let mut tree = BoundingTree::new();
        tree.insert(handles[0], aabb_at(0.0, 0.0));
        let mut out = vec![handles[0]];
        assert!(tree.query(handles[0], aabb_at(0.0, 0.0), &mut out).is_err());
    }

    #[test]
    fn update_without_movement_is_a_noop_structurally() {
        let (_bodies, handles) = handles(1);
        let mut tree = BoundingTree::new();
        let aabb = aabb_at(0.0, 0.0);
        tree.insert(handles[0], aabb);
        assert!(!tree.update(handles[0], aabb));
    }
}
