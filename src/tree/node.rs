use slotmap::new_key_type;

use crate::aabb::Aabb;
use crate::body::BodyHandle;

new_key_type! {
    /// Handle into a `BoundingTree`'s node arena.
    pub struct TreeNodeHandle;
}

#[derive(Debug, Clone)]
pub(crate) enum TreeNode {
    Leaf {
        body: BodyHandle,
        aabb: Aabb,
        parent: Option<TreeNodeHandle>,
    },
    Internal {
        aabb: Aabb,
        left: TreeNodeHandle,
        right: TreeNodeHandle,
        parent: Option<TreeNodeHandle>,
        height: u32,
    },
}

impl TreeNode {
    pub(crate) fn aabb(&self) -> Aabb {
        match self {
            TreeNode::Leaf { aabb, .. } => *aabb,
            TreeNode::Internal { aabb, .. } => *aabb,
        }
    }

    pub(crate) fn parent(&self) -> Option<TreeNodeHandle> {
        match self {
            TreeNode::Leaf { parent, .. } => *parent,
            TreeNode::Internal { parent, .. } => *parent,
        }
    }

    pub(crate) fn set_parent(&mut self, p: Option<TreeNodeHandle>) {
        match self {
            TreeNode::Leaf { parent, .. } => *parent = p,
            TreeNode::Internal { parent, .. } => *parent = p,
        }
    }

    pub(crate) fn height(&self) -> u32 {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Internal { height, .. } => *height,
        }
    }

    pub(crate) fn is_leaf(&self) -> bool {
        matches!(self, TreeNode::Leaf { .. })
    }
}
