//! The implicit shape of a GGM tree over an arbitrary number of leaves.
//!
//! A leaf count `N` that is not a power of two is decomposed into its binary
//! representation: one perfect binary tree (a “peak”) per set bit, ordered by
//! strictly decreasing size, with the leaves of each peak occupying the next
//! contiguous block of leaf indices. This is the same forest a Merkle Mountain
//! Range with `N` leaves consists of.
//!
//! All peaks live inside a single *virtual* perfect binary tree of height
//! `⌈log2 N⌉`. Every node is identified by its [`NodeId`], _i.e._, its depth
//! in the virtual tree and its index within that depth. Nodes fall into three
//! classes:
//!
//! - forest nodes, whose leaf block lies entirely inside `[0, N)`,
//! - synthetic nodes, whose leaf block starts inside `[0, N)` but sticks out
//!   past `N`; together they form the super-root joining the peaks,
//! - absent nodes, whose leaf block starts at or after `N`.
//!
//! Absent nodes are never part of the domain. They only ever show up as a
//! [`Child::Absent`] or as the sibling of a synthetic node.
//!
//! ```markdown
//!  N = 5, height 3             (0,0)*
//!                           /          \
//!                    (1,0)              (1,1)*
//!                   /     \            /      \
//!              (2,0)       (2,1)   (2,2)*    absent
//!              /   \       /   \   /    \
//!           (3,0)(3,1)(3,2)(3,3)(3,4)  absent
//! ```
//!
//! Synthetic nodes are marked with `*`. The peaks are `(1,0)` covering leaves
//! `[0, 4)` and `(3,4)` covering leaf `4`.

use std::fmt;
use std::ops::Range;

use arbitrary::Arbitrary;
use get_size2::GetSize;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// The maximal height of the virtual tree. Keeps all leaf-block arithmetic
/// comfortably inside a `u64`.
pub const MAX_HEIGHT: u32 = 62;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Error)]
#[non_exhaustive]
pub enum TreeError {
    #[error("a GGM tree needs at least one leaf")]
    NoLeaves,

    #[error("leaf count {0} exceeds the maximum of 2^62")]
    TooManyLeaves(u64),

    #[error("node {0} is outside the tree's domain")]
    OutOfRange(NodeId),

    #[error("leaf index {leaf_index} out of range for tree with {num_leaves} leaves")]
    LeafIndexOutOfRange { leaf_index: u64, num_leaves: u64 },
}

/// A node in the virtual perfect binary tree.
///
/// The root is `(0, 0)`; the children of `(d, i)` are `(d + 1, 2i)` and
/// `(d + 1, 2i + 1)`. Whether a `NodeId` refers to an existing node depends on
/// the [`TreeShape`] it is used with.
#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    GetSize,
    Arbitrary,
)]
pub struct NodeId {
    depth: u32,
    index: u64,
}

impl NodeId {
    pub const fn new(depth: u32, index: u64) -> Self {
        Self { depth, index }
    }

    pub const fn depth(self) -> u32 {
        self.depth
    }

    pub const fn index(self) -> u64 {
        self.index
    }

    /// The parent in the virtual tree, or `None` for the root.
    pub(crate) fn parent(self) -> Option<Self> {
        let depth = self.depth.checked_sub(1)?;
        Some(Self::new(depth, self.index / 2))
    }

    pub(crate) fn left_child(self) -> Self {
        Self::new(self.depth + 1, 2 * self.index)
    }

    pub(crate) fn right_child(self) -> Self {
        Self::new(self.depth + 1, 2 * self.index + 1)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.depth, self.index)
    }
}

/// A reference to a child (or sibling) that may or may not exist.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Child {
    Present(NodeId),
    Absent,
}

impl Child {
    pub fn node(self) -> Option<NodeId> {
        match self {
            Child::Present(node) => Some(node),
            Child::Absent => None,
        }
    }

    pub fn is_present(self) -> bool {
        matches!(self, Child::Present(_))
    }
}

/// The half-open, contiguous range of leaf indices underneath some node.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct LeafRange {
    start: u64,
    end: u64,
}

impl LeafRange {
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    pub fn start(self) -> u64 {
        self.start
    }

    pub fn end(self) -> u64 {
        self.end
    }

    pub fn len(self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(self) -> bool {
        self.start == self.end
    }

    pub fn contains(self, leaf_index: u64) -> bool {
        (self.start..self.end).contains(&leaf_index)
    }

    pub fn is_disjoint(self, other: Self) -> bool {
        self.end <= other.start || other.end <= self.start
    }

    pub fn indices(self) -> Range<u64> {
        self.start..self.end
    }
}

impl From<LeafRange> for Range<u64> {
    fn from(range: LeafRange) -> Self {
        range.indices()
    }
}

impl fmt::Display for LeafRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// The shape of a GGM tree with a fixed number of leaves. Cheap to copy and
/// immutable, so it can be shared freely between concurrent openings and
/// verifications.
///
/// Serializes as the bare number of leaves. Deserialization goes through
/// [`TreeShape::new`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct TreeShape {
    num_leaves: u64,
    height: u32,
}

impl TryFrom<u64> for TreeShape {
    type Error = TreeError;

    fn try_from(num_leaves: u64) -> Result<Self, Self::Error> {
        Self::new(num_leaves)
    }
}

impl From<TreeShape> for u64 {
    fn from(shape: TreeShape) -> Self {
        shape.num_leaves
    }
}

impl TreeShape {
    pub const MAX_NUM_LEAVES: u64 = 1 << MAX_HEIGHT;

    pub fn new(num_leaves: u64) -> Result<Self, TreeError> {
        if num_leaves == 0 {
            return Err(TreeError::NoLeaves);
        }
        if num_leaves > Self::MAX_NUM_LEAVES {
            return Err(TreeError::TooManyLeaves(num_leaves));
        }

        // ⌈log2 num_leaves⌉
        let height = u64::BITS - (num_leaves - 1).leading_zeros();
        Ok(Self { num_leaves, height })
    }

    pub fn num_leaves(&self) -> u64 {
        self.num_leaves
    }

    /// The height of the virtual tree. All leaves live at this depth.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The root of the virtual tree. Unless the number of leaves is a power of
    /// two, this is a synthetic node.
    pub fn root_node(&self) -> NodeId {
        NodeId::new(0, 0)
    }

    /// The number of nodes at `depth` that are part of the domain, _i.e._,
    /// whose leaf block intersects `[0, N)`. Zero for depths below the leaves.
    pub fn layer_size(&self, depth: u32) -> u64 {
        if depth > self.height {
            return 0;
        }
        ((self.num_leaves - 1) >> (self.height - depth)) + 1
    }

    /// The number of nodes per depth, from the root down to the leaves.
    pub fn layer_sizes(&self) -> Vec<u64> {
        (0..=self.height).map(|depth| self.layer_size(depth)).collect()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        node.depth <= self.height && node.index < self.layer_size(node.depth)
    }

    /// The roots of the perfect binary trees making up the forest, in order of
    /// their leaf blocks. Their sizes are the powers of two in the binary
    /// representation of the number of leaves.
    pub fn peaks(&self) -> Vec<NodeId> {
        let mut peaks = Vec::with_capacity(self.num_leaves.count_ones() as usize);
        let mut offset = 0;
        for peak_height in (0..=self.height).rev() {
            let peak_size = 1 << peak_height;
            if self.num_leaves & peak_size == 0 {
                continue;
            }
            peaks.push(NodeId::new(
                self.height - peak_height,
                offset >> peak_height,
            ));
            offset += peak_size;
        }

        peaks
    }

    pub fn depth_of(&self, node: NodeId) -> Result<u32, TreeError> {
        self.check(node)?;
        Ok(node.depth)
    }

    pub fn range_of(&self, node: NodeId) -> Result<LeafRange, TreeError> {
        self.check(node)?;
        Ok(self.range(node))
    }

    pub fn is_leaf(&self, node: NodeId) -> Result<bool, TreeError> {
        self.check(node)?;
        Ok(self.is_leaf_unchecked(node))
    }

    /// Whether the node belongs to the super-root structure joining the peaks
    /// rather than to one of the perfect binary trees of the forest.
    pub fn is_synthetic(&self, node: NodeId) -> Result<bool, TreeError> {
        self.check(node)?;
        Ok(self.is_synthetic_unchecked(node))
    }

    pub fn parent_of(&self, node: NodeId) -> Result<Option<NodeId>, TreeError> {
        self.check(node)?;
        Ok(node.parent())
    }

    /// Both child slots of the node. Leaves have two absent children, synthetic
    /// nodes may have an absent right child, forest nodes that are not leaves
    /// always have two present children.
    pub fn children_of(&self, node: NodeId) -> Result<[Child; 2], TreeError> {
        self.check(node)?;
        Ok(self.children(node))
    }

    pub fn sibling_of(&self, node: NodeId) -> Result<Child, TreeError> {
        self.check(node)?;
        let Some(parent) = node.parent() else {
            return Ok(Child::Absent);
        };
        let sibling = NodeId::new(node.depth, node.index ^ 1);
        debug_assert_eq!(Some(parent), sibling.parent());

        Ok(self.child_slot(sibling))
    }

    pub fn leaf_node(&self, leaf_index: u64) -> Result<NodeId, TreeError> {
        if leaf_index >= self.num_leaves {
            return Err(TreeError::LeafIndexOutOfRange {
                leaf_index,
                num_leaves: self.num_leaves,
            });
        }
        Ok(NodeId::new(self.height, leaf_index))
    }

    fn check(&self, node: NodeId) -> Result<(), TreeError> {
        match self.contains(node) {
            true => Ok(()),
            false => Err(TreeError::OutOfRange(node)),
        }
    }

    fn subtree_height(&self, node: NodeId) -> u32 {
        self.height - node.depth
    }

    pub(crate) fn range(&self, node: NodeId) -> LeafRange {
        let subtree_height = self.subtree_height(node);
        let start = node.index << subtree_height;
        let end = ((node.index + 1) << subtree_height).min(self.num_leaves);
        LeafRange::new(start, end)
    }

    pub(crate) fn is_leaf_unchecked(&self, node: NodeId) -> bool {
        node.depth == self.height
    }

    pub(crate) fn is_synthetic_unchecked(&self, node: NodeId) -> bool {
        (node.index + 1) << self.subtree_height(node) > self.num_leaves
    }

    pub(crate) fn children(&self, node: NodeId) -> [Child; 2] {
        if self.is_leaf_unchecked(node) {
            return [Child::Absent, Child::Absent];
        }

        // The left child starts where its parent starts, so it always exists.
        let left = Child::Present(node.left_child());
        let right = self.child_slot(node.right_child());
        [left, right]
    }

    fn child_slot(&self, node: NodeId) -> Child {
        match self.contains(node) {
            true => Child::Present(node),
            false => Child::Absent,
        }
    }
}
