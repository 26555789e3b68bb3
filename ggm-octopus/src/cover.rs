//! The Octopus cover: the smallest set of subtrees whose leaves are exactly
//! the leaves an opening reveals.

use itertools::Itertools;

use crate::error::OpeningError;
use crate::hidden_set::GroupLayout;
use crate::hidden_set::HiddenSet;
use crate::tree::Child;
use crate::tree::LeafRange;
use crate::tree::NodeId;
use crate::tree::TreeShape;

/// The roots of the subtrees revealed by an opening, in ascending order of
/// their leaf ranges.
///
/// Every node of a cover is a forest node whose leaf range contains no hidden
/// leaf. The ranges are pairwise disjoint, and together with the hidden leaves
/// they make up all leaves of the tree. No two nodes of a cover can be merged
/// into their common parent, because that parent is either synthetic or the
/// ancestor of a hidden leaf.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Cover {
    shape: TreeShape,
    nodes: Vec<NodeId>,
    hidden_set: HiddenSet,
}

/// Compute the cover for hiding the given leaves.
pub fn compute_cover(
    shape: &TreeShape,
    hidden_indices: impl IntoIterator<Item = u64>,
) -> Result<Cover, OpeningError> {
    let hidden_set = HiddenSet::new(shape, hidden_indices)?;
    Ok(Cover::new(*shape, hidden_set))
}

/// Compute the cover for a batched opening, which hides exactly one leaf per
/// group of the layout.
pub fn compute_batched_cover(
    shape: &TreeShape,
    layout: &GroupLayout,
    hidden_indices: impl IntoIterator<Item = u64>,
) -> Result<Cover, OpeningError> {
    let hidden_set = HiddenSet::with_layout(shape, layout, hidden_indices)?;
    Ok(Cover::new(*shape, hidden_set))
}

impl Cover {
    /// Splits nodes top-down, starting from the peaks. The super-root joining
    /// the peaks is synthetic, so it is always split. A node without hidden
    /// leaves is revealed, a hidden leaf is dropped, everything else is split
    /// into its present children.
    pub fn new(shape: TreeShape, hidden_set: HiddenSet) -> Self {
        let mut nodes = vec![];
        let mut worklist = shape.peaks();
        worklist.reverse();

        while let Some(node) = worklist.pop() {
            let range = shape.range(node);
            if !hidden_set.intersects(range) {
                nodes.push(node);
                continue;
            }
            if shape.is_leaf_unchecked(node) {
                continue;
            }

            // right child first so the left child is processed next
            let [left, right] = shape.children(node);
            for child in [right, left] {
                if let Child::Present(child) = child {
                    worklist.push(child);
                }
            }
        }

        log::debug!(
            "cover for {} hidden of {} leaves has {} nodes",
            hidden_set.len(),
            shape.num_leaves(),
            nodes.len(),
        );

        Self {
            shape,
            nodes,
            hidden_set,
        }
    }

    #[cfg(test)]
    pub(crate) fn from_parts_unchecked(
        shape: TreeShape,
        nodes: Vec<NodeId>,
        hidden_set: HiddenSet,
    ) -> Self {
        Self {
            shape,
            nodes,
            hidden_set,
        }
    }

    pub fn shape(&self) -> &TreeShape {
        &self.shape
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn hidden_set(&self) -> &HiddenSet {
        &self.hidden_set
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The leaf ranges of the cover's nodes, in order.
    pub fn ranges(&self) -> impl Iterator<Item = LeafRange> + '_ {
        self.nodes.iter().map(|&node| self.shape.range(node))
    }

    /// The revealed leaves, _i.e._, all leaves that are not hidden, in
    /// ascending order.
    pub fn revealed_leaves(&self) -> Vec<u64> {
        self.ranges().flat_map(LeafRange::indices).collect_vec()
    }
}
