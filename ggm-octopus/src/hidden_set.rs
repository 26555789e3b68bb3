//! Validated sets of hidden leaves, and the partition of the leaves into the
//! groups of a batched all-but-one vector commitment.

use itertools::Itertools;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::tree::LeafRange;
use crate::tree::TreeShape;

#[derive(Debug, Clone, Eq, PartialEq, Hash, Error)]
#[non_exhaustive]
pub enum HiddenSetError {
    #[error("the set of hidden leaves must not be empty")]
    Empty,

    #[error("leaf {0} is hidden more than once")]
    Duplicate(u64),

    #[error("hidden leaf {leaf_index} out of range for tree with {num_leaves} leaves")]
    OutOfRange { leaf_index: u64, num_leaves: u64 },

    #[error("group {group} contains more than one hidden leaf: {leaf_indices:?}")]
    GroupCollision {
        group: usize,
        leaf_indices: (u64, u64),
    },

    #[error("group {0} contains no hidden leaf")]
    MissingGroup(usize),

    #[error("a group layout needs at least one group")]
    NoGroups,

    #[error("group {0} of the layout is empty")]
    EmptyGroup(usize),

    #[error("layout partitions {layout_leaves} leaves, but the tree has {num_leaves}")]
    LayoutMismatch { layout_leaves: u64, num_leaves: u64 },

    #[error("group {group} out of range for layout with {num_groups} groups")]
    GroupOutOfRange { group: usize, num_groups: usize },

    #[error("position {position} out of range for group {group} of size {group_size}")]
    PositionOutOfRange {
        group: usize,
        position: u64,
        group_size: u64,
    },
}

/// A non-empty set of distinct leaf indices that an opening keeps secret,
/// sorted in ascending order.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct HiddenSet {
    indices: Vec<u64>,
}

impl HiddenSet {
    pub fn new(
        shape: &TreeShape,
        indices: impl IntoIterator<Item = u64>,
    ) -> Result<Self, HiddenSetError> {
        let indices = indices.into_iter().sorted_unstable().collect_vec();
        let Some(&largest) = indices.last() else {
            return Err(HiddenSetError::Empty);
        };
        if largest >= shape.num_leaves() {
            return Err(HiddenSetError::OutOfRange {
                leaf_index: largest,
                num_leaves: shape.num_leaves(),
            });
        }
        if let Some((&duplicate, _)) = indices.iter().tuple_windows().find(|(a, b)| a == b) {
            return Err(HiddenSetError::Duplicate(duplicate));
        }

        Ok(Self { indices })
    }

    /// Like [`HiddenSet::new`], but additionally requires exactly one hidden
    /// leaf per group of the given layout.
    pub fn with_layout(
        shape: &TreeShape,
        layout: &GroupLayout,
        indices: impl IntoIterator<Item = u64>,
    ) -> Result<Self, HiddenSetError> {
        layout.validate_for(shape)?;
        let hidden_set = Self::new(shape, indices)?;
        hidden_set.check_one_per_group(layout)?;

        Ok(hidden_set)
    }

    #[cfg(test)]
    pub(crate) fn new_unchecked(indices: Vec<u64>) -> Self {
        Self { indices }
    }

    pub fn indices(&self) -> &[u64] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn contains(&self, leaf_index: u64) -> bool {
        self.indices.binary_search(&leaf_index).is_ok()
    }

    /// Whether any hidden leaf falls into the given range.
    pub fn intersects(&self, range: LeafRange) -> bool {
        self.first_in(range).is_some()
    }

    /// The smallest hidden leaf inside the given range, if any.
    pub fn first_in(&self, range: LeafRange) -> Option<u64> {
        let position = self.indices.partition_point(|&i| i < range.start());
        self.indices
            .get(position)
            .copied()
            .filter(|&i| i < range.end())
    }

    /// All leaves of a tree with `num_leaves` leaves that are not hidden, in
    /// ascending order.
    pub fn complement(&self, num_leaves: u64) -> impl Iterator<Item = u64> + '_ {
        (0..num_leaves).filter(|&i| !self.contains(i))
    }

    pub(crate) fn check_one_per_group(&self, layout: &GroupLayout) -> Result<(), HiddenSetError> {
        let group_assignment = self
            .indices
            .iter()
            .map(|&leaf_index| (layout.group_of(leaf_index), leaf_index))
            .sorted_unstable()
            .collect_vec();

        let collision = group_assignment
            .iter()
            .tuple_windows()
            .find(|((group, _), (other_group, _))| group == other_group);
        if let Some(((group, leaf_index), (_, other_leaf_index))) = collision {
            return Err(HiddenSetError::GroupCollision {
                group: *group,
                leaf_indices: (*leaf_index, *other_leaf_index),
            });
        }

        // groups are now distinct and sorted, so the first gap is the first
        // group without a hidden leaf
        let first_gap = group_assignment
            .iter()
            .enumerate()
            .find(|&(expected_group, &(group, _))| expected_group != group)
            .map(|(expected_group, _)| expected_group);
        if let Some(group) = first_gap {
            return Err(HiddenSetError::MissingGroup(group));
        }
        if group_assignment.len() < layout.num_groups() {
            return Err(HiddenSetError::MissingGroup(group_assignment.len()));
        }

        Ok(())
    }
}

/// A partition of the leaves `[0, N)` into τ non-empty groups. A batched
/// opening hides exactly one leaf in every group.
///
/// Deserialized layouts are checked just like constructed ones.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(try_from = "GroupLayoutParts")]
pub struct GroupLayout {
    num_leaves: u64,
    kind: GroupLayoutKind,
}

#[derive(Deserialize)]
struct GroupLayoutParts {
    num_leaves: u64,
    kind: GroupLayoutKind,
}

impl TryFrom<GroupLayoutParts> for GroupLayout {
    type Error = HiddenSetError;

    fn try_from(parts: GroupLayoutParts) -> Result<Self, Self::Error> {
        let layout = Self {
            num_leaves: parts.num_leaves,
            kind: parts.kind,
        };
        layout.check_partition()?;

        Ok(layout)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum GroupLayoutKind {
    /// Group `g` consists of the leaves `[ends[g-1], ends[g])`, with
    /// `ends[-1] = 0`.
    Contiguous { ends: Vec<u64> },

    /// Leaf `i` belongs to group `i mod num_groups`.
    Interleaved { num_groups: usize },
}

impl GroupLayout {
    /// Consecutive blocks of leaves with the given sizes, in order. The sizes
    /// must be non-zero and sum up to the number of leaves of the tree.
    pub fn contiguous(
        shape: &TreeShape,
        group_sizes: impl IntoIterator<Item = u64>,
    ) -> Result<Self, HiddenSetError> {
        let mut ends = vec![];
        let mut layout_leaves = 0_u64;
        for (group, size) in group_sizes.into_iter().enumerate() {
            if size == 0 {
                return Err(HiddenSetError::EmptyGroup(group));
            }
            layout_leaves = layout_leaves.saturating_add(size);
            ends.push(layout_leaves);
        }

        let kind = GroupLayoutKind::Contiguous { ends };
        let num_leaves = shape.num_leaves();
        let layout = Self { num_leaves, kind };
        layout.check_partition()?;

        Ok(layout)
    }

    /// Leaf `i` belongs to group `i mod num_groups`. Challenge `j` of a batched
    /// opening then selects some leaf `j + r·num_groups`.
    pub fn interleaved(shape: &TreeShape, num_groups: usize) -> Result<Self, HiddenSetError> {
        let kind = GroupLayoutKind::Interleaved { num_groups };
        let num_leaves = shape.num_leaves();
        let layout = Self { num_leaves, kind };
        layout.check_partition()?;

        Ok(layout)
    }

    #[cfg(test)]
    pub(crate) fn new_unchecked(num_leaves: u64, kind: GroupLayoutKind) -> Self {
        Self { num_leaves, kind }
    }

    pub fn num_leaves(&self) -> u64 {
        self.num_leaves
    }

    pub fn kind(&self) -> &GroupLayoutKind {
        &self.kind
    }

    pub fn num_groups(&self) -> usize {
        match &self.kind {
            GroupLayoutKind::Contiguous { ends } => ends.len(),
            GroupLayoutKind::Interleaved { num_groups } => *num_groups,
        }
    }

    /// The group the leaf belongs to. Leaves outside the layout are attributed
    /// to the last group.
    pub fn group_of(&self, leaf_index: u64) -> usize {
        match &self.kind {
            GroupLayoutKind::Contiguous { ends } => ends
                .partition_point(|&end| end <= leaf_index)
                .min(ends.len() - 1),
            GroupLayoutKind::Interleaved { num_groups } => {
                (leaf_index % *num_groups as u64) as usize
            }
        }
    }

    pub fn group_size(&self, group: usize) -> Result<u64, HiddenSetError> {
        self.check_group(group)?;
        let size = match &self.kind {
            GroupLayoutKind::Contiguous { ends } => {
                let start = group.checked_sub(1).map_or(0, |previous| ends[previous]);
                ends[group] - start
            }
            GroupLayoutKind::Interleaved { num_groups } => {
                (self.num_leaves - group as u64).div_ceil(*num_groups as u64)
            }
        };

        Ok(size)
    }

    /// The index of the leaf at `position` within `group`.
    pub fn leaf_index(&self, group: usize, position: u64) -> Result<u64, HiddenSetError> {
        let group_size = self.group_size(group)?;
        if position >= group_size {
            return Err(HiddenSetError::PositionOutOfRange {
                group,
                position,
                group_size,
            });
        }

        let leaf_index = match &self.kind {
            GroupLayoutKind::Contiguous { ends } => {
                let start = group.checked_sub(1).map_or(0, |previous| ends[previous]);
                start + position
            }
            GroupLayoutKind::Interleaved { num_groups } => {
                group as u64 + position * *num_groups as u64
            }
        };

        Ok(leaf_index)
    }

    /// Ensures the layout partitions exactly the leaves of the given tree.
    pub fn validate_for(&self, shape: &TreeShape) -> Result<(), HiddenSetError> {
        if self.num_leaves != shape.num_leaves() {
            return Err(HiddenSetError::LayoutMismatch {
                layout_leaves: self.num_leaves,
                num_leaves: shape.num_leaves(),
            });
        }

        self.check_partition()
    }

    /// Every group is non-empty and the groups make up exactly `[0, N)`.
    fn check_partition(&self) -> Result<(), HiddenSetError> {
        match &self.kind {
            GroupLayoutKind::Contiguous { ends } => {
                let Some(&layout_leaves) = ends.last() else {
                    return Err(HiddenSetError::NoGroups);
                };
                let starts = std::iter::once(0).chain(ends.iter().copied());
                let empty_group = starts.zip(ends).position(|(start, &end)| end <= start);
                if let Some(group) = empty_group {
                    return Err(HiddenSetError::EmptyGroup(group));
                }
                if layout_leaves != self.num_leaves {
                    return Err(HiddenSetError::LayoutMismatch {
                        layout_leaves,
                        num_leaves: self.num_leaves,
                    });
                }
            }
            GroupLayoutKind::Interleaved { num_groups } => {
                if *num_groups == 0 {
                    return Err(HiddenSetError::NoGroups);
                }
                if *num_groups as u64 > self.num_leaves {
                    let first_empty_group = usize::try_from(self.num_leaves).unwrap_or(usize::MAX);
                    return Err(HiddenSetError::EmptyGroup(first_empty_group));
                }
            }
        }

        Ok(())
    }

    fn check_group(&self, group: usize) -> Result<(), HiddenSetError> {
        let num_groups = self.num_groups();
        if group >= num_groups {
            return Err(HiddenSetError::GroupOutOfRange { group, num_groups });
        }

        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use proptest::collection::vec;
    use proptest::prelude::*;
    use test_strategy::proptest;

    use super::*;

    fn shape(num_leaves: u64) -> TreeShape {
        TreeShape::new(num_leaves).unwrap()
    }

    #[test]
    fn empty_hidden_set_is_rejected() {
        let err = HiddenSet::new(&shape(5), []).unwrap_err();
        assert_eq!(HiddenSetError::Empty, err);
    }

    #[test]
    fn duplicate_hidden_leaf_is_rejected() {
        let err = HiddenSet::new(&shape(5), [3, 1, 3]).unwrap_err();
        assert_eq!(HiddenSetError::Duplicate(3), err);
    }

    #[test]
    fn out_of_range_hidden_leaf_is_rejected() {
        let err = HiddenSet::new(&shape(5), [1, 5]).unwrap_err();
        let expected = HiddenSetError::OutOfRange {
            leaf_index: 5,
            num_leaves: 5,
        };
        assert_eq!(expected, err);
    }

    #[test]
    fn hidden_set_is_sorted() {
        let hidden_set = HiddenSet::new(&shape(16), [5, 3]).unwrap();
        assert_eq!(&[3, 5], hidden_set.indices());
        assert!(hidden_set.contains(3));
        assert!(!hidden_set.contains(4));
        assert!(hidden_set.intersects(LeafRange::new(4, 6)));
        assert!(!hidden_set.intersects(LeafRange::new(6, 16)));
        assert_eq!(Some(3), hidden_set.first_in(LeafRange::new(0, 8)));
    }

    #[test]
    fn contiguous_layout_must_partition_all_leaves() {
        let shape = shape(10);
        assert_eq!(
            HiddenSetError::LayoutMismatch {
                layout_leaves: 9,
                num_leaves: 10
            },
            GroupLayout::contiguous(&shape, [4, 5]).unwrap_err()
        );
        assert_eq!(
            HiddenSetError::EmptyGroup(1),
            GroupLayout::contiguous(&shape, [4, 0, 6]).unwrap_err()
        );
        assert_eq!(
            HiddenSetError::NoGroups,
            GroupLayout::contiguous(&shape, []).unwrap_err()
        );
    }

    #[test]
    fn interleaved_layout_needs_non_empty_groups() {
        let shape = shape(3);
        assert_eq!(
            HiddenSetError::NoGroups,
            GroupLayout::interleaved(&shape, 0).unwrap_err()
        );
        assert_eq!(
            HiddenSetError::EmptyGroup(3),
            GroupLayout::interleaved(&shape, 4).unwrap_err()
        );
    }

    #[test]
    fn contiguous_groups_by_hand() {
        let layout = GroupLayout::contiguous(&shape(10), [4, 1, 5]).unwrap();
        let groups = (0..10).map(|i| layout.group_of(i)).collect_vec();
        assert_eq!(vec![0, 0, 0, 0, 1, 2, 2, 2, 2, 2], groups);
        assert_eq!(5, layout.group_size(2).unwrap());
        assert_eq!(4, layout.leaf_index(1, 0).unwrap());
        assert_eq!(7, layout.leaf_index(2, 2).unwrap());
    }

    #[test]
    fn interleaved_groups_by_hand() {
        let layout = GroupLayout::interleaved(&shape(12), 3).unwrap();
        let groups = (0..12).map(|i| layout.group_of(i)).collect_vec();
        assert_eq!(vec![0, 1, 2, 0, 1, 2, 0, 1, 2, 0, 1, 2], groups);
        assert_eq!(4, layout.group_size(1).unwrap());
        assert_eq!(10, layout.leaf_index(1, 3).unwrap());
        assert_eq!(
            HiddenSetError::PositionOutOfRange {
                group: 1,
                position: 4,
                group_size: 4
            },
            layout.leaf_index(1, 4).unwrap_err()
        );
        assert_eq!(
            HiddenSetError::GroupOutOfRange {
                group: 3,
                num_groups: 3
            },
            layout.leaf_index(3, 0).unwrap_err()
        );
    }

    #[test]
    fn one_hidden_leaf_per_group_is_enforced() {
        let shape = shape(12);
        let layout = GroupLayout::interleaved(&shape, 3).unwrap();

        assert!(HiddenSet::with_layout(&shape, &layout, [0, 4, 11]).is_ok());
        assert_eq!(
            HiddenSetError::GroupCollision {
                group: 0,
                leaf_indices: (0, 3)
            },
            HiddenSet::with_layout(&shape, &layout, [0, 3, 5]).unwrap_err()
        );
        assert_eq!(
            HiddenSetError::MissingGroup(1),
            HiddenSet::with_layout(&shape, &layout, [0, 5]).unwrap_err()
        );
        assert_eq!(
            HiddenSetError::MissingGroup(2),
            HiddenSet::with_layout(&shape, &layout, [0, 4]).unwrap_err()
        );
    }

    #[test]
    fn malformed_layouts_are_caught_by_validation() {
        let shape = shape(12);
        let malformed = [
            (
                GroupLayoutKind::Interleaved { num_groups: 0 },
                HiddenSetError::NoGroups,
            ),
            (
                GroupLayoutKind::Interleaved { num_groups: 13 },
                HiddenSetError::EmptyGroup(12),
            ),
            (
                GroupLayoutKind::Contiguous { ends: vec![] },
                HiddenSetError::NoGroups,
            ),
            (
                GroupLayoutKind::Contiguous {
                    ends: vec![4, 4, 12],
                },
                HiddenSetError::EmptyGroup(1),
            ),
            (
                GroupLayoutKind::Contiguous { ends: vec![8, 5] },
                HiddenSetError::EmptyGroup(1),
            ),
            (
                GroupLayoutKind::Contiguous { ends: vec![4, 10] },
                HiddenSetError::LayoutMismatch {
                    layout_leaves: 10,
                    num_leaves: 12,
                },
            ),
        ];

        for (kind, expected) in malformed {
            let layout = GroupLayout::new_unchecked(12, kind);
            assert_eq!(expected, layout.validate_for(&shape).unwrap_err());
            let err = HiddenSet::with_layout(&shape, &layout, [0]).unwrap_err();
            assert_eq!(expected, err);
        }
    }

    #[test]
    fn deserialized_layouts_are_checked() {
        let json = r#"{"num_leaves":12,"kind":{"Interleaved":{"num_groups":0}}}"#;
        assert!(serde_json::from_str::<GroupLayout>(json).is_err());

        let json = r#"{"num_leaves":12,"kind":{"Contiguous":{"ends":[4,10]}}}"#;
        assert!(serde_json::from_str::<GroupLayout>(json).is_err());

        let layout = GroupLayout::contiguous(&shape(12), [4, 6, 2]).unwrap();
        let json = serde_json::to_string(&layout).unwrap();
        assert_eq!(layout, serde_json::from_str::<GroupLayout>(&json).unwrap());

        let layout = GroupLayout::interleaved(&shape(12), 3).unwrap();
        let json = serde_json::to_string(&layout).unwrap();
        assert_eq!(layout, serde_json::from_str::<GroupLayout>(&json).unwrap());
    }

    #[test]
    fn layout_for_other_tree_is_rejected() {
        let layout = GroupLayout::interleaved(&shape(12), 3).unwrap();
        let err = HiddenSet::with_layout(&shape(13), &layout, [0, 1, 2]).unwrap_err();
        let expected = HiddenSetError::LayoutMismatch {
            layout_leaves: 12,
            num_leaves: 13,
        };
        assert_eq!(expected, err);
    }

    #[proptest]
    fn leaf_index_and_group_of_agree(
        #[strategy(vec(1_u64..20, 1..10))] group_sizes: Vec<u64>,
        #[strategy(any::<bool>())] interleave: bool,
    ) {
        let num_leaves = group_sizes.iter().sum();
        let shape = shape(num_leaves);
        let layout = match interleave {
            true => GroupLayout::interleaved(&shape, group_sizes.len().min(num_leaves as usize))?,
            false => GroupLayout::contiguous(&shape, group_sizes)?,
        };

        let mut seen = vec![];
        for group in 0..layout.num_groups() {
            for position in 0..layout.group_size(group)? {
                let leaf_index = layout.leaf_index(group, position)?;
                prop_assert_eq!(group, layout.group_of(leaf_index));
                seen.push(leaf_index);
            }
        }
        seen.sort_unstable();
        prop_assert_eq!((0..num_leaves).collect_vec(), seen);
    }
}
