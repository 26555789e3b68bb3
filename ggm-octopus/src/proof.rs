//! Opening proofs, and their assembly from a root seed and a cover.

use get_size2::GetSize;
use itertools::Itertools;
use serde::Deserialize;
use serde::Serialize;

use crate::commitment::CommitmentError;
use crate::cover::Cover;
use crate::digest::LeafCommitment;
use crate::error::OpeningError;
use crate::hidden_set::HiddenSetError;
use crate::prg::Prg;
use crate::seed::Seed;
use crate::tree::Child;
use crate::tree::LeafRange;
use crate::tree::NodeId;
use crate::tree::TreeShape;

/// The value revealed for one node of the cover.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, GetSize)]
pub enum NodeValue {
    /// The seed of an internal node, from which all leaves below can be
    /// derived.
    Seed(Seed),

    /// The commitment of a leaf. Revealing a leaf's seed would not help the
    /// verifier, who only needs the commitment.
    Commitment(LeafCommitment),
}

#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, GetSize)]
pub struct CoverEntry {
    node: NodeId,
    value: NodeValue,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, GetSize)]
pub struct HiddenCommitment {
    leaf_index: u64,
    commitment: LeafCommitment,
}

/// Everything a verifier needs to recompute all leaf commitments of a GGM tree
/// except for the hidden ones, which it receives directly.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, GetSize)]
pub struct OpeningProof {
    num_leaves: u64,
    entries: Vec<CoverEntry>,
    hidden_commitments: Vec<HiddenCommitment>,
}

impl NodeValue {
    pub fn is_seed(&self) -> bool {
        matches!(self, Self::Seed(_))
    }
}

impl CoverEntry {
    pub fn new(node: NodeId, value: NodeValue) -> Self {
        Self { node, value }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn value(&self) -> &NodeValue {
        &self.value
    }
}

impl HiddenCommitment {
    pub fn new(leaf_index: u64, commitment: LeafCommitment) -> Self {
        Self {
            leaf_index,
            commitment,
        }
    }

    pub fn leaf_index(&self) -> u64 {
        self.leaf_index
    }

    pub fn commitment(&self) -> LeafCommitment {
        self.commitment
    }
}

impl OpeningProof {
    /// Assemble a proof from its parts. No validation happens here; that is
    /// the [verifier's](crate::verifier::Verifier) job.
    pub fn new(
        num_leaves: u64,
        entries: Vec<CoverEntry>,
        hidden_commitments: Vec<HiddenCommitment>,
    ) -> Self {
        Self {
            num_leaves,
            entries,
            hidden_commitments,
        }
    }

    pub fn num_leaves(&self) -> u64 {
        self.num_leaves
    }

    /// The revealed nodes with their values, in ascending order of their leaf
    /// ranges.
    pub fn entries(&self) -> &[CoverEntry] {
        &self.entries
    }

    /// The commitments of the hidden leaves, in ascending order of the leaf
    /// indices.
    pub fn hidden_commitments(&self) -> &[HiddenCommitment] {
        &self.hidden_commitments
    }

    pub fn num_seeds(&self) -> usize {
        self.entries.iter().filter(|e| e.value.is_seed()).count()
    }

    /// The number of leaf commitments in the proof, revealed and hidden.
    pub fn num_commitments(&self) -> usize {
        self.entries.len() - self.num_seeds() + self.hidden_commitments.len()
    }

    pub fn into_parts(self) -> (u64, Vec<CoverEntry>, Vec<HiddenCommitment>) {
        (self.num_leaves, self.entries, self.hidden_commitments)
    }

    #[cfg(test)]
    pub(crate) fn entries_mut(&mut self) -> &mut Vec<CoverEntry> {
        &mut self.entries
    }

    #[cfg(test)]
    pub(crate) fn hidden_commitments_mut(&mut self) -> &mut Vec<HiddenCommitment> {
        &mut self.hidden_commitments
    }
}

impl CoverEntry {
    #[cfg(test)]
    pub(crate) fn value_mut(&mut self) -> &mut NodeValue {
        &mut self.value
    }
}

/// Assemble the opening proof for the given cover.
///
/// Seeds are derived top-down from the root seed, expanding only the strict
/// ancestors of the cover's nodes. This includes synthetic nodes,
/// which only the committer ever expands. Seeds of siblings off those paths,
/// including the seeds of hidden leaves, are dropped as soon as they are
/// derived. Leaves of the cover are revealed through their commitment.
pub fn build_proof<P: Prg + ?Sized>(
    prg: &P,
    shape: &TreeShape,
    root_seed: &Seed,
    cover: &Cover,
    leaf_commitments: &[LeafCommitment],
) -> Result<OpeningProof, OpeningError> {
    if cover.shape() != shape {
        return Err(OpeningError::ShapeMismatch {
            cover_leaves: cover.shape().num_leaves(),
            num_leaves: shape.num_leaves(),
        });
    }
    let num_commitments = leaf_commitments.len() as u64;
    if num_commitments != shape.num_leaves() {
        let err = CommitmentError::IncorrectNumberOfLeaves {
            expected: shape.num_leaves(),
            actual: num_commitments,
        };
        return Err(err.into());
    }
    check_cover(shape, cover)?;

    let entries = reveal_cover(prg, shape, root_seed, cover, leaf_commitments);

    let hidden_commitments = cover
        .hidden_set()
        .indices()
        .iter()
        .map(|&i| HiddenCommitment::new(i, leaf_commitments[i as usize]))
        .collect_vec();

    let proof = OpeningProof::new(shape.num_leaves(), entries, hidden_commitments);
    log::debug!(
        "assembled opening proof for {} leaves: {} seeds, {} commitments",
        shape.num_leaves(),
        proof.num_seeds(),
        proof.num_commitments(),
    );

    Ok(proof)
}

/// Only real, pairwise disjoint subtrees free of hidden leaves may be
/// revealed, and every hidden leaf must have a commitment to disclose.
fn check_cover(shape: &TreeShape, cover: &Cover) -> Result<(), OpeningError> {
    let hidden_set = cover.hidden_set();
    let out_of_range = hidden_set.indices().last().filter(|&&i| i >= shape.num_leaves());
    if let Some(&leaf_index) = out_of_range {
        let err = HiddenSetError::OutOfRange {
            leaf_index,
            num_leaves: shape.num_leaves(),
        };
        return Err(err.into());
    }

    let mut revealed_until = 0;
    for &node in cover.nodes() {
        if !shape.contains(node) || shape.is_synthetic_unchecked(node) {
            return Err(OpeningError::InvalidCover(node));
        }
        let range = shape.range(node);
        if range.start() < revealed_until || hidden_set.intersects(range) {
            return Err(OpeningError::InvalidCover(node));
        }
        revealed_until = range.end();
    }

    Ok(())
}

/// Walk from the root to every node of the cover, depth first and left to
/// right, so that the cover's nodes are reached in order. Only subtrees that
/// contain a node of the cover are entered.
fn reveal_cover<P: Prg + ?Sized>(
    prg: &P,
    shape: &TreeShape,
    root_seed: &Seed,
    cover: &Cover,
    leaf_commitments: &[LeafCommitment],
) -> Vec<CoverEntry> {
    let mut entries = Vec::with_capacity(cover.len());
    if cover.is_empty() {
        return entries;
    }

    let cover_starts = cover.ranges().map(LeafRange::start).collect_vec();
    let contains_cover_node = |range: LeafRange| {
        let position = cover_starts.partition_point(|&start| start < range.start());
        cover_starts
            .get(position)
            .is_some_and(|&start| start < range.end())
    };

    let mut worklist = vec![(shape.root_node(), root_seed.clone())];
    let mut next_cover_node = cover.nodes().iter().peekable();
    while let Some((node, seed)) = worklist.pop() {
        if next_cover_node.next_if_eq(&&node).is_some() {
            let value = match shape.is_leaf_unchecked(node) {
                true => NodeValue::Commitment(leaf_commitments[node.index() as usize]),
                false => NodeValue::Seed(seed),
            };
            entries.push(CoverEntry::new(node, value));
            continue;
        }

        let (left_seed, right_seed) = prg.expand(&seed, node);
        let [left, right] = shape.children(node);
        for (child, child_seed) in [(right, right_seed), (left, left_seed)] {
            if let Child::Present(child) = child {
                if contains_cover_node(shape.range(child)) {
                    worklist.push((child, child_seed));
                }
            }
        }
    }

    entries
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use proptest::collection::vec;
    use proptest::prelude::*;
    use proptest_arbitrary_interop::arb;
    use test_strategy::proptest;

    use super::*;
    use crate::cover::compute_cover;
    use crate::ggm::commit_leaves;
    use crate::ggm::expand_subtree;
    use crate::hidden_set::HiddenSet;
    use crate::prg::Shake256Prg;
    use crate::test_shared::hidden_indices;

    struct Setup {
        prg: Shake256Prg,
        shape: TreeShape,
        root_seed: Seed,
        leaf_seeds: Vec<Seed>,
        leaf_commitments: Vec<LeafCommitment>,
    }

    impl Setup {
        fn new(num_leaves: u64, root_seed: Seed) -> Self {
            let prg = Shake256Prg::default();
            let shape = TreeShape::new(num_leaves).unwrap();
            let leaf_seeds = expand_subtree(&prg, &shape, shape.root_node(), root_seed.clone());
            let leaf_commitments = commit_leaves(&prg, 0, &leaf_seeds);
            Self {
                prg,
                shape,
                root_seed,
                leaf_seeds,
                leaf_commitments,
            }
        }

        fn proof(&self, hidden: &[u64]) -> OpeningProof {
            let cover = compute_cover(&self.shape, hidden.iter().copied()).unwrap();
            build_proof(
                &self.prg,
                &self.shape,
                &self.root_seed,
                &cover,
                &self.leaf_commitments,
            )
            .unwrap()
        }
    }

    #[test]
    fn five_leaves_hiding_leaf_three() {
        let setup = Setup::new(5, Seed::new([5; Seed::BYTES]));
        let proof = setup.proof(&[3]);

        let nodes = proof.entries().iter().map(|e| e.node()).collect_vec();
        let expected = vec![NodeId::new(2, 0), NodeId::new(3, 2), NodeId::new(3, 4)];
        assert_eq!(expected, nodes);

        assert_eq!(1, proof.num_seeds());
        let NodeValue::Seed(seed) = proof.entries()[0].value() else {
            panic!("internal node must carry a seed");
        };
        let leaves = expand_subtree(&setup.prg, &setup.shape, NodeId::new(2, 0), seed.clone());
        assert_eq!(&setup.leaf_seeds[0..2], leaves.as_slice());

        let leaf_two = NodeValue::Commitment(setup.leaf_commitments[2]);
        assert_eq!(&leaf_two, proof.entries()[1].value());

        let hidden = HiddenCommitment::new(3, setup.leaf_commitments[3]);
        assert_eq!(&[hidden], proof.hidden_commitments());
    }

    #[test]
    fn hiding_all_leaves_reveals_no_seed() {
        let setup = Setup::new(6, Seed::new([6; Seed::BYTES]));
        let proof = setup.proof(&(0..6).collect_vec());
        assert!(proof.entries().is_empty());
        assert_eq!(0, proof.num_seeds());
        assert_eq!(6, proof.num_commitments());
    }

    #[test]
    fn wrong_number_of_leaf_commitments_is_rejected() {
        let setup = Setup::new(5, Seed::new([5; Seed::BYTES]));
        let cover = compute_cover(&setup.shape, [3]).unwrap();
        let err = build_proof(
            &setup.prg,
            &setup.shape,
            &setup.root_seed,
            &cover,
            &setup.leaf_commitments[..4],
        )
        .unwrap_err();
        assert!(matches!(err, OpeningError::Commitment(_)));
    }

    #[test]
    fn cover_for_other_tree_is_rejected() {
        let setup = Setup::new(5, Seed::new([5; Seed::BYTES]));
        let other_shape = TreeShape::new(6).unwrap();
        let cover = compute_cover(&other_shape, [3]).unwrap();
        let err = build_proof(
            &setup.prg,
            &setup.shape,
            &setup.root_seed,
            &cover,
            &setup.leaf_commitments,
        )
        .unwrap_err();
        let expected = OpeningError::ShapeMismatch {
            cover_leaves: 6,
            num_leaves: 5,
        };
        assert_eq!(expected, err);
    }

    impl Setup {
        fn build_unchecked(&self, nodes: Vec<NodeId>, hidden: Vec<u64>) -> OpeningError {
            let hidden_set = HiddenSet::new_unchecked(hidden);
            let cover = Cover::from_parts_unchecked(self.shape, nodes, hidden_set);
            build_proof(
                &self.prg,
                &self.shape,
                &self.root_seed,
                &cover,
                &self.leaf_commitments,
            )
            .unwrap_err()
        }
    }

    #[test]
    fn forged_cover_cannot_reveal_the_root_seed() {
        let setup = Setup::new(8, Seed::new([8; Seed::BYTES]));
        let root = setup.shape.root_node();
        let err = setup.build_unchecked(vec![root], vec![3]);
        assert_eq!(OpeningError::InvalidCover(root), err);
    }

    #[test]
    fn forged_cover_cannot_reveal_an_ancestor_of_a_hidden_leaf() {
        let setup = Setup::new(5, Seed::new([5; Seed::BYTES]));
        let ancestor = NodeId::new(2, 1);
        let nodes = vec![NodeId::new(2, 0), ancestor, NodeId::new(3, 4)];
        let err = setup.build_unchecked(nodes, vec![3]);
        assert_eq!(OpeningError::InvalidCover(ancestor), err);
    }

    #[test]
    fn forged_cover_cannot_reveal_synthetic_or_absent_nodes() {
        let setup = Setup::new(5, Seed::new([5; Seed::BYTES]));

        // Node (1, 1) would span leaves 4..8, but only leaf 4 exists.
        let synthetic = NodeId::new(1, 1);
        let nodes = vec![NodeId::new(2, 0), NodeId::new(3, 2), synthetic];
        let err = setup.build_unchecked(nodes, vec![3]);
        assert_eq!(OpeningError::InvalidCover(synthetic), err);

        let absent = NodeId::new(3, 7);
        let nodes = vec![NodeId::new(2, 0), NodeId::new(3, 2), absent];
        let err = setup.build_unchecked(nodes, vec![3]);
        assert_eq!(OpeningError::InvalidCover(absent), err);
    }

    #[test]
    fn forged_cover_with_overlapping_nodes_is_rejected() {
        let setup = Setup::new(5, Seed::new([5; Seed::BYTES]));
        let overlapping = NodeId::new(3, 1);
        let nodes = vec![NodeId::new(2, 0), overlapping, NodeId::new(3, 4)];
        let err = setup.build_unchecked(nodes, vec![3]);
        assert_eq!(OpeningError::InvalidCover(overlapping), err);
    }

    #[test]
    fn hidden_leaf_beyond_the_tree_is_an_error_not_a_panic() {
        let setup = Setup::new(5, Seed::new([5; Seed::BYTES]));
        let err = setup.build_unchecked(vec![NodeId::new(2, 0)], vec![3, 9]);
        let expected = HiddenSetError::OutOfRange {
            leaf_index: 9,
            num_leaves: 5,
        };
        assert_eq!(OpeningError::InvalidHiddenSet(expected), err);
    }

    #[proptest(cases = 40)]
    fn revealed_seeds_expand_to_the_right_leaves(
        #[strategy(1_u64..200)] num_leaves: u64,
        #[strategy(vec(any::<u64>(), 1..6))] raw_hidden: Vec<u64>,
        #[strategy(arb())] root_seed: Seed,
    ) {
        let setup = Setup::new(num_leaves, root_seed);
        let hidden = hidden_indices(num_leaves, &raw_hidden);
        let proof = setup.proof(&hidden);

        for entry in proof.entries() {
            let range = setup.shape.range_of(entry.node())?;
            let expected_seeds = &setup.leaf_seeds[range.start() as usize..range.end() as usize];
            match entry.value() {
                NodeValue::Seed(seed) => {
                    let leaves = expand_subtree(&setup.prg, &setup.shape, entry.node(), seed.clone());
                    prop_assert_eq!(expected_seeds, leaves.as_slice());
                }
                NodeValue::Commitment(commitment) => {
                    prop_assert_eq!(1, range.len());
                    prop_assert_eq!(setup.leaf_commitments[range.start() as usize], *commitment);
                }
            }
        }
    }

    #[proptest(cases = 40)]
    fn proof_never_contains_hidden_seeds(
        #[strategy(1_u64..200)] num_leaves: u64,
        #[strategy(vec(any::<u64>(), 1..6))] raw_hidden: Vec<u64>,
        #[strategy(arb())] root_seed: Seed,
    ) {
        let setup = Setup::new(num_leaves, root_seed);
        let hidden = hidden_indices(num_leaves, &raw_hidden);
        let proof = setup.proof(&hidden);

        let hidden_seeds = hidden.iter().map(|&i| &setup.leaf_seeds[i as usize]).collect_vec();
        for entry in proof.entries() {
            if let NodeValue::Seed(seed) = entry.value() {
                prop_assert!(!hidden_seeds.contains(&seed));
                prop_assert_ne!(&setup.root_seed, seed);
            }
        }

        let hidden_in_proof = proof.hidden_commitments().iter().map(|h| h.leaf_index()).collect_vec();
        prop_assert_eq!(hidden, hidden_in_proof);
    }

    #[test]
    fn proof_size_is_measurable() {
        let setup = Setup::new(16, Seed::new([16; Seed::BYTES]));
        let proof = setup.proof(&[3, 5]);
        assert!(proof.get_heap_size() > 0);
        assert_eq!(5, proof.entries().len());
    }
}
