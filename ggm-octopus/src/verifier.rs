use itertools::EitherOrBoth;
use itertools::Itertools;
use rayon::prelude::*;

use crate::commitment::Combiner;
use crate::commitment::MerkleCombiner;
use crate::config;
use crate::digest::CommitmentRoot;
use crate::digest::LeafCommitment;
use crate::error::HiddenSetError;
use crate::error::Leakage;
use crate::error::MalformedProofError;
use crate::error::TreeError;
use crate::error::VerificationError;
use crate::ggm;
use crate::hidden_set::GroupLayout;
use crate::hidden_set::HiddenSet;
use crate::prg::Prg;
use crate::prg::Shake256Prg;
use crate::proof::CoverEntry;
use crate::proof::NodeValue;
use crate::proof::OpeningProof;
use crate::tree::LeafRange;
use crate::tree::NodeId;
use crate::tree::TreeShape;

type Result<T> = std::result::Result<T, VerificationError>;

/// The verifying party of a GGM-tree vector commitment.
///
/// A verifier knows the commitment root and which leaves are supposed to be
/// open. Every other leaf is expected to be hidden. An opening proof is only
/// accepted if it reveals exactly the open leaves, reveals nothing about the
/// hidden ones except for their commitments, and is consistent with the
/// commitment root.
#[derive(Debug, Clone)]
pub struct Verifier<P = Shake256Prg, C = MerkleCombiner> {
    prg: P,
    combiner: C,
    shape: TreeShape,
}

impl<P: Prg, C: Combiner> Verifier<P, C> {
    pub fn new(prg: P, combiner: C, num_leaves: u64) -> std::result::Result<Self, TreeError> {
        let shape = TreeShape::new(num_leaves)?;
        Ok(Self {
            prg,
            combiner,
            shape,
        })
    }

    pub fn shape(&self) -> &TreeShape {
        &self.shape
    }

    /// Verify that the proof opens exactly the given leaves of the tree
    /// committed to by `root`. The order of the open indices is irrelevant.
    ///
    /// Checks, in order, that
    /// 1. the proof is for a tree of the right size and the open indices are
    ///    valid,
    /// 1. all revealed nodes are non-synthetic nodes of the tree, carry the
    ///    right kind of value, and are in order without overlap,
    /// 1. no revealed node contains a leaf that must stay hidden,
    /// 1. the proof carries the commitments of exactly the hidden leaves,
    /// 1. the revealed nodes cover every open leaf, and
    /// 1. the recomputed leaf commitments combine to `root`.
    pub fn verify(
        &self,
        root: &CommitmentRoot,
        open_indices: &[u64],
        proof: &OpeningProof,
    ) -> Result<()> {
        let hidden_set = self.expected_hidden_set(open_indices, proof)?;
        self.verify_against_hidden_set(root, &hidden_set, proof)
    }

    /// Like [`verify`](Self::verify), but additionally requires the leaves
    /// that are not open to be exactly one leaf per group of the layout.
    pub fn verify_batched(
        &self,
        root: &CommitmentRoot,
        open_indices: &[u64],
        layout: &GroupLayout,
        proof: &OpeningProof,
    ) -> Result<()> {
        layout
            .validate_for(&self.shape)
            .map_err(MalformedProofError::InvalidLayout)?;
        let hidden_set = self.expected_hidden_set(open_indices, proof)?;
        match hidden_set.check_one_per_group(layout) {
            Ok(()) => (),
            Err(HiddenSetError::MissingGroup(group)) => {
                return Err(Leakage::GroupFullyOpened(group).into());
            }
            Err(HiddenSetError::GroupCollision {
                group,
                leaf_indices,
            }) => {
                let err = MalformedProofError::GroupCollision {
                    group,
                    leaf_indices,
                };
                return Err(err.into());
            }
            Err(err) => return Err(MalformedProofError::InvalidLayout(err).into()),
        }

        self.verify_against_hidden_set(root, &hidden_set, proof)
    }

    /// Recover the commitments of all open leaves from the proof, in ascending
    /// order of the open indices. Performs all structural and leakage checks
    /// of [`verify`](Self::verify), but does not compare against any root.
    pub fn reconstruct(
        &self,
        open_indices: &[u64],
        proof: &OpeningProof,
    ) -> Result<Vec<LeafCommitment>> {
        let hidden_set = self.expected_hidden_set(open_indices, proof)?;
        let leaf_commitments = self.recompute_leaf_commitments(&hidden_set, proof)?;
        let open_commitments = leaf_commitments
            .into_iter()
            .enumerate()
            .filter(|&(i, _)| !hidden_set.contains(i as u64))
            .map(|(_, commitment)| commitment)
            .collect();

        Ok(open_commitments)
    }

    fn verify_against_hidden_set(
        &self,
        root: &CommitmentRoot,
        hidden_set: &HiddenSet,
        proof: &OpeningProof,
    ) -> Result<()> {
        let leaf_commitments = self.recompute_leaf_commitments(hidden_set, proof)?;
        let recomputed_root = self.combiner.combine(&self.shape, &leaf_commitments)?;
        if recomputed_root != *root {
            log::debug!("opening proof does not match commitment root");
            return Err(VerificationError::CommitmentMismatch);
        }

        Ok(())
    }

    /// The leaves that are not open, after checking the proof's leaf count and
    /// the open indices.
    fn expected_hidden_set(&self, open_indices: &[u64], proof: &OpeningProof) -> Result<HiddenSet> {
        let num_leaves = self.shape.num_leaves();
        if proof.num_leaves() != num_leaves {
            let err = MalformedProofError::LeafCountMismatch {
                expected: num_leaves,
                actual: proof.num_leaves(),
            };
            return Err(err.into());
        }

        let open_indices = open_indices.iter().copied().sorted_unstable().collect_vec();
        if let Some(&leaf_index) = open_indices.last().filter(|&&i| i >= num_leaves) {
            let err = MalformedProofError::OpenIndexOutOfRange {
                leaf_index,
                num_leaves,
            };
            return Err(err.into());
        }
        if let Some((&leaf_index, _)) = open_indices.iter().tuple_windows().find(|(a, b)| a == b) {
            return Err(MalformedProofError::DuplicateOpenIndex(leaf_index).into());
        }
        if open_indices.len() as u64 == num_leaves {
            return Err(MalformedProofError::NothingHidden.into());
        }

        let hidden_indices = (0..num_leaves)
            .merge_join_by(open_indices, |leaf, open| leaf.cmp(open))
            .filter_map(|either| match either {
                EitherOrBoth::Left(hidden) => Some(hidden),
                _ => None,
            });
        let hidden_set = HiddenSet::new(&self.shape, hidden_indices)
            .map_err(|_| MalformedProofError::NothingHidden)?;

        Ok(hidden_set)
    }

    /// All leaf commitments: the open ones recomputed from the proof, the
    /// hidden ones taken from it.
    fn recompute_leaf_commitments(
        &self,
        hidden_set: &HiddenSet,
        proof: &OpeningProof,
    ) -> Result<Vec<LeafCommitment>> {
        let ranges = self.check_entries(proof)?;
        self.check_leakage(hidden_set, proof, &ranges)?;
        self.check_hidden_commitments(hidden_set, proof)?;
        self.check_coverage(hidden_set, &ranges)?;

        log::debug!(
            "verifying opening of {} leaves from {} revealed nodes",
            self.shape.num_leaves(),
            proof.entries().len(),
        );

        let mut leaf_commitments = vec![LeafCommitment::default(); self.shape.num_leaves() as usize];
        for hidden in proof.hidden_commitments() {
            leaf_commitments[hidden.leaf_index() as usize] = hidden.commitment();
        }

        let expand_entry = |(entry, range): (&CoverEntry, &LeafRange)| {
            let commitments = match entry.value() {
                NodeValue::Seed(seed) => {
                    ggm::subtree_commitments(&self.prg, &self.shape, entry.node(), seed.clone())
                }
                NodeValue::Commitment(commitment) => vec![*commitment],
            };
            (range.start(), commitments)
        };
        let entries_and_ranges = proof.entries().iter().zip_eq(&ranges);
        let subtrees: Vec<_> = if ranges.len() >= config::expansion_parallelization_cutoff() {
            entries_and_ranges
                .collect_vec()
                .into_par_iter()
                .map(expand_entry)
                .collect()
        } else {
            entries_and_ranges.map(expand_entry).collect()
        };

        for (start, commitments) in subtrees {
            let start = start as usize;
            leaf_commitments[start..start + commitments.len()].copy_from_slice(&commitments);
        }

        Ok(leaf_commitments)
    }

    /// Every revealed node is a non-synthetic node of the tree with the right
    /// kind of value, and the revealed nodes are sorted with disjoint ranges.
    /// Returns the leaf ranges of the revealed nodes.
    fn check_entries(&self, proof: &OpeningProof) -> Result<Vec<LeafRange>> {
        let mut ranges: Vec<LeafRange> = Vec::with_capacity(proof.entries().len());
        let mut previous: Option<NodeId> = None;
        for entry in proof.entries() {
            let node = entry.node();
            let Ok(range) = self.shape.range_of(node) else {
                return Err(MalformedProofError::NodeOutOfDomain(node).into());
            };
            if self.shape.is_synthetic_unchecked(node) {
                return Err(MalformedProofError::SyntheticNode(node).into());
            }
            if self.shape.is_leaf_unchecked(node) == entry.value().is_seed() {
                return Err(MalformedProofError::WrongPayloadKind(node).into());
            }
            if let (Some(previous), Some(previous_range)) = (previous, ranges.last()) {
                if previous_range.end() > range.start() {
                    let err = MalformedProofError::UnorderedEntries {
                        previous,
                        next: node,
                    };
                    return Err(err.into());
                }
            }

            ranges.push(range);
            previous = Some(node);
        }

        Ok(ranges)
    }

    fn check_leakage(
        &self,
        hidden_set: &HiddenSet,
        proof: &OpeningProof,
        ranges: &[LeafRange],
    ) -> Result<()> {
        for (entry, &range) in proof.entries().iter().zip_eq(ranges) {
            if let Some(leaf_index) = hidden_set.first_in(range) {
                let node = entry.node();
                log::warn!("opening proof node {node} reveals hidden leaf {leaf_index}");
                return Err(Leakage::RevealedHiddenLeaf { node, leaf_index }.into());
            }
        }

        Ok(())
    }

    fn check_hidden_commitments(&self, hidden_set: &HiddenSet, proof: &OpeningProof) -> Result<()> {
        let in_proof = proof.hidden_commitments().iter().map(|h| h.leaf_index());
        let expected = hidden_set.indices().iter().copied();
        for either in in_proof.zip_longest(expected) {
            let err = match either {
                EitherOrBoth::Both(actual, expected) if actual == expected => continue,
                EitherOrBoth::Both(actual, expected) if actual > expected => {
                    MalformedProofError::MissingHiddenCommitment(expected)
                }
                EitherOrBoth::Both(actual, _) | EitherOrBoth::Left(actual) => {
                    MalformedProofError::UnexpectedHiddenCommitment(actual)
                }
                EitherOrBoth::Right(expected) => {
                    MalformedProofError::MissingHiddenCommitment(expected)
                }
            };
            return Err(err.into());
        }

        Ok(())
    }

    /// The gaps between revealed nodes consist of hidden leaves only.
    fn check_coverage(&self, hidden_set: &HiddenSet, ranges: &[LeafRange]) -> Result<()> {
        let end_of_tree = LeafRange::new(self.shape.num_leaves(), self.shape.num_leaves());
        let mut next_uncovered = 0;
        for range in ranges.iter().chain([&end_of_tree]) {
            for leaf_index in next_uncovered..range.start() {
                if !hidden_set.contains(leaf_index) {
                    return Err(MalformedProofError::UncoveredLeaf(leaf_index).into());
                }
            }
            next_uncovered = range.end();
        }

        Ok(())
    }
}
