//! Binding all leaf commitments of a GGM tree to a single digest.

use rayon::prelude::*;
use sha3::Digest as Sha3Digest;
use sha3::Sha3_256;
use thiserror::Error;

use crate::config;
use crate::digest::CommitmentRoot;
use crate::digest::Digest;
use crate::digest::LeafCommitment;
use crate::tree::TreeShape;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Error)]
#[non_exhaustive]
pub enum CommitmentError {
    #[error("expected {expected} leaf commitments, but got {actual}")]
    IncorrectNumberOfLeaves { expected: u64, actual: u64 },
}

/// Combines the commitments of all leaves into one [`CommitmentRoot`].
///
/// A verifier learns the commitments of all leaves from an opening proof:
/// the revealed ones by expansion, the hidden ones directly from the proof.
/// The combination must be binding, _i.e._, it must be infeasible to find two
/// different lists of leaf commitments with the same root.
pub trait Combiner: Send + Sync {
    fn combine(
        &self,
        shape: &TreeShape,
        leaf_commitments: &[LeafCommitment],
    ) -> Result<CommitmentRoot, CommitmentError>;
}

/// Computes a SHA3-256 Merkle tree per peak of the tree's forest, bags the
/// peaks' roots from right to left, and binds the result to the number of
/// leaves.
///
/// ```markdown
///          root = H(3 ‖ N ‖ bag)
///                        |
///               bag = H(2 ‖ p0 ‖ p1)
///                 /              \
///       p0 = H(1 ‖ ·  ‖ ·)        p1 = H(0 ‖ c4)
///          /         \
///   H(1 ‖ · ‖ ·)  H(1 ‖ · ‖ ·)
///     /     \       /     \
/// H(0‖c0) H(0‖c1) H(0‖c2) H(0‖c3)
/// ```
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct MerkleCombiner;

impl MerkleCombiner {
    const LEAF_TAG: u8 = 0;
    const NODE_TAG: u8 = 1;
    const BAG_TAG: u8 = 2;
    const ROOT_TAG: u8 = 3;

    fn hasher(tag: u8) -> Sha3_256 {
        let mut hasher = Sha3_256::new();
        hasher.update([tag]);
        hasher
    }

    fn finalize(hasher: Sha3_256) -> Digest {
        Digest::new(hasher.finalize().into())
    }

    fn hash_leaf(commitment: &LeafCommitment) -> Digest {
        let mut hasher = Self::hasher(Self::LEAF_TAG);
        hasher.update(commitment.as_bytes());
        Self::finalize(hasher)
    }

    fn hash_pair(left: &Digest, right: &Digest) -> Digest {
        let mut hasher = Self::hasher(Self::NODE_TAG);
        hasher.update(left.as_bytes());
        hasher.update(right.as_bytes());
        Self::finalize(hasher)
    }

    fn hash_bag(peak: &Digest, acc: &Digest) -> Digest {
        let mut hasher = Self::hasher(Self::BAG_TAG);
        hasher.update(peak.as_bytes());
        hasher.update(acc.as_bytes());
        Self::finalize(hasher)
    }

    fn hash_root(num_leaves: u64, bag: &Digest) -> Digest {
        let mut hasher = Self::hasher(Self::ROOT_TAG);
        hasher.update(num_leaves.to_le_bytes());
        hasher.update(bag.as_bytes());
        Self::finalize(hasher)
    }

    /// The Merkle root of a perfect binary tree. The number of leaves must be
    /// a power of two.
    fn peak_root(leaf_commitments: &[LeafCommitment]) -> Digest {
        debug_assert!(leaf_commitments.len().is_power_of_two());
        let cutoff = config::expansion_parallelization_cutoff();

        let mut layer: Vec<Digest> = if leaf_commitments.len() >= cutoff {
            leaf_commitments.par_iter().map(Self::hash_leaf).collect()
        } else {
            leaf_commitments.iter().map(Self::hash_leaf).collect()
        };
        while layer.len() > 1 {
            let hash_pair = |pair: &[Digest]| Self::hash_pair(&pair[0], &pair[1]);
            layer = if layer.len() / 2 >= cutoff {
                layer.par_chunks_exact(2).map(hash_pair).collect()
            } else {
                layer.chunks_exact(2).map(hash_pair).collect()
            };
        }

        layer[0]
    }

    /// Bag the peaks from right to left. A single peak is its own bag.
    fn bag_peaks(peaks: &[Digest]) -> Digest {
        let num_peaks = peaks.len();
        if num_peaks == 1 {
            return peaks[0];
        }

        let mut acc = Self::hash_bag(&peaks[num_peaks - 2], &peaks[num_peaks - 1]);
        for i in 2..num_peaks {
            acc = Self::hash_bag(&peaks[num_peaks - 1 - i], &acc);
        }
        acc
    }
}

impl Combiner for MerkleCombiner {
    fn combine(
        &self,
        shape: &TreeShape,
        leaf_commitments: &[LeafCommitment],
    ) -> Result<CommitmentRoot, CommitmentError> {
        let actual = leaf_commitments.len() as u64;
        if actual != shape.num_leaves() {
            return Err(CommitmentError::IncorrectNumberOfLeaves {
                expected: shape.num_leaves(),
                actual,
            });
        }

        let peaks = shape
            .peaks()
            .into_iter()
            .map(|peak| shape.range(peak))
            .map(|range| &leaf_commitments[range.start() as usize..range.end() as usize])
            .map(Self::peak_root)
            .collect::<Vec<_>>();
        let bag = Self::bag_peaks(&peaks);

        Ok(Self::hash_root(shape.num_leaves(), &bag))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use proptest::collection::vec;
    use proptest::prelude::*;
    use proptest_arbitrary_interop::arb;
    use test_strategy::proptest;

    use super::*;
    use crate::test_shared::corrupt_digest;

    #[test]
    fn wrong_number_of_leaves_is_rejected() {
        let shape = TreeShape::new(5).unwrap();
        let err = MerkleCombiner
            .combine(&shape, &[Digest::ALL_ZERO; 4])
            .unwrap_err();
        let expected = CommitmentError::IncorrectNumberOfLeaves {
            expected: 5,
            actual: 4,
        };
        assert_eq!(expected, err);
    }

    #[test]
    fn five_leaves_by_hand() {
        let leaves = (0..5_u8).map(|i| Digest::new([i; 32])).collect::<Vec<_>>();
        let h = MerkleCombiner::hash_leaf;
        let p = MerkleCombiner::hash_pair;

        let p0 = p(&p(&h(&leaves[0]), &h(&leaves[1])), &p(&h(&leaves[2]), &h(&leaves[3])));
        let p1 = h(&leaves[4]);
        let bag = MerkleCombiner::hash_bag(&p0, &p1);
        let expected = MerkleCombiner::hash_root(5, &bag);

        let shape = TreeShape::new(5).unwrap();
        assert_eq!(expected, MerkleCombiner.combine(&shape, &leaves).unwrap());
    }

    #[test]
    fn bagging_three_peaks_folds_from_the_right() {
        let peaks = [1, 2, 3].map(|i| Digest::new([i; 32]));
        let inner = MerkleCombiner::hash_bag(&peaks[1], &peaks[2]);
        let expected = MerkleCombiner::hash_bag(&peaks[0], &inner);
        assert_eq!(expected, MerkleCombiner::bag_peaks(&peaks));
    }

    #[test]
    fn root_binds_the_number_of_leaves() {
        let leaf = Digest::new([7; 32]);
        let one = MerkleCombiner.combine(&TreeShape::new(1).unwrap(), &[leaf]);
        let two = MerkleCombiner.combine(&TreeShape::new(2).unwrap(), &[leaf, leaf]);
        assert_ne!(one.unwrap(), two.unwrap());
    }

    #[proptest(cases = 50)]
    fn changing_any_leaf_changes_the_root(
        #[strategy(vec(arb(), 1..100))] leaves: Vec<Digest>,
        #[strategy(0..#leaves.len())] corrupt_index: usize,
    ) {
        let shape = TreeShape::new(leaves.len() as u64)?;
        let root = MerkleCombiner.combine(&shape, &leaves)?;

        let mut corrupt_leaves = leaves;
        corrupt_leaves[corrupt_index] = corrupt_digest(corrupt_leaves[corrupt_index]);
        let corrupt_root = MerkleCombiner.combine(&shape, &corrupt_leaves)?;
        prop_assert_ne!(root, corrupt_root);
    }

    #[proptest(cases = 20)]
    fn parallel_and_sequential_combination_agree(
        #[strategy(vec(arb(), 1..300))] leaves: Vec<Digest>,
    ) {
        let shape = TreeShape::new(leaves.len() as u64)?;

        config::set_expansion_parallelization_cutoff(usize::MAX);
        let sequential = MerkleCombiner.combine(&shape, &leaves)?;
        config::set_expansion_parallelization_cutoff(2);
        let parallel = MerkleCombiner.combine(&shape, &leaves)?;
        prop_assert_eq!(sequential, parallel);
    }
}
