use itertools::Itertools;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::commitment::MerkleCombiner;
use crate::committer::Committer;
use crate::digest::Digest;
use crate::prg::Shake256Prg;
use crate::proof::OpeningProof;
use crate::seed::Seed;

/// Map arbitrary numbers to distinct leaf indices of a tree with `num_leaves`
/// leaves, keeping the first occurrence of every index.
pub(crate) fn hidden_indices(num_leaves: u64, raw_hidden: &[u64]) -> Vec<u64> {
    raw_hidden
        .iter()
        .map(|raw| raw % num_leaves)
        .unique()
        .sorted()
        .collect()
}

pub(crate) fn corrupt_digest(digest: Digest) -> Digest {
    let mut bytes = *digest.as_bytes();
    bytes[0] ^= 1;
    Digest::new(bytes)
}

/// Commit to a tree with a pseudorandom root seed and open it, hiding the
/// leaves given by [`hidden_indices`].
pub(crate) fn random_opening(num_leaves: u64, raw_hidden: &[u64]) -> (Committer, OpeningProof) {
    let mut rng = StdRng::seed_from_u64(num_leaves);
    let root_seed: Seed = rng.random();
    let committer =
        Committer::commit(Shake256Prg::default(), MerkleCombiner, num_leaves, root_seed).unwrap();
    let proof = committer
        .open(hidden_indices(num_leaves, raw_hidden))
        .unwrap();

    (committer, proof)
}
