//! The pseudorandom generator driving GGM-tree expansion, and the derivation
//! of leaf commitments from leaf seeds.

use sha3::Shake256;
use sha3::digest::ExtendableOutput;
use sha3::digest::Update;
use zeroize::Zeroize;

use crate::digest::Digest;
use crate::digest::LeafCommitment;
use crate::seed::Seed;
use crate::tree::NodeId;

/// A length-doubling pseudorandom generator, domain-separated by the position
/// of the expanded node, together with the commitment function for leaves.
///
/// Both functions must be deterministic. Committer and verifier must agree on
/// the instance, including any salt it is keyed with.
pub trait Prg: Send + Sync {
    /// Expand the seed of `node` into the seeds of its left and right child.
    fn expand(&self, seed: &Seed, node: NodeId) -> (Seed, Seed);

    /// Commit to the seed of the leaf with index `leaf_index`.
    fn commit(&self, seed: &Seed, leaf_index: u64) -> LeafCommitment;
}

/// A [`Prg`] built from SHAKE-256.
///
/// Every invocation absorbs a domain tag, the per-instance salt, the position
/// in the tree, and the seed. The salt separates different trees committed
/// with the same root seed.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct Shake256Prg {
    salt: [u8; Self::SALT_BYTES],
}

impl Shake256Prg {
    pub const SALT_BYTES: usize = 32;

    const EXPAND_TAG: &'static [u8] = b"ggm-octopus/expand";
    const COMMIT_TAG: &'static [u8] = b"ggm-octopus/commit";

    pub const fn new(salt: [u8; Self::SALT_BYTES]) -> Self {
        Self { salt }
    }

    pub const fn salt(&self) -> [u8; Self::SALT_BYTES] {
        self.salt
    }

    fn hasher(&self, tag: &[u8]) -> Shake256 {
        let mut hasher = Shake256::default();
        hasher.update(tag);
        hasher.update(&self.salt);
        hasher
    }
}

impl Prg for Shake256Prg {
    fn expand(&self, seed: &Seed, node: NodeId) -> (Seed, Seed) {
        let mut hasher = self.hasher(Self::EXPAND_TAG);
        hasher.update(&node.depth().to_le_bytes());
        hasher.update(&node.index().to_le_bytes());
        hasher.update(seed.as_bytes());

        let mut stream = [0u8; 2 * Seed::BYTES];
        hasher.finalize_xof_into(&mut stream);

        let mut left = [0u8; Seed::BYTES];
        let mut right = [0u8; Seed::BYTES];
        left.copy_from_slice(&stream[..Seed::BYTES]);
        right.copy_from_slice(&stream[Seed::BYTES..]);
        let children = (Seed::new(left), Seed::new(right));

        stream.zeroize();
        left.zeroize();
        right.zeroize();
        children
    }

    fn commit(&self, seed: &Seed, leaf_index: u64) -> LeafCommitment {
        let mut hasher = self.hasher(Self::COMMIT_TAG);
        hasher.update(&leaf_index.to_le_bytes());
        hasher.update(seed.as_bytes());

        let mut commitment = [0u8; Digest::BYTES];
        hasher.finalize_xof_into(&mut commitment);
        Digest::new(commitment)
    }
}
