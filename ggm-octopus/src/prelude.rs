pub use crate::commitment::Combiner;
pub use crate::commitment::MerkleCombiner;
pub use crate::committer::Committer;
pub use crate::cover::Cover;
pub use crate::cover::compute_batched_cover;
pub use crate::cover::compute_cover;
pub use crate::digest::CommitmentRoot;
pub use crate::digest::Digest;
pub use crate::digest::LeafCommitment;
pub use crate::error::*;
pub use crate::hidden_set::GroupLayout;
pub use crate::hidden_set::GroupLayoutKind;
pub use crate::hidden_set::HiddenSet;
pub use crate::prg::Prg;
pub use crate::prg::Shake256Prg;
pub use crate::proof::CoverEntry;
pub use crate::proof::HiddenCommitment;
pub use crate::proof::NodeValue;
pub use crate::proof::OpeningProof;
pub use crate::proof::build_proof;
pub use crate::seed::Seed;
pub use crate::tree::Child;
pub use crate::tree::LeafRange;
pub use crate::tree::NodeId;
pub use crate::tree::TreeShape;
pub use crate::verifier::Verifier;
