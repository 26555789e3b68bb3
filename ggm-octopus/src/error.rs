use thiserror::Error;

pub use crate::codec::ProofCodecError;
pub use crate::commitment::CommitmentError;
pub use crate::hidden_set::HiddenSetError;
pub use crate::tree::TreeError;
use crate::tree::NodeId;

#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum TryFromBytesError {
    #[error("expected {expected} bytes, but got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid hex encoding")]
    Hex(#[from] hex::FromHexError),
}

/// Failure to produce an opening proof. No partial proof is ever returned.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum OpeningError {
    #[error("invalid hidden set")]
    InvalidHiddenSet(#[from] HiddenSetError),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Commitment(#[from] CommitmentError),

    #[error("cover is for {cover_leaves} leaves, but the tree has {num_leaves}")]
    ShapeMismatch { cover_leaves: u64, num_leaves: u64 },

    #[error("cover node {0} is synthetic, out of order, or above a hidden leaf")]
    InvalidCover(NodeId),
}

/// Rejection of an opening proof.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum VerificationError {
    #[error("malformed proof")]
    MalformedProof(#[from] MalformedProofError),

    #[error("proof reveals information that must stay hidden")]
    LeakageDetected(#[from] Leakage),

    #[error("recomputed commitment does not match the commitment root")]
    CommitmentMismatch,

    #[error(transparent)]
    Commitment(#[from] CommitmentError),
}

/// The structural inconsistency that makes a proof unusable.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum MalformedProofError {
    #[error("proof is for {actual} leaves, but the tree has {expected}")]
    LeafCountMismatch { expected: u64, actual: u64 },

    #[error("open leaf {leaf_index} out of range for tree with {num_leaves} leaves")]
    OpenIndexOutOfRange { leaf_index: u64, num_leaves: u64 },

    #[error("leaf {0} is opened more than once")]
    DuplicateOpenIndex(u64),

    #[error("an opening must hide at least one leaf")]
    NothingHidden,

    #[error("invalid group layout")]
    InvalidLayout(#[source] HiddenSetError),

    #[error("group {group} hides more than one leaf: {leaf_indices:?}")]
    GroupCollision {
        group: usize,
        leaf_indices: (u64, u64),
    },

    #[error("node {0} is outside the tree's domain")]
    NodeOutOfDomain(NodeId),

    #[error("node {0} is synthetic and can never be revealed")]
    SyntheticNode(NodeId),

    #[error("node {0} carries the wrong kind of payload")]
    WrongPayloadKind(NodeId),

    #[error("node {next} does not come strictly after node {previous}")]
    UnorderedEntries { previous: NodeId, next: NodeId },

    #[error("proof lacks the commitment of hidden leaf {0}")]
    MissingHiddenCommitment(u64),

    #[error("proof carries a hidden commitment for leaf {0}, which is open")]
    UnexpectedHiddenCommitment(u64),

    #[error("open leaf {0} is not covered by the proof")]
    UncoveredLeaf(u64),
}

/// The way a proof exposes material that must stay secret.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Error)]
#[non_exhaustive]
pub enum Leakage {
    #[error("node {node} reveals hidden leaf {leaf_index}")]
    RevealedHiddenLeaf { node: NodeId, leaf_index: u64 },

    #[error("every leaf of group {0} is opened")]
    GroupFullyOpened(usize),
}
