//! The binary wire format of [opening proofs](OpeningProof).
//!
//! All integers are little endian.
//!
//! ```markdown
//! u64 num_leaves
//! u32 num_entries
//!     num_entries × ( u32 depth | u64 index | u8 tag | payload )
//! u32 num_hidden
//!     num_hidden × ( u64 leaf_index | 32-byte commitment )
//! ```
//!
//! Tag 0 marks a 16-byte seed, tag 1 a 32-byte leaf commitment.

use thiserror::Error;

use crate::digest::Digest;
use crate::proof::CoverEntry;
use crate::proof::HiddenCommitment;
use crate::proof::NodeValue;
use crate::proof::OpeningProof;
use crate::seed::Seed;
use crate::tree::NodeId;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Error)]
#[non_exhaustive]
pub enum ProofCodecError {
    #[error("empty sequence")]
    EmptySequence,

    #[error("sequence too short")]
    SequenceTooShort,

    #[error("sequence too long: {0} trailing bytes")]
    SequenceTooLong(usize),

    #[error("invalid payload tag {0}")]
    InvalidPayloadTag(u8),

    #[error("length indicator {0} exceeds the remaining input")]
    InvalidLengthIndicator(u32),
}

const SEED_TAG: u8 = 0;
const COMMITMENT_TAG: u8 = 1;

const ENTRY_HEADER_LEN: usize = 4 + 8 + 1;
const HIDDEN_COMMITMENT_LEN: usize = 8 + Digest::BYTES;

impl OpeningProof {
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.encoded_len());
        bytes.extend_from_slice(&self.num_leaves().to_le_bytes());

        bytes.extend_from_slice(&(self.entries().len() as u32).to_le_bytes());
        for entry in self.entries() {
            bytes.extend_from_slice(&entry.node().depth().to_le_bytes());
            bytes.extend_from_slice(&entry.node().index().to_le_bytes());
            match entry.value() {
                NodeValue::Seed(seed) => {
                    bytes.push(SEED_TAG);
                    bytes.extend_from_slice(seed.as_bytes());
                }
                NodeValue::Commitment(commitment) => {
                    bytes.push(COMMITMENT_TAG);
                    bytes.extend_from_slice(commitment.as_bytes());
                }
            }
        }

        bytes.extend_from_slice(&(self.hidden_commitments().len() as u32).to_le_bytes());
        for hidden in self.hidden_commitments() {
            bytes.extend_from_slice(&hidden.leaf_index().to_le_bytes());
            bytes.extend_from_slice(hidden.commitment().as_bytes());
        }

        bytes
    }

    /// The number of bytes of the proof's [encoding](Self::encode).
    pub fn encoded_len(&self) -> usize {
        let entries_len = self
            .entries()
            .iter()
            .map(|entry| match entry.value() {
                NodeValue::Seed(_) => ENTRY_HEADER_LEN + Seed::BYTES,
                NodeValue::Commitment(_) => ENTRY_HEADER_LEN + Digest::BYTES,
            })
            .sum::<usize>();
        let hidden_len = self.hidden_commitments().len() * HIDDEN_COMMITMENT_LEN;

        8 + 4 + entries_len + 4 + hidden_len
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProofCodecError> {
        if bytes.is_empty() {
            return Err(ProofCodecError::EmptySequence);
        }

        let mut reader = Reader { bytes };
        let num_leaves = reader.read_u64()?;

        let num_entries = reader.read_length(ENTRY_HEADER_LEN + Seed::BYTES)?;
        let mut entries = Vec::with_capacity(num_entries);
        for _ in 0..num_entries {
            let depth = reader.read_u32()?;
            let index = reader.read_u64()?;
            let value = match reader.read_u8()? {
                SEED_TAG => NodeValue::Seed(Seed::new(reader.read_array()?)),
                COMMITMENT_TAG => NodeValue::Commitment(Digest::new(reader.read_array()?)),
                tag => return Err(ProofCodecError::InvalidPayloadTag(tag)),
            };
            entries.push(CoverEntry::new(NodeId::new(depth, index), value));
        }

        let num_hidden = reader.read_length(HIDDEN_COMMITMENT_LEN)?;
        let mut hidden_commitments = Vec::with_capacity(num_hidden);
        for _ in 0..num_hidden {
            let leaf_index = reader.read_u64()?;
            let commitment = Digest::new(reader.read_array()?);
            hidden_commitments.push(HiddenCommitment::new(leaf_index, commitment));
        }

        if !reader.bytes.is_empty() {
            return Err(ProofCodecError::SequenceTooLong(reader.bytes.len()));
        }

        Ok(Self::new(num_leaves, entries, hidden_commitments))
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
}

impl Reader<'_> {
    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ProofCodecError> {
        let Some((head, tail)) = self.bytes.split_first_chunk::<N>() else {
            return Err(ProofCodecError::SequenceTooShort);
        };
        self.bytes = tail;
        Ok(*head)
    }

    fn read_u8(&mut self) -> Result<u8, ProofCodecError> {
        self.read_array().map(u8::from_le_bytes)
    }

    fn read_u32(&mut self) -> Result<u32, ProofCodecError> {
        self.read_array().map(u32::from_le_bytes)
    }

    fn read_u64(&mut self) -> Result<u64, ProofCodecError> {
        self.read_array().map(u64::from_le_bytes)
    }

    /// Read a count of items that take up at least `min_item_len` bytes each.
    /// Counts that cannot possibly fit into the remaining input are rejected
    /// before anything is allocated.
    fn read_length(&mut self, min_item_len: usize) -> Result<usize, ProofCodecError> {
        let length = self.read_u32()?;
        let Ok(num_items) = usize::try_from(length) else {
            return Err(ProofCodecError::InvalidLengthIndicator(length));
        };
        if num_items.saturating_mul(min_item_len) > self.bytes.len() {
            return Err(ProofCodecError::InvalidLengthIndicator(length));
        }

        Ok(num_items)
    }
}
