use core::fmt;
use std::str::FromStr;

use arbitrary::Arbitrary;
use get_size2::GetSize;
use rand::Rng;
use rand::distr::Distribution;
use rand::distr::StandardUniform;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;

use crate::error::TryFromBytesError;

/// The output of a collision-resistant hash function. Used for leaf
/// commitments as well as for the commitment root binding all of them.
// note: Serialize and Deserialize have custom implementations below
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, GetSize, Arbitrary)]
pub struct Digest(pub [u8; Digest::BYTES]);

/// The value bound to a single leaf, derived from the leaf's seed.
pub type LeafCommitment = Digest;

/// The digest binding all leaf commitments of one GGM tree.
pub type CommitmentRoot = Digest;

impl Digest {
    /// The number of bytes in a digest.
    pub const BYTES: usize = 32;

    pub const ALL_ZERO: Self = Self([0; Self::BYTES]);

    pub const fn new(bytes: [u8; Self::BYTES]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; Self::BYTES] {
        &self.0
    }

    /// Encode digest as hex.
    ///
    /// Since `Digest` also implements [`LowerHex`][lo], it is possible to
    /// `{:x}`-format directly, _e.g._, `print!("{digest:x}")`.
    ///
    /// [lo]: fmt::LowerHex
    pub fn to_hex(self) -> String {
        format!("{self:x}")
    }

    /// Decode hex string to [`Digest`]. Must not include leading “0x”.
    pub fn try_from_hex(data: impl AsRef<[u8]>) -> Result<Self, TryFromBytesError> {
        let slice = hex::decode(data)?;
        Self::try_from(&slice as &[u8])
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({self:x})")
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:x}")
    }
}

impl fmt::LowerHex for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for Digest {
    type Err = TryFromBytesError;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        Self::try_from_hex(string)
    }
}

impl Distribution<Digest> for StandardUniform {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Digest {
        Digest(rng.random())
    }
}

impl From<Digest> for [u8; Digest::BYTES] {
    fn from(digest: Digest) -> Self {
        digest.0
    }
}

impl From<[u8; Digest::BYTES]> for Digest {
    fn from(bytes: [u8; Digest::BYTES]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for Digest {
    type Error = TryFromBytesError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let bytes = <[u8; Self::BYTES]>::try_from(slice).map_err(|_| {
            TryFromBytesError::InvalidLength {
                expected: Self::BYTES,
                actual: slice.len(),
            }
        })?;
        Ok(Self(bytes))
    }
}

// we implement Serialize so that we can serialize as hex for human readable
// formats like JSON but use default serializer for other formats likes bincode
impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            self.to_hex().serialize(serializer)
        } else {
            self.0.serialize(serializer)
        }
    }
}

// we impl Deserialize so that we can deserialize as hex for human readable
// formats like JSON but use default deserializer for other formats like bincode
impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let hex_string = String::deserialize(deserializer)?;
            Self::try_from_hex(hex_string).map_err(serde::de::Error::custom)
        } else {
            Ok(Self::new(<[u8; Self::BYTES]>::deserialize(deserializer)?))
        }
    }
}
