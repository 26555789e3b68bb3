use core::fmt;

use arbitrary::Arbitrary;
use get_size2::GetSize;
use rand::Rng;
use rand::distr::Distribution;
use rand::distr::StandardUniform;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use zeroize::Zeroize;
use zeroize::ZeroizeOnDrop;

use crate::error::TryFromBytesError;

/// The pseudorandom value bound to one node of a GGM tree.
///
/// Seeds are wiped from memory when dropped and never show up in `Debug`
/// output, because most seeds a committer handles must stay secret. Seeds that
/// are part of an [opening proof](crate::proof::OpeningProof) are public; use
/// [`Seed::to_hex`] to display them.
#[derive(Clone, PartialEq, Eq, Hash, GetSize, Arbitrary, Zeroize, ZeroizeOnDrop)]
pub struct Seed([u8; Seed::BYTES]);

impl Seed {
    /// The number of bytes in a seed.
    pub const BYTES: usize = 16;

    pub const fn new(bytes: [u8; Self::BYTES]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; Self::BYTES] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Decode hex string to [`Seed`]. Must not include leading “0x”.
    pub fn try_from_hex(data: impl AsRef<[u8]>) -> Result<Self, TryFromBytesError> {
        let mut bytes = hex::decode(data)?;
        let seed = Self::try_from(&bytes as &[u8]);
        bytes.zeroize();
        seed
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Seed(<redacted>)")
    }
}

impl Distribution<Seed> for StandardUniform {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Seed {
        Seed(rng.random())
    }
}

impl TryFrom<&[u8]> for Seed {
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

impl Serialize for Seed {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            self.to_hex().serialize(serializer)
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Seed {
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
