use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use sha2::Digest as _;
use thiserror::Error;

const BYTES_LEN: usize = 32;

/// Content hash identifying a blob; primary key of the content-addressed
/// store. Equality is byte-exact.
#[derive(
    Eq,
    Copy,
    Hash,
    Clone,
    PartialEq,
    Ord,
    PartialOrd,
    Serialize,
    Deserialize,
    BorshSerialize,
    BorshDeserialize,
)]
pub struct Digest([u8; BYTES_LEN]);

impl Digest {
    #[must_use]
    pub fn hash(data: &[u8]) -> Self {
        Self(sha2::Sha256::digest(data).into())
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; BYTES_LEN] {
        &self.0
    }

    /// The bucket this digest is filed under, selected by its first byte.
    #[must_use]
    pub const fn bucket(&self) -> Bucket {
        Bucket(self.0[0])
    }
}

impl From<[u8; BYTES_LEN]> for Digest {
    fn from(bytes: [u8; BYTES_LEN]) -> Self {
        Self(bytes)
    }
}

impl From<Digest> for [u8; BYTES_LEN] {
    fn from(digest: Digest) -> Self {
        digest.0
    }
}

impl Deref for Digest {
    type Target = [u8; BYTES_LEN];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&hex::encode(self.0))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({self})")
    }
}

#[derive(Debug, Error)]
pub enum InvalidDigest {
    #[error("digest must be {expected} hex characters, got {got}")]
    Length { expected: usize, got: usize },
    #[error(transparent)]
    Hex(#[from] hex::FromHexError),
}

impl FromStr for Digest {
    type Err = InvalidDigest;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != BYTES_LEN * 2 {
            return Err(InvalidDigest::Length {
                expected: BYTES_LEN * 2,
                got: s.len(),
            });
        }

        let mut bytes = [0; BYTES_LEN];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

/// Partition of the digest space by leading byte. Buckets are processed
/// independently, bounding per-bucket digest set sizes.
#[derive(
    Eq,
    Copy,
    Hash,
    Clone,
    Debug,
    PartialEq,
    Ord,
    PartialOrd,
    Serialize,
    Deserialize,
    BorshSerialize,
    BorshDeserialize,
)]
pub struct Bucket(pub u8);

impl Bucket {
    pub const COUNT: usize = 256;

    /// All buckets in the fixed order the orchestrator walks them.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..=u8::MAX).map(Self)
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}", self.0)
    }
}
