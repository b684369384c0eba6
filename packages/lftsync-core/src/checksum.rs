use std::fmt;

use blake3::Hasher;

use crate::error::{Error, Result};
use crate::ids::Lft;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub const CHECKSUM_WIDTH: usize = 32;
const CHECKSUM_DOMAIN: &[u8] = b"lftsync/children/v0";

/// Fingerprint of an ordered sequence of lft values.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Checksum(pub [u8; CHECKSUM_WIDTH]);

impl Checksum {
    pub fn as_bytes(&self) -> &[u8; CHECKSUM_WIDTH] {
        &self.0
    }

    pub fn from_hex(hex: &str) -> Result<Self> {
        let hash = blake3::Hash::from_hex(hex)
            .map_err(|e| Error::InvalidValue(format!("checksum {hex:?}: {e}")))?;
        Ok(Checksum(*hash.as_bytes()))
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Fingerprint `values` in the order given.
///
/// The length is hashed ahead of the values so sequences that differ only by a trailing
/// element can never collide through concatenation.
pub fn checksum(values: &[Lft]) -> Checksum {
    let mut hasher = Hasher::new();
    hasher.update(CHECKSUM_DOMAIN);
    hasher.update(&(values.len() as u64).to_be_bytes());
    for v in values {
        hasher.update(&v.0.to_be_bytes());
    }
    Checksum(*hasher.finalize().as_bytes())
}
