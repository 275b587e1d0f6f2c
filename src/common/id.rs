//! Kademlia node Id or a lookup key
use std::{
    cmp::Ordering,
    fmt::{self, Debug, Display, Formatter},
    str::FromStr,
};

use bytes::Bytes;
use rand::Rng;

use crate::{Error, Result};

/// The size of randomly generated node IDs in bytes.
pub const ID_SIZE: usize = 20;

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// Kademlia node Id or a lookup key.
///
/// All the ids of one overlay share the same length, but that length isn't
/// fixed by this crate, so every operation comparing two ids checks it.
pub struct Id(Bytes);

impl Id {
    /// Generate a random [ID_SIZE] bytes Id.
    pub fn random() -> Id {
        let mut rng = rand::thread_rng();
        let random_bytes: [u8; ID_SIZE] = rng.gen();

        Id(Bytes::copy_from_slice(&random_bytes))
    }

    /// Create a new Id from some bytes. Returns Err if `bytes` is empty.
    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Id> {
        let bytes = bytes.as_ref();
        if bytes.is_empty() {
            return Err(Error::InvalidIdSize(0));
        }

        Ok(Id(Bytes::copy_from_slice(bytes)))
    }

    /// Derive a content addressed [ID_SIZE] bytes key from a value.
    pub fn from_value(value: &[u8]) -> Id {
        let mut hasher = sha1_smol::Sha1::new();
        hasher.update(value);

        Id(Bytes::copy_from_slice(&hasher.digest().bytes()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// Length of this Id in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// XOR distance between this Id and another Id or key.
    pub fn distance(&self, other: &Id) -> Result<Distance> {
        self.check_len(other)?;

        let xored = self
            .0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| a ^ b)
            .collect::<Vec<_>>();

        Ok(Distance(xored.into_boxed_slice()))
    }

    /// Number of leading bits this Id shares with `other`.
    ///
    /// Equal ids share all `8 * len` bits.
    pub fn common_prefix_len(&self, other: &Id) -> Result<usize> {
        self.check_len(other)?;

        for (i, (a, b)) in self.0.iter().zip(other.0.iter()).enumerate() {
            if a != b {
                // equal bytes so far + leading zeros of the first differing byte
                return Ok(i * 8 + (a ^ b).leading_zeros() as usize);
            }
        }

        Ok(self.0.len() * 8)
    }

    fn check_len(&self, other: &Id) -> Result<()> {
        if self.0.len() != other.0.len() {
            return Err(Error::LengthMismatch {
                expected: self.0.len(),
                actual: other.0.len(),
            });
        }

        Ok(())
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter() {
            write!(f, "{byte:02x}")?;
        }

        Ok(())
    }
}

impl Debug for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Id({self})")
    }
}

impl FromStr for Id {
    type Err = Error;

    fn from_str(s: &str) -> Result<Id> {
        if s.len() % 2 != 0 {
            return Err(Error::InvalidIdEncoding(s.to_string()));
        }

        let bytes = (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(s.get(i..i + 2).unwrap_or_default(), 16))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| Error::InvalidIdEncoding(s.to_string()))?;

        Id::from_bytes(bytes)
    }
}

impl From<[u8; ID_SIZE]> for Id {
    fn from(bytes: [u8; ID_SIZE]) -> Id {
        Id(Bytes::copy_from_slice(&bytes))
    }
}

impl AsRef<[u8]> for Id {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// XOR of two equal length ids, read as a big-endian unsigned integer.
#[derive(Clone)]
pub struct Distance(Box<[u8]>);

impl Distance {
    /// Returns `true` if the two ids this distance was computed from are equal.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn significant(&self) -> &[u8] {
        let start = self
            .0
            .iter()
            .position(|b| *b != 0)
            .unwrap_or(self.0.len());

        &self.0[start..]
    }
}

impl Ord for Distance {
    fn cmp(&self, other: &Self) -> Ordering {
        let a = self.significant();
        let b = other.significant();

        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    }
}

impl PartialEq for Distance {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Distance {}

impl PartialOrd for Distance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Debug for Distance {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Distance(")?;
        for byte in self.0.iter() {
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}
