//! Probabilistic shards.

use crate::base::algo::HashAlgo;
use crate::base::interval::Interval;
use crate::crypto::{self, HashError};
use crate::section::signature::Signature;
use core::fmt;

//------------ ModeOfOperation -----------------------------------------------

/// How a Bloom filter derives its hash functions from its hash family.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ModeOfOperation {
    /// Every hash function is an independent keyed application of the
    /// family.
    Standard,

    /// Kirsch-Mitzenmacher double hashing with both base hashes taken
    /// from the two halves of the first family member's output.
    KirschMitzenmacher1,

    /// Kirsch-Mitzenmacher double hashing with the base hashes taken from
    /// the first two family members.
    KirschMitzenmacher2,
}

impl ModeOfOperation {
    /// Returns the zone-file token of the mode.
    pub fn token(self) -> &'static str {
        match self {
            ModeOfOperation::Standard => ":standard:",
            ModeOfOperation::KirschMitzenmacher1 => ":km1:",
            ModeOfOperation::KirschMitzenmacher2 => ":km2:",
        }
    }

    /// Returns the mode for a zone-file token.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            ":standard:" => Some(ModeOfOperation::Standard),
            ":km1:" => Some(ModeOfOperation::KirschMitzenmacher1),
            ":km2:" => Some(ModeOfOperation::KirschMitzenmacher2),
            _ => None,
        }
    }
}

impl fmt::Display for ModeOfOperation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.token())
    }
}

//------------ BitArray ------------------------------------------------------

/// A fixed-size array of bits.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BitArray(Vec<u8>);

impl BitArray {
    /// Creates an all-zero array of `bytes` bytes.
    pub fn zeroed(bytes: usize) -> Self {
        BitArray(vec![0; bytes])
    }

    /// Creates an array from raw bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        BitArray(bytes)
    }

    /// Returns the raw bytes of the array.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the number of bits in the array.
    pub fn bits(&self) -> usize {
        self.0.len() * 8
    }

    /// Returns the bit at `pos`.
    pub fn get(&self, pos: usize) -> bool {
        self.0[pos / 8] & (0x80 >> (pos % 8)) != 0
    }

    /// Sets the bit at `pos`.
    pub fn set(&mut self, pos: usize) {
        self.0[pos / 8] |= 0x80 >> (pos % 8);
    }
}

//------------ BloomFilter ---------------------------------------------------

/// A Bloom filter proving probabilistic non-existence.
///
/// Membership queries may produce false positives but never false
/// negatives: a name whose bits are not all set is certainly not in the
/// set the filter was built from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BloomFilter {
    /// The hash algorithms the filter's hash functions are built from.
    pub hash_family: Vec<HashAlgo>,

    /// The number of hash functions.
    pub nof_hash_functions: u32,

    /// How the hash functions derive from the family.
    pub mode_of_operation: ModeOfOperation,

    /// The filter bits.
    pub filter: BitArray,
}

impl BloomFilter {
    /// Adds an item to the filter.
    pub fn add(&mut self, item: &str) -> Result<(), HashError> {
        for pos in self.positions(item)? {
            self.filter.set(pos);
        }
        Ok(())
    }

    /// Returns whether the filter contains `item`.
    ///
    /// A `true` answer may be a false positive.
    pub fn contains(&self, item: &str) -> Result<bool, HashError> {
        Ok(self.positions(item)?.iter().all(|&pos| self.filter.get(pos)))
    }

    /// Computes the bit positions for an item.
    fn positions(&self, item: &str) -> Result<Vec<usize>, HashError> {
        let m = self.filter.bits() as u64;
        if m == 0 {
            return Err(HashError::EmptyFilter);
        }
        let k = self.nof_hash_functions;
        let mut res = Vec::with_capacity(k as usize);
        match self.mode_of_operation {
            ModeOfOperation::Standard => {
                if self.hash_family.is_empty() {
                    return Err(HashError::EmptyFamily);
                }
                for i in 0..k {
                    let algo = self.hash_family[i as usize % self.hash_family.len()];
                    let hash = crypto::hash_keyed(algo, item.as_bytes(), i)?;
                    res.push((hash % m) as usize);
                }
            }
            ModeOfOperation::KirschMitzenmacher1 => {
                let algo = *self.hash_family.first().ok_or(HashError::EmptyFamily)?;
                let (h1, h2) = crypto::hash_split(algo, item.as_bytes())?;
                for i in 0..k {
                    res.push((h1.wrapping_add(u64::from(i).wrapping_mul(h2)) % m) as usize);
                }
            }
            ModeOfOperation::KirschMitzenmacher2 => {
                if self.hash_family.len() < 2 {
                    return Err(HashError::EmptyFamily);
                }
                let h1 = crypto::hash_keyed(self.hash_family[0], item.as_bytes(), 0)?;
                let h2 = crypto::hash_keyed(self.hash_family[1], item.as_bytes(), 0)?;
                for i in 0..k {
                    res.push((h1.wrapping_add(u64::from(i).wrapping_mul(h2)) % m) as usize);
                }
            }
        }
        Ok(res)
    }
}

//------------ Pshard --------------------------------------------------------

/// A probabilistic shard.
///
/// Like a [shard][crate::section::Shard], a pshard makes a statement
/// about a lexicographic range of names, but its proof of non-existence
/// is a Bloom filter over the names that *do* exist instead of an
/// explicit assertion list.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Pshard {
    /// The zone the pshard belongs to.
    pub subject_zone: String,

    /// The context of the pshard.
    pub context: String,

    /// The exclusive lower bound of the covered range, `<` for open.
    pub range_from: String,

    /// The exclusive upper bound of the covered range, `>` for open.
    pub range_to: String,

    /// The filter over the names existing inside the range.
    pub datastructure: BloomFilter,

    /// The signatures attached to the pshard.
    pub signatures: Vec<Signature>,
}

impl Pshard {
    /// Adds the fully qualified name of an assertion to the filter.
    pub fn add_assertion_name(&mut self, subject_name: &str) -> Result<(), HashError> {
        let item = Self::filter_item(subject_name, &self.subject_zone, &self.context);
        self.datastructure.add(&item)
    }

    /// Returns whether a name is possibly present inside the range.
    pub fn contains_assertion_name(&self, subject_name: &str) -> Result<bool, HashError> {
        let item = Self::filter_item(subject_name, &self.subject_zone, &self.context);
        self.datastructure.contains(&item)
    }

    fn filter_item(name: &str, zone: &str, context: &str) -> String {
        format!("{} {} {}", name, zone, context)
    }
}

impl Interval for Pshard {
    fn begin(&self) -> &str {
        &self.range_from
    }

    fn end(&self) -> &str {
        &self.range_to
    }
}

//============ Test ==========================================================
