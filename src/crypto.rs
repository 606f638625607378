//! The crypto boundary.
//!
//! Everything cryptographic the server needs goes through this module:
//! Ed25519 signing and verification over an opaque byte blob, and the
//! hash family Bloom filters are built from. The implementations come
//! from `ring` where `ring` has them; the FNV variants are computed
//! directly since they are not cryptographic hashes.

use crate::base::algo::HashAlgo;
use core::fmt;
use ring::signature::{self, KeyPair};

//------------ SecretKey -----------------------------------------------------

/// An Ed25519 signing key.
pub struct SecretKey(signature::Ed25519KeyPair);

impl SecretKey {
    /// Creates a signing key from a 32 byte seed.
    pub fn from_seed(seed: &[u8]) -> Result<Self, CryptoError> {
        signature::Ed25519KeyPair::from_seed_unchecked(seed)
            .map(SecretKey)
            .map_err(|_| CryptoError::InvalidKey)
    }

    /// Generates a fresh signing key.
    pub fn generate() -> Result<Self, CryptoError> {
        let rng = ring::rand::SystemRandom::new();
        let doc = signature::Ed25519KeyPair::generate_pkcs8(&rng)
            .map_err(|_| CryptoError::KeyGeneration)?;
        signature::Ed25519KeyPair::from_pkcs8(doc.as_ref())
            .map(SecretKey)
            .map_err(|_| CryptoError::InvalidKey)
    }

    /// Returns the matching public key, 32 raw bytes.
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.0.public_key().as_ref().to_vec()
    }

    /// Signs a message.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.0.sign(message).as_ref().to_vec()
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

//------------ verify_ed25519 ------------------------------------------------

/// Verifies an Ed25519 signature over a message.
///
/// Returns `false` for malformed keys or signatures as well as for
/// signatures that do not match; a verification failure is never an
/// error.
pub fn verify_ed25519(message: &[u8], sig: &[u8], public_key: &[u8]) -> bool {
    if public_key.len() != crate::keys::ED25519_PUBLIC_KEY_LEN {
        return false;
    }
    signature::UnparsedPublicKey::new(&signature::ED25519, public_key)
        .verify(message, sig)
        .is_ok()
}

//------------ Hashing -------------------------------------------------------

/// Hashes data under an algorithm and a key, folded to 64 bits.
///
/// The key makes repeated applications of the same algorithm
/// independent; Bloom filters use it as the hash function index.
pub fn hash_keyed(algo: HashAlgo, data: &[u8], key: u32) -> Result<u64, HashError> {
    match algo {
        HashAlgo::Sha256 => Ok(digest_u64(&ring::digest::SHA256, data, key)),
        HashAlgo::Sha384 => Ok(digest_u64(&ring::digest::SHA384, data, key)),
        HashAlgo::Sha512 => Ok(digest_u64(&ring::digest::SHA512, data, key)),
        HashAlgo::Fnv64 => Ok(fnv64(data, key)),
        HashAlgo::Fnv128 => Ok(fnv128(data, key) as u64),
        HashAlgo::NoHash | HashAlgo::Shake256 => {
            Err(HashError::UnsupportedAlgo(algo))
        }
    }
}

/// Hashes data once and splits the output into two independent values.
pub fn hash_split(algo: HashAlgo, data: &[u8]) -> Result<(u64, u64), HashError> {
    match algo {
        HashAlgo::Sha256 => Ok(digest_split(&ring::digest::SHA256, data)),
        HashAlgo::Sha384 => Ok(digest_split(&ring::digest::SHA384, data)),
        HashAlgo::Sha512 => Ok(digest_split(&ring::digest::SHA512, data)),
        HashAlgo::Fnv64 => Ok((fnv64(data, 0), fnv64(data, 1))),
        HashAlgo::Fnv128 => {
            let hash = fnv128(data, 0);
            Ok((hash as u64, (hash >> 64) as u64))
        }
        HashAlgo::NoHash | HashAlgo::Shake256 => {
            Err(HashError::UnsupportedAlgo(algo))
        }
    }
}

fn digest_u64(algo: &'static ring::digest::Algorithm, data: &[u8], key: u32) -> u64 {
    let mut ctx = ring::digest::Context::new(algo);
    ctx.update(data);
    ctx.update(&key.to_be_bytes());
    let digest = ctx.finish();
    u64::from_be_bytes(digest.as_ref()[..8].try_into().unwrap())
}

fn digest_split(algo: &'static ring::digest::Algorithm, data: &[u8]) -> (u64, u64) {
    let digest = ring::digest::digest(algo, data);
    let bytes = digest.as_ref();
    (
        u64::from_be_bytes(bytes[..8].try_into().unwrap()),
        u64::from_be_bytes(bytes[8..16].try_into().unwrap()),
    )
}

fn fnv64(data: &[u8], key: u32) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    for &byte in data.iter().chain(key.to_be_bytes().iter()) {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x100_0000_01b3);
    }
    hash
}

fn fnv128(data: &[u8], key: u32) -> u128 {
    let mut hash = 0x6c62_272e_07bb_0142_62b8_2175_6295_c58du128;
    for &byte in data.iter().chain(key.to_be_bytes().iter()) {
        hash ^= u128::from(byte);
        hash = hash.wrapping_mul(0x100_0000_0000_0000_0000_013bu128);
    }
    hash
}

//============ Error Types ===================================================

//------------ CryptoError ---------------------------------------------------

/// Creating or importing a key failed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CryptoError {
    /// The provided key material was invalid.
    InvalidKey,

    /// The system random number generator failed.
    KeyGeneration,
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CryptoError::InvalidKey => f.write_str("invalid key material"),
            CryptoError::KeyGeneration => f.write_str("key generation failed"),
        }
    }
}

impl std::error::Error for CryptoError {}

//------------ HashError -----------------------------------------------------

/// A Bloom filter hash could not be computed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HashError {
    /// The algorithm cannot be used for Bloom filter hashing.
    UnsupportedAlgo(HashAlgo),

    /// The filter declares an empty hash family.
    EmptyFamily,

    /// The filter has no bits.
    EmptyFilter,
}

impl fmt::Display for HashError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HashError::UnsupportedAlgo(algo) => {
                write!(f, "unsupported hash algorithm {}", algo)
            }
            HashError::EmptyFamily => f.write_str("empty hash family"),
            HashError::EmptyFilter => f.write_str("empty filter"),
        }
    }
}

impl std::error::Error for HashError {}

//============ Test ==========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sign_verify_round_trip() {
        let key = SecretKey::generate().unwrap();
        let public = key.public_key_bytes();
        let sig = key.sign(b"hello world");
        assert!(verify_ed25519(b"hello world", &sig, &public));
        assert!(!verify_ed25519(b"hello worle", &sig, &public));
        let mut bad_sig = sig.clone();
        bad_sig[0] ^= 0x01;
        assert!(!verify_ed25519(b"hello world", &bad_sig, &public));
    }

    #[test]
    fn seed_is_deterministic() {
        let one = SecretKey::from_seed(&[7u8; 32]).unwrap();
        let two = SecretKey::from_seed(&[7u8; 32]).unwrap();
        assert_eq!(one.public_key_bytes(), two.public_key_bytes());
        assert!(SecretKey::from_seed(&[7u8; 31]).is_err());
    }

    #[test]
    fn keyed_hashes_differ_by_key() {
        for algo in [HashAlgo::Sha256, HashAlgo::Fnv64, HashAlgo::Fnv128] {
            let one = hash_keyed(algo, b"ethz", 0).unwrap();
            let two = hash_keyed(algo, b"ethz", 1).unwrap();
            assert_ne!(one, two, "algo {}", algo);
        }
    }

    #[test]
    fn unsupported_algos() {
        assert!(hash_keyed(HashAlgo::NoHash, b"x", 0).is_err());
        assert!(hash_keyed(HashAlgo::Shake256, b"x", 0).is_err());
        assert!(hash_split(HashAlgo::NoHash, b"x").is_err());
    }
}
