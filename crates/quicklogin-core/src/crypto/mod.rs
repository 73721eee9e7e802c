//! Cryptographic primitives for stored credentials
//!
//! This module provides:
//! - the legacy XOR stream cipher with a hash checksum
//! - the 32-bit rolling string hash shared by the cipher and the device key
//! - master key handling with zeroize
//!
//! The cipher is NOT authenticated encryption. It exists so that data
//! written by earlier releases of the extension stays readable, and any
//! new storage format should move to a salted, iterated KDF with an AEAD
//! while keeping this decrypt path read-only for migration.

mod legacy;
mod secure_memory;

pub use legacy::{checksum, decrypt, encrypt, hash_string};
pub use secure_memory::MasterKey;
