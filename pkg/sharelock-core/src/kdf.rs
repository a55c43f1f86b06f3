/*
 * sharelock: password and threshold-share protected document storage
 * Copyright (C) 2018-2022 Aleksa Sarai <cyphar@cyphar.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Turning credentials into symmetric key material.
//!
//! A password is normalised into [`KeyMaterial`] with a single unsalted
//! SHA-256. The per-envelope cipher key is then produced by [`stretch`], an
//! iterated SHA-256 chain over the key material and a random salt.
//!
//! ## Security ##
//! [`stretch`] is a cheap, CPU-bound construction. It is not memory-hard and
//! is no substitute for a vetted password hashing function. The envelope
//! format only fixes the length and position of the salt, so a stronger
//! function can replace it without changing the wire format.

use std::fmt;

use digest::Digest;
use sha2::Sha256;
use tracing::trace;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Length of [`KeyMaterial`] and of every derived cipher key.
pub const KEY_LENGTH: usize = 32;

/// Length of the salt consumed by [`stretch`].
pub const SALT_LENGTH: usize = 16;

/// Shortest hash chain that yields a key (`rounds - 1` hashes are computed).
pub const MIN_STRETCH_ROUNDS: u32 = 2;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(
        "stretch rounds must be at least {} but was {}",
        MIN_STRETCH_ROUNDS,
        rounds
    )]
    InvalidRounds { rounds: u32 },
}

/// A 256-bit credential value, either the hash of a password or a secret
/// recovered from a set of shares.
///
/// The bytes are wiped when the value is dropped and are never printed by
/// `Debug`.
// NOTE: PartialEq is not timing-safe.
#[derive(Clone, Eq, PartialEq, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial([u8; KEY_LENGTH]);

impl KeyMaterial {
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }
}

impl From<[u8; KEY_LENGTH]> for KeyMaterial {
    fn from(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial(<redacted>)")
    }
}

#[cfg(test)]
impl quickcheck::Arbitrary for KeyMaterial {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        let mut bytes = [0u8; KEY_LENGTH];
        crate::v0::arbitrary_fill_slice(g, &mut bytes);
        Self(bytes)
    }
}

/// Normalise a password into key material: `SHA-256(UTF-8(password))`.
pub fn key_from_password<S: AsRef<str>>(password: S) -> KeyMaterial {
    let digest = Sha256::digest(password.as_ref().as_bytes());

    let mut bytes = [0u8; KEY_LENGTH];
    bytes.copy_from_slice(&digest);
    KeyMaterial(bytes)
}

pub(crate) fn check_rounds(rounds: u32) -> Result<(), Error> {
    match rounds {
        n if n < MIN_STRETCH_ROUNDS => Err(Error::InvalidRounds { rounds }),
        _ => Ok(()),
    }
}

/// Derive a cipher key from key material and a salt.
///
/// Computes `acc_k = SHA-256(acc_{k-1} || key || salt)` for `k = 1..rounds-1`
/// starting from the empty string, and returns the last link.
pub fn stretch(
    key: &KeyMaterial,
    salt: &[u8; SALT_LENGTH],
    rounds: u32,
) -> Result<Zeroizing<[u8; KEY_LENGTH]>, Error> {
    check_rounds(rounds)?;
    trace!(rounds, "stretching key material");

    // acc_0 is empty, so the first link only covers key || salt.
    let mut acc = Zeroizing::new([0u8; KEY_LENGTH]);
    let link = Sha256::new()
        .chain_update(key.as_bytes())
        .chain_update(salt)
        .finalize();
    acc.copy_from_slice(&link);

    for _ in MIN_STRETCH_ROUNDS..rounds {
        let link = Sha256::new()
            .chain_update(&acc[..])
            .chain_update(key.as_bytes())
            .chain_update(salt)
            .finalize();
        acc.copy_from_slice(&link);
    }

    Ok(acc)
}
