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


#![forbid(unsafe_code)]

#[cfg(test)]
extern crate quickcheck;
#[cfg(test)]
#[macro_use]
extern crate quickcheck_macros;

/// Password normalisation and key stretching.
pub mod kdf;

/// Policy shared by everything that seals, opens or splits.
pub mod params;

/// Implementation of Shamir Secret Sharing.
pub mod shamir;

/// Initial version of the sharelock envelope format.
///
/// This module also includes all of the necessary code to serialise and
/// interact with the relevant structures.
pub mod v0;

/// Re-export of the newest sharelock envelope format.
pub use v0 as latest;

pub use kdf::{key_from_password, KeyMaterial};
pub use params::Params;
pub use shamir::{Share, ShareSet};

use std::fmt;

use rand::{rngs::OsRng, CryptoRng, RngCore};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid parameters: {0}")]
    Params(#[from] params::Error),

    #[error("shamir algorithm operation: {0}")]
    Shamir(#[from] shamir::Error),

    #[error("envelope operation: {0}")]
    Envelope(#[from] v0::Error),
}

impl Error {
    /// Whether the envelope tag did not verify. This is the only sign of a
    /// wrong password, a wrong set of shares or a damaged envelope.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::Envelope(v0::Error::AuthenticationFailure))
    }
}

/// Something a user can present to unlock an envelope.
#[derive(Clone)]
pub enum Credential {
    Password(String),
    Shares { shares: Vec<String>, threshold: u32 },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password(_) => f.write_str("Password(<redacted>)"),
            Self::Shares { shares, threshold } => f
                .debug_struct("Shares")
                .field("count", &shares.len())
                .field("threshold", threshold)
                .finish_non_exhaustive(),
        }
    }
}

/// Entry point for sealing, opening and splitting with a fixed [`Params`].
///
/// An `Engine` holds no mutable state and can be shared freely between
/// threads. Methods without an explicit RNG draw from [`OsRng`].
#[derive(Clone, Debug, Default)]
pub struct Engine {
    params: Params,
}

impl Engine {
    pub fn new(params: Params) -> Result<Self, Error> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn split(
        &self,
        secret: &KeyMaterial,
        share_count: u32,
        threshold: u32,
    ) -> Result<Vec<Share>, Error> {
        self.split_with_rng(&mut OsRng, secret, share_count, threshold)
    }

    pub fn split_with_rng<R: CryptoRng + RngCore + ?Sized>(
        &self,
        r: &mut R,
        secret: &KeyMaterial,
        share_count: u32,
        threshold: u32,
    ) -> Result<Vec<Share>, Error> {
        Ok(shamir::split(
            r,
            &self.params,
            secret,
            share_count,
            threshold,
        )?)
    }

    /// Split the key material of `password`, so that the resulting shares can
    /// open anything sealed with that password.
    pub fn split_password<S: AsRef<str>>(
        &self,
        password: S,
        share_count: u32,
        threshold: u32,
    ) -> Result<Vec<Share>, Error> {
        self.split(&key_from_password(password), share_count, threshold)
    }

    pub fn combine<I: IntoIterator<Item = Share>>(
        &self,
        shares: I,
        threshold: u32,
    ) -> Result<KeyMaterial, Error> {
        let shares = ShareSet::new(shares.into_iter().collect(), threshold)?;
        Ok(shamir::combine(&shares)?)
    }

    pub fn key_material(&self, credential: &Credential) -> Result<KeyMaterial, Error> {
        match credential {
            Credential::Password(password) => Ok(key_from_password(password)),
            Credential::Shares { shares, threshold } => {
                debug!(count = shares.len(), threshold, "recovering key from shares");
                let shares = ShareSet::parse(shares, *threshold)?;
                Ok(shamir::combine(&shares)?)
            }
        }
    }

    pub fn seal(&self, key: &KeyMaterial, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        self.seal_with_rng(&mut OsRng, key, plaintext)
    }

    pub fn seal_with_rng<R: CryptoRng + RngCore + ?Sized>(
        &self,
        r: &mut R,
        key: &KeyMaterial,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, Error> {
        Ok(v0::seal(r, key, self.params.stretch_rounds, plaintext)?)
    }

    pub fn open<B: AsRef<[u8]>>(&self, key: &KeyMaterial, envelope: B) -> Result<Vec<u8>, Error> {
        Ok(v0::open(key, self.params.stretch_rounds, envelope)?)
    }

    pub fn rekey<B: AsRef<[u8]>>(
        &self,
        old_key: &KeyMaterial,
        new_key: &KeyMaterial,
        envelope: B,
    ) -> Result<Vec<u8>, Error> {
        Ok(v0::rekey(
            &mut OsRng,
            old_key,
            new_key,
            self.params.stretch_rounds,
            envelope,
        )?)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

    const PASSWORD: &str = "quite secret isnt it";
    const DOCUMENT: &[u8] = b"a long string with a good amount of words";

    fn share_strings(shares: &[Share]) -> Vec<String> {
        shares.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn engine_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engine>();
        assert_send_sync::<Error>();
    }

    #[test]
    fn engine_rejects_invalid_params() {
        let params = Params {
            stretch_rounds: 1,
            ..Default::default()
        };
        assert!(matches!(Engine::new(params), Err(Error::Params(_))));
    }

    #[test]
    fn password_seal_open() {
        let engine = Engine::default();
        let key = key_from_password(PASSWORD);

        let sealed = engine.seal(&key, DOCUMENT).unwrap();
        assert_eq!(engine.open(&key, &sealed).unwrap(), DOCUMENT);

        let err = engine
            .open(&key_from_password("wrong password"), &sealed)
            .unwrap_err();
        assert!(err.is_authentication_failure());
    }

    #[test]
    fn shares_open_password_envelope() {
        let engine = Engine::default();
        let sealed = engine
            .seal(&key_from_password(PASSWORD), DOCUMENT)
            .unwrap();

        let shares = engine.split_password(PASSWORD, 4, 2).unwrap();
        let credential = Credential::Shares {
            shares: share_strings(&shares[1..3]),
            threshold: 2,
        };
        let key = engine.key_material(&credential).unwrap();
        assert_eq!(engine.open(&key, &sealed).unwrap(), DOCUMENT);
    }

    #[test]
    fn mixed_splits_fail_authentication() {
        let engine = Engine::default();
        let key = key_from_password(PASSWORD);
        let sealed = engine.seal(&key, DOCUMENT).unwrap();

        let a = engine.split(&key, 4, 2).unwrap();
        let b = engine.split(&key, 4, 2).unwrap();
        let recovered = engine
            .combine(vec![a[0].clone(), b[1].clone()], 2)
            .unwrap();
        assert!(engine
            .open(&recovered, &sealed)
            .unwrap_err()
            .is_authentication_failure());
    }

    #[test]
    fn too_few_shares() {
        let engine = Engine::default();
        let shares = engine.split_password(PASSWORD, 5, 3).unwrap();
        let credential = Credential::Shares {
            shares: share_strings(&shares[..2]),
            threshold: 3,
        };
        assert!(matches!(
            engine.key_material(&credential),
            Err(Error::Shamir(shamir::Error::InsufficientShares {
                needed: 3,
                given: 2
            }))
        ));
    }

    #[test]
    fn shuffled_shares() {
        let engine = Engine::default();
        let mut rng = StdRng::seed_from_u64(99);
        let key = key_from_password(PASSWORD);

        let mut shares = engine.split_with_rng(&mut rng, &key, 6, 4).unwrap();
        shares.shuffle(&mut rng);
        shares.truncate(4);
        assert_eq!(engine.combine(shares, 4).unwrap(), key);
    }

    #[test]
    fn rekey_to_new_password() {
        let engine = Engine::default();
        let old = key_from_password(PASSWORD);
        let new = key_from_password("a much better password");

        let sealed = engine.seal(&old, DOCUMENT).unwrap();
        let rekeyed = engine.rekey(&old, &new, &sealed).unwrap();
        assert_eq!(engine.open(&new, &rekeyed).unwrap(), DOCUMENT);
        assert!(engine.open(&old, &rekeyed).unwrap_err().is_authentication_failure());
    }

    #[test]
    fn rounds_come_from_params() {
        let fast = Engine::new(Params {
            stretch_rounds: 2,
            ..Default::default()
        })
        .unwrap();
        let key = key_from_password(PASSWORD);

        let sealed = fast.seal(&key, DOCUMENT).unwrap();
        assert!(Engine::default()
            .open(&key, &sealed)
            .unwrap_err()
            .is_authentication_failure());
        assert_eq!(latest::open(&key, 2, &sealed).unwrap(), DOCUMENT);
    }

    #[test]
    fn share_limits_come_from_params() {
        let engine = Engine::new(Params {
            max_share_count: 3,
            max_threshold: 2,
            ..Default::default()
        })
        .unwrap();
        assert!(matches!(
            engine.split_password(PASSWORD, 4, 2),
            Err(Error::Shamir(shamir::Error::TooManyShares { .. }))
        ));
        assert!(matches!(
            engine.split_password(PASSWORD, 3, 3),
            Err(Error::Shamir(shamir::Error::ThresholdAboveLimit { .. }))
        ));
    }

    #[test]
    fn credential_debug_is_redacted() {
        let password = Credential::Password(PASSWORD.into());
        assert!(!format!("{:?}", password).contains(PASSWORD));

        let shares = Credential::Shares {
            shares: vec!["1-deadbeef".into()],
            threshold: 1,
        };
        assert!(!format!("{:?}", shares).contains("deadbeef"));
    }
}
