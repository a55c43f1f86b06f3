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

//! Authenticated envelope format.
//!
//! An envelope is laid out with fixed offsets and carries no version marker:
//!
//! ```text
//! salt[16] || nonce[16] || tag[16] || ciphertext[..]
//! ```
//!
//! The cipher is AES-256-GCM with a 128-bit nonce and 128-bit tag and no
//! associated data. Its key is [`kdf::stretch`] of the credential over the
//! salt. Both salt and nonce are drawn fresh for every seal, so sealing the
//! same plaintext twice never produces the same bytes.

use crate::kdf::{self, KeyMaterial, SALT_LENGTH};

use aead::{generic_array::GenericArray, AeadCore, AeadInPlace, KeyInit};
use aes_gcm::{aes::Aes256, AesGcm};
use rand::{CryptoRng, RngCore};
use tracing::{debug, trace};
use typenum::U16;
use zeroize::Zeroizing;

mod wire;
pub use wire::{FromWire, ToWire};

type EnvelopeCipher = AesGcm<Aes256, U16>;

type EnvelopeKey = aead::Key<EnvelopeCipher>;

type EnvelopeNonce = GenericArray<u8, <EnvelopeCipher as AeadCore>::NonceSize>;
pub const NONCE_LENGTH: usize = 16;

type EnvelopeTag = GenericArray<u8, <EnvelopeCipher as AeadCore>::TagSize>;
pub const TAG_LENGTH: usize = 16;

/// Length of the fixed-width prefix in front of the ciphertext.
pub const HEADER_LENGTH: usize = SALT_LENGTH + NONCE_LENGTH + TAG_LENGTH;

#[cfg(test)]
#[test]
fn check_length_consts() {
    // GenericArray doesn't give us a way to get the size, so we need to do this
    // in a test...
    assert_eq!(kdf::KEY_LENGTH, EnvelopeKey::default().len());
    assert_eq!(NONCE_LENGTH, EnvelopeNonce::default().len());
    assert_eq!(TAG_LENGTH, EnvelopeTag::default().len());
    assert_eq!(HEADER_LENGTH, 48);
}

// Copied from <https://github.com/BurntSushi/quickcheck/pull/292/files>.
#[cfg(test)]
pub fn arbitrary_fill_slice<S, T>(g: &mut quickcheck::Gen, mut slice: S)
where
    T: quickcheck::Arbitrary,
    S: AsMut<[T]>,
{
    slice.as_mut().fill_with(|| T::arbitrary(g))
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(
        "envelope is {} bytes, shorter than the {} byte header",
        length,
        HEADER_LENGTH
    )]
    MalformedEnvelope { length: usize },

    #[error("envelope authentication failed")]
    AuthenticationFailure,

    #[error("aead encryption cryptographic error: {0}")]
    AeadEncryption(aead::Error),

    #[error("key derivation: {0}")]
    Kdf(#[from] kdf::Error),
}

fn envelope_cipher(
    key: &KeyMaterial,
    salt: &[u8; SALT_LENGTH],
    rounds: u32,
) -> Result<EnvelopeCipher, Error> {
    let cipher_key = kdf::stretch(key, salt, rounds)?;
    Ok(EnvelopeCipher::new(EnvelopeKey::from_slice(&cipher_key[..])))
}

/// A parsed envelope.
///
/// Holding an `Envelope` says nothing about whether it is authentic. Only a
/// successful [`Envelope::open`] does.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    salt: [u8; SALT_LENGTH],
    nonce: [u8; NONCE_LENGTH],
    tag: [u8; TAG_LENGTH],
    ciphertext: Vec<u8>,
}

#[cfg(test)]
impl quickcheck::Arbitrary for Envelope {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        let mut envelope = Self {
            salt: [0; SALT_LENGTH],
            nonce: [0; NONCE_LENGTH],
            tag: [0; TAG_LENGTH],
            ciphertext: Vec::<u8>::arbitrary(g),
        };
        arbitrary_fill_slice(g, &mut envelope.salt);
        arbitrary_fill_slice(g, &mut envelope.nonce);
        arbitrary_fill_slice(g, &mut envelope.tag);
        envelope
    }
}

impl Envelope {
    /// Encrypt `plaintext` under a key stretched from `key`, with a salt and
    /// nonce drawn from `r`.
    pub fn seal<R: CryptoRng + RngCore + ?Sized>(
        r: &mut R,
        key: &KeyMaterial,
        rounds: u32,
        plaintext: &[u8],
    ) -> Result<Self, Error> {
        let mut salt = [0u8; SALT_LENGTH];
        r.fill_bytes(&mut salt);
        let mut nonce = [0u8; NONCE_LENGTH];
        r.fill_bytes(&mut nonce);

        let aead = envelope_cipher(key, &salt, rounds)?;
        let mut ciphertext = plaintext.to_vec();
        let tag = aead
            .encrypt_in_place_detached(EnvelopeNonce::from_slice(&nonce), b"", &mut ciphertext)
            .map_err(Error::AeadEncryption)?;

        let mut tag_bytes = [0u8; TAG_LENGTH];
        tag_bytes.copy_from_slice(&tag);

        debug!(length = plaintext.len(), rounds, "sealed envelope");
        Ok(Self {
            salt,
            nonce,
            tag: tag_bytes,
            ciphertext,
        })
    }

    /// Decrypt the envelope. The tag is checked before any plaintext is
    /// produced, and nothing is returned if it does not match.
    pub fn open(&self, key: &KeyMaterial, rounds: u32) -> Result<Vec<u8>, Error> {
        let aead = envelope_cipher(key, &self.salt, rounds)?;
        let mut plaintext = self.ciphertext.clone();
        aead.decrypt_in_place_detached(
            EnvelopeNonce::from_slice(&self.nonce),
            b"",
            &mut plaintext,
            EnvelopeTag::from_slice(&self.tag),
        )
        .map_err(|_| Error::AuthenticationFailure)?;

        debug!(length = plaintext.len(), rounds, "opened envelope");
        Ok(plaintext)
    }

    pub fn salt(&self) -> &[u8; SALT_LENGTH] {
        &self.salt
    }

    pub fn nonce(&self) -> &[u8; NONCE_LENGTH] {
        &self.nonce
    }

    pub fn tag(&self) -> &[u8; TAG_LENGTH] {
        &self.tag
    }

    /// Length of the ciphertext, which equals the length of the plaintext.
    pub fn ciphertext_len(&self) -> usize {
        self.ciphertext.len()
    }
}

/// Seal `plaintext` and return the serialised envelope.
pub fn seal<R: CryptoRng + RngCore + ?Sized>(
    r: &mut R,
    key: &KeyMaterial,
    rounds: u32,
    plaintext: &[u8],
) -> Result<Vec<u8>, Error> {
    Envelope::seal(r, key, rounds, plaintext).map(|envelope| envelope.to_wire())
}

/// Parse and open a serialised envelope.
pub fn open<B: AsRef<[u8]>>(
    key: &KeyMaterial,
    rounds: u32,
    envelope: B,
) -> Result<Vec<u8>, Error> {
    Envelope::from_wire(envelope)?.open(key, rounds)
}

/// Re-encrypt a serialised envelope under `new_key` with a fresh salt and
/// nonce. Nothing is sealed unless `old_key` opens the envelope.
pub fn rekey<R: CryptoRng + RngCore + ?Sized, B: AsRef<[u8]>>(
    r: &mut R,
    old_key: &KeyMaterial,
    new_key: &KeyMaterial,
    rounds: u32,
    envelope: B,
) -> Result<Vec<u8>, Error> {
    let plaintext = Zeroizing::new(open(old_key, rounds, envelope)?);
    trace!(length = plaintext.len(), "rekeying envelope");
    seal(r, new_key, rounds, &plaintext)
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::{kdf::key_from_password, params::DEFAULT_STRETCH_ROUNDS};

    use quickcheck::TestResult;
    use rand::{rngs::StdRng, SeedableRng};

    const ROUNDS: u32 = DEFAULT_STRETCH_ROUNDS;

    #[quickcheck]
    fn seal_open_roundtrip(key: KeyMaterial, plaintext: Vec<u8>) {
        let sealed = seal(&mut rand::thread_rng(), &key, ROUNDS, &plaintext).unwrap();
        assert_eq!(sealed.len(), HEADER_LENGTH + plaintext.len());
        assert_eq!(open(&key, ROUNDS, &sealed).unwrap(), plaintext);
    }

    #[test]
    fn empty_plaintext() {
        let key = key_from_password("empty");
        let sealed = seal(&mut rand::thread_rng(), &key, ROUNDS, b"").unwrap();
        assert_eq!(sealed.len(), HEADER_LENGTH);
        assert_eq!(open(&key, ROUNDS, &sealed).unwrap(), b"");
    }

    #[test]
    fn password_scenario() {
        let plaintext = b"a long string with a good amount of words";
        let key = key_from_password("quite secret isnt it");
        let sealed = seal(&mut rand::thread_rng(), &key, ROUNDS, plaintext).unwrap();

        assert_eq!(open(&key, ROUNDS, &sealed).unwrap(), plaintext);
        assert!(matches!(
            open(&key_from_password("wrong password"), ROUNDS, &sealed),
            Err(Error::AuthenticationFailure)
        ));
    }

    #[test]
    fn open_known_envelope() {
        // Sealed with salt = 00..0f, nonce = 10..1f and ten stretch rounds.
        let sealed = hex::decode(concat!(
            "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f",
            "dd215f473898e6ad70fd82e8e727af29",
            "c2b45831bd3d40ae04a9f9f731c5ebd43cecc24dcb8d5adc42b7ec67e151ee64",
            "9537cb933980f2d911",
        ))
        .unwrap();
        let key = key_from_password("quite secret isnt it");

        assert_eq!(
            open(&key, ROUNDS, &sealed).unwrap(),
            b"a long string with a good amount of words"
        );
    }

    #[test]
    fn tamper_every_bit() {
        let key = key_from_password("tamper");
        let sealed = seal(&mut rand::thread_rng(), &key, ROUNDS, b"some secret bytes").unwrap();

        for bit in 0..sealed.len() * 8 {
            let mut tampered = sealed.clone();
            tampered[bit / 8] ^= 1 << (bit % 8);
            assert!(
                matches!(
                    open(&key, ROUNDS, &tampered),
                    Err(Error::AuthenticationFailure)
                ),
                "flipping bit {} was not detected",
                bit
            );
        }
    }

    #[quickcheck]
    fn wrong_key(key: KeyMaterial, other: KeyMaterial, plaintext: Vec<u8>) -> TestResult {
        if key == other {
            return TestResult::discard();
        }
        let sealed = seal(&mut rand::thread_rng(), &key, ROUNDS, &plaintext).unwrap();
        TestResult::from_bool(matches!(
            open(&other, ROUNDS, &sealed),
            Err(Error::AuthenticationFailure)
        ))
    }

    #[test]
    fn short_envelope() {
        let key = key_from_password("short");
        for length in 0..HEADER_LENGTH {
            let bytes = vec![0u8; length];
            assert!(matches!(
                open(&key, ROUNDS, &bytes),
                Err(Error::MalformedEnvelope { length: l }) if l == length
            ));
        }
    }

    #[test]
    fn truncated_envelope() {
        let key = key_from_password("truncated");
        let sealed = seal(&mut rand::thread_rng(), &key, ROUNDS, b"0123456789").unwrap();

        for length in HEADER_LENGTH..sealed.len() {
            assert!(matches!(
                open(&key, ROUNDS, &sealed[..length]),
                Err(Error::AuthenticationFailure)
            ));
        }
    }

    #[test]
    fn fresh_salt_and_nonce() {
        let key = key_from_password("fresh");
        let a = Envelope::seal(&mut rand::thread_rng(), &key, ROUNDS, b"same").unwrap();
        let b = Envelope::seal(&mut rand::thread_rng(), &key, ROUNDS, b"same").unwrap();

        assert_ne!(a.salt(), b.salt());
        assert_ne!(a.nonce(), b.nonce());
        assert_ne!(a.to_wire(), b.to_wire());
    }

    #[test]
    fn seeded_seal_is_reproducible() {
        let key = key_from_password("seeded");
        let a = seal(&mut StdRng::seed_from_u64(42), &key, ROUNDS, b"data").unwrap();
        let b = seal(&mut StdRng::seed_from_u64(42), &key, ROUNDS, b"data").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rounds_must_match() {
        let key = key_from_password("rounds");
        let sealed = seal(&mut rand::thread_rng(), &key, 5, b"data").unwrap();

        assert!(matches!(
            open(&key, 6, &sealed),
            Err(Error::AuthenticationFailure)
        ));
        assert_eq!(open(&key, 5, &sealed).unwrap(), b"data");
    }

    #[test]
    fn invalid_rounds() {
        let key = key_from_password("rounds");
        assert!(matches!(
            seal(&mut rand::thread_rng(), &key, 1, b"data"),
            Err(Error::Kdf(kdf::Error::InvalidRounds { rounds: 1 }))
        ));
    }

    #[test]
    fn rekey_changes_credential() {
        let old = key_from_password("old password");
        let new = key_from_password("new password");
        let sealed = seal(&mut rand::thread_rng(), &old, ROUNDS, b"document").unwrap();

        let rekeyed = rekey(&mut rand::thread_rng(), &old, &new, ROUNDS, &sealed).unwrap();
        assert_eq!(open(&new, ROUNDS, &rekeyed).unwrap(), b"document");
        assert!(matches!(
            open(&old, ROUNDS, &rekeyed),
            Err(Error::AuthenticationFailure)
        ));
        assert_ne!(sealed[..SALT_LENGTH], rekeyed[..SALT_LENGTH]);
    }

    #[test]
    fn rekey_wrong_old_key() {
        let old = key_from_password("old password");
        let new = key_from_password("new password");
        let sealed = seal(&mut rand::thread_rng(), &old, ROUNDS, b"document").unwrap();

        assert!(matches!(
            rekey(&mut rand::thread_rng(), &new, &new, ROUNDS, &sealed),
            Err(Error::AuthenticationFailure)
        ));
    }

    #[test]
    fn error_hides_plaintext() {
        let key = key_from_password("quiet");
        let sealed = seal(&mut rand::thread_rng(), &key, ROUNDS, b"hunter2").unwrap();
        let err = open(&key_from_password("loud"), ROUNDS, &sealed).unwrap_err();
        assert!(!err.to_string().contains("hunter2"));
    }
}
