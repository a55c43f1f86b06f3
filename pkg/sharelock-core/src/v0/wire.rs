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

use crate::{
    kdf::SALT_LENGTH,
    v0::{Envelope, Error, NONCE_LENGTH, TAG_LENGTH},
};

pub trait ToWire {
    fn to_wire(&self) -> Vec<u8>;
}

pub trait FromWire: Sized {
    fn from_wire_partial(input: &[u8]) -> Result<(&[u8], Self), Error>;

    fn from_wire<B: AsRef<[u8]>>(input: B) -> Result<Self, Error> {
        let input = input.as_ref();
        match Self::from_wire_partial(input)? {
            ([], ret) => Ok(ret),
            // Only reachable for types with a bounded encoding.
            (rest, _) => Err(Error::MalformedEnvelope {
                length: input.len() - rest.len(),
            }),
        }
    }
}

impl ToWire for Envelope {
    fn to_wire(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(super::HEADER_LENGTH + self.ciphertext.len());

        bytes.extend_from_slice(&self.salt);
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.tag);
        bytes.extend_from_slice(&self.ciphertext);

        bytes
    }
}

impl FromWire for Envelope {
    fn from_wire_partial(input: &[u8]) -> Result<(&[u8], Self), Error> {
        use nom::{
            bytes::complete::take,
            combinator::{map_res, rest},
            IResult,
        };

        fn fixed<const N: usize>(input: &[u8]) -> IResult<&[u8], [u8; N]> {
            map_res(take(N), |bytes: &[u8]| <[u8; N]>::try_from(bytes))(input)
        }

        fn parse(input: &[u8]) -> IResult<&[u8], Envelope> {
            let (input, salt) = fixed::<SALT_LENGTH>(input)?;
            let (input, nonce) = fixed::<NONCE_LENGTH>(input)?;
            let (input, tag) = fixed::<TAG_LENGTH>(input)?;
            let (input, ciphertext) = rest(input)?;

            let envelope = Envelope {
                salt,
                nonce,
                tag,
                ciphertext: ciphertext.into(),
            };

            Ok((input, envelope))
        }

        parse(input).map_err(|_| Error::MalformedEnvelope {
            length: input.len(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::v0::HEADER_LENGTH;

    #[quickcheck]
    fn envelope_wire_roundtrip(envelope: Envelope) {
        let bytes = envelope.to_wire();
        assert_eq!(bytes.len(), HEADER_LENGTH + envelope.ciphertext_len());
        assert_eq!(Envelope::from_wire(&bytes).unwrap(), envelope);
    }

    #[test]
    fn fixed_offsets() {
        let bytes = (0..=HEADER_LENGTH as u8 + 3).collect::<Vec<u8>>();
        let envelope = Envelope::from_wire(&bytes).unwrap();

        assert_eq!(envelope.salt()[0], 0);
        assert_eq!(envelope.nonce()[0], 16);
        assert_eq!(envelope.tag()[0], 32);
        assert_eq!(envelope.ciphertext, vec![48, 49, 50, 51]);
    }

    #[test]
    fn header_only() {
        let envelope = Envelope::from_wire([0u8; HEADER_LENGTH]).unwrap();
        assert_eq!(envelope.ciphertext_len(), 0);
    }

    #[test]
    fn short_input() {
        for length in [0, 1, SALT_LENGTH, SALT_LENGTH + NONCE_LENGTH, HEADER_LENGTH - 1] {
            assert!(matches!(
                Envelope::from_wire(vec![0xaa; length]),
                Err(Error::MalformedEnvelope { length: l }) if l == length
            ));
        }
    }
}
