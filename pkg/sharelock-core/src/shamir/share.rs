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

use crate::shamir::{
    field::{FieldElem, FieldPoint},
    Error,
};

use std::{collections::HashSet, fmt, str::FromStr};

use nom::{
    character::complete::{char, digit1, hex_digit1},
    combinator::all_consuming,
    sequence::separated_pair,
    IResult,
};
use num_bigint::BigUint;

/// Piece of a secret which has been split with [Shamir Secret Sharing][sss].
///
/// The string form is `"<index>-<value>"`, with a decimal index and the value
/// in lower-case hex without padding.
///
/// [sss]: https://en.wikipedia.org/wiki/Shamir%27s_Secret_Sharing
#[derive(Clone, Eq, PartialEq)]
pub struct Share {
    pub(super) index: u32,
    pub(super) value: FieldElem,
}

impl Share {
    /// The x-value of this share. Never zero.
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn value(&self) -> &FieldElem {
        &self.value
    }

    pub(super) fn point(&self) -> FieldPoint {
        (FieldElem::from_u32(self.index), self.value.clone())
    }
}

impl fmt::Debug for Share {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Share")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Share {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:x}", self.index, self.value.inner())
    }
}

impl FromStr for Share {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        fn parse(input: &str) -> IResult<&str, (&str, &str)> {
            separated_pair(digit1, char('-'), hex_digit1)(input)
        }

        let (_, (index, value)) = all_consuming(parse)(s.trim())
            .map_err(|_| Error::MalformedShareString("expected <index>-<hex value>"))?;

        let index = index
            .parse::<u32>()
            .map_err(|_| Error::MalformedShareString("share index is too large"))?;
        if index == 0 {
            return Err(Error::MalformedShareString(
                "share index 0 is reserved for the secret",
            ));
        }

        let value = BigUint::parse_bytes(value.as_bytes(), 16)
            .and_then(FieldElem::from_biguint)
            .ok_or(Error::MalformedShareString(
                "share value is not smaller than the field modulus",
            ))?;

        Ok(Share { index, value })
    }
}

#[cfg(test)]
impl quickcheck::Arbitrary for Share {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        Self {
            index: u32::arbitrary(g).max(1),
            value: FieldElem::arbitrary(g),
        }
    }
}

/// A list of shares which has been checked to be usable for recovery.
///
/// Interpolation happily produces garbage from too few or repeated points,
/// so the only way to get at [`combine`](crate::shamir::combine) is through
/// this type's constructors, which reject duplicate indices and lists shorter
/// than the declared threshold.
#[derive(Clone, Debug)]
pub struct ShareSet {
    shares: Vec<Share>,
    threshold: u32,
}

impl ShareSet {
    pub fn new(shares: Vec<Share>, threshold: u32) -> Result<Self, Error> {
        if threshold < 1 {
            return Err(Error::InvalidThreshold {
                threshold,
                share_count: shares.len(),
            });
        }

        let mut seen = HashSet::new();
        if let Some(index) = shares.iter().map(Share::index).find(|x| !seen.insert(*x)) {
            return Err(Error::DuplicateShareIndex(index));
        }

        if shares.len() < threshold as usize {
            return Err(Error::InsufficientShares {
                needed: threshold,
                given: shares.len(),
            });
        }

        Ok(Self { shares, threshold })
    }

    /// Parse every share string and then apply the checks of [`ShareSet::new`].
    pub fn parse<I, S>(shares: I, threshold: u32) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let shares = shares
            .into_iter()
            .map(|s| s.as_ref().parse::<Share>())
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(shares, threshold)
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn shares(&self) -> &[Share] {
        &self.shares
    }

    pub(super) fn points(&self) -> Vec<FieldPoint> {
        self.shares.iter().map(Share::point).collect()
    }
}
