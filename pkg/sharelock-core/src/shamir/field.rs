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

use std::{
    iter::{Product, Sum},
    ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign},
};

use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use once_cell::sync::Lazy;
use rand::{CryptoRng, RngCore};

use crate::shamir::Error;

/// Length of the big-endian byte encoding of a field element.
pub const ELEM_LENGTH: usize = 32;

/// The field modulus, `2^256 - 189`, which is the largest prime below `2^256`.
///
/// Every share ever issued depends on this value. It must never change.
pub static PRIME: Lazy<BigUint> = Lazy::new(|| (BigUint::one() << 256u32) - 189u32);

// Fermat's little theorem gives a^(p-2) = a^-1 for a != 0.
static INVERSE_EXPONENT: Lazy<BigUint> = Lazy::new(|| (*PRIME).clone() - 2u32);

/// An element of `GF(p)` with `p = 2^256 - 189`.
///
/// The inner value is always fully reduced, so two elements are equal exactly
/// when their representatives are.
// NOTE: PartialEq is not timing-safe.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldElem(BigUint);

/// (x, y) in GF(p).
pub type FieldPoint = (FieldElem, FieldElem);

impl FieldElem {
    /// Additive identity.
    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    /// Multiplicative identity.
    pub fn one() -> Self {
        Self(BigUint::one())
    }

    /// Uniformly random element of `[0, p)`.
    pub fn new_rand<R: CryptoRng + RngCore + ?Sized>(r: &mut R) -> Self {
        Self(r.gen_biguint_below(&PRIME))
    }

    pub fn from_u32(v: u32) -> Self {
        Self(BigUint::from(v))
    }

    /// Returns `None` unless `v < p`. Values are never silently reduced.
    pub fn from_biguint(v: BigUint) -> Option<Self> {
        match v < *PRIME {
            true => Some(Self(v)),
            false => None,
        }
    }

    pub fn from_bytes(bytes: &[u8; ELEM_LENGTH]) -> Option<Self> {
        Self::from_biguint(BigUint::from_bytes_be(bytes))
    }

    /// Big-endian encoding, left-padded with zeroes to [`ELEM_LENGTH`].
    pub fn to_bytes(&self) -> [u8; ELEM_LENGTH] {
        let bytes = self.0.to_bytes_be();
        let mut padded = [0u8; ELEM_LENGTH];
        padded[ELEM_LENGTH - bytes.len()..].copy_from_slice(&bytes);
        padded
    }

    pub(crate) fn inner(&self) -> &BigUint {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    // NOTE: Definitely not constant-time.
    pub fn pow(&self, exponent: &BigUint) -> Self {
        Self(self.0.modpow(exponent, &PRIME))
    }

    pub fn inverse(&self) -> Option<Self> {
        match self.is_zero() {
            true => None,
            false => Some(self.pow(&INVERSE_EXPONENT)),
        }
    }
}

#[cfg(test)]
impl quickcheck::Arbitrary for FieldElem {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        let digits = (0..8).map(|_| u32::arbitrary(g)).collect::<Vec<_>>();
        Self(BigUint::new(digits) % &*PRIME)
    }
}

impl Add for FieldElem {
    type Output = Self;
    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}

impl AddAssign for FieldElem {
    fn add_assign(&mut self, rhs: Self) {
        // Both sides are below p, so one subtraction fully reduces the sum.
        self.0 += rhs.0;
        if self.0 >= *PRIME {
            self.0 -= &*PRIME;
        }
    }
}

impl Sub for FieldElem {
    type Output = Self;
    fn sub(mut self, rhs: Self) -> Self::Output {
        self -= rhs;
        self
    }
}

impl SubAssign for FieldElem {
    fn sub_assign(&mut self, rhs: Self) {
        if self.0 < rhs.0 {
            self.0 += &*PRIME;
        }
        self.0 -= rhs.0;
    }
}

impl Neg for FieldElem {
    type Output = Self;
    fn neg(self) -> Self::Output {
        match self.is_zero() {
            true => self,
            false => Self(&*PRIME - &self.0),
        }
    }
}

impl Mul for FieldElem {
    type Output = Self;
    fn mul(mut self, rhs: Self) -> Self::Output {
        self *= rhs;
        self
    }
}

impl MulAssign for FieldElem {
    fn mul_assign(&mut self, rhs: Self) {
        self.0 = (&self.0 * &rhs.0) % &*PRIME;
    }
}

impl Sum for FieldElem {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), Add::add)
    }
}

impl Product for FieldElem {
    fn product<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::one(), Mul::mul)
    }
}

/// A polynomial in `GF(p)`.
// The coefficients are in *increasing* degree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Polynomial(Vec<FieldElem>);

impl Polynomial {
    /// Construct a polynomial of degree `n` with the given constant term and
    /// the remaining `n` coefficients drawn uniformly from `[0, p)`.
    pub fn new_rand<R: CryptoRng + RngCore + ?Sized>(
        constant: FieldElem,
        n: u32,
        r: &mut R,
    ) -> Self {
        Self(
            std::iter::once(constant)
                .chain((0..n).map(|_| FieldElem::new_rand(r)))
                .collect::<Vec<_>>(),
        )
    }

    #[allow(unused)]
    pub fn degree(&self) -> u32 {
        match self.0.len() {
            0 => panic!("Polynomial must have at least one element"),
            n => (n - 1) as u32,
        }
    }

    /// Retrieve the constant term of the polynomial.
    pub fn constant(&self) -> &FieldElem {
        self.0
            .first()
            .expect("Polynomial must have at least one element")
    }

    /// Evaluate the polynomial at a given `x` value.
    pub fn evaluate(&self, x: &FieldElem) -> FieldElem {
        // Horner's method, walking from the highest degree term down.
        self.0
            .iter()
            .rev()
            .fold(FieldElem::zero(), |acc, coeff| coeff.clone() + x.clone() * acc)
    }

    /// Interpolate the constant term of the polynomial passing through the
    /// given points, using [Lagrange interpolation][lagrange] at `x = 0`:
    ///
    /// ```text
    ///   L(0)   = \sum_{i} y_i l_i(0)
    ///   l_i(0) = \prod_{j!=i} \frac{-x_j}{x_i - x_j}
    /// ```
    ///
    /// The numerator and denominator products are accumulated separately so
    /// that only one inversion is needed per point.
    ///
    /// Every point is used. If there are fewer points than the degree of the
    /// original polynomial plus one, the result is a different (but
    /// well-defined) field element. It is the caller's job to prevent that.
    ///
    /// [lagrange]: https://en.wikipedia.org/wiki/Lagrange_polynomial
    pub fn lagrange_constant<P: AsRef<[FieldPoint]>>(points: P) -> Result<FieldElem, Error> {
        let points = points.as_ref();
        if points.is_empty() {
            return Err(Error::InsufficientShares {
                needed: 1,
                given: 0,
            });
        }

        points
            .iter()
            .enumerate()
            .map(|(i, (x_i, y_i))| {
                let (numerator, denominator) = points
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .fold(
                        (FieldElem::one(), FieldElem::one()),
                        |(num, den), (_, (x_j, _))| {
                            (num * -x_j.clone(), den * (x_i.clone() - x_j.clone()))
                        },
                    );
                let denominator_inv = denominator.inverse().ok_or(Error::NonInvertiblePoint)?;
                Ok(y_i.clone() * numerator * denominator_inv)
            })
            .sum()
    }
}

#[cfg(test)]
impl quickcheck::Arbitrary for Polynomial {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        // Interpolation costs one modular exponentiation per point, so keep
        // the degree small enough for quickcheck to run a few hundred cases.
        let len = usize::arbitrary(g) % 12 + 1;
        Polynomial((0..len).map(|_| FieldElem::arbitrary(g)).collect())
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        Box::new(
            self.0
                .shrink()
                .filter(|p| !p.is_empty())
                .map(Polynomial),
        )
    }
}
