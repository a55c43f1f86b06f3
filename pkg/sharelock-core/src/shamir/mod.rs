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

//! This package implements a Shamir Secret Sharing scheme over the prime
//! field `GF(2^256 - 189)`, meaning that a 32-byte secret is treated as a
//! single field element and every share is one point on a random polynomial.
//!
//! ## Security ##
//! **This implementation is not constant time.** Interpolation cannot tell
//! when it has been handed too few or mismatched shares, it simply produces a
//! different number. [`ShareSet`] enforces the count and index checks before
//! interpolation runs, and a wrong secret is only ever detected by the
//! envelope's authentication tag.

mod dealer;
pub mod field;
mod share;

pub use dealer::{combine, split};
pub use field::{FieldElem, Polynomial, PRIME};
pub use share::{Share, ShareSet};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(
        "threshold must be between 1 and the share count {} but was {}",
        share_count,
        threshold
    )]
    InvalidThreshold { threshold: u32, share_count: usize },

    #[error("threshold {} exceeds the configured limit of {}", threshold, limit)]
    ThresholdAboveLimit { threshold: u32, limit: u32 },

    #[error("share count {} exceeds the configured limit of {}", share_count, limit)]
    TooManyShares { share_count: u32, limit: u32 },

    #[error("secret is not smaller than the field modulus")]
    SecretOutOfRange,

    #[error(
        "not enough shares to recover secret: need {} but was given {}",
        needed,
        given
    )]
    InsufficientShares { needed: u32, given: usize },

    #[error("share index {0} was given more than once")]
    DuplicateShareIndex(u32),

    #[error("malformed share string: {0}")]
    MalformedShareString(&'static str),

    #[error("[critical security issue] all points must have distinct x values")]
    NonInvertiblePoint,
}
