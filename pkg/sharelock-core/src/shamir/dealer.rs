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
    kdf::KeyMaterial,
    params::Params,
    shamir::{
        field::{FieldElem, Polynomial},
        Error, Share, ShareSet,
    },
};

use rand::{CryptoRng, RngCore};
use tracing::debug;

/// Split `secret` into `share_count` shares, any `threshold` of which recover
/// it.
///
/// A fresh polynomial is drawn from `r` for every call and dropped before
/// returning. `r` must be a cryptographically secure source. Any weakness in
/// it breaks the guarantee that `threshold - 1` shares reveal nothing.
pub fn split<R: CryptoRng + RngCore + ?Sized>(
    r: &mut R,
    params: &Params,
    secret: &KeyMaterial,
    share_count: u32,
    threshold: u32,
) -> Result<Vec<Share>, Error> {
    if share_count > params.max_share_count {
        return Err(Error::TooManyShares {
            share_count,
            limit: params.max_share_count,
        });
    }
    if threshold < 1 || threshold > share_count {
        return Err(Error::InvalidThreshold {
            threshold,
            share_count: share_count as usize,
        });
    }
    if threshold > params.max_threshold {
        return Err(Error::ThresholdAboveLimit {
            threshold,
            limit: params.max_threshold,
        });
    }

    let secret = FieldElem::from_bytes(secret.as_bytes()).ok_or(Error::SecretOutOfRange)?;
    let poly = Polynomial::new_rand(secret, threshold - 1, r);

    let shares = (1..=share_count)
        .map(|index| Share {
            index,
            value: poly.evaluate(&FieldElem::from_u32(index)),
        })
        .collect::<Vec<_>>();

    debug!(share_count, threshold, "split secret into shares");
    Ok(shares)
}

/// Recover the secret from a validated set of shares.
///
/// If the shares are authentic and come from a single [`split`], the result is
/// exactly the original secret. Otherwise the result is some other value and
/// no error is raised. Only the envelope tag check can tell the difference.
pub fn combine(shares: &ShareSet) -> Result<KeyMaterial, Error> {
    let secret = Polynomial::lagrange_constant(shares.points())?;

    debug!(
        share_count = shares.shares().len(),
        threshold = shares.threshold(),
        "recovered secret from shares"
    );
    Ok(KeyMaterial::from(secret.to_bytes()))
}
