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

use serde::{Deserialize, Serialize};

use crate::kdf;

/// Default upper bound on the number of shares a single split may issue.
pub const DEFAULT_MAX_SHARE_COUNT: u32 = 255;

/// Default upper bound on the threshold of a single split.
pub const DEFAULT_MAX_THRESHOLD: u32 = 255;

/// Default number of hash-chain rounds used when stretching key material for
/// an envelope. Changing this makes previously sealed envelopes unopenable.
pub const DEFAULT_STRETCH_ROUNDS: u32 = 10;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("max_share_count must be at least 1")]
    NoShares,

    #[error(
        "max_threshold must be between 1 and max_share_count ({}) but was {}",
        max_share_count,
        max_threshold
    )]
    ThresholdLimit {
        max_threshold: u32,
        max_share_count: u32,
    },

    #[error("{0}")]
    StretchRounds(#[from] kdf::Error),
}

/// Policy knobs for an [`Engine`](crate::Engine).
///
/// Every value here is part of the contract between the code that seals an
/// envelope (or issues shares) and the code that later opens it, so the
/// embedding application should treat a `Params` as versioned configuration
/// rather than something to tweak per call.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Params {
    /// Largest `N` accepted by `split`.
    pub max_share_count: u32,
    /// Largest `T` accepted by `split`.
    pub max_threshold: u32,
    /// Hash-chain length passed to [`kdf::stretch`] by `seal` and `open`.
    pub stretch_rounds: u32,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            max_share_count: DEFAULT_MAX_SHARE_COUNT,
            max_threshold: DEFAULT_MAX_THRESHOLD,
            stretch_rounds: DEFAULT_STRETCH_ROUNDS,
        }
    }
}

impl Params {
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_share_count < 1 {
            return Err(Error::NoShares);
        }
        if self.max_threshold < 1 || self.max_threshold > self.max_share_count {
            return Err(Error::ThresholdLimit {
                max_threshold: self.max_threshold,
                max_share_count: self.max_share_count,
            });
        }
        kdf::check_rounds(self.stretch_rounds)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_params_are_valid() {
        Params::default()
            .validate()
            .expect("default params must validate");
    }

    #[test]
    fn reject_zero_share_count() {
        let params = Params {
            max_share_count: 0,
            max_threshold: 0,
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(Error::NoShares)));
    }

    #[test]
    fn reject_bad_threshold_limit() {
        for max_threshold in [0, 6, 100] {
            let params = Params {
                max_share_count: 5,
                max_threshold,
                ..Default::default()
            };
            assert!(
                matches!(params.validate(), Err(Error::ThresholdLimit { .. })),
                "max_threshold {} should be rejected",
                max_threshold
            );
        }
    }

    #[test]
    fn reject_short_hash_chain() {
        for stretch_rounds in [0, 1] {
            let params = Params {
                stretch_rounds,
                ..Default::default()
            };
            assert!(matches!(params.validate(), Err(Error::StretchRounds(_))));
        }
    }

    #[test]
    fn legacy_caps_are_valid() {
        // Five shares with a threshold of at most three.
        let params = Params {
            max_share_count: 5,
            max_threshold: 3,
            stretch_rounds: DEFAULT_STRETCH_ROUNDS,
        };
        params.validate().expect("legacy caps must validate");
    }
}
