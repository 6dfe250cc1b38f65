// Copyright 2024 httpvfs
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use httpvfs_utils::readable_size::ReadableSize;
use tracing::warn;

use crate::err::{ResourceExhaustedSnafu, Result};

pub type RequestBudgetRef = Arc<RequestBudget>;

/// [RequestBudget] counts the bytes requested from the remote and refuses
/// a request that would go past the ceiling.
///
/// A refusal resets the counter, so the caller can back off and retry.
#[derive(Debug, Default)]
pub struct RequestBudget {
    ceiling: Option<u64>,
    bytes_read: AtomicU64,
}

impl RequestBudget {
    pub fn new(ceiling: Option<u64>) -> Self {
        Self {
            ceiling,
            bytes_read: AtomicU64::new(0),
        }
    }

    pub fn unlimited() -> Self { Self::new(None) }

    pub fn ceiling(&self) -> Option<u64> { self.ceiling }

    pub fn bytes_read(&self) -> u64 { self.bytes_read.load(Ordering::Acquire) }

    pub fn reset(&self) { self.bytes_read.store(0, Ordering::Release); }

    /// Account for `bytes` about to be requested.
    pub fn charge(&self, bytes: u64) -> Result<()> {
        let Some(ceiling) = self.ceiling else {
            self.bytes_read.fetch_add(bytes, Ordering::AcqRel);
            return Ok(());
        };

        match self
            .bytes_read
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(bytes).filter(|total| *total <= ceiling)
            }) {
            Ok(_) => Ok(()),
            Err(used) => {
                self.reset();
                warn!(
                    "request budget exhausted, want {}, used {} of {}",
                    ReadableSize(bytes),
                    ReadableSize(used),
                    ReadableSize(ceiling)
                );
                ResourceExhaustedSnafu {
                    requested: bytes,
                    used,
                    ceiling,
                }
                .fail()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_never_refuses() {
        let budget = RequestBudget::unlimited();
        budget.charge(u64::MAX / 2).unwrap();
        budget.charge(1 << 40).unwrap();
        assert!(budget.bytes_read() > 1 << 40);
    }

    #[test]
    fn exhaust_and_recover() {
        let budget = RequestBudget::new(Some(100));
        budget.charge(60).unwrap();
        budget.charge(40).unwrap();
        assert_eq!(budget.bytes_read(), 100);

        let err = budget.charge(1).unwrap_err();
        assert!(err.is_resource_exhausted());
        assert_eq!(budget.bytes_read(), 0);

        budget.charge(80).unwrap();
        assert_eq!(budget.bytes_read(), 80);
    }

    #[test]
    fn single_charge_over_ceiling() {
        let budget = RequestBudget::new(Some(10));
        assert!(budget.charge(11).unwrap_err().is_resource_exhausted());
        budget.charge(10).unwrap();
    }
}
