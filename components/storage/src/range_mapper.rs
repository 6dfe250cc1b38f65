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

//! Translates logical byte ranges of the remote file into physical
//! (url, byte range) requests.
//!
//! A logical file is either a single remote object, or is split into many
//! equally sized objects named `{prefix}{index}` with the index zero padded.

use std::{cmp::min, ops::Range};

use snafu::ensure;

use crate::err::{InvalidConfigSnafu, InvalidRangeSnafu, Result};

/// One physical request, `range` is half-open and local to `url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchDescriptor {
    pub url: String,
    pub range: Range<u64>,
}

impl FetchDescriptor {
    pub fn len(&self) -> u64 { self.range.end - self.range.start }

    pub fn is_empty(&self) -> bool { self.range.is_empty() }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeMapper {
    Full {
        url: String,
        cache_bust: Option<String>,
    },
    Sharded {
        url_prefix: String,
        server_chunk_size: u64,
        suffix_length: usize,
        cache_bust: Option<String>,
    },
}

impl RangeMapper {
    pub fn full(url: impl Into<String>) -> Self {
        RangeMapper::Full {
            url: url.into(),
            cache_bust: None,
        }
    }

    pub fn sharded(
        url_prefix: impl Into<String>,
        server_chunk_size: u64,
        suffix_length: usize,
    ) -> Result<Self> {
        ensure!(
            server_chunk_size > 0,
            InvalidConfigSnafu {
                reason: "server chunk size must be positive",
            }
        );
        Ok(RangeMapper::Sharded {
            url_prefix: url_prefix.into(),
            server_chunk_size,
            suffix_length,
            cache_bust: None,
        })
    }

    /// Append `?cb={token}` to every physical url.
    pub fn with_cache_bust(mut self, token: Option<String>) -> Self {
        match &mut self {
            RangeMapper::Full { cache_bust, .. } | RangeMapper::Sharded { cache_bust, .. } => {
                *cache_bust = token.filter(|t| !t.is_empty());
            }
        }
        self
    }

    /// The url or url prefix identifying the logical file.
    pub fn id(&self) -> &str {
        match self {
            RangeMapper::Full { url, .. } => url,
            RangeMapper::Sharded { url_prefix, .. } => url_prefix,
        }
    }

    pub fn is_single(&self) -> bool { matches!(self, RangeMapper::Full { .. }) }

    /// The url serving the first byte of the logical file.
    pub fn first_url(&self) -> String {
        match self {
            RangeMapper::Full { url, .. } => format!("{}{}", url, self.suffix()),
            RangeMapper::Sharded { .. } => self.shard_url(0),
        }
    }

    /// Map the logical half-open `range` to physical requests, contiguous and
    /// ascending. A range crossing shard boundaries yields one request per
    /// shard it touches.
    pub fn map(&self, range: Range<u64>) -> Result<Vec<FetchDescriptor>> {
        ensure!(
            range.start < range.end,
            InvalidRangeSnafu {
                start: range.start,
                end: range.end,
            }
        );
        match self {
            RangeMapper::Full { url, .. } => Ok(vec![FetchDescriptor {
                url: format!("{}{}", url, self.suffix()),
                range,
            }]),
            RangeMapper::Sharded {
                server_chunk_size, ..
            } => {
                let shard_size = *server_chunk_size;
                let mut descriptors = Vec::with_capacity(1);
                let mut pos = range.start;
                while pos < range.end {
                    let shard = pos / shard_size;
                    let end = min(range.end, (shard + 1) * shard_size);
                    let local_start = pos % shard_size;
                    descriptors.push(FetchDescriptor {
                        url: self.shard_url(shard),
                        range: local_start..local_start + (end - pos),
                    });
                    pos = end;
                }
                Ok(descriptors)
            }
        }
    }

    fn shard_url(&self, shard: u64) -> String {
        match self {
            RangeMapper::Sharded {
                url_prefix,
                suffix_length,
                ..
            } => format!(
                "{}{:0width$}{}",
                url_prefix,
                shard,
                self.suffix(),
                width = *suffix_length
            ),
            RangeMapper::Full { url, .. } => format!("{}{}", url, self.suffix()),
        }
    }

    fn suffix(&self) -> String {
        match self {
            RangeMapper::Full { cache_bust, .. } | RangeMapper::Sharded { cache_bust, .. } => {
                cache_bust
                    .as_ref()
                    .map(|token| format!("?cb={}", token))
                    .unwrap_or_default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_is_identity() {
        let mapper = RangeMapper::full("https://example.org/db.sqlite3");
        let ds = mapper.map(10..20).unwrap();
        assert_eq!(
            ds,
            vec![FetchDescriptor {
                url: "https://example.org/db.sqlite3".to_string(),
                range: 10..20,
            }]
        );

        let mapper = mapper.with_cache_bust(Some("v2".to_string()));
        assert_eq!(mapper.first_url(), "https://example.org/db.sqlite3?cb=v2");
        assert_eq!(mapper.map(0..1).unwrap()[0].url, "https://example.org/db.sqlite3?cb=v2");
    }

    #[test]
    fn sharded_offsets() {
        let mapper = RangeMapper::sharded("https://example.org/db.sqlite3.", 1000, 3).unwrap();
        let ds = mapper.map(1500..1501).unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(ds[0].url, "https://example.org/db.sqlite3.001");
        assert_eq!(ds[0].range, 500..501);
        assert_eq!(mapper.first_url(), "https://example.org/db.sqlite3.000");
    }

    #[test]
    fn sharded_stitches_across_boundaries() {
        let mapper = RangeMapper::sharded("p", 1000, 2)
            .unwrap()
            .with_cache_bust(Some("x".to_string()));
        let ds = mapper.map(900..3100).unwrap();
        let got: Vec<_> = ds.iter().map(|d| (d.url.as_str(), d.range.clone())).collect();
        assert_eq!(
            got,
            vec![
                ("p00?cb=x", 900..1000),
                ("p01?cb=x", 0..1000),
                ("p02?cb=x", 0..1000),
                ("p03?cb=x", 0..100),
            ]
        );
        let total: u64 = ds.iter().map(|d| d.len()).sum();
        assert_eq!(total, 2200);
    }

    #[test]
    fn rejects_empty_ranges() {
        let mapper = RangeMapper::full("u");
        assert!(mapper.map(5..5).is_err());
        #[allow(clippy::reversed_empty_ranges)]
        let inverted = 6..5;
        assert!(mapper.map(inverted).is_err());
        assert!(RangeMapper::sharded("p", 0, 3).is_err());
    }
}
