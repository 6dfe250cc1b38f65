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

//! The remote byte store: reads at any offset and length are served from the
//! chunk cache, misses are fetched in windows chosen by the read-ahead
//! predictor.

use std::{cmp::min, ops::Range};

use bytes::{Bytes, BytesMut};
use httpvfs_common::{
    cal_chunk_idx, cal_chunk_offset, ChunkIndex, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_READ_HEADS,
    DEFAULT_MAX_READ_SPEED,
};
use httpvfs_utils::readable_size::ReadableSize;
use serde::{Deserialize, Serialize};
use snafu::{ensure, OptionExt};
use tracing::{debug, warn};

use crate::{
    budget::RequestBudgetRef,
    chunk_cache::ChunkCache,
    err::{
        BufferTooSmallSnafu, FetchIncompleteSnafu, InvalidConfigSnafu, InvalidRangeSnafu,
        LengthUnknownSnafu, ReadPastEndSnafu, Result,
    },
    predictor::{ReadAheadPredictor, ReadHead},
    probe::{resolve_length, ServerCapabilities},
    range_mapper::RangeMapper,
    read_log::{PageRead, PageReadLog},
    source::RangeSourceRef,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// The caching granularity, should equal the page size of the database.
    pub chunk_size: usize,
    /// Skips length discovery when set, required when the server hides it.
    pub file_length: Option<u64>,
    /// How many sequential streams are tracked at once.
    pub max_read_heads: usize,
    /// The largest single fetch of a sequential stream.
    pub max_read_speed: ReadableSize,
    /// Record chunk accesses into the page read log.
    pub log_page_reads: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            file_length: None,
            max_read_heads: DEFAULT_MAX_READ_HEADS,
            max_read_speed: ReadableSize(DEFAULT_MAX_READ_SPEED),
            log_page_reads: false,
        }
    }
}

impl StoreConfig {
    /// The read speed expressed in chunks, at least one.
    pub fn max_speed_chunks(&self) -> usize {
        let chunks = self.max_read_speed.as_bytes() as f64 / self.chunk_size as f64;
        (chunks.round() as usize).max(1)
    }
}

/// Counters exposed for status displays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounters {
    pub total_bytes: u64,
    pub total_fetched_bytes: u64,
    pub total_requests: u64,
    pub cached_chunks: usize,
    pub cached_bytes: usize,
}

#[derive(Debug)]
pub struct RemoteByteStore {
    chunk_size: usize,
    length: u64,
    capabilities: ServerCapabilities,
    mapper: RangeMapper,
    source: RangeSourceRef,
    budget: RequestBudgetRef,
    cache: ChunkCache,
    predictor: ReadAheadPredictor,
    read_log: PageReadLog,
    total_fetched_bytes: u64,
    total_requests: u64,
}

impl RemoteByteStore {
    /// Probe the remote and build the store. Fails if the length can't be
    /// settled or the remote refuses the probe.
    pub fn open(
        config: StoreConfig,
        mapper: RangeMapper,
        source: RangeSourceRef,
        budget: RequestBudgetRef,
    ) -> Result<Self> {
        ensure!(
            config.chunk_size > 0,
            InvalidConfigSnafu {
                reason: "chunk size must be positive",
            }
        );
        ensure!(
            config.max_read_heads > 0,
            InvalidConfigSnafu {
                reason: "at least one read head is required",
            }
        );

        // a HEAD on the first shard only reports the size of that shard
        if matches!(mapper, RangeMapper::Sharded { .. }) {
            ensure!(
                config.file_length.is_some(),
                LengthUnknownSnafu {
                    url: mapper.id().to_string(),
                }
            );
        }

        let (length, capabilities) =
            resolve_length(source.as_ref(), &mapper.first_url(), config.file_length)?;
        debug!(
            "open remote store {}, length: {}, chunk size: {}, max speed: {} chunks",
            mapper.id(),
            ReadableSize(length),
            ReadableSize(config.chunk_size as u64),
            config.max_speed_chunks(),
        );

        Ok(Self {
            chunk_size: config.chunk_size,
            length,
            capabilities,
            predictor: ReadAheadPredictor::new(config.max_speed_chunks(), config.max_read_heads),
            cache: ChunkCache::new(config.chunk_size),
            read_log: PageReadLog::new(config.log_page_reads),
            mapper,
            source,
            budget,
            total_fetched_bytes: 0,
            total_requests: 0,
        })
    }

    pub fn length(&self) -> u64 { self.length }

    pub fn chunk_size(&self) -> usize { self.chunk_size }

    pub fn mapper(&self) -> &RangeMapper { &self.mapper }

    pub fn capabilities(&self) -> ServerCapabilities { self.capabilities }

    pub fn counters(&self) -> StoreCounters {
        StoreCounters {
            total_bytes: self.length,
            total_fetched_bytes: self.total_fetched_bytes,
            total_requests: self.total_requests,
            cached_chunks: self.cache.len(),
            cached_bytes: self.cache.resident_bytes(),
        }
    }

    pub fn read_heads(&self) -> Vec<ReadHead> { self.predictor.heads().copied().collect() }

    pub fn page_reads(&self) -> &[PageRead] { self.read_log.entries() }

    pub fn drain_page_reads(&mut self) -> Vec<PageRead> { self.read_log.drain() }

    /// Copy `[start, start + length)` of the remote file into
    /// `buf[out_offset..]` and return the number of bytes copied.
    ///
    /// The read is clipped at the end of the file, a read starting at or past
    /// the end copies nothing. On error the content of `buf` is unspecified.
    pub fn copy_into(
        &mut self,
        buf: &mut [u8],
        out_offset: usize,
        length: usize,
        start: u64,
    ) -> Result<usize> {
        if start >= self.length {
            return Ok(0);
        }
        let length = min(length as u64, self.length - start) as usize;
        ensure!(
            out_offset + length <= buf.len(),
            BufferTooSmallSnafu {
                needed: out_offset + length,
                capacity: buf.len(),
            }
        );

        let mut copied = 0;
        while copied < length {
            let pos = start + copied as u64;
            let chunk_idx = cal_chunk_idx(pos, self.chunk_size);
            let chunk_offset = cal_chunk_offset(pos, self.chunk_size);
            let wanted = min(self.chunk_size - chunk_offset, length - copied);

            let chunk = self.get_chunk(chunk_idx)?;
            // a chunk may come up short when the server sent less than asked
            let n = min(wanted, chunk.len().saturating_sub(chunk_offset));
            ensure!(n > 0, FetchIncompleteSnafu { chunk: chunk_idx });

            let out = out_offset + copied;
            buf[out..out + n].copy_from_slice(&chunk[chunk_offset..chunk_offset + n]);
            copied += n;
        }
        Ok(length)
    }

    /// Fill `dst` from `offset`, see [Self::copy_into].
    pub fn read_at(&mut self, offset: u64, dst: &mut [u8]) -> Result<usize> {
        let len = dst.len();
        self.copy_into(dst, 0, len, offset)
    }

    fn get_chunk(&mut self, idx: ChunkIndex) -> Result<Bytes> {
        let was_cached = self.cache.contains(idx);
        let mut prefetch = 0;
        if !was_cached {
            let head = self.predictor.predict(idx);
            let last_chunk = cal_chunk_idx(self.length - 1, self.chunk_size);
            let window = head.start_chunk..min(head.window().end, last_chunk + 1);
            prefetch = window.len() - 1;

            let bytes = self.chunk_size as u64;
            let range = window.start as u64 * bytes..min(window.end as u64 * bytes, self.length);
            let data = self.fetch(range)?;
            self.cache.fill(window.start, data);
        }

        let chunk = self
            .cache
            .get(idx)
            .cloned()
            .context(FetchIncompleteSnafu { chunk: idx })?;
        self.read_log.record(idx, was_cached, prefetch);
        Ok(chunk)
    }

    /// Fetch the logical `range`, stitching the physical pieces together.
    fn fetch(&mut self, range: Range<u64>) -> Result<Bytes> {
        ensure!(
            range.start < range.end,
            InvalidRangeSnafu {
                start: range.start,
                end: range.end,
            }
        );
        ensure!(
            range.end <= self.length,
            ReadPastEndSnafu {
                end: range.end,
                length: self.length,
            }
        );

        let wanted = range.end - range.start;
        self.budget.charge(wanted)?;
        debug!(
            "fetch {} @ {} of {}",
            ReadableSize(wanted),
            ReadableSize(range.start),
            self.mapper.id()
        );

        let whole_file = self.mapper.is_single() && range.start == 0 && range.end == self.length;
        let descriptors = self.mapper.map(range)?;
        let mut pieces = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            self.total_requests += 1;
            self.total_fetched_bytes += descriptor.len();

            let mut data =
                self.source
                    .get_range(&descriptor.url, descriptor.range.clone(), !whole_file)?;
            let expected = descriptor.len() as usize;
            if data.len() > expected {
                warn!(
                    "{} sent {} for a {} range request, the range was probably ignored",
                    descriptor.url,
                    ReadableSize(data.len() as u64),
                    ReadableSize(expected as u64),
                );
                data.truncate(expected);
            }
            let short = data.len() < expected;
            pieces.push(data);
            if short {
                // bytes after a gap would land on the wrong chunks
                break;
            }
        }

        if pieces.len() == 1 {
            return Ok(pieces.swap_remove(0));
        }
        let mut stitched = BytesMut::with_capacity(wanted as usize);
        for piece in pieces {
            stitched.extend_from_slice(&piece);
        }
        Ok(stitched.freeze())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use httpvfs_utils::logger::install_fmt_log;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;
    use crate::{budget::RequestBudget, err::Error, source::MemorySource};

    const URL: &str = "https://example.org/db.sqlite3";

    fn random_file(len: usize) -> Vec<u8> {
        let mut data = vec![0u8; len];
        StdRng::seed_from_u64(len as u64).fill(data.as_mut_slice());
        data
    }

    fn open_store(
        data: &[u8],
        config: StoreConfig,
        budget: Option<u64>,
    ) -> (RemoteByteStore, Arc<MemorySource>) {
        let source = Arc::new(MemorySource::new().with_object(URL, data.to_vec()));
        let store = RemoteByteStore::open(
            config,
            RangeMapper::full(URL),
            source.clone(),
            Arc::new(RequestBudget::new(budget)),
        )
        .unwrap();
        (store, source)
    }

    fn config(chunk_size: usize) -> StoreConfig {
        StoreConfig {
            chunk_size,
            log_page_reads: true,
            ..Default::default()
        }
    }

    #[test]
    fn read_whole_small_file() {
        install_fmt_log();
        let data = random_file(10_000);
        let (mut store, source) = open_store(&data, config(4096), None);
        assert_eq!(store.length(), 10_000);

        let mut buf = vec![0u8; 10_000];
        assert_eq!(store.copy_into(&mut buf, 0, 10_000, 0).unwrap(), 10_000);
        assert_eq!(buf, data);

        // chunk 0 alone, then 1..3 as the head ramps to speed 2
        assert_eq!(source.request_count(), 2);
        assert_eq!(store.cache.len(), 3);
        assert_eq!(store.cache.get(2).unwrap().len(), 1808);

        let pages: Vec<_> = store.page_reads().iter().map(|r| r.chunk_index).collect();
        assert_eq!(pages, vec![0, 1, 2]);
        assert!(!store.page_reads()[0].was_cached);
        assert_eq!(store.page_reads()[1].prefetch, 1);
        assert!(store.page_reads()[2].was_cached);
    }

    #[test]
    fn bytes_match_reference_everywhere() {
        let data = random_file(50_000);
        let (mut store, _) = open_store(&data, config(1024), None);
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..500 {
            let start = rng.gen_range(0..data.len() + 100) as u64;
            let length = rng.gen_range(0..5000);
            let out_offset = rng.gen_range(0..16);
            let mut buf = vec![0u8; out_offset + length];
            let n = store.copy_into(&mut buf, out_offset, length, start).unwrap();

            let expected = length.min(data.len().saturating_sub(start as usize));
            assert_eq!(n, expected);
            if n > 0 {
                let s = start as usize;
                assert_eq!(&buf[out_offset..out_offset + n], &data[s..s + n]);
            }
        }
    }

    #[test]
    fn second_read_is_a_full_cache_hit() {
        let data = random_file(100_000);
        let (mut store, source) = open_store(&data, config(4096), None);
        let mut first = vec![0u8; 30_000];
        store.read_at(12_345, &mut first).unwrap();
        let requests = source.request_count();
        let counters = store.counters();

        let mut second = vec![0u8; 30_000];
        store.read_at(12_345, &mut second).unwrap();
        assert_eq!(first, second);
        assert_eq!(source.request_count(), requests);
        assert_eq!(store.counters(), counters);
    }

    #[test]
    fn reads_past_end() {
        let data = random_file(100);
        let (mut store, source) = open_store(&data, config(64), None);
        let mut buf = vec![0u8; 10];
        assert_eq!(store.copy_into(&mut buf, 0, 10, 100).unwrap(), 0);
        assert_eq!(store.copy_into(&mut buf, 0, 10, 1000).unwrap(), 0);
        assert_eq!(store.copy_into(&mut buf, 0, 10, 95).unwrap(), 5);
        assert_eq!(&buf[..5], &data[95..]);
        assert_eq!(store.copy_into(&mut buf, 0, 0, 0).unwrap(), 0);
        assert_eq!(source.request_count(), 1);
    }

    #[test]
    fn small_buffer_is_rejected() {
        let data = random_file(100);
        let (mut store, _) = open_store(&data, config(64), None);
        let mut buf = vec![0u8; 10];
        assert!(matches!(
            store.copy_into(&mut buf, 5, 10, 0),
            Err(Error::BufferTooSmall { .. })
        ));
    }

    #[test]
    fn sequential_scan_ramps_up() {
        let chunk = 1024;
        let data = random_file(chunk * 300);
        let cfg = StoreConfig {
            max_read_speed: ReadableSize((chunk * 32) as u64),
            ..config(chunk)
        };
        let (mut store, source) = open_store(&data, cfg, None);
        let mut buf = vec![0u8; chunk];
        for page in 0..300u64 {
            store.read_at(page * chunk as u64, &mut buf).unwrap();
        }

        let sizes: Vec<u64> = source
            .requests()
            .iter()
            .map(|(_, r)| r.end - r.start)
            .map(|len| len / chunk as u64)
            .collect();
        assert_eq!(&sizes[..7], &[1, 2, 4, 8, 16, 32, 32]);
        assert!(sizes.iter().all(|s| *s <= 32));
        assert_eq!(sizes.iter().sum::<u64>(), 300);
        assert_eq!(store.read_heads().len(), 1);
        assert_eq!(store.counters().total_fetched_bytes, data.len() as u64);
    }

    #[test]
    fn whole_file_window_is_not_ranged() {
        // one chunk covers the file, mimic a server that never honors ranges
        let source = Arc::new(MemorySource::new().with_object(URL, b"tiny".to_vec()));
        let mut store = RemoteByteStore::open(
            config(4096),
            RangeMapper::full(URL),
            source.clone(),
            Arc::new(RequestBudget::unlimited()),
        )
        .unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(store.read_at(0, &mut buf).unwrap(), 4);
        assert_eq!(&buf, b"tiny");
    }

    #[test]
    fn budget_exhaustion_aborts_and_recovers() {
        let data = random_file(8192);
        let (mut store, source) = open_store(&data, config(1024), Some(4096));
        let mut buf = vec![0u8; 1024];
        store.read_at(0, &mut buf).unwrap();
        store.read_at(1024, &mut buf).unwrap();
        assert_eq!(store.budget.bytes_read(), 1024 + 2048);
        // the third fetch would go past the ceiling
        let err = store.read_at(3 * 1024, &mut buf).unwrap_err();
        assert!(err.is_resource_exhausted());
        assert_eq!(store.budget.bytes_read(), 0);
        assert_eq!(source.request_count(), 2);

        // the failed prediction left a fast head behind, the retry starts a new one
        store.read_at(3 * 1024, &mut buf).unwrap();
        assert_eq!(&buf[..], &data[3 * 1024..4 * 1024]);
    }

    #[test]
    fn sharded_file_spanning_shards() {
        install_fmt_log();
        let data = random_file(10_000);
        let source = Arc::new(MemorySource::new());
        for (i, shard) in data.chunks(3000).enumerate() {
            source.insert(format!("https://example.org/db.{:03}", i), shard.to_vec());
        }
        let mapper = RangeMapper::sharded("https://example.org/db.", 3000, 3).unwrap();
        let cfg = StoreConfig {
            file_length: Some(10_000),
            ..config(1000)
        };
        let mut store = RemoteByteStore::open(
            cfg,
            mapper,
            source.clone(),
            Arc::new(RequestBudget::unlimited()),
        )
        .unwrap();

        let mut buf = vec![0u8; 10_000];
        assert_eq!(store.read_at(0, &mut buf).unwrap(), 10_000);
        assert_eq!(buf, data);
        assert!(source
            .requests()
            .iter()
            .any(|(url, _)| url.ends_with(".003")));
        // windows 3..7 and 7..10 each cross a shard boundary
        assert_eq!(source.request_count(), 6);
        assert_eq!(store.counters().total_requests, 6);
        assert_eq!(store.counters().total_fetched_bytes, 10_000);
    }

    #[test]
    fn shard_lengths_need_config() {
        let source = Arc::new(MemorySource::new().without_content_length());
        source.insert("p.0", vec![0u8; 10]);
        let err = RemoteByteStore::open(
            config(4),
            RangeMapper::sharded("p.", 10, 1).unwrap(),
            source,
            Arc::new(RequestBudget::unlimited()),
        )
        .unwrap_err();
        assert!(matches!(err, Error::LengthUnknown { .. }));
    }

    #[test]
    fn shard_size_is_not_taken_as_file_length() {
        let data = random_file(10_000);
        let source = Arc::new(MemorySource::new());
        for (i, shard) in data.chunks(3000).enumerate() {
            source.insert(format!("https://example.org/db.{:03}", i), shard.to_vec());
        }
        let err = RemoteByteStore::open(
            config(1000),
            RangeMapper::sharded("https://example.org/db.", 3000, 3).unwrap(),
            source.clone(),
            Arc::new(RequestBudget::unlimited()),
        )
        .unwrap_err();
        assert!(matches!(err, Error::LengthUnknown { .. }));
        assert_eq!(source.head_count(), 0);
    }

    #[test]
    fn short_response_is_an_error() {
        // the server holds fewer bytes than the configured length
        let source = Arc::new(MemorySource::new().with_object(URL, vec![7u8; 1500]));
        let cfg = StoreConfig {
            file_length: Some(4000),
            ..config(1000)
        };
        let mut store = RemoteByteStore::open(
            cfg,
            RangeMapper::full(URL),
            source,
            Arc::new(RequestBudget::unlimited()),
        )
        .unwrap();
        let mut buf = vec![0u8; 1000];
        assert_eq!(store.read_at(0, &mut buf).unwrap(), 1000);
        let err = store.read_at(1000, &mut buf).unwrap_err();
        assert!(matches!(err, Error::FetchIncomplete { chunk: 1, .. }));
    }

    #[test]
    fn max_speed_in_chunks() {
        let cfg = StoreConfig::default();
        assert_eq!(cfg.max_speed_chunks(), 1280);
        let cfg = StoreConfig {
            chunk_size: 1 << 20,
            max_read_speed: ReadableSize::kb(1),
            ..Default::default()
        };
        assert_eq!(cfg.max_speed_chunks(), 1);
    }
}
