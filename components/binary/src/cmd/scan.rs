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

use std::time::Instant;

use clap::Args;
use httpvfs_storage::PageRead;
use httpvfs_utils::readable_size::ReadableSize;
use snafu::{ResultExt, Whatever};
use tracing::info;

use super::SourceArgs;

#[derive(Debug, Clone, Args)]
#[command(long_about = r"

Read the whole remote file page by page, the way a query engine scans a
table, then print the request statistics and a summary of the page reads.
Examples:

httpvfs scan https://example.org/db/config.json --page-size 4K
")]
pub struct ScanArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[arg(
        long,
        help = "Page size of the reader, should match the chunk size",
        value_name = "SIZE",
        default_value = "4K"
    )]
    pub page_size: ReadableSize,
}

/// Totals over a page read log.
#[derive(Debug, Default, PartialEq, Eq)]
struct PageSummary {
    pages: usize,
    cached: usize,
    fetched: usize,
    prefetched: usize,
}

impl PageSummary {
    fn of(reads: &[PageRead]) -> Self {
        reads.iter().fold(PageSummary::default(), |mut s, r| {
            s.pages += 1;
            if r.was_cached {
                s.cached += 1;
            } else {
                s.fetched += 1;
                s.prefetched += r.prefetch;
            }
            s
        })
    }
}

impl ScanArgs {
    pub fn run(self) -> Result<(), Whatever> {
        let _guards = self.source.init_logging();
        let worker = self.source.open()?;
        let client = worker.client();
        let page_size = self.page_size.as_bytes_usize().max(1);
        client
            .check_page_size(page_size)
            .with_whatever_context(|e| format!("failed to check the page size; {}", e))?;

        let total = client
            .stats(None)
            .with_whatever_context(|e| format!("failed to get stats; {}", e))?
            .total_bytes;
        let started = Instant::now();
        let mut pos = 0;
        while pos < total {
            let data = client
                .read(None, pos, page_size)
                .with_whatever_context(|e| format!("read at {} failed; {}", pos, e))?;
            if data.is_empty() {
                break;
            }
            pos += data.len() as u64;
        }
        info!("scanned {} in {:?}", ReadableSize(pos), started.elapsed());

        let stats = client
            .stats(None)
            .with_whatever_context(|e| format!("failed to get stats; {}", e))?;
        let pages = client
            .reset_accessed_pages(None)
            .with_whatever_context(|e| format!("failed to get the page reads; {}", e))?;
        let summary = PageSummary::of(&pages);

        println!("file:       {}", stats.filename);
        println!("size:       {}", ReadableSize(stats.total_bytes));
        println!("fetched:    {}", ReadableSize(stats.total_fetched_bytes));
        println!("requests:   {}", stats.total_requests);
        println!(
            "page reads: {} ({} cached, {} fetched with {} pages read ahead)",
            summary.pages, summary.cached, summary.fetched, summary.prefetched
        );
        worker
            .shutdown()
            .with_whatever_context(|e| format!("failed to close the session; {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarize_page_reads() {
        let reads = [
            PageRead {
                chunk_index: 0,
                was_cached: false,
                prefetch: 0,
            },
            PageRead {
                chunk_index: 1,
                was_cached: false,
                prefetch: 1,
            },
            PageRead {
                chunk_index: 2,
                was_cached: true,
                prefetch: 0,
            },
        ];
        assert_eq!(
            PageSummary::of(&reads),
            PageSummary {
                pages: 3,
                cached: 1,
                fetched: 2,
                prefetched: 1,
            }
        );
    }
}
