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

use std::io::Write;

use clap::Args;
use httpvfs_utils::readable_size::ReadableSize;
use snafu::{ResultExt, Whatever};
use tracing::debug;

use super::SourceArgs;

/// Bytes asked from the worker per round trip.
const PIECE_SIZE: u64 = 1 << 20;

#[derive(Debug, Clone, Args)]
#[command(long_about = r"

Write a byte range of the remote file to stdout.
Examples:

httpvfs cat https://example.org/db/config.json --offset 4K --length 100 | xxd
")]
pub struct CatArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[arg(long, help = "First byte to print", value_name = "SIZE", default_value = "0")]
    pub offset: ReadableSize,

    #[arg(
        long,
        help = "Number of bytes to print [default: up to the end]",
        value_name = "SIZE"
    )]
    pub length: Option<ReadableSize>,
}

impl CatArgs {
    pub fn run(self) -> Result<(), Whatever> {
        let _guards = self.source.init_logging();
        let worker = self.source.open()?;
        let client = worker.client();
        let total = client
            .stats(None)
            .with_whatever_context(|e| format!("failed to get stats; {}", e))?
            .total_bytes;

        let start = self.offset.as_bytes().min(total);
        let end = match self.length {
            Some(length) => start.saturating_add(length.as_bytes()).min(total),
            None => total,
        };
        debug!("cat {}..{} of {}", start, end, worker.main_filename());

        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        let mut pos = start;
        while pos < end {
            let want = (end - pos).min(PIECE_SIZE) as usize;
            let data = client
                .read(None, pos, want)
                .with_whatever_context(|e| format!("read at {} failed; {}", pos, e))?;
            if data.is_empty() {
                break;
            }
            out.write_all(&data)
                .whatever_context("failed to write to stdout")?;
            pos += data.len() as u64;
        }
        out.flush().whatever_context("failed to write to stdout")?;
        drop(out);

        worker
            .shutdown()
            .with_whatever_context(|e| format!("failed to close the session; {}", e))
    }
}
