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

pub const HTTPVFS: &str = "httpvfs";

// The default sqlite page size.
pub const DEFAULT_CHUNK_SIZE: usize = 4 << 10; // 4 KiB

// The largest window a single read head may fetch at once.
pub const DEFAULT_MAX_READ_SPEED: u64 = 5 << 20; // 5 MiB

pub const DEFAULT_MAX_READ_HEADS: usize = 3;

// The environment variable holding the log filter directives.
pub const LOG_ENV: &str = "HTTPVFS_LOG";
// The environment variable holding the default request budget in bytes.
pub const MAX_BYTES_ENV: &str = "HTTPVFS_MAX_BYTES";

pub fn cal_chunk_idx(offset: u64, chunk_size: usize) -> ChunkIndex {
    (offset / chunk_size as u64) as ChunkIndex
}

pub fn cal_chunk_offset(offset: u64, chunk_size: usize) -> ChunkOffset {
    (offset % chunk_size as u64) as ChunkOffset
}

pub type ChunkIndex = usize;
pub type ChunkOffset = usize;
pub type ChunkSize = usize;
pub type FileOffset = u64;
