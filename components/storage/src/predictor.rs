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

//! Multi-head read-ahead.
//!
//! Each [ReadHead] is a guess that some cursor scans the file sequentially.
//! A miss that lands in the window right after a head's last fetch advances
//! that head and doubles its window, up to `max_speed` chunks. Any other miss
//! starts a fresh head fetching a single chunk. Heads live in an LRU list,
//! so a few interleaved scans can each ramp up on their own while random
//! access only ever fetches one chunk at a time.

use std::{cmp::min, collections::VecDeque, ops::Range};

use httpvfs_common::ChunkIndex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReadHead {
    /// First chunk of the last fetch.
    pub start_chunk: ChunkIndex,
    /// Chunks fetched by the last fetch.
    pub speed: usize,
}

impl ReadHead {
    pub fn window(&self) -> Range<ChunkIndex> { self.start_chunk..self.start_chunk + self.speed }
}

#[derive(Debug)]
pub struct ReadAheadPredictor {
    // most recently used first
    heads: VecDeque<ReadHead>,
    max_speed: usize,
    max_heads: usize,
}

impl ReadAheadPredictor {
    pub fn new(max_speed: usize, max_heads: usize) -> Self {
        let max_heads = max_heads.max(1);
        Self {
            heads: VecDeque::with_capacity(max_heads + 1),
            max_speed: max_speed.max(1),
            max_heads,
        }
    }

    pub fn max_speed(&self) -> usize { self.max_speed }

    pub fn heads(&self) -> impl Iterator<Item = &ReadHead> { self.heads.iter() }

    /// Pick the head serving a miss on `wanted` and move it. The returned
    /// head's window always contains `wanted`; it is not clipped to the file.
    pub fn predict(&mut self, wanted: ChunkIndex) -> ReadHead {
        let max_speed = self.max_speed;
        let matched = self.heads.iter().position(|head| {
            let next_start = head.start_chunk + head.speed;
            let next_speed = min(max_speed, head.speed * 2);
            (next_start..next_start + next_speed).contains(&wanted)
        });

        if let Some(mut head) = matched.and_then(|i| self.heads.remove(i)) {
            head.start_chunk += head.speed;
            head.speed = min(max_speed, head.speed * 2);
            self.heads.push_front(head);
            return head;
        }

        let head = ReadHead {
            start_chunk: wanted,
            speed: 1,
        };
        self.heads.push_front(head);
        self.heads.truncate(self.max_heads);
        head
    }
}
