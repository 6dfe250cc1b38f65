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

use std::{
    io::{self, Read, Seek, SeekFrom},
    sync::{Arc, Mutex, MutexGuard},
};

use httpvfs_storage::{PageRead, RemoteByteStore, StoreCounters};
use snafu::{OptionExt, ResultExt};
use tracing::{debug, instrument};

use crate::err::{Errno, LibcSnafu, PoisonedSnafu, Result, StorageSnafu, ToErrno};

pub type VirtualFileRef = Arc<VirtualFile>;

/// A read-only file as the query engine sees it, backed by a remote byte
/// store.
#[derive(Debug)]
pub struct VirtualFile {
    name: String,
    length: u64,
    chunk_size: usize,
    store: Mutex<RemoteByteStore>,
}

impl VirtualFile {
    pub fn new(name: impl Into<String>, store: RemoteByteStore) -> Self {
        Self {
            name: name.into(),
            length: store.length(),
            chunk_size: store.chunk_size(),
            store: Mutex::new(store),
        }
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn size(&self) -> u64 { self.length }

    pub fn chunk_size(&self) -> usize { self.chunk_size }

    /// The engine's read callback: copy `length` bytes at `position` into
    /// `buf[offset..]`.
    #[instrument(skip(self, buf), fields(file = %self.name))]
    pub fn read_into(
        &self,
        buf: &mut [u8],
        offset: usize,
        length: usize,
        position: u64,
    ) -> Result<usize> {
        self.lock()?
            .copy_into(buf, offset, length, position)
            .context(StorageSnafu)
    }

    pub fn read_at(&self, position: u64, buf: &mut [u8]) -> Result<usize> {
        let length = buf.len();
        self.read_into(buf, 0, length, position)
    }

    /// [Self::read_into] for callers that speak errno.
    pub fn read_errno(
        &self,
        buf: &mut [u8],
        offset: usize,
        length: usize,
        position: u64,
    ) -> std::result::Result<usize, Errno> {
        self.read_into(buf, offset, length, position).map_err(|e| {
            debug!("read of {} failed: {}", self.name, e);
            e.to_errno()
        })
    }

    pub fn write(&self, _position: u64, _data: &[u8]) -> Result<usize> {
        LibcSnafu { errno: libc::EROFS }.fail()
    }

    pub fn truncate(&self, _length: u64) -> Result<()> { LibcSnafu { errno: libc::EROFS }.fail() }

    pub fn counters(&self) -> Result<StoreCounters> { Ok(self.lock()?.counters()) }

    pub fn drain_page_reads(&self) -> Result<Vec<PageRead>> { Ok(self.lock()?.drain_page_reads()) }

    /// A cursor reading from the start of the file.
    pub fn cursor(self: &Arc<Self>) -> FileCursor {
        FileCursor {
            file: self.clone(),
            pos: 0,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, RemoteByteStore>> {
        self.store.lock().ok().context(PoisonedSnafu {
            name: self.name.as_str(),
        })
    }
}

/// [Read] and [Seek] over a [VirtualFile].
#[derive(Debug, Clone)]
pub struct FileCursor {
    file: VirtualFileRef,
    pos: u64,
}

impl FileCursor {
    pub fn position(&self) -> u64 { self.pos }
}

impl Read for FileCursor {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self
            .file
            .read_at(self.pos, buf)
            .map_err(|e| io::Error::from_raw_os_error(e.to_errno()))?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for FileCursor {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(delta) => self.file.size().checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        let Some(target) = target else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            ));
        };
        self.pos = target;
        Ok(target)
    }
}
