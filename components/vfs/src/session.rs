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
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use httpvfs_storage::{
    source::RangeSourceRef, PageRead, RemoteByteStore, RequestBudget, RequestBudgetRef,
};
use httpvfs_utils::readable_size::ReadableSize;
use serde::Serialize;
use snafu::{ensure, OptionExt, ResultExt};
use tracing::{info, warn};

use crate::{
    config::{FileSource, SessionOptions},
    err::{
        AlreadyOpenSnafu, DuplicateFileSnafu, NoFilesSnafu, Result, StorageSnafu, UnknownFileSnafu,
    },
    file::{VirtualFile, VirtualFileRef},
};

static SESSION_OPEN: AtomicBool = AtomicBool::new(false);

/// Held by the open session, releases the process wide slot on drop.
#[derive(Debug)]
struct OpenGuard;

impl OpenGuard {
    fn acquire() -> Result<Self> {
        ensure!(
            SESSION_OPEN
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok(),
            AlreadyOpenSnafu
        );
        Ok(OpenGuard)
    }
}

impl Drop for OpenGuard {
    fn drop(&mut self) { SESSION_OPEN.store(false, Ordering::Release); }
}

/// The numbers a status display polls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    /// Always the main file, whichever file the numbers are for.
    pub filename: String,
    pub total_bytes: u64,
    pub total_fetched_bytes: u64,
    pub total_requests: u64,
}

/// The set of remote files the query engine can open, all drawing from one
/// request budget. Only one session can exist in the process at a time.
#[derive(Debug)]
pub struct Session {
    files: HashMap<String, VirtualFileRef>,
    order: Vec<String>,
    main: String,
    budget: RequestBudgetRef,
    _guard: OpenGuard,
}

impl Session {
    pub fn open(
        files: Vec<FileSource>,
        options: SessionOptions,
        source: RangeSourceRef,
    ) -> Result<Self> {
        let guard = OpenGuard::acquire()?;
        ensure!(!files.is_empty(), NoFilesSnafu);

        let budget = Arc::new(RequestBudget::new(options.max_bytes_to_read));
        let mut opened = HashMap::with_capacity(files.len());
        let mut order = Vec::with_capacity(files.len());
        for file in files {
            let file = file.hydrate(source.as_ref())?;
            info!(
                "constructing remote file {}, filename: {}",
                file.config.id(),
                file.filename
            );
            ensure!(
                !opened.contains_key(&file.filename),
                DuplicateFileSnafu {
                    name: file.filename.as_str(),
                }
            );

            let store = RemoteByteStore::open(
                file.config.store_config(&options),
                file.config.range_mapper()?,
                source.clone(),
                budget.clone(),
            )
            .context(StorageSnafu)?;
            info!(
                "{} opened, length: {}",
                file.filename,
                ReadableSize(store.length())
            );
            order.push(file.filename.clone());
            opened.insert(file.filename.clone(), Arc::new(VirtualFile::new(file.filename, store)));
        }

        let main = match options.main_filename {
            Some(name) => name,
            None => order[0].clone(),
        };
        ensure!(
            opened.contains_key(&main),
            UnknownFileSnafu {
                name: main.as_str(),
            }
        );

        Ok(Session {
            files: opened,
            order,
            main,
            budget,
            _guard: guard,
        })
    }

    pub fn main_filename(&self) -> &str { &self.main }

    /// Filenames in the order they were configured.
    pub fn filenames(&self) -> impl Iterator<Item = &str> { self.order.iter().map(|s| s.as_str()) }

    pub fn budget(&self) -> &RequestBudgetRef { &self.budget }

    /// Look up a file by name, `None` is the main file.
    pub fn file(&self, name: Option<&str>) -> Result<&VirtualFileRef> {
        let name = name.unwrap_or(&self.main);
        self.files.get(name).context(UnknownFileSnafu { name })
    }

    pub fn read(&self, name: Option<&str>, position: u64, buf: &mut [u8]) -> Result<usize> {
        self.file(name)?.read_at(position, buf)
    }

    /// Compare the engine's page size with the chunk size of the main file.
    /// A mismatch still works but every page read may touch two chunks.
    pub fn check_page_size(&self, page_size: usize) -> Result<bool> {
        let chunk_size = self.file(None)?.chunk_size();
        if page_size != chunk_size {
            warn!(
                "chunk size does not match page size: page_size = {} but chunk size = {}",
                page_size, chunk_size
            );
            return Ok(false);
        }
        Ok(true)
    }

    pub fn stats(&self, name: Option<&str>) -> Result<SessionStats> {
        let counters = self.file(name)?.counters()?;
        Ok(SessionStats {
            filename: self.main.clone(),
            total_bytes: counters.total_bytes,
            total_fetched_bytes: counters.total_fetched_bytes,
            total_requests: counters.total_requests,
        })
    }

    /// Take the page read log of a file, leaving it empty.
    pub fn reset_accessed_pages(&self, name: Option<&str>) -> Result<Vec<PageRead>> {
        self.file(name)?.drain_page_reads()
    }
}

/// Tests opening sessions run one at a time.
#[cfg(test)]
pub(crate) fn session_test_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|e| e.into_inner())
}
