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

//! The session lives on its own thread, where blocking on the network stalls
//! nobody else. Other threads reach it through a [handoff](crate::handoff).

use std::{
    cmp::min,
    thread::{self, JoinHandle},
};

use httpvfs_storage::{source::RangeSourceRef, PageRead};
use snafu::{Report, ResultExt};
use tracing::{debug, error};

use crate::{
    config::{FileSource, SessionOptions},
    err::{
        Errno, HandoffClosedSnafu, RemoteSnafu, Result, SpawnWorkerSnafu, ToErrno,
        UnexpectedReplySnafu,
    },
    handoff::{self, HandoffClient, HandoffServer},
    session::{Session, SessionStats},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreRequest {
    Read {
        file: Option<String>,
        position: u64,
        length: usize,
    },
    Stats {
        file: Option<String>,
    },
    ResetAccessedPages {
        file: Option<String>,
    },
    CheckPageSize {
        page_size: usize,
    },
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreResponse {
    Data(Vec<u8>),
    Stats(SessionStats),
    PageReads(Vec<PageRead>),
    PageSizeMatches(bool),
    Stopped,
    Failed { message: String, errno: Errno },
}

/// Talks to the store worker, cheap to clone and share between threads.
#[derive(Clone)]
pub struct StoreClient {
    inner: HandoffClient<StoreRequest, StoreResponse>,
}

impl StoreClient {
    /// Read up to `length` bytes at `position`, fewer at the end of the file.
    pub fn read(&self, file: Option<&str>, position: u64, length: usize) -> Result<Vec<u8>> {
        match self.call(StoreRequest::Read {
            file: file.map(String::from),
            position,
            length,
        })? {
            StoreResponse::Data(data) => Ok(data),
            other => unexpected(other),
        }
    }

    pub fn stats(&self, file: Option<&str>) -> Result<SessionStats> {
        match self.call(StoreRequest::Stats {
            file: file.map(String::from),
        })? {
            StoreResponse::Stats(stats) => Ok(stats),
            other => unexpected(other),
        }
    }

    pub fn reset_accessed_pages(&self, file: Option<&str>) -> Result<Vec<PageRead>> {
        match self.call(StoreRequest::ResetAccessedPages {
            file: file.map(String::from),
        })? {
            StoreResponse::PageReads(pages) => Ok(pages),
            other => unexpected(other),
        }
    }

    pub fn check_page_size(&self, page_size: usize) -> Result<bool> {
        match self.call(StoreRequest::CheckPageSize { page_size })? {
            StoreResponse::PageSizeMatches(matches) => Ok(matches),
            other => unexpected(other),
        }
    }

    fn call(&self, request: StoreRequest) -> Result<StoreResponse> {
        match self.inner.call(request)? {
            StoreResponse::Failed { message, errno } => RemoteSnafu { message, errno }.fail(),
            resp => Ok(resp),
        }
    }
}

fn unexpected<T>(reply: StoreResponse) -> Result<T> {
    UnexpectedReplySnafu {
        reply: format!("{:?}", reply),
    }
    .fail()
}

/// Owns the thread running the session.
pub struct StoreWorker {
    client: StoreClient,
    main_filename: String,
    handle: Option<JoinHandle<()>>,
}

impl StoreWorker {
    /// Start the worker and open the session on it. Returns once the session
    /// is open, or with the error that kept it from opening.
    pub fn spawn(
        files: Vec<FileSource>,
        options: SessionOptions,
        source: RangeSourceRef,
    ) -> Result<Self> {
        let (client, server) = handoff::channel();
        let (opened_tx, opened_rx) = crossbeam_channel::bounded(1);
        let handle = thread::Builder::new()
            .name("httpvfs-store".to_string())
            .spawn(move || match Session::open(files, options, source) {
                Ok(session) => {
                    let _ = opened_tx.send(Ok(session.main_filename().to_string()));
                    serve(session, server);
                }
                Err(e) => {
                    let _ = opened_tx.send(Err(e));
                }
            })
            .context(SpawnWorkerSnafu)?;

        let opened = opened_rx.recv();
        let main_filename = match opened {
            Ok(Ok(name)) => name,
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                let _ = handle.join();
                return HandoffClosedSnafu.fail();
            }
        };
        debug!("store worker serving {}", main_filename);

        Ok(StoreWorker {
            client: StoreClient { inner: client },
            main_filename,
            handle: Some(handle),
        })
    }

    pub fn client(&self) -> StoreClient { self.client.clone() }

    pub fn main_filename(&self) -> &str { &self.main_filename }

    /// Stop the worker and close the session.
    pub fn shutdown(mut self) -> Result<()> { self.stop() }

    fn stop(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        let resp = self.client.inner.call(StoreRequest::Shutdown);
        if handle.join().is_err() {
            error!("store worker panicked");
        }
        match resp? {
            StoreResponse::Stopped => Ok(()),
            other => unexpected(other),
        }
    }
}

impl Drop for StoreWorker {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("failed to stop the store worker: {}", e);
        }
    }
}

fn serve(session: Session, server: HandoffServer<StoreRequest, StoreResponse>) {
    while let Some(mut pending) = server.recv() {
        let Some(request) = pending.take_request() else {
            continue;
        };
        if request == StoreRequest::Shutdown {
            pending.respond(StoreResponse::Stopped);
            break;
        }
        let resp = handle(&session, request).unwrap_or_else(|e| StoreResponse::Failed {
            errno: e.to_errno(),
            message: Report::from_error(e).to_string(),
        });
        pending.respond(resp);
    }
    debug!("store worker stopped");
}

fn handle(session: &Session, request: StoreRequest) -> Result<StoreResponse> {
    let resp = match request {
        StoreRequest::Read {
            file,
            position,
            length,
        } => {
            let file = session.file(file.as_deref())?;
            // size the buffer by what is left of the file, not by the request
            let left = file.size().saturating_sub(position);
            let mut buf = vec![0u8; min(length as u64, left) as usize];
            let n = file.read_at(position, &mut buf)?;
            buf.truncate(n);
            StoreResponse::Data(buf)
        }
        StoreRequest::Stats { file } => StoreResponse::Stats(session.stats(file.as_deref())?),
        StoreRequest::ResetAccessedPages { file } => {
            StoreResponse::PageReads(session.reset_accessed_pages(file.as_deref())?)
        }
        StoreRequest::CheckPageSize { page_size } => {
            StoreResponse::PageSizeMatches(session.check_page_size(page_size)?)
        }
        StoreRequest::Shutdown => StoreResponse::Stopped,
    };
    Ok(resp)
}
