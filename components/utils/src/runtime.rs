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

//! The bridge between the synchronous byte store and the async network
//! clients. Blocking calls must come from a thread that is not driving a
//! tokio runtime itself.

use std::future::Future;

use once_cell::sync::Lazy;
use tracing::debug;

static GLOBAL_RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    let worker_threads = num_cpus::get().clamp(1, 4);
    debug!("start tokio runtime with {} worker threads", worker_threads);
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .thread_name("httpvfs-io")
        .enable_all()
        .build()
        .expect("failed to build the io runtime")
});

/// Run `future` to completion on the io runtime, blocking the calling thread.
pub fn block_on<F: Future>(future: F) -> F::Output { GLOBAL_RUNTIME.block_on(future) }
