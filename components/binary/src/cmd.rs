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

pub mod cat;
pub mod scan;
pub mod stat;

use std::sync::Arc;

use clap::Args;
use httpvfs_common::{DEFAULT_MAX_READ_HEADS, HTTPVFS, MAX_BYTES_ENV};
use httpvfs_storage::source::{HttpSource, ObjectStoreSource, RangeSourceRef};
use httpvfs_utils::{
    env,
    logger::{init_global_logging, LoggingOptions, WorkerGuard},
    object_storage::{new_http_object_store, new_local_object_store},
    readable_size::ReadableSize,
};
use httpvfs_vfs::{FileConfig, FileSource, SessionOptions, StoreWorker};
use snafu::{whatever, ResultExt, Whatever};
use tracing::info;
use url::Url;

use crate::build_info;

const SOURCE_OPTIONS_HEADER: &str = "Source options";
const READ_OPTIONS_HEADER: &str = "Read options";
const LOGGING_OPTIONS_HEADER: &str = "Logging options";

/// Where the remote file is and how to read it, shared by every command.
#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    #[arg(
        help = "Path or http(s) url of the json config describing the remote file",
        value_name = "CONFIG"
    )]
    pub config: String,

    #[arg(
        long,
        help = "Resolve relative urls of a local config against this url",
        help_heading = SOURCE_OPTIONS_HEADER,
        value_name = "URL"
    )]
    pub base_url: Option<String>,

    #[arg(
        long,
        help = "Read objects from a local directory or an http object store, config urls become object paths",
        help_heading = SOURCE_OPTIONS_HEADER,
        value_name = "DIR_OR_URL"
    )]
    pub object_store: Option<String>,

    #[arg(
        long,
        help = "Name of the virtual file [default: url with '/' replaced by '_']",
        help_heading = SOURCE_OPTIONS_HEADER
    )]
    pub virtual_filename: Option<String>,

    #[arg(
        long,
        help = "Refuse to fetch more than this many bytes [env: HTTPVFS_MAX_BYTES]",
        help_heading = READ_OPTIONS_HEADER,
        value_name = "SIZE"
    )]
    pub max_bytes: Option<ReadableSize>,

    #[arg(
        long,
        help = "Largest read-ahead of a sequential scan",
        help_heading = READ_OPTIONS_HEADER,
        value_name = "SIZE",
        default_value = "5MiB"
    )]
    pub max_read_speed: ReadableSize,

    #[arg(
        long,
        help = "Number of sequential streams tracked at once",
        help_heading = READ_OPTIONS_HEADER,
        default_value_t = DEFAULT_MAX_READ_HEADS
    )]
    pub max_read_heads: usize,

    #[clap(
        long,
        help = "Write log files to a directory [default: logs written to stderr]",
        help_heading = LOGGING_OPTIONS_HEADER,
        value_name = "DIRECTORY"
    )]
    pub log_directory: Option<String>,

    #[clap(
        short,
        long,
        help = "Log level, overridden by HTTPVFS_LOG",
        help_heading = LOGGING_OPTIONS_HEADER,
        value_name = "LEVEL",
        default_value = "warn"
    )]
    pub level: Option<String>,

    #[clap(
        long,
        help = "Disable all logging",
        help_heading = LOGGING_OPTIONS_HEADER,
        conflicts_with_all(["log_directory", "level"])
    )]
    pub no_log: bool,
}

impl SourceArgs {
    pub fn init_logging(&self) -> Vec<WorkerGuard> {
        if self.no_log {
            return vec![];
        }
        let opts = LoggingOptions {
            dir: self.log_directory.clone().unwrap_or_default(),
            level: self.level.clone(),
            append_stderr: false,
        };
        let guards = init_global_logging(HTTPVFS, &opts);
        info!(
            "httpvfs {} ({})",
            build_info::FULL_VERSION,
            build_info::BUILD_TARGET
        );
        guards
    }

    /// Open the session on a store worker.
    pub fn open(&self) -> Result<StoreWorker, Whatever> {
        let source = self.range_source()?;
        let file = self.file_source()?;
        let options = self.session_options()?;
        StoreWorker::spawn(vec![file], options, source)
            .with_whatever_context(|e| format!("failed to open {}; {}", self.config, e))
    }

    fn range_source(&self) -> Result<RangeSourceRef, Whatever> {
        let Some(location) = &self.object_store else {
            let http = HttpSource::new().whatever_context("failed to build the http client")?;
            return Ok(Arc::new(http));
        };
        let store = if is_http_url(location) {
            new_http_object_store(location)
        } else {
            new_local_object_store(location)
        }
        .with_whatever_context(|e| format!("failed to open object store {}; {}", location, e))?;
        Ok(Arc::new(ObjectStoreSource::new(store)))
    }

    fn file_source(&self) -> Result<FileSource, Whatever> {
        let source = if is_http_url(&self.config) {
            FileSource::json_config(self.config.as_str())
        } else {
            let data = std::fs::read(&self.config)
                .with_whatever_context(|e| format!("failed to read {}; {}", self.config, e))?;
            let mut config = FileConfig::from_json(&self.config, &data)
                .with_whatever_context(|e| format!("{}", e))?;
            if let Some(base) = &self.base_url {
                let base = Url::parse(base)
                    .with_whatever_context(|e| format!("invalid base url {}; {}", base, e))?;
                config = config
                    .resolve_against(&base)
                    .with_whatever_context(|e| format!("{}", e))?;
            }
            FileSource::inline(config)
        };
        Ok(match &self.virtual_filename {
            Some(name) => source.with_virtual_filename(name.as_str()),
            None => source,
        })
    }

    fn session_options(&self) -> Result<SessionOptions, Whatever> {
        let max_bytes = match self.max_bytes {
            Some(size) => Some(size),
            None => match env::var(MAX_BYTES_ENV)? {
                Some(raw) => match raw.parse::<ReadableSize>() {
                    Ok(size) => Some(size),
                    Err(e) => whatever!("invalid {}; {}", MAX_BYTES_ENV, e),
                },
                None => None,
            },
        };
        Ok(SessionOptions {
            max_bytes_to_read: max_bytes.map(ReadableSize::as_bytes),
            max_read_heads: self.max_read_heads,
            max_read_speed: self.max_read_speed,
            ..Default::default()
        })
    }
}

fn is_http_url(s: &str) -> bool { s.starts_with("http://") || s.starts_with("https://") }
