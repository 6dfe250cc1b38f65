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

use std::sync::Once;

use httpvfs_common::LOG_ENV;
pub use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer,
};

pub const DEFAULT_LOG_DIR: &str = "/tmp/httpvfs.log";

/// Configuration for the global logger.
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// Write rolling log files into this directory. Empty means stderr only.
    pub dir: String,
    /// The default filter directive, overridden by `HTTPVFS_LOG`.
    pub level: Option<String>,
    /// Keep writing to stderr when a log directory is set.
    pub append_stderr: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            dir: String::new(),
            level: Some("info".to_string()),
            append_stderr: true,
        }
    }
}

static INIT_FMT_LOG: Once = Once::new();

/// Install a plain stderr subscriber, used by tests and simple commands.
/// Calling it more than once is fine.
pub fn install_fmt_log() {
    INIT_FMT_LOG.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(create_env_filter("debug"))
            .with_test_writer()
            .try_init();
    });
}

/// Install the global subscriber described by `opts`.
///
/// The returned guards flush the non-blocking writers when dropped, keep them
/// alive until the process is about to exit.
pub fn init_global_logging(app_name: &str, opts: &LoggingOptions) -> Vec<WorkerGuard> {
    let mut guards = vec![];
    let level = opts.level.as_deref().unwrap_or("info");

    let stderr_layer = if opts.dir.is_empty() || opts.append_stderr {
        let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
        guards.push(guard);
        Some(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(supports_color::on(supports_color::Stream::Stderr).is_some())
                .with_filter(create_env_filter(level)),
        )
    } else {
        None
    };

    let file_layer = if !opts.dir.is_empty() {
        let rolling = tracing_appender::rolling::daily(&opts.dir, app_name);
        let (writer, guard) = tracing_appender::non_blocking(rolling);
        guards.push(guard);
        Some(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(create_env_filter(level)),
        )
    } else {
        None
    };

    let _ = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init();
    tracing::debug!("{} logging started, level: {}", app_name, level);

    guards
}

/// [EnvFilter] isn't [Clone], so each layer builds its own.
fn create_env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level))
}
