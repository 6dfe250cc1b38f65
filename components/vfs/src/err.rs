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

use snafu::{Location, Snafu};
use tracing::error;

pub type Errno = libc::c_int;

/// Translate an error into the errno handed to the query engine.
pub trait ToErrno {
    fn to_errno(&self) -> Errno;
}

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("only one remote session can be open at a time"))]
    AlreadyOpen {
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("a session needs at least one file"))]
    NoFiles {
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("unknown virtual file {name}"))]
    UnknownFile {
        name: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("virtual file {name} is configured twice"))]
    DuplicateFile {
        name: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("couldn't parse httpvfs config {url}"))]
    ParseConfig {
        url: String,
        #[snafu(implicit)]
        location: Location,
        source: serde_json::Error,
    },

    #[snafu(display("invalid url {url}"))]
    InvalidUrl {
        url: String,
        #[snafu(implicit)]
        location: Location,
        source: url::ParseError,
    },

    #[snafu(display("{source}"))]
    Storage {
        #[snafu(implicit)]
        location: Location,
        source: httpvfs_storage::err::Error,
    },

    #[snafu(display("store of {name} is poisoned"))]
    Poisoned {
        name: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("couldn't start the store worker"))]
    SpawnWorker {
        #[snafu(implicit)]
        location: Location,
        source: std::io::Error,
    },

    #[snafu(display("the other side of the hand-off is gone"))]
    HandoffClosed {
        #[snafu(implicit)]
        location: Location,
    },

    /// A failure on the serving side of the hand-off, flattened to its
    /// message.
    #[snafu(display("store worker: {message}"))]
    Remote {
        message: String,
        errno: Errno,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("unexpected reply from the store worker: {reply}"))]
    UnexpectedReply {
        reply: String,
        #[snafu(implicit)]
        location: Location,
    },

    LibcError {
        errno: Errno,
        #[snafu(implicit)]
        location: Location,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn is_resource_exhausted(&self) -> bool {
        match self {
            Self::Storage { source, .. } => source.is_resource_exhausted(),
            Self::Remote { errno, .. } => *errno == libc::EAGAIN,
            _ => false,
        }
    }
}

impl ToErrno for Error {
    fn to_errno(&self) -> Errno {
        match self {
            Self::LibcError { errno, .. } | Self::Remote { errno, .. } => *errno,
            Self::Storage { source, .. } if source.is_resource_exhausted() => libc::EAGAIN,
            Self::UnknownFile { .. } => libc::ENOENT,
            _ => {
                error!("{}", self);
                libc::EIO
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use httpvfs_storage::{err::ResourceExhaustedSnafu, RequestBudget};
    use snafu::ResultExt;

    use super::*;

    #[test]
    fn budget_exhaustion_is_eagain() {
        let budget = RequestBudget::new(Some(1));
        let err = budget.charge(2).context(StorageSnafu).unwrap_err();
        assert!(err.is_resource_exhausted());
        assert_eq!(err.to_errno(), libc::EAGAIN);

        let err: Result<()> = ResourceExhaustedSnafu {
            requested: 1u64,
            used: 0u64,
            ceiling: 0u64,
        }
        .fail()
        .context(StorageSnafu);
        assert_eq!(err.unwrap_err().to_errno(), libc::EAGAIN);
    }

    #[test]
    fn other_errors() {
        let err = LibcSnafu { errno: libc::EROFS }.build();
        assert_eq!(err.to_errno(), libc::EROFS);
        let err = UnknownFileSnafu { name: "x" }.build();
        assert_eq!(err.to_errno(), libc::ENOENT);
        let err = HandoffClosedSnafu.build();
        assert_eq!(err.to_errno(), libc::EIO);
        let err = RemoteSnafu {
            message: "budget",
            errno: libc::EAGAIN,
        }
        .build();
        assert!(err.is_resource_exhausted());
    }
}
