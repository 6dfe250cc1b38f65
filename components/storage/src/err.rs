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

use httpvfs_utils::object_storage::ObjectStorageError;
use snafu::{Location, Snafu};

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("request to {url} failed"))]
    Transport {
        url: String,
        #[snafu(implicit)]
        location: Location,
        source: reqwest::Error,
    },

    #[snafu(display("couldn't load {url}, status: {status}"))]
    HttpStatus {
        url: String,
        status: u16,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("object storage request for {path} failed"))]
    ObjectStorage {
        path: String,
        #[snafu(implicit)]
        location: Location,
        source: ObjectStorageError,
    },

    #[snafu(display("{url} is not a valid object path"))]
    InvalidObjectPath {
        url: String,
        #[snafu(implicit)]
        location: Location,
        source: object_store::path::Error,
    },

    #[snafu(display(
        "length of {url} is not known, it must either be supplied in the config or given by the server"
    ))]
    LengthUnknown {
        url: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display(
        "request budget exhausted: {requested} more bytes wanted, {used} of {ceiling} already read"
    ))]
    ResourceExhausted {
        requested: u64,
        used: u64,
        ceiling: u64,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("invalid range {start}..{end}, no bytes requested"))]
    InvalidRange {
        start: u64,
        end: u64,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("range ends at {end} but only {length} bytes are available"))]
    ReadPastEnd {
        end: u64,
        length: u64,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("output buffer holds {capacity} bytes, {needed} needed"))]
    BufferTooSmall {
        needed: usize,
        capacity: usize,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("fetch did not deliver chunk {chunk}"))]
    FetchIncomplete {
        chunk: usize,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("invalid store config: {reason}"))]
    InvalidConfig {
        reason: String,
        #[snafu(implicit)]
        location: Location,
    },
}

impl Error {
    /// The request budget refused a fetch, the caller may retry later.
    pub fn is_resource_exhausted(&self) -> bool { matches!(self, Error::ResourceExhausted { .. }) }
}

pub type Result<T> = std::result::Result<T, Error>;
