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

mod http;
mod memory;
mod object;

use std::{fmt::Debug, ops::Range, sync::Arc};

use bytes::Bytes;

pub use self::{http::HttpSource, memory::MemorySource, object::ObjectStoreSource};
use crate::err::Result;

pub type RangeSourceRef = Arc<dyn RangeSource>;

/// The headers of a header-only request that matter for range math.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadResponse {
    pub status: u16,
    pub content_length: Option<u64>,
    pub accept_ranges: Option<String>,
    pub content_encoding: Option<String>,
}

/// Where the bytes come from.
///
/// Calls block the current thread until the response is complete.
pub trait RangeSource: Send + Sync + Debug {
    /// Issue a header-only request. A non-success status is not an error
    /// here, it is reported in [HeadResponse::status].
    fn head(&self, url: &str) -> Result<HeadResponse>;

    /// Fetch `range` of the object at `url`. With `ranged == false` the
    /// whole object is requested.
    fn get_range(&self, url: &str, range: Range<u64>, ranged: bool) -> Result<Bytes>;

    /// Fetch a whole small object, e.g. a json config file.
    fn get_object(&self, url: &str) -> Result<Bytes> { self.get_range(url, 0..0, false) }
}

/// Success and not-modified statuses are both usable.
pub fn is_success(status: u16) -> bool { (200..300).contains(&status) || status == 304 }
