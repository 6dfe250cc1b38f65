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

use snafu::{ensure, OptionExt};
use tracing::{debug, error, warn};

use crate::{
    err::{HttpStatusSnafu, LengthUnknownSnafu, Result},
    source::{is_success, RangeSource},
};

/// What a header-only request tells about the remote file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerCapabilities {
    /// The declared length, unset when absent or untrustworthy.
    pub length: Option<u64>,
    pub supports_ranges: bool,
    pub is_compressed: bool,
}

/// Probe `url` for range support, compression and length.
///
/// Only a failing status is fatal; missing range support and compression are
/// logged and the caller carries on.
pub fn probe(source: &dyn RangeSource, url: &str) -> Result<ServerCapabilities> {
    let head = source.head(url)?;
    ensure!(
        is_success(head.status),
        HttpStatusSnafu {
            url,
            status: head.status
        }
    );
    debug!("probe {}: {:?}", url, head);

    let supports_ranges = head.accept_ranges.as_deref() == Some("bytes");
    let is_compressed = head
        .content_encoding
        .as_deref()
        .is_some_and(|encoding| !encoding.is_empty() && encoding != "identity");

    if !supports_ranges {
        warn!(
            "{} did not respond with Accept-Ranges: bytes. The server either does not support \
             byte serving or does not advertise it, reads may return incorrect data. \
             (seen headers: {:?})",
            url, head
        );
    }
    if is_compressed {
        warn!(
            "{} responded with {:?} encoding to a header request, ranges are computed on the \
             uncompressed data and will be wrong if range requests are compressed too",
            url, head.content_encoding
        );
    }

    Ok(ServerCapabilities {
        // the declared length counts compressed bytes
        length: head.content_length.filter(|len| *len > 0 && !is_compressed),
        supports_ranges,
        is_compressed,
    })
}

/// Probe `url` and settle the file length, a configured length wins.
pub fn resolve_length(
    source: &dyn RangeSource,
    url: &str,
    configured: Option<u64>,
) -> Result<(u64, ServerCapabilities)> {
    let caps = probe(source, url)?;
    let length = configured.filter(|len| *len > 0).or(caps.length);
    if length.is_none() {
        error!("length of {} is unknown, capabilities: {:?}", url, caps);
    }
    let length = length.context(LengthUnknownSnafu { url })?;
    Ok((length, caps))
}

#[cfg(test)]
mod tests {
    use httpvfs_utils::logger::install_fmt_log;

    use super::*;
    use crate::{err::Error, source::MemorySource};

    const URL: &str = "https://example.org/db";

    #[test]
    fn well_behaved_server() {
        let source = MemorySource::new().with_object(URL, vec![0u8; 1234]);
        let caps = probe(&source, URL).unwrap();
        assert_eq!(
            caps,
            ServerCapabilities {
                length: Some(1234),
                supports_ranges: true,
                is_compressed: false,
            }
        );
        assert_eq!(resolve_length(&source, URL, None).unwrap().0, 1234);
        assert_eq!(resolve_length(&source, URL, Some(99)).unwrap().0, 99);
    }

    #[test]
    fn missing_accept_ranges_is_not_fatal() {
        install_fmt_log();
        let source = MemorySource::new()
            .with_object(URL, vec![0u8; 10])
            .without_accept_ranges();
        let (length, caps) = resolve_length(&source, URL, Some(10)).unwrap();
        assert_eq!(length, 10);
        assert!(!caps.supports_ranges);
    }

    #[test]
    fn compression_hides_length() {
        install_fmt_log();
        let source = MemorySource::new()
            .with_object(URL, vec![0u8; 10])
            .with_content_encoding("gzip");
        let caps = probe(&source, URL).unwrap();
        assert!(caps.is_compressed);
        assert_eq!(caps.length, None);
        assert!(matches!(
            resolve_length(&source, URL, None),
            Err(Error::LengthUnknown { .. })
        ));
        assert_eq!(resolve_length(&source, URL, Some(10)).unwrap().0, 10);

        let identity = MemorySource::new()
            .with_object(URL, vec![0u8; 10])
            .with_content_encoding("identity");
        assert_eq!(probe(&identity, URL).unwrap().length, Some(10));
    }

    #[test]
    fn unknown_length_is_fatal() {
        let source = MemorySource::new()
            .with_object(URL, vec![0u8; 10])
            .without_content_length();
        assert!(matches!(
            resolve_length(&source, URL, None),
            Err(Error::LengthUnknown { .. })
        ));
    }

    #[test]
    fn failing_status_is_fatal() {
        let source = MemorySource::new();
        assert!(matches!(
            probe(&source, URL),
            Err(Error::HttpStatus { status: 404, .. })
        ));
    }
}
