use std::ops::Range;

use bytes::Bytes;
use httpvfs_utils::runtime::block_on;
use reqwest::{
    header::{HeaderMap, ACCEPT_RANGES, CONTENT_ENCODING, CONTENT_LENGTH, RANGE},
    Client,
};
use snafu::{ensure, ResultExt};

use super::{is_success, HeadResponse, RangeSource};
use crate::err::{HttpStatusSnafu, Result, TransportSnafu};

/// Range requests against a static http host.
///
/// The client is built without any decompression feature, so it never asks
/// for a transparent encoding and byte ranges refer to the stored bytes.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("httpvfs/", env!("CARGO_PKG_VERSION")))
            .build()
            .context(TransportSnafu { url: "<client>" })?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self { Self { client } }
}

fn header_str(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
}

impl RangeSource for HttpSource {
    fn head(&self, url: &str) -> Result<HeadResponse> {
        block_on(async {
            let resp = self
                .client
                .head(url)
                .send()
                .await
                .context(TransportSnafu { url })?;
            let headers = resp.headers();
            Ok(HeadResponse {
                status: resp.status().as_u16(),
                content_length: header_str(headers, CONTENT_LENGTH).and_then(|v| v.parse().ok()),
                accept_ranges: header_str(headers, ACCEPT_RANGES),
                content_encoding: header_str(headers, CONTENT_ENCODING),
            })
        })
    }

    fn get_range(&self, url: &str, range: Range<u64>, ranged: bool) -> Result<Bytes> {
        block_on(async {
            let mut req = self.client.get(url);
            if ranged {
                // the http range header is inclusive on both ends
                req = req.header(RANGE, format!("bytes={}-{}", range.start, range.end - 1));
            }
            let resp = req.send().await.context(TransportSnafu { url })?;
            let status = resp.status().as_u16();
            ensure!(is_success(status), HttpStatusSnafu { url, status });
            resp.bytes().await.context(TransportSnafu { url })
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::{Read, Write},
        net::{TcpListener, TcpStream},
        ops::Range,
        sync::{Arc, Mutex},
        thread,
    };

    use super::*;
    use crate::err::Error;

    const BODY: &[u8] = b"0123456789abcdef";

    /// Serve `BODY` over loopback http/1.1, recording the head of every
    /// request in lower case.
    fn serve() -> (HttpSource, String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                respond(stream, &log);
            }
        });
        let client = Client::builder().no_proxy().build().unwrap();
        (HttpSource::with_client(client), base, seen)
    }

    fn respond(mut stream: TcpStream, log: &Mutex<Vec<String>>) {
        let mut head = Vec::new();
        let mut byte = [0u8; 1];
        while !head.ends_with(b"\r\n\r\n") {
            if stream.read(&mut byte).unwrap_or(0) == 0 {
                return;
            }
            head.push(byte[0]);
        }
        let head = String::from_utf8_lossy(&head).to_lowercase();
        log.lock().unwrap().push(head.clone());

        let mut lines = head.lines();
        let mut request_line = lines.next().unwrap_or_default().split_whitespace();
        let method = request_line.next().unwrap_or_default();
        let path = request_line.next().unwrap_or_default();
        let range: Option<Range<usize>> = lines
            .find_map(|l| l.strip_prefix("range: bytes="))
            .and_then(|r| r.split_once('-'))
            .map(|(a, b)| a.parse::<usize>().unwrap()..b.parse::<usize>().unwrap() + 1);

        let (status, extra, body): (&str, &str, &[u8]) = match (path, range) {
            ("/missing", _) => ("404 Not Found", "", &BODY[..0]),
            (_, Some(r)) if r.end > BODY.len() => ("416 Range Not Satisfiable", "", &BODY[..0]),
            ("/gz", _) => ("200 OK", "content-encoding: gzip\r\n", BODY),
            (_, Some(r)) => ("206 Partial Content", "accept-ranges: bytes\r\n", &BODY[r]),
            (_, None) => ("200 OK", "accept-ranges: bytes\r\n", BODY),
        };
        let mut resp = format!(
            "HTTP/1.1 {}\r\n{}content-length: {}\r\nconnection: close\r\n\r\n",
            status,
            extra,
            body.len()
        )
        .into_bytes();
        if method != "head" {
            resp.extend_from_slice(body);
        }
        let _ = stream.write_all(&resp);
    }

    fn last_request(seen: &Mutex<Vec<String>>) -> String {
        seen.lock().unwrap().last().cloned().unwrap()
    }

    #[test]
    fn head_reports_length_ranges_and_encoding() {
        let (source, base, _) = serve();

        let head = source.head(&format!("{}/db", base)).unwrap();
        assert_eq!(head.status, 200);
        assert_eq!(head.content_length, Some(BODY.len() as u64));
        assert_eq!(head.accept_ranges.as_deref(), Some("bytes"));
        assert_eq!(head.content_encoding, None);

        let head = source.head(&format!("{}/gz", base)).unwrap();
        assert_eq!(head.accept_ranges, None);
        assert_eq!(head.content_encoding.as_deref(), Some("gzip"));

        // a failing status is reported, not raised
        let head = source.head(&format!("{}/missing", base)).unwrap();
        assert_eq!(head.status, 404);
    }

    #[test]
    fn range_header_is_inclusive() {
        let (source, base, seen) = serve();
        let url = format!("{}/db", base);

        let got = source.get_range(&url, 2..6, true).unwrap();
        assert_eq!(got.as_ref(), b"2345");
        let req = last_request(&seen);
        assert!(req.starts_with("get /db "));
        assert!(req.contains("range: bytes=2-5\r\n"), "{}", req);

        let got = source.get_range(&url, 15..16, true).unwrap();
        assert_eq!(got.as_ref(), b"f");
        assert!(last_request(&seen).contains("range: bytes=15-15\r\n"));
    }

    #[test]
    fn whole_object_has_no_range_header() {
        let (source, base, seen) = serve();
        let got = source.get_object(&format!("{}/db", base)).unwrap();
        assert_eq!(got.as_ref(), BODY);
        assert!(!last_request(&seen).contains("range:"));
    }

    #[test]
    fn failing_status_is_an_error() {
        let (source, base, _) = serve();

        let err = source
            .get_range(&format!("{}/missing", base), 0..4, true)
            .unwrap_err();
        assert!(matches!(err, Error::HttpStatus { status: 404, .. }));

        let err = source
            .get_range(&format!("{}/db", base), 10..40, true)
            .unwrap_err();
        assert!(matches!(err, Error::HttpStatus { status: 416, .. }));
    }
}
