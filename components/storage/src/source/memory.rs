use std::{
    cmp::min,
    collections::HashMap,
    ops::Range,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex, RwLock,
    },
};

use bytes::Bytes;
use snafu::ensure;

use super::{HeadResponse, RangeSource};
use crate::err::{HttpStatusSnafu, Result};

/// An in-process remote, objects are keyed by url.
///
/// It behaves like a well-configured static host by default, the
/// advertised headers can be degraded to mimic less cooperative servers.
/// Every GET is recorded, which makes it the backend of choice for
/// exercising the prefetch logic.
#[derive(Debug)]
pub struct MemorySource {
    objects: RwLock<HashMap<String, Bytes>>,
    accept_ranges: bool,
    advertise_length: bool,
    content_encoding: Option<String>,
    heads: AtomicUsize,
    requests: Mutex<Vec<(String, Range<u64>)>>,
}

impl Default for MemorySource {
    fn default() -> Self {
        Self {
            objects: Default::default(),
            accept_ranges: true,
            advertise_length: true,
            content_encoding: None,
            heads: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl MemorySource {
    pub fn new() -> Self { Self::default() }

    pub fn with_object(self, url: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.insert(url, data);
        self
    }

    /// Stop sending `Accept-Ranges: bytes`, ranges are still honored.
    pub fn without_accept_ranges(mut self) -> Self {
        self.accept_ranges = false;
        self
    }

    pub fn without_content_length(mut self) -> Self {
        self.advertise_length = false;
        self
    }

    pub fn with_content_encoding(mut self, encoding: &str) -> Self {
        self.content_encoding = Some(encoding.to_string());
        self
    }

    pub fn insert(&self, url: impl Into<String>, data: impl Into<Bytes>) {
        self.objects
            .write()
            .expect("memory source poisoned")
            .insert(url.into(), data.into());
    }

    /// Number of header-only requests served.
    pub fn head_count(&self) -> usize { self.heads.load(Ordering::Acquire) }

    /// Number of GET requests served.
    pub fn request_count(&self) -> usize {
        self.requests.lock().expect("memory source poisoned").len()
    }

    /// All GET requests served so far, in order.
    pub fn requests(&self) -> Vec<(String, Range<u64>)> {
        self.requests.lock().expect("memory source poisoned").clone()
    }

    fn object(&self, url: &str) -> Option<Bytes> {
        self.objects
            .read()
            .expect("memory source poisoned")
            .get(url)
            .cloned()
    }
}

impl RangeSource for MemorySource {
    fn head(&self, url: &str) -> Result<HeadResponse> {
        self.heads.fetch_add(1, Ordering::AcqRel);
        let Some(object) = self.object(url) else {
            return Ok(HeadResponse {
                status: 404,
                ..Default::default()
            });
        };
        Ok(HeadResponse {
            status: 200,
            content_length: self.advertise_length.then_some(object.len() as u64),
            accept_ranges: self.accept_ranges.then(|| "bytes".to_string()),
            content_encoding: self.content_encoding.clone(),
        })
    }

    fn get_range(&self, url: &str, range: Range<u64>, ranged: bool) -> Result<Bytes> {
        self.requests
            .lock()
            .expect("memory source poisoned")
            .push((url.to_string(), range.clone()));
        let Some(object) = self.object(url) else {
            return HttpStatusSnafu { url, status: 404u16 }.fail();
        };
        if !ranged {
            return Ok(object);
        }
        let len = object.len() as u64;
        ensure!(range.start < len, HttpStatusSnafu { url, status: 416u16 });
        Ok(object.slice(range.start as usize..min(range.end, len) as usize))
    }
}
