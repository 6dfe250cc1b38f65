use std::ops::Range;

use bytes::Bytes;
use httpvfs_utils::{
    object_storage::{is_not_found_error, ObjectStorage, ObjectStoragePath},
    runtime::block_on,
};
use object_store::ObjectStore;
use snafu::ResultExt;

use super::{HeadResponse, RangeSource};
use crate::err::{HttpStatusSnafu, InvalidObjectPathSnafu, ObjectStorageSnafu, Result};

/// Serve ranges out of an [object_store::ObjectStore], urls are object paths.
#[derive(Debug, Clone)]
pub struct ObjectStoreSource {
    store: ObjectStorage,
}

impl ObjectStoreSource {
    pub fn new(store: ObjectStorage) -> Self { Self { store } }

    fn path(url: &str) -> Result<ObjectStoragePath> {
        ObjectStoragePath::parse(url).context(InvalidObjectPathSnafu { url })
    }
}

impl RangeSource for ObjectStoreSource {
    fn head(&self, url: &str) -> Result<HeadResponse> {
        let path = Self::path(url)?;
        match block_on(self.store.head(&path)) {
            Ok(meta) => Ok(HeadResponse {
                status: 200,
                content_length: Some(meta.size as u64),
                accept_ranges: Some("bytes".to_string()),
                content_encoding: None,
            }),
            Err(e) if is_not_found_error(&e) => Ok(HeadResponse {
                status: 404,
                ..Default::default()
            }),
            Err(e) => Err(e).context(ObjectStorageSnafu { path: url }),
        }
    }

    fn get_range(&self, url: &str, range: Range<u64>, ranged: bool) -> Result<Bytes> {
        let path = Self::path(url)?;
        let result = block_on(async {
            if ranged {
                self.store
                    .get_range(&path, range.start as usize..range.end as usize)
                    .await
            } else {
                self.store.get(&path).await?.bytes().await
            }
        });
        match result {
            Ok(bytes) => Ok(bytes),
            Err(e) if is_not_found_error(&e) => HttpStatusSnafu { url, status: 404u16 }.fail(),
            Err(e) => Err(e).context(ObjectStorageSnafu { path: url }),
        }
    }
}

#[cfg(test)]
mod tests {
    use httpvfs_utils::object_storage::{new_local_object_store, new_memory_object_store};

    use super::*;

    #[test]
    fn serve_ranges() {
        let dir = tempfile::tempdir().unwrap();
        for store in [
            new_memory_object_store(),
            new_local_object_store(dir.path()).unwrap(),
        ] {
            let path = ObjectStoragePath::parse("data/file.bin").unwrap();
            block_on(store.put(&path, Bytes::from_static(b"0123456789"))).unwrap();

            let source = ObjectStoreSource::new(store);
            let head = source.head("data/file.bin").unwrap();
            assert_eq!(head.status, 200);
            assert_eq!(head.content_length, Some(10));

            let bytes = source.get_range("data/file.bin", 3..7, true).unwrap();
            assert_eq!(bytes.as_ref(), b"3456");
            let bytes = source.get_range("data/file.bin", 0..10, false).unwrap();
            assert_eq!(bytes.len(), 10);

            assert_eq!(source.head("data/missing").unwrap().status, 404);
            assert!(source.get_range("data/missing", 0..1, true).is_err());
        }
    }
}
