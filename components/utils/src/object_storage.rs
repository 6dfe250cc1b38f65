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

use std::{path::Path, sync::Arc};

use object_store::ObjectStore;

pub type ObjectStorage = Arc<dyn ObjectStore>;

pub type ObjectStorageError = object_store::Error;

pub type ObjectStoragePath = object_store::path::Path;

pub fn is_not_found_error(e: &ObjectStorageError) -> bool {
    matches!(e, ObjectStorageError::NotFound { .. })
}

pub fn new_memory_object_store() -> ObjectStorage {
    Arc::new(object_store::memory::InMemory::new())
}

/// Serve objects from a local directory, the directory must exist.
pub fn new_local_object_store<P: AsRef<Path>>(
    path: P,
) -> Result<ObjectStorage, ObjectStorageError> {
    let store = object_store::local::LocalFileSystem::new_with_prefix(path.as_ref())?;
    Ok(Arc::new(store))
}

/// Serve objects from a static http host, object paths are relative to `url`.
pub fn new_http_object_store(url: &str) -> Result<ObjectStorage, ObjectStorageError> {
    let store = object_store::http::HttpBuilder::new().with_url(url).build()?;
    Ok(Arc::new(store))
}
