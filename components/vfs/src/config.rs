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

use httpvfs_common::{DEFAULT_MAX_READ_HEADS, DEFAULT_MAX_READ_SPEED};
use httpvfs_storage::{source::RangeSource, RangeMapper, StoreConfig};
use httpvfs_utils::readable_size::ReadableSize;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use tracing::debug;
use url::Url;

use crate::err::{InvalidUrlSnafu, ParseConfigSnafu, Result, StorageSnafu};

/// How the remote file is laid out on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "serverMode", rename_all = "lowercase")]
pub enum ServerMode {
    /// One object holding the whole file.
    Full { url: String },
    /// The file split into objects of `server_chunk_size` bytes named
    /// `url_prefix` + zero padded shard number.
    #[serde(rename_all = "camelCase")]
    Chunked {
        url_prefix: String,
        server_chunk_size: u64,
        database_length_bytes: u64,
        suffix_length: usize,
    },
}

/// The json config of one remote file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
    pub request_chunk_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_bust: Option<String>,
    #[serde(flatten)]
    pub server_mode: ServerMode,
}

impl FileConfig {
    pub fn from_json(origin: &str, data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).context(ParseConfigSnafu { url: origin })
    }

    /// The url or url prefix identifying the file.
    pub fn id(&self) -> &str {
        match &self.server_mode {
            ServerMode::Full { url } => url,
            ServerMode::Chunked { url_prefix, .. } => url_prefix,
        }
    }

    pub fn default_filename(&self) -> String { self.id().replace('/', "_") }

    /// Sharded files must state their length, a single file is probed.
    pub fn file_length(&self) -> Option<u64> {
        match &self.server_mode {
            ServerMode::Full { .. } => None,
            ServerMode::Chunked {
                database_length_bytes,
                ..
            } => Some(*database_length_bytes),
        }
    }

    pub fn range_mapper(&self) -> Result<RangeMapper> {
        let mapper = match &self.server_mode {
            ServerMode::Full { url } => RangeMapper::full(url.as_str()),
            ServerMode::Chunked {
                url_prefix,
                server_chunk_size,
                suffix_length,
                ..
            } => RangeMapper::sharded(url_prefix.as_str(), *server_chunk_size, *suffix_length)
                .context(StorageSnafu)?,
        };
        Ok(mapper.with_cache_bust(self.cache_bust.clone()))
    }

    pub fn store_config(&self, options: &SessionOptions) -> StoreConfig {
        StoreConfig {
            chunk_size: self.request_chunk_size,
            file_length: self.file_length(),
            max_read_heads: options.max_read_heads,
            max_read_speed: options.max_read_speed,
            log_page_reads: options.log_page_reads,
        }
    }

    /// Resolve relative urls against the location of the config file.
    pub fn resolve_against(mut self, base: &Url) -> Result<Self> {
        let target = match &mut self.server_mode {
            ServerMode::Full { url } => url,
            ServerMode::Chunked { url_prefix, .. } => url_prefix,
        };
        let resolved = base.join(target).context(InvalidUrlSnafu {
            url: target.clone(),
        })?;
        *target = resolved.to_string();
        Ok(self)
    }
}

/// Where the config of a virtual file comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "from", rename_all = "camelCase")]
pub enum FileSource {
    #[serde(rename_all = "camelCase")]
    Inline {
        config: FileConfig,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        virtual_filename: Option<String>,
    },
    /// A json file holding a [FileConfig], fetched when the session opens.
    #[serde(rename = "jsonconfig", rename_all = "camelCase")]
    JsonConfig {
        config_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        virtual_filename: Option<String>,
    },
}

/// A file whose config has been fetched and whose name is settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HydratedFile {
    pub config: FileConfig,
    pub filename: String,
}

impl FileSource {
    pub fn inline(config: FileConfig) -> Self {
        FileSource::Inline {
            config,
            virtual_filename: None,
        }
    }

    pub fn json_config(config_url: impl Into<String>) -> Self {
        FileSource::JsonConfig {
            config_url: config_url.into(),
            virtual_filename: None,
        }
    }

    pub fn with_virtual_filename(mut self, name: impl Into<String>) -> Self {
        match &mut self {
            FileSource::Inline {
                virtual_filename, ..
            }
            | FileSource::JsonConfig {
                virtual_filename, ..
            } => *virtual_filename = Some(name.into()),
        }
        self
    }

    pub fn hydrate(self, source: &dyn RangeSource) -> Result<HydratedFile> {
        let (config, virtual_filename) = match self {
            FileSource::Inline {
                config,
                virtual_filename,
            } => (config, virtual_filename),
            FileSource::JsonConfig {
                config_url,
                virtual_filename,
            } => {
                let base = Url::parse(&config_url).context(InvalidUrlSnafu {
                    url: config_url.as_str(),
                })?;
                let data = source.get_object(&config_url).context(StorageSnafu)?;
                let config = FileConfig::from_json(&config_url, &data)?.resolve_against(&base)?;
                debug!("loaded {} from {}", config.id(), config_url);
                (config, virtual_filename)
            }
        };
        let filename = virtual_filename.unwrap_or_else(|| config.default_filename());
        Ok(HydratedFile { config, filename })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Ceiling of the request budget shared by all files, unlimited if unset.
    pub max_bytes_to_read: Option<u64>,
    pub max_read_heads: usize,
    pub max_read_speed: ReadableSize,
    pub log_page_reads: bool,
    /// Defaults to the first file.
    pub main_filename: Option<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            max_bytes_to_read: None,
            max_read_heads: DEFAULT_MAX_READ_HEADS,
            max_read_speed: ReadableSize(DEFAULT_MAX_READ_SPEED),
            log_page_reads: true,
            main_filename: None,
        }
    }
}
