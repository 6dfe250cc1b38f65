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

//! Byte sizes that print and parse in binary units, e.g. `5MiB` or `4K`.

use std::{
    fmt::{self, Debug, Display},
    str::FromStr,
};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

pub const B: u64 = 1;
pub const KIB: u64 = B << 10;
pub const MIB: u64 = KIB << 10;
pub const GIB: u64 = MIB << 10;
pub const TIB: u64 = GIB << 10;

#[derive(Clone, Copy, Default, PartialEq, Eq, Ord, PartialOrd, Hash)]
pub struct ReadableSize(pub u64);

impl ReadableSize {
    pub const fn kb(count: u64) -> ReadableSize { ReadableSize(count * KIB) }

    pub const fn mb(count: u64) -> ReadableSize { ReadableSize(count * MIB) }

    pub const fn gb(count: u64) -> ReadableSize { ReadableSize(count * GIB) }

    pub const fn as_bytes(self) -> u64 { self.0 }

    pub const fn as_bytes_usize(self) -> usize { self.0 as usize }
}

impl FromStr for ReadableSize {
    type Err = String;

    fn from_str(s: &str) -> Result<ReadableSize, String> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.is_ascii() {
            return Err(format!("{:?} is not a valid size", s));
        }

        let digits = trimmed
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(trimmed.len());
        let (number, unit) = trimmed.split_at(digits);
        let unit = match unit.trim() {
            "" | "B" => B,
            "K" | "KB" | "KiB" => KIB,
            "M" | "MB" | "MiB" => MIB,
            "G" | "GB" | "GiB" => GIB,
            "T" | "TB" | "TiB" => TIB,
            other => {
                return Err(format!(
                    "unknown size unit {:?} in {:?}, expect one of B, K, KiB, M, MiB, G, GiB, T, TiB",
                    other, s
                ))
            }
        };
        let number: f64 = number
            .parse()
            .map_err(|_| format!("invalid size string: {:?}", s))?;
        Ok(ReadableSize((number * unit as f64) as u64))
    }
}

impl Display for ReadableSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size = self.0;
        if size >= TIB {
            write!(f, "{:.1}TiB", size as f64 / TIB as f64)
        } else if size >= GIB {
            write!(f, "{:.1}GiB", size as f64 / GIB as f64)
        } else if size >= MIB {
            write!(f, "{:.1}MiB", size as f64 / MIB as f64)
        } else if size >= KIB {
            write!(f, "{:.1}KiB", size as f64 / KIB as f64)
        } else {
            write!(f, "{}B", size)
        }
    }
}

impl Debug for ReadableSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self) }
}

impl Serialize for ReadableSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.0)
    }
}

/// Accepts either a plain byte count or a size string.
impl<'de> Deserialize<'de> for ReadableSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SizeVisitor;

        impl<'de> de::Visitor<'de> for SizeVisitor {
            type Value = ReadableSize;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a byte count or a size string")
            }

            fn visit_u64<E: de::Error>(self, size: u64) -> Result<ReadableSize, E> {
                Ok(ReadableSize(size))
            }

            fn visit_i64<E: de::Error>(self, size: i64) -> Result<ReadableSize, E> {
                u64::try_from(size)
                    .map(ReadableSize)
                    .map_err(|_| E::invalid_value(de::Unexpected::Signed(size), &self))
            }

            fn visit_str<E: de::Error>(self, size: &str) -> Result<ReadableSize, E> {
                size.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(SizeVisitor)
    }
}
