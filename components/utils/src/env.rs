use std::{error::Error, str::FromStr};

use snafu::{whatever, ResultExt, Whatever};

/// Reads an environment variable for the current process.
///
/// Unlike [std::env::var], the `.env` file from the current or parent
/// directories is loaded first, and an unset variable is `Ok(None)`.
#[track_caller]
pub fn var(key: &str) -> Result<Option<String>, Whatever> {
    match dotenvy::var(key) {
        Ok(content) => Ok(Some(content)),
        Err(dotenvy::Error::EnvVar(std::env::VarError::NotPresent)) => Ok(None),
        Err(error) => whatever!(Err(error), "Failed to read {key} environment variable"),
    }
}

/// Like [var], and parses the value if it is set.
#[track_caller]
pub fn var_parsed<R>(key: &str) -> Result<Option<R>, Whatever>
where
    R: FromStr,
    R::Err: Error + Send + Sync + 'static,
{
    match var(key)? {
        Some(content) => Ok(Some(content.parse().with_whatever_context(|e| {
            format!("Failed to parse {key} environment variable; {e}")
        })?)),
        None => Ok(None),
    }
}
