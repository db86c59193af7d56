// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Error handling. */

use thiserror::Error;

/// Primary crate error type.
#[derive(Debug, Error)]
pub enum DistError {
    #[error("URL error: {0:?}")]
    Url(#[from] url::ParseError),

    #[cfg(feature = "http")]
    #[error("HTTP error: {0:?}")]
    Reqwest(#[from] reqwest::Error),

    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0:?}")]
    SerdeYaml(#[from] serde_yaml::Error),

    #[error("unrecognized release file field: {0}")]
    ReleaseUnknownField(String),

    #[error("checksum entry does not have 3 fields (digest, size, path): {0}")]
    ReleaseMalformedChecksum(String),

    #[error("checksum entry has bad size value {0}: {1:?}")]
    ReleaseBadSize(String, std::num::ParseIntError),

    #[error("error reading release file: {0:?}")]
    ReleaseRead(std::io::Error),

    #[error("release advertises no supported architecture (advertised: {0:?})")]
    ReleaseNoSupportedArchitecture(Vec<String>),

    #[error("components not defined by release: {}", .0.join(", "))]
    ReleaseMissingComponents(Vec<String>),

    #[error("distribution source {0} has no components")]
    SourceNoComponents(String),

    #[error("error fetching {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("corrupt compressed data in {0}: {1:?}")]
    Decompress(String, std::io::Error),

    #[error("repository I/O error on path {0}: {1:?}")]
    RepositoryIoPath(String, std::io::Error),

    #[error("unsupported URL scheme: {0}")]
    UnsupportedUrlScheme(String),
}

/// Result wrapper for this crate.
pub type Result<T> = std::result::Result<T, DistError>;
