// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Generic mechanism for retrieving repository content.

[IndexFetcher] abstracts the transport used to copy a remote file to a
local path. [UrlFetcher] dispatches to a concrete implementation based on
the URL scheme:

* values without `://` and `file://` URLs are read from the local filesystem
  ([FilesystemFetcher]);
* `http://` and `https://` URLs are fetched via HTTP (`HttpFetcher`, requires
  the `http` feature).
*/

use {
    crate::{
        error::{DistError, Result},
        filesystem::FilesystemFetcher,
    },
    std::path::Path,
    url::Url,
};

#[cfg(feature = "http")]
use {crate::http::HttpFetcher, once_cell::sync::OnceCell};

/// Copies the content at a URL to a local file.
///
/// Implementations make a single attempt per call. On failure, `dest`
/// must not be left behind with partial content.
pub trait IndexFetcher {
    /// Fetch `url` and write its content to `dest`, replacing any existing file.
    fn fetch(&self, url: &str, dest: &Path) -> Result<()>;
}

/// An [IndexFetcher] choosing the transport from the URL scheme.
#[derive(Debug, Default)]
pub struct UrlFetcher {
    filesystem: FilesystemFetcher,
    #[cfg(feature = "http")]
    http: OnceCell<HttpFetcher>,
}

impl UrlFetcher {
    /// Construct a new instance.
    ///
    /// The HTTP client is created lazily on first use of an HTTP URL.
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(feature = "http")]
    /// Construct an instance using the given HTTP fetcher for HTTP URLs.
    pub fn with_http(http: HttpFetcher) -> Self {
        let cell = OnceCell::new();
        // A fresh cell is always empty.
        let _ = cell.set(http);

        Self {
            filesystem: FilesystemFetcher::default(),
            http: cell,
        }
    }

    #[cfg(feature = "http")]
    /// The fetcher used for HTTP URLs, created on first call.
    fn http(&self) -> Result<&HttpFetcher> {
        self.http.get_or_try_init(HttpFetcher::new)
    }
}

impl IndexFetcher for UrlFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        if !url.contains("://") {
            return self.filesystem.fetch(url, dest);
        }

        let parsed = Url::parse(url)?;

        match parsed.scheme() {
            "file" => self.filesystem.fetch(url, dest),
            #[cfg(feature = "http")]
            "http" | "https" => self.http()?.fetch(url, dest),
            scheme => Err(DistError::UnsupportedUrlScheme(scheme.to_string())),
        }
    }
}
