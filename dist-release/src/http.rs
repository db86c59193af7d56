// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! HTTP based repositories. */

use {
    crate::{
        error::{DistError, Result},
        fetch::IndexFetcher,
    },
    log::debug,
    reqwest::blocking::{Client, ClientBuilder},
    std::path::Path,
    url::Url,
};

/// Obtain an HTTP client, taking proxy environment variables into account.
pub fn get_http_client() -> reqwest::Result<Client> {
    let mut builder = ClientBuilder::new();

    for (key, value) in std::env::vars() {
        let key = key.to_lowercase();
        if key.ends_with("_proxy") {
            let end = key.len() - "_proxy".len();
            let schema = &key[..end];

            if let Ok(url) = Url::parse(&value) {
                if let Some(Ok(proxy)) = match schema {
                    "http" => Some(reqwest::Proxy::http(url.as_str())),
                    "https" => Some(reqwest::Proxy::https(url.as_str())),
                    _ => None,
                } {
                    builder = builder.proxy(proxy);
                }
            }
        }
    }

    builder.build()
}

/// An [IndexFetcher] retrieving content via HTTP.
///
/// Each fetch is a single GET request. Non-success status codes are errors.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Construct an instance using a default client.
    pub fn new() -> Result<Self> {
        Ok(Self::new_client(get_http_client()?))
    }

    /// Construct an instance using the given [Client].
    pub fn new_client(client: Client) -> Self {
        Self { client }
    }

    fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<u64> {
        let fetch_error = |message: String| DistError::Fetch {
            url: url.to_string(),
            message,
        };

        let mut res = self
            .client
            .get(url)
            .send()
            .map_err(|e| fetch_error(format!("error sending HTTP request: {:?}", e)))?
            .error_for_status()
            .map_err(|e| fetch_error(format!("bad HTTP status code: {:?}", e)))?;

        let mut fh = std::fs::File::create(dest)
            .map_err(|e| DistError::RepositoryIoPath(format!("{}", dest.display()), e))?;

        res.copy_to(&mut fh)
            .map_err(|e| fetch_error(format!("error reading HTTP response: {:?}", e)))
    }
}

impl IndexFetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        match self.fetch_to_file(url, dest) {
            Ok(size) => {
                debug!("fetched {} bytes from {}", size, url);
                Ok(())
            }
            Err(e) => {
                let _ = std::fs::remove_file(dest);
                Err(e)
            }
        }
    }
}
