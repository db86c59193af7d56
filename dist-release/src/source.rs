// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Distribution sources.

A distribution source names a distribution within a repository, e.g. the
`stable` distribution of `http://downloads.example.com/feed`. Its `Release`
file lives at `<url>/dists/<name>/Release` and its package indices at
`<url>/dists/<name>/<component>/binary-<architecture>/Packages[.gz]`.
*/

use {
    crate::{
        error::{DistError, Result},
        io::Compression,
        token::parse_words,
    },
    std::path::{Path, PathBuf},
};

// Components such as `updates/main` must map to a single file name. `%` is
// escaped first so distinct components never share a name.
fn flatten(component: &str) -> String {
    component.replace('%', "%25").replace('/', "%2F")
}

/// A named distribution in a repository.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DistSource {
    name: String,
    base_url: String,
    components: Vec<String>,
    prefer_compressed: bool,
}

impl DistSource {
    /// Construct a new instance.
    ///
    /// `components` is a whitespace delimited list of component names. At
    /// least 1 component must be present.
    pub fn new(
        name: impl ToString,
        base_url: impl ToString,
        components: &str,
        prefer_compressed: bool,
    ) -> Result<Self> {
        let name = name.to_string();
        let components = parse_words(components);

        if components.is_empty() {
            return Err(DistError::SourceNoComponents(name));
        }

        Ok(Self {
            name,
            base_url: base_url.to_string(),
            components,
            prefer_compressed,
        })
    }

    /// Name of the distribution.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base URL of the repository.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Components requested from this distribution.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Whether compressed indices should be fetched first.
    pub fn prefer_compressed(&self) -> bool {
        self.prefer_compressed
    }

    /// URL of the distribution directory.
    pub fn location(&self) -> String {
        format!("{}/dists/{}", self.base_url.trim_end_matches('/'), self.name)
    }

    /// URL of the `Release` file of this distribution.
    pub fn release_url(&self) -> String {
        format!("{}/Release", self.location())
    }

    /// Path of a `Packages` index relative to the distribution directory.
    pub fn packages_path(&self, component: &str, architecture: &str) -> String {
        format!("{}/binary-{}/Packages", component, architecture)
    }

    /// URL of a `Packages` index in the given compression format.
    pub fn packages_url(
        &self,
        component: &str,
        architecture: &str,
        compression: Compression,
    ) -> String {
        format!(
            "{}/{}{}",
            self.location(),
            self.packages_path(component, architecture),
            compression.extension()
        )
    }

    /// Local path holding the `Release` file of this distribution.
    pub fn release_list_path(&self, lists_dir: &Path) -> PathBuf {
        lists_dir.join(&self.name)
    }

    /// Local path holding the uncompressed `Packages` index for a component and architecture.
    pub fn packages_list_path(
        &self,
        lists_dir: &Path,
        component: &str,
        architecture: &str,
    ) -> PathBuf {
        lists_dir.join(format!(
            "{}-{}-{}",
            self.name,
            architecture,
            flatten(component)
        ))
    }

    /// Scratch path for a compressed `Packages` index pending decompression.
    pub fn packages_scratch_path(
        &self,
        tmp_dir: &Path,
        component: &str,
        architecture: &str,
        compression: Compression,
    ) -> PathBuf {
        tmp_dir.join(format!(
            "{}-{}-{}{}",
            self.name,
            architecture,
            flatten(component),
            compression.extension()
        ))
    }

    /// Local path of the sidecar recording the computed digest of an index.
    pub fn digest_list_path(&self, lists_dir: &Path, digest: &str) -> PathBuf {
        lists_dir.join(format!("{}-{}", self.name, digest))
    }
}
