// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Client configuration.

Configuration is expressed as a YAML document:

```yaml
lists_dir: /var/lib/opkg/lists
tmp_dir: /tmp
architectures:
  - name: all
    priority: 1
  - name: mips
    priority: 10
sources:
  - name: stable
    url: http://downloads.example.com/feed
    components: main contrib
    compressed: true
```
*/

use {
    crate::{
        error::{DistError, Result},
        source::DistSource,
        token::parse_words,
    },
    serde::Deserialize,
    std::path::{Path, PathBuf},
};

/// A machine architecture packages may be installed for.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Architecture {
    /// Name of the architecture. e.g. `all` or `mips`.
    pub name: String,

    /// Priority of packages built for this architecture.
    ///
    /// Higher values are preferred.
    #[serde(default)]
    pub priority: u32,
}

/// The set of architectures supported by this client.
///
/// Iteration order is configuration order.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(transparent)]
pub struct ArchitectureConfig {
    architectures: Vec<Architecture>,
}

impl ArchitectureConfig {
    /// Construct an instance from `(name, priority)` pairs.
    pub fn new<I, S>(architectures: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: ToString,
    {
        Self {
            architectures: architectures
                .into_iter()
                .map(|(name, priority)| Architecture {
                    name: name.to_string(),
                    priority,
                })
                .collect(),
        }
    }

    /// Register an additional architecture.
    ///
    /// If the architecture is already known, its priority is replaced.
    pub fn add(&mut self, name: impl ToString, priority: u32) {
        let name = name.to_string();

        if let Some(arch) = self.architectures.iter_mut().find(|a| a.name == name) {
            arch.priority = priority;
        } else {
            self.architectures.push(Architecture { name, priority });
        }
    }

    /// Whether an architecture is supported.
    pub fn supports(&self, name: &str) -> bool {
        self.architectures.iter().any(|a| a.name == name)
    }

    /// Obtain the priority of an architecture, if it is supported.
    pub fn priority(&self, name: &str) -> Option<u32> {
        self.architectures
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.priority)
    }

    /// Iterate over supported architectures.
    pub fn iter(&self) -> impl Iterator<Item = &Architecture> {
        self.architectures.iter()
    }

    /// Iterate over names of supported architectures.
    pub fn iter_names(&self) -> impl Iterator<Item = &str> {
        self.architectures.iter().map(|a| a.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.architectures.is_empty()
    }
}

/// A distribution source as it appears in configuration files.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct DistSourceConfig {
    /// Name of the distribution. e.g. `stable`.
    pub name: String,

    /// Base URL of the repository. The `dists/` directory is under it.
    pub url: String,

    /// Whitespace delimited list of components to retrieve.
    pub components: String,

    /// Whether to attempt to retrieve compressed indices first.
    #[serde(default = "default_compressed")]
    pub compressed: bool,
}

fn default_compressed() -> bool {
    true
}

impl DistSourceConfig {
    /// Resolve the [DistSource] described by this configuration.
    pub fn to_source(&self) -> Result<DistSource> {
        DistSource::new(&self.name, &self.url, &self.components, self.compressed)
    }
}

/// Configuration of a client retrieving package indices.
#[derive(Clone, Debug, Deserialize)]
pub struct ClientConfig {
    /// Directory holding retrieved package lists.
    pub lists_dir: PathBuf,

    /// Directory for scratch files.
    #[serde(default = "std::env::temp_dir")]
    pub tmp_dir: PathBuf,

    /// Architectures to retrieve indices for.
    #[serde(default)]
    pub architectures: ArchitectureConfig,

    /// Distribution sources to retrieve.
    #[serde(default)]
    pub sources: Vec<DistSourceConfig>,
}

impl ClientConfig {
    /// Construct an instance from a YAML string.
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Construct an instance by reading a YAML file.
    pub fn from_yaml_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let fh = std::fs::File::open(path)
            .map_err(|e| DistError::RepositoryIoPath(format!("{}", path.display()), e))?;

        Ok(serde_yaml::from_reader(fh)?)
    }

    /// Resolve all configured [DistSource].
    pub fn dist_sources(&self) -> Result<Vec<DistSource>> {
        self.sources.iter().map(|s| s.to_source()).collect()
    }

    /// Names of components across all sources, deduplicated in first seen order.
    pub fn all_components(&self) -> Vec<String> {
        let mut res: Vec<String> = vec![];

        for source in &self.sources {
            for component in parse_words(&source.components) {
                if !res.contains(&component) {
                    res.push(component);
                }
            }
        }

        res
    }
}

#[cfg(test)]
mod test {
    use {super::*, indoc::indoc};

    const CONFIG: &str = indoc! {"
        lists_dir: /var/lib/opkg/lists
        architectures:
          - name: all
            priority: 1
          - name: mips
            priority: 10
        sources:
          - name: stable
            url: http://downloads.example.com/feed
            components: main contrib
          - name: testing
            url: file:///srv/feed
            components: main  extra
            compressed: false
    "};

    #[test]
    fn parse_yaml() -> Result<()> {
        let config = ClientConfig::from_yaml_str(CONFIG)?;

        assert_eq!(config.lists_dir, PathBuf::from("/var/lib/opkg/lists"));
        assert_eq!(config.tmp_dir, std::env::temp_dir());
        assert_eq!(
            config.architectures.iter_names().collect::<Vec<_>>(),
            vec!["all", "mips"]
        );
        assert_eq!(config.architectures.priority("mips"), Some(10));
        assert!(config.architectures.supports("all"));
        assert!(!config.architectures.supports("x86"));

        let sources = config.dist_sources()?;
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].name(), "stable");
        assert_eq!(sources[0].components(), &["main", "contrib"]);
        assert!(sources[0].prefer_compressed());
        assert_eq!(sources[1].components(), &["main", "extra"]);
        assert!(!sources[1].prefer_compressed());

        assert_eq!(config.all_components(), vec!["main", "contrib", "extra"]);

        Ok(())
    }

    #[test]
    fn architecture_add_replaces_priority() {
        let mut arches = ArchitectureConfig::new([("all", 1), ("arm", 5)]);
        arches.add("arm", 7);
        arches.add("mips", 3);

        assert_eq!(
            arches.iter_names().collect::<Vec<_>>(),
            vec!["all", "arm", "mips"]
        );
        assert_eq!(arches.priority("arm"), Some(7));
        assert_eq!(arches.priority("x86"), None);
    }
}
