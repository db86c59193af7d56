// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Synchronizing configured distribution sources into the lists directory. */

use {
    crate::{
        config::{ArchitectureConfig, ClientConfig},
        error::{DistError, Result},
        fetch::IndexFetcher,
        release::Release,
        retrieve::{IndexPair, ReleaseRetriever, RetrievalReport},
        source::DistSource,
    },
    log::{error, info, warn},
    std::path::Path,
};

fn load_release(
    path: &Path,
    architectures: &ArchitectureConfig,
    source: &DistSource,
) -> Result<Release> {
    let mut release = Release::from_path(path)?;
    release.set_requested_components(source.components());
    release.validate(architectures)?;

    Ok(release)
}

/// Synchronize a single distribution source.
///
/// The `Release` file is fetched to `<lists_dir>/<name>`, parsed and
/// validated against the configured architectures and the source's
/// components. If it can't be read or fails validation, the cached copy is
/// removed and the error returned. Otherwise its `Packages` indices are
/// retrieved.
pub fn sync_source(
    fetcher: &dyn IndexFetcher,
    config: &ClientConfig,
    source: &DistSource,
) -> Result<RetrievalReport> {
    std::fs::create_dir_all(&config.lists_dir).map_err(|e| {
        DistError::RepositoryIoPath(format!("{}", config.lists_dir.display()), e)
    })?;

    let release_path = source.release_list_path(&config.lists_dir);
    let url = source.release_url();

    info!("fetching {}", url);
    fetcher.fetch(&url, &release_path)?;

    let release = match load_release(&release_path, &config.architectures, source) {
        Ok(release) => release,
        Err(e) => {
            if let Err(remove_err) = std::fs::remove_file(&release_path) {
                warn!("failed to remove {}: {}", release_path.display(), remove_err);
            }

            return Err(e);
        }
    };

    ReleaseRetriever::new(
        fetcher,
        &config.architectures,
        &config.lists_dir,
        &config.tmp_dir,
    )
    .retrieve_packages(&release, source)
}

/// Aggregate result of [sync_all()].
#[derive(Debug, Default)]
pub struct SyncSummary {
    /// Sources whose indices were all retrieved.
    pub complete: Vec<String>,
    /// Sources with some indices that could not be retrieved.
    pub partial: Vec<(String, Vec<IndexPair>)>,
    /// Sources that could not be synchronized at all.
    pub failed: Vec<(String, DistError)>,
}

impl SyncSummary {
    pub fn is_complete(&self) -> bool {
        self.partial.is_empty() && self.failed.is_empty()
    }
}

/// Synchronize every source in a [ClientConfig], in order.
///
/// Errors for individual sources are logged and recorded in the summary.
/// An error is only returned if the configured sources are invalid.
pub fn sync_all(fetcher: &dyn IndexFetcher, config: &ClientConfig) -> Result<SyncSummary> {
    let mut summary = SyncSummary::default();

    for source in config.dist_sources()? {
        match sync_source(fetcher, config, &source) {
            Ok(report) if report.is_complete() => {
                info!(
                    "{}: retrieved {} indices",
                    source.name(),
                    report.retrieved.len()
                );
                summary.complete.push(source.name().to_string());
            }
            Ok(report) => {
                warn!(
                    "{}: retrieved {} indices; {} failed",
                    source.name(),
                    report.retrieved.len(),
                    report.failed.len()
                );
                summary
                    .partial
                    .push((source.name().to_string(), report.failed));
            }
            Err(e) => {
                error!("{}: {}", source.name(), e);
                summary.failed.push((source.name().to_string(), e));
            }
        }
    }

    Ok(summary)
}
