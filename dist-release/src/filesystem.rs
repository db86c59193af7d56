// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Filesystem based repositories. */

use {
    crate::{
        error::{DistError, Result},
        fetch::IndexFetcher,
    },
    std::path::{Path, PathBuf},
    url::Url,
};

/// An [IndexFetcher] that copies files from the local filesystem.
///
/// URLs can be plain filesystem paths or `file://` URLs.
#[derive(Clone, Debug, Default)]
pub struct FilesystemFetcher {}

fn resolve_path(url: &str) -> Result<PathBuf> {
    if url.starts_with("file://") {
        Url::parse(url)?.to_file_path().map_err(|_| DistError::Fetch {
            url: url.to_string(),
            message: "error converting URL to filesystem path".to_string(),
        })
    } else {
        Ok(PathBuf::from(url))
    }
}

impl IndexFetcher for FilesystemFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        let source = resolve_path(url)?;

        if let Err(e) = std::fs::copy(&source, dest) {
            // A failed copy may leave a truncated destination behind.
            let _ = std::fs::remove_file(dest);

            return Err(DistError::RepositoryIoPath(
                format!("{}", source.display()),
                e,
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn copy_and_missing() -> Result<()> {
        let td = tempfile::tempdir()?;
        let source = td.path().join("Packages");
        std::fs::write(&source, b"Package: foo\n")?;

        let dest = td.path().join("copy");
        FilesystemFetcher::default().fetch(&format!("{}", source.display()), &dest)?;
        assert_eq!(std::fs::read(&dest)?, b"Package: foo\n");

        let dest = td.path().join("missing-copy");
        assert!(matches!(
            FilesystemFetcher::default().fetch(
                &format!("{}", td.path().join("missing").display()),
                &dest
            ),
            Err(DistError::RepositoryIoPath(_, _))
        ));
        assert!(!dest.exists());

        Ok(())
    }
}
