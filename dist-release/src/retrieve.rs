// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Retrieval of `Packages` indices described by a `Release` file.

[ReleaseRetriever] fetches the `Packages` index of every (component,
architecture) pair that is both requested and advertised. For each pair, the
gzip compressed index is tried first (when the source prefers compressed
transfers) and the uncompressed index is fetched if that fails for any reason.

Failures are per pair: a pair that can't be retrieved is recorded in the
[RetrievalReport] and retrieval continues with the next pair.

Checksums are advisory. When the `Release` file carries a digest for an
index, the digest of the local copy is computed, recorded in a sidecar file
and compared. Mismatches are logged and reported but never cause the index to
be discarded.
*/

use {
    crate::{
        checksum::ChecksumType,
        config::ArchitectureConfig,
        error::{DistError, Result},
        fetch::IndexFetcher,
        io::{decompress_file, digest_file, Compression},
        release::Release,
        source::DistSource,
    },
    log::{debug, error, info, warn},
    std::{
        fmt::{Display, Formatter},
        path::{Path, PathBuf},
    },
};

/// A (component, architecture) pair identifying a single `Packages` index.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct IndexPair {
    pub component: String,
    pub architecture: String,
}

impl IndexPair {
    pub fn new(component: impl ToString, architecture: impl ToString) -> Self {
        Self {
            component: component.to_string(),
            architecture: architecture.to_string(),
        }
    }
}

impl Display for IndexPair {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.component, self.architecture)
    }
}

/// How a retrieved index was obtained.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IndexOrigin {
    /// Compressed transfer followed by local decompression.
    Compressed,
    /// Uncompressed transfer.
    Plain,
}

/// A successfully retrieved index.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RetrievedIndex {
    pub pair: IndexPair,
    /// Local path of the uncompressed index.
    pub path: PathBuf,
    pub origin: IndexOrigin,
}

/// A retrieved index whose content doesn't match its advertised checksum.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IntegrityMismatch {
    pub pair: IndexPair,
    pub checksum: ChecksumType,
    pub expected_digest: String,
    pub expected_size: u64,
    pub actual_digest: String,
    pub actual_size: u64,
}

/// Overall outcome of a retrieval.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RetrievalOutcome {
    /// Every attempted pair was retrieved.
    Complete,
    /// Some pairs could not be retrieved.
    Partial { failed: Vec<IndexPair> },
}

/// Describes the result of [ReleaseRetriever::retrieve_packages()].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RetrievalReport {
    /// Indices written to the lists directory.
    pub retrieved: Vec<RetrievedIndex>,
    /// Pairs for which neither transfer succeeded.
    pub failed: Vec<IndexPair>,
    /// Requested components the release doesn't advertise.
    pub skipped: Vec<String>,
    /// Retrieved indices failing checksum verification.
    pub mismatches: Vec<IntegrityMismatch>,
}

impl RetrievalReport {
    pub fn outcome(&self) -> RetrievalOutcome {
        if self.failed.is_empty() {
            RetrievalOutcome::Complete
        } else {
            RetrievalOutcome::Partial {
                failed: self.failed.clone(),
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A scratch file deleted when dropped.
struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("failed to remove {}: {}", self.path.display(), e),
        }
    }
}

/// Retrieves `Packages` indices for a distribution.
pub struct ReleaseRetriever<'a> {
    fetcher: &'a dyn IndexFetcher,
    architectures: &'a ArchitectureConfig,
    lists_dir: &'a Path,
    tmp_dir: &'a Path,
}

impl<'a> ReleaseRetriever<'a> {
    /// Construct a new instance.
    ///
    /// Indices are written to `lists_dir`. Compressed transfers land in
    /// `tmp_dir` until decompressed.
    pub fn new(
        fetcher: &'a dyn IndexFetcher,
        architectures: &'a ArchitectureConfig,
        lists_dir: &'a Path,
        tmp_dir: &'a Path,
    ) -> Self {
        Self {
            fetcher,
            architectures,
            lists_dir,
            tmp_dir,
        }
    }

    /// Retrieve all `Packages` indices of a distribution.
    ///
    /// Architectures are visited in configuration order within each working
    /// component of `release`. Architectures not advertised by the release are
    /// skipped. Errors are only returned if the lists or scratch directory
    /// can't be created.
    pub fn retrieve_packages(
        &self,
        release: &Release,
        source: &DistSource,
    ) -> Result<RetrievalReport> {
        for dir in [self.lists_dir, self.tmp_dir] {
            std::fs::create_dir_all(dir)
                .map_err(|e| DistError::RepositoryIoPath(format!("{}", dir.display()), e))?;
        }

        let mut report = RetrievalReport::default();

        for component in release.working_components() {
            if !release.has_component(component) {
                error!(
                    "component {} is not defined by distribution {}",
                    component,
                    source.name()
                );
                report.skipped.push(component.clone());
                continue;
            }

            for architecture in self.architectures.iter_names() {
                if !release.has_architecture(architecture) {
                    debug!(
                        "distribution {} does not provide architecture {}",
                        source.name(),
                        architecture
                    );
                    continue;
                }

                let pair = IndexPair::new(component, architecture);
                let dest = source.packages_list_path(self.lists_dir, component, architecture);

                let origin = match self.retrieve_index(source, &pair, &dest) {
                    Ok(origin) => origin,
                    Err(e) => {
                        error!(
                            "failed to retrieve {} index of {}: {}",
                            pair,
                            source.name(),
                            e
                        );
                        report.failed.push(pair);
                        continue;
                    }
                };

                match self.verify_index(release, source, &pair, &dest) {
                    Ok(Some(mismatch)) => report.mismatches.push(mismatch),
                    Ok(None) => {}
                    Err(e) => warn!("unable to verify {}: {}", dest.display(), e),
                }

                report.retrieved.push(RetrievedIndex {
                    pair,
                    path: dest,
                    origin,
                });
            }
        }

        Ok(report)
    }

    fn retrieve_index(
        &self,
        source: &DistSource,
        pair: &IndexPair,
        dest: &Path,
    ) -> Result<IndexOrigin> {
        if source.prefer_compressed() {
            match self.retrieve_compressed(source, pair, dest) {
                Ok(()) => return Ok(IndexOrigin::Compressed),
                Err(e) => warn!(
                    "compressed {} index of {} unavailable ({}); trying uncompressed",
                    pair,
                    source.name(),
                    e
                ),
            }
        }

        let url = source.packages_url(&pair.component, &pair.architecture, Compression::None);
        info!("fetching {}", url);
        self.fetcher.fetch(&url, dest)?;

        Ok(IndexOrigin::Plain)
    }

    fn retrieve_compressed(&self, source: &DistSource, pair: &IndexPair, dest: &Path) -> Result<()> {
        let compression = Compression::Gzip;
        let url = source.packages_url(&pair.component, &pair.architecture, compression);
        let scratch = ScratchFile::new(source.packages_scratch_path(
            self.tmp_dir,
            &pair.component,
            &pair.architecture,
            compression,
        ));

        info!("fetching {}", url);
        self.fetcher.fetch(&url, scratch.path())?;

        debug!("inflating {} to {}", url, dest.display());
        if let Err(e) = decompress_file(compression, scratch.path(), dest) {
            if let Err(remove_err) = std::fs::remove_file(dest) {
                if remove_err.kind() != std::io::ErrorKind::NotFound {
                    warn!("failed to remove {}: {}", dest.display(), remove_err);
                }
            }

            return Err(e);
        }

        Ok(())
    }

    /// Verify a retrieved index against the strongest checksum advertised for it.
    fn verify_index(
        &self,
        release: &Release,
        source: &DistSource,
        pair: &IndexPair,
        dest: &Path,
    ) -> Result<Option<IntegrityMismatch>> {
        let path = source.packages_path(&pair.component, &pair.architecture);

        let (checksum, entry) = if let Some(found) = ChecksumType::preferred_order()
            .find_map(|checksum| {
                release
                    .checksum_entry(checksum, &path, None)
                    .map(|entry| (checksum, entry))
            }) {
            found
        } else {
            debug!("no checksum entry for {}", path);
            return Ok(None);
        };

        let (digest, size) = digest_file(dest, checksum)?;

        if entry.digest.chars().all(|c| c.is_ascii_hexdigit()) {
            let sidecar = source.digest_list_path(self.lists_dir, &entry.digest);
            std::fs::write(&sidecar, format!("{} {}\n", digest, size))
                .map_err(|e| DistError::RepositoryIoPath(format!("{}", sidecar.display()), e))?;
        } else {
            warn!("not recording digest of {}: bad expected digest {}", path, entry.digest);
        }

        if digest.eq_ignore_ascii_case(&entry.digest) && size == entry.size {
            debug!("{} digest verified", path);
            return Ok(None);
        }

        warn!(
            "{} of {} does not match release: expected {} ({} bytes); got {} ({} bytes)",
            checksum.field_name(),
            dest.display(),
            entry.digest,
            entry.size,
            digest,
            size
        );

        Ok(Some(IntegrityMismatch {
            pair: pair.clone(),
            checksum,
            expected_digest: entry.digest.clone(),
            expected_size: entry.size,
            actual_digest: digest,
            actual_size: size,
        }))
    }
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::filesystem::FilesystemFetcher,
        indoc::indoc,
        libflate::gzip::Encoder,
        std::{cell::RefCell, io::Write},
    };

    const PACKAGES_ARM: &[u8] = b"Package: foo\nArchitecture: arm\n";
    const PACKAGES_MIPS: &[u8] = b"Package: bar\nArchitecture: mips\n";

    /// Records requested URLs and serves them from the filesystem.
    #[derive(Default)]
    struct RecordingFetcher {
        inner: FilesystemFetcher,
        urls: RefCell<Vec<String>>,
    }

    impl IndexFetcher for RecordingFetcher {
        fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
            self.urls.borrow_mut().push(url.to_string());
            self.inner.fetch(url, dest)
        }
    }

    fn gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut encoder = Encoder::new(Vec::new())?;
        encoder.write_all(data)?;
        encoder.finish().into_result()
    }

    fn write_repo_file(repo: &Path, path: &str, data: &[u8]) -> std::io::Result<()> {
        let path = repo.join("dists").join("stable").join(path);
        std::fs::create_dir_all(path.parent().expect("repository paths have a parent"))?;
        std::fs::write(path, data)
    }

    struct Env {
        _td: tempfile::TempDir,
        repo: PathBuf,
        lists: PathBuf,
        tmp: PathBuf,
    }

    impl Env {
        fn new() -> Result<Self> {
            let td = tempfile::tempdir()?;
            let repo = td.path().join("repo");
            let lists = td.path().join("lists");
            let tmp = td.path().join("tmp");

            Ok(Self {
                _td: td,
                repo,
                lists,
                tmp,
            })
        }

        fn source(&self, components: &str, prefer_compressed: bool) -> Result<DistSource> {
            DistSource::new(
                "stable",
                format!("{}", self.repo.display()),
                components,
                prefer_compressed,
            )
        }

        fn tmp_is_empty(&self) -> Result<bool> {
            Ok(std::fs::read_dir(&self.tmp)?.next().is_none())
        }
    }

    fn release(body: &str) -> Result<Release> {
        Release::parse_str(body)
    }

    #[test]
    fn partial_failure_attempts_all_pairs() -> Result<()> {
        let env = Env::new()?;

        // main/arm only compressed, main/mips only plain, contrib/arm both,
        // contrib/mips nothing.
        write_repo_file(&env.repo, "main/binary-arm/Packages.gz", &gzip(PACKAGES_ARM)?)?;
        write_repo_file(&env.repo, "main/binary-mips/Packages", PACKAGES_MIPS)?;
        write_repo_file(&env.repo, "contrib/binary-arm/Packages.gz", &gzip(PACKAGES_ARM)?)?;
        write_repo_file(&env.repo, "contrib/binary-arm/Packages", b"unused")?;

        let release = release(indoc! {"
            Codename: stable
            Architectures: arm mips
            Components: main contrib
        "})?;
        let source = env.source("main contrib", true)?;
        let architectures = ArchitectureConfig::new([("arm", 10), ("mips", 5)]);
        let fetcher = RecordingFetcher::default();

        let report = ReleaseRetriever::new(&fetcher, &architectures, &env.lists, &env.tmp)
            .retrieve_packages(&release, &source)?;

        assert_eq!(
            report.outcome(),
            RetrievalOutcome::Partial {
                failed: vec![IndexPair::new("contrib", "mips")]
            }
        );
        assert!(!report.is_complete());
        assert_eq!(report.retrieved.len(), 3);
        assert!(report.mismatches.is_empty());
        assert!(report.skipped.is_empty());

        assert_eq!(
            report
                .retrieved
                .iter()
                .map(|r| (r.pair.to_string(), r.origin))
                .collect::<Vec<_>>(),
            vec![
                ("main/arm".to_string(), IndexOrigin::Compressed),
                ("main/mips".to_string(), IndexOrigin::Plain),
                ("contrib/arm".to_string(), IndexOrigin::Compressed),
            ]
        );

        assert_eq!(std::fs::read(env.lists.join("stable-arm-main"))?, PACKAGES_ARM);
        assert_eq!(std::fs::read(env.lists.join("stable-mips-main"))?, PACKAGES_MIPS);
        assert_eq!(std::fs::read(env.lists.join("stable-arm-contrib"))?, PACKAGES_ARM);
        assert!(!env.lists.join("stable-mips-contrib").exists());
        assert!(env.tmp_is_empty()?);

        // Each failing pair costs exactly 2 attempts, successful compressed
        // pairs exactly 1.
        assert_eq!(fetcher.urls.borrow().len(), 1 + 2 + 1 + 2);

        Ok(())
    }

    #[test]
    fn corrupt_compressed_falls_back() -> Result<()> {
        let env = Env::new()?;

        write_repo_file(&env.repo, "main/binary-arm/Packages.gz", b"not gzip data")?;
        write_repo_file(&env.repo, "main/binary-arm/Packages", PACKAGES_ARM)?;

        let release = release("Architectures: arm\nComponents: main\n")?;
        let source = env.source("main", true)?;
        let architectures = ArchitectureConfig::new([("arm", 1)]);
        let fetcher = RecordingFetcher::default();

        let report = ReleaseRetriever::new(&fetcher, &architectures, &env.lists, &env.tmp)
            .retrieve_packages(&release, &source)?;

        assert_eq!(report.outcome(), RetrievalOutcome::Complete);
        assert_eq!(report.retrieved.len(), 1);
        assert_eq!(report.retrieved[0].origin, IndexOrigin::Plain);
        assert_eq!(std::fs::read(&report.retrieved[0].path)?, PACKAGES_ARM);

        let urls = fetcher.urls.borrow();
        assert_eq!(urls.len(), 2);
        assert!(urls[0].ends_with("/dists/stable/main/binary-arm/Packages.gz"));
        assert!(urls[1].ends_with("/dists/stable/main/binary-arm/Packages"));

        assert!(env.tmp_is_empty()?);

        Ok(())
    }

    #[test]
    fn corrupt_compressed_without_plain() -> Result<()> {
        let env = Env::new()?;

        write_repo_file(&env.repo, "main/binary-arm/Packages.gz", b"not gzip data")?;

        let release = release("Architectures: arm\nComponents: main\n")?;
        let source = env.source("main", true)?;
        let architectures = ArchitectureConfig::new([("arm", 1)]);
        let fetcher = FilesystemFetcher::default();

        let report = ReleaseRetriever::new(&fetcher, &architectures, &env.lists, &env.tmp)
            .retrieve_packages(&release, &source)?;

        assert_eq!(report.failed, vec![IndexPair::new("main", "arm")]);
        assert!(!env.lists.join("stable-arm-main").exists());
        assert!(env.tmp_is_empty()?);

        Ok(())
    }

    #[test]
    fn uncompressed_only() -> Result<()> {
        let env = Env::new()?;

        write_repo_file(&env.repo, "main/binary-arm/Packages.gz", &gzip(PACKAGES_MIPS)?)?;
        write_repo_file(&env.repo, "main/binary-arm/Packages", PACKAGES_ARM)?;

        let release = release("Architectures: arm\nComponents: main\n")?;
        let source = env.source("main", false)?;
        let architectures = ArchitectureConfig::new([("arm", 1)]);
        let fetcher = RecordingFetcher::default();

        let report = ReleaseRetriever::new(&fetcher, &architectures, &env.lists, &env.tmp)
            .retrieve_packages(&release, &source)?;

        assert!(report.is_complete());
        assert_eq!(report.retrieved[0].origin, IndexOrigin::Plain);
        assert_eq!(std::fs::read(env.lists.join("stable-arm-main"))?, PACKAGES_ARM);

        let urls = fetcher.urls.borrow();
        assert_eq!(urls.len(), 1);
        assert!(!urls[0].ends_with(".gz"));

        Ok(())
    }

    #[test]
    fn unadvertised_pairs_skipped() -> Result<()> {
        let env = Env::new()?;

        write_repo_file(&env.repo, "main/binary-arm/Packages", PACKAGES_ARM)?;

        let mut release = release("Architectures: arm\nComponents: main\n")?;
        release.set_requested_components(["main", "extra"]);

        let source = env.source("main extra", false)?;
        let architectures = ArchitectureConfig::new([("x86", 20), ("arm", 10)]);
        let fetcher = RecordingFetcher::default();

        let report = ReleaseRetriever::new(&fetcher, &architectures, &env.lists, &env.tmp)
            .retrieve_packages(&release, &source)?;

        assert!(report.is_complete());
        assert_eq!(report.skipped, vec!["extra".to_string()]);
        assert_eq!(report.retrieved.len(), 1);
        assert_eq!(report.retrieved[0].pair, IndexPair::new("main", "arm"));

        let urls = fetcher.urls.borrow();
        assert_eq!(urls.len(), 1);
        assert!(urls.iter().all(|url| !url.contains("x86") && !url.contains("extra")));

        Ok(())
    }

    #[test]
    fn checksum_verification() -> Result<()> {
        let env = Env::new()?;

        write_repo_file(&env.repo, "main/binary-arm/Packages", b"abc")?;
        write_repo_file(&env.repo, "main/binary-mips/Packages", b"abcd")?;

        // MD5 of "abc" is correct. The mips entry is deliberately wrong.
        let release = release(indoc! {"
            Architectures: arm mips
            Components: main
            MD5sum:
             900150983cd24fb0d6963f7d28e17f72 3 main/binary-arm/Packages
             00000000000000000000000000000000 4 main/binary-mips/Packages
        "})?;
        let source = env.source("main", false)?;
        let architectures = ArchitectureConfig::new([("arm", 1), ("mips", 1)]);
        let fetcher = FilesystemFetcher::default();

        let report = ReleaseRetriever::new(&fetcher, &architectures, &env.lists, &env.tmp)
            .retrieve_packages(&release, &source)?;

        assert_eq!(report.outcome(), RetrievalOutcome::Complete);
        assert_eq!(report.retrieved.len(), 2);
        assert_eq!(
            report.mismatches,
            vec![IntegrityMismatch {
                pair: IndexPair::new("main", "mips"),
                checksum: ChecksumType::Md5,
                expected_digest: "00000000000000000000000000000000".to_string(),
                expected_size: 4,
                actual_digest: "e2fc714c4727ee9395f324cd2e7f331f".to_string(),
                actual_size: 4,
            }]
        );

        // The mismatching index is kept.
        assert_eq!(std::fs::read(env.lists.join("stable-mips-main"))?, b"abcd");

        assert_eq!(
            std::fs::read_to_string(env.lists.join("stable-900150983cd24fb0d6963f7d28e17f72"))?,
            "900150983cd24fb0d6963f7d28e17f72 3\n"
        );
        assert_eq!(
            std::fs::read_to_string(env.lists.join("stable-00000000000000000000000000000000"))?,
            "e2fc714c4727ee9395f324cd2e7f331f 4\n"
        );

        Ok(())
    }

    #[test]
    fn checksum_falls_back_to_weaker_table() -> Result<()> {
        let env = Env::new()?;

        write_repo_file(&env.repo, "main/binary-arm/Packages", b"abcd")?;

        // SHA256 only covers the compressed index. MD5 covers the uncompressed one.
        let release = release(indoc! {"
            Architectures: arm
            Components: main
            MD5sum:
             900150983cd24fb0d6963f7d28e17f72 3 main/binary-arm/Packages
            SHA256:
             e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855 20 main/binary-arm/Packages.gz
        "})?;
        let source = env.source("main", false)?;
        let architectures = ArchitectureConfig::new([("arm", 1)]);
        let fetcher = FilesystemFetcher::default();

        let report = ReleaseRetriever::new(&fetcher, &architectures, &env.lists, &env.tmp)
            .retrieve_packages(&release, &source)?;

        assert!(report.is_complete());
        assert_eq!(report.mismatches.len(), 1);
        assert_eq!(report.mismatches[0].checksum, ChecksumType::Md5);
        assert_eq!(
            report.mismatches[0].expected_digest,
            "900150983cd24fb0d6963f7d28e17f72"
        );
        assert_eq!(
            std::fs::read_to_string(env.lists.join("stable-900150983cd24fb0d6963f7d28e17f72"))?,
            "e2fc714c4727ee9395f324cd2e7f331f 4\n"
        );

        Ok(())
    }

    #[test]
    fn similar_components_use_distinct_files() -> Result<()> {
        let env = Env::new()?;

        write_repo_file(&env.repo, "updates/main/binary-arm/Packages", b"A")?;
        write_repo_file(&env.repo, "updates_main/binary-arm/Packages", b"B")?;

        let release = release("Architectures: arm\nComponents: updates/main updates_main\n")?;
        let source = env.source("updates/main updates_main", false)?;
        let architectures = ArchitectureConfig::new([("arm", 1)]);
        let fetcher = FilesystemFetcher::default();

        let report = ReleaseRetriever::new(&fetcher, &architectures, &env.lists, &env.tmp)
            .retrieve_packages(&release, &source)?;

        assert!(report.is_complete());
        assert_eq!(report.retrieved.len(), 2);
        assert_ne!(report.retrieved[0].path, report.retrieved[1].path);
        assert_eq!(std::fs::read(&report.retrieved[0].path)?, b"A");
        assert_eq!(std::fs::read(&report.retrieved[1].path)?, b"B");

        Ok(())
    }

    #[test]
    fn scratch_file_removed() -> Result<()> {
        let td = tempfile::tempdir()?;
        let path = td.path().join("scratch.gz");
        std::fs::write(&path, b"data")?;

        {
            let scratch = ScratchFile::new(path.clone());
            assert!(scratch.path().exists());
        }
        assert!(!path.exists());

        // Dropping a guard whose file never materialized is fine.
        drop(ScratchFile::new(td.path().join("missing.gz")));

        Ok(())
    }
}
