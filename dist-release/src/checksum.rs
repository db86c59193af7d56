// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Checksum tables published in `Release` files.

Some `Release` file variants publish per-file content digests under
section fields like `MD5sum` and `SHA256`. Each line of such a section
describes one indexed file:

```text
MD5sum:
 0d9d0cfe5ab2e5b5d6f5f7b1b1a6f4b2 4096 main/binary-arm/Packages
```

[ChecksumTable] holds the entries of one such section and [ChecksumEntry]
describes a single line.
*/

use {
    crate::error::{DistError, Result},
    std::str::FromStr,
};

/// Checksum type / digest mechanism used in a release file.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ChecksumType {
    /// MD5.
    Md5,

    /// SHA-1.
    Sha1,

    /// SHA-256.
    Sha256,
}

impl ChecksumType {
    /// Emit variants in their preferred usage order.
    pub fn preferred_order() -> impl Iterator<Item = ChecksumType> {
        [Self::Sha256, Self::Sha1, Self::Md5].into_iter()
    }

    /// Name of the field in `Release` files starting a section of this type.
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Md5 => "MD5sum",
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
        }
    }
}

/// An entry for a file in a checksum section of a `Release` file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChecksumEntry {
    /// Path of the file relative to the distribution directory.
    ///
    /// e.g. `main/binary-arm/Packages.gz`.
    pub path: String,

    /// Hex encoded content digest, as it appears in the source file.
    pub digest: String,

    /// The size of the file in bytes.
    pub size: u64,
}

impl ChecksumEntry {
    /// Parse an entry from the tokens of a checksum section line.
    ///
    /// Tokens are in `<digest> <size> <path>` order. Exactly 3 tokens must
    /// be present.
    pub fn from_tokens(tokens: &[String]) -> Result<Self> {
        match tokens {
            [digest, size, path] => {
                let size = u64::from_str(size)
                    .map_err(|e| DistError::ReleaseBadSize(size.to_string(), e))?;

                Ok(Self {
                    path: path.to_string(),
                    digest: digest.to_string(),
                    size,
                })
            }
            _ => Err(DistError::ReleaseMalformedChecksum(tokens.join(" "))),
        }
    }
}

/// The entries of a single checksum section, in file order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChecksumTable {
    checksum: ChecksumType,
    entries: Vec<ChecksumEntry>,
}

impl ChecksumTable {
    /// Construct an empty table holding digests of the given type.
    pub fn new(checksum: ChecksumType) -> Self {
        Self {
            checksum,
            entries: vec![],
        }
    }

    /// The digest type of entries in this table.
    pub fn checksum(&self) -> ChecksumType {
        self.checksum
    }

    /// Append an entry.
    pub fn push(&mut self, entry: ChecksumEntry) {
        self.entries.push(entry);
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in file order.
    pub fn iter(&self) -> impl Iterator<Item = &ChecksumEntry> {
        self.entries.iter()
    }

    /// Find the entry for a path.
    ///
    /// If `extension` is defined, the searched path is `<path>.<extension>`.
    /// Matching is an exact string comparison. The first matching entry wins.
    pub fn find(&self, path: &str, extension: Option<&str>) -> Option<&ChecksumEntry> {
        match extension {
            Some(extension) => {
                let wanted = format!("{}.{}", path, extension);
                self.entries.iter().find(|entry| entry.path == wanted)
            }
            None => self.entries.iter().find(|entry| entry.path == path),
        }
    }
}
