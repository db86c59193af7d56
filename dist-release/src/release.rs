// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! `Release` file primitives.

`Release` files are published alongside each distribution of a repository.
They advertise the architectures and components the distribution provides
and, in some variants, the content digests of the index files within it.

```text
Codename: stable
Date: Sat, 09 Oct 2021 09:34:56 UTC
Architectures: all arm mips
Components: main contrib
MD5sum:
 2b3d0c4f1c0e7a6a0b8f19b0d6a3c2e1     4096 main/binary-arm/Packages
SHA256:
 3957f28db16e3f28c7b34ae84f1c929c567de6970f3f1b95dac9b498dd80fe63     4096 main/binary-arm/Packages
```

[Release] represents a parsed `Release` file. [ReleaseParser] implements a
line based parser that is fed lines of text and incrementally builds a
[Release].

The format is parsed leniently: lines that are not understood are logged
and skipped, so files containing fields we don't know about can still be
used. Only failure to read the underlying stream aborts parsing.
*/

use {
    crate::{
        checksum::{ChecksumEntry, ChecksumTable, ChecksumType},
        config::ArchitectureConfig,
        error::{DistError, Result},
        token::parse_words,
    },
    log::{debug, warn},
    std::{
        collections::BTreeMap,
        io::{BufRead, Write},
        path::Path,
    },
};

/// Fields holding a single string value.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum SimpleField {
    Codename,
    Date,
}

/// Fields holding a whitespace delimited list of values.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ListField {
    Architectures,
    Components,
}

/// How the value of a recognized field is handled.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum FieldKind {
    Simple(SimpleField),
    List(ListField),
    /// Start of a section of checksum entries on the following lines.
    ChecksumSection(ChecksumType),
}

/// Recognized fields. Names are matched case sensitively.
const FIELDS: &[(&str, FieldKind)] = &[
    ("Codename", FieldKind::Simple(SimpleField::Codename)),
    ("Date", FieldKind::Simple(SimpleField::Date)),
    ("Architectures", FieldKind::List(ListField::Architectures)),
    ("Components", FieldKind::List(ListField::Components)),
    ("MD5sum", FieldKind::ChecksumSection(ChecksumType::Md5)),
    // Spelling used by Debian repositories.
    ("MD5Sum", FieldKind::ChecksumSection(ChecksumType::Md5)),
    ("SHA1", FieldKind::ChecksumSection(ChecksumType::Sha1)),
    ("SHA256", FieldKind::ChecksumSection(ChecksumType::Sha256)),
];

/// Resolve the recognized field a line defines and the remainder of the line after the colon.
///
/// Values must be separated from the colon by whitespace. Section headers may
/// end at the colon.
fn match_field(line: &str) -> Option<(FieldKind, &str)> {
    FIELDS.iter().find_map(|(name, kind)| {
        line.strip_prefix(name)
            .and_then(|rest| rest.strip_prefix(':'))
            .filter(|value| {
                matches!(kind, FieldKind::ChecksumSection(_))
                    || value.is_empty()
                    || value.starts_with(char::is_whitespace)
            })
            .map(|value| (*kind, value))
    })
}

/// A parsed `Release` file.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Release {
    codename: Option<String>,
    date: Option<String>,
    architectures: Vec<String>,
    components: Vec<String>,
    checksums: BTreeMap<ChecksumType, ChecksumTable>,
    requested_components: Vec<String>,
}

impl Release {
    /// Construct an instance by reading data from a reader.
    ///
    /// Lines that can't be parsed are logged and skipped. An error is only
    /// returned if reading from `reader` fails.
    pub fn from_reader<R: BufRead>(mut reader: R) -> Result<Self> {
        let mut parser = ReleaseParser::default();
        let mut buf = vec![];

        loop {
            buf.clear();

            let bytes_read = reader
                .read_until(b'\n', &mut buf)
                .map_err(DistError::ReleaseRead)?;

            // .read_until() indicates EOF by Ok(0).
            if bytes_read == 0 {
                break;
            }

            let line = String::from_utf8_lossy(&buf);

            if let Err(e) = parser.write_line(&line) {
                let codename = parser.release.codename().unwrap_or("<unknown>");

                match e {
                    DistError::ReleaseUnknownField(_) => {
                        debug!("failed to parse release line for {}: {}", codename, e);
                    }
                    _ => {
                        warn!("failed to parse release line for {}: {}", codename, e);
                    }
                }
            }
        }

        Ok(parser.finish())
    }

    /// Construct an instance by reading a file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let fh = std::fs::File::open(path)
            .map_err(|e| DistError::RepositoryIoPath(format!("{}", path.display()), e))?;

        Self::from_reader(std::io::BufReader::new(fh))
    }

    /// Parse a `Release` file from a string.
    pub fn parse_str(s: &str) -> Result<Self> {
        Self::from_reader(std::io::BufReader::new(s.as_bytes()))
    }

    /// Codename of this distribution.
    pub fn codename(&self) -> Option<&str> {
        self.codename.as_deref()
    }

    /// Time the release file was created, as its raw string value.
    pub fn date(&self) -> Option<&str> {
        self.date.as_deref()
    }

    /// Machine architectures advertised by this distribution.
    pub fn architectures(&self) -> &[String] {
        &self.architectures
    }

    /// Names of components advertised by this distribution.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Components requested for retrieval.
    ///
    /// Empty if no explicit request was made.
    pub fn requested_components(&self) -> &[String] {
        &self.requested_components
    }

    /// Define the components to retrieve.
    ///
    /// Call [Self::validate()] afterwards to ensure the components exist.
    pub fn set_requested_components<I, S>(&mut self, components: I)
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.requested_components = components.into_iter().map(|c| c.to_string()).collect();
    }

    /// Components to retrieve.
    ///
    /// These are the requested components if any were requested or all
    /// advertised components otherwise.
    pub fn working_components(&self) -> &[String] {
        if self.requested_components.is_empty() {
            &self.components
        } else {
            &self.requested_components
        }
    }

    /// Whether this distribution advertises the given architecture.
    pub fn has_architecture(&self, architecture: &str) -> bool {
        self.architectures.iter().any(|a| a == architecture)
    }

    /// Whether this distribution advertises the given component.
    pub fn has_component(&self, component: &str) -> bool {
        self.components.iter().any(|c| c == component)
    }

    /// Ensure this instance is usable for retrieving indices.
    ///
    /// At least 1 advertised architecture must be supported by `architectures`
    /// and all requested components must be advertised. All missing components
    /// are reported in the returned error.
    pub fn validate(&self, architectures: &ArchitectureConfig) -> Result<()> {
        if !self
            .architectures
            .iter()
            .any(|arch| architectures.supports(arch))
        {
            return Err(DistError::ReleaseNoSupportedArchitecture(
                self.architectures.clone(),
            ));
        }

        let missing = self
            .requested_components
            .iter()
            .filter(|c| !self.has_component(c))
            .cloned()
            .collect::<Vec<_>>();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(DistError::ReleaseMissingComponents(missing))
        }
    }

    /// Obtain the checksum table of a given digest type, if present.
    pub fn checksum_table(&self, checksum: ChecksumType) -> Option<&ChecksumTable> {
        self.checksums.get(&checksum)
    }

    /// Iterate over all checksum tables.
    pub fn iter_checksum_tables(&self) -> impl Iterator<Item = &ChecksumTable> {
        self.checksums.values()
    }

    /// The strongest digest type this file has a checksum table for.
    pub fn preferred_checksum(&self) -> Option<ChecksumType> {
        ChecksumType::preferred_order().find(|checksum| self.checksums.contains_key(checksum))
    }

    /// Find the checksum entry for a file.
    ///
    /// If `extension` is defined, the searched path is `<path>.<extension>`.
    pub fn checksum_entry(
        &self,
        checksum: ChecksumType,
        path: &str,
        extension: Option<&str>,
    ) -> Option<&ChecksumEntry> {
        self.checksum_table(checksum)
            .and_then(|table| table.find(path, extension))
    }

    /// Obtain the size of a file as advertised by any checksum table.
    ///
    /// Tables are consulted weakest digest first.
    pub fn file_size(&self, path: &str, extension: Option<&str>) -> Option<u64> {
        [ChecksumType::Md5, ChecksumType::Sha1, ChecksumType::Sha256]
            .into_iter()
            .find_map(|checksum| self.checksum_entry(checksum, path, extension))
            .map(|entry| entry.size)
    }

    /// Write a single named field.
    ///
    /// The field name is matched case insensitively. Fields without a value
    /// are not written.
    pub fn write_field<W: Write>(&self, writer: &mut W, field: &str) -> Result<()> {
        match field.to_lowercase().as_str() {
            "codename" => {
                if let Some(v) = &self.codename {
                    writeln!(writer, "Codename: {}", v)?;
                }
            }
            "date" => {
                if let Some(v) = &self.date {
                    writeln!(writer, "Date: {}", v)?;
                }
            }
            "architectures" => write_list(writer, "Architectures", &self.architectures)?,
            "components" => write_list(writer, "Components", &self.components)?,
            "md5sum" => self.write_checksums(writer, ChecksumType::Md5)?,
            "sha1" => self.write_checksums(writer, ChecksumType::Sha1)?,
            "sha256" => self.write_checksums(writer, ChecksumType::Sha256)?,
            _ => return Err(DistError::ReleaseUnknownField(field.to_string())),
        }

        Ok(())
    }

    fn write_checksums<W: Write>(&self, writer: &mut W, checksum: ChecksumType) -> Result<()> {
        if let Some(table) = self.checksums.get(&checksum) {
            writeln!(writer, "{}:", checksum.field_name())?;

            for entry in table.iter() {
                writeln!(writer, " {} {:>10} {}", entry.digest, entry.size, entry.path)?;
            }
        }

        Ok(())
    }

    /// Serialize all fields to a writer.
    ///
    /// Output is terminated by an empty line.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        for field in [
            "Codename",
            "Date",
            "Architectures",
            "Components",
            "MD5sum",
            "SHA1",
            "SHA256",
        ] {
            self.write_field(writer, field)?;
        }

        writer.write_all(b"\n")?;

        Ok(())
    }
}

fn write_list<W: Write>(writer: &mut W, name: &str, values: &[String]) -> std::io::Result<()> {
    if values.is_empty() {
        return Ok(());
    }

    write!(writer, "{}:", name)?;
    for value in values {
        write!(writer, " {}", value)?;
    }
    writeln!(writer)
}

impl std::fmt::Display for Release {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut buf = vec![];
        self.write(&mut buf).map_err(|_| std::fmt::Error)?;

        f.write_str(&String::from_utf8_lossy(&buf))
    }
}

/// Holds parsing state for `Release` files.
///
/// Instances are fed lines of text via [Self::write_line()]. Once all lines
/// have been written, [Self::finish()] yields the parsed [Release].
///
/// Checksum entries are attributed to the checksum section most recently
/// started, as long as no other line intervened.
#[derive(Clone, Debug, Default)]
pub struct ReleaseParser {
    release: Release,
    section: Option<ChecksumType>,
    line_errors: usize,
}

impl ReleaseParser {
    /// Write a line to the parser.
    ///
    /// The line may contain its trailing line terminator.
    ///
    /// `Err` is returned if the line isn't understood. The line is skipped
    /// and the parser remains usable.
    pub fn write_line(&mut self, line: &str) -> Result<()> {
        let res = self.process_line(line);

        if res.is_err() {
            self.line_errors += 1;
        }

        res
    }

    /// Number of lines that failed to parse.
    pub fn line_errors(&self) -> usize {
        self.line_errors
    }

    /// Finish parsing, returning the parsed [Release].
    pub fn finish(self) -> Release {
        self.release
    }

    fn process_line(&mut self, line: &str) -> Result<()> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.trim().is_empty() {
            self.section = None;
            return Ok(());
        }

        if let Some(entry_line) = line.strip_prefix(' ') {
            return match self.section {
                Some(checksum) => {
                    let entry = ChecksumEntry::from_tokens(&parse_words(entry_line))?;

                    self.release
                        .checksums
                        .entry(checksum)
                        .or_insert_with(|| ChecksumTable::new(checksum))
                        .push(entry);

                    Ok(())
                }
                None => {
                    debug!("ignoring continuation of unrecognized field: {}", line);
                    Ok(())
                }
            };
        }

        let (kind, value) = match match_field(line) {
            Some(v) => v,
            None => {
                self.section = None;
                return Err(DistError::ReleaseUnknownField(line.to_string()));
            }
        };

        self.section = None;

        match kind {
            FieldKind::Simple(field) => {
                let value = Some(value.trim().to_string());

                match field {
                    SimpleField::Codename => self.release.codename = value,
                    SimpleField::Date => self.release.date = value,
                }
            }
            FieldKind::List(field) => {
                let values = parse_words(value);

                match field {
                    ListField::Architectures => self.release.architectures = values,
                    ListField::Components => self.release.components = values,
                }
            }
            FieldKind::ChecksumSection(checksum) => {
                self.release
                    .checksums
                    .entry(checksum)
                    .or_insert_with(|| ChecksumTable::new(checksum));
                self.section = Some(checksum);
            }
        }

        Ok(())
    }
}
