// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! I/O helpers. */

use {
    crate::{
        checksum::ChecksumType,
        error::{DistError, Result},
    },
    digest::Digest,
    std::{
        io::{Read, Write},
        path::Path,
    },
};

/// Compression format used for index files.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Compression {
    /// No compression (no extension).
    None,

    /// Gzip compression (.gz extension).
    Gzip,
}

impl Compression {
    /// Filename extension for files compressed in this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Gzip => ".gz",
        }
    }
}

fn io_path_error(path: &Path) -> impl FnOnce(std::io::Error) -> DistError + '_ {
    move |e| DistError::RepositoryIoPath(format!("{}", path.display()), e)
}

/// Decompress a file into another file.
///
/// Returns the number of bytes written to `dest`.
///
/// Malformed compressed input results in [DistError::Decompress]. Failure to
/// read `source` or write `dest` results in [DistError::RepositoryIoPath].
pub fn decompress_file(compression: Compression, source: &Path, dest: &Path) -> Result<u64> {
    let fh = std::fs::File::open(source).map_err(io_path_error(source))?;
    let reader = std::io::BufReader::new(fh);

    let corrupt = |e| DistError::Decompress(format!("{}", source.display()), e);

    let mut reader: Box<dyn Read> = match compression {
        Compression::None => Box::new(reader),
        Compression::Gzip => Box::new(libflate::gzip::Decoder::new(reader).map_err(corrupt)?),
    };

    let mut writer =
        std::io::BufWriter::new(std::fs::File::create(dest).map_err(io_path_error(dest))?);

    let mut buf = [0u8; 32768];
    let mut written = 0;

    loop {
        let count = reader.read(&mut buf).map_err(corrupt)?;
        if count == 0 {
            break;
        }

        writer
            .write_all(&buf[0..count])
            .map_err(io_path_error(dest))?;
        written += count as u64;
    }

    writer.flush().map_err(io_path_error(dest))?;

    Ok(written)
}

fn digest_reader<D: Digest, R: Read>(mut reader: R) -> std::io::Result<(String, u64)> {
    let mut hasher = D::new();
    let mut buf = [0u8; 32768];
    let mut size = 0;

    loop {
        let count = reader.read(&mut buf)?;
        if count == 0 {
            break;
        }

        hasher.update(&buf[0..count]);
        size += count as u64;
    }

    Ok((hex::encode(hasher.finalize()), size))
}

/// Compute the hex encoded content digest and byte size of a file.
pub fn digest_file(path: &Path, checksum: ChecksumType) -> Result<(String, u64)> {
    let fh = std::fs::File::open(path).map_err(io_path_error(path))?;
    let reader = std::io::BufReader::new(fh);

    match checksum {
        ChecksumType::Md5 => digest_reader::<md5::Md5, _>(reader),
        ChecksumType::Sha1 => digest_reader::<sha1::Sha1, _>(reader),
        ChecksumType::Sha256 => digest_reader::<sha2::Sha256, _>(reader),
    }
    .map_err(io_path_error(path))
}
