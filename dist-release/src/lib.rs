// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Package repository `Release` files and package index retrieval.

This crate implements the client side of synchronizing package metadata from
opkg/apt style repositories. A repository publishes distributions under
`<url>/dists/<name>/`. Each distribution has a `Release` file describing the
architectures and components it provides along with checksums of the index
files it contains. Each (component, architecture) pair has a `Packages` index,
optionally gzip compressed.

The canonical home of this crate is <https://github.com/indygreg/PyOxidizer>. Please file issues
and pull requests there.

# A Tour of Functionality

[release::Release] represents a parsed `Release` file. [release::ReleaseParser] is a line
oriented parser for them; most callers will want [release::Release::from_reader()] or
[release::Release::from_path()]. Parsing is lenient: malformed lines are logged and skipped.
Checksum sections are represented by [checksum::ChecksumTable]. The [token] module contains the
list tokenizer used for list fields.

[source::DistSource] names a distribution within a repository and knows where its files live,
both remotely and in the local lists directory.

[release::Release::validate()] checks a release against the architectures the client supports
([config::ArchitectureConfig]) and the components it wants.

[retrieve::ReleaseRetriever] fetches the `Packages` indices of a validated release, preferring
compressed transfers and falling back to uncompressed ones. Checksums from the `Release` file
are verified in an advisory manner. Transports implement [fetch::IndexFetcher]:
[filesystem::FilesystemFetcher] reads local repositories and `http::HttpFetcher` talks HTTP.
[fetch::UrlFetcher] picks one based on the URL.

The [sync] module ties all of this together: [sync::sync_source()] fetches and validates a
`Release` file and retrieves its indices. [sync::sync_all()] does this for every source in a
[config::ClientConfig].

# Crate Features

The optional and enabled-by-default `http` feature enables HTTP client support.
*/

pub mod checksum;
pub mod config;
pub mod error;
pub mod fetch;
pub mod filesystem;
#[cfg(feature = "http")]
pub mod http;
pub mod io;
pub mod release;
pub mod retrieve;
pub mod source;
pub mod sync;
pub mod token;
