// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    clap::{Arg, ArgMatches, Command},
    dist_release::{
        config::ClientConfig,
        error::DistError,
        fetch::UrlFetcher,
        release::Release,
        sync::{sync_all, SyncSummary},
    },
    log::LevelFilter,
    std::io::Write,
    thiserror::Error,
};

/// Every source was fully synchronized.
pub const EXIT_COMPLETE: i32 = 0;
/// Some indices could not be retrieved.
pub const EXIT_PARTIAL: i32 = 1;
/// A source could not be synchronized or the command failed.
pub const EXIT_FATAL: i32 = 2;

const URLS_ABOUT: &str = "\
Repository URLs

Sources are located by a URL. Here is how they work.

If a value contains `://`, it will be parsed as a URL. Otherwise it will be
interpreted as a local filesystem path.

The following URL schemes (the part before the `://` in a URL) are recognized:

file://
   A local filesystem path. The path component of the URL is interpreted as
   a filesystem path.

http:// and https://
   A HTTP-based repository.

   Proxies defined by `http_proxy` and `https_proxy` environment variables
   are honored.

In all cases, the URL should point to the base of the repository. This is
the directory containing the `dists` sub-directory.
";

const UPDATE_ABOUT: &str = "\
Synchronize package indices of configured sources.

For every configured source, the `Release` file of the distribution is
fetched to the lists directory and validated: it must advertise at least
one configured architecture and every configured component.

Then, for every component and every configured architecture the
distribution provides, the `Packages` index is retrieved. If the source
prefers compressed indices, `Packages.gz` is fetched and decompressed.
If that fails for any reason, the uncompressed `Packages` is fetched
instead.

Checksums advertised by the `Release` file are verified. Mismatches are
reported but don't cause indices to be discarded.

# YAML Configuration

lists_dir (required) (string)
   Directory to write `Release` files and package indices to.

tmp_dir (optional) (string)
   Directory for scratch files. Defaults to the system temporary directory.

architectures (optional) (list[object])
   Architectures to retrieve indices for. Each entry has a `name` and an
   optional `priority` (integer).

sources (optional) (list[object])
   Sources to synchronize. Each entry has the following keys:

   name (required) (string)
      Name of the distribution. Its files live under `dists/<name>`.
   url (required) (string)
      URL or path of the repository.
   components (required) (string)
      Whitespace delimited list of components to retrieve.
   compressed (optional) (bool)
      Whether to fetch compressed indices first. Defaults to true.

# Exit Status

0 if all indices were retrieved, 1 if some indices could not be retrieved
and 2 if a source could not be synchronized at all.
";

#[derive(Debug, Error)]
pub enum DrtError {
    #[error("argument parsing error: {0:?}")]
    Clap(#[from] clap::Error),

    #[error("{0}")]
    Dist(#[from] DistError),

    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("invalid sub-command: {0}")]
    InvalidSubCommand(String),
}

pub type Result<T> = std::result::Result<T, DrtError>;

/// Resolve the process exit code for a synchronization.
pub fn summary_exit_code(summary: &SyncSummary) -> i32 {
    if !summary.failed.is_empty() {
        EXIT_FATAL
    } else if !summary.partial.is_empty() {
        EXIT_PARTIAL
    } else {
        EXIT_COMPLETE
    }
}

fn init_logging(matches: &ArgMatches) {
    let log_level = match matches.occurrences_of("verbose") {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level.as_str()),
    );

    if log_level <= LevelFilter::Info {
        builder
            .format_timestamp(None)
            .format_level(false)
            .format_target(false);
    }

    if log_level == LevelFilter::Info {
        builder.filter_module("rustls", LevelFilter::Error);
    }

    builder.init();
}

pub fn run_cli() -> Result<i32> {
    let app = Command::new("Distribution Sync Tool")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Gregory Szorc <gregory.szorc@gmail.com>")
        .about("Synchronize package indices from opkg/apt style repositories")
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .multiple_occurrences(true)
                .help("Increase logging verbosity. Can be specified multiple times."),
        );

    let app = app.subcommand(
        Command::new("update")
            .about("Retrieve package indices of configured sources")
            .long_about(UPDATE_ABOUT)
            .arg(
                Arg::new("yaml-config")
                    .long("yaml-config")
                    .takes_value(true)
                    .required(true)
                    .allow_invalid_utf8(true)
                    .help("Path to a YAML file defining the client configuration"),
            ),
    );

    let app = app.subcommand(
        Command::new("show-release")
            .about("Print a parsed Release file")
            .arg(
                Arg::new("path")
                    .required(true)
                    .allow_invalid_utf8(true)
                    .help("Path to Release file to print"),
            )
            .arg(
                Arg::new("field")
                    .long("field")
                    .takes_value(true)
                    .help("Only print the named field"),
            ),
    );

    let mut app =
        app.subcommand(Command::new("urls").about("Print documentation about repository URLs"));

    let matches = app.clone().get_matches();

    init_logging(&matches);

    match matches.subcommand() {
        Some(("update", args)) => command_update(args),
        Some(("show-release", args)) => command_show_release(args),
        Some(("urls", _)) => {
            println!("{}", URLS_ABOUT);
            Ok(EXIT_COMPLETE)
        }
        Some((command, _)) => Err(DrtError::InvalidSubCommand(command.to_string())),
        None => {
            app.print_help()?;
            Ok(EXIT_COMPLETE)
        }
    }
}

fn command_update(args: &ArgMatches) -> Result<i32> {
    let yaml_path = args
        .value_of_os("yaml-config")
        .ok_or(DrtError::MissingArgument("yaml-config"))?;

    let config = ClientConfig::from_yaml_path(yaml_path)?;

    let summary = sync_all(&UrlFetcher::new(), &config)?;

    for name in &summary.complete {
        println!("{}: complete", name);
    }
    for (name, failed) in &summary.partial {
        let pairs = failed.iter().map(|p| p.to_string()).collect::<Vec<_>>();
        println!("{}: partial (failed: {})", name, pairs.join(", "));
    }
    for (name, err) in &summary.failed {
        println!("{}: failed ({})", name, err);
    }

    Ok(summary_exit_code(&summary))
}

fn write_release(writer: &mut impl Write, release: &Release, field: Option<&str>) -> Result<()> {
    match field {
        Some(field) => release.write_field(writer, field)?,
        None => release.write(writer)?,
    }

    Ok(())
}

fn command_show_release(args: &ArgMatches) -> Result<i32> {
    let path = args
        .value_of_os("path")
        .ok_or(DrtError::MissingArgument("path"))?;

    let release = Release::from_path(path)?;

    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    write_release(&mut lock, &release, args.value_of("field"))?;

    Ok(EXIT_COMPLETE)
}
