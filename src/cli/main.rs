//-
// Copyright (c) 2026, The Mapistream Authors
//
// This file is part of Mapistream.
//
// Mapistream is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Mapistream is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along with
// Mapistream. If not, see <http://www.gnu.org/licenses/>.

use std::path::{Path, PathBuf};

use log::error;
use structopt::StructOpt;

use crate::context::Context;
use crate::lock::ObjectId;
use crate::support::diagnostic;
use crate::support::sysexits::*;
use crate::support::system_config::SystemConfig;

#[derive(StructOpt)]
#[structopt(max_term_width = 80)]
enum Command {
    /// Frame raw data from standard input into a record stream.
    ///
    /// Standard input is cut into records of at most `pipe.chunk_size` bytes,
    /// which a producer thread serializes into a FIFO while the main thread
    /// copies the FIFO to standard output.
    Encode(PipeOptions),
    /// Unframe a record stream from standard input.
    ///
    /// A producer thread copies standard input into a FIFO while the main
    /// thread deserializes the records and writes their content to standard
    /// output. The stream must have been encoded for the same `--object`.
    Decode(PipeOptions),
}

#[derive(StructOpt, Default)]
pub(super) struct CommonOptions {
    /// The directory containing `mapistream.toml` etc
    /// [default: /etc/mapistream or /usr/local/etc/mapistream]
    #[structopt(long, parse(from_os_str))]
    root: Option<PathBuf>,
}

#[derive(StructOpt)]
pub(super) struct PipeOptions {
    #[structopt(flatten)]
    common: CommonOptions,

    /// The id of the object being streamed. It is locked for the duration of
    /// the transfer.
    #[structopt(long, default_value = "0")]
    pub(super) object: ObjectId,

    /// Override the FIFO capacity from the configuration.
    #[structopt(long)]
    capacity: Option<usize>,
}

impl Command {
    fn pipe_options(&mut self) -> &mut PipeOptions {
        match *self {
            Command::Encode(ref mut o) | Command::Decode(ref mut o) => o,
        }
    }
}

pub fn main() {
    // Clap exits with status 1 instead of EX_USAGE if we use the more concise
    // API
    let mut cmd = Command::from_clap(&match Command::clap().get_matches_safe() {
        Ok(matches) => matches,
        Err(
            e @ clap::Error {
                kind: clap::ErrorKind::HelpDisplayed,
                ..
            },
        )
        | Err(
            e @ clap::Error {
                kind: clap::ErrorKind::VersionDisplayed,
                ..
            },
        ) => {
            println!("{}", e.message);
            return;
        }
        Err(e) => {
            eprintln!("{}", e.message);
            EX_USAGE.exit()
        }
    });

    let options = cmd.pipe_options();
    let (root, mut system_config) = load_config(options.common.root.take());
    if let Some(capacity) = options.capacity {
        system_config.fifo.capacity = capacity;
        if let Err(e) = system_config.validate() {
            eprintln!("{}", e);
            EX_USAGE.exit();
        }
    }

    init_logging(root.as_deref());

    if let Some(ref root) = root {
        if let Err(exit) =
            diagnostic::apply_diagnostics(root, &system_config.diagnostic)
        {
            exit.exit();
        }
    }

    let ctx = Context::new(system_config);
    let result = match cmd {
        Command::Encode(ref options) => super::pipe::encode(&ctx, options),
        Command::Decode(ref options) => super::pipe::decode(&ctx, options),
    };
    ctx.shutdown();

    if let Err(e) = result {
        error!("{}", e);
        Sysexit::from(&e).exit();
    }
}

/// Locate and load the system configuration.
///
/// Without an explicit root, the standard locations are tried; if neither
/// exists, the built-in defaults are used and there is no root.
fn load_config(root: Option<PathBuf>) -> (Option<PathBuf>, SystemConfig) {
    let root = root.or_else(|| {
        ["/etc/mapistream", "/usr/local/etc/mapistream"]
            .iter()
            .map(PathBuf::from)
            .find(|p| p.join("mapistream.toml").is_file())
    });

    let root = match root {
        Some(root) => root,
        None => return (None, SystemConfig::default()),
    };

    let system_config_path = root.join("mapistream.toml");
    match SystemConfig::load(&system_config_path) {
        Ok(config) => (Some(root), config),
        Err(e) => {
            eprintln!(
                "Error in config file at '{}': {}",
                system_config_path.display(),
                e
            );
            EX_CONFIG.exit()
        }
    }
}

fn init_logging(root: Option<&Path>) {
    if Ok(true) == nix::unistd::isatty(2) {
        // Running interactively; ignore logging configuration and just write
        // to stderr.
        crate::init_simple_log();
        return;
    }

    // Standard output carries the data, so logging has to go elsewhere.
    let log_config_file = root.map(|r| r.join("logging.toml"));
    match log_config_file {
        Some(file) if file.is_file() => {
            if let Err(e) =
                log4rs::init_file(&file, log4rs::file::Deserializers::new())
            {
                eprintln!("Failed to load '{}': {}", file.display(), e);
                crate::init_simple_log();
            }
        }
        _ => {
            let formatter = syslog::Formatter3164 {
                facility: syslog::Facility::LOG_MAIL,
                hostname: None,
                process: env!("CARGO_PKG_NAME").to_owned(),
                pid: nix::unistd::getpid().as_raw(),
            };

            match syslog::unix(formatter) {
                Ok(logger) => {
                    let _ = log::set_boxed_logger(Box::new(
                        syslog::BasicLogger::new(logger),
                    ))
                    .map(|_| log::set_max_level(log::LevelFilter::Info));
                }
                // No syslog (e.g. in a container); stderr is all we have
                Err(_) => crate::init_simple_log(),
            }
        }
    }
}
