// Jetporch
// Copyright (C) 2023 - Michael DeHaan <michael@michaeldehaan.net> + contributors
// Copyright (C) 2025 - Riff.CC <https://riff.cc>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// long with this program.  If not, see <http://www.gnu.org/licenses/>.

//! `golden` CLI entry point (§6). Parses flags, builds a [`GoldenConfig`],
//! and drives [`golden::api::run`] with a terminal progress handler.
//! Exits 0 on success, 1 on any failure (mirrors the teacher's
//! `quit`-on-error convention in `main_new.rs`, minus the custom parser).

use std::process;
use std::sync::Arc;

use clap::Parser;

use golden::config::GoldenConfig;
use golden::output::{OutputHandlerRef, TerminalOutputHandler};

#[derive(Parser, Debug)]
#[command(name = "golden", version, about = "A fleet configuration deployer", long_about = None, disable_version_flag = true)]
struct Cli {
    /// Print version and exit.
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version)]
    version: (),

    /// Inventory root directory.
    #[arg(short = 'r', long = "root-dir", default_value = ".")]
    root_dir: String,

    /// Name of a manifest to deploy. Mutually exclusive with --group.
    #[arg(short = 'm', long = "manifest", conflicts_with = "group")]
    manifest: Option<String>,

    /// Name of a group/host/instance to deploy directly. Mutually exclusive with --manifest.
    #[arg(short = 'g', long = "group", conflicts_with = "manifest")]
    group: Option<String>,

    /// Restrict deployment to instances whose app is in this whitelist.
    #[arg(short = 'a', long = "apps", value_delimiter = ',')]
    apps: Option<Vec<String>>,

    /// Rewrite every host to localhost before resolving.
    #[arg(short = 'l', long = "locally")]
    locally: bool,

    /// Templated prefix prepended to every instance's install_prefix.
    #[arg(short = 'p', long = "prefix")]
    prefix: Option<String>,

    /// Increase log verbosity (repeatable: -v, -vv).
    #[arg(long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();

    let root_dir = expanduser::expanduser(&cli.root_dir).unwrap_or_else(|_| cli.root_dir.clone().into());
    let mut config = GoldenConfig::new().root_dir(root_dir).locally(cli.locally).verbosity(cli.verbose as u32);

    match (cli.manifest, cli.group) {
        (Some(m), None) => config = config.manifest(m),
        (None, Some(g)) => config = config.group(g),
        (None, None) => {
            eprintln!("error: either --manifest or --group must be given");
            process::exit(1);
        }
        (Some(_), Some(_)) => unreachable!("clap enforces --manifest/--group as mutually exclusive"),
    }

    if let Some(apps) = cli.apps {
        config = config.apps(apps);
    }
    if let Some(prefix) = cli.prefix {
        config = config.prefix(prefix);
    }

    let output: OutputHandlerRef = Arc::new(TerminalOutputHandler::new(cli.verbose as u32));
    match golden::api::run(&config, output) {
        Ok(report) => {
            if report.any_failed() {
                process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }
}
