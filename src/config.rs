// Jetporch
// Copyright (C) 2023 - Michael DeHaan <michael@michaeldehaan.net> + contributors
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

//! Run configuration (§6), usable identically from the CLI and as a library.
//! One of `manifest`/`group` must be set before a run is built; `GoldenConfig`
//! itself stays permissive so callers can build it up incrementally and
//! validate once, at the point of use.

use std::path::PathBuf;

/// What the run targets: one named manifest, or one group/host/instance name
/// used directly as a one-element manifest.
#[derive(Clone, Debug, PartialEq)]
pub enum Target {
    Manifest(String),
    Group(String),
}

#[derive(Clone, Debug)]
pub struct GoldenConfig {
    pub root_dir: PathBuf,
    pub target: Option<Target>,
    pub apps: Option<Vec<String>>,
    pub locally: bool,
    pub prefix: Option<String>,
    pub verbosity: u32,
}

impl Default for GoldenConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            target: None,
            apps: None,
            locally: false,
            prefix: None,
            verbosity: 0,
        }
    }
}

impl GoldenConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.root_dir = path.into();
        self
    }

    pub fn manifest(mut self, name: impl Into<String>) -> Self {
        self.target = Some(Target::Manifest(name.into()));
        self
    }

    pub fn group(mut self, name: impl Into<String>) -> Self {
        self.target = Some(Target::Group(name.into()));
        self
    }

    pub fn apps(mut self, apps: Vec<String>) -> Self {
        self.apps = Some(apps);
        self
    }

    pub fn locally(mut self, locally: bool) -> Self {
        self.locally = locally;
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn verbosity(mut self, verbosity: u32) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Whether `app` should be deployed, given an optional `--apps` whitelist.
    pub fn app_allowed(&self, app: &str) -> bool {
        match &self.apps {
            Some(whitelist) => whitelist.iter().any(|a| a == app),
            None => true,
        }
    }
}
