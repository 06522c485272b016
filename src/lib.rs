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

//! `golden`: a fleet configuration deployer. Given an inventory of
//! instances, hosts, groups and layered variable files, resolves
//! per-instance configuration to a fixpoint, renders templated app files,
//! and ships the result to each target host.
//!
//! The variable-resolution engine ([`path`], [`varmap`], [`substitution`],
//! [`resolver`], [`inventory`]) is the core; [`deployer`] and
//! [`connection`] are external collaborators that consume its output.

pub mod api;
pub mod config;
pub mod connection;
pub mod deployer;
pub mod error;
pub mod inventory;
pub mod output;
pub mod path;
pub mod resolver;
pub mod substitution;
pub mod template;
pub mod util;
pub mod varmap;

// Re-export commonly used types for library users.
pub use api::{run, run_silent};
pub use config::{GoldenConfig, Target};
pub use deployer::{Deployer, HostReport, Report};
pub use error::{GoldenError, Result};
pub use inventory::inventory::Inventory;
pub use output::{LogLevel, NullOutputHandler, OutputHandler, OutputHandlerRef, TerminalOutputHandler};
pub use resolver::{ResolvedInstance, Resolver};
