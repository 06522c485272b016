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

use std::fmt;
use std::error::Error as StdError;
use std::io;

/// Main error type for golden operations
#[derive(Debug)]
pub enum GoldenError {
    /// Same name used twice across instances/hosts/groups, or a group lists a member twice
    DuplicateName { name: String, kind: String, occurrences: Vec<String> },

    /// A group member is neither a known instance nor a known host
    UnknownMember { member: String, group: String },

    /// Both `B.yml` and directory `B/` exist for the same layer base
    AmbiguousPath { file_path: String, dir_path: String },

    /// IO errors
    Io(io::Error),

    /// YAML parsing errors
    Yaml(serde_yaml::Error),

    /// A YAML or template document failed to parse
    Parse { file: String, context: Option<String>, message: String },

    /// A path is a map on one side of a merge and a scalar/sequence on the other
    TypeMismatch { path: String, sources: [String; 2] },

    /// An Error-policy merge found the same path defined on both sides
    ResolutionConflict { path: String, sources: [String; 2] },

    /// A template failed to execute for a reason other than a missing key
    TemplateExec { source: String, context: String, message: String },

    /// The fixpoint halted with templated leaves still unresolved
    UnresolvedVariables { leaves: Vec<(String, String)> },

    /// `--manifest <name>` does not exist
    UnknownManifest { name: String },

    /// A shell/sudo/SSH command exited non-zero
    Command { command: String, exit_code: i32, output: String },

    /// Establishing or using an SSH session failed
    Connection { host: String, message: String },

    /// Other errors
    Other(String),
}

impl fmt::Display for GoldenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoldenError::DuplicateName { name, kind, occurrences } => {
                write!(f, "duplicate {}: {}", kind, name)?;
                if !occurrences.is_empty() {
                    write!(f, "\nEncountered in:")?;
                    for occ in occurrences {
                        write!(f, "\n\t{}", occ)?;
                    }
                }
                Ok(())
            }
            GoldenError::UnknownMember { member, group } => {
                write!(f, "{} is not an instance/host, but specified in group {}", member, group)
            }
            GoldenError::AmbiguousPath { file_path, dir_path } => {
                write!(f, "ambiguous {} OR {}", dir_path, file_path)
            }
            GoldenError::Io(err) => write!(f, "IO error: {}", err),
            GoldenError::Yaml(err) => write!(f, "YAML error: {}", err),
            GoldenError::Parse { file, context, message } => match context {
                Some(ctx) => write!(f, "failed to parse {} [{}]: {}", file, ctx, message),
                None => write!(f, "failed to parse {}: {}", file, message),
            },
            GoldenError::TypeMismatch { path, sources } => write!(
                f,
                "variable types mismatch at {}: {} is a map, {} is not",
                path, sources[0], sources[1]
            ),
            GoldenError::ResolutionConflict { path, sources } => write!(
                f,
                "resolution conflict on variable {}. First defined in: {}. Second defined in: {}",
                path, sources[0], sources[1]
            ),
            GoldenError::TemplateExec { source, context, message } => {
                write!(f, "failed to execute a template:\n{} [{}].\nerror: {}", source, context, message)
            }
            GoldenError::UnresolvedVariables { leaves } => {
                write!(f, "unresolved templated variables:")?;
                for (path, source) in leaves {
                    write!(f, "\n\t{}: defined in file - {}", path, source)?;
                }
                Ok(())
            }
            GoldenError::UnknownManifest { name } => write!(f, "--manifest {} does not exist", name),
            GoldenError::Command { command, exit_code, output } => write!(
                f,
                "command: {}\nexited with status {}\noutput:\n{}",
                command, exit_code, output
            ),
            GoldenError::Connection { host, message } => write!(f, "connection to {} failed: {}", host, message),
            GoldenError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl StdError for GoldenError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            GoldenError::Io(err) => Some(err),
            GoldenError::Yaml(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for GoldenError {
    fn from(err: io::Error) -> Self {
        GoldenError::Io(err)
    }
}

impl From<serde_yaml::Error> for GoldenError {
    fn from(err: serde_yaml::Error) -> Self {
        GoldenError::Yaml(err)
    }
}

impl From<String> for GoldenError {
    fn from(err: String) -> Self {
        GoldenError::Other(err)
    }
}

impl From<&str> for GoldenError {
    fn from(err: &str) -> Self {
        GoldenError::Other(err.to_string())
    }
}

/// Result type alias for golden operations
pub type Result<T> = std::result::Result<T, GoldenError>;
