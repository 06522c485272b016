// Jetpack
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

//! Executors (§4.6, glossary "Executor"): the deployer's abstraction over
//! "how to run a command on a host". One of three, chosen from the host's
//! locality/identity predicates:
//!
//! - [`LocalExecutor`] — local host, same OS user: a direct `sh -c`.
//! - [`SudoExecutor`] — local host, different OS user: `sudo -iu <user>`.
//! - [`SshExecutor`] — remote host: one cached `russh` session, held open
//!   as a long-lived async client handle, reused for every command against
//!   that host.
//!
//! Each implements `mkdir`, `copy_file`, and `run_silently`, capturing
//! combined output and raising [`GoldenError::Command`] on nonzero exit.

mod ssh;

pub use ssh::SshExecutor;

use std::path::Path as FsPath;
use std::process::Command;

use crate::error::{GoldenError, Result};
use crate::inventory::host::Host;

/// How the deployer runs commands and moves files onto one host.
pub trait Executor {
    fn mkdir(&self, remote_path: &str) -> Result<()>;
    fn copy_file(&self, local_path: &FsPath, remote_path: &str) -> Result<()>;
    fn run_silently(&self, command: &str) -> Result<String>;
}

/// Picks the executor for `host` per §4.6/§6: local+same-user, local+sudo,
/// or SSH, in that order.
pub fn for_host(host: &Host) -> Result<Box<dyn Executor>> {
    if host.is_this_user() {
        return Ok(Box::new(LocalExecutor));
    }
    if host.is_local() {
        return Ok(Box::new(SudoExecutor { user: host.user() }));
    }
    Ok(Box::new(SshExecutor::connect(host)?))
}

fn check_status(command: &str, output: std::process::Output) -> Result<String> {
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    if !output.status.success() {
        return Err(GoldenError::Command {
            command: command.to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            output: combined,
        });
    }
    Ok(combined)
}

/// Direct `sh -c` execution on the local machine, no privilege change.
pub struct LocalExecutor;

impl Executor for LocalExecutor {
    fn mkdir(&self, remote_path: &str) -> Result<()> {
        self.run_silently(&format!("mkdir -p {}", shlex::try_quote(remote_path).unwrap_or_default())).map(|_| ())
    }

    fn copy_file(&self, local_path: &FsPath, remote_path: &str) -> Result<()> {
        std::fs::copy(local_path, remote_path)?;
        Ok(())
    }

    fn run_silently(&self, command: &str) -> Result<String> {
        let output = Command::new("sh").arg("-c").arg(command).output()?;
        check_status(command, output)
    }
}

/// `sudo -iu <user> sh -c '...'` on the local machine.
pub struct SudoExecutor {
    user: String,
}

impl Executor for SudoExecutor {
    fn mkdir(&self, remote_path: &str) -> Result<()> {
        self.run_silently(&format!("mkdir -p {}", shlex::try_quote(remote_path).unwrap_or_default())).map(|_| ())
    }

    fn copy_file(&self, local_path: &FsPath, remote_path: &str) -> Result<()> {
        let data = std::fs::read(local_path)?;
        let b64 = data_to_shell_safe(&data);
        self.run_silently(&format!(
            "printf '%s' {} | base64 -d > {}",
            shlex::try_quote(&b64).unwrap_or_default(),
            shlex::try_quote(remote_path).unwrap_or_default()
        ))
        .map(|_| ())
    }

    fn run_silently(&self, command: &str) -> Result<String> {
        let output = Command::new("sudo").arg("-iu").arg(&self.user).arg("sh").arg("-c").arg(command).output()?;
        check_status(command, output)
    }
}

fn data_to_shell_safe(data: &[u8]) -> String {
    use std::fmt::Write;
    // base64 without an external crate: reuse the small alphabet inline.
    const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut out = String::with_capacity((data.len() + 2) / 3 * 4);
    for chunk in data.chunks(3) {
        let b0 = chunk[0];
        let b1 = *chunk.get(1).unwrap_or(&0);
        let b2 = *chunk.get(2).unwrap_or(&0);
        let n = ((b0 as u32) << 16) | ((b1 as u32) << 8) | (b2 as u32);
        let _ = write!(out, "{}", ALPHABET[((n >> 18) & 0x3F) as usize] as char);
        let _ = write!(out, "{}", ALPHABET[((n >> 12) & 0x3F) as usize] as char);
        out.push(if chunk.len() > 1 { ALPHABET[((n >> 6) & 0x3F) as usize] as char } else { '=' });
        out.push(if chunk.len() > 2 { ALPHABET[(n & 0x3F) as usize] as char } else { '=' });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_executor_runs_and_captures_output() {
        let exec = LocalExecutor;
        let out = exec.run_silently("echo hello").unwrap();
        assert!(out.contains("hello"));
    }

    #[test]
    fn local_executor_surfaces_nonzero_exit() {
        let exec = LocalExecutor;
        let err = exec.run_silently("exit 3").unwrap_err();
        match err {
            GoldenError::Command { exit_code, .. } => assert_eq!(exit_code, 3),
            other => panic!("expected Command error, got {:?}", other),
        }
    }

    #[test]
    fn local_executor_copies_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let src = dir.path().join("src.txt");
        std::fs::write(&src, b"payload").unwrap();
        let dst = dir.path().join("dst.txt");
        let exec = LocalExecutor;
        exec.copy_file(&src, dst.to_str().unwrap()).unwrap();
        assert_eq!(std::fs::read_to_string(&dst).unwrap(), "payload");
    }

    #[test]
    fn base64_round_trips_through_coreutils_alphabet() {
        let encoded = data_to_shell_safe(b"hi");
        // "hi" -> base64 "aGk="
        assert_eq!(encoded, "aGk=");
    }
}
