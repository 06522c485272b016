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

//! Progress and logging events raised while resolving, packing and
//! deploying (§9.1). Narrow on purpose: this crate has no playbook/task
//! lifecycle, just "resolve this instance", "pack this host", "deploy this
//! host", and leveled log lines.

use std::sync::Arc;

use inline_colorization::{color_red, color_green, color_yellow, color_reset};

/// Receives progress events during a deployment run.
pub trait OutputHandler: Send + Sync {
    fn on_resolve_start(&self, instance_count: usize);
    fn on_resolve_end(&self, instance_count: usize, unresolved_count: usize);

    fn on_pack_start(&self, host: &str, instance_count: usize);
    fn on_pack_end(&self, host: &str, files_packed: usize);

    fn on_host_deploy_start(&self, host: &str);
    fn on_host_deploy_end(&self, host: &str, success: bool);

    fn on_instance_result(&self, instance: &str, host: &str, success: bool);

    fn on_report(&self, report: &crate::deployer::Report);

    fn log(&self, level: LogLevel, message: &str);
    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }
    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }
    fn warning(&self, message: &str) {
        self.log(LogLevel::Warning, message);
    }
    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// A no-op output handler for library callers that don't want progress printed.
pub struct NullOutputHandler;

impl OutputHandler for NullOutputHandler {
    fn on_resolve_start(&self, _instance_count: usize) {}
    fn on_resolve_end(&self, _instance_count: usize, _unresolved_count: usize) {}
    fn on_pack_start(&self, _host: &str, _instance_count: usize) {}
    fn on_pack_end(&self, _host: &str, _files_packed: usize) {}
    fn on_host_deploy_start(&self, _host: &str) {}
    fn on_host_deploy_end(&self, _host: &str, _success: bool) {}
    fn on_instance_result(&self, _instance: &str, _host: &str, _success: bool) {}
    fn on_report(&self, _report: &crate::deployer::Report) {}
    fn log(&self, _level: LogLevel, _message: &str) {}
}

/// Plain-text terminal output: no markdown rendering, just leveled lines and
/// the final aligned report table.
pub struct TerminalOutputHandler {
    pub verbosity: u32,
}

impl TerminalOutputHandler {
    pub fn new(verbosity: u32) -> Self {
        Self { verbosity }
    }
}

impl OutputHandler for TerminalOutputHandler {
    fn on_resolve_start(&self, instance_count: usize) {
        println!("resolving variables for {} instance(s)...", instance_count);
    }

    fn on_resolve_end(&self, instance_count: usize, unresolved_count: usize) {
        if unresolved_count == 0 {
            println!("resolved {} instance(s)", instance_count);
        } else {
            println!("{color_yellow}resolved {} instance(s), {} unresolved variable(s){color_reset}", instance_count, unresolved_count);
        }
    }

    fn on_pack_start(&self, host: &str, instance_count: usize) {
        println!("packing {} instance(s) for {}", instance_count, host);
    }

    fn on_pack_end(&self, host: &str, files_packed: usize) {
        if self.verbosity > 0 {
            println!("  {}: packed {} file(s)", host, files_packed);
        }
    }

    fn on_host_deploy_start(&self, host: &str) {
        println!("deploying to {}", host);
    }

    fn on_host_deploy_end(&self, host: &str, success: bool) {
        if success {
            println!("{color_green}{} => OK{color_reset}", host);
        } else {
            println!("{color_red}{} => FAILED{color_reset}", host);
        }
    }

    fn on_instance_result(&self, instance: &str, host: &str, success: bool) {
        if self.verbosity > 0 {
            let status = if success { format!("{color_green}OK{color_reset}") } else { format!("{color_red}FAILED{color_reset}") };
            println!("  {} on {} => {}", instance, host, status);
        }
    }

    fn on_report(&self, report: &crate::deployer::Report) {
        println!();
        println!("{}", report.render());
    }

    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug if self.verbosity >= 2 => println!("DEBUG: {}", message),
            LogLevel::Info if self.verbosity >= 1 => println!("INFO: {}", message),
            LogLevel::Warning => println!("{color_yellow}WARNING{color_reset}: {}", message),
            LogLevel::Error => eprintln!("{color_red}ERROR{color_reset}: {}", message),
            _ => {}
        }
    }
}

/// Thread-safe handle to an output handler, shared across resolver/deployer calls.
pub type OutputHandlerRef = Arc<dyn OutputHandler>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_handler_accepts_every_event_without_panicking() {
        let h = NullOutputHandler;
        h.on_resolve_start(1);
        h.on_resolve_end(1, 0);
        h.on_pack_start("h1", 1);
        h.on_pack_end("h1", 3);
        h.on_host_deploy_start("h1");
        h.on_host_deploy_end("h1", true);
        h.on_instance_result("web1", "h1", true);
        h.log(LogLevel::Info, "hi");
    }
}
