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

use std::collections::HashMap;
use std::path::Path as FsPath;

use serde_derive::Deserialize;

use crate::error::{GoldenError, Result};
use crate::inventory::yaml_loader::read_yaml_recursive;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Host {
    #[serde(default)]
    pub ssh_config_host: String,
    #[serde(default)]
    pub ssh_hostname: String,
    #[serde(default)]
    pub ssh_user: String,
}

impl Host {
    /// True when this host has no remote connection info at all.
    pub fn is_local(&self) -> bool {
        if !self.ssh_config_host.is_empty() {
            return false;
        }
        self.ssh_hostname.is_empty() || self.ssh_hostname == "localhost" || self.ssh_hostname == "127.0.0.1"
    }

    /// True when this host is local and targets the current OS user.
    pub fn is_this_user(&self) -> bool {
        if !self.is_local() {
            return false;
        }
        if self.ssh_user.is_empty() {
            return true;
        }
        current_username().map(|u| u == self.ssh_user).unwrap_or(false)
    }

    /// The OS user a local deployment should run as. Panics on a remote host:
    /// callers must branch on `is_local` first.
    pub fn user(&self) -> String {
        assert!(self.is_local(), "user() is not valid for a remote host");
        if self.ssh_user.is_empty() {
            current_username().unwrap_or_default()
        } else {
            self.ssh_user.clone()
        }
    }

    /// The `user@hostname` (or `ssh_config_host`) connection string. Panics
    /// on a local host: callers must branch on `is_local` first.
    pub fn ssh_conn_str(&self) -> String {
        assert!(!self.is_local(), "ssh_conn_str() is not valid for localhost");
        if !self.ssh_config_host.is_empty() {
            return self.ssh_config_host.clone();
        }
        format!("{}@{}", self.ssh_user, self.ssh_hostname)
    }
}

impl std::fmt::Display for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_this_user() {
            write!(f, "[local]")
        } else if self.is_local() {
            write!(f, "[sudo -iu {}]", self.ssh_user)
        } else {
            write!(f, "[ssh {}]", self.ssh_conn_str())
        }
    }
}

fn current_username() -> Option<String> {
    std::env::var("USER").ok().or_else(|| std::env::var("LOGNAME").ok())
}

#[derive(Default)]
pub struct HostsCollection(HashMap<String, Host>);

impl HostsCollection {
    pub fn get(&self, name: &str) -> Option<&Host> {
        self.0.get(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Host)> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn set_all_to_localhost(&mut self) {
        for (_, h) in self.0.iter_mut() {
            *h = Host::default();
        }
    }

    pub fn read(base: &FsPath) -> Result<Self> {
        let mut out = HashMap::new();
        let mut sources: HashMap<String, String> = HashMap::new();
        for (file, doc) in read_yaml_recursive(base)? {
            let file_str = file.display().to_string();
            let parsed: HashMap<String, Host> = serde_yaml::from_value(doc).map_err(|e| GoldenError::Parse {
                file: file_str.clone(),
                context: None,
                message: e.to_string(),
            })?;
            for (name, host) in parsed {
                if let Some(prior) = sources.get(&name) {
                    return Err(GoldenError::DuplicateName {
                        name,
                        kind: "host definition".to_string(),
                        occurrences: vec![prior.clone(), file_str],
                    });
                }
                sources.insert(name.clone(), file_str.clone());
                out.insert(name, host);
            }
        }
        Ok(Self(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_host_is_local_and_this_user() {
        let h = Host::default();
        assert!(h.is_local());
        assert!(h.is_this_user());
        assert_eq!(h.to_string(), "[local]");
    }

    #[test]
    fn localhost_hostname_is_local() {
        let h = Host { ssh_hostname: "127.0.0.1".into(), ..Default::default() };
        assert!(h.is_local());
    }

    #[test]
    fn local_with_different_user_uses_sudo() {
        let h = Host { ssh_user: "deploy".into(), ..Default::default() };
        assert!(h.is_local());
        assert!(!h.is_this_user());
        assert_eq!(h.to_string(), "[sudo -iu deploy]");
    }

    #[test]
    fn remote_host_uses_ssh() {
        let h = Host { ssh_hostname: "example.com".into(), ssh_user: "root".into(), ..Default::default() };
        assert!(!h.is_local());
        assert_eq!(h.ssh_conn_str(), "root@example.com");
        assert_eq!(h.to_string(), "[ssh root@example.com]");
    }

    #[test]
    fn ssh_config_host_takes_precedence() {
        let h = Host { ssh_config_host: "myhost".into(), ssh_hostname: "ignored".into(), ..Default::default() };
        assert!(!h.is_local());
        assert_eq!(h.ssh_conn_str(), "myhost");
    }
}
