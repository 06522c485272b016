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

//! A single cached SSH session per host, backed by `russh`. `russh`'s API is
//! async; the rest of this crate is synchronous, so every call blocks on a
//! small single-threaded `tokio::runtime::Runtime` owned by the connection.

use std::net::ToSocketAddrs;
use std::path::Path as FsPath;
use std::sync::Mutex;
use std::time::Duration;

use russh::client::{self, AuthResult};
use russh::ChannelMsg;
use tokio::io::AsyncWriteExt;
use tokio::runtime::Runtime;

use crate::connection::Executor;
use crate::error::{GoldenError, Result};
use crate::inventory::host::Host;

struct SshHandler;

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh::keys::ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(true)
    }
}

const DEFAULT_PORT: u16 = 22;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// One long-lived session against one remote host.
pub struct SshExecutor {
    host: String,
    username: String,
    runtime: Mutex<Runtime>,
    handle: client::Handle<SshHandler>,
}

impl SshExecutor {
    pub fn connect(host: &Host) -> Result<Self> {
        let hostname = if !host.ssh_config_host.is_empty() { host.ssh_config_host.clone() } else { host.ssh_hostname.clone() };
        let username = if host.ssh_user.is_empty() { default_username() } else { host.ssh_user.clone() };

        let runtime = Runtime::new().map_err(|e| GoldenError::Connection { host: hostname.clone(), message: e.to_string() })?;
        let handle = runtime.block_on(connect_and_auth(&hostname, &username))?;

        Ok(Self { host: hostname, username, runtime: Mutex::new(runtime), handle })
    }
}

async fn connect_and_auth(hostname: &str, username: &str) -> Result<client::Handle<SshHandler>> {
    let addr_str = format!("{}:{}", hostname, DEFAULT_PORT);
    let addr = addr_str
        .to_socket_addrs()
        .map_err(|e| GoldenError::Connection { host: hostname.to_string(), message: format!("unable to resolve: {}", e) })?
        .next()
        .ok_or_else(|| GoldenError::Connection { host: hostname.to_string(), message: "unable to resolve".to_string() })?;

    let config = std::sync::Arc::new(client::Config::default());
    let mut handle = tokio::time::timeout(CONNECT_TIMEOUT, client::connect(config, addr, SshHandler))
        .await
        .map_err(|_| GoldenError::Connection { host: hostname.to_string(), message: "connection timed out".to_string() })?
        .map_err(|e| GoldenError::Connection { host: hostname.to_string(), message: e.to_string() })?;

    if authenticate_with_agent(&mut handle, username).await? {
        return Ok(handle);
    }
    if authenticate_with_default_keys(&mut handle, username).await? {
        return Ok(handle);
    }
    Err(GoldenError::Connection { host: hostname.to_string(), message: format!("no working authentication method for user {}", username) })
}

async fn authenticate_with_agent(handle: &mut client::Handle<SshHandler>, username: &str) -> Result<bool> {
    let Ok(sock) = std::env::var("SSH_AUTH_SOCK") else { return Ok(false) };
    let Ok(stream) = tokio::net::UnixStream::connect(&sock).await else { return Ok(false) };
    let mut agent = russh::keys::agent::client::AgentClient::connect(stream);
    let Ok(identities) = agent.request_identities().await else { return Ok(false) };
    for identity in identities {
        if let Ok(AuthResult::Success) = handle.authenticate_publickey_with(username, identity, None, &mut agent).await {
            return Ok(true);
        }
    }
    Ok(false)
}

async fn authenticate_with_default_keys(handle: &mut client::Handle<SshHandler>, username: &str) -> Result<bool> {
    let home = std::env::var("HOME").unwrap_or_default();
    for name in ["id_ed25519", "id_rsa"] {
        let path = FsPath::new(&home).join(".ssh").join(name);
        if !path.exists() {
            continue;
        }
        let Ok(key) = russh::keys::load_secret_key(&path, None) else { continue };
        let key_with_alg = russh::keys::PrivateKeyWithHashAlg::new(std::sync::Arc::new(key), None);
        if let Ok(AuthResult::Success) = handle.authenticate_publickey(username, key_with_alg).await {
            return Ok(true);
        }
    }
    Ok(false)
}

impl Executor for SshExecutor {
    fn mkdir(&self, remote_path: &str) -> Result<()> {
        self.run_silently(&format!("mkdir -p {}", shlex::try_quote(remote_path).unwrap_or_default())).map(|_| ())
    }

    fn copy_file(&self, local_path: &FsPath, remote_path: &str) -> Result<()> {
        let data = std::fs::read(local_path)?;
        let remote_path = remote_path.to_string();
        self.runtime.lock().unwrap().block_on(async {
            let sftp = self.open_sftp().await?;
            let mut file = sftp
                .create(&remote_path)
                .await
                .map_err(|e| GoldenError::Connection { host: self.host.clone(), message: format!("sftp create failed: {}", e) })?;
            file.write_all(&data)
                .await
                .map_err(|e| GoldenError::Connection { host: self.host.clone(), message: format!("sftp write failed: {}", e) })?;
            file.shutdown()
                .await
                .map_err(|e| GoldenError::Connection { host: self.host.clone(), message: format!("sftp close failed: {}", e) })?;
            Ok(())
        })
    }

    fn run_silently(&self, command: &str) -> Result<String> {
        let cmd = command.to_string();
        self.runtime.lock().unwrap().block_on(async { self.exec(&cmd).await })
    }
}

impl SshExecutor {
    async fn open_sftp(&self) -> Result<russh_sftp::client::SftpSession> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| GoldenError::Connection { host: self.host.clone(), message: format!("channel open failed: {}", e) })?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| GoldenError::Connection { host: self.host.clone(), message: format!("sftp subsystem failed: {}", e) })?;
        russh_sftp::client::SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| GoldenError::Connection { host: self.host.clone(), message: format!("sftp session failed: {}", e) })
    }

    async fn exec(&self, command: &str) -> Result<String> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| GoldenError::Connection { host: self.host.clone(), message: format!("channel open failed: {}", e) })?;
        channel
            .exec(true, command.as_bytes())
            .await
            .map_err(|e| GoldenError::Connection { host: self.host.clone(), message: e.to_string() })?;

        let mut output = Vec::new();
        let mut exit_code: Option<u32> = None;
        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { ref data }) | Some(ChannelMsg::ExtendedData { ref data, .. }) => {
                    output.extend_from_slice(data);
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => exit_code = Some(exit_status),
                Some(ChannelMsg::Eof) | None => break,
                _ => {}
            }
        }

        let combined = String::from_utf8_lossy(&output).into_owned();
        let rc = exit_code.unwrap_or(0) as i32;
        if rc != 0 {
            return Err(GoldenError::Command { command: command.to_string(), exit_code: rc, output: combined });
        }
        Ok(combined)
    }
}

fn default_username() -> String {
    std::env::var("USER").or_else(|_| std::env::var("LOGNAME")).unwrap_or_else(|_| "root".to_string())
}
