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

//! Deployment orchestration (§4.6). One to one with the core contract:
//! pack every instance targeted for a host, wrap and compress those tars
//! into one per-host archive, transfer and extract it through an
//! [`Executor`], and accumulate a [`Report`].

pub mod pack;
pub mod report;

use std::path::{Path as FsPath, PathBuf};
use std::time::Instant;

use guid_create::GUID;

use crate::connection;
use crate::error::{GoldenError, Result};
use crate::inventory::inventory::Inventory;
use crate::inventory::manifest::Manifest;
use crate::output::OutputHandlerRef;
use crate::resolver::Resolver;

pub use report::{HostReport, Report};

/// A remote staging directory name, unique per run, so concurrent golden
/// runs against the same host never collide.
fn staging_dir_name() -> String {
    format!("golden-{}", GUID::rand())
}

/// Drives resolution, packing, transfer and extraction for every instance
/// targeted by `manifest`.
pub struct Deployer<'a> {
    apps_dir: PathBuf,
    inventory: &'a Inventory,
    resolver: Resolver<'a>,
    output: OutputHandlerRef,
}

impl<'a> Deployer<'a> {
    pub fn new(root_dir: &FsPath, inventory: &'a Inventory, output: OutputHandlerRef) -> Self {
        Self {
            apps_dir: root_dir.join("apps"),
            inventory,
            resolver: Resolver::new(root_dir, inventory),
            output,
        }
    }

    /// Resolve, pack, transfer and extract every instance named (directly or
    /// via host/group) by `manifest`. One host's failure does not stop the
    /// others; it is recorded in the returned [`Report`] and surfaces through
    /// the first propagated error only if every host failed outright.
    pub fn deploy(&self, manifest: &Manifest) -> Result<Report> {
        let targets = self.inventory.instances_for(manifest);

        let mut by_host: std::collections::BTreeMap<String, Vec<String>> = std::collections::BTreeMap::new();
        for inst in &targets {
            by_host.entry(inst.host.clone()).or_default().push(inst.name.clone());
        }

        self.output.on_resolve_start(targets.len());
        let mut report = Report::default();
        for (host_name, instance_names) in by_host {
            let started = Instant::now();
            self.output.on_pack_start(&host_name, instance_names.len());

            let mut host_report =
                HostReport { host: host_name.clone(), instances_not_attempted: instance_names.len(), ..Default::default() };

            match self.pack_for_host(&instance_names) {
                Ok(instance_tars) => {
                    let files_packed: usize = instance_tars.iter().map(|(_, t)| t.len()).count();
                    self.output.on_pack_end(&host_name, files_packed);
                    host_report.instances_packed = instance_tars.len();

                    self.output.on_host_deploy_start(&host_name);
                    match self.deploy_to_host(&host_name, &instance_names, instance_tars) {
                        Ok(()) => {
                            host_report.instances_deployed = host_report.instances_packed;
                            host_report.instances_not_attempted = 0;
                            for name in &instance_names {
                                self.output.on_instance_result(name, &host_name, true);
                            }
                            self.output.on_host_deploy_end(&host_name, true);
                        }
                        Err(e) => {
                            self.output.error(&format!("deploy to {} failed: {}", host_name, e));
                            host_report.instances_failed = host_report.instances_packed;
                            host_report.instances_not_attempted = 0;
                            for name in &instance_names {
                                self.output.on_instance_result(name, &host_name, false);
                            }
                            self.output.on_host_deploy_end(&host_name, false);
                        }
                    }
                }
                Err(e) => {
                    self.output.error(&format!("packing for {} failed: {}", host_name, e));
                    host_report.instances_failed = instance_names.len();
                    host_report.instances_not_attempted = 0;
                }
            }

            host_report.duration = started.elapsed();
            report.hosts.push(host_report);
        }

        self.output.on_resolve_end(targets.len(), self.resolver.unresolved_diagnostics().len());
        self.output.on_report(&report);
        Ok(report)
    }

    fn pack_for_host(&self, instance_names: &[String]) -> Result<Vec<(String, Vec<u8>)>> {
        let mut out = Vec::with_capacity(instance_names.len());
        for name in instance_names {
            let resolved = self.resolver.resolve_instance(name)?;
            if !resolved.unresolved.is_empty() {
                return Err(GoldenError::UnresolvedVariables { leaves: resolved.unresolved });
            }
            let inst = self
                .inventory
                .instance(name)
                .ok_or_else(|| GoldenError::Other(format!("no such instance: {}", name)))?;
            let (tar_bytes, count) = pack::pack_instance(self.resolver.engine(), &self.apps_dir, &inst.app, &resolved.vars)?;
            self.output.debug(&format!("packed {} files for instance {}", count, name));
            out.push((name.clone(), tar_bytes));
        }
        Ok(out)
    }

    fn deploy_to_host(&self, host_name: &str, instance_names: &[String], instance_tars: Vec<(String, Vec<u8>)>) -> Result<()> {
        let host = self
            .inventory
            .host(host_name)
            .ok_or_else(|| GoldenError::Other(format!("no such host: {}", host_name)))?;
        let executor = connection::for_host(host)?;

        let archive = pack::pack_host_archive(&instance_tars)?;

        let staging = staging_dir_name();
        let remote_archive = format!("/tmp/{}.tar.gz", staging);
        let remote_staging_dir = format!("/tmp/{}", staging);

        let local_tmp = std::env::temp_dir().join(format!("{}.tar.gz", staging));
        std::fs::write(&local_tmp, &archive)?;
        let cleanup = scopeguard(&local_tmp);

        executor.mkdir(&remote_staging_dir)?;
        executor.copy_file(&local_tmp, &remote_archive)?;
        executor.run_silently(&format!(
            "tar -xzf {} -C {}",
            shlex::try_quote(&remote_archive).unwrap_or_default(),
            shlex::try_quote(&remote_staging_dir).unwrap_or_default()
        ))?;

        for name in instance_names {
            let inst = self
                .inventory
                .instance(name)
                .ok_or_else(|| GoldenError::Other(format!("no such instance: {}", name)))?;
            let prefix = &inst.install_prefix;
            executor.mkdir(prefix)?;
            let instance_tar = format!("{}/{}.tar", remote_staging_dir, name);
            executor.run_silently(&format!(
                "tar -xf {} -C {}",
                shlex::try_quote(&instance_tar).unwrap_or_default(),
                shlex::try_quote(prefix).unwrap_or_default()
            ))?;
            self.output.info(&format!("deployed instance {} to {}", name, prefix));
        }

        executor.run_silently(&format!(
            "rm -rf {} {}",
            shlex::try_quote(&remote_staging_dir).unwrap_or_default(),
            shlex::try_quote(&remote_archive).unwrap_or_default()
        ))?;

        drop(cleanup);
        Ok(())
    }
}

/// Best-effort cleanup of the local staging archive; deployment success does
/// not depend on this succeeding.
fn scopeguard(path: &FsPath) -> impl Drop + '_ {
    struct Guard<'a>(&'a FsPath);
    impl<'a> Drop for Guard<'a> {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(self.0);
        }
    }
    Guard(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("instances.yml"),
            "web1:\n  host: h1\n  app: web\n  install_prefix: __PREFIX__\n",
        )
        .unwrap();
        fs::write(dir.path().join("hosts.yml"), "h1:\n  ssh_hostname: localhost\n").unwrap();
        fs::write(dir.path().join("groups.yml"), "g: []\n").unwrap();
        fs::create_dir_all(dir.path().join("apps/web")).unwrap();
        fs::write(dir.path().join("apps/web/readme.txt"), b"hello world").unwrap();
        dir
    }

    #[test]
    fn deploy_runs_local_executor_end_to_end() {
        let dir = fixture();
        let install_dir = TempDir::new().unwrap();
        let contents = fs::read_to_string(dir.path().join("instances.yml"))
            .unwrap()
            .replace("__PREFIX__", install_dir.path().to_str().unwrap());
        fs::write(dir.path().join("instances.yml"), contents).unwrap();

        let inv = Inventory::load(dir.path()).unwrap();
        let output: OutputHandlerRef = std::sync::Arc::new(crate::output::NullOutputHandler);
        let deployer = Deployer::new(dir.path(), &inv, output);
        let manifest: Manifest = vec!["web1".to_string()];
        let report = deployer.deploy(&manifest).unwrap();

        assert_eq!(report.total_deployed(), 1);
        assert_eq!(report.total_failed(), 0);
        assert_eq!(fs::read_to_string(install_dir.path().join("readme.txt")).unwrap(), "hello world");
    }

    #[test]
    fn deploy_reports_failure_for_unresolved_variables() {
        let dir = fixture();
        fs::create_dir_all(dir.path().join("instance_vars")).unwrap();
        fs::write(dir.path().join("instance_vars").join("web1.yml"), "port: \"{{missing}}\"\n").unwrap();

        let inv = Inventory::load(dir.path()).unwrap();
        let output: OutputHandlerRef = std::sync::Arc::new(crate::output::NullOutputHandler);
        let deployer = Deployer::new(dir.path(), &inv, output);
        let manifest: Manifest = vec!["web1".to_string()];
        let report = deployer.deploy(&manifest).unwrap();

        assert_eq!(report.total_failed(), 1);
        assert_eq!(report.total_deployed(), 0);
    }
}
