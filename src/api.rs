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

//! Library entry point: turns a [`GoldenConfig`] into a loaded [`Inventory`]
//! and a finished [`Report`], the same path the CLI binary drives.

use std::sync::Arc;

use crate::config::{GoldenConfig, Target};
use crate::deployer::{Deployer, Report};
use crate::error::{GoldenError, Result};
use crate::inventory::inventory::Inventory;
use crate::inventory::manifest::Manifest;
use crate::output::{NullOutputHandler, OutputHandlerRef};

/// Run a deployment end to end against `config`, using `output` for progress
/// (pass `Arc::new(NullOutputHandler)` for silent library use).
pub fn run(config: &GoldenConfig, output: OutputHandlerRef) -> Result<Report> {
    let mut inventory = Inventory::load(&config.root_dir)?;

    if config.locally {
        inventory.set_hosts_to_localhost();
    }

    let manifest = resolve_target(&config.target, &inventory)?;
    let manifest = filter_by_app_whitelist(manifest, config, &inventory);

    if let Some(prefix_template) = &config.prefix {
        apply_prefix(&mut inventory, prefix_template, &manifest)?;
    }

    let deployer = Deployer::new(&config.root_dir, &inventory, output);
    deployer.deploy(&manifest)
}

/// Run with progress silently discarded; convenient for embedding.
pub fn run_silent(config: &GoldenConfig) -> Result<Report> {
    run(config, Arc::new(NullOutputHandler))
}

fn resolve_target(target: &Option<Target>, inventory: &Inventory) -> Result<Manifest> {
    match target {
        Some(Target::Manifest(name)) => Ok(inventory.manifest(name)?.clone()),
        Some(Target::Group(name)) => Ok(vec![name.clone()]),
        None => Err(GoldenError::Other("either --manifest or --group must be given".to_string())),
    }
}

fn filter_by_app_whitelist(manifest: Manifest, config: &GoldenConfig, inventory: &Inventory) -> Manifest {
    if config.apps.is_none() {
        return manifest;
    }
    inventory
        .instances_for(&manifest)
        .into_iter()
        .filter(|inst| config.app_allowed(&inst.app))
        .map(|inst| inst.name.clone())
        .collect()
}

fn apply_prefix(inventory: &mut Inventory, prefix_template: &str, manifest: &Manifest) -> Result<()> {
    let engine = crate::template::TemplateEngine::new();
    let tmpl = engine.parse("--prefix", prefix_template)?;

    let names: Vec<String> = inventory.instances_for(manifest).iter().map(|i| i.name.clone()).collect();
    for name in names {
        let inst = inventory.instance(&name).expect("instance exists");
        let mut ctx = serde_yaml::Mapping::new();
        ctx.insert("_host_".into(), inst.host.clone().into());
        ctx.insert("_app_".into(), inst.app.clone().into());
        ctx.insert("_instance_".into(), name.clone().into());
        ctx.insert("_install_prefix_".into(), inst.install_prefix.clone().into());
        let rendered = engine.render_to_string(&tmpl, &ctx).map_err(|e| GoldenError::TemplateExec {
            source: "--prefix".to_string(),
            context: format!("instance {}", name),
            message: e.to_string(),
        })?;
        let new_prefix = crate::util::join_unix_paths(&rendered, &inst.install_prefix);
        inventory.override_install_prefix(&name, new_prefix);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("instances.yml"), "web1:\n  host: h1\n  app: web\n  install_prefix: /opt/web\n").unwrap();
        fs::write(dir.path().join("hosts.yml"), "h1:\n  ssh_hostname: localhost\n").unwrap();
        fs::write(dir.path().join("groups.yml"), "g: []\n").unwrap();
        fs::create_dir_all(dir.path().join("apps/web")).unwrap();
        fs::write(dir.path().join("apps/web/readme.txt"), b"hi").unwrap();
        dir
    }

    #[test]
    fn run_with_group_target_deploys_matching_instances() {
        let dir = fixture();
        let cfg = GoldenConfig::new().root_dir(dir.path()).group("web1");
        let report = run_silent(&cfg).unwrap();
        assert_eq!(report.total_deployed(), 1);
    }

    #[test]
    fn run_with_unknown_manifest_name_fails() {
        let dir = fixture();
        let cfg = GoldenConfig::new().root_dir(dir.path()).manifest("ghost");
        let err = run_silent(&cfg).unwrap_err();
        assert!(matches!(err, GoldenError::UnknownManifest { .. }));
    }

    #[test]
    fn run_with_no_target_fails() {
        let dir = fixture();
        let cfg = GoldenConfig::new().root_dir(dir.path());
        let err = run_silent(&cfg).unwrap_err();
        assert!(matches!(err, GoldenError::Other(_)));
    }

    #[test]
    fn apps_whitelist_excludes_instance_without_matching_app() {
        let dir = fixture();
        let cfg = GoldenConfig::new().root_dir(dir.path()).group("web1").apps(vec!["db".to_string()]);
        let report = run_silent(&cfg).unwrap();
        assert_eq!(report.hosts.len(), 0);
    }

    #[test]
    fn prefix_is_path_joined_not_concatenated() {
        let dir = fixture();
        let mut inv = Inventory::load(dir.path()).unwrap();
        let manifest: Manifest = vec!["web1".to_string()];
        apply_prefix(&mut inv, "/staging/", &manifest).unwrap();
        assert_eq!(inv.instance("web1").unwrap().install_prefix, "/staging/opt/web");
    }
}
