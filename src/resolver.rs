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

//! Per-instance variable resolution (§4.2): loads the five layered var
//! trees, merges them in precedence order, appends the built-in layer, and
//! hands the merged tree to the [`crate::substitution`] fixpoint. Results
//! are memoized per instance name, as are the individual layers, so that
//! deploying many instances against the same app/group/host only parses
//! each `*_vars` layer once.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path as FsPath, PathBuf};

use crate::error::Result;
use crate::inventory::inventory::Inventory;
use crate::path::Path;
use crate::substitution::substitute;
use crate::template::TemplateEngine;
use crate::varmap::{merge, ConflictPolicy, Var, VarMap};

const BUILTIN_SOURCE: &str = "_builtin_";

/// A fully resolved instance: the regular map handed to the deployer, plus
/// any templated leaves that never converged.
#[derive(Clone, Debug, Default)]
pub struct ResolvedInstance {
    pub vars: serde_yaml::Mapping,
    pub unresolved: Vec<(String, String)>,
}

/// Per-instance orchestrator (§4.2). Not `Sync`: the layer and result caches
/// are plain `RefCell`s, so one `Resolver` serves one single-threaded run.
pub struct Resolver<'a> {
    root_dir: PathBuf,
    inventory: &'a Inventory,
    engine: TemplateEngine,
    common: RefCell<Option<VarMap>>,
    by_app: RefCell<HashMap<String, VarMap>>,
    by_group: RefCell<HashMap<String, VarMap>>,
    by_host: RefCell<HashMap<String, VarMap>>,
    by_instance: RefCell<HashMap<String, VarMap>>,
    resolved: RefCell<HashMap<String, ResolvedInstance>>,
}

impl<'a> Resolver<'a> {
    pub fn new(root_dir: &FsPath, inventory: &'a Inventory) -> Self {
        Self {
            root_dir: root_dir.to_path_buf(),
            inventory,
            engine: TemplateEngine::new(),
            common: RefCell::new(None),
            by_app: RefCell::new(HashMap::new()),
            by_group: RefCell::new(HashMap::new()),
            by_host: RefCell::new(HashMap::new()),
            by_instance: RefCell::new(HashMap::new()),
            resolved: RefCell::new(HashMap::new()),
        }
    }

    /// The template engine backing every substitution pass; exposed so the
    /// deployer can reuse it for app-file rendering instead of building a
    /// second one with its own helper registrations.
    pub fn engine(&self) -> &TemplateEngine {
        &self.engine
    }

    /// Resolve (and memoize) a single instance's final configuration.
    pub fn resolve_instance(&self, instance_name: &str) -> Result<ResolvedInstance> {
        if let Some(cached) = self.resolved.borrow().get(instance_name) {
            return Ok(cached.clone());
        }

        let inst = self
            .inventory
            .instance(instance_name)
            .ok_or_else(|| crate::error::GoldenError::Other(format!("no such instance: {}", instance_name)))?;

        let mut merged = self.load_common()?;
        merged = merge(merged, self.load_app(&inst.app)?, ConflictPolicy::Override)?;
        merged = merge(merged, self.load_group_layer(instance_name)?, ConflictPolicy::Override)?;
        merged = merge(merged, self.load_host(&inst.host)?, ConflictPolicy::Override)?;
        merged = merge(merged, self.load_instance(instance_name)?, ConflictPolicy::Override)?;
        merged = merge(merged, builtin_vars(inst.host.clone(), inst.app.clone(), instance_name.to_string(), inst.install_prefix.clone()), ConflictPolicy::Error)?;

        let outcome = substitute(&self.engine, &merged)?;
        let result = ResolvedInstance { vars: outcome.resolved, unresolved: outcome.unresolved };
        self.resolved.borrow_mut().insert(instance_name.to_string(), result.clone());
        Ok(result)
    }

    /// Resolve every instance in the inventory, aggregating unresolved diagnostics.
    pub fn resolve_all(&self) -> Result<HashMap<String, ResolvedInstance>> {
        let names: Vec<String> = self.inventory.all_instances().map(|(n, _)| n.clone()).collect();
        let mut out = HashMap::new();
        for name in names {
            out.insert(name.clone(), self.resolve_instance(&name)?);
        }
        Ok(out)
    }

    /// All unresolved-variable diagnostics across every resolved instance.
    pub fn unresolved_diagnostics(&self) -> Vec<(String, String, String)> {
        self.resolved
            .borrow()
            .iter()
            .flat_map(|(inst, r)| r.unresolved.iter().map(move |(path, source)| (inst.clone(), path.clone(), source.clone())))
            .collect()
    }

    fn load_common(&self) -> Result<VarMap> {
        if let Some(v) = self.common.borrow().as_ref() {
            return Ok(v.clone());
        }
        let loaded = load_layer(&self.root_dir.join("common_vars"))?;
        *self.common.borrow_mut() = Some(loaded.clone());
        Ok(loaded)
    }

    fn load_app(&self, app: &str) -> Result<VarMap> {
        if let Some(v) = self.by_app.borrow().get(app) {
            return Ok(v.clone());
        }
        let loaded = load_layer(&self.root_dir.join("app_vars").join(app))?;
        self.by_app.borrow_mut().insert(app.to_string(), loaded.clone());
        Ok(loaded)
    }

    fn load_host(&self, host: &str) -> Result<VarMap> {
        if let Some(v) = self.by_host.borrow().get(host) {
            return Ok(v.clone());
        }
        let loaded = load_layer(&self.root_dir.join("host_vars").join(host))?;
        self.by_host.borrow_mut().insert(host.to_string(), loaded.clone());
        Ok(loaded)
    }

    fn load_instance_layer_by_name(&self, instance: &str) -> Result<VarMap> {
        if let Some(v) = self.by_instance.borrow().get(instance) {
            return Ok(v.clone());
        }
        let loaded = load_layer(&self.root_dir.join("instance_vars").join(instance))?;
        self.by_instance.borrow_mut().insert(instance.to_string(), loaded.clone());
        Ok(loaded)
    }

    fn load_instance(&self, instance: &str) -> Result<VarMap> {
        self.load_instance_layer_by_name(instance)
    }

    fn load_group(&self, group: &str) -> Result<VarMap> {
        if let Some(v) = self.by_group.borrow().get(group) {
            return Ok(v.clone());
        }
        let loaded = load_layer(&self.root_dir.join("group_vars").join(group))?;
        self.by_group.borrow_mut().insert(group.to_string(), loaded.clone());
        Ok(loaded)
    }

    /// Merge every group this instance belongs to into one layer, with
    /// `ConflictPolicy::Error` between groups (§4.2 step 3).
    fn load_group_layer(&self, instance: &str) -> Result<VarMap> {
        let mut groups: Vec<String> = self.inventory.groups_of(instance).to_vec();
        groups.sort();
        let mut layer = VarMap::new();
        for g in groups {
            let group_vars = self.load_group(&g)?;
            layer = merge(layer, group_vars, ConflictPolicy::Error)?;
        }
        Ok(layer)
    }
}

/// Load a single `*_vars` layer (file-or-directory), stamping every document
/// with its source file and path before merging the documents together with
/// `Override` (order is the sorted file order `yaml_loader` already returns).
fn load_layer(base: &FsPath) -> Result<VarMap> {
    let docs = crate::inventory::yaml_loader::read_yaml_recursive(base)?;
    let mut layer = VarMap::new();
    for (file, doc) in docs {
        let file_str = file.display().to_string();
        let mut vm = VarMap::from_yaml_value(doc)?;
        vm.set_paths();
        vm.set_source(&file_str);
        layer = merge(layer, vm, ConflictPolicy::Override)?;
    }
    Ok(layer)
}

fn builtin_vars(host: String, app: String, instance: String, install_prefix: String) -> VarMap {
    let mut vm = VarMap::new();
    vm.insert("_host_", Var::leaf(serde_yaml::Value::String(host), Path::from("_host_"), BUILTIN_SOURCE));
    vm.insert("_app_", Var::leaf(serde_yaml::Value::String(app), Path::from("_app_"), BUILTIN_SOURCE));
    vm.insert("_instance_", Var::leaf(serde_yaml::Value::String(instance), Path::from("_instance_"), BUILTIN_SOURCE));
    vm.insert(
        "_install_prefix_",
        Var::leaf(serde_yaml::Value::String(install_prefix), Path::from("_install_prefix_"), BUILTIN_SOURCE),
    );
    vm
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
            "web1:\n  host: h1\n  app: web\n  install_prefix: /opt/web\n",
        )
        .unwrap();
        fs::write(dir.path().join("hosts.yml"), "h1:\n  ssh_hostname: localhost\n").unwrap();
        fs::write(dir.path().join("groups.yml"), "g1: []\ng2: []\n").unwrap();
        dir
    }

    #[test]
    fn scenario_1_simple_override_chain() {
        let dir = fixture();
        fs::write(dir.path().join("common_vars.yml"), "x: 1\n").unwrap();
        fs::create_dir_all(dir.path().join("app_vars")).unwrap();
        fs::write(dir.path().join("app_vars").join("web.yml"), "x: 2\n").unwrap();
        fs::create_dir_all(dir.path().join("instance_vars")).unwrap();
        fs::write(dir.path().join("instance_vars").join("web1.yml"), "x: 3\n").unwrap();

        let inv = Inventory::load(dir.path()).unwrap();
        let resolver = Resolver::new(dir.path(), &inv);
        let resolved = resolver.resolve_instance("web1").unwrap();
        assert_eq!(resolved.vars.get("x").unwrap().as_i64().unwrap(), 3);
    }

    #[test]
    fn scenario_1b_instance_vars_empty_falls_back_to_app() {
        let dir = fixture();
        fs::write(dir.path().join("common_vars.yml"), "x: 1\n").unwrap();
        fs::create_dir_all(dir.path().join("app_vars")).unwrap();
        fs::write(dir.path().join("app_vars").join("web.yml"), "x: 2\n").unwrap();

        let inv = Inventory::load(dir.path()).unwrap();
        let resolver = Resolver::new(dir.path(), &inv);
        let resolved = resolver.resolve_instance("web1").unwrap();
        assert_eq!(resolved.vars.get("x").unwrap().as_i64().unwrap(), 2);
    }

    #[test]
    fn scenario_5_group_conflict_is_resolution_conflict() {
        let dir = fixture();
        fs::write(dir.path().join("groups.yml"), "g1:\n  - web1\ng2:\n  - web1\n").unwrap();
        fs::create_dir_all(dir.path().join("group_vars")).unwrap();
        fs::write(dir.path().join("group_vars").join("g1.yml"), "x: 1\n").unwrap();
        fs::write(dir.path().join("group_vars").join("g2.yml"), "x: 2\n").unwrap();

        let inv = Inventory::load(dir.path()).unwrap();
        let resolver = Resolver::new(dir.path(), &inv);
        let err = resolver.resolve_instance("web1").unwrap_err();
        assert!(matches!(err, crate::error::GoldenError::ResolutionConflict { .. }));
    }

    #[test]
    fn scenario_6_host_inheritance_applies_group_vars() {
        let dir = fixture();
        fs::write(dir.path().join("groups.yml"), "g1:\n  - h1\ng2: []\n").unwrap();
        fs::create_dir_all(dir.path().join("group_vars")).unwrap();
        fs::write(dir.path().join("group_vars").join("g1.yml"), "x: from_group\n").unwrap();

        let inv = Inventory::load(dir.path()).unwrap();
        let resolver = Resolver::new(dir.path(), &inv);
        let resolved = resolver.resolve_instance("web1").unwrap();
        assert_eq!(resolved.vars.get("x").unwrap().as_str().unwrap(), "from_group");
    }

    #[test]
    fn scenario_7_builtin_protection() {
        let dir = fixture();
        fs::create_dir_all(dir.path().join("instance_vars")).unwrap();
        fs::write(dir.path().join("instance_vars").join("web1.yml"), "_host_: hacked\n").unwrap();

        let inv = Inventory::load(dir.path()).unwrap();
        let resolver = Resolver::new(dir.path(), &inv);
        let err = resolver.resolve_instance("web1").unwrap_err();
        match err {
            crate::error::GoldenError::ResolutionConflict { path, .. } => assert_eq!(path, "_host_"),
            other => panic!("expected ResolutionConflict, got {:?}", other),
        }
    }

    #[test]
    fn builtins_are_populated_from_instance_record() {
        let dir = fixture();
        let inv = Inventory::load(dir.path()).unwrap();
        let resolver = Resolver::new(dir.path(), &inv);
        let resolved = resolver.resolve_instance("web1").unwrap();
        assert_eq!(resolved.vars.get("_host_").unwrap().as_str().unwrap(), "h1");
        assert_eq!(resolved.vars.get("_app_").unwrap().as_str().unwrap(), "web");
        assert_eq!(resolved.vars.get("_instance_").unwrap().as_str().unwrap(), "web1");
        assert_eq!(resolved.vars.get("_install_prefix_").unwrap().as_str().unwrap(), "/opt/web");
    }

    #[test]
    fn template_fixpoint_across_layers() {
        let dir = fixture();
        fs::write(dir.path().join("common_vars.yml"), "a: A\nb: \"{{a}}-B\"\nc: \"{{b}}-C\"\n").unwrap();
        let inv = Inventory::load(dir.path()).unwrap();
        let resolver = Resolver::new(dir.path(), &inv);
        let resolved = resolver.resolve_instance("web1").unwrap();
        assert_eq!(resolved.vars.get("c").unwrap().as_str().unwrap(), "A-B-C");
    }

    #[test]
    fn resolution_is_cached_on_repeat() {
        let dir = fixture();
        let inv = Inventory::load(dir.path()).unwrap();
        let resolver = Resolver::new(dir.path(), &inv);
        let a = resolver.resolve_instance("web1").unwrap();
        let b = resolver.resolve_instance("web1").unwrap();
        assert_eq!(a.vars, b.vars);
    }

    #[test]
    fn resolve_all_covers_every_instance() {
        let dir = fixture();
        let inv = Inventory::load(dir.path()).unwrap();
        let resolver = Resolver::new(dir.path(), &inv);
        let all = resolver.resolve_all().unwrap();
        assert!(all.contains_key("web1"));
    }
}
