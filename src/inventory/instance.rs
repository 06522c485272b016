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

#[derive(Clone, Debug, Deserialize)]
pub struct Instance {
    #[serde(skip)]
    pub name: String,
    pub host: String,
    pub app: String,
    #[serde(default)]
    pub install_prefix: String,
}

#[derive(Default)]
pub struct InstancesCollection(HashMap<String, Instance>);

impl InstancesCollection {
    pub fn get(&self, name: &str) -> Option<&Instance> {
        self.0.get(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Instance)> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn override_install_prefix(&mut self, name: &str, prefix: String) {
        if let Some(inst) = self.0.get_mut(name) {
            inst.install_prefix = prefix;
        }
    }

    pub fn read(base: &FsPath) -> Result<Self> {
        let mut out = HashMap::new();
        let mut sources: HashMap<String, String> = HashMap::new();
        for (file, doc) in read_yaml_recursive(base)? {
            let file_str = file.display().to_string();
            let parsed: HashMap<String, Instance> = serde_yaml::from_value(doc).map_err(|e| GoldenError::Parse {
                file: file_str.clone(),
                context: None,
                message: e.to_string(),
            })?;
            for (name, mut inst) in parsed {
                if let Some(prior) = sources.get(&name) {
                    return Err(GoldenError::DuplicateName {
                        name,
                        kind: "instance".to_string(),
                        occurrences: vec![prior.clone(), file_str],
                    });
                }
                inst.name = name.clone();
                sources.insert(name.clone(), file_str.clone());
                out.insert(name, inst);
            }
        }
        Ok(Self(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn reads_instances_and_stamps_name() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("instances.yml"),
            "web1:\n  host: host-a\n  app: web\n  install_prefix: /opt/web\n",
        )
        .unwrap();
        let instances = InstancesCollection::read(&dir.path().join("instances")).unwrap();
        let web1 = instances.get("web1").unwrap();
        assert_eq!(web1.name, "web1");
        assert_eq!(web1.host, "host-a");
        assert_eq!(web1.app, "web");
    }

    #[test]
    fn duplicate_instance_name_across_files_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("instances")).unwrap();
        fs::write(dir.path().join("instances").join("a.yml"), "web1:\n  host: h\n  app: web\n").unwrap();
        fs::write(dir.path().join("instances").join("b.yml"), "web1:\n  host: h2\n  app: web\n").unwrap();
        let err = InstancesCollection::read(&dir.path().join("instances")).unwrap_err();
        assert!(matches!(err, GoldenError::DuplicateName { .. }));
    }
}
