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

use std::collections::{HashMap, HashSet};
use std::path::Path as FsPath;

use crate::error::{GoldenError, Result};
use crate::inventory::yaml_loader::read_yaml_recursive;

/// A group's membership list: an ordered list of names plus a set for O(1)
/// lookup. Before inventory indexing runs, members are whatever the YAML
/// file listed (hosts and/or instances); after indexing they are rewritten
/// to the transitive instance set (§4.4 step 5).
#[derive(Clone, Debug, Default)]
pub struct Group {
    ordered: Vec<String>,
    members: HashSet<String>,
}

impl Group {
    fn from_list(names: Vec<String>) -> Result<Self> {
        let mut g = Group::default();
        for name in names {
            if !g.members.insert(name.clone()) {
                return Err(GoldenError::DuplicateName {
                    name,
                    kind: "instance or host in group".to_string(),
                    occurrences: vec![],
                });
            }
            g.ordered.push(name);
        }
        Ok(g)
    }

    pub fn list(&self) -> &[String] {
        &self.ordered
    }

    pub fn has(&self, name: &str) -> bool {
        self.members.contains(name)
    }

    fn clear(&mut self) {
        self.ordered.clear();
        self.members.clear();
    }

    fn push_unique(&mut self, name: &str) {
        if self.members.insert(name.to_string()) {
            self.ordered.push(name.to_string());
        }
    }
}

#[derive(Default)]
pub struct GroupsCollection(HashMap<String, Group>);

impl GroupsCollection {
    pub fn get(&self, name: &str) -> Option<&Group> {
        self.0.get(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Group)> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub(crate) fn reset_membership(&mut self) {
        for (_, g) in self.0.iter_mut() {
            g.clear();
        }
    }

    pub(crate) fn add_instance(&mut self, group: &str, instance: &str) {
        if let Some(g) = self.0.get_mut(group) {
            g.push_unique(instance);
        }
    }

    pub fn read(base: &FsPath) -> Result<Self> {
        let mut out = HashMap::new();
        let mut sources: HashMap<String, String> = HashMap::new();
        for (file, doc) in read_yaml_recursive(base)? {
            let file_str = file.display().to_string();
            let raw: HashMap<String, Vec<String>> = serde_yaml::from_value(doc).map_err(|e| GoldenError::Parse {
                file: file_str.clone(),
                context: None,
                message: e.to_string(),
            })?;
            for (name, members) in raw {
                if let Some(prior) = sources.get(&name) {
                    return Err(GoldenError::DuplicateName {
                        name,
                        kind: "group".to_string(),
                        occurrences: vec![prior.clone(), file_str],
                    });
                }
                let group = Group::from_list(members)?;
                sources.insert(name.clone(), file_str.clone());
                out.insert(name, group);
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
    fn reads_ordered_membership() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("groups.yml"), "web:\n  - web1\n  - web2\n").unwrap();
        let groups = GroupsCollection::read(&dir.path().join("groups")).unwrap();
        let web = groups.get("web").unwrap();
        assert_eq!(web.list(), &["web1".to_string(), "web2".to_string()]);
        assert!(web.has("web1"));
        assert!(!web.has("web3"));
    }

    #[test]
    fn duplicate_member_in_one_group_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("groups.yml"), "web:\n  - web1\n  - web1\n").unwrap();
        let err = GroupsCollection::read(&dir.path().join("groups")).unwrap_err();
        assert!(matches!(err, GoldenError::DuplicateName { .. }));
    }
}
