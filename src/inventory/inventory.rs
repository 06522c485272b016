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

//! The inventory indexer: loads instances/hosts/groups, enforces global
//! name uniqueness across the three, derives host-instance membership, and
//! resolves host-mediated group inheritance before rewriting every group's
//! membership down to its transitive instance set.

use std::collections::{HashMap, HashSet};
use std::path::Path as FsPath;

use crate::error::{GoldenError, Result};
use crate::inventory::group::GroupsCollection;
use crate::inventory::host::{Host, HostsCollection};
use crate::inventory::instance::{Instance, InstancesCollection};
use crate::inventory::manifest::{Manifest, ManifestsCollection};

pub struct Inventory {
    instances: InstancesCollection,
    hosts: HostsCollection,
    groups: GroupsCollection,
    manifests: ManifestsCollection,
    host_instances: HashMap<String, Vec<String>>,
    instance_groups: HashMap<String, Vec<String>>,
}

impl Inventory {
    pub fn load(root_dir: &FsPath) -> Result<Self> {
        let instances = InstancesCollection::read(&root_dir.join("instances"))?;
        let hosts = HostsCollection::read(&root_dir.join("hosts"))?;
        let mut groups = GroupsCollection::read(&root_dir.join("groups"))?;
        let manifests = ManifestsCollection::read(&root_dir.join("manifests"))?;

        must_have_unique_names(&instances, &hosts, &groups)?;

        let mut host_instances: HashMap<String, Vec<String>> = HashMap::new();
        for (name, inst) in instances.iter() {
            host_instances.entry(inst.host.clone()).or_default().push(name.clone());
        }

        let mut host_groups: HashMap<String, Vec<String>> = HashMap::new();
        let mut instance_groups_set: HashMap<String, HashSet<String>> = HashMap::new();

        for (group_name, group) in groups.iter() {
            for member in group.list() {
                if hosts.contains_key(member) {
                    host_groups.entry(member.clone()).or_default().push(group_name.clone());
                } else if instances.contains_key(member) {
                    instance_groups_set.entry(member.clone()).or_default().insert(group_name.clone());
                } else {
                    return Err(GoldenError::UnknownMember { member: member.clone(), group: group_name.clone() });
                }
            }
        }

        let mut host_names: Vec<&String> = host_instances.keys().collect();
        host_names.sort();
        for host in host_names {
            let insts = &host_instances[host];
            if let Some(groups_for_host) = host_groups.get(host) {
                for inst in insts {
                    let entry = instance_groups_set.entry(inst.clone()).or_default();
                    for g in groups_for_host {
                        entry.insert(g.clone());
                    }
                }
            }
        }

        groups.reset_membership();
        let mut instance_groups: HashMap<String, Vec<String>> = HashMap::new();
        let mut inst_names: Vec<&String> = instance_groups_set.keys().collect();
        inst_names.sort();
        for inst in inst_names {
            let mut list: Vec<String> = instance_groups_set[inst].iter().cloned().collect();
            list.sort();
            for g in &list {
                groups.add_instance(g, inst);
            }
            instance_groups.insert(inst.clone(), list);
        }

        Ok(Self { instances, hosts, groups, manifests, host_instances, instance_groups })
    }

    /// Look up a named manifest (`--manifest <name>`), raising
    /// `UnknownManifest` if it doesn't exist.
    pub fn manifest(&self, name: &str) -> Result<&Manifest> {
        self.manifests.get(name).ok_or_else(|| GoldenError::UnknownManifest { name: name.to_string() })
    }

    pub fn instances_for(&self, manifest: &Manifest) -> Vec<&Instance> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for name in manifest {
            if let Some(inst) = self.instances.get(name) {
                if seen.insert(inst.name.clone()) {
                    out.push(inst);
                }
                continue;
            }
            if self.hosts.contains_key(name) {
                if let Some(insts) = self.host_instances.get(name) {
                    for inst_name in insts {
                        if seen.insert(inst_name.clone()) {
                            if let Some(inst) = self.instances.get(inst_name) {
                                out.push(inst);
                            }
                        }
                    }
                }
                continue;
            }
            if let Some(group) = self.groups.get(name) {
                for inst_name in group.list() {
                    if seen.insert(inst_name.clone()) {
                        if let Some(inst) = self.instances.get(inst_name) {
                            out.push(inst);
                        }
                    }
                }
            }
        }
        out
    }

    pub fn host(&self, name: &str) -> Option<&Host> {
        self.hosts.get(name)
    }

    pub fn groups_of(&self, instance: &str) -> &[String] {
        self.instance_groups.get(instance).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn all_instances(&self) -> impl Iterator<Item = (&String, &Instance)> {
        self.instances.iter()
    }

    pub fn instance(&self, name: &str) -> Option<&Instance> {
        self.instances.get(name)
    }

    pub fn set_hosts_to_localhost(&mut self) {
        self.hosts.set_all_to_localhost();
    }

    pub fn override_install_prefix(&mut self, name: &str, prefix: String) {
        self.instances.override_install_prefix(name, prefix);
    }
}

fn must_have_unique_names(
    instances: &InstancesCollection,
    hosts: &HostsCollection,
    groups: &GroupsCollection,
) -> Result<()> {
    let mut seen: HashSet<String> = HashSet::new();

    let mut names: Vec<&String> = instances.names().collect();
    names.sort();
    for n in names {
        if !seen.insert(n.clone()) {
            return Err(GoldenError::DuplicateName { name: n.clone(), kind: "instance/host/group".to_string(), occurrences: vec![] });
        }
    }

    let mut names: Vec<&String> = hosts.names().collect();
    names.sort();
    for n in names {
        if !seen.insert(n.clone()) {
            return Err(GoldenError::DuplicateName { name: n.clone(), kind: "instance/host/group".to_string(), occurrences: vec![] });
        }
    }

    let mut names: Vec<&String> = groups.names().collect();
    names.sort();
    for n in names {
        if !seen.insert(n.clone()) {
            return Err(GoldenError::DuplicateName { name: n.clone(), kind: "instance/host/group".to_string(), occurrences: vec![] });
        }
    }

    Ok(())
}
