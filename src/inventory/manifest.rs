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

//! A named manifest: an ordered list of instance/host/group names the CLI's
//! `--manifest` flag selects a deployment against.

use std::collections::HashMap;
use std::path::Path as FsPath;

use crate::error::{GoldenError, Result};
use crate::inventory::yaml_loader::read_yaml_recursive;

pub type Manifest = Vec<String>;

#[derive(Default)]
pub struct ManifestsCollection(HashMap<String, Manifest>);

impl ManifestsCollection {
    pub fn get(&self, name: &str) -> Option<&Manifest> {
        self.0.get(name)
    }

    pub fn read(base: &FsPath) -> Result<Self> {
        let mut out = HashMap::new();
        let mut sources: HashMap<String, String> = HashMap::new();
        for (file, doc) in read_yaml_recursive(base)? {
            let file_str = file.display().to_string();
            let parsed: HashMap<String, Manifest> = serde_yaml::from_value(doc).map_err(|e| GoldenError::Parse {
                file: file_str.clone(),
                context: None,
                message: e.to_string(),
            })?;
            for (name, manifest) in parsed {
                if let Some(prior) = sources.get(&name) {
                    return Err(GoldenError::DuplicateName {
                        name,
                        kind: "manifest".to_string(),
                        occurrences: vec![prior.clone(), file_str],
                    });
                }
                sources.insert(name.clone(), file_str.clone());
                out.insert(name, manifest);
            }
        }
        Ok(Self(out))
    }
}
