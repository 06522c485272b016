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

//! Loads an inventory layer (`instances`, `hosts`, `groups`, `manifests`, or
//! a `*_vars` directory) from either a single `B.yml` file or a directory
//! `B/` of `*.yml` files, recursively. Exactly one of the two may exist.

use std::path::{Path as FsPath, PathBuf};

use crate::error::{GoldenError, Result};
use crate::util::io::{jet_read_dir, read_local_file};

/// Every `*.yml` document found for `base`, paired with its source path.
pub fn read_yaml_recursive(base: &FsPath) -> Result<Vec<(PathBuf, serde_yaml::Value)>> {
    let (file_path, dir_path) = candidate_paths(base);

    let file_exists = file_path.is_file();
    let dir_exists = dir_path.is_dir();

    if file_exists && dir_exists {
        return Err(GoldenError::AmbiguousPath {
            file_path: file_path.display().to_string(),
            dir_path: dir_path.display().to_string(),
        });
    }

    if !file_exists && !dir_exists {
        return Ok(Vec::new());
    }

    if dir_exists {
        let mut files = Vec::new();
        collect_yaml_files(&dir_path, &mut files)?;
        files.sort();
        let mut out = Vec::with_capacity(files.len());
        for f in files {
            out.push((f.clone(), read_one(&f)?));
        }
        return Ok(out);
    }

    Ok(vec![(file_path.clone(), read_one(&file_path)?)])
}

fn candidate_paths(base: &FsPath) -> (PathBuf, PathBuf) {
    let base_str = base.to_string_lossy();
    if let Some(stripped) = base_str.strip_suffix(".yml") {
        (base.to_path_buf(), PathBuf::from(stripped))
    } else {
        (PathBuf::from(format!("{}.yml", base_str)), base.to_path_buf())
    }
}

fn collect_yaml_files(dir: &FsPath, out: &mut Vec<PathBuf>) -> Result<()> {
    let read_dir = jet_read_dir(dir).map_err(GoldenError::Other)?;
    for entry in read_dir {
        let entry = entry.map_err(|e| GoldenError::Io(e))?;
        let path = entry.path();
        if path.is_dir() {
            collect_yaml_files(&path, out)?;
        } else if path.extension().map(|e| e == "yml").unwrap_or(false) {
            out.push(path);
        }
    }
    Ok(())
}

fn read_one(path: &FsPath) -> Result<serde_yaml::Value> {
    let contents = read_local_file(path).map_err(GoldenError::Other)?;
    serde_yaml::from_str(&contents).map_err(|e| GoldenError::Parse {
        file: path.display().to_string(),
        context: None,
        message: e.to_string(),
    })
}
