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

//! Packs rendered app files into archives (§4.6 step 1).
//!
//! `apps/<app>/**` is walked for one instance at a time: plain files are
//! copied byte-for-byte, `*.hbs` files are rendered against the instance's
//! resolved vars with the suffix stripped, and `*.hbs_` files are copied
//! literally with only the trailing sentinel underscore stripped (so a file
//! can be named e.g. `nginx.conf.hbs` on disk without being templated).
//!
//! One tar archive is built per instance; those per-instance tars are then
//! collected into one gzip-compressed tar per host. Each entry's execute bit
//! is carried over from the source file so deployed scripts stay runnable.

use std::io::Write;
use std::path::{Path as FsPath, PathBuf};

use tar::{Builder, Header};

use crate::error::{GoldenError, Result};
use crate::template::TemplateEngine;
use crate::util::io::is_executable;

/// Render and tar one instance's app directory. Returns the raw (uncompressed)
/// tar bytes plus how many files were packed.
pub fn pack_instance(
    engine: &TemplateEngine,
    apps_dir: &FsPath,
    app: &str,
    vars: &serde_yaml::Mapping,
) -> Result<(Vec<u8>, usize)> {
    let app_dir = apps_dir.join(app);
    let mut builder = Builder::new(Vec::new());
    let mut count = 0usize;

    if app_dir.is_dir() {
        let mut files = Vec::new();
        collect_files(&app_dir, &mut files)?;
        files.sort();
        for file in files {
            let rel = file.strip_prefix(&app_dir).expect("file under app_dir");
            let mode = if is_executable(&file) { 0o755 } else { 0o644 };
            let (out_rel, contents) = render_one(engine, &file, rel, vars)?;
            append_bytes(&mut builder, &out_rel, &contents, mode)?;
            count += 1;
        }
    }

    let tar_bytes = builder.into_inner().map_err(GoldenError::Io)?;
    Ok((tar_bytes, count))
}

/// Wrap each instance's tar bytes (keyed by instance name) as `<name>.tar`
/// entries inside one outer tar, then gzip it into the per-host archive.
pub fn pack_host_archive(instance_tars: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    let mut outer = Builder::new(Vec::new());
    let mut names: Vec<&(String, Vec<u8>)> = instance_tars.iter().collect();
    names.sort_by(|a, b| a.0.cmp(&b.0));
    for (instance, tar_bytes) in names {
        let entry_name = format!("{}.tar", instance);
        append_bytes(&mut outer, FsPath::new(&entry_name), tar_bytes, 0o644)?;
    }
    let outer_bytes = outer.into_inner().map_err(GoldenError::Io)?;

    let mut gz = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    gz.write_all(&outer_bytes).map_err(GoldenError::Io)?;
    gz.finish().map_err(GoldenError::Io)
}

fn render_one(
    engine: &TemplateEngine,
    abs_path: &FsPath,
    rel_path: &FsPath,
    vars: &serde_yaml::Mapping,
) -> Result<(PathBuf, Vec<u8>)> {
    let name = rel_path.to_string_lossy().to_string();

    if let Some(stripped) = name.strip_suffix(".hbs_") {
        let out_name = format!("{}.hbs", stripped);
        let contents = std::fs::read(abs_path)?;
        return Ok((PathBuf::from(out_name), contents));
    }

    if let Some(stripped) = name.strip_suffix(".hbs") {
        let source = std::fs::read_to_string(abs_path)?;
        let tmpl = engine.parse(&abs_path.display().to_string(), &source)?;
        let rendered = engine.render_to_string(&tmpl, vars).map_err(|e| GoldenError::TemplateExec {
            source: abs_path.display().to_string(),
            context: "app file render".to_string(),
            message: e.to_string(),
        })?;
        return Ok((PathBuf::from(stripped), rendered.into_bytes()));
    }

    Ok((PathBuf::from(&name), std::fs::read(abs_path)?))
}

fn append_bytes(builder: &mut Builder<Vec<u8>>, path: &FsPath, data: &[u8], mode: u32) -> Result<()> {
    let mut header = Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(mode);
    header.set_cksum();
    builder.append_data(&mut header, path, data).map_err(GoldenError::Io)
}

fn collect_files(dir: &FsPath, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn engine() -> TemplateEngine {
        TemplateEngine::new()
    }

    fn vars_with(pairs: &[(&str, &str)]) -> serde_yaml::Mapping {
        let mut m = serde_yaml::Mapping::new();
        for (k, v) in pairs {
            m.insert((*k).into(), (*v).into());
        }
        m
    }

    #[test]
    fn literal_files_are_copied_byte_for_byte() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("apps/web")).unwrap();
        fs::write(dir.path().join("apps/web/readme.txt"), b"hello").unwrap();
        let (tar_bytes, count) = pack_instance(&engine(), &dir.path().join("apps"), "web", &vars_with(&[])).unwrap();
        assert_eq!(count, 1);
        let mut archive = tar::Archive::new(&tar_bytes[..]);
        let mut entries = archive.entries().unwrap();
        let mut entry = entries.next().unwrap().unwrap();
        assert_eq!(entry.path().unwrap().to_str().unwrap(), "readme.txt");
        let mut contents = String::new();
        std::io::Read::read_to_string(&mut entry, &mut contents).unwrap();
        assert_eq!(contents, "hello");
    }

    #[test]
    fn hbs_files_are_rendered_and_suffix_stripped() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("apps/web")).unwrap();
        fs::write(dir.path().join("apps/web/app.conf.hbs"), b"port={{port}}").unwrap();
        let (tar_bytes, _) = pack_instance(&engine(), &dir.path().join("apps"), "web", &vars_with(&[("port", "8080")])).unwrap();
        let mut archive = tar::Archive::new(&tar_bytes[..]);
        let mut entries = archive.entries().unwrap();
        let mut entry = entries.next().unwrap().unwrap();
        assert_eq!(entry.path().unwrap().to_str().unwrap(), "app.conf");
        let mut contents = String::new();
        std::io::Read::read_to_string(&mut entry, &mut contents).unwrap();
        assert_eq!(contents, "port=8080");
    }

    #[test]
    fn hbs_underscore_escape_hatch_is_copied_literally() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("apps/web")).unwrap();
        fs::write(dir.path().join("apps/web/sample.hbs_"), b"{{ not a template }}").unwrap();
        let (tar_bytes, _) = pack_instance(&engine(), &dir.path().join("apps"), "web", &vars_with(&[])).unwrap();
        let mut archive = tar::Archive::new(&tar_bytes[..]);
        let mut entries = archive.entries().unwrap();
        let mut entry = entries.next().unwrap().unwrap();
        assert_eq!(entry.path().unwrap().to_str().unwrap(), "sample.hbs");
        let mut contents = String::new();
        std::io::Read::read_to_string(&mut entry, &mut contents).unwrap();
        assert_eq!(contents, "{{ not a template }}");
    }

    #[test]
    fn executable_source_files_keep_their_execute_bit() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("apps/web")).unwrap();
        let script = dir.path().join("apps/web/run.sh");
        fs::write(&script, b"#!/bin/sh\necho hi\n").unwrap();
        let mut perms = fs::metadata(&script).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&script, perms).unwrap();

        let (tar_bytes, _) = pack_instance(&engine(), &dir.path().join("apps"), "web", &vars_with(&[])).unwrap();
        let mut archive = tar::Archive::new(&tar_bytes[..]);
        let mut entries = archive.entries().unwrap();
        let entry = entries.next().unwrap().unwrap();
        assert_eq!(entry.header().mode().unwrap(), 0o755);
    }

    #[test]
    fn missing_app_dir_packs_nothing() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("apps")).unwrap();
        let (_, count) = pack_instance(&engine(), &dir.path().join("apps"), "ghost", &vars_with(&[])).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn host_archive_wraps_each_instance_tar_as_an_entry() {
        let (tar_a, _) = (vec![1, 2, 3], 0);
        let (tar_b, _) = (vec![4, 5, 6], 0);
        let gz = pack_host_archive(&[("web1".to_string(), tar_a), ("web2".to_string(), tar_b)]).unwrap();
        let mut decoder = flate2::read::GzDecoder::new(&gz[..]);
        let mut outer_bytes = Vec::new();
        std::io::Read::read_to_end(&mut decoder, &mut outer_bytes).unwrap();
        let mut archive = tar::Archive::new(&outer_bytes[..]);
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["web1.tar".to_string(), "web2.tar".to_string()]);
    }
}
