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

//! The recursive, provenance-bearing variable tree (§3/§4.1 of SPEC_FULL.md).
//!
//! A [`VarMap`] is what every `*_vars` YAML layer parses into. Each leaf
//! remembers the dotted [`Path`] it lives at and the file it came from, so
//! that a [`merge`] failure or a substitution diagnostic can always point at
//! an actual line in an actual file.

use std::collections::HashMap;
use crate::error::{GoldenError, Result};
use crate::path::Path;

/// What a single [`Var`] node holds: either a leaf (scalar or sequence, kept
/// as a `serde_yaml::Value` so templating and re-serialization stay exact),
/// or a nested [`VarMap`].
#[derive(Clone, Debug)]
pub enum VarValue {
    Leaf(serde_yaml::Value),
    Map(VarMap),
}

#[derive(Clone, Debug)]
pub struct Var {
    pub value: VarValue,
    pub path: Path,
    pub source: String,
}

impl Var {
    pub fn leaf(value: serde_yaml::Value, path: Path, source: impl Into<String>) -> Self {
        Self { value: VarValue::Leaf(value), path, source: source.into() }
    }
}

/// Conflict-resolution policy for [`merge`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Higher layer silently wins.
    Override,
    /// A collision at a non-map leaf is a hard [`GoldenError::ResolutionConflict`].
    Error,
}

/// A mapping from key to [`Var`]; insertion order is not semantically significant.
#[derive(Clone, Debug, Default)]
pub struct VarMap(HashMap<String, Var>);

impl VarMap {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, var: Var) {
        self.0.insert(key.into(), var);
    }

    pub fn get(&self, key: &str) -> Option<&Var> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Var)> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut Var)> {
        self.0.iter_mut()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Parse a `serde_yaml::Value` (as read from a vars file) into a `VarMap`.
    /// Null leaves normalize to the empty string, per the data model.
    pub fn from_yaml_value(value: serde_yaml::Value) -> Result<VarMap> {
        let mapping = match value {
            serde_yaml::Value::Mapping(m) => m,
            serde_yaml::Value::Null => serde_yaml::Mapping::new(),
            other => {
                return Err(GoldenError::Parse {
                    file: String::new(),
                    context: None,
                    message: format!("expected a mapping at the document root, found {:?}", other),
                })
            }
        };
        let mut out = VarMap::new();
        for (k, v) in mapping {
            let key = match k {
                serde_yaml::Value::String(s) => s,
                other => serde_yaml::to_string(&other).unwrap_or_default().trim().to_string(),
            };
            let var = Self::value_to_var(v, Path::new())?;
            out.insert(key, var);
        }
        Ok(out)
    }

    fn value_to_var(value: serde_yaml::Value, path: Path) -> Result<Var> {
        match value {
            serde_yaml::Value::Mapping(m) => {
                let mut sub = VarMap::new();
                for (k, v) in m {
                    let key = match k {
                        serde_yaml::Value::String(s) => s,
                        other => serde_yaml::to_string(&other).unwrap_or_default().trim().to_string(),
                    };
                    let child_path = path.copy_join(&[&key]);
                    let child = Self::value_to_var(v, child_path)?;
                    sub.insert(key, child);
                }
                Ok(Var { value: VarValue::Map(sub), path, source: String::new() })
            }
            serde_yaml::Value::Null => {
                Ok(Var::leaf(serde_yaml::Value::String(String::new()), path, ""))
            }
            other => Ok(Var::leaf(other, path, "")),
        }
    }

    /// Stamp every leaf and sub-map (recursively) with `source`.
    pub fn set_source(&mut self, source: &str) {
        for (_, v) in self.0.iter_mut() {
            v.source = source.to_string();
            if let VarValue::Map(sub) = &mut v.value {
                sub.set_source(source);
            }
        }
    }

    /// Recompute every leaf's [`Path`] relative to this map's root.
    pub fn set_paths(&mut self) {
        self.set_paths_from(&Path::new());
    }

    fn set_paths_from(&mut self, common: &Path) {
        for (k, v) in self.0.iter_mut() {
            v.path = common.copy_join(&[k]);
            if let VarValue::Map(sub) = &mut v.value {
                sub.set_paths_from(&v.path);
            }
        }
    }

    /// Project this tree to a plain `serde_yaml::Mapping` (drops provenance),
    /// suitable as a handlebars render context.
    pub fn to_regular_map(&self) -> serde_yaml::Mapping {
        let mut reg = serde_yaml::Mapping::new();
        for (k, v) in self.0.iter() {
            let val = match &v.value {
                VarValue::Map(sub) => serde_yaml::Value::Mapping(sub.to_regular_map()),
                VarValue::Leaf(leaf) => leaf.clone(),
            };
            reg.insert(serde_yaml::Value::String(k.clone()), val);
        }
        reg
    }
}

/// Combine `lower` and `higher` under `policy`; `higher` wins ties under
/// [`ConflictPolicy::Override`] (§4.1).
pub fn merge(lower: VarMap, higher: VarMap, policy: ConflictPolicy) -> Result<VarMap> {
    merge_at(&Path::new(), lower, higher, policy)
}

fn merge_at(common_path: &Path, lower: VarMap, higher: VarMap, policy: ConflictPolicy) -> Result<VarMap> {
    let mut merged = lower;
    for (higher_k, higher_v) in higher.0.into_iter() {
        match merged.0.remove(&higher_k) {
            None => {
                merged.0.insert(higher_k, higher_v);
            }
            Some(lower_v) => {
                let lower_is_map = matches!(lower_v.value, VarValue::Map(_));
                let higher_is_map = matches!(higher_v.value, VarValue::Map(_));

                if lower_is_map || higher_is_map {
                    if lower_is_map != higher_is_map {
                        return Err(GoldenError::TypeMismatch {
                            path: common_path.copy_join(&[&higher_k]).to_string(),
                            sources: [lower_v.source.clone(), higher_v.source.clone()],
                        });
                    }
                    let this_path = common_path.copy_join(&[&higher_k]);
                    let (lower_sub, higher_sub) = match (lower_v.value, higher_v.value) {
                        (VarValue::Map(l), VarValue::Map(h)) => (l, h),
                        _ => unreachable!("both sides checked to be maps"),
                    };
                    let sub_merged = merge_at(&this_path, lower_sub, higher_sub, policy)?;
                    merged.0.insert(
                        higher_k,
                        Var { value: VarValue::Map(sub_merged), path: this_path, source: higher_v.source },
                    );
                    continue;
                }

                match policy {
                    ConflictPolicy::Override => {
                        merged.0.insert(higher_k, higher_v);
                    }
                    ConflictPolicy::Error => {
                        let conflict_path = common_path.copy_join(&[&higher_k]);
                        return Err(GoldenError::ResolutionConflict {
                            path: conflict_path.to_string(),
                            sources: [lower_v.source, higher_v.source],
                        });
                    }
                }
            }
        }
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_map(pairs: &[(&str, &str)], source: &str) -> VarMap {
        let mut m = VarMap::new();
        for (k, v) in pairs {
            m.insert(
                *k,
                Var::leaf(serde_yaml::Value::String(v.to_string()), Path::from(*k), source),
            );
        }
        m
    }

    #[test]
    fn override_is_right_biased_at_leaves() {
        // P1
        let lower = leaf_map(&[("x", "1"), ("y", "keep")], "lower.yml");
        let higher = leaf_map(&[("x", "2")], "higher.yml");
        let merged = merge(lower, higher, ConflictPolicy::Override).unwrap();
        assert_eq!(merged.get("x").unwrap().value_as_str(), "2");
        assert_eq!(merged.get("x").unwrap().source, "higher.yml");
        assert_eq!(merged.get("y").unwrap().value_as_str(), "keep");
    }

    #[test]
    fn error_policy_raises_resolution_conflict() {
        // P2 / scenario 5 shape
        let lower = leaf_map(&[("x", "1")], "lower.yml");
        let higher = leaf_map(&[("x", "2")], "higher.yml");
        let err = merge(lower, higher, ConflictPolicy::Error).unwrap_err();
        match err {
            GoldenError::ResolutionConflict { path, sources } => {
                assert_eq!(path, "x");
                assert_eq!(sources, ["lower.yml".to_string(), "higher.yml".to_string()]);
            }
            other => panic!("expected ResolutionConflict, got {:?}", other),
        }
    }

    #[test]
    fn type_mismatch_regardless_of_policy() {
        // P3
        let mut lower = VarMap::new();
        lower.insert("x", Var::leaf(serde_yaml::Value::String("scalar".into()), Path::from("x"), "a.yml"));
        let mut sub = VarMap::new();
        sub.insert("y", Var::leaf(serde_yaml::Value::from(1), Path::from("x.y"), "b.yml"));
        let mut higher = VarMap::new();
        higher.insert("x", Var { value: VarValue::Map(sub), path: Path::from("x"), source: "b.yml".into() });

        let err = merge(lower.clone(), higher.clone(), ConflictPolicy::Override).unwrap_err();
        assert!(matches!(err, GoldenError::TypeMismatch { .. }));
        let err = merge(lower, higher, ConflictPolicy::Error).unwrap_err();
        assert!(matches!(err, GoldenError::TypeMismatch { .. }));
    }

    #[test]
    fn provenance_survives_merge() {
        // P6
        let lower = leaf_map(&[("a", "1")], "common.yml");
        let higher = leaf_map(&[("b", "2")], "instance.yml");
        let merged = merge(lower, higher, ConflictPolicy::Override).unwrap();
        assert_eq!(merged.get("a").unwrap().source, "common.yml");
        assert_eq!(merged.get("b").unwrap().source, "instance.yml");
    }

    #[test]
    fn nested_maps_merge_keywise_and_attribute_wrapper_to_higher_source() {
        let mut lower_inner = VarMap::new();
        lower_inner.insert("a", Var::leaf(serde_yaml::Value::from(1), Path::from("p.a"), "lower.yml"));
        let mut lower = VarMap::new();
        lower.insert("p", Var { value: VarValue::Map(lower_inner), path: Path::from("p"), source: "lower.yml".into() });

        let mut higher_inner = VarMap::new();
        higher_inner.insert("b", Var::leaf(serde_yaml::Value::from(2), Path::from("p.b"), "higher.yml"));
        let mut higher = VarMap::new();
        higher.insert("p", Var { value: VarValue::Map(higher_inner), path: Path::from("p"), source: "higher.yml".into() });

        let merged = merge(lower, higher, ConflictPolicy::Error).unwrap();
        let p = merged.get("p").unwrap();
        assert_eq!(p.source, "higher.yml");
        match &p.value {
            VarValue::Map(sub) => {
                assert_eq!(sub.get("a").unwrap().source, "lower.yml");
                assert_eq!(sub.get("b").unwrap().source, "higher.yml");
            }
            _ => panic!("expected map"),
        }
    }

    #[test]
    fn null_normalizes_to_empty_string() {
        let vm = VarMap::from_yaml_value(serde_yaml::from_str("a: null").unwrap()).unwrap();
        assert_eq!(vm.get("a").unwrap().value_as_str(), "");
    }

    #[test]
    fn set_paths_is_relative_to_map_root() {
        let mut vm = VarMap::from_yaml_value(serde_yaml::from_str("p:\n  q: 1\n").unwrap()).unwrap();
        vm.set_paths();
        let p = vm.get("p").unwrap();
        assert_eq!(p.path.to_string(), "p");
        match &p.value {
            VarValue::Map(sub) => assert_eq!(sub.get("q").unwrap().path.to_string(), "p.q"),
            _ => panic!("expected map"),
        }
    }

    impl Var {
        /// test-only convenience accessor
        fn value_as_str(&self) -> String {
            match &self.value {
                VarValue::Leaf(serde_yaml::Value::String(s)) => s.clone(),
                other => panic!("not a string leaf: {:?}", other),
            }
        }
    }
}
