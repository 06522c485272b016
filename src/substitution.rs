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

//! Fixpoint expansion of templated string leaves (§4.3).
//!
//! Two parallel tree shapes are kept during a resolution: the provenance-
//! bearing [`VarMap`] (read-only here) and a plain `serde_yaml::Mapping`,
//! `R`, that is mutated in place as leaves resolve and is what ends up as the
//! render context for app-file templating.

use std::collections::HashMap;

use crate::error::{GoldenError, Result};
use crate::path::Path;
use crate::template::{TemplateEngine, TemplateError};
use crate::varmap::{VarMap, VarValue};

/// One templated leaf still awaiting resolution.
struct TemplatedLeaf {
    path: Path,
    source: String,
    text: String,
}

/// Outcome of a fixpoint run: the final regular map (with unresolved leaves
/// removed) and the diagnostics for anything left unresolved.
pub struct SubstitutionOutcome {
    pub resolved: serde_yaml::Mapping,
    pub unresolved: Vec<(String, String)>,
}

/// Run the substitution fixpoint over `vars`, producing a plain map.
pub fn substitute(engine: &TemplateEngine, vars: &VarMap) -> Result<SubstitutionOutcome> {
    let mut regular = vars.to_regular_map();
    let mut pending: HashMap<String, TemplatedLeaf> = HashMap::new();
    discover(engine, vars, &mut pending)?;

    loop {
        let before = pending.len();
        if before == 0 {
            break;
        }

        let mut still_pending: HashMap<String, TemplatedLeaf> = HashMap::new();
        for (key, leaf) in pending.iter() {
            let tmpl = engine.parse(&leaf.source, &leaf.text)?;
            match engine.render_to_string(&tmpl, &regular) {
                Ok(rendered) => {
                    set_at_path(&mut regular, leaf.path.elements(), serde_yaml::Value::String(rendered.clone()));
                    let still_templated = engine.parse(&leaf.source, &rendered)?.is_templated();
                    if still_templated {
                        still_pending.insert(
                            key.clone(),
                            TemplatedLeaf { path: leaf.path.clone(), source: leaf.source.clone(), text: rendered },
                        );
                    }
                }
                Err(TemplateError::MissingVariable(_)) => {
                    still_pending.insert(
                        key.clone(),
                        TemplatedLeaf { path: leaf.path.clone(), source: leaf.source.clone(), text: leaf.text.clone() },
                    );
                }
                Err(TemplateError::Other(message)) => {
                    return Err(GoldenError::TemplateExec {
                        source: leaf.source.clone(),
                        context: leaf.path.to_string(),
                        message,
                    });
                }
            }
        }

        if still_pending.len() == before {
            let mut unresolved: Vec<(String, String)> =
                still_pending.values().map(|l| (l.path.to_string(), l.source.clone())).collect();
            unresolved.sort();
            for (path, _) in &unresolved {
                remove_at_path(&mut regular, &Path::from(path.as_str()).elements().to_vec());
            }
            return Ok(SubstitutionOutcome { resolved: regular, unresolved });
        }
        pending = still_pending;
    }

    Ok(SubstitutionOutcome { resolved: regular, unresolved: Vec::new() })
}

fn discover(
    engine: &TemplateEngine,
    vars: &VarMap,
    pending: &mut HashMap<String, TemplatedLeaf>,
) -> Result<()> {
    for (_, v) in vars.iter() {
        match &v.value {
            VarValue::Map(sub) => discover(engine, sub, pending)?,
            VarValue::Leaf(serde_yaml::Value::String(s)) => {
                let tmpl = engine.parse(&v.source, s)?;
                if tmpl.is_templated() {
                    let key = v.path.to_string();
                    pending.insert(key, TemplatedLeaf { path: v.path.clone(), source: v.source.clone(), text: s.clone() });
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn set_at_path(map: &mut serde_yaml::Mapping, elements: &[String], value: serde_yaml::Value) {
    if elements.is_empty() {
        return;
    }
    if elements.len() == 1 {
        map.insert(serde_yaml::Value::String(elements[0].clone()), value);
        return;
    }
    let key = serde_yaml::Value::String(elements[0].clone());
    let entry = map
        .entry(key)
        .or_insert_with(|| serde_yaml::Value::Mapping(serde_yaml::Mapping::new()));
    if let serde_yaml::Value::Mapping(sub) = entry {
        set_at_path(sub, &elements[1..], value);
    }
}

fn remove_at_path(map: &mut serde_yaml::Mapping, elements: &[String]) {
    if elements.is_empty() {
        return;
    }
    if elements.len() == 1 {
        map.remove(serde_yaml::Value::String(elements[0].clone()));
        return;
    }
    let key = serde_yaml::Value::String(elements[0].clone());
    if let Some(serde_yaml::Value::Mapping(sub)) = map.get_mut(key) {
        remove_at_path(sub, &elements[1..]);
    }
}
