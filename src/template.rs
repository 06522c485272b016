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

//! Thin adapter over `handlebars` (§4.5): compiles templates, exposes an
//! `is_templated` predicate on the compiled tree, and renders in strict mode
//! with a typed missing-variable/other-failure distinction so the
//! substitution fixpoint in [`crate::substitution`] never has to pattern-match
//! error strings.

use handlebars::{Handlebars, RenderErrorReason};
use handlebars::template::{Template as HbsTemplate, TemplateElement};

/// A compiled template plus its source text (handlebars re-renders from
/// source, so we keep both rather than trying to render the parsed tree
/// directly).
pub struct CompiledTemplate {
    pub name: String,
    pub source: String,
    templated: bool,
}

impl CompiledTemplate {
    /// True iff the parsed tree contains anything beyond a single literal
    /// text (or comment) element.
    pub fn is_templated(&self) -> bool {
        self.templated
    }
}

/// Distinguishes a missing-variable render failure (drives the substitution
/// fixpoint) from any other failure (parse error, helper error — fatal).
#[derive(Debug)]
pub enum TemplateError {
    MissingVariable(String),
    Other(String),
}

impl std::fmt::Display for TemplateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemplateError::MissingVariable(m) => write!(f, "missing variable: {}", m),
            TemplateError::Other(m) => write!(f, "{}", m),
        }
    }
}

pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        // handlebars-rust HTML-escapes expansions by default; the original
        // `text/template`-based engine does no escaping, and this crate's
        // output is config files and YAML, not HTML.
        handlebars.register_escape_fn(handlebars::no_escape);
        register_helpers(&mut handlebars);
        Self { handlebars }
    }

    /// Compile `text` and classify it as templated or pure literal.
    pub fn parse(&self, name: &str, text: &str) -> crate::error::Result<CompiledTemplate> {
        let parsed = HbsTemplate::compile(text).map_err(|e| crate::error::GoldenError::Parse {
            file: name.to_string(),
            context: None,
            message: e.to_string(),
        })?;
        let templated = is_templated_tree(&parsed);
        Ok(CompiledTemplate { name: name.to_string(), source: text.to_string(), templated })
    }

    /// Render `tmpl`'s source against `context` in strict mode.
    pub fn render_to_string<T: serde::Serialize>(
        &self,
        tmpl: &CompiledTemplate,
        context: &T,
    ) -> Result<String, TemplateError> {
        self.handlebars
            .render_template(&tmpl.source, context)
            .map_err(|err| classify_render_error(&tmpl.name, err))
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn is_templated_tree(tpl: &HbsTemplate) -> bool {
    tpl.elements.iter().any(|el| !matches!(el, TemplateElement::RawString(_) | TemplateElement::Comment(_)))
}

fn classify_render_error(name: &str, err: handlebars::RenderError) -> TemplateError {
    match err.reason() {
        RenderErrorReason::MissingVariable(path) => {
            TemplateError::MissingVariable(path.clone().unwrap_or_default())
        }
        _ => TemplateError::Other(format!("{} [{}]: {}", name, tmpl_context(&err), err)),
    }
}

fn tmpl_context(err: &handlebars::RenderError) -> String {
    err.template_name.clone().unwrap_or_default()
}

/// Registers the `to_yaml` helper (grounded in the teacher's
/// `playbooks::t_helpers::register_helpers` pattern of attaching small
/// helpers to a shared `Handlebars` instance).
fn register_helpers(handlebars: &mut Handlebars<'static>) {
    handlebars_helper!(to_yaml: |v: Json| {
        serde_yaml::to_string(v).unwrap_or_default()
    });
    handlebars.register_helper("to_yaml", Box::new(to_yaml));
}

use handlebars::handlebars_helper;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_text_is_not_templated() {
        let engine = TemplateEngine::new();
        let tmpl = engine.parse("t", "just plain text").unwrap();
        assert!(!tmpl.is_templated());
    }

    #[test]
    fn expression_is_templated() {
        let engine = TemplateEngine::new();
        let tmpl = engine.parse("t", "hello {{name}}").unwrap();
        assert!(tmpl.is_templated());
    }

    #[test]
    fn comment_only_is_not_templated() {
        let engine = TemplateEngine::new();
        let tmpl = engine.parse("t", "{{! a comment }}literal").unwrap();
        assert!(!tmpl.is_templated());
    }

    #[test]
    fn render_missing_variable_is_distinguished_from_other_errors() {
        let engine = TemplateEngine::new();
        let tmpl = engine.parse("t", "{{missing}}").unwrap();
        let ctx = serde_yaml::Mapping::new();
        let err = engine.render_to_string(&tmpl, &ctx).unwrap_err();
        assert!(matches!(err, TemplateError::MissingVariable(_)));
    }

    #[test]
    fn render_succeeds_with_present_variable() {
        let engine = TemplateEngine::new();
        let tmpl = engine.parse("t", "hello {{name}}").unwrap();
        let mut ctx = serde_yaml::Mapping::new();
        ctx.insert("name".into(), "world".into());
        let out = engine.render_to_string(&tmpl, &ctx).unwrap();
        assert_eq!(out, "hello world");
    }

    #[test]
    fn render_does_not_html_escape_special_characters() {
        let engine = TemplateEngine::new();
        let tmpl = engine.parse("t", "{{db_url}}").unwrap();
        let mut ctx = serde_yaml::Mapping::new();
        ctx.insert("db_url".into(), "postgres://h/db?a=1&b=2's \"q\"".into());
        let out = engine.render_to_string(&tmpl, &ctx).unwrap();
        assert_eq!(out, "postgres://h/db?a=1&b=2's \"q\"");
    }

    #[test]
    fn to_yaml_helper_serializes_subtree() {
        let engine = TemplateEngine::new();
        let tmpl = engine.parse("t", "{{to_yaml nested}}").unwrap();
        let mut nested = serde_yaml::Mapping::new();
        nested.insert("a".into(), 1.into());
        let mut ctx = serde_yaml::Mapping::new();
        ctx.insert("nested".into(), serde_yaml::Value::Mapping(nested));
        let out = engine.render_to_string(&tmpl, &ctx).unwrap();
        assert!(out.contains("a: 1") || out.contains("a:1"));
    }
}
