//! # Template Rendering
//!
//! Tag patterns and image template files are rendered with Tera. Rendering is
//! strict: a template referencing a variable missing from the context fails
//! with [`Error::Template`] naming the variable, instead of producing an
//! empty string.
//!
//! ## Filters
//!
//! | Filter           | Contract                                                   |
//! |------------------|------------------------------------------------------------|
//! | `tag_safe`       | [`crate::path::tag_safe`]                                  |
//! | `strip_metadata` | drop `+build` metadata from a version                      |
//! | `condense`       | lowercase, remove spaces, hyphens and periods              |
//! | `regex_replace`  | `regex_replace(find="..", replace="..")`, `$1` expansion   |

use std::collections::HashMap;

use tera::{Context, Tera, Value};

use crate::error::{Error, Result};
use crate::path;

/// Renders templates with the bakery filter set registered.
pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    pub fn new() -> Self {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);
        tera.register_filter("tag_safe", tag_safe_filter);
        tera.register_filter("strip_metadata", strip_metadata_filter);
        tera.register_filter("condense", condense_filter);
        tera.register_filter("regex_replace", regex_replace_filter);
        Self { tera }
    }

    /// Render a template string against `context`.
    pub fn render_str(&mut self, template: &str, context: &Context) -> Result<String> {
        self.tera.render_str(template, context).map_err(Error::from)
    }

    /// Render a template string against any serializable context.
    pub fn render_value<T: serde::Serialize>(&mut self, template: &str, value: &T) -> Result<String> {
        let context = Context::from_serialize(value)?;
        self.render_str(template, &context)
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

fn string_arg(value: &Value, filter: &str) -> tera::Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(tera::Error::msg(format!(
            "Filter `{filter}` expects a string, got {other}"
        ))),
    }
}

fn tag_safe_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    Ok(Value::String(path::tag_safe(&string_arg(value, "tag_safe")?)))
}

fn strip_metadata_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    Ok(Value::String(path::strip_metadata(&string_arg(
        value,
        "strip_metadata",
    )?)))
}

fn condense_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    Ok(Value::String(path::condense(&string_arg(value, "condense")?)))
}

fn regex_replace_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let input = string_arg(value, "regex_replace")?;
    let find = args
        .get("find")
        .and_then(Value::as_str)
        .ok_or_else(|| tera::Error::msg("Filter `regex_replace` requires a `find` argument"))?;
    let replace = args.get("replace").and_then(Value::as_str).unwrap_or("");
    path::regex_replace(&input, find, replace)
        .map(Value::String)
        .map_err(|e| tera::Error::msg(e.to_string()))
}
