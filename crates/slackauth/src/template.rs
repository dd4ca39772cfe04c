//! Minimal file-backed page templates.
//!
//! Templates are plain text with `{{ field.path }}` placeholders resolved
//! against a JSON context at render time. Parsing happens once when the
//! service is configured; rendering appends to the caller's buffer, so text
//! written before a failing placeholder is kept.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

/// Error type for template loading and rendering
#[derive(Error, Debug)]
pub enum TemplateError {
    /// The template file could not be read.
    #[error("cannot read template {}: {source}", path.display())]
    Io {
        /// Path that failed to load.
        path: PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },

    /// The template text is malformed.
    #[error("malformed template: {0}")]
    Parse(String),

    /// A placeholder referenced a field missing from the render context.
    #[error("unknown template field '{0}'")]
    UnknownField(String),

    /// A placeholder resolved to a value with no text form.
    #[error("template field '{0}' cannot be rendered as text")]
    Unrenderable(String),
}

/// A parsed page template.
#[derive(Debug, Clone)]
pub struct Template {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Field(Vec<String>),
}

impl Template {
    /// Read and parse a template file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|source| TemplateError::Io { path: path.to_path_buf(), source })?;
        Self::parse(&raw)
    }

    /// Parse template text into literal and placeholder segments.
    ///
    /// A bare `}}` outside a placeholder is literal text (inline style
    /// blocks contain them); an unterminated or empty `{{` is a parse error.
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = raw;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                return Err(TemplateError::Parse("unterminated '{{' placeholder".to_string()));
            };
            let field = after[..end].trim();
            if field.is_empty() {
                return Err(TemplateError::Parse("empty '{{ }}' placeholder".to_string()));
            }
            if field.contains(['{', '}'])
                || field.split('.').any(|part| part.trim().is_empty())
            {
                return Err(TemplateError::Parse(format!("malformed field path '{field}'")));
            }
            segments
                .push(Segment::Field(field.split('.').map(|part| part.trim().to_string()).collect()));
            rest = &after[end + 2..];
        }

        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self { segments })
    }

    /// Render into `out`, leaving everything written so far in place when a
    /// placeholder fails to resolve.
    pub fn render_to(&self, out: &mut String, context: &Value) -> Result<(), TemplateError> {
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(path) => {
                    let value = lookup(context, path)?;
                    append_value(out, value, path)?;
                }
            }
        }
        Ok(())
    }

    /// Render to a fresh string.
    pub fn render(&self, context: &Value) -> Result<String, TemplateError> {
        let mut out = String::new();
        self.render_to(&mut out, context)?;
        Ok(out)
    }
}

fn lookup<'a>(context: &'a Value, path: &[String]) -> Result<&'a Value, TemplateError> {
    let mut current = context;
    for key in path {
        current = current.get(key).ok_or_else(|| TemplateError::UnknownField(path.join(".")))?;
    }
    Ok(current)
}

fn append_value(out: &mut String, value: &Value, path: &[String]) -> Result<(), TemplateError> {
    match value {
        Value::String(text) => out.push_str(text),
        Value::Number(number) => out.push_str(&number.to_string()),
        Value::Bool(flag) => out.push_str(if *flag { "true" } else { "false" }),
        Value::Null | Value::Array(_) | Value::Object(_) => {
            return Err(TemplateError::Unrenderable(path.join(".")));
        }
    }
    Ok(())
}
