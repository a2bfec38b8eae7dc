use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use tempfile::NamedTempFile;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

pub const FIELD_CREATED_AT: &str = "created_at";
pub const FIELD_LAST_MODIFIED: &str = "last_modified";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub title: String,
    pub content: String,
    /// Absent on legacy records that were never stamped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    /// Keys written by other tools; carried through every rewrite.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ArticleRecord {
    pub fn new(title: &str, content: &str) -> Self {
        let now = now_timestamp();
        Self {
            title: title.to_string(),
            content: content.to_string(),
            created_at: Some(now.clone()),
            last_modified: Some(now),
            extra: Map::new(),
        }
    }

    /// Replace title and content and refresh `last_modified`. A record that
    /// was never stamped gets its `created_at` here.
    pub fn revise(&mut self, title: &str, content: &str) {
        let now = now_timestamp();
        self.title = title.to_string();
        self.content = content.to_string();
        if self.created_at.is_none() {
            self.created_at = Some(now.clone());
        }
        self.last_modified = Some(now);
    }
}

/// Local wall-clock time in ISO-8601 with microseconds and no offset.
pub fn now_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

pub fn read_record(path: &Path) -> Result<ArticleRecord> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("malformed article record {}", path.display()))
}

/// Parse raw file bytes as a JSON object, describing why when they are not one.
pub fn parse_object(bytes: &[u8]) -> std::result::Result<Map<String, Value>, String> {
    let text = std::str::from_utf8(bytes).map_err(|err| format!("not valid UTF-8: {err}"))?;
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(other) => Err(format!("expected a JSON object, found {}", json_kind(&other))),
        Err(err) => Err(format!("invalid JSON: {err}")),
    }
}

/// Serialize `value` into a temp file beside `path`, then rename it over `path`.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", path.display()))?;
    let mut temp = NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
    {
        let mut serializer = serde_json::Serializer::with_formatter(
            &mut temp,
            PrettyFormatter::with_indent(b"    "),
        );
        value
            .serialize(&mut serializer)
            .with_context(|| format!("failed to serialize {}", path.display()))?;
    }
    temp.flush()
        .with_context(|| format!("failed to flush temp file for {}", path.display()))?;
    temp.as_file()
        .sync_all()
        .with_context(|| format!("failed to sync temp file for {}", path.display()))?;
    temp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
