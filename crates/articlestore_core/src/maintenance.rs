use std::collections::HashSet;
use std::fs;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;
use serde_json::Value;

use crate::filename::normalize_filename;
use crate::record::{
    FIELD_CREATED_AT, FIELD_LAST_MODIFIED, now_timestamp, parse_object, write_json_atomic,
};
use crate::store::{ArticleStore, SkippedFile, WriteOutcome};

pub const DEMO_TITLE: &str = "New Article";
pub const DEMO_CONTENT: &str = "This is the content of the new article.";
pub const DEMO_UPDATED_TITLE: &str = "Updated Article";
pub const DEMO_UPDATED_CONTENT: &str = "This is the updated content.";

#[derive(Debug, Clone, Default)]
pub struct SanitizeOptions {
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameEntry {
    pub from: String,
    pub to: String,
    /// The target name was already taken; its previous content is lost.
    pub replaced_existing: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizeReport {
    pub dry_run: bool,
    pub scanned: usize,
    pub renames: Vec<RenameEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StampedFile {
    pub key: String,
    pub added_created_at: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StampReport {
    pub stamped: Vec<StampedFile>,
    pub skipped: Vec<SkippedFile>,
}

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub sanitize: SanitizeOptions,
    pub demo: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DemoReport {
    pub add: WriteOutcome,
    pub edit: WriteOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub sanitize: SanitizeReport,
    pub stamp: Option<StampReport>,
    pub demo: Option<DemoReport>,
}

/// Rename every record file whose name is not already normalized.
///
/// Two files that normalize to the same name are not reconciled: the later
/// rename replaces the earlier file.
pub fn sanitize_all(store: &ArticleStore, options: &SanitizeOptions) -> Result<SanitizeReport> {
    let keys = store.list_keys()?;
    let mut taken = keys.iter().cloned().collect::<HashSet<_>>();
    let mut renames = Vec::new();

    for key in &keys {
        let normalized = normalize_filename(key);
        if normalized == *key {
            continue;
        }
        let replaced_existing = taken.contains(&normalized);
        if replaced_existing {
            warn!("event=sanitize_rename status=replacing from={key} to={normalized}");
        }

        if !options.dry_run {
            let old_path = store.path_for_key(key);
            let new_path = store.path_for_key(&normalized);
            fs::rename(&old_path, &new_path).with_context(|| {
                format!(
                    "failed to rename {} to {}",
                    old_path.display(),
                    new_path.display()
                )
            })?;
            info!("event=sanitize_rename status=ok from={key} to={normalized}");
        }

        taken.remove(key);
        taken.insert(normalized.clone());
        renames.push(RenameEntry {
            from: key.clone(),
            to: normalized,
            replaced_existing,
        });
    }

    Ok(SanitizeReport {
        dry_run: options.dry_run,
        scanned: keys.len(),
        renames,
    })
}

/// Refresh `last_modified` on every record and fill in a missing `created_at`.
/// Files that are not JSON objects are left untouched and reported.
pub fn stamp_all(store: &ArticleStore) -> Result<StampReport> {
    let mut stamped = Vec::new();
    let mut skipped = Vec::new();

    for key in store.list_keys()? {
        let path = store.path_for_key(&key);
        let bytes = fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
        let mut object = match parse_object(&bytes) {
            Ok(object) => object,
            Err(reason) => {
                warn!("event=stamp status=skipped key={key} reason={reason}");
                skipped.push(SkippedFile { key, reason });
                continue;
            }
        };

        let now = now_timestamp();
        object.insert(FIELD_LAST_MODIFIED.to_string(), Value::String(now.clone()));
        let added_created_at = !object.contains_key(FIELD_CREATED_AT);
        if added_created_at {
            object.insert(FIELD_CREATED_AT.to_string(), Value::String(now));
        }

        write_json_atomic(&path, &object)?;
        info!("event=stamp status=ok key={key} added_created_at={added_created_at}");
        stamped.push(StampedFile {
            key,
            added_created_at,
        });
    }

    Ok(StampReport { stamped, skipped })
}

/// Sanitize, then stamp, then optionally add and retitle a sample article.
/// A dry-run sanitize stops the batch before anything is written.
pub fn run_batch(store: &ArticleStore, options: &BatchOptions) -> Result<BatchReport> {
    let sanitize = sanitize_all(store, &options.sanitize)?;
    if options.sanitize.dry_run {
        return Ok(BatchReport {
            sanitize,
            stamp: None,
            demo: None,
        });
    }

    let stamp = stamp_all(store)?;
    let demo = if options.demo {
        let add = store.add(DEMO_TITLE, DEMO_CONTENT)?;
        let edit = store.edit(DEMO_TITLE, DEMO_UPDATED_TITLE, DEMO_UPDATED_CONTENT)?;
        Some(DemoReport { add, edit })
    } else {
        None
    };

    Ok(BatchReport {
        sanitize,
        stamp: Some(stamp),
        demo,
    })
}
