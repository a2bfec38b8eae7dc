use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use log::{debug, info, warn};
use serde::Serialize;
use walkdir::WalkDir;

use crate::conflict::{ConflictCheck, has_conflict};
use crate::filename::{RECORD_EXTENSION, is_record_filename, key_for_title};
use crate::record::{ArticleRecord, read_record, write_json_atomic};

/// A directory of JSON article records, one file per normalized title.
///
/// The store does no locking. Callers sharing a directory across threads or
/// processes must serialize the operations themselves.
#[derive(Debug, Clone)]
pub struct ArticleStore {
    dir: PathBuf,
    conflict_check: ConflictCheck,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WriteOutcome {
    Written {
        key: String,
        /// Set when an edit moved the record away from this key.
        previous_key: Option<String>,
    },
    Conflict {
        title: String,
        key: String,
    },
    NotFound {
        title: String,
        key: String,
    },
}

impl WriteOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredArticle {
    pub key: String,
    pub record: ArticleRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListReport {
    pub articles: Vec<StoredArticle>,
    pub skipped: Vec<SkippedFile>,
}

impl ArticleStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            conflict_check: ConflictCheck::default(),
        }
    }

    pub fn with_conflict_check(mut self, conflict_check: ConflictCheck) -> Self {
        self.conflict_check = conflict_check;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn conflict_check(&self) -> ConflictCheck {
        self.conflict_check
    }

    pub fn path_for_key(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    /// File names of every `.json` file directly inside the store, sorted.
    /// Symlinks and names that are not UTF-8 are left out with a warning.
    pub fn list_keys(&self) -> Result<Vec<String>> {
        if !self.dir.is_dir() {
            bail!("article store directory not found: {}", self.dir.display());
        }
        let mut keys = Vec::new();
        for entry in WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry.with_context(|| format!("failed to list {}", self.dir.display()))?;
            let file_type = entry.file_type();
            let Some(name) = entry.file_name().to_str() else {
                if file_type.is_file() || file_type.is_symlink() {
                    warn!(
                        "event=list_keys status=skipped reason=non_utf8_name path={}",
                        entry.path().display()
                    );
                }
                continue;
            };
            if !is_record_filename(name) {
                continue;
            }
            if file_type.is_symlink() {
                warn!("event=list_keys status=skipped reason=symlink key={name}");
                continue;
            }
            if file_type.is_file() {
                keys.push(name.to_string());
            }
        }
        Ok(keys)
    }

    pub fn add(&self, title: &str, content: &str) -> Result<WriteOutcome> {
        let key = usable_key(title)?;
        let existing = self.list_keys()?;
        if has_conflict(title, &existing, None, self.conflict_check) {
            debug!("event=article_add status=conflict key={key}");
            return Ok(WriteOutcome::Conflict {
                title: title.to_string(),
                key,
            });
        }

        let record = ArticleRecord::new(title, content);
        write_json_atomic(&self.path_for_key(&key), &record)?;
        info!("event=article_add status=ok key={key}");
        Ok(WriteOutcome::Written {
            key,
            previous_key: None,
        })
    }

    /// Retitle and rewrite a record. The new record is renamed into place
    /// before the old key is removed, so a crash leaves at worst both keys.
    pub fn edit(
        &self,
        original_title: &str,
        new_title: &str,
        new_content: &str,
    ) -> Result<WriteOutcome> {
        let new_key = usable_key(new_title)?;
        let existing = self.list_keys()?;
        if has_conflict(
            new_title,
            &existing,
            Some(original_title),
            self.conflict_check,
        ) {
            debug!("event=article_edit status=conflict key={new_key}");
            return Ok(WriteOutcome::Conflict {
                title: new_title.to_string(),
                key: new_key,
            });
        }

        let original_key = key_for_title(original_title);
        let original_path = self.path_for_key(&original_key);
        if !original_path.is_file() {
            debug!("event=article_edit status=not_found key={original_key}");
            return Ok(WriteOutcome::NotFound {
                title: original_title.to_string(),
                key: original_key,
            });
        }

        let mut record = read_record(&original_path)?;
        record.revise(new_title, new_content);
        let new_path = self.path_for_key(&new_key);

        if original_key == new_key {
            write_json_atomic(&new_path, &record)?;
            info!("event=article_edit status=ok key={new_key}");
            return Ok(WriteOutcome::Written {
                key: new_key,
                previous_key: None,
            });
        }

        if original_key.eq_ignore_ascii_case(&new_key) {
            // Case-only renames may alias one file on case-insensitive volumes.
            fs::rename(&original_path, &new_path).with_context(|| {
                format!(
                    "failed to rename {} to {}",
                    original_path.display(),
                    new_path.display()
                )
            })?;
            write_json_atomic(&new_path, &record)?;
        } else {
            write_json_atomic(&new_path, &record)?;
            fs::remove_file(&original_path)
                .with_context(|| format!("failed to remove {}", original_path.display()))?;
        }
        info!("event=article_edit status=ok key={new_key} previous_key={original_key}");
        Ok(WriteOutcome::Written {
            key: new_key,
            previous_key: Some(original_key),
        })
    }

    pub fn get(&self, title: &str) -> Result<Option<StoredArticle>> {
        let key = key_for_title(title);
        let path = self.path_for_key(&key);
        if !path.is_file() {
            return Ok(None);
        }
        let record = read_record(&path)?;
        Ok(Some(StoredArticle { key, record }))
    }

    pub fn list(&self) -> Result<ListReport> {
        let mut articles = Vec::new();
        let mut skipped = Vec::new();
        for key in self.list_keys()? {
            let path = self.path_for_key(&key);
            let bytes =
                fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
            match serde_json::from_slice::<ArticleRecord>(&bytes) {
                Ok(record) => articles.push(StoredArticle { key, record }),
                Err(err) => skipped.push(SkippedFile {
                    key,
                    reason: err.to_string(),
                }),
            }
        }
        Ok(ListReport { articles, skipped })
    }
}

fn usable_key(title: &str) -> Result<String> {
    let key = key_for_title(title);
    if key == RECORD_EXTENSION {
        bail!("title {title:?} has no characters usable in a file name");
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::thread::sleep;
    use std::time::Duration;

    use serde_json::Value;
    use tempfile::tempdir;

    use super::{ArticleStore, WriteOutcome};
    use crate::conflict::ConflictCheck;

    fn store(temp: &tempfile::TempDir) -> ArticleStore {
        let dir = temp.path().join("articles");
        fs::create_dir_all(&dir).expect("create store dir");
        ArticleStore::new(dir)
    }

    fn read_json(store: &ArticleStore, key: &str) -> Value {
        let raw = fs::read_to_string(store.path_for_key(key)).expect("read record");
        serde_json::from_str(&raw).expect("parse record")
    }

    #[test]
    fn add_creates_normalized_record() {
        let temp = tempdir().expect("tempdir");
        let store = store(&temp);

        let outcome = store.add("Hello World", "c1").expect("add");
        assert_eq!(
            outcome,
            WriteOutcome::Written {
                key: "Hello_World.json".to_string(),
                previous_key: None,
            }
        );

        let value = read_json(&store, "Hello_World.json");
        assert_eq!(value["title"], "Hello World");
        assert_eq!(value["content"], "c1");
        assert_eq!(value["created_at"], value["last_modified"]);
    }

    #[test]
    fn add_with_colliding_title_is_a_conflict_and_writes_nothing() {
        let temp = tempdir().expect("tempdir");
        let store = store(&temp);
        store.add("Hello World", "c1").expect("first add");

        let outcome = store.add("Hello, World!", "c2").expect("second add");
        assert!(matches!(outcome, WriteOutcome::Conflict { ref key, .. } if key == "Hello_World.json"));
        assert_eq!(store.list_keys().expect("keys"), vec!["Hello_World.json"]);
        assert_eq!(read_json(&store, "Hello_World.json")["content"], "c1");
    }

    #[test]
    fn add_rejects_titles_without_usable_characters() {
        let temp = tempdir().expect("tempdir");
        let store = store(&temp);
        let error = store.add("?!", "body").expect_err("must fail");
        assert!(error.to_string().contains("no characters usable"));
        assert!(store.list_keys().expect("keys").is_empty());
    }

    #[test]
    fn add_requires_existing_store_dir() {
        let temp = tempdir().expect("tempdir");
        let store = ArticleStore::new(temp.path().join("missing"));
        let error = store.add("Alpha", "a").expect_err("must fail");
        assert!(error.to_string().contains("article store directory not found"));
    }

    #[test]
    fn edit_in_place_keeps_created_at_and_advances_last_modified() {
        let temp = tempdir().expect("tempdir");
        let store = store(&temp);
        store.add("Hello World", "c1").expect("add");
        let before = read_json(&store, "Hello_World.json");

        sleep(Duration::from_millis(5));
        let outcome = store
            .edit("Hello World", "Hello World", "c2")
            .expect("edit");
        assert_eq!(
            outcome,
            WriteOutcome::Written {
                key: "Hello_World.json".to_string(),
                previous_key: None,
            }
        );

        let after = read_json(&store, "Hello_World.json");
        assert_eq!(after["content"], "c2");
        assert_eq!(after["created_at"], before["created_at"]);
        assert_ne!(after["last_modified"], before["last_modified"]);
        assert_eq!(store.list_keys().expect("keys"), vec!["Hello_World.json"]);
    }

    #[test]
    fn edit_with_new_title_moves_the_record() {
        let temp = tempdir().expect("tempdir");
        let store = store(&temp);
        store.add("Hello World", "c1").expect("add");
        let created_at = read_json(&store, "Hello_World.json")["created_at"].clone();

        let outcome = store.edit("Hello World", "Goodbye", "c3").expect("edit");
        assert_eq!(
            outcome,
            WriteOutcome::Written {
                key: "Goodbye.json".to_string(),
                previous_key: Some("Hello_World.json".to_string()),
            }
        );
        assert!(!store.path_for_key("Hello_World.json").exists());

        let moved = read_json(&store, "Goodbye.json");
        assert_eq!(moved["title"], "Goodbye");
        assert_eq!(moved["content"], "c3");
        assert_eq!(moved["created_at"], created_at);
        assert_eq!(store.list_keys().expect("keys"), vec!["Goodbye.json"]);
    }

    #[test]
    fn edit_case_only_rename_leaves_one_record() {
        let temp = tempdir().expect("tempdir");
        let store = store(&temp);
        store.add("hello", "c1").expect("add");

        let outcome = store.edit("hello", "Hello", "c2").expect("edit");
        assert!(outcome.is_written());
        assert_eq!(store.list_keys().expect("keys"), vec!["Hello.json"]);
        assert_eq!(read_json(&store, "Hello.json")["content"], "c2");
    }

    #[test]
    fn edit_missing_original_is_not_found() {
        let temp = tempdir().expect("tempdir");
        let store = store(&temp);

        let outcome = store.edit("Missing Title", "X", "c").expect("edit");
        assert_eq!(
            outcome,
            WriteOutcome::NotFound {
                title: "Missing Title".to_string(),
                key: "Missing_Title.json".to_string(),
            }
        );
        assert!(store.list_keys().expect("keys").is_empty());
    }

    #[test]
    fn edit_onto_another_record_is_a_conflict() {
        let temp = tempdir().expect("tempdir");
        let store = store(&temp);
        store.add("Alpha", "a").expect("add alpha");
        store.add("Beta", "b").expect("add beta");

        let outcome = store.edit("Alpha", "Beta", "a2").expect("edit");
        assert!(matches!(outcome, WriteOutcome::Conflict { .. }));
        assert_eq!(read_json(&store, "Alpha.json")["content"], "a");
        assert_eq!(read_json(&store, "Beta.json")["content"], "b");
    }

    #[test]
    fn literal_check_flags_punctuation_only_retitle() {
        let temp = tempdir().expect("tempdir");
        let store = store(&temp);
        store.add("Hello World", "c1").expect("add");

        let outcome = store.edit("Hello World", "Hello World!", "c2").expect("edit");
        assert!(matches!(outcome, WriteOutcome::Conflict { .. }));
    }

    #[test]
    fn normalized_check_allows_punctuation_only_retitle() {
        let temp = tempdir().expect("tempdir");
        let store = store(&temp).with_conflict_check(ConflictCheck::Normalized);
        store.add("Hello World", "c1").expect("add");

        let outcome = store.edit("Hello World", "Hello World!", "c2").expect("edit");
        assert!(outcome.is_written());
        let value = read_json(&store, "Hello_World.json");
        assert_eq!(value["title"], "Hello World!");
        assert_eq!(value["content"], "c2");
    }

    #[test]
    fn edit_preserves_unknown_keys() {
        let temp = tempdir().expect("tempdir");
        let store = store(&temp);
        fs::write(
            store.path_for_key("Alpha.json"),
            r#"{"title":"Alpha","content":"a","created_at":"2024-01-01T00:00:00.000000","last_modified":"2024-01-01T00:00:00.000000","tags":["x"]}"#,
        )
        .expect("seed");

        store.edit("Alpha", "Alpha Two", "a2").expect("edit");
        let value = read_json(&store, "Alpha_Two.json");
        assert_eq!(value["tags"][0], "x");
        assert_eq!(value["created_at"], "2024-01-01T00:00:00.000000");
    }

    #[test]
    fn unstamped_legacy_record_is_listed_and_editable() {
        let temp = tempdir().expect("tempdir");
        let store = store(&temp);
        fs::write(
            store.path_for_key("Legacy.json"),
            r#"{"title":"Legacy","content":"old"}"#,
        )
        .expect("seed");

        let report = store.list().expect("list");
        assert_eq!(report.articles.len(), 1);
        assert!(report.skipped.is_empty());
        let legacy = store.get("Legacy").expect("get").expect("legacy exists");
        assert_eq!(legacy.record.created_at, None);

        let outcome = store.edit("Legacy", "Legacy", "new").expect("edit");
        assert!(outcome.is_written());
        let value = read_json(&store, "Legacy.json");
        assert_eq!(value["content"], "new");
        assert!(value["created_at"].is_string());
        assert_eq!(value["created_at"], value["last_modified"]);
    }

    #[test]
    fn edit_of_malformed_original_is_an_error() {
        let temp = tempdir().expect("tempdir");
        let store = store(&temp);
        fs::write(store.path_for_key("Broken.json"), "{oops").expect("seed");

        let error = store.edit("Broken", "Fixed", "x").expect_err("must fail");
        assert!(error.to_string().contains("malformed article record"));
        assert!(store.path_for_key("Broken.json").exists());
        assert!(!store.path_for_key("Fixed.json").exists());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_records_are_left_out_of_the_listing() {
        let temp = tempdir().expect("tempdir");
        let store = store(&temp);
        let outside = temp.path().join("outside.json");
        fs::write(&outside, r#"{"title":"Outside","content":"o"}"#).expect("seed target");
        std::os::unix::fs::symlink(&outside, store.path_for_key("Linked.json")).expect("symlink");
        store.add("Alpha", "a").expect("add");

        assert_eq!(store.list_keys().expect("keys"), vec!["Alpha.json"]);
        crate::maintenance::stamp_all(&store).expect("stamp");
        let target = fs::read_to_string(&outside).expect("read target");
        assert_eq!(target, r#"{"title":"Outside","content":"o"}"#);
    }

    #[test]
    fn get_and_list_read_back_records() {
        let temp = tempdir().expect("tempdir");
        let store = store(&temp);
        store.add("Beta", "b").expect("add beta");
        store.add("Alpha", "a").expect("add alpha");
        fs::write(store.path_for_key("Broken.json"), "not json").expect("seed broken");
        fs::write(store.path_for_key("notes.txt"), "ignored").expect("seed txt");

        let alpha = store.get("Alpha").expect("get").expect("alpha exists");
        assert_eq!(alpha.key, "Alpha.json");
        assert_eq!(alpha.record.content, "a");
        assert!(store.get("Gamma").expect("get").is_none());

        let report = store.list().expect("list");
        let keys = report
            .articles
            .iter()
            .map(|article| article.key.as_str())
            .collect::<Vec<_>>();
        assert_eq!(keys, vec!["Alpha.json", "Beta.json"]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].key, "Broken.json");
    }
}
