use serde::{Deserialize, Serialize};

use crate::filename::{key_for_title, normalize_filename};

/// How an edit decides that a colliding key is its own record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ConflictCheck {
    /// Exempt only when the new title is byte-for-byte the current title.
    #[default]
    Literal,
    /// Exempt when the new title normalizes to the current title's key.
    Normalized,
}

impl ConflictCheck {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Literal => "literal",
            Self::Normalized => "normalized",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "literal" => Some(Self::Literal),
            "normalized" => Some(Self::Normalized),
            _ => None,
        }
    }
}

impl TryFrom<String> for ConflictCheck {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
            .ok_or_else(|| format!("conflict_check must be `literal` or `normalized`, got `{value}`"))
    }
}

/// Returns true when `candidate_title` would land on a key already present in
/// `existing_keys`, unless the collision is the record being edited.
pub fn has_conflict<S: AsRef<str>>(
    candidate_title: &str,
    existing_keys: &[S],
    current_title: Option<&str>,
    mode: ConflictCheck,
) -> bool {
    let candidate_key = key_for_title(candidate_title);
    let exempt = match (mode, current_title) {
        (_, None) => false,
        (ConflictCheck::Literal, Some(current)) => current == candidate_title,
        (ConflictCheck::Normalized, Some(current)) => key_for_title(current) == candidate_key,
    };
    if exempt {
        return false;
    }
    existing_keys
        .iter()
        .any(|key| normalize_filename(key.as_ref()) == candidate_key)
}
