pub const RECORD_EXTENSION: &str = ".json";

/// Normalize a file name: the base (everything before the last `.`) is trimmed,
/// whitespace runs become a single `_`, and anything outside `[A-Za-z0-9_-]`
/// is dropped. The extension is reattached unchanged.
pub fn normalize_filename(filename: &str) -> String {
    let (base, extension) = split_extension(filename);
    let mut out = String::with_capacity(filename.len());
    let mut in_whitespace = false;
    for ch in base.trim().chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                out.push('_');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
            out.push(ch);
        }
    }
    out.push_str(extension);
    out
}

/// Storage key of the record titled `title`.
pub fn key_for_title(title: &str) -> String {
    normalize_filename(&format!("{title}{RECORD_EXTENSION}"))
}

pub fn is_record_filename(filename: &str) -> bool {
    filename.ends_with(RECORD_EXTENSION)
}

/// First `words` whitespace-separated words of `text`, with `...` appended when
/// anything was cut.
pub fn excerpt(text: &str, words: usize) -> String {
    let parts = text.split_whitespace().collect::<Vec<_>>();
    if parts.len() > words {
        format!("{}...", parts[..words].join(" "))
    } else {
        text.to_string()
    }
}

fn split_extension(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(index) => filename.split_at(index),
        None => (filename, ""),
    }
}
