//! Metadata document parsing.
//!
//! Strict JSON is tried first. Anything that is not JSON goes through a
//! line-oriented reader for the small YAML subset metadata files use:
//! top-level `key: value` pairs, inline `[..]` lists and `- item` block
//! lists. Nested mappings are rejected rather than guessed at.

use serde_json::{Map, Value};

use crate::error::{PolicyError, PolicyResult};

/// A parsed metadata document: a flat key/value mapping.
pub type Document = Map<String, Value>;

/// File names recognized as metadata documents, at any depth.
pub const DEFAULT_METADATA_FILENAMES: &[&str] = &["meta.yaml", "meta.yml"];

/// Whether the final segment of `path` is one of `names`.
pub fn is_metadata_path<S: AsRef<str>>(path: &str, names: &[S]) -> bool {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    names.iter().any(|name| name.as_ref() == file_name)
}

/// Parse document bytes into a mapping.
pub fn parse_document(bytes: &[u8]) -> PolicyResult<Document> {
    let text = std::str::from_utf8(bytes).map_err(|_| PolicyError::NotUtf8)?;
    if text.trim().is_empty() {
        return Err(PolicyError::EmptyDocument);
    }

    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(PolicyError::NotAMapping),
        Err(_) => parse_lines(text),
    }
}

fn parse_lines(text: &str) -> PolicyResult<Document> {
    let mut doc = Document::new();
    // Key whose value is an (so far empty) block list.
    let mut pending: Option<String> = None;

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = strip_comment(raw).trim_end();
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed == "---" || trimmed == "..." {
            continue;
        }

        if let Some(item) = list_item(trimmed) {
            let Some(key) = pending.as_ref() else {
                return Err(syntax(line_no, "list item without a key"));
            };
            let scalar = coerce_scalar(item);
            match doc.get_mut(key) {
                Some(Value::Array(items)) => items.push(scalar),
                Some(slot) => *slot = Value::Array(vec![scalar]),
                None => {
                    doc.insert(key.clone(), Value::Array(vec![scalar]));
                }
            }
            continue;
        }

        if line.starts_with(char::is_whitespace) {
            return Err(syntax(line_no, "nested mappings are not supported"));
        }

        let Some((key, value)) = trimmed.split_once(':') else {
            return Err(syntax(line_no, "expected 'key: value'"));
        };
        let key = unquote(key.trim());
        if key.is_empty() {
            return Err(syntax(line_no, "empty key"));
        }
        let value = value.trim();

        if value.is_empty() {
            doc.insert(key.clone(), Value::Null);
            pending = Some(key);
        } else {
            doc.insert(key, parse_value(value).map_err(|reason| syntax(line_no, &reason))?);
            pending = None;
        }
    }

    if doc.is_empty() {
        return Err(PolicyError::EmptyDocument);
    }
    Ok(doc)
}

fn syntax(line: usize, reason: &str) -> PolicyError {
    PolicyError::Syntax {
        line,
        reason: reason.to_string(),
    }
}

fn list_item(trimmed: &str) -> Option<&str> {
    if trimmed == "-" {
        Some("")
    } else {
        trimmed.strip_prefix("- ").map(str::trim)
    }
}

/// Drop a `#` comment that starts the line or follows whitespace, ignoring
/// `#` inside quotes.
fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut prev_space = true;
    for (i, c) in line.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '#' && prev_space => return &line[..i],
            None => {}
        }
        prev_space = c.is_whitespace();
    }
    line
}

fn parse_value(value: &str) -> Result<Value, String> {
    if value.starts_with('[') || value.starts_with('{') {
        if let Ok(parsed) = serde_json::from_str::<Value>(value) {
            return Ok(parsed);
        }
        if let Some(inner) = value.strip_prefix('[').and_then(|v| v.strip_suffix(']')) {
            let items = inner
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(coerce_scalar)
                .collect();
            return Ok(Value::Array(items));
        }
        return Err(format!("unsupported flow collection '{value}'"));
    }
    Ok(coerce_scalar(value))
}

/// `true`/`false` become booleans, bare integers become numbers, quoted
/// scalars are unquoted, and everything else stays a string.
fn coerce_scalar(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(n) = raw.parse::<i64>() {
            return Value::from(n);
        }
    }
    Value::String(unquote(raw))
}

fn unquote(raw: &str) -> String {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        return serde_json::from_str::<String>(raw)
            .unwrap_or_else(|_| raw[1..raw.len() - 1].to_string());
    }
    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        return raw[1..raw.len() - 1].replace("''", "'");
    }
    raw.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(text: &str) -> Document {
        parse_document(text.as_bytes()).unwrap()
    }

    // -----------------------------------------------------------------------
    // JSON
    // -----------------------------------------------------------------------

    #[test]
    fn strict_json_object() {
        let doc = parse(r#"{"title": "Test Movie", "genre": ["Action"]}"#);
        assert_eq!(doc["title"], json!("Test Movie"));
        assert_eq!(doc["genre"], json!(["Action"]));
    }

    #[test]
    fn json_non_object_is_rejected() {
        assert!(matches!(parse_document(b"[1, 2]"), Err(PolicyError::NotAMapping)));
        assert!(matches!(parse_document(b"\"title\""), Err(PolicyError::NotAMapping)));
    }

    // -----------------------------------------------------------------------
    // Line fallback
    // -----------------------------------------------------------------------

    #[test]
    fn key_value_pairs_with_coercion() {
        let doc = parse("title: Test Movie\nyear: 2026\nadult: false\ncode: -7\nrating: 8.5\n");
        assert_eq!(doc["title"], json!("Test Movie"));
        assert_eq!(doc["year"], json!(2026));
        assert_eq!(doc["adult"], json!(false));
        assert_eq!(doc["code"], json!(-7));
        assert_eq!(doc["rating"], json!("8.5"));
    }

    #[test]
    fn quoted_scalars_stay_strings() {
        let doc = parse("title: \"Test Movie\"\nyear: '2026'\nnote: 'it''s'\n");
        assert_eq!(doc["title"], json!("Test Movie"));
        assert_eq!(doc["year"], json!("2026"));
        assert_eq!(doc["note"], json!("it's"));
    }

    #[test]
    fn comments_and_markers_ignored() {
        let doc = parse("---\n# heading\ntitle: Movie # trailing\ntag: \"#1 hit\"\n...\n");
        assert_eq!(doc["title"], json!("Movie"));
        assert_eq!(doc["tag"], json!("#1 hit"));
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn inline_lists() {
        let doc = parse("genre: [\"Action\", \"Drama\"]\ntags: [a, b, 3]\nnone: []\n");
        assert_eq!(doc["genre"], json!(["Action", "Drama"]));
        assert_eq!(doc["tags"], json!(["a", "b", 3]));
        assert_eq!(doc["none"], json!([]));
    }

    #[test]
    fn block_lists() {
        let doc = parse("genre:\n  - Action\n  - Drama\ntitle: X\nempty:\n");
        assert_eq!(doc["genre"], json!(["Action", "Drama"]));
        assert_eq!(doc["title"], json!("X"));
        assert_eq!(doc["empty"], Value::Null);
    }

    #[test]
    fn nested_mapping_is_a_syntax_error() {
        let err = parse_document(b"cast:\n  lead: Someone\n").unwrap_err();
        assert!(matches!(err, PolicyError::Syntax { line: 2, .. }));
    }

    #[test]
    fn stray_text_is_a_syntax_error() {
        let err = parse_document(b"title: ok\njust some words\n").unwrap_err();
        assert!(matches!(err, PolicyError::Syntax { line: 2, .. }));
    }

    #[test]
    fn list_item_without_key_is_rejected() {
        assert!(matches!(
            parse_document(b"- Action\n"),
            Err(PolicyError::Syntax { line: 1, .. })
        ));
    }

    #[test]
    fn empty_and_binary_inputs() {
        assert!(matches!(parse_document(b""), Err(PolicyError::EmptyDocument)));
        assert!(matches!(parse_document(b"# only a comment\n"), Err(PolicyError::EmptyDocument)));
        assert!(matches!(parse_document(&[0xff, 0xfe]), Err(PolicyError::NotUtf8)));
    }

    // -----------------------------------------------------------------------
    // Recognition
    // -----------------------------------------------------------------------

    #[test]
    fn metadata_paths_by_final_segment() {
        let names = DEFAULT_METADATA_FILENAMES;
        assert!(is_metadata_path("data/2026/x/meta.yaml", names));
        assert!(is_metadata_path("meta.yml", names));
        assert!(!is_metadata_path("data/meta.yaml/readme.md", names));
        assert!(!is_metadata_path("data/x/meta.json", names));
    }
}
