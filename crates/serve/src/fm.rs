//! YAML front matter: `---` fenced parse and the collection-compatible emitter.
//!
//! Files written here look like `---\n<lines>\n---\n\n<body>`. The emitter is
//! deliberately small: top-level scalars, block sequences, one level of
//! nested mappings. Anything deeper is written as JSON flow, which YAML reads.

use chrono::{DateTime, Timelike};
use domain::Metadata;
use serde_json::Value as Json;

use crate::{Error, Result};

/// Result of parsing a content file.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    /// False when the file had no (terminated) `---` block.
    pub has_front_matter: bool,
    pub metadata: Metadata,
    pub body: String,
}

/// Parse a document with optional YAML front matter.
pub fn parse_front_matter(txt: &str) -> Result<Parsed> {
    let text = txt.strip_prefix('\u{FEFF}').unwrap_or(txt);

    let Some(rest) = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
    else {
        return Ok(Parsed {
            has_front_matter: false,
            metadata: Metadata::new(),
            body: text.to_owned(),
        });
    };

    // Unterminated fence → treat as no front matter
    let Some((fm, body)) = take_until_fence(rest, "---") else {
        return Ok(Parsed {
            has_front_matter: false,
            metadata: Metadata::new(),
            body: text.to_owned(),
        });
    };

    let metadata = if fm.trim().is_empty() {
        Metadata::new()
    } else {
        match serde_yml::from_str::<Json>(fm).map_err(|e| Error::FrontMatter(e.to_string()))? {
            Json::Object(map) => map,
            Json::Null => Metadata::new(),
            other => {
                return Err(Error::FrontMatter(format!(
                    "expected a mapping, found {}",
                    json_kind(&other)
                )))
            }
        }
    };

    // The writer leaves one blank line between the fence and the body.
    let body = body
        .strip_prefix("\r\n")
        .or_else(|| body.strip_prefix('\n'))
        .unwrap_or(body);

    Ok(Parsed {
        has_front_matter: true,
        metadata,
        body: body.to_owned(),
    })
}

/// Scan `rest` for a line that is exactly the fence, returning (front_matter, body).
fn take_until_fence<'a>(rest: &'a str, fence: &str) -> Option<(&'a str, &'a str)> {
    let mut idx = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end_matches('\n').trim_end_matches('\r');
        if trimmed == fence {
            return Some((&rest[..idx], &rest[idx + line.len()..]));
        }
        idx += line.len();
    }
    None
}

fn json_kind(v: &Json) -> &'static str {
    match v {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "a sequence",
        Json::Object(_) => "a mapping",
    }
}

/// Render metadata + body in the on-disk layout.
pub fn serialize_front_matter(metadata: &Metadata, body: &str) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(metadata.len());

    for (key, value) in metadata {
        match value {
            Json::Null => {}
            Json::Array(items) if items.is_empty() => lines.push(format!("{key}: []")),
            Json::Array(items) => {
                lines.push(format!("{key}:"));
                for item in items {
                    lines.push(format!("  - {}", nested_value(item)));
                }
            }
            Json::Object(map) if map.is_empty() => lines.push(format!("{key}: {{}}")),
            Json::Object(map) => {
                lines.push(format!("{key}:"));
                for (k, v) in map.iter().filter(|(_, v)| !v.is_null()) {
                    lines.push(format!("  {k}: {}", nested_value(v)));
                }
            }
            scalar => lines.push(format!("{key}: {}", format_scalar(scalar))),
        }
    }

    format!("---\n{}\n---\n\n{}", lines.join("\n"), body)
}

fn nested_value(v: &Json) -> String {
    match v {
        Json::Array(_) | Json::Object(_) => v.to_string(),
        scalar => format_scalar(scalar),
    }
}

fn format_scalar(v: &Json) -> String {
    match v {
        Json::String(s) => format_string(s),
        Json::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn format_string(s: &str) -> String {
    if let Some(date) = midnight_utc_date(s) {
        return date;
    }
    if s.contains([':', '#', '\n']) || !reads_back_verbatim(s) {
        return quote(s);
    }
    s.to_string()
}

/// `2024-01-15T00:00:00.000Z` (a date-only value after a JSON trip) → `2024-01-15`.
fn midnight_utc_date(s: &str) -> Option<String> {
    if !s.ends_with('Z') {
        return None;
    }
    let dt = DateTime::parse_from_rfc3339(s).ok()?;
    let t = dt.time();
    (t.hour() == 0 && t.minute() == 0 && t.second() == 0 && t.nanosecond() == 0)
        .then(|| dt.format("%Y-%m-%d").to_string())
}

/// Would a YAML reader give back exactly `s` for the plain scalar?
fn reads_back_verbatim(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    matches!(serde_yml::from_str::<Json>(s), Ok(Json::String(back)) if back == s)
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
