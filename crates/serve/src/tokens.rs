//! Placeholder resolution for naming patterns.
//!
//! Every `{token}` in a pattern resolves, first hit wins, from:
//! 1. caller-supplied custom tokens,
//! 2. a built-in resolver (`slug`, date parts, `lang`, `category`, ...),
//! 3. a metadata field of the same name,
//! 4. the empty string.
//!
//! Resolution never fails.

use chrono::{NaiveDate, Utc};
use domain::pattern::{content_extension, TokenMap};
use domain::Metadata;
use regex::Regex;
use serde_json::Value as Json;
use std::sync::LazyLock;

use crate::slug::slugify;
use crate::{Error, Result};

/// Fields consulted for date tokens, in order.
pub const DATE_FIELDS: &[&str] = &[
    "pubDate",
    "date",
    "publishDate",
    "published",
    "createdAt",
    "created",
];

pub const LANG_FIELDS: &[&str] = &["lang", "language", "locale"];

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{([^{}]*)\}").unwrap());
static TOKEN_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

static NO_TOKENS: TokenMap = TokenMap::new();

/// Everything a resolver may look at for one item.
#[derive(Debug, Clone)]
pub struct TokenContext<'a> {
    pub slug: &'a str,
    pub metadata: &'a Metadata,
    pub custom: &'a TokenMap,
    pub collection: Option<&'a str>,
    /// Fallback for date tokens when no date field is usable.
    pub today: NaiveDate,
}

impl<'a> TokenContext<'a> {
    pub fn new(slug: &'a str, metadata: &'a Metadata) -> Self {
        Self {
            slug,
            metadata,
            custom: &NO_TOKENS,
            collection: None,
            today: Utc::now().date_naive(),
        }
    }

    pub fn with_custom(mut self, custom: &'a TokenMap) -> Self {
        self.custom = custom;
        self
    }

    pub fn with_collection(mut self, collection: &'a str) -> Self {
        self.collection = Some(collection);
        self
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }
}

/// Placeholder names in `template`, in order of first appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(template) {
        let name = &caps[1];
        if !out.iter().any(|n| n == name) {
            out.push(name.to_string());
        }
    }
    out
}

/// Resolve every placeholder of `template`.
pub fn resolve(template: &str, ctx: &TokenContext<'_>) -> TokenMap {
    placeholders(template)
        .into_iter()
        .map(|name| {
            let value = resolve_token(&name, ctx);
            (name, value)
        })
        .collect()
}

/// Resolve a single token.
pub fn resolve_token(name: &str, ctx: &TokenContext<'_>) -> String {
    if let Some(v) = ctx.custom.get(name) {
        return v.clone();
    }
    if let Some(v) = builtin(name, ctx) {
        return v;
    }
    ctx.metadata.get(name).map(raw_field).unwrap_or_default()
}

fn builtin(name: &str, ctx: &TokenContext<'_>) -> Option<String> {
    let meta = ctx.metadata;
    let value = match name {
        "slug" => ctx.slug.to_string(),
        "date" => item_date(ctx).format("%Y-%m-%d").to_string(),
        "year" => item_date(ctx).format("%Y").to_string(),
        "month" => item_date(ctx).format("%m").to_string(),
        "day" => item_date(ctx).format("%d").to_string(),
        "lang" => first_str(meta, LANG_FIELDS)
            .map(str::to_string)
            .unwrap_or_else(|| "en".to_string()),
        "category" => named_list_head(meta, &["category", "categories"])
            .map(slugify)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "uncategorized".to_string()),
        "author" => named_field(meta, "author")
            .map(slugify)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "anonymous".to_string()),
        "type" => first_str(meta, &["type", "kind"])
            .map(slugify)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "post".to_string()),
        "status" => match first_str(meta, &["status"]) {
            Some(s) => slugify(s),
            None if meta.get("draft").and_then(Json::as_bool) == Some(true) => "draft".into(),
            None => "published".into(),
        },
        "series" => named_field(meta, "series")
            .map(slugify)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "standalone".to_string()),
        "collection" => first_str(meta, &["collection"])
            .map(slugify)
            .or_else(|| ctx.collection.map(str::to_string))
            .unwrap_or_else(|| "default".to_string()),
        _ => return None,
    };
    Some(value)
}

fn raw_field(v: &Json) -> String {
    match v {
        Json::String(s) => slugify(s),
        Json::Number(n) => n.to_string(),
        Json::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn item_date(ctx: &TokenContext<'_>) -> NaiveDate {
    DATE_FIELDS
        .iter()
        .filter_map(|f| ctx.metadata.get(*f))
        .filter_map(Json::as_str)
        .find_map(parse_date)
        .unwrap_or(ctx.today)
}

/// Accepts `YYYY-MM-DD`, optionally followed by a `T`/space time part.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let head = s.get(..10)?;
    let rest = &s[10..];
    if !(rest.is_empty() || rest.starts_with('T') || rest.starts_with(' ')) {
        return None;
    }
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

fn first_str<'m>(meta: &'m Metadata, fields: &[&str]) -> Option<&'m str> {
    fields
        .iter()
        .filter_map(|f| meta.get(*f))
        .filter_map(Json::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
}

/// A string field, or the first string of an array field.
fn named_list_head<'m>(meta: &'m Metadata, fields: &[&str]) -> Option<&'m str> {
    fields.iter().filter_map(|f| meta.get(*f)).find_map(|v| match v {
        Json::String(s) if !s.trim().is_empty() => Some(s.as_str()),
        Json::Array(items) => items.first().and_then(Json::as_str),
        _ => None,
    })
}

/// A string field, or the `name` of an object field.
fn named_field<'m>(meta: &'m Metadata, field: &str) -> Option<&'m str> {
    match meta.get(field)? {
        Json::String(s) if !s.trim().is_empty() => Some(s.as_str()),
        Json::Object(o) => o.get("name").and_then(Json::as_str),
        _ => None,
    }
}

/// Replace each `{token}` with its value (missing → empty).
pub fn substitute(template: &str, tokens: &TokenMap) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures<'_>| {
            tokens.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

/// Check a user-supplied file pattern before it is used to build paths.
pub fn validate_pattern(pattern: &str) -> Result<()> {
    if pattern.trim().is_empty() {
        return Err(Error::validation("file pattern is empty"));
    }
    if pattern.starts_with('/') || pattern.contains('\\') {
        return Err(Error::validation(format!(
            "file pattern must be a relative, '/'-separated path: {pattern}"
        )));
    }
    if pattern
        .split('/')
        .any(|seg| seg.is_empty() || seg == "." || seg == "..")
    {
        return Err(Error::validation(format!(
            "file pattern has an empty or relative segment: {pattern}"
        )));
    }

    let mut open: Option<usize> = None;
    for (i, c) in pattern.char_indices() {
        match c {
            '{' if open.is_some() => {
                return Err(Error::validation(format!(
                    "unterminated placeholder at byte {} in {pattern}",
                    open.unwrap_or(i)
                )))
            }
            '{' => open = Some(i),
            '}' => {
                let Some(start) = open.take() else {
                    return Err(Error::validation(format!(
                        "unmatched '}}' at byte {i} in {pattern}"
                    )));
                };
                let name = &pattern[start + 1..i];
                if !TOKEN_NAME.is_match(name) {
                    return Err(Error::validation(format!(
                        "invalid placeholder name '{name}' in {pattern}"
                    )));
                }
            }
            _ => {}
        }
    }
    if let Some(start) = open {
        return Err(Error::validation(format!(
            "unterminated placeholder at byte {start} in {pattern}"
        )));
    }

    if !placeholders(pattern).iter().any(|p| p == "slug") {
        return Err(Error::validation(format!(
            "file pattern must contain {{slug}}: {pattern}"
        )));
    }
    if content_extension(pattern).is_none() {
        return Err(Error::validation(format!(
            "file pattern must end with a content extension (.md, .mdx, .markdown): {pattern}"
        )));
    }
    Ok(())
}
