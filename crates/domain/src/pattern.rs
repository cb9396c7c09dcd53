//! The naming-pattern catalog.
//!
//! Each [`PatternTemplate`] is one file-naming convention a content collection
//! may follow. Matching is structural: a relative, `/`-separated path either
//! fits the template's shape (and yields its token values) or it doesn't.
//! Overlaps between templates are expected; the detector settles them by
//! score, and only falls back to catalog order on exact ties.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// File extensions treated as content (compared case-insensitively).
pub const CONTENT_EXTS: &[&str] = &["md", "mdx", "markdown"];

/// Token name → resolved value.
pub type TokenMap = BTreeMap<String, String>;

/// True when `ext` (with or without a leading dot) is a content extension.
pub fn is_content_extension(ext: &str) -> bool {
    let ext = ext.strip_prefix('.').unwrap_or(ext);
    CONTENT_EXTS.iter().any(|c| c.eq_ignore_ascii_case(ext))
}

/// Content extension of a relative path, lowercased, if it has one.
pub fn content_extension(path: &str) -> Option<String> {
    let name = path.rsplit('/').next()?;
    let (_, ext) = name.rsplit_once('.')?;
    is_content_extension(ext).then(|| ext.to_ascii_lowercase())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternTemplate {
    /// `{slug}.md`
    Slug,
    /// `{category}/{slug}.md`
    CategorySlug,
    /// `{date}-{slug}.md`
    DateSlug,
    /// `{lang}/{slug}.md`
    LangSlug,
    /// `{year}/{slug}.md`
    YearSlug,
    /// `{year}/{month}/{slug}.md`
    YearMonthSlug,
    /// `{year}/{month}/{day}/{slug}.md`
    YearMonthDaySlug,
    /// `{slug}/index.md`
    SlugIndex,
    /// `{date}-{slug}/index.md`
    DateSlugIndex,
}

/// A successful structural match of one path against one template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatch {
    pub tokens: TokenMap,
    /// Observed extension, lowercased.
    pub ext: String,
}

const EXT: &str = r"\.(?P<ext>[A-Za-z]+)$";
const DATE: &str = r"(?P<date>(?P<year>\d{4})-(?P<month>\d{2})-(?P<day>\d{2}))";

static MATCHERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    PatternTemplate::CATALOG
        .iter()
        .map(|t| Regex::new(&t.regex_source()).unwrap())
        .collect()
});

impl PatternTemplate {
    /// Catalog in its documented order (the secondary tie-break).
    pub const CATALOG: [PatternTemplate; 9] = [
        PatternTemplate::Slug,
        PatternTemplate::CategorySlug,
        PatternTemplate::DateSlug,
        PatternTemplate::LangSlug,
        PatternTemplate::YearSlug,
        PatternTemplate::YearMonthSlug,
        PatternTemplate::YearMonthDaySlug,
        PatternTemplate::SlugIndex,
        PatternTemplate::DateSlugIndex,
    ];

    /// The flat template returned for empty collections.
    pub const FALLBACK: PatternTemplate = PatternTemplate::Slug;

    pub const fn name(self) -> &'static str {
        match self {
            Self::Slug => "slug",
            Self::CategorySlug => "category-slug",
            Self::DateSlug => "date-slug",
            Self::LangSlug => "lang-slug",
            Self::YearSlug => "year-slug",
            Self::YearMonthSlug => "year-month-slug",
            Self::YearMonthDaySlug => "year-month-day-slug",
            Self::SlugIndex => "slug-index",
            Self::DateSlugIndex => "date-slug-index",
        }
    }

    pub const fn template(self) -> &'static str {
        match self {
            Self::Slug => "{slug}.md",
            Self::CategorySlug => "{category}/{slug}.md",
            Self::DateSlug => "{date}-{slug}.md",
            Self::LangSlug => "{lang}/{slug}.md",
            Self::YearSlug => "{year}/{slug}.md",
            Self::YearMonthSlug => "{year}/{month}/{slug}.md",
            Self::YearMonthDaySlug => "{year}/{month}/{day}/{slug}.md",
            Self::SlugIndex => "{slug}/index.md",
            Self::DateSlugIndex => "{date}-{slug}/index.md",
        }
    }

    /// Tie-break weight; richer structure ranks higher.
    pub const fn priority(self) -> i32 {
        match self {
            Self::Slug => 0,
            Self::CategorySlug => 5,
            Self::DateSlug => 10,
            Self::LangSlug => 12,
            Self::YearSlug => 15,
            Self::YearMonthSlug => 20,
            Self::YearMonthDaySlug => 25,
            Self::SlugIndex => 30,
            Self::DateSlugIndex => 35,
        }
    }

    /// Looks up a catalog entry by its template string (`.md` or any content extension).
    pub fn from_template(template: &str) -> Option<Self> {
        let normalized = match template.rsplit_once('.') {
            Some((stem, ext)) if is_content_extension(ext) => format!("{stem}.md"),
            _ => return None,
        };
        Self::CATALOG.into_iter().find(|t| t.template() == normalized)
    }

    /// The template string with its `.md` suffix swapped for `ext`.
    pub fn with_extension(self, ext: &str) -> String {
        let t = self.template();
        let stem = t.strip_suffix(".md").unwrap_or(t);
        format!("{stem}.{}", ext.trim_start_matches('.'))
    }

    fn regex_source(self) -> String {
        let body = match self {
            Self::Slug => r"(?P<slug>[^/]+)".to_string(),
            Self::CategorySlug => r"(?P<category>[a-z0-9][a-z0-9_-]*)/(?P<slug>[^/]+)".to_string(),
            Self::DateSlug => format!(r"{DATE}-(?P<slug>[^/]+)"),
            Self::LangSlug => r"(?P<lang>[a-z]{2}(?:-[A-Za-z]{2})?)/(?P<slug>[^/]+)".to_string(),
            Self::YearSlug => r"(?P<year>\d{4})/(?P<slug>[^/]+)".to_string(),
            Self::YearMonthSlug => r"(?P<year>\d{4})/(?P<month>\d{2})/(?P<slug>[^/]+)".to_string(),
            Self::YearMonthDaySlug => {
                r"(?P<year>\d{4})/(?P<month>\d{2})/(?P<day>\d{2})/(?P<slug>[^/]+)".to_string()
            }
            Self::SlugIndex => r"(?P<slug>[^/]+)/index".to_string(),
            Self::DateSlugIndex => format!(r"{DATE}-(?P<slug>[^/]+)/index"),
        };
        format!("^{body}{EXT}")
    }

    fn matcher(self) -> &'static Regex {
        let idx = Self::CATALOG
            .iter()
            .position(|t| *t == self)
            .unwrap_or_default();
        &MATCHERS[idx]
    }

    /// Match a collection-relative, `/`-separated path and extract its tokens.
    pub fn matches(self, rel: &str) -> Option<PathMatch> {
        let re = self.matcher();
        let caps = re.captures(rel)?;
        let ext = caps.name("ext")?.as_str();
        if !is_content_extension(ext) {
            return None;
        }

        let mut tokens = TokenMap::new();
        for name in re.capture_names().flatten() {
            if name == "ext" {
                continue;
            }
            if let Some(m) = caps.name(name) {
                tokens.insert(name.to_string(), m.as_str().to_string());
            }
        }

        if !calendar_parts_valid(&tokens) {
            return None;
        }

        Some(PathMatch {
            tokens,
            ext: ext.to_ascii_lowercase(),
        })
    }
}

fn calendar_parts_valid(tokens: &TokenMap) -> bool {
    let in_range = |key: &str, lo: u32, hi: u32| {
        tokens
            .get(key)
            .map(|v| v.parse::<u32>().is_ok_and(|n| (lo..=hi).contains(&n)))
            .unwrap_or(true)
    };
    in_range("month", 1, 12) && in_range("day", 1, 31)
}

/// One sample extraction kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub path: String,
    pub tokens: TokenMap,
}

/// Outcome of scoring a collection against the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    /// Winning template string, suffix adjusted to the observed extension.
    pub pattern: String,
    /// Catalog name of the winner.
    pub name: String,
    pub confidence: f64,
    pub match_count: usize,
    pub total_files: usize,
    pub samples: Vec<Sample>,
}

impl DetectionResult {
    /// Zero-confidence result for a collection without content files.
    pub fn empty() -> Self {
        let t = PatternTemplate::FALLBACK;
        Self {
            pattern: t.template().to_string(),
            name: t.name().to_string(),
            confidence: 0.0,
            match_count: 0,
            total_files: 0,
            samples: Vec::new(),
        }
    }
}
