use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use std::path::PathBuf;

/// Frontmatter as an insertion-ordered map of JSON values.
pub type Metadata = Map<String, Json>;

/// A single content file, fully read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    /// Collection-relative path without extension (and without `/index`).
    pub id: String,
    pub slug: String,
    /// Absolute path of the backing file.
    pub path: PathBuf,
    pub metadata: Metadata,
    pub body: String,
    /// File contents exactly as read.
    pub raw: String,
}

/// Listing row for a collection's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSummary {
    pub id: String,
    pub slug: String,
    /// Relative to the collection root, `/`-separated.
    pub path: String,
    pub title: Option<String>,
    pub date: Option<String>,
    pub draft: bool,
}

/// Where an image reference was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageOrigin {
    Body,
    Metadata,
    Colocated,
    Public,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    /// As written in the item, or the public URL for discovered files.
    pub src: String,
    /// Project-relative path when the image exists on disk.
    pub path: Option<String>,
    pub origin: ImageOrigin,
}
