//! Images an item uses: body references, metadata fields, and image files
//! found where the collection's strategy says they live.

use domain::pattern::content_extension;
use domain::{Collection, ContentItem, ImageOrigin, ImageRef, ImageStrategy};
use regex::Regex;
use serde_json::Value as Json;
use std::{
    collections::HashSet,
    path::{Component, Path, PathBuf},
    sync::LazyLock,
};
use tracing::debug;
use walkdir::WalkDir;

use crate::discover::rel_string;

pub const IMAGE_EXTS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "avif", "svg"];

/// Metadata fields holding an image, as a string or `{ src }`.
pub const IMAGE_FIELDS: &[&str] = &["image", "cover", "heroImage", "thumbnail", "ogImage"];

// ![alt](src "title") and ![alt](<src with spaces>)
static MD_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"!\[[^\]]*\]\(\s*(?:<([^>]+)>|([^)\s]+))(?:\s+"[^"]*")?\s*\)"#).unwrap()
});

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTS.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

fn is_remote(src: &str) -> bool {
    let lower = src.to_ascii_lowercase();
    ["http://", "https://", "//", "data:"]
        .iter()
        .any(|p| lower.starts_with(p))
}

/// Lexically fold `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for c in path.components() {
        match c {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Every `![..](src)` target in a markdown body, in order.
pub fn body_references(body: &str) -> Vec<String> {
    MD_IMAGE
        .captures_iter(body)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

/// Image fields of the metadata, in field order.
pub fn metadata_references(item: &ContentItem) -> Vec<String> {
    IMAGE_FIELDS
        .iter()
        .filter_map(|f| item.metadata.get(*f))
        .filter_map(|v| match v {
            Json::String(s) => Some(s.as_str()),
            Json::Object(o) => o.get("src").and_then(Json::as_str),
            _ => None,
        })
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.trim().to_string())
        .collect()
}

struct Locator<'a> {
    project_root: &'a Path,
    public_root: PathBuf,
    item_dir: &'a Path,
}

impl Locator<'_> {
    /// Project-relative path of an existing local file for `src`.
    fn locate(&self, src: &str) -> Option<String> {
        if is_remote(src) {
            return None;
        }
        let src = src.split(['?', '#']).next().unwrap_or(src);
        let abs = match src.strip_prefix('/') {
            Some(rooted) => self.public_root.join(rooted),
            None => self.item_dir.join(src),
        };
        let abs = normalize(&abs);
        abs.is_file().then(|| self.project_relative(&abs))
    }

    fn project_relative(&self, abs: &Path) -> String {
        abs.strip_prefix(normalize(self.project_root))
            .map(rel_string)
            .unwrap_or_else(|_| abs.display().to_string())
    }
}

/// Image files below `dir`, relative to it, sorted. Hidden entries skipped.
fn image_files(dir: &Path, max_depth: usize) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    let mut out: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(max_depth)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(|e| e.map_err(|err| debug!("image scan: {err}")).ok())
        .filter(|e| e.file_type().is_file() && is_image(e.path()))
        .filter_map(|e| e.path().strip_prefix(dir).ok().map(Path::to_path_buf))
        .collect();
    out.sort();
    out
}

/// All images of `item`, de-duplicated in discovery order.
#[tracing::instrument(skip_all)]
pub fn discover_images(
    project_root: &Path,
    public_dir: &Path,
    collection: &Collection,
    item: &ContentItem,
) -> Vec<ImageRef> {
    let item_dir = item.path.parent().unwrap_or(project_root);
    let loc = Locator {
        project_root,
        public_root: project_root.join(public_dir),
        item_dir,
    };

    let mut found: Vec<ImageRef> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut push = |src: String, path: Option<String>, origin: ImageOrigin| {
        let key = path.clone().unwrap_or_else(|| src.clone());
        if seen.insert(key) {
            found.push(ImageRef { src, path, origin });
        }
    };

    for src in body_references(&item.body) {
        let path = loc.locate(&src);
        push(src, path, ImageOrigin::Body);
    }
    for src in metadata_references(item) {
        let path = loc.locate(&src);
        push(src, path, ImageOrigin::Metadata);
    }

    match collection.images {
        ImageStrategy::Colocated => {
            let folder_item = item
                .path
                .file_stem()
                .is_some_and(|s| s.eq_ignore_ascii_case("index"))
                && content_extension(&item.path.to_string_lossy()).is_some();
            if folder_item {
                for rel in image_files(item_dir, 2) {
                    let abs = item_dir.join(&rel);
                    push(
                        format!("./{}", rel_string(&rel)),
                        Some(loc.project_relative(&abs)),
                        ImageOrigin::Colocated,
                    );
                }
            }
        }
        ImageStrategy::Public => {
            let url_base = format!("/images/{}/{}", collection.name, item.id);
            let dir = loc.public_root.join(url_base.trim_start_matches('/'));
            for rel in image_files(&dir, usize::MAX) {
                let abs = dir.join(&rel);
                push(
                    format!("{url_base}/{}", rel_string(&rel)),
                    Some(loc.project_relative(&abs)),
                    ImageOrigin::Public,
                );
            }
        }
    }

    found
}
