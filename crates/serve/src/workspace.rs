//! The request-facing service: cache first, scan on a miss, report writes.
//!
//! Every filesystem call runs on the blocking pool. Writes feed the same
//! `ChangeEvent`s into the cache that the watcher would, without waiting
//! for the watcher to notice.

use domain::setting::Settings;
use domain::{
    ChangeEvent, ChangeKind, Collection, CollectionConfig, ContentItem, ContentSummary,
    DetectionResult, ImageRef,
};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, info};

use crate::cache::CollectionCache;
use crate::discover::{discover_collections, find_item, list_summaries, rel_string};
use crate::file::{self, CreateRequest, Created, UpdateRequest, Updated};
use crate::{detect, images, merge, preview};
use crate::{Error, Result};

#[derive(Debug)]
struct Inner {
    root: PathBuf,
    content_dir: PathBuf,
    public_dir: PathBuf,
    configured: Vec<CollectionConfig>,
    cache: Arc<CollectionCache>,
}

impl Inner {
    fn collection_dir(&self, col: &Collection) -> PathBuf {
        self.root.join(&col.path)
    }

    fn scan_collections(&self) -> Result<Vec<Collection>> {
        let found = discover_collections(&self.root, &self.content_dir)
            .map_err(|e| Error::io(self.root.join(&self.content_dir), e))?;
        Ok(merge::merge(found, &self.configured, &rel_string(&self.content_dir)))
    }
}

/// Cheap to clone; clones share the cache and settings.
#[derive(Debug, Clone)]
pub struct Workspace {
    inner: Arc<Inner>,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>, settings: &Settings, cache: Arc<CollectionCache>) -> Self {
        Self {
            inner: Arc::new(Inner {
                root: root.into(),
                content_dir: settings.content.dir.clone(),
                public_dir: settings.content.public_dir.clone(),
                configured: settings.collections.clone(),
                cache,
            }),
        }
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Absolute directory holding the collections.
    pub fn content_root(&self) -> PathBuf {
        self.inner.root.join(&self.inner.content_dir)
    }

    pub fn cache(&self) -> &Arc<CollectionCache> {
        &self.inner.cache
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Inner) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(&inner))
            .await
            .map_err(|e| Error::Task(e.to_string()))?
    }

    fn report(&self, ev: ChangeEvent) {
        self.inner.cache.handle_file_change(&ev);
    }

    /// All collections, discovered and configured.
    pub async fn collections(&self) -> Result<Arc<Vec<Collection>>> {
        if let Some(hit) = self.inner.cache.get_collections() {
            return Ok(hit);
        }
        let ticket = self.inner.cache.collections_ticket();
        let fresh = self.blocking(|inner| inner.scan_collections()).await?;
        debug!("scanned {} collections", fresh.len());
        Ok(self.inner.cache.fill_collections(ticket, fresh))
    }

    pub async fn collection(&self, name: &str) -> Result<Collection> {
        self.collections()
            .await?
            .iter()
            .find(|c| c.name == name)
            .cloned()
            .ok_or_else(|| Error::not_found("collection", name))
    }

    /// Summaries of a collection's items, newest first.
    pub async fn content(&self, name: &str) -> Result<Arc<Vec<ContentSummary>>> {
        if let Some(hit) = self.inner.cache.get_content(name) {
            return Ok(hit);
        }
        let ticket = self.inner.cache.content_ticket();
        let col = self.collection(name).await?;
        let rows = self
            .blocking(move |inner| {
                let dir = inner.collection_dir(&col);
                if !dir.is_dir() {
                    return Ok(Vec::new());
                }
                list_summaries(&dir, Some(&col.file_pattern)).map_err(|e| Error::io(&dir, e))
            })
            .await?;
        Ok(self.inner.cache.fill_content(ticket, name, rows))
    }

    fn locate(inner: &Inner, col: &Collection, id: &str) -> Result<(PathBuf, PathBuf)> {
        let dir = inner.collection_dir(col);
        let file = find_item(&dir, id)
            .ok_or_else(|| Error::not_found("content", format!("{}/{id}", col.name)))?;
        Ok((dir, file))
    }

    pub async fn item(&self, name: &str, id: &str) -> Result<ContentItem> {
        let col = self.collection(name).await?;
        let id = id.to_string();
        self.blocking(move |inner| {
            let (dir, file) = Self::locate(inner, &col, &id)?;
            file::read(&file, &dir)
        })
        .await
    }

    pub async fn images(&self, name: &str, id: &str) -> Result<Arc<Vec<ImageRef>>> {
        if let Some(hit) = self.inner.cache.get_images(name, id) {
            return Ok(hit);
        }
        let ticket = self.inner.cache.images_ticket();
        let col = self.collection(name).await?;
        let owned_id = id.to_string();
        let found = self
            .blocking(move |inner| {
                let (dir, file) = Self::locate(inner, &col, &owned_id)?;
                let item = file::read(&file, &dir)?;
                Ok(images::discover_images(&inner.root, &inner.public_dir, &col, &item))
            })
            .await?;
        Ok(self.inner.cache.fill_images(ticket, name, id, found))
    }

    pub async fn preview_url(&self, name: &str, id: &str) -> Result<Option<String>> {
        let col = self.collection(name).await?;
        if col.preview_url.is_none() {
            return Ok(None);
        }
        let id = id.to_string();
        self.blocking(move |inner| {
            let (dir, file) = Self::locate(inner, &col, &id)?;
            let item = file::read(&file, &dir)?;
            Ok(preview::preview_url(&col, &dir, &item))
        })
        .await
    }

    /// Re-run pattern detection on a collection's directory.
    pub async fn detect(&self, name: &str) -> Result<DetectionResult> {
        let col = self.collection(name).await?;
        self.blocking(move |inner| Ok(detect::detect(&inner.collection_dir(&col))))
            .await
    }

    /// Create an item with the collection's pattern unless the request names one.
    pub async fn create(&self, name: &str, mut req: CreateRequest) -> Result<Created> {
        let col = self.collection(name).await?;
        if req.file_pattern.is_none() {
            req.file_pattern = Some(col.file_pattern.clone());
        }
        req.collection.get_or_insert_with(|| col.name.clone());

        let created = self
            .blocking(move |inner| file::create(&inner.collection_dir(&col), &req))
            .await?;
        info!("{name}: created {}", created.id);
        self.report(ChangeEvent::new(ChangeKind::Add, name).with_content_id(&created.id));
        Ok(created)
    }

    pub async fn update(&self, name: &str, id: &str, req: UpdateRequest) -> Result<Updated> {
        let col = self.collection(name).await?;
        let owned_id = id.to_string();
        let updated = self
            .blocking(move |inner| {
                let (dir, file) = Self::locate(inner, &col, &owned_id)?;
                file::update(&file, &dir, &req)
            })
            .await?;
        self.report(ChangeEvent::new(ChangeKind::Change, name).with_content_id(id));
        Ok(updated)
    }

    pub async fn delete(&self, name: &str, id: &str) -> Result<()> {
        let col = self.collection(name).await?;
        let owned_id = id.to_string();
        self.blocking(move |inner| {
            let (dir, file) = Self::locate(inner, &col, &owned_id)?;
            file::delete(&file, &dir)
        })
        .await?;
        self.report(ChangeEvent::new(ChangeKind::Unlink, name).with_content_id(id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, text: &str) {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, text).unwrap();
    }

    fn workspace(root: &Path) -> Workspace {
        Workspace::new(root, &Settings::default(), Arc::new(CollectionCache::new()))
    }

    #[tokio::test]
    async fn listing_is_served_from_cache_until_a_write() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/content/blog/a.md", "---\ntitle: A\n---\n");
        let ws = workspace(dir.path());

        let first = ws.content("blog").await.unwrap();
        assert_eq!(first.len(), 1);

        // Out-of-band file: invisible until something invalidates.
        write(dir.path(), "src/content/blog/b.md", "---\ntitle: B\n---\n");
        let again = ws.content("blog").await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        let req: CreateRequest = serde_json::from_value(json!({"metadata": {"title": "C"}})).unwrap();
        ws.create("blog", req).await.unwrap();
        assert_eq!(ws.content("blog").await.unwrap().len(), 3);
        assert_eq!(ws.collection("blog").await.unwrap().item_count, 3);
    }

    #[tokio::test]
    async fn unknown_names_are_not_found() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/content/blog/a.md", "x");
        let ws = workspace(dir.path());

        let err = ws.content("nope").await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::NotFound);
        let err = ws.item("blog", "missing").await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::NotFound);
        let err = ws.delete("blog", "missing").await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn configured_collection_without_directory() {
        let dir = TempDir::new().unwrap();
        let mut settings = Settings::default();
        settings.collections.push(CollectionConfig {
            file_pattern: Some("{year}/{slug}.md".into()),
            ..CollectionConfig::named("notes")
        });
        let ws = Workspace::new(dir.path(), &settings, Arc::new(CollectionCache::new()));

        assert!(ws.content("notes").await.unwrap().is_empty());
        let req: CreateRequest = serde_json::from_value(json!({
            "metadata": {"title": "First", "date": "2023-04-01"}
        }))
        .unwrap();
        let made = ws.create("notes", req).await.unwrap();
        assert_eq!(made.relative_path, "2023/first.md");
        assert!(dir.path().join("src/content/notes/2023/first.md").is_file());
    }
}
