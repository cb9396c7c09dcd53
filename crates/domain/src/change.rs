use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Add,
    Change,
    Unlink,
}

impl ChangeKind {
    /// Adds and removals change a collection's item count; edits don't.
    pub const fn alters_count(self) -> bool {
        matches!(self, ChangeKind::Add | ChangeKind::Unlink)
    }
}

/// A change inside a collection, from the watcher or from a write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub collection: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, collection: impl Into<String>) -> Self {
        Self {
            kind,
            collection: collection.into(),
            content_id: None,
        }
    }

    pub fn with_content_id(mut self, id: impl Into<String>) -> Self {
        self.content_id = Some(id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape_matches_watcher_events() {
        let ev: ChangeEvent =
            serde_json::from_str(r#"{"type":"unlink","collection":"blog","contentId":"a"}"#)
                .unwrap();
        assert_eq!(
            ev,
            ChangeEvent::new(ChangeKind::Unlink, "blog").with_content_id("a")
        );
        assert!(ev.kind.alters_count());
        assert!(!ChangeKind::Change.alters_count());
    }
}
