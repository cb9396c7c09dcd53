//! Plain data for the collection layer: the naming-pattern catalog,
//! collections, content items, change events and settings.
//!
//! Nothing in this crate touches the filesystem; `serve` owns all I/O.

pub mod change;
pub mod collection;
pub mod content;
pub mod pattern;
pub mod setting;

pub use change::{ChangeEvent, ChangeKind};
pub use collection::{Collection, CollectionConfig, FieldType, ImageStrategy, Schema};
pub use content::{ContentItem, ContentSummary, ImageOrigin, ImageRef, Metadata};
pub use pattern::{DetectionResult, PatternTemplate, Sample, TokenMap};
