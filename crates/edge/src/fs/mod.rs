pub mod watch;

pub use watch::{classify_event, watch_collections, CollectionRoots, WatchedCollections};
