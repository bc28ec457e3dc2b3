pub mod host;
pub mod schema_fetcher;

pub use host::{commit_new_node, spawn_editor, EditorHandle, Intent};
pub use schema_fetcher::{FetchError, RequestSequencer, SchemaFetcher};
