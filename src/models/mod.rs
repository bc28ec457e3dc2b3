pub mod editor;
pub mod schema;
