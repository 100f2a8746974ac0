//! Storage engine behind the generated REST API.
//! - Loads the backing JSON document and keeps it behind one lock.
//! - Enforces identifier rules on create/replace/patch.
//! - Writes every acknowledged mutation back to disk atomically.

pub mod errors;
pub mod file;
pub mod resources;
pub mod storage;

pub use errors::ServiceError;
pub use file::resource_store::JsonResourceStore;
pub use resources::repository::ResourceRepository;
