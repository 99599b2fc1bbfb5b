pub mod file;
pub mod identity;
pub mod memory;
pub mod traits;

pub use file::JsonFileStore;
pub use identity::IdentityStore;
pub use memory::InMemoryStore;
pub use traits::{DocumentStore, StoreHandle, Traversal};
