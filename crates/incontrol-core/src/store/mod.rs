// Token persistence.

mod token;

pub use token::{FileTokenStore, MemoryTokenStore, STORAGE_KEY, STORAGE_VERSION, TokenStore};
