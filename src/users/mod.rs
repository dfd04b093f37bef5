pub mod memory;
pub mod repo;
pub mod repo_types;

pub use memory::MemoryUserDirectory;
pub use repo::{DirectoryError, PgUserDirectory, UserDirectory};
pub use repo_types::{NewUser, PublicUser, User};
