pub mod folders;
pub mod resolver;
pub mod session;
pub mod settings;
pub mod store;

pub use folders::{known_folder, FolderLocator, KnownFolder, SystemFolders};
pub use resolver::{Resolved, Resolver, Scope, ValueSource};
pub use session::Session;
pub use store::{PreferenceStore, SqlitePreferenceStore};
