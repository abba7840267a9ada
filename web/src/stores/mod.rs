mod repository;
mod unavailable;
mod user;

pub use repository::{MigrationPatch, MongoUserStore, UserStore};
pub use unavailable::UnavailableStore;
pub use user::{ImageRecord, StorageType, User, UserCfg, SCHEMA_VERSION};
