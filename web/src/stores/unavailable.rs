use async_trait::async_trait;

use super::{MigrationPatch, User, UserStore};
use crate::{
    mongo::withid::{Decoded, Id, WithId},
    result::{Error, Result},
    utils::simple_error,
};

/// Stands in for the database when the client could not even be built at
/// startup. Every call fails with [`Error::Connection`].
pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn fail<T>(&self) -> Result<T> {
        Err(Error::Connection(simple_error!("{}", (self.reason))))
    }
}

#[async_trait]
impl UserStore for UnavailableStore {
    async fn insert(&self, _: &User) -> Result<Id> {
        self.fail()
    }

    async fn find_by_id(&self, _: &Id) -> Result<Option<WithId<User>>> {
        self.fail()
    }

    async fn list(&self) -> Result<Vec<WithId<User>>> {
        self.fail()
    }

    async fn delete(&self, _: &Id) -> Result<bool> {
        self.fail()
    }

    async fn find_outdated(&self, _: u32) -> Result<Vec<Decoded<User>>> {
        self.fail()
    }

    async fn apply_migration(&self, _: &Id, _: &MigrationPatch) -> Result<bool> {
        self.fail()
    }
}
