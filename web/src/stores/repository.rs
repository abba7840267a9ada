use async_trait::async_trait;
use log::warn;
use mongodm::{doc, mongo::options::FindOptions};

use super::user::{StorageType, User};
use crate::{
    mongo::{
        bson::Document,
        context::MongodmContext,
        withid::{Decoded, Id, RepositoryWithId, WithId},
    },
    result::Result,
};

/// Fields written when a legacy user is brought to a newer schema version.
#[derive(Clone, Debug, PartialEq)]
pub struct MigrationPatch {
    pub storage_type: Option<StorageType>,
    pub file_path: Option<String>,
    pub schema_version: u32,
}

impl MigrationPatch {
    pub fn stamp(schema_version: u32) -> Self {
        Self {
            storage_type: None,
            file_path: None,
            schema_version,
        }
    }

    fn to_set_document(&self) -> Document {
        let mut set = doc! { "schemaVersion": i64::from(self.schema_version) };
        if let Some(storage_type) = self.storage_type {
            set.insert("image.storageType", storage_type.as_str());
        }
        if let Some(file_path) = &self.file_path {
            set.insert("image.filePath", file_path.as_str());
        }
        set
    }

    #[cfg(test)]
    pub(crate) fn apply(&self, user: &mut User) {
        if let Some(image) = user.image.as_mut() {
            if let Some(storage_type) = self.storage_type {
                image.storage_type = Some(storage_type);
            }
            if let Some(file_path) = &self.file_path {
                image.file_path = Some(file_path.clone());
            }
        }
        user.schema_version = Some(self.schema_version);
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: &User) -> Result<Id>;

    async fn find_by_id(&self, id: &Id) -> Result<Option<WithId<User>>>;

    /// All readable users, with `image.data` left out. Documents that do
    /// not decode are skipped.
    async fn list(&self) -> Result<Vec<WithId<User>>>;

    async fn delete(&self, id: &Id) -> Result<bool>;

    /// Users whose schema version is absent or lower than `version`, each
    /// decoded on its own.
    async fn find_outdated(&self, version: u32) -> Result<Vec<Decoded<User>>>;

    async fn apply_migration(&self, id: &Id, patch: &MigrationPatch) -> Result<bool>;
}

#[derive(Clone)]
pub struct MongoUserStore {
    repo: RepositoryWithId<User>,
}

impl MongoUserStore {
    pub fn new(ctx: &impl MongodmContext) -> Self {
        Self {
            repo: RepositoryWithId::new(ctx),
        }
    }
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn insert(&self, user: &User) -> Result<Id> {
        Ok(self.repo.create(user).await?)
    }

    async fn find_by_id(&self, id: &Id) -> Result<Option<WithId<User>>> {
        Ok(self.repo.find_one_by_id(id).await?)
    }

    async fn list(&self) -> Result<Vec<WithId<User>>> {
        let option = FindOptions::builder()
            .projection(doc! { "image.data": 0 })
            .build();
        let users = self
            .repo
            .find(doc! {}, option)
            .await?
            .into_iter()
            .filter_map(|user| match user {
                Ok(user) => Some(user),
                Err(err) => {
                    warn!("skipping unreadable user: {}", err);
                    None
                }
            })
            .collect();
        Ok(users)
    }

    async fn delete(&self, id: &Id) -> Result<bool> {
        Ok(self.repo.delete(id).await?)
    }

    async fn find_outdated(&self, version: u32) -> Result<Vec<Decoded<User>>> {
        let query = doc! {
            "$or": [
                { "schemaVersion": null },
                { "schemaVersion": { "$lt": i64::from(version) } },
            ]
        };
        Ok(self.repo.find(query, None).await?)
    }

    async fn apply_migration(&self, id: &Id, patch: &MigrationPatch) -> Result<bool> {
        Ok(self
            .repo
            .update_fields(id, patch.to_set_document())
            .await?)
    }
}
