use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;

use crate::{
    image::{ImageStorage, StagedUpload},
    mongo::withid::{Decoded, Id, Undecodable, WithId},
    result::Result,
    stores::{MigrationPatch, User, UserStore},
    utils::simple_error,
};

/// `UserStore` kept in a `Vec`, for tests that do not need MongoDB.
#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<Vec<WithId<User>>>,
    unreadable: Mutex<Vec<Undecodable>>,
    failing_migrations: Mutex<HashSet<Id>>,
    fail_inserts: AtomicBool,
}

impl MemoryStore {
    pub fn put(&self, user: User) -> Id {
        let id = Id::new();
        self.users.lock().unwrap().push(WithId(id, user));
        id
    }

    /// Adds a document that does not decode as a `User`.
    pub fn put_unreadable(&self, reason: &str) -> Id {
        let id = Id::new();
        self.unreadable.lock().unwrap().push(Undecodable {
            id: Some(id),
            reason: reason.to_owned(),
        });
        id
    }

    pub fn get(&self, id: &Id) -> Option<User> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|user| &user.0 == id)
            .map(|user| user.1.clone())
    }

    pub fn snapshot(&self) -> Vec<WithId<User>> {
        self.users.lock().unwrap().clone()
    }

    pub fn fail_inserts(&self) {
        self.fail_inserts.store(true, Ordering::SeqCst);
    }

    pub fn fail_migration_of(&self, id: Id) {
        self.failing_migrations.lock().unwrap().insert(id);
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert(&self, user: &User) -> Result<Id> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(simple_error!("insert refused").into());
        }
        Ok(self.put(user.clone()))
    }

    async fn find_by_id(&self, id: &Id) -> Result<Option<WithId<User>>> {
        Ok(self.get(id).map(|user| WithId(*id, user)))
    }

    async fn list(&self) -> Result<Vec<WithId<User>>> {
        let mut users = self.snapshot();
        for user in users.iter_mut() {
            if let Some(image) = user.1.image.as_mut() {
                image.data = None;
            }
        }
        Ok(users)
    }

    async fn delete(&self, id: &Id) -> Result<bool> {
        let mut users = self.users.lock().unwrap();
        let before = users.len();
        users.retain(|user| &user.0 != id);
        Ok(users.len() != before)
    }

    async fn find_outdated(&self, version: u32) -> Result<Vec<Decoded<User>>> {
        let unreadable = self.unreadable.lock().unwrap().clone();
        Ok(self
            .snapshot()
            .into_iter()
            .filter(|user| user.1.schema_version.map_or(true, |v| v < version))
            .map(Ok)
            .chain(unreadable.into_iter().map(Err))
            .collect())
    }

    async fn apply_migration(&self, id: &Id, patch: &MigrationPatch) -> Result<bool> {
        if self.failing_migrations.lock().unwrap().contains(id) {
            return Err(simple_error!("write conflict on {}", id).into());
        }
        let mut users = self.users.lock().unwrap();
        match users.iter_mut().find(|user| &user.0 == id) {
            Some(user) => {
                patch.apply(&mut user.1);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

pub async fn stage_bytes(
    storage: &ImageStorage,
    bytes: &[u8],
    file_name: Option<&str>,
    content_type: Option<&str>,
) -> StagedUpload {
    let mut staging = storage.stage().await.unwrap();
    staging.write(bytes).await.unwrap();
    staging
        .finish(file_name.map(str::to_owned), content_type.map(str::to_owned))
        .await
        .unwrap()
}

const BOUNDARY: &str = "----freshconnectboundary";

/// Hand-built `multipart/form-data` body.
#[derive(Default)]
pub struct MultipartBody {
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, name, file_name, content_type
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// `(content type header, body)`.
    pub fn finish(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        (
            format!("multipart/form-data; boundary={}", BOUNDARY),
            self.body,
        )
    }
}
