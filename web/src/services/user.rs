use log::info;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    app_data::AppData,
    form::UserForm,
    mongo::withid::{Id, WithId},
    result::{Error, Result},
    stores::{StorageType, User},
};

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserOutput {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub age: u32,
    pub storage_type: Option<StorageType>,
}

impl From<WithId<User>> for UserOutput {
    fn from(WithId(id, user): WithId<User>) -> Self {
        Self {
            id: id.to_hex(),
            storage_type: user.storage_type(),
            name: user.name,
            age: user.age,
        }
    }
}

#[derive(Debug, Validate)]
struct NewUser {
    #[validate(length(min = 1, max = 100))]
    name: String,
    #[validate(range(max = 150))]
    age: u32,
}

impl NewUser {
    fn parse(name: Option<String>, age: Option<String>) -> Result<Self> {
        let (name, age) = match (name, age) {
            (Some(name), Some(age)) if !name.trim().is_empty() && !age.trim().is_empty() => {
                (name.trim().to_owned(), age)
            }
            _ => return Err(Error::upload("name and age are required")),
        };
        let age = age
            .trim()
            .parse::<u32>()
            .map_err(|_| Error::upload("age must be a non-negative whole number"))?;
        let user = NewUser { name, age };
        user.validate().map_err(|e| Error::upload(e.to_string()))?;
        Ok(user)
    }
}

fn parse_id(id: &str) -> Result<Id> {
    Id::parse_str(id).map_err(|_| Error::not_found(format!("no user with id {}", id)))
}

pub struct UserService;

impl UserService {
    /// Validates the form, stores the image, then saves the record. If the
    /// record cannot be saved the stored image file is removed again.
    pub async fn create(form: UserForm, data: &AppData) -> Result<UserOutput> {
        let UserForm { name, age, image } = form;
        let new_user = match NewUser::parse(name, age) {
            Ok(new_user) => new_user,
            Err(err) => {
                if let Some(staged) = image {
                    data.storage.discard_staged(staged).await;
                }
                return Err(err);
            }
        };

        let record = data.storage.store(image).await?;
        let user = User::new(new_user.name, new_user.age, record);
        match data.store.insert(&user).await {
            Ok(id) => {
                info!(
                    "created user {} with {} image",
                    id,
                    user.storage_type().map_or("no", |t| t.as_str())
                );
                Ok(WithId(id, user).into())
            }
            Err(err) => {
                if let Some(image) = &user.image {
                    data.storage.discard(image).await;
                }
                Err(err)
            }
        }
    }

    pub async fn find_many(data: &AppData) -> Result<Vec<UserOutput>> {
        Ok(data
            .store
            .list()
            .await?
            .into_iter()
            .map(UserOutput::from)
            .collect())
    }

    /// Removes the record first, then its image file.
    pub async fn delete(id: &str, data: &AppData) -> Result<()> {
        let oid = parse_id(id)?;
        let user = data
            .store
            .find_by_id(&oid)
            .await?
            .ok_or_else(|| Error::not_found(format!("no user with id {}", id)))?;
        if !data.store.delete(&oid).await? {
            return Err(Error::not_found(format!("no user with id {}", id)));
        }
        if let Some(image) = &user.1.image {
            data.storage.discard(image).await;
        }
        info!("deleted user {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;
    use crate::{
        image::ImageStorage,
        test_util::{stage_bytes, MemoryStore},
    };

    const THRESHOLD: u64 = 8;

    fn app(dir: &TempDir) -> (Arc<MemoryStore>, AppData) {
        let store = Arc::new(MemoryStore::default());
        let data = AppData::new(
            store.clone(),
            ImageStorage::new(dir.path(), THRESHOLD, 1024),
        );
        (store, data)
    }

    fn file_count(dir: &TempDir) -> usize {
        std::fs::read_dir(dir.path()).unwrap().count()
    }

    async fn form(data: &AppData, name: Option<&str>, age: Option<&str>, bytes: Option<&[u8]>) -> UserForm {
        let image = match bytes {
            Some(bytes) => {
                Some(stage_bytes(&data.storage, bytes, Some("pic.png"), Some("image/png")).await)
            }
            None => None,
        };
        UserForm {
            name: name.map(str::to_owned),
            age: age.map(str::to_owned),
            image,
        }
    }

    #[test]
    fn test_new_user_parse() {
        let user = NewUser::parse(Some(" Lena ".into()), Some("27".into())).unwrap();
        assert_eq!("Lena", user.name);
        assert_eq!(27, user.age);

        for (name, age) in [
            (None, Some("27")),
            (Some("Lena"), None),
            (Some("  "), Some("27")),
            (Some("Lena"), Some("-1")),
            (Some("Lena"), Some("twenty")),
            (Some("Lena"), Some("400")),
        ] {
            match NewUser::parse(name.map(str::to_owned), age.map(str::to_owned)) {
                Err(Error::Upload(_)) => {}
                other => panic!("{:?}/{:?}: unexpected {:?}", name, age, other),
            }
        }
    }

    #[tokio::test]
    async fn test_create_small_and_large() {
        let dir = tempfile::tempdir().unwrap();
        let (store, data) = app(&dir);

        let small = form(&data, Some("Small"), Some("20"), Some(&b"tiny"[..])).await;
        let out = UserService::create(small, &data).await.unwrap();
        assert_eq!(Some(StorageType::Database), out.storage_type);
        assert_eq!(0, file_count(&dir));

        let large = form(&data, Some("Large"), Some("21"), Some(&b"larger than eight"[..])).await;
        let out = UserService::create(large, &data).await.unwrap();
        assert_eq!(Some(StorageType::Filesystem), out.storage_type);
        assert_eq!(1, file_count(&dir));

        let saved = store.get(&Id::parse_str(&out.id).unwrap()).unwrap();
        assert_eq!("Large", saved.name);
        assert_eq!(Some(crate::stores::SCHEMA_VERSION), saved.schema_version);
    }

    #[tokio::test]
    async fn test_invalid_form_leaves_nothing_staged() {
        let dir = tempfile::tempdir().unwrap();
        let (store, data) = app(&dir);
        let invalid = form(&data, None, Some("20"), Some(&b"larger than eight"[..])).await;
        assert_eq!(1, file_count(&dir));

        match UserService::create(invalid, &data).await {
            Err(Error::Upload(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(0, file_count(&dir));
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_missing_image() {
        let dir = tempfile::tempdir().unwrap();
        let (store, data) = app(&dir);
        match UserService::create(form(&data, Some("A"), Some("1"), None).await, &data).await {
            Err(Error::Upload(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_failed_insert_removes_image_file() {
        let dir = tempfile::tempdir().unwrap();
        let (store, data) = app(&dir);
        store.fail_inserts();
        let large = form(&data, Some("Large"), Some("21"), Some(&b"larger than eight"[..])).await;

        match UserService::create(large, &data).await {
            Err(Error::Database(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(0, file_count(&dir));
    }

    #[tokio::test]
    async fn test_delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let (store, data) = app(&dir);
        let large = form(&data, Some("Large"), Some("21"), Some(&b"larger than eight"[..])).await;
        let out = UserService::create(large, &data).await.unwrap();
        assert_eq!(1, file_count(&dir));

        UserService::delete(&out.id, &data).await.unwrap();
        assert_eq!(0, file_count(&dir));
        assert!(store.snapshot().is_empty());

        match UserService::delete(&out.id, &data).await {
            Err(Error::NotFound(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_removes_file_of_legacy_database_record() {
        let dir = tempfile::tempdir().unwrap();
        let (store, data) = app(&dir);
        let path = dir.path().join("old.png");
        std::fs::write(&path, b"served from disk").unwrap();
        let mut image = crate::stores::ImageRecord::in_database("image/png".into(), vec![1]);
        image.file_path = Some(path.to_string_lossy().into_owned());
        let id = store.put(User::new("Old".into(), 70, image));

        UserService::delete(&id.to_hex(), &data).await.unwrap();
        assert_eq!(0, file_count(&dir));
    }

    #[tokio::test]
    async fn test_find_many() {
        let dir = tempfile::tempdir().unwrap();
        let (_, data) = app(&dir);
        for (name, bytes) in [("a", &b"1"[..]), ("b", &b"larger than eight"[..])] {
            let f = form(&data, Some(name), Some("30"), Some(bytes)).await;
            UserService::create(f, &data).await.unwrap();
        }
        let users = UserService::find_many(&data).await.unwrap();
        let names: Vec<_> = users.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(vec!["a", "b"], names);
    }
}
