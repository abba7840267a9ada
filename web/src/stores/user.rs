use mongodm::{CollectionConfig, Indexes, Model};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    mongo::bson::{spec::BinarySubtype, Binary, Bson},
    utils::result::StdResult,
};

/// Version written by this service. Records without `schemaVersion` are 1.
pub const SCHEMA_VERSION: u32 = 2;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Database,
    Filesystem,
}

impl StorageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageType::Database => "database",
            StorageType::Filesystem => "filesystem",
        }
    }
}

/// The `image` sub-document of a user.
///
/// `data` holds the bytes of `database` images and `file_path` the location
/// of `filesystem` ones. Older records may carry both, neither, or only the
/// pre-rename `imagePath` field.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<StorageType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Binary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(
        rename = "imagePath",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub legacy_path: Option<String>,
}

impl ImageRecord {
    pub fn in_database(content_type: String, bytes: Vec<u8>) -> Self {
        Self {
            content_type: Some(content_type),
            storage_type: Some(StorageType::Database),
            data: Some(Binary {
                subtype: BinarySubtype::Generic,
                bytes,
            }),
            ..Default::default()
        }
    }

    pub fn on_filesystem(content_type: String, file_path: String) -> Self {
        Self {
            content_type: Some(content_type),
            storage_type: Some(StorageType::Filesystem),
            file_path: Some(file_path),
            ..Default::default()
        }
    }

    pub fn data_bytes(&self) -> Option<&[u8]> {
        self.data.as_ref().map(|bin| bin.bytes.as_slice())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, deserialize_with = "lenient_name")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_age")]
    pub age: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<u32>,
}

impl User {
    pub fn new(name: String, age: u32, image: ImageRecord) -> Self {
        Self {
            name,
            age,
            image: Some(image),
            schema_version: Some(SCHEMA_VERSION),
        }
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version.unwrap_or(1)
    }

    pub fn storage_type(&self) -> Option<StorageType> {
        self.image.as_ref().and_then(|image| image.storage_type)
    }
}

// Older clients wrote `null` names and numeric names, and ages as doubles or
// strings.
fn lenient_name<'de, D>(deserializer: D) -> StdResult<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Bson::deserialize(deserializer)? {
        Bson::String(name) => name,
        Bson::Null | Bson::Undefined => String::new(),
        other => other.to_string(),
    })
}

fn lenient_age<'de, D>(deserializer: D) -> StdResult<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let age = match Bson::deserialize(deserializer)? {
        Bson::Int32(age) => f64::from(age),
        Bson::Int64(age) => age as f64,
        Bson::Double(age) => age,
        Bson::String(age) => age.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    };
    if age.is_finite() && age > 0.0 {
        Ok(age.min(f64::from(u32::MAX)) as u32)
    } else {
        Ok(0)
    }
}

pub struct UserCfg {}

impl CollectionConfig for UserCfg {
    fn collection_name() -> &'static str {
        "users"
    }

    fn indexes() -> Indexes {
        Indexes::new()
    }
}

impl Model for User {
    type CollConf = UserCfg;
}
