use std::{io::ErrorKind, path::Path};

use log::debug;
use tokio::fs;

use super::content_type_or_default;
use crate::{
    mongo::withid::Id,
    result::{Error, Result},
    stores::{ImageRecord, StorageType, UserStore},
};

/// The image bytes, still on disk or already in memory.
#[derive(Debug)]
pub enum ImageBody {
    /// Opened and ready to be streamed.
    File(fs::File),
    Bytes(Vec<u8>),
}

#[derive(Debug)]
pub struct ImageContent {
    pub body: ImageBody,
    pub content_type: String,
}

impl ImageContent {
    /// Where the bytes were actually found, which may differ from the
    /// record's `storageType`.
    pub fn source(&self) -> StorageType {
        match self.body {
            ImageBody::File(_) => StorageType::Filesystem,
            ImageBody::Bytes(_) => StorageType::Database,
        }
    }
}

/// Loads the image of user `id`.
///
/// A file at `filePath` wins over in-record `data` whatever `storageType`
/// says, so records left half-migrated or files moved into place by hand
/// are still served.
pub async fn retrieve(store: &dyn UserStore, id: &str) -> Result<ImageContent> {
    let oid = Id::parse_str(id).map_err(|_| Error::not_found(format!("no user with id {}", id)))?;
    let user = store
        .find_by_id(&oid)
        .await?
        .ok_or_else(|| Error::not_found(format!("no user with id {}", id)))?;
    let image = user
        .1
        .image
        .ok_or_else(|| Error::not_found(format!("user {} has no image", id)))?;
    let content = resolve(image)
        .await?
        .ok_or_else(|| Error::not_found(format!("image of user {} is not stored anywhere", id)))?;
    debug!(
        "serving image of user {} from {}",
        id,
        content.source().as_str()
    );
    Ok(content)
}

/// Applies the fallback order to a single record: file, then data, then
/// nothing.
pub async fn resolve(image: ImageRecord) -> Result<Option<ImageContent>> {
    let content_type = content_type_or_default(image.content_type.as_deref());
    if let Some(path) = image.file_path.as_deref() {
        if let Some(file) = open_if_present(Path::new(path)).await? {
            return Ok(Some(ImageContent {
                body: ImageBody::File(file),
                content_type,
            }));
        }
    }
    Ok(image.data.map(|data| ImageContent {
        body: ImageBody::Bytes(data.bytes),
        content_type,
    }))
}

async fn open_if_present(path: &Path) -> Result<Option<fs::File>> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Ok(None),
        Err(e) => {
            debug!("{} is not readable as a file: {}", path.display(), e);
            return Ok(None);
        }
    }
    match fs::File::open(path).await {
        Ok(file) => Ok(Some(file)),
        // removed between the check and the read
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::storage(path, e)),
    }
}
