use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use chrono::Utc;
use log::{info, warn};
use tokio::{fs, io::AsyncWriteExt};

use super::content_type_or_default;
use crate::{
    mongo::bson::oid::ObjectId,
    result::{Error, Result},
    stores::{ImageRecord, StorageType},
    utils::config::Config,
};

/// `size > threshold` goes to the filesystem; a file of exactly
/// `threshold` bytes still fits in the record.
pub fn classify(size: u64, threshold: u64) -> StorageType {
    if size > threshold {
        StorageType::Filesystem
    } else {
        StorageType::Database
    }
}

/// An upload streamed to a staging file inside the uploads directory.
#[derive(Debug)]
pub struct StagedUpload {
    path: PathBuf,
    size: u64,
    file_name: Option<String>,
    content_type: Option<String>,
}

impl StagedUpload {
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }
}

/// Write side of a staging file. Either [`finish`](Self::finish) it or
/// [`abandon`](Self::abandon) it; both consume the writer.
pub struct StagingFile {
    path: PathBuf,
    file: fs::File,
    size: u64,
    limit: u64,
}

impl StagingFile {
    pub async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        self.size += chunk.len() as u64;
        if self.size > self.limit {
            return Err(Error::upload(format!(
                "image exceeds the upload limit of {} bytes",
                self.limit
            )));
        }
        self.file
            .write_all(chunk)
            .await
            .map_err(|e| Error::storage(&self.path, e))
    }

    /// Flushes and fsyncs the staged bytes.
    pub async fn finish(
        mut self,
        file_name: Option<String>,
        content_type: Option<String>,
    ) -> Result<StagedUpload> {
        let synced = match self.file.flush().await {
            Ok(()) => self.file.sync_all().await,
            Err(e) => Err(e),
        };
        if let Err(e) = synced {
            let err = Error::storage(&self.path, e);
            self.abandon().await;
            return Err(err);
        }
        Ok(StagedUpload {
            path: self.path,
            size: self.size,
            file_name,
            content_type,
        })
    }

    pub async fn abandon(self) {
        drop(self.file);
        remove_quietly(&self.path).await;
    }
}

/// Decides where uploaded images live and puts them there.
#[derive(Clone, Debug)]
pub struct ImageStorage {
    uploads_dir: PathBuf,
    threshold: u64,
    max_upload: u64,
}

impl ImageStorage {
    pub fn new(uploads_dir: impl Into<PathBuf>, threshold: u64, max_upload: u64) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
            threshold,
            max_upload,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.uploads_dir.clone(),
            config.storage_threshold,
            config.max_upload_bytes,
        )
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Creates the uploads directory if it is missing.
    pub async fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.uploads_dir)
            .await
            .map_err(|e| Error::storage(&self.uploads_dir, e))
    }

    pub async fn stage(&self) -> Result<StagingFile> {
        let path = self
            .uploads_dir
            .join(format!(".staging-{}.part", ObjectId::new().to_hex()));
        let file = fs::File::create(&path)
            .await
            .map_err(|e| Error::storage(&path, e))?;
        Ok(StagingFile {
            path,
            file,
            size: 0,
            limit: self.max_upload,
        })
    }

    /// Turns a staged upload into the image record to save with the user.
    ///
    /// Large uploads are published under their final name and only the path
    /// is recorded. Small ones are read into the record and the staging file
    /// is removed, whether or not the read succeeded.
    pub async fn store(&self, upload: Option<StagedUpload>) -> Result<ImageRecord> {
        let upload = upload.ok_or_else(|| Error::upload("no image file uploaded"))?;
        let content_type = content_type_or_default(upload.content_type());

        match classify(upload.size, self.threshold) {
            StorageType::Filesystem => {
                let target = self.published_path(upload.file_name());
                if let Err(e) = fs::rename(&upload.path, &target).await {
                    remove_quietly(&upload.path).await;
                    return Err(Error::storage(&target, e));
                }
                info!(
                    "stored {} byte image on filesystem at {}",
                    upload.size,
                    target.display()
                );
                Ok(ImageRecord::on_filesystem(
                    content_type,
                    target.to_string_lossy().into_owned(),
                ))
            }
            StorageType::Database => {
                let read = fs::read(&upload.path).await;
                let removed = fs::remove_file(&upload.path).await;
                let bytes = read.map_err(|e| Error::storage(&upload.path, e))?;
                removed.map_err(|e| Error::storage(&upload.path, e))?;
                info!("stored {} byte image in database record", bytes.len());
                Ok(ImageRecord::in_database(content_type, bytes))
            }
        }
    }

    /// Removes the file at `filePath`. Used to undo a store whose record
    /// never made it into the database, and on deletion.
    ///
    /// Retrieval serves that file whatever `storageType` says, so it goes
    /// for legacy `database` records too, as long as it lies inside the
    /// uploads directory.
    pub async fn discard(&self, record: &ImageRecord) {
        let path = match record.file_path.as_deref() {
            Some(path) if !path.is_empty() => Path::new(path),
            _ => return,
        };
        let filesystem = record.storage_type == Some(StorageType::Filesystem);
        if filesystem || path.starts_with(&self.uploads_dir) {
            remove_quietly(path).await;
        } else {
            warn!(
                "leaving {} in place, it is outside {}",
                path.display(),
                self.uploads_dir.display()
            );
        }
    }

    pub async fn discard_staged(&self, upload: StagedUpload) {
        remove_quietly(&upload.path).await;
    }

    fn published_path(&self, file_name: Option<&str>) -> PathBuf {
        let ext = file_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| ext.len() <= 10 && ext.bytes().all(|b| b.is_ascii_alphanumeric()))
            .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
            .unwrap_or_default();
        self.uploads_dir.join(format!(
            "{}-{}{}",
            Utc::now().timestamp_millis(),
            ObjectId::new().to_hex(),
            ext
        ))
    }
}

async fn remove_quietly(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("could not remove {}: {}", path.display(), e),
    }
}
