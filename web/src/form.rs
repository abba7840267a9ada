use actix_multipart::{Field, Multipart, MultipartError};
use futures::TryStreamExt;

use crate::{
    image::{ImageStorage, StagedUpload},
    result::{Error, Result},
};

const MAX_TEXT_FIELD: usize = 16 * 1024;

/// The fields of a `POST /api/users` form, as sent.
#[derive(Debug, Default)]
pub struct UserForm {
    pub name: Option<String>,
    pub age: Option<String>,
    pub image: Option<StagedUpload>,
}

fn malformed(err: MultipartError) -> Error {
    Error::upload(format!("malformed multipart payload: {}", err))
}

impl UserForm {
    /// Reads the whole payload, staging the `image` part on disk. On error
    /// nothing is left staged.
    pub async fn read(mut payload: Multipart, storage: &ImageStorage) -> Result<Self> {
        let mut form = UserForm::default();
        match form.read_fields(&mut payload, storage).await {
            Ok(()) => Ok(form),
            Err(err) => {
                if let Some(staged) = form.image.take() {
                    storage.discard_staged(staged).await;
                }
                Err(err)
            }
        }
    }

    async fn read_fields(&mut self, payload: &mut Multipart, storage: &ImageStorage) -> Result<()> {
        while let Some(mut field) = payload.try_next().await.map_err(malformed)? {
            let disposition = field.content_disposition();
            let name = disposition.get_name().unwrap_or_default().to_owned();
            let file_name = disposition.get_filename().map(str::to_owned);
            let content_type = field.content_type().map(|mime| mime.to_string());

            match name.as_str() {
                "image" if self.image.is_none() => {
                    let staged = stage_field(&mut field, storage, file_name, content_type).await?;
                    self.image = Some(staged);
                }
                "name" => self.name = Some(read_text(&mut field, "name").await?),
                "age" => self.age = Some(read_text(&mut field, "age").await?),
                _ => while field.try_next().await.map_err(malformed)?.is_some() {},
            }
        }
        Ok(())
    }
}

async fn stage_field(
    field: &mut Field,
    storage: &ImageStorage,
    file_name: Option<String>,
    content_type: Option<String>,
) -> Result<StagedUpload> {
    let mut staging = storage.stage().await?;
    loop {
        let written = match field.try_next().await {
            Ok(Some(chunk)) => staging.write(&chunk).await,
            Ok(None) => break,
            Err(err) => Err(malformed(err)),
        };
        if let Err(err) = written {
            staging.abandon().await;
            return Err(err);
        }
    }
    staging.finish(file_name, content_type).await
}

async fn read_text(field: &mut Field, name: &str) -> Result<String> {
    let mut buf = Vec::new();
    while let Some(chunk) = field.try_next().await.map_err(malformed)? {
        if buf.len() + chunk.len() > MAX_TEXT_FIELD {
            return Err(Error::upload(format!("field {} is too long", name)));
        }
        buf.extend_from_slice(&chunk);
    }
    String::from_utf8(buf).map_err(|_| Error::upload(format!("field {} is not UTF-8", name)))
}
