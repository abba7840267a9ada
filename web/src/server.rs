use std::{
    io::{Error as IoError, ErrorKind},
    sync::Arc,
};

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use log::{error, info, warn};

use crate::{
    app_data::AppData,
    controller,
    image::{migrate, ImageStorage},
    mongo::context::Context,
    result::Error,
    stores::{MongoUserStore, UnavailableStore, UserStore},
    utils::config::Config,
};

fn io_error<E>(err: E) -> IoError
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    IoError::new(ErrorKind::Other, err)
}

/// Connects to the database and runs the migration pass.
///
/// An unreachable database is not fatal: the server starts anyway and data
/// requests fail until it is back. When the client cannot be built at all
/// (bad URI, SRV lookup failure) there is no context and every store call
/// fails with a connection error.
async fn open_store(config: &Config) -> (Arc<dyn UserStore>, Option<Context>) {
    let context = match Context::connect(config).await {
        Ok(context) => context,
        Err(err) => {
            let store: Arc<dyn UserStore> = Arc::new(UnavailableStore::new(err.to_string()));
            error!("{}", Error::Connection(err));
            warn!("skipping migration pass");
            return (store, None);
        }
    };
    let store: Arc<dyn UserStore> = Arc::new(MongoUserStore::new(&context));

    match context.ping().await {
        Ok(()) => {
            info!("connected to database {}", context.database_name());
            if let Err(err) = migrate(store.as_ref()).await {
                error!("migration pass failed: {}", err);
            }
        }
        Err(err) => {
            error!("{}", Error::Connection(err));
            warn!("skipping migration pass");
        }
    }
    (store, Some(context))
}

pub async fn run() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(io_error)?;
    let storage = ImageStorage::from_config(&config);
    storage.prepare().await.map_err(io_error)?;
    info!(
        "uploads in {}, images over {} bytes go to the filesystem",
        storage.uploads_dir().display(),
        storage.threshold()
    );

    let (store, context) = open_store(&config).await;

    let data = web::Data::new(AppData::new(store, storage));
    info!("listening on {}", config.bind_name());
    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .wrap(middleware::Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "DELETE"])
                    .allow_any_header()
                    .max_age(3600),
            )
            .configure(controller::route)
    })
    .bind(config.bind_name())?
    .run()
    .await?;

    if let Some(context) = context {
        context.close().await;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use actix_web::{http::StatusCode, test};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::test_util::MultipartBody;

    fn config(db_uri: &str) -> Config {
        Config::from_pairs(vec![(
            String::from("FRESH_CONNECT_DB_URI"),
            String::from(db_uri),
        )])
        .unwrap()
    }

    #[actix_web::test]
    async fn test_unbuildable_client_keeps_serving() {
        let (store, context) = open_store(&config("not-a-mongodb-uri")).await;
        assert!(context.is_none());
        match store.list().await {
            Err(Error::Connection(_)) => {}
            other => panic!("unexpected {:?}", other),
        }

        let dir = tempfile::tempdir().unwrap();
        let data = web::Data::new(AppData::new(store, ImageStorage::new(dir.path(), 8, 1024)));
        let app = test::init_service(App::new().app_data(data).configure(controller::route)).await;

        let req = test::TestRequest::get().uri("/api/test").to_request();
        assert_eq!(StatusCode::OK, test::call_service(&app, req).await.status());

        let req = test::TestRequest::get().uri("/api/users").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, resp.status());

        let (content_type, payload) = MultipartBody::new()
            .text("name", "Ines")
            .text("age", "44")
            .file("image", "big.png", "image/png", &[4u8; 64])
            .finish();
        let req = test::TestRequest::post()
            .uri("/api/users")
            .insert_header(("content-type", content_type))
            .set_payload(payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, resp.status());
        assert_eq!(0, std::fs::read_dir(dir.path()).unwrap().count());
    }
}
