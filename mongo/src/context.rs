use log::info;
use mongodm::{
    doc,
    mongo::{options::ClientOptions, Client, Database},
};

use crate::utils::{config::Config, result::Result};

pub trait MongodmContext
where
    Self: Clone,
{
    fn database(&self) -> Database;
}

/// Owned handle on one MongoDB database.
///
/// Built once at startup with [`Context::connect`] and handed to whatever
/// needs it; [`Context::close`] tears the client down at shutdown.
#[derive(Clone)]
pub struct Context {
    client: Client,
    database_name: String,
}

impl Context {
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::build(&config.db_uri, &config.db_database).await
    }

    pub async fn build(uri: &str, database_name: &str) -> Result<Self> {
        let mut option = ClientOptions::parse(uri).await?;
        option.app_name = Some(String::from("fresh-connect"));
        let client = Client::with_options(option)?;
        Ok(Context {
            client,
            database_name: String::from(database_name),
        })
    }

    /// Round-trips to the server. The driver connects lazily, so this is
    /// the only way to learn at startup whether the database is reachable.
    pub async fn ping(&self) -> Result<()> {
        self.database()
            .run_command(doc! { "ping": 1 }, None)
            .await?;
        Ok(())
    }

    pub async fn close(self) {
        info!(target: "fresh_connect", "closing database client");
        self.client.shutdown().await
    }

    #[inline]
    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    #[cfg(test)]
    pub(crate) async fn database_names(&self) -> Result<Vec<String>> {
        Ok(self.client.list_database_names(None, None).await?)
    }
}

impl MongodmContext for Context {
    #[inline]
    fn database(&self) -> Database {
        self.client.database(&self.database_name)
    }
}
