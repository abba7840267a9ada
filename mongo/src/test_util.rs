use std::{env::var, future::Future, sync::Arc};

use log::warn;
use mongodm::bson::oid::ObjectId;

use crate::context::{Context, MongodmContext};
use crate::utils::result::Result;

/// Runs `f` against a scratch database, dropped afterwards.
///
/// Needs `MONGO_TEST_URI` and `MONGO_TEST_DATABASE`; without them the body
/// is skipped. Every call gets its own database named after
/// `MONGO_TEST_DATABASE` so parallel tests never see each other's data.
pub async fn with_mongo<Fut>(f: impl FnOnce(Arc<Context>) -> Fut) -> Result<()>
where
    Fut: Future<Output = Result<()>>,
{
    let (uri, database) = match (var("MONGO_TEST_URI"), var("MONGO_TEST_DATABASE")) {
        (Ok(uri), Ok(database)) => (uri, database),
        _ => {
            warn!("MONGO_TEST_URI or MONGO_TEST_DATABASE unset, skipping mongo test");
            return Ok(());
        }
    };
    let database = format!("{}_{}", database, ObjectId::new().to_hex());
    let ctx = Arc::new(Context::build(&uri, &database).await?);
    let result = f(Arc::clone(&ctx)).await;
    ctx.database().drop(None).await?;
    result
}

#[tokio::test]
async fn test_with_mongo() -> Result<()> {
    use mongodm::{bson::Document, doc};
    use pretty_assertions::assert_eq;

    let mut used = None;
    with_mongo(|ctx| {
        used = Some(ctx.database_name().to_owned());
        async move {
            assert!(ctx.database_name().starts_with(&var("MONGO_TEST_DATABASE")?));
            let coll = ctx.database().collection::<Document>("produce");
            let docs = vec![
                doc! { "name": "tomatoes", "seller": "green acres" },
                doc! { "name": "basil", "seller": "green acres" },
                doc! { "name": "sourdough", "seller": "corner bakery" },
            ];
            coll.insert_many(docs, None).await?;
            let count = coll.count_documents(None, None).await?;
            assert_eq!(3, count);
            Ok(())
        }
    })
    .await?;

    if let Some(name) = used {
        let ctx = Context::build(&var("MONGO_TEST_URI")?, &name).await?;
        let names = ctx.database_names().await?;
        assert!(!names.contains(&name));
    }
    Ok(())
}
