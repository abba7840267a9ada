use std::{fmt, marker::PhantomData};

use futures::TryStreamExt;
use mongodm::{
    bson::{from_document, oid::ObjectId, to_document, Bson, Document},
    doc,
    mongo::{options::FindOptions, Collection},
    CollectionConfig, Model,
};

use crate::{
    context::MongodmContext,
    utils::{
        result::{Result, StdResult},
        simple_error,
    },
};

pub type Id = ObjectId;

/// A model paired with the `_id` of the document it was read from.
#[derive(Clone, Debug, PartialEq)]
pub struct WithId<M>(pub Id, pub M);

/// A stored document that does not read as its model.
#[derive(Clone, Debug, PartialEq)]
pub struct Undecodable {
    pub id: Option<Id>,
    pub reason: String,
}

impl fmt::Display for Undecodable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "document {}: {}", id, self.reason),
            None => write!(f, "document without ObjectId: {}", self.reason),
        }
    }
}

impl std::error::Error for Undecodable {}

/// One entry of a [`RepositoryWithId::find`] result.
pub type Decoded<M> = StdResult<WithId<M>, Undecodable>;

/// Typed access to the collection of `M`, keeping `_id` next to the model.
///
/// Models never carry their own `_id`; reads split it off the raw document
/// and writes let the server assign it.
pub struct RepositoryWithId<M>
where
    M: Model,
{
    coll: Collection<Document>,
    _pd: PhantomData<fn() -> M>,
}

impl<M> Clone for RepositoryWithId<M>
where
    M: Model,
{
    fn clone(&self) -> Self {
        Self {
            coll: self.coll.clone(),
            _pd: PhantomData,
        }
    }
}

impl<M> RepositoryWithId<M>
where
    M: Model,
{
    pub fn new(ctx: &impl MongodmContext) -> Self {
        let name = <M::CollConf as CollectionConfig>::collection_name();
        Self {
            coll: ctx.database().collection::<Document>(name),
            _pd: PhantomData,
        }
    }

    pub async fn create(&self, model: &M) -> Result<Id> {
        let doc = to_document(model)?;
        Self::oid(self.coll.insert_one(doc, None).await?.inserted_id)
    }

    /// `$set`s the given fields. Returns whether a document matched.
    pub async fn update_fields(&self, id: &Id, fields: Document) -> Result<bool> {
        let result = self
            .coll
            .update_one(doc! { "_id": *id }, doc! { "$set": fields }, None)
            .await?;
        Ok(result.matched_count == 1)
    }

    /// Returns whether a document was deleted.
    pub async fn delete(&self, id: &Id) -> Result<bool> {
        let result = self.coll.delete_one(doc! { "_id": *id }, None).await?;
        Ok(result.deleted_count == 1)
    }

    pub async fn find_one(&self, query: Document) -> Result<Option<WithId<M>>> {
        match self.coll.find_one(query, None).await? {
            Some(doc) => Ok(Some(Self::split_id(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn find_one_by_id(&self, id: &Id) -> Result<Option<WithId<M>>> {
        self.find_one(doc! { "_id": *id }).await
    }

    /// Decodes every matching document on its own, so one malformed
    /// document does not hide the others. Only query and cursor failures
    /// fail the call.
    pub async fn find(
        &self,
        query: Document,
        option: impl Into<Option<FindOptions>>,
    ) -> Result<Vec<Decoded<M>>> {
        let mut cursor = self.coll.find(query, option).await?;
        let mut items = Vec::new();
        while let Some(doc) = cursor.try_next().await? {
            items.push(Self::split_id(doc));
        }
        Ok(items)
    }

    pub async fn count(&self, query: Document) -> Result<u64> {
        Ok(self.coll.count_documents(query, None).await?)
    }

    pub(crate) fn oid(bson: Bson) -> Result<Id> {
        match bson {
            Bson::ObjectId(oid) => Ok(oid),
            _ => Err(simple_error!("value is not ObjectId")),
        }
    }

    fn split_id(mut doc: Document) -> Decoded<M> {
        let id = match doc.remove("_id") {
            Some(Bson::ObjectId(id)) => id,
            Some(other) => {
                return Err(Undecodable {
                    id: None,
                    reason: format!("_id {} is not an ObjectId", other),
                })
            }
            None => {
                return Err(Undecodable {
                    id: None,
                    reason: String::from("no _id"),
                })
            }
        };
        from_document(doc)
            .map(|model| WithId(id, model))
            .map_err(|e| Undecodable {
                id: Some(id),
                reason: e.to_string(),
            })
    }
}
