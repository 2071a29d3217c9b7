//! Qdrant vector database integration

use super::{check_dimensions, ChunkPayload, ChunkPoint, SearchFilter, SearchResult, VectorStore};
use crate::config::Config;
use crate::error::{Error, Result};
use async_trait::async_trait;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
    GetCollectionInfoResponse, PointId, PointStruct, SearchPointsBuilder, UpsertPointsBuilder,
    VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

/// Qdrant store handle
pub struct QdrantStore {
    client: Qdrant,
    collection: String,
    dimension: usize,
}

impl QdrantStore {
    /// Connect to Qdrant using config
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::new(
            &config.vector.qdrant_url,
            config.qdrant_api_key(),
            &config.vector.collection_name,
            config.embedding.dimension,
        )
        .await
    }

    /// Create a new store connection directly with URL and collection name
    pub async fn new(
        url: &str,
        api_key: Option<String>,
        collection: &str,
        dimension: usize,
    ) -> Result<Self> {
        debug!("Connecting to Qdrant at {}", url);

        let mut builder = Qdrant::from_url(url).skip_compatibility_check();
        if let Some(key) = api_key {
            builder = builder.api_key(key);
        }
        let client = builder.build().map_err(|e| Error::Qdrant(e.to_string()))?;

        Ok(Self {
            client,
            collection: collection.to_string(),
            dimension,
        })
    }

    async fn collection_vector_size(&self) -> Result<Option<u64>> {
        let info = self.client.collection_info(&self.collection).await?;
        Ok(extract_vector_size(&info))
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(&self) -> Result<()> {
        let exists = self.client.collection_exists(&self.collection).await?;

        if exists {
            debug!("Collection {} already exists", self.collection);

            if let Some(size) = self.collection_vector_size().await? {
                if size as usize != self.dimension {
                    return Err(Error::Qdrant(format!(
                        "Collection '{}' has vector size {}, but embedding.dimension is {}. Remediation: set a new collection name or re-embed with the expected dimension.",
                        self.collection, size, self.dimension
                    )));
                }
            }

            return Ok(());
        }

        info!(
            "Creating collection {} with dimension {}",
            self.collection, self.dimension
        );

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(self.dimension as u64, Distance::Cosine)),
            )
            .await?;

        info!("Collection {} created successfully", self.collection);
        Ok(())
    }

    async fn upsert_points(&self, points: Vec<ChunkPoint>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        check_dimensions(&points, self.dimension, &self.collection)?;

        debug!(
            "Upserting {} points to collection {}",
            points.len(),
            self.collection
        );

        let point_structs: Vec<PointStruct> =
            points.into_iter().map(|p| p.to_point_struct()).collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, point_structs).wait(true))
            .await?;

        Ok(())
    }

    async fn delete_points(&self, point_ids: &[Uuid]) -> Result<()> {
        if point_ids.is_empty() {
            return Ok(());
        }

        debug!(
            "Deleting {} points from collection {}",
            point_ids.len(),
            self.collection
        );

        let ids: Vec<PointId> = point_ids
            .iter()
            .map(|id| PointId::from(id.to_string()))
            .collect();

        self.client
            .delete_points(DeletePointsBuilder::new(&self.collection).points(ids).wait(true))
            .await?;

        Ok(())
    }

    async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: usize,
        filter: Option<SearchFilter>,
    ) -> Result<Vec<SearchResult>> {
        debug!(
            "Searching collection {} with limit {}",
            self.collection, limit
        );

        let mut search_builder =
            SearchPointsBuilder::new(&self.collection, query_vector, limit as u64)
                .with_payload(true);

        if let Some(qdrant_filter) = filter.as_ref().and_then(to_qdrant_filter) {
            search_builder = search_builder.filter(qdrant_filter);
        }

        let response = self.client.search_points(search_builder).await?;

        let results = response
            .result
            .into_iter()
            .map(|p| {
                let payload: ChunkPayload = p
                    .payload
                    .into_iter()
                    .map(|(k, v)| (k, json_from_qdrant_value(v)))
                    .collect::<serde_json::Map<String, Value>>()
                    .into();

                SearchResult {
                    id: point_id_to_string(p.id),
                    score: p.score,
                    payload,
                }
            })
            .collect();

        Ok(results)
    }

    async fn count(&self) -> Result<usize> {
        if !self.client.collection_exists(&self.collection).await? {
            return Ok(0);
        }
        let info = self.client.collection_info(&self.collection).await?;
        let points_count = info
            .result
            .and_then(|r| r.points_count)
            .unwrap_or(0);
        Ok(points_count as usize)
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}

fn to_qdrant_filter(filter: &SearchFilter) -> Option<Filter> {
    let mut must_conditions: Vec<Condition> = Vec::new();

    if let Some(ref document_ids) = filter.document_ids {
        must_conditions.push(Condition::matches("document_id", document_ids.clone()));
    }

    if must_conditions.is_empty() {
        return None;
    }

    Some(Filter {
        must: must_conditions,
        should: vec![],
        must_not: vec![],
        min_should: None,
    })
}

fn extract_vector_size(info: &GetCollectionInfoResponse) -> Option<u64> {
    let result = info.result.as_ref()?;
    let config = result.config.as_ref()?;
    let params = config.params.as_ref()?;
    let vectors_config = params.vectors_config.as_ref()?;

    match vectors_config.config.as_ref()? {
        qdrant_client::qdrant::vectors_config::Config::Params(params) => Some(params.size),
        qdrant_client::qdrant::vectors_config::Config::ParamsMap(_) => None,
    }
}

/// Convert PointId to string
fn point_id_to_string(id: Option<PointId>) -> String {
    match id {
        Some(PointId {
            point_id_options: Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(uuid)),
        }) => uuid,
        Some(PointId {
            point_id_options: Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(num)),
        }) => num.to_string(),
        _ => String::new(),
    }
}

/// Convert Qdrant value to serde_json Value
fn json_from_qdrant_value(v: qdrant_client::qdrant::Value) -> Value {
    use qdrant_client::qdrant::value::Kind;

    match v.kind {
        Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::IntegerValue(i)) => Value::Number(i.into()),
        Some(Kind::DoubleValue(d)) => serde_json::Number::from_f64(d)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::ListValue(list)) => Value::Array(
            list.values
                .into_iter()
                .map(json_from_qdrant_value)
                .collect(),
        ),
        Some(Kind::StructValue(s)) => Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, json_from_qdrant_value(v)))
                .collect(),
        ),
        None => Value::Null,
    }
}
