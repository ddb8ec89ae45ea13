//! Milvus vector store over the v2 REST API
//!
//! Request bodies and response parsing are plain `serde_json` and always
//! compiled. Only the HTTP transport needs the `milvus` cargo feature; without
//! it every call fails with a `Config` error naming the missing feature.
//!
//! Score mapping: Milvus reports COSINE and IP as similarities already, while
//! L2 comes back as a squared distance and is mapped to `1 / (1 + sqrt(d))`.

use std::time::Duration;

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use ragline_core::{
    CollectionInfo, CollectionSchema, DocId, RagError, RagResult, Record,
    RequestContext, RetrievalRequest, SearchHit, SimilarityMetric, StoreConfig,
    DEFAULT_MAX_TEXT_LENGTH,
};

use crate::backend::{CreateOutcome, VectorStore};
use crate::distance::l2_similarity;

/// Field Milvus adds to search results
const DISTANCE_FIELD: &str = "distance";

/// Milvus load state meaning "query-ready"
const LOAD_STATE_LOADED: &str = "LoadStateLoaded";

/// [`VectorStore`] backed by a Milvus server
#[derive(Debug, Clone)]
pub struct MilvusRestStore {
    base_url: String,
    token: Option<String>,
    timeout: Duration,
}

impl MilvusRestStore {
    /// Create a client for `address`, e.g. `http://127.0.0.1:19530`
    pub fn new(address: &str, token: Option<String>, timeout: Duration) -> Self {
        MilvusRestStore {
            base_url: address.trim_end_matches('/').to_string(),
            token,
            timeout,
        }
    }

    /// Create a client from the `[store]` config section
    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(
            &config.address,
            config.token.clone(),
            Duration::from_millis(config.timeout_ms),
        )
    }

    fn call(&self, ctx: &RequestContext, path: &str, body: &Value) -> RagResult<Value> {
        let timeout = ctx.clamp_timeout(self.timeout)?;
        let url = format!("{}/v2/vectordb/{}", self.base_url, path);

        let text = post_json(&url, self.token.as_deref(), timeout, body).map_err(|e| {
            warn!(target: "ragline::store", path, error = %e, "Milvus request failed");
            e
        })?;
        let response: Value = serde_json::from_str(&text).map_err(|e| {
            RagError::StoreUnavailable(format!("invalid JSON from Milvus ({}): {}", path, e))
        })?;
        check_code(&response)?;
        Ok(response.get("data").cloned().unwrap_or(Value::Null))
    }

    /// Like `call`, but maps Milvus' "collection not found" to `CollectionNotFound`
    fn call_on(
        &self,
        ctx: &RequestContext,
        path: &str,
        name: &str,
        body: &Value,
    ) -> RagResult<Value> {
        self.call(ctx, path, body).map_err(|e| match e {
            RagError::StoreUnavailable(msg) if is_not_found(&msg) => {
                RagError::CollectionNotFound {
                    name: name.to_string(),
                }
            }
            other => other,
        })
    }

    fn has_collection(&self, ctx: &RequestContext, name: &str) -> RagResult<bool> {
        let data = self.call(ctx, "collections/has", &json!({ "collectionName": name }))?;
        Ok(data.get("has").and_then(Value::as_bool).unwrap_or(false))
    }

    fn load_state(&self, ctx: &RequestContext, name: &str) -> RagResult<bool> {
        let data = self.call_on(
            ctx,
            "collections/get_load_state",
            name,
            &json!({ "collectionName": name }),
        )?;
        Ok(data.get("loadState").and_then(Value::as_str) == Some(LOAD_STATE_LOADED))
    }

    fn row_count(&self, ctx: &RequestContext, name: &str) -> RagResult<usize> {
        let data = self.call_on(
            ctx,
            "collections/get_stats",
            name,
            &json!({ "collectionName": name }),
        )?;
        Ok(data.get("rowCount").and_then(as_usize).unwrap_or(0))
    }

    fn describe_schema(&self, ctx: &RequestContext, name: &str) -> RagResult<CollectionSchema> {
        let data = self.call_on(
            ctx,
            "collections/describe",
            name,
            &json!({ "collectionName": name }),
        )?;
        parse_describe(name, &data)
    }
}

impl VectorStore for MilvusRestStore {
    fn kind(&self) -> &'static str {
        "milvus"
    }

    fn describe_collection(
        &self,
        ctx: &RequestContext,
        name: &str,
    ) -> RagResult<Option<CollectionInfo>> {
        if !self.has_collection(ctx, name)? {
            return Ok(None);
        }
        let schema = self.describe_schema(ctx, name)?;
        let loaded = self.load_state(ctx, name)?;
        let count = self.row_count(ctx, name)?;
        Ok(Some(CollectionInfo {
            schema,
            count,
            loaded,
        }))
    }

    fn list_collections(&self, ctx: &RequestContext) -> RagResult<Vec<String>> {
        let data = self.call(ctx, "collections/list", &json!({}))?;
        let mut names: Vec<String> = data
            .as_array()
            .map(|names| {
                names
                    .iter()
                    .filter_map(|n| n.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        Ok(names)
    }

    fn create_collection_if_absent(
        &self,
        ctx: &RequestContext,
        schema: &CollectionSchema,
    ) -> RagResult<CreateOutcome> {
        schema.validate()?;
        if self.has_collection(ctx, &schema.name)? {
            return Ok(CreateOutcome::Existing(
                self.describe_schema(ctx, &schema.name)?,
            ));
        }

        match self.call(ctx, "collections/create", &create_body(schema)) {
            Ok(_) => {
                debug!(target: "ragline::store", collection = %schema.name, "Milvus collection created");
                Ok(CreateOutcome::Created)
            }
            // Lost a race with another creator
            Err(RagError::StoreUnavailable(msg)) if msg.contains("already exist") => Ok(
                CreateOutcome::Existing(self.describe_schema(ctx, &schema.name)?),
            ),
            Err(e) => Err(e),
        }
    }

    fn load_collection(&self, ctx: &RequestContext, name: &str) -> RagResult<()> {
        self.call_on(
            ctx,
            "collections/load",
            name,
            &json!({ "collectionName": name }),
        )?;
        Ok(())
    }

    fn drop_collection(&self, ctx: &RequestContext, name: &str) -> RagResult<bool> {
        if !self.has_collection(ctx, name)? {
            return Ok(false);
        }
        self.call(ctx, "collections/drop", &json!({ "collectionName": name }))?;
        Ok(true)
    }

    fn upsert(&self, ctx: &RequestContext, name: &str, records: Vec<Record>) -> RagResult<()> {
        let schema = self.describe_schema(ctx, name)?;
        for record in &records {
            schema.check_record(record)?;
        }
        let body = json!({
            "collectionName": name,
            "data": records
                .into_iter()
                .map(|r| record_to_row(&schema, r))
                .collect::<Vec<_>>(),
        });
        self.call_on(ctx, "entities/upsert", name, &body)?;
        Ok(())
    }

    fn delete(&self, ctx: &RequestContext, name: &str, ids: &[DocId]) -> RagResult<()> {
        let schema = self.describe_schema(ctx, name)?;
        let body = json!({
            "collectionName": name,
            "filter": id_filter(&schema.primary_key_field, ids),
        });
        self.call_on(ctx, "entities/delete", name, &body)?;
        Ok(())
    }

    fn search(
        &self,
        ctx: &RequestContext,
        name: &str,
        request: &RetrievalRequest,
    ) -> RagResult<Vec<SearchHit>> {
        request.validate()?;
        let schema = self.describe_schema(ctx, name)?;
        let body = json!({
            "collectionName": name,
            "data": [request.query_vector],
            "annsField": schema.vector_field,
            "limit": request.limit,
            "outputFields": ["*"],
        });
        let data = self.call_on(ctx, "entities/search", name, &body)?;
        parse_search_hits(&schema, &data)
    }

    fn get(&self, ctx: &RequestContext, name: &str, ids: &[DocId]) -> RagResult<Vec<Record>> {
        let schema = self.describe_schema(ctx, name)?;
        let body = json!({
            "collectionName": name,
            "id": ids,
            "outputFields": ["*"],
        });
        let data = self.call_on(ctx, "entities/get", name, &body)?;
        let mut records = data
            .as_array()
            .map(|rows| {
                rows.iter()
                    .map(|row| row_to_record(&schema, row))
                    .collect::<RagResult<Vec<_>>>()
            })
            .transpose()?
            .unwrap_or_default();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }
}

// ============================================================================
// Transport
// ============================================================================

#[cfg(feature = "milvus")]
fn post_json(
    url: &str,
    token: Option<&str>,
    timeout: Duration,
    body: &Value,
) -> RagResult<String> {
    let body_bytes = serde_json::to_vec(body)
        .map_err(|e| RagError::StoreUnavailable(format!("failed to serialize request: {}", e)))?;

    let config = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build();
    let agent = ureq::Agent::new_with_config(config);

    let mut request = agent.post(url).header("Content-Type", "application/json");
    if let Some(token) = token {
        request = request.header("Authorization", &format!("Bearer {}", token));
    }

    let mut response = request.send(&body_bytes[..]).map_err(|e| {
        let msg = e.to_string();
        if msg.contains("timed out") || msg.contains("Timeout") {
            RagError::DeadlineExceeded
        } else {
            RagError::StoreUnavailable(msg)
        }
    })?;

    response
        .body_mut()
        .read_to_string()
        .map_err(|e| RagError::StoreUnavailable(format!("failed to read response: {}", e)))
}

#[cfg(not(feature = "milvus"))]
fn post_json(
    _url: &str,
    _token: Option<&str>,
    _timeout: Duration,
    _body: &Value,
) -> RagResult<String> {
    Err(RagError::Config(
        "feature 'milvus' not enabled; rebuild with --features milvus".to_string(),
    ))
}

// ============================================================================
// Wire format
// ============================================================================

fn check_code(response: &Value) -> RagResult<()> {
    let code = response.get("code").and_then(Value::as_i64).unwrap_or(0);
    if code == 0 {
        return Ok(());
    }
    let message = response
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    Err(RagError::StoreUnavailable(format!(
        "Milvus error {}: {}",
        code, message
    )))
}

fn is_not_found(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("not found") || lower.contains("can't find") || lower.contains("not exist")
}

fn metric_name(metric: SimilarityMetric) -> &'static str {
    match metric {
        SimilarityMetric::Cosine => "COSINE",
        SimilarityMetric::L2 => "L2",
        SimilarityMetric::Ip => "IP",
    }
}

/// Milvus stringifies some numbers in schema params
fn as_usize(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

pub(crate) fn create_body(schema: &CollectionSchema) -> Value {
    json!({
        "collectionName": schema.name,
        "schema": {
            "autoId": false,
            "enableDynamicField": schema.dynamic_fields_enabled,
            "fields": [
                {
                    "fieldName": schema.primary_key_field,
                    "dataType": "Int64",
                    "isPrimary": true,
                },
                {
                    "fieldName": schema.vector_field,
                    "dataType": "FloatVector",
                    "elementTypeParams": { "dim": schema.vector_dim.to_string() },
                },
                {
                    "fieldName": schema.text_field,
                    "dataType": "VarChar",
                    "elementTypeParams": { "max_length": schema.max_text_length.to_string() },
                },
            ],
        },
        "indexParams": [
            {
                "fieldName": schema.vector_field,
                "indexName": schema.vector_field,
                "metricType": metric_name(schema.similarity_metric),
                "params": { "index_type": "AUTOINDEX" },
            }
        ],
    })
}

/// Rebuild a schema from a `collections/describe` response
pub(crate) fn parse_describe(name: &str, data: &Value) -> RagResult<CollectionSchema> {
    let malformed =
        |what: &str| RagError::StoreUnavailable(format!("describe '{}': {}", name, what));

    let fields = data
        .get("fields")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("missing fields"))?;

    fn param(field: &Value, key: &str) -> Option<usize> {
        field
            .get("params")
            .and_then(Value::as_array)?
            .iter()
            .find(|p| p.get("key").and_then(Value::as_str) == Some(key))
            .and_then(|p| p.get("value"))
            .and_then(as_usize)
    }
    fn field_name(f: &Value) -> Option<String> {
        f.get("name").and_then(Value::as_str).map(str::to_string)
    }
    fn field_type(f: &Value) -> &str {
        f.get("type").and_then(Value::as_str).unwrap_or("")
    }

    let primary = fields
        .iter()
        .find(|f| f.get("primaryKey").and_then(Value::as_bool) == Some(true))
        .and_then(field_name)
        .ok_or_else(|| malformed("no primary key field"))?;
    let vector = fields
        .iter()
        .find(|f| field_type(f) == "FloatVector")
        .ok_or_else(|| malformed("no float vector field"))?;
    let text = fields
        .iter()
        .find(|f| field_type(f) == "VarChar")
        .ok_or_else(|| malformed("no varchar field"))?;

    let vector_dim = param(vector, "dim").ok_or_else(|| malformed("vector field has no dim"))?;
    let max_text_length = param(text, "max_length").unwrap_or(DEFAULT_MAX_TEXT_LENGTH);

    let metric = data
        .get("indexes")
        .and_then(Value::as_array)
        .and_then(|idx| idx.first())
        .and_then(|i| i.get("metricType"))
        .and_then(Value::as_str)
        .and_then(SimilarityMetric::parse)
        .ok_or_else(|| malformed("no index metric"))?;

    let dynamic = data
        .get("enableDynamicField")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Ok(CollectionSchema::new(name, vector_dim, metric)
        .with_fields(
            primary,
            field_name(vector).unwrap_or_default(),
            field_name(text).unwrap_or_default(),
        )
        .with_max_text_length(max_text_length)
        .with_dynamic_fields(dynamic))
}

pub(crate) fn record_to_row(schema: &CollectionSchema, record: Record) -> Value {
    let mut row = record.extra;
    row.insert(schema.primary_key_field.clone(), json!(record.id));
    row.insert(schema.vector_field.clone(), json!(record.vector));
    row.insert(schema.text_field.clone(), json!(record.text));
    Value::Object(row)
}

/// Split a returned row into the fixed fields and the dynamic remainder
fn split_row(schema: &CollectionSchema, row: &Value) -> RagResult<(DocId, String, Map<String, Value>)> {
    let mut fields = row
        .as_object()
        .cloned()
        .ok_or_else(|| RagError::StoreUnavailable("row is not an object".to_string()))?;

    let id = fields
        .remove(&schema.primary_key_field)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| RagError::StoreUnavailable("row has no integer primary key".to_string()))?;
    let text = fields
        .remove(&schema.text_field)
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    Ok((id, text, fields))
}

pub(crate) fn row_to_record(schema: &CollectionSchema, row: &Value) -> RagResult<Record> {
    let (id, text, mut extra) = split_row(schema, row)?;
    let vector = extra
        .remove(&schema.vector_field)
        .and_then(|v| {
            v.as_array().map(|xs| {
                xs.iter()
                    .filter_map(Value::as_f64)
                    .map(|x| x as f32)
                    .collect::<Vec<f32>>()
            })
        })
        .unwrap_or_default();
    Ok(Record {
        id,
        vector,
        text,
        extra,
    })
}

pub(crate) fn parse_search_hits(schema: &CollectionSchema, data: &Value) -> RagResult<Vec<SearchHit>> {
    let Some(rows) = data.as_array() else {
        return Ok(Vec::new());
    };

    rows.iter()
        .map(|row| {
            let (id, text, mut metadata) = split_row(schema, row)?;
            let raw = metadata
                .remove(DISTANCE_FIELD)
                .and_then(|d| d.as_f64())
                .unwrap_or(f64::NAN);
            metadata.remove(&schema.vector_field);
            Ok(SearchHit {
                id,
                score: milvus_score(schema.similarity_metric, raw),
                text,
                metadata,
            })
        })
        .collect()
}

/// Convert Milvus' reported value to "higher = more similar"
pub(crate) fn milvus_score(metric: SimilarityMetric, raw: f64) -> f64 {
    match metric {
        SimilarityMetric::Cosine | SimilarityMetric::Ip => raw,
        SimilarityMetric::L2 => l2_similarity(raw.max(0.0).sqrt()),
    }
}

pub(crate) fn id_filter(field: &str, ids: &[DocId]) -> String {
    let list: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
    format!("{} in [{}]", field, list.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragline_core::Metadata;

    fn schema() -> CollectionSchema {
        CollectionSchema::new("products", 3, SimilarityMetric::L2)
    }

    #[test]
    fn test_create_body_shape() {
        let body = create_body(&schema());
        assert_eq!(body["collectionName"], "products");
        assert_eq!(body["schema"]["autoId"], false);
        assert_eq!(body["schema"]["fields"][0]["isPrimary"], true);
        assert_eq!(body["schema"]["fields"][1]["elementTypeParams"]["dim"], "3");
        assert_eq!(
            body["schema"]["fields"][2]["elementTypeParams"]["max_length"],
            "512"
        );
        assert_eq!(body["indexParams"][0]["metricType"], "L2");
    }

    #[test]
    fn test_parse_describe_round_trip() {
        let data = json!({
            "collectionName": "products",
            "enableDynamicField": true,
            "fields": [
                { "name": "id", "type": "Int64", "primaryKey": true },
                { "name": "vector", "type": "FloatVector",
                  "params": [{ "key": "dim", "value": "3" }] },
                { "name": "text", "type": "VarChar",
                  "params": [{ "key": "max_length", "value": "512" }] }
            ],
            "indexes": [{ "fieldName": "vector", "metricType": "L2" }]
        });
        assert_eq!(parse_describe("products", &data).unwrap(), schema());
    }

    #[test]
    fn test_parse_describe_missing_vector() {
        let data = json!({
            "fields": [{ "name": "id", "type": "Int64", "primaryKey": true }]
        });
        assert!(matches!(
            parse_describe("products", &data),
            Err(RagError::StoreUnavailable(_))
        ));
    }

    #[test]
    fn test_parse_describe_without_index_metric() {
        let fields = json!([
            { "name": "id", "type": "Int64", "primaryKey": true },
            { "name": "vector", "type": "FloatVector",
              "params": [{ "key": "dim", "value": "3" }] },
            { "name": "text", "type": "VarChar" }
        ]);
        for indexes in [json!([]), json!([{ "metricType": "HAMMING" }]), Value::Null] {
            let data = json!({ "fields": fields.clone(), "indexes": indexes });
            assert!(matches!(
                parse_describe("products", &data),
                Err(RagError::StoreUnavailable(m)) if m.contains("no index metric")
            ));
        }
    }

    #[test]
    fn test_row_without_schema_primary_key_is_rejected() {
        let schema = schema().with_fields("pk", "vector", "text");
        let row = json!({ "id": 7, "vector": [0.1, 0.2, 0.3], "text": "x" });
        assert!(matches!(
            row_to_record(&schema, &row),
            Err(RagError::StoreUnavailable(_))
        ));
    }

    #[test]
    fn test_record_row_round_trip_keeps_metadata() {
        let record = Record {
            id: 42,
            vector: vec![0.5, 0.25, 1.0],
            text: "Pixel 9".to_string(),
            extra: Metadata::from_iter([("brand".to_string(), json!("google"))]),
        };
        let row = record_to_row(&schema(), record.clone());
        assert_eq!(row["id"], 42);
        assert_eq!(row["brand"], "google");
        assert_eq!(row_to_record(&schema(), &row).unwrap(), record);
    }

    #[test]
    fn test_parse_search_hits_maps_l2() {
        let data = json!([
            { "id": 1, "distance": 0.0, "text": "a", "brand": "x" },
            { "id": 2, "distance": 4.0, "text": "b" }
        ]);
        let hits = parse_search_hits(&schema(), &data).unwrap();
        assert_eq!(hits[0].id, 1);
        assert!((hits[0].score - 1.0).abs() < 1e-9);
        assert!((hits[1].score - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(hits[0].metadata.get("brand"), Some(&json!("x")));
        assert!(!hits[0].metadata.contains_key("distance"));
    }

    #[test]
    fn test_cosine_score_passes_through() {
        assert!((milvus_score(SimilarityMetric::Cosine, 0.83) - 0.83).abs() < 1e-12);
        assert!((milvus_score(SimilarityMetric::Ip, -2.5) + 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_error_code_mapping() {
        assert!(check_code(&json!({ "code": 0, "data": {} })).is_ok());
        let err = check_code(&json!({ "code": 100, "message": "collection not found[products]" }))
            .unwrap_err();
        assert!(matches!(&err, RagError::StoreUnavailable(m) if is_not_found(m)));
    }

    #[test]
    fn test_id_filter() {
        assert_eq!(id_filter("id", &[1, -2, 3]), "id in [1,-2,3]");
    }

    #[cfg(not(feature = "milvus"))]
    #[test]
    fn test_disabled_transport_reports_feature() {
        let store = MilvusRestStore::new("http://127.0.0.1:19530", None, Duration::from_secs(1));
        let err = store
            .list_collections(&RequestContext::background())
            .unwrap_err();
        assert!(err.to_string().contains("milvus"));
    }
}
