//! Resource operation handlers
//!
//! One function per store operation: parse the buffered body, call the
//! collection, shape the JSON reply.

use hyper::body::Bytes;
use hyper::StatusCode;
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::http::ApiResponse;
use crate::store::{Collection, Record, RecordId};

/// Parse a buffered body as JSON
pub fn parse_json(body: &Bytes) -> Result<Value, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::Validation(format!("Invalid JSON: {e}")))
}

fn into_record(value: Value) -> Result<Record, ApiError> {
    match value {
        Value::Object(record) => Ok(record),
        _ => Err(ApiError::Validation(
            "Request body must be a JSON object".to_string(),
        )),
    }
}

fn with_message(message: String, key: String, value: Value) -> Value {
    let mut body = Map::new();
    body.insert("message".to_string(), Value::from(message));
    body.insert(key, value);
    Value::Object(body)
}

/// GET /<resource>
pub async fn list(collection: &Collection) -> ApiResponse {
    ApiResponse::json(StatusCode::OK, &collection.list().await)
}

/// GET /<resource>/<id>
pub async fn get(collection: &Collection, id: &RecordId) -> Result<ApiResponse, ApiError> {
    let record = collection.get(id).await?;
    Ok(ApiResponse::json(StatusCode::OK, &record))
}

/// POST /<resource>: an object inserts one record, an array inserts all of them
pub async fn create(collection: &Collection, body: &Bytes) -> Result<ApiResponse, ApiError> {
    let schema = collection.schema();
    match parse_json(body)? {
        Value::Array(items) => {
            let records = items
                .into_iter()
                .map(into_record)
                .collect::<Result<Vec<_>, _>>()?;
            let added = collection.insert_many(records).await?;
            let added = added.into_iter().map(Value::Object).collect();
            Ok(ApiResponse::json(
                StatusCode::CREATED,
                &with_message(
                    format!("{} added", schema.plural_label()),
                    schema.name.clone(),
                    Value::Array(added),
                ),
            ))
        }
        value => {
            let record = collection.insert(into_record(value)?).await?;
            Ok(ApiResponse::json(
                StatusCode::CREATED,
                &with_message(
                    format!("{} added", schema.label),
                    schema.item_key(),
                    Value::Object(record),
                ),
            ))
        }
    }
}

/// PUT /<resource>/<id>, or PUT /<resource> with the id inside the body
pub async fn replace(
    collection: &Collection,
    id: Option<&RecordId>,
    body: &Bytes,
) -> Result<ApiResponse, ApiError> {
    let schema = collection.schema();
    let record = into_record(parse_json(body)?)?;

    let id = match id {
        Some(id) => id.clone(),
        None => {
            let value = record.get(&schema.id_field).ok_or_else(|| {
                ApiError::Validation(format!("{} is required", schema.id_field))
            })?;
            RecordId::from_value(value, schema.id_policy)?
        }
    };

    let updated = collection.update(&id, record).await?;
    Ok(ApiResponse::json(
        StatusCode::OK,
        &with_message(
            format!("{} updated", schema.label),
            schema.item_key(),
            Value::Object(updated),
        ),
    ))
}

/// DELETE /<resource>/<id>; succeeds whether or not the record existed
pub async fn remove(collection: &Collection, id: &RecordId) -> Result<ApiResponse, ApiError> {
    collection.delete(id).await?;
    Ok(ApiResponse::message(
        StatusCode::OK,
        &format!("{} deleted", collection.schema().label),
    ))
}
