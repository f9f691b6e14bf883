use std::collections::HashMap;

use axum::{Json, debug_handler, extract::{Path, Query, State}};
use serde_json::{Value, json};
use sqlx::SqlitePool;
use tracing::info;

use crate::{AppError, AppResult, AppState, GetField, store::{Collection, StoreRecord}, username::eq_ignore_case};

use super::db;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterOp {
    Eq,
    Eqi,
}

#[derive(Debug, PartialEq, Eq)]
struct Filter {
    field: String,
    op: FilterOp,
    value: String,
}

impl Filter {
    fn matches(&self, record: &StoreRecord) -> bool {
        let Some(actual) = record.str_attr(&self.field) else {
            return false;
        };
        match self.op {
            FilterOp::Eq => actual == self.value,
            FilterOp::Eqi => eq_ignore_case(actual, &self.value),
        }
    }
}

/// Picks `filters[field][$op]=value` pairs out of the query; other keys
/// (pagination and the like) are ignored.
fn parse_filters(params: &HashMap<String, String>) -> AppResult<Vec<Filter>> {
    let mut filters = Vec::new();
    for (key, value) in params {
        let Some(rest) = key.strip_prefix("filters[") else {
            continue;
        };
        let Some((field, op)) = rest.split_once("][") else {
            return Err(format!("malformed filter {key}"))?;
        };
        let op = match op.strip_suffix(']') {
            Some("$eq") => FilterOp::Eq,
            Some("$eqi") => FilterOp::Eqi,
            _ => return Err(format!("unsupported filter {key}"))?,
        };
        filters.push(Filter {
            field: field.to_owned(),
            op,
            value: value.clone(),
        });
    }
    Ok(filters)
}

fn collection(path: &str) -> AppResult<Collection> {
    Collection::from_path(path).ok_or_else(|| AppError::not_found(format!("collection {path}")))
}

#[debug_handler(state = AppState)]
pub(crate) async fn list_records(
    Path(collection_path): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<Value>> {
    let collection = collection(&collection_path)?;
    let filters = parse_filters(&params)?;

    let records: Vec<StoreRecord> = db::list(&db_pool, collection)
        .await?
        .into_iter()
        .filter(|r| filters.iter().all(|f| f.matches(r)))
        .collect();
    let total = records.len();

    Ok(Json(json!({
        "data": records,
        "meta": { "pagination": { "total": total } },
    })))
}

#[debug_handler(state = AppState)]
pub(crate) async fn create_record(
    Path(collection_path): Path<String>,
    State(db_pool): State<SqlitePool>,
    Json(body): Json<Value>,
) -> AppResult<Json<Value>> {
    let collection = collection(&collection_path)?;
    let attributes = body.get_obj_field("data")?;

    let record = db::insert(&db_pool, collection, attributes).await?;
    info!(%collection, id = record.id, "record created");

    Ok(Json(json!({ "data": record, "meta": {} })))
}

#[debug_handler(state = AppState)]
pub(crate) async fn delete_record(
    Path((collection_path, id)): Path<(String, i64)>,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<Value>> {
    let collection = collection(&collection_path)?;

    let Some(record) = db::delete(&db_pool, collection, id).await? else {
        return Err(AppError::not_found(format!("{collection}/{id}")));
    };
    info!(%collection, id, "record deleted");

    Ok(Json(json!({ "data": record, "meta": {} })))
}
