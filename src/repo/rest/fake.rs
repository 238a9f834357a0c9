//! In-process stand-in for the REST store, enough to drive the adapters.

use std::sync::{
  Mutex,
  atomic::{AtomicBool, AtomicU64, Ordering},
};

use axum::{
  Json, Router,
  extract::{Path, Query, State},
  http::{HeaderMap, StatusCode, header},
  response::{IntoResponse, Response},
  routing::get,
};
use json::Value;

use crate::prelude::*;

#[derive(Default)]
struct Store {
  api_key: String,
  tables: Mutex<HashMap<String, Vec<Value>>>,
  last_prefer: Mutex<Option<String>>,
  next_id: AtomicU64,
  broken: AtomicBool,
}

pub struct FakeStore {
  pub url: String,
  store: Arc<Store>,
}

impl FakeStore {
  pub fn rows(&self, table: &str) -> Vec<Value> {
    let tables = self.store.tables.lock().unwrap();
    tables.get(table).cloned().unwrap_or_default()
  }

  pub fn seed(&self, table: &str, row: Value) {
    let mut tables = self.store.tables.lock().unwrap();
    tables.entry(table.to_string()).or_default().push(row);
  }

  pub fn last_prefer(&self) -> Option<String> {
    self.store.last_prefer.lock().unwrap().clone()
  }

  /// Makes every following select answer with a non-JSON body.
  pub fn break_json(&self) {
    self.store.broken.store(true, Ordering::Relaxed);
  }
}

pub async fn spawn(api_key: &str) -> FakeStore {
  let store = Arc::new(Store { api_key: api_key.into(), ..Default::default() });

  let router = Router::new()
    .route("/{table}", get(select).post(insert).patch(update))
    .with_state(store.clone());

  let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });

  FakeStore { url: format!("http://{addr}/"), store }
}

fn conflict_keys(table: &str) -> &'static [&'static str] {
  match table {
    "feature_flags" => &["flag_key", "audience"],
    "user_controls" => &["user_id"],
    _ => &["id_keys"],
  }
}

fn authorized(store: &Store, headers: &HeaderMap) -> bool {
  let bearer = format!("Bearer {}", store.api_key);
  headers.get("apikey").is_some_and(|v| v == store.api_key.as_str())
    && headers.get(header::AUTHORIZATION).is_some_and(|v| v == bearer.as_str())
}

async fn select(
  State(store): State<Arc<Store>>,
  Path(table): Path<String>,
  headers: HeaderMap,
) -> Response {
  if !authorized(&store, &headers) {
    return StatusCode::UNAUTHORIZED.into_response();
  }
  if store.broken.load(Ordering::Relaxed) {
    return "<html>gateway timeout</html>".into_response();
  }

  let tables = store.tables.lock().unwrap();
  Json(tables.get(&table).cloned().unwrap_or_default()).into_response()
}

async fn insert(
  State(store): State<Arc<Store>>,
  Path(table): Path<String>,
  headers: HeaderMap,
  Json(rows): Json<Vec<Value>>,
) -> Response {
  if !authorized(&store, &headers) {
    return StatusCode::UNAUTHORIZED.into_response();
  }

  let prefer = headers
    .get("Prefer")
    .and_then(|v| v.to_str().ok())
    .map(str::to_string);
  let merge = prefer.as_deref().is_some_and(|p| p.contains("merge-duplicates"));
  *store.last_prefer.lock().unwrap() = prefer;

  let keys = conflict_keys(&table);
  let mut tables = store.tables.lock().unwrap();
  let stored = tables.entry(table.clone()).or_default();
  let mut echoed = Vec::new();

  for mut row in rows {
    if table == "keys_code" {
      if row.get("id_keys").is_none() {
        let id = store.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        row["id_keys"] = Value::String(id.to_string());
      }
      if row.get("created_at").is_none() {
        row["created_at"] = Value::String(Utc::now().to_rfc3339());
      }
    }

    let existing = stored
      .iter_mut()
      .find(|r| merge && keys.iter().all(|k| r.get(*k) == row.get(*k)));
    match existing {
      Some(slot) => *slot = row.clone(),
      None => stored.push(row.clone()),
    }
    echoed.push(row);
  }

  (StatusCode::CREATED, Json(echoed)).into_response()
}

async fn update(
  State(store): State<Arc<Store>>,
  Path(table): Path<String>,
  headers: HeaderMap,
  Query(filter): Query<HashMap<String, String>>,
  Json(changes): Json<Value>,
) -> Response {
  if !authorized(&store, &headers) {
    return StatusCode::UNAUTHORIZED.into_response();
  }

  let conditions: Vec<(String, String)> = filter
    .into_iter()
    .filter_map(|(col, v)| v.strip_prefix("eq.").map(|v| (col, v.to_string())))
    .collect();

  let mut tables = store.tables.lock().unwrap();
  let mut updated = Vec::new();
  for row in tables.entry(table).or_default().iter_mut() {
    let matches = conditions
      .iter()
      .all(|(col, v)| row.get(col).and_then(Value::as_str) == Some(v.as_str()));
    if !matches {
      continue;
    }
    if let (Some(fields), Some(changes)) =
      (row.as_object_mut(), changes.as_object())
    {
      for (k, v) in changes {
        fields.insert(k.clone(), v.clone());
      }
    }
    updated.push(row.clone());
  }

  Json(updated).into_response()
}
