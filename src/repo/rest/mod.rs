//! Adapters for a Postgres-style REST resource API.

mod controls;
#[cfg(test)]
pub(crate) mod fake;
mod license;

pub use controls::RestControls;
pub use license::RestLicenses;
use reqwest::{Client, Method, RequestBuilder, header};
use serde::{Serialize, de::DeserializeOwned};

use crate::prelude::*;

pub(crate) const PREFER_REPRESENTATION: &str = "return=representation";
pub(crate) const PREFER_UPSERT: &str =
  "resolution=merge-duplicates,return=representation";

/// Shared HTTP client carrying the base url and api key.
#[derive(Clone)]
pub struct RestClient {
  http: Client,
  base: String,
  api_key: String,
}

impl RestClient {
  pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self> {
    let http = Client::builder().build()?;
    Ok(Self {
      http,
      base: base_url.trim_end_matches('/').to_string(),
      api_key: api_key.into(),
    })
  }

  fn request(&self, method: Method, resource: &str) -> RequestBuilder {
    self
      .http
      .request(method, format!("{}/{resource}", self.base))
      .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
      .header("apikey", &self.api_key)
      .header("Accept-Profile", "public")
  }

  /// Sends the request and returns the body, failing on non-2xx answers.
  async fn send(&self, request: RequestBuilder) -> Result<String> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
      debug!("REST store answered {status}: {body}");
      return Err(Error::Status { status: status.as_u16(), body });
    }
    Ok(body)
  }

  pub(crate) async fn select<T: DeserializeOwned>(
    &self,
    table: &str,
  ) -> Result<Vec<T>> {
    let request =
      self.request(Method::GET, &format!("{table}?select=*"));
    let body = self.send(request).await?;
    Ok(json::from_str(&body)?)
  }

  /// POSTs `rows` as a JSON array, returning the rows the store echoes back.
  pub(crate) async fn insert<T: Serialize + DeserializeOwned>(
    &self,
    table: &str,
    rows: &[T],
    prefer: &str,
  ) -> Result<Vec<T>> {
    let request = self
      .request(Method::POST, table)
      .header("Prefer", prefer)
      .json(rows);
    let body = self.send(request).await?;
    if body.trim().is_empty() {
      return Ok(Vec::new());
    }
    Ok(json::from_str(&body)?)
  }

  /// PATCHes the rows matching every `(column, value)` equality filter.
  pub(crate) async fn patch(
    &self,
    table: &str,
    filter: &[(&str, &str)],
    changes: &json::Value,
  ) -> Result<()> {
    let filter: Vec<_> =
      filter.iter().map(|(col, value)| (*col, format!("eq.{value}"))).collect();
    let request = self
      .request(Method::PATCH, table)
      .query(&filter)
      .header("Prefer", PREFER_REPRESENTATION)
      .json(changes);
    self.send(request).await?;
    Ok(())
  }
}
