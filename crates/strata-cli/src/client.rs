//! Async HTTP client wrapping the strata JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::{
  Client, Response, StatusCode,
  multipart::{Form, Part},
};
use serde::Deserialize;
use serde_json::Value;
use strata_core::{DeleteReceipt, UploadReceipt, schema::Schema};

/// Connection settings for the strata API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
}

/// Result of a single upload that reached the server.
#[derive(Debug)]
pub enum UploadOutcome {
  Uploaded(UploadReceipt),
  /// The server already holds a source with this name (HTTP 409).
  Duplicate(String),
}

#[derive(Deserialize)]
struct ErrorBody {
  error: String,
}

#[derive(Deserialize)]
struct TableList {
  tables: Vec<String>,
}

#[derive(Deserialize)]
struct SourceList {
  sources: Vec<String>,
}

/// Async HTTP client for the strata JSON REST API.
///
/// Cheap to clone: the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
  }

  /// Turn a non-2xx response into an error carrying the server's message.
  async fn check(resp: Response, what: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
      return Ok(resp);
    }
    Err(anyhow!("{what} → {status}: {}", error_message(resp).await))
  }

  // ── Tables ────────────────────────────────────────────────────────────────

  /// `GET /tables`
  pub async fn list_tables(&self) -> Result<Vec<String>> {
    let resp = self
      .client
      .get(self.url("/tables"))
      .send()
      .await
      .context("GET /tables failed")?;
    let list: TableList = Self::check(resp, "GET /tables")
      .await?
      .json()
      .await
      .context("deserialising tables")?;
    Ok(list.tables)
  }

  /// `GET /tables/<table>/schema`
  pub async fn schema(&self, table: &str) -> Result<Schema> {
    let path = format!("/tables/{table}/schema");
    let resp = self
      .client
      .get(self.url(&path))
      .send()
      .await
      .with_context(|| format!("GET {path} failed"))?;
    Self::check(resp, &format!("GET {path}"))
      .await?
      .json()
      .await
      .context("deserialising schema")
  }

  // ── Sources ───────────────────────────────────────────────────────────────

  /// `POST /upload/<table>` with `bytes` as the multipart `file` field.
  pub async fn upload(
    &self,
    table: &str,
    file_name: &str,
    bytes: Vec<u8>,
  ) -> Result<UploadOutcome> {
    let path = format!("/upload/{table}");
    let part = Part::bytes(bytes)
      .file_name(file_name.to_owned())
      .mime_str("text/csv")
      .context("building multipart part")?;
    let resp = self
      .client
      .post(self.url(&path))
      .multipart(Form::new().part("file", part))
      .send()
      .await
      .with_context(|| format!("POST {path} failed"))?;

    if resp.status() == StatusCode::CONFLICT {
      return Ok(UploadOutcome::Duplicate(error_message(resp).await));
    }
    let receipt = Self::check(resp, &format!("POST {path}"))
      .await?
      .json()
      .await
      .context("deserialising upload receipt")?;
    Ok(UploadOutcome::Uploaded(receipt))
  }

  /// `GET /tables/<table>/sources`
  pub async fn list_sources(&self, table: &str) -> Result<Vec<String>> {
    let path = format!("/tables/{table}/sources");
    let resp = self
      .client
      .get(self.url(&path))
      .send()
      .await
      .with_context(|| format!("GET {path} failed"))?;
    let list: SourceList = Self::check(resp, &format!("GET {path}"))
      .await?
      .json()
      .await
      .context("deserialising sources")?;
    Ok(list.sources)
  }

  /// `GET /tables/<table>/sources/<file>`
  pub async fn download(&self, table: &str, file_name: &str) -> Result<Vec<u8>> {
    let path = format!("/tables/{table}/sources/{file_name}");
    let resp = self
      .client
      .get(self.url(&path))
      .send()
      .await
      .with_context(|| format!("GET {path} failed"))?;
    let bytes = Self::check(resp, &format!("GET {path}"))
      .await?
      .bytes()
      .await
      .context("reading download body")?;
    Ok(bytes.to_vec())
  }

  /// `DELETE /tables/<table>/sources/<file>`
  pub async fn delete(&self, table: &str, file_name: &str) -> Result<DeleteReceipt> {
    let path = format!("/tables/{table}/sources/{file_name}");
    let resp = self
      .client
      .delete(self.url(&path))
      .send()
      .await
      .with_context(|| format!("DELETE {path} failed"))?;
    Self::check(resp, &format!("DELETE {path}"))
      .await?
      .json()
      .await
      .context("deserialising delete receipt")
  }

  // ── Rows ──────────────────────────────────────────────────────────────────

  /// `GET /tables/<table>/rows?col=value&...`
  pub async fn query(&self, table: &str, filters: &[(String, String)]) -> Result<Vec<Value>> {
    let path = format!("/tables/{table}/rows");
    let resp = self
      .client
      .get(self.url(&path))
      .query(filters)
      .send()
      .await
      .with_context(|| format!("GET {path} failed"))?;
    Self::check(resp, &format!("GET {path}"))
      .await?
      .json()
      .await
      .context("deserialising rows")
  }

  /// `GET /tables/<table>/rows/<id>`
  pub async fn get_row(&self, table: &str, id: i64) -> Result<Value> {
    let path = format!("/tables/{table}/rows/{id}");
    let resp = self
      .client
      .get(self.url(&path))
      .send()
      .await
      .with_context(|| format!("GET {path} failed"))?;
    Self::check(resp, &format!("GET {path}"))
      .await?
      .json()
      .await
      .context("deserialising row")
  }
}

/// The `error` field of a JSON error body, or the raw body text.
async fn error_message(resp: Response) -> String {
  let text = resp.text().await.unwrap_or_default();
  match serde_json::from_str::<ErrorBody>(&text) {
    Ok(body) => body.error,
    Err(_) => text,
  }
}
