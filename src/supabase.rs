//! Supabase (PostgREST) implementation of [`KnowledgeStore`].
//!
//! | Operation | Request |
//! |-----------|---------|
//! | `search` | `POST /rest/v1/rpc/{search_function}` |
//! | `clear` | `DELETE /rest/v1/{table}?id=neq.<nil uuid>` |
//! | `insert` | `POST /rest/v1/{table}` (`Prefer: return=minimal`) |
//! | `count` | `GET /rest/v1/{table}?select=id` (`Prefer: count=exact`) |
//! | `sample` | `GET /rest/v1/{table}?select=id,content,metadata&limit=N` |
//!
//! PostgREST refuses an unfiltered `DELETE`, so `clear` filters on an id that
//! can never exist.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use folio_chat_core::models::{EmbeddedChunk, RetrievalResult, StoredChunk};
use folio_chat_core::store::KnowledgeStore;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Serialize;

use crate::config::{Config, Credentials};

const NIL_UUID: &str = "00000000-0000-0000-0000-000000000000";

pub struct SupabaseStore {
    http: reqwest::Client,
    base_url: String,
    table: String,
    search_function: String,
}

#[derive(Serialize)]
struct SearchArgs<'a> {
    query_embedding: &'a [f32],
    match_threshold: f32,
    match_count: usize,
}

impl SupabaseStore {
    pub fn new(
        base_url: &str,
        service_key: &str,
        table: &str,
        search_function: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(service_key).context("Invalid store key")?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", service_key))
                .context("Invalid store key")?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            table: table.to_string(),
            search_function: search_function.to_string(),
        })
    }

    pub fn from_config(config: &Config, credentials: &Credentials) -> Result<Self> {
        Self::new(
            &credentials.store_url,
            &credentials.store_key,
            &config.store.table,
            &config.store.search_function,
            Duration::from_secs(config.store.timeout_secs),
        )
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }
}

async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    bail!("Store {} failed ({}): {}", what, status, body)
}

/// Total from a `Content-Range` header such as `0-0/42` or `*/0`.
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

#[async_trait]
impl KnowledgeStore for SupabaseStore {
    async fn search(
        &self,
        query: &[f32],
        match_threshold: f32,
        match_count: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let url = format!("{}/rest/v1/rpc/{}", self.base_url, self.search_function);
        let response = self
            .http
            .post(url)
            .json(&SearchArgs {
                query_embedding: query,
                match_threshold,
                match_count,
            })
            .send()
            .await
            .context("Store search request failed")?;

        let rows: Vec<RetrievalResult> = check(response, "search")
            .await?
            .json()
            .await
            .context("Store search returned unexpected rows")?;
        Ok(rows)
    }

    async fn clear(&self) -> Result<()> {
        let response = self
            .http
            .delete(self.table_url())
            .query(&[("id", format!("neq.{}", NIL_UUID))])
            .send()
            .await
            .context("Store clear request failed")?;
        check(response, "clear").await?;
        Ok(())
    }

    async fn insert(&self, chunk: &EmbeddedChunk) -> Result<()> {
        let response = self
            .http
            .post(self.table_url())
            .header("Prefer", "return=minimal")
            .json(chunk)
            .send()
            .await
            .context("Store insert request failed")?;
        check(response, "insert").await?;
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let response = self
            .http
            .get(self.table_url())
            .query(&[("select", "id")])
            .header("Prefer", "count=exact")
            .header("Range", "0-0")
            .send()
            .await
            .context("Store count request failed")?;
        let response = check(response, "count").await?;

        let range = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| anyhow!("Store count response has no Content-Range header"))?;
        parse_content_range_total(range)
            .ok_or_else(|| anyhow!("Unparseable Content-Range: {}", range))
    }

    async fn sample(&self, limit: usize) -> Result<Vec<StoredChunk>> {
        let response = self
            .http
            .get(self.table_url())
            .query(&[("select", "id,content,metadata".to_string()), ("limit", limit.to_string())])
            .send()
            .await
            .context("Store sample request failed")?;

        let rows: Vec<StoredChunk> = check(response, "sample")
            .await?
            .json()
            .await
            .context("Store sample returned unexpected rows")?;
        Ok(rows)
    }
}
