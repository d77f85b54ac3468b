//! OpenSearch provider implementation.
//!
//! This module provides the concrete implementation of `SearchIndexProvider`
//! using the OpenSearch Rust crate.

use async_trait::async_trait;
use opensearch::{
    http::{
        request::JsonBody,
        transport::{SingleNodeConnectionPool, TransportBuilder},
    },
    BulkParts, OpenSearch,
};
use serde_json::{json, Value};
use tracing::{debug, error, info};
use url::Url;

use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::types::{BatchOperationResult, BatchOperationSummary, UpsertDocumentRequest};

/// HTTP statuses that mean the cluster is overloaded or briefly unavailable.
const RETRYABLE_STATUSES: [u16; 4] = [429, 502, 503, 504];

/// OpenSearch provider implementation.
///
/// Writes documents with the `_bulk` API using `index` actions, so each
/// document fully replaces whatever was stored under its id.
///
/// # Example
///
/// ```ignore
/// use movies_etl_repository::{OpenSearchProvider, UpsertDocumentRequest};
/// let provider = OpenSearchProvider::new("http://localhost:9200")?;
///
/// let request = UpsertDocumentRequest {
///     document_id: "3d825f60-9fff-4dfe-b294-1a45fa1e115d".to_string(),
///     body: serde_json::json!({ "id": "3d825f60-9fff-4dfe-b294-1a45fa1e115d", "title": "Star Wars" }),
/// };
/// let summary = provider.bulk_upsert_documents("movies", &[request]).await?;
/// assert!(summary.is_complete());
/// ```
pub struct OpenSearchProvider {
    client: OpenSearch,
}

impl OpenSearchProvider {
    /// Create a new OpenSearch provider for the specified URL.
    ///
    /// No request is sent; use [`OpenSearchProvider::ping`] to check that the
    /// cluster is reachable.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchProvider)` - A new provider instance
    /// * `Err(SearchIndexError)` - If the URL is invalid or the transport cannot be built
    pub fn new(url: &str) -> Result<Self, SearchIndexError> {
        let parsed_url =
            Url::parse(url).map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(url = %url, "Created OpenSearch provider");

        Ok(Self { client })
    }

    /// Check that the cluster answers requests.
    pub async fn ping(&self) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .ping()
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            return Err(SearchIndexError::connection(format!(
                "Ping failed with status {}",
                status
            )));
        }

        Ok(())
    }

    /// Validate the target index and document ids before sending anything.
    fn validate_requests(
        index: &str,
        requests: &[UpsertDocumentRequest],
    ) -> Result<(), SearchIndexError> {
        if index.is_empty() {
            return Err(SearchIndexError::validation("Index name cannot be empty"));
        }

        if let Some(position) = requests.iter().position(|r| r.document_id.is_empty()) {
            return Err(SearchIndexError::validation(format!(
                "Document at position {} has an empty id",
                position
            )));
        }

        Ok(())
    }

    /// Build the NDJSON body of a bulk request: one action line followed by
    /// the document source for every request.
    fn build_bulk_body(requests: &[UpsertDocumentRequest]) -> Vec<JsonBody<Value>> {
        let mut body = Vec::with_capacity(requests.len() * 2);
        for request in requests {
            body.push(json!({ "index": { "_id": request.document_id } }).into());
            body.push(request.body.clone().into());
        }
        body
    }

    /// Map a non-success status of the whole bulk request to an error.
    fn status_error(status: u16, body: &str) -> SearchIndexError {
        let message = format!("Bulk request failed with status {}: {}", status, body);
        if RETRYABLE_STATUSES.contains(&status) {
            SearchIndexError::connection(message)
        } else {
            SearchIndexError::bulk_index(message)
        }
    }

    /// Turn a bulk response into per-document results.
    ///
    /// Items are reported in request order; an item whose status is not 2xx
    /// or which carries an `error` object is a failure.
    fn parse_bulk_response(
        requests: &[UpsertDocumentRequest],
        response: &Value,
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        let items = response
            .get("items")
            .and_then(Value::as_array)
            .ok_or_else(|| SearchIndexError::parse("Bulk response has no items array"))?;

        if items.len() != requests.len() {
            return Err(SearchIndexError::parse(format!(
                "Bulk response has {} items for {} documents",
                items.len(),
                requests.len()
            )));
        }

        let results = requests
            .iter()
            .zip(items)
            .map(|(request, item)| {
                let outcome = item
                    .get("index")
                    .ok_or_else(|| SearchIndexError::parse("Bulk item without index action"))?;

                let status = outcome.get("status").and_then(Value::as_u64).unwrap_or(0);
                let error = outcome.get("error").filter(|e| !e.is_null());
                let success = (200..300).contains(&status) && error.is_none();

                Ok(BatchOperationResult {
                    document_id: request.document_id.clone(),
                    success,
                    error: (!success).then(|| item_error(status, error)),
                })
            })
            .collect::<Result<Vec<_>, SearchIndexError>>()?;

        Ok(BatchOperationSummary::from_results(results))
    }
}

fn item_error(status: u64, error: Option<&Value>) -> SearchIndexError {
    let reason = error
        .and_then(|e| {
            let kind = e.get("type").and_then(Value::as_str);
            let reason = e.get("reason").and_then(Value::as_str);
            match (kind, reason) {
                (Some(kind), Some(reason)) => Some(format!("{}: {}", kind, reason)),
                (Some(text), None) | (None, Some(text)) => Some(text.to_string()),
                (None, None) => None,
            }
        })
        .unwrap_or_else(|| "unknown error".to_string());

    if RETRYABLE_STATUSES
        .iter()
        .any(|retryable| u64::from(*retryable) == status)
    {
        SearchIndexError::connection(format!("status {}: {}", status, reason))
    } else {
        SearchIndexError::bulk_index(format!("status {}: {}", status, reason))
    }
}

#[async_trait]
impl SearchIndexProvider for OpenSearchProvider {
    /// Write documents into `index` with a single `_bulk` request.
    ///
    /// # Arguments
    ///
    /// * `index` - Name of the target index
    /// * `requests` - Documents to write, each under its own id
    ///
    /// # Returns
    ///
    /// * `Ok(BatchOperationSummary)` - Per-document outcomes reported by the cluster
    /// * `Err(SearchIndexError)` - If the request failed as a whole
    async fn bulk_upsert_documents(
        &self,
        index: &str,
        requests: &[UpsertDocumentRequest],
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        Self::validate_requests(index, requests)?;

        if requests.is_empty() {
            return Ok(BatchOperationSummary::from_results(Vec::new()));
        }

        let response = self
            .client
            .bulk(BulkParts::Index(index))
            .body(Self::build_bulk_body(requests))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(index = %index, status = %status, body = %error_body, "Bulk request failed");
            return Err(Self::status_error(status.as_u16(), &error_body));
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        let summary = Self::parse_bulk_response(requests, &body)?;

        debug!(
            index = %index,
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Bulk request completed"
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: &str) -> UpsertDocumentRequest {
        UpsertDocumentRequest {
            document_id: id.to_string(),
            body: json!({ "id": id, "title": format!("Film {}", id) }),
        }
    }

    #[test]
    fn test_new_rejects_invalid_url() {
        let result = OpenSearchProvider::new("not a url");
        assert!(matches!(result, Err(SearchIndexError::ConnectionError(_))));
    }

    #[test]
    fn test_validate_requests() {
        assert!(OpenSearchProvider::validate_requests("movies", &[request("a")]).is_ok());
        assert!(OpenSearchProvider::validate_requests("movies", &[]).is_ok());

        let result = OpenSearchProvider::validate_requests("", &[request("a")]);
        assert!(matches!(result, Err(SearchIndexError::ValidationError(_))));

        let result = OpenSearchProvider::validate_requests("movies", &[request("a"), request("")]);
        assert!(matches!(result, Err(SearchIndexError::ValidationError(_))));
    }

    #[test]
    fn test_build_bulk_body_pairs_action_and_source() {
        let body = OpenSearchProvider::build_bulk_body(&[request("a"), request("b")]);
        assert_eq!(body.len(), 4);
    }

    #[test]
    fn test_status_error_classification() {
        for status in [429, 502, 503, 504] {
            assert!(
                OpenSearchProvider::status_error(status, "").is_transient(),
                "status {} should be transient",
                status
            );
        }

        for status in [400, 401, 404, 413, 500] {
            assert!(
                !OpenSearchProvider::status_error(status, "").is_transient(),
                "status {} should not be transient",
                status
            );
        }
    }

    #[test]
    fn test_parse_bulk_response_all_succeeded() {
        let requests = vec![request("a"), request("b")];
        let response = json!({
            "took": 3,
            "errors": false,
            "items": [
                { "index": { "_index": "movies", "_id": "a", "status": 201 } },
                { "index": { "_index": "movies", "_id": "b", "status": 200 } }
            ]
        });

        let summary = OpenSearchProvider::parse_bulk_response(&requests, &response).unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.succeeded, 2);
        assert!(summary.is_complete());
    }

    #[test]
    fn test_parse_bulk_response_partial_failure() {
        let requests = vec![request("a"), request("b"), request("c")];
        let response = json!({
            "took": 3,
            "errors": true,
            "items": [
                { "index": { "_id": "a", "status": 201 } },
                { "index": {
                    "_id": "b",
                    "status": 400,
                    "error": { "type": "mapper_parsing_exception", "reason": "failed to parse field [imdb_rating]" }
                } },
                { "index": {
                    "_id": "c",
                    "status": 429,
                    "error": { "type": "es_rejected_execution_exception", "reason": "rejected" }
                } }
            ]
        });

        let summary = OpenSearchProvider::parse_bulk_response(&requests, &response).unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 2);

        let failed_b = &summary.results[1];
        assert_eq!(failed_b.document_id, "b");
        assert!(!failed_b.success);
        let error = failed_b.error.as_ref().unwrap();
        assert!(error.to_string().contains("mapper_parsing_exception"));
        assert!(!error.is_transient());

        assert!(summary.results[2].error.as_ref().unwrap().is_transient());
    }

    #[test]
    fn test_parse_bulk_response_item_count_mismatch() {
        let requests = vec![request("a"), request("b")];
        let response = json!({
            "items": [ { "index": { "_id": "a", "status": 201 } } ]
        });

        let result = OpenSearchProvider::parse_bulk_response(&requests, &response);
        assert!(matches!(result, Err(SearchIndexError::ParseError(_))));
    }

    #[test]
    fn test_parse_bulk_response_without_items() {
        let result = OpenSearchProvider::parse_bulk_response(&[request("a")], &json!({}));
        assert!(matches!(result, Err(SearchIndexError::ParseError(_))));
    }
}
