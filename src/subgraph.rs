//! Subgraph Client - GraphQL over HTTP for The Graph endpoints
//!
//! One POST per query. A non-empty `errors` array in the response is a
//! failure even when HTTP succeeded.

use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE},
    Client,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::SubgraphConfig;
use crate::error::FetchError;

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

/// Client for a single subgraph endpoint
#[derive(Debug, Clone)]
pub struct SubgraphClient {
    client: Client,
    url: String,
}

impl SubgraphClient {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Run a query and decode its `data` object
    pub async fn query<T: DeserializeOwned>(&self, query: &str) -> Result<T, FetchError> {
        let body = serde_json::json!({ "query": query });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<GraphQlResponse<T>>()
            .await?;

        debug!(url = %self.url, "subgraph query completed");
        into_data(response)
    }
}

fn into_data<T>(response: GraphQlResponse<T>) -> Result<T, FetchError> {
    if let Some(errors) = response.errors {
        if !errors.is_empty() {
            return Err(FetchError::GraphQl(
                errors
                    .iter()
                    .map(|e| e.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; "),
            ));
        }
    }
    response.data.ok_or(FetchError::MissingData("data"))
}

/// Shared HTTP client for all subgraph endpoints
pub fn http_client(config: &SubgraphConfig) -> Result<Client, FetchError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    let client = Client::builder()
        .timeout(Duration::from_millis(config.timeout_ms))
        .default_headers(headers)
        .build()?;
    Ok(client)
}

/// The three endpoints the dashboard reads from
#[derive(Debug, Clone)]
pub struct Subgraphs {
    pub exchange: SubgraphClient,
    pub masterchef: SubgraphClient,
    pub blocks: SubgraphClient,
}

impl Subgraphs {
    pub fn from_config(config: &SubgraphConfig) -> Result<Self, FetchError> {
        let client = http_client(config)?;
        Ok(Self {
            exchange: SubgraphClient::new(client.clone(), &config.exchange_url),
            masterchef: SubgraphClient::new(client.clone(), &config.masterchef_url),
            blocks: SubgraphClient::new(client, &config.blocks_url),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Bundle {
        #[serde(rename = "ethPrice")]
        eth_price: String,
    }

    #[derive(Debug, Deserialize)]
    struct BundleData {
        bundle: Bundle,
    }

    fn parse(raw: serde_json::Value) -> Result<BundleData, FetchError> {
        let response: GraphQlResponse<BundleData> = serde_json::from_value(raw).unwrap();
        into_data(response)
    }

    #[test]
    fn data_is_returned_when_no_errors() {
        let data = parse(serde_json::json!({
            "data": { "bundle": { "ethPrice": "3120.5" } }
        }))
        .unwrap();
        assert_eq!(data.bundle.eth_price, "3120.5");
    }

    #[test]
    fn graphql_errors_are_joined() {
        let err = parse(serde_json::json!({
            "data": null,
            "errors": [{ "message": "indexer down" }, { "message": "try later" }]
        }))
        .unwrap_err();
        match err {
            FetchError::GraphQl(msg) => assert_eq!(msg, "indexer down; try later"),
            other => panic!("expected GraphQl error, got {:?}", other),
        }
    }

    #[test]
    fn empty_errors_array_is_not_a_failure() {
        let data = parse(serde_json::json!({
            "data": { "bundle": { "ethPrice": "1" } },
            "errors": []
        }));
        assert!(data.is_ok());
    }

    #[test]
    fn missing_data_is_an_error() {
        let err = parse(serde_json::json!({})).unwrap_err();
        assert!(matches!(err, FetchError::MissingData("data")));
    }

    #[test]
    fn client_trims_trailing_slash() {
        let client = SubgraphClient::new(Client::new(), "https://example.com/subgraphs/x/");
        assert_eq!(client.url(), "https://example.com/subgraphs/x");
    }
}
