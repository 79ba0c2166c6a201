//! Product matcher API client
//!
//! Resolves an ingredient name to retail product matches via the external
//! product-matching service. One POST per ingredient; callers fan out and
//! each call fails or succeeds on its own.

use crate::config::MatcherConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = "platemate/0.1.0";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Product matcher client errors
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Matcher request body
#[derive(Debug, Serialize)]
struct MatcherRequest {
    query: String,
}

/// Matcher response body
///
/// An absent `results` field means zero matches, same as an empty list.
#[derive(Debug, Deserialize)]
struct MatcherResponse {
    #[serde(default)]
    results: Vec<RawProductMatch>,
}

/// One match as the matcher returns it
///
/// `sales` is a whole-sale aggregate, not a per-unit figure; see
/// [`normalize_sales`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawProductMatch {
    /// Product description
    pub product: String,
    /// Backend product identifier
    #[serde(default)]
    pub product_id: String,
    /// Aggregate sales figure
    #[serde(default)]
    pub sales: f64,
    /// Whether the product is zero-waste packaged
    #[serde(default)]
    pub zero_waste: bool,
    /// How often the product appears in the transaction data
    #[serde(default)]
    pub popularity: u64,
    /// Related products the matcher suggests alongside this one
    #[serde(default)]
    pub suggested_addons: Vec<String>,
}

/// One product match, normalized for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductMatch {
    /// Product description
    pub product: String,
    /// Backend product identifier
    pub product_id: String,
    /// Sales figure as received
    pub raw_sales: f64,
    /// Normalized per-unit figure, rounded to two decimals
    pub display_sales: f64,
    /// Whether the product is zero-waste packaged
    pub zero_waste: bool,
    /// How often the product appears in the transaction data
    pub popularity: u64,
    /// Related products the matcher suggests alongside this one
    pub suggested_addons: Vec<String>,
}

impl ProductMatch {
    /// Build the display record from a raw matcher entry
    ///
    /// This is the single place the sales normalization and rounding are
    /// applied; nothing downstream does further arithmetic.
    pub fn from_raw(raw: RawProductMatch) -> Self {
        Self {
            product: raw.product,
            product_id: raw.product_id,
            raw_sales: raw.sales,
            display_sales: round2(normalize_sales(raw.sales)),
            zero_waste: raw.zero_waste,
            popularity: raw.popularity,
            suggested_addons: raw.suggested_addons,
        }
    }
}

/// Scale an aggregate sales figure down to a per-unit estimate
///
/// The matcher reports whole-sale aggregates; larger aggregates get a
/// larger divisor. Values of 20 and below pass through unchanged.
pub fn normalize_sales(raw_sales: f64) -> f64 {
    if raw_sales > 100.0 {
        raw_sales / 5.0
    } else if raw_sales > 50.0 {
        raw_sales / 4.0
    } else if raw_sales > 20.0 {
        raw_sales / 3.0
    } else {
        raw_sales
    }
}

/// Round to two decimal places for display
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Resolves one ingredient to its product matches
///
/// Seam for the external product-matching service so the detection engine
/// can be driven against a scripted resolver in tests.
#[async_trait]
pub trait ProductResolver: Send + Sync {
    /// One resolution call for one ingredient
    async fn resolve(&self, ingredient: &str) -> Result<Vec<ProductMatch>, ResolverError>;
}

/// HTTP client for the product matcher service
pub struct ProductMatcherClient {
    http_client: reqwest::Client,
    url: String,
}

impl ProductMatcherClient {
    pub fn new(config: &MatcherConfig) -> Result<Self, ResolverError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout())
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ResolverError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl ProductResolver for ProductMatcherClient {
    async fn resolve(&self, ingredient: &str) -> Result<Vec<ProductMatch>, ResolverError> {
        let query = ingredient.trim();

        tracing::debug!(ingredient = %query, url = %self.url, "Querying product matcher");

        let response = self
            .http_client
            .post(&self.url)
            .json(&MatcherRequest {
                query: query.to_string(),
            })
            .send()
            .await
            .map_err(|e| ResolverError::NetworkError(e.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ResolverError::ApiError(status.as_u16(), error_text));
        }

        let body: MatcherResponse = response
            .json()
            .await
            .map_err(|e| ResolverError::ParseError(e.to_string()))?;

        let matches: Vec<ProductMatch> = body
            .results
            .into_iter()
            .map(ProductMatch::from_raw)
            .collect();

        tracing::debug!(
            ingredient = %query,
            matches = matches.len(),
            "Product matcher answered"
        );

        Ok(matches)
    }
}
