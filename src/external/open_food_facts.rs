// ABOUTME: Open Food Facts API client for barcode-based product lookup
// ABOUTME: Implements product retrieval, caching, rate limiting, and a mock source for testing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriJudge

//! Open Food Facts API Client
//!
//! Client for the Open Food Facts product-by-barcode endpoint. The API is
//! free and unauthenticated; the project asks clients to send a descriptive
//! `User-Agent` and stay under 100 product requests per minute.
//!
//! # Features
//! - Product lookup by barcode
//! - TTL caching to minimize API calls
//! - Rate limiting
//! - Mock source for testing
//!
//! # API Reference
//! Open Food Facts API: <https://openfoodfacts.github.io/openfoodfacts-server/api/>
//!
//! # Example
//! ```rust,no_run
//! use nutrijudge::config::ProductLookupConfig;
//! use nutrijudge::external::{OpenFoodFactsClient, ProductSource};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OpenFoodFactsClient::new(ProductLookupConfig::default())?;
//! let product = client.product_by_barcode("3017620422003").await?;
//! println!("{}", product.display_name());
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::config::ProductLookupConfig;
use crate::errors::AppError;
use crate::models::ProductRecord;

/// Service label used in error messages
const SERVICE: &str = "Open Food Facts";

/// Connection timeout
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Request timeout
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Status flag value for a found product in the v0 response
const STATUS_FOUND: i64 = 1;

/// Source of product records, keyed by barcode
///
/// The session controller depends on this trait rather than the concrete
/// client so tests can substitute a scripted source.
#[async_trait]
pub trait ProductSource: Send + Sync {
    /// Look up a product by barcode
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for unknown barcodes, `InvalidInput` for
    /// malformed barcodes, and an external-service error for transport or
    /// decode failures.
    async fn product_by_barcode(&self, barcode: &str) -> Result<ProductRecord, AppError>;
}

/// Open Food Facts v0 product response envelope
#[derive(Debug, Deserialize)]
struct ProductResponse {
    /// 1 = found, 0 = not found
    status: i64,
    #[serde(default)]
    status_verbose: Option<String>,
    #[serde(default)]
    product: Option<ProductRecord>,
}

/// Cache entry with expiration
#[derive(Debug, Clone)]
struct CacheEntry {
    product: ProductRecord,
    expires_at: Instant,
}

/// Rate limiter for API requests
#[derive(Debug)]
struct RateLimiter {
    requests: Vec<Instant>,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    const fn new(limit: u32, window: Duration) -> Self {
        Self {
            requests: Vec::new(),
            limit,
            window,
        }
    }

    /// Check if a request can be made, removing expired entries
    fn can_request(&mut self) -> bool {
        let now = Instant::now();
        self.requests
            .retain(|&t| now.duration_since(t) < self.window);
        self.requests.len() < self.limit as usize
    }

    /// Record a new request
    fn record_request(&mut self) {
        self.requests.push(Instant::now());
    }

    /// Wait until a request can be made
    async fn wait_if_needed(&mut self) {
        while !self.can_request() {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }
}

/// Open Food Facts API client
pub struct OpenFoodFactsClient {
    config: ProductLookupConfig,
    http_client: reqwest::Client,
    cache: Arc<RwLock<HashMap<String, CacheEntry>>>,
    rate_limiter: Arc<RwLock<RateLimiter>>,
}

impl OpenFoodFactsClient {
    /// Create a new Open Food Facts client
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: ProductLookupConfig) -> Result<Self, AppError> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        let rate_limiter = RateLimiter::new(config.rate_limit_per_minute, Duration::from_secs(60));

        Ok(Self {
            config,
            http_client,
            cache: Arc::new(RwLock::new(HashMap::new())),
            rate_limiter: Arc::new(RwLock::new(rate_limiter)),
        })
    }

    /// Validate a barcode before hitting the network
    fn validate_barcode(barcode: &str) -> Result<(), AppError> {
        if barcode.is_empty() {
            return Err(AppError::invalid_input("Barcode cannot be empty"));
        }
        if !barcode.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AppError::invalid_input(format!(
                "Barcode {barcode:?} must contain digits only"
            )));
        }
        Ok(())
    }

    /// Clear the product cache (useful for testing)
    pub async fn clear_cache(&self) {
        self.cache.write().await.clear();
    }

    /// Number of cached products (useful for monitoring)
    pub async fn cache_len(&self) -> usize {
        self.cache.read().await.len()
    }
}

#[async_trait]
impl ProductSource for OpenFoodFactsClient {
    #[instrument(skip(self))]
    async fn product_by_barcode(&self, barcode: &str) -> Result<ProductRecord, AppError> {
        Self::validate_barcode(barcode)?;

        // Check cache first
        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(barcode) {
                if Instant::now() < entry.expires_at {
                    debug!("Cache hit for barcode {barcode}");
                    return Ok(entry.product.clone());
                }
            }
        }

        // Wait for rate limit if needed
        {
            let mut limiter = self.rate_limiter.write().await;
            limiter.wait_if_needed().await;
            limiter.record_request();
        }

        let url = format!(
            "{}/api/v0/product/{barcode}.json",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::external_service(SERVICE, e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::external_service(
                SERVICE,
                format!(
                    "HTTP {}: {}",
                    response.status(),
                    response.text().await.unwrap_or_default()
                ),
            ));
        }

        let product_response: ProductResponse = response.json().await.map_err(|e| {
            AppError::external_service(SERVICE, format!("JSON parse error: {e}"))
        })?;

        if product_response.status != STATUS_FOUND {
            warn!(
                "Barcode {barcode} not in database ({})",
                product_response.status_verbose.as_deref().unwrap_or("-")
            );
            return Err(AppError::not_found(format!("Product with barcode {barcode}"))
                .with_resource_id(barcode));
        }

        let product = product_response.product.ok_or_else(|| {
            AppError::external_service(SERVICE, "Response flagged found but carried no product")
        })?;

        // Cache the result
        {
            let mut cache = self.cache.write().await;
            cache.insert(
                barcode.to_owned(),
                CacheEntry {
                    product: product.clone(),
                    expires_at: Instant::now()
                        + Duration::from_secs(self.config.cache_ttl_secs),
                },
            );
        }

        Ok(product)
    }
}

/// Mock product source for testing (no API calls)
pub struct MockProductSource {
    products: HashMap<String, ProductRecord>,
    fail_transport: bool,
    lookups: AtomicUsize,
}

impl MockProductSource {
    /// Create an empty mock source; unknown barcodes report not-found
    #[must_use]
    pub fn new() -> Self {
        Self {
            products: HashMap::new(),
            fail_transport: false,
            lookups: AtomicUsize::new(0),
        }
    }

    /// Create a mock source that fails every lookup with a transport error
    #[must_use]
    pub fn failing() -> Self {
        Self {
            products: HashMap::new(),
            fail_transport: true,
            lookups: AtomicUsize::new(0),
        }
    }

    /// Register a product under a barcode
    #[must_use]
    pub fn with_product(mut self, barcode: impl Into<String>, product: ProductRecord) -> Self {
        self.products.insert(barcode.into(), product);
        self
    }

    /// Number of lookups issued against this source
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl Default for MockProductSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProductSource for MockProductSource {
    async fn product_by_barcode(&self, barcode: &str) -> Result<ProductRecord, AppError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        if self.fail_transport {
            return Err(AppError::external_service(SERVICE, "connection refused"));
        }

        OpenFoodFactsClient::validate_barcode(barcode)?;

        self.products
            .get(barcode)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Product with barcode {barcode}")))
    }
}
