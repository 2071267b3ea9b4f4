use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::models::{LookupError, LookupResult, Product, ProductId, Stock};

/// Read access to product details and live stock levels
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Find a product by id. `None` when the catalog does not know it.
    async fn get_product(&self, product_id: ProductId) -> LookupResult<Option<Product>>;

    /// Current stock level for a product
    async fn get_stock(&self, product_id: ProductId) -> LookupResult<Stock>;
}

/// Catalog backed by the storefront REST API (`/products/{id}`, `/stock/{id}`)
pub struct HttpProductCatalog {
    client: HttpClient,
    base_url: String,
}

impl HttpProductCatalog {
    /// Create a catalog client with a per-request timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> LookupResult<Self> {
        let client = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn product_url(&self, product_id: ProductId) -> String {
        format!("{}/products/{}", self.base_url, product_id)
    }

    fn stock_url(&self, product_id: ProductId) -> String {
        format!("{}/stock/{}", self.base_url, product_id)
    }
}

#[async_trait]
impl ProductCatalog for HttpProductCatalog {
    #[instrument(skip(self), fields(catalog.url = %self.base_url))]
    async fn get_product(&self, product_id: ProductId) -> LookupResult<Option<Product>> {
        let url = self.product_url(product_id);
        let response = self.client.get(&url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!("Product not found in catalog");
                Ok(None)
            }
            status if status.is_success() => {
                // A successful response with an empty body counts as no data
                let body = response.text().await?;
                if body.trim().is_empty() || body.trim() == "null" {
                    return Ok(None);
                }
                let product = serde_json::from_str(&body).map_err(|e| LookupError::Decode {
                    message: e.to_string(),
                })?;
                Ok(Some(product))
            }
            status => {
                warn!(status = status.as_u16(), "Catalog rejected product lookup");
                Err(LookupError::Status {
                    status: status.as_u16(),
                    url,
                })
            }
        }
    }

    #[instrument(skip(self), fields(catalog.url = %self.base_url))]
    async fn get_stock(&self, product_id: ProductId) -> LookupResult<Stock> {
        let url = self.stock_url(product_id);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Catalog rejected stock lookup");
            return Err(LookupError::Status {
                status: status.as_u16(),
                url,
            });
        }

        Ok(response.json::<Stock>().await?)
    }
}

/// Catalog holding a fixed set of products, used for tests and local runs
#[derive(Default)]
pub struct InMemoryProductCatalog {
    products: RwLock<HashMap<ProductId, Product>>,
    stock: RwLock<HashMap<ProductId, u32>>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration of a product with its stock level
    pub fn with_product(self, product: Product, stock: u32) -> Self {
        self.upsert(product, stock);
        self
    }

    // Each map entry is written in one insert, so a poisoned lock still
    // guards consistent data and is recovered rather than reported.
    pub fn upsert(&self, product: Product, stock: u32) {
        let id = product.id;
        self.products
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, product);
        self.set_stock(id, stock);
    }

    pub fn set_stock(&self, product_id: ProductId, amount: u32) {
        self.stock
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(product_id, amount);
    }
}

#[async_trait]
impl ProductCatalog for InMemoryProductCatalog {
    async fn get_product(&self, product_id: ProductId) -> LookupResult<Option<Product>> {
        let products = self.products.read().unwrap_or_else(PoisonError::into_inner);
        Ok(products.get(&product_id).cloned())
    }

    async fn get_stock(&self, product_id: ProductId) -> LookupResult<Stock> {
        let stock = self.stock.read().unwrap_or_else(PoisonError::into_inner);
        stock
            .get(&product_id)
            .map(|amount| Stock {
                id: product_id,
                amount: *amount,
            })
            .ok_or_else(|| LookupError::Status {
                status: 404,
                url: format!("memory://stock/{}", product_id),
            })
    }
}
