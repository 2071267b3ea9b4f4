use thiserror::Error;

use super::ProductId;

/// Service-level errors returned by cart operations
#[derive(Debug, Error)]
pub enum CartError {
    #[error("Product lookup failed: product {product_id} not found")]
    ProductNotFound { product_id: ProductId },

    #[error("Product lookup failed: product_id={product_id}: {source}")]
    ProductLookup {
        product_id: ProductId,
        #[source]
        source: LookupError,
    },

    #[error("Quantity update failed: product_id={product_id}: {source}")]
    StockLookup {
        product_id: ProductId,
        #[source]
        source: LookupError,
    },

    #[error("Requested quantity exceeds stock: product_id={product_id}, requested={requested}, available={available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    #[error("Product not in cart: {product_id}")]
    ProductNotInCart { product_id: ProductId },

    #[error("Failed to persist cart: {source}")]
    Storage {
        #[from]
        source: StoreError,
    },
}

/// Failure classes callers can assert on without matching every variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartErrorKind {
    LookupNotFound,
    LookupTransport,
    StockInsufficient,
    EntryNotFound,
    Storage,
}

impl CartError {
    pub fn kind(&self) -> CartErrorKind {
        match self {
            CartError::ProductNotFound { .. } => CartErrorKind::LookupNotFound,
            CartError::ProductLookup { .. } | CartError::StockLookup { .. } => {
                CartErrorKind::LookupTransport
            }
            CartError::InsufficientStock { .. } => CartErrorKind::StockInsufficient,
            CartError::ProductNotInCart { .. } => CartErrorKind::EntryNotFound,
            CartError::Storage { .. } => CartErrorKind::Storage,
        }
    }
}

impl CartErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CartErrorKind::LookupNotFound => "lookup_not_found",
            CartErrorKind::LookupTransport => "lookup_transport",
            CartErrorKind::StockInsufficient => "stock_insufficient",
            CartErrorKind::EntryNotFound => "entry_not_found",
            CartErrorKind::Storage => "storage",
        }
    }
}

/// Errors raised by the product catalog
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Catalog request failed: {message}")]
    Transport { message: String },

    #[error("Catalog returned status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Catalog response could not be decoded: {message}")]
    Decode { message: String },
}

impl From<reqwest::Error> for LookupError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            LookupError::Decode {
                message: err.to_string(),
            }
        } else {
            LookupError::Transport {
                message: err.to_string(),
            }
        }
    }
}

/// Errors raised by the persistent cart store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    #[error("Storage unavailable: {message}")]
    Unavailable { message: String },
}

/// Errors raised while decoding persisted cart bytes
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Malformed cart snapshot: {source}")]
    Malformed {
        #[from]
        source: serde_json::Error,
    },

    #[error("Unsupported cart snapshot version: found={found}, supported={supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("Invalid cart snapshot contents: {source}")]
    Invalid {
        #[from]
        source: ValidationError,
    },
}

/// Validation errors for cart contents
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Duplicate cart entry: product_id={product_id}")]
    DuplicateEntry { product_id: ProductId },

    #[error("Value out of range: {field}, min={min}, value={value}")]
    OutOfRange {
        field: String,
        min: String,
        value: String,
    },
}

/// Result type alias for cart operations
pub type ServiceResult<T> = Result<T, CartError>;

/// Result type alias for catalog lookups
pub type LookupResult<T> = Result<T, LookupError>;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;
