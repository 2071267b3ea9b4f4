use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::models::{Cart, CartEntry, CartError, CartErrorKind, ProductId, QuantityUpdate};
use crate::observability::Metrics;
use crate::services::{CartOperation, NotifyingCart, QuantityChange};

/// State for cart handlers
#[derive(Clone)]
pub struct CartHandlerState {
    pub cart: Arc<NotifyingCart>,
    pub metrics: Arc<Metrics>,
}

/// Request body for adding a product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddProductRequest {
    pub product_id: ProductId,
}

/// Request body for setting an entry's amount
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetQuantityRequest {
    pub amount: u32,
}

/// Cart as returned to the UI layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartResponse {
    pub entries: Vec<CartEntry>,
    pub total_items: u64,
    pub subtotal: Decimal,
}

impl From<&Cart> for CartResponse {
    fn from(cart: &Cart) -> Self {
        Self {
            entries: cart.entries().to_vec(),
            total_items: cart.total_items(),
            subtotal: cart.subtotal(),
        }
    }
}

type HandlerError = (StatusCode, Json<Value>);

/// Create cart router with all endpoints
pub fn create_cart_router(cart: Arc<NotifyingCart>, metrics: Arc<Metrics>) -> Router {
    let state = CartHandlerState { cart, metrics };

    Router::new()
        .route("/api/cart", get(get_cart).delete(clear_cart))
        .route("/api/cart/items", post(add_product))
        .route(
            "/api/cart/items/:product_id",
            put(set_quantity).delete(remove_product),
        )
        .with_state(state)
}

/// Get the current cart
#[instrument(skip(state))]
pub async fn get_cart(State(state): State<CartHandlerState>) -> Json<CartResponse> {
    let cart = state.cart.list_cart().await;
    Json(CartResponse::from(cart.as_ref()))
}

/// Add a product, or raise its amount by one if already present
#[instrument(skip(state, request), fields(product_id = request.product_id))]
pub async fn add_product(
    State(state): State<CartHandlerState>,
    Json(request): Json<AddProductRequest>,
) -> Result<(StatusCode, Json<CartResponse>), HandlerError> {
    let result = state.cart.add_product(request.product_id).await;
    let cart = record(&state, CartOperation::Add, result)?;

    info!("Product added via API");
    Ok((StatusCode::CREATED, respond(&state, &cart)))
}

/// Set the amount of a product already in the cart
#[instrument(skip(state, request), fields(amount = request.amount))]
pub async fn set_quantity(
    State(state): State<CartHandlerState>,
    Path(product_id): Path<ProductId>,
    Json(request): Json<SetQuantityRequest>,
) -> Result<Json<CartResponse>, HandlerError> {
    let update = QuantityUpdate {
        product_id,
        amount: request.amount,
    };
    let result = state.cart.set_quantity(update).await;

    let cart = match record(&state, CartOperation::SetQuantity, result)? {
        QuantityChange::Applied(cart) => cart,
        QuantityChange::Ignored => state.cart.list_cart().await,
    };

    Ok(respond(&state, &cart))
}

/// Remove a product from the cart
#[instrument(skip(state))]
pub async fn remove_product(
    State(state): State<CartHandlerState>,
    Path(product_id): Path<ProductId>,
) -> Result<Json<CartResponse>, HandlerError> {
    let result = state.cart.remove_product(product_id).await;
    let cart = record(&state, CartOperation::Remove, result)?;

    Ok(respond(&state, &cart))
}

/// Empty the cart
#[instrument(skip(state))]
pub async fn clear_cart(
    State(state): State<CartHandlerState>,
) -> Result<Json<CartResponse>, HandlerError> {
    let result = state.cart.clear().await;
    let cart = record(&state, CartOperation::Clear, result)?;

    Ok(respond(&state, &cart))
}

/// Count the operation and turn failures into HTTP responses
fn record<T>(
    state: &CartHandlerState,
    operation: CartOperation,
    result: Result<T, CartError>,
) -> Result<T, HandlerError> {
    state
        .metrics
        .record_cart_operation(operation.as_str(), result.is_ok());

    result.map_err(|err| cart_error_to_response(operation, err))
}

fn respond(state: &CartHandlerState, cart: &Cart) -> Json<CartResponse> {
    state.metrics.set_cart_entries(cart.len());
    Json(CartResponse::from(cart))
}

/// Convert CartError to HTTP response
fn cart_error_to_response(operation: CartOperation, err: CartError) -> HandlerError {
    let kind = err.kind();
    let status = match kind {
        CartErrorKind::LookupNotFound | CartErrorKind::EntryNotFound => StatusCode::NOT_FOUND,
        CartErrorKind::StockInsufficient => StatusCode::CONFLICT,
        CartErrorKind::LookupTransport => StatusCode::BAD_GATEWAY,
        CartErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(json!({
            "error": err.to_string(),
            "message": operation.failure_message(&err),
            "kind": kind.as_str(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}
