use std::sync::Arc;
use tracing::warn;

use crate::models::{Cart, CartError, ProductId, QuantityUpdate, ServiceResult};

use super::{CartManager, QuantityChange};

pub const ADD_PRODUCT_FAILED: &str = "could not add product";
pub const REMOVE_PRODUCT_FAILED: &str = "could not remove product";
pub const QUANTITY_UPDATE_FAILED: &str = "quantity update failed";
pub const QUANTITY_EXCEEDS_STOCK: &str = "requested quantity exceeds stock";
pub const CLEAR_CART_FAILED: &str = "could not clear cart";

/// Sink for user-facing error messages (toasts, banners, log lines)
pub trait Notifier: Send + Sync {
    fn notify_error(&self, message: &str);
}

/// Notifier that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify_error(&self, message: &str) {
        warn!(notification = message, "User-facing cart error");
    }
}

/// Cart operations exposed to a UI layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartOperation {
    Add,
    Remove,
    SetQuantity,
    Clear,
}

impl CartOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            CartOperation::Add => "add_product",
            CartOperation::Remove => "remove_product",
            CartOperation::SetQuantity => "set_quantity",
            CartOperation::Clear => "clear",
        }
    }

    /// Message shown to the user when this operation fails with `err`
    pub fn failure_message(&self, err: &CartError) -> &'static str {
        match self {
            CartOperation::Add => ADD_PRODUCT_FAILED,
            CartOperation::Remove => REMOVE_PRODUCT_FAILED,
            CartOperation::SetQuantity => match err {
                CartError::InsufficientStock { .. } => QUANTITY_EXCEEDS_STOCK,
                _ => QUANTITY_UPDATE_FAILED,
            },
            CartOperation::Clear => CLEAR_CART_FAILED,
        }
    }
}

/// Wraps a `CartManager` and reports every failed operation to a `Notifier`.
/// Results are passed through unchanged.
#[derive(Clone)]
pub struct NotifyingCart {
    manager: Arc<CartManager>,
    notifier: Arc<dyn Notifier>,
}

impl NotifyingCart {
    pub fn new(manager: Arc<CartManager>, notifier: Arc<dyn Notifier>) -> Self {
        Self { manager, notifier }
    }

    pub fn manager(&self) -> &Arc<CartManager> {
        &self.manager
    }

    pub async fn list_cart(&self) -> Arc<Cart> {
        self.manager.list_cart().await
    }

    pub async fn add_product(&self, product_id: ProductId) -> ServiceResult<Arc<Cart>> {
        let result = self.manager.add_product(product_id).await;
        self.report(CartOperation::Add, result)
    }

    pub async fn remove_product(&self, product_id: ProductId) -> ServiceResult<Arc<Cart>> {
        let result = self.manager.remove_product(product_id).await;
        self.report(CartOperation::Remove, result)
    }

    pub async fn set_quantity(&self, update: QuantityUpdate) -> ServiceResult<QuantityChange> {
        let result = self.manager.set_quantity(update).await;
        self.report(CartOperation::SetQuantity, result)
    }

    pub async fn clear(&self) -> ServiceResult<Arc<Cart>> {
        let result = self.manager.clear().await;
        self.report(CartOperation::Clear, result)
    }

    fn report<T>(&self, operation: CartOperation, result: ServiceResult<T>) -> ServiceResult<T> {
        if let Err(err) = &result {
            warn!(
                operation = operation.as_str(),
                kind = err.kind().as_str(),
                error = %err,
                "Cart operation failed"
            );
            self.notifier.notify_error(operation.failure_message(err));
        }
        result
    }
}
