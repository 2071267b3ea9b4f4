// Services module - business logic layer

pub mod cart_service;
pub mod notifier;

pub use cart_service::{CartManager, QuantityChange};
pub use notifier::{CartOperation, Notifier, NotifyingCart, TracingNotifier};
