// Repositories module - data access layer

pub mod catalog;
pub mod store;

pub use catalog::{HttpProductCatalog, InMemoryProductCatalog, ProductCatalog};
pub use store::{CartStore, FileCartStore, InMemoryCartStore};
