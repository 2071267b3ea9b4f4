use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::models::{
    Cart, CartEntry, CartError, CartSnapshot, ProductId, QuantityUpdate, ServiceResult,
    StoreError, MIN_CART_AMOUNT,
};
use crate::repositories::{CartStore, ProductCatalog};

/// Outcome of a quantity update that did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum QuantityChange {
    /// The new amount was stored
    Applied(Arc<Cart>),
    /// The requested amount was below the minimum; nothing changed
    Ignored,
}

/// Owns the session cart and keeps the persisted copy in step with it.
///
/// Mutations are serialised by a gate held from the first read of the cart
/// until the new cart is committed, so two overlapping calls never work from
/// the same stale cart. Readers never wait on the gate.
pub struct CartManager {
    catalog: Arc<dyn ProductCatalog>,
    store: Arc<dyn CartStore>,
    storage_key: String,
    cart: RwLock<Arc<Cart>>,
    mutation_gate: Mutex<()>,
}

impl CartManager {
    /// Create a manager, restoring whatever cart the store holds under `storage_key`.
    /// Unreadable or undecodable data yields an empty cart.
    pub fn load(
        catalog: Arc<dyn ProductCatalog>,
        store: Arc<dyn CartStore>,
        storage_key: impl Into<String>,
    ) -> Self {
        let storage_key = storage_key.into();
        let cart = restore_cart(store.as_ref(), &storage_key);
        info!(
            storage_key = %storage_key,
            entries = cart.len(),
            "Cart manager initialized"
        );

        Self {
            catalog,
            store,
            storage_key,
            cart: RwLock::new(Arc::new(cart)),
            mutation_gate: Mutex::new(()),
        }
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Current cart snapshot
    pub async fn list_cart(&self) -> Arc<Cart> {
        Arc::clone(&*self.cart.read().await)
    }

    /// Add a product. Products already in the cart get their amount raised by one,
    /// subject to the same stock check as `set_quantity`.
    #[instrument(skip(self))]
    pub async fn add_product(&self, product_id: ProductId) -> ServiceResult<Arc<Cart>> {
        let _gate = self.mutation_gate.lock().await;
        let current = self.list_cart().await;

        if let Some(entry) = current.find(product_id) {
            let requested = entry.amount.saturating_add(1);
            debug!(requested, "Product already in cart, incrementing");
            return self.apply_quantity(&current, product_id, requested).await;
        }

        let product = self
            .catalog
            .get_product(product_id)
            .await
            .map_err(|source| CartError::ProductLookup { product_id, source })?
            .ok_or(CartError::ProductNotFound { product_id })?;

        let mut updated = Cart::clone(&current);
        updated.insert_entry(CartEntry::from_product(product));

        let cart = self.commit(updated).await?;
        info!("Product added to cart");
        Ok(cart)
    }

    /// Remove a product's entry
    #[instrument(skip(self))]
    pub async fn remove_product(&self, product_id: ProductId) -> ServiceResult<Arc<Cart>> {
        let _gate = self.mutation_gate.lock().await;
        let current = self.list_cart().await;

        let mut updated = Cart::clone(&current);
        if !updated.remove_entry(product_id) {
            return Err(CartError::ProductNotInCart { product_id });
        }

        let cart = self.commit(updated).await?;
        info!("Product removed from cart");
        Ok(cart)
    }

    /// Set the amount of a product already in the cart, checked against live stock.
    /// Amounts below the minimum are ignored without touching the store.
    #[instrument(skip(self), fields(product_id = update.product_id, amount = update.amount))]
    pub async fn set_quantity(&self, update: QuantityUpdate) -> ServiceResult<QuantityChange> {
        if update.amount < MIN_CART_AMOUNT {
            debug!("Amount below minimum, ignoring update");
            return Ok(QuantityChange::Ignored);
        }

        let _gate = self.mutation_gate.lock().await;
        let current = self.list_cart().await;

        self.apply_quantity(&current, update.product_id, update.amount)
            .await
            .map(QuantityChange::Applied)
    }

    /// Empty the cart
    #[instrument(skip(self))]
    pub async fn clear(&self) -> ServiceResult<Arc<Cart>> {
        let _gate = self.mutation_gate.lock().await;
        let cart = self.commit(Cart::new()).await?;
        info!("Cart cleared");
        Ok(cart)
    }

    /// Caller must hold the mutation gate
    async fn apply_quantity(
        &self,
        current: &Cart,
        product_id: ProductId,
        amount: u32,
    ) -> ServiceResult<Arc<Cart>> {
        if !current.contains(product_id) {
            return Err(CartError::ProductNotInCart { product_id });
        }

        let stock = self
            .catalog
            .get_stock(product_id)
            .await
            .map_err(|source| CartError::StockLookup { product_id, source })?;

        if stock.amount < amount {
            warn!(
                requested = amount,
                available = stock.amount,
                "Requested quantity exceeds stock"
            );
            return Err(CartError::InsufficientStock {
                product_id,
                requested: amount,
                available: stock.amount,
            });
        }

        let mut updated = current.clone();
        updated.set_amount(product_id, amount);

        let cart = self.commit(updated).await?;
        info!(amount, "Cart quantity updated");
        Ok(cart)
    }

    /// Persist a new cart, then publish it. Readers observe either the old cart
    /// or the new one, and the new one only once it is stored.
    async fn commit(&self, cart: Cart) -> ServiceResult<Arc<Cart>> {
        let bytes = CartSnapshot::from_cart(&cart)
            .encode()
            .map_err(StoreError::from)?;

        let mut published = self.cart.write().await;
        self.store.write(&self.storage_key, &bytes)?;

        let cart = Arc::new(cart);
        *published = Arc::clone(&cart);
        debug!(entries = cart.len(), "Cart persisted");
        Ok(cart)
    }
}

fn restore_cart(store: &dyn CartStore, storage_key: &str) -> Cart {
    let bytes = match store.read(storage_key) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return Cart::new(),
        Err(e) => {
            warn!(error = %e, "Failed to read stored cart, starting empty");
            return Cart::new();
        }
    };

    match CartSnapshot::decode(&bytes).and_then(CartSnapshot::into_cart) {
        Ok(cart) => cart,
        Err(e) => {
            warn!(error = %e, "Stored cart is unreadable, starting empty");
            Cart::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CartErrorKind, LookupError, LookupResult, Product, Stock, StoreResult};
    use crate::repositories::InMemoryCartStore;
    use async_trait::async_trait;
    use mockall::mock;
    use mockall::predicate::eq;
    use rust_decimal_macros::dec;

    mock! {
        TestProductCatalog {}

        #[async_trait]
        impl ProductCatalog for TestProductCatalog {
            async fn get_product(&self, product_id: ProductId) -> LookupResult<Option<Product>>;
            async fn get_stock(&self, product_id: ProductId) -> LookupResult<Stock>;
        }
    }

    mock! {
        TestCartStore {}

        impl CartStore for TestCartStore {
            fn read(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;
            fn write(&self, key: &str, bytes: &[u8]) -> StoreResult<()>;
        }
    }

    const KEY: &str = "@RocketShoes:cart";

    fn create_test_product(id: ProductId) -> Product {
        Product::new(id, format!("Tênis {}", id), dec!(139.90), format!("{}.jpg", id))
    }

    fn store_with(entries: &[(ProductId, u32)]) -> Arc<InMemoryCartStore> {
        let mut cart = Cart::new();
        for (id, amount) in entries {
            let mut entry = CartEntry::from_product(create_test_product(*id));
            entry.amount = *amount;
            cart.insert_entry(entry);
        }
        let store = Arc::new(InMemoryCartStore::new());
        let bytes = CartSnapshot::from_cart(&cart).encode().unwrap();
        store.write(KEY, &bytes).unwrap();
        store
    }

    fn stock(id: ProductId, amount: u32) -> LookupResult<Stock> {
        Ok(Stock { id, amount })
    }

    #[tokio::test]
    async fn test_load_empty_store() {
        let manager = CartManager::load(
            Arc::new(MockTestProductCatalog::new()),
            Arc::new(InMemoryCartStore::new()),
            KEY,
        );
        assert!(manager.list_cart().await.is_empty());
    }

    #[tokio::test]
    async fn test_load_malformed_data_starts_empty() {
        let store = Arc::new(InMemoryCartStore::new());
        store.write(KEY, b"{\"version\": 1, \"entries\": [").unwrap();

        let manager = CartManager::load(Arc::new(MockTestProductCatalog::new()), store, KEY);
        assert!(manager.list_cart().await.is_empty());
    }

    #[tokio::test]
    async fn test_load_read_failure_starts_empty() {
        let mut store = MockTestCartStore::new();
        store.expect_read().times(1).returning(|_| {
            Err(StoreError::Unavailable {
                message: "storage disabled".to_string(),
            })
        });

        let manager =
            CartManager::load(Arc::new(MockTestProductCatalog::new()), Arc::new(store), KEY);
        assert!(manager.list_cart().await.is_empty());
    }

    #[tokio::test]
    async fn test_add_new_product_appends_with_amount_one() {
        let mut catalog = MockTestProductCatalog::new();
        catalog
            .expect_get_product()
            .with(eq(5))
            .times(1)
            .returning(|id| Ok(Some(create_test_product(id))));
        catalog.expect_get_stock().times(0);

        let store = store_with(&[(1, 1)]);
        let manager = CartManager::load(Arc::new(catalog), store.clone(), KEY);

        let cart = manager.add_product(5).await.unwrap();

        let ids: Vec<ProductId> = cart.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 5]);
        assert_eq!(cart.find(5).map(|e| e.amount), Some(1));
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_add_unknown_product_fails() {
        let mut catalog = MockTestProductCatalog::new();
        catalog.expect_get_product().returning(|_| Ok(None));

        let store = Arc::new(InMemoryCartStore::new());
        let manager = CartManager::load(Arc::new(catalog), store.clone(), KEY);

        let err = manager.add_product(99).await.unwrap_err();
        assert_eq!(err.kind(), CartErrorKind::LookupNotFound);
        assert!(manager.list_cart().await.is_empty());
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_add_product_lookup_transport_failure() {
        let mut catalog = MockTestProductCatalog::new();
        catalog.expect_get_product().returning(|_| {
            Err(LookupError::Transport {
                message: "connection reset".to_string(),
            })
        });

        let manager =
            CartManager::load(Arc::new(catalog), Arc::new(InMemoryCartStore::new()), KEY);

        let err = manager.add_product(5).await.unwrap_err();
        assert_eq!(err.kind(), CartErrorKind::LookupTransport);
    }

    #[tokio::test]
    async fn test_add_existing_product_increments_after_stock_check() {
        let mut catalog = MockTestProductCatalog::new();
        catalog.expect_get_product().times(0);
        catalog
            .expect_get_stock()
            .with(eq(5))
            .times(1)
            .returning(|id| stock(id, 3));

        let manager = CartManager::load(Arc::new(catalog), store_with(&[(5, 1)]), KEY);

        let cart = manager.add_product(5).await.unwrap();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.find(5).map(|e| e.amount), Some(2));
    }

    #[tokio::test]
    async fn test_add_existing_product_beyond_stock_fails() {
        let mut catalog = MockTestProductCatalog::new();
        catalog.expect_get_stock().returning(|id| stock(id, 2));

        let store = store_with(&[(5, 2)]);
        let manager = CartManager::load(Arc::new(catalog), store.clone(), KEY);

        match manager.add_product(5).await {
            Err(CartError::InsufficientStock {
                requested,
                available,
                ..
            }) => {
                assert_eq!(requested, 3);
                assert_eq!(available, 2);
            }
            other => panic!("Expected InsufficientStock, got {:?}", other),
        }
        assert_eq!(manager.list_cart().await.find(5).map(|e| e.amount), Some(2));
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_remove_product() {
        let store = store_with(&[(1, 1), (5, 2), (7, 1)]);
        let manager = CartManager::load(Arc::new(MockTestProductCatalog::new()), store, KEY);

        let cart = manager.remove_product(5).await.unwrap();
        let ids: Vec<ProductId> = cart.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 7]);
    }

    #[tokio::test]
    async fn test_remove_missing_product_fails_without_write() {
        let store = store_with(&[(1, 1)]);
        let manager =
            CartManager::load(Arc::new(MockTestProductCatalog::new()), store.clone(), KEY);
        let before = manager.list_cart().await;

        let err = manager.remove_product(9).await.unwrap_err();

        assert_eq!(err.kind(), CartErrorKind::EntryNotFound);
        assert_eq!(manager.list_cart().await, before);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_set_quantity_below_minimum_is_ignored() {
        let mut catalog = MockTestProductCatalog::new();
        catalog.expect_get_stock().times(0);

        let store = store_with(&[(5, 2)]);
        let manager = CartManager::load(Arc::new(catalog), store.clone(), KEY);

        let change = manager
            .set_quantity(QuantityUpdate {
                product_id: 5,
                amount: 0,
            })
            .await
            .unwrap();

        assert_eq!(change, QuantityChange::Ignored);
        assert_eq!(manager.list_cart().await.find(5).map(|e| e.amount), Some(2));
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_set_quantity_within_stock() {
        let mut catalog = MockTestProductCatalog::new();
        catalog.expect_get_stock().returning(|id| stock(id, 4));

        let manager = CartManager::load(Arc::new(catalog), store_with(&[(1, 1), (5, 1)]), KEY);

        let change = manager
            .set_quantity(QuantityUpdate {
                product_id: 5,
                amount: 4,
            })
            .await
            .unwrap();

        match change {
            QuantityChange::Applied(cart) => {
                assert_eq!(cart.find(5).map(|e| e.amount), Some(4));
                assert_eq!(cart.find(1).map(|e| e.amount), Some(1));
                assert_eq!(cart.entries()[0].id, 1);
            }
            QuantityChange::Ignored => panic!("Expected update to be applied"),
        }
    }

    #[tokio::test]
    async fn test_set_quantity_stock_lookup_failure() {
        let mut catalog = MockTestProductCatalog::new();
        catalog.expect_get_stock().returning(|_| {
            Err(LookupError::Status {
                status: 500,
                url: "http://localhost:3333/stock/5".to_string(),
            })
        });

        let manager = CartManager::load(Arc::new(catalog), store_with(&[(5, 1)]), KEY);

        let err = manager
            .set_quantity(QuantityUpdate {
                product_id: 5,
                amount: 2,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::StockLookup { product_id: 5, .. }));
        assert_eq!(manager.list_cart().await.find(5).map(|e| e.amount), Some(1));
    }

    // A quantity update for a product that is not in the cart is reported as
    // entry-not-found and never reaches the catalog.
    #[tokio::test]
    async fn test_set_quantity_for_absent_product_is_entry_not_found() {
        let mut catalog = MockTestProductCatalog::new();
        catalog.expect_get_stock().times(0);

        let store = Arc::new(InMemoryCartStore::new());
        let manager = CartManager::load(Arc::new(catalog), store.clone(), KEY);

        let err = manager
            .set_quantity(QuantityUpdate {
                product_id: 3,
                amount: 1,
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), CartErrorKind::EntryNotFound);
        assert!(manager.list_cart().await.is_empty());
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_cart_unchanged() {
        let mut catalog = MockTestProductCatalog::new();
        catalog
            .expect_get_product()
            .returning(|id| Ok(Some(create_test_product(id))));

        let mut store = MockTestCartStore::new();
        store.expect_read().returning(|_| Ok(None));
        store.expect_write().times(1).returning(|_, _| {
            Err(StoreError::Unavailable {
                message: "quota exceeded".to_string(),
            })
        });

        let manager = CartManager::load(Arc::new(catalog), Arc::new(store), KEY);

        let err = manager.add_product(5).await.unwrap_err();
        assert_eq!(err.kind(), CartErrorKind::Storage);
        assert!(manager.list_cart().await.is_empty());
    }

    #[tokio::test]
    async fn test_writes_go_to_configured_key() {
        let mut catalog = MockTestProductCatalog::new();
        catalog
            .expect_get_product()
            .returning(|id| Ok(Some(create_test_product(id))));

        let mut store = MockTestCartStore::new();
        store.expect_read().with(eq("custom:key")).returning(|_| Ok(None));
        store
            .expect_write()
            .withf(|key, bytes| key == "custom:key" && !bytes.is_empty())
            .times(1)
            .returning(|_, _| Ok(()));

        let manager = CartManager::load(Arc::new(catalog), Arc::new(store), "custom:key");
        assert_eq!(manager.storage_key(), "custom:key");
        manager.add_product(5).await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_cart() {
        let store = store_with(&[(1, 1), (2, 3)]);
        let manager =
            CartManager::load(Arc::new(MockTestProductCatalog::new()), store.clone(), KEY);

        let cart = manager.clear().await.unwrap();
        assert!(cart.is_empty());

        let reloaded = CartManager::load(Arc::new(MockTestProductCatalog::new()), store, KEY);
        assert!(reloaded.list_cart().await.is_empty());
    }

    #[tokio::test]
    async fn test_listed_snapshot_is_not_affected_by_later_mutations() {
        let mut catalog = MockTestProductCatalog::new();
        catalog
            .expect_get_product()
            .returning(|id| Ok(Some(create_test_product(id))));

        let manager =
            CartManager::load(Arc::new(catalog), Arc::new(InMemoryCartStore::new()), KEY);
        let before = manager.list_cart().await;

        manager.add_product(5).await.unwrap();

        assert!(before.is_empty());
        assert_eq!(manager.list_cart().await.len(), 1);
    }
}
