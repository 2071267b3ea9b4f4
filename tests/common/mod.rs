#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use cart_rs::handlers::create_app;
use cart_rs::models::Product;
use cart_rs::repositories::{CartStore, InMemoryCartStore, InMemoryProductCatalog};
use cart_rs::services::{CartManager, Notifier, NotifyingCart};
use cart_rs::Metrics;
use reqwest::Client;
use rust_decimal_macros::dec;
use tokio::net::TcpListener;

pub const STORAGE_KEY: &str = "@RocketShoes:cart";

/// Notifier that keeps every message for later assertions
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify_error(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

pub fn sneaker(id: u64) -> Product {
    Product::new(
        id,
        format!("Tênis modelo {}", id),
        dec!(139.90),
        format!("https://rocketseat-cdn.s3-sa-east-1.amazonaws.com/modulo-redux/tenis{}.jpg", id),
    )
}

/// Cart wired to in-memory collaborators that tests can inspect and tweak
pub struct CartHarness {
    pub catalog: Arc<InMemoryProductCatalog>,
    pub store: Arc<InMemoryCartStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub cart: NotifyingCart,
}

impl CartHarness {
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryCartStore::new()))
    }

    pub fn with_store(store: Arc<InMemoryCartStore>) -> Self {
        let catalog = Arc::new(InMemoryProductCatalog::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let manager = CartManager::load(catalog.clone(), store.clone(), STORAGE_KEY);
        let cart = NotifyingCart::new(Arc::new(manager), notifier.clone());

        Self {
            catalog,
            store,
            notifier,
            cart,
        }
    }

    pub fn stock(&self, product_id: u64, amount: u32) -> &Self {
        self.catalog.upsert(sneaker(product_id), amount);
        self
    }

    /// Build a fresh manager from whatever the store currently holds
    pub fn reload(&self) -> CartManager {
        CartManager::load(self.catalog.clone(), self.store.clone(), STORAGE_KEY)
    }

    pub fn stored_bytes(&self) -> Option<Vec<u8>> {
        self.store.read(STORAGE_KEY).unwrap()
    }
}

/// Running HTTP server backed by in-memory collaborators
pub struct TestEnvironment {
    pub client: Client,
    pub base_url: String,
    pub catalog: Arc<InMemoryProductCatalog>,
}

impl TestEnvironment {
    pub async fn new() -> Self {
        let catalog = Arc::new(InMemoryProductCatalog::new());
        let manager = CartManager::load(
            catalog.clone(),
            Arc::new(InMemoryCartStore::new()),
            STORAGE_KEY,
        );
        let cart = Arc::new(NotifyingCart::new(
            Arc::new(manager),
            Arc::new(RecordingNotifier::default()),
        ));
        let app = create_app(cart, Arc::new(Metrics::new().unwrap()));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            client: Client::new(),
            base_url: format!("http://{}", addr),
            catalog,
        }
    }
}
