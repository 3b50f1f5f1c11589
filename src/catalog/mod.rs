//! # Product Catalog
//!
//! Read access to published products. The catalog is injected into the search
//! engine and the order state machine at construction; there is no global
//! registry.
//!
//! ```rust
//! use stapi_core::catalog::{Catalog, InMemoryCatalog};
//! use stapi_core::models::{FieldSpec, Product};
//!
//! # async fn example() -> stapi_core::StapiResult<()> {
//! let catalog = InMemoryCatalog::new();
//! catalog.publish(
//!     Product::builder("test-spotlight")
//!         .constraint("off_nadir", FieldSpec::number_range(0.0, 45.0))
//!         .build(),
//! )?;
//! let product = catalog.get_product("test-spotlight").await?;
//! assert_eq!(product.id, "test-spotlight");
//! # Ok(())
//! # }
//! ```

use crate::error::{StapiError, StapiResult};
use crate::models::Product;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Product lookup consumed by the search engine and the state machine
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Fails with [`StapiError::ProductNotFound`] for unknown ids.
    async fn get_product(&self, product_id: &str) -> StapiResult<Arc<Product>>;

    /// All products, ordered by id.
    async fn list_products(&self) -> StapiResult<Vec<Arc<Product>>>;
}

/// Catalog holding published products in memory
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: RwLock<BTreeMap<String, Arc<Product>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog pre-populated with `products`
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> StapiResult<Self> {
        let catalog = Self::new();
        for product in products {
            catalog.publish(product)?;
        }
        Ok(catalog)
    }

    /// Publish a product. Products are immutable once published, so a second
    /// publish under the same id is refused.
    pub fn publish(&self, product: Product) -> StapiResult<Arc<Product>> {
        if product.id.trim().is_empty() {
            return Err(StapiError::invalid_request(None, "product id must not be empty"));
        }

        let mut products = self.products.write();
        if products.contains_key(&product.id) {
            return Err(StapiError::invalid_request(
                Some(&product.id),
                "a product with this id is already published",
            ));
        }

        info!(
            product_id = %product.id,
            constraints = product.constraints.fields().count(),
            order_parameters = product.order_parameters.fields().count(),
            "📚 CATALOG: Product published"
        );
        let product = Arc::new(product);
        products.insert(product.id.clone(), Arc::clone(&product));
        Ok(product)
    }

    pub fn len(&self) -> usize {
        self.products.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.read().is_empty()
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn get_product(&self, product_id: &str) -> StapiResult<Arc<Product>> {
        self.products
            .read()
            .get(product_id)
            .cloned()
            .ok_or_else(|| StapiError::ProductNotFound {
                product_id: product_id.to_string(),
            })
    }

    async fn list_products(&self) -> StapiResult<Vec<Arc<Product>>> {
        Ok(self.products.read().values().cloned().collect())
    }
}
