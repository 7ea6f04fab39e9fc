use std::sync::Arc;

use marche_catalog::Product;
use marche_shared::Role;
use uuid::Uuid;

use crate::identity::Actor;
use crate::repository::ProductRepository;
use crate::services::subscription::SubscriptionService;
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price_xof: i64,
    pub stock: i32,
}

pub struct CatalogService {
    products: Arc<dyn ProductRepository>,
    subscriptions: Arc<SubscriptionService>,
}

impl CatalogService {
    pub fn new(products: Arc<dyn ProductRepository>, subscriptions: Arc<SubscriptionService>) -> Self {
        Self { products, subscriptions }
    }

    /// List a product for sale. Only sellers whose subscription (or trial)
    /// is current may list.
    pub async fn create_product(&self, actor: &Actor, input: NewProduct) -> CoreResult<Product> {
        actor.require(Role::Seller)?;
        if input.name.trim().is_empty() {
            return Err(CoreError::validation("Product name is required", &["name"]));
        }
        self.subscriptions.ensure_can_create_products(actor.user_id).await?;

        let mut product = Product::new(actor.user_id, input.name.trim().to_string(), input.price_xof, input.stock)?;
        if let Some(description) = input.description {
            product = product.with_description(description);
        }

        self.products.create(&product).await?;
        tracing::info!("Seller {} listed product {}", actor.user_id, product.id);
        Ok(product)
    }

    pub async fn get_product(&self, id: Uuid) -> CoreResult<Product> {
        self.products
            .get(id)
            .await?
            .ok_or_else(|| CoreError::not_found("product", id))
    }
}
