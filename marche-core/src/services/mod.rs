pub mod wallet;
pub mod users;
pub mod catalog;
pub mod checkout;
pub mod settlement;
pub mod orders;
pub mod subscription;

use std::sync::Arc;

use marche_order::FeeSchedule;
use marche_subscription::PlanPricing;

use crate::events::EventPublisher;
use crate::memory::{
    InMemoryOrderRepository, InMemoryProductRepository, InMemorySubscriptionRepository,
    InMemoryUserRepository, InMemoryWalletRepository, RecordingPublisher,
};
use crate::repository::{
    OrderRepository, ProductRepository, SubscriptionRepository, UserRepository, WalletRepository,
};

pub use catalog::{CatalogService, NewProduct};
pub use checkout::{CartItem, CheckoutService, PlaceOrder};
pub use orders::OrderService;
pub use settlement::SettlementService;
pub use subscription::SubscriptionService;
pub use users::UserService;
pub use wallet::WalletService;

/// Storage and messaging adapters the services run on.
#[derive(Clone)]
pub struct Ports {
    pub wallets: Arc<dyn WalletRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub products: Arc<dyn ProductRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub users: Arc<dyn UserRepository>,
    pub events: Arc<dyn EventPublisher>,
}

impl Ports {
    pub fn in_memory() -> Self {
        Self {
            wallets: Arc::new(InMemoryWalletRepository::new()),
            orders: Arc::new(InMemoryOrderRepository::new()),
            products: Arc::new(InMemoryProductRepository::new()),
            subscriptions: Arc::new(InMemorySubscriptionRepository::new()),
            users: Arc::new(InMemoryUserRepository::new()),
            events: Arc::new(RecordingPublisher::new()),
        }
    }
}

/// Every application service, wired over one set of ports.
#[derive(Clone)]
pub struct Services {
    pub wallets: Arc<WalletService>,
    pub users: Arc<UserService>,
    pub catalog: Arc<CatalogService>,
    pub checkout: Arc<CheckoutService>,
    pub settlement: Arc<SettlementService>,
    pub orders: Arc<OrderService>,
    pub subscriptions: Arc<SubscriptionService>,
}

impl Services {
    pub fn new(ports: Ports, fees: FeeSchedule, pricing: PlanPricing) -> Self {
        let wallets = Arc::new(WalletService::new(ports.wallets.clone(), ports.events.clone()));
        let users = Arc::new(UserService::new(
            ports.users.clone(),
            ports.wallets.clone(),
            ports.subscriptions.clone(),
        ));
        let subscriptions = Arc::new(SubscriptionService::new(
            ports.subscriptions.clone(),
            wallets.clone(),
            ports.events.clone(),
            pricing,
        ));
        let catalog = Arc::new(CatalogService::new(ports.products.clone(), subscriptions.clone()));
        let checkout = Arc::new(CheckoutService::new(
            ports.orders.clone(),
            ports.products.clone(),
            wallets.clone(),
            fees,
        ));
        let settlement = Arc::new(SettlementService::new(
            ports.wallets.clone(),
            ports.orders.clone(),
            ports.users.clone(),
            ports.events.clone(),
        ));
        let orders = Arc::new(OrderService::new(
            ports.orders.clone(),
            ports.users.clone(),
            settlement.clone(),
        ));

        Self {
            wallets,
            users,
            catalog,
            checkout,
            settlement,
            orders,
            subscriptions,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Ports::in_memory(), FeeSchedule::default(), PlanPricing::default())
    }
}
