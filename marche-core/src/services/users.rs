use std::sync::Arc;

use chrono::Utc;
use marche_shared::Role;
use marche_subscription::Subscription;
use marche_wallet::Wallet;
use uuid::Uuid;

use crate::identity::User;
use crate::repository::{SubscriptionRepository, UserRepository, WalletRepository};
use crate::{CoreError, CoreResult};

/// Accounts and role grants. Granting a role opens the wallet that goes with
/// it, and the first seller grant starts the free trial.
pub struct UserService {
    users: Arc<dyn UserRepository>,
    wallets: Arc<dyn WalletRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        wallets: Arc<dyn WalletRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
    ) -> Self {
        Self { users, wallets, subscriptions }
    }

    pub async fn register(&self, display_name: String, roles: Vec<Role>) -> CoreResult<User> {
        let display_name = display_name.trim().to_string();
        if display_name.is_empty() {
            return Err(CoreError::validation("Display name is required", &["displayName"]));
        }

        let mut user = User::new(display_name);
        self.users.create(&user).await?;
        for role in roles {
            user = self.grant_role(user.id, role).await?;
        }

        tracing::info!("Registered user {} with roles {:?}", user.id, user.roles);
        Ok(user)
    }

    pub async fn get(&self, user_id: Uuid) -> CoreResult<User> {
        self.users
            .get(user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("user", user_id))
    }

    /// Idempotent: granting a role the user already holds changes nothing.
    pub async fn grant_role(&self, user_id: Uuid, role: Role) -> CoreResult<User> {
        let mut user = self.get(user_id).await?;

        if self
            .wallets
            .find_by_owner_and_role(user_id, role)
            .await?
            .is_none()
        {
            self.wallets.create(&Wallet::new(user_id, role)).await?;
            tracing::debug!("Opened {} wallet for {}", role, user_id);
        }

        if role == Role::Seller && self.subscriptions.find_by_seller(user_id).await?.is_none() {
            let trial = Subscription::free_trial(user_id, Utc::now());
            tracing::info!("Started free trial for seller {} until {}", user_id, trial.end_date);
            self.subscriptions.save(&trial).await?;
        }

        if !user.has_role(role) {
            user.roles.push(role);
            user.roles.sort();
            self.users.save(&user).await?;
        }

        Ok(user)
    }

    /// The account that collects platform fees: the earliest admin.
    pub async fn platform_admin(&self) -> CoreResult<User> {
        self.users
            .first_with_role(Role::Admin)
            .await?
            .ok_or_else(|| CoreError::not_found("user", "platform admin"))
    }
}
