use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marche_core::repository::{LedgerEntry, WalletRepository};
use marche_core::{CoreError, CoreResult};
use marche_shared::Role;
use marche_wallet::{Transaction, Wallet, WalletError};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{db_error, parse_column};

pub struct StoreWalletRepository {
    pool: PgPool,
}

impl StoreWalletRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct WalletRow {
    id: Uuid,
    owner_id: Uuid,
    role: String,
    balance: i64,
    currency: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    kind: String,
    amount: i64,
    status: String,
    reference: String,
    order_id: Option<Uuid>,
    counterparty_id: Option<Uuid>,
    payment_method: String,
    description: String,
    created_at: DateTime<Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> CoreResult<Transaction> {
        Ok(Transaction {
            id: self.id,
            kind: parse_column("kind", &self.kind)?,
            amount: self.amount,
            status: parse_column("status", &self.status)?,
            reference: self.reference,
            order_id: self.order_id,
            counterparty_id: self.counterparty_id,
            payment_method: parse_column("payment_method", &self.payment_method)?,
            description: self.description,
            created_at: self.created_at,
        })
    }
}

const WALLET_COLUMNS: &str = "id, owner_id, role, balance, currency, created_at, updated_at";
const TRANSACTION_COLUMNS: &str =
    "id, kind, amount, status, reference, order_id, counterparty_id, payment_method, description, created_at";

impl WalletRow {
    /// Balances are kept on the row, so money-moving paths never read the
    /// ledger history; it is paged through `recent_transactions` instead.
    fn into_domain(self) -> CoreResult<Wallet> {
        Ok(Wallet {
            id: self.id,
            owner_id: self.owner_id,
            role: parse_column("role", &self.role)?,
            balance: self.balance,
            currency: self.currency,
            transactions: Vec::new(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl StoreWalletRepository {
    async fn load(&self, id: Uuid) -> CoreResult<Wallet> {
        let row: WalletRow = sqlx::query_as(&format!("SELECT {} FROM wallets WHERE id = $1", WALLET_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .ok_or_else(|| CoreError::not_found("wallet", id))?;
        row.into_domain()
    }

    /// Write a batch inside an open database transaction. Each balance
    /// moves through a conditional update, so a debit the balance cannot
    /// cover matches no row and aborts the batch.
    async fn write_batch(conn: &mut sqlx::PgConnection, entries: &[LedgerEntry]) -> CoreResult<()> {
        for entry in entries {
            let tx = &entry.transaction;
            if tx.amount <= 0 {
                return Err(WalletError::InvalidAmount(tx.amount).into());
            }
            let delta = tx.balance_delta();

            let moved = sqlx::query(
                "UPDATE wallets SET balance = balance + $2, updated_at = NOW() \
                 WHERE id = $1 AND balance + $2 >= 0",
            )
            .bind(entry.wallet_id)
            .bind(delta)
            .execute(&mut *conn)
            .await
            .map_err(db_error)?;

            if moved.rows_affected() == 0 {
                let available: Option<i64> = sqlx::query_scalar("SELECT balance FROM wallets WHERE id = $1")
                    .bind(entry.wallet_id)
                    .fetch_optional(&mut *conn)
                    .await
                    .map_err(db_error)?;
                return Err(match available {
                    Some(available) => CoreError::InsufficientBalance { required: tx.amount, available },
                    None => CoreError::not_found("wallet", entry.wallet_id),
                });
            }

            sqlx::query(
                "INSERT INTO wallet_transactions \
                 (id, wallet_id, kind, amount, status, reference, order_id, counterparty_id, payment_method, description, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            )
            .bind(tx.id)
            .bind(entry.wallet_id)
            .bind(tx.kind.as_str())
            .bind(tx.amount)
            .bind(tx.status.as_str())
            .bind(&tx.reference)
            .bind(tx.order_id)
            .bind(tx.counterparty_id)
            .bind(tx.payment_method.as_str())
            .bind(&tx.description)
            .bind(tx.created_at)
            .execute(&mut *conn)
            .await
            .map_err(db_error)?;
        }
        Ok(())
    }

    async fn reload(&self, entries: &[LedgerEntry]) -> CoreResult<Vec<Wallet>> {
        let mut cache: HashMap<Uuid, Wallet> = HashMap::new();
        let mut wallets = Vec::with_capacity(entries.len());
        for entry in entries {
            if !cache.contains_key(&entry.wallet_id) {
                let wallet = self.load(entry.wallet_id).await?;
                cache.insert(entry.wallet_id, wallet);
            }
            if let Some(wallet) = cache.get(&entry.wallet_id) {
                wallets.push(wallet.clone());
            }
        }
        Ok(wallets)
    }
}

#[async_trait]
impl WalletRepository for StoreWalletRepository {
    async fn create(&self, wallet: &Wallet) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO wallets (id, owner_id, role, balance, currency, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(wallet.id)
        .bind(wallet.owner_id)
        .bind(wallet.role.as_str())
        .bind(wallet.balance)
        .bind(&wallet.currency)
        .bind(wallet.created_at)
        .bind(wallet.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn find_by_owner_and_role(&self, owner_id: Uuid, role: Role) -> CoreResult<Option<Wallet>> {
        let row: Option<WalletRow> = sqlx::query_as(&format!(
            "SELECT {} FROM wallets WHERE owner_id = $1 AND role = $2",
            WALLET_COLUMNS
        ))
        .bind(owner_id)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(WalletRow::into_domain).transpose()
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> CoreResult<Vec<Wallet>> {
        let rows: Vec<WalletRow> = sqlx::query_as(&format!(
            "SELECT {} FROM wallets WHERE owner_id = $1 ORDER BY created_at ASC",
            WALLET_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let mut wallets = rows
            .into_iter()
            .map(WalletRow::into_domain)
            .collect::<CoreResult<Vec<_>>>()?;
        wallets.sort_by_key(|w| w.role);
        Ok(wallets)
    }

    async fn recent_transactions(&self, wallet_id: Uuid, limit: usize) -> CoreResult<Vec<Transaction>> {
        let rows: Vec<TransactionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM wallet_transactions WHERE wallet_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2",
            TRANSACTION_COLUMNS
        ))
        .bind(wallet_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    async fn apply(&self, entries: Vec<LedgerEntry>) -> CoreResult<Vec<Wallet>> {
        let mut db_tx = self.pool.begin().await.map_err(db_error)?;
        Self::write_batch(&mut db_tx, &entries).await?;
        db_tx.commit().await.map_err(db_error)?;

        self.reload(&entries).await
    }

    async fn apply_once(&self, entries: Vec<LedgerEntry>) -> CoreResult<Option<Vec<Wallet>>> {
        let references: Vec<String> = entries.iter().map(|e| e.transaction.reference.clone()).collect();

        let mut db_tx = self.pool.begin().await.map_err(db_error)?;
        let recorded: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM wallet_transactions WHERE reference = ANY($1)",
        )
        .bind(&references)
        .fetch_one(&mut *db_tx)
        .await
        .map_err(db_error)?;

        if recorded as usize == entries.len() && !entries.is_empty() {
            return Ok(None);
        }
        if recorded > 0 {
            return Err(CoreError::Conflict(format!(
                "{} of {} references already recorded",
                recorded,
                entries.len()
            )));
        }

        Self::write_batch(&mut db_tx, &entries).await?;
        db_tx.commit().await.map_err(db_error)?;

        self.reload(&entries).await.map(Some)
    }
}
