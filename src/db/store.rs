use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnection, MySqlDatabaseError, MySqlPool, MySqlPoolOptions};
use tracing::{debug, info};

use crate::config::Config;
use crate::db::models::{ItemDataRow, ItemSuggestRow, TradeRow};
use crate::db::query::{item_by_name_query, item_metadata_query, item_suggestions_query, trades_query};
use crate::error::{AppError, Result};
use crate::types::{FilterCriteria, ItemMetadata, ItemNameQuery, ItemTrades, TradeRecord};

/// MariaDB ER_STATEMENT_TIMEOUT.
const MARIADB_STATEMENT_TIMEOUT: u16 = 1969;
/// MySQL ER_QUERY_TIMEOUT.
const MYSQL_QUERY_TIMEOUT: u16 = 3024;

/// Read-only access to the trade database. Each call holds at most one
/// connection and gives it back before returning, on success or failure.
#[async_trait]
pub trait TradeStore: Send + Sync {
    /// Trades matching every facet in `criteria`, ascending by id.
    async fn trades(&self, criteria: &FilterCriteria) -> Result<Vec<TradeRecord>>;

    /// Trades plus the item's metadata, both read over the same connection.
    async fn item_trades(&self, criteria: &FilterCriteria) -> Result<ItemTrades>;

    async fn find_item_id(&self, query: &ItemNameQuery) -> Result<Option<i64>>;

    /// Item id → display name, for autocomplete. Names may be missing.
    async fn item_names(&self) -> Result<BTreeMap<i64, Option<String>>>;
}

pub struct MySqlStore {
    pool: MySqlPool,
    trade_statement_secs: u64,
    item_statement_secs: u64,
    trade_timeout: Duration,
    item_timeout: Duration,
}

impl MySqlStore {
    pub async fn connect(cfg: &Config) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(cfg.db_max_connections)
            .acquire_timeout(cfg.trade_query_timeout())
            .connect(&cfg.database_url)
            .await?;
        info!(max_connections = cfg.db_max_connections, "Database pool ready");
        Ok(Self::new(pool, cfg))
    }

    pub fn new(pool: MySqlPool, cfg: &Config) -> Self {
        Self {
            pool,
            trade_statement_secs: cfg.trade_query_timeout_secs,
            item_statement_secs: cfg.item_query_timeout_secs,
            trade_timeout: cfg.trade_query_timeout(),
            item_timeout: cfg.item_query_timeout(),
        }
    }

    async fn fetch_trades(
        &self,
        conn: &mut MySqlConnection,
        criteria: &FilterCriteria,
    ) -> Result<Vec<TradeRecord>> {
        let mut qb = trades_query(criteria, self.trade_statement_secs);
        let rows = bounded(
            self.trade_timeout,
            qb.build_query_as::<TradeRow>().fetch_all(&mut *conn),
        )
        .await?;
        debug!(item_id = criteria.item_id, rows = rows.len(), "trade query done");
        Ok(rows.into_iter().map(TradeRecord::from).collect())
    }
}

#[async_trait]
impl TradeStore for MySqlStore {
    async fn trades(&self, criteria: &FilterCriteria) -> Result<Vec<TradeRecord>> {
        let mut conn = self.pool.acquire().await?;
        self.fetch_trades(&mut conn, criteria).await
    }

    async fn item_trades(&self, criteria: &FilterCriteria) -> Result<ItemTrades> {
        let mut conn = self.pool.acquire().await?;
        let records = self.fetch_trades(&mut conn, criteria).await?;

        let mut qb = item_metadata_query(criteria.item_id, self.item_statement_secs);
        let metadata = bounded(
            self.item_timeout,
            qb.build_query_as::<ItemDataRow>().fetch_optional(&mut *conn),
        )
        .await?
        .map(ItemMetadata::from);

        Ok(ItemTrades { metadata, records })
    }

    async fn find_item_id(&self, query: &ItemNameQuery) -> Result<Option<i64>> {
        let mut conn = self.pool.acquire().await?;
        let mut qb = item_by_name_query(query, self.item_statement_secs);
        let id = bounded(
            self.item_timeout,
            qb.build_query_scalar::<i64>().fetch_optional(&mut *conn),
        )
        .await?;
        debug!(name = %query.name, slot = query.slot, found = id.is_some(), "item lookup");
        Ok(id)
    }

    async fn item_names(&self) -> Result<BTreeMap<i64, Option<String>>> {
        let mut conn = self.pool.acquire().await?;
        let mut qb = item_suggestions_query(self.trade_statement_secs);
        let rows = bounded(
            self.trade_timeout,
            qb.build_query_as::<ItemSuggestRow>().fetch_all(&mut *conn),
        )
        .await?;
        Ok(rows.into_iter().map(|r| (r.item_id, r.item_name)).collect())
    }
}

/// Runs a query under a client-side deadline. Both the deadline and the
/// server's own statement-time abort surface as `AppError::Timeout`.
async fn bounded<T, F>(budget: Duration, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(budget, fut).await {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) if is_statement_timeout(&e) => Err(AppError::Timeout(budget)),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(AppError::Timeout(budget)),
    }
}

fn is_statement_timeout(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|db| db.try_downcast_ref::<MySqlDatabaseError>())
        .map(|db| matches!(db.number(), MARIADB_STATEMENT_TIMEOUT | MYSQL_QUERY_TIMEOUT))
        .unwrap_or(false)
}
