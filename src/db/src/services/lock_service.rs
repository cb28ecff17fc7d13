// 実行ロックサービス
//
// ロックテーブルの単一行（id = 1）を使って、同じデータベースに対する
// 同時実行を1プロセスに制限します。行の挿入に成功したプロセスがロックを保持します。

use crate::adapters::connection::DatabaseConnection;
use crate::services::changelog_history::{format_timestamp, parse_timestamp, table_exists, with_timeout};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tidemark_core::core::capability::CapabilityEntry;
use tidemark_core::core::config::LockConfig;
use tidemark_core::core::error::{DriverError, ExecutionError};
use tokio::time::Instant;
use tracing::{debug, info, warn};

const LOCK_ROW_ID: i64 = 1;

/// 現在のロック保持者
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockHolder {
    pub locked_by: String,
    pub locked_at: DateTime<Utc>,
}

/// 既定のロック保持者名（ホスト名とプロセスID）
pub fn default_holder_id() -> String {
    let host = std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "localhost".to_string());
    format!("{}:{}", host, std::process::id())
}

/// 実行ロック
#[derive(Debug, Clone)]
pub struct ExecutionLock<'a> {
    entry: &'a CapabilityEntry,
    table: &'a str,
    holder: String,
    config: &'a LockConfig,
    query_timeout: Duration,
}

impl<'a> ExecutionLock<'a> {
    pub fn new(
        entry: &'a CapabilityEntry,
        table: &'a str,
        holder: impl Into<String>,
        config: &'a LockConfig,
        query_timeout: Duration,
    ) -> Self {
        Self {
            entry,
            table,
            holder: holder.into(),
            config,
            query_timeout,
        }
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    fn quoted_table(&self) -> String {
        self.entry.quote_identifier(self.table)
    }

    fn column(&self, name: &str) -> String {
        self.entry.quote_identifier(name)
    }

    /// ロックテーブルの作成SQL
    pub fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE {} ({} {} NOT NULL, {} {} NOT NULL, {} {} NOT NULL, PRIMARY KEY ({}))",
            self.quoted_table(),
            self.column("id"),
            self.entry.map_type("int"),
            self.column("locked_by"),
            self.entry.map_type("varchar(255)"),
            self.column("locked_at"),
            self.entry.map_type("varchar(64)"),
            self.column("id"),
        )
    }

    /// ロックテーブルがなければ作成
    pub async fn ensure_table(&self, conn: &mut dyn DatabaseConnection) -> Result<(), DriverError> {
        if table_exists(conn, self.entry, self.table).await {
            return Ok(());
        }
        if let Err(e) = conn.execute(&self.create_table_sql()).await {
            // 並行する実行が先に作成した場合
            if table_exists(conn, self.entry, self.table).await {
                debug!(table = %self.table, "Lock table was created concurrently");
                return Ok(());
            }
            return Err(e);
        }
        info!(table = %self.table, "Created lock table");
        Ok(())
    }

    /// 現在のロック保持者を取得
    pub async fn status(&self, conn: &mut dyn DatabaseConnection) -> Result<Option<LockHolder>, DriverError> {
        let sql = format!(
            "SELECT {}, {} FROM {} WHERE {} = {}",
            self.column("locked_by"),
            self.column("locked_at"),
            self.quoted_table(),
            self.column("id"),
            LOCK_ROW_ID
        );
        let rows = conn.query(&sql).await?;
        match rows.first() {
            Some(row) => Ok(Some(LockHolder {
                locked_by: row.get_text("locked_by").unwrap_or_default(),
                locked_at: parse_timestamp(&row.get_text("locked_at").unwrap_or_default())?,
            })),
            None => Ok(None),
        }
    }

    /// 一定時間を過ぎたロックを削除
    ///
    /// 削除は読み取った保持者と時刻に一致する行だけが対象です。
    async fn clear_stale(&self, conn: &mut dyn DatabaseConnection, stale_after: Duration) -> Result<(), DriverError> {
        let Some(current) = self.status(conn).await? else {
            return Ok(());
        };
        let age = Utc::now().signed_duration_since(current.locked_at);
        if age.to_std().unwrap_or_default() < stale_after {
            return Ok(());
        }

        let sql = format!(
            "DELETE FROM {} WHERE {} = {} AND {} = {} AND {} = {}",
            self.quoted_table(),
            self.column("id"),
            LOCK_ROW_ID,
            self.column("locked_by"),
            self.entry.quote_literal(&current.locked_by),
            self.column("locked_at"),
            self.entry.quote_literal(&format_timestamp(current.locked_at))
        );
        let removed = conn.execute(&sql).await?;
        if removed > 0 {
            warn!(
                holder = %current.locked_by,
                locked_at = %current.locked_at,
                "Removed stale lock"
            );
        }
        Ok(())
    }

    /// ロックの取得を1回試みる
    ///
    /// # Returns
    ///
    /// 取得できた場合は`true`、他のプロセスが保持している場合は`false`
    pub async fn try_acquire(&self, conn: &mut dyn DatabaseConnection) -> Result<bool, DriverError> {
        if let Some(stale_after) = self.config.stale_after() {
            self.clear_stale(conn, stale_after).await?;
        }

        let sql = format!(
            "INSERT INTO {} ({}, {}, {}) VALUES ({}, {}, {})",
            self.quoted_table(),
            self.column("id"),
            self.column("locked_by"),
            self.column("locked_at"),
            LOCK_ROW_ID,
            self.entry.quote_literal(&self.holder),
            self.entry.quote_literal(&format_timestamp(Utc::now()))
        );
        match conn.execute(&sql).await {
            Ok(_) => Ok(true),
            // 挿入の失敗は行が既にある場合だけロック競合として扱う
            Err(e) => match self.status(conn).await? {
                Some(current) => {
                    debug!(holder = %current.locked_by, "Lock is held");
                    Ok(false)
                }
                None => Err(e),
            },
        }
    }

    /// ロックを取得するまで待機
    ///
    /// 試行の間は指数バックオフで待ちます。試行回数か待機時間の上限に達すると
    /// `ExecutionError::LockTimeout`を返します。
    pub async fn acquire(&self, conn: &mut dyn DatabaseConnection) -> Result<(), ExecutionError> {
        let deadline = self.config.wait_timeout().map(|wait| Instant::now() + wait);
        let mut attempts = 0;

        loop {
            attempts += 1;
            let acquired = with_timeout(self.query_timeout, "lock acquisition", self.try_acquire(conn)).await?;
            if acquired {
                info!(holder = %self.holder, attempts, "Acquired execution lock");
                return Ok(());
            }

            let backoff = self.retry_delay(attempts);
            let out_of_time = deadline.is_some_and(|deadline| Instant::now() + backoff > deadline);
            if attempts >= self.config.max_attempts || out_of_time {
                let holder = with_timeout(self.query_timeout, "lock status", self.status(conn))
                    .await?
                    .map(|current| current.locked_by)
                    .unwrap_or_default();
                warn!(holder = %holder, attempts, "Gave up waiting for execution lock");
                return Err(ExecutionError::LockTimeout { attempts, holder });
            }

            debug!(attempt = attempts, backoff_ms = backoff.as_millis() as u64, "Waiting for execution lock");
            tokio::time::sleep(backoff).await;
        }
    }

    /// `attempts`回失敗した後に待つ時間
    fn retry_delay(&self, attempts: u32) -> Duration {
        self.config.backoff(attempts.saturating_sub(1))
    }

    /// 自分が保持しているロックを解放
    pub async fn release(&self, conn: &mut dyn DatabaseConnection) -> Result<(), DriverError> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = {} AND {} = {}",
            self.quoted_table(),
            self.column("id"),
            LOCK_ROW_ID,
            self.column("locked_by"),
            self.entry.quote_literal(&self.holder)
        );
        let removed = conn.execute(&sql).await?;
        if removed == 0 {
            warn!(holder = %self.holder, "Execution lock was not held at release");
        } else {
            info!(holder = %self.holder, "Released execution lock");
        }
        Ok(())
    }

    /// 保持者に関係なくロックを解放
    ///
    /// # Returns
    ///
    /// 削除した行数
    pub async fn force_release(&self, conn: &mut dyn DatabaseConnection) -> Result<u64, DriverError> {
        let sql = format!("DELETE FROM {}", self.quoted_table());
        let removed = conn.execute(&sql).await?;
        warn!(removed, "Forcibly released execution locks");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_core::core::capability::CapabilityMatrix;
    use tidemark_core::core::engine::Dialect;

    #[test]
    fn test_create_table_sql() {
        let entry = CapabilityMatrix::global().entry(&Dialect::PostgreSQL.id()).unwrap();
        let config = LockConfig::default();
        let lock = ExecutionLock::new(entry, "tidemark_changelog_lock", "me", &config, Duration::from_secs(1));
        assert_eq!(
            lock.create_table_sql(),
            "CREATE TABLE \"tidemark_changelog_lock\" (\"id\" INTEGER NOT NULL, \"locked_by\" VARCHAR(255) NOT NULL, \
             \"locked_at\" VARCHAR(64) NOT NULL, PRIMARY KEY (\"id\"))"
        );
    }

    #[test]
    fn test_retry_delay_starts_at_initial_backoff() {
        let entry = CapabilityMatrix::global().entry(&Dialect::SQLite.id()).unwrap();
        let config = LockConfig {
            initial_backoff_ms: 100,
            max_backoff_ms: 1_000,
            ..Default::default()
        };
        let lock = ExecutionLock::new(entry, "tidemark_changelog_lock", "me", &config, Duration::from_secs(1));
        assert_eq!(lock.retry_delay(1), Duration::from_millis(100));
        assert_eq!(lock.retry_delay(2), Duration::from_millis(200));
        assert_eq!(lock.retry_delay(3), Duration::from_millis(400));
        assert_eq!(lock.retry_delay(10), Duration::from_millis(1_000));
    }

    #[test]
    fn test_default_holder_id_contains_pid() {
        let holder = default_holder_id();
        assert!(holder.ends_with(&format!(":{}", std::process::id())));
    }
}
