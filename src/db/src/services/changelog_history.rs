// 変更履歴サービス
//
// 適用済みチェンジセットを記録する追跡テーブルの作成・読み込み・書き込みを行います。
// カラム型はケイパビリティマトリクスで各エンジンの型に変換し、
// 時刻はRFC 3339形式（UTC）の文字列として保存します。

use crate::adapters::connection::DatabaseConnection;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tidemark_core::core::capability::CapabilityEntry;
use tidemark_core::core::changeset::ChangesetRecord;
use tidemark_core::core::error::{DriverError, ExecutionError};
use tracing::{debug, info};

/// 時刻を保存用の文字列に変換
pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// 保存された時刻文字列を解析
pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, DriverError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| DriverError::Query {
            message: format!("Invalid timestamp '{}': {}", value, e),
            sql: None,
        })
}

/// クエリにタイムアウトを付けて実行
pub(crate) async fn with_timeout<T, F>(timeout: Duration, context: &str, future: F) -> Result<T, ExecutionError>
where
    F: Future<Output = Result<T, DriverError>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result.map_err(ExecutionError::from),
        Err(_) => Err(ExecutionError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
            context: context.to_string(),
        }),
    }
}

/// テーブルが存在するか
///
/// 行を返さない問い合わせが成功するかどうかで判定します。
pub(crate) async fn table_exists(
    conn: &mut dyn DatabaseConnection,
    entry: &CapabilityEntry,
    table: &str,
) -> bool {
    let sql = format!("SELECT 1 FROM {} WHERE 1 = 0", entry.quote_identifier(table));
    conn.query(&sql).await.is_ok()
}

/// 変更履歴（追跡テーブル）
#[derive(Debug, Clone, Copy)]
pub struct ChangelogHistory<'a> {
    entry: &'a CapabilityEntry,
    table: &'a str,
}

impl<'a> ChangelogHistory<'a> {
    pub fn new(entry: &'a CapabilityEntry, table: &'a str) -> Self {
        Self { entry, table }
    }

    fn quoted_table(&self) -> String {
        self.entry.quote_identifier(self.table)
    }

    fn column(&self, name: &str) -> String {
        self.entry.quote_identifier(name)
    }

    /// 追跡テーブルの作成SQL
    pub fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE {} ({} {} NOT NULL, {} {} NOT NULL, {} {} NOT NULL, {} {} NOT NULL, PRIMARY KEY ({}))",
            self.quoted_table(),
            self.column("id"),
            self.entry.map_type("varchar(255)"),
            self.column("checksum"),
            self.entry.map_type("varchar(64)"),
            self.column("applied_at"),
            self.entry.map_type("varchar(64)"),
            self.column("order_executed"),
            self.entry.map_type("bigint"),
            self.column("id"),
        )
    }

    /// 追跡テーブルがなければ作成
    ///
    /// # Returns
    ///
    /// 新たに作成した場合は`true`
    pub async fn ensure_table(&self, conn: &mut dyn DatabaseConnection) -> Result<bool, DriverError> {
        if table_exists(conn, self.entry, self.table).await {
            return Ok(false);
        }
        if let Err(e) = conn.execute(&self.create_table_sql()).await {
            // 並行する実行が先に作成した場合
            if table_exists(conn, self.entry, self.table).await {
                debug!(table = %self.table, "Changelog table was created concurrently");
                return Ok(false);
            }
            return Err(e);
        }
        info!(table = %self.table, "Created changelog table");
        Ok(true)
    }

    /// 追跡テーブルが存在するか
    pub async fn exists(&self, conn: &mut dyn DatabaseConnection) -> bool {
        table_exists(conn, self.entry, self.table).await
    }

    /// 記録済みチェンジセットをIDで引けるように読み込む
    pub async fn load(
        &self,
        conn: &mut dyn DatabaseConnection,
    ) -> Result<BTreeMap<String, ChangesetRecord>, DriverError> {
        let sql = format!(
            "SELECT {}, {}, {}, {} FROM {} ORDER BY {}",
            self.column("id"),
            self.column("checksum"),
            self.column("applied_at"),
            self.column("order_executed"),
            self.quoted_table(),
            self.column("order_executed"),
        );
        let rows = conn.query(&sql).await?;

        let mut records = BTreeMap::new();
        for row in rows.rows() {
            let id = row.get_text("id").unwrap_or_default();
            let record = ChangesetRecord {
                id: id.clone(),
                checksum: row.get_text("checksum").unwrap_or_default(),
                applied_at: parse_timestamp(&row.get_text("applied_at").unwrap_or_default())?,
                order_executed: row.get_i64("order_executed").unwrap_or_default(),
            };
            records.insert(id, record);
        }
        debug!(table = %self.table, count = records.len(), "Loaded changelog records");
        Ok(records)
    }

    /// 次の実行順序（最大値 + 1）
    pub async fn next_order(&self, conn: &mut dyn DatabaseConnection) -> Result<i64, DriverError> {
        let sql = format!(
            "SELECT COALESCE(MAX({}), 0) AS max_order FROM {}",
            self.column("order_executed"),
            self.quoted_table()
        );
        let rows = conn.query(&sql).await?;
        let max = rows
            .first()
            .and_then(|row| row.get_i64("max_order"))
            .unwrap_or(0);
        Ok(max + 1)
    }

    /// 記録の挿入SQL
    pub fn insert_sql(&self, id: &str, checksum: &str, applied_at: DateTime<Utc>, order_executed: i64) -> String {
        format!(
            "INSERT INTO {} ({}, {}, {}, {}) VALUES ({}, {}, {}, {})",
            self.quoted_table(),
            self.column("id"),
            self.column("checksum"),
            self.column("applied_at"),
            self.column("order_executed"),
            self.entry.quote_literal(id),
            self.entry.quote_literal(checksum),
            self.entry.quote_literal(&format_timestamp(applied_at)),
            order_executed
        )
    }

    /// 記録済みチェックサムを更新
    pub async fn update_checksum(
        &self,
        conn: &mut dyn DatabaseConnection,
        id: &str,
        checksum: &str,
    ) -> Result<(), DriverError> {
        let sql = format!(
            "UPDATE {} SET {} = {} WHERE {} = {}",
            self.quoted_table(),
            self.column("checksum"),
            self.entry.quote_literal(checksum),
            self.column("id"),
            self.entry.quote_literal(id)
        );
        conn.execute(&sql).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_core::core::capability::CapabilityMatrix;
    use tidemark_core::core::engine::Dialect;

    fn entry(dialect: Dialect) -> &'static CapabilityEntry {
        CapabilityMatrix::global().entry(&dialect.id()).unwrap()
    }

    #[test]
    fn test_create_table_sql_uses_engine_types() {
        let history = ChangelogHistory::new(entry(Dialect::MySQL), "tidemark_changelog");
        assert_eq!(
            history.create_table_sql(),
            "CREATE TABLE `tidemark_changelog` (`id` VARCHAR(255) NOT NULL, `checksum` VARCHAR(64) NOT NULL, \
             `applied_at` VARCHAR(64) NOT NULL, `order_executed` BIGINT NOT NULL, PRIMARY KEY (`id`))"
        );
    }

    #[test]
    fn test_insert_sql_escapes_literals() {
        let history = ChangelogHistory::new(entry(Dialect::PostgreSQL), "tidemark_changelog");
        let at = parse_timestamp("2026-01-02T03:04:05.000Z").unwrap();
        assert_eq!(
            history.insert_sql("o'brien", "abc", at, 7),
            "INSERT INTO \"tidemark_changelog\" (\"id\", \"checksum\", \"applied_at\", \"order_executed\") \
             VALUES ('o''brien', 'abc', '2026-01-02T03:04:05.000Z', 7)"
        );
    }

    #[test]
    fn test_timestamp_round_trip() {
        let at = parse_timestamp("2026-10-19T08:30:00.123Z").unwrap();
        assert_eq!(format_timestamp(at), "2026-10-19T08:30:00.123Z");
        assert!(parse_timestamp("yesterday").unwrap_err().is_query());
    }

    #[tokio::test]
    async fn test_with_timeout_reports_context() {
        let err = with_timeout(Duration::from_millis(10), "slow query", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, DriverError>(())
        })
        .await
        .unwrap_err();
        assert!(err.is_timeout());
        assert!(err.to_string().contains("slow query"));
    }
}
