// SQLx接続アダプター
//
// sqlx::AnyConnectionをDatabaseConnectionとして扱うアダプター。
// PostgreSQL、MySQL、SQLiteに対応します。接続先のエンジンはURLのスキームから判定します。

use crate::adapters::connection::{DatabaseConnection, Row, RowSet, Value};
use async_trait::async_trait;
use sqlx::any::AnyRow;
use sqlx::{AnyConnection, Column, Connection, Row as _, ValueRef};
use std::sync::Arc;
use tidemark_core::core::capability::CapabilityMatrix;
use tidemark_core::core::engine::{Dialect, EngineId};
use tidemark_core::core::error::DriverError;
use tracing::debug;

/// sqlxで接続できる方言
const SUPPORTED_DIALECTS: [Dialect; 3] = [Dialect::PostgreSQL, Dialect::MySQL, Dialect::SQLite];

/// 接続URLのスキームから方言を判定
///
/// `postgres://`、`postgresql://`、`mysql://`、`mariadb://`、`sqlite:`を受け付けます。
pub fn dialect_from_url(url: &str) -> Result<Dialect, DriverError> {
    let scheme = url.split(':').next().unwrap_or_default();
    scheme
        .parse::<Dialect>()
        .ok()
        .filter(|dialect| SUPPORTED_DIALECTS.contains(dialect))
        .ok_or_else(|| DriverError::Connection {
            message: format!("Unsupported connection URL scheme '{}'", scheme),
        })
}

/// SQLx接続
pub struct SqlxConnection {
    engine: EngineId,
    begin_sql: String,
    conn: AnyConnection,
}

impl std::fmt::Debug for SqlxConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlxConnection")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl SqlxConnection {
    /// URLで接続
    ///
    /// # Arguments
    ///
    /// * `url` - 接続URL（例: `sqlite://./app.db?mode=rwc`）
    ///
    /// # Returns
    ///
    /// 接続、またはURLが不正・接続失敗の場合は`DriverError::Connection`
    pub async fn connect(url: &str) -> Result<Self, DriverError> {
        let dialect = dialect_from_url(url)?;
        sqlx::any::install_default_drivers();

        let conn = AnyConnection::connect(url)
            .await
            .map_err(|e| DriverError::Connection {
                message: format!("Failed to connect to {}: {}", dialect, e),
            })?;

        Self::from_connection(dialect, conn)
    }

    /// 既存のAnyConnectionから作成
    pub fn from_connection(dialect: Dialect, conn: AnyConnection) -> Result<Self, DriverError> {
        let engine = dialect.id();
        let entry = CapabilityMatrix::global()
            .entry(&engine)
            .map_err(|e| DriverError::Connection {
                message: e.to_string(),
            })?;
        debug!(engine = %engine, "Connected");

        Ok(Self {
            begin_sql: entry.begin_transaction.clone(),
            engine,
            conn,
        })
    }

    /// 接続を閉じる
    pub async fn close(self) -> Result<(), DriverError> {
        self.conn.close().await.map_err(|e| DriverError::Connection {
            message: format!("Failed to close connection: {}", e),
        })
    }

    async fn run_transaction_sql(&mut self, sql: &str) -> Result<(), DriverError> {
        sqlx::Executor::execute(&mut self.conn, sqlx::raw_sql(sql))
            .await
            .map(|_| ())
            .map_err(|e| DriverError::Transaction {
                message: format!("{}: {}", sql, e),
            })
    }
}

/// AnyRowの1カラムをValueに変換
///
/// Anyドライバーは型情報が限られるため、整数・浮動小数・真偽値・文字列・バイト列の順に試します。
fn decode_value(row: &AnyRow, index: usize) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(_) => {}
        Err(_) => return Value::Null,
    }
    if let Ok(v) = row.try_get::<i64, _>(index) {
        return Value::Int(v);
    }
    if let Ok(v) = row.try_get::<i32, _>(index) {
        return Value::Int(i64::from(v));
    }
    if let Ok(v) = row.try_get::<i16, _>(index) {
        return Value::Int(i64::from(v));
    }
    if let Ok(v) = row.try_get::<f64, _>(index) {
        return Value::Float(v);
    }
    if let Ok(v) = row.try_get::<bool, _>(index) {
        return Value::Bool(v);
    }
    if let Ok(v) = row.try_get::<String, _>(index) {
        return Value::Text(v);
    }
    if let Ok(v) = row.try_get::<Vec<u8>, _>(index) {
        return Value::Bytes(v);
    }
    Value::Null
}

fn convert_rows(rows: Vec<AnyRow>) -> RowSet {
    let Some(first) = rows.first() else {
        return RowSet::default();
    };
    let columns: Arc<[String]> = first
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();

    let rows = rows
        .iter()
        .map(|row| {
            let values = (0..columns.len()).map(|i| decode_value(row, i)).collect();
            Row::new(Arc::clone(&columns), values)
        })
        .collect();
    RowSet::new(rows)
}

#[async_trait]
impl DatabaseConnection for SqlxConnection {
    fn engine(&self) -> &EngineId {
        &self.engine
    }

    async fn execute(&mut self, sql: &str) -> Result<u64, DriverError> {
        debug!(engine = %self.engine, sql = %sql, "Executing statement");
        sqlx::Executor::execute(&mut self.conn, sqlx::raw_sql(sql))
            .await
            .map(|result| result.rows_affected())
            .map_err(|e| DriverError::query(e.to_string(), sql))
    }

    async fn query(&mut self, sql: &str) -> Result<RowSet, DriverError> {
        let rows = sqlx::Executor::fetch_all(&mut self.conn, sqlx::raw_sql(sql))
            .await
            .map_err(|e| DriverError::query(e.to_string(), sql))?;
        Ok(convert_rows(rows))
    }

    async fn begin(&mut self) -> Result<(), DriverError> {
        let sql = self.begin_sql.clone();
        self.run_transaction_sql(&sql).await
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        self.run_transaction_sql("COMMIT").await
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        self.run_transaction_sql("ROLLBACK").await
    }
}
