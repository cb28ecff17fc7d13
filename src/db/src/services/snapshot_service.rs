// スキーマスナップショットサービス
//
// 接続先データベースのメタデータを読み取り、エンジン非依存のスナップショットを作成します。
// メタデータクエリはすべて設定されたタイムアウト付きで実行します。

use crate::adapters::connection::DatabaseConnection;
use crate::adapters::database_introspector::{create_introspector, DatabaseIntrospector};
use std::future::Future;
use std::time::Duration;
use tidemark_core::core::capability::CapabilityMatrix;
use tidemark_core::core::config::{ExecutionConfig, DEFAULT_CHANGELOG_TABLE, DEFAULT_LOCK_TABLE};
use tidemark_core::core::error::{DriverError, SnapshotError};
use tidemark_core::core::snapshot::{Snapshot, TableSnapshot};
use tracing::{debug, info};

const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// スナップショットサービス
#[derive(Debug, Clone)]
pub struct SnapshotService<'a> {
    matrix: &'a CapabilityMatrix,
    query_timeout: Duration,
    /// 追跡用テーブルなど、スナップショットに含めないテーブル
    excluded_tables: Vec<String>,
}

impl SnapshotService<'static> {
    /// 標準のマトリクスと既定の設定でサービスを作成
    pub fn new() -> Self {
        Self::with_matrix(CapabilityMatrix::global())
    }
}

impl Default for SnapshotService<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> SnapshotService<'a> {
    pub fn with_matrix(matrix: &'a CapabilityMatrix) -> Self {
        Self {
            matrix,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            excluded_tables: vec![
                DEFAULT_CHANGELOG_TABLE.to_string(),
                DEFAULT_LOCK_TABLE.to_string(),
            ],
        }
    }

    /// 実行設定のタイムアウトと追跡テーブル名を使うサービスを作成
    pub fn from_config(matrix: &'a CapabilityMatrix, config: &ExecutionConfig) -> Self {
        Self {
            matrix,
            query_timeout: config.query_timeout(),
            excluded_tables: vec![config.changelog_table.clone(), config.lock_table.clone()],
        }
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    fn is_excluded(&self, table: &str) -> bool {
        self.excluded_tables
            .iter()
            .any(|excluded| excluded.eq_ignore_ascii_case(table))
    }

    async fn bounded<T, F>(&self, context: String, future: F) -> Result<T, SnapshotError>
    where
        F: Future<Output = Result<T, DriverError>>,
    {
        match tokio::time::timeout(self.query_timeout, future).await {
            Ok(result) => result.map_err(SnapshotError::from),
            Err(_) => Err(SnapshotError::Timeout {
                timeout_ms: self.query_timeout.as_millis() as u64,
                context,
            }),
        }
    }

    /// スナップショットを取得
    ///
    /// # Arguments
    ///
    /// * `conn` - 対象データベースへの接続
    /// * `catalog` - カタログ名（省略時は接続の既定カタログ。接続先と異なる場合はエラー）
    /// * `schema` - スキーマ名（省略時は接続の既定スキーマ）
    ///
    /// # Returns
    ///
    /// 読み取ったテーブル・カラム・主キー・外部キー・インデックスを含むスナップショット。
    /// メタデータを読めないエンジンでは`SnapshotError::Unsupported`、
    /// 接続先以外のカタログを指定した場合は`SnapshotError::CatalogMismatch`
    pub async fn capture(
        &self,
        conn: &mut dyn DatabaseConnection,
        catalog: Option<&str>,
        schema: Option<&str>,
    ) -> Result<Snapshot, SnapshotError> {
        let entry = self.matrix.entry(conn.engine())?;
        let introspector = create_introspector(entry)?;

        let location = self
            .bounded(
                "default location".to_string(),
                introspector.default_location(conn),
            )
            .await?;
        if let Some(requested) = catalog {
            if !requested.eq_ignore_ascii_case(&location.catalog) {
                return Err(SnapshotError::CatalogMismatch {
                    engine: entry.engine.clone(),
                    requested: requested.to_string(),
                    current: location.catalog,
                });
            }
        }
        let catalog = location.catalog.clone();
        let schema = schema.map(str::to_string).unwrap_or(location.schema.clone());

        let mut snapshot = Snapshot::new(entry.engine.clone(), entry.case_folding);
        snapshot.default_catalog = Some(location.catalog);
        snapshot.default_schema = Some(location.schema);
        snapshot.schema_mut(&catalog, &schema);

        let table_names = self
            .bounded(
                format!("table names in {}", schema),
                introspector.get_table_names(conn, &schema),
            )
            .await?;

        for name in table_names {
            if self.is_excluded(&name) {
                debug!(table = %name, "Skipping tracking table");
                continue;
            }
            let table = self
                .capture_table(introspector.as_ref(), conn, &schema, &name)
                .await?;
            snapshot.add_table(&catalog, &schema, table);
        }

        info!(
            engine = %entry.engine,
            catalog = %catalog,
            schema = %schema,
            tables = snapshot.table_count(),
            "Captured schema snapshot"
        );
        Ok(snapshot)
    }

    async fn capture_table(
        &self,
        introspector: &dyn DatabaseIntrospector,
        conn: &mut dyn DatabaseConnection,
        schema: &str,
        name: &str,
    ) -> Result<TableSnapshot, SnapshotError> {
        let mut table = TableSnapshot::new(name);

        let columns = self
            .bounded(
                format!("columns of {}", name),
                introspector.get_columns(conn, schema, name),
            )
            .await?;
        for column in columns {
            table.add_column(column);
        }

        table.primary_key = self
            .bounded(
                format!("primary key of {}", name),
                introspector.get_primary_key(conn, schema, name),
            )
            .await?;

        let foreign_keys = self
            .bounded(
                format!("foreign keys of {}", name),
                introspector.get_foreign_keys(conn, schema, name),
            )
            .await?;
        for foreign_key in foreign_keys {
            table.add_foreign_key(foreign_key);
        }

        let indexes = self
            .bounded(
                format!("indexes of {}", name),
                introspector.get_indexes(conn, schema, name),
            )
            .await?;
        for index in indexes {
            table.add_index(index);
        }

        debug!(
            table = %name,
            columns = table.columns.len(),
            indexes = table.indexes.len(),
            "Captured table"
        );
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::connection::RowSet;
    use async_trait::async_trait;
    use tidemark_core::core::engine::{Dialect, EngineId};

    /// 問い合わせに応答しない接続
    struct StalledConnection {
        engine: EngineId,
    }

    #[async_trait]
    impl DatabaseConnection for StalledConnection {
        fn engine(&self) -> &EngineId {
            &self.engine
        }

        async fn execute(&mut self, _sql: &str) -> Result<u64, DriverError> {
            Ok(0)
        }

        async fn query(&mut self, _sql: &str) -> Result<RowSet, DriverError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(RowSet::default())
        }

        async fn begin(&mut self) -> Result<(), DriverError> {
            Ok(())
        }

        async fn commit(&mut self) -> Result<(), DriverError> {
            Ok(())
        }

        async fn rollback(&mut self) -> Result<(), DriverError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_unsupported_engine() {
        let mut conn = StalledConnection {
            engine: Dialect::Cache.id(),
        };
        let err = SnapshotService::new()
            .capture(&mut conn, None, None)
            .await
            .unwrap_err();
        assert!(err.is_unsupported());
    }

    #[tokio::test]
    async fn test_unknown_engine() {
        let mut conn = StalledConnection {
            engine: EngineId::new("nosuchdb"),
        };
        let err = SnapshotService::new()
            .capture(&mut conn, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotError::Capability(_)));
    }

    #[tokio::test]
    async fn test_metadata_query_timeout() {
        let mut conn = StalledConnection {
            engine: Dialect::PostgreSQL.id(),
        };
        let err = SnapshotService::new()
            .with_query_timeout(Duration::from_millis(20))
            .capture(&mut conn, None, None)
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(err.to_string().contains("default location"));
    }

    #[test]
    fn test_tracking_tables_are_excluded() {
        let service = SnapshotService::new();
        assert!(service.is_excluded("tidemark_changelog"));
        assert!(service.is_excluded("TIDEMARK_CHANGELOG_LOCK"));
        assert!(!service.is_excluded("users"));

        let config = ExecutionConfig {
            changelog_table: "history".to_string(),
            ..Default::default()
        };
        let service = SnapshotService::from_config(CapabilityMatrix::global(), &config);
        assert!(service.is_excluded("history"));
        assert!(!service.is_excluded("tidemark_changelog"));
    }
}
