// 公開ファサード
//
// ディスパッチ・スナップショット・実行コーディネーターをまとめ、
// 呼び出し側に単一のエラー型（tidemark_core::core::error::Error）で公開します。

use crate::adapters::connection::DatabaseConnection;
use crate::adapters::sql_generator::GeneratorRegistry;
use crate::services::dispatch::{RenderedSql, SqlDispatcher};
use crate::services::execution_coordinator::{CancellationFlag, ExecutionCoordinator};
use crate::services::lock_service::LockHolder;
use crate::services::snapshot_service::SnapshotService;
use tidemark_core::core::capability::CapabilityMatrix;
use tidemark_core::core::changeset::{AppliedSummary, Changeset, ChangesetStatus};
use tidemark_core::core::config::ExecutionConfig;
use tidemark_core::core::engine::EngineId;
use tidemark_core::core::error::{DispatchError, Error};
use tidemark_core::core::snapshot::Snapshot;
use tidemark_core::core::statement::ChangeStatement;
use tracing::debug;

/// スキーマ変更エンジン
pub struct ChangeEngine<'a> {
    dispatcher: SqlDispatcher<'a>,
    coordinator: ExecutionCoordinator<'a>,
    snapshots: SnapshotService<'a>,
}

impl ChangeEngine<'static> {
    /// 標準のマトリクス・レジストリと既定の設定でエンジンを作成
    pub fn new() -> Result<Self, Error> {
        Self::with_config(ExecutionConfig::default())
    }

    /// 標準のマトリクス・レジストリと指定の設定でエンジンを作成
    pub fn with_config(config: ExecutionConfig) -> Result<Self, Error> {
        Self::with_parts(CapabilityMatrix::global(), GeneratorRegistry::global()?, config)
    }
}

impl<'a> ChangeEngine<'a> {
    pub fn with_parts(
        matrix: &'a CapabilityMatrix,
        registry: &'a GeneratorRegistry,
        config: ExecutionConfig,
    ) -> Result<Self, Error> {
        let dispatcher = SqlDispatcher::with_parts(matrix, registry);
        let snapshots = SnapshotService::from_config(matrix, &config);
        let coordinator = ExecutionCoordinator::new(dispatcher, config)?;
        Ok(Self {
            dispatcher,
            coordinator,
            snapshots,
        })
    }

    /// 外部から共有するキャンセル要求を設定
    pub fn with_cancellation(mut self, cancellation: CancellationFlag) -> Self {
        self.coordinator = self.coordinator.with_cancellation(cancellation);
        self
    }

    pub fn cancellation(&self) -> CancellationFlag {
        self.coordinator.cancellation()
    }

    pub fn config(&self) -> &ExecutionConfig {
        self.coordinator.config()
    }

    /// エンジンがステートメントを表現できるか
    ///
    /// 未登録エンジンでは`false`を返します。理由を知りたい場合は`ensure_supported`を使います。
    pub fn check_support(&self, statement: &ChangeStatement, engine: &EngineId) -> bool {
        match self.dispatcher.supports(statement, engine) {
            Ok(supported) => supported,
            Err(e) => {
                debug!(engine = %engine, error = %e, "Support check failed");
                false
            }
        }
    }

    /// エンジンがステートメントを表現できなければエラー
    pub fn ensure_supported(&self, statement: &ChangeStatement, engine: &EngineId) -> Result<(), Error> {
        if self.dispatcher.supports(statement, engine)? {
            Ok(())
        } else {
            Err(DispatchError::StatementNotSupportedOnDatabase {
                operation: statement.operation(),
                engine: engine.clone(),
            }
            .into())
        }
    }

    /// ステートメントをSQLに変換（I/Oなし）
    pub fn render(&self, statement: &ChangeStatement, engine: &EngineId) -> Result<RenderedSql, Error> {
        Ok(self.dispatcher.generate(statement, engine)?)
    }

    /// チェンジセットをロックの下で適用
    pub async fn apply_all(
        &self,
        changesets: &[Changeset],
        conn: &mut dyn DatabaseConnection,
    ) -> Result<AppliedSummary, Error> {
        Ok(self.coordinator.apply_all(changesets, conn).await?)
    }

    /// 接続の既定スキーマのスナップショットを取得
    pub async fn snapshot(&self, conn: &mut dyn DatabaseConnection) -> Result<Snapshot, Error> {
        Ok(self.snapshots.capture(conn, None, None).await?)
    }

    /// カタログ・スキーマを指定してスナップショットを取得
    pub async fn snapshot_scoped(
        &self,
        conn: &mut dyn DatabaseConnection,
        catalog: Option<&str>,
        schema: Option<&str>,
    ) -> Result<Snapshot, Error> {
        Ok(self.snapshots.capture(conn, catalog, schema).await?)
    }

    /// 適用状況を確認
    pub async fn status(
        &self,
        changesets: &[Changeset],
        conn: &mut dyn DatabaseConnection,
    ) -> Result<Vec<ChangesetStatus>, Error> {
        Ok(self.coordinator.status(changesets, conn).await?)
    }

    pub async fn lock_status(&self, conn: &mut dyn DatabaseConnection) -> Result<Option<LockHolder>, Error> {
        Ok(self.coordinator.lock_status(conn).await?)
    }

    /// ロックを強制的に解放（運用時の復旧用）
    pub async fn release_locks(&self, conn: &mut dyn DatabaseConnection) -> Result<u64, Error> {
        Ok(self.coordinator.release_locks(conn).await?)
    }
}
