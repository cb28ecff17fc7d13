// 実行コーディネーター
//
// チェンジセット列を対象データベースへ適用します。
// 事前検証と描画 → ロック取得 → チェックサム照合 → 実行と記録 → ロック解放
// の順に進み、チェンジセットは入力順に1つずつ適用します。

use crate::adapters::connection::{with_transaction, DatabaseConnection};
use crate::services::changelog_history::{table_exists, with_timeout, ChangelogHistory};
use crate::services::changeset_checksum::ChangesetChecksumService;
use crate::services::dispatch::SqlDispatcher;
use crate::services::lock_service::{default_holder_id, ExecutionLock, LockHolder};
use chrono::Utc;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tidemark_core::core::capability::CapabilityEntry;
use tidemark_core::core::changeset::{
    ensure_unique_ids, AppliedSummary, Changeset, ChangesetOutcome, ChangesetRecord,
    ChangesetState, ChangesetStatus, RunStatus,
};
use tidemark_core::core::config::{ChecksumPolicy, ExecutionConfig, UnsupportedPolicy};
use tidemark_core::core::error::{ConfigError, DriverError, ExecutionError};
use tidemark_core::core::operation::OperationKind;
use tracing::{debug, info, warn};

/// 実行のキャンセル要求
///
/// キャンセルはチェンジセットの間でだけ確認されます。
/// 実行中のチェンジセットのトランザクションは必ず完了します。
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// 実行の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    LockAcquired,
    Verifying,
    Applying,
    Recording,
    Unlocked(RunStatus),
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::LockAcquired => write!(f, "lock_acquired"),
            RunState::Verifying => write!(f, "verifying"),
            RunState::Applying => write!(f, "applying"),
            RunState::Recording => write!(f, "recording"),
            RunState::Unlocked(RunStatus::Success) => write!(f, "unlocked(success)"),
            RunState::Unlocked(RunStatus::Failed) => write!(f, "unlocked(failed)"),
        }
    }
}

/// 描画済みのチェンジセット
#[derive(Debug, Clone)]
pub struct PlannedChangeset<'c> {
    pub changeset: &'c Changeset,
    pub checksum: String,
    pub step: PlannedStep,
}

/// チェンジセットに対して行うこと
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedStep {
    /// 実行するSQL（実行順）
    Execute(Vec<String>),
    /// エンジンが表現できないためスキップ
    Unsupported(OperationKind),
}

/// 照合後の扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Pending,
    AlreadyApplied,
}

/// 実行コーディネーター
pub struct ExecutionCoordinator<'a> {
    dispatcher: SqlDispatcher<'a>,
    config: ExecutionConfig,
    holder: String,
    checksums: ChangesetChecksumService,
    cancellation: CancellationFlag,
}

impl<'a> ExecutionCoordinator<'a> {
    /// 新しいExecutionCoordinatorを作成
    ///
    /// 設定は作成時に検証されます。
    pub fn new(dispatcher: SqlDispatcher<'a>, config: ExecutionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let holder = config.holder_id.clone().unwrap_or_else(default_holder_id);
        Ok(Self {
            dispatcher,
            config,
            holder,
            checksums: ChangesetChecksumService::new(),
            cancellation: CancellationFlag::new(),
        })
    }

    /// 外部から共有するキャンセル要求を設定
    pub fn with_cancellation(mut self, cancellation: CancellationFlag) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn cancellation(&self) -> CancellationFlag {
        self.cancellation.clone()
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    fn lock<'e>(&'e self, entry: &'e CapabilityEntry) -> ExecutionLock<'e> {
        ExecutionLock::new(
            entry,
            &self.config.lock_table,
            self.holder.clone(),
            &self.config.lock,
            self.config.query_timeout(),
        )
    }

    fn transition(&self, state: &mut RunState, next: RunState) {
        debug!(from = %state, to = %next, "Run state transition");
        *state = next;
    }

    /// 事前検証と描画（I/Oなし）
    ///
    /// ID重複、各ステートメントの検証、エンジンでの描画をすべて行います。
    pub fn plan<'c>(
        &self,
        changesets: &'c [Changeset],
        entry: &CapabilityEntry,
    ) -> Result<Vec<PlannedChangeset<'c>>, ExecutionError> {
        ensure_unique_ids(changesets)?;

        let mut planned = Vec::with_capacity(changesets.len());
        for changeset in changesets {
            changeset.validate()?;
            let checksum = self.checksums.calculate_checksum(changeset);

            let mut sql = Vec::new();
            let mut unsupported = None;
            for statement in &changeset.statements {
                match self.dispatcher.generate(statement, &entry.engine) {
                    Ok(rendered) => sql.extend(rendered.statements),
                    Err(e)
                        if e.is_not_supported()
                            && self.config.unsupported_policy == UnsupportedPolicy::Skip =>
                    {
                        info!(
                            changeset = %changeset.id,
                            operation = %statement.operation(),
                            engine = %entry.engine,
                            "Skipping changeset with unsupported statement"
                        );
                        unsupported = Some(statement.operation());
                        break;
                    }
                    Err(source) => {
                        return Err(ExecutionError::Dispatch {
                            id: changeset.id.clone(),
                            source,
                        })
                    }
                }
            }

            let step = match unsupported {
                Some(operation) => PlannedStep::Unsupported(operation),
                None => PlannedStep::Execute(sql),
            };
            planned.push(PlannedChangeset {
                changeset,
                checksum,
                step,
            });
        }
        Ok(planned)
    }

    /// チェンジセットを適用
    ///
    /// # Arguments
    ///
    /// * `changesets` - 適用するチェンジセット（入力順に適用）
    /// * `conn` - 対象データベースへの接続
    ///
    /// # Returns
    ///
    /// チェンジセットごとの結果と全体の状態。
    /// 実行に失敗した場合は失敗時点までのサマリーを含む`ExecutionError::ChangesetFailed`
    pub async fn apply_all(
        &self,
        changesets: &[Changeset],
        conn: &mut dyn DatabaseConnection,
    ) -> Result<AppliedSummary, ExecutionError> {
        let mut state = RunState::Idle;
        let entry = self.dispatcher.matrix().entry(conn.engine())?;
        let plan = self.plan(changesets, entry)?;

        let timeout = self.config.query_timeout();
        let history = ChangelogHistory::new(entry, &self.config.changelog_table);
        let lock = self.lock(entry);

        with_timeout(timeout, "create changelog table", history.ensure_table(conn)).await?;
        with_timeout(timeout, "create lock table", lock.ensure_table(conn)).await?;
        lock.acquire(conn).await?;
        self.transition(&mut state, RunState::LockAcquired);

        let result = self.run_locked(&plan, entry, &history, conn, &mut state).await;

        let released = with_timeout(timeout, "lock release", lock.release(conn)).await;
        let status = if result.is_ok() {
            RunStatus::Success
        } else {
            RunStatus::Failed
        };
        self.transition(&mut state, RunState::Unlocked(status));

        match (result, released) {
            (Ok(summary), Ok(())) => Ok(summary),
            (Ok(_), Err(release_error)) => Err(release_error),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(release_error)) => {
                warn!(error = %release_error, "Failed to release execution lock after failed run");
                Err(e)
            }
        }
    }

    async fn run_locked(
        &self,
        plan: &[PlannedChangeset<'_>],
        entry: &CapabilityEntry,
        history: &ChangelogHistory<'_>,
        conn: &mut dyn DatabaseConnection,
        state: &mut RunState,
    ) -> Result<AppliedSummary, ExecutionError> {
        self.transition(state, RunState::Verifying);
        let timeout = self.config.query_timeout();
        let records = with_timeout(timeout, "load changelog", history.load(conn)).await?;
        let dispositions = self.verify(plan, &records, history, conn).await?;

        self.transition(state, RunState::Applying);
        let mut summary = AppliedSummary::new(entry.engine.clone());
        for (planned, disposition) in plan.iter().zip(dispositions) {
            let id = planned.changeset.id.as_str();
            if disposition == Disposition::AlreadyApplied {
                summary.push(id, &planned.checksum, ChangesetOutcome::SkippedAlreadyApplied);
                continue;
            }
            let sql = match &planned.step {
                PlannedStep::Unsupported(operation) => {
                    summary.push(
                        id,
                        &planned.checksum,
                        ChangesetOutcome::SkippedUnsupported {
                            operation: *operation,
                        },
                    );
                    continue;
                }
                PlannedStep::Execute(sql) => sql,
            };

            if self.cancellation.is_cancelled() {
                info!(changeset = %id, "Run cancelled before changeset");
                summary.cancelled = true;
                break;
            }

            let order = with_timeout(timeout, "next order", history.next_order(conn)).await?;
            match self.apply_one(planned, sql, order, entry, history, conn, state).await {
                Ok(()) => {
                    info!(changeset = %id, order_executed = order, "Applied changeset");
                    summary.push(
                        id,
                        &planned.checksum,
                        ChangesetOutcome::Applied {
                            order_executed: order,
                        },
                    );
                }
                Err(source) => {
                    warn!(changeset = %id, error = %source, "Changeset failed");
                    summary.push(
                        id,
                        &planned.checksum,
                        ChangesetOutcome::Failed {
                            message: source.to_string(),
                        },
                    );
                    summary.status = RunStatus::Failed;
                    return Err(ExecutionError::ChangesetFailed {
                        id: id.to_string(),
                        source,
                        summary: Box::new(summary),
                    });
                }
            }
        }

        info!(
            engine = %entry.engine,
            applied = summary.applied_count(),
            skipped = summary.skipped_count(),
            cancelled = summary.cancelled,
            "Run finished"
        );
        Ok(summary)
    }

    /// 記録済みチェンジセットのチェックサムを照合
    async fn verify(
        &self,
        plan: &[PlannedChangeset<'_>],
        records: &BTreeMap<String, ChangesetRecord>,
        history: &ChangelogHistory<'_>,
        conn: &mut dyn DatabaseConnection,
    ) -> Result<Vec<Disposition>, ExecutionError> {
        let mut dispositions = Vec::with_capacity(plan.len());
        for planned in plan {
            let changeset = planned.changeset;
            let Some(record) = records.get(&changeset.id) else {
                dispositions.push(Disposition::Pending);
                continue;
            };

            if self.checksums.compare_checksums(&record.checksum, &planned.checksum)
                || changeset.accepts_checksum(&record.checksum)
            {
                dispositions.push(Disposition::AlreadyApplied);
                continue;
            }

            match self.config.checksum_policy {
                ChecksumPolicy::Fail => {
                    return Err(ExecutionError::ChecksumMismatch {
                        id: changeset.id.clone(),
                        expected: record.checksum.clone(),
                        actual: planned.checksum.clone(),
                    });
                }
                ChecksumPolicy::Repair => {
                    with_timeout(
                        self.config.query_timeout(),
                        "repair checksum",
                        history.update_checksum(conn, &changeset.id, &planned.checksum),
                    )
                    .await?;
                    warn!(
                        changeset = %changeset.id,
                        recorded = %record.checksum,
                        current = %planned.checksum,
                        "Repaired changeset checksum"
                    );
                    dispositions.push(Disposition::AlreadyApplied);
                }
            }
        }
        Ok(dispositions)
    }

    /// 1つのチェンジセットを実行して記録
    #[allow(clippy::too_many_arguments)]
    async fn apply_one(
        &self,
        planned: &PlannedChangeset<'_>,
        sql: &[String],
        order: i64,
        entry: &CapabilityEntry,
        history: &ChangelogHistory<'_>,
        conn: &mut dyn DatabaseConnection,
        state: &mut RunState,
    ) -> Result<(), DriverError> {
        let record_sql = history.insert_sql(&planned.changeset.id, &planned.checksum, Utc::now(), order);

        if entry.transactional_ddl {
            let mut batch = sql.to_vec();
            batch.push(record_sql);
            self.transition(state, RunState::Recording);
            let result = with_transaction(conn, move |tx| {
                Box::pin(async move {
                    for statement in &batch {
                        tx.execute(statement).await?;
                    }
                    Ok::<(), DriverError>(())
                })
            })
            .await;
            self.transition(state, RunState::Applying);
            return result;
        }

        for statement in sql {
            conn.execute(statement).await?;
        }
        self.transition(state, RunState::Recording);
        debug!(changeset = %planned.changeset.id, "Recording outside of the changeset transaction");
        conn.execute(&record_sql).await?;
        self.transition(state, RunState::Applying);
        Ok(())
    }

    /// 適用状況を確認（ロックを取らず、何も書き込みません）
    pub async fn status(
        &self,
        changesets: &[Changeset],
        conn: &mut dyn DatabaseConnection,
    ) -> Result<Vec<ChangesetStatus>, ExecutionError> {
        let entry = self.dispatcher.matrix().entry(conn.engine())?;
        let history = ChangelogHistory::new(entry, &self.config.changelog_table);
        let records = if history.exists(conn).await {
            with_timeout(self.config.query_timeout(), "load changelog", history.load(conn)).await?
        } else {
            BTreeMap::new()
        };

        Ok(changesets
            .iter()
            .map(|changeset| {
                let checksum = self.checksums.calculate_checksum(changeset);
                let state = match records.get(&changeset.id) {
                    None => ChangesetState::Pending,
                    Some(record)
                        if self.checksums.compare_checksums(&record.checksum, &checksum)
                            || changeset.accepts_checksum(&record.checksum) =>
                    {
                        ChangesetState::Applied {
                            order_executed: record.order_executed,
                            applied_at: record.applied_at,
                        }
                    }
                    Some(record) => ChangesetState::Drifted {
                        recorded: record.checksum.clone(),
                    },
                };
                ChangesetStatus {
                    id: changeset.id.clone(),
                    checksum,
                    state,
                }
            })
            .collect())
    }

    /// 現在のロック保持者
    pub async fn lock_status(
        &self,
        conn: &mut dyn DatabaseConnection,
    ) -> Result<Option<LockHolder>, ExecutionError> {
        let entry = self.dispatcher.matrix().entry(conn.engine())?;
        let lock = self.lock(entry);
        if !table_exists(conn, entry, &self.config.lock_table).await {
            return Ok(None);
        }
        with_timeout(self.config.query_timeout(), "lock status", lock.status(conn)).await
    }

    /// ロックを強制的に解放
    ///
    /// # Returns
    ///
    /// 削除したロック行の数
    pub async fn release_locks(&self, conn: &mut dyn DatabaseConnection) -> Result<u64, ExecutionError> {
        let entry = self.dispatcher.matrix().entry(conn.engine())?;
        let lock = self.lock(entry);
        if !table_exists(conn, entry, &self.config.lock_table).await {
            return Ok(0);
        }
        with_timeout(self.config.query_timeout(), "release locks", lock.force_release(conn)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::connection::RowSet;
    use async_trait::async_trait;
    use tidemark_core::core::capability::CapabilityMatrix;
    use tidemark_core::core::engine::{Dialect, EngineId};
    use tidemark_core::core::statement::{
        AddAutoIncrementStatement, CreateTableStatement, RawSqlStatement, TableRef,
    };

    /// 発行されたSQLを記録するだけの接続
    struct RecordingConnection {
        engine: EngineId,
        executed: Vec<String>,
    }

    #[async_trait]
    impl DatabaseConnection for RecordingConnection {
        fn engine(&self) -> &EngineId {
            &self.engine
        }

        async fn execute(&mut self, sql: &str) -> Result<u64, DriverError> {
            self.executed.push(sql.to_string());
            Ok(0)
        }

        async fn query(&mut self, sql: &str) -> Result<RowSet, DriverError> {
            self.executed.push(sql.to_string());
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

    fn coordinator(config: ExecutionConfig) -> ExecutionCoordinator<'static> {
        ExecutionCoordinator::new(SqlDispatcher::new().unwrap(), config).unwrap()
    }

    fn entry(dialect: Dialect) -> &'static CapabilityEntry {
        CapabilityMatrix::global().entry(&dialect.id()).unwrap()
    }

    fn add_auto_increment(id: &str) -> Changeset {
        Changeset::new(id).with_statement(AddAutoIncrementStatement::new(
            TableRef::new("AddAutoIncTest"),
            "testCol",
            "int",
        ))
    }

    #[test]
    fn test_plan_rejects_duplicate_ids() {
        let changesets = vec![
            Changeset::new("1").with_statement(RawSqlStatement::new("SELECT 1")),
            Changeset::new("1").with_statement(RawSqlStatement::new("SELECT 2")),
        ];
        let err = coordinator(ExecutionConfig::default())
            .plan(&changesets, entry(Dialect::SQLite))
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_plan_fails_on_unsupported_by_default() {
        let changesets = vec![add_auto_increment("auto")];
        let err = coordinator(ExecutionConfig::default())
            .plan(&changesets, entry(Dialect::PostgreSQL))
            .unwrap_err();
        assert!(err.is_not_supported());
    }

    #[test]
    fn test_plan_skips_unsupported_when_configured() {
        let changesets = vec![
            add_auto_increment("auto"),
            Changeset::new("table")
                .with_statement(CreateTableStatement::new("t").add_primary_key_column("id", "int")),
        ];
        let config = ExecutionConfig {
            unsupported_policy: UnsupportedPolicy::Skip,
            ..Default::default()
        };
        let plan = coordinator(config)
            .plan(&changesets, entry(Dialect::PostgreSQL))
            .unwrap();
        assert_eq!(
            plan[0].step,
            PlannedStep::Unsupported(OperationKind::AddAutoIncrement)
        );
        assert!(matches!(&plan[1].step, PlannedStep::Execute(sql) if !sql.is_empty()));
        assert_eq!(plan[0].checksum.len(), 64);
    }

    #[tokio::test]
    async fn test_unsupported_statement_touches_no_connection() {
        let mut conn = RecordingConnection {
            engine: Dialect::PostgreSQL.id(),
            executed: Vec::new(),
        };
        let err = coordinator(ExecutionConfig::default())
            .apply_all(&[add_auto_increment("auto")], &mut conn)
            .await
            .unwrap_err();
        assert!(err.is_not_supported());
        assert!(conn.executed.is_empty());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = ExecutionConfig::default();
        config.lock.max_attempts = 0;
        assert!(ExecutionCoordinator::new(SqlDispatcher::new().unwrap(), config).is_err());
    }

    #[test]
    fn test_cancellation_flag_is_shared() {
        let flag = CancellationFlag::new();
        let coordinator = coordinator(ExecutionConfig::default()).with_cancellation(flag.clone());
        assert!(!coordinator.cancellation().is_cancelled());
        flag.cancel();
        assert!(coordinator.cancellation().is_cancelled());
    }

    #[test]
    fn test_run_state_display() {
        assert_eq!(RunState::LockAcquired.to_string(), "lock_acquired");
        assert_eq!(
            RunState::Unlocked(RunStatus::Failed).to_string(),
            "unlocked(failed)"
        );
    }
}
