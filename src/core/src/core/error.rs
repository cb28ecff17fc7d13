// エラー型定義
//
// 変更エンジン全体で使用されるカスタムエラー型を提供します。
// thiserrorを使用して、領域ごとにエラー型を分けて定義します。

use crate::core::engine::EngineId;
use crate::core::operation::OperationKind;
use thiserror::Error;

/// ケイパビリティマトリクスのエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityError {
    /// 未登録のエンジン
    #[error("Unknown engine '{engine}'")]
    UnknownEngine {
        /// 問い合わせたエンジン
        engine: EngineId,
    },

    /// 同じエンジンの二重登録
    #[error("Engine '{engine}' is already registered")]
    DuplicateEngine {
        /// 二重登録されたエンジン
        engine: EngineId,
    },
}

impl CapabilityError {
    /// 未登録エンジンエラーかどうか
    pub fn is_unknown_engine(&self) -> bool {
        matches!(self, CapabilityError::UnknownEngine { .. })
    }

    /// 二重登録エラーかどうか
    pub fn is_duplicate_engine(&self) -> bool {
        matches!(self, CapabilityError::DuplicateEngine { .. })
    }
}

/// バリデーションエラー
///
/// ステートメントやチェンジセットの必須パラメータ検証で発生するエラーを表現します。
/// いずれもデータベースへのI/Oの前に検出されます。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Required parameter missing
    #[error("{operation}: required parameter '{parameter}' is missing")]
    MissingParameter {
        /// 対象の操作
        operation: OperationKind,
        /// パラメータ名
        parameter: &'static str,
    },

    /// Parameter present but malformed
    #[error("{operation}: invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// 対象の操作
        operation: OperationKind,
        /// パラメータ名
        parameter: &'static str,
        /// 不正な理由
        reason: String,
    },

    /// Identifier exceeds the engine limit
    #[error("Identifier '{identifier}' is {length} characters long; {engine} allows at most {max}")]
    IdentifierTooLong {
        /// 識別子
        identifier: String,
        /// 識別子の長さ
        length: usize,
        /// エンジンの上限
        max: usize,
        /// 対象エンジン
        engine: EngineId,
    },

    /// Changeset itself is malformed (empty id, no statements)
    #[error("Changeset '{id}' is invalid: {reason}")]
    InvalidChangeset {
        /// チェンジセットID
        id: String,
        /// 不正な理由
        reason: String,
    },

    /// The same changeset id appears twice in one change log
    #[error("Changeset '{id}' is declared more than once")]
    DuplicateChangeset {
        /// 重複したチェンジセットID
        id: String,
    },
}

impl ValidationError {
    /// 必須パラメータ欠落エラーを作成
    pub fn missing(operation: OperationKind, parameter: &'static str) -> Self {
        ValidationError::MissingParameter {
            operation,
            parameter,
        }
    }

    /// 不正パラメータエラーを作成
    pub fn invalid(operation: OperationKind, parameter: &'static str, reason: impl Into<String>) -> Self {
        ValidationError::InvalidParameter {
            operation,
            parameter,
            reason: reason.into(),
        }
    }

    /// 必須パラメータ欠落エラーかどうか
    pub fn is_missing_parameter(&self) -> bool {
        matches!(self, ValidationError::MissingParameter { .. })
    }

    /// 不正パラメータエラーかどうか
    pub fn is_invalid_parameter(&self) -> bool {
        matches!(self, ValidationError::InvalidParameter { .. })
    }

    /// 識別子長超過エラーかどうか
    pub fn is_identifier_too_long(&self) -> bool {
        matches!(self, ValidationError::IdentifierTooLong { .. })
    }

    /// チェンジセット不正エラーかどうか
    pub fn is_invalid_changeset(&self) -> bool {
        matches!(self, ValidationError::InvalidChangeset { .. })
    }

    /// チェンジセットID重複エラーかどうか
    pub fn is_duplicate_changeset(&self) -> bool {
        matches!(self, ValidationError::DuplicateChangeset { .. })
    }
}

/// ディスパッチエラー
///
/// ステートメントを方言別SQLに変換する際に発生するエラーを表現します。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Capability lookup failed
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// The statement cannot be expressed for this engine
    #[error("{operation} is not supported on {engine}")]
    StatementNotSupportedOnDatabase {
        /// 対象の操作
        operation: OperationKind,
        /// 対象エンジン
        engine: EngineId,
    },

    /// Statement parameters are invalid
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No generator registered for the pair (dialect coverage gap)
    #[error("No SQL generator registered for {operation} on {engine}")]
    NoGenerator {
        /// 対象の操作
        operation: OperationKind,
        /// 対象エンジン
        engine: EngineId,
    },

    /// Two generators tie in specificity (registration-time error)
    #[error("Generators '{first}' and '{second}' tie for {operation}")]
    AmbiguousGenerator {
        /// 対象の操作
        operation: OperationKind,
        /// 先に登録されたジェネレーターの述語
        first: String,
        /// 後から登録されたジェネレーターの述語
        second: String,
    },

    /// A generator received a statement of the wrong kind
    #[error("Generator for {expected} received a {actual} statement")]
    MalformedStatement {
        /// ジェネレーターが扱う操作
        expected: OperationKind,
        /// 実際に渡された操作
        actual: OperationKind,
    },
}

impl DispatchError {
    /// 非対応ステートメントエラーかどうか
    pub fn is_not_supported(&self) -> bool {
        matches!(self, DispatchError::StatementNotSupportedOnDatabase { .. })
    }

    /// 未登録エンジンエラーかどうか
    pub fn is_unknown_engine(&self) -> bool {
        matches!(self, DispatchError::Capability(CapabilityError::UnknownEngine { .. }))
    }

    /// バリデーションエラーかどうか
    pub fn is_validation(&self) -> bool {
        matches!(self, DispatchError::Validation(_))
    }

    /// ジェネレーター未登録エラーかどうか
    pub fn is_no_generator(&self) -> bool {
        matches!(self, DispatchError::NoGenerator { .. })
    }

    /// ジェネレーター曖昧性エラーかどうか
    pub fn is_ambiguous_generator(&self) -> bool {
        matches!(self, DispatchError::AmbiguousGenerator { .. })
    }
}

/// ドライバーエラー
///
/// 外部ドライバー（接続・クエリ実行）から返されるエラーを表現します。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// Connection error
    #[error("Database connection error: {message}")]
    Connection {
        /// エラーメッセージ
        message: String,
    },

    /// Query execution error
    #[error("Query execution error: {message}")]
    Query {
        /// エラーメッセージ
        message: String,
        /// 失敗したSQL
        sql: Option<String>,
    },

    /// Transaction error
    #[error("Transaction error: {message}")]
    Transaction {
        /// エラーメッセージ
        message: String,
    },
}

impl DriverError {
    /// SQL付きのクエリエラーを作成
    pub fn query(message: impl Into<String>, sql: impl Into<String>) -> Self {
        DriverError::Query {
            message: message.into(),
            sql: Some(sql.into()),
        }
    }

    /// 接続エラーかどうか
    pub fn is_connection(&self) -> bool {
        matches!(self, DriverError::Connection { .. })
    }

    /// クエリエラーかどうか
    pub fn is_query(&self) -> bool {
        matches!(self, DriverError::Query { .. })
    }

    /// トランザクションエラーかどうか
    pub fn is_transaction(&self) -> bool {
        matches!(self, DriverError::Transaction { .. })
    }

    /// 失敗したSQLを取得
    pub fn sql(&self) -> Option<&str> {
        match self {
            DriverError::Query { sql, .. } => sql.as_deref(),
            _ => None,
        }
    }
}

/// スナップショット取得エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    /// Capability lookup failed
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// The engine exposes no metadata the snapshot service can read
    #[error("Schema snapshots are not supported on {engine}")]
    Unsupported {
        /// 対象エンジン
        engine: EngineId,
    },

    /// Metadata query failed
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// Metadata query exceeded the configured timeout
    #[error("Metadata query timed out after {timeout_ms} ms: {context}")]
    Timeout {
        /// タイムアウト（ミリ秒）
        timeout_ms: u64,
        /// 実行中だった処理
        context: String,
    },

    /// Metadata queries only see the connection's own catalog
    #[error("Cannot snapshot catalog '{requested}' on {engine}: connection is bound to catalog '{current}'")]
    CatalogMismatch {
        /// 対象エンジン
        engine: EngineId,
        /// 指定されたカタログ
        requested: String,
        /// 接続の既定カタログ
        current: String,
    },
}

impl SnapshotError {
    /// 非対応エンジンエラーかどうか
    pub fn is_unsupported(&self) -> bool {
        matches!(self, SnapshotError::Unsupported { .. })
    }

    /// タイムアウトエラーかどうか
    pub fn is_timeout(&self) -> bool {
        matches!(self, SnapshotError::Timeout { .. })
    }

    /// 接続先と異なるカタログを指定したエラーかどうか
    pub fn is_catalog_mismatch(&self) -> bool {
        matches!(self, SnapshotError::CatalogMismatch { .. })
    }
}

/// 実行エラー
///
/// 実行コーディネーターがチェンジセットを適用する際に発生するエラーを表現します。
#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    /// Capability lookup failed
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// Pre-flight validation failed
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Rendering failed (unsupported statement, coverage gap, …)
    #[error("Changeset '{id}': {source}")]
    Dispatch {
        /// チェンジセットID
        id: String,
        /// 原因
        #[source]
        source: DispatchError,
    },

    /// Another holder kept the lock beyond the wait budget
    #[error("Could not acquire the execution lock after {attempts} attempts (held by {holder})")]
    LockTimeout {
        /// 試行回数
        attempts: u32,
        /// 現在のロック保持者
        holder: String,
    },

    /// A recorded changeset changed after it was applied
    #[error("Changeset '{id}' was modified after it was applied (recorded {expected}, current {actual})")]
    ChecksumMismatch {
        /// チェンジセットID
        id: String,
        /// 記録済みのチェックサム
        expected: String,
        /// 現在のチェックサム
        actual: String,
    },

    /// A changeset failed while executing; its transaction was rolled back
    #[error("Changeset '{id}' failed: {source}")]
    ChangesetFailed {
        /// チェンジセットID
        id: String,
        /// 原因
        #[source]
        source: DriverError,
        /// 失敗時点までの実行結果
        summary: Box<crate::core::changeset::AppliedSummary>,
    },

    /// Driver failure outside of a changeset (history, lock)
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// A bounded operation exceeded its timeout
    #[error("Operation timed out after {timeout_ms} ms: {context}")]
    Timeout {
        /// タイムアウト（ミリ秒）
        timeout_ms: u64,
        /// 実行中だった処理
        context: String,
    },
}

impl ExecutionError {
    /// ロックタイムアウトかどうか
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, ExecutionError::LockTimeout { .. })
    }

    /// チェックサム不一致かどうか
    pub fn is_checksum_mismatch(&self) -> bool {
        matches!(self, ExecutionError::ChecksumMismatch { .. })
    }

    /// チェンジセット実行失敗かどうか
    pub fn is_changeset_failed(&self) -> bool {
        matches!(self, ExecutionError::ChangesetFailed { .. })
    }

    /// 非対応ステートメントによる失敗かどうか
    pub fn is_not_supported(&self) -> bool {
        matches!(self, ExecutionError::Dispatch { source, .. } if source.is_not_supported())
    }

    /// バリデーションエラーかどうか
    pub fn is_validation(&self) -> bool {
        match self {
            ExecutionError::Validation(_) => true,
            ExecutionError::Dispatch { source, .. } => source.is_validation(),
            _ => false,
        }
    }

    /// タイムアウトかどうか
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecutionError::Timeout { .. })
    }

    /// 失敗時点までの実行結果を取得
    pub fn summary(&self) -> Option<&crate::core::changeset::AppliedSummary> {
        match self {
            ExecutionError::ChangesetFailed { summary, .. } => Some(summary),
            _ => None,
        }
    }
}

/// 設定エラー
///
/// 実行設定の検証時に発生するエラーを表現します。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// 値が範囲外
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue {
        /// 設定項目名
        field: &'static str,
        /// 不正な理由
        reason: String,
    },

    /// 追跡テーブルとロックテーブルが同名
    #[error("Changelog table and lock table must differ (both '{name}')")]
    TableNameConflict {
        /// 衝突したテーブル名
        name: String,
    },
}

/// 変更エンジンの公開エラー
///
/// 公開エントリポイントが返すエラーをまとめます。
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// ケイパビリティエラー
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// バリデーションエラー
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// ディスパッチエラー
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// スナップショットエラー
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// 実行エラー
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// ドライバーエラー
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// 設定エラー
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// 非対応ステートメントによる失敗かどうか
    pub fn is_not_supported(&self) -> bool {
        match self {
            Error::Dispatch(e) => e.is_not_supported(),
            Error::Execution(e) => e.is_not_supported(),
            _ => false,
        }
    }

    /// 未登録エンジンによる失敗かどうか
    pub fn is_unknown_engine(&self) -> bool {
        match self {
            Error::Capability(e) => e.is_unknown_engine(),
            Error::Dispatch(e) => e.is_unknown_engine(),
            Error::Snapshot(SnapshotError::Capability(e))
            | Error::Execution(ExecutionError::Capability(e)) => e.is_unknown_engine(),
            _ => false,
        }
    }

    /// ロックタイムアウトかどうか
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, Error::Execution(e) if e.is_lock_timeout())
    }

    /// チェックサム不一致かどうか
    pub fn is_checksum_mismatch(&self) -> bool {
        matches!(self, Error::Execution(e) if e.is_checksum_mismatch())
    }

    /// スナップショットのカタログ指定が接続先と異なるかどうか
    pub fn is_catalog_mismatch(&self) -> bool {
        matches!(self, Error::Snapshot(e) if e.is_catalog_mismatch())
    }
}
