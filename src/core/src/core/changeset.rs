// チェンジセット
//
// 一意なIDとチェックサムで追跡される変更の単位と、
// その実行結果を表す型を定義します。

use crate::core::engine::EngineId;
use crate::core::error::ValidationError;
use crate::core::operation::OperationKind;
use crate::core::statement::ChangeStatement;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// チェンジセット
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changeset {
    /// 一意なID
    pub id: String,

    /// 作成者
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// 変更ステートメント（記述順に実行）
    pub statements: Vec<ChangeStatement>,

    /// 現在の内容と異なっていても受け入れる記録済みチェックサム
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub valid_checksums: Vec<String>,
}

impl Changeset {
    /// 新しいチェンジセットを作成
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            author: None,
            statements: Vec::new(),
            valid_checksums: Vec::new(),
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_statement(mut self, statement: impl Into<ChangeStatement>) -> Self {
        self.statements.push(statement.into());
        self
    }

    /// 記録済みチェックサムを追加で受け入れる
    pub fn accept_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.valid_checksums.push(checksum.into().to_ascii_lowercase());
        self
    }

    /// チェックサムが受け入れリストに含まれるか
    pub fn accepts_checksum(&self, checksum: &str) -> bool {
        self.valid_checksums
            .iter()
            .any(|c| c.eq_ignore_ascii_case(checksum))
    }

    /// チェンジセット自体と各ステートメントの必須パラメータを検証
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::InvalidChangeset {
                id: self.id.clone(),
                reason: "id must not be empty".to_string(),
            });
        }
        if self.statements.is_empty() {
            return Err(ValidationError::InvalidChangeset {
                id: self.id.clone(),
                reason: "no statements".to_string(),
            });
        }
        for statement in &self.statements {
            statement.validate()?;
        }
        Ok(())
    }
}

/// チェンジセットIDの重複を検出
///
/// # Returns
///
/// 最初に見つかった重複IDを`DuplicateChangeset`として返します
pub fn ensure_unique_ids(changesets: &[Changeset]) -> Result<(), ValidationError> {
    let mut seen = BTreeSet::new();
    for changeset in changesets {
        if !seen.insert(changeset.id.as_str()) {
            return Err(ValidationError::DuplicateChangeset {
                id: changeset.id.clone(),
            });
        }
    }
    Ok(())
}

/// 追跡テーブルの1行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangesetRecord {
    pub id: String,
    /// SHA-256（16進64文字）
    pub checksum: String,
    pub applied_at: DateTime<Utc>,
    pub order_executed: i64,
}

/// チェンジセットごとの実行結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ChangesetOutcome {
    /// 今回の実行で適用された
    Applied { order_executed: i64 },
    /// 既に適用済み
    SkippedAlreadyApplied,
    /// エンジンが対応していないためスキップ
    SkippedUnsupported { operation: OperationKind },
    /// 実行に失敗した
    Failed { message: String },
}

impl ChangesetOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ChangesetOutcome::Applied { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(
            self,
            ChangesetOutcome::SkippedAlreadyApplied | ChangesetOutcome::SkippedUnsupported { .. }
        )
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ChangesetOutcome::Failed { .. })
    }
}

/// チェンジセットの結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangesetResult {
    pub id: String,
    pub checksum: String,
    #[serde(flatten)]
    pub outcome: ChangesetOutcome,
}

/// 実行全体の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Failed,
}

/// 実行結果のサマリー
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedSummary {
    pub engine: EngineId,
    pub results: Vec<ChangesetResult>,
    pub status: RunStatus,
    /// キャンセル要求により途中で停止したか
    pub cancelled: bool,
}

impl AppliedSummary {
    pub fn new(engine: EngineId) -> Self {
        Self {
            engine,
            results: Vec::new(),
            status: RunStatus::Success,
            cancelled: false,
        }
    }

    pub fn push(&mut self, id: impl Into<String>, checksum: impl Into<String>, outcome: ChangesetOutcome) {
        self.results.push(ChangesetResult {
            id: id.into(),
            checksum: checksum.into(),
            outcome,
        });
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    /// 今回適用されたチェンジセット数
    pub fn applied_count(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_applied()).count()
    }

    /// スキップされたチェンジセット数
    pub fn skipped_count(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_skipped()).count()
    }

    /// IDで結果を取得
    pub fn result(&self, id: &str) -> Option<&ChangesetResult> {
        self.results.iter().find(|r| r.id == id)
    }
}

/// 適用状況（非破壊の状態確認用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ChangesetState {
    /// 未適用
    Pending,
    /// 適用済み
    Applied {
        order_executed: i64,
        applied_at: DateTime<Utc>,
    },
    /// 適用後に内容が変更された
    Drifted { recorded: String },
}

/// チェンジセットの適用状況
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangesetStatus {
    pub id: String,
    pub checksum: String,
    #[serde(flatten)]
    pub state: ChangesetState,
}

impl ChangesetStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self.state, ChangesetState::Pending)
    }

    pub fn is_drifted(&self) -> bool {
        matches!(self.state, ChangesetState::Drifted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::statement::{DropTableStatement, RawSqlStatement};

    #[test]
    fn test_ensure_unique_ids() {
        let changesets = vec![
            Changeset::new("1").with_statement(RawSqlStatement::new("SELECT 1")),
            Changeset::new("2").with_statement(RawSqlStatement::new("SELECT 2")),
            Changeset::new("1").with_statement(RawSqlStatement::new("SELECT 3")),
        ];
        assert_eq!(
            ensure_unique_ids(&changesets).unwrap_err(),
            ValidationError::DuplicateChangeset {
                id: "1".to_string()
            }
        );
        assert!(ensure_unique_ids(&changesets[..2]).is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_changeset() {
        let err = Changeset::new("empty").validate().unwrap_err();
        assert!(err.is_invalid_changeset());
        let err = Changeset::new(" ")
            .with_statement(DropTableStatement::new("t"))
            .validate()
            .unwrap_err();
        assert!(err.is_invalid_changeset());
    }

    #[test]
    fn test_validate_propagates_statement_errors() {
        let err = Changeset::new("1")
            .with_statement(DropTableStatement::new(""))
            .validate()
            .unwrap_err();
        assert!(err.is_missing_parameter());
    }

    #[test]
    fn test_accepts_checksum_is_case_insensitive() {
        let changeset = Changeset::new("1").accept_checksum("ABCDEF");
        assert!(changeset.accepts_checksum("abcdef"));
        assert!(!changeset.accepts_checksum("123456"));
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = AppliedSummary::new(EngineId::new("sqlite"));
        summary.push("1", "a", ChangesetOutcome::Applied { order_executed: 1 });
        summary.push("2", "b", ChangesetOutcome::SkippedAlreadyApplied);
        summary.push(
            "3",
            "c",
            ChangesetOutcome::SkippedUnsupported {
                operation: OperationKind::AddAutoIncrement,
            },
        );
        assert_eq!(summary.applied_count(), 1);
        assert_eq!(summary.skipped_count(), 2);
        assert!(summary.is_success());
        assert!(summary.result("2").unwrap().outcome.is_skipped());
    }

    #[test]
    fn test_summary_serializes_outcome_inline() {
        let mut summary = AppliedSummary::new(EngineId::new("sqlite"));
        summary.push("1", "a", ChangesetOutcome::Applied { order_executed: 3 });
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["results"][0]["outcome"], "applied");
        assert_eq!(json["results"][0]["order_executed"], 3);
        assert_eq!(json["status"], "success");
    }
}
