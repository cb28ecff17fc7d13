// インデックス・ビュー・シーケンス・生SQLのステートメント

use super::{require, require_all, ChangeStatement, Statement, TableRef};
use crate::core::capability::{CapabilityEntry, SyntaxFeature};
use crate::core::error::ValidationError;
use crate::core::operation::OperationKind;
use serde::{Deserialize, Serialize};

/// インデックス作成
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateIndexStatement {
    pub table: TableRef,
    pub index_name: String,
    pub column_names: Vec<String>,
    #[serde(default, skip_serializing_if = "super::is_false")]
    pub unique: bool,
}

impl CreateIndexStatement {
    pub fn new<I, S>(index_name: impl Into<String>, table: impl Into<TableRef>, column_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            table: table.into(),
            index_name: index_name.into(),
            column_names: column_names.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

impl Statement for CreateIndexStatement {
    fn operation(&self) -> OperationKind {
        OperationKind::CreateIndex
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let op = self.operation();
        self.table.validate(op, "table_name")?;
        require(op, "index_name", &self.index_name)?;
        require_all(op, "column_names", &self.column_names)
    }

    fn inverse(&self) -> Option<ChangeStatement> {
        Some(DropIndexStatement::new(self.index_name.clone(), self.table.clone()).into())
    }

    fn targets(&self) -> Vec<&TableRef> {
        vec![&self.table]
    }

    fn identifiers(&self) -> Vec<&str> {
        self.table
            .identifiers()
            .chain(std::iter::once(self.index_name.as_str()))
            .chain(self.column_names.iter().map(String::as_str))
            .collect()
    }
}

/// インデックス削除
///
/// テーブルはMySQLやSQL Serverの`DROP INDEX ... ON`で必要になります。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropIndexStatement {
    pub table: TableRef,
    pub index_name: String,
}

impl DropIndexStatement {
    pub fn new(index_name: impl Into<String>, table: impl Into<TableRef>) -> Self {
        Self {
            table: table.into(),
            index_name: index_name.into(),
        }
    }
}

impl Statement for DropIndexStatement {
    fn operation(&self) -> OperationKind {
        OperationKind::DropIndex
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let op = self.operation();
        self.table.validate(op, "table_name")?;
        require(op, "index_name", &self.index_name)
    }

    fn targets(&self) -> Vec<&TableRef> {
        vec![&self.table]
    }

    fn identifiers(&self) -> Vec<&str> {
        self.table
            .identifiers()
            .chain(std::iter::once(self.index_name.as_str()))
            .collect()
    }
}

/// ビュー作成
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateViewStatement {
    pub view: TableRef,
    pub select_query: String,
    #[serde(default, skip_serializing_if = "super::is_false")]
    pub replace_if_exists: bool,
}

impl CreateViewStatement {
    pub fn new(view: impl Into<TableRef>, select_query: impl Into<String>) -> Self {
        Self {
            view: view.into(),
            select_query: select_query.into(),
            replace_if_exists: false,
        }
    }

    pub fn or_replace(mut self) -> Self {
        self.replace_if_exists = true;
        self
    }
}

impl Statement for CreateViewStatement {
    fn operation(&self) -> OperationKind {
        OperationKind::CreateView
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let op = self.operation();
        self.view.validate(op, "view_name")?;
        require(op, "select_query", &self.select_query)
    }

    fn inverse(&self) -> Option<ChangeStatement> {
        Some(DropViewStatement::new(self.view.clone()).into())
    }

    fn supports_engine(&self, entry: &CapabilityEntry) -> bool {
        entry.supports(self.operation())
            && (!self.replace_if_exists || entry.supports_syntax(SyntaxFeature::ReplaceView))
    }

    fn targets(&self) -> Vec<&TableRef> {
        vec![&self.view]
    }

    fn identifiers(&self) -> Vec<&str> {
        self.view.identifiers().collect()
    }
}

/// ビュー削除
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropViewStatement {
    pub view: TableRef,
}

impl DropViewStatement {
    pub fn new(view: impl Into<TableRef>) -> Self {
        Self { view: view.into() }
    }
}

impl Statement for DropViewStatement {
    fn operation(&self) -> OperationKind {
        OperationKind::DropView
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.view.validate(self.operation(), "view_name")
    }

    fn targets(&self) -> Vec<&TableRef> {
        vec![&self.view]
    }

    fn identifiers(&self) -> Vec<&str> {
        self.view.identifiers().collect()
    }
}

/// シーケンス作成
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSequenceStatement {
    pub sequence: TableRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_value: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub increment_by: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<i64>,
    #[serde(default, skip_serializing_if = "super::is_false")]
    pub cycle: bool,
}

impl CreateSequenceStatement {
    pub fn new(sequence: impl Into<TableRef>) -> Self {
        Self {
            sequence: sequence.into(),
            start_value: None,
            increment_by: None,
            min_value: None,
            max_value: None,
            cycle: false,
        }
    }

    pub fn start_value(mut self, value: i64) -> Self {
        self.start_value = Some(value);
        self
    }

    pub fn increment_by(mut self, value: i64) -> Self {
        self.increment_by = Some(value);
        self
    }

    pub fn min_value(mut self, value: i64) -> Self {
        self.min_value = Some(value);
        self
    }

    pub fn max_value(mut self, value: i64) -> Self {
        self.max_value = Some(value);
        self
    }

    pub fn cycle(mut self) -> Self {
        self.cycle = true;
        self
    }
}

impl Statement for CreateSequenceStatement {
    fn operation(&self) -> OperationKind {
        OperationKind::CreateSequence
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let op = self.operation();
        self.sequence.validate(op, "sequence_name")?;
        if self.increment_by == Some(0) {
            return Err(ValidationError::invalid(op, "increment_by", "must not be zero"));
        }
        if let (Some(min), Some(max)) = (self.min_value, self.max_value) {
            if min > max {
                return Err(ValidationError::invalid(
                    op,
                    "min_value",
                    format!("{} is greater than max_value {}", min, max),
                ));
            }
        }
        Ok(())
    }

    fn inverse(&self) -> Option<ChangeStatement> {
        Some(DropSequenceStatement::new(self.sequence.clone()).into())
    }

    /// MINVALUE・MAXVALUE・CYCLEは指定した場合だけ構文対応を確認する
    fn supports_engine(&self, entry: &CapabilityEntry) -> bool {
        let bounded = self.min_value.is_some() || self.max_value.is_some() || self.cycle;
        entry.supports(self.operation())
            && (!bounded || entry.supports_syntax(SyntaxFeature::SequenceBounds))
    }

    fn targets(&self) -> Vec<&TableRef> {
        vec![&self.sequence]
    }

    fn identifiers(&self) -> Vec<&str> {
        self.sequence.identifiers().collect()
    }
}

/// シーケンス削除
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropSequenceStatement {
    pub sequence: TableRef,
}

impl DropSequenceStatement {
    pub fn new(sequence: impl Into<TableRef>) -> Self {
        Self {
            sequence: sequence.into(),
        }
    }
}

impl Statement for DropSequenceStatement {
    fn operation(&self) -> OperationKind {
        OperationKind::DropSequence
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.sequence.validate(self.operation(), "sequence_name")
    }

    fn targets(&self) -> Vec<&TableRef> {
        vec![&self.sequence]
    }

    fn identifiers(&self) -> Vec<&str> {
        self.sequence.identifiers().collect()
    }
}

/// 生SQL
///
/// 区切り文字を指定した場合は、その区切りで複数の文に分割して実行します。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSqlStatement {
    pub sql: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
}

impl RawSqlStatement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            delimiter: None,
        }
    }

    pub fn split_on(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    /// 実行単位に分割した文
    pub fn statements(&self) -> Vec<String> {
        match self.delimiter.as_deref() {
            Some(delimiter) if !delimiter.is_empty() => self
                .sql
                .split(delimiter)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => vec![self.sql.trim().to_string()],
        }
    }
}

impl Statement for RawSqlStatement {
    fn operation(&self) -> OperationKind {
        OperationKind::RawSql
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require(self.operation(), "sql", &self.sql)
    }

    fn targets(&self) -> Vec<&TableRef> {
        Vec::new()
    }

    fn identifiers(&self) -> Vec<&str> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_sql_split() {
        let statement = RawSqlStatement::new("INSERT INTO t VALUES (1);\nINSERT INTO t VALUES (2);\n")
            .split_on(";");
        assert_eq!(
            statement.statements(),
            vec!["INSERT INTO t VALUES (1)", "INSERT INTO t VALUES (2)"]
        );

        let single = RawSqlStatement::new("  SELECT 1  ");
        assert_eq!(single.statements(), vec!["SELECT 1"]);
    }

    #[test]
    fn test_raw_sql_requires_text() {
        assert_eq!(
            RawSqlStatement::new("   ").validate().unwrap_err(),
            ValidationError::missing(OperationKind::RawSql, "sql")
        );
        assert!(RawSqlStatement::new("SELECT 1").inverse().is_none());
    }

    #[test]
    fn test_sequence_bounds() {
        let statement = CreateSequenceStatement::new("seq").min_value(10).max_value(1);
        assert!(statement.validate().unwrap_err().is_invalid_parameter());
        assert!(CreateSequenceStatement::new("seq").increment_by(0).validate().is_err());
    }

    #[test]
    fn test_create_view_requires_query() {
        let err = CreateViewStatement::new("v", "").validate().unwrap_err();
        assert_eq!(err, ValidationError::missing(OperationKind::CreateView, "select_query"));
    }

    #[test]
    fn test_create_index_inverse() {
        let statement = CreateIndexStatement::new("idx_users_email", "users", ["email"]).unique();
        assert_eq!(
            statement.inverse(),
            Some(ChangeStatement::DropIndex(DropIndexStatement::new(
                "idx_users_email",
                "users"
            )))
        );
    }
}
