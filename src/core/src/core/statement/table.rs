// テーブル単位のステートメント

use super::{require, ChangeStatement, ColumnDefinition, Statement, TableRef};
use crate::core::capability::{CapabilityEntry, SyntaxFeature};
use crate::core::error::ValidationError;
use crate::core::operation::OperationKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// テーブル作成
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTableStatement {
    pub table: TableRef,
    pub columns: Vec<ColumnDefinition>,
    /// 複合主キーの制約名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key_name: Option<String>,
}

impl CreateTableStatement {
    pub fn new(table: impl Into<TableRef>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            primary_key_name: None,
        }
    }

    pub fn add_column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    pub fn add_primary_key_column(self, name: impl Into<String>, data_type: impl Into<String>) -> Self {
        self.add_column(ColumnDefinition::new(name, data_type).primary_key())
    }

    pub fn with_primary_key_name(mut self, name: impl Into<String>) -> Self {
        self.primary_key_name = Some(name.into());
        self
    }

    /// 主キーを構成するカラム名（定義順）
    pub fn primary_key_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }
}

impl Statement for CreateTableStatement {
    fn operation(&self) -> OperationKind {
        OperationKind::CreateTable
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let op = self.operation();
        self.table.validate(op, "table_name")?;
        if self.columns.is_empty() {
            return Err(ValidationError::missing(op, "columns"));
        }

        let mut seen = BTreeSet::new();
        for column in &self.columns {
            column.validate(op)?;
            if !seen.insert(column.name.as_str()) {
                return Err(ValidationError::invalid(
                    op,
                    "columns",
                    format!("column '{}' is declared twice", column.name),
                ));
            }
        }

        if self.columns.iter().filter(|c| c.auto_increment).count() > 1 {
            return Err(ValidationError::invalid(
                op,
                "columns",
                "at most one auto-increment column is allowed",
            ));
        }
        Ok(())
    }

    fn supports_engine(&self, entry: &CapabilityEntry) -> bool {
        if !entry.supports(self.operation()) {
            return false;
        }
        let Some(auto_increment) = self.columns.iter().find(|c| c.auto_increment) else {
            return true;
        };
        if !entry.auto_increment.is_available() {
            return false;
        }
        entry.supports_syntax(SyntaxFeature::AutoIncrementInCompositeKey)
            || self
                .primary_key_columns()
                .iter()
                .all(|c| *c == auto_increment.name)
    }

    fn inverse(&self) -> Option<ChangeStatement> {
        Some(DropTableStatement::new(self.table.clone()).into())
    }

    fn targets(&self) -> Vec<&TableRef> {
        vec![&self.table]
    }

    fn identifiers(&self) -> Vec<&str> {
        self.table
            .identifiers()
            .chain(self.columns.iter().map(|c| c.name.as_str()))
            .chain(self.primary_key_name.as_deref())
            .collect()
    }
}

/// テーブル削除
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropTableStatement {
    pub table: TableRef,
    #[serde(default, skip_serializing_if = "super::is_false")]
    pub cascade_constraints: bool,
}

impl DropTableStatement {
    pub fn new(table: impl Into<TableRef>) -> Self {
        Self {
            table: table.into(),
            cascade_constraints: false,
        }
    }

    pub fn cascade(mut self) -> Self {
        self.cascade_constraints = true;
        self
    }
}

impl Statement for DropTableStatement {
    fn operation(&self) -> OperationKind {
        OperationKind::DropTable
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.table.validate(self.operation(), "table_name")
    }

    fn targets(&self) -> Vec<&TableRef> {
        vec![&self.table]
    }

    fn identifiers(&self) -> Vec<&str> {
        self.table.identifiers().collect()
    }
}

/// テーブル名変更
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameTableStatement {
    pub table: TableRef,
    pub new_name: String,
}

impl RenameTableStatement {
    pub fn new(table: impl Into<TableRef>, new_name: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            new_name: new_name.into(),
        }
    }
}

impl Statement for RenameTableStatement {
    fn operation(&self) -> OperationKind {
        OperationKind::RenameTable
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let op = self.operation();
        self.table.validate(op, "old_table_name")?;
        require(op, "new_table_name", &self.new_name)
    }

    fn inverse(&self) -> Option<ChangeStatement> {
        Some(RenameTableStatement::new(self.table.renamed(self.new_name.clone()), self.table.name.clone()).into())
    }

    fn targets(&self) -> Vec<&TableRef> {
        vec![&self.table]
    }

    fn identifiers(&self) -> Vec<&str> {
        self.table
            .identifiers()
            .chain(std::iter::once(self.new_name.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::capability::CapabilityMatrix;
    use crate::core::engine::EngineId;

    #[test]
    fn test_create_table_requires_columns() {
        let err = CreateTableStatement::new("t").validate().unwrap_err();
        assert_eq!(err, ValidationError::missing(OperationKind::CreateTable, "columns"));
    }

    #[test]
    fn test_create_table_rejects_duplicate_columns() {
        let statement = CreateTableStatement::new("t")
            .add_column(ColumnDefinition::new("a", "int"))
            .add_column(ColumnDefinition::new("a", "text"));
        assert!(statement.validate().unwrap_err().is_invalid_parameter());
    }

    #[test]
    fn test_create_table_with_auto_increment_excluded_without_representation() {
        let statement = CreateTableStatement::new("t")
            .add_column(ColumnDefinition::new("id", "int").primary_key().auto_increment());
        let matrix = CapabilityMatrix::global();
        let firebird = matrix.entry(&EngineId::new("firebird")).unwrap();
        let postgres = matrix.entry(&EngineId::new("postgresql")).unwrap();
        assert!(!statement.supports_engine(firebird));
        assert!(statement.supports_engine(postgres));
    }

    #[test]
    fn test_sqlite_auto_increment_must_be_sole_primary_key() {
        let matrix = CapabilityMatrix::global();
        let sqlite = matrix.entry(&EngineId::new("sqlite")).unwrap();
        let mysql = matrix.entry(&EngineId::new("mysql")).unwrap();

        let sole = CreateTableStatement::new("t")
            .add_column(ColumnDefinition::new("id", "int").primary_key().auto_increment())
            .add_column(ColumnDefinition::new("name", "text"));
        assert!(sole.supports_engine(sqlite));

        let composite = CreateTableStatement::new("t")
            .add_column(ColumnDefinition::new("id", "int").primary_key().auto_increment())
            .add_primary_key_column("other", "int");
        assert!(!composite.supports_engine(sqlite));
        assert!(composite.supports_engine(mysql));
    }

    #[test]
    fn test_rename_table_inverse_swaps_names() {
        let statement = RenameTableStatement::new(TableRef::new("old").with_schema("app"), "new");
        let inverse = statement.inverse().unwrap();
        assert_eq!(
            inverse,
            ChangeStatement::RenameTable(RenameTableStatement::new(
                TableRef::new("new").with_schema("app"),
                "old"
            ))
        );
    }

    #[test]
    fn test_drop_table_has_no_inverse() {
        assert!(DropTableStatement::new("t").inverse().is_none());
    }
}
