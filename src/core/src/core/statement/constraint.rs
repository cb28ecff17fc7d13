// 制約のステートメント

use super::{require, require_all, require_opt, ChangeStatement, Statement, TableRef};
use crate::core::capability::{CapabilityEntry, SyntaxFeature};
use crate::core::error::ValidationError;
use crate::core::operation::OperationKind;
use serde::{Deserialize, Serialize};

/// 参照アクション
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferentialAction {
    Cascade,
    SetNull,
    SetDefault,
    Restrict,
    NoAction,
}

impl ReferentialAction {
    /// SQL表現
    pub fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::NoAction => "NO ACTION",
        }
    }
}

/// 主キー追加
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddPrimaryKeyStatement {
    pub table: TableRef,
    pub column_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint_name: Option<String>,
}

impl AddPrimaryKeyStatement {
    pub fn new<I, S>(table: impl Into<TableRef>, column_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            table: table.into(),
            column_names: column_names.into_iter().map(Into::into).collect(),
            constraint_name: None,
        }
    }

    pub fn with_constraint_name(mut self, name: impl Into<String>) -> Self {
        self.constraint_name = Some(name.into());
        self
    }
}

impl Statement for AddPrimaryKeyStatement {
    fn operation(&self) -> OperationKind {
        OperationKind::AddPrimaryKey
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let op = self.operation();
        self.table.validate(op, "table_name")?;
        require_all(op, "column_names", &self.column_names)?;
        require_opt(op, "constraint_name", self.constraint_name.as_deref())
    }

    fn inverse(&self) -> Option<ChangeStatement> {
        Some(
            DropPrimaryKeyStatement {
                table: self.table.clone(),
                constraint_name: self.constraint_name.clone(),
            }
            .into(),
        )
    }

    fn targets(&self) -> Vec<&TableRef> {
        vec![&self.table]
    }

    fn identifiers(&self) -> Vec<&str> {
        self.table
            .identifiers()
            .chain(self.column_names.iter().map(String::as_str))
            .chain(self.constraint_name.as_deref())
            .collect()
    }
}

/// 主キー削除
///
/// 制約名を省略した場合、名前を必要とする方言では慣例名を使います。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropPrimaryKeyStatement {
    pub table: TableRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint_name: Option<String>,
}

impl DropPrimaryKeyStatement {
    pub fn new(table: impl Into<TableRef>) -> Self {
        Self {
            table: table.into(),
            constraint_name: None,
        }
    }

    pub fn with_constraint_name(mut self, name: impl Into<String>) -> Self {
        self.constraint_name = Some(name.into());
        self
    }
}

impl Statement for DropPrimaryKeyStatement {
    fn operation(&self) -> OperationKind {
        OperationKind::DropPrimaryKey
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let op = self.operation();
        self.table.validate(op, "table_name")?;
        require_opt(op, "constraint_name", self.constraint_name.as_deref())
    }

    fn targets(&self) -> Vec<&TableRef> {
        vec![&self.table]
    }

    fn identifiers(&self) -> Vec<&str> {
        self.table
            .identifiers()
            .chain(self.constraint_name.as_deref())
            .collect()
    }
}

/// 外部キー追加
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddForeignKeyStatement {
    pub table: TableRef,
    pub column_names: Vec<String>,
    pub referenced_table: TableRef,
    pub referenced_column_names: Vec<String>,
    pub constraint_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<ReferentialAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<ReferentialAction>,
}

impl AddForeignKeyStatement {
    pub fn new<I, S, J, T>(
        constraint_name: impl Into<String>,
        table: impl Into<TableRef>,
        column_names: I,
        referenced_table: impl Into<TableRef>,
        referenced_column_names: J,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        J: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            table: table.into(),
            column_names: column_names.into_iter().map(Into::into).collect(),
            referenced_table: referenced_table.into(),
            referenced_column_names: referenced_column_names.into_iter().map(Into::into).collect(),
            constraint_name: constraint_name.into(),
            on_delete: None,
            on_update: None,
        }
    }

    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    pub fn on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = Some(action);
        self
    }
}

impl Statement for AddForeignKeyStatement {
    fn operation(&self) -> OperationKind {
        OperationKind::AddForeignKey
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let op = self.operation();
        self.table.validate(op, "base_table_name")?;
        require_all(op, "base_column_names", &self.column_names)?;
        self.referenced_table.validate(op, "referenced_table_name")?;
        require_all(op, "referenced_column_names", &self.referenced_column_names)?;
        require(op, "constraint_name", &self.constraint_name)?;
        if self.column_names.len() != self.referenced_column_names.len() {
            return Err(ValidationError::invalid(
                op,
                "referenced_column_names",
                format!(
                    "expected {} columns, got {}",
                    self.column_names.len(),
                    self.referenced_column_names.len()
                ),
            ));
        }
        Ok(())
    }

    fn inverse(&self) -> Option<ChangeStatement> {
        Some(DropForeignKeyStatement::new(self.table.clone(), self.constraint_name.clone()).into())
    }

    fn supports_engine(&self, entry: &CapabilityEntry) -> bool {
        entry.supports(self.operation())
            && (self.on_update.is_none() || entry.supports_syntax(SyntaxFeature::ForeignKeyOnUpdate))
    }

    fn targets(&self) -> Vec<&TableRef> {
        vec![&self.table, &self.referenced_table]
    }

    fn identifiers(&self) -> Vec<&str> {
        self.table
            .identifiers()
            .chain(self.column_names.iter().map(String::as_str))
            .chain(self.referenced_table.identifiers())
            .chain(self.referenced_column_names.iter().map(String::as_str))
            .chain(std::iter::once(self.constraint_name.as_str()))
            .collect()
    }
}

/// 外部キー削除
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropForeignKeyStatement {
    pub table: TableRef,
    pub constraint_name: String,
}

impl DropForeignKeyStatement {
    pub fn new(table: impl Into<TableRef>, constraint_name: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            constraint_name: constraint_name.into(),
        }
    }
}

impl Statement for DropForeignKeyStatement {
    fn operation(&self) -> OperationKind {
        OperationKind::DropForeignKey
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let op = self.operation();
        self.table.validate(op, "base_table_name")?;
        require(op, "constraint_name", &self.constraint_name)
    }

    fn targets(&self) -> Vec<&TableRef> {
        vec![&self.table]
    }

    fn identifiers(&self) -> Vec<&str> {
        self.table
            .identifiers()
            .chain(std::iter::once(self.constraint_name.as_str()))
            .collect()
    }
}

/// 一意制約追加
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddUniqueConstraintStatement {
    pub table: TableRef,
    pub column_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint_name: Option<String>,
}

impl AddUniqueConstraintStatement {
    pub fn new<I, S>(table: impl Into<TableRef>, column_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            table: table.into(),
            column_names: column_names.into_iter().map(Into::into).collect(),
            constraint_name: None,
        }
    }

    pub fn with_constraint_name(mut self, name: impl Into<String>) -> Self {
        self.constraint_name = Some(name.into());
        self
    }
}

impl Statement for AddUniqueConstraintStatement {
    fn operation(&self) -> OperationKind {
        OperationKind::AddUniqueConstraint
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let op = self.operation();
        self.table.validate(op, "table_name")?;
        require_all(op, "column_names", &self.column_names)?;
        require_opt(op, "constraint_name", self.constraint_name.as_deref())
    }

    /// 無名の制約は削除対象を特定できない
    fn inverse(&self) -> Option<ChangeStatement> {
        let name = self.constraint_name.clone()?;
        Some(DropUniqueConstraintStatement::new(self.table.clone(), name).into())
    }

    fn targets(&self) -> Vec<&TableRef> {
        vec![&self.table]
    }

    fn identifiers(&self) -> Vec<&str> {
        self.table
            .identifiers()
            .chain(self.column_names.iter().map(String::as_str))
            .chain(self.constraint_name.as_deref())
            .collect()
    }
}

/// 一意制約削除
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropUniqueConstraintStatement {
    pub table: TableRef,
    pub constraint_name: String,
}

impl DropUniqueConstraintStatement {
    pub fn new(table: impl Into<TableRef>, constraint_name: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            constraint_name: constraint_name.into(),
        }
    }
}

impl Statement for DropUniqueConstraintStatement {
    fn operation(&self) -> OperationKind {
        OperationKind::DropUniqueConstraint
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let op = self.operation();
        self.table.validate(op, "table_name")?;
        require(op, "constraint_name", &self.constraint_name)
    }

    fn targets(&self) -> Vec<&TableRef> {
        vec![&self.table]
    }

    fn identifiers(&self) -> Vec<&str> {
        self.table
            .identifiers()
            .chain(std::iter::once(self.constraint_name.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_foreign_key_column_count_mismatch() {
        let statement = AddForeignKeyStatement::new(
            "fk_orders_users",
            "orders",
            ["user_id", "tenant_id"],
            "users",
            ["id"],
        );
        let err = statement.validate().unwrap_err();
        assert!(err.is_invalid_parameter());
    }

    #[test]
    fn test_foreign_key_requires_referenced_table() {
        let statement = AddForeignKeyStatement::new("fk", "orders", ["user_id"], "", ["id"]);
        assert_eq!(
            statement.validate().unwrap_err(),
            ValidationError::missing(OperationKind::AddForeignKey, "referenced_table_name")
        );
    }

    #[test]
    fn test_foreign_key_inverse() {
        let statement = AddForeignKeyStatement::new("fk", "orders", ["user_id"], "users", ["id"]);
        assert_eq!(
            statement.inverse(),
            Some(ChangeStatement::DropForeignKey(DropForeignKeyStatement::new(
                "orders", "fk"
            )))
        );
    }

    #[test]
    fn test_unnamed_unique_constraint_has_no_inverse() {
        let statement = AddUniqueConstraintStatement::new("users", ["email"]);
        assert!(statement.inverse().is_none());
        let named = statement.with_constraint_name("uq_users_email");
        assert!(named.inverse().is_some());
    }

    #[test]
    fn test_primary_key_requires_columns() {
        let statement = AddPrimaryKeyStatement::new("users", Vec::<String>::new());
        assert_eq!(
            statement.validate().unwrap_err(),
            ValidationError::missing(OperationKind::AddPrimaryKey, "column_names")
        );
    }
}
