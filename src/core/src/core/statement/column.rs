// カラム単位のステートメント

use super::{require, require_opt, ChangeStatement, ColumnDefinition, DefaultValue, Statement, TableRef};
use crate::core::capability::{CapabilityEntry, SyntaxFeature};
use crate::core::error::ValidationError;
use crate::core::operation::OperationKind;
use serde::{Deserialize, Serialize};

/// カラム追加
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddColumnStatement {
    pub table: TableRef,
    pub column: ColumnDefinition,
}

impl AddColumnStatement {
    pub fn new(table: impl Into<TableRef>, column: ColumnDefinition) -> Self {
        Self {
            table: table.into(),
            column,
        }
    }
}

impl Statement for AddColumnStatement {
    fn operation(&self) -> OperationKind {
        OperationKind::AddColumn
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let op = self.operation();
        self.table.validate(op, "table_name")?;
        self.column.validate(op)
    }

    /// 主キー・一意制約付きカラムは、その制約を後付けできないエンジンでは追加できない。
    /// 自動採番カラムは既存テーブルに追加できるエンジンに限る
    fn supports_engine(&self, entry: &CapabilityEntry) -> bool {
        if !entry.supports(self.operation()) {
            return false;
        }
        if self.column.primary_key && !entry.supports(OperationKind::AddPrimaryKey) {
            return false;
        }
        if self.column.unique && !entry.supports(OperationKind::AddUniqueConstraint) {
            return false;
        }
        !self.column.auto_increment
            || (entry.auto_increment.is_available()
                && entry.supports_syntax(SyntaxFeature::AddAutoIncrementColumn))
    }

    fn inverse(&self) -> Option<ChangeStatement> {
        Some(DropColumnStatement::new(self.table.clone(), self.column.name.clone()).into())
    }

    fn targets(&self) -> Vec<&TableRef> {
        vec![&self.table]
    }

    fn identifiers(&self) -> Vec<&str> {
        self.table
            .identifiers()
            .chain(std::iter::once(self.column.name.as_str()))
            .collect()
    }
}

/// カラム削除
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropColumnStatement {
    pub table: TableRef,
    pub column_name: String,
}

impl DropColumnStatement {
    pub fn new(table: impl Into<TableRef>, column_name: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column_name: column_name.into(),
        }
    }
}

impl Statement for DropColumnStatement {
    fn operation(&self) -> OperationKind {
        OperationKind::DropColumn
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let op = self.operation();
        self.table.validate(op, "table_name")?;
        require(op, "column_name", &self.column_name)
    }

    fn targets(&self) -> Vec<&TableRef> {
        vec![&self.table]
    }

    fn identifiers(&self) -> Vec<&str> {
        self.table
            .identifiers()
            .chain(std::iter::once(self.column_name.as_str()))
            .collect()
    }
}

/// カラム名変更
///
/// `column_data_type`は定義ごと書き直す方言（MySQLの`CHANGE`）で使われます。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameColumnStatement {
    pub table: TableRef,
    pub old_name: String,
    pub new_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_data_type: Option<String>,
}

impl RenameColumnStatement {
    pub fn new(table: impl Into<TableRef>, old_name: impl Into<String>, new_name: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            old_name: old_name.into(),
            new_name: new_name.into(),
            column_data_type: None,
        }
    }

    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.column_data_type = Some(data_type.into());
        self
    }
}

impl Statement for RenameColumnStatement {
    fn operation(&self) -> OperationKind {
        OperationKind::RenameColumn
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let op = self.operation();
        self.table.validate(op, "table_name")?;
        require(op, "old_column_name", &self.old_name)?;
        require(op, "new_column_name", &self.new_name)?;
        require_opt(op, "column_data_type", self.column_data_type.as_deref())
    }

    fn inverse(&self) -> Option<ChangeStatement> {
        Some(
            RenameColumnStatement {
                table: self.table.clone(),
                old_name: self.new_name.clone(),
                new_name: self.old_name.clone(),
                column_data_type: self.column_data_type.clone(),
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
            .chain([self.old_name.as_str(), self.new_name.as_str()])
            .collect()
    }
}

/// カラム型変更
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyDataTypeStatement {
    pub table: TableRef,
    pub column_name: String,
    pub new_data_type: String,
}

impl ModifyDataTypeStatement {
    pub fn new(
        table: impl Into<TableRef>,
        column_name: impl Into<String>,
        new_data_type: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            column_name: column_name.into(),
            new_data_type: new_data_type.into(),
        }
    }
}

impl Statement for ModifyDataTypeStatement {
    fn operation(&self) -> OperationKind {
        OperationKind::ModifyDataType
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let op = self.operation();
        self.table.validate(op, "table_name")?;
        require(op, "column_name", &self.column_name)?;
        require(op, "new_data_type", &self.new_data_type)
    }

    fn targets(&self) -> Vec<&TableRef> {
        vec![&self.table]
    }

    fn identifiers(&self) -> Vec<&str> {
        self.table
            .identifiers()
            .chain(std::iter::once(self.column_name.as_str()))
            .collect()
    }
}

/// 既存カラムへの自動採番付与
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddAutoIncrementStatement {
    pub table: TableRef,
    pub column_name: String,
    pub column_data_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_with: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub increment_by: Option<i64>,
}

impl AddAutoIncrementStatement {
    pub fn new(
        table: impl Into<TableRef>,
        column_name: impl Into<String>,
        column_data_type: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            column_name: column_name.into(),
            column_data_type: column_data_type.into(),
            start_with: None,
            increment_by: None,
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.table.schema = Some(schema.into());
        self
    }

    pub fn with_catalog(mut self, catalog: impl Into<String>) -> Self {
        self.table.catalog = Some(catalog.into());
        self
    }

    pub fn start_with(mut self, value: i64) -> Self {
        self.start_with = Some(value);
        self
    }

    pub fn increment_by(mut self, value: i64) -> Self {
        self.increment_by = Some(value);
        self
    }
}

impl Statement for AddAutoIncrementStatement {
    fn operation(&self) -> OperationKind {
        OperationKind::AddAutoIncrement
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let op = self.operation();
        self.table.validate(op, "table_name")?;
        require(op, "column_name", &self.column_name)?;
        require(op, "column_data_type", &self.column_data_type)?;
        if self.increment_by == Some(0) {
            return Err(ValidationError::invalid(op, "increment_by", "must not be zero"));
        }
        Ok(())
    }

    fn supports_engine(&self, entry: &CapabilityEntry) -> bool {
        if !entry.supports(self.operation()) || !entry.auto_increment.is_available() {
            return false;
        }
        if self.start_with.is_some() && !entry.supports_syntax(SyntaxFeature::IdentityStartValue) {
            return false;
        }
        !matches!(self.increment_by, Some(n) if n != 1)
            || entry.supports_syntax(SyntaxFeature::IdentityIncrement)
    }

    fn targets(&self) -> Vec<&TableRef> {
        vec![&self.table]
    }

    fn identifiers(&self) -> Vec<&str> {
        self.table
            .identifiers()
            .chain(std::iter::once(self.column_name.as_str()))
            .collect()
    }
}

/// 既定値の追加
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddDefaultValueStatement {
    pub table: TableRef,
    pub column_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_data_type: Option<String>,
    pub default_value: DefaultValue,
}

impl AddDefaultValueStatement {
    pub fn new(table: impl Into<TableRef>, column_name: impl Into<String>, default_value: DefaultValue) -> Self {
        Self {
            table: table.into(),
            column_name: column_name.into(),
            column_data_type: None,
            default_value,
        }
    }

    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.column_data_type = Some(data_type.into());
        self
    }
}

impl Statement for AddDefaultValueStatement {
    fn operation(&self) -> OperationKind {
        OperationKind::AddDefaultValue
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let op = self.operation();
        self.table.validate(op, "table_name")?;
        require(op, "column_name", &self.column_name)?;
        require_opt(op, "column_data_type", self.column_data_type.as_deref())
    }

    fn inverse(&self) -> Option<ChangeStatement> {
        Some(
            DropDefaultValueStatement {
                table: self.table.clone(),
                column_name: self.column_name.clone(),
                column_data_type: self.column_data_type.clone(),
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
            .chain(std::iter::once(self.column_name.as_str()))
            .collect()
    }
}

/// 既定値の削除
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropDefaultValueStatement {
    pub table: TableRef,
    pub column_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_data_type: Option<String>,
}

impl DropDefaultValueStatement {
    pub fn new(table: impl Into<TableRef>, column_name: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column_name: column_name.into(),
            column_data_type: None,
        }
    }

    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.column_data_type = Some(data_type.into());
        self
    }
}

impl Statement for DropDefaultValueStatement {
    fn operation(&self) -> OperationKind {
        OperationKind::DropDefaultValue
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let op = self.operation();
        self.table.validate(op, "table_name")?;
        require(op, "column_name", &self.column_name)?;
        require_opt(op, "column_data_type", self.column_data_type.as_deref())
    }

    fn targets(&self) -> Vec<&TableRef> {
        vec![&self.table]
    }

    fn identifiers(&self) -> Vec<&str> {
        self.table
            .identifiers()
            .chain(std::iter::once(self.column_name.as_str()))
            .collect()
    }
}

/// NULL許可の変更
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetNullableStatement {
    pub table: TableRef,
    pub column_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_data_type: Option<String>,
    pub nullable: bool,
}

impl SetNullableStatement {
    pub fn new(table: impl Into<TableRef>, column_name: impl Into<String>, nullable: bool) -> Self {
        Self {
            table: table.into(),
            column_name: column_name.into(),
            column_data_type: None,
            nullable,
        }
    }

    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.column_data_type = Some(data_type.into());
        self
    }
}

impl Statement for SetNullableStatement {
    fn operation(&self) -> OperationKind {
        OperationKind::SetNullable
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let op = self.operation();
        self.table.validate(op, "table_name")?;
        require(op, "column_name", &self.column_name)?;
        require_opt(op, "column_data_type", self.column_data_type.as_deref())
    }

    /// NOT NULL化は型が分かっている場合のみ戻せる
    fn inverse(&self) -> Option<ChangeStatement> {
        if self.nullable || self.column_data_type.is_none() {
            return None;
        }
        Some(
            SetNullableStatement {
                nullable: true,
                ..self.clone()
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
            .chain(std::iter::once(self.column_name.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::capability::CapabilityMatrix;
    use crate::core::engine::Dialect;

    fn entry(dialect: Dialect) -> &'static CapabilityEntry {
        CapabilityMatrix::global().entry(&dialect.id()).unwrap()
    }

    #[test]
    fn test_add_auto_increment_validation() {
        let statement = AddAutoIncrementStatement::new("AddAutoIncTest", "testCol", "int");
        assert!(statement.validate().is_ok());

        let err = AddAutoIncrementStatement::new("", "testCol", "int")
            .validate()
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::missing(OperationKind::AddAutoIncrement, "table_name")
        );

        let err = AddAutoIncrementStatement::new("AddAutoIncTest", "testCol", "")
            .validate()
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::missing(OperationKind::AddAutoIncrement, "column_data_type")
        );
    }

    #[test]
    fn test_add_auto_increment_support_per_engine() {
        let statement =
            AddAutoIncrementStatement::new("AddAutoIncTest", "testCol", "int").with_schema("alt");
        for dialect in [
            Dialect::Oracle,
            Dialect::MSSQL,
            Dialect::PostgreSQL,
            Dialect::Derby,
            Dialect::Cache,
            Dialect::H2,
            Dialect::Firebird,
            Dialect::SQLite,
        ] {
            assert!(!statement.supports_engine(entry(dialect)), "{}", dialect);
        }
        for dialect in [Dialect::MySQL, Dialect::HSQLDB, Dialect::DB2, Dialect::Informix] {
            assert!(statement.supports_engine(entry(dialect)), "{}", dialect);
        }
    }

    #[test]
    fn test_add_auto_increment_options_per_engine() {
        let stepped = AddAutoIncrementStatement::new("AddAutoIncTest", "testCol", "int").increment_by(5);
        for dialect in [Dialect::MySQL, Dialect::Informix, Dialect::MaxDB, Dialect::Sybase] {
            assert!(!stepped.supports_engine(entry(dialect)), "{}", dialect);
        }
        for dialect in [Dialect::DB2, Dialect::HSQLDB] {
            assert!(stepped.supports_engine(entry(dialect)), "{}", dialect);
        }

        let unit_step = AddAutoIncrementStatement::new("AddAutoIncTest", "testCol", "int").increment_by(1);
        assert!(unit_step.supports_engine(entry(Dialect::MySQL)));

        let started = AddAutoIncrementStatement::new("AddAutoIncTest", "testCol", "int").start_with(100);
        assert!(started.supports_engine(entry(Dialect::MySQL)));
        assert!(!started.supports_engine(entry(Dialect::Sybase)));
    }

    #[test]
    fn test_add_auto_increment_has_no_inverse() {
        let statement = AddAutoIncrementStatement::new("t", "c", "int");
        assert!(statement.inverse().is_none());
    }

    #[test]
    fn test_add_column_primary_key_excluded_on_sqlite() {
        let plain = AddColumnStatement::new("t", ColumnDefinition::new("c", "int"));
        let keyed = AddColumnStatement::new("t", ColumnDefinition::new("c", "int").primary_key());
        assert!(plain.supports_engine(entry(Dialect::SQLite)));
        assert!(!keyed.supports_engine(entry(Dialect::SQLite)));
        assert!(keyed.supports_engine(entry(Dialect::PostgreSQL)));
    }

    #[test]
    fn test_add_column_auto_increment_excluded_on_sqlite() {
        let statement =
            AddColumnStatement::new("t", ColumnDefinition::new("c", "int").auto_increment());
        assert!(!statement.supports_engine(entry(Dialect::SQLite)));
        assert!(statement.supports_engine(entry(Dialect::MySQL)));
    }

    #[test]
    fn test_add_column_inverse_is_drop_column() {
        let statement = AddColumnStatement::new(
            TableRef::new("t").with_schema("s"),
            ColumnDefinition::new("c", "int"),
        );
        assert_eq!(
            statement.inverse(),
            Some(ChangeStatement::DropColumn(DropColumnStatement::new(
                TableRef::new("t").with_schema("s"),
                "c"
            )))
        );
    }

    #[test]
    fn test_set_nullable_inverse_requires_type() {
        let untyped = SetNullableStatement::new("t", "c", false);
        assert!(untyped.inverse().is_none());

        let typed = SetNullableStatement::new("t", "c", false).with_data_type("int");
        let inverse = typed.inverse().unwrap();
        let ChangeStatement::SetNullable(inverse) = inverse else {
            panic!("unexpected inverse");
        };
        assert!(inverse.nullable);

        let relax = SetNullableStatement::new("t", "c", true).with_data_type("int");
        assert!(relax.inverse().is_none());
    }

    #[test]
    fn test_rename_column_identifiers() {
        let statement = RenameColumnStatement::new(TableRef::new("t").with_schema("s"), "a", "b");
        assert_eq!(statement.identifiers(), vec!["s", "t", "a", "b"]);
    }
}
