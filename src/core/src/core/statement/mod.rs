// 変更ステートメントモデル
//
// データベース非依存の変更操作を表現する不変の値オブジェクト群。
// ステートメントはデータベースハンドルを持たず、I/Oも行いません。

mod column;
mod constraint;
mod object;
mod table;

pub use column::{
    AddAutoIncrementStatement, AddColumnStatement, AddDefaultValueStatement,
    DropColumnStatement, DropDefaultValueStatement, ModifyDataTypeStatement,
    RenameColumnStatement, SetNullableStatement,
};
pub use constraint::{
    AddForeignKeyStatement, AddPrimaryKeyStatement, AddUniqueConstraintStatement,
    DropForeignKeyStatement, DropPrimaryKeyStatement, DropUniqueConstraintStatement,
    ReferentialAction,
};
pub use object::{
    CreateIndexStatement, CreateSequenceStatement, CreateViewStatement, DropIndexStatement,
    DropSequenceStatement, DropViewStatement, RawSqlStatement,
};
pub use table::{CreateTableStatement, DropTableStatement, RenameTableStatement};

use crate::core::capability::CapabilityEntry;
use crate::core::error::ValidationError;
use crate::core::operation::OperationKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// ステートメント共通の振る舞い
pub trait Statement {
    /// 操作種別
    fn operation(&self) -> OperationKind;

    /// 必須パラメータの検証
    fn validate(&self) -> Result<(), ValidationError>;

    /// 指定エンジンで表現可能か
    ///
    /// 既定ではケイパビリティの対応操作のみを見ます。
    /// ステートメント固有の除外規則がある場合はオーバーライドします。
    fn supports_engine(&self, entry: &CapabilityEntry) -> bool {
        entry.supports(self.operation())
    }

    /// 機械的に導出できる逆操作
    fn inverse(&self) -> Option<ChangeStatement> {
        None
    }

    /// 作成・変更・参照するオブジェクトの座標
    fn targets(&self) -> Vec<&TableRef>;

    /// ステートメントが導入・参照する識別子
    fn identifiers(&self) -> Vec<&str>;
}

/// 対象オブジェクトの座標
///
/// スキーマがNoneの場合は接続の既定スキーマを意味します。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub name: String,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            catalog: None,
            schema: None,
            name: name.into(),
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_catalog(mut self, catalog: impl Into<String>) -> Self {
        self.catalog = Some(catalog.into());
        self
    }

    /// カタログまたはスキーマを明示しているか
    pub fn is_qualified(&self) -> bool {
        self.catalog.is_some() || self.schema.is_some()
    }

    /// 名前だけを差し替えた座標
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            catalog: self.catalog.clone(),
            schema: self.schema.clone(),
            name: name.into(),
        }
    }

    fn validate(&self, operation: OperationKind, parameter: &'static str) -> Result<(), ValidationError> {
        require(operation, parameter, &self.name)?;
        if matches!(&self.schema, Some(s) if s.trim().is_empty()) {
            return Err(ValidationError::invalid(operation, "schema_name", "must not be blank"));
        }
        if matches!(&self.catalog, Some(c) if c.trim().is_empty()) {
            return Err(ValidationError::invalid(operation, "catalog_name", "must not be blank"));
        }
        Ok(())
    }

    fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.catalog
            .as_deref()
            .into_iter()
            .chain(self.schema.as_deref())
            .chain(std::iter::once(self.name.as_str()))
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(catalog) = &self.catalog {
            write!(f, "{}.", catalog)?;
        }
        if let Some(schema) = &self.schema {
            write!(f, "{}.", schema)?;
        }
        f.write_str(&self.name)
    }
}

impl From<&str> for TableRef {
    fn from(value: &str) -> Self {
        TableRef::new(value)
    }
}

/// カラムの既定値
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum DefaultValue {
    /// 文字列リテラル
    String(String),
    /// 数値リテラル（表記をそのまま保持）
    Numeric(String),
    /// 真偽値
    Boolean(bool),
    /// 関数や式（`CURRENT_TIMESTAMP` など）
    Computed(String),
    /// NULL
    Null,
}

fn default_true() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// カラム定義
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    /// 抽象型表記（`int`、`varchar(50)` など）
    pub data_type: String,
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<DefaultValue>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub auto_increment: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub primary_key: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub unique: bool,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            default_value: None,
            auto_increment: false,
            primary_key: false,
            unique: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn with_default(mut self, value: DefaultValue) -> Self {
        self.default_value = Some(value);
        self
    }

    fn validate(&self, operation: OperationKind) -> Result<(), ValidationError> {
        require(operation, "column_name", &self.name)?;
        require(operation, "column_data_type", &self.data_type)
    }
}

fn require(operation: OperationKind, parameter: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::missing(operation, parameter))
    } else {
        Ok(())
    }
}

fn require_all(
    operation: OperationKind,
    parameter: &'static str,
    values: &[String],
) -> Result<(), ValidationError> {
    if values.is_empty() {
        return Err(ValidationError::missing(operation, parameter));
    }
    for value in values {
        require(operation, parameter, value)?;
    }
    Ok(())
}

fn require_opt(
    operation: OperationKind,
    parameter: &'static str,
    value: Option<&str>,
) -> Result<(), ValidationError> {
    match value {
        Some(v) if v.trim().is_empty() => Err(ValidationError::invalid(operation, parameter, "must not be blank")),
        _ => Ok(()),
    }
}

macro_rules! change_statements {
    ($($variant:ident($ty:ty)),+ $(,)?) => {
        /// 変更ステートメント
        ///
        /// 操作種別ごとの構造体をまとめた列挙型です。
        /// `kind`タグ付きでシリアライズされ、その正規JSONがチェックサムの入力になります。
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(tag = "kind", rename_all = "snake_case")]
        pub enum ChangeStatement {
            $($variant($ty),)+
        }

        impl ChangeStatement {
            fn as_statement(&self) -> &dyn Statement {
                match self {
                    $(ChangeStatement::$variant(s) => s as &dyn Statement,)+
                }
            }
        }

        $(
            impl From<$ty> for ChangeStatement {
                fn from(value: $ty) -> Self {
                    ChangeStatement::$variant(value)
                }
            }

            impl StatementVariant for $ty {
                const OPERATION: OperationKind = OperationKind::$variant;

                fn extract(statement: &ChangeStatement) -> Option<&Self> {
                    match statement {
                        ChangeStatement::$variant(s) => Some(s),
                        _ => None,
                    }
                }
            }
        )+
    };
}

/// `ChangeStatement`から具体的なステートメント型を取り出す
pub trait StatementVariant: Statement + Sized {
    const OPERATION: OperationKind;

    fn extract(statement: &ChangeStatement) -> Option<&Self>;
}

change_statements! {
    CreateTable(CreateTableStatement),
    DropTable(DropTableStatement),
    RenameTable(RenameTableStatement),
    AddColumn(AddColumnStatement),
    DropColumn(DropColumnStatement),
    RenameColumn(RenameColumnStatement),
    ModifyDataType(ModifyDataTypeStatement),
    AddAutoIncrement(AddAutoIncrementStatement),
    AddDefaultValue(AddDefaultValueStatement),
    DropDefaultValue(DropDefaultValueStatement),
    SetNullable(SetNullableStatement),
    AddPrimaryKey(AddPrimaryKeyStatement),
    DropPrimaryKey(DropPrimaryKeyStatement),
    AddForeignKey(AddForeignKeyStatement),
    DropForeignKey(DropForeignKeyStatement),
    AddUniqueConstraint(AddUniqueConstraintStatement),
    DropUniqueConstraint(DropUniqueConstraintStatement),
    CreateIndex(CreateIndexStatement),
    DropIndex(DropIndexStatement),
    CreateView(CreateViewStatement),
    DropView(DropViewStatement),
    CreateSequence(CreateSequenceStatement),
    DropSequence(DropSequenceStatement),
    RawSql(RawSqlStatement),
}

impl ChangeStatement {
    /// 操作種別
    pub fn operation(&self) -> OperationKind {
        self.as_statement().operation()
    }

    /// 必須パラメータの検証
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.as_statement().validate()
    }

    /// 指定エンジンで表現可能か
    ///
    /// スキーマを持たないエンジンでは、カタログ・スキーマを明示した座標を表現できません。
    pub fn supports_engine(&self, entry: &CapabilityEntry) -> bool {
        let statement = self.as_statement();
        if !entry.supports_schemas && statement.targets().iter().any(|t| t.is_qualified()) {
            return false;
        }
        statement.supports_engine(entry)
    }

    /// 作成・変更・参照するオブジェクトの座標
    pub fn targets(&self) -> Vec<&TableRef> {
        self.as_statement().targets()
    }

    /// 機械的に導出できる逆操作
    pub fn inverse(&self) -> Option<ChangeStatement> {
        self.as_statement().inverse()
    }

    /// ステートメントが導入・参照する識別子
    pub fn identifiers(&self) -> Vec<&str> {
        self.as_statement().identifiers()
    }

    /// エンジンの識別子長上限を検証
    pub fn check_identifier_lengths(&self, entry: &CapabilityEntry) -> Result<(), ValidationError> {
        for identifier in self.identifiers() {
            let length = identifier.chars().count();
            if length > entry.max_identifier_length {
                return Err(ValidationError::IdentifierTooLong {
                    identifier: identifier.to_string(),
                    length,
                    max: entry.max_identifier_length,
                    engine: entry.engine.clone(),
                });
            }
        }
        Ok(())
    }

    /// 具体的なステートメント型として参照
    pub fn downcast<S: StatementVariant>(&self) -> Option<&S> {
        S::extract(self)
    }
}
