// 操作種別
//
// 変更ステートメントの種類を表す列挙型。
// ケイパビリティマトリクスとジェネレーターレジストリのキーとして使用されます。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 操作種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    CreateTable,
    DropTable,
    RenameTable,
    AddColumn,
    DropColumn,
    RenameColumn,
    ModifyDataType,
    AddAutoIncrement,
    AddDefaultValue,
    DropDefaultValue,
    SetNullable,
    AddPrimaryKey,
    DropPrimaryKey,
    AddForeignKey,
    DropForeignKey,
    AddUniqueConstraint,
    DropUniqueConstraint,
    CreateIndex,
    DropIndex,
    CreateView,
    DropView,
    CreateSequence,
    DropSequence,
    RawSql,
}

impl OperationKind {
    /// すべての操作種別
    pub const ALL: [OperationKind; 24] = [
        OperationKind::CreateTable,
        OperationKind::DropTable,
        OperationKind::RenameTable,
        OperationKind::AddColumn,
        OperationKind::DropColumn,
        OperationKind::RenameColumn,
        OperationKind::ModifyDataType,
        OperationKind::AddAutoIncrement,
        OperationKind::AddDefaultValue,
        OperationKind::DropDefaultValue,
        OperationKind::SetNullable,
        OperationKind::AddPrimaryKey,
        OperationKind::DropPrimaryKey,
        OperationKind::AddForeignKey,
        OperationKind::DropForeignKey,
        OperationKind::AddUniqueConstraint,
        OperationKind::DropUniqueConstraint,
        OperationKind::CreateIndex,
        OperationKind::DropIndex,
        OperationKind::CreateView,
        OperationKind::DropView,
        OperationKind::CreateSequence,
        OperationKind::DropSequence,
        OperationKind::RawSql,
    ];

    /// スネークケースの名前
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::CreateTable => "create_table",
            OperationKind::DropTable => "drop_table",
            OperationKind::RenameTable => "rename_table",
            OperationKind::AddColumn => "add_column",
            OperationKind::DropColumn => "drop_column",
            OperationKind::RenameColumn => "rename_column",
            OperationKind::ModifyDataType => "modify_data_type",
            OperationKind::AddAutoIncrement => "add_auto_increment",
            OperationKind::AddDefaultValue => "add_default_value",
            OperationKind::DropDefaultValue => "drop_default_value",
            OperationKind::SetNullable => "set_nullable",
            OperationKind::AddPrimaryKey => "add_primary_key",
            OperationKind::DropPrimaryKey => "drop_primary_key",
            OperationKind::AddForeignKey => "add_foreign_key",
            OperationKind::DropForeignKey => "drop_foreign_key",
            OperationKind::AddUniqueConstraint => "add_unique_constraint",
            OperationKind::DropUniqueConstraint => "drop_unique_constraint",
            OperationKind::CreateIndex => "create_index",
            OperationKind::DropIndex => "drop_index",
            OperationKind::CreateView => "create_view",
            OperationKind::DropView => "drop_view",
            OperationKind::CreateSequence => "create_sequence",
            OperationKind::DropSequence => "drop_sequence",
            OperationKind::RawSql => "raw_sql",
        }
    }

    /// スキーマ構造を変更するDDL操作かどうか
    pub fn is_ddl(&self) -> bool {
        !matches!(self, OperationKind::RawSql)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_str_matches_serde() {
        for kind in OperationKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }
}
