// スナップショット差分
//
// 2つのスナップショットを比較し、テーブル・カラム・インデックス・
// 主キー・外部キーの追加、削除、変更を検出します。

use crate::core::snapshot::{
    ColumnSnapshot, ForeignKeySnapshot, IndexSnapshot, PrimaryKeySnapshot, Snapshot, TableSnapshot,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// テーブルの完全修飾キー
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TableKey {
    pub catalog: String,
    pub schema: String,
    pub table: String,
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// スナップショット差分
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotDiff {
    /// 追加されたテーブル
    pub added_tables: Vec<TableKey>,

    /// 削除されたテーブル
    pub removed_tables: Vec<TableKey>,

    /// 変更されたテーブル
    pub modified_tables: Vec<TableDiff>,
}

impl SnapshotDiff {
    /// 差分が空かどうか
    pub fn is_empty(&self) -> bool {
        self.added_tables.is_empty()
            && self.removed_tables.is_empty()
            && self.modified_tables.is_empty()
    }

    /// 変更されたテーブルの差分を取得
    pub fn table(&self, table: &str) -> Option<&TableDiff> {
        self.modified_tables.iter().find(|t| t.key.table == table)
    }
}

/// テーブル差分
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDiff {
    pub key: TableKey,
    pub added_columns: Vec<ColumnSnapshot>,
    pub removed_columns: Vec<String>,
    pub changed_columns: Vec<ColumnDiff>,
    pub added_indexes: Vec<IndexSnapshot>,
    pub removed_indexes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_key_change: Option<PrimaryKeyChange>,
    pub added_foreign_keys: Vec<ForeignKeySnapshot>,
    pub removed_foreign_keys: Vec<String>,
}

impl TableDiff {
    fn new(key: TableKey) -> Self {
        Self {
            key,
            added_columns: Vec::new(),
            removed_columns: Vec::new(),
            changed_columns: Vec::new(),
            added_indexes: Vec::new(),
            removed_indexes: Vec::new(),
            primary_key_change: None,
            added_foreign_keys: Vec::new(),
            removed_foreign_keys: Vec::new(),
        }
    }

    /// 差分が空かどうか
    pub fn is_empty(&self) -> bool {
        self.added_columns.is_empty()
            && self.removed_columns.is_empty()
            && self.changed_columns.is_empty()
            && self.added_indexes.is_empty()
            && self.removed_indexes.is_empty()
            && self.primary_key_change.is_none()
            && self.added_foreign_keys.is_empty()
            && self.removed_foreign_keys.is_empty()
    }

    /// カラムの変更を取得
    pub fn column(&self, name: &str) -> Option<&ColumnDiff> {
        self.changed_columns.iter().find(|c| c.column_name == name)
    }
}

/// 主キーの変更
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrimaryKeyChange {
    pub before: Option<PrimaryKeySnapshot>,
    pub after: Option<PrimaryKeySnapshot>,
}

/// カラム差分
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDiff {
    pub column_name: String,
    pub changes: Vec<ColumnChange>,
}

impl ColumnDiff {
    /// 変更された属性を検出（変更がなければNone）
    fn between(before: &ColumnSnapshot, after: &ColumnSnapshot) -> Option<Self> {
        let mut changes = Vec::new();

        if !before.data_type.eq_ignore_ascii_case(&after.data_type) {
            changes.push(ColumnChange::TypeChanged {
                before: before.data_type.clone(),
                after: after.data_type.clone(),
            });
        }

        if before.nullable != after.nullable {
            changes.push(ColumnChange::NullableChanged {
                before: before.nullable,
                after: after.nullable,
            });
        }

        if before.default_value != after.default_value {
            changes.push(ColumnChange::DefaultValueChanged {
                before: before.default_value.clone(),
                after: after.default_value.clone(),
            });
        }

        if before.auto_increment != after.auto_increment {
            changes.push(ColumnChange::AutoIncrementChanged {
                before: before.auto_increment,
                after: after.auto_increment,
            });
        }

        if changes.is_empty() {
            None
        } else {
            Some(Self {
                column_name: after.name.clone(),
                changes,
            })
        }
    }

    /// 自動採番の変更後の値
    pub fn auto_increment_after(&self) -> Option<bool> {
        self.changes.iter().find_map(|c| match c {
            ColumnChange::AutoIncrementChanged { after, .. } => Some(*after),
            _ => None,
        })
    }
}

/// カラム属性の変更
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum ColumnChange {
    TypeChanged { before: String, after: String },
    NullableChanged { before: bool, after: bool },
    DefaultValueChanged {
        before: Option<String>,
        after: Option<String>,
    },
    AutoIncrementChanged { before: bool, after: bool },
}

fn table_map(snapshot: &Snapshot) -> BTreeMap<TableKey, &TableSnapshot> {
    snapshot
        .tables()
        .map(|(catalog, schema, table)| {
            (
                TableKey {
                    catalog: catalog.to_string(),
                    schema: schema.to_string(),
                    table: table.name.clone(),
                },
                table,
            )
        })
        .collect()
}

/// 2つのスナップショットの差分を計算
///
/// # Arguments
///
/// * `before` - 変更前のスナップショット
/// * `after` - 変更後のスナップショット
///
/// # Returns
///
/// 名前順に整列された差分
pub fn diff(before: &Snapshot, after: &Snapshot) -> SnapshotDiff {
    let before_tables = table_map(before);
    let after_tables = table_map(after);
    let mut result = SnapshotDiff::default();

    for (key, after_table) in &after_tables {
        match before_tables.get(key) {
            None => result.added_tables.push(key.clone()),
            Some(before_table) => {
                let table_diff = diff_table(key.clone(), before_table, after_table);
                if !table_diff.is_empty() {
                    result.modified_tables.push(table_diff);
                }
            }
        }
    }

    for key in before_tables.keys() {
        if !after_tables.contains_key(key) {
            result.removed_tables.push(key.clone());
        }
    }

    result
}

fn diff_table(key: TableKey, before: &TableSnapshot, after: &TableSnapshot) -> TableDiff {
    let mut table_diff = TableDiff::new(key);

    for (name, after_column) in &after.columns {
        match before.columns.get(name) {
            None => table_diff.added_columns.push(after_column.clone()),
            Some(before_column) => {
                if let Some(column_diff) = ColumnDiff::between(before_column, after_column) {
                    table_diff.changed_columns.push(column_diff);
                }
            }
        }
    }
    for name in before.columns.keys() {
        if !after.columns.contains_key(name) {
            table_diff.removed_columns.push(name.clone());
        }
    }

    // 定義の変わったインデックス・外部キーは削除＋追加として扱う
    for (name, after_index) in &after.indexes {
        match before.indexes.get(name) {
            Some(before_index) if before_index == after_index => {}
            Some(_) => {
                table_diff.removed_indexes.push(name.clone());
                table_diff.added_indexes.push(after_index.clone());
            }
            None => table_diff.added_indexes.push(after_index.clone()),
        }
    }
    for name in before.indexes.keys() {
        if !after.indexes.contains_key(name) {
            table_diff.removed_indexes.push(name.clone());
        }
    }

    for (name, after_fk) in &after.foreign_keys {
        match before.foreign_keys.get(name) {
            Some(before_fk) if before_fk == after_fk => {}
            Some(_) => {
                table_diff.removed_foreign_keys.push(name.clone());
                table_diff.added_foreign_keys.push(after_fk.clone());
            }
            None => table_diff.added_foreign_keys.push(after_fk.clone()),
        }
    }
    for name in before.foreign_keys.keys() {
        if !after.foreign_keys.contains_key(name) {
            table_diff.removed_foreign_keys.push(name.clone());
        }
    }

    if before.primary_key_columns() != after.primary_key_columns() {
        table_diff.primary_key_change = Some(PrimaryKeyChange {
            before: before.primary_key.clone(),
            after: after.primary_key.clone(),
        });
    }

    table_diff.removed_indexes.sort();
    table_diff.removed_foreign_keys.sort();
    table_diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::capability::CaseFolding;
    use crate::core::engine::EngineId;

    fn snapshot_with(table: TableSnapshot) -> Snapshot {
        let mut snapshot = Snapshot::new(EngineId::new("mysql"), CaseFolding::Preserve);
        snapshot.add_table("def", "app", table);
        snapshot
    }

    fn column(name: &str, data_type: &str, position: u32) -> ColumnSnapshot {
        ColumnSnapshot::new(name, data_type, position)
    }

    #[test]
    fn test_identical_snapshots_have_empty_diff() {
        let mut table = TableSnapshot::new("t");
        table.add_column(column("id", "int", 1));
        let snapshot = snapshot_with(table);
        assert!(diff(&snapshot, &snapshot).is_empty());
    }

    #[test]
    fn test_auto_increment_change_detected() {
        let mut before_table = TableSnapshot::new("AddAutoIncTest");
        before_table.add_column(column("testCol", "int", 1));
        let mut after_table = before_table.clone();
        after_table.columns.get_mut("testCol").unwrap().auto_increment = true;

        let result = diff(&snapshot_with(before_table), &snapshot_with(after_table));
        let table = result.table("AddAutoIncTest").unwrap();
        let column = table.column("testCol").unwrap();
        assert_eq!(
            column.changes,
            vec![ColumnChange::AutoIncrementChanged {
                before: false,
                after: true
            }]
        );
        assert_eq!(column.auto_increment_after(), Some(true));
    }

    #[test]
    fn test_table_added_and_removed() {
        let before = snapshot_with(TableSnapshot::new("old"));
        let after = snapshot_with(TableSnapshot::new("new"));
        let result = diff(&before, &after);
        assert_eq!(result.added_tables.len(), 1);
        assert_eq!(result.added_tables[0].table, "new");
        assert_eq!(result.removed_tables[0].to_string(), "app.old");
        assert!(result.modified_tables.is_empty());
    }

    #[test]
    fn test_column_index_and_key_changes() {
        let mut before_table = TableSnapshot::new("t");
        before_table.add_column(column("id", "int", 1));
        before_table.add_column(column("legacy", "text", 2));
        before_table.add_index(IndexSnapshot {
            name: "idx_legacy".to_string(),
            columns: vec!["legacy".to_string()],
            unique: false,
        });

        let mut after_table = TableSnapshot::new("t");
        after_table.add_column(column("id", "bigint", 1));
        after_table.add_column(column("email", "varchar(255)", 2));
        after_table.add_index(IndexSnapshot {
            name: "idx_email".to_string(),
            columns: vec!["email".to_string()],
            unique: true,
        });
        after_table.primary_key = Some(PrimaryKeySnapshot {
            name: None,
            columns: vec!["id".to_string()],
        });

        let result = diff(&snapshot_with(before_table), &snapshot_with(after_table));
        let table = result.table("t").unwrap();
        assert_eq!(table.added_columns[0].name, "email");
        assert_eq!(table.removed_columns, vec!["legacy"]);
        assert!(matches!(
            table.column("id").unwrap().changes[0],
            ColumnChange::TypeChanged { .. }
        ));
        assert_eq!(table.added_indexes[0].name, "idx_email");
        assert_eq!(table.removed_indexes, vec!["idx_legacy"]);
        assert!(table.primary_key_change.is_some());
    }

    #[test]
    fn test_type_comparison_ignores_case() {
        let mut before_table = TableSnapshot::new("t");
        before_table.add_column(column("id", "INT", 1));
        let mut after_table = TableSnapshot::new("t");
        after_table.add_column(column("id", "int", 1));
        assert!(diff(&snapshot_with(before_table), &snapshot_with(after_table)).is_empty());
    }
}
