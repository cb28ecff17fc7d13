// スキーマスナップショット
//
// 稼働中データベースのスキーマをメモリ上に写した読み取り専用のオブジェクトグラフ。
// Snapshot → Catalog → Schema → Table → {Column, Index, PrimaryKey, ForeignKey}
// すべて名前順のマップで保持し、比較・走査・差分を決定的にします。

use crate::core::capability::CaseFolding;
use crate::core::engine::EngineId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 名前で検索（完全一致 → 畳み込み → 大文字小文字無視の順）
fn lookup<'a, V>(map: &'a BTreeMap<String, V>, name: &str, folding: CaseFolding) -> Option<&'a V> {
    map.get(name)
        .or_else(|| map.get(&folding.apply(name)))
        .or_else(|| {
            map.iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
}

/// スキーマスナップショット
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// 取得元エンジン
    pub engine: EngineId,
    /// 未クォート識別子の畳み込み規則
    pub case_folding: CaseFolding,
    /// 接続の既定カタログ
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_catalog: Option<String>,
    /// 接続の既定スキーマ
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_schema: Option<String>,
    pub catalogs: BTreeMap<String, CatalogSnapshot>,
}

impl Snapshot {
    pub fn new(engine: EngineId, case_folding: CaseFolding) -> Self {
        Self {
            engine,
            case_folding,
            default_catalog: None,
            default_schema: None,
            catalogs: BTreeMap::new(),
        }
    }

    /// スキーマを取得（なければ作成）
    pub fn schema_mut(&mut self, catalog: &str, schema: &str) -> &mut SchemaSnapshot {
        self.catalogs
            .entry(catalog.to_string())
            .or_insert_with(|| CatalogSnapshot::new(catalog))
            .schemas
            .entry(schema.to_string())
            .or_insert_with(|| SchemaSnapshot::new(schema))
    }

    /// テーブルを追加
    pub fn add_table(&mut self, catalog: &str, schema: &str, table: TableSnapshot) {
        self.schema_mut(catalog, schema)
            .tables
            .insert(table.name.clone(), table);
    }

    /// スキーマを取得
    ///
    /// カタログを指定しない場合は既定カタログ、それもなければ全カタログから探します。
    pub fn schema(&self, schema: &str) -> Option<&SchemaSnapshot> {
        if let Some(catalog) = self
            .default_catalog
            .as_deref()
            .and_then(|c| lookup(&self.catalogs, c, self.case_folding))
        {
            if let Some(found) = lookup(&catalog.schemas, schema, self.case_folding) {
                return Some(found);
            }
        }
        self.catalogs
            .values()
            .find_map(|c| lookup(&c.schemas, schema, self.case_folding))
    }

    /// 既定スキーマのテーブルを取得
    ///
    /// 既定スキーマが不明な場合は、全スキーマから最初に見つかったものを返します。
    pub fn table(&self, name: &str) -> Option<&TableSnapshot> {
        match self.default_schema.as_deref() {
            Some(schema) => self.table_in(schema, name),
            None => self
                .schemas()
                .find_map(|s| lookup(&s.tables, name, self.case_folding)),
        }
    }

    /// 指定スキーマのテーブルを取得
    pub fn table_in(&self, schema: &str, name: &str) -> Option<&TableSnapshot> {
        self.schema(schema)
            .and_then(|s| lookup(&s.tables, name, self.case_folding))
    }

    /// すべてのスキーマ（カタログ名・スキーマ名順）
    pub fn schemas(&self) -> impl Iterator<Item = &SchemaSnapshot> {
        self.catalogs.values().flat_map(|c| c.schemas.values())
    }

    /// すべてのテーブルを(カタログ名, スキーマ名, テーブル)で列挙
    pub fn tables(&self) -> impl Iterator<Item = (&str, &str, &TableSnapshot)> {
        self.catalogs.values().flat_map(|catalog| {
            catalog.schemas.values().flat_map(move |schema| {
                schema
                    .tables
                    .values()
                    .map(move |table| (catalog.name.as_str(), schema.name.as_str(), table))
            })
        })
    }

    /// テーブル数
    pub fn table_count(&self) -> usize {
        self.schemas().map(|s| s.tables.len()).sum()
    }
}

/// カタログ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub name: String,
    pub schemas: BTreeMap<String, SchemaSnapshot>,
}

impl CatalogSnapshot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schemas: BTreeMap::new(),
        }
    }
}

/// スキーマ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub name: String,
    pub tables: BTreeMap<String, TableSnapshot>,
}

impl SchemaSnapshot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: BTreeMap::new(),
        }
    }
}

/// テーブル
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub name: String,
    pub columns: BTreeMap<String, ColumnSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<PrimaryKeySnapshot>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub foreign_keys: BTreeMap<String, ForeignKeySnapshot>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub indexes: BTreeMap<String, IndexSnapshot>,
}

impl TableSnapshot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: BTreeMap::new(),
            primary_key: None,
            foreign_keys: BTreeMap::new(),
            indexes: BTreeMap::new(),
        }
    }

    pub fn add_column(&mut self, column: ColumnSnapshot) {
        self.columns.insert(column.name.clone(), column);
    }

    pub fn add_index(&mut self, index: IndexSnapshot) {
        self.indexes.insert(index.name.clone(), index);
    }

    pub fn add_foreign_key(&mut self, foreign_key: ForeignKeySnapshot) {
        self.foreign_keys.insert(foreign_key.name.clone(), foreign_key);
    }

    /// カラムを取得（完全一致がなければ大文字小文字を無視）
    pub fn column(&self, name: &str) -> Option<&ColumnSnapshot> {
        lookup(&self.columns, name, CaseFolding::Preserve)
    }

    /// 定義順のカラム
    pub fn columns_in_order(&self) -> Vec<&ColumnSnapshot> {
        let mut columns: Vec<_> = self.columns.values().collect();
        columns.sort_by_key(|c| c.ordinal_position);
        columns
    }

    /// 主キーのカラム
    pub fn primary_key_columns(&self) -> &[String] {
        self.primary_key
            .as_ref()
            .map(|pk| pk.columns.as_slice())
            .unwrap_or_default()
    }
}

/// カラム
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSnapshot {
    pub name: String,
    /// ネイティブ型表記
    pub data_type: String,
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    pub auto_increment: bool,
    /// 1始まりの定義順
    pub ordinal_position: u32,
}

impl ColumnSnapshot {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, ordinal_position: u32) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            default_value: None,
            auto_increment: false,
            ordinal_position,
        }
    }
}

/// 主キー
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKeySnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// 主キー内の順序で並んだカラム
    pub columns: Vec<String>,
}

/// 外部キー
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeySnapshot {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referenced_schema: Option<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
}

/// インデックス（主キーの裏付けインデックスは含まない）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}
