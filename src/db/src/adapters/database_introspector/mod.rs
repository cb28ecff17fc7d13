// データベースイントロスペクター
//
// データベースからスキーマ情報を取得するための抽象化レイヤー。
// 各方言固有のカタログ・INFORMATION_SCHEMA・PRAGMAクエリを実装し、
// 結果をスナップショットの各要素に変換します。

mod information_schema;
mod mysql;
mod postgres;
mod sqlite;
mod sqlserver;

pub use information_schema::InformationSchemaIntrospector;
pub use mysql::MySqlIntrospector;
pub use postgres::PostgresIntrospector;
pub use sqlite::SqliteIntrospector;
pub use sqlserver::SqlServerIntrospector;

use crate::adapters::connection::{DatabaseConnection, Row, RowSet};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tidemark_core::core::capability::{CapabilityEntry, MetadataStyle};
use tidemark_core::core::error::{DriverError, SnapshotError};
use tidemark_core::core::snapshot::{
    ColumnSnapshot, ForeignKeySnapshot, IndexSnapshot, PrimaryKeySnapshot,
};

/// 接続の既定の位置（カタログとスキーマ）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultLocation {
    pub catalog: String,
    pub schema: String,
}

/// データベーススキーマ取得インターフェース
///
/// 各データベース方言固有のイントロスペクション処理を抽象化します。
/// どのメソッドも読み取り専用のクエリだけを発行します。
#[async_trait]
pub trait DatabaseIntrospector: Send + Sync {
    /// 接続の既定カタログ・スキーマを取得
    async fn default_location(
        &self,
        conn: &mut dyn DatabaseConnection,
    ) -> Result<DefaultLocation, DriverError>;

    /// テーブル名一覧を取得（名前順）
    async fn get_table_names(
        &self,
        conn: &mut dyn DatabaseConnection,
        schema: &str,
    ) -> Result<Vec<String>, DriverError>;

    /// カラム情報を取得（定義順）
    async fn get_columns(
        &self,
        conn: &mut dyn DatabaseConnection,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ColumnSnapshot>, DriverError>;

    /// 主キーを取得
    async fn get_primary_key(
        &self,
        conn: &mut dyn DatabaseConnection,
        schema: &str,
        table: &str,
    ) -> Result<Option<PrimaryKeySnapshot>, DriverError>;

    /// 外部キーを取得
    async fn get_foreign_keys(
        &self,
        conn: &mut dyn DatabaseConnection,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ForeignKeySnapshot>, DriverError>;

    /// インデックスを取得（主キーの裏付けインデックスは除く）
    async fn get_indexes(
        &self,
        conn: &mut dyn DatabaseConnection,
        schema: &str,
        table: &str,
    ) -> Result<Vec<IndexSnapshot>, DriverError>;
}

/// メタデータ方式に応じたイントロスペクターを作成
///
/// # Returns
///
/// メタデータを読めないエンジンでは`SnapshotError::Unsupported`
pub fn create_introspector(
    entry: &CapabilityEntry,
) -> Result<Box<dyn DatabaseIntrospector>, SnapshotError> {
    let introspector: Box<dyn DatabaseIntrospector> = match entry.metadata {
        MetadataStyle::Postgres => Box::new(PostgresIntrospector::new(entry.clone())),
        MetadataStyle::MySql => Box::new(MySqlIntrospector::new(entry.clone())),
        MetadataStyle::Sqlite => Box::new(SqliteIntrospector::new(entry.clone())),
        MetadataStyle::SqlServer => Box::new(SqlServerIntrospector::new(entry.clone())),
        MetadataStyle::InformationSchema => {
            Box::new(InformationSchemaIntrospector::new(entry.clone()))
        }
        MetadataStyle::Unavailable => {
            return Err(SnapshotError::Unsupported {
                engine: entry.engine.clone(),
            })
        }
    };
    Ok(introspector)
}

/// 文字列カラムを取得（NULLは空文字列）
pub(crate) fn text(row: &Row, column: &str) -> String {
    row.get_text(column).unwrap_or_default()
}

/// 1カラム目を文字列として集める
pub(crate) fn first_column(rows: &RowSet) -> Vec<String> {
    rows.rows()
        .iter()
        .filter_map(|row| row.value(0).and_then(|v| v.to_text()))
        .collect()
}

/// `constraint_name`と`column_name`を持つ行から主キーを組み立てる
pub(crate) fn primary_key_from_rows(rows: &RowSet) -> Option<PrimaryKeySnapshot> {
    let first = rows.first()?;
    Some(PrimaryKeySnapshot {
        name: first.get_text("constraint_name"),
        columns: rows.rows().iter().map(|r| text(r, "column_name")).collect(),
    })
}

/// 外部キー行を制約名でまとめる
///
/// 行は制約名・カラム順に並んでいる前提です。
/// 必要なカラム: `constraint_name`, `column_name`, `referenced_schema`,
/// `referenced_table`, `referenced_column`
pub(crate) fn group_foreign_keys(rows: &RowSet) -> Vec<ForeignKeySnapshot> {
    let mut grouped: BTreeMap<String, ForeignKeySnapshot> = BTreeMap::new();
    for row in rows.rows() {
        let name = text(row, "constraint_name");
        let fk = grouped
            .entry(name.clone())
            .or_insert_with(|| ForeignKeySnapshot {
                name,
                columns: Vec::new(),
                referenced_schema: row.get_text("referenced_schema"),
                referenced_table: text(row, "referenced_table"),
                referenced_columns: Vec::new(),
            });
        fk.columns.push(text(row, "column_name"));
        fk.referenced_columns.push(text(row, "referenced_column"));
    }
    grouped.into_values().collect()
}

/// インデックス行をインデックス名でまとめる
///
/// 必要なカラム: `index_name`, `column_name`, `is_unique`
pub(crate) fn group_indexes(rows: &RowSet) -> Vec<IndexSnapshot> {
    let mut grouped: BTreeMap<String, IndexSnapshot> = BTreeMap::new();
    for row in rows.rows() {
        let name = text(row, "index_name");
        let index = grouped
            .entry(name.clone())
            .or_insert_with(|| IndexSnapshot {
                name,
                columns: Vec::new(),
                unique: row.get_bool("is_unique").unwrap_or(false),
            });
        index.columns.push(text(row, "column_name"));
    }
    grouped.into_values().collect()
}

/// INFORMATION_SCHEMAの型情報からネイティブ型表記を組み立てる
///
/// 文字型は長さ（-1は`max`）、decimal/numericは精度とスケールを付けます。
pub(crate) fn native_type(
    data_type: &str,
    char_length: Option<i64>,
    precision: Option<i64>,
    scale: Option<i64>,
) -> String {
    let lower = data_type.to_ascii_lowercase();
    match char_length {
        Some(-1) => return format!("{}(max)", data_type),
        Some(n) if n > 0 && !lower.contains("text") && !lower.contains("lob") => {
            return format!("{}({})", data_type, n)
        }
        _ => {}
    }
    if matches!(lower.as_str(), "decimal" | "numeric") {
        if let Some(p) = precision {
            return format!("{}({},{})", data_type, p, scale.unwrap_or(0));
        }
    }
    data_type.to_string()
}
