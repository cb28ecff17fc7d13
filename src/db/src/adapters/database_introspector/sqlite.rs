// SQLite イントロスペクター実装
//
// sqlite_masterとPRAGMA table_info/index_list/index_info/foreign_key_listを使います。
// スキーマはアタッチ名（既定は`main`）として扱います。

use super::{first_column, text, DatabaseIntrospector, DefaultLocation};
use crate::adapters::connection::DatabaseConnection;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tidemark_core::core::capability::CapabilityEntry;
use tidemark_core::core::error::DriverError;
use tidemark_core::core::snapshot::{
    ColumnSnapshot, ForeignKeySnapshot, IndexSnapshot, PrimaryKeySnapshot,
};

const MAIN_SCHEMA: &str = "main";

/// SQLite用イントロスペクター
pub struct SqliteIntrospector {
    entry: CapabilityEntry,
}

impl SqliteIntrospector {
    pub fn new(entry: CapabilityEntry) -> Self {
        Self { entry }
    }

    fn pragma(&self, schema: &str, pragma: &str, argument: &str) -> String {
        format!(
            "PRAGMA {}.{}({})",
            self.entry.quote_identifier(schema),
            pragma,
            self.entry.quote_identifier(argument)
        )
    }

    /// CREATE TABLE文にAUTOINCREMENTが含まれるか
    async fn declares_autoincrement(
        &self,
        conn: &mut dyn DatabaseConnection,
        schema: &str,
        table: &str,
    ) -> Result<bool, DriverError> {
        let sql = format!(
            "SELECT sql FROM {}.sqlite_master WHERE type = 'table' AND name = {}",
            self.entry.quote_identifier(schema),
            self.entry.quote_literal(table)
        );
        let rows = conn.query(&sql).await?;
        Ok(rows
            .first()
            .and_then(|r| r.get_text("sql"))
            .is_some_and(|ddl| ddl.to_ascii_uppercase().contains("AUTOINCREMENT")))
    }
}

#[async_trait]
impl DatabaseIntrospector for SqliteIntrospector {
    async fn default_location(
        &self,
        _conn: &mut dyn DatabaseConnection,
    ) -> Result<DefaultLocation, DriverError> {
        Ok(DefaultLocation {
            catalog: MAIN_SCHEMA.to_string(),
            schema: MAIN_SCHEMA.to_string(),
        })
    }

    async fn get_table_names(
        &self,
        conn: &mut dyn DatabaseConnection,
        schema: &str,
    ) -> Result<Vec<String>, DriverError> {
        let sql = format!(
            r#"
            SELECT name
            FROM {}.sqlite_master
            WHERE type = 'table'
                AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            "#,
            self.entry.quote_identifier(schema)
        );
        Ok(first_column(&conn.query(&sql).await?))
    }

    /// カラム情報を取得
    ///
    /// 単独主キーのINTEGER列で、テーブル定義がAUTOINCREMENTを宣言している場合のみ
    /// 自動採番とみなします。
    async fn get_columns(
        &self,
        conn: &mut dyn DatabaseConnection,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ColumnSnapshot>, DriverError> {
        let rows = conn.query(&self.pragma(schema, "table_info", table)).await?;

        let pk_count = rows
            .rows()
            .iter()
            .filter(|r| r.get_i64("pk").unwrap_or(0) > 0)
            .count();
        let autoincrement = pk_count == 1 && self.declares_autoincrement(conn, schema, table).await?;

        let columns = rows
            .rows()
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let data_type = text(row, "type");
                let is_pk = row.get_i64("pk").unwrap_or(0) > 0;
                let mut column = ColumnSnapshot::new(text(row, "name"), data_type.clone(), i as u32 + 1);
                column.nullable = !row.get_bool("notnull").unwrap_or(false) && !is_pk;
                column.default_value = row.get_text("dflt_value");
                column.auto_increment =
                    autoincrement && is_pk && data_type.eq_ignore_ascii_case("INTEGER");
                column
            })
            .collect();

        Ok(columns)
    }

    async fn get_primary_key(
        &self,
        conn: &mut dyn DatabaseConnection,
        schema: &str,
        table: &str,
    ) -> Result<Option<PrimaryKeySnapshot>, DriverError> {
        let rows = conn.query(&self.pragma(schema, "table_info", table)).await?;

        // pk列は主キー内の順序（1始まり）
        let mut pk_columns: Vec<(i64, String)> = rows
            .rows()
            .iter()
            .filter_map(|row| {
                let position = row.get_i64("pk").unwrap_or(0);
                (position > 0).then(|| (position, text(row, "name")))
            })
            .collect();
        if pk_columns.is_empty() {
            return Ok(None);
        }
        pk_columns.sort_by_key(|(position, _)| *position);

        Ok(Some(PrimaryKeySnapshot {
            name: None,
            columns: pk_columns.into_iter().map(|(_, name)| name).collect(),
        }))
    }

    /// 外部キーを取得
    ///
    /// SQLiteは外部キーに名前を持たないため、`fk_{table}_{id}`を名前とします。
    async fn get_foreign_keys(
        &self,
        conn: &mut dyn DatabaseConnection,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ForeignKeySnapshot>, DriverError> {
        let rows = conn
            .query(&self.pragma(schema, "foreign_key_list", table))
            .await?;

        let mut grouped: BTreeMap<i64, ForeignKeySnapshot> = BTreeMap::new();
        for row in rows.rows() {
            let id = row.get_i64("id").unwrap_or(0);
            let fk = grouped.entry(id).or_insert_with(|| ForeignKeySnapshot {
                name: format!("fk_{}_{}", table, id),
                columns: Vec::new(),
                referenced_schema: None,
                referenced_table: text(row, "table"),
                referenced_columns: Vec::new(),
            });
            fk.columns.push(text(row, "from"));
            fk.referenced_columns.push(text(row, "to"));
        }

        Ok(grouped.into_values().collect())
    }

    async fn get_indexes(
        &self,
        conn: &mut dyn DatabaseConnection,
        schema: &str,
        table: &str,
    ) -> Result<Vec<IndexSnapshot>, DriverError> {
        let rows = conn.query(&self.pragma(schema, "index_list", table)).await?;

        let mut indexes = Vec::new();
        for row in rows.rows() {
            // origin = 'pk' は主キーの裏付けインデックス
            if text(row, "origin") == "pk" {
                continue;
            }
            let name = text(row, "name");
            let info = conn.query(&self.pragma(schema, "index_info", &name)).await?;
            let mut columns: Vec<(i64, String)> = info
                .rows()
                .iter()
                .map(|r| (r.get_i64("seqno").unwrap_or(0), text(r, "name")))
                .collect();
            columns.sort_by_key(|(seqno, _)| *seqno);

            indexes.push(IndexSnapshot {
                name,
                columns: columns.into_iter().map(|(_, c)| c).collect(),
                unique: row.get_bool("unique").unwrap_or(false),
            });
        }
        indexes.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(indexes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlx_connection::SqlxConnection;
    use tidemark_core::core::capability::CapabilityMatrix;
    use tidemark_core::core::engine::Dialect;

    fn introspector() -> SqliteIntrospector {
        SqliteIntrospector::new(
            CapabilityMatrix::global()
                .entry(&Dialect::SQLite.id())
                .unwrap()
                .clone(),
        )
    }

    async fn connection() -> SqlxConnection {
        let mut conn = SqlxConnection::connect("sqlite::memory:").await.unwrap();
        conn.execute(
            "CREATE TABLE parent (id INTEGER PRIMARY KEY AUTOINCREMENT, code TEXT NOT NULL UNIQUE)",
        )
        .await
        .unwrap();
        conn.execute(
            "CREATE TABLE child (a INTEGER, b INTEGER, parent_id INTEGER DEFAULT 0, \
             PRIMARY KEY (b, a), FOREIGN KEY (parent_id) REFERENCES parent (id))",
        )
        .await
        .unwrap();
        conn.execute("CREATE INDEX idx_child_parent ON child (parent_id)")
            .await
            .unwrap();
        conn
    }

    #[tokio::test]
    async fn test_columns_and_autoincrement() {
        let mut conn = connection().await;
        let introspector = introspector();

        let tables = introspector.get_table_names(&mut conn, "main").await.unwrap();
        assert_eq!(tables, vec!["child", "parent"]);

        let columns = introspector.get_columns(&mut conn, "main", "parent").await.unwrap();
        assert_eq!(columns[0].name, "id");
        assert!(columns[0].auto_increment);
        assert!(!columns[1].auto_increment);
        assert!(!columns[1].nullable);

        let columns = introspector.get_columns(&mut conn, "main", "child").await.unwrap();
        assert!(columns.iter().all(|c| !c.auto_increment));
        assert_eq!(columns[2].default_value.as_deref(), Some("0"));
        assert_eq!(columns[2].ordinal_position, 3);
    }

    #[tokio::test]
    async fn test_keys_and_indexes() {
        let mut conn = connection().await;
        let introspector = introspector();

        let pk = introspector
            .get_primary_key(&mut conn, "main", "child")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pk.columns, vec!["b", "a"]);

        let fks = introspector.get_foreign_keys(&mut conn, "main", "child").await.unwrap();
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].referenced_table, "parent");
        assert_eq!(fks[0].columns, vec!["parent_id"]);

        let indexes = introspector.get_indexes(&mut conn, "main", "child").await.unwrap();
        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes[0].name, "idx_child_parent");
        assert!(!indexes[0].unique);

        let indexes = introspector.get_indexes(&mut conn, "main", "parent").await.unwrap();
        assert_eq!(indexes.len(), 1);
        assert!(indexes[0].unique);
        assert_eq!(indexes[0].columns, vec!["code"]);
    }
}
