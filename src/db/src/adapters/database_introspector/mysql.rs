// MySQL イントロスペクター実装
//
// MySQLではデータベースがスキーマに相当するため、
// カタログ名とスキーマ名にはどちらも現在のデータベース名を使います。

use super::{
    first_column, group_foreign_keys, group_indexes, text, DatabaseIntrospector, DefaultLocation,
};
use crate::adapters::connection::DatabaseConnection;
use async_trait::async_trait;
use tidemark_core::core::capability::CapabilityEntry;
use tidemark_core::core::error::DriverError;
use tidemark_core::core::snapshot::{
    ColumnSnapshot, ForeignKeySnapshot, IndexSnapshot, PrimaryKeySnapshot,
};

/// MySQL用イントロスペクター
pub struct MySqlIntrospector {
    entry: CapabilityEntry,
}

impl MySqlIntrospector {
    pub fn new(entry: CapabilityEntry) -> Self {
        Self { entry }
    }

    fn lit(&self, value: &str) -> String {
        self.entry.quote_literal(value)
    }
}

#[async_trait]
impl DatabaseIntrospector for MySqlIntrospector {
    async fn default_location(
        &self,
        conn: &mut dyn DatabaseConnection,
    ) -> Result<DefaultLocation, DriverError> {
        let rows = conn.query("SELECT DATABASE() AS schema_name").await?;
        let schema = rows
            .first()
            .map(|r| text(r, "schema_name"))
            .unwrap_or_default();
        Ok(DefaultLocation {
            catalog: schema.clone(),
            schema,
        })
    }

    async fn get_table_names(
        &self,
        conn: &mut dyn DatabaseConnection,
        schema: &str,
    ) -> Result<Vec<String>, DriverError> {
        let sql = format!(
            r#"
            SELECT table_name AS table_name
            FROM information_schema.tables
            WHERE table_schema = {}
                AND table_type = 'BASE TABLE'
            ORDER BY table_name
            "#,
            self.lit(schema)
        );
        Ok(first_column(&conn.query(&sql).await?))
    }

    async fn get_columns(
        &self,
        conn: &mut dyn DatabaseConnection,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ColumnSnapshot>, DriverError> {
        let sql = format!(
            r#"
            SELECT
                column_name AS column_name,
                column_type AS data_type,
                is_nullable AS is_nullable,
                column_default AS column_default,
                extra AS extra
            FROM information_schema.columns
            WHERE table_schema = {}
                AND table_name = {}
            ORDER BY ordinal_position
            "#,
            self.lit(schema),
            self.lit(table)
        );
        let rows = conn.query(&sql).await?;

        let columns = rows
            .rows()
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let mut column =
                    ColumnSnapshot::new(text(row, "column_name"), text(row, "data_type"), i as u32 + 1);
                column.nullable = row.get_bool("is_nullable").unwrap_or(true);
                column.default_value = row.get_text("column_default");
                column.auto_increment = text(row, "extra")
                    .to_ascii_lowercase()
                    .contains("auto_increment");
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
        let sql = format!(
            r#"
            SELECT column_name AS column_name
            FROM information_schema.statistics
            WHERE table_schema = {}
                AND table_name = {}
                AND index_name = 'PRIMARY'
            ORDER BY seq_in_index
            "#,
            self.lit(schema),
            self.lit(table)
        );
        let columns = first_column(&conn.query(&sql).await?);
        if columns.is_empty() {
            return Ok(None);
        }
        Ok(Some(PrimaryKeySnapshot {
            name: Some("PRIMARY".to_string()),
            columns,
        }))
    }

    async fn get_foreign_keys(
        &self,
        conn: &mut dyn DatabaseConnection,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ForeignKeySnapshot>, DriverError> {
        let sql = format!(
            r#"
            SELECT
                constraint_name AS constraint_name,
                column_name AS column_name,
                referenced_table_schema AS referenced_schema,
                referenced_table_name AS referenced_table,
                referenced_column_name AS referenced_column
            FROM information_schema.key_column_usage
            WHERE table_schema = {}
                AND table_name = {}
                AND referenced_table_name IS NOT NULL
            ORDER BY constraint_name, ordinal_position
            "#,
            self.lit(schema),
            self.lit(table)
        );
        Ok(group_foreign_keys(&conn.query(&sql).await?))
    }

    async fn get_indexes(
        &self,
        conn: &mut dyn DatabaseConnection,
        schema: &str,
        table: &str,
    ) -> Result<Vec<IndexSnapshot>, DriverError> {
        let sql = format!(
            r#"
            SELECT
                index_name AS index_name,
                column_name AS column_name,
                CASE WHEN non_unique = 0 THEN 1 ELSE 0 END AS is_unique
            FROM information_schema.statistics
            WHERE table_schema = {}
                AND table_name = {}
                AND index_name <> 'PRIMARY'
            ORDER BY index_name, seq_in_index
            "#,
            self.lit(schema),
            self.lit(table)
        );
        Ok(group_indexes(&conn.query(&sql).await?))
    }
}
