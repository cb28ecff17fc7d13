// SQL Server イントロスペクター実装
//
// INFORMATION_SCHEMAに加え、identity列の判定にCOLUMNPROPERTY、
// インデックスにsys.indexes/sys.index_columnsを使います。

use super::information_schema::{
    columns_from_rows, foreign_keys_sql, primary_key_sql, table_names_sql,
};
use super::{
    first_column, group_foreign_keys, group_indexes, primary_key_from_rows, text,
    DatabaseIntrospector, DefaultLocation,
};
use crate::adapters::connection::DatabaseConnection;
use async_trait::async_trait;
use tidemark_core::core::capability::CapabilityEntry;
use tidemark_core::core::error::DriverError;
use tidemark_core::core::snapshot::{
    ColumnSnapshot, ForeignKeySnapshot, IndexSnapshot, PrimaryKeySnapshot,
};

/// SQL Server用イントロスペクター
pub struct SqlServerIntrospector {
    entry: CapabilityEntry,
}

impl SqlServerIntrospector {
    pub fn new(entry: CapabilityEntry) -> Self {
        Self { entry }
    }

    fn lit(&self, value: &str) -> String {
        self.entry.quote_literal(value)
    }

    /// OBJECT_IDに渡す`[schema].[table]`形式のリテラル
    fn object_literal(&self, schema: &str, table: &str) -> String {
        self.lit(&self.entry.qualify(None, Some(schema), table))
    }
}

#[async_trait]
impl DatabaseIntrospector for SqlServerIntrospector {
    async fn default_location(
        &self,
        conn: &mut dyn DatabaseConnection,
    ) -> Result<DefaultLocation, DriverError> {
        let rows = conn
            .query("SELECT DB_NAME() AS catalog_name, SCHEMA_NAME() AS schema_name")
            .await?;
        let row = rows.first();
        Ok(DefaultLocation {
            catalog: row.map(|r| text(r, "catalog_name")).unwrap_or_default(),
            schema: row
                .and_then(|r| r.get_text("schema_name"))
                .unwrap_or_else(|| "dbo".to_string()),
        })
    }

    async fn get_table_names(
        &self,
        conn: &mut dyn DatabaseConnection,
        schema: &str,
    ) -> Result<Vec<String>, DriverError> {
        Ok(first_column(&conn.query(&table_names_sql(&self.lit(schema))).await?))
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
                COLUMN_NAME AS column_name,
                DATA_TYPE AS data_type,
                CHARACTER_MAXIMUM_LENGTH AS character_maximum_length,
                NUMERIC_PRECISION AS numeric_precision,
                NUMERIC_SCALE AS numeric_scale,
                IS_NULLABLE AS is_nullable,
                COLUMN_DEFAULT AS column_default,
                COLUMNPROPERTY(OBJECT_ID({}), COLUMN_NAME, 'IsIdentity') AS is_identity
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = {}
                AND TABLE_NAME = {}
            ORDER BY ORDINAL_POSITION
            "#,
            self.object_literal(schema, table),
            self.lit(schema),
            self.lit(table)
        );
        Ok(columns_from_rows(&conn.query(&sql).await?))
    }

    async fn get_primary_key(
        &self,
        conn: &mut dyn DatabaseConnection,
        schema: &str,
        table: &str,
    ) -> Result<Option<PrimaryKeySnapshot>, DriverError> {
        let sql = primary_key_sql(&self.lit(schema), &self.lit(table));
        Ok(primary_key_from_rows(&conn.query(&sql).await?))
    }

    async fn get_foreign_keys(
        &self,
        conn: &mut dyn DatabaseConnection,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ForeignKeySnapshot>, DriverError> {
        let sql = foreign_keys_sql(&self.lit(schema), &self.lit(table));
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
                i.name AS index_name,
                c.name AS column_name,
                CAST(i.is_unique AS int) AS is_unique
            FROM sys.indexes i
            JOIN sys.index_columns ic ON ic.object_id = i.object_id AND ic.index_id = i.index_id
            JOIN sys.columns c ON c.object_id = ic.object_id AND c.column_id = ic.column_id
            WHERE i.object_id = OBJECT_ID({})
                AND i.is_primary_key = 0
                AND i.name IS NOT NULL
                AND ic.is_included_column = 0
            ORDER BY i.name, ic.key_ordinal
            "#,
            self.object_literal(schema, table)
        );
        Ok(group_indexes(&conn.query(&sql).await?))
    }
}
