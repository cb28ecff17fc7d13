// PostgreSQL イントロスペクター実装
//
// pg_catalogを直接参照します。Anyドライバーで確実に読めるよう、
// 名前型（name）の列はすべてtextにキャストします。

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

/// PostgreSQL用イントロスペクター
pub struct PostgresIntrospector {
    entry: CapabilityEntry,
}

impl PostgresIntrospector {
    pub fn new(entry: CapabilityEntry) -> Self {
        Self { entry }
    }

    fn lit(&self, value: &str) -> String {
        self.entry.quote_literal(value)
    }
}

#[async_trait]
impl DatabaseIntrospector for PostgresIntrospector {
    async fn default_location(
        &self,
        conn: &mut dyn DatabaseConnection,
    ) -> Result<DefaultLocation, DriverError> {
        let rows = conn
            .query("SELECT current_database()::text AS catalog_name, current_schema()::text AS schema_name")
            .await?;
        let row = rows.first();
        Ok(DefaultLocation {
            catalog: row.map(|r| text(r, "catalog_name")).unwrap_or_default(),
            schema: row
                .and_then(|r| r.get_text("schema_name"))
                .unwrap_or_else(|| "public".to_string()),
        })
    }

    async fn get_table_names(
        &self,
        conn: &mut dyn DatabaseConnection,
        schema: &str,
    ) -> Result<Vec<String>, DriverError> {
        let sql = format!(
            r#"
            SELECT table_name::text AS table_name
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
        // identity列とnextval()既定値（serial）を自動採番とみなす
        let sql = format!(
            r#"
            SELECT
                a.attname::text AS column_name,
                format_type(a.atttypid, a.atttypmod)::text AS data_type,
                (NOT a.attnotnull) AS is_nullable,
                pg_get_expr(d.adbin, d.adrelid)::text AS column_default,
                (a.attidentity::text <> ''
                    OR COALESCE(pg_get_expr(d.adbin, d.adrelid), '') LIKE 'nextval(%') AS is_auto_increment
            FROM pg_attribute a
            JOIN pg_class c ON c.oid = a.attrelid
            JOIN pg_namespace n ON n.oid = c.relnamespace
            LEFT JOIN pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum
            WHERE n.nspname = {}
                AND c.relname = {}
                AND a.attnum > 0
                AND NOT a.attisdropped
            ORDER BY a.attnum
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
                column.auto_increment = row.get_bool("is_auto_increment").unwrap_or(false);
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
            SELECT con.conname::text AS constraint_name, a.attname::text AS column_name
            FROM pg_constraint con
            JOIN pg_class c ON c.oid = con.conrelid
            JOIN pg_namespace n ON n.oid = c.relnamespace
            JOIN LATERAL unnest(con.conkey) WITH ORDINALITY AS k(attnum, ord) ON true
            JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum = k.attnum
            WHERE con.contype = 'p'
                AND n.nspname = {}
                AND c.relname = {}
            ORDER BY k.ord
            "#,
            self.lit(schema),
            self.lit(table)
        );
        Ok(primary_key_from_rows(&conn.query(&sql).await?))
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
                con.conname::text AS constraint_name,
                a.attname::text AS column_name,
                rn.nspname::text AS referenced_schema,
                rc.relname::text AS referenced_table,
                ra.attname::text AS referenced_column
            FROM pg_constraint con
            JOIN pg_class c ON c.oid = con.conrelid
            JOIN pg_namespace n ON n.oid = c.relnamespace
            JOIN pg_class rc ON rc.oid = con.confrelid
            JOIN pg_namespace rn ON rn.oid = rc.relnamespace
            JOIN LATERAL unnest(con.conkey, con.confkey) WITH ORDINALITY AS k(attnum, ref_attnum, ord) ON true
            JOIN pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = k.attnum
            JOIN pg_attribute ra ON ra.attrelid = con.confrelid AND ra.attnum = k.ref_attnum
            WHERE con.contype = 'f'
                AND n.nspname = {}
                AND c.relname = {}
            ORDER BY con.conname, k.ord
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
                i.relname::text AS index_name,
                a.attname::text AS column_name,
                ix.indisunique AS is_unique
            FROM pg_class t
            JOIN pg_index ix ON t.oid = ix.indrelid
            JOIN pg_class i ON i.oid = ix.indexrelid
            JOIN pg_namespace n ON n.oid = t.relnamespace
            JOIN LATERAL unnest(ix.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord) ON true
            JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum
            WHERE t.relkind = 'r'
                AND n.nspname = {}
                AND t.relname = {}
                AND NOT ix.indisprimary
            ORDER BY i.relname, k.ord
            "#,
            self.lit(schema),
            self.lit(table)
        );
        Ok(group_indexes(&conn.query(&sql).await?))
    }
}
