// INFORMATION_SCHEMA イントロスペクター実装
//
// ANSI標準のINFORMATION_SCHEMAだけを使う汎用実装（H2、HSQLDBなど）。
// 標準ビューには一意でないインデックスが現れないため、インデックスは一意制約から組み立てます。

use super::{
    first_column, group_foreign_keys, group_indexes, native_type, primary_key_from_rows, text,
    DatabaseIntrospector, DefaultLocation,
};
use crate::adapters::connection::{DatabaseConnection, RowSet};
use async_trait::async_trait;
use tidemark_core::core::capability::CapabilityEntry;
use tidemark_core::core::error::DriverError;
use tidemark_core::core::snapshot::{
    ColumnSnapshot, ForeignKeySnapshot, IndexSnapshot, PrimaryKeySnapshot,
};

const DEFAULT_SCHEMA: &str = "PUBLIC";

pub(super) fn table_names_sql(lit: &str) -> String {
    format!(
        r#"
        SELECT table_name AS table_name
        FROM information_schema.tables
        WHERE table_schema = {}
            AND table_type = 'BASE TABLE'
        ORDER BY table_name
        "#,
        lit
    )
}

pub(super) fn primary_key_sql(schema: &str, table: &str) -> String {
    format!(
        r#"
        SELECT tc.constraint_name AS constraint_name, kcu.column_name AS column_name
        FROM information_schema.table_constraints tc
        JOIN information_schema.key_column_usage kcu
            ON kcu.constraint_schema = tc.constraint_schema
            AND kcu.constraint_name = tc.constraint_name
        WHERE tc.constraint_type = 'PRIMARY KEY'
            AND tc.table_schema = {}
            AND tc.table_name = {}
        ORDER BY kcu.ordinal_position
        "#,
        schema, table
    )
}

/// 外部キーの取得SQL
///
/// 参照先カラムは参照先制約の同じ位置のカラムとして対応付けます。
pub(super) fn foreign_keys_sql(schema: &str, table: &str) -> String {
    format!(
        r#"
        SELECT
            kcu.constraint_name AS constraint_name,
            kcu.column_name AS column_name,
            ref.table_schema AS referenced_schema,
            ref.table_name AS referenced_table,
            ref.column_name AS referenced_column
        FROM information_schema.referential_constraints rc
        JOIN information_schema.key_column_usage kcu
            ON kcu.constraint_schema = rc.constraint_schema
            AND kcu.constraint_name = rc.constraint_name
        JOIN information_schema.key_column_usage ref
            ON ref.constraint_schema = rc.unique_constraint_schema
            AND ref.constraint_name = rc.unique_constraint_name
            AND ref.ordinal_position = kcu.ordinal_position
        WHERE kcu.table_schema = {}
            AND kcu.table_name = {}
        ORDER BY kcu.constraint_name, kcu.ordinal_position
        "#,
        schema, table
    )
}

/// カラム行をスナップショットに変換
///
/// 必要なカラム: `column_name`, `data_type`, `character_maximum_length`,
/// `numeric_precision`, `numeric_scale`, `is_nullable`, `column_default`, `is_identity`
pub(super) fn columns_from_rows(rows: &RowSet) -> Vec<ColumnSnapshot> {
    rows.rows()
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let data_type = native_type(
                &text(row, "data_type"),
                row.get_i64("character_maximum_length"),
                row.get_i64("numeric_precision"),
                row.get_i64("numeric_scale"),
            );
            let mut column = ColumnSnapshot::new(text(row, "column_name"), data_type, i as u32 + 1);
            column.nullable = row.get_bool("is_nullable").unwrap_or(true);
            column.default_value = row.get_text("column_default");
            column.auto_increment = row.get_bool("is_identity").unwrap_or(false);
            column
        })
        .collect()
}

/// 汎用INFORMATION_SCHEMAイントロスペクター
pub struct InformationSchemaIntrospector {
    entry: CapabilityEntry,
}

impl InformationSchemaIntrospector {
    pub fn new(entry: CapabilityEntry) -> Self {
        Self { entry }
    }

    fn lit(&self, value: &str) -> String {
        self.entry.quote_literal(value)
    }
}

#[async_trait]
impl DatabaseIntrospector for InformationSchemaIntrospector {
    async fn default_location(
        &self,
        conn: &mut dyn DatabaseConnection,
    ) -> Result<DefaultLocation, DriverError> {
        let sql = format!(
            "SELECT catalog_name AS catalog_name FROM information_schema.schemata WHERE schema_name = {}",
            self.lit(DEFAULT_SCHEMA)
        );
        let rows = conn.query(&sql).await?;
        Ok(DefaultLocation {
            catalog: first_column(&rows).into_iter().next().unwrap_or_default(),
            schema: DEFAULT_SCHEMA.to_string(),
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
                column_name AS column_name,
                data_type AS data_type,
                character_maximum_length AS character_maximum_length,
                numeric_precision AS numeric_precision,
                numeric_scale AS numeric_scale,
                is_nullable AS is_nullable,
                column_default AS column_default,
                is_identity AS is_identity
            FROM information_schema.columns
            WHERE table_schema = {}
                AND table_name = {}
            ORDER BY ordinal_position
            "#,
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
                tc.constraint_name AS index_name,
                kcu.column_name AS column_name,
                1 AS is_unique
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON kcu.constraint_schema = tc.constraint_schema
                AND kcu.constraint_name = tc.constraint_name
            WHERE tc.constraint_type = 'UNIQUE'
                AND tc.table_schema = {}
                AND tc.table_name = {}
            ORDER BY tc.constraint_name, kcu.ordinal_position
            "#,
            self.lit(schema),
            self.lit(table)
        );
        Ok(group_indexes(&conn.query(&sql).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::connection::{Row, Value};
    use std::sync::Arc;

    #[test]
    fn test_columns_from_rows() {
        let columns: Arc<[String]> = [
            "COLUMN_NAME",
            "DATA_TYPE",
            "CHARACTER_MAXIMUM_LENGTH",
            "NUMERIC_PRECISION",
            "NUMERIC_SCALE",
            "IS_NULLABLE",
            "COLUMN_DEFAULT",
            "IS_IDENTITY",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect();
        let rows = RowSet::new(vec![
            Row::new(
                Arc::clone(&columns),
                vec![
                    Value::Text("ID".to_string()),
                    Value::Text("INTEGER".to_string()),
                    Value::Null,
                    Value::Int(32),
                    Value::Int(0),
                    Value::Text("NO".to_string()),
                    Value::Null,
                    Value::Text("YES".to_string()),
                ],
            ),
            Row::new(
                Arc::clone(&columns),
                vec![
                    Value::Text("NAME".to_string()),
                    Value::Text("CHARACTER VARYING".to_string()),
                    Value::Int(100),
                    Value::Null,
                    Value::Null,
                    Value::Text("YES".to_string()),
                    Value::Text("'x'".to_string()),
                    Value::Text("NO".to_string()),
                ],
            ),
        ]);

        let snapshot = columns_from_rows(&rows);
        assert_eq!(snapshot[0].data_type, "INTEGER");
        assert!(snapshot[0].auto_increment);
        assert!(!snapshot[0].nullable);
        assert_eq!(snapshot[1].data_type, "CHARACTER VARYING(100)");
        assert_eq!(snapshot[1].default_value.as_deref(), Some("'x'"));
        assert_eq!(snapshot[1].ordinal_position, 2);
    }
}
