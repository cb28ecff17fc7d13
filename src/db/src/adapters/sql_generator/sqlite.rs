// SQLite用SQLジェネレーター
//
// SQLiteの自動採番は`INTEGER PRIMARY KEY AUTOINCREMENT`のカラム定義でしか表現できないため、
// CREATE TABLEとADD COLUMNを独自に生成します。

use super::standard::{self, create_table_sql};
use super::{generator, EnginePredicate, GenerateResult, GeneratorContext, SqlGenerator};
use tidemark_core::core::engine::Dialect;
use tidemark_core::core::statement::{
    AddColumnStatement, CreateIndexStatement, CreateTableStatement, CreateViewStatement,
};

pub fn generators() -> Vec<Box<dyn SqlGenerator>> {
    let sqlite = || EnginePredicate::engine(Dialect::SQLite);

    vec![
        generator(sqlite(), create_table),
        generator(sqlite(), add_column),
        generator(sqlite(), create_index),
        generator(sqlite(), create_view),
    ]
}

/// CREATE TABLE文を生成
///
/// 自動採番カラムがある場合は、そのカラムを唯一の主キーとしてインラインで定義します。
fn create_table(stmt: &CreateTableStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    if !stmt.columns.iter().any(|c| c.auto_increment) {
        return Ok(vec![create_table_sql(stmt, ctx, false)]);
    }

    let columns: Vec<String> = stmt
        .columns
        .iter()
        .map(|c| {
            if c.auto_increment {
                format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", ctx.quote(&c.name))
            } else {
                ctx.column_definition(c, false)
            }
        })
        .collect();

    Ok(vec![format!(
        "CREATE TABLE {} (\n  {}\n)",
        ctx.table(&stmt.table),
        columns.join(",\n  ")
    )])
}

fn add_column(stmt: &AddColumnStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "ALTER TABLE {} ADD COLUMN {}",
        ctx.table(&stmt.table),
        ctx.column_definition(&stmt.column, false)
    )])
}

/// インデックス作成SQLを生成
///
/// アタッチしたデータベースのスキーマはインデックス名に付け、テーブル名は修飾しません。
fn create_index(stmt: &CreateIndexStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    let unique = if stmt.unique { "UNIQUE " } else { "" };
    Ok(vec![format!(
        "CREATE {}INDEX {} ON {} ({})",
        unique,
        ctx.sibling(&stmt.table, &stmt.index_name),
        ctx.quote(&stmt.table.name),
        ctx.quote_columns(&stmt.column_names)
    )])
}

/// ビュー作成SQLを生成
///
/// SQLiteはOR REPLACEを持たないため、置き換え時は先に削除します。
fn create_view(stmt: &CreateViewStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    if !stmt.replace_if_exists {
        return standard::create_view(stmt, ctx);
    }
    let mut sql = vec![format!("DROP VIEW IF EXISTS {}", ctx.table(&stmt.view))];
    let plain = CreateViewStatement {
        replace_if_exists: false,
        ..stmt.clone()
    };
    sql.extend(standard::create_view(&plain, ctx)?);
    Ok(sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_core::core::capability::CapabilityMatrix;
    use tidemark_core::core::statement::{ColumnDefinition, TableRef};

    fn ctx() -> GeneratorContext<'static> {
        GeneratorContext::new(CapabilityMatrix::global().entry(&Dialect::SQLite.id()).unwrap())
    }

    #[test]
    fn test_create_table_inline_autoincrement() {
        let stmt = CreateTableStatement::new("users")
            .add_column(ColumnDefinition::new("id", "bigint").primary_key().auto_increment())
            .add_column(ColumnDefinition::new("name", "varchar(50)").not_null());
        assert_eq!(
            create_table(&stmt, &ctx()).unwrap(),
            vec![
                "CREATE TABLE \"users\" (\n  \"id\" INTEGER PRIMARY KEY AUTOINCREMENT,\n  \"name\" VARCHAR(50) NOT NULL\n)"
            ]
        );
    }

    #[test]
    fn test_create_table_without_autoincrement_uses_table_constraint() {
        let stmt = CreateTableStatement::new("tags")
            .add_primary_key_column("post_id", "int")
            .add_primary_key_column("tag", "varchar(20)");
        assert_eq!(
            create_table(&stmt, &ctx()).unwrap(),
            vec![
                "CREATE TABLE \"tags\" (\n  \"post_id\" INTEGER NOT NULL,\n  \"tag\" VARCHAR(20) NOT NULL,\n  PRIMARY KEY (\"post_id\", \"tag\")\n)"
            ]
        );
    }

    #[test]
    fn test_attached_schema_qualifies_objects() {
        let table = TableRef::new("t").with_schema("aux");
        let stmt = CreateTableStatement::new(table.clone()).add_primary_key_column("id", "int");
        assert!(create_table(&stmt, &ctx()).unwrap()[0].starts_with("CREATE TABLE \"aux\".\"t\" ("));

        let stmt = CreateIndexStatement::new("idx_t_id", table, ["id"]).unique();
        assert_eq!(
            create_index(&stmt, &ctx()).unwrap(),
            vec!["CREATE UNIQUE INDEX \"aux\".\"idx_t_id\" ON \"t\" (\"id\")"]
        );
    }

    #[test]
    fn test_create_view_replace() {
        let stmt = CreateViewStatement::new("v", "SELECT 1").or_replace();
        assert_eq!(
            create_view(&stmt, &ctx()).unwrap(),
            vec!["DROP VIEW IF EXISTS \"v\"", "CREATE VIEW \"v\" AS SELECT 1"]
        );
    }
}
