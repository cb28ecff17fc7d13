// 既定のSQLジェネレーター
//
// すべての操作についてANSI寄りのSQLを生成します。
// 方言固有のジェネレーターが登録されていないエンジンはここに落ちます。

use super::{generator, EnginePredicate, GenerateResult, GeneratorContext, SqlGenerator};
use tidemark_core::core::engine::Dialect;
use tidemark_core::core::error::ValidationError;
use tidemark_core::core::operation::OperationKind;
use tidemark_core::core::statement::{
    AddAutoIncrementStatement, AddColumnStatement, AddDefaultValueStatement,
    AddForeignKeyStatement, AddPrimaryKeyStatement, AddUniqueConstraintStatement,
    CreateIndexStatement, CreateSequenceStatement, CreateTableStatement, CreateViewStatement,
    DropColumnStatement, DropDefaultValueStatement, DropForeignKeyStatement, DropIndexStatement,
    DropPrimaryKeyStatement, DropSequenceStatement, DropTableStatement,
    DropUniqueConstraintStatement, DropViewStatement, ModifyDataTypeStatement, RawSqlStatement,
    RenameColumnStatement, RenameTableStatement, SetNullableStatement, TableRef,
};

pub fn generators() -> Vec<Box<dyn SqlGenerator>> {
    use EnginePredicate::Any;

    vec![
        generator(Any, create_table),
        generator(Any, drop_table),
        generator(Any, rename_table),
        generator(Any, add_column),
        generator(Any, drop_column),
        generator(Any, rename_column),
        generator(Any, modify_data_type),
        generator(Any, add_auto_increment),
        generator(Any, add_default_value),
        generator(Any, drop_default_value),
        generator(Any, set_nullable),
        generator(Any, add_primary_key),
        generator(Any, drop_primary_key),
        generator(Any, add_foreign_key),
        generator(Any, drop_foreign_key),
        generator(Any, add_unique_constraint),
        generator(Any, drop_unique_constraint),
        generator(Any, create_index),
        generator(Any, drop_index),
        generator(Any, create_view),
        generator(Any, drop_view),
        generator(Any, create_sequence),
        generator(Any, drop_sequence),
        generator(Any, raw_sql),
        // 複数の方言で共通の構文
        generator(
            EnginePredicate::family(&[Dialect::DB2, Dialect::Derby, Dialect::Informix, Dialect::MaxDB]),
            rename_table_statement,
        ),
        generator(
            EnginePredicate::family(&[Dialect::Derby, Dialect::Informix, Dialect::MaxDB]),
            rename_column_statement,
        ),
        generator(
            EnginePredicate::family(&[Dialect::H2, Dialect::HSQLDB]),
            alter_column_rename,
        ),
        generator(
            EnginePredicate::family(&[Dialect::Oracle, Dialect::MaxDB, Dialect::Sybase]),
            modify_column_type,
        ),
        generator(
            EnginePredicate::family(&[Dialect::MSSQL, Dialect::H2]),
            alter_column_type,
        ),
        generator(
            EnginePredicate::family(&[
                Dialect::SQLite,
                Dialect::MSSQL,
                Dialect::Sybase,
                Dialect::Firebird,
                Dialect::Derby,
                Dialect::DB2,
            ]),
            drop_table_without_cascade,
        ),
        generator(
            EnginePredicate::family(&[Dialect::MySQL, Dialect::MSSQL, Dialect::MaxDB]),
            drop_index_on_table,
        ),
        generator(
            EnginePredicate::family(&[Dialect::Derby, Dialect::Firebird, Dialect::Informix]),
            drop_named_primary_key,
        ),
    ]
}

/// `ALTER TABLE <table>`
pub(crate) fn alter_table(ctx: &GeneratorContext<'_>, table: &TableRef) -> String {
    format!("ALTER TABLE {}", ctx.table(table))
}

/// 型が必要な構文で、型が指定されていない場合のエラー
pub(crate) fn require_data_type<'a>(
    operation: OperationKind,
    data_type: Option<&'a str>,
) -> Result<&'a str, ValidationError> {
    data_type
        .filter(|t| !t.trim().is_empty())
        .ok_or(ValidationError::missing(operation, "column_data_type"))
}

/// CREATE TABLE文を生成
///
/// `inline_primary_key`が真の場合は主キーをカラム定義に含め、テーブル制約を出力しません。
pub(crate) fn create_table_sql(
    stmt: &CreateTableStatement,
    ctx: &GeneratorContext<'_>,
    inline_primary_key: bool,
) -> String {
    let mut parts: Vec<String> = stmt
        .columns
        .iter()
        .map(|c| ctx.column_definition(c, inline_primary_key))
        .collect();

    let pk_columns: Vec<String> = stmt
        .primary_key_columns()
        .into_iter()
        .map(str::to_string)
        .collect();
    if !inline_primary_key && !pk_columns.is_empty() {
        let constraint = match &stmt.primary_key_name {
            Some(name) => format!("CONSTRAINT {} ", ctx.quote(name)),
            None => String::new(),
        };
        parts.push(format!(
            "{}PRIMARY KEY ({})",
            constraint,
            ctx.quote_columns(&pk_columns)
        ));
    }

    format!(
        "CREATE TABLE {} (\n  {}\n)",
        ctx.table(&stmt.table),
        parts.join(",\n  ")
    )
}

fn create_table(stmt: &CreateTableStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![create_table_sql(stmt, ctx, false)])
}

fn drop_table(stmt: &DropTableStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    let cascade = if stmt.cascade_constraints { " CASCADE" } else { "" };
    Ok(vec![format!("DROP TABLE {}{}", ctx.table(&stmt.table), cascade)])
}

fn drop_table_without_cascade(stmt: &DropTableStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!("DROP TABLE {}", ctx.table(&stmt.table))])
}

fn rename_table(stmt: &RenameTableStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "{} RENAME TO {}",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.new_name)
    )])
}

fn rename_table_statement(stmt: &RenameTableStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "RENAME TABLE {} TO {}",
        ctx.table(&stmt.table),
        ctx.quote(&stmt.new_name)
    )])
}

fn add_column(stmt: &AddColumnStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "{} ADD {}",
        alter_table(ctx, &stmt.table),
        ctx.column_definition(&stmt.column, true)
    )])
}

fn drop_column(stmt: &DropColumnStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "{} DROP COLUMN {}",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.column_name)
    )])
}

fn rename_column(stmt: &RenameColumnStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "{} RENAME COLUMN {} TO {}",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.old_name),
        ctx.quote(&stmt.new_name)
    )])
}

fn rename_column_statement(stmt: &RenameColumnStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "RENAME COLUMN {}.{} TO {}",
        ctx.table(&stmt.table),
        ctx.quote(&stmt.old_name),
        ctx.quote(&stmt.new_name)
    )])
}

fn alter_column_rename(stmt: &RenameColumnStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "{} ALTER COLUMN {} RENAME TO {}",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.old_name),
        ctx.quote(&stmt.new_name)
    )])
}

fn modify_data_type(stmt: &ModifyDataTypeStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "{} ALTER COLUMN {} SET DATA TYPE {}",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.column_name),
        ctx.map_type(&stmt.new_data_type)
    )])
}

fn modify_column_type(stmt: &ModifyDataTypeStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "{} MODIFY {} {}",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.column_name),
        ctx.map_type(&stmt.new_data_type)
    )])
}

fn alter_column_type(stmt: &ModifyDataTypeStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "{} ALTER COLUMN {} {}",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.column_name),
        ctx.map_type(&stmt.new_data_type)
    )])
}

fn add_auto_increment(stmt: &AddAutoIncrementStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "{} MODIFY {} {}",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.column_name),
        ctx.auto_increment_type(&stmt.column_data_type)
    )])
}

fn add_default_value(stmt: &AddDefaultValueStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "{} ALTER COLUMN {} SET DEFAULT {}",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.column_name),
        ctx.default_value(&stmt.default_value)
    )])
}

fn drop_default_value(stmt: &DropDefaultValueStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "{} ALTER COLUMN {} DROP DEFAULT",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.column_name)
    )])
}

fn set_nullable(stmt: &SetNullableStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    let action = if stmt.nullable { "DROP NOT NULL" } else { "SET NOT NULL" };
    Ok(vec![format!(
        "{} ALTER COLUMN {} {}",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.column_name),
        action
    )])
}

fn add_primary_key(stmt: &AddPrimaryKeyStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    let constraint = match &stmt.constraint_name {
        Some(name) => format!("CONSTRAINT {} ", ctx.quote(name)),
        None => String::new(),
    };
    Ok(vec![format!(
        "{} ADD {}PRIMARY KEY ({})",
        alter_table(ctx, &stmt.table),
        constraint,
        ctx.quote_columns(&stmt.column_names)
    )])
}

fn drop_primary_key(stmt: &DropPrimaryKeyStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!("{} DROP PRIMARY KEY", alter_table(ctx, &stmt.table))])
}

fn drop_named_primary_key(stmt: &DropPrimaryKeyStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    let name = stmt
        .constraint_name
        .as_deref()
        .ok_or(ValidationError::missing(OperationKind::DropPrimaryKey, "constraint_name"))?;
    Ok(vec![format!(
        "{} DROP CONSTRAINT {}",
        alter_table(ctx, &stmt.table),
        ctx.quote(name)
    )])
}

/// FOREIGN KEY句（制約名を除く）
pub(crate) fn foreign_key_clause(
    stmt: &AddForeignKeyStatement,
    ctx: &GeneratorContext<'_>,
    with_on_update: bool,
) -> String {
    let mut sql = format!(
        "FOREIGN KEY ({}) REFERENCES {} ({})",
        ctx.quote_columns(&stmt.column_names),
        ctx.table(&stmt.referenced_table),
        ctx.quote_columns(&stmt.referenced_column_names)
    );
    if let Some(action) = stmt.on_delete {
        sql.push_str(&format!(" ON DELETE {}", action.as_sql()));
    }
    if with_on_update {
        if let Some(action) = stmt.on_update {
            sql.push_str(&format!(" ON UPDATE {}", action.as_sql()));
        }
    }
    sql
}

fn add_foreign_key(stmt: &AddForeignKeyStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "{} ADD CONSTRAINT {} {}",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.constraint_name),
        foreign_key_clause(stmt, ctx, true)
    )])
}

fn drop_foreign_key(stmt: &DropForeignKeyStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "{} DROP CONSTRAINT {}",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.constraint_name)
    )])
}

fn add_unique_constraint(stmt: &AddUniqueConstraintStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    let constraint = match &stmt.constraint_name {
        Some(name) => format!("CONSTRAINT {} ", ctx.quote(name)),
        None => String::new(),
    };
    Ok(vec![format!(
        "{} ADD {}UNIQUE ({})",
        alter_table(ctx, &stmt.table),
        constraint,
        ctx.quote_columns(&stmt.column_names)
    )])
}

fn drop_unique_constraint(stmt: &DropUniqueConstraintStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "{} DROP CONSTRAINT {}",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.constraint_name)
    )])
}

fn create_index(stmt: &CreateIndexStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    let unique = if stmt.unique { "UNIQUE " } else { "" };
    Ok(vec![format!(
        "CREATE {}INDEX {} ON {} ({})",
        unique,
        ctx.quote(&stmt.index_name),
        ctx.table(&stmt.table),
        ctx.quote_columns(&stmt.column_names)
    )])
}

fn drop_index(stmt: &DropIndexStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "DROP INDEX {}",
        ctx.sibling(&stmt.table, &stmt.index_name)
    )])
}

fn drop_index_on_table(stmt: &DropIndexStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "DROP INDEX {} ON {}",
        ctx.quote(&stmt.index_name),
        ctx.table(&stmt.table)
    )])
}

pub(crate) fn create_view(stmt: &CreateViewStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    let replace = if stmt.replace_if_exists { "OR REPLACE " } else { "" };
    Ok(vec![format!(
        "CREATE {}VIEW {} AS {}",
        replace,
        ctx.table(&stmt.view),
        stmt.select_query.trim()
    )])
}


fn drop_view(stmt: &DropViewStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!("DROP VIEW {}", ctx.table(&stmt.view))])
}

pub(crate) fn create_sequence(stmt: &CreateSequenceStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    let mut sql = format!("CREATE SEQUENCE {}", ctx.table(&stmt.sequence));
    if let Some(start) = stmt.start_value {
        sql.push_str(&format!(" START WITH {}", start));
    }
    if let Some(increment) = stmt.increment_by {
        sql.push_str(&format!(" INCREMENT BY {}", increment));
    }
    if let Some(min) = stmt.min_value {
        sql.push_str(&format!(" MINVALUE {}", min));
    }
    if let Some(max) = stmt.max_value {
        sql.push_str(&format!(" MAXVALUE {}", max));
    }
    if stmt.cycle {
        sql.push_str(" CYCLE");
    }
    Ok(vec![sql])
}

fn drop_sequence(stmt: &DropSequenceStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!("DROP SEQUENCE {}", ctx.table(&stmt.sequence))])
}

fn raw_sql(stmt: &RawSqlStatement, _ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(stmt.statements())
}
