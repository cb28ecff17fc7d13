// DB2 / Apache Derby用SQLジェネレーター
//
// DB2ではカラム定義を変更するALTER TABLEの後にREORGが必要になるため、
// 該当する操作はREORGの呼び出しを続けて出力します。

use super::standard::alter_table;
use super::{generator, EnginePredicate, GenerateResult, GeneratorContext, SqlGenerator};
use tidemark_core::core::engine::Dialect;
use tidemark_core::core::statement::{
    AddAutoIncrementStatement, DropColumnStatement, ModifyDataTypeStatement, SetNullableStatement,
    TableRef,
};

pub fn generators() -> Vec<Box<dyn SqlGenerator>> {
    let db2 = || EnginePredicate::engine(Dialect::DB2);
    let derby = || EnginePredicate::engine(Dialect::Derby);

    vec![
        generator(db2(), drop_column),
        generator(db2(), modify_data_type),
        generator(db2(), set_nullable),
        generator(db2(), add_auto_increment),
        generator(derby(), derby_set_nullable),
    ]
}

/// REORG TABLEの呼び出し
fn reorg(ctx: &GeneratorContext<'_>, table: &TableRef) -> String {
    format!(
        "CALL SYSPROC.ADMIN_CMD ({})",
        ctx.literal(&format!("REORG TABLE {}", ctx.table(table)))
    )
}

fn drop_column(stmt: &DropColumnStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![
        format!(
            "{} DROP COLUMN {}",
            alter_table(ctx, &stmt.table),
            ctx.quote(&stmt.column_name)
        ),
        reorg(ctx, &stmt.table),
    ])
}

fn modify_data_type(stmt: &ModifyDataTypeStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![
        format!(
            "{} ALTER COLUMN {} SET DATA TYPE {}",
            alter_table(ctx, &stmt.table),
            ctx.quote(&stmt.column_name),
            ctx.map_type(&stmt.new_data_type)
        ),
        reorg(ctx, &stmt.table),
    ])
}

fn set_nullable(stmt: &SetNullableStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    let action = if stmt.nullable { "DROP NOT NULL" } else { "SET NOT NULL" };
    Ok(vec![
        format!(
            "{} ALTER COLUMN {} {}",
            alter_table(ctx, &stmt.table),
            ctx.quote(&stmt.column_name),
            action
        ),
        reorg(ctx, &stmt.table),
    ])
}

/// IDENTITYのオプション句（`START WITH n INCREMENT BY m`）
pub(crate) fn identity_options(stmt: &AddAutoIncrementStatement, separator: &str) -> Option<String> {
    let mut options = Vec::new();
    if let Some(start) = stmt.start_with {
        options.push(format!("START WITH {}", start));
    }
    if let Some(increment) = stmt.increment_by {
        options.push(format!("INCREMENT BY {}", increment));
    }
    if options.is_empty() {
        None
    } else {
        Some(format!("({})", options.join(separator)))
    }
}

fn add_auto_increment(stmt: &AddAutoIncrementStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    let mut sql = format!(
        "{} ALTER COLUMN {} SET GENERATED BY DEFAULT AS IDENTITY",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.column_name)
    );
    if let Some(options) = identity_options(stmt, " ") {
        sql.push(' ');
        sql.push_str(&options);
    }
    Ok(vec![sql, reorg(ctx, &stmt.table)])
}

fn derby_set_nullable(stmt: &SetNullableStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    let nullability = if stmt.nullable { "NULL" } else { "NOT NULL" };
    Ok(vec![format!(
        "{} ALTER COLUMN {} {}",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.column_name),
        nullability
    )])
}
