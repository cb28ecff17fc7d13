// MySQL用SQLジェネレーター
//
// 既定の生成結果とMySQLの構文が異なる操作のみを扱います。
// MySQLのALTER COLUMN系の多くはカラム定義全体を書き直すMODIFY句になるため、
// 型が指定されていない場合は検証エラーにします。

use super::standard::{alter_table, require_data_type};
use super::{generator, EnginePredicate, GenerateResult, GeneratorContext, SqlGenerator};
use tidemark_core::core::engine::Dialect;
use tidemark_core::core::operation::OperationKind;
use tidemark_core::core::statement::{
    AddAutoIncrementStatement, DropForeignKeyStatement, DropUniqueConstraintStatement,
    ModifyDataTypeStatement, RenameColumnStatement, RenameTableStatement, SetNullableStatement,
};

pub fn generators() -> Vec<Box<dyn SqlGenerator>> {
    let mysql = || EnginePredicate::engine(Dialect::MySQL);

    vec![
        generator(mysql(), rename_table),
        generator(mysql(), rename_column),
        generator(mysql(), modify_data_type),
        generator(mysql(), add_auto_increment),
        generator(mysql(), set_nullable),
        generator(mysql(), drop_foreign_key),
        generator(mysql(), drop_unique_constraint),
    ]
}

fn rename_table(stmt: &RenameTableStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "RENAME TABLE {} TO {}",
        ctx.table(&stmt.table),
        ctx.sibling(&stmt.table, &stmt.new_name)
    )])
}

/// カラム名変更SQLを生成
///
/// 型が分かっている場合はCHANGE句、なければRENAME COLUMN句を使います。
fn rename_column(stmt: &RenameColumnStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    let sql = match stmt.column_data_type.as_deref() {
        Some(data_type) => format!(
            "{} CHANGE {} {} {}",
            alter_table(ctx, &stmt.table),
            ctx.quote(&stmt.old_name),
            ctx.quote(&stmt.new_name),
            ctx.map_type(data_type)
        ),
        None => format!(
            "{} RENAME COLUMN {} TO {}",
            alter_table(ctx, &stmt.table),
            ctx.quote(&stmt.old_name),
            ctx.quote(&stmt.new_name)
        ),
    };
    Ok(vec![sql])
}

fn modify_data_type(stmt: &ModifyDataTypeStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "{} MODIFY {} {}",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.column_name),
        ctx.map_type(&stmt.new_data_type)
    )])
}

/// 自動採番付与SQLを生成
///
/// 開始値はテーブルオプションとして別の文で設定します。
/// 増分はサーバー変数`auto_increment_increment`でしか変えられません。
fn add_auto_increment(stmt: &AddAutoIncrementStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    let mut sql = vec![format!(
        "{} MODIFY {} {}",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.column_name),
        ctx.auto_increment_type(&stmt.column_data_type)
    )];
    if let Some(start) = stmt.start_with {
        sql.push(format!("{} AUTO_INCREMENT={}", alter_table(ctx, &stmt.table), start));
    }
    Ok(sql)
}

fn set_nullable(stmt: &SetNullableStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    let data_type = require_data_type(OperationKind::SetNullable, stmt.column_data_type.as_deref())?;
    let nullability = if stmt.nullable { "NULL" } else { "NOT NULL" };
    Ok(vec![format!(
        "{} MODIFY {} {} {}",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.column_name),
        ctx.map_type(data_type),
        nullability
    )])
}

fn drop_foreign_key(stmt: &DropForeignKeyStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "{} DROP FOREIGN KEY {}",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.constraint_name)
    )])
}

fn drop_unique_constraint(stmt: &DropUniqueConstraintStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "{} DROP INDEX {}",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.constraint_name)
    )])
}
