// MaxDB用SQLジェネレーター
//
// MaxDBはカラムの変更を`ALTER TABLE t COLUMN c ...`の形で表します。

use super::standard::alter_table;
use super::{generator, EnginePredicate, GenerateResult, GeneratorContext, SqlGenerator};
use tidemark_core::core::engine::Dialect;
use tidemark_core::core::statement::{
    AddAutoIncrementStatement, AddDefaultValueStatement, DropDefaultValueStatement,
    SetNullableStatement,
};

pub fn generators() -> Vec<Box<dyn SqlGenerator>> {
    let maxdb = || EnginePredicate::engine(Dialect::MaxDB);

    vec![
        generator(maxdb(), add_auto_increment),
        generator(maxdb(), add_default_value),
        generator(maxdb(), drop_default_value),
        generator(maxdb(), set_nullable),
    ]
}

/// 自動採番付与SQLを生成
///
/// `DEFAULT SERIAL(n)`で開始値のみ指定できます。
fn add_auto_increment(stmt: &AddAutoIncrementStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    let serial = match stmt.start_with {
        Some(start) => format!("DEFAULT SERIAL({})", start),
        None => "DEFAULT SERIAL".to_string(),
    };
    Ok(vec![format!(
        "{} COLUMN {} {} {}",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.column_name),
        ctx.map_type(&stmt.column_data_type),
        serial
    )])
}

fn add_default_value(stmt: &AddDefaultValueStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "{} COLUMN {} ADD DEFAULT {}",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.column_name),
        ctx.default_value(&stmt.default_value)
    )])
}

fn drop_default_value(stmt: &DropDefaultValueStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "{} COLUMN {} DROP DEFAULT",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.column_name)
    )])
}

fn set_nullable(stmt: &SetNullableStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    let nullability = if stmt.nullable { "NULL" } else { "NOT NULL" };
    Ok(vec![format!(
        "{} COLUMN {} {}",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.column_name),
        nullability
    )])
}
