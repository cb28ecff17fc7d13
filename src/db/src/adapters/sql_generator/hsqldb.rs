// HyperSQL用SQLジェネレーター

use super::db2::identity_options;
use super::standard::alter_table;
use super::{generator, EnginePredicate, GenerateResult, GeneratorContext, SqlGenerator};
use tidemark_core::core::engine::Dialect;
use tidemark_core::core::statement::{AddAutoIncrementStatement, SetNullableStatement};

pub fn generators() -> Vec<Box<dyn SqlGenerator>> {
    let hsqldb = || EnginePredicate::engine(Dialect::HSQLDB);

    vec![
        generator(hsqldb(), add_auto_increment),
        generator(hsqldb(), set_nullable),
    ]
}

fn add_auto_increment(stmt: &AddAutoIncrementStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    let mut sql = format!(
        "{} ALTER COLUMN {} {}",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.column_name),
        ctx.auto_increment_type(&stmt.column_data_type)
    );
    if let Some(options) = identity_options(stmt, ", ") {
        sql.push(' ');
        sql.push_str(&options);
    }
    Ok(vec![sql])
}

fn set_nullable(stmt: &SetNullableStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    let action = if stmt.nullable { "SET NULL" } else { "SET NOT NULL" };
    Ok(vec![format!(
        "{} ALTER COLUMN {} {}",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.column_name),
        action
    )])
}
