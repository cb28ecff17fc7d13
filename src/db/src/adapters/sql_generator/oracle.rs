// Oracle用SQLジェネレーター

use super::standard::{alter_table, foreign_key_clause};
use super::{generator, EnginePredicate, GenerateResult, GeneratorContext, SqlGenerator};
use tidemark_core::core::engine::Dialect;
use tidemark_core::core::statement::{
    AddDefaultValueStatement, AddForeignKeyStatement, DropDefaultValueStatement,
    DropTableStatement, SetNullableStatement,
};

pub fn generators() -> Vec<Box<dyn SqlGenerator>> {
    let oracle = || EnginePredicate::engine(Dialect::Oracle);

    vec![
        generator(oracle(), drop_table),
        generator(oracle(), add_default_value),
        generator(oracle(), drop_default_value),
        generator(oracle(), set_nullable),
        generator(oracle(), add_foreign_key),
    ]
}

fn drop_table(stmt: &DropTableStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    let cascade = if stmt.cascade_constraints {
        " CASCADE CONSTRAINTS"
    } else {
        ""
    };
    Ok(vec![format!("DROP TABLE {}{}", ctx.table(&stmt.table), cascade)])
}

fn add_default_value(stmt: &AddDefaultValueStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "{} MODIFY {} DEFAULT {}",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.column_name),
        ctx.default_value(&stmt.default_value)
    )])
}

// Oracleには既定値を削除する構文がない
fn drop_default_value(stmt: &DropDefaultValueStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "{} MODIFY {} DEFAULT NULL",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.column_name)
    )])
}

fn set_nullable(stmt: &SetNullableStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    let nullability = if stmt.nullable { "NULL" } else { "NOT NULL" };
    Ok(vec![format!(
        "{} MODIFY {} {}",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.column_name),
        nullability
    )])
}

fn add_foreign_key(stmt: &AddForeignKeyStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "{} ADD CONSTRAINT {} {}",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.constraint_name),
        foreign_key_clause(stmt, ctx, false)
    )])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_core::core::capability::CapabilityMatrix;
    use tidemark_core::core::statement::DefaultValue;

    fn ctx() -> GeneratorContext<'static> {
        GeneratorContext::new(CapabilityMatrix::global().entry(&Dialect::Oracle.id()).unwrap())
    }

    #[test]
    fn test_drop_table_cascade_constraints() {
        let stmt = DropTableStatement::new("ORDERS").cascade();
        assert_eq!(
            drop_table(&stmt, &ctx()).unwrap(),
            vec!["DROP TABLE \"ORDERS\" CASCADE CONSTRAINTS"]
        );
    }

    #[test]
    fn test_default_value_uses_numeric_boolean() {
        let stmt = AddDefaultValueStatement::new("USERS", "ACTIVE", DefaultValue::Boolean(true));
        assert_eq!(
            add_default_value(&stmt, &ctx()).unwrap(),
            vec!["ALTER TABLE \"USERS\" MODIFY \"ACTIVE\" DEFAULT 1"]
        );
    }
}
