// Sybase ASE用SQLジェネレーター

use super::standard::{self, alter_table};
use super::{generator, EnginePredicate, GenerateResult, GeneratorContext, SqlGenerator};
use tidemark_core::core::engine::Dialect;
use tidemark_core::core::error::ValidationError;
use tidemark_core::core::operation::OperationKind;
use tidemark_core::core::statement::{
    AddDefaultValueStatement, CreateViewStatement, DropDefaultValueStatement, DropIndexStatement,
    DropPrimaryKeyStatement, SetNullableStatement,
};

pub fn generators() -> Vec<Box<dyn SqlGenerator>> {
    let sybase = || EnginePredicate::engine(Dialect::Sybase);

    vec![
        generator(sybase(), add_default_value),
        generator(sybase(), drop_default_value),
        generator(sybase(), set_nullable),
        generator(sybase(), drop_primary_key),
        generator(sybase(), drop_index),
        generator(sybase(), create_view),
    ]
}

fn add_default_value(stmt: &AddDefaultValueStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "{} REPLACE {} DEFAULT {}",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.column_name),
        ctx.default_value(&stmt.default_value)
    )])
}

fn drop_default_value(stmt: &DropDefaultValueStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "{} REPLACE {} DEFAULT NULL",
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

fn drop_primary_key(stmt: &DropPrimaryKeyStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
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

fn drop_index(stmt: &DropIndexStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "DROP INDEX {}.{}",
        ctx.table(&stmt.table),
        ctx.quote(&stmt.index_name)
    )])
}

/// ビュー作成SQLを生成
///
/// 置き換え時は既存のビューを条件付きで削除してから作成します。
fn create_view(stmt: &CreateViewStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    let plain = CreateViewStatement {
        replace_if_exists: false,
        ..stmt.clone()
    };
    let mut sql = Vec::new();
    if stmt.replace_if_exists {
        let view = ctx.table(&stmt.view);
        sql.push(format!(
            "IF OBJECT_ID({}) IS NOT NULL DROP VIEW {}",
            ctx.literal(&view),
            view
        ));
    }
    sql.extend(standard::create_view(&plain, ctx)?);
    Ok(sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_core::core::capability::CapabilityMatrix;
    use tidemark_core::core::statement::DefaultValue;

    fn ctx() -> GeneratorContext<'static> {
        GeneratorContext::new(CapabilityMatrix::global().entry(&Dialect::Sybase.id()).unwrap())
    }

    #[test]
    fn test_add_default_value() {
        let stmt = AddDefaultValueStatement::new("users", "score", DefaultValue::Numeric("0".to_string()));
        assert_eq!(
            add_default_value(&stmt, &ctx()).unwrap(),
            vec!["ALTER TABLE [users] REPLACE [score] DEFAULT 0"]
        );
    }

    #[test]
    fn test_drop_index() {
        let stmt = DropIndexStatement::new("idx_users_email", "users");
        assert_eq!(
            drop_index(&stmt, &ctx()).unwrap(),
            vec!["DROP INDEX [users].[idx_users_email]"]
        );
    }

    #[test]
    fn test_create_view_replace() {
        let stmt = CreateViewStatement::new("v", "SELECT 1").or_replace();
        assert_eq!(
            create_view(&stmt, &ctx()).unwrap(),
            vec!["IF OBJECT_ID('[v]') IS NOT NULL DROP VIEW [v]", "CREATE VIEW [v] AS SELECT 1"]
        );
    }
}
