// Informix用SQLジェネレーター
//
// Informixはカラム定義全体を`MODIFY (c type ...)`で書き直し、
// 制約名は制約定義の後ろに`CONSTRAINT name`として置きます。

use super::standard::{alter_table, foreign_key_clause, require_data_type};
use super::{generator, EnginePredicate, GenerateResult, GeneratorContext, SqlGenerator};
use tidemark_core::core::engine::Dialect;
use tidemark_core::core::operation::OperationKind;
use tidemark_core::core::statement::{
    AddAutoIncrementStatement, AddDefaultValueStatement, AddForeignKeyStatement,
    AddPrimaryKeyStatement, AddUniqueConstraintStatement, DropColumnStatement,
    DropDefaultValueStatement, ModifyDataTypeStatement, SetNullableStatement,
};

pub fn generators() -> Vec<Box<dyn SqlGenerator>> {
    let informix = || EnginePredicate::engine(Dialect::Informix);

    vec![
        generator(informix(), drop_column),
        generator(informix(), modify_data_type),
        generator(informix(), add_auto_increment),
        generator(informix(), add_default_value),
        generator(informix(), drop_default_value),
        generator(informix(), set_nullable),
        generator(informix(), add_primary_key),
        generator(informix(), add_foreign_key),
        generator(informix(), add_unique_constraint),
    ]
}

/// 末尾に付ける制約名
fn constraint_suffix(ctx: &GeneratorContext<'_>, name: Option<&str>) -> String {
    name.map(|n| format!(" CONSTRAINT {}", ctx.quote(n)))
        .unwrap_or_default()
}

fn drop_column(stmt: &DropColumnStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "{} DROP {}",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.column_name)
    )])
}

fn modify_data_type(stmt: &ModifyDataTypeStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "{} MODIFY ({} {})",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.column_name),
        ctx.map_type(&stmt.new_data_type)
    )])
}

/// 自動採番付与SQLを生成
///
/// カラムをSERIAL（bigintはSERIAL8）に変更します。開始値は`SERIAL(n)`で指定します。
fn add_auto_increment(stmt: &AddAutoIncrementStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    let serial = ctx.auto_increment_type(&stmt.column_data_type);
    let serial = match stmt.start_with {
        Some(start) => format!("{}({})", serial, start),
        None => serial,
    };
    Ok(vec![format!(
        "{} MODIFY ({} {})",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.column_name),
        serial
    )])
}

fn add_default_value(stmt: &AddDefaultValueStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    let data_type = require_data_type(OperationKind::AddDefaultValue, stmt.column_data_type.as_deref())?;
    Ok(vec![format!(
        "{} MODIFY ({} {} DEFAULT {})",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.column_name),
        ctx.map_type(data_type),
        ctx.default_value(&stmt.default_value)
    )])
}

fn drop_default_value(stmt: &DropDefaultValueStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    let data_type = require_data_type(OperationKind::DropDefaultValue, stmt.column_data_type.as_deref())?;
    Ok(vec![format!(
        "{} MODIFY ({} {})",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.column_name),
        ctx.map_type(data_type)
    )])
}

fn set_nullable(stmt: &SetNullableStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    let data_type = require_data_type(OperationKind::SetNullable, stmt.column_data_type.as_deref())?;
    let not_null = if stmt.nullable { "" } else { " NOT NULL" };
    Ok(vec![format!(
        "{} MODIFY ({} {}{})",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.column_name),
        ctx.map_type(data_type),
        not_null
    )])
}

fn add_primary_key(stmt: &AddPrimaryKeyStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "{} ADD CONSTRAINT PRIMARY KEY ({}){}",
        alter_table(ctx, &stmt.table),
        ctx.quote_columns(&stmt.column_names),
        constraint_suffix(ctx, stmt.constraint_name.as_deref())
    )])
}

fn add_foreign_key(stmt: &AddForeignKeyStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "{} ADD CONSTRAINT {}{}",
        alter_table(ctx, &stmt.table),
        foreign_key_clause(stmt, ctx, false),
        constraint_suffix(ctx, Some(&stmt.constraint_name))
    )])
}

fn add_unique_constraint(stmt: &AddUniqueConstraintStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "{} ADD CONSTRAINT UNIQUE ({}){}",
        alter_table(ctx, &stmt.table),
        ctx.quote_columns(&stmt.column_names),
        constraint_suffix(ctx, stmt.constraint_name.as_deref())
    )])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_core::core::capability::CapabilityMatrix;
    use tidemark_core::core::statement::TableRef;

    fn ctx() -> GeneratorContext<'static> {
        GeneratorContext::new(CapabilityMatrix::global().entry(&Dialect::Informix.id()).unwrap())
    }

    #[test]
    fn test_add_auto_increment_serial() {
        let stmt = AddAutoIncrementStatement::new(TableRef::new("AddAutoIncTest"), "testCol", "int");
        assert_eq!(
            add_auto_increment(&stmt, &ctx()).unwrap(),
            vec!["ALTER TABLE \"AddAutoIncTest\" MODIFY (\"testCol\" SERIAL)"]
        );

        let stmt = AddAutoIncrementStatement::new(TableRef::new("t"), "id", "bigint").start_with(10);
        assert_eq!(
            add_auto_increment(&stmt, &ctx()).unwrap(),
            vec!["ALTER TABLE \"t\" MODIFY (\"id\" SERIAL8(10))"]
        );
    }

    #[test]
    fn test_add_primary_key_trailing_name() {
        let stmt = AddPrimaryKeyStatement::new("users", ["id"]).with_constraint_name("pk_users");
        assert_eq!(
            add_primary_key(&stmt, &ctx()).unwrap(),
            vec!["ALTER TABLE \"users\" ADD CONSTRAINT PRIMARY KEY (\"id\") CONSTRAINT \"pk_users\""]
        );
    }

    #[test]
    fn test_set_nullable_requires_type() {
        let stmt = SetNullableStatement::new("users", "email", false);
        assert!(set_nullable(&stmt, &ctx()).unwrap_err().is_validation());
    }
}
