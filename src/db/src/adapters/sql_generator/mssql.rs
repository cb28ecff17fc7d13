// SQL Server / Sybase ASE用SQLジェネレーター
//
// 名前変更はどちらも`sp_rename`で行います。
// SQL Serverの既定値は名前付き制約として管理されるため、削除時は制約名をカタログから引きます。

use super::standard::{alter_table, require_data_type};
use super::{generator, EnginePredicate, GenerateResult, GeneratorContext, SqlGenerator};
use tidemark_core::core::engine::Dialect;
use tidemark_core::core::operation::OperationKind;
use tidemark_core::core::statement::{
    AddDefaultValueStatement, CreateViewStatement, DropDefaultValueStatement,
    DropPrimaryKeyStatement, RenameColumnStatement, RenameTableStatement, SetNullableStatement,
    TableRef,
};

pub fn generators() -> Vec<Box<dyn SqlGenerator>> {
    let transact_sql = || EnginePredicate::family(&[Dialect::MSSQL, Dialect::Sybase]);
    let mssql = || EnginePredicate::engine(Dialect::MSSQL);

    vec![
        generator(transact_sql(), rename_table),
        generator(transact_sql(), rename_column),
        generator(mssql(), add_default_value),
        generator(mssql(), drop_default_value),
        generator(mssql(), set_nullable),
        generator(mssql(), drop_primary_key),
        generator(mssql(), create_view),
    ]
}

/// `sp_rename`に渡すオブジェクト名（クォートなし）
fn object_name(table: &TableRef) -> String {
    match &table.schema {
        Some(schema) => format!("{}.{}", schema, table.name),
        None => table.name.clone(),
    }
}

fn rename_table(stmt: &RenameTableStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "exec sp_rename {}, {}",
        ctx.literal(&object_name(&stmt.table)),
        ctx.literal(&stmt.new_name)
    )])
}

fn rename_column(stmt: &RenameColumnStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    let column = format!("{}.{}", object_name(&stmt.table), stmt.old_name);
    Ok(vec![format!(
        "exec sp_rename {}, {}, 'COLUMN'",
        ctx.literal(&column),
        ctx.literal(&stmt.new_name)
    )])
}

fn add_default_value(stmt: &AddDefaultValueStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    let constraint = format!("DF_{}_{}", stmt.table.name, stmt.column_name);
    Ok(vec![format!(
        "{} ADD CONSTRAINT {} DEFAULT {} FOR {}",
        alter_table(ctx, &stmt.table),
        ctx.quote(&constraint),
        ctx.default_value(&stmt.default_value),
        ctx.quote(&stmt.column_name)
    )])
}

fn drop_default_value(stmt: &DropDefaultValueStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    let table = ctx.table(&stmt.table);
    Ok(vec![format!(
        "DECLARE @sql nvarchar(max); \
         SELECT @sql = N'ALTER TABLE {table} DROP CONSTRAINT ' + QUOTENAME(df.name) \
         FROM sys.default_constraints df \
         INNER JOIN sys.columns c ON c.object_id = df.parent_object_id AND c.column_id = df.parent_column_id \
         WHERE df.parent_object_id = OBJECT_ID(N{object}) AND c.name = N{column}; \
         EXEC sp_executesql @sql",
        table = table.replace('\'', "''"),
        object = ctx.literal(&object_name(&stmt.table)),
        column = ctx.literal(&stmt.column_name),
    )])
}

fn set_nullable(stmt: &SetNullableStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    let data_type = require_data_type(OperationKind::SetNullable, stmt.column_data_type.as_deref())?;
    let nullability = if stmt.nullable { "NULL" } else { "NOT NULL" };
    Ok(vec![format!(
        "{} ALTER COLUMN {} {} {}",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.column_name),
        ctx.map_type(data_type),
        nullability
    )])
}

/// 主キー削除SQLを生成
///
/// 制約名の指定がなければ`sys.key_constraints`から引きます。
fn drop_primary_key(stmt: &DropPrimaryKeyStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    let table = ctx.table(&stmt.table);
    let sql = match &stmt.constraint_name {
        Some(name) => format!("ALTER TABLE {} DROP CONSTRAINT {}", table, ctx.quote(name)),
        None => format!(
            "DECLARE @sql nvarchar(max); \
             SELECT @sql = N'ALTER TABLE {table} DROP CONSTRAINT ' + QUOTENAME(name) \
             FROM sys.key_constraints \
             WHERE type = 'PK' AND parent_object_id = OBJECT_ID(N{object}); \
             EXEC sp_executesql @sql",
            table = table.replace('\'', "''"),
            object = ctx.literal(&object_name(&stmt.table)),
        ),
    };
    Ok(vec![sql])
}

fn create_view(stmt: &CreateViewStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    let create = if stmt.replace_if_exists {
        "CREATE OR ALTER VIEW"
    } else {
        "CREATE VIEW"
    };
    Ok(vec![format!(
        "{} {} AS {}",
        create,
        ctx.table(&stmt.view),
        stmt.select_query.trim()
    )])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_core::core::capability::CapabilityMatrix;
    use tidemark_core::core::statement::DefaultValue;

    fn ctx(dialect: Dialect) -> GeneratorContext<'static> {
        GeneratorContext::new(CapabilityMatrix::global().entry(&dialect.id()).unwrap())
    }

    #[test]
    fn test_rename_table_uses_sp_rename() {
        let stmt = RenameTableStatement::new(TableRef::new("users").with_schema("dbo"), "members");
        assert_eq!(
            rename_table(&stmt, &ctx(Dialect::MSSQL)).unwrap(),
            vec!["exec sp_rename 'dbo.users', 'members'"]
        );
        assert_eq!(
            rename_table(&stmt, &ctx(Dialect::Sybase)).unwrap(),
            vec!["exec sp_rename 'dbo.users', 'members'"]
        );
    }

    #[test]
    fn test_rename_column() {
        let stmt = RenameColumnStatement::new("users", "name", "full_name");
        assert_eq!(
            rename_column(&stmt, &ctx(Dialect::MSSQL)).unwrap(),
            vec!["exec sp_rename 'users.name', 'full_name', 'COLUMN'"]
        );
    }

    #[test]
    fn test_add_default_value_named_constraint() {
        let stmt = AddDefaultValueStatement::new("users", "active", DefaultValue::Boolean(false));
        assert_eq!(
            add_default_value(&stmt, &ctx(Dialect::MSSQL)).unwrap(),
            vec!["ALTER TABLE [users] ADD CONSTRAINT [DF_users_active] DEFAULT 0 FOR [active]"]
        );
    }

    #[test]
    fn test_drop_default_value_looks_up_constraint() {
        let stmt = DropDefaultValueStatement::new("users", "active");
        let sql = drop_default_value(&stmt, &ctx(Dialect::MSSQL)).unwrap();
        assert_eq!(sql.len(), 1);
        assert!(sql[0].contains("sys.default_constraints"));
        assert!(sql[0].contains("OBJECT_ID(N'users')"));
        assert!(sql[0].contains("c.name = N'active'"));
    }

    #[test]
    fn test_set_nullable_requires_type() {
        let stmt = SetNullableStatement::new("users", "email", true);
        assert!(set_nullable(&stmt, &ctx(Dialect::MSSQL)).unwrap_err().is_validation());

        let stmt = stmt.with_data_type("varchar(100)");
        assert_eq!(
            set_nullable(&stmt, &ctx(Dialect::MSSQL)).unwrap(),
            vec!["ALTER TABLE [users] ALTER COLUMN [email] VARCHAR(100) NULL"]
        );
    }

    #[test]
    fn test_create_view_or_alter() {
        let stmt = CreateViewStatement::new("v_users", "SELECT id FROM users").or_replace();
        assert_eq!(
            create_view(&stmt, &ctx(Dialect::MSSQL)).unwrap(),
            vec!["CREATE OR ALTER VIEW [v_users] AS SELECT id FROM users"]
        );
    }
}
