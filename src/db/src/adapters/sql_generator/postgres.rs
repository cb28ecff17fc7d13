// PostgreSQL用SQLジェネレーター
//
// 既定の生成結果とPostgreSQLの構文が異なる操作のみを扱います。

use super::standard::alter_table;
use super::{generator, EnginePredicate, GenerateResult, GeneratorContext, SqlGenerator};
use tidemark_core::core::engine::Dialect;
use tidemark_core::core::statement::{DropPrimaryKeyStatement, ModifyDataTypeStatement};

pub fn generators() -> Vec<Box<dyn SqlGenerator>> {
    let postgres = || EnginePredicate::engine(Dialect::PostgreSQL);

    vec![
        generator(postgres(), modify_data_type),
        generator(postgres(), drop_primary_key),
    ]
}

/// 型変更SQLを生成
///
/// 暗黙のキャストが存在しない型変換にも対応するため、`USING "column"::TYPE`を常に付けます。
fn modify_data_type(stmt: &ModifyDataTypeStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    let column = ctx.quote(&stmt.column_name);
    let new_type = ctx.map_type(&stmt.new_data_type);
    Ok(vec![format!(
        "{} ALTER COLUMN {} TYPE {} USING {}::{}",
        alter_table(ctx, &stmt.table),
        column,
        new_type,
        column,
        new_type
    )])
}

/// 主キー削除SQLを生成
///
/// 制約名の指定がなければPostgreSQLの命名規則（`<table>_pkey`）を使います。
fn drop_primary_key(stmt: &DropPrimaryKeyStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    let name = stmt
        .constraint_name
        .clone()
        .unwrap_or_else(|| format!("{}_pkey", stmt.table.name));
    Ok(vec![format!(
        "{} DROP CONSTRAINT {}",
        alter_table(ctx, &stmt.table),
        ctx.quote(&name)
    )])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_core::core::capability::CapabilityMatrix;
    use tidemark_core::core::statement::TableRef;

    fn ctx() -> GeneratorContext<'static> {
        GeneratorContext::new(
            CapabilityMatrix::global()
                .entry(&Dialect::PostgreSQL.id())
                .unwrap(),
        )
    }

    #[test]
    fn test_modify_data_type_with_using() {
        let stmt = ModifyDataTypeStatement::new("users", "age", "bigint");
        assert_eq!(
            modify_data_type(&stmt, &ctx()).unwrap(),
            vec!["ALTER TABLE \"users\" ALTER COLUMN \"age\" TYPE BIGINT USING \"age\"::BIGINT"]
        );
    }

    #[test]
    fn test_drop_primary_key_default_name() {
        let stmt = DropPrimaryKeyStatement::new(TableRef::new("users").with_schema("app"));
        assert_eq!(
            drop_primary_key(&stmt, &ctx()).unwrap(),
            vec!["ALTER TABLE \"app\".\"users\" DROP CONSTRAINT \"users_pkey\""]
        );
    }

    #[test]
    fn test_drop_primary_key_named() {
        let stmt = DropPrimaryKeyStatement::new("users").with_constraint_name("pk_users");
        assert_eq!(
            drop_primary_key(&stmt, &ctx()).unwrap(),
            vec!["ALTER TABLE \"users\" DROP CONSTRAINT \"pk_users\""]
        );
    }
}
