// Firebird用SQLジェネレーター

use super::standard::alter_table;
use super::{generator, EnginePredicate, GenerateResult, GeneratorContext, SqlGenerator};
use tidemark_core::core::engine::Dialect;
use tidemark_core::core::statement::{
    CreateViewStatement, ModifyDataTypeStatement, RenameColumnStatement,
};

pub fn generators() -> Vec<Box<dyn SqlGenerator>> {
    let firebird = || EnginePredicate::engine(Dialect::Firebird);

    vec![
        generator(firebird(), rename_column),
        generator(firebird(), modify_data_type),
        generator(firebird(), create_view),
    ]
}

fn rename_column(stmt: &RenameColumnStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "{} ALTER COLUMN {} TO {}",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.old_name),
        ctx.quote(&stmt.new_name)
    )])
}

fn modify_data_type(stmt: &ModifyDataTypeStatement, ctx: &GeneratorContext<'_>) -> GenerateResult {
    Ok(vec![format!(
        "{} ALTER COLUMN {} TYPE {}",
        alter_table(ctx, &stmt.table),
        ctx.quote(&stmt.column_name),
        ctx.map_type(&stmt.new_data_type)
    )])
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
    use tidemark_core::core::statement::TableRef;

    fn ctx() -> GeneratorContext<'static> {
        GeneratorContext::new(CapabilityMatrix::global().entry(&Dialect::Firebird.id()).unwrap())
    }

    #[test]
    fn test_rename_column() {
        let stmt = RenameColumnStatement::new(TableRef::new("USERS"), "NAME", "FULL_NAME");
        assert_eq!(
            rename_column(&stmt, &ctx()).unwrap(),
            vec!["ALTER TABLE \"USERS\" ALTER COLUMN \"NAME\" TO \"FULL_NAME\""]
        );
    }
}
