// 組み込みエンジンのケイパビリティ定義

use super::{
    AddressingStyle, AutoIncrementStyle, CapabilityEntry, CaseFolding, IdentifierQuote,
    MetadataStyle, ParamRule, SyntaxFeature, TypeRule,
};
use crate::core::engine::Dialect;
use crate::core::operation::OperationKind;
use std::collections::BTreeMap;

use OperationKind::*;
use ParamRule::{DefaultTo, Drop, Fixed, Keep};
use SyntaxFeature::*;

/// ANSI寄りの型テーブル
///
/// 各エンジンはこのテーブルを起点に差分だけを上書きします。
pub(super) fn ansi_type_table() -> BTreeMap<String, TypeRule> {
    let rules: [(&str, &str, ParamRule); 25] = [
        ("int", "INTEGER", Drop),
        ("integer", "INTEGER", Drop),
        ("smallint", "SMALLINT", Drop),
        ("tinyint", "SMALLINT", Drop),
        ("bigint", "BIGINT", Drop),
        ("boolean", "BOOLEAN", Drop),
        ("bool", "BOOLEAN", Drop),
        ("varchar", "VARCHAR", DefaultTo("255".to_string())),
        ("nvarchar", "NVARCHAR", DefaultTo("255".to_string())),
        ("char", "CHAR", Keep),
        ("nchar", "NCHAR", Keep),
        ("text", "CLOB", Drop),
        ("clob", "CLOB", Drop),
        ("blob", "BLOB", Drop),
        ("decimal", "DECIMAL", Keep),
        ("numeric", "DECIMAL", Keep),
        ("float", "FLOAT", Keep),
        ("double", "DOUBLE", Drop),
        ("date", "DATE", Drop),
        ("time", "TIME", Drop),
        ("datetime", "TIMESTAMP", Drop),
        ("timestamp", "TIMESTAMP", Keep),
        ("uuid", "CHAR", Fixed("36".to_string())),
        ("currency", "DECIMAL", Fixed("19, 2".to_string())),
        ("json", "CLOB", Drop),
    ];
    rules
        .into_iter()
        .map(|(token, native, params)| (token.to_string(), TypeRule::new(native, params)))
        .collect()
}

fn default_to(value: &str) -> ParamRule {
    DefaultTo(value.to_string())
}

fn fixed(value: &str) -> ParamRule {
    Fixed(value.to_string())
}

/// 組み込みエンジンのエントリをすべて作成
pub(super) fn entries() -> Vec<CapabilityEntry> {
    Dialect::ALL.into_iter().map(entry).collect()
}

fn entry(dialect: Dialect) -> CapabilityEntry {
    match dialect {
        Dialect::PostgreSQL => postgresql(),
        Dialect::MySQL => mysql(),
        Dialect::SQLite => sqlite(),
        Dialect::Oracle => oracle(),
        Dialect::MSSQL => mssql(),
        Dialect::DB2 => db2(),
        Dialect::Derby => derby(),
        Dialect::H2 => h2(),
        Dialect::HSQLDB => hsqldb(),
        Dialect::Firebird => firebird(),
        Dialect::Sybase => sybase(),
        Dialect::MaxDB => maxdb(),
        Dialect::Informix => informix(),
        Dialect::Cache => cache(),
    }
}

fn postgresql() -> CapabilityEntry {
    CapabilityEntry::new(Dialect::PostgreSQL, "PostgreSQL")
        .without_operations(&[AddAutoIncrement])
        .with_case_folding(CaseFolding::Lower)
        .with_max_identifier_length(63)
        .with_transactional_ddl(true)
        .with_auto_increment(AutoIncrementStyle::SerialType {
            int: "SERIAL".to_string(),
            bigint: "BIGSERIAL".to_string(),
        })
        .with_metadata(MetadataStyle::Postgres)
        .with_types(&[
            ("tinyint", "SMALLINT", Drop),
            ("nvarchar", "VARCHAR", Keep),
            ("varchar", "VARCHAR", Keep),
            ("text", "TEXT", Drop),
            ("clob", "TEXT", Drop),
            ("blob", "BYTEA", Drop),
            ("decimal", "NUMERIC", Keep),
            ("numeric", "NUMERIC", Keep),
            ("double", "DOUBLE PRECISION", Drop),
            ("uuid", "UUID", Drop),
            ("json", "JSONB", Drop),
        ])
}

fn mysql() -> CapabilityEntry {
    CapabilityEntry::new(Dialect::MySQL, "MySQL")
        .without_operations(&[CreateSequence, DropSequence])
        .without_syntax(&[IdentityIncrement])
        .with_quote(IdentifierQuote::BACKTICK)
        .with_case_folding(CaseFolding::Preserve)
        .with_max_identifier_length(64)
        .with_backslash_escapes(true)
        .with_boolean_literals("1", "0")
        .with_auto_increment(AutoIncrementStyle::Clause("AUTO_INCREMENT".to_string()))
        .with_begin_transaction("START TRANSACTION")
        .with_metadata(MetadataStyle::MySql)
        .with_types(&[
            ("int", "INT", Drop),
            ("tinyint", "TINYINT", Drop),
            ("boolean", "TINYINT", fixed("1")),
            ("bool", "TINYINT", fixed("1")),
            ("text", "TEXT", Drop),
            ("clob", "LONGTEXT", Drop),
            ("blob", "LONGBLOB", Drop),
            ("datetime", "DATETIME", Keep),
            ("json", "JSON", Drop),
        ])
}

fn sqlite() -> CapabilityEntry {
    CapabilityEntry::new(Dialect::SQLite, "SQLite")
        .with_only_operations(&[
            CreateTable,
            DropTable,
            RenameTable,
            AddColumn,
            DropColumn,
            RenameColumn,
            CreateIndex,
            DropIndex,
            CreateView,
            DropView,
            RawSql,
        ])
        .with_case_folding(CaseFolding::Preserve)
        .with_max_identifier_length(1024)
        .without_syntax(&[AddAutoIncrementColumn, AutoIncrementInCompositeKey])
        .with_transactional_ddl(true)
        .with_boolean_literals("1", "0")
        .with_auto_increment(AutoIncrementStyle::Clause("AUTOINCREMENT".to_string()))
        .with_metadata(MetadataStyle::Sqlite)
        .with_types(&[
            ("tinyint", "INTEGER", Drop),
            ("smallint", "INTEGER", Drop),
            ("bigint", "INTEGER", Drop),
            ("varchar", "VARCHAR", Keep),
            ("nvarchar", "VARCHAR", Keep),
            ("text", "TEXT", Drop),
            ("clob", "TEXT", Drop),
            ("float", "REAL", Drop),
            ("double", "REAL", Drop),
            ("datetime", "DATETIME", Drop),
            ("uuid", "TEXT", Drop),
            ("json", "TEXT", Drop),
        ])
}

fn oracle() -> CapabilityEntry {
    CapabilityEntry::new(Dialect::Oracle, "Oracle")
        .without_operations(&[AddAutoIncrement])
        .without_syntax(&[ForeignKeyOnUpdate])
        .with_max_identifier_length(30)
        .with_boolean_literals("1", "0")
        .with_auto_increment(AutoIncrementStyle::Clause(
            "GENERATED BY DEFAULT AS IDENTITY".to_string(),
        ))
        .with_begin_transaction("SET TRANSACTION READ WRITE")
        .with_types(&[
            ("int", "INTEGER", Drop),
            ("smallint", "NUMBER", fixed("5")),
            ("tinyint", "NUMBER", fixed("3")),
            ("bigint", "NUMBER", fixed("19")),
            ("boolean", "NUMBER", fixed("1")),
            ("bool", "NUMBER", fixed("1")),
            ("varchar", "VARCHAR2", default_to("255")),
            ("nvarchar", "NVARCHAR2", default_to("255")),
            ("decimal", "NUMBER", Keep),
            ("numeric", "NUMBER", Keep),
            ("double", "FLOAT", fixed("24")),
            ("time", "DATE", Drop),
            ("uuid", "RAW", fixed("16")),
            ("currency", "NUMBER", fixed("15, 2")),
        ])
}

fn mssql() -> CapabilityEntry {
    CapabilityEntry::new(Dialect::MSSQL, "Microsoft SQL Server")
        .without_operations(&[AddAutoIncrement, CreateSequence, DropSequence])
        .with_quote(IdentifierQuote::BRACKET)
        .with_case_folding(CaseFolding::Preserve)
        .with_addressing(AddressingStyle::ThreePart)
        .with_transactional_ddl(true)
        .with_boolean_literals("1", "0")
        .with_auto_increment(AutoIncrementStyle::Clause("IDENTITY".to_string()))
        .with_begin_transaction("BEGIN TRANSACTION")
        .with_metadata(MetadataStyle::SqlServer)
        .with_types(&[
            ("int", "INT", Drop),
            ("tinyint", "TINYINT", Drop),
            ("boolean", "BIT", Drop),
            ("bool", "BIT", Drop),
            ("text", "NVARCHAR", fixed("MAX")),
            ("clob", "NVARCHAR", fixed("MAX")),
            ("blob", "VARBINARY", fixed("MAX")),
            ("double", "FLOAT", Drop),
            ("datetime", "DATETIME2", Drop),
            ("timestamp", "DATETIME2", Keep),
            ("uuid", "UNIQUEIDENTIFIER", Drop),
            ("currency", "MONEY", Drop),
            ("json", "NVARCHAR", fixed("MAX")),
        ])
}

fn db2() -> CapabilityEntry {
    CapabilityEntry::new(Dialect::DB2, "DB2")
        .with_transactional_ddl(true)
        .with_boolean_literals("1", "0")
        .with_auto_increment(AutoIncrementStyle::Clause(
            "GENERATED BY DEFAULT AS IDENTITY".to_string(),
        ))
        .with_types(&[
            ("boolean", "SMALLINT", Drop),
            ("bool", "SMALLINT", Drop),
            ("varchar", "VARCHAR", default_to("255")),
        ])
}

fn derby() -> CapabilityEntry {
    CapabilityEntry::new(Dialect::Derby, "Apache Derby")
        .without_operations(&[AddAutoIncrement])
        .without_syntax(&[ReplaceView])
        .with_transactional_ddl(true)
        .with_auto_increment(AutoIncrementStyle::Clause(
            "GENERATED BY DEFAULT AS IDENTITY".to_string(),
        ))
        .with_types(&[("nvarchar", "VARCHAR", default_to("255"))])
}

fn h2() -> CapabilityEntry {
    CapabilityEntry::new(Dialect::H2, "H2")
        .without_operations(&[AddAutoIncrement])
        .with_max_identifier_length(256)
        .with_auto_increment(AutoIncrementStyle::Clause("AUTO_INCREMENT".to_string()))
        .with_metadata(MetadataStyle::InformationSchema)
        .with_types(&[
            ("int", "INT", Drop),
            ("tinyint", "TINYINT", Drop),
            ("uuid", "UUID", Drop),
        ])
}

fn hsqldb() -> CapabilityEntry {
    CapabilityEntry::new(Dialect::HSQLDB, "HyperSQL")
        .without_syntax(&[ReplaceView])
        .with_auto_increment(AutoIncrementStyle::Clause(
            "GENERATED BY DEFAULT AS IDENTITY".to_string(),
        ))
        .with_metadata(MetadataStyle::InformationSchema)
        .with_types(&[
            ("int", "INT", Drop),
            ("tinyint", "TINYINT", Drop),
            ("text", "LONGVARCHAR", Drop),
        ])
}

fn firebird() -> CapabilityEntry {
    CapabilityEntry::new(Dialect::Firebird, "Firebird")
        .without_operations(&[AddAutoIncrement])
        .without_syntax(&[SequenceBounds])
        .with_max_identifier_length(31)
        .with_schemas(false)
        .with_transactional_ddl(true)
        .with_boolean_literals("1", "0")
        .with_begin_transaction("SET TRANSACTION")
        .with_types(&[
            ("boolean", "SMALLINT", Drop),
            ("bool", "SMALLINT", Drop),
            ("text", "BLOB SUB_TYPE TEXT", Drop),
            ("clob", "BLOB SUB_TYPE TEXT", Drop),
            ("double", "DOUBLE PRECISION", Drop),
        ])
}

fn sybase() -> CapabilityEntry {
    CapabilityEntry::new(Dialect::Sybase, "Sybase ASE")
        .without_operations(&[CreateSequence, DropSequence])
        .without_syntax(&[IdentityStartValue, IdentityIncrement])
        .with_quote(IdentifierQuote::BRACKET)
        .with_case_folding(CaseFolding::Preserve)
        .with_max_identifier_length(30)
        .with_addressing(AddressingStyle::ThreePart)
        .with_boolean_literals("1", "0")
        .with_auto_increment(AutoIncrementStyle::Clause("IDENTITY".to_string()))
        .with_begin_transaction("BEGIN TRANSACTION")
        .with_types(&[
            ("int", "INT", Drop),
            ("tinyint", "TINYINT", Drop),
            ("boolean", "BIT", Drop),
            ("bool", "BIT", Drop),
            ("text", "TEXT", Drop),
            ("clob", "TEXT", Drop),
            ("blob", "IMAGE", Drop),
            ("double", "DOUBLE PRECISION", Drop),
            ("datetime", "DATETIME", Drop),
            ("timestamp", "DATETIME", Drop),
            ("uuid", "UNIQUEIDENTIFIER", Drop),
            ("currency", "MONEY", Drop),
        ])
}

fn maxdb() -> CapabilityEntry {
    CapabilityEntry::new(Dialect::MaxDB, "MaxDB")
        .without_syntax(&[IdentityIncrement, ReplaceView])
        .with_max_identifier_length(32)
        .with_auto_increment(AutoIncrementStyle::Clause("DEFAULT SERIAL".to_string()))
        .with_types(&[
            ("text", "LONG VARCHAR", Drop),
            ("clob", "LONG VARCHAR", Drop),
            ("blob", "LONG BYTE", Drop),
            ("double", "DOUBLE PRECISION", Drop),
        ])
}

fn informix() -> CapabilityEntry {
    CapabilityEntry::new(Dialect::Informix, "Informix")
        .without_syntax(&[IdentityIncrement, ForeignKeyOnUpdate, ReplaceView])
        .with_case_folding(CaseFolding::Lower)
        .with_addressing(AddressingStyle::ThreePart)
        .with_transactional_ddl(true)
        .with_boolean_literals("'t'", "'f'")
        .with_auto_increment(AutoIncrementStyle::SerialType {
            int: "SERIAL".to_string(),
            bigint: "SERIAL8".to_string(),
        })
        .with_begin_transaction("BEGIN WORK")
        .with_types(&[
            ("bigint", "INT8", Drop),
            ("text", "TEXT", Drop),
            ("float", "SMALLFLOAT", Drop),
            ("double", "FLOAT", Drop),
            ("datetime", "DATETIME YEAR TO FRACTION", fixed("5")),
            ("timestamp", "DATETIME YEAR TO FRACTION", fixed("5")),
            ("currency", "MONEY", Drop),
        ])
}

fn cache() -> CapabilityEntry {
    CapabilityEntry::new(Dialect::Cache, "InterSystems Caché")
        .without_operations(&[AddAutoIncrement, CreateSequence, DropSequence])
        .with_case_folding(CaseFolding::Preserve)
        .with_boolean_literals("1", "0")
        .with_begin_transaction("START TRANSACTION")
        .with_types(&[
            ("boolean", "BIT", Drop),
            ("bool", "BIT", Drop),
            ("text", "LONGVARCHAR", Drop),
            ("clob", "LONGVARCHAR", Drop),
            ("blob", "LONGVARBINARY", Drop),
        ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_entry_maps_core_tokens() {
        for entry in entries() {
            for token in ["int", "varchar", "boolean", "datetime", "decimal"] {
                assert!(
                    entry.type_table.contains_key(token),
                    "{} has no mapping for {}",
                    entry.engine,
                    token
                );
            }
        }
    }

    #[test]
    fn test_add_auto_increment_requires_representation() {
        for entry in entries() {
            if entry.supports(AddAutoIncrement) {
                assert!(entry.auto_increment.is_available(), "{}", entry.engine);
            }
        }
    }

    #[test]
    fn test_informix_datetime_mapping() {
        let entry = informix();
        assert_eq!(entry.map_type("datetime"), "DATETIME YEAR TO FRACTION(5)");
    }
}
