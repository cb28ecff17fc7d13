/// 変更ステートメントとケイパビリティマトリクスの結合テスト
///
/// ステートメントの対応判定がマトリクスの宣言と矛盾しないこと、
/// シリアライズ形式が安定していることを確認します。

#[cfg(test)]
mod statement_support_tests {
    use tidemark_core::core::capability::CapabilityMatrix;
    use tidemark_core::core::changeset::Changeset;
    use tidemark_core::core::engine::Dialect;
    use tidemark_core::core::operation::OperationKind;
    use tidemark_core::core::statement::{
        AddAutoIncrementStatement, AddColumnStatement, AddForeignKeyStatement, ChangeStatement,
        ColumnDefinition, CreateIndexStatement, CreateSequenceStatement, CreateTableStatement,
        CreateViewStatement, DropTableStatement, RawSqlStatement, ReferentialAction,
        RenameTableStatement, TableRef,
    };

    fn samples() -> Vec<ChangeStatement> {
        vec![
            CreateTableStatement::new("users")
                .add_primary_key_column("id", "bigint")
                .add_column(ColumnDefinition::new("name", "varchar(100)").not_null())
                .into(),
            DropTableStatement::new("users").cascade().into(),
            RenameTableStatement::new("users", "accounts").into(),
            AddColumnStatement::new("users", ColumnDefinition::new("email", "varchar(255)")).into(),
            AddAutoIncrementStatement::new(TableRef::new("AddAutoIncTest"), "testCol", "int")
                .into(),
            CreateIndexStatement::new("idx_users_name", "users", ["name"]).into(),
            CreateSequenceStatement::new("seq_users").into(),
            RawSqlStatement::new("SELECT 1").into(),
        ]
    }

    #[test]
    fn test_statement_support_never_exceeds_matrix() {
        let matrix = CapabilityMatrix::global();
        for dialect in Dialect::ALL {
            let entry = matrix.entry(&dialect.id()).unwrap();
            for statement in samples() {
                if statement.supports_engine(entry) {
                    assert!(
                        entry.supports(statement.operation()),
                        "{} claims support for {} beyond the matrix",
                        dialect,
                        statement.operation()
                    );
                }
            }
        }
    }

    #[test]
    fn test_add_auto_increment_support_by_engine() {
        let matrix = CapabilityMatrix::global();
        let statement: ChangeStatement =
            AddAutoIncrementStatement::new(TableRef::new("AddAutoIncTest"), "testCol", "int").into();

        for dialect in [Dialect::MySQL, Dialect::HSQLDB, Dialect::DB2] {
            assert!(statement.supports_engine(matrix.entry(&dialect.id()).unwrap()), "{}", dialect);
        }
        for dialect in [Dialect::PostgreSQL, Dialect::SQLite, Dialect::Oracle, Dialect::MSSQL] {
            assert!(!statement.supports_engine(matrix.entry(&dialect.id()).unwrap()), "{}", dialect);
            assert!(!matrix
                .supports(&dialect.id(), OperationKind::AddAutoIncrement)
                .unwrap());
        }
    }

    #[test]
    fn test_qualified_targets_need_schema_support() {
        let matrix = CapabilityMatrix::global();
        let firebird = matrix.entry(&Dialect::Firebird.id()).unwrap();
        let sqlite = matrix.entry(&Dialect::SQLite.id()).unwrap();

        let qualified: ChangeStatement =
            CreateIndexStatement::new("idx_t_a", TableRef::new("t").with_schema("x"), ["a"]).into();
        assert!(!qualified.supports_engine(firebird));
        assert!(qualified.supports_engine(sqlite));

        // 参照先テーブルの修飾も対象
        let foreign_key: ChangeStatement = AddForeignKeyStatement::new(
            "fk_t_p",
            "t",
            ["p_id"],
            TableRef::new("p").with_schema("x"),
            ["id"],
        )
        .into();
        assert_eq!(foreign_key.targets().len(), 2);
        assert!(!foreign_key.supports_engine(firebird));

        let raw: ChangeStatement = RawSqlStatement::new("SELECT 1").into();
        assert!(raw.targets().is_empty());
        assert!(raw.supports_engine(firebird));
    }

    #[test]
    fn test_syntax_limits_by_engine() {
        let matrix = CapabilityMatrix::global();
        let entry = |dialect: Dialect| matrix.entry(&dialect.id()).unwrap();

        let on_update: ChangeStatement =
            AddForeignKeyStatement::new("fk_t_p", "t", ["p_id"], "p", ["id"])
                .on_update(ReferentialAction::Cascade)
                .into();
        assert!(!on_update.supports_engine(entry(Dialect::Oracle)));
        assert!(!on_update.supports_engine(entry(Dialect::Informix)));
        assert!(on_update.supports_engine(entry(Dialect::PostgreSQL)));

        let replace: ChangeStatement = CreateViewStatement::new("v", "SELECT 1").or_replace().into();
        for dialect in [Dialect::Derby, Dialect::HSQLDB, Dialect::MaxDB, Dialect::Informix] {
            assert!(!replace.supports_engine(entry(dialect)), "{}", dialect);
        }
        assert!(replace.supports_engine(entry(Dialect::PostgreSQL)));
        let plain: ChangeStatement = CreateViewStatement::new("v", "SELECT 1").into();
        assert!(plain.supports_engine(entry(Dialect::Derby)));

        let bounded: ChangeStatement =
            CreateSequenceStatement::new("seq_t").min_value(1).max_value(1_000).into();
        assert!(!bounded.supports_engine(entry(Dialect::Firebird)));
        assert!(bounded.supports_engine(entry(Dialect::PostgreSQL)));
        let simple: ChangeStatement = CreateSequenceStatement::new("seq_t").into();
        assert!(simple.supports_engine(entry(Dialect::Firebird)));
    }

    #[test]
    fn test_inverse_statements() {
        let add: ChangeStatement =
            AddColumnStatement::new("users", ColumnDefinition::new("email", "varchar(255)")).into();
        assert_eq!(add.inverse().unwrap().operation(), OperationKind::DropColumn);

        let rename: ChangeStatement = RenameTableStatement::new("users", "accounts").into();
        let back = rename.inverse().unwrap();
        assert_eq!(back.inverse().unwrap(), rename);

        let drop: ChangeStatement = DropTableStatement::new("users").into();
        assert!(drop.inverse().is_none());
    }

    #[test]
    fn test_changeset_yaml_round_trip() {
        let changeset = samples()
            .into_iter()
            .fold(Changeset::new("all").with_author("alice"), |cs, s| cs.with_statement(s));

        let yaml = serde_saphyr::to_string(&changeset).unwrap();
        let restored: Changeset = serde_saphyr::from_str(&yaml).unwrap();
        assert_eq!(restored, changeset);
        assert!(restored.validate().is_ok());
    }
}
