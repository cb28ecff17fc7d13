/// スナップショット取得の統合テスト
///
/// SQLiteデータベースに変更を適用する前後でスナップショットを取り、
/// 差分が適用した変更と一致することを確認します。
mod common;

#[cfg(test)]
mod snapshot_tests {
    use super::common::{fast_config, init_tracing, SqliteDatabase};
    use tidemark_core::core::changeset::Changeset;
    use tidemark_core::core::snapshot_diff::diff;
    use tempfile::TempDir;
    use tidemark_core::core::statement::{
        AddColumnStatement, ColumnDefinition, CreateIndexStatement, CreateTableStatement,
        RawSqlStatement, TableRef,
    };
    use tidemark_db::{ChangeEngine, DatabaseConnection, SqlxConnection};

    fn engine() -> ChangeEngine<'static> {
        ChangeEngine::with_config(fast_config()).unwrap()
    }

    #[tokio::test]
    async fn test_snapshot_reflects_created_table() {
        init_tracing();
        let db = SqliteDatabase::new();
        let mut conn = db.connect().await;
        let engine = engine();

        let before = engine.snapshot(&mut conn).await.unwrap();
        assert_eq!(before.table_count(), 0);
        assert_eq!(before.default_schema.as_deref(), Some("main"));

        let changesets = vec![
            Changeset::new("001").with_statement(
                CreateTableStatement::new("users")
                    .add_column(ColumnDefinition::new("id", "int").primary_key().auto_increment())
                    .add_column(ColumnDefinition::new("email", "varchar(255)").not_null()),
            ),
            Changeset::new("002").with_statement(
                CreateIndexStatement::new("idx_users_email", "users", ["email"]).unique(),
            ),
            Changeset::new("003").with_statement(RawSqlStatement::new(
                "CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER NOT NULL REFERENCES users(id))",
            )),
        ];
        engine.apply_all(&changesets, &mut conn).await.unwrap();

        let after = engine.snapshot(&mut conn).await.unwrap();
        // 追跡用テーブルは含まれない
        assert_eq!(after.table_count(), 2);
        assert!(after.table("tidemark_changelog").is_none());
        assert!(after.table("tidemark_changelog_lock").is_none());

        let users = after.table("users").unwrap();
        let id = users.column("id").unwrap();
        assert!(id.auto_increment);
        assert_eq!(users.primary_key_columns(), ["id".to_string()]);
        assert!(!users.column("email").unwrap().nullable);
        let index = users.indexes.get("idx_users_email").unwrap();
        assert!(index.unique);
        assert_eq!(index.columns, vec!["email".to_string()]);

        let posts = after.table("posts").unwrap();
        assert!(!posts.column("id").unwrap().auto_increment);
        let foreign_key = posts.foreign_keys.values().next().unwrap();
        assert_eq!(foreign_key.referenced_table, "users");
        assert_eq!(foreign_key.columns, vec!["user_id".to_string()]);

        let changes = diff(&before, &after);
        assert_eq!(changes.added_tables.len(), 2);
        assert!(changes.removed_tables.is_empty());
    }

    #[tokio::test]
    async fn test_diff_reports_added_column() {
        init_tracing();
        let db = SqliteDatabase::new();
        let mut conn = db.connect().await;
        let engine = engine();

        let create = Changeset::new("001").with_statement(
            CreateTableStatement::new("accounts").add_primary_key_column("id", "int"),
        );
        engine.apply_all(&[create.clone()], &mut conn).await.unwrap();
        let before = engine.snapshot(&mut conn).await.unwrap();

        let add = Changeset::new("002").with_statement(AddColumnStatement::new(
            "accounts",
            ColumnDefinition::new("nickname", "varchar(50)"),
        ));
        engine.apply_all(&[create, add], &mut conn).await.unwrap();
        let after = engine.snapshot(&mut conn).await.unwrap();

        let changes = diff(&before, &after);
        let table = changes.table("accounts").unwrap();
        assert_eq!(table.added_columns.len(), 1);
        assert_eq!(table.added_columns[0].name, "nickname");
        assert!(table.added_columns[0].nullable);

        assert!(diff(&after, &after).is_empty());
    }

    #[tokio::test]
    async fn test_scoped_snapshot_uses_given_schema() {
        init_tracing();
        let db = SqliteDatabase::new();
        let mut conn = db.connect().await;
        let engine = engine();

        let snapshot = engine
            .snapshot_scoped(&mut conn, None, Some("main"))
            .await
            .unwrap();
        assert!(snapshot.schema("main").is_some());
        assert_eq!(snapshot.table_count(), 0);
    }

    /// 別ファイルのデータベースを`aux`としてアタッチ
    async fn attach_aux(conn: &mut SqlxConnection, dir: &TempDir) {
        let path = dir.path().join("aux.db");
        conn.execute(&format!("ATTACH DATABASE '{}' AS aux", path.display()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_changes_land_in_attached_schema() {
        init_tracing();
        let db = SqliteDatabase::new();
        let aux_dir = TempDir::new().unwrap();
        let mut conn = db.connect().await;
        attach_aux(&mut conn, &aux_dir).await;
        let engine = engine();

        let changesets = vec![
            Changeset::new("001").with_statement(
                CreateTableStatement::new(TableRef::new("events").with_schema("aux"))
                    .add_column(ColumnDefinition::new("id", "int").primary_key().auto_increment())
                    .add_column(ColumnDefinition::new("kind", "varchar(20)").not_null()),
            ),
            Changeset::new("002").with_statement(CreateIndexStatement::new(
                "idx_events_kind",
                TableRef::new("events").with_schema("aux"),
                ["kind"],
            )),
        ];
        engine.apply_all(&changesets, &mut conn).await.unwrap();

        let aux = engine
            .snapshot_scoped(&mut conn, None, Some("aux"))
            .await
            .unwrap();
        assert!(aux.schema("aux").is_some());
        assert_eq!(aux.table_count(), 1);
        let events = aux.table_in("aux", "events").unwrap();
        assert!(events.column("id").unwrap().auto_increment);
        assert!(events.indexes.contains_key("idx_events_kind"));

        // 追跡用テーブルはmainに作られ、変更対象はauxにだけ存在する
        let main = engine.snapshot(&mut conn).await.unwrap();
        assert!(main.table("events").is_none());
        assert_eq!(main.table_count(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_rejects_foreign_catalog() {
        init_tracing();
        let db = SqliteDatabase::new();
        let mut conn = db.connect().await;
        let engine = engine();

        let err = engine
            .snapshot_scoped(&mut conn, Some("elsewhere"), None)
            .await
            .unwrap_err();
        assert!(err.is_catalog_mismatch());

        let snapshot = engine
            .snapshot_scoped(&mut conn, Some("MAIN"), None)
            .await
            .unwrap();
        assert_eq!(snapshot.default_catalog.as_deref(), Some("main"));
    }
}
