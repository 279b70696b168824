//! Introspection, sync and migrations against in-memory SQLite.

use asupersync::runtime::RuntimeBuilder;
use sqlbean_core::{Cx, Error, Executor, FieldInfo, IndexInfo, Outcome, SnakeMapper, SqlType, TableMetadata};
use sqlbean_schema::{Introspector, Migration, MigrationRunner, MigrationStatus, sync};
use sqlbean_sqlite::SqliteConnection;
use std::sync::Arc;

fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

static ARTICLE_FIELDS: [FieldInfo; 4] = [
    FieldInfo::new("id", Some(SqlType::BigInt))
        .primary_key(true)
        .auto_increment(true),
    FieldInfo::new("slug", Some(SqlType::VarChar(80))).unique(""),
    FieldInfo::new("author", Some(SqlType::VarChar(40))),
    FieldInfo::new("views", Some(SqlType::Integer)).default_value("0"),
];

static ARTICLE_INDEXES: [IndexInfo; 1] = [IndexInfo::new("author_views", &["author", "views"], false)];

fn article() -> Arc<TableMetadata> {
    Arc::new(
        TableMetadata::build(
            "Article",
            None,
            &ARTICLE_FIELDS,
            &ARTICLE_INDEXES,
            true,
            &SnakeMapper,
        )
        .unwrap(),
    )
}

#[test]
fn sync_is_idempotent_and_introspectable() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let conn = SqliteConnection::open_memory().unwrap();
        let tables = [article()];

        let first = unwrap_outcome(sync(&cx, &conn, &tables).await);
        assert_eq!(first.statements.len(), 3, "{:?}", first.statements);

        let second = unwrap_outcome(sync(&cx, &conn, &tables).await);
        assert!(second.is_noop(), "{:?}", second.statements);
        assert!(second.warnings.is_empty(), "{:?}", second.warnings);

        let info = unwrap_outcome(
            Introspector::new(conn.dialect())
                .table_info(&cx, &conn, "article")
                .await,
        );
        assert!(info.has_auto_pk());
        assert_eq!(info.column("views").and_then(|c| c.default.as_deref()), Some("0"));
        let composite = info
            .indexes
            .iter()
            .find(|i| i.name == "IDX_article_author_views")
            .expect("composite index");
        assert_eq!(composite.columns, vec!["author", "views"]);
        assert!(info.indexes.iter().any(|i| i.unique && i.columns == vec!["slug"]));
    });
}

#[test]
fn sync_adds_missing_columns_and_reports_extra_ones() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw(
            "CREATE TABLE article (id INTEGER PRIMARY KEY AUTOINCREMENT, slug TEXT NOT NULL, legacy TEXT)",
        )
        .unwrap();

        let report = unwrap_outcome(sync(&cx, &conn, &[article()]).await);
        assert!(
            report
                .statements
                .iter()
                .any(|s| s.contains("ADD COLUMN \"author\"")),
            "{:?}",
            report.statements
        );
        assert!(report.warnings.iter().any(|w| w.column.as_deref() == Some("legacy")));

        let again = unwrap_outcome(sync(&cx, &conn, &[article()]).await);
        assert!(again.is_noop(), "{:?}", again.statements);
    });
}

#[test]
fn migrations_apply_in_order_and_roll_back() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let conn = SqliteConnection::open_memory().unwrap();
        let runner = MigrationRunner::new(vec![
            Migration::new(
                "0002",
                "seed tags",
                "INSERT INTO tag (name) VALUES ('a;b'); INSERT INTO tag (name) VALUES ('c')",
                "DELETE FROM tag",
            ),
            Migration::new(
                "0001",
                "create tag",
                "CREATE TABLE tag (id INTEGER PRIMARY KEY, name TEXT)",
                "DROP TABLE tag",
            ),
        ]);

        let applied = unwrap_outcome(runner.migrate(&cx, &conn).await);
        assert_eq!(applied, vec!["0001", "0002"]);
        let rows = unwrap_outcome(conn.query(&cx, "SELECT name FROM tag ORDER BY id", &[]).await);
        assert_eq!(rows.len(), 2);

        assert!(unwrap_outcome(runner.migrate(&cx, &conn).await).is_empty());

        let rolled = unwrap_outcome(runner.rollback_last(&cx, &conn).await);
        assert_eq!(rolled.as_deref(), Some("0002"));
        let status = unwrap_outcome(runner.status(&cx, &conn).await);
        assert!(matches!(status[0].1, MigrationStatus::Applied { .. }));
        assert_eq!(status[1].1, MigrationStatus::Pending);
        let rows = unwrap_outcome(conn.query(&cx, "SELECT name FROM tag", &[]).await);
        assert!(rows.is_empty());
    });
}

#[test]
fn failed_migration_leaves_no_record() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let conn = SqliteConnection::open_memory().unwrap();
        let runner = MigrationRunner::new(vec![Migration::new(
            "0001",
            "broken",
            "CREATE TABLE ok_table (x INTEGER); INSERT INTO missing VALUES (1)",
            "",
        )])
        .table_name("schema_history");

        assert!(matches!(runner.migrate(&cx, &conn).await, Outcome::Err(_)));
        let status = unwrap_outcome(runner.status(&cx, &conn).await);
        assert_eq!(status[0].1, MigrationStatus::Pending);
        assert!(!conn.in_transaction());
        let tables = unwrap_outcome(Introspector::new(conn.dialect()).table_names(&cx, &conn).await);
        assert!(!tables.iter().any(|t| t == "ok_table"));
    });
}
