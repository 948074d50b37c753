mod common;

use std::collections::{BTreeSet, HashMap};

use bookhaven::{
    Authenticator, ConnectionProvider, ConsoleError, Dialect, Dialog, IdentityColumns, Role,
    SchemaInspector, StaffAuthenticator, Statement, TableView, ViewState,
};
use common::{engine_for, fields, setup_test_db};

const MISSING_DB: &str = "sqlite:///definitely/not/here/library.db";

#[tokio::test]
async fn identity_columns_are_read_once_for_all_tables() {
    let (_dir, url) = setup_test_db().await;
    let provider = ConnectionProvider::new(url.as_str(), Dialect::Sqlite);
    let identity = IdentityColumns::load(&provider).await;

    let expect = |cols: &[&str]| cols.iter().map(|c| c.to_string()).collect::<BTreeSet<_>>();
    assert_eq!(identity.for_table("book_copy"), expect(&["copy_id"]));
    assert_eq!(identity.for_table("member"), expect(&["member_id"]));
    // composite key and plain tables have no generated column
    assert!(identity.for_table("book_author").is_empty());
    assert!(identity.for_table("description").is_empty());
}

#[tokio::test]
async fn columns_come_from_empty_tables() {
    let (_dir, url) = setup_test_db().await;
    let provider = ConnectionProvider::new(url.as_str(), Dialect::Sqlite);
    let inspector = SchemaInspector::init(provider, HashMap::new()).await;

    assert_eq!(
        inspector.columns("member").await,
        ["member_id", "fname", "lname", "email", "phone"]
    );
    let schema = inspector.table_schema("book_copy").await.unwrap();
    assert_eq!(schema.key().as_str(), "copy_id");
    assert!(schema.is_identity("copy_id"));

    assert!(inspector.columns("no_such_table").await.is_empty());
    assert!(matches!(
        inspector.table_schema("no_such_table").await,
        Err(ConsoleError::SchemaUnavailable { .. })
    ));
}

#[tokio::test]
async fn column_discovery_accepts_any_declared_type() {
    let (_dir, url) = setup_test_db().await;
    let provider = ConnectionProvider::new(url.as_str(), Dialect::Sqlite);
    let inspector = SchemaInspector::init(provider, HashMap::new()).await;

    let book = inspector.table_schema("book").await.unwrap();
    assert_eq!(book.columns, ["book_id", "isbn", "title", "price", "available"]);
    assert_eq!(book.column_type("price").map(|t| t.as_str()), Some("DECIMAL(6,2)"));
    assert!(book.is_identity("book_id"));

    assert_eq!(
        inspector.columns("reservation").await,
        ["reservation_id", "member_id", "reserved_on"]
    );
}

#[tokio::test]
async fn table_schema_is_built_once_per_table() {
    let (_dir, url) = setup_test_db().await;
    let provider = ConnectionProvider::new(url.as_str(), Dialect::Sqlite);
    let mut keys = HashMap::new();
    keys.insert("member".to_string(), "no_such_column".to_string());
    let inspector = SchemaInspector::init(provider.clone(), keys).await;

    let first = inspector.table_schema("member").await.unwrap();
    assert_eq!(first.key().as_str(), "member_id");

    // the cached schema is served as built, later DDL included
    let mut conn = provider.open().await.unwrap();
    conn.execute(&Statement {
        sql: "ALTER TABLE member ADD COLUMN note TEXT".to_string(),
        params: Vec::new(),
    })
    .await
    .unwrap();
    conn.close().await;

    assert_eq!(inspector.table_schema("member").await.unwrap(), first);
    assert_eq!(inspector.columns("member").await.len(), 5);
}

#[tokio::test]
async fn unreachable_database_degrades_gracefully() {
    let provider = ConnectionProvider::new(MISSING_DB, Dialect::Sqlite);

    assert!(matches!(
        provider.open().await,
        Err(ConsoleError::ConnectionFailure(_))
    ));
    assert!(IdentityColumns::load(&provider).await.is_empty());

    let inspector = SchemaInspector::init(provider, HashMap::new()).await;
    assert!(inspector.columns("book").await.is_empty());
}

#[tokio::test]
async fn list_aborts_when_schema_is_unavailable() {
    let engine = engine_for(MISSING_DB, Role::Manager).await;
    let err = engine.list("book").await.unwrap_err();
    assert!(matches!(err, ConsoleError::SchemaUnavailable { .. }));
}

#[tokio::test]
async fn staff_login_produces_a_session() {
    let (_dir, url) = setup_test_db().await;
    let auth = StaffAuthenticator::new(ConnectionProvider::new(url.as_str(), Dialect::Sqlite));

    let session = auth.authenticate(" ann@library.test ", "secret").await.unwrap();
    assert_eq!(session.role, Role::Librarian);
    assert_eq!(session.display_name, "Ann Lee");
    assert_eq!(session.staff_id.as_deref(), Some("1"));
    assert_eq!(session.banner(), "Ann Lee (Librarian)");

    assert!(matches!(
        auth.authenticate("ann@library.test", "wrong").await,
        Err(ConsoleError::AuthenticationFailed)
    ));
    assert!(matches!(
        auth.authenticate("", "secret").await,
        Err(ConsoleError::EmptyInput(_))
    ));
    // valid credentials, but no such role
    assert!(matches!(
        auth.authenticate("jo@library.test", "pw").await,
        Err(ConsoleError::AuthenticationFailed)
    ));
}

#[tokio::test]
async fn table_view_walks_through_its_states() {
    let (_dir, url) = setup_test_db().await;
    let engine = engine_for(&url, Role::Manager).await;
    let mut view = TableView::new("member");
    assert_eq!(view.state(), ViewState::Idle);

    // dialogs need a loaded grid
    assert!(matches!(
        view.begin_add(&engine).await,
        Err(ConsoleError::InvalidState(_))
    ));
    assert_eq!(view.take_error().as_deref(), Some("Open the table first"));
    assert!(matches!(
        view.save_edit(&engine).await,
        Err(ConsoleError::InvalidState(_))
    ));
    assert_eq!(view.state(), ViewState::Idle);
    view.take_error();

    view.load(&engine).await.unwrap();
    assert_eq!(view.state(), ViewState::Loaded);
    assert!(view.rows().is_empty());

    view.begin_add(&engine).await.unwrap();
    assert_eq!(view.state(), ViewState::Editing);
    assert_eq!(
        view.dialog(),
        Some(&Dialog::Add(vec![
            "fname".to_string(),
            "lname".to_string(),
            "email".to_string(),
            "phone".to_string()
        ]))
    );
    view.save_add(&engine, &fields(&[("fname", "Ann"), ("email", "ann@mail.test")]))
        .await
        .unwrap();
    assert_eq!(view.state(), ViewState::Loaded);
    assert_eq!(view.rows().len(), 1);

    assert_eq!(view.search(&engine, "ann").await.unwrap(), 1);
    assert_eq!(view.state(), ViewState::Filtered);
    assert_eq!(view.search(&engine, "nobody").await.unwrap(), 0);
    assert!(view.rows().is_empty());

    // a failed search is reported and leaves the view where it was
    assert!(view.search(&engine, " ").await.is_err());
    assert_eq!(view.state(), ViewState::Filtered);
    assert_eq!(view.take_error().as_deref(), Some("Enter search term"));
    assert!(view.take_error().is_none());

    view.clear_search(&engine).await.unwrap();
    assert_eq!(view.state(), ViewState::Loaded);

    let record = view.rows().rows[0].clone();
    view.begin_edit(&engine, &record).await.unwrap();
    if let Some(Dialog::Edit(form)) = view.dialog_mut() {
        assert!(form.set("lname", Some("Lee".into())));
    }
    view.save_edit(&engine).await.unwrap();
    assert_eq!(view.state(), ViewState::Loaded);
    assert_eq!(view.rows().rows[0].get("lname"), Some("Lee"));

    view.begin_edit(&engine, &record).await.unwrap();
    view.cancel();
    assert_eq!(view.state(), ViewState::Loaded);
    assert!(view.dialog().is_none());

    // an unconfirmed delete is reported and changes nothing
    assert!(view.delete(&engine, &record, false).await.is_err());
    assert!(view.take_error().unwrap().starts_with("Delete of member record 1"));
    assert_eq!(view.rows().len(), 1);

    view.delete(&engine, &record, true).await.unwrap();
    assert_eq!(view.state(), ViewState::Loaded);
    assert!(view.rows().is_empty());
}
