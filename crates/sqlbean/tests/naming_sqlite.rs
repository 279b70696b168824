//! Naming options. The mapper is process-wide, so this binary holds a
//! single test.

use asupersync::runtime::RuntimeBuilder;
use sqlbean::prelude::*;
use sqlbean::MapperKind;

fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

#[derive(Bean, Debug, Default, Clone, PartialEq)]
struct UserInfo {
    #[bean(pk, autoincr)]
    id: i64,
    #[bean(unique)]
    login: String,
}

#[test]
fn prefix_and_same_mapper_shape_table_names() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let options = EngineOptions::from_json(r#"{"mapper": "same", "table_prefix": "t_"}"#)
            .expect("valid options");
        assert_eq!(options.mapper, MapperKind::Same);
        let engine = Engine::with_options(SqliteConnection::open_memory().unwrap(), options);

        let meta = resolve::<UserInfo>().unwrap();
        assert_eq!(meta.name, "t_UserInfo");
        unwrap_outcome(engine.sync(&cx, &[meta]).await);
        assert!(unwrap_outcome(engine.is_table_exist(&cx, "t_UserInfo").await));

        let mut session = engine.new_session();
        let mut user = UserInfo {
            login: "ada".to_string(),
            ..UserInfo::default()
        };
        unwrap_outcome(session.insert(&cx, &mut user).await);
        assert_eq!(user.id, 1);

        let schema = unwrap_outcome(engine.db_metas(&cx).await);
        let table = schema.table("t_UserInfo").expect("prefixed table");
        assert!(table.indexes.iter().any(|i| i.unique && i.name == "UQE_t_UserInfo_login"));

        // A new mapper drops memoized metadata.
        engine.set_mapper(std::sync::Arc::new(sqlbean::SnakeMapper));
        assert_eq!(resolve::<UserInfo>().unwrap().name, "user_info");
    });
}
