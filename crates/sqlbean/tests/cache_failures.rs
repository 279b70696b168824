//! A broken cacher must never fail a read or a write.

use asupersync::runtime::RuntimeBuilder;
use sqlbean::prelude::*;
use sqlbean::{Cacher, LruCacher, Result, Row};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

#[derive(Bean, Debug, Default, Clone, PartialEq)]
struct Ticket {
    #[bean(pk, autoincr)]
    id: i64,
    title: String,
    #[bean(version)]
    version: i32,
}

/// Which cacher calls fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    Everything,
    BeanReads,
}

/// An LRU cacher with injected failures.
struct FailingCacher {
    inner: LruCacher,
    failure: Failure,
    failed: AtomicUsize,
}

impl FailingCacher {
    fn new(failure: Failure) -> Self {
        Self {
            inner: LruCacher::new(16),
            failure,
            failed: AtomicUsize::new(0),
        }
    }

    fn check(&self, bean_read: bool) -> Result<()> {
        if self.failure == Failure::Everything || bean_read {
            self.failed.fetch_add(1, Ordering::SeqCst);
            return Err(Error::Custom("cache backend unavailable".to_string()));
        }
        Ok(())
    }

    fn failures(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }
}

impl Cacher for FailingCacher {
    fn get_ids(&self, table: &str, fingerprint: &str) -> Result<Option<Vec<PrimaryKey>>> {
        self.check(false)?;
        self.inner.get_ids(table, fingerprint)
    }

    fn put_ids(&self, table: &str, fingerprint: &str, ids: Vec<PrimaryKey>) -> Result<()> {
        self.check(false)?;
        self.inner.put_ids(table, fingerprint, ids)
    }

    fn get_bean(&self, table: &str, key: &PrimaryKey) -> Result<Option<Row>> {
        self.check(self.failure == Failure::BeanReads)?;
        self.inner.get_bean(table, key)
    }

    fn put_bean(&self, table: &str, key: PrimaryKey, row: Row) -> Result<()> {
        self.check(false)?;
        self.inner.put_bean(table, key, row)
    }

    fn del_bean(&self, table: &str, key: &PrimaryKey) -> Result<()> {
        self.check(false)?;
        self.inner.del_bean(table, key)
    }

    fn clear_ids(&self, table: &str) -> Result<()> {
        self.check(false)?;
        self.inner.clear_ids(table)
    }

    fn clear_beans(&self, table: &str) -> Result<()> {
        self.check(false)?;
        self.inner.clear_beans(table)
    }

    fn clear_all(&self) -> Result<()> {
        self.check(false)?;
        self.inner.clear_all()
    }
}

fn engine_with(cacher: Arc<FailingCacher>) -> Engine<SqliteConnection> {
    let engine = Engine::new(SqliteConnection::open_memory().unwrap());
    let cacher: Arc<dyn Cacher> = cacher;
    engine.set_default_cacher(Some(cacher));
    engine
}

fn ticket(title: &str) -> Ticket {
    Ticket {
        title: title.to_string(),
        ..Ticket::default()
    }
}

#[test]
fn failing_cacher_falls_back_to_the_database() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let cacher = Arc::new(FailingCacher::new(Failure::Everything));
        let engine = engine_with(Arc::clone(&cacher));
        unwrap_outcome(engine.sync(&cx, &[resolve::<Ticket>().unwrap()]).await);
        let mut session = engine.new_session();

        let mut first = ticket("login broken");
        assert_eq!(unwrap_outcome(session.insert(&cx, &mut first).await), 1);
        assert_eq!(first.id, 1);
        let mut second = ticket("slow search");
        unwrap_outcome(session.insert(&cx, &mut second).await);

        let mut all: Vec<Ticket> = Vec::new();
        unwrap_outcome(session.asc(&["id"]).find(&cx, &mut all).await);
        assert_eq!(all, vec![first.clone(), second.clone()]);

        let mut loaded = Ticket::default();
        assert!(unwrap_outcome(session.id(PrimaryKey::single(2_i64)).get(&cx, &mut loaded).await));
        assert_eq!(loaded, second);

        loaded.title = "search fixed".to_string();
        assert_eq!(unwrap_outcome(session.update(&cx, &mut loaded).await), 1);
        let mut again: Vec<Ticket> = Vec::new();
        unwrap_outcome(session.asc(&["id"]).find(&cx, &mut again).await);
        assert_eq!(again[1].title, "search fixed");

        assert!(cacher.failures() > 0);
    });
}

#[test]
fn unreadable_bean_tier_requeries_the_rows() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let cacher = Arc::new(FailingCacher::new(Failure::BeanReads));
        let engine = engine_with(Arc::clone(&cacher));
        unwrap_outcome(engine.sync(&cx, &[resolve::<Ticket>().unwrap()]).await);
        let mut session = engine.new_session();
        unwrap_outcome(session.insert(&cx, &mut ticket("first")).await);

        let mut warm: Vec<Ticket> = Vec::new();
        unwrap_outcome(session.find(&cx, &mut warm).await);
        assert_eq!(cacher.failures(), 0);

        // The id set is cached; its beans cannot be read back.
        engine
            .connection()
            .execute_raw("UPDATE ticket SET title = 'edited'")
            .unwrap();
        let mut hit: Vec<Ticket> = Vec::new();
        unwrap_outcome(session.find(&cx, &mut hit).await);
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].title, "edited");
        assert!(cacher.failures() > 0);
    });
}
