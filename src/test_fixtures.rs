//! Entity types and sessions shared by the unit tests

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::cell::Cell;
use std::rc::Rc;

use crate::database::{ContentValues, DatabaseConn, Driver, Query, Row, Value};
use crate::error::DriverError;
use crate::mapping::{Entity, Handle, JsonSerializer, SchemaBuilder, SerializerRegistry};
use crate::session::{Session, SessionOptions};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Note {
    pub title: String,
    pub pinned: bool,
}

impl Note {
    pub fn new(title: &str, pinned: bool) -> Self {
        Self {
            title: title.to_string(),
            pinned,
        }
    }
}

impl Entity for Note {
    const TABLE: &'static str = "Notes";

    fn declare(schema: &mut SchemaBuilder<Self>) {
        schema
            .column("title", |n| Some(&n.title), |n, v| n.title = v)
            .column("pinned", |n| Some(&n.pinned), |n, v| n.pinned = v);
    }
}

#[derive(Debug, Default)]
pub struct Author {
    pub name: String,
}

impl Author {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl Entity for Author {
    const TABLE: &'static str = "Authors";

    fn declare(schema: &mut SchemaBuilder<Self>) {
        schema.column("name", |a| Some(&a.name), |a, v| a.name = v);
    }
}

#[derive(Debug, Default)]
pub struct Article {
    pub title: String,
    pub author: Option<Handle<Author>>,
    pub published: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
}

impl Entity for Article {
    const TABLE: &'static str = "Articles";

    fn declare(schema: &mut SchemaBuilder<Self>) {
        schema
            .column("title", |a| Some(&a.title), |a, v| a.title = v)
            .reference("author", |a| a.author.as_ref(), |a, v| a.author = Some(v))
            .serialized("published", |a| a.published.as_ref(), |a, v| {
                a.published = Some(v)
            })
            .serialized("tags", |a| Some(&a.tags), |a, v| a.tags = v);
    }
}

/// Tree node with a self-referencing parent
#[derive(Debug, Default)]
pub struct Node {
    pub label: String,
    pub parent: Option<Handle<Node>>,
}

impl Node {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            parent: None,
        }
    }
}

impl Entity for Node {
    const TABLE: &'static str = "Nodes";

    fn declare(schema: &mut SchemaBuilder<Self>) {
        schema
            .column("label", |n| Some(&n.label), |n, v| n.label = v)
            .reference("parent", |n| n.parent.as_ref(), |n, v| n.parent = Some(v));
    }
}

/// One nullable column per storage kind, plus both date serializers
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Sample {
    pub label: Option<String>,
    pub flag: Option<bool>,
    pub small: Option<i16>,
    pub count: Option<i32>,
    pub big: Option<i64>,
    pub weight: Option<f32>,
    pub ratio: Option<f64>,
    pub grade: Option<char>,
    pub seen: Option<DateTime<Utc>>,
    pub day: Option<NaiveDate>,
}

impl Sample {
    pub fn filled() -> Self {
        Self {
            label: Some("sample".to_string()),
            flag: Some(true),
            small: Some(-7),
            count: Some(i32::MIN),
            big: Some(i64::MAX),
            weight: Some(1.5),
            ratio: Some(0.1),
            grade: Some('B'),
            seen: Utc.timestamp_millis_opt(1_700_000_000_123).single(),
            day: NaiveDate::from_ymd_opt(2024, 2, 29),
        }
    }
}

impl Entity for Sample {
    const TABLE: &'static str = "Samples";

    fn declare(schema: &mut SchemaBuilder<Self>) {
        schema
            .column("label", |s| s.label.as_ref(), |s, v| s.label = Some(v))
            .column("flag", |s| s.flag.as_ref(), |s, v| s.flag = Some(v))
            .column("small", |s| s.small.as_ref(), |s, v| s.small = Some(v))
            .column("count", |s| s.count.as_ref(), |s, v| s.count = Some(v))
            .column("big", |s| s.big.as_ref(), |s, v| s.big = Some(v))
            .column("weight", |s| s.weight.as_ref(), |s, v| s.weight = Some(v))
            .column("ratio", |s| s.ratio.as_ref(), |s, v| s.ratio = Some(v))
            .column("grade", |s| s.grade.as_ref(), |s, v| s.grade = Some(v))
            .serialized("seen", |s| s.seen.as_ref(), |s, v| s.seen = Some(v))
            .serialized("day", |s| s.day.as_ref(), |s, v| s.day = Some(v));
    }
}

/// A domain type nobody registers a serializer for
#[derive(Debug, Default)]
pub struct Widget(pub u8);

#[derive(Debug, Default)]
pub struct Gadget {
    pub widget: Option<Widget>,
}

impl Entity for Gadget {
    const TABLE: &'static str = "Gadgets";

    fn declare(schema: &mut SchemaBuilder<Self>) {
        schema.serialized("widget", |g| g.widget.as_ref(), |g, v| g.widget = Some(v));
    }
}

#[derive(Debug, Default)]
pub struct DuplicateColumn {
    pub name: String,
}

impl Entity for DuplicateColumn {
    const TABLE: &'static str = "Duplicates";

    fn declare(schema: &mut SchemaBuilder<Self>) {
        schema
            .column("name", |d| Some(&d.name), |d, v| d.name = v)
            .column("Name", |d| Some(&d.name), |d, v| d.name = v);
    }
}

#[derive(Debug, Default)]
pub struct BadKey {
    pub id: i64,
}

impl Entity for BadKey {
    const TABLE: &'static str = "BadKeys";

    fn declare(schema: &mut SchemaBuilder<Self>) {
        schema.column("id", |b| Some(&b.id), |b, v| b.id = v);
    }
}

#[derive(Debug, Default)]
pub struct InvalidName {
    pub value: i32,
}

impl Entity for InvalidName {
    const TABLE: &'static str = "InvalidNames";

    fn declare(schema: &mut SchemaBuilder<Self>) {
        schema.column("bad name", |i| Some(&i.value), |i, v| i.value = v);
    }
}

/// Built-in serializers plus JSON for `Vec<String>`
pub fn fixture_registry() -> SerializerRegistry {
    let mut registry = SerializerRegistry::with_defaults();
    registry.register(JsonSerializer::<Vec<String>>::new());
    registry
}

/// In-memory session with every valid fixture table created
pub fn fixture_session() -> Session {
    fixture_session_with(SessionOptions::default(), true)
}

pub fn fixture_session_with(options: SessionOptions, foreign_keys: bool) -> Session {
    let conn = DatabaseConn::open_with(None, foreign_keys).unwrap();
    prepare(Session::with_options(conn, options))
}

/// Session whose driver counts the fetch statements it runs
pub fn counting_session() -> (Session, Rc<Cell<usize>>) {
    let queries = Rc::new(Cell::new(0));
    let driver = CountingDriver {
        inner: DatabaseConn::open_in_memory().unwrap(),
        queries: Rc::clone(&queries),
    };
    (prepare(Session::new(driver)), queries)
}

fn prepare(mut session: Session) -> Session {
    session.register_serializer(JsonSerializer::<Vec<String>>::new());
    session.create_table::<Note>().unwrap();
    session.create_table::<Author>().unwrap();
    session.create_table::<Article>().unwrap();
    session.create_table::<Node>().unwrap();
    session.create_table::<Sample>().unwrap();
    session
}

pub struct CountingDriver {
    inner: DatabaseConn,
    queries: Rc<Cell<usize>>,
}

impl CountingDriver {
    fn tick(&self) {
        self.queries.set(self.queries.get() + 1);
    }
}

impl Driver for CountingDriver {
    fn query(&self, table: &str, query: &Query) -> Result<Vec<Row>, DriverError> {
        self.tick();
        self.inner.query(table, query)
    }

    fn raw_query(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>, DriverError> {
        self.tick();
        self.inner.raw_query(sql, args)
    }

    fn insert(&self, table: &str, values: &ContentValues) -> Result<i64, DriverError> {
        self.inner.insert(table, values)
    }

    fn update(
        &self,
        table: &str,
        values: &ContentValues,
        where_clause: &str,
        args: &[Value],
    ) -> Result<usize, DriverError> {
        self.inner.update(table, values, where_clause, args)
    }

    fn delete(
        &self,
        table: &str,
        where_clause: Option<&str>,
        args: &[Value],
    ) -> Result<usize, DriverError> {
        self.inner.delete(table, where_clause, args)
    }

    fn execute(&self, sql: &str, args: &[Value]) -> Result<usize, DriverError> {
        self.inner.execute(sql, args)
    }
}
