use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use vista_session::{
    Configuration, ErrorKind, ListenerError, NotificationKind, ObjectSchema, Property, PropertyType,
    ResultView, Schema, Session, SessionError, SessionListener, SortSpec, Value,
};

fn person_schema() -> Vec<ObjectSchema> {
    vec![ObjectSchema::new(
        "Person",
        vec![
            Property::new("name", PropertyType::String),
            Property::new("age", PropertyType::Int),
        ],
    )]
}

fn open_people(dir: &TempDir) -> Session {
    let config = Configuration::new(dir.path().join("people.vista")).with_schema(person_schema());
    Session::open(config).unwrap()
}

fn add_people(s: &Session, people: &[(&str, i64)]) {
    s.run_in_transaction(|s| {
        for (name, age) in people {
            s.create_object(
                "Person",
                vec![("name", Value::from(*name)), ("age", Value::Int(*age))],
                false,
            )?;
        }
        Ok::<_, SessionError>(())
    })
    .unwrap();
}

fn ages(view: &ResultView) -> Vec<i64> {
    view.to_vec()
        .unwrap()
        .iter()
        .map(|o| o.get("age").unwrap().as_int().unwrap())
        .collect()
}

fn names(view: &ResultView) -> Vec<String> {
    view.to_vec()
        .unwrap()
        .iter()
        .map(|o| o.get("name").unwrap().as_str().unwrap().to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[test]
fn fresh_store_has_empty_views_for_every_type() {
    let dir = TempDir::new().unwrap();
    let config = Configuration::new(dir.path().join("fresh.vista")).with_schema(vec![
        ObjectSchema::new("A", vec![Property::new("x", PropertyType::Int)]),
        ObjectSchema::new("B", vec![Property::new("y", PropertyType::String)]),
    ]);
    let s = Session::open(config).unwrap();
    for object_type in s.schema().names() {
        assert_eq!(s.objects(object_type).unwrap().len().unwrap(), 0);
    }
}

#[test]
fn tautological_second_filter_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let s = open_people(&dir);
    add_people(&s, &[("Ann", 30), ("Bob", 15), ("Cy", 45)]);

    let adults = s.objects_where("Person", "age >= 18", &[]).unwrap();
    let again = adults.filtered("TRUEPREDICATE", &[]).unwrap();
    assert_eq!(adults.keys().unwrap(), again.keys().unwrap());
}

#[test]
fn multi_key_sort_breaks_ties_and_reverses() {
    let dir = TempDir::new().unwrap();
    let s = open_people(&dir);
    add_people(&s, &[("Ann", 30), ("Bob", 20), ("Cy", 30), ("Di", 20)]);

    let spec = SortSpec::from([("age", true), ("name", false)]);
    let forward = s.objects("Person").unwrap().sorted(spec.clone()).unwrap();
    assert_eq!(names(&forward), ["Di", "Bob", "Cy", "Ann"]);

    let backward = s.objects("Person").unwrap().sorted(spec.reversed()).unwrap();
    let mut reversed = names(&forward);
    reversed.reverse();
    assert_eq!(names(&backward), reversed);
}

#[test]
fn delete_shrinks_live_view_but_not_snapshot() {
    let dir = TempDir::new().unwrap();
    let s = open_people(&dir);
    add_people(&s, &[("Ann", 30), ("Bob", 20), ("Cy", 40)]);

    let live = s.objects("Person").unwrap();
    let snapshot = live.snapshot().unwrap();
    let bob = live.get(1).unwrap().unwrap();

    s.run_in_transaction(|s| s.delete(&bob)).unwrap();

    assert_eq!(live.len().unwrap(), 2);
    assert!(!live.to_vec().unwrap().contains(&bob));
    assert_eq!(snapshot.len().unwrap(), 3);
    assert!(snapshot.get(1).unwrap().is_none());
}

#[test]
fn duplicate_listener_is_notified_once() {
    let dir = TempDir::new().unwrap();
    let s = open_people(&dir);
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    let listener: Arc<SessionListener> = Arc::new(
        move |_: &Session, _: NotificationKind| -> Result<(), ListenerError> {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
    );
    s.add_listener("change", listener.clone()).unwrap();
    s.add_listener("change", listener).unwrap();

    add_people(&s, &[("Ann", 30)]);
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn second_begin_write_is_rejected_without_side_effects() {
    let dir = TempDir::new().unwrap();
    let s = open_people(&dir);
    let scope = s.begin_write().unwrap();
    s.create_object("Person", vec![("name", Value::from("Ann")), ("age", Value::Int(1))], false)
        .unwrap();

    let err = s.begin_write().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyInTransaction);
    assert_eq!(s.objects("Person").unwrap().len().unwrap(), 1);

    scope.commit().unwrap();
    assert_eq!(s.objects("Person").unwrap().len().unwrap(), 1);
}

// ---------------------------------------------------------------------------
// End-to-end
// ---------------------------------------------------------------------------

#[test]
fn create_commit_and_filter_with_arguments() {
    let dir = TempDir::new().unwrap();
    let s = open_people(&dir);
    add_people(&s, &[("Ann", 30)]);

    let people = s.objects("Person").unwrap();
    assert_eq!(people.filtered("age > $0", &[Value::Int(25)]).unwrap().len().unwrap(), 1);
    assert_eq!(people.filtered("age > $0", &[Value::Int(40)]).unwrap().len().unwrap(), 0);
}

#[test]
fn descending_sort_by_age() {
    let dir = TempDir::new().unwrap();
    let s = open_people(&dir);
    add_people(&s, &[("a", 10), ("b", 20), ("c", 30)]);

    let sorted = s.objects("Person").unwrap().sorted(("age", false)).unwrap();
    assert_eq!(ages(&sorted), [30, 20, 10]);
    assert_eq!(sorted.get(0).unwrap().unwrap().get("age").unwrap(), Value::Int(30));
}

#[test]
fn listener_sees_one_change_then_nothing_after_removal() {
    let dir = TempDir::new().unwrap();
    let s = open_people(&dir);
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    s.add_listener(
        "change",
        Arc::new(move |_: &Session, kind: NotificationKind| -> Result<(), ListenerError> {
            sink.lock().unwrap().push(kind.to_string());
            Ok(())
        }),
    )
    .unwrap();

    add_people(&s, &[("Ann", 30)]);
    assert_eq!(*events.lock().unwrap(), vec!["change".to_string()]);

    assert_eq!(s.remove_all_listeners().unwrap(), 1);
    add_people(&s, &[("Bob", 40)]);
    assert_eq!(events.lock().unwrap().len(), 1);
}

#[test]
fn data_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let s = open_people(&dir);
        add_people(&s, &[("Ann", 30), ("Bob", 40)]);
        s.close();
    }
    let s = Session::open(Configuration::new(dir.path().join("people.vista"))).unwrap();
    assert_eq!(s.schema().len(), 1);
    assert_eq!(names(&s.objects("Person").unwrap()), ["Ann", "Bob"]);
}

#[test]
fn migration_keeps_data_and_adds_columns() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("migrate.vista");
    {
        let s = Session::open(Configuration::new(&path).with_schema(person_schema())).unwrap();
        add_people(&s, &[("Ann", 30)]);
        s.close();
    }

    let mut v2 = person_schema();
    v2[0]
        .properties
        .push(Property::new("email", PropertyType::String).with_default("none"));
    let unchanged_version = Configuration::new(&path).with_schema(v2.clone());
    assert_eq!(
        Session::open(unchanged_version).unwrap_err().kind(),
        ErrorKind::Configuration
    );

    let s = Session::open(Configuration::new(&path).with_schema(v2).with_schema_version(1)).unwrap();
    let ann = s.objects("Person").unwrap().get(0).unwrap().unwrap();
    assert_eq!(ann.get("age").unwrap(), Value::Int(30));
    assert_eq!(ann.get("email").unwrap(), Value::from("none"));
    s.close();

    let older = Configuration::new(&path).with_schema(person_schema());
    assert_eq!(Session::open(older).unwrap_err().kind(), ErrorKind::Configuration);
}

#[test]
fn key_paths_traverse_links() {
    let dir = TempDir::new().unwrap();
    let config = Configuration::new(dir.path().join("pets.vista")).with_schema(vec![
        ObjectSchema::new("Person", vec![Property::new("name", PropertyType::String)]),
        ObjectSchema::new(
            "Dog",
            vec![
                Property::new("name", PropertyType::String),
                Property::new("owner", PropertyType::Object("Person".into())),
            ],
        ),
    ]);
    let s = Session::open(config).unwrap();
    s.run_in_transaction(|s| {
        let ann = s.create_object("Person", vec![("name", Value::from("Ann"))], false)?;
        let bob = s.create_object("Person", vec![("name", Value::from("Bob"))], false)?;
        s.create_object("Dog", vec![("name", Value::from("Rex")), ("owner", Value::from(&ann))], false)?;
        s.create_object("Dog", vec![("name", Value::from("Fido")), ("owner", Value::from(&bob))], false)?;
        s.create_object("Dog", vec![("name", Value::from("Stray"))], false)?;
        Ok::<_, SessionError>(())
    })
    .unwrap();

    let anns = s
        .objects_where("Dog", "owner.name BEGINSWITH[c] $0", &[Value::from("a")])
        .unwrap();
    assert_eq!(names(&anns), ["Rex"]);

    let dogs = s.objects("Dog").unwrap();
    let by_owner_desc = dogs.sorted(("owner.name", false)).unwrap();
    assert_eq!(names(&by_owner_desc), ["Fido", "Rex", "Stray"]);
    let by_owner_asc = dogs.sorted(("owner.name", true)).unwrap();
    assert_eq!(names(&by_owner_asc), ["Stray", "Rex", "Fido"]);
}

#[test]
fn nested_objects_and_object_defaults_persist() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested.vista");
    let schema = Schema::from_json(
        r#"{"types":[
            {"name":"TestObject","properties":[{"name":"doubleCol","type":"double"}]},
            {"name":"DefaultValuesObject","properties":[
                {"name":"intCol","type":"int","default":-1},
                {"name":"objectCol","type":"TestObject","default":{"doubleCol":1}},
                {"name":"nullObjectCol","type":"TestObject"},
                {"name":"arrayCol","type":"list","object_type":"TestObject","default":[{"doubleCol":2}]}
            ]}
        ]}"#,
    )
    .unwrap();
    {
        let s = Session::open(Configuration::new(&path).with_schema(schema.to_vec())).unwrap();
        s.run_in_transaction(|s| {
            s.create_object("DefaultValuesObject", Vec::<(&str, Value)>::new(), false)?;
            s.create_object(
                "DefaultValuesObject",
                vec![
                    ("objectCol", Value::object([("doubleCol", Value::Double(3.0))])),
                    ("arrayCol", Value::Array(vec![])),
                ],
                false,
            )
        })
        .unwrap();
        s.close();
    }

    let s = Session::open(Configuration::new(&path)).unwrap();
    let objects = s.objects("DefaultValuesObject").unwrap();
    let (first, second) = (objects.get(0).unwrap().unwrap(), objects.get(1).unwrap().unwrap());
    let double = |o: &vista_session::Object, p: &str| o.get_object(p).unwrap().map(|t| t.get("doubleCol").unwrap());

    assert_eq!(first.get("intCol").unwrap(), Value::Int(-1));
    assert_eq!(double(&first, "objectCol"), Some(Value::Double(1.0)));
    assert_eq!(double(&first, "nullObjectCol"), None);
    let array = first.list("arrayCol").unwrap();
    assert_eq!(array.len().unwrap(), 1);
    assert_eq!(array.get(0).unwrap().get("doubleCol").unwrap(), Value::Double(2.0));

    assert_eq!(double(&second, "objectCol"), Some(Value::Double(3.0)));
    assert!(second.list("arrayCol").unwrap().is_empty().unwrap());
    assert_eq!(s.objects("TestObject").unwrap().len().unwrap(), 3);
}

#[test]
fn live_view_listener_receives_diffs_across_sessions() {
    let dir = TempDir::new().unwrap();
    let writer = open_people(&dir);
    let reader = open_people(&dir);
    let view = reader.objects("Person").unwrap().sorted("age").unwrap();

    let changes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&changes);
    view.add_listener(Arc::new(
        move |v: &ResultView, change: &vista_session::ViewChange| -> Result<(), ListenerError> {
            sink.lock().unwrap().push((v.len()?, change.insertions.clone()));
            Ok(())
        },
    ))
    .unwrap();

    add_people(&writer, &[("Ann", 30)]);
    add_people(&writer, &[("Kid", 5)]);
    assert_eq!(*changes.lock().unwrap(), vec![(1, vec![0]), (2, vec![0])]);
}
