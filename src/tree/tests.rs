//! Tests for the runtime option tree.

use super::*;
use crate::config::{Config, LinkTargetPolicy, LockedWritePolicy};
use crate::error::{OptreeError, Result};
use crate::manager::{OptionManager, SchemaDef};
use crate::types::OptionDef;
use crate::value::Value;
use serde_json::json;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

// ============================================================================
// Helpers
// ============================================================================

type Log = Rc<RefCell<Vec<(String, Value)>>>;

fn tree_with(schema: SchemaDef, config: Config) -> Tree {
    let schema = OptionManager::new().build_schema(&schema).unwrap();
    Tree::with_config(&schema, config).unwrap()
}

fn tree_of(schema: SchemaDef) -> Tree {
    tree_with(schema, Config::default())
}

fn tree_err(schema: SchemaDef) -> OptreeError {
    let schema = OptionManager::new().build_schema(&schema).unwrap();
    Tree::new(&schema).unwrap_err()
}

fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

/// Watcher that records `(label, event.value)`.
fn record(log: &Log, label: &str) -> impl Fn(&mut Tree, &mut WatchEvent) -> Result<()> + 'static {
    let log = Rc::clone(log);
    let label = label.to_string();
    move |_, event| {
        log.borrow_mut().push((label.clone(), event.value.clone()));
        Ok(())
    }
}

fn labels(log: &Log) -> Vec<String> {
    log.borrow().iter().map(|(l, _)| l.clone()).collect()
}

fn number() -> OptionDef {
    OptionDef::new("number")
}

fn numbers() -> OptionDef {
    OptionDef::new("arrayCollection").proto(number())
}

fn retries_schema() -> SchemaDef {
    SchemaDef::new()
        .with("retries", number().attr("minValue", 0).value(3))
        .with("timeout", number().link("$retries$"))
}

// ============================================================================
// Reads, writes and defaults
// ============================================================================

#[test]
fn test_defaults_and_explicit_values() {
    let mut tree = tree_of(
        SchemaDef::new()
            .with("port", number().value(80))
            .with("name", OptionDef::new("string"))
            .with("extra", OptionDef::new("untyped")),
    );

    assert_eq!(tree.get("port").unwrap(), json!(80));
    assert_eq!(tree.get("name").unwrap(), json!(""));
    assert!(tree.is_empty(tree.option("extra").unwrap()).unwrap());

    let port = tree.option("port").unwrap();
    assert_eq!(tree.raw_value(port).unwrap(), None);
    assert_eq!(tree.raw_value_default(port).unwrap(), Some(json!(80)));

    tree.set("port", json!(8080)).unwrap();
    assert_eq!(tree.get("port").unwrap(), json!(8080));
    assert_eq!(tree.raw_value(port).unwrap(), Some(json!(8080)));
    assert!(tree.is_valid(port).unwrap());

    tree.reset_value(port).unwrap();
    assert_eq!(tree.get("port").unwrap(), json!(80));
}

#[test]
fn test_invalid_write_is_rejected() {
    let mut tree = tree_of(SchemaDef::new().with("port", number().attr("maxValue", 100)));
    let err = tree.set("port", json!(500)).unwrap_err();
    assert!(matches!(err, OptreeError::ValueValidationError(_)));
    assert!(err.to_string().contains("\"port\""));
    assert_eq!(tree.get("port").unwrap(), json!(0));

    assert!(tree.set("port", json!(null)).is_err());
}

#[test]
fn test_read_only_option() {
    let mut tree = tree_of(SchemaDef::new().with("id", number().value(1).writable(false)));
    let id = tree.option("id").unwrap();
    assert!(!tree.is_writable(id).unwrap());

    let err = tree.set("id", json!(2)).unwrap_err();
    assert!(matches!(err, OptreeError::AccessError(_)));
    assert!(tree.reset_value(id).is_err());
    assert_eq!(tree.get("id").unwrap(), json!(1));
}

#[test]
fn test_set_value_default() {
    let mut tree = tree_of(
        SchemaDef::new()
            .with("n", number())
            .with("server", OptionDef::map().child("host", OptionDef::new("string"))),
    );
    let n = tree.option("n").unwrap();
    let log = new_log();
    tree.watch("n", record(&log, "n")).unwrap();

    tree.set_value_default(n, json!(5)).unwrap();
    assert_eq!(tree.get("n").unwrap(), json!(5));
    assert_eq!(tree.raw_value(n).unwrap(), None);
    assert_eq!(labels(&log), vec!["n"]);

    assert!(tree.set_value_default(n, json!("x")).is_err());

    let server = tree.option("server").unwrap();
    tree.set_value_default(server, json!({"host": "h"})).unwrap();
    assert_eq!(tree.get("server.host").unwrap(), json!("h"));
}

#[test]
fn test_getter_and_setter_hooks() {
    let mut tree = tree_of(
        SchemaDef::new()
            .with(
                "doubled",
                number()
                    .value(2)
                    .getter(|g| Ok(json!(g.value()?.as_f64().unwrap_or(0.0) * 2.0))),
            )
            .with(
                "code",
                OptionDef::new("string").setter(|s, v| {
                    let upper = v.as_str().unwrap_or("").to_uppercase();
                    s.set(json!(upper))
                }),
            ),
    );

    assert_eq!(tree.get("doubled").unwrap().as_f64(), Some(4.0));
    tree.set("doubled", json!(5)).unwrap();
    assert_eq!(tree.get("doubled").unwrap().as_f64(), Some(10.0));

    tree.set("code", json!("abc")).unwrap();
    assert_eq!(tree.get("code").unwrap(), json!("ABC"));
}

// ============================================================================
// Links
// ============================================================================

#[test]
fn test_linked_default_follows_target() {
    let mut tree = tree_of(retries_schema());
    let log = new_log();
    tree.watch("timeout", record(&log, "timeout")).unwrap();

    assert_eq!(tree.get("timeout").unwrap(), json!(3));

    tree.set("retries", json!(5)).unwrap();
    assert_eq!(tree.get("timeout").unwrap(), json!(5));
    assert_eq!(*log.borrow(), vec![("timeout".to_string(), json!(5))]);

    tree.set("timeout", json!(10)).unwrap();
    tree.set("retries", json!(6)).unwrap();
    assert_eq!(tree.get("timeout").unwrap(), json!(10));
    assert_eq!(log.borrow().len(), 2);

    let timeout = tree.option("timeout").unwrap();
    tree.reset_value(timeout).unwrap();
    assert_eq!(tree.get("timeout").unwrap(), json!(6));
}

#[test]
fn test_link_introspection_and_removal() {
    let mut tree = tree_of(retries_schema());
    let retries = tree.option("retries").unwrap();
    let timeout = tree.option("timeout").unwrap();

    assert!(tree.has_link(timeout, "$retries$").unwrap());
    assert_eq!(tree.links(timeout).unwrap().len(), 1);
    assert_eq!(tree.dependents(retries).unwrap(), vec![timeout]);

    assert!(tree.remove_link(timeout, "$retries$").unwrap());
    assert!(!tree.remove_link(timeout, "$retries$").unwrap());
    assert_eq!(tree.get("timeout").unwrap(), json!(0));
    assert!(tree.dependents(retries).unwrap().is_empty());
}

#[test]
fn test_add_link_at_runtime() {
    let mut tree = tree_of(
        SchemaDef::new()
            .with("source", number().value(7))
            .with("copy", number()),
    );
    let copy = tree.option("copy").unwrap();
    let log = new_log();
    tree.watch("copy", record(&log, "copy")).unwrap();

    tree.add_link(copy, "$source$").unwrap();
    assert_eq!(tree.get("copy").unwrap(), json!(7));
    assert_eq!(labels(&log), vec!["copy"]);

    let err = tree.add_link(copy, "source").unwrap_err();
    assert!(matches!(err, OptreeError::SchemaDefinitionError(_)));
}

#[test]
fn test_link_priority_and_two_pass_choice() {
    let mut tree = tree_of(
        SchemaDef::new()
            .with("base", number().value(1))
            .with("a", number().link("$base$"))
            .with("b", number().value(2))
            .with("t", number().link("$a?priority=10$").value("$b$")),
    );
    let t = tree.option("t").unwrap();
    let paths: Vec<String> = tree.links(t).unwrap().into_iter().map(|l| l.path).collect();
    assert_eq!(paths, vec!["a", "b"]);

    // `a` is itself linked and holds nothing explicit, so `b` wins
    assert_eq!(tree.get("t").unwrap(), json!(2));

    tree.set("a", json!(5)).unwrap();
    assert_eq!(tree.get("t").unwrap(), json!(5));
}

#[test]
fn test_relative_links() {
    let mut tree = tree_of(
        SchemaDef::new().with(
            "server",
            OptionDef::map()
                .child("port", number().value(80))
                .child("admin_port", number().link("$./port$")),
        ),
    );
    assert_eq!(tree.get("server.admin_port").unwrap(), json!(80));
    tree.set("server.port", json!(81)).unwrap();
    assert_eq!(tree.get("server.admin_port").unwrap(), json!(81));
}

#[test]
fn test_map_link_propagates_to_children() {
    let mut tree = tree_of(
        SchemaDef::new()
            .with(
                "base",
                OptionDef::map()
                    .child("host", OptionDef::new("string").value("a"))
                    .child("port", number().value(1)),
            )
            .with(
                "mirror",
                OptionDef::map()
                    .child("host", OptionDef::new("string"))
                    .child("port", number())
                    .link("$base$"),
            ),
    );
    let mirror_port = tree.option("mirror.port").unwrap();
    assert!(tree.has_link(mirror_port, "$base.port$").unwrap());
    assert_eq!(tree.get("mirror").unwrap(), json!({"host": "a", "port": 1}));

    let log = new_log();
    tree.watch("mirror", record(&log, "mirror")).unwrap();
    tree.set("base.port", json!(2)).unwrap();
    assert_eq!(tree.get("mirror.port").unwrap(), json!(2));
    assert_eq!(*log.borrow(), vec![("mirror".to_string(), json!({"port": 2}))]);
}

#[test]
fn test_collection_links_reach_new_items() {
    let mut tree = tree_of(
        SchemaDef::new()
            .with("defaults", numbers().value(json!([10, 20, 30])))
            .with("list", numbers().link("$defaults$")),
    );
    let list = tree.option("list").unwrap();

    tree.set_item(list, "2", json!(7)).unwrap();
    assert_eq!(tree.get("list").unwrap(), json!([10, 20, 7]));

    let first = tree.item(list, "0").unwrap().unwrap();
    assert!(tree.has_link(first, "$defaults.0$").unwrap());

    let log = new_log();
    tree.watch("list", record(&log, "list")).unwrap();
    tree.set("defaults[1]", json!(25)).unwrap();
    assert_eq!(tree.get("list").unwrap(), json!([10, 25, 7]));
    assert_eq!(*log.borrow(), vec![("list".to_string(), json!({"1": 25}))]);
}

#[test]
fn test_map_write_with_link_string() {
    let mut tree = tree_of(
        SchemaDef::new()
            .with("server", OptionDef::map().child("port", number().value(80)))
            .with("admin", OptionDef::map().child("port", number())),
    );
    tree.set("admin", json!({"port": "$server.port$"})).unwrap();

    let admin_port = tree.option("admin.port").unwrap();
    assert!(tree.has_link(admin_port, "$server.port$").unwrap());
    assert_eq!(tree.get("admin.port").unwrap(), json!(80));
}

#[test]
fn test_map_write_with_link_string_reaches_nested_members() {
    let mut tree = tree_of(
        SchemaDef::new()
            .with("base", OptionDef::map().child("port", number().value(80)))
            .with(
                "outer",
                OptionDef::map().child("inner", OptionDef::map().child("port", number())),
            ),
    );
    tree.set("outer.inner.port", json!(5)).unwrap();
    tree.set("outer", json!({"inner": "$base$"})).unwrap();

    let inner_port = tree.option("outer.inner.port").unwrap();
    assert!(tree.has_link(inner_port, "$base.port$").unwrap());
    assert_eq!(tree.raw_value(inner_port).unwrap(), None);
    assert_eq!(tree.get("outer.inner.port").unwrap(), json!(80));

    tree.set("base.port", json!(81)).unwrap();
    assert_eq!(tree.get("outer.inner").unwrap(), json!({"port": 81}));
}

#[test]
fn test_incompatible_link_is_rejected() {
    let err = tree_err(
        SchemaDef::new()
            .with("wide", number())
            .with("narrow", number().attr("maxValue", 10).link("$wide$")),
    );
    assert!(matches!(err, OptreeError::SchemaDefinitionError(_)));
    assert!(err.to_string().contains("not compatible"));

    let err = tree_err(
        SchemaDef::new()
            .with("text", OptionDef::new("string"))
            .with("n", number().link("$text$")),
    );
    assert!(err.to_string().contains("not compatible"));
}

#[test]
fn test_unknown_link_target_policy() {
    let schema = || SchemaDef::new().with("n", number().link("$missing$"));

    let err = tree_err(schema());
    assert!(err.to_string().contains("unknown option"));

    let config = Config {
        unknown_link_targets: LinkTargetPolicy::Ignore,
        ..Config::default()
    };
    let tree = tree_with(schema(), config);
    let n = tree.option("n").unwrap();
    assert!(tree.links(n).unwrap().is_empty());
    assert_eq!(tree.get("n").unwrap(), json!(0));
}

#[test]
fn test_link_cycles_are_rejected() {
    let err = tree_err(
        SchemaDef::new()
            .with("a", number().link("$b$"))
            .with("b", number().link("$a$")),
    );
    assert!(matches!(err, OptreeError::SchemaDefinitionError(_)));
    assert!(err.to_string().contains("cycle"));

    let mut tree = tree_of(
        SchemaDef::new()
            .with("a", number().link("$b$"))
            .with("b", number().value(1)),
    );
    let b = tree.option("b").unwrap();
    let err = tree.add_link(b, "$a$").unwrap_err();
    assert!(err.to_string().contains("cycle"));
    assert_eq!(tree.get("a").unwrap(), json!(1));
}

// ============================================================================
// Bubbling
// ============================================================================

fn nested_schema() -> SchemaDef {
    SchemaDef::new().with(
        "a",
        OptionDef::map().child("b", OptionDef::map().child("c", number())),
    )
}

#[test]
fn test_changes_bubble_to_ancestors_and_root() {
    let mut tree = tree_of(nested_schema());
    let log = new_log();
    tree.watch("a.b.c", record(&log, "c")).unwrap();
    tree.watch("a.b", record(&log, "b")).unwrap();
    tree.watch("a", record(&log, "a")).unwrap();
    tree.watch_root(record(&log, "root"));

    tree.set("a.b.c", json!(3)).unwrap();
    assert_eq!(
        *log.borrow(),
        vec![
            ("c".to_string(), json!(3)),
            ("b".to_string(), json!({"c": 3})),
            ("a".to_string(), json!({"b": {"c": 3}})),
            ("root".to_string(), json!({"a": {"b": {"c": 3}}})),
        ]
    );
}

#[test]
fn test_event_fields_while_bubbling() {
    let mut tree = tree_of(nested_schema());
    let c = tree.option("a.b.c").unwrap();
    let seen: Rc<RefCell<Vec<(Target, Target, bool, Value)>>> = Rc::new(RefCell::new(Vec::new()));

    let sink = Rc::clone(&seen);
    tree.watch("a.b", move |_, event| {
        sink.borrow_mut()
            .push((event.target, event.current, event.bubbled, event.old.clone()));
        Ok(())
    })
    .unwrap();

    tree.set("a.b.c", json!(3)).unwrap();
    let b = tree.option("a.b").unwrap();
    assert_eq!(
        *seen.borrow(),
        vec![(Target::Option(c), Target::Option(b), true, json!({"c": 0}))]
    );
}

#[test]
fn test_stop_propagation() {
    let mut tree = tree_of(nested_schema());
    let log = new_log();
    tree.watch("a.b", |_, event| {
        event.stop_propagation();
        Ok(())
    })
    .unwrap();
    tree.watch("a.b", record(&log, "b")).unwrap();
    tree.watch("a", record(&log, "a")).unwrap();
    tree.watch_root(record(&log, "root"));

    tree.set("a.b.c", json!(1)).unwrap();
    assert_eq!(labels(&log), vec!["b"]);
}

#[test]
fn test_stop_propagation_still_forwards_to_dependents() {
    let mut tree = tree_of(nested_schema().with(
        "d",
        OptionDef::map().child("c", number()).link("$a.b$"),
    ));
    let log = new_log();
    tree.watch("a.b", |_, event| {
        event.stop_propagation();
        Ok(())
    })
    .unwrap();
    tree.watch("a", record(&log, "a")).unwrap();
    tree.watch("d", record(&log, "d")).unwrap();

    tree.set("a.b.c", json!(1)).unwrap();
    assert_eq!(labels(&log), vec!["d"]);
    assert_eq!(tree.get("d.c").unwrap(), json!(1));
}

#[test]
fn test_type_watcher_runs_before_instance_watchers() {
    let log = new_log();
    let type_log = Rc::clone(&log);
    let mut tree = tree_of(SchemaDef::new().with(
        "n",
        number().watcher(move |_, event| {
            type_log
                .borrow_mut()
                .push(("type".to_string(), event.value.clone()));
            Ok(())
        }),
    ));
    tree.watch("n", record(&log, "instance")).unwrap();

    tree.set("n", json!(1)).unwrap();
    assert_eq!(labels(&log), vec!["type", "instance"]);
}

#[test]
fn test_unchanged_writes_do_not_notify() {
    let mut tree = tree_of(SchemaDef::new().with("n", number().value(1)));
    let log = new_log();
    tree.watch("n", record(&log, "n")).unwrap();

    tree.set("n", json!(1)).unwrap();
    tree.set("n", json!(1.0)).unwrap();
    assert!(log.borrow().is_empty());
}

#[test]
fn test_unwatch() {
    let mut tree = tree_of(SchemaDef::new().with("n", number()));
    let log = new_log();
    let watcher_id = tree.watch("n", record(&log, "n")).unwrap();
    let n = tree.option("n").unwrap();
    assert_eq!(tree.watcher_count(n).unwrap(), 1);

    assert!(tree.unwatch("n", watcher_id).unwrap());
    assert!(!tree.unwatch("n", watcher_id).unwrap());
    tree.set("n", json!(4)).unwrap();
    assert!(log.borrow().is_empty());

    let root_id = tree.watch_root(record(&log, "root"));
    assert!(tree.unwatch_root(root_id));
}

#[test]
fn test_dispatch_depth_limit() {
    let config = Config {
        max_dispatch_depth: 3,
        ..Config::default()
    };
    let mut tree = tree_with(SchemaDef::new().with("n", number()), config);
    let calls = Rc::new(Cell::new(0));

    let counter = Rc::clone(&calls);
    tree.watch("n", move |tree, event| {
        counter.set(counter.get() + 1);
        let next = event.value.as_i64().unwrap_or(0) + 1;
        tree.set("n", json!(next))
    })
    .unwrap();

    tree.set("n", json!(1)).unwrap();
    assert_eq!(calls.get(), 3);
    assert_eq!(tree.get("n").unwrap(), json!(4));
}

#[test]
fn test_zero_dispatch_depth_is_rejected() {
    let schema = OptionManager::new().build_schema(&SchemaDef::new()).unwrap();
    let config = Config {
        max_dispatch_depth: 0,
        ..Config::default()
    };
    assert!(matches!(
        Tree::with_config(&schema, config),
        Err(OptreeError::UserError(_))
    ));
}

// ============================================================================
// Locking
// ============================================================================

#[test]
fn test_locked_writes_are_ignored_by_default() {
    let mut tree = tree_of(nested_schema());
    let a = tree.option("a").unwrap();
    let c = tree.option("a.b.c").unwrap();

    tree.lock(a).unwrap();
    assert!(tree.is_locked(c).unwrap());
    tree.set("a.b.c", json!(5)).unwrap();
    assert_eq!(tree.get("a.b.c").unwrap(), json!(0));

    tree.unlock(a).unwrap();
    assert!(!tree.is_locked(c).unwrap());
    tree.set("a.b.c", json!(5)).unwrap();
    assert_eq!(tree.get("a.b.c").unwrap(), json!(5));
}

#[test]
fn test_locked_writes_can_be_rejected() {
    let config = Config {
        locked_writes: LockedWritePolicy::Reject,
        ..Config::default()
    };
    let mut tree = tree_with(SchemaDef::new().with("n", number()), config);
    tree.lock_tree();

    let err = tree.set("n", json!(1)).unwrap_err();
    assert!(matches!(err, OptreeError::AccessError(_)));
    assert!(err.to_string().contains("locked"));

    tree.unlock_tree();
    tree.set("n", json!(1)).unwrap();
    assert_eq!(tree.get("n").unwrap(), json!(1));
}

// ============================================================================
// Maps
// ============================================================================

fn server_schema() -> SchemaDef {
    SchemaDef::new().with(
        "server",
        OptionDef::map()
            .child("host", OptionDef::new("string"))
            .child("id", number().writable(false)),
    )
}

#[test]
fn test_map_rejects_unknown_keys() {
    let mut tree = tree_of(server_schema());
    let err = tree.set("server", json!({"user": "x"})).unwrap_err();
    assert!(matches!(err, OptreeError::AccessError(_)));
    assert!(err.to_string().contains("host, id"));

    let err = tree.set("server.user", json!("x")).unwrap_err();
    assert!(err.to_string().contains("unknown option"));
}

#[test]
fn test_map_write_checks_members_before_writing() {
    let mut tree = tree_of(server_schema());
    let err = tree
        .set("server", json!({"host": "example.org", "id": 2}))
        .unwrap_err();
    assert!(matches!(err, OptreeError::AccessError(_)));
    assert_eq!(tree.get("server.host").unwrap(), json!(""));

    tree.set("server", json!({"host": "example.org"})).unwrap();
    assert_eq!(tree.get("server").unwrap(), json!({"host": "example.org", "id": 0}));
}

#[test]
fn test_nullable_map_keeps_children() {
    let mut tree = tree_of(SchemaDef::new().with(
        "proxy",
        OptionDef::map()
            .nullable(true)
            .child("host", OptionDef::new("string").value("p")),
    ));
    tree.set("proxy", json!(null)).unwrap();
    assert_eq!(tree.get("proxy").unwrap(), json!(null));

    tree.set("proxy", json!({})).unwrap();
    assert_eq!(tree.get("proxy").unwrap(), json!({"host": "p"}));
}

#[test]
fn test_map_default_distributes_to_children() {
    let tree = tree_of(SchemaDef::new().with(
        "server",
        OptionDef::map()
            .child("host", OptionDef::new("string"))
            .child("port", number())
            .value(json!({"host": "h", "port": 1})),
    ));
    assert_eq!(tree.get("server.host").unwrap(), json!("h"));
    assert_eq!(tree.get("server.port").unwrap(), json!(1));
}

// ============================================================================
// Array collections
// ============================================================================

fn list_tree() -> (Tree, OptionId) {
    let tree = tree_of(SchemaDef::new().with("list", numbers()));
    let list = tree.option("list").unwrap();
    (tree, list)
}

#[test]
fn test_remove_keeps_identity_of_later_items() {
    let (mut tree, list) = list_tree();
    let _first = tree.push(list, json!(1)).unwrap();
    let second = tree.push(list, json!(2)).unwrap();
    let third = tree.push(list, json!(3)).unwrap();
    assert_eq!(tree.full_name(third).unwrap(), "list.2");

    let log = new_log();
    tree.watch("list", record(&log, "list")).unwrap();

    assert_eq!(tree.remove(list, 1).unwrap(), json!(2));
    assert_eq!(tree.get("list").unwrap(), json!([1, 3]));
    assert_eq!(log.borrow().len(), 1);

    assert!(!tree.is_attached(second));
    assert!(matches!(
        tree.value(second),
        Err(OptreeError::StructuralError(_))
    ));
    assert_eq!(tree.name(third).unwrap(), "1");
    assert_eq!(tree.option("list[1]").unwrap(), third);
    assert_eq!(tree.value(third).unwrap(), json!(3));
}

#[test]
fn test_removed_slots_are_reused_with_a_new_generation() {
    let (mut tree, list) = list_tree();
    let first = tree.push(list, json!(1)).unwrap();
    tree.pop(list).unwrap();
    let second = tree.push(list, json!(2)).unwrap();

    assert_eq!(first.index, second.index);
    assert_ne!(first, second);
    assert!(!tree.is_attached(first));
    assert!(matches!(
        tree.value(first),
        Err(OptreeError::StructuralError(_))
    ));
    assert_eq!(tree.value(second).unwrap(), json!(2));
    assert_eq!(tree.option_count(), 2);
}

#[test]
fn test_links_into_a_collection_follow_structural_changes() {
    let mut tree = tree_of(
        SchemaDef::new()
            .with("list", numbers())
            .with("pick", number().link("$list.1$")),
    );
    let list = tree.option("list").unwrap();
    assert_eq!(tree.get("pick").unwrap(), json!(0));

    for value in [1, 2, 3] {
        tree.push(list, json!(value)).unwrap();
    }
    assert_eq!(tree.get("pick").unwrap(), json!(2));

    tree.remove(list, 1).unwrap();
    assert_eq!(tree.get("pick").unwrap(), json!(3));

    tree.pop(list).unwrap();
    assert_eq!(tree.get("pick").unwrap(), json!(0));

    tree.push(list, json!(9)).unwrap();
    assert_eq!(tree.get("pick").unwrap(), json!(9));

    tree.unshift(list, json!(4)).unwrap();
    assert_eq!(tree.get("pick").unwrap(), json!(1));
}

#[test]
fn test_failed_item_write_leaves_collection_untouched() {
    let mut tree = tree_of(
        SchemaDef::new().with(
            "list",
            OptionDef::new("arrayCollection")
                .nullable(true)
                .proto(OptionDef::map().child("id", number().writable(false))),
        ),
    );
    let list = tree.option("list").unwrap();
    tree.set("list", json!(null)).unwrap();
    let count = tree.option_count();

    let err = tree.set_item(list, "1", json!({"id": 5})).unwrap_err();
    assert!(matches!(err, OptreeError::AccessError(_)));
    assert_eq!(tree.len(list).unwrap(), 0);
    assert_eq!(tree.get("list").unwrap(), json!(null));
    assert_eq!(tree.option_count(), count);
}

#[test]
fn test_insert_and_unshift() {
    let (mut tree, list) = list_tree();
    tree.push(list, json!(1)).unwrap();
    let two = tree.push(list, json!(2)).unwrap();
    tree.unshift(list, json!(0)).unwrap();
    assert_eq!(tree.get("list").unwrap(), json!([0, 1, 2]));

    let five = tree.insert(list, 2, json!(5)).unwrap();
    assert_eq!(tree.get("list").unwrap(), json!([0, 1, 5, 2]));
    assert_eq!(tree.full_name(five).unwrap(), "list.2");
    assert_eq!(tree.full_name(two).unwrap(), "list.3");

    let err = tree.insert(list, 9, json!(1)).unwrap_err();
    assert!(matches!(err, OptreeError::StructuralError(_)));
    assert!(tree.push(list, json!("x")).is_err());
}

#[test]
fn test_pop_shift_and_remove_range() {
    let (mut tree, list) = list_tree();
    assert_eq!(tree.pop(list).unwrap(), None);
    for n in 0..5 {
        tree.push(list, json!(n)).unwrap();
    }

    assert_eq!(tree.pop(list).unwrap(), Some(json!(4)));
    assert_eq!(tree.shift(list).unwrap(), Some(json!(0)));
    assert_eq!(tree.get("list").unwrap(), json!([1, 2, 3]));

    assert_eq!(tree.remove_range(list, 1, 5).unwrap(), vec![json!(2), json!(3)]);
    assert_eq!(tree.get("list").unwrap(), json!([1]));
    assert!(tree.remove_range(list, 4, 1).unwrap().is_empty());
    assert!(tree.remove(list, 3).is_err());
}

#[test]
fn test_swap_sort_and_reverse() {
    let (mut tree, list) = list_tree();
    let three = tree.push(list, json!(3)).unwrap();
    tree.push(list, json!(1)).unwrap();
    tree.push(list, json!(2)).unwrap();

    let log = new_log();
    tree.watch("list", record(&log, "list")).unwrap();

    tree.sort_by(list, |a, b| {
        a.as_f64().unwrap().partial_cmp(&b.as_f64().unwrap()).unwrap()
    })
    .unwrap();
    assert_eq!(tree.get("list").unwrap(), json!([1, 2, 3]));
    assert_eq!(tree.name(three).unwrap(), "2");
    assert_eq!(log.borrow().len(), 1);

    tree.reverse(list).unwrap();
    assert_eq!(tree.get("list").unwrap(), json!([3, 2, 1]));
    assert_eq!(tree.name(three).unwrap(), "0");

    tree.swap(list, 0, 2).unwrap();
    assert_eq!(tree.get("list").unwrap(), json!([1, 2, 3]));
    assert!(matches!(
        tree.swap(list, 0, 7),
        Err(OptreeError::AccessError(_))
    ));
}

#[test]
fn test_array_search_helpers() {
    let (mut tree, list) = list_tree();
    for n in [1, 2, 1] {
        tree.push(list, json!(n)).unwrap();
    }

    assert_eq!(tree.len(list).unwrap(), 3);
    assert_eq!(tree.index_of(list, &json!(1)).unwrap(), Some(0));
    assert_eq!(tree.last_index_of(list, &json!(1)).unwrap(), Some(2));
    assert_eq!(tree.index_of(list, &json!(9)).unwrap(), None);
    assert_eq!(tree.slice(list, 0, 2).unwrap(), vec![json!(1), json!(2)]);
    assert_eq!(tree.slice(list, 2, 99).unwrap(), vec![json!(1)]);
    assert!(tree.slice(list, 3, 1).unwrap().is_empty());
    assert_eq!(
        tree.find(list, &json!(2)).unwrap(),
        Some(("1".to_string(), json!(2)))
    );
    assert_eq!(
        tree.filter(list, |v| v == &json!(1)).unwrap().len(),
        2
    );
    assert_eq!(tree.get_item(list, "1").unwrap(), Some(json!(2)));
    assert_eq!(tree.get_item(list, "7").unwrap(), None);
}

#[test]
fn test_set_item_pads_and_whole_writes_replace() {
    let (mut tree, list) = list_tree();
    tree.push(list, json!(1)).unwrap();
    tree.set_item(list, "2", json!(9)).unwrap();
    assert_eq!(tree.get("list").unwrap(), json!([1, 0, 9]));

    tree.set_item(list, "0", json!(4)).unwrap();
    assert_eq!(tree.get("list").unwrap(), json!([4, 0, 9]));

    let last = tree.item(list, "2").unwrap().unwrap();
    tree.set("list", json!([5, 6])).unwrap();
    assert_eq!(tree.get("list").unwrap(), json!([5, 6]));
    assert!(!tree.is_attached(last));
}

#[test]
fn test_read_only_collection() {
    let mut tree = tree_of(SchemaDef::new().with("list", numbers().writable(false)));
    let list = tree.option("list").unwrap();
    let err = tree.push(list, json!(1)).unwrap_err();
    assert!(matches!(err, OptreeError::AccessError(_)));
}

#[test]
fn test_collection_default_seeds_items() {
    let tree = tree_of(SchemaDef::new().with("list", numbers().value(json!([4, 5]))));
    let list = tree.option("list").unwrap();
    assert_eq!(tree.len(list).unwrap(), 2);
    assert_eq!(tree.get("list[1]").unwrap(), json!(5));
}

// ============================================================================
// Object collections
// ============================================================================

fn servers_tree() -> (Tree, OptionId) {
    let tree = tree_of(SchemaDef::new().with(
        "servers",
        OptionDef::new("objectCollection")
            .proto(OptionDef::map().child("url", OptionDef::new("string")))
            .option("strict", OptionDef::new("boolean")),
    ));
    let servers = tree.option("servers").unwrap();
    (tree, servers)
}

#[test]
fn test_items_are_ordered_by_priority() {
    let (mut tree, servers) = servers_tree();
    tree.add(servers, "x", json!({"url": "a", "priority": 10})).unwrap();
    tree.add(servers, "y", json!({"url": "b", "priority": 20})).unwrap();
    tree.add(servers, "z", json!({"url": "c", "priority": 5})).unwrap();

    assert_eq!(tree.keys(servers).unwrap(), vec!["y", "x", "z"]);
    let priorities: Vec<Value> = tree
        .filter(servers, |_| true)
        .unwrap()
        .into_iter()
        .map(|(_, v)| v["priority"].clone())
        .collect();
    assert_eq!(priorities, vec![json!(20), json!(10), json!(5)]);

    assert_eq!(
        tree.find(servers, &json!({"url": "a"})).unwrap().map(|(k, _)| k),
        Some("x".to_string())
    );
}

#[test]
fn test_proto_links_are_checked_when_the_tree_is_built() {
    let err = tree_err(SchemaDef::new().with(
        "list",
        OptionDef::new("arrayCollection").proto(number().link("$nope$")),
    ));
    assert!(matches!(err, OptreeError::SchemaDefinitionError(_)));
    assert!(err.to_string().contains("unknown option"));

    let err = tree_err(SchemaDef::new().with(
        "servers",
        OptionDef::new("objectCollection").proto(
            OptionDef::map()
                .child("port", number())
                .child("admin", number().link("$./missing$")),
        ),
    ));
    assert!(matches!(err, OptreeError::SchemaDefinitionError(_)));

    let err = tree_err(
        SchemaDef::new()
            .with("label", OptionDef::new("string"))
            .with(
                "list",
                OptionDef::new("arrayCollection").proto(number().link("$label$")),
            ),
    );
    assert!(err.to_string().contains("not compatible"));
}

#[test]
fn test_relative_proto_links_resolve_inside_each_item() {
    let mut tree = tree_of(SchemaDef::new().with(
        "servers",
        OptionDef::new("objectCollection").proto(
            OptionDef::map()
                .child("port", number().value(80))
                .child("admin", number().link("$./port$")),
        ),
    ));
    let servers = tree.option("servers").unwrap();
    tree.add(servers, "x", json!({"port": 81})).unwrap();
    tree.add(servers, "y", json!({})).unwrap();

    assert_eq!(tree.get("servers.x.admin").unwrap(), json!(81));
    assert_eq!(tree.get("servers.y.admin").unwrap(), json!(80));
}

#[test]
fn test_add_rejects_duplicate_and_reserved_keys() {
    let (mut tree, servers) = servers_tree();
    tree.add(servers, "x", json!({"url": "a"})).unwrap();

    let err = tree.add(servers, "x", json!({"url": "b"})).unwrap_err();
    assert!(matches!(err, OptreeError::StructuralError(_)));
    let err = tree.add(servers, "options", json!({})).unwrap_err();
    assert!(matches!(err, OptreeError::StructuralError(_)));
    assert!(tree.add(servers, "w", json!({"nope": 1})).is_err());
}

#[test]
fn test_object_collection_value_and_options() {
    let (mut tree, servers) = servers_tree();
    assert_eq!(
        tree.get("servers").unwrap(),
        json!({"options": {"strict": false}})
    );

    tree.add(servers, "x", json!({"url": "a"})).unwrap();
    let options = tree.options_map(servers).unwrap();
    tree.set_value(options, json!({"strict": true})).unwrap();
    assert_eq!(
        tree.get("servers").unwrap(),
        json!({"x": {"url": "a", "priority": 0}, "options": {"strict": true}})
    );
    assert_eq!(tree.get("servers.options.strict").unwrap(), json!(true));
    assert_eq!(tree.item(servers, "options").unwrap(), None);
}

#[test]
fn test_object_collection_remove_and_replace() {
    let (mut tree, servers) = servers_tree();
    let x = tree.add(servers, "x", json!({"url": "a"})).unwrap();
    let y = tree.add(servers, "y", json!({"url": "b"})).unwrap();

    assert_eq!(
        tree.remove_key(servers, "y").unwrap(),
        json!({"url": "b", "priority": 0})
    );
    assert!(!tree.is_attached(y));
    assert!(tree.remove_key(servers, "y").is_err());
    assert!(tree.remove_key(servers, "options").is_err());

    tree.set(
        "servers",
        json!({"x": {"url": "new"}, "z": {"url": "c"}, "options": {"strict": true}}),
    )
    .unwrap();
    assert_eq!(tree.keys(servers).unwrap(), vec!["x", "z"]);
    assert_eq!(tree.option("servers.x").unwrap(), x);
    assert_eq!(tree.get("servers.x.url").unwrap(), json!("new"));
    assert_eq!(tree.get("servers.options.strict").unwrap(), json!(true));

    tree.set_item(servers, "w", json!({"url": "d"})).unwrap();
    assert_eq!(tree.len(servers).unwrap(), 3);
}

#[test]
fn test_scalar_object_collection_keeps_insertion_order() {
    let mut tree = tree_of(SchemaDef::new().with(
        "tags",
        OptionDef::new("objectCollection")
            .proto(OptionDef::new("string"))
            .value(json!({"b": "x"})),
    ));
    let tags = tree.option("tags").unwrap();
    tree.add(tags, "a", json!("y")).unwrap();
    assert_eq!(tree.keys(tags).unwrap(), vec!["b", "a"]);
    assert_eq!(tree.get("tags").unwrap(), json!({"b": "x", "a": "y"}));
}

// ============================================================================
// Paths and snapshots
// ============================================================================

#[test]
fn test_parse_path() {
    assert_eq!(parse_path("a.b[2].c").unwrap(), vec!["a", "b", "2", "c"]);
    assert_eq!(parse_path("a.b.2.c").unwrap(), vec!["a", "b", "2", "c"]);
    assert_eq!(parse_path("m[0][1]").unwrap(), vec!["m", "0", "1"]);
    assert!(parse_path("").is_err());
    assert!(parse_path("a..b").is_err());
    assert!(parse_path("[0]").is_err());
    assert!(parse_path("a.b]").is_err());
}

#[test]
fn test_path_lookups() {
    let tree = tree_of(nested_schema());
    assert!(tree.has("a.b.c"));
    assert!(!tree.has("a.x"));
    assert!(!tree.has("a..b"));
    assert!(matches!(
        tree.option("nope"),
        Err(OptreeError::AccessError(_))
    ));

    let c = tree.option("a.b.c").unwrap();
    assert_eq!(tree.full_name(c).unwrap(), "a.b.c");
    assert_eq!(tree.name(c).unwrap(), "c");
    let b = tree.option("a.b").unwrap();
    assert_eq!(tree.context(c).unwrap(), Context::Option(b));
    assert_eq!(tree.child(b, "c").unwrap(), Some(c));
}

#[test]
fn test_snapshot_and_explicit_values() {
    let mut tree = tree_of(
        SchemaDef::new()
            .with("a", number().value(1))
            .with("b", OptionDef::map().child("c", OptionDef::new("string"))),
    );
    assert_eq!(tree.snapshot().unwrap(), json!({"a": 1, "b": {"c": ""}}));
    assert_eq!(tree.explicit_values().unwrap(), json!({}));

    tree.set("b.c", json!("x")).unwrap();
    assert_eq!(tree.explicit_values().unwrap(), json!({"b": {"c": "x"}}));
}

#[test]
fn test_set_snapshot_notifies_root_once() {
    let mut tree = tree_of(
        SchemaDef::new()
            .with("a", number().value(1))
            .with("b", OptionDef::map().child("c", OptionDef::new("string"))),
    );
    let log = new_log();
    tree.watch_root(record(&log, "root"));
    tree.watch("a", record(&log, "a")).unwrap();

    tree.set_snapshot(json!({"a": 5, "b": {"c": "y"}})).unwrap();
    assert_eq!(labels(&log), vec!["a", "root"]);
    assert_eq!(log.borrow()[1].1, json!({"a": 5, "b": {"c": "y"}}));

    assert!(tree.set_snapshot(json!({"zzz": 1})).is_err());
    assert!(tree.set_snapshot(json!([1])).is_err());
}

#[test]
fn test_option_count_tracks_items() {
    let (mut tree, list) = list_tree();
    assert_eq!(tree.option_count(), 1);
    tree.push(list, json!(1)).unwrap();
    assert_eq!(tree.option_count(), 2);
    tree.pop(list).unwrap();
    assert_eq!(tree.option_count(), 1);
}
