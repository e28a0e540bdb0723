use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::json;
use weact_core::{
    deps, is_rendering, use_batch_update, use_callback, use_effect, use_effect_on_update,
    use_instance, use_layout_effect, use_memo, use_once, use_previous, use_reducer,
    use_reducer_with_init, use_ref, use_state, BatchUpdate, Cleanup, Deps, Definition, Dispatch,
    HookOrderViolation, Instance, MutableRef, PatchValue, RuntimeConfig, RuntimeError,
    StateSetter, Value,
};
use weact_testing::{EventLog, TestHost};

fn mount(
    host: &Rc<TestHost>,
    name: &str,
    render: impl Fn(&Value) -> Definition + 'static,
) -> Instance {
    Instance::builder(name, render)
        .config(RuntimeConfig::new().with_hook_order_checks(true))
        .mount(host.clone())
        .expect("mount")
}

fn field(instance: &Instance, key: &str) -> Option<Value> {
    instance.data()?.get(key).cloned()
}

#[test]
fn mount_commits_initial_data() {
    let host = Rc::new(TestHost::new());
    let instance = mount(&host, "counter", |_| Definition::new().data("count", 0));

    assert_eq!(host.commit_count(), 1);
    assert_eq!(
        host.last_commit().expect("commit").get("count"),
        Some(&PatchValue::Set(Value::from(0)))
    );
    assert_eq!(instance.render_count(), 1);
    assert_eq!(instance.commit_count(), 1);
    assert!(instance.is_mounted());
}

#[test]
fn identical_input_change_renders_without_commit() {
    let host = Rc::new(TestHost::new());
    let props = Value::from(json!({"label": "a"}));
    let instance = Instance::on_create(
        "counter",
        |_| Definition::new().data("count", 0),
        props.clone(),
        host.clone(),
    )
    .expect("mount");

    instance.on_external_input_changed(Value::from(json!({"label": "a"})), &props);

    assert_eq!(instance.render_count(), 2);
    assert_eq!(instance.commit_count(), 1);
    assert_eq!(host.commit_count(), 1);
}

#[test]
fn same_input_value_is_ignored() {
    let host = Rc::new(TestHost::new());
    let props = Value::from(json!({"n": 1}));
    let instance = Instance::builder("counter", |_| Definition::new())
        .props(props.clone())
        .mount(host.clone())
        .expect("mount");

    instance.on_external_input_changed(props.clone(), &props);

    assert_eq!(instance.render_count(), 1);
}

#[test]
fn input_changes_coalesce_within_a_macrotask() {
    let host = Rc::new(TestHost::new());
    let first = Value::from(json!({"n": 1}));
    let instance = Instance::builder("echo", |props: &Value| {
        Definition::new().data("n", props.get("n").cloned().unwrap_or_default())
    })
    .props(first.clone())
    .mount(host.clone())
    .expect("mount");

    let second = Value::from(json!({"n": 2}));
    let third = Value::from(json!({"n": 3}));
    instance.on_external_input_changed(second.clone(), &first);
    instance.on_external_input_changed(third.clone(), &second);

    assert_eq!(instance.render_count(), 2);
    assert!(instance.props().same(&third));
    assert_eq!(field(&instance, "n"), Some(Value::from(2)));

    host.run_macrotasks();
    let fourth = Value::from(json!({"n": 4}));
    instance.on_external_input_changed(fourth, &third);

    assert_eq!(instance.render_count(), 3);
    assert_eq!(field(&instance, "n"), Some(Value::from(4)));
}

#[test]
fn function_form_updates_compose() {
    let host = Rc::new(TestHost::new());
    let captured: Rc<RefCell<Option<StateSetter<i32>>>> = Rc::default();
    let slot = captured.clone();
    let instance = mount(&host, "counter", move |_| {
        let (count, set_count) = use_state(|| 0);
        *slot.borrow_mut() = Some(set_count);
        Definition::new().data("count", count)
    });
    let set_count = captured.borrow().clone().expect("setter");

    instance.batch(|| {
        set_count.update(|n| n + 1);
        set_count.update(|n| n + 1);
        assert_eq!(set_count.get(), Some(2));
    });
    assert_eq!(instance.render_count(), 2);
    assert_eq!(field(&instance, "count"), Some(Value::from(2)));

    set_count.update(|n| n + 1);
    set_count.update(|n| n + 1);
    assert_eq!(instance.render_count(), 4);
    assert_eq!(field(&instance, "count"), Some(Value::from(4)));
}

#[test]
fn effect_dependencies_control_reruns() {
    let host = Rc::new(TestHost::new());
    let events = EventLog::new();
    let key = Rc::new(Cell::new(1));
    let (log, current) = (events.clone(), key.clone());
    let instance = mount(&host, "effects", move |_| {
        let value = current.get();
        use_effect(deps![value], log.effect(format!("keyed {value}")));
        use_effect(Deps::always(), log.effect("always"));
        use_effect(deps![], log.effect("mount"));
        Definition::new()
    });
    assert_eq!(
        events.take(),
        ["setup keyed 1", "setup always", "setup mount"]
    );

    instance.render().unwrap();
    assert_eq!(events.take(), ["teardown always", "setup always"]);

    key.set(2);
    instance.render().unwrap();
    assert_eq!(
        events.take(),
        [
            "teardown keyed 1",
            "setup keyed 2",
            "teardown always",
            "setup always"
        ]
    );

    instance.on_destroy();
    assert_eq!(
        events.take(),
        ["teardown keyed 2", "teardown always", "teardown mount"]
    );
}

#[test]
fn update_effects_skip_mount() {
    let host = Rc::new(TestHost::new());
    let events = EventLog::new();
    let log = events.clone();
    let instance = mount(&host, "updates", move |_| {
        use_effect_on_update(Deps::always(), log.effect("update"));
        Definition::new()
    });
    assert!(events.take().is_empty());

    instance.render().unwrap();
    assert_eq!(events.take(), ["setup update"]);
    instance.render().unwrap();
    assert_eq!(events.take(), ["teardown update", "setup update"]);
}

#[test]
fn layout_effects_wait_for_commit_completion() {
    let host = Rc::new(TestHost::new());
    let events = EventLog::new();
    let key = Rc::new(Cell::new(1));
    let (log, current) = (events.clone(), key.clone());
    let instance = mount(&host, "layout", move |_| {
        let n = current.get();
        use_layout_effect(deps![n], log.effect(format!("first {n}")));
        use_layout_effect(deps![n], log.effect(format!("second {n}")));
        Definition::new().data("n", n)
    });
    assert_eq!(instance.pending_effects(), 2);
    assert!(events.take().is_empty());

    host.complete_all_commits();
    assert_eq!(events.take(), ["setup first 1", "setup second 1"]);
    assert_eq!(instance.pending_effects(), 0);

    key.set(2);
    instance.render().unwrap();
    assert!(events.take().is_empty());
    host.complete_all_commits();
    assert_eq!(
        events.take(),
        [
            "teardown first 1",
            "setup first 2",
            "teardown second 1",
            "setup second 2"
        ]
    );

    instance.render().unwrap();
    assert_eq!(instance.pending_effects(), 0);
    assert_eq!(instance.commit_count(), 2);

    instance.on_destroy();
    assert_eq!(events.take(), ["teardown first 2", "teardown second 2"]);
}

#[test]
fn empty_diff_flushes_on_next_macrotask() {
    let host = Rc::new(TestHost::new());
    let events = EventLog::new();
    let log = events.clone();
    let instance = mount(&host, "stable", move |_| {
        use_layout_effect(Deps::always(), log.effect("tick"));
        Definition::new().data("fixed", true)
    });
    host.complete_all_commits();
    assert_eq!(events.take(), ["setup tick"]);

    instance.render().unwrap();
    assert_eq!(host.commit_count(), 1);
    assert_eq!(instance.pending_effects(), 1);

    host.run_macrotasks();
    assert_eq!(events.take(), ["teardown tick", "setup tick"]);
}

#[test]
fn completion_after_destroy_runs_nothing() {
    let host = Rc::new(TestHost::new());
    let events = EventLog::new();
    let log = events.clone();
    let instance = mount(&host, "gone", move |_| {
        use_layout_effect(deps![], log.effect("late"));
        Definition::new().data("x", 1)
    });

    instance.on_destroy();
    host.complete_all_commits();

    assert!(events.take().is_empty());
}

#[test]
fn destroy_tears_down_immediate_then_deferred() {
    let host = Rc::new(TestHost::new());
    let events = EventLog::new();
    let captured: Rc<RefCell<Option<StateSetter<i32>>>> = Rc::default();
    let (log, slot) = (events.clone(), captured.clone());
    let instance = mount(&host, "teardown", move |_| {
        use_layout_effect(deps![], log.effect("layout-0"));
        use_effect(deps![], log.effect("effect-1"));
        use_layout_effect(deps![], log.effect("layout-2"));
        use_effect(deps![], log.effect("effect-3"));
        let (n, set_n) = use_state(|| 0);
        *slot.borrow_mut() = Some(set_n);
        Definition::new().data("n", n)
    });
    host.complete_all_commits();
    assert_eq!(
        events.take(),
        [
            "setup effect-1",
            "setup effect-3",
            "setup layout-0",
            "setup layout-2"
        ]
    );

    instance.on_destroy();
    assert_eq!(
        events.take(),
        [
            "teardown effect-1",
            "teardown effect-3",
            "teardown layout-0",
            "teardown layout-2"
        ]
    );

    instance.on_destroy();
    assert!(events.take().is_empty());
    assert!(!instance.is_mounted());

    let set_n = captured.borrow().clone().expect("setter");
    set_n.set(5);
    assert_eq!(instance.render_count(), 1);
    assert_eq!(
        instance.render(),
        Err(RuntimeError::Unmounted {
            instance: "teardown".into()
        })
    );
    assert_eq!(
        instance.invoke("anything", &Value::Null),
        Err(RuntimeError::Unmounted {
            instance: "teardown".into()
        })
    );
}

#[test]
fn memo_recomputes_only_on_dependency_change() {
    let host = Rc::new(TestHost::new());
    let computations = Rc::new(Cell::new(0));
    let key = Rc::new(Cell::new(2));
    let (count, current) = (computations.clone(), key.clone());
    let instance = mount(&host, "memo", move |_| {
        let n = current.get();
        let doubled = use_memo(deps![n], || {
            count.set(count.get() + 1);
            n * 2
        });
        Definition::new().data("doubled", doubled)
    });
    assert_eq!(computations.get(), 1);

    instance.render().unwrap();
    assert_eq!(computations.get(), 1);
    assert_eq!(field(&instance, "doubled"), Some(Value::from(4)));

    key.set(5);
    instance.render().unwrap();
    assert_eq!(computations.get(), 2);
    assert_eq!(field(&instance, "doubled"), Some(Value::from(10)));
}

#[test]
fn callbacks_keep_identity_until_dependencies_change() {
    let host = Rc::new(TestHost::new());
    let seen: Rc<RefCell<Vec<Rc<dyn Fn() -> i32>>>> = Rc::default();
    let key = Rc::new(Cell::new(1));
    let (record, current) = (seen.clone(), key.clone());
    let instance = mount(&host, "callbacks", move |_| {
        let n = current.get();
        let callback: Rc<dyn Fn() -> i32> = use_callback(deps![n], move || n * 10);
        record.borrow_mut().push(callback);
        Definition::new()
    });
    instance.render().unwrap();
    key.set(2);
    instance.render().unwrap();

    let seen = seen.borrow();
    let address = |callback: &Rc<dyn Fn() -> i32>| Rc::as_ptr(callback) as *const ();
    assert_eq!(address(&seen[0]), address(&seen[1]));
    assert_ne!(address(&seen[1]), address(&seen[2]));
    assert_eq!(seen[2](), 20);
}

#[test]
fn refs_persist_without_rendering() {
    let host = Rc::new(TestHost::new());
    let cells: Rc<RefCell<Vec<MutableRef<u32>>>> = Rc::default();
    let record = cells.clone();
    let instance = mount(&host, "refs", move |_| {
        let renders = use_ref(|| 0u32);
        renders.update(|n| *n += 1);
        record.borrow_mut().push(renders);
        Definition::new()
    });
    instance.render().unwrap();
    instance.render().unwrap();

    let cells = cells.borrow();
    assert!(cells[0].ptr_eq(&cells[2]));
    assert_eq!(cells[0].get(), 3);
    cells[0].set(100);
    assert_eq!(instance.render_count(), 3);
}

#[test]
fn reducer_skips_unchanged_results() {
    let host = Rc::new(TestHost::new());
    let captured: Rc<RefCell<Option<Dispatch<i32, &'static str>>>> = Rc::default();
    let slot = captured.clone();
    let instance = mount(&host, "reducer", move |_| {
        let (count, dispatch) = use_reducer(
            |state: &i32, action: &'static str| match action {
                "inc" => state + 1,
                _ => *state,
            },
            0,
        );
        *slot.borrow_mut() = Some(dispatch);
        Definition::new().data("count", count)
    });
    let dispatch = captured.borrow().clone().expect("dispatch");

    dispatch.dispatch("noop");
    assert_eq!(instance.render_count(), 1);

    dispatch.dispatch("inc");
    assert_eq!(instance.render_count(), 2);
    assert_eq!(field(&instance, "count"), Some(Value::from(1)));
}

#[test]
fn reducer_init_runs_once() {
    let host = Rc::new(TestHost::new());
    let inits = Rc::new(Cell::new(0));
    let counter = inits.clone();
    let instance = mount(&host, "reducer-init", move |_| {
        let (value, _dispatch) = use_reducer_with_init(
            |state: &i32, delta: i32| state + delta,
            "3",
            |raw: &str| {
                counter.set(counter.get() + 1);
                raw.parse::<i32>().unwrap_or(0)
            },
        );
        Definition::new().data("value", value)
    });
    instance.render().unwrap();

    assert_eq!(inits.get(), 1);
    assert_eq!(field(&instance, "value"), Some(Value::from(3)));
}

#[test]
fn previous_returns_last_render_value() {
    let host = Rc::new(TestHost::new());
    let seen: Rc<RefCell<Vec<Option<i32>>>> = Rc::default();
    let key = Rc::new(Cell::new(1));
    let (record, current) = (seen.clone(), key.clone());
    let instance = mount(&host, "previous", move |_| {
        record.borrow_mut().push(use_previous(current.get()));
        Definition::new()
    });
    key.set(2);
    instance.render().unwrap();
    instance.render().unwrap();

    assert_eq!(*seen.borrow(), vec![None, Some(1), Some(2)]);
}

#[test]
fn once_runs_after_first_qualifying_commit() {
    let host = Rc::new(TestHost::new());
    let events = EventLog::new();
    let ready = Rc::new(Cell::new(false));
    let (log, flag) = (events.clone(), ready.clone());
    let instance = mount(&host, "once", move |_| {
        let is_ready = flag.get();
        let log = log.clone();
        use_once(is_ready, move || log.push("once"));
        Definition::new().data("ready", is_ready)
    });
    host.complete_all_commits();
    assert!(events.take().is_empty());

    ready.set(true);
    instance.render().unwrap();
    assert!(events.take().is_empty());
    host.complete_all_commits();
    assert_eq!(events.take(), ["once"]);

    ready.set(false);
    instance.render().unwrap();
    ready.set(true);
    instance.render().unwrap();
    host.complete_all_commits();
    assert!(events.take().is_empty());
}

#[test]
fn batch_update_renders_once() {
    let host = Rc::new(TestHost::new());
    type Pair = (StateSetter<i32>, StateSetter<String>);
    let captured: Rc<RefCell<Option<BatchUpdate<Pair>>>> = Rc::default();
    let slot = captured.clone();
    let instance = mount(&host, "batch", move |_| {
        let (a, set_a) = use_state(|| 0);
        let (b, set_b) = use_state(String::new);
        *slot.borrow_mut() = Some(use_batch_update((set_a, set_b)));
        Definition::new().data("a", a).data("b", b)
    });
    let update = captured.borrow().clone().expect("batch update");

    update.call((5, "five".to_string()));

    assert_eq!(instance.render_count(), 2);
    assert_eq!(host.commit_count(), 2);
    assert_eq!(field(&instance, "a"), Some(Value::from(5)));
    assert_eq!(field(&instance, "b"), Some(Value::from("five")));
}

#[test]
fn methods_are_exposed_and_replaced() {
    let host = Rc::new(TestHost::new());
    let instance = mount(&host, "methods", |_| {
        let (count, set_count) = use_state(|| 0);
        let add = set_count.clone();
        Definition::new()
            .data("count", count)
            .method("increment", move |_| set_count.update(|n| n + 1))
            .method("add", move |event| {
                let delta = event.as_i64().unwrap_or(0) as i32;
                add.update(|n| n + delta)
            })
    });
    assert_eq!(instance.method_names(), ["add", "increment"]);
    assert!(instance.has_method("add"));

    instance.invoke("increment", &Value::Null).unwrap();
    instance.invoke("add", &Value::from(5)).unwrap();

    assert_eq!(field(&instance, "count"), Some(Value::from(6)));
    assert_eq!(host.commit_count(), 3);
    assert_eq!(
        instance.invoke("missing", &Value::Null),
        Err(RuntimeError::UnknownMethod {
            instance: "methods".into(),
            method: "missing".into()
        })
    );
}

#[test]
fn removed_top_level_fields_are_committed_as_removals() {
    let host = Rc::new(TestHost::new());
    let extra = Rc::new(Cell::new(true));
    let flag = extra.clone();
    let instance = mount(&host, "fields", move |_| {
        let mut definition = Definition::new().data("base", 1);
        if flag.get() {
            definition.insert_data("extra", "x");
        }
        definition
    });

    extra.set(false);
    instance.render().unwrap();

    let patch = host.last_commit().expect("commit");
    assert_eq!(patch.get("extra"), Some(&PatchValue::Remove));
    assert_eq!(patch.len(), 1);
    assert_eq!(field(&instance, "extra"), None);
}

#[test]
fn reentrant_render_is_rejected() {
    let host = Rc::new(TestHost::new());
    let outcome: Rc<RefCell<Option<Result<(), RuntimeError>>>> = Rc::default();
    let record = outcome.clone();
    let _instance = mount(&host, "loop", move |_| {
        let handle = use_instance();
        if record.borrow().is_none() {
            let result = handle.upgrade().expect("alive").render();
            *record.borrow_mut() = Some(result);
        }
        Definition::new()
    });

    assert_eq!(
        outcome.borrow().clone(),
        Some(Err(RuntimeError::ReentrantRender {
            instance: "loop".into()
        }))
    );
    assert!(!is_rendering());
}

#[test]
fn nested_render_of_another_instance_is_rejected() {
    let host = Rc::new(TestHost::new());
    let other = mount(&host, "other", |_| Definition::new().data("x", 1));
    let outcome: Rc<RefCell<Option<Result<(), RuntimeError>>>> = Rc::default();
    let record = outcome.clone();
    let _outer = mount(&host, "outer", move |_| {
        if record.borrow().is_none() {
            let result = other.render();
            *record.borrow_mut() = Some(result);
        }
        Definition::new()
    });

    assert_eq!(
        outcome.borrow().clone(),
        Some(Err(RuntimeError::NestedRender {
            active: "outer".into(),
            requested: "other".into()
        }))
    );
}

#[test]
#[should_panic(expected = "already rendering")]
fn setter_called_during_render_panics() {
    let host = Rc::new(TestHost::new());
    mount(&host, "eager", |_| {
        let (n, set_n) = use_state(|| 0);
        set_n.set(n + 1);
        Definition::new()
    });
}

#[test]
fn hook_order_drift_is_recorded() {
    let host = Rc::new(TestHost::new());
    let conditional = Rc::new(Cell::new(false));
    let flag = conditional.clone();
    let instance = mount(&host, "drift", move |_| {
        if flag.get() {
            let _ = use_ref(|| 0u8);
        }
        let (n, _) = use_state(|| 1);
        Definition::new().data("n", n)
    });
    assert!(instance.hook_order_violations().is_empty());

    conditional.set(true);
    instance.render().unwrap();

    let violations = instance.hook_order_violations();
    assert_eq!(violations.len(), 2);
    assert!(matches!(
        violations[0],
        HookOrderViolation::Mismatch { cursor: 0, .. }
    ));
    assert!(matches!(
        violations[1],
        HookOrderViolation::Extra { cursor: 1, .. }
    ));
    assert_eq!(instance.hook_count(), 2);
}

#[test]
fn debug_tracing_does_not_change_behavior() {
    let host = Rc::new(TestHost::new());
    let instance = Instance::builder("traced", |props: &Value| {
        Definition::new().data("echo", props.clone())
    })
    .props(json!({"a": 1}))
    .config(RuntimeConfig::new().with_debug(true))
    .mount(host.clone())
    .expect("mount");

    assert!(instance.config().tracing());
    assert_eq!(host.commit_count(), 1);
    assert_eq!(
        field(&instance, "echo"),
        Some(Value::from(json!({"a": 1})))
    );
}

#[test]
fn deferred_setups_see_the_latest_pass_on_synchronous_hosts() {
    let host = Rc::new(TestHost::auto_completing());
    let events = EventLog::new();
    let log = events.clone();
    let instance = mount(&host, "sync", move |_| {
        let (count, set_count) = use_state(|| 0);
        use_layout_effect(deps![], move || {
            set_count.set(1);
            Cleanup::none()
        });
        use_layout_effect(deps![count], log.effect(format!("count={count}")));
        Definition::new().data("count", count)
    });

    assert_eq!(events.take(), ["setup count=1"]);
    assert_eq!(instance.render_count(), 2);
    assert_eq!(instance.pending_effects(), 0);
    assert_eq!(host.data(), Value::from(json!({"count": 1})));

    instance.on_destroy();
    assert_eq!(events.take(), ["teardown count=1"]);
}

#[test]
fn render_that_destroys_its_instance_commits_nothing() {
    let host = Rc::new(TestHost::new());
    let events = EventLog::new();
    let closing = Rc::new(Cell::new(false));
    let (log, flag) = (events.clone(), closing.clone());
    let instance = mount(&host, "closing", move |_| {
        use_effect(deps![], log.effect("subscription"));
        use_layout_effect(Deps::always(), log.effect("layout"));
        let handle = use_instance();
        let (n, set_n) = use_state(|| 0);
        if flag.get() {
            if let Some(instance) = handle.upgrade() {
                instance.on_destroy();
            }
        }
        Definition::new()
            .data("n", n)
            .method("bump", move |_| set_n.update(|n| n + 1))
    });
    host.complete_all_commits();
    assert_eq!(events.take(), ["setup subscription", "setup layout"]);

    closing.set(true);
    assert_eq!(
        instance.render(),
        Err(RuntimeError::Unmounted {
            instance: "closing".into()
        })
    );

    assert_eq!(events.take(), ["teardown subscription", "teardown layout"]);
    assert_eq!(instance.render_count(), 1);
    assert_eq!(host.commit_count(), 1);
    assert!(!instance.has_method("bump"));
    assert_eq!(instance.pending_effects(), 0);

    host.settle();
    assert!(events.take().is_empty());
}
