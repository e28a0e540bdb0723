use log::info;
use serde_json::json;
use weact_core::{
    deps, use_batch_update, use_effect, use_layout_effect, use_memo, use_previous, use_state,
    Cleanup, Definition, RuntimeConfig, Value,
};
use weact_runtime_std::{Mounted, StdRuntime};

fn counter(props: &Value) -> Definition {
    let step = props.get("step").and_then(Value::as_i64).unwrap_or(1);
    let label = props
        .get("label")
        .and_then(Value::as_str)
        .unwrap_or("Counter")
        .to_string();

    let (count, set_count) = use_state(|| 0_i64);
    let (history, set_history) = use_state(Vec::<i64>::new);
    let previous = use_previous(count);
    let parity = use_memo(deps![count], || if count % 2 == 0 { "even" } else { "odd" });

    let subscribed = label.clone();
    use_effect(deps![label], move || {
        info!("subscribed as {subscribed}");
        Cleanup::new(move || info!("unsubscribed {subscribed}"))
    });
    use_layout_effect(deps![count], move || {
        info!("committed count {count}");
        Cleanup::none()
    });

    let update = use_batch_update((set_count, set_history));
    let step_by = |delta: i64| {
        let update = update.clone();
        let mut next_history = history.clone();
        next_history.push(count + delta);
        move |_: &Value| update.call((count + delta, next_history.clone()))
    };
    let increment = step_by(step);
    let decrement = step_by(-step);

    Definition::new()
        .data("label", label)
        .data("count", count)
        .data("previous", previous)
        .data("parity", parity)
        .data("history", history)
        .method("increment", increment)
        .method("decrement", decrement)
        .method("reset", move |_: &Value| update.call((0, Vec::new())))
}

fn print_data(stage: &str, mounted: &Mounted) {
    let data = serde_json::Value::from(&mounted.data());
    match serde_json::to_string_pretty(&data) {
        Ok(text) => println!("--- {stage} ---\n{text}"),
        Err(err) => eprintln!("{stage}: failed to render data: {err}"),
    }
}

fn main() {
    env_logger::init();

    println!("=== Weact Counter Example ===");
    println!("Set RUST_LOG=debug and WEACT_DEBUG=1 to trace renders and diffs.");
    println!();

    let runtime = StdRuntime::new().with_config(RuntimeConfig::from_env());
    let mounted = match runtime.mount("counter", counter, json!({"label": "Clicks", "step": 1})) {
        Ok(mounted) => mounted,
        Err(err) => {
            eprintln!("mount failed: {err}");
            std::process::exit(1);
        }
    };
    runtime.run_until_idle();
    print_data("mounted", &mounted);

    for method in ["increment", "increment", "decrement"] {
        if let Err(err) = mounted.instance().invoke(method, &Value::Null) {
            eprintln!("{method}: {err}");
        }
    }
    runtime.run_until_idle();
    print_data("after clicks", &mounted);

    let old = Value::from(json!({"label": "Clicks", "step": 1}));
    mounted
        .instance()
        .on_external_input_changed(json!({"label": "Taps", "step": 5}).into(), &old);
    runtime.run_until_idle();
    if let Err(err) = mounted.instance().invoke("increment", &Value::Null) {
        eprintln!("increment: {err}");
    }
    runtime.run_until_idle();
    print_data("after input change", &mounted);

    if let Err(err) = mounted.instance().invoke("reset", &Value::Null) {
        eprintln!("reset: {err}");
    }
    runtime.run_until_idle();
    print_data("after reset", &mounted);

    println!(
        "renders: {}, commits: {}",
        mounted.instance().render_count(),
        mounted.host().commit_count()
    );
    mounted.instance().on_destroy();
}
