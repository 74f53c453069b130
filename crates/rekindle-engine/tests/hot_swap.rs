//! End-to-end hot-swap flows through the execution environment.
//!
//! These walk the same path the directive evaluator drives at runtime:
//! snapshots in, definition calls routed, instances constructed, and a
//! replacement class either absorbed in place or escalated.

use std::rc::Rc;

use rekindle_core::{PropertySnapshot, Value};
use rekindle_engine::{
    read_component_class, ComponentClass, ExecutionEnv, InstanceHooks, RenderError,
};

const UNIT: &str = "src/counter.ts";

const COUNTER_V1: &str = r#"
class Counter extends LitElement {
  static observedAttributes = ['label'];
  @property() count = 0;
  render() { return html`<span>${this.count}</span>`; }
}
"#;

const COUNTER_V2: &str = r#"
class Counter extends LitElement {
  static observedAttributes = ['label'];
  @property() count = 0;
  render() { return html`<strong>${this.count}</strong>`; }
}
"#;

const COUNTER_V3: &str = r#"
class Counter extends LitElement {
  static observedAttributes = ['label', 'data-theme'];
  @property() count = 0;
  render() { return html`<strong>${this.count}</strong>`; }
}
"#;

fn class(src: &str) -> Rc<ComponentClass> {
    Rc::new(read_component_class(src).expect("class source parses"))
}

fn count_snapshot(initializer: &str) -> Vec<PropertySnapshot> {
    vec![PropertySnapshot::capture("count", Some(initializer))]
}

#[test]
fn test_method_edit_is_absorbed_by_live_instances() {
    let env = ExecutionEnv::new();
    env.set_unit_snapshots(UNIT, count_snapshot("0"));
    env.define("x-counter", class(COUNTER_V1), UNIT, &[]);

    let first = env.construct("x-counter", InstanceHooks::default()).unwrap();
    let second = env.construct("x-counter", InstanceHooks::default()).unwrap();
    let (before_first, before_second) = (first.render_count(), second.render_count());

    env.define("x-counter", class(COUNTER_V2), UNIT, &[]);
    env.finalize_patch("x-counter", UNIT);

    assert!(!env.reload_requested(), "a render-method edit must be absorbed");
    assert_eq!(env.registry().bind_count("x-counter"), 1);
    assert_eq!(env.record("x-counter").unwrap().version(), 2);
    assert!(first.render_count() > before_first, "first instance saw no re-render");
    assert!(second.render_count() > before_second, "second instance saw no re-render");
}

#[test]
fn test_observed_attribute_addition_escalates() {
    let env = ExecutionEnv::new();
    env.set_unit_snapshots(UNIT, count_snapshot("0"));
    env.define("x-counter", class(COUNTER_V2), UNIT, &[]);
    env.define("x-counter", class(COUNTER_V3), UNIT, &[]);

    assert!(env.reload_requested());
    let reason = env.reload_reason();
    assert!(reason.contains("Observed attributes changed"), "got: {reason}");
    assert!(reason.contains("data-theme"), "got: {reason}");

    // The registry binding is untouched; the proxy still carries the list
    // the platform read at bind time.
    assert_eq!(env.registry().bind_count("x-counter"), 1);
    let proxy = env.record("x-counter").unwrap().proxy();
    assert_eq!(proxy.observed_attributes(), ["label".to_string()]);
}

#[test]
fn test_patch_restores_captured_field_values() {
    let env = ExecutionEnv::new();
    env.set_unit_snapshots(UNIT, count_snapshot("0"));
    env.define("x-counter", class(COUNTER_V1), UNIT, &[]);
    let shown = env.construct("x-counter", InstanceHooks::default()).unwrap();

    // Interaction drifts the live value away from the declared initial.
    shown.set_field("count", Value::Number(5.0));

    env.set_unit_snapshots(UNIT, count_snapshot("0"));
    env.define("x-counter", class(COUNTER_V2), UNIT, &[]);
    env.finalize_patch("x-counter", UNIT);

    assert_eq!(shown.field("count"), Some(Value::Number(0.0)));
}

#[test]
fn test_field_without_captured_value_is_left_alone() {
    let env = ExecutionEnv::new();
    let snapshots = vec![PropertySnapshot::capture("items", Some("loadItems()"))];
    env.set_unit_snapshots(UNIT, snapshots.clone());
    env.define(
        "x-list",
        class("class List extends LitElement { @property() items = loadItems(); }"),
        UNIT,
        &[],
    );
    let shown = env.construct("x-list", InstanceHooks::default()).unwrap();
    shown.set_field("items", Value::Str("local".to_string()));

    env.set_unit_snapshots(UNIT, snapshots);
    env.define(
        "x-list",
        class("class List extends LitElement { @property() items = loadItems(); trimmed() { return 1; } }"),
        UNIT,
        &[],
    );
    env.finalize_patch("x-list", UNIT);

    assert_eq!(
        shown.field("items"),
        Some(Value::Str("local".to_string())),
        "a non-literal initializer has nothing to restore"
    );
}

#[test]
fn test_disconnected_instance_gets_no_more_renders() {
    let env = ExecutionEnv::new();
    env.define("x-counter", class(COUNTER_V1), UNIT, &[]);
    let gone = env.construct("x-counter", InstanceHooks::default()).unwrap();
    let kept = env.construct("x-counter", InstanceHooks::default()).unwrap();

    env.remove(&gone);
    let (gone_before, kept_before) = (gone.render_count(), kept.render_count());

    env.define("x-counter", class(COUNTER_V2), UNIT, &[]);

    assert_eq!(gone.render_count(), gone_before, "removed instance must stay quiet");
    assert!(kept.render_count() > kept_before);
}

#[test]
fn test_escalation_still_advances_the_delegate() {
    let env = ExecutionEnv::new();
    env.define("x-counter", class(COUNTER_V2), UNIT, &[]);
    env.define("x-counter", class(COUNTER_V3), UNIT, &[]);
    assert!(env.take_reload_request().is_some());

    // The same class again now diffs clean against the stored delegate, so
    // no new escalation appears.
    env.define("x-counter", class(COUNTER_V3), UNIT, &[]);
    assert!(env.take_reload_request().is_none());
    assert_eq!(env.record("x-counter").unwrap().version(), 3);
}

#[test]
fn test_render_failure_does_not_stop_propagation() {
    let env = ExecutionEnv::new();
    env.define("x-counter", class(COUNTER_V1), UNIT, &[]);

    let broken_hooks = InstanceHooks {
        render: Some(Rc::new(|_instance| Err(RenderError("sink offline".to_string())))),
        teardown: None,
    };
    let broken = env.construct("x-counter", broken_hooks).unwrap();
    let healthy = env.construct("x-counter", InstanceHooks::default()).unwrap();
    let (broken_before, healthy_before) = (broken.render_count(), healthy.render_count());

    env.define("x-counter", class(COUNTER_V2), UNIT, &[]);

    assert_eq!(broken.render_count(), broken_before + 1);
    assert_eq!(healthy.render_count(), healthy_before + 1);
    assert!(!env.reload_requested(), "a failing host render never escalates");
}

#[test]
fn test_style_only_edit_patches_and_reaches_instances() {
    let env = ExecutionEnv::new();
    env.define(
        "x-card",
        class("class Card extends LitElement { static styles = css`:host { color: black; }`; }"),
        "src/card.ts",
        &[],
    );
    let shown = env.construct("x-card", InstanceHooks::default()).unwrap();
    assert!(shown.adopted_styles().unwrap_or_default().contains("black"));

    env.define(
        "x-card",
        class("class Card extends LitElement { static styles = css`:host { color: teal; }`; }"),
        "src/card.ts",
        &[],
    );

    assert!(!env.reload_requested(), "a style edit must be absorbed");
    assert!(shown.adopted_styles().unwrap_or_default().contains("teal"));
}

#[test]
fn test_two_names_swap_independently() {
    let env = ExecutionEnv::new();
    env.define("x-card", class("class Card extends LitElement { render() { return 1; } }"), "src/card.ts", &[]);
    env.define("x-badge", class("class Badge extends LitElement { render() { return 1; } }"), "src/card.ts", &[]);

    env.define(
        "x-badge",
        class("class Badge extends LitElement { static observedAttributes = ['tone']; render() { return 1; } }"),
        "src/card.ts",
        &[],
    );

    assert!(env.reload_requested());
    assert_eq!(env.record("x-card").unwrap().version(), 1, "x-card was not redefined");
    assert_eq!(env.record("x-badge").unwrap().version(), 2);
    assert_eq!(env.registry().bind_count("x-card"), 1);
    assert_eq!(env.registry().bind_count("x-badge"), 1);
}
