//! The hot-swap execution environment.
//!
//! [`ExecutionEnv`] owns everything one page lifetime owns: the one-time
//! registry, the per-name registration records, the per-unit property
//! snapshots, and the process-wide reload request. Definition calls route
//! through [`ExecutionEnv::define`]; whether a repeat definition patches
//! the bound proxy or escalates is decided by the compatibility check and
//! never surfaced to the caller as an error.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::{debug, trace, warn};
use rustc_hash::FxHashMap;

use rekindle_core::{PropertySnapshot, Value};

use crate::class::ComponentClass;
use crate::diff::check_compatibility;
use crate::instance::{ComponentInstance, InstanceHooks};
use crate::proxy::ProxyClass;
use crate::record::RegistrationRecord;
use crate::registry::ElementRegistry;

/// Page-lifetime hot-swap state.
#[derive(Debug, Default)]
pub struct ExecutionEnv {
    registry: ElementRegistry,
    records: RefCell<FxHashMap<String, Rc<RegistrationRecord>>>,
    snapshots: RefCell<FxHashMap<String, Vec<PropertySnapshot>>>,
    bootstrapped: Cell<bool>,
    reload_requested: Cell<bool>,
    reload_reason: RefCell<String>,
}

impl ExecutionEnv {
    /// Creates an environment with nothing bound.
    pub fn new() -> ExecutionEnv {
        ExecutionEnv::default()
    }

    /// The underlying one-time registry.
    pub fn registry(&self) -> &ElementRegistry {
        &self.registry
    }

    /// Installs the runtime global. Only the first call does anything;
    /// every later unit evaluation finds it already present.
    pub fn bootstrap(&self) -> bool {
        if self.bootstrapped.replace(true) {
            trace!("bootstrap already installed");
            false
        } else {
            debug!("runtime bootstrap installed");
            true
        }
    }

    /// Whether the runtime global has been installed.
    pub fn is_bootstrapped(&self) -> bool {
        self.bootstrapped.get()
    }

    /// Replaces the snapshot array for a unit. The latest evaluation of a
    /// unit always wins.
    pub fn set_unit_snapshots(&self, unit_id: &str, snapshots: Vec<PropertySnapshot>) {
        self.snapshots.borrow_mut().insert(unit_id.to_string(), snapshots);
    }

    /// The snapshot array last recorded for a unit.
    pub fn unit_snapshots(&self, unit_id: &str) -> Vec<PropertySnapshot> {
        self.snapshots.borrow().get(unit_id).cloned().unwrap_or_default()
    }

    /// The registration record behind a name, if any.
    pub fn record(&self, name: &str) -> Option<Rc<RegistrationRecord>> {
        self.records.borrow().get(name).cloned()
    }

    /// Names currently registered, unordered.
    pub fn defined_names(&self) -> Vec<String> {
        self.records.borrow().keys().cloned().collect()
    }

    /// Routes one definition call.
    ///
    /// The first call for a name binds a proxy into the registry and files
    /// a record. Every later call for the same name is a hot swap: patch
    /// the proxy when the replacement is compatible, escalate otherwise.
    /// Either way the record's delegate, origin, and version move forward.
    pub fn define(&self, name: &str, class: Rc<ComponentClass>, module_id: &str, deps: &[String]) {
        if let Some(record) = self.record(name) {
            self.hot_swap(&record, class, module_id, deps);
            return;
        }

        let proxy = Rc::new(ProxyClass::subclass_of(&class, name));
        if let Err(err) = self.registry.define(name, Rc::clone(&proxy)) {
            warn!("cannot bind `{name}`: {err}");
            return;
        }
        class.mark_finalized();
        let record = Rc::new(RegistrationRecord::new(name, module_id, deps, class, proxy));
        self.records.borrow_mut().insert(name.to_string(), record);
        debug!("defined `{name}` from {module_id}");
    }

    fn hot_swap(
        &self,
        record: &RegistrationRecord,
        class: Rc<ComponentClass>,
        module_id: &str,
        deps: &[String],
    ) {
        let old = record.delegate();
        let report = check_compatibility(&old, &class);
        if report.is_patchable() {
            let proxy = record.proxy();
            proxy.patch_from(&class);
            let instances = record.live_instances();
            for instance in &instances {
                instance.adopt_styles(proxy.styles());
                if let Err(err) = instance.request_render() {
                    warn!(
                        "re-render of `{}` instance #{} failed: {err}",
                        record.name(),
                        instance.id()
                    );
                }
            }
            debug!(
                "absorbed update for `{}` ({} live instances)",
                record.name(),
                instances.len()
            );
        } else {
            let reason = report.reason_text();
            warn!("update for `{}` needs a full reload: {reason}", record.name());
            self.request_reload(&reason);
        }
        record.set_delegate(class);
        record.set_origin(module_id, deps);
        record.bump_version();
    }

    /// Re-drives captured field values through the current delegate's
    /// accessors on every live instance, with a re-render after each write.
    /// Unknown names and fields without a captured value are skipped.
    pub fn finalize_patch(&self, name: &str, module_id: &str) {
        let Some(record) = self.record(name) else {
            debug!("finalize for unregistered `{name}` ignored");
            return;
        };
        let snapshots = self.unit_snapshots(module_id);
        if snapshots.is_empty() {
            return;
        }
        let delegate = record.delegate();
        let instances = record.live_instances();
        for entry in delegate.prototype.iter().filter(|e| e.descriptor.is_accessor()) {
            let Some(field) = entry.key.as_str() else {
                continue;
            };
            let Some(snapshot) = snapshots.iter().find(|s| s.name == field) else {
                continue;
            };
            let Some(value) = snapshot.value.clone() else {
                trace!("`{field}` has no captured value; leaving instances as they are");
                continue;
            };
            for instance in &instances {
                instance.set_field(field, value.clone());
                if let Err(err) = instance.request_render() {
                    warn!(
                        "re-render of `{name}` instance #{} failed: {err}",
                        instance.id()
                    );
                }
            }
        }
    }

    /// Creates an element for a registered name. Reactive fields start from
    /// the unit's captured values; the first render runs immediately.
    pub fn construct(&self, name: &str, hooks: InstanceHooks) -> Option<Rc<ComponentInstance>> {
        let Some(record) = self.record(name) else {
            debug!("construct of unregistered `{name}` ignored");
            return None;
        };
        let proxy = record.proxy();
        if !proxy.is_finalized() {
            proxy.mark_finalized();
        }
        let instance = ComponentInstance::new(name, hooks);
        instance.adopt_styles(proxy.styles());
        let delegate = record.delegate();
        let snapshots = self.unit_snapshots(&record.module_id());
        for field in &delegate.reactive {
            let value = snapshots
                .iter()
                .find(|snapshot| &snapshot.name == field)
                .and_then(|snapshot| snapshot.value.clone())
                .unwrap_or(Value::Undefined);
            instance.set_field(field, value);
        }
        record.track_instance(&instance);
        if let Err(err) = instance.request_render() {
            warn!("initial render of `{name}` #{} failed: {err}", instance.id());
        }
        Some(instance)
    }

    /// Disconnects an element: teardown hook, then removal from tracking.
    pub fn remove(&self, instance: &Rc<ComponentInstance>) {
        instance.teardown();
        if let Some(record) = self.record(instance.name()) {
            record.untrack_instance(instance.id());
        }
    }

    /// Whether an escalation is pending.
    pub fn reload_requested(&self) -> bool {
        self.reload_requested.get()
    }

    /// The accumulated escalation reason.
    pub fn reload_reason(&self) -> String {
        self.reload_reason.borrow().clone()
    }

    /// Claims a pending escalation, clearing the flag and reason. This is
    /// what the acceptance hook does before asking the host to reload.
    pub fn take_reload_request(&self) -> Option<String> {
        if !self.reload_requested.replace(false) {
            return None;
        }
        Some(std::mem::take(&mut *self.reload_reason.borrow_mut()))
    }

    fn request_reload(&self, reason: &str) {
        self.reload_requested.set(true);
        let mut stored = self.reload_reason.borrow_mut();
        if stored.is_empty() {
            stored.push_str(reason);
        } else if !stored.contains(reason) {
            stored.push_str("; ");
            stored.push_str(reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_component_class;

    fn class(src: &str) -> Rc<ComponentClass> {
        Rc::new(read_component_class(src).expect("test class parses"))
    }

    #[test]
    fn test_first_define_binds_and_files_a_record() {
        let env = ExecutionEnv::new();
        env.define("x-a", class("class A extends Base { render() { return 1; } }"), "src/a.ts", &[]);
        assert!(env.registry().is_defined("x-a"));
        let record = env.record("x-a").unwrap();
        assert_eq!(record.version(), 1);
        assert_eq!(record.delegate().ident, "A");
        assert!(record.delegate().is_finalized());
    }

    #[test]
    fn test_invalid_name_binds_nothing() {
        let env = ExecutionEnv::new();
        env.define("notvalid", class("class A {}"), "src/a.ts", &[]);
        assert!(env.record("notvalid").is_none());
        assert!(env.registry().is_empty());
    }

    #[test]
    fn test_compatible_redefinition_patches_in_place() {
        let env = ExecutionEnv::new();
        env.define("x-a", class("class A extends Base { render() { return 1; } }"), "src/a.ts", &[]);
        let shown = env.construct("x-a", InstanceHooks::default()).unwrap();
        let before = shown.render_count();

        env.define("x-a", class("class A extends Base { render() { return 2; } }"), "src/a.ts", &[]);

        assert!(!env.reload_requested(), "method edit must not escalate");
        assert_eq!(env.registry().bind_count("x-a"), 1);
        let record = env.record("x-a").unwrap();
        assert_eq!(record.version(), 2);
        assert_eq!(shown.render_count(), before + 1);
        let patched = record.proxy().own_prototype_entry("render").unwrap();
        assert!(matches!(
            patched.descriptor,
            crate::class::Descriptor::Method { ref body, .. } if body.contains("return 2;")
        ));
    }

    #[test]
    fn test_incompatible_redefinition_escalates_but_still_advances() {
        let env = ExecutionEnv::new();
        env.define(
            "x-a",
            class("class A extends Base { constructor() { super(); } }"),
            "src/a.ts",
            &[],
        );
        env.define(
            "x-a",
            class("class A extends Base { constructor() { super(); this.fresh = 1; } }"),
            "src/a.ts",
            &[],
        );

        assert!(env.reload_requested());
        assert!(env.reload_reason().contains("added [fresh]"));
        let record = env.record("x-a").unwrap();
        assert_eq!(record.version(), 2, "delegate and version move even on escalation");
        assert!(record.delegate().constructor_body.as_deref().unwrap_or("").contains("fresh"));
        assert_eq!(env.registry().bind_count("x-a"), 1);
    }

    #[test]
    fn test_take_reload_request_clears_the_flag() {
        let env = ExecutionEnv::new();
        env.request_reload("Constructor body changed");
        env.request_reload("Observed attributes changed: added [x]");
        let reason = env.take_reload_request().unwrap();
        assert!(reason.contains("Constructor body changed"));
        assert!(reason.contains("Observed attributes changed"));
        assert!(!env.reload_requested());
        assert_eq!(env.take_reload_request(), None);
        assert_eq!(env.reload_reason(), "");
    }

    #[test]
    fn test_construct_seeds_fields_from_snapshots() {
        let env = ExecutionEnv::new();
        env.set_unit_snapshots(
            "src/a.ts",
            vec![PropertySnapshot::capture("count", Some("41"))],
        );
        env.define(
            "x-a",
            class("class A extends Base { @property() count = 41; }"),
            "src/a.ts",
            &[],
        );
        let instance = env.construct("x-a", InstanceHooks::default()).unwrap();
        assert_eq!(instance.field("count"), Some(Value::Number(41.0)));
        assert_eq!(instance.render_count(), 1, "construction renders once");
    }

    #[test]
    fn test_finalize_restores_values_through_accessors() {
        let env = ExecutionEnv::new();
        env.define(
            "x-a",
            class("class A extends Base { @property() count = 0; }"),
            "src/a.ts",
            &[],
        );
        let instance = env.construct("x-a", InstanceHooks::default()).unwrap();
        instance.set_field("count", Value::Number(7.0));

        env.set_unit_snapshots(
            "src/a.ts",
            vec![PropertySnapshot::capture("count", Some("0"))],
        );
        let renders_before = instance.render_count();
        env.finalize_patch("x-a", "src/a.ts");

        assert_eq!(instance.field("count"), Some(Value::Number(0.0)));
        assert_eq!(instance.render_count(), renders_before + 1);
    }

    #[test]
    fn test_finalize_for_unknown_name_is_a_no_op() {
        let env = ExecutionEnv::new();
        env.set_unit_snapshots("src/a.ts", vec![PropertySnapshot::capture("count", Some("0"))]);
        env.finalize_patch("x-missing", "src/a.ts");
        assert!(!env.reload_requested());
    }

    #[test]
    fn test_bootstrap_happens_once() {
        let env = ExecutionEnv::new();
        assert!(!env.is_bootstrapped());
        assert!(env.bootstrap());
        assert!(!env.bootstrap(), "second bootstrap must be a no-op");
        assert!(env.is_bootstrapped());
    }

    #[test]
    fn test_remove_stops_tracking() {
        let env = ExecutionEnv::new();
        env.define("x-a", class("class A extends Base {}"), "src/a.ts", &[]);
        let instance = env.construct("x-a", InstanceHooks::default()).unwrap();
        let record = env.record("x-a").unwrap();
        assert_eq!(record.instance_count(), 1);
        env.remove(&instance);
        assert_eq!(record.instance_count(), 0);
        assert!(!instance.is_connected());
    }
}
