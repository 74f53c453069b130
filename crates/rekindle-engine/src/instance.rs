//! Live component instances.
//!
//! An instance is the engine's stand-in for one upgraded element: a bag of
//! reactive field values, a re-render request counter, and the host-provided
//! hooks that give "render" and "teardown" their meaning. Hook absence is
//! never an error; hot-swap propagation must work against bare instances.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;

use rekindle_core::Value;

use crate::error::RenderError;

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Host-injected behavior for an instance.
#[derive(Clone, Default)]
pub struct InstanceHooks {
    /// Called on every re-render request, after the counter increments.
    pub render: Option<Rc<dyn Fn(&ComponentInstance) -> Result<(), RenderError>>>,
    /// Called once when the element leaves the tree.
    pub teardown: Option<Rc<dyn Fn(&ComponentInstance)>>,
}

impl fmt::Debug for InstanceHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceHooks")
            .field("render", &self.render.is_some())
            .field("teardown", &self.teardown.is_some())
            .finish()
    }
}

/// One upgraded element.
#[derive(Debug)]
pub struct ComponentInstance {
    id: u64,
    name: String,
    fields: RefCell<FxHashMap<String, Value>>,
    adopted_styles: RefCell<Option<String>>,
    render_requests: Cell<u64>,
    connected: Cell<bool>,
    hooks: InstanceHooks,
}

impl ComponentInstance {
    /// Creates a connected instance under a registration name.
    pub fn new(name: &str, hooks: InstanceHooks) -> Rc<ComponentInstance> {
        Rc::new(ComponentInstance {
            id: NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed),
            name: name.to_string(),
            fields: RefCell::new(FxHashMap::default()),
            adopted_styles: RefCell::new(None),
            render_requests: Cell::new(0),
            connected: Cell::new(true),
            hooks,
        })
    }

    /// Process-unique instance id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The registration name this instance was constructed under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the element is still in the tree.
    pub fn is_connected(&self) -> bool {
        self.connected.get()
    }

    /// Writes a reactive field value.
    pub fn set_field(&self, name: &str, value: Value) {
        self.fields.borrow_mut().insert(name.to_string(), value);
    }

    /// Reads a reactive field value.
    pub fn field(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }

    /// Replaces the style sheet this element has adopted.
    pub fn adopt_styles(&self, styles: Option<String>) {
        *self.adopted_styles.borrow_mut() = styles;
    }

    /// The style sheet currently adopted, if any.
    pub fn adopted_styles(&self) -> Option<String> {
        self.adopted_styles.borrow().clone()
    }

    /// Counts the request, then runs the render hook if one is installed.
    /// The count moves even when the hook fails; the request was made.
    pub fn request_render(&self) -> Result<(), RenderError> {
        self.render_requests.set(self.render_requests.get() + 1);
        match &self.hooks.render {
            Some(hook) => hook(self),
            None => Ok(()),
        }
    }

    /// Total re-render requests observed so far.
    pub fn render_count(&self) -> u64 {
        self.render_requests.get()
    }

    /// Runs the teardown hook, if any, and marks the instance disconnected.
    pub fn teardown(&self) {
        if let Some(hook) = &self.hooks.teardown {
            hook(self);
        }
        self.connected.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_counts_without_a_hook() {
        let instance = ComponentInstance::new("x-a", InstanceHooks::default());
        assert_eq!(instance.render_count(), 0);
        instance.request_render().unwrap();
        instance.request_render().unwrap();
        assert_eq!(instance.render_count(), 2);
    }

    #[test]
    fn test_render_hook_sees_current_fields() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let hooks = InstanceHooks {
            render: Some(Rc::new(move |instance: &ComponentInstance| {
                sink.borrow_mut().push(instance.field("count"));
                Ok(())
            })),
            teardown: None,
        };
        let instance = ComponentInstance::new("x-a", hooks);
        instance.set_field("count", Value::Number(3.0));
        instance.request_render().unwrap();
        assert_eq!(*seen.borrow(), vec![Some(Value::Number(3.0))]);
    }

    #[test]
    fn test_failed_render_still_counts() {
        let hooks = InstanceHooks {
            render: Some(Rc::new(|_: &ComponentInstance| {
                Err(RenderError("sink offline".to_string()))
            })),
            teardown: None,
        };
        let instance = ComponentInstance::new("x-a", hooks);
        assert!(instance.request_render().is_err());
        assert_eq!(instance.render_count(), 1);
    }

    #[test]
    fn test_teardown_runs_hook_and_disconnects() {
        let torn = Rc::new(Cell::new(false));
        let flag = Rc::clone(&torn);
        let hooks = InstanceHooks {
            render: None,
            teardown: Some(Rc::new(move |_: &ComponentInstance| flag.set(true))),
        };
        let instance = ComponentInstance::new("x-a", hooks);
        assert!(instance.is_connected());
        instance.teardown();
        assert!(torn.get());
        assert!(!instance.is_connected());
    }

    #[test]
    fn test_instance_ids_are_unique() {
        let a = ComponentInstance::new("x-a", InstanceHooks::default());
        let b = ComponentInstance::new("x-a", InstanceHooks::default());
        assert_ne!(a.id(), b.id());
    }
}
