//! Per-name registration bookkeeping.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::class::ComponentClass;
use crate::instance::ComponentInstance;
use crate::proxy::ProxyClass;

/// Everything the engine tracks for one bound name: the proxy in the
/// registry, the class currently behind it, where it came from, and the
/// live instances updates must reach. Instances are held weakly; dropped
/// elements fall out on the next walk.
#[derive(Debug)]
pub struct RegistrationRecord {
    name: String,
    module_id: RefCell<String>,
    local_deps: RefCell<Vec<String>>,
    delegate: RefCell<Rc<ComponentClass>>,
    proxy: Rc<ProxyClass>,
    version: Cell<u64>,
    instances: RefCell<Vec<Weak<ComponentInstance>>>,
}

impl RegistrationRecord {
    /// Creates the record for a fresh binding, at version 1.
    pub fn new(
        name: &str,
        module_id: &str,
        local_deps: &[String],
        delegate: Rc<ComponentClass>,
        proxy: Rc<ProxyClass>,
    ) -> RegistrationRecord {
        RegistrationRecord {
            name: name.to_string(),
            module_id: RefCell::new(module_id.to_string()),
            local_deps: RefCell::new(local_deps.to_vec()),
            delegate: RefCell::new(delegate),
            proxy,
            version: Cell::new(1),
            instances: RefCell::new(Vec::new()),
        }
    }

    /// The bound registration name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Id of the unit that last defined this name.
    pub fn module_id(&self) -> String {
        self.module_id.borrow().clone()
    }

    /// Local-module dependency identifiers captured at the call site.
    pub fn local_deps(&self) -> Vec<String> {
        self.local_deps.borrow().clone()
    }

    /// The class currently behind the proxy.
    pub fn delegate(&self) -> Rc<ComponentClass> {
        Rc::clone(&self.delegate.borrow())
    }

    /// The stable class bound into the registry.
    pub fn proxy(&self) -> Rc<ProxyClass> {
        Rc::clone(&self.proxy)
    }

    /// Update generation; starts at 1 and moves on every redefinition.
    pub fn version(&self) -> u64 {
        self.version.get()
    }

    /// Swaps in a replacement delegate.
    pub fn set_delegate(&self, class: Rc<ComponentClass>) {
        *self.delegate.borrow_mut() = class;
    }

    /// Records where the latest definition came from.
    pub fn set_origin(&self, module_id: &str, local_deps: &[String]) {
        *self.module_id.borrow_mut() = module_id.to_string();
        *self.local_deps.borrow_mut() = local_deps.to_vec();
    }

    /// Bumps the generation, returning the new value.
    pub fn bump_version(&self) -> u64 {
        let next = self.version.get() + 1;
        self.version.set(next);
        next
    }

    /// Starts tracking a live instance.
    pub fn track_instance(&self, instance: &Rc<ComponentInstance>) {
        let mut instances = self.instances.borrow_mut();
        instances.retain(|weak| weak.strong_count() > 0);
        instances.push(Rc::downgrade(instance));
    }

    /// Stops tracking the instance with the given id.
    pub fn untrack_instance(&self, id: u64) {
        self.instances
            .borrow_mut()
            .retain(|weak| weak.upgrade().map_or(false, |live| live.id() != id));
    }

    /// All instances still alive, pruning the rest.
    pub fn live_instances(&self) -> Vec<Rc<ComponentInstance>> {
        let mut instances = self.instances.borrow_mut();
        let live: Vec<Rc<ComponentInstance>> =
            instances.iter().filter_map(Weak::upgrade).collect();
        instances.retain(|weak| weak.strong_count() > 0);
        live
    }

    /// How many tracked instances are still alive.
    pub fn instance_count(&self) -> usize {
        self.live_instances().len()
    }
}
