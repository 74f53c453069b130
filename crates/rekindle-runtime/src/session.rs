//! The dev session: one environment, one unit cache, one reload cycle.

use std::rc::Rc;

use log::{debug, info, warn};

use rekindle_engine::{ComponentInstance, ExecutionEnv, InstanceHooks};
use rekindle_transform::{
    apply_post_pass, PostPassOutcome, RewriteOutcome, TransformOptions, Transformer,
};

use crate::error::RuntimeError;
use crate::eval::{evaluate_unit, EvalSummary};

/// How the session settled an update to an already-loaded unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The update was patched into the running environment in place.
    Absorbed,
    /// The update could not be patched. The environment was rebuilt from
    /// the unit cache; `reason` itemizes what forced the escalation.
    FullReload {
        /// The escalation reasons, joined the way the engine reports them.
        reason: String,
    },
}

/// A development session driving hot swaps across edits.
///
/// The session plays the host pipeline's role: it lowers each unit
/// through the transform and the post-pass, evaluates the emitted
/// directives against its [`ExecutionEnv`], and turns an escalation
/// flag into the discard-everything reload a real page would perform.
/// Lowered units are cached in load order so a reload can replay them
/// into a fresh environment.
pub struct DevSession {
    transformer: Transformer,
    env: ExecutionEnv,
    units: Vec<(String, String)>,
    reloads: u64,
}

impl DevSession {
    /// Build a session rewriting with `options`.
    pub fn new(options: TransformOptions) -> Result<DevSession, RuntimeError> {
        Ok(DevSession {
            transformer: Transformer::new(options)?,
            env: ExecutionEnv::new(),
            units: Vec::new(),
            reloads: 0,
        })
    }

    /// Build a session with the default (lit-flavored) options.
    pub fn with_defaults() -> Result<DevSession, RuntimeError> {
        DevSession::new(TransformOptions::default())
    }

    /// The live execution environment.
    pub fn env(&self) -> &ExecutionEnv {
        &self.env
    }

    /// How many full reloads this session has performed.
    pub fn reload_count(&self) -> u64 {
        self.reloads
    }

    /// How many units the session has loaded.
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Load a unit for the first time: lower it, cache the lowered text,
    /// and evaluate it into the environment.
    ///
    /// Loading the same id again replaces the cached text in place,
    /// keeping the original load order for reload replay.
    pub fn load_unit(&mut self, unit_id: &str, source: &str) -> EvalSummary {
        let code = self.lower(unit_id, source);
        let summary = evaluate_unit(&self.env, &code);
        self.cache_unit(unit_id, code);
        summary
    }

    /// Apply an edit to a unit, then settle the outcome: if evaluation
    /// flagged an escalation, the environment is rebuilt from the unit
    /// cache and the update reports as a full reload.
    pub fn update_unit(&mut self, unit_id: &str, source: &str) -> UpdateOutcome {
        let code = self.lower(unit_id, source);
        evaluate_unit(&self.env, &code);
        self.cache_unit(unit_id, code);
        match self.env.take_reload_request() {
            Some(reason) => {
                self.full_reload();
                UpdateOutcome::FullReload { reason }
            }
            None => {
                debug!("update to {unit_id} absorbed");
                UpdateOutcome::Absorbed
            }
        }
    }

    /// Discard the environment and re-evaluate every cached unit in load
    /// order. Instances do not survive; this is the page reload.
    pub fn full_reload(&mut self) {
        self.reloads += 1;
        self.env = ExecutionEnv::new();
        info!(
            "full reload #{}: replaying {} units",
            self.reloads,
            self.units.len()
        );
        for (_, code) in &self.units {
            evaluate_unit(&self.env, code);
        }
    }

    /// Construct an instance of a defined name, as the page would when
    /// the element enters the document.
    pub fn create_element(&self, name: &str, hooks: InstanceHooks) -> Option<Rc<ComponentInstance>> {
        self.env.construct(name, hooks)
    }

    /// Tear an instance down, as the page would when the element leaves
    /// the document.
    pub fn remove_element(&self, instance: &Rc<ComponentInstance>) {
        self.env.remove(instance);
    }

    /// Rewrite plus post-pass. Rewrite warnings are logged here; they
    /// mean degraded restore behavior, not failure.
    fn lower(&self, unit_id: &str, source: &str) -> String {
        let code = match self.transformer.rewrite_unit(source, unit_id) {
            RewriteOutcome::Rewritten { code, warnings, .. } => {
                for warning in &warnings {
                    warn!("{unit_id}: {warning}");
                }
                code
            }
            RewriteOutcome::Unchanged => {
                debug!("{unit_id}: no registration construct, loading as is");
                source.to_string()
            }
        };
        match apply_post_pass(&code) {
            PostPassOutcome::Rewritten { code: finalized, .. } => finalized,
            PostPassOutcome::Unchanged => code,
        }
    }

    fn cache_unit(&mut self, unit_id: &str, code: String) {
        match self.units.iter_mut().find(|(id, _)| id == unit_id) {
            Some(entry) => entry.1 = code,
            None => self.units.push((unit_id.to_string(), code)),
        }
    }
}
