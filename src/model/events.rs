//! Lifecycle events and hook propagation.
//!
//! Hooks are declared on the schema (or attached to an instance) and run
//! around persistence and population. `before_save` and `before_delete` can
//! cancel the operation by returning [`HookOutcome::Cancel`]; find events
//! only observe. When an event fires on a model it also fires on every
//! embedded sub-document, and a cancel from any of them cancels the whole
//! operation. Every hook still runs; cancellation never short-circuits the
//! sweep.

use crate::error::ModelError;
use crate::model::{DocumentModel, SubDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    BeforeSave,
    AfterSave,
    BeforeDelete,
    AfterDelete,
    BeforeFind,
    AfterFind,
}

impl LifecycleEvent {
    pub const ALL: [LifecycleEvent; 6] = [
        LifecycleEvent::BeforeSave,
        LifecycleEvent::AfterSave,
        LifecycleEvent::BeforeDelete,
        LifecycleEvent::AfterDelete,
        LifecycleEvent::BeforeFind,
        LifecycleEvent::AfterFind,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::BeforeSave => "before_save",
            LifecycleEvent::AfterSave => "after_save",
            LifecycleEvent::BeforeDelete => "before_delete",
            LifecycleEvent::AfterDelete => "after_delete",
            LifecycleEvent::BeforeFind => "before_find",
            LifecycleEvent::AfterFind => "after_find",
        }
    }

    /// Whether hooks for this event can cancel the surrounding operation.
    /// Find events only observe.
    pub fn is_cancelable(&self) -> bool {
        matches!(
            self,
            LifecycleEvent::BeforeSave | LifecycleEvent::BeforeDelete
        )
    }
}

/// What a hook decided about the surrounding operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    Proceed,
    Cancel,
}

impl HookOutcome {
    pub fn is_proceed(self) -> bool {
        self == HookOutcome::Proceed
    }
}

/// A lifecycle hook. Hooks declare which events they handle and run with
/// mutable access to the model the event fired on.
pub trait LifecycleHook: Send + Sync {
    fn handles(&self, event: LifecycleEvent) -> bool;

    fn run(&self, model: &mut DocumentModel, event: LifecycleEvent) -> HookOutcome;
}

/// A closure-backed hook bound to one or more events.
pub struct FnHook<F> {
    events: Vec<LifecycleEvent>,
    callback: F,
}

impl<F> FnHook<F>
where
    F: Fn(&mut DocumentModel, LifecycleEvent) -> HookOutcome + Send + Sync,
{
    /// Hook a single event.
    pub fn on(event: LifecycleEvent, callback: F) -> Self {
        Self {
            events: vec![event],
            callback,
        }
    }

    /// Hook several events with one closure.
    pub fn events<I>(events: I, callback: F) -> Self
    where
        I: IntoIterator<Item = LifecycleEvent>,
    {
        Self {
            events: events.into_iter().collect(),
            callback,
        }
    }
}

impl<F> LifecycleHook for FnHook<F>
where
    F: Fn(&mut DocumentModel, LifecycleEvent) -> HookOutcome + Send + Sync,
{
    fn handles(&self, event: LifecycleEvent) -> bool {
        self.events.contains(&event)
    }

    fn run(&self, model: &mut DocumentModel, event: LifecycleEvent) -> HookOutcome {
        (self.callback)(model, event)
    }
}

/// Run `event` on one model. All matching hooks run; for cancelable events
/// the results are AND-ed, for the rest the outcome is always proceed.
pub(crate) fn run_on_document(model: &mut DocumentModel, event: LifecycleEvent) -> bool {
    let hooks = model.hooks_for(event);
    if hooks.is_empty() {
        return true;
    }
    tracing::trace!(
        model = model.schema().name(),
        event = event.as_str(),
        hooks = hooks.len(),
        "running lifecycle hooks"
    );
    let mut valid = true;
    for hook in hooks {
        if hook.run(model, event) == HookOutcome::Cancel {
            valid = false;
        }
    }
    !event.is_cancelable() || valid
}

/// Run `event` on every declared sub-document of `owner`, resolving slots
/// that were never touched. Visits everything even after a cancel.
pub(crate) fn run_on_sub_documents(
    owner: &mut DocumentModel,
    event: LifecycleEvent,
) -> Result<bool, ModelError> {
    let names: Vec<String> = owner.schema().sub_documents().keys().cloned().collect();
    let mut valid = true;
    for name in names {
        owner.resolve_sub_document(&name)?;
        if let Some(slot) = owner.sub_documents.get_mut(&name) {
            match slot {
                SubDocument::Single(model) => {
                    if !run_on_document(model, event) {
                        valid = false;
                    }
                }
                SubDocument::Multi(models) => {
                    for item in models.iter_mut() {
                        if !run_on_document(item, event) {
                            valid = false;
                        }
                    }
                }
            }
        }
    }
    Ok(valid)
}

impl DocumentModel {
    /// Whether any hook on this instance handles `event`. When nothing does,
    /// the event is skipped entirely, sub-documents included.
    pub fn handles_event(&self, event: LifecycleEvent) -> bool {
        self.hooks.iter().any(|h| h.handles(event))
    }

    pub(crate) fn hooks_for(
        &self,
        event: LifecycleEvent,
    ) -> Vec<std::sync::Arc<dyn LifecycleHook>> {
        self.hooks
            .iter()
            .filter(|h| h.handles(event))
            .cloned()
            .collect()
    }

    /// Fire `before_save` on this model and every sub-document. Returns
    /// whether the save may proceed.
    pub fn before_save(&mut self) -> Result<bool, ModelError> {
        if !self.handles_event(LifecycleEvent::BeforeSave) {
            return Ok(true);
        }
        let own = run_on_document(self, LifecycleEvent::BeforeSave);
        let subs = run_on_sub_documents(self, LifecycleEvent::BeforeSave)?;
        Ok(own && subs)
    }

    pub fn after_save(&mut self) -> Result<(), ModelError> {
        if self.handles_event(LifecycleEvent::AfterSave) {
            run_on_document(self, LifecycleEvent::AfterSave);
            run_on_sub_documents(self, LifecycleEvent::AfterSave)?;
        }
        Ok(())
    }

    /// Fire `before_delete` on this model and every sub-document. Returns
    /// whether the delete may proceed.
    pub fn before_delete(&mut self) -> Result<bool, ModelError> {
        if !self.handles_event(LifecycleEvent::BeforeDelete) {
            return Ok(true);
        }
        let own = run_on_document(self, LifecycleEvent::BeforeDelete);
        let subs = run_on_sub_documents(self, LifecycleEvent::BeforeDelete)?;
        Ok(own && subs)
    }

    pub fn after_delete(&mut self) -> Result<(), ModelError> {
        if self.handles_event(LifecycleEvent::AfterDelete) {
            run_on_document(self, LifecycleEvent::AfterDelete);
            run_on_sub_documents(self, LifecycleEvent::AfterDelete)?;
        }
        Ok(())
    }

    pub fn before_find(&mut self) -> Result<(), ModelError> {
        if self.handles_event(LifecycleEvent::BeforeFind) {
            run_on_document(self, LifecycleEvent::BeforeFind);
            run_on_sub_documents(self, LifecycleEvent::BeforeFind)?;
        }
        Ok(())
    }

    pub fn after_find(&mut self) -> Result<(), ModelError> {
        if self.handles_event(LifecycleEvent::AfterFind) {
            run_on_document(self, LifecycleEvent::AfterFind);
            run_on_sub_documents(self, LifecycleEvent::AfterFind)?;
        }
        Ok(())
    }
}
