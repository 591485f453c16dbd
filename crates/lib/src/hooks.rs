//! Lifecycle hooks.
//!
//! Each document type owns a [`Dispatcher`] holding the hooks registered for
//! it when the type was declared. The "-ing" events (`Creating`, `Saving`,
//! `Deleting`) may veto the operation in flight by returning
//! [`HookOutcome::Veto`]; a veto is a normal control signal, not an error.
//! Outcomes of the past-tense events are ignored.

use std::{collections::HashMap, fmt, rc::Rc};

use crate::Document;

/// Named points in a document's save/delete lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    Creating,
    Created,
    Saving,
    Saved,
    Deleting,
    Deleted,
}

impl LifecycleEvent {
    pub const ALL: [LifecycleEvent; 6] = [
        LifecycleEvent::Creating,
        LifecycleEvent::Created,
        LifecycleEvent::Saving,
        LifecycleEvent::Saved,
        LifecycleEvent::Deleting,
        LifecycleEvent::Deleted,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::Creating => "creating",
            LifecycleEvent::Created => "created",
            LifecycleEvent::Saving => "saving",
            LifecycleEvent::Saved => "saved",
            LifecycleEvent::Deleting => "deleting",
            LifecycleEvent::Deleted => "deleted",
        }
    }

    /// Whether a hook on this event can abort the operation.
    pub fn can_veto(&self) -> bool {
        matches!(
            self,
            LifecycleEvent::Creating | LifecycleEvent::Saving | LifecycleEvent::Deleting
        )
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a hook asks the lifecycle to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HookOutcome {
    #[default]
    Continue,
    Veto,
}

impl HookOutcome {
    pub fn is_veto(&self) -> bool {
        matches!(self, HookOutcome::Veto)
    }
}

impl From<()> for HookOutcome {
    fn from(_: ()) -> Self {
        HookOutcome::Continue
    }
}

/// `false` vetoes, `true` continues.
impl From<bool> for HookOutcome {
    fn from(proceed: bool) -> Self {
        if proceed {
            HookOutcome::Continue
        } else {
            HookOutcome::Veto
        }
    }
}

/// A registered hook. Receives the document the event fired on.
pub type Hook = Rc<dyn Fn(&Document) -> HookOutcome>;

/// Per-type hook table.
#[derive(Clone, Default)]
pub struct Dispatcher {
    hooks: HashMap<LifecycleEvent, Vec<Hook>>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut counts: Vec<(&'static str, usize)> = self
            .hooks
            .iter()
            .map(|(event, hooks)| (event.name(), hooks.len()))
            .collect();
        counts.sort();
        f.debug_struct("Dispatcher").field("hooks", &counts).finish()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a hook. Hooks for one event run in registration order.
    pub fn listen<F, R>(&mut self, event: LifecycleEvent, hook: F)
    where
        F: Fn(&Document) -> R + 'static,
        R: Into<HookOutcome>,
    {
        let hook: Hook = Rc::new(move |doc: &Document| hook(doc).into());
        self.hooks.entry(event).or_default().push(hook);
    }

    pub fn has_listeners(&self, event: LifecycleEvent) -> bool {
        self.hooks.get(&event).is_some_and(|hooks| !hooks.is_empty())
    }

    /// Runs the hooks for `event`, stopping at the first veto.
    ///
    /// Always returns [`HookOutcome::Continue`] for events that cannot veto.
    pub fn fire(&self, event: LifecycleEvent, doc: &Document) -> HookOutcome {
        let Some(hooks) = self.hooks.get(&event) else {
            return HookOutcome::Continue;
        };

        for hook in hooks {
            if hook(doc).is_veto() && event.can_veto() {
                return HookOutcome::Veto;
            }
        }
        HookOutcome::Continue
    }
}
