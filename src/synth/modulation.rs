// Modulation routing - patch one armed source into parameter targets
//
// The armed source is a single slot owned by the router. Arming replaces
// whatever was armed before; completing a connect gesture over a target
// wires the source into that parameter and empties the slot.

use crate::audio::{DeviceId, GraphError, ParamRef, Port, SharedGraph};
use crate::messaging::{Slot, Subscription};
use std::cell::Cell;
use std::rc::Rc;

/// A modulation-capable output
#[derive(Debug, Clone, PartialEq)]
pub struct ModulationSource {
    pub output: DeviceId,
    pub label: String,
}

pub type ArmedSource = Slot<Option<ModulationSource>>;

/// A parameter that can receive modulation
pub struct ModulationTarget {
    param: ParamRef,
    label: String,
    connections: Cell<u32>,
    available: Rc<Cell<bool>>,
    armed: Rc<ArmedSource>,
    subscription: Subscription,
}

impl ModulationTarget {
    pub fn param(&self) -> ParamRef {
        self.param
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of sources connected so far. Never decreases.
    pub fn connection_count(&self) -> u32 {
        self.connections.get()
    }

    /// True while a source is armed and could be dropped here
    pub fn is_available(&self) -> bool {
        self.available.get()
    }
}

impl Drop for ModulationTarget {
    fn drop(&mut self) {
        self.armed.unsubscribe(self.subscription);
    }
}

impl std::fmt::Debug for ModulationTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModulationTarget")
            .field("param", &self.param)
            .field("label", &self.label)
            .field("connections", &self.connections.get())
            .finish()
    }
}

pub struct ModulationRouter {
    graph: SharedGraph,
    armed: Rc<ArmedSource>,
}

impl ModulationRouter {
    pub fn new(graph: SharedGraph) -> Self {
        Self {
            graph,
            armed: Rc::new(Slot::new(None)),
        }
    }

    /// Arm `source`, replacing any source armed before
    pub fn arm(&self, source: ModulationSource) {
        log::debug!("Modulation source armed: {}", source.label);
        self.armed.set(Some(source));
    }

    pub fn armed(&self) -> Option<ModulationSource> {
        self.armed.get()
    }

    /// Drop the armed source without connecting. Returns false if nothing was armed.
    pub fn cancel(&self) -> bool {
        self.armed.take().is_some()
    }

    /// Register a parameter as a modulation target
    pub fn target(&self, param: ParamRef, label: impl Into<String>) -> Rc<ModulationTarget> {
        let available = Rc::new(Cell::new(false));
        let subscription = {
            let available = available.clone();
            self.armed
                .subscribe(move |source: &Option<ModulationSource>| available.set(source.is_some()))
        };

        Rc::new(ModulationTarget {
            param,
            label: label.into(),
            connections: Cell::new(0),
            available,
            armed: self.armed.clone(),
            subscription,
        })
    }

    /// Complete a connect gesture over `target`.
    ///
    /// Returns Ok(false) if no source was armed. The slot is emptied only
    /// after the source is wired and counted; if wiring fails the source
    /// stays armed.
    pub fn connect(&self, target: &ModulationTarget) -> Result<bool, GraphError> {
        let Some(source) = self.armed.get() else {
            return Ok(false);
        };

        self.graph.connect(source.output, Port::Param(target.param))?;
        target.connections.set(target.connections.get() + 1);
        self.armed.take();
        log::info!("Connected {} to {}", source.label, target.label);
        Ok(true)
    }

    /// Observe the armed slot; the listener is called with the current value first
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: FnMut(&Option<ModulationSource>) + 'static,
    {
        self.armed.subscribe(listener)
    }

    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        self.armed.unsubscribe(subscription)
    }
}
