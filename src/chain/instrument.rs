// ES1 - polyphonic instrument unit
//
// Consumes the command stream and mixes its voices into the output gain.
// The input passes straight through to the output.

use super::node::{parse_settings, patched, to_value, ChainError, ChainUnit, NodeContext, SettingsStream};
use crate::audio::graph::tolerate;
use crate::audio::{DeviceId, DeviceKind, GraphError, ParamName, ParamRef, Port, SharedGraph};
use crate::messaging::{Broadcast, Command, CommandBus, Subscription};
use crate::project::{NodeId, NodeType};
use crate::synth::{Es1Settings, ModulationTarget, VoiceEngine};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

pub struct Es1Node {
    id: NodeId,
    graph: SharedGraph,
    input: DeviceId,
    output: DeviceId,
    engine: Rc<RefCell<VoiceEngine>>,
    commands: Rc<CommandBus>,
    subscription: Option<Subscription>,
    changes: SettingsStream,
    targets: Vec<Rc<ModulationTarget>>,
}

impl Es1Node {
    pub fn new(id: NodeId, initial: &Value, ctx: &NodeContext) -> Result<Self, GraphError> {
        let graph = ctx.graph.clone();
        let input = graph.create(DeviceKind::Gain);
        let output = graph.create(DeviceKind::Gain);
        graph.connect(input, Port::Input(output))?;

        let settings: Es1Settings = parse_settings(id, initial);
        let engine = VoiceEngine::new(graph.clone(), ctx.scheduler.clone(), output, settings);

        let subscription = {
            let engine = Rc::downgrade(&engine);
            ctx.commands.subscribe(move |command: &Command| {
                if let Some(engine) = engine.upgrade() {
                    engine.borrow_mut().handle(command);
                }
            })
        };

        let targets = vec![ctx
            .router
            .target(ParamRef::new(output, ParamName::Gain), "ES1 output")];

        Ok(Self {
            id,
            graph,
            input,
            output,
            engine,
            commands: ctx.commands.clone(),
            subscription: Some(subscription),
            changes: Rc::new(Broadcast::new()),
            targets,
        })
    }
}

impl ChainUnit for Es1Node {
    fn id(&self) -> NodeId {
        self.id
    }

    fn node_type(&self) -> NodeType {
        NodeType::Es1
    }

    fn input(&self) -> DeviceId {
        self.input
    }

    fn output(&self) -> DeviceId {
        self.output
    }

    fn settings(&self) -> Value {
        to_value(self.engine.borrow().settings())
    }

    fn changes(&self) -> &SettingsStream {
        &self.changes
    }

    fn update(&mut self, patch: &Value) -> Result<(), ChainError> {
        let current = self.engine.borrow().settings().clone();
        let next: Es1Settings = patched(self.id, &current, patch)?;
        self.engine.borrow_mut().apply_settings(next);
        self.publish();
        Ok(())
    }

    fn targets(&self) -> Vec<Rc<ModulationTarget>> {
        self.targets.clone()
    }

    fn voice_engine(&self) -> Option<Rc<RefCell<VoiceEngine>>> {
        Some(self.engine.clone())
    }

    fn teardown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.commands.unsubscribe(subscription);
        }
        self.engine.borrow_mut().teardown();
        tolerate(self.graph.disconnect(self.input, Port::Input(self.output)));
        self.graph.release(self.input);
        self.graph.release(self.output);
    }
}
