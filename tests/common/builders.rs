//! Test data builders for creating test components

use super::Log;
use std::collections::HashMap;
use visflow::pipeline::{
    BufferPolicy, Component, ComponentId, InPort, Interface, JoinMode, OutPort, Pipeline,
    PipelineResult, Transition,
};

/// What a test handler does when it fires.
#[derive(Debug, Clone)]
pub enum Action {
    /// Read every dependency and log `handler:port=value`.
    Record,
    /// Read the first dependency, log it, write `value + 1` to the output,
    /// then log `handler:done`.
    Forward(String),
    /// Log and return an error.
    Fail,
    /// Log and panic.
    Panic,
}

struct ScriptedHandler {
    name: String,
    dependencies: Vec<String>,
    join: Option<JoinMode>,
    action: Action,
}

/// Builder for a component with `i32` ports and scripted handlers.
pub struct NodeBuilder {
    name: String,
    inputs: Vec<(String, BufferPolicy)>,
    outputs: Vec<String>,
    handlers: Vec<ScriptedHandler>,
    refuse: Vec<Transition>,
    log: Log,
}

impl NodeBuilder {
    pub fn new(name: &str, log: &Log) -> Self {
        Self {
            name: name.to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            handlers: Vec::new(),
            refuse: Vec::new(),
            log: log.clone(),
        }
    }

    pub fn input(mut self, name: &str, policy: BufferPolicy) -> Self {
        self.inputs.push((name.to_string(), policy));
        self
    }

    pub fn output(mut self, name: &str) -> Self {
        self.outputs.push(name.to_string());
        self
    }

    pub fn handler(mut self, name: &str, dependencies: &[&str], action: Action) -> Self {
        self.handlers.push(ScriptedHandler {
            name: name.to_string(),
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            join: None,
            action,
        });
        self
    }

    /// Set the join mode of the most recently added handler.
    pub fn join(mut self, mode: JoinMode) -> Self {
        if let Some(last) = self.handlers.last_mut() {
            last.join = Some(mode);
        }
        self
    }

    /// Make the lifecycle callback for `transition` return `false`.
    pub fn refuse(mut self, transition: Transition) -> Self {
        self.refuse.push(transition);
        self
    }

    pub fn build(self) -> TestNode {
        TestNode { setup: self }
    }

    pub fn add_to(self, pipeline: &mut Pipeline) -> PipelineResult<ComponentId> {
        let name = self.name.clone();
        pipeline.add_component(&name, "TestNode", Box::new(self.build()))
    }
}

pub struct TestNode {
    setup: NodeBuilder,
}

impl TestNode {
    fn callback(&self, transition: Transition) -> bool {
        self.setup
            .log
            .lock()
            .unwrap()
            .push(format!("{}:{}", self.setup.name, transition));
        !self.setup.refuse.contains(&transition)
    }
}

impl Component for TestNode {
    fn prepare_interface(&mut self, iface: &mut Interface<'_>) -> PipelineResult<()> {
        let mut inputs = HashMap::new();
        for (name, policy) in &self.setup.inputs {
            let port = InPort::<i32>::new(name.as_str(), *policy);
            iface.register_input(&port)?;
            inputs.insert(name.clone(), port);
        }
        let mut outputs = HashMap::new();
        for name in &self.setup.outputs {
            let port = OutPort::<i32>::new(name.as_str());
            iface.register_output(&port)?;
            outputs.insert(name.clone(), port);
        }

        for handler in &self.setup.handlers {
            let deps: Vec<(String, InPort<i32>)> = handler
                .dependencies
                .iter()
                .filter_map(|d| inputs.get(d).map(|p| (d.clone(), p.clone())))
                .collect();
            let subscribed: Vec<InPort<i32>> = deps.iter().map(|(_, p)| p.clone()).collect();
            let target = match &handler.action {
                Action::Forward(out) => outputs.get(out).cloned(),
                _ => None,
            };
            let (log, name, action) = (
                self.setup.log.clone(),
                handler.name.clone(),
                handler.action.clone(),
            );

            iface.register_handler(&handler.name, move || {
                match &action {
                    Action::Record => {
                        for (port, input) in &deps {
                            let value = input
                                .read()
                                .map(|v| v.to_string())
                                .unwrap_or_else(|_| "-".to_string());
                            log.lock().unwrap().push(format!("{}:{}={}", name, port, value));
                        }
                    }
                    Action::Forward(_) => {
                        let (port, input) = &deps[0];
                        let v = input.read()?;
                        log.lock().unwrap().push(format!("{}:{}={}", name, port, v));
                        if let Some(out) = &target {
                            out.write(v + 1)?;
                        }
                        log.lock().unwrap().push(format!("{}:done", name));
                    }
                    Action::Fail => {
                        log.lock().unwrap().push(format!("{}:fail", name));
                        anyhow::bail!("{} failed on purpose", name);
                    }
                    Action::Panic => {
                        log.lock().unwrap().push(format!("{}:panic", name));
                        panic!("{} panicked on purpose", name);
                    }
                }
                Ok(())
            })?;

            for port in &subscribed {
                iface.add_dependency(&handler.name, port)?;
            }
            if let Some(mode) = handler.join {
                iface.set_join_mode(&handler.name, mode)?;
            }
        }
        Ok(())
    }

    fn on_init(&mut self) -> bool {
        self.callback(Transition::Init)
    }

    fn on_start(&mut self) -> bool {
        self.callback(Transition::Start)
    }

    fn on_stop(&mut self) -> bool {
        self.callback(Transition::Stop)
    }

    fn on_finish(&mut self) -> bool {
        self.callback(Transition::Finish)
    }
}
