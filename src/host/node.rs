use crate::host::{
    atom::Atom,
    config::HostConfig,
    diagnostics::{LogRecord, LogSink},
    dispatch::{self, DispatchOutcome, Dispatcher, Phase, Resolution},
    error::{HostError, HostResult},
    loader::{self, LoadTarget, ModuleState, SourceResolver},
    marshal::{self, MarshalError},
    message::{Message, MessageKind},
    outbound::{Destination, Graph, OutboundEnvelope},
    registry::HandlerRegistry,
};
use crate::language::source::SourceFile;
use crate::runtime::{
    builtins,
    error::RuntimeResult,
    interpreter::{Interpreter, ScriptHost},
    value::{FunctionRef, HostFunction, ObjectRef, Value},
};
use crate::tools::diagnostics::render_uncaught;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ports {
    pub inlets: usize,
    pub outlets: usize,
}

/// Ambient values visible while one message is being handled.
#[derive(Debug, Clone)]
struct DispatchFrame {
    inlet: usize,
    messagename: String,
}

/// One script instance patched into a graph.
pub struct ScriptNode {
    script: String,
    config: HostConfig,
    resolver: Box<dyn SourceResolver>,
    graph: Box<dyn Graph>,
    log: Box<dyn LogSink>,
    ports: Ports,
    arguments: Vec<Atom>,
    builtins: ObjectRef,
    globals: ObjectRef,
    registry: HandlerRegistry,
    state: ModuleState,
    dispatcher: Dispatcher,
}

impl ScriptNode {
    /// Creates a node from its creation arguments, the first of which names
    /// the script. Fails unless the script loads completely.
    pub fn create(
        args: Vec<Atom>,
        config: HostConfig,
        resolver: Box<dyn SourceResolver>,
        graph: Box<dyn Graph>,
        log: Box<dyn LogSink>,
    ) -> HostResult<Self> {
        let builtins_obj = Value::new_object();
        builtins::install(&builtins_obj);
        let mut node = Self {
            script: String::new(),
            ports: Ports {
                inlets: config.inlets.max(1),
                outlets: config.outlets,
            },
            config,
            resolver,
            graph,
            log,
            arguments: args,
            builtins: builtins_obj,
            globals: Value::new_object(),
            registry: HandlerRegistry::default(),
            state: ModuleState::Unloaded,
            dispatcher: Dispatcher::default(),
        };

        let Some(script) = node
            .arguments
            .first()
            .and_then(Atom::as_symbol)
            .map(str::to_string)
        else {
            node.report_error(&HostError::MissingSource);
            return Err(HostError::MissingSource);
        };
        if let Err(error) = node.load_script(&script) {
            node.report_error(&error);
            return Err(error);
        }
        Ok(node)
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn ports(&self) -> Ports {
        self.ports
    }

    pub fn state(&self) -> ModuleState {
        self.state
    }

    pub fn phase(&self) -> Phase {
        self.dispatcher.phase()
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.borrow().get(name)
    }

    /// Handles one inbound message. Never fails: every error is written to
    /// the node's log and summarized in the outcome.
    pub fn receive(&mut self, inlet: usize, message: Message) -> DispatchOutcome {
        if inlet >= self.ports.inlets {
            self.report_error(&HostError::InletRange {
                index: inlet,
                inlets: self.ports.inlets,
            });
            return DispatchOutcome::Rejected;
        }
        if self.run_command(&message) {
            return DispatchOutcome::Command;
        }

        self.dispatcher.begin();
        match dispatch::resolve(&self.registry, &message) {
            Resolution::Invoke { handler, function } => {
                let args = marshal::atoms_to_values(&message.args);
                let frame = DispatchFrame {
                    inlet,
                    messagename: message.handler_name().to_string(),
                };
                self.invoke_handler(handler, function, frame, args)
            }
            Resolution::Private { handler } => {
                self.dispatcher.finish();
                self.report_error(&HostError::PrivateHandler {
                    name: handler.clone(),
                });
                DispatchOutcome::Private { handler }
            }
            Resolution::Drop => {
                self.dispatcher.finish();
                self.log.write(LogRecord::post(format!(
                    "no handler for '{}'",
                    message.selector()
                )));
                DispatchOutcome::Dropped
            }
        }
    }

    fn run_command(&mut self, message: &Message) -> bool {
        let MessageKind::Custom(selector) = &message.kind else {
            return false;
        };
        match selector.as_str() {
            "compile" => {
                let name = message
                    .args
                    .first()
                    .and_then(Atom::as_symbol)
                    .map(str::to_string)
                    .unwrap_or_else(|| self.script.clone());
                if let Err(error) = self.load_script(&name) {
                    self.report_error(&error);
                }
            }
            "setprop" => self.set_property(&message.args),
            "getprop" => self.get_property(&message.args),
            "delprop" => self.delete_property(&message.args),
            _ => return false,
        }
        true
    }

    /// Loads `name` into a fresh global object. A script that cannot be
    /// found leaves the current one in place.
    fn load_script(&mut self, name: &str) -> HostResult<()> {
        let source = Rc::new(self.resolver.resolve(name)?);
        self.script = name.to_string();
        self.reset_globals();
        self.state = ModuleState::Compiling;

        let program = match loader::compile(&source) {
            Ok(program) => program,
            Err(error) => {
                self.state = ModuleState::FailedCompile;
                self.registry = HandlerRegistry::default();
                return Err(error);
            }
        };

        let result = self.with_interpreter(None, |interp| {
            loader::execute(interp, source, &program, &LoadTarget::Globals)
        });
        self.rebuild_registry();
        if let Err(error) = result {
            self.state = ModuleState::FailedRun;
            return Err(error);
        }

        self.state = ModuleState::Ready;
        self.graph.load_complete(name);
        self.loadbang();
        Ok(())
    }

    fn reset_globals(&mut self) {
        let previous = std::mem::replace(&mut self.globals, Value::new_object());
        // Closures hold the scope chain that holds them.
        previous.borrow_mut().properties.clear();
    }

    fn rebuild_registry(&mut self) {
        self.registry = HandlerRegistry::build(&self.globals);
    }

    fn loadbang(&mut self) {
        let Some(function) = self.registry.dispatchable("loadbang").cloned() else {
            return;
        };
        self.dispatcher.begin();
        let frame = DispatchFrame {
            inlet: 0,
            messagename: "loadbang".to_string(),
        };
        self.invoke_handler("loadbang".to_string(), function, frame, Vec::new());
    }

    fn invoke_handler(
        &mut self,
        handler: String,
        function: FunctionRef,
        frame: DispatchFrame,
        args: Vec<Value>,
    ) -> DispatchOutcome {
        self.dispatcher.invoking();
        let inlet = frame.inlet;
        let result = self.with_interpreter(Some(frame), |interp| interp.invoke(&function, args));
        self.dispatcher.finish();
        match result {
            Ok(_) => DispatchOutcome::Handled { handler },
            Err(uncaught) => {
                self.report_error(&HostError::HandlerInvocation {
                    handler: handler.clone(),
                    inlet,
                    details: render_uncaught(&uncaught),
                });
                DispatchOutcome::Failed { handler }
            }
        }
    }

    fn set_property(&mut self, args: &[Atom]) {
        let [name, values @ ..] = args else {
            return;
        };
        if values.is_empty() {
            return;
        }
        let Some(name) = name.as_symbol() else {
            self.report_error(&HostError::SetProperty {
                name: name.to_string(),
            });
            return;
        };
        let value = match values {
            [single] => marshal::atom_to_value(single),
            several => Value::from(marshal::atoms_to_values(several)),
        };
        self.globals.borrow_mut().set(name, value);
        self.rebuild_registry();
    }

    fn get_property(&mut self, args: &[Atom]) {
        let Some(name) = args.first().and_then(Atom::as_symbol) else {
            return;
        };
        let value = match self.global(name) {
            Some(value) if !value.is_undefined() => value,
            _ => return,
        };
        if self.ports.outlets == 0 {
            return;
        }
        match marshal::shape_payload(&[value], "outlet") {
            Ok(Some(message)) => self.graph.deliver(OutboundEnvelope {
                destination: Destination::Outlet(0),
                message,
            }),
            Ok(None) => {}
            Err(error) => self.report_error(&HostError::Marshal(error)),
        }
    }

    fn delete_property(&mut self, args: &[Atom]) {
        let Some(name) = args.first().and_then(Atom::as_symbol) else {
            return;
        };
        self.globals.borrow_mut().remove(name);
        self.rebuild_registry();
    }

    fn report_error(&mut self, error: &HostError) {
        self.log.write(LogRecord::error(error.to_string()));
    }

    /// Runs script code with this node as its host. The registry is rebuilt
    /// afterwards if the code added globals.
    fn with_interpreter<R>(
        &mut self,
        frame: Option<DispatchFrame>,
        run: impl FnOnce(&mut Interpreter<'_>) -> R,
    ) -> R {
        let mut context = NodeContext {
            resolver: self.resolver.as_ref(),
            graph: self.graph.as_mut(),
            log: self.log.as_mut(),
            ports: &mut self.ports,
            arguments: &self.arguments,
            frame,
            call_depth: self.config.call_depth,
            globals_dirty: false,
        };
        let result = {
            let mut interp =
                Interpreter::new(&mut context, self.builtins.clone(), self.globals.clone());
            run(&mut interp)
        };
        let dirty = context.globals_dirty;
        if dirty {
            self.rebuild_registry();
        }
        result
    }
}

/// The node as seen from inside script code.
struct NodeContext<'n> {
    resolver: &'n dyn SourceResolver,
    graph: &'n mut dyn Graph,
    log: &'n mut dyn LogSink,
    ports: &'n mut Ports,
    arguments: &'n [Atom],
    frame: Option<DispatchFrame>,
    call_depth: usize,
    globals_dirty: bool,
}

impl NodeContext<'_> {
    fn report_error(&mut self, error: HostError) {
        self.log.write(LogRecord::error(error.to_string()));
    }

    fn send(&mut self, destination: Destination, payload: &[Value], label: &'static str) {
        match marshal::shape_payload(payload, label) {
            Ok(Some(message)) => self.graph.deliver(OutboundEnvelope {
                destination,
                message,
            }),
            Ok(None) => {}
            Err(error) => self.report_error(HostError::Marshal(error)),
        }
    }

    fn outlet(&mut self, args: &[Value]) {
        let Some((index, payload)) = args.split_first() else {
            return;
        };
        let Value::Number(index) = index else {
            self.report_error(HostError::Marshal(MarshalError::OutletIndex {
                kind: index.type_of(),
            }));
            return;
        };
        let index = index.trunc();
        if index.is_nan() || index < 0.0 || index >= self.ports.outlets as f64 {
            self.report_error(HostError::OutletRange {
                index: index as i64,
                outlets: self.ports.outlets,
            });
            return;
        }
        self.send(Destination::Outlet(index as usize), payload, "outlet");
    }

    fn messnamed(&mut self, args: &[Value]) {
        let Some((target, payload)) = args.split_first() else {
            return;
        };
        let Value::String(target) = target else {
            self.report_error(HostError::Marshal(MarshalError::ReceiverName {
                kind: target.type_of(),
            }));
            return;
        };
        self.send(Destination::Named(target.to_string()), payload, "messnamed");
    }

    fn resize(&mut self, inlets: usize, outlets: usize) {
        if self.ports.inlets == inlets && self.ports.outlets == outlets {
            return;
        }
        self.ports.inlets = inlets;
        self.ports.outlets = outlets;
        self.graph.ports_changed(inlets, outlets);
    }
}

fn join_display(args: &[Value]) -> String {
    args.iter()
        .map(Value::to_display_string)
        .collect::<Vec<_>>()
        .join(" ")
}

impl ScriptHost for NodeContext<'_> {
    fn ambient(&self, name: &str) -> Option<Value> {
        match name {
            "inlets" => Some(Value::Number(self.ports.inlets as f64)),
            "outlets" => Some(Value::Number(self.ports.outlets as f64)),
            "inlet" => Some(Value::Number(
                self.frame.as_ref().map(|frame| frame.inlet).unwrap_or(0) as f64,
            )),
            "messagename" => Some(Value::from(
                self.frame
                    .as_ref()
                    .map(|frame| frame.messagename.as_str())
                    .unwrap_or(""),
            )),
            "jsarguments" => Some(Value::from(marshal::atoms_to_values(self.arguments))),
            _ => None,
        }
    }

    fn assign_ambient(&mut self, name: &str, value: &Value) -> bool {
        match name {
            "inlets" => {
                let inlets = value.to_int32().max(1) as usize;
                let outlets = self.ports.outlets;
                self.resize(inlets, outlets);
                true
            }
            "outlets" => {
                let outlets = value.to_int32().max(0) as usize;
                let inlets = self.ports.inlets;
                self.resize(inlets, outlets);
                true
            }
            "inlet" | "messagename" | "jsarguments" => true,
            _ => false,
        }
    }

    fn call_native(&mut self, function: HostFunction, args: &[Value]) -> RuntimeResult<Value> {
        match function {
            HostFunction::Post if !args.is_empty() => {
                self.log.write(LogRecord::post(join_display(args)))
            }
            HostFunction::Cpost if !args.is_empty() => {
                self.log.write(LogRecord::console(join_display(args)))
            }
            HostFunction::Error if !args.is_empty() => {
                self.log.write(LogRecord::error(join_display(args)))
            }
            HostFunction::Outlet => self.outlet(args),
            HostFunction::Messnamed => self.messnamed(args),
            _ => {}
        }
        Ok(Value::Undefined)
    }

    fn load_source(&mut self, name: &str) -> Result<Rc<SourceFile>, HostError> {
        self.resolver.resolve(name).map(Rc::new)
    }

    fn report(&mut self, error: HostError) {
        self.report_error(error);
    }

    fn globals_changed(&mut self) {
        self.globals_dirty = true;
    }

    fn max_call_depth(&self) -> usize {
        self.call_depth
    }
}
