use crate::host::{
    atom::Atom,
    config::HostConfig,
    diagnostics::{LogLevel, MemoryLog},
    dispatch::{DispatchOutcome, Phase},
    error::{HostError, HostResult},
    loader::{MemoryResolver, ModuleState},
    marshal::OutletMessage,
    message::Message,
    node::{Ports, ScriptNode},
    outbound::{Destination, GraphEvent, OutboundEnvelope, RecordingGraph},
};

const TEST_JS: &str = include_str!("../../tests/scripts/test.js");
const INCLUDE_JS: &str = include_str!("../../tests/scripts/include.js");
const BROKEN_JS: &str = include_str!("../../tests/scripts/broken.js");
const THROWS_JS: &str = include_str!("../../tests/scripts/throws.js");

struct Harness {
    node: ScriptNode,
    graph: RecordingGraph,
    log: MemoryLog,
    sources: MemoryResolver,
}

fn fixtures() -> MemoryResolver {
    MemoryResolver::new()
        .with("test.js", TEST_JS)
        .with("include.js", INCLUDE_JS)
        .with("broken.js", BROKEN_JS)
        .with("throws.js", THROWS_JS)
}

fn try_create(
    sources: &MemoryResolver,
    args: Vec<Atom>,
    config: HostConfig,
) -> (HostResult<ScriptNode>, RecordingGraph, MemoryLog) {
    let graph = RecordingGraph::new();
    let log = MemoryLog::new();
    let node = ScriptNode::create(
        args,
        config,
        Box::new(sources.clone()),
        Box::new(graph.clone()),
        Box::new(log.clone()),
    );
    (node, graph, log)
}

impl Harness {
    fn with_config(sources: MemoryResolver, script: &str, config: HostConfig) -> Self {
        let (node, graph, log) = try_create(&sources, vec![Atom::symbol(script)], config);
        let node = match node {
            Ok(node) => node,
            Err(err) => panic!("node creation failed: {err}\nlog: {:?}", log.records()),
        };
        Self {
            node,
            graph,
            log,
            sources,
        }
    }

    fn new(sources: MemoryResolver, script: &str) -> Self {
        Self::with_config(sources, script, HostConfig::default())
    }

    fn script(text: &str) -> Self {
        Self::new(MemoryResolver::new().with("main.js", text), "main.js")
    }

    fn send(&mut self, inlet: usize, text: &str) -> DispatchOutcome {
        let message = Message::parse(text).expect("message");
        self.node.receive(inlet, message)
    }

    fn posts(&self) -> Vec<String> {
        self.log.texts(LogLevel::Post)
    }

    fn errors(&self) -> Vec<String> {
        self.log.texts(LogLevel::Error)
    }

    fn reset(&self) {
        self.log.clear();
        self.graph.clear();
    }
}

fn handled(name: &str) -> DispatchOutcome {
    DispatchOutcome::Handled {
        handler: name.to_string(),
    }
}

fn to_outlet(index: usize, message: OutletMessage) -> OutboundEnvelope {
    OutboundEnvelope {
        destination: Destination::Outlet(index),
        message,
    }
}

#[test]
fn loading_runs_top_level_code_and_fires_loadbang_once() {
    let harness = Harness::new(fixtures(), "test.js");
    assert_eq!(
        harness.posts(),
        vec![
            "included number 1",
            "Hello, world!",
            "jsarguments test.js",
            "loadbang",
        ]
    );
    assert_eq!(harness.log.texts(LogLevel::Console), vec!["cpost 1 2 3"]);
    assert_eq!(harness.errors(), vec!["error"]);
    assert_eq!(harness.node.state(), ModuleState::Ready);
    assert_eq!(harness.node.phase(), Phase::Idle);
    assert_eq!(
        harness.node.ports(),
        Ports {
            inlets: 3,
            outlets: 2
        }
    );
    assert_eq!(
        harness.graph.events(),
        vec![
            GraphEvent::PortsChanged {
                inlets: 3,
                outlets: 0
            },
            GraphEvent::PortsChanged {
                inlets: 3,
                outlets: 2
            },
            GraphEvent::LoadComplete("test.js".into()),
        ]
    );
}

#[test]
fn bang_sends_the_expected_traffic() {
    let mut harness = Harness::new(fixtures(), "test.js");
    harness.reset();

    assert_eq!(harness.send(0, "bang"), handled("bang"));
    assert_eq!(harness.posts(), vec!["Bang on inlet 0"]);
    assert_eq!(
        harness.graph.delivered(),
        vec![
            to_outlet(0, OutletMessage::Symbol("Hello, world!".into())),
            to_outlet(1, OutletMessage::Bang),
            to_outlet(0, OutletMessage::Float(47.11)),
            to_outlet(
                0,
                OutletMessage::List(vec![
                    Atom::symbol("x"),
                    Atom::symbol("y"),
                    Atom::symbol("z"),
                    Atom::Float(1.0),
                    Atom::Float(2.0),
                    Atom::Float(3.0),
                ])
            ),
            to_outlet(
                1,
                OutletMessage::List(vec![
                    Atom::symbol("hallo"),
                    Atom::symbol("ballo"),
                    Atom::Float(12.34),
                ])
            ),
            OutboundEnvelope {
                destination: Destination::Named("mess".into()),
                message: OutletMessage::Bang,
            },
        ]
    );
    assert!(harness.errors().is_empty());
}

#[test]
fn each_kind_reaches_its_handler_with_the_inlet() {
    let mut harness = Harness::new(fixtures(), "test.js");
    harness.reset();

    assert_eq!(harness.send(2, "bang"), handled("bang"));
    assert_eq!(harness.send(1, "47.11"), handled("msg_float"));
    assert_eq!(harness.send(0, "foo 1 bar"), handled("foo"));
    assert_eq!(harness.send(0, "1 2 three"), handled("list"));
    assert_eq!(
        harness.posts(),
        vec![
            "Bang on inlet 2",
            "float: 47.11",
            "foo: 1 'bar'",
            "list 3: 1 2 three",
        ]
    );
}

#[test]
fn unknown_selector_goes_to_anything_with_messagename() {
    let mut harness = Harness::new(fixtures(), "test.js");
    harness.reset();
    assert_eq!(harness.send(0, "zzz 1 2"), handled("anything"));
    assert_eq!(harness.posts(), vec!["anything: zzz"]);
}

#[test]
fn catch_all_receives_the_full_argument_list() {
    let mut harness = Harness::script(
        "function anything() { post(messagename, Array.from(arguments).join('|'), arguments.length); }",
    );
    assert_eq!(harness.send(0, "zzz 1 two 3"), handled("anything"));
    assert_eq!(harness.send(0, "bang"), handled("anything"));
    assert_eq!(harness.send(0, "5"), handled("anything"));
    assert_eq!(
        harness.posts(),
        vec!["zzz 1|two|3 3", "bang  0", "msg_float 5 1"]
    );
}

#[test]
fn inbound_loadbang_never_reaches_the_loadbang_handler() {
    let mut harness = Harness::new(fixtures(), "test.js");
    harness.reset();
    assert_eq!(harness.send(0, "loadbang"), handled("anything"));
    assert_eq!(harness.posts(), vec!["anything: loadbang"]);

    let mut bare = Harness::script("function loadbang() { post('lb'); }");
    assert_eq!(bare.posts(), vec!["lb"]);
    assert_eq!(bare.send(0, "loadbang"), DispatchOutcome::Dropped);
    assert_eq!(bare.posts(), vec!["lb", "no handler for 'loadbang'"]);
}

#[test]
fn private_functions_are_reported_not_called() {
    let mut harness = Harness::new(fixtures(), "test.js");
    harness.reset();
    assert_eq!(
        harness.send(0, "private"),
        DispatchOutcome::Private {
            handler: "private".into()
        }
    );
    assert!(harness.posts().is_empty());
    assert_eq!(harness.errors(), vec!["Function 'private' is private."]);
}

#[test]
fn a_throwing_handler_does_not_break_later_dispatch() {
    let mut harness = Harness::new(fixtures(), "test.js");
    harness.reset();

    assert_eq!(
        harness.send(1, "exception"),
        DispatchOutcome::Failed {
            handler: "exception".into()
        }
    );
    let errors = harness.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Error calling 'exception':\n"), "{}", errors[0]);
    assert!(errors[0].contains("Uncaught exception"), "{}", errors[0]);
    assert_eq!(harness.node.phase(), Phase::Idle);

    assert_eq!(harness.send(0, "bang"), handled("bang"));
    assert_eq!(harness.posts(), vec!["Bang on inlet 0"]);
}

#[test]
fn no_handlers_drops_with_a_post_notice() {
    let mut harness = Harness::script("let x = 1;");
    assert_eq!(harness.send(0, "bang"), DispatchOutcome::Dropped);
    assert_eq!(harness.send(0, "foo 1"), DispatchOutcome::Dropped);
    assert_eq!(
        harness.posts(),
        vec!["no handler for 'bang'", "no handler for 'foo'"]
    );
    assert!(harness.errors().is_empty());
    assert!(harness.graph.delivered().is_empty());
}

#[test]
fn non_function_handler_names_fall_through_to_anything() {
    let mut harness = Harness::script(
        "var bang = { note: 'data' };\nfunction anything() { post('caught ' + messagename); }",
    );
    assert_eq!(harness.send(0, "bang"), handled("anything"));
    assert_eq!(harness.posts(), vec!["caught bang"]);
}

#[test]
fn int_messages_fall_back_to_msg_float() {
    let mut harness = Harness::script("function msg_float(f) { post('f', f, messagename); }");
    assert_eq!(harness.node.receive(0, Message::int(3)), handled("msg_float"));
    assert_eq!(harness.posts(), vec!["f 3 msg_int"]);
}

#[test]
fn float_messages_report_msg_float_as_messagename() {
    let mut harness = Harness::script("function anything() { post(messagename, arguments[0]); }");
    assert_eq!(harness.send(0, "2.5"), handled("anything"));
    assert_eq!(harness.send(0, "foo 1"), handled("anything"));
    assert_eq!(harness.posts(), vec!["msg_float 2.5", "foo 1"]);
}

#[test]
fn messages_on_missing_inlets_are_rejected() {
    let mut harness = Harness::new(fixtures(), "test.js");
    harness.reset();
    assert_eq!(harness.send(3, "bang"), DispatchOutcome::Rejected);
    assert_eq!(
        harness.errors(),
        vec!["Inlet index 3 out of range (node has 3 inlets)"]
    );
    assert!(harness.posts().is_empty());
}

#[test]
fn outlet_errors_are_reported_and_execution_continues() {
    let mut harness = Harness::script(
        "outlets = 1;\nfunction bang() { outlet(5, 1); outlet(-1, 1); outlet('0', 1); outlet(0, true); outlet(0); post('after'); }",
    );
    assert_eq!(harness.send(0, "bang"), handled("bang"));
    assert_eq!(
        harness.errors(),
        vec![
            "Outlet index 5 out of range (node has 1 outlets)",
            "Outlet index -1 out of range (node has 1 outlets)",
            "Outlet index must be a number, got string",
            "Cannot send a value of type boolean through outlet",
        ]
    );
    assert_eq!(harness.posts(), vec!["after"]);
    assert!(harness.graph.delivered().is_empty());
}

#[test]
fn messnamed_shapes_like_outlet() {
    let mut harness = Harness::script(
        "function bang() { messnamed('a', 1); messnamed('b', 'sym'); messnamed('c', 1, 'x'); messnamed('d'); messnamed(3, 1); }",
    );
    harness.send(0, "bang");
    let named = |name: &str, message| OutboundEnvelope {
        destination: Destination::Named(name.into()),
        message,
    };
    assert_eq!(
        harness.graph.delivered(),
        vec![
            named("a", OutletMessage::Float(1.0)),
            named("b", OutletMessage::Symbol("sym".into())),
            named(
                "c",
                OutletMessage::List(vec![Atom::Float(1.0), Atom::symbol("x")])
            ),
        ]
    );
    assert_eq!(
        harness.errors(),
        vec!["Receiver name must be a string, got number"]
    );
}

#[test]
fn include_into_globals_registers_handlers() {
    let sources = MemoryResolver::new()
        .with("main.js", "include('handlers.js');")
        .with("handlers.js", "function bang() { post('from include'); }");
    let mut harness = Harness::new(sources, "main.js");
    assert_eq!(harness.send(0, "bang"), handled("bang"));
    assert_eq!(harness.posts(), vec!["from include"]);
}

#[test]
fn handlers_added_at_dispatch_time_become_dispatchable() {
    let sources = MemoryResolver::new()
        .with(
            "main.js",
            "function msg_float() { include('late.js'); }\nfunction bang() { list = function() { post('dynamic'); }; }",
        )
        .with("late.js", "function symbol(s) { post('symbol ' + s); }");
    let mut harness = Harness::new(sources, "main.js");
    assert_eq!(harness.send(0, "symbol hi"), DispatchOutcome::Dropped);
    harness.send(0, "1");
    assert_eq!(harness.send(0, "symbol hi"), handled("symbol"));
    harness.send(0, "bang");
    assert_eq!(harness.send(0, "1 2"), handled("list"));
    assert_eq!(
        harness.posts(),
        vec!["no handler for 'symbol'", "symbol hi", "dynamic"]
    );
}

#[test]
fn include_with_scope_and_require_leave_globals_alone() {
    let sources = MemoryResolver::new()
        .with(
            "main.js",
            "const box = {};\ninclude('scoped.js', box);\nconst lib = require('lib.js');\nfunction bang() { post(box.value, lib.twice(4), typeof value, typeof hidden, require()); }",
        )
        .with("scoped.js", "var value = 42;")
        .with("lib.js", "let hidden = 1;\nexports.twice = x => x * 2;");
    let mut harness = Harness::new(sources, "main.js");
    harness.send(0, "bang");
    assert_eq!(harness.posts(), vec!["42 8 undefined undefined undefined"]);
    assert!(harness.node.global("value").is_none());
    assert!(harness.node.registry().get("twice").is_none());
}

#[test]
fn failed_include_is_reported_and_the_caller_continues() {
    let mut harness = Harness::script(
        "include('nope.js');\nconst missing = require('nope.js');\npost('continued', missing);",
    );
    assert_eq!(harness.posts(), vec!["continued undefined"]);
    assert_eq!(
        harness.errors(),
        vec![
            "Script file 'nope.js' not found.",
            "Script file 'nope.js' not found.",
        ]
    );
    assert_eq!(harness.node.state(), ModuleState::Ready);
    assert_eq!(harness.send(0, "bang"), DispatchOutcome::Dropped);
}

#[test]
fn included_compile_failure_leaves_no_bindings() {
    let sources = fixtures().with(
        "main.js",
        "const box = {};\ninclude('broken.js', box);\npost(Object.keys(box).length);\ninclude('throws.js', box);\npost(Object.keys(box).join(','));",
    );
    let harness = Harness::new(sources, "main.js");
    assert_eq!(harness.posts(), vec!["0", "bang,before"]);
    let errors = harness.errors();
    assert_eq!(errors.len(), 2);
    assert!(errors[0].starts_with("Error compiling 'broken.js':\n"), "{}", errors[0]);
    assert!(errors[1].starts_with("Error running 'throws.js':\n"), "{}", errors[1]);
}

#[test]
fn creation_fails_when_the_script_does_not_load() {
    let sources = fixtures();

    let (node, _, log) = try_create(&sources, vec![Atom::symbol("nope.js")], HostConfig::default());
    assert!(matches!(node, Err(HostError::NotFound { .. })));
    assert_eq!(log.texts(LogLevel::Error), vec!["Script file 'nope.js' not found."]);

    let (node, graph, log) =
        try_create(&sources, vec![Atom::symbol("broken.js")], HostConfig::default());
    assert!(matches!(node, Err(HostError::Compile { .. })));
    assert!(log.texts(LogLevel::Error)[0].starts_with("Error compiling 'broken.js':\n"));
    assert!(graph.events().is_empty());

    let (node, graph, log) =
        try_create(&sources, vec![Atom::symbol("throws.js")], HostConfig::default());
    assert!(matches!(node, Err(HostError::ModuleRun { .. })));
    assert!(log.texts(LogLevel::Error)[0].contains("Uncaught load failed"));
    assert!(graph.events().is_empty());
}

#[test]
fn creation_requires_a_script_name() {
    let sources = fixtures();
    for args in [vec![], vec![Atom::Float(1.0)]] {
        let (node, _, log) = try_create(&sources, args, HostConfig::default());
        assert!(matches!(node, Err(HostError::MissingSource)));
        assert_eq!(log.texts(LogLevel::Error), vec!["Must specify source file."]);
    }
}

#[test]
fn creation_arguments_and_config_reach_the_script() {
    let sources = MemoryResolver::new().with(
        "main.js",
        "post(jsarguments.length, jsarguments[1], jsarguments[2], inlets, outlets);\njsarguments = 0;\ninlet = 9;\npost(typeof jsarguments, inlet);",
    );
    let config = HostConfig {
        inlets: 2,
        outlets: 4,
        ..HostConfig::default()
    };
    let (node, graph, log) = try_create(
        &sources,
        vec![Atom::symbol("main.js"), Atom::Float(0.5), Atom::symbol("gain")],
        config,
    );
    assert!(node.is_ok());
    assert_eq!(log.texts(LogLevel::Post), vec!["3 0.5 gain 2 4", "object 0"]);
    assert_eq!(graph.events(), vec![GraphEvent::LoadComplete("main.js".into())]);
}

#[test]
fn port_counts_are_clamped() {
    let harness = Harness::script("inlets = 0;\noutlets = -3;\npost(inlets, outlets);");
    assert_eq!(harness.posts(), vec!["1 0"]);
    assert_eq!(
        harness.node.ports(),
        Ports {
            inlets: 1,
            outlets: 0
        }
    );
}

#[test]
fn compile_reloads_from_scratch() {
    let sources = MemoryResolver::new().with(
        "main.js",
        "var loads = 0;\nfunction loadbang() { post('lb'); }\nfunction foo() { post('v1'); }",
    );
    let mut harness = Harness::new(sources, "main.js");
    assert_eq!(harness.posts(), vec!["lb"]);

    harness.sources.insert(
        "main.js",
        "function loadbang() { post('lb2'); }\nfunction bang() { post('v2'); }",
    );
    assert_eq!(harness.send(0, "compile"), DispatchOutcome::Command);
    assert_eq!(harness.posts(), vec!["lb", "lb2"]);
    assert!(harness.node.registry().get("foo").is_none());
    assert!(harness.node.global("loads").is_none());
    assert_eq!(harness.send(0, "foo"), DispatchOutcome::Dropped);
    assert_eq!(harness.send(0, "bang"), handled("bang"));
}

#[test]
fn compile_failure_empties_the_registry_until_fixed() {
    let sources = MemoryResolver::new().with("main.js", "function bang() { post('ok'); }");
    let mut harness = Harness::new(sources, "main.js");

    harness.sources.insert("main.js", "function bang( {");
    harness.send(0, "compile");
    assert_eq!(harness.node.state(), ModuleState::FailedCompile);
    assert!(harness.node.registry().is_empty());
    assert_eq!(harness.send(0, "bang"), DispatchOutcome::Dropped);
    assert!(harness.errors()[0].starts_with("Error compiling 'main.js':\n"));

    harness.sources.insert("main.js", "function bang() { post('fixed'); }");
    harness.send(0, "compile");
    assert_eq!(harness.node.state(), ModuleState::Ready);
    assert_eq!(harness.send(0, "bang"), handled("bang"));
    assert_eq!(harness.posts(), vec!["no handler for 'bang'", "fixed"]);
}

#[test]
fn run_failure_keeps_partial_bindings_without_loadbang() {
    let mut harness = Harness::new(fixtures(), "test.js");
    harness.reset();
    assert_eq!(harness.send(0, "compile throws.js"), DispatchOutcome::Command);
    assert_eq!(harness.node.state(), ModuleState::FailedRun);
    assert_eq!(harness.node.script(), "throws.js");
    assert!(harness.node.global("before").is_some());
    assert!(harness.graph.events().is_empty());
    assert_eq!(harness.send(0, "bang"), handled("bang"));
    assert_eq!(harness.posts(), vec!["still dispatchable"]);
}

#[test]
fn compile_of_a_missing_script_keeps_the_current_one() {
    let mut harness = Harness::new(fixtures(), "test.js");
    harness.reset();
    harness.send(0, "compile nope.js");
    assert_eq!(harness.errors(), vec!["Script file 'nope.js' not found."]);
    assert_eq!(harness.node.script(), "test.js");
    assert_eq!(harness.node.state(), ModuleState::Ready);
    assert_eq!(harness.send(0, "bang"), handled("bang"));
}

#[test]
fn properties_can_be_set_read_and_deleted() {
    let mut harness = Harness::script(
        "outlets = 1;\nfunction anything() { post('anything ' + messagename); }\nfunction bang() { post(gain); }",
    );
    harness.send(0, "setprop gain 0.5");
    harness.send(0, "bang");
    harness.send(0, "getprop gain");
    harness.send(0, "setprop pair 1 x");
    harness.send(0, "getprop pair");
    harness.send(0, "getprop missing");
    assert_eq!(harness.posts(), vec!["0.5"]);
    assert_eq!(
        harness.graph.delivered(),
        vec![
            to_outlet(0, OutletMessage::Float(0.5)),
            to_outlet(
                0,
                OutletMessage::List(vec![Atom::Float(1.0), Atom::symbol("x")])
            ),
        ]
    );

    harness.send(0, "setprop bang 1");
    assert_eq!(harness.send(0, "bang"), handled("anything"));
    harness.send(0, "delprop bang");
    assert!(harness.node.global("bang").is_none());
    assert_eq!(harness.send(0, "bang"), handled("anything"));

    harness.send(0, "setprop 3 4");
    assert_eq!(harness.errors(), vec!["Error setting property '3'."]);
}

#[test]
fn getprop_without_outlets_sends_nothing() {
    let mut harness = Harness::script("var level = 3;");
    harness.send(0, "getprop level");
    assert!(harness.graph.delivered().is_empty());
}

#[test]
fn recursion_is_bounded_by_config() {
    let sources =
        MemoryResolver::new().with("main.js", "function bang() { bang(); }\nfunction foo() { post('ok'); }");
    let config = HostConfig {
        call_depth: 8,
        ..HostConfig::default()
    };
    let mut harness = Harness::with_config(sources, "main.js", config);
    assert_eq!(
        harness.send(0, "bang"),
        DispatchOutcome::Failed {
            handler: "bang".into()
        }
    );
    assert!(harness.errors()[0].contains("Maximum call stack size exceeded"));
    assert_eq!(harness.send(0, "foo"), handled("foo"));
}

#[test]
fn self_containing_arrays_are_posted_and_refused_at_outlets() {
    let mut harness = Harness::script(
        "outlets = 1;\nfunction bang() { let a = [1]; a.push(a); post(a); outlet(0, a); post('after'); a.length = 0; }",
    );
    assert_eq!(harness.send(0, "bang"), handled("bang"));
    assert_eq!(harness.posts(), vec!["1,", "after"]);
    assert_eq!(
        harness.errors(),
        vec!["Cannot send an array that contains itself through outlet"]
    );
    assert!(harness.graph.delivered().is_empty());
}

#[test]
fn assigning_a_builtin_name_does_not_survive_compile() {
    let sources = MemoryResolver::new().with(
        "main.js",
        "outlets = 1;\npost = function(m) { outlet(0, 'hijacked'); };\nfunction bang() { post('x'); }",
    );
    let mut harness = Harness::new(sources, "main.js");
    assert_eq!(harness.send(0, "bang"), handled("bang"));
    assert_eq!(
        harness.graph.delivered(),
        vec![to_outlet(0, OutletMessage::Symbol("hijacked".into()))]
    );
    assert!(harness.posts().is_empty());

    harness.reset();
    harness
        .sources
        .insert("main.js", "function bang() { post('fresh'); }");
    assert_eq!(harness.send(0, "compile"), DispatchOutcome::Command);
    assert_eq!(harness.send(0, "bang"), handled("bang"));
    assert_eq!(harness.posts(), vec!["fresh"]);
    assert!(harness.graph.delivered().is_empty());
}

#[test]
fn oversized_array_index_fails_only_the_handler() {
    let mut harness = Harness::script(
        "function bang() { let a = []; a[4000000000] = 1; }\nfunction foo() { post('alive'); }",
    );
    assert_eq!(
        harness.send(0, "bang"),
        DispatchOutcome::Failed {
            handler: "bang".into()
        }
    );
    let errors = harness.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Error calling 'bang':\n"), "{}", errors[0]);
    assert!(errors[0].contains("Invalid array length"), "{}", errors[0]);
    assert_eq!(harness.send(0, "foo"), handled("foo"));
    assert_eq!(harness.posts(), vec!["alive"]);
}

#[test]
fn deeply_nested_source_is_a_compile_error() {
    let depth = 20_000;
    let text = format!("let x = {}1{};", "(".repeat(depth), ")".repeat(depth));
    let sources = MemoryResolver::new().with("main.js", &text);
    let (node, graph, log) = try_create(&sources, vec![Atom::symbol("main.js")], HostConfig::default());
    assert!(matches!(node, Err(HostError::Compile { .. })));
    let errors = log.texts(LogLevel::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Error compiling 'main.js':\n"), "{}", errors[0]);
    assert!(errors[0].contains("Nesting too deep"), "{}", errors[0]);
    assert!(graph.events().is_empty());
}
