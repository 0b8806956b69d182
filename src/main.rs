use pdscript::host::{
    atom::Atom,
    config::HostConfig,
    diagnostics::ConsoleLog,
    loader::{FsResolver, SourceResolver},
    message::Message,
    node::ScriptNode,
    outbound::{Graph, OutboundEnvelope},
};
use pdscript::language::parser::parse_program;
use pdscript::tools::diagnostics::emit_syntax_errors;
use std::env;
use std::io::{self, BufRead};
use std::path::Path;

const USAGE: &str = "Usage: pdscript [run|check] <script.js> [args...]";

/// Prints outlet traffic, one envelope per line.
struct StdoutGraph;

impl Graph for StdoutGraph {
    fn deliver(&mut self, envelope: OutboundEnvelope) {
        println!("{envelope}");
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        eprintln!("{USAGE}");
        std::process::exit(1);
    }

    let command = &args[1];
    let filename = &args[2];

    if !filename.ends_with(".js") {
        eprintln!("Invalid file extension. Only .js files are allowed.");
        std::process::exit(1);
    }

    let code = match command.as_str() {
        "run" => run(filename, &args[3..]),
        "check" => check(filename),
        _ => {
            eprintln!("Invalid command. {USAGE}");
            1
        }
    };
    std::process::exit(code);
}

fn run(filename: &str, extra: &[String]) -> i32 {
    let path = Path::new(filename);
    let config = match HostConfig::discover(path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return 1;
        }
    };

    let script = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());
    let mut creation = vec![Atom::symbol(script)];
    if extra.is_empty() {
        creation.extend(config.arguments.iter().cloned());
    } else {
        creation.extend(extra.iter().map(|word| Atom::from_word(word)));
    }

    let resolver = FsResolver::from_config(&config);
    let mut node = match ScriptNode::create(
        creation,
        config,
        Box::new(resolver),
        Box::new(StdoutGraph),
        Box::new(ConsoleLog),
    ) {
        Ok(node) => node,
        // Already written to the log.
        Err(_) => return 1,
    };

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                eprintln!("Failed to read stdin: {err}");
                return 1;
            }
        };
        let (inlet, text) = split_inlet(&line);
        if text.trim().is_empty() {
            continue;
        }
        match Message::parse(text) {
            Ok(message) => {
                node.receive(inlet, message);
            }
            Err(err) => eprintln!("{err}"),
        }
    }
    0
}

fn check(filename: &str) -> i32 {
    let path = Path::new(filename);
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());

    let source = match FsResolver::new(dir, Vec::new()).resolve(&name) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("{err}");
            return 1;
        }
    };
    match parse_program(&source.text) {
        Ok(_) => {
            println!("{filename}: ok");
            0
        }
        Err(errors) => {
            emit_syntax_errors(&source, &errors);
            1
        }
    }
}

/// Splits an optional `@N` inlet prefix off an input line.
fn split_inlet(line: &str) -> (usize, &str) {
    let trimmed = line.trim_start();
    if let Some(rest) = trimmed.strip_prefix('@') {
        let (index, tail) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        if let Ok(index) = index.parse() {
            return (index, tail);
        }
    }
    (0, trimmed)
}
