use crate::host::{
    config::HostConfig,
    error::{HostError, HostResult},
};
use crate::language::{ast::Program, parser::parse_program, source::SourceFile};
use crate::runtime::{
    interpreter::Interpreter,
    value::{ObjectRef, Value},
};
use crate::tools::diagnostics::{render_syntax_errors, render_uncaught};
use std::{
    cell::RefCell,
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    rc::Rc,
};

/// Turns a script name into source text.
pub trait SourceResolver {
    fn resolve(&self, name: &str) -> HostResult<SourceFile>;
}

/// Looks in the node's base directory, then in each search path.
#[derive(Debug, Clone)]
pub struct FsResolver {
    base_dir: PathBuf,
    search_paths: Vec<PathBuf>,
}

impl FsResolver {
    pub fn new(base_dir: impl Into<PathBuf>, search_paths: Vec<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            search_paths,
        }
    }

    pub fn from_config(config: &HostConfig) -> Self {
        Self::new(config.base_dir.clone(), config.search_paths.clone())
    }

    fn candidates(&self, name: &str) -> Vec<PathBuf> {
        let path = Path::new(name);
        if path.is_absolute() {
            return vec![path.to_path_buf()];
        }
        std::iter::once(&self.base_dir)
            .chain(self.search_paths.iter())
            .map(|dir| dir.join(path))
            .collect()
    }
}

impl SourceResolver for FsResolver {
    fn resolve(&self, name: &str) -> HostResult<SourceFile> {
        let found = self
            .candidates(name)
            .into_iter()
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| HostError::NotFound {
                name: name.to_string(),
            })?;
        let text = fs::read_to_string(&found).map_err(|_| HostError::Read {
            path: found.display().to_string(),
        })?;
        Ok(SourceFile::new(name, text))
    }
}

/// Serves scripts from memory. Clones share the same table, so sources can
/// be edited after a node took its resolver.
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    sources: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(name, text);
        self
    }

    pub fn insert(&self, name: impl Into<String>, text: impl Into<String>) {
        self.sources.borrow_mut().insert(name.into(), text.into());
    }

    pub fn remove(&self, name: &str) {
        self.sources.borrow_mut().remove(name);
    }
}

impl SourceResolver for MemoryResolver {
    fn resolve(&self, name: &str) -> HostResult<SourceFile> {
        self.sources
            .borrow()
            .get(name)
            .map(|text| SourceFile::new(name, text.clone()))
            .ok_or_else(|| HostError::NotFound {
                name: name.to_string(),
            })
    }
}

/// Where a module's top-level declarations land.
#[derive(Debug, Clone)]
pub enum LoadTarget {
    /// The node's global object.
    Globals,
    /// A caller-supplied object used as the module's root scope.
    Scope(ObjectRef),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Unloaded,
    Compiling,
    Ready,
    FailedCompile,
    FailedRun,
}

#[derive(Debug, Clone)]
pub struct Module {
    pub path: String,
    pub state: ModuleState,
    /// Root object of a module loaded into its own scope.
    pub export: Option<Value>,
}

impl Module {
    fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            state: ModuleState::Unloaded,
            export: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state == ModuleState::Ready
    }
}

/// A load that did not reach `Ready`, with the error that stopped it.
#[derive(Debug)]
pub struct LoadFailure {
    pub module: Module,
    pub error: HostError,
}

pub fn compile(source: &SourceFile) -> HostResult<Program> {
    parse_program(&source.text).map_err(|errors| HostError::Compile {
        path: source.name.clone(),
        details: render_syntax_errors(source, &errors),
    })
}

pub fn execute(
    interp: &mut Interpreter<'_>,
    source: Rc<SourceFile>,
    program: &Program,
    target: &LoadTarget,
) -> HostResult<()> {
    let path = source.name.clone();
    let root = match target {
        LoadTarget::Globals => None,
        LoadTarget::Scope(object) => Some(object.clone()),
    };
    interp
        .run_module(source, program, root)
        .map_err(|uncaught| HostError::ModuleRun {
            path,
            details: render_uncaught(&uncaught),
        })
}

/// Resolves, compiles and runs `name`. Nothing is cached: every call reads
/// and executes the source again.
pub fn try_load(
    interp: &mut Interpreter<'_>,
    name: &str,
    target: LoadTarget,
) -> Result<Module, LoadFailure> {
    let mut module = Module::new(name);
    let source = match interp.host().load_source(name) {
        Ok(source) => source,
        Err(error) => return Err(LoadFailure { module, error }),
    };

    module.state = ModuleState::Compiling;
    let program = match compile(&source) {
        Ok(program) => program,
        Err(error) => {
            module.state = ModuleState::FailedCompile;
            return Err(LoadFailure { module, error });
        }
    };

    let result = execute(interp, source, &program, &target);
    match &target {
        LoadTarget::Globals => interp.host().globals_changed(),
        LoadTarget::Scope(object) => module.export = Some(Value::Object(object.clone())),
    }
    match result {
        Ok(()) => {
            module.state = ModuleState::Ready;
            Ok(module)
        }
        Err(error) => {
            module.state = ModuleState::FailedRun;
            Err(LoadFailure { module, error })
        }
    }
}

/// Like [`try_load`], but failures go to the host's diagnostics instead of
/// the caller. Used by `include` and `require`.
pub fn load(interp: &mut Interpreter<'_>, name: &str, target: LoadTarget) -> Module {
    match try_load(interp, name, target) {
        Ok(module) => module,
        Err(failure) => {
            interp.host().report(failure.error);
            failure.module
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn fs_resolver_prefers_base_dir_then_search_paths() {
        let base = tempdir().expect("tempdir");
        let lib = tempdir().expect("tempdir");
        fs::write(base.path().join("a.js"), "let a = 1;").expect("write");
        fs::write(lib.path().join("a.js"), "let a = 2;").expect("write");
        fs::write(lib.path().join("b.js"), "let b = 3;").expect("write");

        let resolver = FsResolver::new(base.path(), vec![lib.path().to_path_buf()]);
        assert_eq!(resolver.resolve("a.js").expect("a").text, "let a = 1;");
        let b = resolver.resolve("b.js").expect("b");
        assert_eq!(b.name, "b.js");
        assert_eq!(b.text, "let b = 3;");

        let err = resolver.resolve("c.js").expect_err("missing");
        assert_eq!(err.to_string(), "Script file 'c.js' not found.");
    }

    #[test]
    fn memory_resolver_clones_share_sources() {
        let resolver = MemoryResolver::new().with("x.js", "1");
        let shared = resolver.clone();
        shared.insert("x.js", "2");
        assert_eq!(resolver.resolve("x.js").expect("x").text, "2");
        shared.remove("x.js");
        assert!(resolver.resolve("x.js").is_err());
    }

    #[test]
    fn compile_errors_name_the_file() {
        let source = SourceFile::new("broken.js", "function (");
        let err = compile(&source).expect_err("syntax error");
        let text = err.to_string();
        assert!(text.starts_with("Error compiling 'broken.js':\n"), "{text}");
    }
}
