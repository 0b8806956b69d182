use crate::runtime::{
    error::{RuntimeError, RuntimeResult},
    value::{ObjectRef, Value},
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Clone, Debug)]
struct Binding {
    value: Value,
    mutable: bool,
}

#[derive(Debug)]
enum Scope {
    /// Block or function frame with `let`/`const` style bindings.
    Frame(RefCell<HashMap<String, Binding>>),
    /// Object-backed scope: the node's global object, the builtins, or the
    /// target object of `include(path, obj)`.
    Object(ObjectRef),
}

/// Lexical scope chain. Cloning is cheap and shares the underlying scopes,
/// which is how closures capture their defining environment.
#[derive(Clone, Debug)]
pub struct Environment {
    scopes: Vec<Rc<Scope>>,
    /// Scope that receives undeclared assignments.
    root: usize,
    /// Scope that receives `var` declarations.
    var_scope: usize,
}

impl Environment {
    /// Chain for a module running in the node's global object: builtins at
    /// the bottom, globals on top.
    pub fn new(builtins: ObjectRef, globals: ObjectRef) -> Self {
        Self {
            scopes: vec![
                Rc::new(Scope::Object(builtins)),
                Rc::new(Scope::Object(globals)),
            ],
            root: 1,
            var_scope: 1,
        }
    }

    /// Same chain with `root` stacked on top as the module root scope.
    pub fn with_root(&self, root: ObjectRef) -> Self {
        let mut env = self.clone();
        env.scopes.push(Rc::new(Scope::Object(root)));
        env.root = env.scopes.len() - 1;
        env.var_scope = env.root;
        env
    }

    pub fn push_frame(&mut self) {
        self.scopes
            .push(Rc::new(Scope::Frame(RefCell::new(HashMap::new()))));
    }

    /// Pushes a frame that also becomes the target of `var` declarations.
    pub fn push_function_frame(&mut self) {
        self.push_frame();
        self.var_scope = self.scopes.len() - 1;
    }

    pub fn pop_frame(&mut self) {
        if self.scopes.len() > self.root + 1 {
            self.scopes.pop();
        }
        self.var_scope = self.var_scope.min(self.scopes.len() - 1);
    }

    pub fn root_object(&self) -> Option<ObjectRef> {
        match self.scopes.get(self.root).map(|scope| scope.as_ref()) {
            Some(Scope::Object(object)) => Some(object.clone()),
            _ => None,
        }
    }

    pub fn declare(&mut self, name: &str, value: Value, mutable: bool) {
        let index = self.scopes.len() - 1;
        self.declare_in(index, name, value, mutable);
    }

    pub fn declare_var(&mut self, name: &str, value: Option<Value>) {
        let index = self.var_scope;
        let value = match value {
            Some(value) => value,
            None => match self.get_in(index, name) {
                Some(existing) => existing,
                None => Value::Undefined,
            },
        };
        self.declare_in(index, name, value, true);
    }

    fn declare_in(&mut self, index: usize, name: &str, value: Value, mutable: bool) {
        match self.scopes[index].as_ref() {
            Scope::Frame(bindings) => {
                bindings
                    .borrow_mut()
                    .insert(name.to_string(), Binding { value, mutable });
            }
            Scope::Object(object) => object.borrow_mut().set(name, value),
        }
    }

    fn get_in(&self, index: usize, name: &str) -> Option<Value> {
        match self.scopes[index].as_ref() {
            Scope::Frame(bindings) => bindings.borrow().get(name).map(|b| b.value.clone()),
            Scope::Object(object) => object.borrow().get(name),
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        (0..self.scopes.len())
            .rev()
            .find_map(|index| self.get_in(index, name))
    }

    /// Assigns to the nearest existing binding. `Ok(false)` means no scope
    /// declares `name`. The builtins scope is never written, so assigning a
    /// builtin name falls through to the root and shadows it there.
    pub fn assign(&mut self, name: &str, value: Value) -> RuntimeResult<bool> {
        for scope in self.scopes.iter().skip(1).rev() {
            match scope.as_ref() {
                Scope::Frame(bindings) => {
                    let mut bindings = bindings.borrow_mut();
                    if let Some(binding) = bindings.get_mut(name) {
                        if !binding.mutable {
                            return Err(RuntimeError::ImmutableBinding {
                                name: name.to_string(),
                            });
                        }
                        binding.value = value;
                        return Ok(true);
                    }
                }
                Scope::Object(object) => {
                    let mut object = object.borrow_mut();
                    if object.contains(name) {
                        object.set(name, value);
                        return Ok(true);
                    }
                }
            }
        }
        Ok(false)
    }

    pub fn assign_root(&mut self, name: &str, value: Value) {
        let root = self.root;
        self.declare_in(root, name, value, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> (Environment, ObjectRef) {
        let globals = Value::new_object();
        (Environment::new(Value::new_object(), globals.clone()), globals)
    }

    #[test]
    fn frames_shadow_globals() {
        let (mut env, globals) = env();
        env.declare("x", Value::Number(1.0), true);
        env.push_frame();
        env.declare("x", Value::Number(2.0), true);
        assert!(env.get("x").is_some_and(|v| v.strict_equals(&Value::Number(2.0))));
        env.pop_frame();
        assert!(env.get("x").is_some_and(|v| v.strict_equals(&Value::Number(1.0))));
        assert!(globals.borrow().contains("x"));
    }

    #[test]
    fn const_bindings_reject_assignment() {
        let (mut env, _) = env();
        env.push_frame();
        env.declare("k", Value::Number(1.0), false);
        let err = env.assign("k", Value::Number(2.0)).expect_err("immutable");
        assert!(matches!(err, RuntimeError::ImmutableBinding { .. }));
    }

    #[test]
    fn unknown_assignment_reports_missing() {
        let (mut env, globals) = env();
        assert!(!env.assign("nope", Value::Null).expect("assign"));
        env.push_frame();
        env.assign_root("nope", Value::Null);
        assert!(globals.borrow().contains("nope"));
    }

    #[test]
    fn rooted_scope_reads_through_to_globals() {
        let (env, globals) = env();
        globals.borrow_mut().set("shared", Value::from("g"));
        let target = Value::new_object();
        let mut rooted = env.with_root(target.clone());
        rooted.declare_var("local", Some(Value::Number(3.0)));
        assert!(rooted.get("shared").is_some());
        assert!(target.borrow().contains("local"));
        assert!(!globals.borrow().contains("local"));
    }

    #[test]
    fn builtins_are_shadowed_not_overwritten() {
        let builtins = Value::new_object();
        builtins.borrow_mut().set("post", Value::from("builtin"));
        let globals = Value::new_object();
        let mut env = Environment::new(builtins.clone(), globals.clone());
        assert!(!env.assign("post", Value::from("mine")).expect("assign"));
        env.assign_root("post", Value::from("mine"));

        assert!(env
            .get("post")
            .is_some_and(|v| v.strict_equals(&Value::from("mine"))));
        assert!(builtins
            .borrow()
            .get("post")
            .is_some_and(|v| v.strict_equals(&Value::from("builtin"))));
        assert!(globals.borrow().contains("post"));
    }

    #[test]
    fn closures_share_frames() {
        let (mut env, _) = env();
        env.push_frame();
        env.declare("count", Value::Number(0.0), true);
        let captured = env.clone();
        env.assign("count", Value::Number(5.0)).expect("assign");
        assert!(captured
            .get("count")
            .is_some_and(|v| v.strict_equals(&Value::Number(5.0))));
    }
}
