use crate::host::{
    error::HostError,
    loader::{self, LoadTarget},
};
use crate::language::{ast::*, parser::MAX_NESTING, source::SourceFile, span::Span};
use crate::runtime::{
    builtins,
    environment::Environment,
    error::{ErrorSite, RuntimeError, RuntimeResult, Uncaught},
    value::{
        format_number, FunctionKind, FunctionRef, FunctionValue, HostFunction, NativeFunction,
        ObjectRef, ScriptFunction, Value,
    },
};
use std::cmp::Ordering;
use std::rc::Rc;

pub const DEFAULT_CALL_DEPTH: usize = 256;

/// Longest array a script may grow by assigning an index or `length`.
pub const MAX_ARRAY_LENGTH: usize = 1 << 20;

/// What the interpreter needs from the node embedding it.
pub trait ScriptHost {
    /// Ambient values such as `inlet` or `jsarguments`, consulted after the
    /// scope chain.
    fn ambient(&self, name: &str) -> Option<Value>;
    /// Offers an assignment to an undeclared name to the host. Returns
    /// `true` when the host took it.
    fn assign_ambient(&mut self, name: &str, value: &Value) -> bool;
    fn call_native(&mut self, function: HostFunction, args: &[Value]) -> RuntimeResult<Value>;
    fn load_source(&mut self, name: &str) -> Result<Rc<SourceFile>, HostError>;
    fn report(&mut self, error: HostError);
    /// Called when code added bindings to the node's global object.
    fn globals_changed(&mut self) {}
    fn max_call_depth(&self) -> usize {
        DEFAULT_CALL_DEPTH
    }
}

enum FlowSignal {
    Break,
    Continue,
    Return(Value),
}

enum Place {
    Binding(String),
    Property { object: Value, key: String },
}

pub struct Interpreter<'h> {
    host: &'h mut dyn ScriptHost,
    builtins: ObjectRef,
    globals: ObjectRef,
    env: Environment,
    origin: Rc<SourceFile>,
    depth: usize,
    nesting: usize,
    fault: Option<ErrorSite>,
}

impl<'h> Interpreter<'h> {
    pub fn new(host: &'h mut dyn ScriptHost, builtins: ObjectRef, globals: ObjectRef) -> Self {
        let env = Environment::new(builtins.clone(), globals.clone());
        Self {
            host,
            builtins,
            globals,
            env,
            origin: Rc::new(SourceFile::new("<host>", "")),
            depth: 0,
            nesting: 0,
            fault: None,
        }
    }

    pub fn host(&mut self) -> &mut (dyn ScriptHost + 'h) {
        &mut *self.host
    }

    pub fn globals(&self) -> &ObjectRef {
        &self.globals
    }

    /// Runs a parsed module. With `root` the module's declarations land in
    /// that object; otherwise they become globals.
    pub fn run_module(
        &mut self,
        source: Rc<SourceFile>,
        program: &Program,
        root: Option<ObjectRef>,
    ) -> Result<(), Uncaught> {
        let base = Environment::new(self.builtins.clone(), self.globals.clone());
        let env = match root {
            Some(root) => base.with_root(root),
            None => base,
        };
        let saved_env = std::mem::replace(&mut self.env, env);
        let saved_origin = std::mem::replace(&mut self.origin, source);
        let saved_nesting = std::mem::replace(&mut self.nesting, 0);
        let result = self.exec_statements(&program.statements);
        self.nesting = saved_nesting;
        self.env = saved_env;
        self.origin = saved_origin;
        match result {
            Ok(Some(FlowSignal::Break | FlowSignal::Continue)) => {
                Err(self.uncaught(RuntimeError::Unsupported {
                    message: "break or continue outside of a loop".into(),
                }))
            }
            Ok(_) => Ok(()),
            Err(error) => Err(self.uncaught(error)),
        }
    }

    /// Calls a script function from the host side.
    pub fn invoke(&mut self, function: &FunctionRef, args: Vec<Value>) -> Result<Value, Uncaught> {
        self.call_function(function, Value::Undefined, args)
            .map_err(|error| self.uncaught(error))
    }

    fn uncaught(&mut self, error: RuntimeError) -> Uncaught {
        Uncaught {
            error,
            site: self.fault.take(),
        }
    }

    fn note_fault(&mut self, error: RuntimeError, span: Span) -> RuntimeError {
        if self.fault.is_none() {
            self.fault = Some(ErrorSite {
                source: self.origin.clone(),
                span,
            });
        }
        error
    }

    fn exec_statements(&mut self, statements: &[Statement]) -> RuntimeResult<Option<FlowSignal>> {
        self.hoist(statements);
        for statement in statements {
            if let Some(flow) = self.exec_statement(statement)? {
                return Ok(Some(flow));
            }
        }
        Ok(None)
    }

    fn hoist(&mut self, statements: &[Statement]) {
        for statement in statements {
            if let Statement::Function(def) = statement {
                let name = def.name.clone().unwrap_or_default();
                let function = self.make_closure(def, Some(name.as_str()));
                self.env.declare(&name, function, true);
            }
        }
    }

    fn make_closure(&self, def: &Rc<FunctionDef>, name_hint: Option<&str>) -> Value {
        let name = def
            .name
            .clone()
            .or_else(|| name_hint.map(str::to_string))
            .unwrap_or_default();
        Value::Function(FunctionValue::script(
            name,
            def.clone(),
            self.env.clone(),
            self.origin.clone(),
        ))
    }

    fn exec_block(&mut self, statements: &[Statement]) -> RuntimeResult<Option<FlowSignal>> {
        self.env.push_frame();
        let result = self.exec_statements(statements);
        self.env.pop_frame();
        result
    }

    fn exec_statement(&mut self, statement: &Statement) -> RuntimeResult<Option<FlowSignal>> {
        match statement {
            Statement::Expr(expr) => {
                self.eval_expression(expr)?;
                Ok(None)
            }
            Statement::Decl(decl) => {
                self.exec_declaration(decl)?;
                Ok(None)
            }
            Statement::Function(_) | Statement::Empty => Ok(None),
            Statement::Return(stmt) => {
                let value = match &stmt.value {
                    Some(expr) => self.eval_expression(expr)?,
                    None => Value::Undefined,
                };
                Ok(Some(FlowSignal::Return(value)))
            }
            Statement::If(stmt) => {
                if self.eval_expression(&stmt.condition)?.truthy() {
                    self.exec_statement(&stmt.then_branch)
                } else if let Some(else_branch) = &stmt.else_branch {
                    self.exec_statement(else_branch)
                } else {
                    Ok(None)
                }
            }
            Statement::While(stmt) => {
                while self.eval_expression(&stmt.condition)?.truthy() {
                    match self.exec_statement(&stmt.body)? {
                        None | Some(FlowSignal::Continue) => {}
                        Some(FlowSignal::Break) => break,
                        Some(flow @ FlowSignal::Return(_)) => return Ok(Some(flow)),
                    }
                }
                Ok(None)
            }
            Statement::For(stmt) => {
                self.env.push_frame();
                let result = self.exec_for(stmt);
                self.env.pop_frame();
                result
            }
            Statement::ForOf(stmt) => self.exec_for_of(stmt),
            Statement::Break(_) => Ok(Some(FlowSignal::Break)),
            Statement::Continue(_) => Ok(Some(FlowSignal::Continue)),
            Statement::Throw(stmt) => {
                let value = self.eval_expression(&stmt.value)?;
                Err(self.note_fault(RuntimeError::Thrown { value }, stmt.span))
            }
            Statement::Try(stmt) => self.exec_try(stmt),
            Statement::Block(statements) => self.exec_block(statements),
        }
    }

    fn exec_declaration(&mut self, decl: &DeclStmt) -> RuntimeResult<()> {
        for declarator in &decl.declarators {
            let value = match &declarator.value {
                Some(Expr::Function(def)) => {
                    Some(self.make_closure(def, Some(declarator.name.as_str())))
                }
                Some(expr) => Some(self.eval_expression(expr)?),
                None => None,
            };
            match decl.kind {
                DeclKind::Var => self.env.declare_var(&declarator.name, value),
                DeclKind::Let => self
                    .env
                    .declare(&declarator.name, value.unwrap_or_default(), true),
                DeclKind::Const => self
                    .env
                    .declare(&declarator.name, value.unwrap_or_default(), false),
            }
        }
        Ok(())
    }

    fn exec_for(&mut self, stmt: &ForStmt) -> RuntimeResult<Option<FlowSignal>> {
        if let Some(init) = &stmt.init {
            self.exec_statement(init)?;
        }
        loop {
            if let Some(condition) = &stmt.condition {
                if !self.eval_expression(condition)?.truthy() {
                    break;
                }
            }
            match self.exec_statement(&stmt.body)? {
                None | Some(FlowSignal::Continue) => {}
                Some(FlowSignal::Break) => break,
                Some(flow @ FlowSignal::Return(_)) => return Ok(Some(flow)),
            }
            if let Some(update) = &stmt.update {
                self.eval_expression(update)?;
            }
        }
        Ok(None)
    }

    fn exec_for_of(&mut self, stmt: &ForOfStmt) -> RuntimeResult<Option<FlowSignal>> {
        let iterable = self.eval_expression(&stmt.iterable)?;
        let items: Vec<Value> = match &iterable {
            Value::Array(items) => items.borrow().clone(),
            Value::String(text) => text.chars().map(|ch| Value::from(ch.to_string())).collect(),
            other => {
                return Err(self.note_fault(
                    RuntimeError::type_mismatch(format!(
                        "{} is not iterable",
                        other.to_display_string()
                    )),
                    stmt.iterable.span(),
                ))
            }
        };
        for item in items {
            self.env.push_frame();
            self.env
                .declare(&stmt.binding, item, stmt.kind != DeclKind::Const);
            let result = self.exec_statement(&stmt.body);
            self.env.pop_frame();
            match result? {
                None | Some(FlowSignal::Continue) => {}
                Some(FlowSignal::Break) => break,
                Some(flow @ FlowSignal::Return(_)) => return Ok(Some(flow)),
            }
        }
        Ok(None)
    }

    fn exec_try(&mut self, stmt: &TryStmt) -> RuntimeResult<Option<FlowSignal>> {
        let mut result = self.exec_block(&stmt.body);
        if let Some(catch_body) = &stmt.catch_body {
            if let Err(error) = result {
                self.fault = None;
                self.env.push_frame();
                if let Some(binding) = &stmt.catch_binding {
                    self.env.declare(binding, error.into_caught_value(), true);
                }
                result = self.exec_statements(catch_body);
                self.env.pop_frame();
            }
        }
        if let Some(finally_body) = &stmt.finally_body {
            if let Some(flow) = self.exec_block(finally_body)? {
                self.fault = None;
                return Ok(Some(flow));
            }
        }
        result
    }

    fn eval_expression(&mut self, expr: &Expr) -> RuntimeResult<Value> {
        if self.nesting >= MAX_NESTING {
            let error = RuntimeError::Panic {
                message: "Expression nested too deeply".into(),
            };
            return Err(self.note_fault(error, expr.span()));
        }
        self.nesting += 1;
        let result = self.eval_expression_inner(expr);
        self.nesting -= 1;
        result.map_err(|error| self.note_fault(error, expr.span()))
    }

    fn eval_expression_inner(&mut self, expr: &Expr) -> RuntimeResult<Value> {
        match expr {
            Expr::Literal(literal, _) => Ok(match literal {
                Literal::Number(n) => Value::Number(*n),
                Literal::String(s) => Value::from(s.as_str()),
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Null => Value::Null,
                Literal::Undefined => Value::Undefined,
            }),
            Expr::Template(segments, _) => {
                let mut text = String::new();
                for segment in segments {
                    match segment {
                        TemplateSegment::Text(part) => text.push_str(part),
                        TemplateSegment::Expr(expr) => {
                            text.push_str(&self.eval_expression(expr)?.to_display_string())
                        }
                    }
                }
                Ok(Value::from(text))
            }
            Expr::Identifier(name, _) => self.lookup(name),
            Expr::Array(items, _) => Ok(Value::from(self.eval_arguments(items)?)),
            Expr::Object(entries, _) => {
                let object = Value::new_object();
                for (key, value) in entries {
                    let value = match value {
                        Expr::Function(def) => self.make_closure(def, Some(key.as_str())),
                        other => self.eval_expression(other)?,
                    };
                    object.borrow_mut().set(key.clone(), value);
                }
                Ok(Value::Object(object))
            }
            Expr::Function(def) => Ok(self.make_closure(def, None)),
            Expr::Unary { op, expr, .. } => {
                if *op == UnaryOp::TypeOf {
                    if let Expr::Identifier(name, _) = expr.as_ref() {
                        let value = self.lookup(name).unwrap_or_default();
                        return Ok(Value::from(value.type_of()));
                    }
                }
                let value = self.eval_expression(expr)?;
                Ok(match op {
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                    UnaryOp::TypeOf => Value::from(value.type_of()),
                })
            }
            Expr::Binary {
                op, left, right, ..
            } => {
                let left = self.eval_expression(left)?;
                let right = self.eval_expression(right)?;
                Ok(eval_binary(*op, left, right))
            }
            Expr::Logical {
                op, left, right, ..
            } => {
                let left = self.eval_expression(left)?;
                let short_circuit = match op {
                    LogicalOp::And => !left.truthy(),
                    LogicalOp::Or => left.truthy(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval_expression(right)
                }
            }
            Expr::Conditional {
                condition,
                then_expr,
                else_expr,
                ..
            } => {
                if self.eval_expression(condition)?.truthy() {
                    self.eval_expression(then_expr)
                } else {
                    self.eval_expression(else_expr)
                }
            }
            Expr::Assign {
                target, op, value, ..
            } => {
                let place = self.resolve_place(target)?;
                let value = match op {
                    None => match (value.as_ref(), &place) {
                        (Expr::Function(def), Place::Binding(name)) => {
                            self.make_closure(def, Some(name.as_str()))
                        }
                        (other, _) => self.eval_expression(other)?,
                    },
                    Some(op) => {
                        let current = self.read_place(&place)?;
                        let rhs = self.eval_expression(value)?;
                        eval_binary(*op, current, rhs)
                    }
                };
                self.write_place(place, value.clone())?;
                Ok(value)
            }
            Expr::Update {
                op, prefix, target, ..
            } => {
                let place = self.resolve_place(target)?;
                let old = self.read_place(&place)?.to_number();
                let new = match op {
                    UpdateOp::Increment => old + 1.0,
                    UpdateOp::Decrement => old - 1.0,
                };
                self.write_place(place, Value::Number(new))?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            Expr::Member {
                object, property, ..
            } => {
                let object = self.eval_expression(object)?;
                get_property(&object, property)
            }
            Expr::Index { object, index, .. } => {
                let object = self.eval_expression(object)?;
                let key = property_key(&self.eval_expression(index)?);
                get_property(&object, &key)
            }
            Expr::Call { callee, args, .. } => {
                let (function, this) = match callee.as_ref() {
                    Expr::Member {
                        object, property, ..
                    } => {
                        let object = self.eval_expression(object)?;
                        (get_property(&object, property)?, object)
                    }
                    Expr::Index { object, index, .. } => {
                        let object = self.eval_expression(object)?;
                        let key = property_key(&self.eval_expression(index)?);
                        (get_property(&object, &key)?, object)
                    }
                    other => (self.eval_expression(other)?, Value::Undefined),
                };
                let args = self.eval_arguments(args)?;
                match function {
                    Value::Function(function) => self.call_function(&function, this, args),
                    _ => Err(RuntimeError::NotCallable {
                        name: callee.callee_name(),
                    }),
                }
            }
        }
    }

    fn eval_arguments(&mut self, args: &[Expr]) -> RuntimeResult<Vec<Value>> {
        args.iter().map(|expr| self.eval_expression(expr)).collect()
    }

    fn lookup(&self, name: &str) -> RuntimeResult<Value> {
        self.env
            .get(name)
            .or_else(|| self.host.ambient(name))
            .ok_or_else(|| RuntimeError::UnknownSymbol {
                name: name.to_string(),
            })
    }

    fn assign_binding(&mut self, name: &str, value: Value) -> RuntimeResult<()> {
        if self.env.assign(name, value.clone())? {
            return Ok(());
        }
        if self.host.assign_ambient(name, &value) {
            return Ok(());
        }
        self.env.assign_root(name, value);
        if self
            .env
            .root_object()
            .is_some_and(|root| Rc::ptr_eq(&root, &self.globals))
        {
            self.host.globals_changed();
        }
        Ok(())
    }

    fn resolve_place(&mut self, target: &Expr) -> RuntimeResult<Place> {
        match target {
            Expr::Identifier(name, _) => Ok(Place::Binding(name.clone())),
            Expr::Member {
                object, property, ..
            } => Ok(Place::Property {
                object: self.eval_expression(object)?,
                key: property.clone(),
            }),
            Expr::Index { object, index, .. } => {
                let object = self.eval_expression(object)?;
                let key = property_key(&self.eval_expression(index)?);
                Ok(Place::Property { object, key })
            }
            _ => Err(RuntimeError::type_mismatch("Invalid assignment target")),
        }
    }

    fn read_place(&self, place: &Place) -> RuntimeResult<Value> {
        match place {
            Place::Binding(name) => self.lookup(name),
            Place::Property { object, key } => get_property(object, key),
        }
    }

    fn write_place(&mut self, place: Place, value: Value) -> RuntimeResult<()> {
        match place {
            Place::Binding(name) => self.assign_binding(&name, value),
            Place::Property { object, key } => set_property(&object, &key, value),
        }
    }

    pub(crate) fn call_function(
        &mut self,
        function: &FunctionRef,
        this: Value,
        args: Vec<Value>,
    ) -> RuntimeResult<Value> {
        match &function.kind {
            FunctionKind::Script(script) => self.call_script(script, args),
            FunctionKind::Native(NativeFunction::Builtin(builtin)) => {
                builtins::call(self, *builtin, this, args)
            }
            FunctionKind::Native(NativeFunction::Host(HostFunction::Include)) => self.include(args),
            FunctionKind::Native(NativeFunction::Host(HostFunction::Require)) => self.require(args),
            FunctionKind::Native(NativeFunction::Host(host_fn)) => {
                self.host.call_native(*host_fn, &args)
            }
        }
    }

    fn call_script(&mut self, script: &ScriptFunction, args: Vec<Value>) -> RuntimeResult<Value> {
        if self.depth >= self.host.max_call_depth() {
            return Err(RuntimeError::Panic {
                message: "Maximum call stack size exceeded".into(),
            });
        }

        let mut env = script.env.clone();
        env.push_function_frame();
        if !script.def.is_arrow {
            env.declare("arguments", Value::from(args.clone()), true);
        }
        for (index, param) in script.def.params.iter().enumerate() {
            env.declare(param, args.get(index).cloned().unwrap_or_default(), true);
        }

        let saved_env = std::mem::replace(&mut self.env, env);
        let saved_origin = std::mem::replace(&mut self.origin, script.origin.clone());
        self.depth += 1;
        let saved_nesting = std::mem::replace(&mut self.nesting, 0);
        let result = match &script.def.body {
            FunctionBody::Block(statements) => {
                self.exec_statements(statements)
                    .and_then(|flow| match flow {
                        Some(FlowSignal::Return(value)) => Ok(value),
                        None => Ok(Value::Undefined),
                        Some(FlowSignal::Break | FlowSignal::Continue) => {
                            Err(RuntimeError::Unsupported {
                                message: "break or continue outside of a loop".into(),
                            })
                        }
                    })
            }
            FunctionBody::Expr(expr) => self.eval_expression(expr),
        };
        self.depth -= 1;
        self.nesting = saved_nesting;
        self.env = saved_env;
        self.origin = saved_origin;
        result
    }

    fn include(&mut self, args: Vec<Value>) -> RuntimeResult<Value> {
        let Some(Value::String(name)) = args.first() else {
            return Ok(Value::Undefined);
        };
        let target = match args.get(1) {
            Some(Value::Object(object)) => LoadTarget::Scope(object.clone()),
            _ => LoadTarget::Globals,
        };
        loader::load(self, name, target);
        Ok(Value::Undefined)
    }

    fn require(&mut self, args: Vec<Value>) -> RuntimeResult<Value> {
        let Some(Value::String(name)) = args.first() else {
            return Ok(Value::Undefined);
        };
        let module = Value::new_object();
        module
            .borrow_mut()
            .set("exports", Value::Object(Value::new_object()));
        let loaded = loader::load(self, name, LoadTarget::Scope(module.clone()));
        if !loaded.is_ready() {
            return Ok(Value::Undefined);
        }
        let exports = module.borrow().get("exports").unwrap_or_default();
        Ok(exports)
    }
}

fn eval_binary(op: BinaryOp, left: Value, right: Value) -> Value {
    match op {
        BinaryOp::Add => {
            let (left, right) = (left.to_primitive(), right.to_primitive());
            if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
                Value::from(format!(
                    "{}{}",
                    left.to_display_string(),
                    right.to_display_string()
                ))
            } else {
                Value::Number(left.to_number() + right.to_number())
            }
        }
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Eq => Value::Bool(left.loose_equals(&right)),
        BinaryOp::NotEq => Value::Bool(!left.loose_equals(&right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_equals(&right)),
        BinaryOp::StrictNotEq => Value::Bool(!left.strict_equals(&right)),
        BinaryOp::Lt => Value::Bool(compare(&left, &right) == Some(Ordering::Less)),
        BinaryOp::LtEq => Value::Bool(matches!(
            compare(&left, &right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Gt => Value::Bool(compare(&left, &right) == Some(Ordering::Greater)),
        BinaryOp::GtEq => Value::Bool(matches!(
            compare(&left, &right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left.to_primitive(), right.to_primitive()) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(&b)),
        (a, b) => a.to_number().partial_cmp(&b.to_number()),
    }
}

fn property_key(key: &Value) -> String {
    match key {
        Value::Number(n) => format_number(*n),
        other => other.to_display_string(),
    }
}

fn array_index(key: &str) -> Option<usize> {
    key.parse::<usize>()
        .ok()
        .filter(|index| index.to_string() == key)
}

pub(crate) fn get_property(object: &Value, key: &str) -> RuntimeResult<Value> {
    match object {
        Value::Undefined | Value::Null => Err(RuntimeError::type_mismatch(format!(
            "Cannot read properties of {} (reading '{}')",
            object.to_display_string(),
            key
        ))),
        Value::Array(items) => {
            if key == "length" {
                return Ok(Value::Number(items.borrow().len() as f64));
            }
            if let Some(index) = array_index(key) {
                return Ok(items.borrow().get(index).cloned().unwrap_or_default());
            }
            Ok(builtins::array_method(key)
                .map(|builtin| builtins::method_value(key, builtin))
                .unwrap_or_default())
        }
        Value::String(text) => {
            if key == "length" {
                return Ok(Value::Number(text.chars().count() as f64));
            }
            if let Some(index) = array_index(key) {
                return Ok(text
                    .chars()
                    .nth(index)
                    .map(|ch| Value::from(ch.to_string()))
                    .unwrap_or_default());
            }
            Ok(builtins::string_method(key)
                .map(|builtin| builtins::method_value(key, builtin))
                .unwrap_or_default())
        }
        Value::Number(_) => Ok(builtins::number_method(key)
            .map(|builtin| builtins::method_value(key, builtin))
            .unwrap_or_default()),
        Value::Bool(_) => Ok(Value::Undefined),
        Value::Object(object) => Ok(object.borrow().get(key).unwrap_or_default()),
        Value::Function(function) => Ok(match function.property(key) {
            Some(value) => value,
            None => match key {
                "length" => Value::Number(function.arity() as f64),
                "name" => Value::from(function.name.as_str()),
                _ => Value::Undefined,
            },
        }),
    }
}

fn invalid_array_length() -> RuntimeError {
    RuntimeError::Panic {
        message: "Invalid array length".into(),
    }
}

pub(crate) fn set_property(object: &Value, key: &str, value: Value) -> RuntimeResult<()> {
    match object {
        Value::Undefined | Value::Null => Err(RuntimeError::type_mismatch(format!(
            "Cannot set properties of {} (setting '{}')",
            object.to_display_string(),
            key
        ))),
        Value::Array(items) => {
            let mut items = items.borrow_mut();
            if key == "length" {
                let len = value.to_number();
                if len < 0.0
                    || len.fract() != 0.0
                    || !len.is_finite()
                    || len > MAX_ARRAY_LENGTH as f64
                {
                    return Err(invalid_array_length());
                }
                items.resize(len as usize, Value::Undefined);
            } else if let Some(index) = array_index(key) {
                if index >= items.len() {
                    if index >= MAX_ARRAY_LENGTH {
                        return Err(invalid_array_length());
                    }
                    items.resize(index + 1, Value::Undefined);
                }
                items[index] = value;
            }
            Ok(())
        }
        Value::Object(object) => {
            object.borrow_mut().set(key, value);
            Ok(())
        }
        Value::Function(function) => {
            function
                .properties
                .borrow_mut()
                .insert(key.to_string(), value);
            Ok(())
        }
        Value::Bool(_) | Value::Number(_) | Value::String(_) => Ok(()),
    }
}
