use crate::language::{ast::FunctionDef, source::SourceFile};
use crate::runtime::environment::Environment;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::rc::Rc;

pub type ArrayRef = Rc<RefCell<Vec<Value>>>;
pub type ObjectRef = Rc<RefCell<ObjectValue>>;
pub type FunctionRef = Rc<FunctionValue>;

#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(ArrayRef),
    Object(ObjectRef),
    Function(FunctionRef),
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(Rc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(Rc::from(value))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }
}

impl From<ObjectRef> for Value {
    fn from(object: ObjectRef) -> Self {
        Value::Object(object)
    }
}

impl Value {
    pub fn new_object() -> ObjectRef {
        Rc::new(RefCell::new(ObjectValue::default()))
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) => true,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null | Value::Array(_) | Value::Object(_) => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) => "function",
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_function(&self) -> Option<&FunctionRef> {
        match self {
            Value::Function(function) => Some(function),
            _ => None,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => parse_number(s),
            Value::Array(_) => parse_number(&self.to_display_string()),
            Value::Object(_) | Value::Function(_) => f64::NAN,
        }
    }

    /// ToInt32 as used for array indices and port numbers.
    pub fn to_int32(&self) -> i32 {
        let n = self.to_number();
        if !n.is_finite() {
            return 0;
        }
        let wrapped = n.trunc().rem_euclid(4_294_967_296.0);
        if wrapped >= 2_147_483_648.0 {
            (wrapped - 4_294_967_296.0) as i32
        } else {
            wrapped as i32
        }
    }

    pub fn to_display_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".into(),
            Value::Null => "null".into(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.to_string(),
            Value::Array(items) => join_array(items, ","),
            Value::Object(_) => "[object Object]".into(),
            Value::Function(function) => format!("function {}() {{ [code] }}", function.name),
        }
    }

    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
            (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
                self.to_number() == other.to_number()
            }
            (Value::Bool(_), _) => Value::Number(self.to_number()).loose_equals(other),
            (_, Value::Bool(_)) => self.loose_equals(&Value::Number(other.to_number())),
            (Value::Array(_) | Value::Object(_) | Value::Function(_), Value::Number(_) | Value::String(_)) => {
                Value::from(self.to_display_string()).loose_equals(other)
            }
            (Value::Number(_) | Value::String(_), Value::Array(_) | Value::Object(_) | Value::Function(_)) => {
                self.loose_equals(&Value::from(other.to_display_string()))
            }
            _ => self.strict_equals(other),
        }
    }

    /// Primitives pass through; arrays, objects and functions become their
    /// display string.
    pub fn to_primitive(&self) -> Value {
        match self {
            Value::Array(_) | Value::Object(_) | Value::Function(_) => {
                Value::from(self.to_display_string())
            }
            other => other.clone(),
        }
    }
}

/// Joins an array's items with `separator`. Nested arrays join with commas,
/// and an array already being joined further up prints as an empty string.
pub fn join_array(items: &ArrayRef, separator: &str) -> String {
    join_visiting(items, separator, &mut HashSet::new())
}

fn join_visiting(
    items: &ArrayRef,
    separator: &str,
    visiting: &mut HashSet<*const RefCell<Vec<Value>>>,
) -> String {
    let ptr = Rc::as_ptr(items);
    if !visiting.insert(ptr) {
        return String::new();
    }
    let text = items
        .borrow()
        .iter()
        .map(|item| match item {
            Value::Undefined | Value::Null => String::new(),
            Value::Array(inner) => join_visiting(inner, ",", visiting),
            other => other.to_display_string(),
        })
        .collect::<Vec<_>>()
        .join(separator);
    visiting.remove(&ptr);
    text
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

/// Formats a number the way script code prints it: integral values have no
/// fraction, `-0` prints as `0`, and very large or small magnitudes switch to
/// exponent notation.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".into();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.into();
    }
    if n == 0.0 {
        return "0".into();
    }
    let magnitude = n.abs();
    if !(1e-6..1e21).contains(&magnitude) {
        let formatted = format!("{n:e}");
        return match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{mantissa}e+{exponent}")
            }
            _ => formatted,
        };
    }
    if n.fract() == 0.0 {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

fn parse_number(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if trimmed
        .chars()
        .any(|ch| ch.is_alphabetic() && ch != 'e' && ch != 'E')
    {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

#[derive(Clone, Debug, Default)]
pub struct ObjectValue {
    pub properties: BTreeMap<String, Value>,
}

impl ObjectValue {
    pub fn get(&self, key: &str) -> Option<Value> {
        self.properties.get(key).cloned()
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.properties.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.properties.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }
}

pub struct FunctionValue {
    pub name: String,
    pub kind: FunctionKind,
    /// Properties assigned onto the function (`bang.private = 1`).
    pub properties: RefCell<BTreeMap<String, Value>>,
}

impl fmt::Debug for FunctionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FunctionKind::Script(_) => write!(f, "Function({})", self.name),
            FunctionKind::Native(native) => write!(f, "Native({}, {:?})", self.name, native),
        }
    }
}

pub enum FunctionKind {
    Script(ScriptFunction),
    Native(NativeFunction),
}

pub struct ScriptFunction {
    pub def: Rc<FunctionDef>,
    pub env: Environment,
    pub origin: Rc<SourceFile>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NativeFunction {
    Builtin(Builtin),
    Host(HostFunction),
}

impl FunctionValue {
    pub fn script(
        name: String,
        def: Rc<FunctionDef>,
        env: Environment,
        origin: Rc<SourceFile>,
    ) -> FunctionRef {
        Rc::new(Self {
            name,
            kind: FunctionKind::Script(ScriptFunction { def, env, origin }),
            properties: RefCell::new(BTreeMap::new()),
        })
    }

    pub fn native(name: impl Into<String>, native: NativeFunction) -> FunctionRef {
        Rc::new(Self {
            name: name.into(),
            kind: FunctionKind::Native(native),
            properties: RefCell::new(BTreeMap::new()),
        })
    }

    /// Declared parameter count.
    pub fn arity(&self) -> usize {
        match &self.kind {
            FunctionKind::Script(script) => script.def.params.len(),
            FunctionKind::Native(_) => 0,
        }
    }

    /// True when the body reads `arguments`, so extra arguments matter.
    pub fn is_variadic(&self) -> bool {
        match &self.kind {
            FunctionKind::Script(script) => script.def.uses_arguments(),
            FunctionKind::Native(_) => true,
        }
    }

    pub fn property(&self, key: &str) -> Option<Value> {
        self.properties.borrow().get(key).cloned()
    }
}

/// Functions the embedding host provides to every script.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostFunction {
    Post,
    Cpost,
    Error,
    Outlet,
    Messnamed,
    Include,
    Require,
}

impl HostFunction {
    pub const ALL: [HostFunction; 7] = [
        HostFunction::Post,
        HostFunction::Cpost,
        HostFunction::Error,
        HostFunction::Outlet,
        HostFunction::Messnamed,
        HostFunction::Include,
        HostFunction::Require,
    ];

    pub fn name(self) -> &'static str {
        match self {
            HostFunction::Post => "post",
            HostFunction::Cpost => "cpost",
            HostFunction::Error => "error",
            HostFunction::Outlet => "outlet",
            HostFunction::Messnamed => "messnamed",
            HostFunction::Include => "include",
            HostFunction::Require => "require",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Builtin {
    ArrayFrom,
    ArrayIsArray,
    ObjectKeys,
    MathFloor,
    MathCeil,
    MathRound,
    MathAbs,
    MathMin,
    MathMax,
    MathSqrt,
    MathPow,
    String,
    Number,
    IsNaN,
    ArrayJoin,
    ArrayPush,
    ArrayPop,
    ArraySlice,
    ArrayIndexOf,
    ArrayIncludes,
    ArrayConcat,
    ArrayMap,
    ArrayFilter,
    ArrayForEach,
    StringToUpperCase,
    StringToLowerCase,
    StringSplit,
    StringIndexOf,
    StringSlice,
    StringTrim,
    NumberToFixed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_print_like_script_numbers() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(47.11), "47.11");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(1e-7), "1e-7");
        assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
    }

    #[test]
    fn arrays_join_with_commas() {
        let value = Value::from(vec![
            Value::from("x"),
            Value::Number(1.0),
            Value::Undefined,
            Value::Number(2.5),
        ]);
        assert_eq!(value.to_display_string(), "x,1,,2.5");
    }

    #[test]
    fn self_containing_arrays_print_the_repeat_as_empty() {
        let items: ArrayRef = Rc::new(RefCell::new(vec![Value::Number(1.0)]));
        items.borrow_mut().push(Value::Array(items.clone()));
        let value = Value::Array(items.clone());
        assert_eq!(value.to_display_string(), "1,");
        assert!(value.to_number().is_nan());

        let shared = Value::from(vec![Value::from("s")]);
        let twice = Value::from(vec![shared.clone(), shared]);
        assert_eq!(twice.to_display_string(), "s,s");
        items.borrow_mut().clear();
    }

    #[test]
    fn string_conversion_to_number() {
        assert_eq!(Value::from(" 12 ").to_number(), 12.0);
        assert_eq!(Value::from("").to_number(), 0.0);
        assert!(Value::from("abc").to_number().is_nan());
        assert_eq!(Value::from("1e3").to_number(), 1000.0);
    }

    #[test]
    fn loose_equality_coerces_like_scripts() {
        assert!(Value::from("1").loose_equals(&Value::Number(1.0)));
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(!Value::Null.loose_equals(&Value::Number(0.0)));
        assert!(Value::Bool(true).loose_equals(&Value::Number(1.0)));
        assert!(!Value::from("1").strict_equals(&Value::Number(1.0)));
    }

    #[test]
    fn int32_wraps_and_truncates() {
        assert_eq!(Value::Number(2.9).to_int32(), 2);
        assert_eq!(Value::Number(-1.5).to_int32(), -1);
        assert_eq!(Value::Undefined.to_int32(), 0);
        assert_eq!(Value::Number(4_294_967_297.0).to_int32(), 1);
    }
}
