use crate::runtime::{
    error::{RuntimeError, RuntimeResult},
    interpreter::Interpreter,
    value::{
        format_number, join_array, Builtin, FunctionValue, HostFunction, NativeFunction, ObjectRef,
        Value,
    },
};
use std::cmp::Ordering;

/// Populates the builtins object every node scope chain bottoms out in.
pub fn install(builtins: &ObjectRef) {
    let mut scope = builtins.borrow_mut();
    for host_fn in HostFunction::ALL {
        scope.set(
            host_fn.name(),
            Value::Function(FunctionValue::native(
                host_fn.name(),
                NativeFunction::Host(host_fn),
            )),
        );
    }

    scope.set(
        "Array",
        namespace(&[("from", Builtin::ArrayFrom), ("isArray", Builtin::ArrayIsArray)]),
    );
    scope.set("Object", namespace(&[("keys", Builtin::ObjectKeys)]));

    let math = namespace(&[
        ("floor", Builtin::MathFloor),
        ("ceil", Builtin::MathCeil),
        ("round", Builtin::MathRound),
        ("abs", Builtin::MathAbs),
        ("min", Builtin::MathMin),
        ("max", Builtin::MathMax),
        ("sqrt", Builtin::MathSqrt),
        ("pow", Builtin::MathPow),
    ]);
    if let Value::Object(object) = &math {
        object
            .borrow_mut()
            .set("PI", Value::Number(std::f64::consts::PI));
    }
    scope.set("Math", math);

    scope.set("String", method_value("String", Builtin::String));
    scope.set("Number", method_value("Number", Builtin::Number));
    scope.set("isNaN", method_value("isNaN", Builtin::IsNaN));
    scope.set("NaN", Value::Number(f64::NAN));
    scope.set("Infinity", Value::Number(f64::INFINITY));
}

fn namespace(entries: &[(&str, Builtin)]) -> Value {
    let object = Value::new_object();
    for (name, builtin) in entries {
        object.borrow_mut().set(*name, method_value(name, *builtin));
    }
    Value::Object(object)
}

pub fn method_value(name: &str, builtin: Builtin) -> Value {
    Value::Function(FunctionValue::native(name, NativeFunction::Builtin(builtin)))
}

pub fn array_method(name: &str) -> Option<Builtin> {
    Some(match name {
        "join" => Builtin::ArrayJoin,
        "push" => Builtin::ArrayPush,
        "pop" => Builtin::ArrayPop,
        "slice" => Builtin::ArraySlice,
        "indexOf" => Builtin::ArrayIndexOf,
        "includes" => Builtin::ArrayIncludes,
        "concat" => Builtin::ArrayConcat,
        "map" => Builtin::ArrayMap,
        "filter" => Builtin::ArrayFilter,
        "forEach" => Builtin::ArrayForEach,
        _ => return None,
    })
}

pub fn string_method(name: &str) -> Option<Builtin> {
    Some(match name {
        "toUpperCase" => Builtin::StringToUpperCase,
        "toLowerCase" => Builtin::StringToLowerCase,
        "split" => Builtin::StringSplit,
        "indexOf" => Builtin::StringIndexOf,
        "slice" => Builtin::StringSlice,
        "trim" => Builtin::StringTrim,
        _ => return None,
    })
}

pub fn number_method(name: &str) -> Option<Builtin> {
    match name {
        "toFixed" => Some(Builtin::NumberToFixed),
        _ => None,
    }
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

/// Resolves a possibly negative index argument against `len`.
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if value.is_undefined() {
        return default;
    }
    let n = value.to_number();
    let n = if n.is_nan() { 0.0 } else { n.trunc() };
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

fn same_value_zero(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) if x.is_nan() && y.is_nan() => true,
        _ => a.strict_equals(b),
    }
}

pub fn call(
    interp: &mut Interpreter<'_>,
    builtin: Builtin,
    this: Value,
    args: Vec<Value>,
) -> RuntimeResult<Value> {
    match builtin {
        Builtin::ArrayFrom => Ok(match arg(&args, 0) {
            Value::Array(items) => Value::from(items.borrow().clone()),
            Value::String(text) => Value::from(
                text.chars()
                    .map(|ch| Value::from(ch.to_string()))
                    .collect::<Vec<_>>(),
            ),
            _ => Value::from(Vec::new()),
        }),
        Builtin::ArrayIsArray => Ok(Value::Bool(matches!(arg(&args, 0), Value::Array(_)))),
        Builtin::ObjectKeys => {
            let keys: Vec<Value> = match arg(&args, 0) {
                Value::Object(object) => object
                    .borrow()
                    .properties
                    .keys()
                    .map(|key| Value::from(key.as_str()))
                    .collect(),
                Value::Array(items) => (0..items.borrow().len())
                    .map(|index| Value::from(index.to_string()))
                    .collect(),
                Value::Function(function) => function
                    .properties
                    .borrow()
                    .keys()
                    .map(|key| Value::from(key.as_str()))
                    .collect(),
                _ => Vec::new(),
            };
            Ok(Value::from(keys))
        }
        Builtin::MathFloor => Ok(Value::Number(arg(&args, 0).to_number().floor())),
        Builtin::MathCeil => Ok(Value::Number(arg(&args, 0).to_number().ceil())),
        Builtin::MathRound => Ok(Value::Number((arg(&args, 0).to_number() + 0.5).floor())),
        Builtin::MathAbs => Ok(Value::Number(arg(&args, 0).to_number().abs())),
        Builtin::MathSqrt => Ok(Value::Number(arg(&args, 0).to_number().sqrt())),
        Builtin::MathPow => Ok(Value::Number(
            arg(&args, 0).to_number().powf(arg(&args, 1).to_number()),
        )),
        Builtin::MathMin | Builtin::MathMax => {
            let wanted = if builtin == Builtin::MathMin {
                Ordering::Less
            } else {
                Ordering::Greater
            };
            let mut best = if builtin == Builtin::MathMin {
                f64::INFINITY
            } else {
                f64::NEG_INFINITY
            };
            for value in &args {
                let n = value.to_number();
                if n.is_nan() {
                    return Ok(Value::Number(f64::NAN));
                }
                if n.partial_cmp(&best) == Some(wanted) {
                    best = n;
                }
            }
            Ok(Value::Number(best))
        }
        Builtin::String => Ok(Value::from(
            args.first()
                .map(Value::to_display_string)
                .unwrap_or_default(),
        )),
        Builtin::Number => Ok(Value::Number(
            args.first().map(Value::to_number).unwrap_or(0.0),
        )),
        Builtin::IsNaN => Ok(Value::Bool(arg(&args, 0).to_number().is_nan())),
        Builtin::StringToUpperCase
        | Builtin::StringToLowerCase
        | Builtin::StringSplit
        | Builtin::StringIndexOf
        | Builtin::StringSlice
        | Builtin::StringTrim => call_string_method(builtin, &this, &args),
        Builtin::NumberToFixed => {
            let Value::Number(n) = this else {
                return Err(RuntimeError::type_mismatch("toFixed called on a non-number"));
            };
            let digits = arg(&args, 0).to_number();
            let digits = if digits.is_nan() { 0.0 } else { digits.trunc() };
            if !(0.0..=100.0).contains(&digits) {
                return Err(RuntimeError::Panic {
                    message: "toFixed() digits argument must be between 0 and 100".into(),
                });
            }
            if !n.is_finite() {
                return Ok(Value::from(format_number(n)));
            }
            Ok(Value::from(format!("{:.*}", digits as usize, n)))
        }
        _ => call_array_method(interp, builtin, this, args),
    }
}

fn call_array_method(
    interp: &mut Interpreter<'_>,
    builtin: Builtin,
    this: Value,
    args: Vec<Value>,
) -> RuntimeResult<Value> {
    let Value::Array(items) = &this else {
        return Err(RuntimeError::type_mismatch(format!(
            "Array method called on {}",
            this.type_of()
        )));
    };
    match builtin {
        Builtin::ArrayJoin => {
            let separator = match arg(&args, 0) {
                Value::Undefined => ",".to_string(),
                other => other.to_display_string(),
            };
            Ok(Value::from(join_array(items, &separator)))
        }
        Builtin::ArrayPush => {
            let mut items = items.borrow_mut();
            items.extend(args);
            Ok(Value::Number(items.len() as f64))
        }
        Builtin::ArrayPop => Ok(items.borrow_mut().pop().unwrap_or_default()),
        Builtin::ArraySlice => {
            let items = items.borrow();
            let len = items.len();
            let start = relative_index(&arg(&args, 0), len, 0);
            let end = relative_index(&arg(&args, 1), len, len);
            let slice = if start < end {
                items[start..end].to_vec()
            } else {
                Vec::new()
            };
            Ok(Value::from(slice))
        }
        Builtin::ArrayIndexOf => {
            let needle = arg(&args, 0);
            let position = items
                .borrow()
                .iter()
                .position(|item| item.strict_equals(&needle));
            Ok(Value::Number(position.map(|p| p as f64).unwrap_or(-1.0)))
        }
        Builtin::ArrayIncludes => {
            let needle = arg(&args, 0);
            Ok(Value::Bool(
                items
                    .borrow()
                    .iter()
                    .any(|item| same_value_zero(item, &needle)),
            ))
        }
        Builtin::ArrayConcat => {
            let mut joined = items.borrow().clone();
            for value in args {
                match value {
                    Value::Array(other) => joined.extend(other.borrow().iter().cloned()),
                    other => joined.push(other),
                }
            }
            Ok(Value::from(joined))
        }
        Builtin::ArrayMap | Builtin::ArrayFilter | Builtin::ArrayForEach => {
            let Value::Function(callback) = arg(&args, 0) else {
                return Err(RuntimeError::type_mismatch(format!(
                    "{} is not a function",
                    arg(&args, 0).to_display_string()
                )));
            };
            let snapshot = items.borrow().clone();
            let mut output = Vec::new();
            for (index, item) in snapshot.into_iter().enumerate() {
                let result = interp.call_function(
                    &callback,
                    Value::Undefined,
                    vec![item.clone(), Value::Number(index as f64), this.clone()],
                )?;
                match builtin {
                    Builtin::ArrayMap => output.push(result),
                    Builtin::ArrayFilter if result.truthy() => output.push(item),
                    _ => {}
                }
            }
            if builtin == Builtin::ArrayForEach {
                Ok(Value::Undefined)
            } else {
                Ok(Value::from(output))
            }
        }
        other => Err(RuntimeError::Unsupported {
            message: format!("{other:?} is not an array method"),
        }),
    }
}

fn call_string_method(builtin: Builtin, this: &Value, args: &[Value]) -> RuntimeResult<Value> {
    let Value::String(text) = this else {
        return Err(RuntimeError::type_mismatch(format!(
            "String method called on {}",
            this.type_of()
        )));
    };
    match builtin {
        Builtin::StringToUpperCase => Ok(Value::from(text.to_uppercase())),
        Builtin::StringToLowerCase => Ok(Value::from(text.to_lowercase())),
        Builtin::StringTrim => Ok(Value::from(text.trim())),
        Builtin::StringSplit => {
            let parts: Vec<Value> = match arg(args, 0) {
                Value::Undefined => vec![this.clone()],
                separator => {
                    let separator = separator.to_display_string();
                    if separator.is_empty() {
                        text.chars().map(|ch| Value::from(ch.to_string())).collect()
                    } else {
                        text.split(separator.as_str()).map(Value::from).collect()
                    }
                }
            };
            Ok(Value::from(parts))
        }
        Builtin::StringIndexOf => {
            let needle = arg(args, 0).to_display_string();
            let position = text
                .find(needle.as_str())
                .map(|byte| text[..byte].chars().count() as f64)
                .unwrap_or(-1.0);
            Ok(Value::Number(position))
        }
        Builtin::StringSlice => {
            let chars: Vec<char> = text.chars().collect();
            let len = chars.len();
            let start = relative_index(&arg(args, 0), len, 0);
            let end = relative_index(&arg(args, 1), len, len);
            let slice: String = if start < end {
                chars[start..end].iter().collect()
            } else {
                String::new()
            };
            Ok(Value::from(slice))
        }
        other => Err(RuntimeError::Unsupported {
            message: format!("{other:?} is not a string method"),
        }),
    }
}
