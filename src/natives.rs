//! Native functions for the tree-walking interpreter
//!
//! Registered into the global environment before any user code runs. Natives
//! are permissive about arguments the same way the language is about
//! operands: missing or mistyped arguments fall back to neutral defaults
//! instead of raising.

use std::cell::Cell;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::environment::EnvRef;
use crate::error::RuntimeError;
use crate::value::Value;

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or(Value::Null)
}

fn num_arg(args: &[Value], i: usize) -> f64 {
    args.get(i).and_then(|v| v.as_number()).unwrap_or(0.0)
}

fn str_arg(args: &[Value], i: usize) -> String {
    args.get(i)
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

fn define_native(
    env: &EnvRef,
    name: &'static str,
    handler: impl Fn(&[Value]) -> Result<Value, RuntimeError> + 'static,
) {
    env.borrow_mut()
        .define(name, Value::native(name, Rc::new(handler)));
}

/// Register every built-in native into `env`
pub fn register(env: &EnvRef) {
    // Time
    define_native(env, "native_time_ms", |_| {
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as f64)
            .unwrap_or(0.0);
        Ok(Value::Number(ms))
    });

    define_native(env, "native_sleep", |args| {
        let ms = num_arg(args, 0).max(0.0) as u64;
        std::thread::sleep(std::time::Duration::from_millis(ms));
        Ok(Value::Null)
    });

    // Logging
    define_native(env, "native_log", |args| {
        let level = args
            .first()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "INFO".to_string());
        let message = str_arg(args, 1);
        println!("[{}] {}", level, message);
        Ok(Value::Null)
    });

    // Type introspection
    define_native(env, "native_type", |args| {
        Ok(Value::from(arg(args, 0).type_name()))
    });

    define_native(env, "native_to_string", |args| {
        Ok(Value::String(arg(args, 0).to_string()))
    });

    // Collections
    define_native(env, "native_keys", |args| match arg(args, 0) {
        Value::Map(entries) => {
            let keys = entries
                .borrow()
                .keys()
                .map(|k| Value::from(k.as_str()))
                .collect();
            Ok(Value::list(keys))
        }
        _ => Ok(Value::list(vec![])),
    });

    define_native(env, "native_sort", |args| match arg(args, 0) {
        Value::List(items) => {
            let mut sorted = items.borrow().clone();
            sorted.sort_by(compare_values);
            Ok(Value::list(sorted))
        }
        _ => Ok(Value::list(vec![])),
    });

    define_native(env, "native_compare", |args| {
        let a = str_arg(args, 0);
        let b = str_arg(args, 1);
        let ord = match a.cmp(&b) {
            std::cmp::Ordering::Less => -1.0,
            std::cmp::Ordering::Equal => 0.0,
            std::cmp::Ordering::Greater => 1.0,
        };
        Ok(Value::Number(ord))
    });

    define_native(env, "native_hash", |args| {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        arg(args, 0).to_string().hash(&mut hasher);
        Ok(Value::Number((hasher.finish() as u32) as f64))
    });

    // JSON
    define_native(env, "native_to_json", |args| {
        Ok(Value::String(to_json(&arg(args, 0))))
    });

    define_native(env, "native_parse_json", |args| {
        let json = args
            .first()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "{}".to_string());
        Ok(parse_json(&json))
    });

    // String helpers; also exposed as string pseudo-methods
    define_native(env, "string_starts_with", |args| {
        Ok(Value::Bool(str_arg(args, 0).starts_with(&str_arg(args, 1))))
    });

    define_native(env, "string_ends_with", |args| {
        Ok(Value::Bool(str_arg(args, 0).ends_with(&str_arg(args, 1))))
    });

    define_native(env, "string_substring", |args| {
        let s = str_arg(args, 0);
        let chars: Vec<char> = s.chars().collect();
        let start = (num_arg(args, 1).max(0.0) as usize).min(chars.len());
        Ok(Value::String(chars[start..].iter().collect()))
    });

    define_native(env, "string_split", |args| {
        let s = str_arg(args, 0);
        let delimiter = str_arg(args, 1);
        let parts: Vec<Value> = if delimiter.is_empty() {
            s.chars().map(|c| Value::String(c.to_string())).collect()
        } else {
            s.split(&delimiter).map(Value::from).collect()
        };
        Ok(Value::list(parts))
    });

    define_native(env, "string_length", |args| {
        Ok(Value::Number(str_arg(args, 0).chars().count() as f64))
    });

    define_native(env, "list_length", |args| match arg(args, 0) {
        Value::List(items) => Ok(Value::Number(items.borrow().len() as f64)),
        _ => Ok(Value::Number(0.0)),
    });

    define_native(env, "len", |args| {
        let n = match arg(args, 0) {
            Value::String(s) => s.chars().count(),
            Value::List(items) => items.borrow().len(),
            Value::Map(entries) => entries.borrow().len(),
            _ => 0,
        };
        Ok(Value::Number(n as f64))
    });

    // Math
    define_native(env, "math_pow", |args| {
        Ok(Value::Number(num_arg(args, 0).powf(num_arg(args, 1))))
    });

    define_native(env, "math_sqrt", |args| {
        Ok(Value::Number(num_arg(args, 0).sqrt()))
    });

    define_native(env, "math_abs", |args| {
        Ok(Value::Number(num_arg(args, 0).abs()))
    });

    define_native(env, "math_floor", |args| {
        Ok(Value::Number(num_arg(args, 0).floor()))
    });

    define_native(env, "math_ceil", |args| {
        Ok(Value::Number(num_arg(args, 0).ceil()))
    });

    define_native(env, "math_random", |_| Ok(Value::Number(next_random())));

    // Assertion, as a callable in addition to the `assert` statement
    define_native(env, "assert", |args| {
        if arg(args, 0).is_truthy() {
            Ok(Value::Null)
        } else {
            Err(RuntimeError::AssertionFailedNative)
        }
    });

    // Print
    define_native(env, "println", |args| {
        match args.first() {
            Some(v) => println!("{}", v),
            None => println!(),
        }
        Ok(Value::Null)
    });

    define_native(env, "print", |args| {
        if let Some(v) = args.first() {
            print!("{}", v);
        }
        use std::io::Write;
        let _ = std::io::stdout().flush();
        Ok(Value::Null)
    });
}

/// Ordering used by `native_sort`: numbers before strings before the rest
fn compare_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Number(_), _) => Ordering::Less,
        (_, Value::Number(_)) => Ordering::Greater,
        (Value::String(_), _) => Ordering::Less,
        (_, Value::String(_)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// Serialize a value as JSON; reference cycles are not detected
fn to_json(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(_) => value.to_string(),
        Value::String(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
        Value::List(items) => {
            let parts: Vec<String> = items.borrow().iter().map(to_json).collect();
            format!("[{}]", parts.join(","))
        }
        Value::Map(entries) => {
            let parts: Vec<String> = entries
                .borrow()
                .iter()
                .map(|(k, v)| format!("\"{}\":{}", k, to_json(v)))
                .collect();
            format!("{{{}}}", parts.join(","))
        }
        _ => "null".to_string(),
    }
}

/// Scalar-level JSON parser: nested lists and maps come back empty
fn parse_json(json: &str) -> Value {
    let trimmed = json.trim();
    match trimmed {
        "null" => Value::Null,
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ if trimmed.starts_with('"') => {
            Value::String(trimmed.trim_matches('"').to_string())
        }
        _ if trimmed.starts_with('[') => Value::list(vec![]),
        _ if trimmed.starts_with('{') => Value::map(HashMap::new()),
        _ => match trimmed.parse::<f64>() {
            Ok(n) => Value::Number(n),
            Err(_) => Value::Null,
        },
    }
}

pub(crate) fn next_random() -> f64 {
    thread_local! {
        static STATE: Cell<u64> = Cell::new(0);
    }
    STATE.with(|state| {
        let mut x = state.get();
        if x == 0 {
            x = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0x9e3779b97f4a7c15)
                | 1;
        }
        // xorshift64
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        state.set(x);
        (x >> 11) as f64 / (1u64 << 53) as f64
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;

    fn call(env: &EnvRef, name: &str, args: &[Value]) -> Value {
        match env.borrow().get(name) {
            Some(Value::Native(native)) => (native.handler)(args).unwrap(),
            other => panic!("expected native {}, got {:?}", name, other),
        }
    }

    fn registry() -> EnvRef {
        let env = Environment::new();
        register(&env);
        env
    }

    #[test]
    fn test_native_type() {
        let env = registry();
        assert_eq!(
            call(&env, "native_type", &[Value::Number(1.0)]),
            Value::from("number")
        );
        assert_eq!(call(&env, "native_type", &[]), Value::from("null"));
    }

    #[test]
    fn test_string_helpers() {
        let env = registry();
        assert_eq!(
            call(
                &env,
                "string_starts_with",
                &[Value::from("hello"), Value::from("he")]
            ),
            Value::Bool(true)
        );
        assert_eq!(
            call(
                &env,
                "string_substring",
                &[Value::from("hello"), Value::Number(2.0)]
            ),
            Value::from("llo")
        );
        assert_eq!(
            call(
                &env,
                "string_split",
                &[Value::from("a,b,c"), Value::from(",")]
            ),
            Value::list(vec![Value::from("a"), Value::from("b"), Value::from("c")])
        );
    }

    #[test]
    fn test_len() {
        let env = registry();
        assert_eq!(
            call(&env, "len", &[Value::from("abc")]),
            Value::Number(3.0)
        );
        assert_eq!(
            call(&env, "len", &[Value::list(vec![Value::Null])]),
            Value::Number(1.0)
        );
        assert_eq!(call(&env, "len", &[Value::Null]), Value::Number(0.0));
    }

    #[test]
    fn test_math() {
        let env = registry();
        assert_eq!(
            call(&env, "math_pow", &[Value::Number(2.0), Value::Number(10.0)]),
            Value::Number(1024.0)
        );
        assert_eq!(
            call(&env, "math_floor", &[Value::Number(2.7)]),
            Value::Number(2.0)
        );
        let r = call(&env, "math_random", &[]);
        match r {
            Value::Number(n) => assert!((0.0..1.0).contains(&n)),
            other => panic!("expected number, got {:?}", other),
        }
    }

    #[test]
    fn test_sort_mixed() {
        let env = registry();
        let input = Value::list(vec![
            Value::from("b"),
            Value::Number(3.0),
            Value::from("a"),
            Value::Number(1.0),
        ]);
        assert_eq!(
            call(&env, "native_sort", &[input]),
            Value::list(vec![
                Value::Number(1.0),
                Value::Number(3.0),
                Value::from("a"),
                Value::from("b"),
            ])
        );
    }

    #[test]
    fn test_to_json() {
        let env = registry();
        let list = Value::list(vec![Value::Number(1.0), Value::from("x"), Value::Null]);
        assert_eq!(
            call(&env, "native_to_json", &[list]),
            Value::from(r#"[1,"x",null]"#)
        );
    }

    #[test]
    fn test_parse_json_scalars() {
        let env = registry();
        assert_eq!(
            call(&env, "native_parse_json", &[Value::from("42")]),
            Value::Number(42.0)
        );
        assert_eq!(
            call(&env, "native_parse_json", &[Value::from("true")]),
            Value::Bool(true)
        );
        assert_eq!(
            call(&env, "native_parse_json", &[Value::from("\"hi\"")]),
            Value::from("hi")
        );
    }

    #[test]
    fn test_assert_native() {
        let env = registry();
        match env.borrow().get("assert") {
            Some(Value::Native(native)) => {
                assert!((native.handler)(&[Value::Bool(true)]).is_ok());
                assert_eq!(
                    (native.handler)(&[Value::Bool(false)]).unwrap_err(),
                    RuntimeError::AssertionFailedNative
                );
            }
            other => panic!("expected native assert, got {:?}", other),
        }
    }
}
