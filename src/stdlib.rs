//! Native function registry for the VM
//!
//! Grouped by module: io, math, string, list, time, runtime. Every native
//! takes its arguments as a slice and returns one value; void natives return
//! `Value::Null` so `CALL_NATIVE` can always push a result.
//!
//! Natives validate their own arguments and fail with [`VmError::Native`]
//! carrying a message a `.somnia` program could act on.

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::VmError;
use crate::natives::next_random;
use crate::value::Value;

pub type VmNative = fn(&[Value]) -> Result<Value, VmError>;

/// Build the full dispatch table
pub fn all() -> HashMap<String, VmNative> {
    let mut table: HashMap<String, VmNative> = HashMap::new();
    register_io(&mut table);
    register_math(&mut table);
    register_string(&mut table);
    register_list(&mut table);
    register_time(&mut table);
    register_runtime(&mut table);
    table
}

fn def(table: &mut HashMap<String, VmNative>, name: &str, f: VmNative) {
    table.insert(name.to_string(), f);
}

// ===== Argument helpers =====

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or(Value::Null)
}

fn num_arg(args: &[Value], i: usize, native: &str) -> Result<f64, VmError> {
    arg(args, i)
        .as_number()
        .ok_or_else(|| VmError::Native(format!("{} expects a number argument", native)))
}

fn str_arg(args: &[Value], i: usize, native: &str) -> Result<String, VmError> {
    match arg(args, i) {
        Value::String(s) => Ok(s),
        _ => Err(VmError::Native(format!(
            "{} expects a string argument",
            native
        ))),
    }
}

fn list_arg(args: &[Value], i: usize, native: &str) -> Result<Vec<Value>, VmError> {
    match arg(args, i) {
        Value::List(items) => Ok(items.borrow().clone()),
        _ => Err(VmError::Native(format!(
            "{} expects a list argument",
            native
        ))),
    }
}

fn joined(args: &[Value]) -> String {
    args.iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

// ===== io =====

fn register_io(table: &mut HashMap<String, VmNative>) {
    def(table, "print", |args| {
        print!("{}", joined(args));
        let _ = std::io::stdout().flush();
        Ok(Value::Null)
    });

    def(table, "println", |args| {
        println!("{}", joined(args));
        Ok(Value::Null)
    });

    def(table, "readLine", |_| {
        let mut line = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| VmError::Io(e.to_string()))?;
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Value::String(line))
    });

    def(table, "readFile", |args| {
        let path = str_arg(args, 0, "readFile")?;
        std::fs::read_to_string(&path)
            .map(Value::String)
            .map_err(|e| VmError::Native(format!("Failed to read file: {}", e)))
    });

    def(table, "writeFile", |args| {
        let path = str_arg(args, 0, "writeFile")?;
        let content = arg(args, 1).to_string();
        std::fs::write(&path, content)
            .map(|_| Value::Bool(true))
            .map_err(|e| VmError::Native(format!("Failed to write file: {}", e)))
    });

    def(table, "appendFile", |args| {
        let path = str_arg(args, 0, "appendFile")?;
        let content = arg(args, 1).to_string();
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut f| f.write_all(content.as_bytes()))
            .map(|_| Value::Bool(true))
            .map_err(|e| VmError::Native(format!("Failed to append file: {}", e)))
    });

    def(table, "fileExists", |args| match arg(args, 0) {
        Value::String(path) => Ok(Value::Bool(std::path::Path::new(&path).exists())),
        _ => Ok(Value::Bool(false)),
    });
}

// ===== math =====

fn register_math(table: &mut HashMap<String, VmNative>) {
    def(table, "PI", |_| Ok(Value::Number(std::f64::consts::PI)));
    def(table, "E", |_| Ok(Value::Number(std::f64::consts::E)));

    def(table, "abs", |args| {
        Ok(Value::Number(num_arg(args, 0, "abs")?.abs()))
    });
    def(table, "sqrt", |args| {
        Ok(Value::Number(num_arg(args, 0, "sqrt")?.sqrt()))
    });
    def(table, "pow", |args| {
        Ok(Value::Number(
            num_arg(args, 0, "pow")?.powf(num_arg(args, 1, "pow")?),
        ))
    });
    def(table, "floor", |args| {
        Ok(Value::Number(num_arg(args, 0, "floor")?.floor()))
    });
    def(table, "ceil", |args| {
        Ok(Value::Number(num_arg(args, 0, "ceil")?.ceil()))
    });
    def(table, "round", |args| {
        Ok(Value::Number(num_arg(args, 0, "round")?.round()))
    });
    def(table, "sin", |args| {
        Ok(Value::Number(num_arg(args, 0, "sin")?.sin()))
    });
    def(table, "cos", |args| {
        Ok(Value::Number(num_arg(args, 0, "cos")?.cos()))
    });
    def(table, "max", |args| {
        Ok(Value::Number(
            num_arg(args, 0, "max")?.max(num_arg(args, 1, "max")?),
        ))
    });
    def(table, "min", |args| {
        Ok(Value::Number(
            num_arg(args, 0, "min")?.min(num_arg(args, 1, "min")?),
        ))
    });
    def(table, "random", |_| Ok(Value::Number(next_random())));
    def(table, "randomInt", |args| {
        let lo = num_arg(args, 0, "randomInt")?;
        let hi = num_arg(args, 1, "randomInt")?;
        if hi <= lo {
            return Ok(Value::Number(lo.floor()));
        }
        let n = lo + next_random() * (hi - lo);
        Ok(Value::Number(n.floor()))
    });
}

// ===== string =====

fn register_string(table: &mut HashMap<String, VmNative>) {
    def(table, "strlen", |args| {
        Ok(Value::Number(
            str_arg(args, 0, "strlen")?.chars().count() as f64,
        ))
    });
    def(table, "upper", |args| {
        Ok(Value::String(str_arg(args, 0, "upper")?.to_uppercase()))
    });
    def(table, "lower", |args| {
        Ok(Value::String(str_arg(args, 0, "lower")?.to_lowercase()))
    });
    def(table, "trim", |args| {
        Ok(Value::String(str_arg(args, 0, "trim")?.trim().to_string()))
    });
    def(table, "split", |args| {
        let s = str_arg(args, 0, "split")?;
        let delimiter = str_arg(args, 1, "split")?;
        let parts: Vec<Value> = if delimiter.is_empty() {
            s.chars().map(|c| Value::String(c.to_string())).collect()
        } else {
            s.split(&delimiter).map(Value::from).collect()
        };
        Ok(Value::list(parts))
    });
    def(table, "join", |args| {
        let items = list_arg(args, 0, "join")?;
        let sep = str_arg(args, 1, "join")?;
        let joined = items
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(&sep);
        Ok(Value::String(joined))
    });
    def(table, "replace", |args| {
        let s = str_arg(args, 0, "replace")?;
        let from = str_arg(args, 1, "replace")?;
        let to = str_arg(args, 2, "replace")?;
        Ok(Value::String(s.replace(&from, &to)))
    });
    // Membership test; also the target of the `in` operator
    def(table, "contains", |args| {
        let haystack = arg(args, 0);
        let needle = arg(args, 1);
        let found = match &haystack {
            Value::String(s) => needle.as_str().map(|n| s.contains(n)).unwrap_or(false),
            Value::List(items) => items.borrow().iter().any(|item| item == &needle),
            Value::Map(entries) => {
                let key = needle
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| needle.to_string());
                entries.borrow().contains_key(&key)
            }
            _ => {
                return Err(VmError::Native(
                    "contains expects a string, list, or map".to_string(),
                ));
            }
        };
        Ok(Value::Bool(found))
    });
    def(table, "startsWith", |args| {
        let s = str_arg(args, 0, "startsWith")?;
        let prefix = str_arg(args, 1, "startsWith")?;
        Ok(Value::Bool(s.starts_with(&prefix)))
    });
    def(table, "endsWith", |args| {
        let s = str_arg(args, 0, "endsWith")?;
        let suffix = str_arg(args, 1, "endsWith")?;
        Ok(Value::Bool(s.ends_with(&suffix)))
    });
    def(table, "substring", |args| {
        let s = str_arg(args, 0, "substring")?;
        let chars: Vec<char> = s.chars().collect();
        let start = (num_arg(args, 1, "substring")?.max(0.0) as usize).min(chars.len());
        let end = match args.get(2) {
            Some(v) => (v.as_number().unwrap_or(chars.len() as f64).max(0.0) as usize)
                .clamp(start, chars.len()),
            None => chars.len(),
        };
        Ok(Value::String(chars[start..end].iter().collect()))
    });
    // format("{} and {}", a, b) fills placeholders left to right
    def(table, "format", |args| {
        let template = str_arg(args, 0, "format")?;
        let mut out = String::new();
        let mut rest = template.as_str();
        let mut next = 1;
        while let Some(pos) = rest.find("{}") {
            out.push_str(&rest[..pos]);
            out.push_str(&arg(args, next).to_string());
            next += 1;
            rest = &rest[pos + 2..];
        }
        out.push_str(rest);
        Ok(Value::String(out))
    });
}

// ===== list =====

fn register_list(table: &mut HashMap<String, VmNative>) {
    def(table, "size", |args| match arg(args, 0) {
        Value::List(items) => Ok(Value::Number(items.borrow().len() as f64)),
        Value::Map(entries) => Ok(Value::Number(entries.borrow().len() as f64)),
        Value::String(s) => Ok(Value::Number(s.chars().count() as f64)),
        _ => Err(VmError::Native(
            "size expects a list, map, or string".to_string(),
        )),
    });
    def(table, "first", |args| {
        Ok(list_arg(args, 0, "first")?
            .first()
            .cloned()
            .unwrap_or(Value::Null))
    });
    def(table, "last", |args| {
        Ok(list_arg(args, 0, "last")?
            .last()
            .cloned()
            .unwrap_or(Value::Null))
    });
    def(table, "get", |args| {
        let items = list_arg(args, 0, "get")?;
        let i = num_arg(args, 1, "get")? as i64;
        if i < 0 {
            return Ok(Value::Null);
        }
        Ok(items.get(i as usize).cloned().unwrap_or(Value::Null))
    });
    // Mutates in place and returns the list
    def(table, "push", |args| {
        match arg(args, 0) {
            Value::List(items) => {
                items.borrow_mut().push(arg(args, 1));
                Ok(Value::List(items))
            }
            _ => Err(VmError::Native("push expects a list".to_string())),
        }
    });
    def(table, "concat", |args| {
        let mut merged = list_arg(args, 0, "concat")?;
        merged.extend(list_arg(args, 1, "concat")?);
        Ok(Value::list(merged))
    });
    def(table, "reverse", |args| {
        let mut items = list_arg(args, 0, "reverse")?;
        items.reverse();
        Ok(Value::list(items))
    });
    def(table, "range", |args| {
        let start = num_arg(args, 0, "range")? as i64;
        let end = num_arg(args, 1, "range")? as i64;
        let items: Vec<Value> = (start..end).map(|i| Value::Number(i as f64)).collect();
        Ok(Value::list(items))
    });
    def(table, "includes", |args| {
        let items = list_arg(args, 0, "includes")?;
        let needle = arg(args, 1);
        Ok(Value::Bool(items.iter().any(|item| item == &needle)))
    });
    def(table, "isEmpty", |args| match arg(args, 0) {
        Value::List(items) => Ok(Value::Bool(items.borrow().is_empty())),
        Value::Map(entries) => Ok(Value::Bool(entries.borrow().is_empty())),
        Value::String(s) => Ok(Value::Bool(s.is_empty())),
        Value::Null => Ok(Value::Bool(true)),
        _ => Ok(Value::Bool(false)),
    });
    def(table, "sum", |args| {
        let total: f64 = list_arg(args, 0, "sum")?
            .iter()
            .filter_map(|v| v.as_number())
            .sum();
        Ok(Value::Number(total))
    });
    def(table, "avg", |args| {
        let items = list_arg(args, 0, "avg")?;
        if items.is_empty() {
            return Ok(Value::Number(0.0));
        }
        let total: f64 = items.iter().filter_map(|v| v.as_number()).sum();
        Ok(Value::Number(total / items.len() as f64))
    });
    // Normalizes a for-in iterable: lists pass through, maps yield their
    // keys, strings their characters, anything else an empty list
    def(table, "toList", |args| {
        Ok(match arg(args, 0) {
            list @ Value::List(_) => list,
            Value::Map(entries) => Value::list(
                entries
                    .borrow()
                    .keys()
                    .map(|k| Value::from(k.as_str()))
                    .collect(),
            ),
            Value::String(s) => {
                Value::list(s.chars().map(|c| Value::String(c.to_string())).collect())
            }
            _ => Value::list(Vec::new()),
        })
    });
}

// ===== time =====

fn register_time(table: &mut HashMap<String, VmNative>) {
    def(table, "now", |_| Ok(Value::Number(millis_since_epoch())));
    def(table, "nanos", |_| {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as f64)
            .unwrap_or(0.0);
        Ok(Value::Number(nanos))
    });
    def(table, "sleep", |args| {
        let ms = num_arg(args, 0, "sleep")?.max(0.0);
        std::thread::sleep(std::time::Duration::from_millis(ms as u64));
        Ok(Value::Null)
    });
    def(table, "elapsed", |args| {
        let since = num_arg(args, 0, "elapsed")?;
        Ok(Value::Number(millis_since_epoch() - since))
    });
}

fn millis_since_epoch() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as f64)
        .unwrap_or(0.0)
}

// ===== runtime =====

fn register_runtime(table: &mut HashMap<String, VmNative>) {
    def(table, "version", |_| {
        Ok(Value::String(env!("CARGO_PKG_VERSION").to_string()))
    });
    def(table, "osName", |_| {
        Ok(Value::String(std::env::consts::OS.to_string()))
    });
    def(table, "processors", |_| {
        let n = std::thread::available_parallelism()
            .map(|n| n.get() as f64)
            .unwrap_or(1.0);
        Ok(Value::Number(n))
    });
    def(table, "env", |args| {
        let name = str_arg(args, 0, "env")?;
        match std::env::var(&name) {
            Ok(value) => Ok(Value::String(value)),
            Err(_) => Ok(Value::Null),
        }
    });
    // Backs the `assert` statement in compiled code
    def(table, "assert", |args| {
        if arg(args, 0).is_truthy() {
            Ok(Value::Null)
        } else {
            Err(VmError::Native("Assertion failed".to_string()))
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Value]) -> Result<Value, VmError> {
        let table = all();
        table[name](args)
    }

    #[test]
    fn test_math_natives() {
        assert_eq!(call("abs", &[Value::Number(-3.0)]).unwrap(), Value::Number(3.0));
        assert_eq!(
            call("pow", &[Value::Number(2.0), Value::Number(10.0)]).unwrap(),
            Value::Number(1024.0)
        );
        assert_eq!(call("floor", &[Value::Number(1.9)]).unwrap(), Value::Number(1.0));
        assert_eq!(
            call("max", &[Value::Number(1.0), Value::Number(2.0)]).unwrap(),
            Value::Number(2.0)
        );
    }

    #[test]
    fn test_math_rejects_non_numbers() {
        let err = call("sqrt", &[Value::from("x")]).unwrap_err();
        assert!(matches!(err, VmError::Native(_)));
    }

    #[test]
    fn test_string_natives() {
        assert_eq!(
            call("upper", &[Value::from("abc")]).unwrap(),
            Value::from("ABC")
        );
        assert_eq!(
            call("replace", &[Value::from("a-b"), Value::from("-"), Value::from("+")]).unwrap(),
            Value::from("a+b")
        );
        assert_eq!(
            call("substring", &[Value::from("hello"), Value::Number(1.0), Value::Number(3.0)])
                .unwrap(),
            Value::from("el")
        );
        assert_eq!(
            call("split", &[Value::from("a,b"), Value::from(",")]).unwrap(),
            Value::list(vec![Value::from("a"), Value::from("b")])
        );
    }

    #[test]
    fn test_format_fills_placeholders() {
        let result = call(
            "format",
            &[Value::from("{} + {} = {}"), Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)],
        )
        .unwrap();
        assert_eq!(result, Value::from("1 + 2 = 3"));
    }

    #[test]
    fn test_contains_across_types() {
        assert_eq!(
            call("contains", &[Value::from("hello"), Value::from("ell")]).unwrap(),
            Value::Bool(true)
        );
        let list = Value::list(vec![Value::Number(1.0), Value::Number(2.0)]);
        assert_eq!(
            call("contains", &[list, Value::Number(2.0)]).unwrap(),
            Value::Bool(true)
        );
        let mut entries = HashMap::new();
        entries.insert("k".to_string(), Value::Number(1.0));
        assert_eq!(
            call("contains", &[Value::map(entries), Value::from("k")]).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_list_natives() {
        let list = Value::list(vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]);
        assert_eq!(call("size", &[list.clone()]).unwrap(), Value::Number(3.0));
        assert_eq!(call("first", &[list.clone()]).unwrap(), Value::Number(1.0));
        assert_eq!(call("last", &[list.clone()]).unwrap(), Value::Number(3.0));
        assert_eq!(call("sum", &[list.clone()]).unwrap(), Value::Number(6.0));
        assert_eq!(call("avg", &[list]).unwrap(), Value::Number(2.0));
    }

    #[test]
    fn test_to_list_normalizes_iterables() {
        let list = Value::list(vec![Value::Number(1.0)]);
        assert_eq!(call("toList", &[list.clone()]).unwrap(), list);

        let mut entries = HashMap::new();
        entries.insert("k".to_string(), Value::Number(1.0));
        assert_eq!(
            call("toList", &[Value::map(entries)]).unwrap(),
            Value::list(vec![Value::from("k")])
        );

        assert_eq!(
            call("toList", &[Value::from("ab")]).unwrap(),
            Value::list(vec![Value::from("a"), Value::from("b")])
        );

        // Non-iterables become an empty loop, not an error
        assert_eq!(
            call("toList", &[Value::Number(7.0)]).unwrap(),
            Value::list(Vec::new())
        );
    }

    #[test]
    fn test_push_mutates_shared_list() {
        let list = Value::list(vec![Value::Number(1.0)]);
        call("push", &[list.clone(), Value::Number(2.0)]).unwrap();
        assert_eq!(
            list,
            Value::list(vec![Value::Number(1.0), Value::Number(2.0)])
        );
    }

    #[test]
    fn test_range() {
        assert_eq!(
            call("range", &[Value::Number(0.0), Value::Number(3.0)]).unwrap(),
            Value::list(vec![Value::Number(0.0), Value::Number(1.0), Value::Number(2.0)])
        );
    }

    #[test]
    fn test_random_in_unit_interval() {
        for _ in 0..50 {
            let v = call("random", &[]).unwrap();
            let n = v.as_number().unwrap();
            assert!((0.0..1.0).contains(&n));
        }
    }

    #[test]
    fn test_assert_native() {
        assert_eq!(call("assert", &[Value::Bool(true)]).unwrap(), Value::Null);
        assert!(call("assert", &[Value::Number(0.0)]).is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let path_val = Value::String(path.to_string_lossy().into_owned());

        assert_eq!(
            call("fileExists", &[path_val.clone()]).unwrap(),
            Value::Bool(false)
        );
        call("writeFile", &[path_val.clone(), Value::from("hi")]).unwrap();
        call("appendFile", &[path_val.clone(), Value::from(" there")]).unwrap();
        assert_eq!(
            call("readFile", &[path_val.clone()]).unwrap(),
            Value::from("hi there")
        );
        assert_eq!(
            call("fileExists", &[path_val]).unwrap(),
            Value::Bool(true)
        );
    }
}
