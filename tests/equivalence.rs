//! Interpreter/VM conformance suite
//!
//! Both engines must produce the same observable results for programs in the
//! compiled subset of the language. Each case runs the same source through
//! direct interpretation and through compile-serialize-deserialize-execute,
//! then compares named globals.

use std::path::Path;

use pretty_assertions::assert_eq;

use somnia::compiler::Compiler;
use somnia::interpreter::Interpreter;
use somnia::parser;
use somnia::value::Value;
use somnia::vm::SomniaVM;
use somnia::BytecodeFile;

fn interpret(source: &str) -> Interpreter {
    let statements = parser::parse(source).unwrap();
    let mut interpreter = Interpreter::new();
    interpreter
        .interpret(&statements, Path::new("<conformance>"))
        .unwrap();
    interpreter
}

/// Full pipeline: compile, serialize, deserialize, execute
fn run_vm(source: &str) -> SomniaVM {
    let statements = parser::parse(source).unwrap();
    let file = Compiler::new().compile(&statements).unwrap();
    let decoded = BytecodeFile::from_bytes(&file.to_bytes().unwrap()).unwrap();
    let mut vm = SomniaVM::new();
    vm.load(decoded);
    vm.execute().unwrap();
    vm
}

/// Assert that both engines agree on the named globals
fn assert_engines_agree(source: &str, globals: &[(&str, Value)]) {
    let interpreter = interpret(source);
    let vm = run_vm(source);
    for (name, expected) in globals {
        assert_eq!(
            interpreter.global(name).as_ref(),
            Some(expected),
            "interpreter disagrees on '{}'",
            name
        );
        assert_eq!(
            vm.global(name).as_ref(),
            Some(expected),
            "vm disagrees on '{}'",
            name
        );
    }
}

#[test]
fn test_arithmetic_agrees() {
    assert_engines_agree(
        "var a = 1 + 1\nvar b = 2 + 3 * 4\nvar c = (2 + 3) * 4\nvar d = 10 % 3",
        &[
            ("a", Value::Number(2.0)),
            ("b", Value::Number(14.0)),
            ("c", Value::Number(20.0)),
            ("d", Value::Number(1.0)),
        ],
    );
}

#[test]
fn test_string_coercion_agrees() {
    assert_engines_agree(
        r#"var a = "a" + 1
var b = 1 + "a""#,
        &[("a", Value::from("a1")), ("b", Value::from("1a"))],
    );
}

#[test]
fn test_integral_numbers_display_without_decimal() {
    // `print(x + y)` must emit "5", not "5.0"
    assert_eq!(Value::Number(5.0).to_string(), "5");
    assert_eq!(Value::Number(2.5).to_string(), "2.5");
}

#[test]
fn test_basic_program_value() {
    assert_engines_agree(
        "var x = 2\nvar y = 3\nvar out = x + y",
        &[("out", Value::Number(5.0))],
    );
}

#[test]
fn test_comparisons_and_logic_agree() {
    assert_engines_agree(
        r#"var a = 1 < 2
var b = 2 <= 1
var c = 1 == 1 and 2 > 1
var d = not (1 == 2)
var e = "abc" < "abd""#,
        &[
            ("a", Value::Bool(true)),
            ("b", Value::Bool(false)),
            ("c", Value::Bool(true)),
            ("d", Value::Bool(true)),
            ("e", Value::Bool(true)),
        ],
    );
}

#[test]
fn test_control_flow_agrees() {
    let source = r#"
var r = 0
if 1 > 2 { r = 1 } else { r = 2 }
var i = 0
var sum = 0
while i < 5 {
    i = i + 1
    sum = sum + i
}
var picked = if sum > 10 then "big" else "small"
"#;
    assert_engines_agree(
        source,
        &[
            ("r", Value::Number(2.0)),
            ("sum", Value::Number(15.0)),
            ("picked", Value::from("big")),
        ],
    );
}

#[test]
fn test_function_calls_agree() {
    let source = r#"
fun fib(n) {
    if n < 2 { return n }
    return fib(n - 1) + fib(n - 2)
}
fun announce(n) { return "fib = " + n }
var f = fib(12)
var msg = announce(f)
"#;
    assert_engines_agree(
        source,
        &[
            ("f", Value::Number(144.0)),
            ("msg", Value::from("fib = 144")),
        ],
    );
}

#[test]
fn test_forward_declaration_agrees() {
    assert_engines_agree(
        "var r = double(21)\nfun double(n) { return n * 2 }",
        &[("r", Value::Number(42.0))],
    );
}

#[test]
fn test_lists_and_maps_agree() {
    let source = r#"
var xs = [1, 2, 3]
var second = xs[1]
xs[0] = 10
var head = xs[0]
var n = xs.length
var m = {"k": 1}
var k = m["k"]
m.j = 2
var j = m.j
"#;
    assert_engines_agree(
        source,
        &[
            ("second", Value::Number(2.0)),
            ("head", Value::Number(10.0)),
            ("n", Value::Number(3.0)),
            ("k", Value::Number(1.0)),
            ("j", Value::Number(2.0)),
        ],
    );
}

#[test]
fn test_for_loop_agrees() {
    assert_engines_agree(
        "var sum = 0\nfor n in [1, 2, 3, 4] { sum = sum + n }",
        &[("sum", Value::Number(10.0))],
    );
}

#[test]
fn test_for_over_map_keys_agrees() {
    let source = r#"var m = {"a": 1}
var seen = ""
for k in m { seen = seen + k }"#;
    assert_engines_agree(source, &[("seen", Value::from("a"))]);
}

#[test]
fn test_for_over_string_chars_agrees() {
    let source = r#"var out = ""
for c in "ab" { out = out + c }"#;
    assert_engines_agree(source, &[("out", Value::from("ab"))]);
}

#[test]
fn test_for_over_non_iterable_is_empty_loop() {
    assert_engines_agree(
        "var hits = 0\nfor x in 42 { hits = hits + 1 }",
        &[("hits", Value::Number(0.0))],
    );
}

#[test]
fn test_membership_agrees() {
    assert_engines_agree(
        r#"var a = "ell" in "hello"
var b = 2 in [1, 2]
var c = 9 in [1, 2]"#,
        &[
            ("a", Value::Bool(true)),
            ("b", Value::Bool(true)),
            ("c", Value::Bool(false)),
        ],
    );
}

#[test]
fn test_undefined_variable_errors_in_both_engines() {
    let statements = parser::parse("var x = missing").unwrap();

    let mut interpreter = Interpreter::new();
    assert!(interpreter
        .interpret(&statements, Path::new("<conformance>"))
        .is_err());

    let file = Compiler::new().compile(&statements).unwrap();
    let mut vm = SomniaVM::new();
    vm.load(file);
    assert!(vm.execute().is_err());
}

#[test]
fn test_closure_observes_mutation() {
    // Closures capture the defining environment by reference
    let source = r#"
fun make_counter() {
    var count = 0
    fun bump() {
        count = count + 1
        return count
    }
    return bump
}
var counter = make_counter()
var first = counter()
var second = counter()
"#;
    let interpreter = interpret(source);
    assert_eq!(interpreter.global("first"), Some(Value::Number(1.0)));
    assert_eq!(interpreter.global("second"), Some(Value::Number(2.0)));
}

#[test]
fn test_constant_pool_dedup_across_usages() {
    let statements = parser::parse(r#"var a = "x"
var b = "x"
fun f() { return "x" }"#)
    .unwrap();
    let file = Compiler::new().compile(&statements).unwrap();
    let occurrences = file
        .pool
        .entries()
        .iter()
        .filter(|c| matches!(c, somnia::Constant::Str(s) if s == "x"))
        .count();
    assert_eq!(occurrences, 1);
}

#[test]
fn test_round_trip_matches_direct_execution() {
    let source = "fun square(n) { return n * n }\nvar r = square(9)";
    let statements = parser::parse(source).unwrap();
    let file = Compiler::new().compile(&statements).unwrap();

    let mut direct = SomniaVM::new();
    direct.load(file.clone());
    direct.execute().unwrap();

    let decoded = BytecodeFile::from_bytes(&file.to_bytes().unwrap()).unwrap();
    let mut round_tripped = SomniaVM::new();
    round_tripped.load(decoded);
    round_tripped.execute().unwrap();

    assert_eq!(direct.global("r"), round_tripped.global("r"));
    assert_eq!(direct.global("r"), Some(Value::Number(81.0)));
}

#[test]
fn test_test_runner_continues_past_failure() {
    let source = r#"
test "arithmetic holds" { assert 1 + 1 == 2 }
test "broken" { assert 1 == 2 }
test "still runs" { assert true }
"#;
    let statements = parser::parse(source).unwrap();
    let mut interpreter = Interpreter::new();
    interpreter
        .interpret(&statements, Path::new("<conformance>"))
        .unwrap();

    let outcomes = interpreter.run_tests();
    let failures: Vec<_> = outcomes.iter().filter(|o| o.failure.is_some()).collect();
    assert_eq!(outcomes.len(), 3);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].name, "broken");
}

#[test]
fn test_assert_agrees() {
    // Passing asserts are invisible in both engines
    assert_engines_agree("assert 2 > 1\nvar ok = true", &[("ok", Value::Bool(true))]);

    let statements = parser::parse("assert 1 > 2").unwrap();

    let mut interpreter = Interpreter::new();
    assert!(interpreter
        .interpret(&statements, Path::new("<conformance>"))
        .is_err());

    let file = Compiler::new().compile(&statements).unwrap();
    let mut vm = SomniaVM::new();
    vm.load(file);
    assert!(vm.execute().is_err());
}

#[test]
fn test_vm_native_dispatch() {
    let source = r#"var parts = split("a,b,c", ",")
var n = parts.length"#;
    let vm = run_vm(source);
    assert_eq!(vm.global("n"), Some(Value::Number(3.0)));
}
