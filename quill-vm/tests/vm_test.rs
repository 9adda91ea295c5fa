// quill-vm - End-to-end execution tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Reads, compiles, and executes whole programs against the default
//! primitive set.

mod common;

use common::Fixture;

#[test]
fn arithmetic() {
    let mut fx = Fixture::new();
    assert_prints!(fx, "(+ 1 2)", "3");
    assert_prints!(fx, "(+ 1 2 3 4)", "10");
    assert_prints!(fx, "(* 1 2 3 4)", "24");
    assert_prints!(fx, "(- 10 4)", "6");
    assert_prints!(fx, "(/ 9 2)", "4");
    assert_prints!(fx, "(/ 9 2.0)", "4.5");
    assert_prints!(fx, "(< 1 2)", "#t");
    assert_prints!(fx, "(= 3 3.0)", "#t");
}

#[test]
fn while_loop_runs_in_constant_stack() {
    let mut fx = Fixture::new();
    assert_prints!(
        fx,
        "(begin (set! x 0) (while (< x 5) (set! x (+ x 1))) x)",
        "5"
    );
    assert!(fx.vm.stack_high_water() <= 8);
}

#[test]
fn recursive_factorial() {
    let mut fx = Fixture::new();
    let results = fx
        .eval_all(
            "(set! fact (lambda (x) (if (<= x 1) 1 (* x (fact (- x 1))))))
             (fact 5)",
        )
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].to_string(), "[Closure]");
    assert_eq!(results[1].to_string(), "120");
}

#[test]
fn deep_tail_recursion_uses_constant_stack() {
    let mut fx = Fixture::new();
    fx.eval("(set! countdown (lambda (n) (if (<= n 0) 0 (countdown (- n 1)))))")
        .unwrap();
    assert_prints!(fx, "(countdown 50000)", "0");
    // Proper tail calls: depth is bounded independently of n.
    assert!(
        fx.vm.stack_high_water() <= 8,
        "tail recursion grew the stack to {}",
        fx.vm.stack_high_water()
    );
}

#[test]
fn quasiquote_splicing() {
    let mut fx = Fixture::new();
    assert_prints!(fx, "`(1 ,(list 2 3) ,@(list 4 5))", "(1 (2 3) 4 5)");
    // Splicing a variable goes through append at runtime.
    assert_prints!(fx, "(begin (set! xs (list 4 5)) `(1 ,@xs))", "(1 4 5)");
    assert_prints!(fx, "`(x . ,xs)", "(x 4 5)");
}

#[test]
fn defmacro_and_expansion() {
    let mut fx = Fixture::new();
    let results = fx
        .eval_all("(defmacro inc1 (x) `(+ ,x 1)) (inc1 (inc1 (inc1 1)))")
        .unwrap();
    assert_eq!(results[0].to_string(), "[Closure/inc1]");
    assert_eq!(results[1].to_string(), "4");
    assert_prints!(fx, "(mx1 '(inc1 5))", "(core:+ 5 1)");
    // mx reaches the fixed point of head expansion.
    fx.eval("(defmacro twice (x) `(inc1 (inc1 ,x)))").unwrap();
    assert_prints!(fx, "(mx1 '(twice 5))", "(inc1 (inc1 5))");
    assert_prints!(fx, "(mx '(inc1 5))", "(core:+ 5 1)");
}

#[test]
fn closures_share_captured_state() {
    let mut fx = Fixture::new();
    let results = fx
        .eval_all(
            "(set! add ((lambda (sum) (lambda (d) (set! sum (+ sum d)) sum)) 0))
             (add 0) (add 100) (add 0)",
        )
        .unwrap();
    let printed: Vec<String> = results.iter().map(|v| v.to_string()).collect();
    assert_eq!(printed, vec!["[Closure]", "0", "100", "100"]);
}

#[test]
fn sibling_closures_observe_the_same_frame() {
    let mut fx = Fixture::new();
    fx.eval(
        "(set! pair ((lambda (n)
                       (list (lambda () (set! n (+ n 1)) n)
                             (lambda () n)))
                     0))",
    )
    .unwrap();
    assert_prints!(fx, "((car pair))", "1");
    assert_prints!(fx, "((car pair))", "2");
    // The reader closure sees mutations made through the writer.
    assert_prints!(fx, "((cadr pair))", "2");
}

#[test]
fn packages_isolate_globals() {
    let mut fx = Fixture::new();
    let results = fx
        .eval_all(
            "(package-set \"foo\") (package-import \"core\") (set! x 5) (package-set nil) x",
        )
        .unwrap();
    let printed: Vec<String> = results.iter().map(|v| v.to_string()).collect();
    assert_eq!(printed, vec!["\"foo\"", "()", "5", "()", "()"]);
    // foo:x kept its binding.
    assert_prints!(fx, "foo:x", "5");
}

#[test]
fn variadic_parameter_lists() {
    let mut fx = Fixture::new();
    assert_prints!(fx, "((lambda (a . rest) rest) 1 2 3)", "(2 3)");
    assert_prints!(fx, "((lambda (a . rest) rest) 1)", "()");
    assert_prints!(fx, "((lambda args args) 1 2)", "(1 2)");
    assert_prints!(fx, "((lambda args args))", "()");
}

#[test]
fn if_star_keeps_the_predicate_value() {
    let mut fx = Fixture::new();
    assert_prints!(fx, "(if* 7 9)", "7");
    assert_prints!(fx, "(if* #f 9)", "9");
    assert_prints!(fx, "(if* () 9)", "9");
}

#[test]
fn keywords_evaluate_to_themselves() {
    let mut fx = Fixture::new();
    assert_prints!(fx, ":foo", ":foo");
}

#[test]
fn immediate_lambda_application_inlines() {
    let mut fx = Fixture::new();
    assert_prints!(fx, "((lambda () 1 2 3))", "3");
}

#[test]
fn vectors_and_strings() {
    let mut fx = Fixture::new();
    assert_prints!(fx, "(vector 1 \"x\")", "[Vector 1 \"x\"]");
    assert_prints!(
        fx,
        "(begin (set! v (vector 1 2)) (vector-set! v 0 9) (vector-ref v 0))",
        "9"
    );
    assert_prints!(fx, "(string-append \"ab\" \"cd\")", "\"abcd\"");
}

#[test]
fn runtime_errors_unwind_but_leave_the_machine_usable() {
    let mut fx = Fixture::new();
    assert!(fx.eval("(car 5)").is_err());
    assert!(fx.eval("(/ 1 0)").is_err());
    assert!(fx.eval("((lambda (x) x))").is_err());
    // Calling a non-closure (unbound global evaluates to nil).
    assert!(fx.eval("(no-such-function 1)").is_err());
    // The machine still works afterwards.
    assert_prints!(fx, "(+ 1 1)", "2");
}

#[test]
fn set_of_a_macro_name_is_a_compile_error() {
    let mut fx = Fixture::new();
    fx.eval("(defmacro m (x) x)").unwrap();
    let err = fx.eval("(set! m 5)").unwrap_err();
    assert!(err.contains("macro"), "unexpected error: {}", err);
}

#[test]
fn compile_errors_do_not_disturb_prior_state() {
    let mut fx = Fixture::new();
    fx.eval("(set! x 41)").unwrap();
    assert!(fx.eval("(set! 5 x)").is_err());
    assert_prints!(fx, "(+ x 1)", "42");
}

#[test]
fn map_reenters_the_vm() {
    let mut fx = Fixture::new();
    assert_prints!(fx, "(map (lambda (n) (* n n)) (list 1 2 3))", "(1 4 9)");
}

#[test]
fn gensym_names_are_fresh() {
    let mut fx = Fixture::new();
    assert_prints!(fx, "(equal? (gensym) (gensym))", "#f");
}
