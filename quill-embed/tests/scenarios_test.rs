// quill-embed - End-to-end scenario tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Literal input → expected printed output, through a full Context.

use quill_embed::Context;

fn printed(context: &mut Context, source: &str) -> Vec<String> {
    context
        .compile_and_execute(source)
        .expect("evaluation succeeds")
        .into_iter()
        .map(|result| result.value.to_string())
        .collect()
}

#[test]
fn arithmetic_scenario() {
    let mut context = Context::new_bare();
    assert_eq!(printed(&mut context, "(+ 1 2)"), vec!["3"]);
    assert_eq!(printed(&mut context, "(+ 1 2 3 4)"), vec!["10"]);
    assert_eq!(printed(&mut context, "(* 1 2 3 4)"), vec!["24"]);
}

#[test]
fn while_scenario_stays_within_constant_stack() {
    let mut context = Context::new_bare();
    assert_eq!(
        printed(
            &mut context,
            "(begin (set! x 0) (while (< x 5) (set! x (+ x 1))) x)"
        ),
        vec!["5"]
    );
    assert!(context.vm().stack_high_water() <= 8);
}

#[test]
fn factorial_scenario() {
    let mut context = Context::new_bare();
    let outputs = printed(
        &mut context,
        "(set! fact (lambda (x) (if (<= x 1) 1 (* x (fact (- x 1)))))) (fact 5)",
    );
    assert_eq!(outputs, vec!["[Closure]", "120"]);
}

#[test]
fn quasiquote_scenario() {
    let mut context = Context::new_bare();
    assert_eq!(
        printed(&mut context, "`(1 ,(list 2 3) ,@(list 4 5))"),
        vec!["(1 (2 3) 4 5)"]
    );
}

#[test]
fn macro_scenario() {
    let mut context = Context::new_bare();
    let outputs = printed(
        &mut context,
        "(defmacro inc1 (x) `(+ ,x 1)) (inc1 (inc1 (inc1 1)))",
    );
    assert_eq!(outputs[0], "[Closure/inc1]");
    assert_eq!(outputs[1], "4");
    assert_eq!(printed(&mut context, "(mx1 '(inc1 5))"), vec!["(core:+ 5 1)"]);
}

#[test]
fn captured_counter_scenario() {
    let mut context = Context::new().unwrap();
    let outputs = printed(
        &mut context,
        "(set! add (let ((sum 0)) (lambda (d) (set! sum (+ sum d)) sum)))
         (add 0) (add 100) (add 0)",
    );
    assert_eq!(outputs, vec!["[Closure]", "0", "100", "100"]);
}

#[test]
fn package_scenario() {
    let mut context = Context::new_bare();
    let outputs = printed(
        &mut context,
        "(package-set \"foo\") (package-import \"core\") (set! x 5) (package-set nil) x",
    );
    assert_eq!(outputs, vec!["\"foo\"", "()", "5", "()", "()"]);
}
