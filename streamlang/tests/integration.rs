//! Integration tests for the StreamLanguage interpreter
//!
//! Programs are built directly as ASTs and run through the `Interpreter`
//! facade, covering:
//! - Scoping (block, restricted, nonlocal, global)
//! - Control flow signals
//! - Functions, overloads, lambdas and the recursion guard
//! - Exceptions (try/catch/finally, subtyping, builtin raises)
//! - Agreement between the static pass and evaluation

use pretty_assertions::assert_eq;

use streamlang::ast::{BinOp, CatchClause, FnDecl, LambdaDef, Node, Param, Program, TypeExpr};
use streamlang::config::{InterpreterConfig, OutputMode, TerminationCheck};
use streamlang::interp::{ErrorKind, Interpreter, Outcome, RuntimeError};
use streamlang::types::{ExceptionValue, TypeDescriptor, TypeRegistry, Value};

/// Capture-mode configuration with the static pass on
fn capture() -> InterpreterConfig {
    InterpreterConfig::new().output(OutputMode::Capture)
}

fn interpreter() -> Interpreter {
    Interpreter::with_config(capture())
}

fn run(nodes: Vec<Node>) -> Result<Outcome, RuntimeError> {
    interpreter().run(&Program::new(nodes))
}

/// Run and return the completed value
fn value_of(nodes: Vec<Node>) -> Option<Value> {
    match run(nodes) {
        Ok(Outcome::Completed(value)) => value,
        other => panic!("expected completion, got {other:?}"),
    }
}

/// Run and return the lines printed
fn output_of(nodes: Vec<Node>) -> Vec<String> {
    let mut interp = interpreter();
    match interp.run(&Program::new(nodes)) {
        Ok(Outcome::Completed(_)) => interp.output().to_vec(),
        other => panic!("expected completion, got {other:?}"),
    }
}

fn fault_of(nodes: Vec<Node>) -> ErrorKind {
    match run(nodes) {
        Err(err) => err.kind,
        Ok(outcome) => panic!("expected a fault, got {outcome:?}"),
    }
}

/// Fault kind with the static pass disabled
fn runtime_fault_of(nodes: Vec<Node>) -> ErrorKind {
    let mut interp = Interpreter::with_config(capture().type_check(false));
    match interp.run(&Program::new(nodes)) {
        Err(err) => err.kind,
        Ok(outcome) => panic!("expected a fault, got {outcome:?}"),
    }
}

fn uncaught_of(nodes: Vec<Node>) -> ExceptionValue {
    match run(nodes) {
        Ok(Outcome::Uncaught(exc)) => exc,
        other => panic!("expected an uncaught exception, got {other:?}"),
    }
}

fn func(name: &str, params: &[&str], body: Vec<Node>) -> Node {
    Node::FnDecl(FnDecl {
        name: name.to_string(),
        params: params.iter().map(|p| Param::new(*p)).collect(),
        ret_ty: None,
        body,
    })
}

fn typed_func(name: &str, params: Vec<Param>, ret: &str, body: Vec<Node>) -> Node {
    Node::FnDecl(FnDecl {
        name: name.to_string(),
        params,
        ret_ty: Some(TypeExpr::named(ret)),
        body,
    })
}

fn lambda(params: &[&str], body: Vec<Node>) -> Node {
    Node::Lambda(LambdaDef { params: params.iter().map(|p| Param::new(*p)).collect(), body })
}

fn catch(exception: &str, binding: &str, body: Vec<Node>) -> CatchClause {
    CatchClause { exception: exception.to_string(), binding: binding.to_string(), body }
}

fn try_catch(body: Vec<Node>, handlers: Vec<CatchClause>, finally: Option<Vec<Node>>) -> Node {
    Node::TryCatch { body, handlers, finally }
}

fn raise(exception: &str, message: &str) -> Node {
    Node::throw(Node::construct(exception, vec![Node::string(message)]))
}

fn print(node: Node) -> Node {
    Node::call("print", vec![node])
}

fn add(left: Node, right: Node) -> Node {
    Node::binary(left, BinOp::Add, right)
}

// ============================================
// Scoping
// ============================================

#[test]
fn test_block_scope_isolation() {
    let program = vec![
        Node::if_else(Node::Bool(true), vec![Node::var_decl("x", Node::int(1))], None),
        Node::var("x"),
    ];
    assert_eq!(fault_of(program.clone()), ErrorKind::UndefinedVariable);
    assert_eq!(runtime_fault_of(program), ErrorKind::UndefinedVariable);
}

#[test]
fn test_redeclaration_in_same_scope() {
    let program = vec![Node::var_decl("x", Node::int(1)), Node::var_decl("x", Node::int(2))];
    assert_eq!(fault_of(program), ErrorKind::Redeclaration);
}

#[test]
fn test_shadowing_in_inner_block() {
    let program = vec![
        Node::var_decl("x", Node::int(1)),
        Node::Block(vec![Node::var_decl("x", Node::string("inner")), print(Node::var("x"))]),
        Node::var("x"),
    ];
    let mut interp = interpreter();
    let outcome = interp.run(&Program::new(program)).unwrap();
    assert_eq!(outcome, Outcome::Completed(Some(Value::Integer(1))));
    assert_eq!(interp.output(), ["inner".to_string()]);
}

#[test]
fn test_function_cannot_see_enclosing_locals() {
    let program = vec![
        func(
            "outer",
            &[],
            vec![
                Node::var_decl("local", Node::int(1)),
                func("inner", &[], vec![Node::ret(Node::var("local"))]),
                Node::ret(Node::call("inner", vec![])),
            ],
        ),
        Node::call("outer", vec![]),
    ];
    assert_eq!(fault_of(program.clone()), ErrorKind::UndefinedVariable);
    assert_eq!(runtime_fault_of(program), ErrorKind::UndefinedVariable);
}

#[test]
fn test_nested_function_cannot_call_itself() {
    // `down` lives in outer's scope, but its own body resolves free names
    // against the globals
    let down = func(
        "down",
        &["n"],
        vec![
            Node::if_else(
                Node::binary(Node::var("n"), BinOp::Gt, Node::int(0)),
                vec![Node::ret(Node::call("down", vec![Node::binary(Node::var("n"), BinOp::Sub, Node::int(1))]))],
                None,
            ),
            Node::ret(Node::int(0)),
        ],
    );
    let program = vec![
        func("outer", &[], vec![down, Node::ret(Node::call("down", vec![Node::int(3)]))]),
        Node::call("outer", vec![]),
    ];
    assert_eq!(fault_of(program.clone()), ErrorKind::UndefinedFunction);
    assert_eq!(runtime_fault_of(program), ErrorKind::UndefinedFunction);
}

#[test]
fn test_block_functions_cannot_call_siblings() {
    let program = vec![Node::Block(vec![
        func("one", &[], vec![Node::ret(Node::int(1))]),
        func("two", &[], vec![Node::ret(add(Node::call("one", vec![]), Node::int(1)))]),
        Node::call("two", vec![]),
    ])];
    assert_eq!(fault_of(program.clone()), ErrorKind::UndefinedFunction);
    assert_eq!(runtime_fault_of(program), ErrorKind::UndefinedFunction);
}

#[test]
fn test_nonlocal_reads_and_writes_enclosing_local() {
    let program = vec![
        func(
            "counter",
            &[],
            vec![
                Node::var_decl("n", Node::int(0)),
                func(
                    "bump",
                    &[],
                    vec![
                        Node::Nonlocal(vec!["n".into()]),
                        Node::assign("n", add(Node::var("n"), Node::int(1))),
                    ],
                ),
                Node::call("bump", vec![]),
                Node::call("bump", vec![]),
                Node::ret(Node::var("n")),
            ],
        ),
        Node::call("counter", vec![]),
    ];
    assert_eq!(value_of(program), Some(Value::Integer(2)));
}

#[test]
fn test_nonlocal_of_unknown_name_faults() {
    let program = vec![func("f", &[], vec![Node::Nonlocal(vec!["ghost".into()])]), Node::call("f", vec![])];
    assert_eq!(fault_of(program), ErrorKind::UndefinedVariable);
}

#[test]
fn test_functions_read_and_write_globals() {
    let program = vec![
        Node::var_decl("g", Node::int(5)),
        func("bump", &[], vec![Node::assign("g", add(Node::var("g"), Node::int(1)))]),
        Node::call("bump", vec![]),
        Node::var("g"),
    ];
    assert_eq!(value_of(program), Some(Value::Integer(6)));
}

#[test]
fn test_global_declaration_skips_shadowing_local() {
    let program = vec![
        Node::var_decl("total", Node::int(0)),
        func(
            "f",
            &[],
            vec![
                Node::var_decl("total", Node::int(10)),
                Node::Block(vec![
                    Node::Global(vec!["total".into()]),
                    Node::assign("total", add(Node::var("total"), Node::int(1))),
                ]),
                Node::ret(Node::var("total")),
            ],
        ),
        print(Node::call("f", vec![])),
        Node::var("total"),
    ];
    let mut interp = interpreter();
    let outcome = interp.run(&Program::new(program)).unwrap();
    assert_eq!(outcome, Outcome::Completed(Some(Value::Integer(1))));
    assert_eq!(interp.output(), ["10".to_string()]);
}

#[test]
fn test_scopes_balanced_after_fault() {
    let mut interp = interpreter();
    let program = Program::new(vec![
        func("f", &["x"], vec![Node::Block(vec![Node::ret(add(Node::var("x"), Node::string("s")))])]),
        Node::call("f", vec![Node::int(1)]),
    ]);
    assert!(interp.run(&program).is_err());
    assert_eq!(interp.context().scope_depth(), 1);
    assert!(interp.context().call_stack().is_empty());
}

#[test]
fn test_undefined_name_hint() {
    let mut interp = interpreter();
    let program = Program::new(vec![Node::var_decl("counter", Node::int(1)), Node::var("countr")]);
    let err = interp.run(&program).unwrap_err();
    insta::assert_snapshot!(err.message, @r"
    undefined variable: countr
      hint: did you mean `counter`?
    ");
}

// ============================================
// Values and operators
// ============================================

#[test]
fn test_integer_division_widens() {
    let program = vec![Node::binary(Node::int(6), BinOp::Div, Node::int(3))];
    assert_eq!(value_of(program), Some(Value::Float(2.0)));
}

#[test]
fn test_float_slot_widens_integer() {
    let program = vec![
        Node::typed_decl("f", TypeExpr::named("Float"), Some(Node::int(1))),
        Node::var("f"),
    ];
    assert_eq!(value_of(program), Some(Value::Float(1.0)));
}

#[test]
fn test_array_literal_widens_mixed_numbers() {
    let program = vec![Node::ArrayLit(vec![Node::int(1), Node::float(2.5)])];
    let value = value_of(program).unwrap();
    assert_eq!(value.type_descriptor(), TypeDescriptor::array(TypeDescriptor::Float));
    assert_eq!(value.to_string(), "[1.0, 2.5]");
}

#[test]
fn test_constant_reassignment() {
    let program = vec![Node::const_decl("c", Node::int(1)), Node::assign("c", Node::int(2))];
    assert_eq!(fault_of(program), ErrorKind::ConstantReassignment);
}

#[test]
fn test_stream_operators_are_unsupported_at_runtime() {
    let stream = || Node::construct("Stream", vec![]);
    let program = vec![Node::binary(stream(), BinOp::Chain, stream())];
    assert_eq!(fault_of(program), ErrorKind::UnsupportedOperation);
}

#[test]
fn test_conversions() {
    let program = vec![Node::Convert {
        value: Box::new(Node::string("42")),
        target: TypeExpr::named("Integer"),
    }];
    assert_eq!(value_of(program), Some(Value::Integer(42)));

    let program = vec![try_catch(
        vec![Node::Convert { value: Box::new(Node::string("abc")), target: TypeExpr::named("Integer") }],
        vec![catch("TypeConversionError", "e", vec![print(Node::var("e"))])],
        None,
    )];
    assert_eq!(output_of(program), ["TypeConversionError: cannot convert String abc to Integer"]);
}

// ============================================
// Control flow
// ============================================

#[test]
fn test_return_short_circuits_sequence() {
    let mut interp = interpreter();
    let program = Program::new(vec![
        print(Node::string("A")),
        Node::ret(Node::int(5)),
        print(Node::string("B")),
    ]);
    let outcome = interp.run(&program).unwrap();
    assert_eq!(outcome, Outcome::Completed(Some(Value::Integer(5))));
    assert_eq!(interp.output(), ["A".to_string()]);
}

#[test]
fn test_break_is_consumed_by_loop() {
    let program = vec![Node::while_loop(Node::Bool(true), vec![Node::Break])];
    assert_eq!(value_of(program), None);

    let program = vec![
        Node::var_decl("i", Node::int(0)),
        Node::while_loop(
            Node::Bool(true),
            vec![
                Node::assign("i", add(Node::var("i"), Node::int(1))),
                Node::if_else(Node::binary(Node::var("i"), BinOp::Eq, Node::int(3)), vec![Node::Break], None),
            ],
        ),
        Node::var("i"),
    ];
    assert_eq!(value_of(program), Some(Value::Integer(3)));
}

#[test]
fn test_for_loop_with_continue() {
    // 0 + 1 + 2 + 4, skipping 3
    let program = vec![
        Node::var_decl("sum", Node::int(0)),
        Node::For {
            init: Box::new(Node::var_decl("i", Node::int(0))),
            cond: Box::new(Node::binary(Node::var("i"), BinOp::Lt, Node::int(5))),
            step: Box::new(Node::assign("i", add(Node::var("i"), Node::int(1)))),
            body: vec![
                Node::if_else(Node::binary(Node::var("i"), BinOp::Eq, Node::int(3)), vec![Node::Continue], None),
                Node::assign("sum", add(Node::var("sum"), Node::var("i"))),
            ],
        },
        Node::var("sum"),
    ];
    assert_eq!(value_of(program), Some(Value::Integer(7)));
}

#[test]
fn test_loop_variable_not_visible_after_for() {
    let program = vec![
        Node::For {
            init: Box::new(Node::var_decl("i", Node::int(0))),
            cond: Box::new(Node::Bool(false)),
            step: Box::new(Node::var("i")),
            body: vec![],
        },
        Node::var("i"),
    ];
    assert_eq!(fault_of(program), ErrorKind::UndefinedVariable);
}

#[test]
fn test_break_and_continue_outside_loop() {
    assert_eq!(fault_of(vec![Node::Break]), ErrorKind::BreakOutsideLoop);
    assert_eq!(runtime_fault_of(vec![Node::Continue]), ErrorKind::ContinueOutsideLoop);

    // a loop around the call site does not count
    let program = vec![
        func("f", &[], vec![Node::Break]),
        Node::while_loop(Node::Bool(true), vec![Node::call("f", vec![])]),
    ];
    assert_eq!(fault_of(program.clone()), ErrorKind::BreakOutsideLoop);
    assert_eq!(runtime_fault_of(program), ErrorKind::BreakOutsideLoop);
}

#[test]
fn test_non_boolean_condition() {
    let program = vec![Node::while_loop(Node::int(1), vec![])];
    assert_eq!(fault_of(program.clone()), ErrorKind::TypeError);
    assert_eq!(runtime_fault_of(program), ErrorKind::TypeError);
}

// ============================================
// Functions
// ============================================

#[test]
fn test_overloads_by_arity() {
    let program = vec![
        func("add", &["a"], vec![Node::ret(Node::var("a"))]),
        func("add", &["a", "b"], vec![Node::ret(add(Node::var("a"), Node::var("b")))]),
        add(Node::call("add", vec![Node::int(1)]), Node::call("add", vec![Node::int(2), Node::int(3)])),
    ];
    assert_eq!(value_of(program), Some(Value::Integer(6)));
}

#[test]
fn test_overload_arity_collision() {
    let program = vec![
        func("add", &["a", "b"], vec![]),
        func("add", &["x", "y"], vec![]),
    ];
    assert_eq!(fault_of(program.clone()), ErrorKind::Redeclaration);
    assert_eq!(runtime_fault_of(program), ErrorKind::Redeclaration);
}

#[test]
fn test_arity_mismatch_lists_overloads() {
    let mut interp = Interpreter::with_config(capture().type_check(false));
    let program = Program::new(vec![
        func("add", &["a"], vec![]),
        func("add", &["a", "b"], vec![]),
        Node::call("add", vec![Node::int(1), Node::int(2), Node::int(3)]),
    ]);
    let err = interp.run(&program).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ArityMismatch);
    insta::assert_snapshot!(err.message, @"function add expects 1 or 2 argument(s), got 3");
}

#[test]
fn test_function_declaration_only_in_function_friendly_blocks() {
    let program = vec![Node::while_loop(Node::Bool(false), vec![func("f", &[], vec![])])];
    assert_eq!(fault_of(program), ErrorKind::FunctionDeclarationNotAllowed);

    let program = vec![
        Node::Block(vec![func("f", &[], vec![Node::ret(Node::int(1))]), Node::call("f", vec![])]),
    ];
    assert_eq!(value_of(program), Some(Value::Integer(1)));
}

#[test]
fn test_recursive_factorial() {
    let program = vec![
        func(
            "fact",
            &["n"],
            vec![
                Node::if_else(
                    Node::binary(Node::var("n"), BinOp::Le, Node::int(1)),
                    vec![Node::ret(Node::int(1))],
                    None,
                ),
                Node::ret(Node::binary(
                    Node::var("n"),
                    BinOp::Mul,
                    Node::call("fact", vec![Node::binary(Node::var("n"), BinOp::Sub, Node::int(1))]),
                )),
            ],
        ),
        Node::call("fact", vec![Node::int(10)]),
    ];
    let mut interp = interpreter();
    let outcome = interp.run(&Program::new(program)).unwrap();
    assert_eq!(outcome, Outcome::Completed(Some(Value::Integer(3_628_800))));
    assert_eq!(interp.context().recursion_depth("fact"), 0);
}

#[test]
fn test_recursion_guard_stops_unbounded_recursion() {
    let mut interp = interpreter();
    let program = Program::new(vec![
        func("f", &[], vec![Node::ret(Node::call("f", vec![]))]),
        Node::call("f", vec![]),
    ]);
    let err = interp.run(&program).unwrap_err();
    assert_eq!(err.kind, ErrorKind::RecursionLimit);
    assert_eq!(err.trace.len(), InterpreterConfig::DEFAULT_MAX_RECURSION_DEPTH);
    assert_eq!(interp.context().recursion_depth("f"), 0);
    assert_eq!(interp.context().scope_depth(), 1);
}

#[test]
fn test_recursion_cap_is_configurable() {
    let mut interp = Interpreter::with_config(capture().max_recursion_depth(5));
    let program = Program::new(vec![
        func("f", &["n"], vec![Node::ret(Node::call("f", vec![add(Node::var("n"), Node::int(1))]))]),
        Node::call("f", vec![Node::int(0)]),
    ]);
    let err = interp.run(&program).unwrap_err();
    assert_eq!(err.kind, ErrorKind::RecursionLimit);
    assert_eq!(err.trace.first().map(String::as_str), Some("f(0)"));
    assert_eq!(err.trace.last().map(String::as_str), Some("f(4)"));
}

#[test]
fn test_fault_carries_call_trace() {
    let mut interp = interpreter();
    let program = Program::new(vec![
        func("inner", &["x"], vec![Node::ret(add(Node::var("x"), Node::string("s")))]),
        func("outer", &[], vec![Node::ret(Node::call("inner", vec![Node::int(1)]))]),
        Node::call("outer", vec![]),
    ]);
    let err = interp.run(&program).unwrap_err();
    assert_eq!(err.kind, ErrorKind::TypeError);
    assert_eq!(err.trace, vec!["outer()".to_string(), "inner(1)".to_string()]);
}

#[test]
fn test_typed_parameter_and_return_widening() {
    let program = vec![
        typed_func(
            "half",
            vec![Param::typed("x", TypeExpr::named("Float"))],
            "Float",
            vec![Node::ret(Node::binary(Node::var("x"), BinOp::Div, Node::int(2)))],
        ),
        Node::call("half", vec![Node::int(3)]),
    ];
    assert_eq!(value_of(program), Some(Value::Float(1.5)));

    let program = vec![
        typed_func("one", vec![], "Float", vec![Node::ret(Node::int(1))]),
        Node::call("one", vec![]),
    ];
    assert_eq!(value_of(program), Some(Value::Float(1.0)));
}

#[test]
fn test_argument_type_mismatch() {
    let program = vec![
        typed_func("f", vec![Param::typed("x", TypeExpr::named("Integer"))], "Integer", vec![Node::ret(Node::var("x"))]),
        Node::call("f", vec![Node::string("no")]),
    ];
    assert_eq!(fault_of(program.clone()), ErrorKind::TypeError);
    assert_eq!(runtime_fault_of(program), ErrorKind::TypeError);
}

#[test]
fn test_falling_off_a_typed_function() {
    let program = vec![
        typed_func("f", vec![], "Integer", vec![print(Node::int(1))]),
        Node::call("f", vec![]),
    ];
    assert_eq!(fault_of(program), ErrorKind::TypeError);
}

#[test]
fn test_termination_policy() {
    let spin = || func("spin", &["n"], vec![Node::call("spin", vec![Node::var("n")])]);

    let mut interp = Interpreter::with_config(capture().termination_check(TerminationCheck::Deny));
    let err = interp.run(&Program::new(vec![spin()])).unwrap_err();
    assert_eq!(err.kind, ErrorKind::PossibleInfiniteRecursion);

    // warn keeps the declaration
    let mut interp = Interpreter::with_config(capture().termination_check(TerminationCheck::Warn));
    assert!(interp.run(&Program::new(vec![spin()])).is_ok());
}

// ============================================
// Lambdas
// ============================================

#[test]
fn test_lambda_captures_defining_scope() {
    let program = vec![
        Node::var_decl("base", Node::int(10)),
        Node::var_decl("add_base", lambda(&["x"], vec![add(Node::var("x"), Node::var("base"))])),
        Node::call("add_base", vec![Node::int(5)]),
    ];
    assert_eq!(value_of(program), Some(Value::Integer(15)));
}

#[test]
fn test_lambda_outlives_declaring_function() {
    let program = vec![
        func(
            "make",
            &[],
            vec![
                Node::var_decl("n", Node::int(100)),
                Node::ret(lambda(&["x"], vec![add(Node::var("x"), Node::var("n"))])),
            ],
        ),
        Node::var_decl("f", Node::call("make", vec![])),
        Node::call("f", vec![Node::int(1)]),
    ];
    assert_eq!(value_of(program), Some(Value::Integer(101)));
}

#[test]
fn test_apply_immediate_lambda() {
    let program = vec![Node::Apply {
        callee: Box::new(Node::Lambda(LambdaDef {
            params: vec![Param::typed("x", TypeExpr::named("Integer"))],
            body: vec![Node::binary(Node::var("x"), BinOp::Mul, Node::int(2))],
        })),
        args: vec![Node::int(21)],
    }];
    assert_eq!(value_of(program), Some(Value::Integer(42)));
}

#[test]
fn test_return_inside_lambda_faults() {
    let program = vec![
        Node::var_decl("f", lambda(&[], vec![Node::ret(Node::int(1))])),
        Node::call("f", vec![]),
    ];
    assert_eq!(fault_of(program.clone()), ErrorKind::ReturnOutsideFunction);
    assert_eq!(runtime_fault_of(program), ErrorKind::ReturnOutsideFunction);
}

#[test]
fn test_apply_requires_lambda() {
    let program = vec![Node::Apply { callee: Box::new(Node::int(1)), args: vec![] }];
    assert_eq!(fault_of(program), ErrorKind::TypeError);
}

// ============================================
// Exceptions
// ============================================

#[test]
fn test_catch_by_base_type() {
    let program = vec![try_catch(
        vec![Node::var_decl("x", Node::binary(Node::int(1), BinOp::Div, Node::int(0)))],
        vec![catch("ArithmeticError", "e", vec![print(Node::var("e"))])],
        None,
    )];
    assert_eq!(output_of(program), ["DivisionByZeroError: division by zero"]);
}

#[test]
fn test_first_matching_handler_wins() {
    let program = vec![try_catch(
        vec![raise("DivisionByZeroError", "d")],
        vec![
            catch("IndexError", "e", vec![print(Node::string("index"))]),
            catch("Exception", "e", vec![print(Node::string("exception"))]),
            catch("ArithmeticError", "e", vec![print(Node::string("arithmetic"))]),
        ],
        None,
    )];
    assert_eq!(output_of(program), ["exception"]);
}

#[test]
fn test_unmatched_exception_propagates_after_finally() {
    let mut interp = interpreter();
    let program = Program::new(vec![try_catch(
        vec![raise("ValueError", "bad")],
        vec![catch("IndexError", "e", vec![])],
        Some(vec![print(Node::string("finally"))]),
    )]);
    match interp.run(&program).unwrap() {
        Outcome::Uncaught(exc) => assert_eq!(exc.to_string(), "ValueError: bad"),
        other => panic!("expected an uncaught exception, got {other:?}"),
    }
    assert_eq!(interp.output(), ["finally".to_string()]);
}

#[test]
fn test_finally_exception_overrides() {
    let program = vec![try_catch(
        vec![raise("ValueError", "first")],
        vec![],
        Some(vec![raise("IndexError", "second")]),
    )];
    let exc = uncaught_of(program);
    assert_eq!(exc.type_name(), "IndexError");
    assert_eq!(exc.message, "second");
}

#[test]
fn test_finally_return_overrides_try_return() {
    let program = vec![
        func(
            "f",
            &[],
            vec![try_catch(vec![Node::ret(Node::int(1))], vec![], Some(vec![Node::ret(Node::int(2))]))],
        ),
        Node::call("f", vec![]),
    ];
    assert_eq!(value_of(program), Some(Value::Integer(2)));
}

#[test]
fn test_handler_and_finally_order() {
    let program = vec![try_catch(
        vec![print(Node::string("body")), raise("ValueError", "x"), print(Node::string("unreached"))],
        vec![catch(
            "ValueError",
            "e",
            vec![print(add(Node::string("caught "), Node::call("str", vec![Node::var("e")])))],
        )],
        Some(vec![print(Node::string("finally"))]),
    )];
    assert_eq!(output_of(program), ["body", "caught ValueError: x", "finally"]);
}

#[test]
fn test_exception_crosses_function_boundary() {
    let program = vec![
        func("fail", &[], vec![raise("ValueError", "deep")]),
        func("middle", &[], vec![Node::call("fail", vec![]), print(Node::string("unreached"))]),
        try_catch(
            vec![Node::call("middle", vec![])],
            vec![catch("ValueError", "e", vec![print(Node::var("e"))])],
            None,
        ),
    ];
    assert_eq!(output_of(program), ["ValueError: deep"]);
}

#[test]
fn test_catch_binding_is_constant() {
    let program = vec![try_catch(
        vec![raise("ValueError", "x")],
        vec![catch("ValueError", "e", vec![Node::assign("e", Node::construct("ValueError", vec![]))])],
        None,
    )];
    assert_eq!(fault_of(program), ErrorKind::ConstantReassignment);
}

#[test]
fn test_faults_are_not_catchable_and_skip_finally() {
    let mut interp = Interpreter::with_config(capture().type_check(false));
    let program = Program::new(vec![try_catch(
        vec![Node::var("missing")],
        vec![catch("Exception", "e", vec![print(Node::string("caught"))])],
        Some(vec![print(Node::string("finally"))]),
    )]);
    let err = interp.run(&program).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UndefinedVariable);
    assert!(interp.output().is_empty());
    assert_eq!(interp.context().scope_depth(), 1);
}

#[test]
fn test_unknown_handler_type() {
    let program = vec![try_catch(vec![], vec![catch("NoSuchError", "e", vec![])], None)];
    assert_eq!(fault_of(program), ErrorKind::UnknownType);
}

#[test]
fn test_throw_requires_exception_value() {
    assert_eq!(fault_of(vec![Node::throw(Node::int(1))]), ErrorKind::TypeError);
}

#[test]
fn test_embedder_exception_type() {
    let mut registry = TypeRegistry::new();
    registry.register_exception("NetworkError", "Exception").unwrap();
    let mut interp = Interpreter::with_registry(capture(), registry);
    let program = Program::new(vec![try_catch(
        vec![raise("NetworkError", "down")],
        vec![catch("Exception", "e", vec![print(Node::var("e"))])],
        None,
    )]);
    interp.run(&program).unwrap();
    assert_eq!(interp.output(), ["NetworkError: down".to_string()]);
}

// ============================================
// Builtins
// ============================================

#[test]
fn test_stack_builtins() {
    let program = vec![
        Node::var_decl("s", Node::construct("Stack", vec![])),
        Node::assign("s", Node::call("push", vec![Node::var("s"), Node::int(1)])),
        Node::assign("s", Node::call("push", vec![Node::var("s"), Node::int(2)])),
        print(Node::call("peek", vec![Node::var("s")])),
        Node::assign("s", Node::call("pop", vec![Node::var("s")])),
        print(Node::var("s")),
        print(Node::call("len", vec![Node::var("s")])),
    ];
    assert_eq!(output_of(program), ["2", "Stack[1]", "1"]);
}

#[test]
fn test_empty_dequeue_raises_index_error() {
    let program = vec![try_catch(
        vec![
            Node::var_decl("q", Node::construct("Queue", vec![])),
            Node::assign("q", Node::call("dequeue", vec![Node::var("q")])),
        ],
        vec![catch("IndexError", "e", vec![print(Node::var("e"))])],
        None,
    )];
    assert_eq!(output_of(program), ["IndexError: dequeue from empty queue"]);
}

#[test]
fn test_undefined_function() {
    assert_eq!(fault_of(vec![Node::call("nope", vec![])]), ErrorKind::UndefinedFunction);
}

// ============================================
// Static pass agreement
// ============================================

#[test]
fn test_static_type_agrees_with_result() {
    let fact = func(
        "fact",
        &["n"],
        vec![
            Node::if_else(Node::binary(Node::var("n"), BinOp::Le, Node::int(1)), vec![Node::ret(Node::int(1))], None),
            Node::ret(Node::binary(
                Node::var("n"),
                BinOp::Mul,
                Node::call("fact", vec![Node::binary(Node::var("n"), BinOp::Sub, Node::int(1))]),
            )),
        ],
    );
    let pick = Node::FnDecl(FnDecl {
        name: "pick".into(),
        params: vec![Param::typed("b", TypeExpr::named("Boolean"))],
        ret_ty: None,
        body: vec![Node::if_else(
            Node::var("b"),
            vec![Node::ret(Node::int(1))],
            Some(vec![Node::ret(Node::float(2.5))]),
        )],
    });
    let programs = vec![
        vec![Node::binary(Node::int(6), BinOp::Div, Node::int(3))],
        vec![Node::if_else(Node::Bool(true), vec![Node::int(5)], None)],
        vec![Node::if_else(Node::Bool(true), vec![Node::int(5)], Some(vec![Node::string("s")]))],
        vec![try_catch(vec![Node::int(1)], vec![catch("Exception", "e", vec![Node::string("x")])], None)],
        vec![try_catch(
            vec![raise("ValueError", "bad")],
            vec![catch("Exception", "e", vec![Node::string("x")])],
            None,
        )],
        vec![pick, Node::call("pick", vec![Node::Bool(true)])],
        vec![add(Node::string("a"), Node::string("b"))],
        vec![Node::ArrayLit(vec![Node::int(1), Node::float(2.5)])],
        vec![fact, Node::call("fact", vec![Node::int(5)])],
        vec![Node::if_else(
            Node::binary(Node::int(1), BinOp::Lt, Node::int(2)),
            vec![Node::int(1)],
            Some(vec![Node::int(2)]),
        )],
        vec![Node::Convert { value: Box::new(Node::int(3)), target: TypeExpr::named("String") }],
    ];
    for nodes in programs {
        let program = Program::new(nodes);
        let mut interp = interpreter();
        let ty = interp.check(&program).unwrap();
        let Outcome::Completed(Some(value)) = interp.run(&program).unwrap() else {
            panic!("expected a value from {program:?}");
        };
        // Any is the only type allowed to stand in for the runtime one
        assert!(
            ty.is_any() || ty == value.type_descriptor(),
            "static type {ty} disagrees with {}",
            value.type_descriptor()
        );
    }
}

#[test]
fn test_inferred_types_are_precise() {
    let interp = interpreter();
    let program = Program::new(vec![
        func("two", &[], vec![Node::ret(Node::int(2))]),
        Node::binary(Node::call("two", vec![]), BinOp::Div, Node::int(1)),
    ]);
    assert_eq!(interp.check(&program).unwrap(), TypeDescriptor::Float);
}

#[test]
fn test_json_document_runs() {
    let source = r#"{"body":[
        {"VarDecl":{"name":"x","ty":null,"value":{"Int":41},"constant":false}},
        {"Binary":{"left":{"Var":"x"},"op":"Add","right":{"Int":1}}}
    ]}"#;
    let program = Program::from_json(source).unwrap();
    let outcome = interpreter().run(&program).unwrap();
    assert_eq!(outcome, Outcome::Completed(Some(Value::Integer(42))));
}
