//! Parser tests

use super::*;

fn parse(source: &str) -> Vec<Stmt> {
    parse_module(source).expect("Parse should succeed")
}

fn parse_err(source: &str) -> Vec<Diagnostic> {
    parse_module(source).expect_err("Parse should fail")
}

fn expr(source: &str) -> Expr {
    parse_expression(source).expect("Expression should parse")
}

fn int(e: &Expr) -> i64 {
    match e {
        Expr::Literal {
            value: Literal::Int(n),
            ..
        } => *n,
        other => panic!("expected int literal, got {:?}", other),
    }
}

fn name(e: &Expr) -> &str {
    match e {
        Expr::Name { name, .. } => name,
        other => panic!("expected name, got {:?}", other),
    }
}

/* ===================== Statements ===================== */

#[test]
fn test_assignment_chain_and_tuple_targets() {
    let body = parse("a = b = 1\nx, y = 1, 2\n");
    assert_eq!(body.len(), 2);
    match &body[0] {
        Stmt::Assign { targets, value, .. } => {
            assert_eq!(targets.len(), 2);
            assert_eq!(name(&targets[0]), "a");
            assert_eq!(int(value), 1);
        }
        other => panic!("unexpected {:?}", other),
    }
    match &body[1] {
        Stmt::Assign { targets, value, .. } => {
            assert!(matches!(&targets[0], Expr::Tuple { elts, .. } if elts.len() == 2));
            assert!(matches!(value, Expr::Tuple { elts, .. } if elts.len() == 2));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_augmented_assignment() {
    let body = parse("total //= 2\n");
    match &body[0] {
        Stmt::AugAssign { target, op, value, .. } => {
            assert_eq!(name(target), "total");
            assert_eq!(*op, BinaryOp::FloorDiv);
            assert_eq!(int(value), 2);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_semicolons_and_comments() {
    let body = parse("x = 1; y = 2  # trailing comment\n# only a comment\npass\n");
    assert_eq!(body.len(), 3);
    assert!(matches!(body[2], Stmt::Pass { .. }));
    assert_eq!(body[2].span().line(), 3);
}

#[test]
fn test_if_elif_else_nests_in_orelse() {
    let source = r#"
if a:
    x = 1
elif b:
    x = 2
else:
    x = 3
"#;
    let body = parse(source);
    assert_eq!(body.len(), 1);
    let Stmt::If { orelse, span, .. } = &body[0] else {
        panic!("expected if");
    };
    assert_eq!(span.line(), 2);
    let Stmt::If {
        test,
        orelse: inner_else,
        span: elif_span,
        ..
    } = &orelse[0]
    else {
        panic!("expected nested if");
    };
    assert_eq!(name(test), "b");
    assert_eq!(elif_span.line(), 4);
    assert_eq!(inner_else.len(), 1);
}

#[test]
fn test_one_line_suites() {
    let body = parse("if x: y = 1; z = 2\nwhile False: pass\n");
    let Stmt::If { body: then, .. } = &body[0] else {
        panic!("expected if");
    };
    assert_eq!(then.len(), 2);
    assert!(matches!(body[1], Stmt::While { .. }));
}

#[test]
fn test_for_with_tuple_target() {
    let body = parse("for k, v in items:\n    pass\n");
    let Stmt::For { target, iter, .. } = &body[0] else {
        panic!("expected for");
    };
    assert!(matches!(target, Expr::Tuple { elts, .. } if elts.len() == 2));
    assert_eq!(name(iter), "items");
}

#[test]
fn test_try_except_else_finally() {
    let source = r#"
try:
    risky()
except (KeyError, IndexError) as err:
    handle(err)
except ValueError:
    pass
except:
    raise
else:
    ok()
finally:
    cleanup()
"#;
    let body = parse(source);
    let Stmt::Try {
        handlers,
        orelse,
        finalbody,
        ..
    } = &body[0]
    else {
        panic!("expected try");
    };
    assert_eq!(handlers.len(), 3);
    assert_eq!(handlers[0].name.as_deref(), Some("err"));
    assert!(matches!(handlers[0].kind, Some(Expr::Tuple { .. })));
    assert!(handlers[2].kind.is_none());
    assert_eq!(handlers[1].span.line(), 6);
    assert_eq!(orelse.len(), 1);
    assert_eq!(finalbody.len(), 1);
}

#[test]
fn test_bare_except_must_be_last() {
    let diags = parse_err("try:\n    pass\nexcept:\n    pass\nexcept ValueError:\n    pass\n");
    assert!(diags[0].message.contains("must be last"));
}

#[test]
fn test_function_signature() {
    let source = "def f(a, b=2, *rest, key=None, **extra) -> int:\n    global g\n    return a\n";
    let body = parse(source);
    let Stmt::FunctionDef { def, .. } = &body[0] else {
        panic!("expected def");
    };
    assert_eq!(def.name, "f");
    assert_eq!(def.params.len(), 2);
    assert!(def.params[1].default.is_some());
    assert_eq!(def.vararg.as_deref(), Some("rest"));
    assert_eq!(def.kwonly.len(), 1);
    assert_eq!(def.kwonly[0].name, "key");
    assert_eq!(def.kwarg.as_deref(), Some("extra"));
    assert!(def.declares_global("g"));
    let names: Vec<&str> = def.bound_names().collect();
    assert_eq!(names, vec!["a", "b", "rest", "key", "extra"]);
}

#[test]
fn test_class_with_bases() {
    let body = parse("class Child(Base, mixins.Extra):\n    x = 1\n    def m(self):\n        return self.x\n");
    let Stmt::ClassDef { def, .. } = &body[0] else {
        panic!("expected class");
    };
    assert_eq!(def.name, "Child");
    assert_eq!(def.bases.len(), 2);
    assert_eq!(def.body.len(), 2);
}

#[test]
fn test_imports() {
    let body = parse("import math, json as j\nfrom pkg.util import (a, b as c,)\nfrom helpers import *\n");
    let Stmt::Import { names, .. } = &body[0] else {
        panic!("expected import");
    };
    assert_eq!(names[1].name, "json");
    assert_eq!(names[1].asname.as_deref(), Some("j"));
    let Stmt::ImportFrom { module, names, .. } = &body[1] else {
        panic!("expected from-import");
    };
    assert_eq!(module, "pkg.util");
    assert_eq!(names.len(), 2);
    assert!(matches!(&body[2], Stmt::ImportFrom { names, .. } if names.is_empty()));
}

#[test]
fn test_del_and_assert() {
    let body = parse("del d['k'], x\nassert x > 0, 'positive'\n");
    assert!(matches!(&body[0], Stmt::Delete { targets, .. } if targets.len() == 2));
    assert!(matches!(&body[1], Stmt::Assert { msg: Some(_), .. }));
}

/* ===================== Expressions ===================== */

#[test]
fn test_precedence() {
    // 1 + 2 * 3 ** 2 parses as 1 + (2 * (3 ** 2))
    let Expr::Binary { op, right, .. } = expr("1 + 2 * 3 ** 2") else {
        panic!("expected binary");
    };
    assert_eq!(op, BinaryOp::Add);
    let Expr::Binary { op, right, .. } = *right else {
        panic!("expected binary");
    };
    assert_eq!(op, BinaryOp::Mul);
    assert!(matches!(*right, Expr::Binary { op: BinaryOp::Pow, .. }));
}

#[test]
fn test_unary_minus_binds_looser_than_power() {
    let Expr::Unary { op, operand, .. } = expr("-2 ** 2") else {
        panic!("expected unary");
    };
    assert_eq!(op, UnaryOp::Neg);
    assert!(matches!(*operand, Expr::Binary { op: BinaryOp::Pow, .. }));
}

#[test]
fn test_chained_comparison_and_membership() {
    let Expr::Compare { ops, comparators, .. } = expr("a < b <= c") else {
        panic!("expected compare");
    };
    assert_eq!(ops, vec![CmpOp::Lt, CmpOp::LtE]);
    assert_eq!(comparators.len(), 2);

    let Expr::Compare { ops, .. } = expr("x not in xs") else {
        panic!("expected compare");
    };
    assert_eq!(ops, vec![CmpOp::NotIn]);
    let Expr::Compare { ops, .. } = expr("x is not None") else {
        panic!("expected compare");
    };
    assert_eq!(ops, vec![CmpOp::IsNot]);
}

#[test]
fn test_boolean_operators_and_ternary() {
    let Expr::Ternary {
        condition,
        consequent,
        alternate,
        ..
    } = expr("a if not b and c or d else e")
    else {
        panic!("expected ternary");
    };
    assert_eq!(name(&consequent), "a");
    assert_eq!(name(&alternate), "e");
    assert!(matches!(*condition, Expr::Logical { op: LogicalOp::Or, .. }));
}

#[test]
fn test_calls_with_all_argument_kinds() {
    let Expr::Call { func, args, .. } = expr("obj.method(1, *rest, key=2, **opts)") else {
        panic!("expected call");
    };
    assert!(matches!(*func, Expr::Attribute { ref name, .. } if name == "method"));
    assert_eq!(args.len(), 4);
    assert!(matches!(args[1], Argument::Star(_)));
    assert!(matches!(&args[2], Argument::Keyword { name, .. } if name == "key"));
    assert!(matches!(args[3], Argument::DoubleStar(_)));
}

#[test]
fn test_positional_after_keyword_is_rejected() {
    let diags = parse_err("f(a=1, 2)\n");
    assert!(diags[0].message.contains("positional argument follows keyword argument"));
}

#[test]
fn test_slices() {
    let Expr::Subscript { index, .. } = expr("xs[1:-1:2]") else {
        panic!("expected subscript");
    };
    let Expr::Slice {
        lower, upper, step, ..
    } = *index
    else {
        panic!("expected slice");
    };
    assert!(lower.is_some() && upper.is_some() && step.is_some());

    let Expr::Subscript { index, .. } = expr("xs[::]") else {
        panic!("expected subscript");
    };
    assert!(matches!(*index, Expr::Slice { lower: None, upper: None, step: None, .. }));

    let Expr::Subscript { index, .. } = expr("grid[1, 2]") else {
        panic!("expected subscript");
    };
    assert!(matches!(*index, Expr::Tuple { .. }));
}

#[test]
fn test_displays_and_comprehensions() {
    assert!(matches!(expr("()"), Expr::Tuple { elts, .. } if elts.is_empty()));
    assert!(matches!(expr("(1,)"), Expr::Tuple { elts, .. } if elts.len() == 1));
    assert!(matches!(expr("(1)"), Expr::Literal { .. }));
    assert!(matches!(expr("[1, 2,]"), Expr::List { elts, .. } if elts.len() == 2));
    assert!(matches!(expr("{'a': 1, 'b': 2}"), Expr::Dict { items, .. } if items.len() == 2));

    let Expr::ListComp { generators, .. } = expr("[x * y for x in xs if x for y in ys]") else {
        panic!("expected comprehension");
    };
    assert_eq!(generators.len(), 2);
    assert_eq!(generators[0].ifs.len(), 1);

    assert!(matches!(expr("{k: v for k, v in pairs}"), Expr::DictComp { .. }));
    assert!(matches!(expr("sum(x for x in xs)"), Expr::Call { args, .. } if matches!(args[0], Argument::Positional(Expr::ListComp { .. }))));
}

#[test]
fn test_lambda() {
    let Expr::Lambda { def, .. } = expr("lambda a, b=1: a + b") else {
        panic!("expected lambda");
    };
    assert_eq!(def.name, "<lambda>");
    assert_eq!(def.params.len(), 2);
    assert!(matches!(def.body[0], Stmt::Return { value: Some(_), .. }));
}

/* ===================== Literals ===================== */

#[test]
fn test_number_literals() {
    assert_eq!(int(&expr("0x_ff")), 255);
    assert_eq!(int(&expr("0o17")), 15);
    assert_eq!(int(&expr("0b1010")), 10);
    assert_eq!(int(&expr("1_000_000")), 1_000_000);
    assert!(matches!(expr("1.5e3"), Expr::Literal { value: Literal::Float(f), .. } if f == 1500.0));
    assert!(matches!(expr(".5"), Expr::Literal { value: Literal::Float(f), .. } if f == 0.5));
    assert!(matches!(expr("2j"), Expr::Literal { value: Literal::Imaginary(f), .. } if f == 2.0));
}

#[test]
fn test_integer_literal_too_large() {
    let diags = parse_err("x = 99999999999999999999\n");
    assert_eq!(diags.len(), 1);
    assert_eq!((diags[0].line, diags[0].column), (1, 5));
    assert!(diags[0].message.contains("too large"));
}

#[test]
fn test_string_escapes_and_concatenation() {
    let e = expr(r#"'a\tb' "c\x41" r'\n' '\u00e9'"#);
    assert!(matches!(e, Expr::Literal { value: Literal::Str(ref s), .. } if s == "a\tbcA\\n\u{e9}"));
}

#[test]
fn test_triple_quoted_string() {
    let body = parse("s = \"\"\"line one\nline two\"\"\"\nt = 1\n");
    assert_eq!(body.len(), 2);
    assert_eq!(body[1].span().line(), 3);
    let Stmt::Assign { value, .. } = &body[0] else {
        panic!("expected assign");
    };
    assert!(matches!(value, Expr::Literal { value: Literal::Str(s), .. } if s == "line one\nline two"));
}

#[test]
fn test_fstring_parts() {
    let Expr::FString { parts, .. } = expr(r#"f"total: {a + b!r:>8} {{x}}""#) else {
        panic!("expected f-string");
    };
    assert_eq!(parts.len(), 3);
    assert!(matches!(&parts[0], FStringPart::Literal { text } if text == "total: "));
    match &parts[1] {
        FStringPart::Field {
            expr,
            conversion,
            spec,
        } => {
            assert!(matches!(**expr, Expr::Binary { op: BinaryOp::Add, .. }));
            assert_eq!(*conversion, Some('r'));
            assert_eq!(spec.as_deref(), Some(">8"));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(&parts[2], FStringPart::Literal { text } if text == " {x}"));
}

#[test]
fn test_fstring_errors() {
    assert!(parse_err("x = f'{}'\n")[0].message.contains("empty expression"));
    assert!(parse_err("x = f'a }'\n")[0].message.contains("single '}'"));
    assert!(parse_err("x = f'{a'\n")[0].message.contains("expecting '}'"));
}

/* ===================== Diagnostics ===================== */

#[test]
fn test_invalid_assignment_target() {
    let diags = parse_err("f() = 1\n");
    assert_eq!(diags[0].message, "cannot assign to function call");
    assert_eq!(diags[0].rule, "syntax");

    let diags = parse_err("f() += 2\n");
    assert!(diags[0].message.contains("augmented assignment"));
}

#[test]
fn test_multiple_syntax_errors_are_collected() {
    let source = "x = = 1\ny = 2\nz = (3 +\n";
    let diags = parse_err(source);
    assert!(diags.len() >= 2, "got {:?}", diags);
    assert_eq!(diags[0].line, 1);
    assert!(diags.iter().any(|d| d.line == 3));
    assert!(diags.iter().all(|d| d.line != 2));
}

#[test]
fn test_errors_in_separate_statements() {
    let source = "def f(a b):\n    pass\n\nclass\n\nok = 1\n";
    let diags = parse_err(source);
    let lines: Vec<usize> = diags.iter().map(|d| d.line).collect();
    assert!(lines.contains(&1));
    assert!(lines.contains(&4));
}

#[test]
fn test_syntax_error_position() {
    let diags = parse_err("if x\npass\n");
    assert_eq!(diags[0].line, 1);
    assert!(diags[0].message.starts_with("invalid syntax"));
}

#[test]
fn test_indentation_error_reported() {
    let diags = parse_err("x = 1\n    y = 2\n");
    assert_eq!(diags[0].line, 2);
    assert!(diags[0].message.contains("unexpected indent"));
}

#[test]
fn test_expression_parse_errors() {
    assert!(parse_expression("1 +").is_err());
    assert!(parse_expression("x = 1").is_err());
    assert!(matches!(parse_expression("  a, b"), Ok(Expr::Tuple { .. })));
}

#[test]
fn test_spans_use_original_coordinates() {
    let body = parse("def f():\n    if x:\n        return 1\n    return 2\n");
    let Stmt::FunctionDef { def, .. } = &body[0] else {
        panic!("expected def");
    };
    assert_eq!(def.body[1].span().line(), 4);
    assert_eq!(def.body[1].span().column(), 5);
    let Stmt::If { body: inner, .. } = &def.body[0] else {
        panic!("expected if");
    };
    assert_eq!(inner[0].span().line(), 3);
    assert_eq!(inner[0].span().column(), 9);
}

#[test]
fn test_decode_escapes() {
    assert_eq!(decode_escapes(r"\101\x42\N").unwrap(), "AB\\N");
    assert!(decode_escapes(r"\x4").is_err());
}
