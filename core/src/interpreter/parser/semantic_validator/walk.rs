//! AST traversal shared by the validation rules

use crate::interpreter::types::ast::{Argument, Expr, FStringPart, FunctionDef, Stmt};

/// Syntactic context of a statement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Context {
    /// Directly inside a `while`/`for` body of the current function
    pub in_loop: bool,
    /// Inside a `def` or lambda body
    pub in_function: bool,
}

/// Visit every statement in pre-order, with its context
pub fn statements<'a>(body: &'a [Stmt], ctx: Context, f: &mut dyn FnMut(&'a Stmt, Context)) {
    for stmt in body {
        f(stmt, ctx);
        match stmt {
            Stmt::If { body, orelse, .. } => {
                statements(body, ctx, f);
                statements(orelse, ctx, f);
            }
            Stmt::While { body, .. } | Stmt::For { body, .. } => {
                let inner = Context {
                    in_loop: true,
                    ..ctx
                };
                statements(body, inner, f);
            }
            Stmt::Try {
                body,
                handlers,
                orelse,
                finalbody,
                ..
            } => {
                statements(body, ctx, f);
                for handler in handlers {
                    statements(&handler.body, ctx, f);
                }
                statements(orelse, ctx, f);
                statements(finalbody, ctx, f);
            }
            Stmt::FunctionDef { def, .. } => {
                let inner = Context {
                    in_loop: false,
                    in_function: true,
                };
                statements(&def.body, inner, f);
            }
            Stmt::ClassDef { def, .. } => statements(&def.body, Context::default(), f),
            _ => {}
        }
    }
}

/// Every block of statements, including nested ones
pub fn blocks<'a>(body: &'a [Stmt], f: &mut dyn FnMut(&'a [Stmt])) {
    f(body);
    for stmt in body {
        match stmt {
            Stmt::If { body, orelse, .. } => {
                blocks(body, f);
                if !orelse.is_empty() {
                    blocks(orelse, f);
                }
            }
            Stmt::While { body, .. } | Stmt::For { body, .. } => blocks(body, f),
            Stmt::Try {
                body,
                handlers,
                orelse,
                finalbody,
                ..
            } => {
                blocks(body, f);
                for handler in handlers {
                    blocks(&handler.body, f);
                }
                if !orelse.is_empty() {
                    blocks(orelse, f);
                }
                if !finalbody.is_empty() {
                    blocks(finalbody, f);
                }
            }
            Stmt::FunctionDef { def, .. } => blocks(&def.body, f),
            Stmt::ClassDef { def, .. } => blocks(&def.body, f),
            _ => {}
        }
    }
}

/// Expressions owned directly by a statement (not by nested statements)
pub fn stmt_exprs(stmt: &Stmt) -> Vec<&Expr> {
    match stmt {
        Stmt::Expr { expr, .. } => vec![expr],
        Stmt::Assign { targets, value, .. } => targets.iter().chain(std::iter::once(value)).collect(),
        Stmt::AugAssign { target, value, .. } => vec![target, value],
        Stmt::If { test, .. } | Stmt::While { test, .. } => vec![test],
        Stmt::For { target, iter, .. } => vec![target, iter],
        Stmt::Return { value, .. } => value.iter().collect(),
        Stmt::Raise { exc, .. } => exc.iter().collect(),
        Stmt::Delete { targets, .. } => targets.iter().collect(),
        Stmt::Assert { test, msg, .. } => std::iter::once(test).chain(msg.iter()).collect(),
        Stmt::FunctionDef { def, .. } => defaults(def),
        Stmt::ClassDef { def, .. } => def.bases.iter().collect(),
        Stmt::Try { handlers, .. } => handlers.iter().filter_map(|h| h.kind.as_ref()).collect(),
        _ => Vec::new(),
    }
}

fn defaults(def: &FunctionDef) -> Vec<&Expr> {
    def.params
        .iter()
        .chain(def.kwonly.iter())
        .filter_map(|p| p.default.as_ref())
        .collect()
}

/// Direct sub-expressions of an expression
///
/// A lambda's children are its defaults and its body expression.
pub fn expr_children(expr: &Expr) -> Vec<&Expr> {
    match expr {
        Expr::Literal { .. } | Expr::Name { .. } => Vec::new(),
        Expr::FString { parts, .. } => parts
            .iter()
            .filter_map(|p| match p {
                FStringPart::Field { expr, .. } => Some(expr.as_ref()),
                FStringPart::Literal { .. } => None,
            })
            .collect(),
        Expr::List { elts, .. } | Expr::Tuple { elts, .. } => elts.iter().collect(),
        Expr::Dict { items, .. } => items.iter().flat_map(|(k, v)| [k, v]).collect(),
        Expr::ListComp {
            elt, generators, ..
        } => {
            let mut out = vec![elt.as_ref()];
            for g in generators {
                out.push(&g.target);
                out.push(&g.iter);
                out.extend(g.ifs.iter());
            }
            out
        }
        Expr::DictComp {
            key,
            value,
            generators,
            ..
        } => {
            let mut out = vec![key.as_ref(), value.as_ref()];
            for g in generators {
                out.push(&g.target);
                out.push(&g.iter);
                out.extend(g.ifs.iter());
            }
            out
        }
        Expr::Attribute { object, .. } => vec![object.as_ref()],
        Expr::Subscript { object, index, .. } => vec![object.as_ref(), index.as_ref()],
        Expr::Slice {
            lower, upper, step, ..
        } => [lower, upper, step]
            .into_iter()
            .filter_map(|e| e.as_deref())
            .collect(),
        Expr::Call { func, args, .. } => {
            let mut out = vec![func.as_ref()];
            for arg in args {
                out.push(match arg {
                    Argument::Positional(e)
                    | Argument::Star(e)
                    | Argument::DoubleStar(e)
                    | Argument::Keyword { value: e, .. } => e,
                });
            }
            out
        }
        Expr::Unary { operand, .. } => vec![operand.as_ref()],
        Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
            vec![left.as_ref(), right.as_ref()]
        }
        Expr::Compare {
            left, comparators, ..
        } => std::iter::once(left.as_ref()).chain(comparators.iter()).collect(),
        Expr::Ternary {
            condition,
            consequent,
            alternate,
            ..
        } => vec![condition.as_ref(), consequent.as_ref(), alternate.as_ref()],
        Expr::Lambda { def, .. } => {
            let mut out = defaults(def);
            for stmt in &def.body {
                out.extend(stmt_exprs(stmt));
            }
            out
        }
    }
}

/// Visit an expression and all its descendants without recursion
pub fn exprs<'a>(root: &'a Expr, f: &mut dyn FnMut(&'a Expr, usize)) {
    let mut stack = vec![(root, 1usize)];
    while let Some((expr, depth)) = stack.pop() {
        f(expr, depth);
        for child in expr_children(expr) {
            stack.push((child, depth + 1));
        }
    }
}

/// Every function definition in the module, including lambdas
pub fn functions(body: &[Stmt]) -> Vec<&FunctionDef> {
    let mut out = Vec::new();
    statements(body, Context::default(), &mut |stmt, _| {
        if let Stmt::FunctionDef { def, .. } = stmt {
            out.push(def.as_ref());
        }
        for root in stmt_exprs(stmt) {
            exprs(root, &mut |expr, _| {
                if let Expr::Lambda { def, .. } = expr {
                    out.push(def.as_ref());
                }
            });
        }
    });
    out
}
