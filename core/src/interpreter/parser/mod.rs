//! Parser - PEST grammar plus AST builder for ember source
//!
//! Source first goes through the [`layout`] pass, which turns indentation
//! into explicit markers. The grammar runs over that text and the builder
//! maps every position back to the original source.
//!
//! A failed parse is retried one top-level statement at a time so that a
//! single compile reports every broken statement, not just the first.

use pest::error::{ErrorVariant, InputLocation};
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use std::iter::Peekable;
use std::sync::Arc;

use super::types::ast::*;
use crate::error::Diagnostic;

pub mod layout;
pub mod semantic_validator;

#[cfg(test)]
mod tests;

use layout::{Layout, DEDENT, INDENT, JOIN};

/* ===================== PEST Parser ===================== */

#[derive(Parser)]
#[grammar = "interpreter/parser/ember.pest"]
struct EmberParser;

/* ===================== Error Types ===================== */

#[derive(Debug, Clone)]
pub enum ParseError {
    PestError(String, Span),
    BuildError(String, Span),
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::PestError(_, span) | ParseError::BuildError(_, span) => *span,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ParseError::PestError(msg, _) | ParseError::BuildError(msg, _) => msg,
        }
    }

    pub fn into_diagnostic(self) -> Diagnostic {
        let span = self.span();
        Diagnostic::error(span.line(), span.column(), self.message(), "syntax")
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;

/* ===================== Public API ===================== */

/// Parse module source into its top-level statements
///
/// On failure every diagnostic found is returned, ordered by position.
pub fn parse_module(source: &str) -> Result<Vec<Stmt>, Vec<Diagnostic>> {
    let layout = layout::layout(source);
    let builder = Builder::new(source, &layout, None);

    let mut fallback = None;
    if layout.diagnostics.is_empty() {
        match EmberParser::parse(Rule::program, &layout.text) {
            Ok(mut pairs) => {
                let Some(program) = pairs.next() else {
                    return Ok(Vec::new());
                };
                let (body, errors) = builder.build_program(program);
                if errors.is_empty() {
                    return Ok(body);
                }
                return Err(errors.into_iter().map(ParseError::into_diagnostic).collect());
            }
            Err(err) => fallback = Some(builder.syntax_error(err)),
        }
    }

    let mut diagnostics = layout.diagnostics.clone();
    for i in 0..layout.chunk_count() {
        let (first, next) = layout.chunk_lines(i);
        let covered = layout
            .diagnostics
            .iter()
            .any(|d| d.line > first && d.line <= next);
        if covered {
            continue;
        }
        match EmberParser::parse(Rule::program, &layout.chunk_text(i)) {
            Ok(mut pairs) => {
                if let Some(program) = pairs.next() {
                    let (_, errors) = builder.build_program(program);
                    diagnostics.extend(errors.into_iter().map(ParseError::into_diagnostic));
                }
            }
            Err(err) => diagnostics.push(builder.syntax_error(err).into_diagnostic()),
        }
    }

    if diagnostics.is_empty() {
        let err = fallback.unwrap_or_else(|| {
            ParseError::PestError("invalid syntax".to_string(), Span::default())
        });
        diagnostics.push(err.into_diagnostic());
    }
    diagnostics.sort_by_key(|d| (d.line, d.column));
    Err(diagnostics)
}

/// Parse a single expression (a bare tuple is allowed), as `eval` does
pub fn parse_expression(source: &str) -> Result<Expr, Vec<Diagnostic>> {
    parse_expression_text(source, None).map_err(|err| vec![err.into_diagnostic()])
}

fn parse_expression_text(source: &str, fixed: Option<Span>) -> ParseResult<Expr> {
    let source = source.trim_start_matches([' ', '\t']).trim_end();
    let layout = layout::layout(source);
    let builder = Builder::new(source, &layout, fixed);

    if let Some(diag) = layout.diagnostics.first() {
        let span = fixed.unwrap_or_else(|| {
            let line = diag.line.saturating_sub(1);
            let col = diag.column.saturating_sub(1);
            Span::new(0, 0, line, col, line, col)
        });
        return Err(ParseError::PestError(diag.message.clone(), span));
    }

    let mut pairs = EmberParser::parse(Rule::expression_input, &layout.text)
        .map_err(|err| builder.syntax_error(err))?;
    let input = pairs
        .next()
        .ok_or_else(|| ParseError::PestError("expected an expression".into(), builder.origin()))?;
    let testlist = input
        .into_inner()
        .find(|p| p.as_rule() == Rule::testlist)
        .ok_or_else(|| ParseError::PestError("expected an expression".into(), builder.origin()))?;
    builder.build_expr(testlist)
}

/* ===================== Builder ===================== */

type Children<'i> = Peekable<std::vec::IntoIter<Pair<'i, Rule>>>;

/// Inner pairs of `pair` with keyword tokens dropped
fn children(pair: Pair<'_, Rule>) -> Children<'_> {
    pair.into_inner()
        .filter(|p| !is_keyword(p.as_rule()))
        .collect::<Vec<_>>()
        .into_iter()
        .peekable()
}

fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_and
            | Rule::kw_as
            | Rule::kw_assert
            | Rule::kw_break
            | Rule::kw_class
            | Rule::kw_continue
            | Rule::kw_def
            | Rule::kw_del
            | Rule::kw_elif
            | Rule::kw_else
            | Rule::kw_except
            | Rule::kw_finally
            | Rule::kw_for
            | Rule::kw_from
            | Rule::kw_global
            | Rule::kw_if
            | Rule::kw_import
            | Rule::kw_in
            | Rule::kw_lambda
            | Rule::kw_nonlocal
            | Rule::kw_not
            | Rule::kw_or
            | Rule::kw_pass
            | Rule::kw_raise
            | Rule::kw_return
            | Rule::kw_try
            | Rule::kw_while
    )
}

fn is_simple_stmt(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::pass_stmt
            | Rule::break_stmt
            | Rule::continue_stmt
            | Rule::return_stmt
            | Rule::raise_stmt
            | Rule::global_stmt
            | Rule::nonlocal_stmt
            | Rule::import_stmt
            | Rule::from_stmt
            | Rule::del_stmt
            | Rule::assert_stmt
            | Rule::assign_stmt
            | Rule::aug_assign_stmt
            | Rule::expr_stmt
    )
}

/// Turns pest pairs into AST nodes with spans in original coordinates
struct Builder<'s> {
    source: &'s str,
    layout: &'s Layout,
    line_starts: Vec<usize>,
    /// Span stamped on every node (f-string fields use the literal's span)
    fixed: Option<Span>,
}

impl<'s> Builder<'s> {
    fn new(source: &'s str, layout: &'s Layout, fixed: Option<Span>) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            source,
            layout,
            line_starts,
            fixed,
        }
    }

    /* ----- spans ----- */

    fn span(&self, pair: &Pair<'_, Rule>) -> Span {
        let span = pair.as_span();
        self.span_between(span.start(), span.end())
    }

    fn span_between(&self, start: usize, end: usize) -> Span {
        if let Some(fixed) = self.fixed {
            return fixed;
        }
        let start = self.layout.original_offset(start);
        let end = self.layout.original_offset(end).max(start);
        let (start_line, start_col) = self.line_col(start);
        let (end_line, end_col) = self.line_col(end);
        Span::new(start, end, start_line, start_col, end_line, end_col)
    }

    fn origin(&self) -> Span {
        self.fixed.unwrap_or_default()
    }

    /// Convert a byte offset in the original source to (line, column), 0-indexed
    fn line_col(&self, offset: usize) -> (usize, usize) {
        let mut offset = offset.min(self.source.len());
        while !self.source.is_char_boundary(offset) {
            offset -= 1;
        }
        let line = self
            .line_starts
            .partition_point(|&s| s <= offset)
            .saturating_sub(1);
        let col = self.source[self.line_starts[line]..offset].chars().count();
        (line, col)
    }

    /// Span from the first inner token of a clause (skips leading newlines)
    fn clause_span(&self, pair: &Pair<'_, Rule>) -> Span {
        let end = pair.as_span().end();
        match pair.clone().into_inner().next() {
            Some(first) => self.span_between(first.as_span().start(), end),
            None => self.span(pair),
        }
    }

    fn syntax_error(&self, err: pest::error::Error<Rule>) -> ParseError {
        let text = &self.layout.text;
        let mut pos = match err.location {
            InputLocation::Pos(p) => p,
            InputLocation::Span((start, _)) => start,
        };
        pos = pos.min(text.len());
        while let Some(c) = text[pos..].chars().next() {
            if matches!(c, ' ' | '\t' | '\u{0C}' | JOIN) {
                pos += c.len_utf8();
            } else {
                break;
            }
        }

        let found = match text[pos..].chars().next() {
            None => "end of input".to_string(),
            Some('\n') | Some('\r') => "end of line".to_string(),
            Some(INDENT) => "indented block".to_string(),
            Some(DEDENT) => "unindent".to_string(),
            Some(_) => {
                let token: String = text[pos..]
                    .chars()
                    .take_while(|c| !c.is_whitespace() && !matches!(*c, INDENT | DEDENT | JOIN))
                    .take(20)
                    .collect();
                format!("'{}'", token)
            }
        };

        let mut message = format!("invalid syntax: unexpected {}", found);
        if let ErrorVariant::ParsingError { positives, .. } = &err.variant {
            let mut labels: Vec<&str> = Vec::new();
            for rule in positives {
                let label = rule_label(*rule);
                if !labels.contains(&label) {
                    labels.push(label);
                }
            }
            if !labels.is_empty() && labels.len() <= 3 {
                message.push_str(&format!(", expected {}", labels.join(" or ")));
            }
        } else if let ErrorVariant::CustomError { message: custom } = &err.variant {
            message = custom.clone();
        }

        ParseError::PestError(message, self.span_between(pos, pos))
    }

    fn required<'i>(&self, c: &mut Children<'i>, what: &str, span: Span) -> ParseResult<Pair<'i, Rule>> {
        c.next()
            .ok_or_else(|| ParseError::BuildError(format!("expected {}", what), span))
    }

    fn unexpected(&self, pair: &Pair<'_, Rule>) -> ParseError {
        ParseError::BuildError(
            format!("unexpected {:?} in this position", pair.as_rule()),
            self.span(pair),
        )
    }

    /* ----- statements ----- */

    fn build_program(&self, program: Pair<'_, Rule>) -> (Vec<Stmt>, Vec<ParseError>) {
        let mut body = Vec::new();
        let mut errors = Vec::new();
        for pair in program.into_inner() {
            if pair.as_rule() == Rule::EOI {
                continue;
            }
            match self.build_statement(pair) {
                Ok(stmt) => body.push(stmt),
                Err(err) => errors.push(err),
            }
        }
        (body, errors)
    }

    fn build_block(&self, block: Pair<'_, Rule>) -> ParseResult<Vec<Stmt>> {
        block
            .into_inner()
            .map(|pair| self.build_statement(pair))
            .collect()
    }

    /// Body after a `:`; either an indented block or simple statements on the same line
    fn build_suite(&self, c: &mut Children<'_>) -> ParseResult<Vec<Stmt>> {
        if let Some(block) = c.next_if(|p| p.as_rule() == Rule::block) {
            return self.build_block(block);
        }
        let mut body = Vec::new();
        while let Some(pair) = c.next_if(|p| is_simple_stmt(p.as_rule())) {
            body.push(self.build_statement(pair)?);
        }
        Ok(body)
    }

    fn build_statement(&self, pair: Pair<'_, Rule>) -> ParseResult<Stmt> {
        let span = self.span(&pair);
        match pair.as_rule() {
            Rule::pass_stmt => Ok(Stmt::Pass { span }),
            Rule::break_stmt => Ok(Stmt::Break { span }),
            Rule::continue_stmt => Ok(Stmt::Continue { span }),
            Rule::return_stmt => {
                let value = children(pair)
                    .next()
                    .map(|p| self.build_expr(p))
                    .transpose()?;
                Ok(Stmt::Return { value, span })
            }
            Rule::raise_stmt => {
                let exc = children(pair)
                    .next()
                    .map(|p| self.build_expr(p))
                    .transpose()?;
                Ok(Stmt::Raise { exc, span })
            }
            Rule::global_stmt => Ok(Stmt::Global {
                names: children(pair).map(|p| p.as_str().to_string()).collect(),
                span,
            }),
            Rule::nonlocal_stmt => Ok(Stmt::Nonlocal {
                names: children(pair).map(|p| p.as_str().to_string()).collect(),
                span,
            }),
            Rule::del_stmt => {
                let mut c = children(pair);
                let list = self.required(&mut c, "a target", span)?;
                let (targets, _) = self.build_target_items(list)?;
                for target in &targets {
                    self.check_target(target, "delete")?;
                }
                Ok(Stmt::Delete { targets, span })
            }
            Rule::assert_stmt => {
                let mut c = children(pair);
                let test = self.build_expr(self.required(&mut c, "an expression", span)?)?;
                let msg = c.next().map(|p| self.build_expr(p)).transpose()?;
                Ok(Stmt::Assert { test, msg, span })
            }
            Rule::import_stmt => {
                let names = children(pair)
                    .map(|p| self.build_alias(p))
                    .collect::<ParseResult<Vec<_>>>()?;
                Ok(Stmt::Import { names, span })
            }
            Rule::from_stmt => {
                let mut c = children(pair);
                let module = self.required(&mut c, "a module name", span)?.as_str().to_string();
                let mut names = Vec::new();
                for item in c {
                    match item.as_rule() {
                        Rule::import_star => {}
                        Rule::import_as_name => names.push(self.build_alias(item)?),
                        _ => return Err(self.unexpected(&item)),
                    }
                }
                Ok(Stmt::ImportFrom {
                    module,
                    names,
                    span,
                })
            }
            Rule::assign_stmt => {
                let mut exprs = children(pair)
                    .map(|p| self.build_expr(p))
                    .collect::<ParseResult<Vec<_>>>()?;
                let value = exprs
                    .pop()
                    .ok_or_else(|| ParseError::BuildError("expected a value".into(), span))?;
                for target in &exprs {
                    self.check_target(target, "assign to")?;
                }
                Ok(Stmt::Assign {
                    targets: exprs,
                    value,
                    span,
                })
            }
            Rule::aug_assign_stmt => {
                let mut c = children(pair);
                let target = self.build_expr(self.required(&mut c, "a target", span)?)?;
                if !matches!(
                    target,
                    Expr::Name { .. } | Expr::Attribute { .. } | Expr::Subscript { .. }
                ) {
                    return Err(ParseError::BuildError(
                        format!(
                            "'{}' is an illegal expression for augmented assignment",
                            target.describe()
                        ),
                        target.span(),
                    ));
                }
                let op_pair = self.required(&mut c, "an operator", span)?;
                let symbol = op_pair.as_str().trim_end_matches('=');
                let op = BinaryOp::from_symbol(symbol)
                    .ok_or_else(|| self.unexpected(&op_pair))?;
                let value = self.build_expr(self.required(&mut c, "a value", span)?)?;
                Ok(Stmt::AugAssign {
                    target,
                    op,
                    value,
                    span,
                })
            }
            Rule::expr_stmt => {
                let mut c = children(pair);
                let expr = self.build_expr(self.required(&mut c, "an expression", span)?)?;
                Ok(Stmt::Expr { expr, span })
            }
            Rule::if_stmt => self.build_if(pair),
            Rule::while_stmt => {
                let mut c = children(pair);
                let test = self.build_expr(self.required(&mut c, "a condition", span)?)?;
                let body = self.build_suite(&mut c)?;
                Ok(Stmt::While { test, body, span })
            }
            Rule::for_stmt => {
                let mut c = children(pair);
                let target = self.build_target(self.required(&mut c, "a target", span)?)?;
                let iter = self.build_expr(self.required(&mut c, "an iterable", span)?)?;
                let body = self.build_suite(&mut c)?;
                Ok(Stmt::For {
                    target,
                    iter,
                    body,
                    span,
                })
            }
            Rule::try_stmt => self.build_try(pair),
            Rule::funcdef => self.build_funcdef(pair),
            Rule::classdef => self.build_classdef(pair),
            _ => Err(self.unexpected(&pair)),
        }
    }

    fn build_alias(&self, pair: Pair<'_, Rule>) -> ParseResult<Alias> {
        let span = self.span(&pair);
        let mut c = children(pair);
        let name = self.required(&mut c, "a name", span)?.as_str().to_string();
        let asname = c.next().map(|p| p.as_str().to_string());
        Ok(Alias { name, asname, span })
    }

    fn build_if(&self, pair: Pair<'_, Rule>) -> ParseResult<Stmt> {
        let span = self.span(&pair);
        let mut c = children(pair);
        let test = self.build_expr(self.required(&mut c, "a condition", span)?)?;
        let body = self.build_suite(&mut c)?;

        let mut elifs = Vec::new();
        let mut orelse = Vec::new();
        for clause in c {
            match clause.as_rule() {
                Rule::elif_clause => {
                    let clause_span = self.clause_span(&clause);
                    let mut cc = children(clause);
                    let test = self.build_expr(self.required(&mut cc, "a condition", clause_span)?)?;
                    let body = self.build_suite(&mut cc)?;
                    elifs.push((test, body, clause_span));
                }
                Rule::else_clause => orelse = self.build_suite(&mut children(clause))?,
                _ => return Err(self.unexpected(&clause)),
            }
        }

        for (test, body, span) in elifs.into_iter().rev() {
            orelse = vec![Stmt::If {
                test,
                body,
                orelse,
                span,
            }];
        }
        Ok(Stmt::If {
            test,
            body,
            orelse,
            span,
        })
    }

    fn build_try(&self, pair: Pair<'_, Rule>) -> ParseResult<Stmt> {
        let span = self.span(&pair);
        let mut c = children(pair);
        let body = self.build_suite(&mut c)?;
        let mut handlers = Vec::new();
        let mut orelse = Vec::new();
        let mut finalbody = Vec::new();

        for clause in c {
            match clause.as_rule() {
                Rule::except_clause => {
                    let handler_span = self.clause_span(&clause);
                    let mut cc = children(clause);
                    let kind = cc
                        .next_if(|p| p.as_rule() == Rule::test)
                        .map(|p| self.build_expr(p))
                        .transpose()?;
                    let name = cc
                        .next_if(|p| p.as_rule() == Rule::ident)
                        .map(|p| p.as_str().to_string());
                    let body = self.build_suite(&mut cc)?;
                    handlers.push(ExceptHandler {
                        kind,
                        name,
                        body,
                        span: handler_span,
                    });
                }
                Rule::else_clause => orelse = self.build_suite(&mut children(clause))?,
                Rule::finally_clause => finalbody = self.build_suite(&mut children(clause))?,
                _ => return Err(self.unexpected(&clause)),
            }
        }

        if let Some(pos) = handlers.iter().position(|h| h.kind.is_none()) {
            if pos + 1 < handlers.len() {
                return Err(ParseError::BuildError(
                    "default 'except:' must be last".into(),
                    handlers[pos].span,
                ));
            }
        }

        Ok(Stmt::Try {
            body,
            handlers,
            orelse,
            finalbody,
            span,
        })
    }

    fn build_funcdef(&self, pair: Pair<'_, Rule>) -> ParseResult<Stmt> {
        let span = self.span(&pair);
        let mut c = children(pair);
        let name = self.required(&mut c, "a function name", span)?.as_str().to_string();
        let mut def = empty_function(name, span);
        if let Some(params) = c.next_if(|p| p.as_rule() == Rule::param_list) {
            self.build_params(params, &mut def)?;
        }
        // return annotation
        c.next_if(|p| p.as_rule() == Rule::test);
        def.body = self.build_suite(&mut c)?;
        collect_declarations(&def.body, &mut def.globals, &mut def.nonlocals);
        Ok(Stmt::FunctionDef {
            def: Arc::new(def),
            span,
        })
    }

    fn build_params(&self, list: Pair<'_, Rule>, def: &mut FunctionDef) -> ParseResult<()> {
        for item in list.into_inner() {
            let item_span = self.span(&item);
            if def.kwarg.is_some() {
                return Err(ParseError::BuildError(
                    "arguments cannot follow var-keyword argument".into(),
                    item_span,
                ));
            }
            match item.as_rule() {
                Rule::param | Rule::lambda_param => {
                    let mut c = children(item);
                    let name = self.required(&mut c, "a parameter name", item_span)?.as_str().to_string();
                    let mut default = None;
                    for rest in c {
                        if rest.as_rule() == Rule::param_default {
                            let mut dc = children(rest);
                            default = Some(self.build_expr(self.required(&mut dc, "a default value", item_span)?)?);
                        }
                    }
                    let param = Param {
                        name,
                        default,
                        span: item_span,
                    };
                    if def.vararg.is_some() {
                        def.kwonly.push(param);
                    } else {
                        def.params.push(param);
                    }
                }
                Rule::varargs_param => {
                    if def.vararg.is_some() {
                        return Err(ParseError::BuildError(
                            "* argument may appear only once".into(),
                            item_span,
                        ));
                    }
                    def.vararg = Some(self.param_name(item, item_span)?);
                }
                Rule::kwargs_param => def.kwarg = Some(self.param_name(item, item_span)?),
                _ => return Err(self.unexpected(&item)),
            }
        }
        Ok(())
    }

    fn param_name(&self, pair: Pair<'_, Rule>, span: Span) -> ParseResult<String> {
        let mut c = children(pair);
        Ok(self.required(&mut c, "a parameter name", span)?.as_str().to_string())
    }

    fn build_classdef(&self, pair: Pair<'_, Rule>) -> ParseResult<Stmt> {
        let span = self.span(&pair);
        let mut c = children(pair);
        let name = self.required(&mut c, "a class name", span)?.as_str().to_string();
        let mut bases = Vec::new();
        while let Some(arg) = c.next_if(|p| {
            matches!(
                p.as_rule(),
                Rule::pos_arg | Rule::kw_arg | Rule::star_arg | Rule::dstar_arg
            )
        }) {
            let arg_span = self.span(&arg);
            if arg.as_rule() != Rule::pos_arg {
                return Err(ParseError::BuildError(
                    "class bases must be plain expressions".into(),
                    arg_span,
                ));
            }
            let mut ac = children(arg);
            bases.push(self.build_expr(self.required(&mut ac, "a base class", arg_span)?)?);
        }
        let body = self.build_suite(&mut c)?;
        Ok(Stmt::ClassDef {
            def: Arc::new(ClassDef {
                name,
                bases,
                body,
                span,
            }),
            span,
        })
    }

    /* ----- targets ----- */

    /// Items of a `target_list`, and whether it was written as a tuple
    fn build_target_items(&self, list: Pair<'_, Rule>) -> ParseResult<(Vec<Expr>, bool)> {
        let mut items = Vec::new();
        let mut trailing = false;
        for pair in list.into_inner() {
            if pair.as_rule() == Rule::trailing_comma {
                trailing = true;
            } else {
                items.push(self.build_expr(pair)?);
            }
        }
        let tuple = trailing || items.len() > 1;
        Ok((items, tuple))
    }

    /// A `for` target: a single expression or an implicit tuple
    fn build_target(&self, list: Pair<'_, Rule>) -> ParseResult<Expr> {
        let span = self.span(&list);
        let (mut items, tuple) = self.build_target_items(list)?;
        let target = if tuple || items.len() != 1 {
            Expr::Tuple { elts: items, span }
        } else {
            items.remove(0)
        };
        self.check_target(&target, "assign to")?;
        Ok(target)
    }

    fn check_target(&self, target: &Expr, verb: &str) -> ParseResult<()> {
        match target {
            Expr::Name { .. } | Expr::Attribute { .. } | Expr::Subscript { .. } => Ok(()),
            Expr::Tuple { elts, .. } | Expr::List { elts, .. } => {
                elts.iter().try_for_each(|e| self.check_target(e, verb))
            }
            other => Err(ParseError::BuildError(
                format!("cannot {} {}", verb, other.describe()),
                other.span(),
            )),
        }
    }

    /* ----- expressions ----- */

    fn build_expr(&self, pair: Pair<'_, Rule>) -> ParseResult<Expr> {
        match pair.as_rule() {
            Rule::testlist => self.build_testlist(pair),
            Rule::test => self.build_test(pair),
            Rule::lambdef => self.build_lambda(pair),
            Rule::or_test | Rule::and_test => self.build_logical(pair),
            Rule::not_test => self.build_not(pair),
            Rule::comparison => self.build_comparison(pair),
            Rule::bitor | Rule::bitxor | Rule::bitand => self.build_bitwise(pair),
            Rule::shift | Rule::arith | Rule::term => self.build_binary_chain(pair),
            Rule::factor => self.build_factor(pair),
            Rule::power => self.build_power(pair),
            Rule::atom_expr => self.build_atom_expr(pair),
            Rule::slice_upper => {
                let span = self.span(&pair);
                let mut c = children(pair);
                self.build_expr(self.required(&mut c, "an expression", span)?)
            }
            _ => self.build_atom(pair),
        }
    }

    fn build_testlist(&self, pair: Pair<'_, Rule>) -> ParseResult<Expr> {
        let span = self.span(&pair);
        let mut items = Vec::new();
        let mut trailing = false;
        for p in pair.into_inner() {
            if p.as_rule() == Rule::trailing_comma {
                trailing = true;
            } else {
                items.push(self.build_expr(p)?);
            }
        }
        if items.len() == 1 && !trailing {
            Ok(items.remove(0))
        } else {
            Ok(Expr::Tuple { elts: items, span })
        }
    }

    fn build_test(&self, pair: Pair<'_, Rule>) -> ParseResult<Expr> {
        let span = self.span(&pair);
        let mut c = children(pair);
        let first = self.build_expr(self.required(&mut c, "an expression", span)?)?;
        let Some(condition) = c.next() else {
            return Ok(first);
        };
        let condition = self.build_expr(condition)?;
        let alternate = self.build_expr(self.required(&mut c, "an 'else' branch", span)?)?;
        Ok(Expr::Ternary {
            condition: Box::new(condition),
            consequent: Box::new(first),
            alternate: Box::new(alternate),
            span,
        })
    }

    fn build_lambda(&self, pair: Pair<'_, Rule>) -> ParseResult<Expr> {
        let span = self.span(&pair);
        let mut c = children(pair);
        let mut def = empty_function("<lambda>".to_string(), span);
        if let Some(params) = c.next_if(|p| p.as_rule() == Rule::lambda_params) {
            self.build_params(params, &mut def)?;
        }
        let body = self.build_expr(self.required(&mut c, "a lambda body", span)?)?;
        let body_span = body.span();
        def.body = vec![Stmt::Return {
            value: Some(body),
            span: body_span,
        }];
        Ok(Expr::Lambda {
            def: Arc::new(def),
            span,
        })
    }

    fn build_logical(&self, pair: Pair<'_, Rule>) -> ParseResult<Expr> {
        let op = if pair.as_rule() == Rule::or_test {
            LogicalOp::Or
        } else {
            LogicalOp::And
        };
        let span = self.span(&pair);
        let mut c = children(pair);
        let mut left = self.build_expr(self.required(&mut c, "an operand", span)?)?;
        for operand in c {
            let right = self.build_expr(operand)?;
            let span = left.span().merge(&right.span());
            left = Expr::Logical {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }
        Ok(left)
    }

    fn build_not(&self, pair: Pair<'_, Rule>) -> ParseResult<Expr> {
        let span = self.span(&pair);
        let mut inner = pair.into_inner();
        let first = inner
            .next()
            .ok_or_else(|| ParseError::BuildError("expected an operand".into(), span))?;
        if first.as_rule() != Rule::kw_not {
            return self.build_expr(first);
        }
        let operand = inner
            .next()
            .ok_or_else(|| ParseError::BuildError("expected an operand".into(), span))?;
        Ok(Expr::Unary {
            op: UnaryOp::Not,
            operand: Box::new(self.build_expr(operand)?),
            span,
        })
    }

    fn build_comparison(&self, pair: Pair<'_, Rule>) -> ParseResult<Expr> {
        let span = self.span(&pair);
        let mut c = children(pair);
        let left = self.build_expr(self.required(&mut c, "an operand", span)?)?;
        let mut ops = Vec::new();
        let mut comparators = Vec::new();
        while let Some(op) = c.next() {
            let words: Vec<&str> = op
                .as_str()
                .split(|ch: char| ch.is_whitespace() || ch == JOIN)
                .filter(|w| !w.is_empty())
                .collect();
            let op = match words.join(" ").as_str() {
                "==" => CmpOp::Eq,
                "!=" => CmpOp::NotEq,
                "<" => CmpOp::Lt,
                "<=" => CmpOp::LtE,
                ">" => CmpOp::Gt,
                ">=" => CmpOp::GtE,
                "in" => CmpOp::In,
                "not in" => CmpOp::NotIn,
                "is" => CmpOp::Is,
                "is not" => CmpOp::IsNot,
                _ => return Err(self.unexpected(&op)),
            };
            ops.push(op);
            comparators.push(self.build_expr(self.required(&mut c, "an operand", span)?)?);
        }
        if ops.is_empty() {
            return Ok(left);
        }
        Ok(Expr::Compare {
            left: Box::new(left),
            ops,
            comparators,
            span,
        })
    }

    fn build_bitwise(&self, pair: Pair<'_, Rule>) -> ParseResult<Expr> {
        let op = match pair.as_rule() {
            Rule::bitor => BinaryOp::BitOr,
            Rule::bitxor => BinaryOp::BitXor,
            _ => BinaryOp::BitAnd,
        };
        let span = self.span(&pair);
        let mut c = children(pair);
        let mut left = self.build_expr(self.required(&mut c, "an operand", span)?)?;
        for operand in c {
            let right = self.build_expr(operand)?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    /// `shift`, `arith` and `term`: operands separated by operator tokens
    fn build_binary_chain(&self, pair: Pair<'_, Rule>) -> ParseResult<Expr> {
        let span = self.span(&pair);
        let mut c = children(pair);
        let mut left = self.build_expr(self.required(&mut c, "an operand", span)?)?;
        while let Some(op_pair) = c.next() {
            let op = BinaryOp::from_symbol(op_pair.as_str()).ok_or_else(|| self.unexpected(&op_pair))?;
            let right = self.build_expr(self.required(&mut c, "an operand", span)?)?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn build_factor(&self, pair: Pair<'_, Rule>) -> ParseResult<Expr> {
        let span = self.span(&pair);
        let mut c = children(pair);
        let first = self.required(&mut c, "an operand", span)?;
        if first.as_rule() != Rule::unary_op {
            return self.build_expr(first);
        }
        let op = match first.as_str() {
            "-" => UnaryOp::Neg,
            "+" => UnaryOp::Pos,
            _ => UnaryOp::Invert,
        };
        let operand = self.build_expr(self.required(&mut c, "an operand", span)?)?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
            span,
        })
    }

    fn build_power(&self, pair: Pair<'_, Rule>) -> ParseResult<Expr> {
        let span = self.span(&pair);
        let mut c = children(pair);
        let base = self.build_expr(self.required(&mut c, "an operand", span)?)?;
        match c.next() {
            Some(exponent) => Ok(binary(BinaryOp::Pow, base, self.build_expr(exponent)?)),
            None => Ok(base),
        }
    }

    fn build_atom_expr(&self, pair: Pair<'_, Rule>) -> ParseResult<Expr> {
        let span = self.span(&pair);
        let mut c = children(pair);
        let mut expr = self.build_expr(self.required(&mut c, "an expression", span)?)?;
        for trailer in c {
            let span = expr.span().merge(&self.span(&trailer));
            expr = match trailer.as_rule() {
                Rule::call => Expr::Call {
                    func: Box::new(expr),
                    args: self.build_arguments(trailer)?,
                    span,
                },
                Rule::subscription => Expr::Subscript {
                    object: Box::new(expr),
                    index: Box::new(self.build_subscription(trailer)?),
                    span,
                },
                Rule::attribute => {
                    let mut ac = children(trailer);
                    let name = self.required(&mut ac, "an attribute name", span)?.as_str().to_string();
                    Expr::Attribute {
                        object: Box::new(expr),
                        name,
                        span,
                    }
                }
                _ => return Err(self.unexpected(&trailer)),
            };
        }
        Ok(expr)
    }

    fn build_arguments(&self, call: Pair<'_, Rule>) -> ParseResult<Vec<Argument>> {
        let mut args = Vec::new();
        let mut seen_keyword = false;
        for arg in call.into_inner() {
            let span = self.span(&arg);
            match arg.as_rule() {
                Rule::pos_arg => {
                    if seen_keyword {
                        return Err(ParseError::BuildError(
                            "positional argument follows keyword argument".into(),
                            span,
                        ));
                    }
                    let mut c = children(arg);
                    let value = self.build_expr(self.required(&mut c, "an argument", span)?)?;
                    let value = match c.next() {
                        Some(comp) => {
                            let mut generators = Vec::new();
                            self.build_generators(comp, &mut generators)?;
                            Expr::ListComp {
                                elt: Box::new(value),
                                generators,
                                span,
                            }
                        }
                        None => value,
                    };
                    args.push(Argument::Positional(value));
                }
                Rule::kw_arg => {
                    seen_keyword = true;
                    let mut c = children(arg);
                    let name = self.required(&mut c, "a keyword", span)?.as_str().to_string();
                    let value = self.build_expr(self.required(&mut c, "a value", span)?)?;
                    args.push(Argument::Keyword { name, value });
                }
                Rule::star_arg => {
                    let mut c = children(arg);
                    args.push(Argument::Star(
                        self.build_expr(self.required(&mut c, "an iterable", span)?)?,
                    ));
                }
                Rule::dstar_arg => {
                    seen_keyword = true;
                    let mut c = children(arg);
                    args.push(Argument::DoubleStar(
                        self.build_expr(self.required(&mut c, "a mapping", span)?)?,
                    ));
                }
                _ => return Err(self.unexpected(&arg)),
            }
        }
        Ok(args)
    }

    fn build_subscription(&self, pair: Pair<'_, Rule>) -> ParseResult<Expr> {
        let span = self.span(&pair);
        let mut items = Vec::new();
        let mut trailing = false;
        for sub in pair.into_inner() {
            if sub.as_rule() == Rule::trailing_comma {
                trailing = true;
            } else {
                items.push(self.build_subscript(sub)?);
            }
        }
        if items.len() == 1 && !trailing {
            Ok(items.remove(0))
        } else {
            Ok(Expr::Tuple { elts: items, span })
        }
    }

    fn build_subscript(&self, pair: Pair<'_, Rule>) -> ParseResult<Expr> {
        let span = self.span(&pair);
        let mut c = children(pair);
        let lower = c
            .next_if(|p| p.as_rule() == Rule::test)
            .map(|p| self.build_expr(p))
            .transpose()?;
        let Some(tail) = c.next() else {
            return lower.ok_or_else(|| ParseError::BuildError("expected an index".into(), span));
        };

        let mut upper = None;
        let mut step = None;
        for part in tail.into_inner() {
            match part.as_rule() {
                Rule::slice_upper => upper = Some(Box::new(self.build_expr(part)?)),
                Rule::slice_step => {
                    if let Some(value) = part.into_inner().next() {
                        step = Some(Box::new(self.build_expr(value)?));
                    }
                }
                _ => return Err(self.unexpected(&part)),
            }
        }
        Ok(Expr::Slice {
            lower: lower.map(Box::new),
            upper,
            step,
            span,
        })
    }

    fn build_generators(&self, comp_for: Pair<'_, Rule>, out: &mut Vec<Comprehension>) -> ParseResult<()> {
        let span = self.span(&comp_for);
        let mut c = children(comp_for);
        let target = self.build_target(self.required(&mut c, "a target", span)?)?;
        let iter = self.build_expr(self.required(&mut c, "an iterable", span)?)?;
        let mut ifs = Vec::new();
        let mut nested = None;
        for part in c {
            match part.as_rule() {
                Rule::comp_if => {
                    let mut ic = children(part);
                    ifs.push(self.build_expr(self.required(&mut ic, "a condition", span)?)?);
                }
                Rule::comp_for => nested = Some(part),
                _ => return Err(self.unexpected(&part)),
            }
        }
        out.push(Comprehension { target, iter, ifs });
        if let Some(nested) = nested {
            self.build_generators(nested, out)?;
        }
        Ok(())
    }

    fn build_atom(&self, pair: Pair<'_, Rule>) -> ParseResult<Expr> {
        let span = self.span(&pair);
        match pair.as_rule() {
            Rule::ident => Ok(Expr::Name {
                name: pair.as_str().to_string(),
                span,
            }),
            Rule::kw_none => Ok(literal(Literal::None, span)),
            Rule::kw_true => Ok(literal(Literal::Bool(true), span)),
            Rule::kw_false => Ok(literal(Literal::Bool(false), span)),
            Rule::int_number => {
                let value = parse_int(pair.as_str()).ok_or_else(|| {
                    ParseError::BuildError("integer literal is too large".into(), span)
                })?;
                Ok(literal(Literal::Int(value), span))
            }
            Rule::float_number => {
                let value = parse_float(pair.as_str()).ok_or_else(|| self.unexpected(&pair))?;
                Ok(literal(Literal::Float(value), span))
            }
            Rule::imag_number => {
                let digits = pair.as_str().trim_end_matches(['j', 'J']);
                let value = parse_float(digits).ok_or_else(|| self.unexpected(&pair))?;
                Ok(literal(Literal::Imaginary(value), span))
            }
            Rule::strings => self.build_strings(pair),
            Rule::paren => self.build_paren(pair),
            Rule::list_display => {
                let (items, comp) = self.build_display_items(pair)?;
                Ok(match comp {
                    Some(generators) => Expr::ListComp {
                        elt: Box::new(single(items, span)?),
                        generators,
                        span,
                    },
                    None => Expr::List { elts: items, span },
                })
            }
            Rule::dict_display => self.build_dict(pair),
            _ => Err(self.unexpected(&pair)),
        }
    }

    /// Elements of a paren or list display plus a comprehension, if any
    fn build_display_items(
        &self,
        pair: Pair<'_, Rule>,
    ) -> ParseResult<(Vec<Expr>, Option<Vec<Comprehension>>)> {
        let mut items = Vec::new();
        let mut comp = None;
        for p in pair.into_inner() {
            match p.as_rule() {
                Rule::trailing_comma => {}
                Rule::comp_for => {
                    let mut generators = Vec::new();
                    self.build_generators(p, &mut generators)?;
                    comp = Some(generators);
                }
                _ => items.push(self.build_expr(p)?),
            }
        }
        Ok((items, comp))
    }

    fn build_paren(&self, pair: Pair<'_, Rule>) -> ParseResult<Expr> {
        let span = self.span(&pair);
        let tuple = pair
            .clone()
            .into_inner()
            .any(|p| p.as_rule() == Rule::trailing_comma);
        let (mut items, comp) = self.build_display_items(pair)?;
        if let Some(generators) = comp {
            return Ok(Expr::ListComp {
                elt: Box::new(single(items, span)?),
                generators,
                span,
            });
        }
        if items.len() == 1 && !tuple {
            return Ok(items.remove(0));
        }
        Ok(Expr::Tuple { elts: items, span })
    }

    fn build_dict(&self, pair: Pair<'_, Rule>) -> ParseResult<Expr> {
        let span = self.span(&pair);
        let mut items = Vec::new();
        let mut generators = None;
        for p in pair.into_inner() {
            match p.as_rule() {
                Rule::dict_item => {
                    let mut c = children(p);
                    let key = self.build_expr(self.required(&mut c, "a key", span)?)?;
                    let value = self.build_expr(self.required(&mut c, "a value", span)?)?;
                    items.push((key, value));
                }
                Rule::comp_for => {
                    let mut gens = Vec::new();
                    self.build_generators(p, &mut gens)?;
                    generators = Some(gens);
                }
                Rule::trailing_comma => {}
                _ => return Err(self.unexpected(&p)),
            }
        }
        match generators {
            Some(generators) => {
                let (key, value) = items
                    .pop()
                    .ok_or_else(|| ParseError::BuildError("expected a key".into(), span))?;
                Ok(Expr::DictComp {
                    key: Box::new(key),
                    value: Box::new(value),
                    generators,
                    span,
                })
            }
            None => Ok(Expr::Dict { items, span }),
        }
    }

    /* ----- strings ----- */

    fn build_strings(&self, pair: Pair<'_, Rule>) -> ParseResult<Expr> {
        let span = self.span(&pair);
        let mut parts: Vec<FStringPart> = Vec::new();
        let mut formatted = false;

        for lit in pair.into_inner() {
            let mut prefix = "";
            let mut body = "";
            for p in lit.into_inner() {
                if p.as_rule() == Rule::string_prefix {
                    prefix = p.as_str();
                } else if let Some(b) = p.into_inner().next() {
                    body = b.as_str();
                }
            }
            let prefix = prefix.to_ascii_lowercase();
            let raw = prefix.contains('r');
            if prefix.contains('f') {
                formatted = true;
                for part in self.build_fstring(body, raw, span)? {
                    match part {
                        FStringPart::Literal { text } => push_text(&mut parts, &text),
                        field => parts.push(field),
                    }
                }
            } else if raw {
                push_text(&mut parts, body);
            } else {
                let text = decode_escapes(body).map_err(|msg| ParseError::BuildError(msg, span))?;
                push_text(&mut parts, &text);
            }
        }

        if formatted {
            return Ok(Expr::FString { parts, span });
        }
        let text = match parts.pop() {
            Some(FStringPart::Literal { text }) => text,
            _ => String::new(),
        };
        Ok(literal(Literal::Str(text), span))
    }

    fn build_fstring(&self, body: &str, raw: bool, span: Span) -> ParseResult<Vec<FStringPart>> {
        let fail = |msg: &str| ParseError::BuildError(format!("f-string: {}", msg), span);
        let decode = |text: &str| -> ParseResult<String> {
            if raw {
                Ok(text.to_string())
            } else {
                decode_escapes(text).map_err(|msg| ParseError::BuildError(msg, span))
            }
        };

        let mut parts = Vec::new();
        let mut text = String::new();
        let bytes = body.as_bytes();
        let mut i = 0;
        while i < body.len() {
            let c = bytes[i];
            if c == b'{' && bytes.get(i + 1) == Some(&b'{') {
                text.push('{');
                i += 2;
                continue;
            }
            if c == b'}' {
                if bytes.get(i + 1) == Some(&b'}') {
                    text.push('}');
                    i += 2;
                    continue;
                }
                return Err(fail("single '}' is not allowed"));
            }
            if c != b'{' {
                let ch_len = body[i..].chars().next().map_or(1, char::len_utf8);
                text.push_str(&body[i..i + ch_len]);
                i += ch_len;
                continue;
            }

            if !text.is_empty() {
                parts.push(FStringPart::Literal {
                    text: decode(&std::mem::take(&mut text))?,
                });
            }

            let field = scan_field(&body[i + 1..]).ok_or_else(|| fail("expecting '}'"))?;
            let expr_text = &body[i + 1..i + 1 + field.expr_end];
            if expr_text.trim().is_empty() {
                return Err(fail("empty expression not allowed"));
            }
            let expr = parse_expression_text(expr_text, Some(span))
                .map_err(|err| fail(err.message()))?;
            let conversion = match field.conversion {
                None => None,
                Some(c @ ('r' | 's' | 'a')) => Some(c),
                Some(_) => return Err(fail("invalid conversion character")),
            };
            if field.spec.map_or(false, |s| s.contains('{')) {
                return Err(fail("nested replacement fields in a format spec are not supported"));
            }
            parts.push(FStringPart::Field {
                expr: Box::new(expr),
                conversion,
                spec: field.spec.map(str::to_string),
            });
            i += 1 + field.len + 1;
        }
        if !text.is_empty() {
            parts.push(FStringPart::Literal {
                text: decode(&text)?,
            });
        }
        Ok(parts)
    }
}

/* ===================== Helpers ===================== */

fn empty_function(name: String, span: Span) -> FunctionDef {
    FunctionDef {
        name,
        params: Vec::new(),
        vararg: None,
        kwonly: Vec::new(),
        kwarg: None,
        body: Vec::new(),
        globals: Vec::new(),
        nonlocals: Vec::new(),
        span,
    }
}

/// Gather `global`/`nonlocal` names declared in a function body
///
/// Nested function and class bodies have their own scopes and are skipped.
fn collect_declarations(body: &[Stmt], globals: &mut Vec<String>, nonlocals: &mut Vec<String>) {
    for stmt in body {
        match stmt {
            Stmt::Global { names, .. } => globals.extend(names.iter().cloned()),
            Stmt::Nonlocal { names, .. } => nonlocals.extend(names.iter().cloned()),
            Stmt::If { body, orelse, .. } => {
                collect_declarations(body, globals, nonlocals);
                collect_declarations(orelse, globals, nonlocals);
            }
            Stmt::While { body, .. } | Stmt::For { body, .. } => {
                collect_declarations(body, globals, nonlocals)
            }
            Stmt::Try {
                body,
                handlers,
                orelse,
                finalbody,
                ..
            } => {
                collect_declarations(body, globals, nonlocals);
                for handler in handlers {
                    collect_declarations(&handler.body, globals, nonlocals);
                }
                collect_declarations(orelse, globals, nonlocals);
                collect_declarations(finalbody, globals, nonlocals);
            }
            _ => {}
        }
    }
}

fn literal(value: Literal, span: Span) -> Expr {
    Expr::Literal { value, span }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    let span = left.span().merge(&right.span());
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
        span,
    }
}

fn single(mut items: Vec<Expr>, span: Span) -> ParseResult<Expr> {
    if items.len() == 1 {
        Ok(items.remove(0))
    } else {
        Err(ParseError::BuildError(
            "a comprehension needs exactly one element expression".into(),
            span,
        ))
    }
}

fn push_text(parts: &mut Vec<FStringPart>, text: &str) {
    if let Some(FStringPart::Literal { text: last }) = parts.last_mut() {
        last.push_str(text);
    } else {
        parts.push(FStringPart::Literal {
            text: text.to_string(),
        });
    }
}

fn parse_int(text: &str) -> Option<i64> {
    let clean: String = text.chars().filter(|&c| c != '_').collect();
    let (digits, radix) = match clean.get(..2) {
        Some("0x") | Some("0X") => (&clean[2..], 16),
        Some("0o") | Some("0O") => (&clean[2..], 8),
        Some("0b") | Some("0B") => (&clean[2..], 2),
        _ => (clean.as_str(), 10),
    };
    i64::from_str_radix(digits, radix).ok()
}

fn parse_float(text: &str) -> Option<f64> {
    let clean: String = text.chars().filter(|&c| c != '_').collect();
    clean.parse().ok()
}

/// Human label for a grammar rule in "expected ..." messages
fn rule_label(rule: Rule) -> &'static str {
    match rule {
        Rule::EOI => "end of input",
        Rule::ident | Rule::dotted_name => "a name",
        Rule::block => "an indented block",
        Rule::comp_op | Rule::add_op | Rule::mul_op | Rule::shift_op | Rule::aug_op => "an operator",
        Rule::unary_op => "an expression",
        Rule::kw_in => "'in'",
        Rule::kw_import => "'import'",
        Rule::kw_else => "'else'",
        Rule::kw_as => "'as'",
        Rule::kw_if | Rule::kw_and | Rule::kw_or | Rule::kw_for => "an operator",
        Rule::call | Rule::subscription | Rule::attribute => "an operator",
        Rule::trailing_comma => "','",
        Rule::param_list | Rule::param | Rule::varargs_param | Rule::kwargs_param => "a parameter",
        Rule::except_clause | Rule::finally_clause => "'except' or 'finally'",
        Rule::elif_clause | Rule::else_clause => "a statement",
        r if is_simple_stmt(r) => "a statement",
        Rule::if_stmt
        | Rule::while_stmt
        | Rule::for_stmt
        | Rule::try_stmt
        | Rule::funcdef
        | Rule::classdef => "a statement",
        _ => "an expression",
    }
}

/// Byte positions within an f-string replacement field
struct Field<'a> {
    /// End of the expression text
    expr_end: usize,
    conversion: Option<char>,
    spec: Option<&'a str>,
    /// Length up to (not including) the closing brace
    len: usize,
}

/// Scan one `{...}` field body, starting just after the opening brace
fn scan_field(body: &str) -> Option<Field<'_>> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut expr_end = None;
    let mut conversion = None;
    let mut spec_start = None;

    let mut chars = body.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        if spec_start.is_some() {
            match c {
                '{' => depth += 1,
                '}' if depth == 0 => {
                    let start = spec_start?;
                    return Some(Field {
                        expr_end: expr_end?,
                        conversion,
                        spec: Some(&body[start..i]),
                        len: i,
                    });
                }
                '}' => depth -= 1,
                _ => {}
            }
            continue;
        }
        match c {
            '\'' | '"' if expr_end.is_none() => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            '}' if depth > 0 => depth -= 1,
            '}' => {
                return Some(Field {
                    expr_end: expr_end.unwrap_or(i),
                    conversion,
                    spec: None,
                    len: i,
                })
            }
            '!' if depth == 0 && expr_end.is_none() && chars.peek().map(|&(_, n)| n) != Some('=') => {
                expr_end = Some(i);
                conversion = chars.next().map(|(_, n)| n);
            }
            ':' if depth == 0 => {
                if expr_end.is_none() {
                    expr_end = Some(i);
                }
                spec_start = Some(i + 1);
            }
            _ => {}
        }
    }
    None
}

/// Process backslash escapes in a non-raw string literal body
pub(crate) fn decode_escapes(body: &str) -> Result<String, String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(e) = chars.next() else {
            out.push('\\');
            break;
        };
        match e {
            '\n' => {}
            '\r' => {
                chars.next_if_eq(&'\n');
            }
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'v' => out.push('\x0b'),
            '0'..='7' => {
                let mut value = e.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            value = value * 8 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(value).unwrap_or('\u{FFFD}'));
            }
            'x' | 'u' | 'U' => {
                let width = match e {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let digits: String = (0..width).filter_map(|_| chars.next_if(char::is_ascii_hexdigit)).collect();
                if digits.len() != width {
                    return Err(format!("truncated \\{}{} escape", e, "X".repeat(width)));
                }
                let code = u32::from_str_radix(&digits, 16).map_err(|err| err.to_string())?;
                let ch = char::from_u32(code)
                    .ok_or_else(|| format!("invalid character code \\{}{}", e, digits))?;
                out.push(ch);
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    Ok(out)
}
