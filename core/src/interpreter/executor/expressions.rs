//! Expression evaluation

use super::{Frame, FrameKind, Interpreter};
use crate::interpreter::builtins::exceptions::ExcType;
use crate::interpreter::control::{EvalResult, Throw};
use crate::interpreter::object::{new_scope, Args, DictMap, SuperProxy, Val};
use crate::interpreter::types::{
    Argument, CmpOp, Comprehension, Expr, FStringPart, Literal, LogicalOp,
};
use crate::value::Complex64;
use std::sync::Arc;

/// Where a comprehension puts what it produces
enum Collector<'e> {
    List {
        elt: &'e Expr,
        items: Vec<Val>,
    },
    Dict {
        key: &'e Expr,
        value: &'e Expr,
        map: DictMap,
    },
}

impl Interpreter<'_> {
    pub(crate) fn eval(&mut self, expr: &Expr) -> EvalResult {
        match expr {
            Expr::Literal { value, .. } => Ok(literal(value)),

            Expr::FString { parts, .. } => self.eval_fstring(parts),

            Expr::Name { name, .. } => self.load_name(name),

            Expr::List { elts, .. } => Ok(Val::list(self.eval_all(elts)?)),

            Expr::Tuple { elts, .. } => Ok(Val::tuple(self.eval_all(elts)?)),

            Expr::Dict { items, .. } => {
                let mut map = DictMap::new();
                for (key, value) in items {
                    let key = self.eval(key)?;
                    let value = self.eval(value)?;
                    map.insert(key.hash_key()?, (key, value));
                }
                Ok(Val::dict(map))
            }

            Expr::ListComp {
                elt, generators, ..
            } => {
                let collector = Collector::List {
                    elt,
                    items: Vec::new(),
                };
                match self.comprehension(generators, collector)? {
                    Collector::List { items, .. } => Ok(Val::list(items)),
                    Collector::Dict { map, .. } => Ok(Val::dict(map)),
                }
            }

            Expr::DictComp {
                key,
                value,
                generators,
                ..
            } => {
                let collector = Collector::Dict {
                    key,
                    value,
                    map: DictMap::new(),
                };
                match self.comprehension(generators, collector)? {
                    Collector::List { items, .. } => Ok(Val::list(items)),
                    Collector::Dict { map, .. } => Ok(Val::dict(map)),
                }
            }

            Expr::Attribute { object, name, .. } => {
                let object = self.eval(object)?;
                self.get_attr(&object, name)
            }

            Expr::Subscript { object, index, .. } => {
                let object = self.eval(object)?;
                if let Expr::Slice {
                    lower, upper, step, ..
                } = index.as_ref()
                {
                    let bounds = self.eval_slice_bounds(lower, upper, step)?;
                    return self.get_slice(&object, bounds);
                }
                let index = self.eval(index)?;
                self.get_item(&object, &index)
            }

            Expr::Slice { .. } => Err(Throw::new(
                ExcType::SyntaxError,
                "slice outside of a subscript",
            )),

            Expr::Call { func, args, .. } => self.eval_call(func, args),

            Expr::Unary { op, operand, .. } => {
                let operand = self.eval(operand)?;
                self.unary_op(*op, operand)
            }

            Expr::Binary {
                op, left, right, ..
            } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                self.binary_op(*op, left, right)
            }

            Expr::Logical {
                op, left, right, ..
            } => {
                let left = self.eval(left)?;
                let decided = match op {
                    LogicalOp::And => !self.truthy(&left)?,
                    LogicalOp::Or => self.truthy(&left)?,
                };
                if decided {
                    Ok(left)
                } else {
                    self.eval(right)
                }
            }

            Expr::Compare {
                left,
                ops,
                comparators,
                ..
            } => self.eval_compare(left, ops, comparators),

            Expr::Ternary {
                condition,
                consequent,
                alternate,
                ..
            } => {
                let condition = self.eval(condition)?;
                if self.truthy(&condition)? {
                    self.eval(consequent)
                } else {
                    self.eval(alternate)
                }
            }

            Expr::Lambda { def, .. } => self.make_function(def),
        }
    }

    pub(crate) fn eval_all(&mut self, exprs: &[Expr]) -> EvalResult<Vec<Val>> {
        exprs.iter().map(|e| self.eval(e)).collect()
    }

    fn eval_fstring(&mut self, parts: &[FStringPart]) -> EvalResult {
        let mut out = String::new();
        for part in parts {
            match part {
                FStringPart::Literal { text } => out.push_str(text),
                FStringPart::Field {
                    expr,
                    conversion,
                    spec,
                } => {
                    let value = self.eval(expr)?;
                    let value = match conversion {
                        Some('r') | Some('a') => Val::from(self.repr(&value)?),
                        Some('s') => Val::from(self.to_str(&value)?),
                        _ => value,
                    };
                    let text = self.format_value(&value, spec.as_deref().unwrap_or(""))?;
                    out.push_str(&text);
                }
            }
        }
        Ok(Val::from(out))
    }

    /// `a < b < c` evaluates each operand once and stops at the first false link
    fn eval_compare(&mut self, left: &Expr, ops: &[CmpOp], comparators: &[Expr]) -> EvalResult {
        let mut left = self.eval(left)?;
        let mut result = Val::Bool(true);
        for (op, right) in ops.iter().zip(comparators) {
            let right = self.eval(right)?;
            result = self.compare(*op, &left, &right)?;
            if !self.truthy(&result)? {
                return Ok(result);
            }
            left = right;
        }
        Ok(result)
    }

    /* ===================== Comprehensions ===================== */

    /// Run a comprehension in its own scope
    ///
    /// The first iterable is evaluated in the enclosing scope; everything
    /// else sees the comprehension's variables.
    fn comprehension<'e>(
        &mut self,
        generators: &'e [Comprehension],
        collector: Collector<'e>,
    ) -> EvalResult<Collector<'e>> {
        let Some(first) = generators.first() else {
            return Ok(collector);
        };
        let iterable = self.eval(&first.iter)?;

        let frame = {
            let outer = self.frame();
            Frame {
                kind: FrameKind::Function,
                globals: outer.globals.clone(),
                locals: Some(new_scope()),
                closure: outer.closure_for_child(),
                function: None,
                file: outer.file.clone(),
                name: outer.name.clone(),
                line: outer.line,
            }
        };

        // Comprehensions do not show up in tracebacks
        self.stack.push(frame);
        let mut collector = collector;
        let result = self.comprehend(generators, Some(iterable), &mut collector);
        self.stack.pop();
        result.map(|_| collector)
    }

    fn comprehend(
        &mut self,
        generators: &[Comprehension],
        first: Option<Val>,
        collector: &mut Collector<'_>,
    ) -> EvalResult<()> {
        let Some((generator, rest)) = generators.split_first() else {
            return match collector {
                Collector::List { elt, items } => {
                    items.push(self.eval(elt)?);
                    Ok(())
                }
                Collector::Dict { key, value, map } => {
                    let key = self.eval(key)?;
                    let value = self.eval(value)?;
                    map.insert(key.hash_key()?, (key, value));
                    Ok(())
                }
            };
        };

        let iterable = match first {
            Some(iterable) => iterable,
            None => self.eval(&generator.iter)?,
        };
        let mut cursor = self.iterate(&iterable)?;
        'items: while let Some(item) = self.next_item(&mut cursor)? {
            self.assign(&generator.target, item)?;
            for condition in &generator.ifs {
                let keep = self.eval(condition)?;
                if !self.truthy(&keep)? {
                    continue 'items;
                }
            }
            self.comprehend(rest, None, collector)?;
        }
        Ok(())
    }

    /* ===================== Calls ===================== */

    fn eval_call(&mut self, func: &Expr, args: &[Argument]) -> EvalResult {
        let callee = self.eval(func)?;
        if args.is_empty() {
            if let Val::Native(native) = &callee {
                if native.name == "super" {
                    return self.zero_arg_super();
                }
            }
        }
        let args = self.eval_args(args)?;
        self.call(&callee, args)
    }

    /// Evaluate call arguments, expanding `*` and `**`
    pub(crate) fn eval_args(&mut self, args: &[Argument]) -> EvalResult<Args> {
        let mut out = Args::default();
        for arg in args {
            match arg {
                Argument::Positional(expr) => {
                    let value = self.eval(expr)?;
                    out.positional.push(value);
                }
                Argument::Keyword { name, value } => {
                    let value = self.eval(value)?;
                    out.keywords.push((Arc::from(name.as_str()), value));
                }
                Argument::Star(expr) => {
                    let iterable = self.eval(expr)?;
                    let items = self.collect(&iterable)?;
                    out.positional.extend(items);
                }
                Argument::DoubleStar(expr) => {
                    let mapping = self.eval(expr)?;
                    let Val::Dict(map) = &mapping else {
                        return Err(Throw::type_error(format!(
                            "argument after ** must be a mapping, not {}",
                            mapping.type_name()
                        )));
                    };
                    let entries: Vec<(Val, Val)> = map.lock().values().cloned().collect();
                    for (key, value) in entries {
                        let Val::Str(key) = key else {
                            return Err(Throw::type_error("keywords must be strings"));
                        };
                        if out.keywords.iter().any(|(k, _)| *k == key) {
                            return Err(Throw::type_error(format!(
                                "got multiple values for keyword argument '{}'",
                                key
                            )));
                        }
                        out.keywords.push((key, value));
                    }
                }
            }
        }
        Ok(out)
    }

    /// `super()` inside a method: the defining class and the first argument
    fn zero_arg_super(&mut self) -> EvalResult {
        let frame = self.frame();
        let no_args = || Throw::new(ExcType::RuntimeError, "super(): no arguments");
        let function = frame.function.clone().ok_or_else(no_args)?;
        let class = function.owner().ok_or_else(|| {
            Throw::new(ExcType::RuntimeError, "super(): __class__ cell not found")
        })?;
        let first = function.def.params.first().ok_or_else(no_args)?;
        let receiver = frame
            .locals
            .as_ref()
            .and_then(|locals| locals.lock().get(first.name.as_str()).cloned())
            .ok_or_else(|| Throw::new(ExcType::RuntimeError, "super(): arg[0] deleted"))?;
        Ok(Val::Super(Arc::new(SuperProxy { class, receiver })))
    }
}

fn literal(value: &Literal) -> Val {
    match value {
        Literal::None => Val::None,
        Literal::Bool(b) => Val::Bool(*b),
        Literal::Int(i) => Val::Int(*i),
        Literal::Float(f) => Val::Float(*f),
        Literal::Imaginary(f) => Val::Complex(Complex64::new(0.0, *f)),
        Literal::Str(s) => Val::from(s.as_str()),
    }
}
