//! Abstract Syntax Tree node types

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Source location span for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Span {
    /// Start byte offset in the original source
    pub start: usize,
    /// End byte offset in the original source
    pub end: usize,
    /// Start line (0-indexed)
    pub start_line: usize,
    /// Start column in characters (0-indexed)
    pub start_col: usize,
    /// End line (0-indexed)
    pub end_line: usize,
    /// End column in characters (0-indexed)
    pub end_col: usize,
}

impl Span {
    pub fn new(
        start: usize,
        end: usize,
        start_line: usize,
        start_col: usize,
        end_line: usize,
        end_col: usize,
    ) -> Self {
        Self {
            start,
            end,
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Create a span that covers both self and other
    pub fn merge(&self, other: &Span) -> Span {
        let (first, last) = (
            if self.start <= other.start { self } else { other },
            if self.end >= other.end { self } else { other },
        );
        Span {
            start: first.start,
            end: last.end,
            start_line: first.start_line,
            start_col: first.start_col,
            end_line: last.end_line,
            end_col: last.end_col,
        }
    }

    /// 1-based line for diagnostics and tracebacks
    pub fn line(&self) -> usize {
        self.start_line + 1
    }

    /// 1-based column for diagnostics
    pub fn column(&self) -> usize {
        self.start_col + 1
    }
}

/* ===================== Operators ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    LShift,
    RShift,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::LShift => "<<",
            BinaryOp::RShift => ">>",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<BinaryOp> {
        Some(match symbol {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "//" => BinaryOp::FloorDiv,
            "%" => BinaryOp::Mod,
            "**" => BinaryOp::Pow,
            "&" => BinaryOp::BitAnd,
            "|" => BinaryOp::BitOr,
            "^" => BinaryOp::BitXor,
            "<<" => BinaryOp::LShift,
            ">>" => BinaryOp::RShift,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Pos,
    Invert,
    Not,
}

/// Short-circuiting operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
    Is,
    IsNot,
}

impl CmpOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtE => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtE => ">=",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
            CmpOp::Is => "is",
            CmpOp::IsNot => "is not",
        }
    }
}

/* ===================== Definitions ===================== */

/// A `def` or `lambda`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    /// Name bound to extra positional arguments (`*args`)
    pub vararg: Option<String>,
    /// Parameters after `*args`, passable by keyword only
    pub kwonly: Vec<Param>,
    /// Name bound to extra keyword arguments (`**kwargs`)
    pub kwarg: Option<String>,
    pub body: Vec<Stmt>,
    /// Names declared `global` anywhere in the body
    pub globals: Vec<String>,
    /// Names declared `nonlocal` anywhere in the body
    pub nonlocals: Vec<String>,
    pub span: Span,
}

impl FunctionDef {
    pub fn declares_global(&self, name: &str) -> bool {
        self.globals.iter().any(|g| g == name)
    }

    pub fn declares_nonlocal(&self, name: &str) -> bool {
        self.nonlocals.iter().any(|n| n == name)
    }

    /// Every name the signature binds, in declaration order
    pub fn bound_names(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .map(|p| p.name.as_str())
            .chain(self.vararg.as_deref())
            .chain(self.kwonly.iter().map(|p| p.name.as_str()))
            .chain(self.kwarg.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub default: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: String,
    pub bases: Vec<Expr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptHandler {
    /// Exception class (or tuple of classes) to match; `None` matches all
    pub kind: Option<Expr>,
    pub name: Option<String>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// `name [as asname]` in an import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub name: String,
    pub asname: Option<String>,
    pub span: Span,
}

/* ===================== Statements ===================== */

/// Statement AST node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Stmt {
    Expr {
        expr: Expr,
        span: Span,
    },
    /// `a = b = value`; every target receives the same value
    Assign {
        targets: Vec<Expr>,
        value: Expr,
        span: Span,
    },
    AugAssign {
        target: Expr,
        op: BinaryOp,
        value: Expr,
        span: Span,
    },
    /// `elif` chains nest in `orelse`
    If {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
        span: Span,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
        span: Span,
    },
    For {
        target: Expr,
        iter: Expr,
        body: Vec<Stmt>,
        span: Span,
    },
    Break {
        span: Span,
    },
    Continue {
        span: Span,
    },
    Pass {
        span: Span,
    },
    Return {
        value: Option<Expr>,
        span: Span,
    },
    FunctionDef {
        def: Arc<FunctionDef>,
        span: Span,
    },
    ClassDef {
        def: Arc<ClassDef>,
        span: Span,
    },
    Try {
        body: Vec<Stmt>,
        handlers: Vec<ExceptHandler>,
        orelse: Vec<Stmt>,
        finalbody: Vec<Stmt>,
        span: Span,
    },
    Raise {
        exc: Option<Expr>,
        span: Span,
    },
    Global {
        names: Vec<String>,
        span: Span,
    },
    Nonlocal {
        names: Vec<String>,
        span: Span,
    },
    Import {
        names: Vec<Alias>,
        span: Span,
    },
    /// `from module import names`; an empty `names` means `*`
    ImportFrom {
        module: String,
        names: Vec<Alias>,
        span: Span,
    },
    Delete {
        targets: Vec<Expr>,
        span: Span,
    },
    Assert {
        test: Expr,
        msg: Option<Expr>,
        span: Span,
    },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Expr { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::AugAssign { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::For { span, .. }
            | Stmt::Break { span }
            | Stmt::Continue { span }
            | Stmt::Pass { span }
            | Stmt::Return { span, .. }
            | Stmt::FunctionDef { span, .. }
            | Stmt::ClassDef { span, .. }
            | Stmt::Try { span, .. }
            | Stmt::Raise { span, .. }
            | Stmt::Global { span, .. }
            | Stmt::Nonlocal { span, .. }
            | Stmt::Import { span, .. }
            | Stmt::ImportFrom { span, .. }
            | Stmt::Delete { span, .. }
            | Stmt::Assert { span, .. } => *span,
        }
    }

    /// True for statements that never fall through to the next one
    pub fn ends_flow(&self) -> bool {
        matches!(
            self,
            Stmt::Return { .. } | Stmt::Raise { .. } | Stmt::Break { .. } | Stmt::Continue { .. }
        )
    }
}

/* ===================== Expressions ===================== */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Imaginary literal such as `2j`
    Imaginary(f64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum FStringPart {
    Literal {
        text: String,
    },
    Field {
        expr: Box<Expr>,
        /// `r` or `s` from `{x!r}`
        conversion: Option<char>,
        /// Format spec after `:`
        spec: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Argument {
    Positional(Expr),
    Keyword { name: String, value: Expr },
    /// `*iterable`
    Star(Expr),
    /// `**mapping`
    DoubleStar(Expr),
}

/// One `for target in iter if cond` clause of a comprehension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comprehension {
    pub target: Expr,
    pub iter: Expr,
    pub ifs: Vec<Expr>,
}

/// Expression AST node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Expr {
    Literal {
        value: Literal,
        span: Span,
    },
    FString {
        parts: Vec<FStringPart>,
        span: Span,
    },
    Name {
        name: String,
        span: Span,
    },
    List {
        elts: Vec<Expr>,
        span: Span,
    },
    Tuple {
        elts: Vec<Expr>,
        span: Span,
    },
    Dict {
        items: Vec<(Expr, Expr)>,
        span: Span,
    },
    /// Also used for generator expressions, which evaluate eagerly
    ListComp {
        elt: Box<Expr>,
        generators: Vec<Comprehension>,
        span: Span,
    },
    DictComp {
        key: Box<Expr>,
        value: Box<Expr>,
        generators: Vec<Comprehension>,
        span: Span,
    },
    Attribute {
        object: Box<Expr>,
        name: String,
        span: Span,
    },
    Subscript {
        object: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
    /// Only valid as a subscript index
    Slice {
        lower: Option<Box<Expr>>,
        upper: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
        span: Span,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Argument>,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        span: Span,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    /// Chained comparison `a < b <= c`
    Compare {
        left: Box<Expr>,
        ops: Vec<CmpOp>,
        comparators: Vec<Expr>,
        span: Span,
    },
    Ternary {
        condition: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
        span: Span,
    },
    Lambda {
        def: Arc<FunctionDef>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal { span, .. }
            | Expr::FString { span, .. }
            | Expr::Name { span, .. }
            | Expr::List { span, .. }
            | Expr::Tuple { span, .. }
            | Expr::Dict { span, .. }
            | Expr::ListComp { span, .. }
            | Expr::DictComp { span, .. }
            | Expr::Attribute { span, .. }
            | Expr::Subscript { span, .. }
            | Expr::Slice { span, .. }
            | Expr::Call { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Logical { span, .. }
            | Expr::Compare { span, .. }
            | Expr::Ternary { span, .. }
            | Expr::Lambda { span, .. } => *span,
        }
    }

    /// Whether the expression may appear on the left of `=`
    pub fn is_assignable(&self) -> bool {
        match self {
            Expr::Name { .. } | Expr::Attribute { .. } | Expr::Subscript { .. } => true,
            Expr::Tuple { elts, .. } | Expr::List { elts, .. } => {
                elts.iter().all(Expr::is_assignable)
            }
            _ => false,
        }
    }

    /// Short description used in "cannot assign to ..." diagnostics
    pub fn describe(&self) -> &'static str {
        match self {
            Expr::Literal { .. } | Expr::FString { .. } => "literal",
            Expr::Call { .. } => "function call",
            Expr::Binary { .. } | Expr::Unary { .. } => "expression",
            Expr::Logical { .. } => "expression",
            Expr::Compare { .. } => "comparison",
            Expr::Ternary { .. } => "conditional expression",
            Expr::Lambda { .. } => "lambda",
            Expr::ListComp { .. } => "list comprehension",
            Expr::DictComp { .. } => "dict comprehension",
            Expr::Dict { .. } => "dict literal",
            _ => "expression",
        }
    }
}
