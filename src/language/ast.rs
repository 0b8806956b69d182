use crate::language::span::Span;
use std::rc::Rc;

/// A parsed script file: its top-level statements in source order.
#[derive(Clone, Debug)]
pub struct Program {
    pub statements: Vec<Statement>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeclKind {
    Let,
    Const,
    Var,
}

#[derive(Clone, Debug)]
pub struct FunctionDef {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: FunctionBody,
    /// Arrow functions share the enclosing `arguments`.
    pub is_arrow: bool,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum FunctionBody {
    Block(Vec<Statement>),
    /// Concise arrow body: `x => x * 2`.
    Expr(Box<Expr>),
}

#[derive(Clone, Debug)]
pub enum Statement {
    Expr(Expr),
    Decl(DeclStmt),
    Function(Rc<FunctionDef>),
    Return(ReturnStmt),
    If(IfStmt),
    While(WhileStmt),
    For(ForStmt),
    ForOf(ForOfStmt),
    Break(Span),
    Continue(Span),
    Throw(ThrowStmt),
    Try(TryStmt),
    Block(Vec<Statement>),
    Empty,
}

#[derive(Clone, Debug)]
pub struct DeclStmt {
    pub kind: DeclKind,
    pub declarators: Vec<Declarator>,
}

#[derive(Clone, Debug)]
pub struct Declarator {
    pub name: String,
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct ReturnStmt {
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_branch: Box<Statement>,
    pub else_branch: Option<Box<Statement>>,
}

#[derive(Clone, Debug)]
pub struct WhileStmt {
    pub condition: Expr,
    pub body: Box<Statement>,
}

#[derive(Clone, Debug)]
pub struct ForStmt {
    pub init: Option<Box<Statement>>,
    pub condition: Option<Expr>,
    pub update: Option<Expr>,
    pub body: Box<Statement>,
}

#[derive(Clone, Debug)]
pub struct ForOfStmt {
    pub kind: DeclKind,
    pub binding: String,
    pub iterable: Expr,
    pub body: Box<Statement>,
}

#[derive(Clone, Debug)]
pub struct ThrowStmt {
    pub value: Expr,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct TryStmt {
    pub body: Vec<Statement>,
    pub catch_binding: Option<String>,
    pub catch_body: Option<Vec<Statement>>,
    pub finally_body: Option<Vec<Statement>>,
}

#[derive(Clone, Debug)]
pub enum Literal {
    Number(f64),
    String(String),
    Bool(bool),
    Null,
    Undefined,
}

#[derive(Clone, Debug)]
pub enum TemplateSegment {
    Text(String),
    Expr(Expr),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    TypeOf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

#[derive(Clone, Debug)]
pub enum Expr {
    Literal(Literal, Span),
    Template(Vec<TemplateSegment>, Span),
    Identifier(String, Span),
    Array(Vec<Expr>, Span),
    Object(Vec<(String, Expr)>, Span),
    Function(Rc<FunctionDef>),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
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
    Conditional {
        condition: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
        span: Span,
    },
    Assign {
        target: Box<Expr>,
        op: Option<BinaryOp>,
        value: Box<Expr>,
        span: Span,
    },
    Update {
        op: UpdateOp,
        prefix: bool,
        target: Box<Expr>,
        span: Span,
    },
    Member {
        object: Box<Expr>,
        property: String,
        span: Span,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal(_, span)
            | Expr::Template(_, span)
            | Expr::Identifier(_, span)
            | Expr::Array(_, span)
            | Expr::Object(_, span) => *span,
            Expr::Function(def) => def.span,
            Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Logical { span, .. }
            | Expr::Conditional { span, .. }
            | Expr::Assign { span, .. }
            | Expr::Update { span, .. }
            | Expr::Member { span, .. }
            | Expr::Index { span, .. }
            | Expr::Call { span, .. } => *span,
        }
    }

    /// Name used when reporting a failed call on this expression.
    pub fn callee_name(&self) -> String {
        match self {
            Expr::Identifier(name, _) => name.clone(),
            Expr::Member {
                object, property, ..
            } => format!("{}.{}", object.callee_name(), property),
            Expr::Index { object, .. } => format!("{}[...]", object.callee_name()),
            _ => "expression".into(),
        }
    }
}

impl FunctionDef {
    /// Whether the body reads the implicit `arguments` array. Nested
    /// `function` bodies get their own `arguments` and are not searched;
    /// arrow bodies share the enclosing one and are.
    pub fn uses_arguments(&self) -> bool {
        match &self.body {
            FunctionBody::Block(statements) => statements.iter().any(statement_uses_arguments),
            FunctionBody::Expr(expr) => expr_uses_arguments(expr),
        }
    }
}

fn statement_uses_arguments(statement: &Statement) -> bool {
    match statement {
        Statement::Expr(expr) => expr_uses_arguments(expr),
        Statement::Decl(decl) => decl
            .declarators
            .iter()
            .filter_map(|d| d.value.as_ref())
            .any(expr_uses_arguments),
        Statement::Function(_) | Statement::Break(_) | Statement::Continue(_) | Statement::Empty => {
            false
        }
        Statement::Return(stmt) => stmt.value.as_ref().is_some_and(expr_uses_arguments),
        Statement::If(stmt) => {
            expr_uses_arguments(&stmt.condition)
                || statement_uses_arguments(&stmt.then_branch)
                || stmt
                    .else_branch
                    .as_deref()
                    .is_some_and(statement_uses_arguments)
        }
        Statement::While(stmt) => {
            expr_uses_arguments(&stmt.condition) || statement_uses_arguments(&stmt.body)
        }
        Statement::For(stmt) => {
            stmt.init.as_deref().is_some_and(statement_uses_arguments)
                || stmt.condition.as_ref().is_some_and(expr_uses_arguments)
                || stmt.update.as_ref().is_some_and(expr_uses_arguments)
                || statement_uses_arguments(&stmt.body)
        }
        Statement::ForOf(stmt) => {
            expr_uses_arguments(&stmt.iterable) || statement_uses_arguments(&stmt.body)
        }
        Statement::Throw(stmt) => expr_uses_arguments(&stmt.value),
        Statement::Try(stmt) => [
            Some(&stmt.body),
            stmt.catch_body.as_ref(),
            stmt.finally_body.as_ref(),
        ]
        .into_iter()
        .flatten()
        .any(|body| body.iter().any(statement_uses_arguments)),
        Statement::Block(statements) => statements.iter().any(statement_uses_arguments),
    }
}

fn expr_uses_arguments(expr: &Expr) -> bool {
    match expr {
        Expr::Identifier(name, _) => name == "arguments",
        Expr::Literal(..) => false,
        Expr::Template(segments, _) => segments.iter().any(|segment| match segment {
            TemplateSegment::Expr(expr) => expr_uses_arguments(expr),
            TemplateSegment::Text(_) => false,
        }),
        Expr::Array(items, _) => items.iter().any(expr_uses_arguments),
        Expr::Object(entries, _) => entries.iter().any(|(_, value)| expr_uses_arguments(value)),
        Expr::Function(def) => def.is_arrow && def.uses_arguments(),
        Expr::Unary { expr, .. } => expr_uses_arguments(expr),
        Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
            expr_uses_arguments(left) || expr_uses_arguments(right)
        }
        Expr::Conditional {
            condition,
            then_expr,
            else_expr,
            ..
        } => {
            expr_uses_arguments(condition)
                || expr_uses_arguments(then_expr)
                || expr_uses_arguments(else_expr)
        }
        Expr::Assign { target, value, .. } => {
            expr_uses_arguments(target) || expr_uses_arguments(value)
        }
        Expr::Update { target, .. } => expr_uses_arguments(target),
        Expr::Member { object, .. } => expr_uses_arguments(object),
        Expr::Index { object, index, .. } => {
            expr_uses_arguments(object) || expr_uses_arguments(index)
        }
        Expr::Call { callee, args, .. } => {
            expr_uses_arguments(callee) || args.iter().any(expr_uses_arguments)
        }
    }
}
