//! Abstract syntax tree for Midori programs.
//!
//! Every variable reference carries a resolved [`VariableSemantic`] and
//! every scope records its owned-local count; both are produced by the
//! parser. The `annotation` slots (operand kinds, member indices, case
//! tags, cast kinds) start empty and are filled in by the type checker
//! for the code generator.

use serde::Serialize;

use crate::token::Token;

/// Where a resolved name lives at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VariableSemantic {
    /// Slot `bp + relative_index` of the current frame.
    Local { relative_index: usize },
    /// Entry `absolute_index` of the active closure's captured cells.
    Cell { absolute_index: usize },
    /// Slot in the flat global table.
    Global,
}

/// Syntactic type annotation; resolved and interned by the type checker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TypeExpr {
    Integer,
    Fraction,
    Text,
    Bool,
    Unit,
    Array(Box<TypeExpr>),
    Function(Vec<TypeExpr>, Box<TypeExpr>),
    Named(String),
}

/// Typed-operand classification the checker records on binary and unary
/// operators so the generator can pick specialized opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum OperandKind {
    Integer,
    Fraction,
    Text,
    Array,
    Bool,
    #[default]
    Other,
}

/// Operand classification for a loop or branch condition; `Integer` and
/// `Fraction` comparisons compile to fused compare-and-branch opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ConditionOperand {
    Integer,
    Fraction,
    #[default]
    Other,
}

/// Which cast instruction (if any) an `as` expression needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CastKind {
    ToFraction,
    ToInteger,
    ToText,
    ToBool,
    ToUnit,
    /// Struct-to-struct cast between layout-identical structs: no code.
    StructIdentity,
}

/// Resolution of a `new` expression, written by the checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConstructKind {
    Struct { arity: usize },
    UnionVariant { tag: u8, arity: usize },
}

#[derive(Debug, Serialize)]
pub enum Expression {
    Binary {
        op: Token,
        left: Box<Expression>,
        right: Box<Expression>,
        /// Filled by the checker: the shared operand type.
        operand: OperandKind,
    },
    Unary {
        op: Token,
        expr: Box<Expression>,
        operand: OperandKind,
    },
    Group {
        inner: Box<Expression>,
    },
    Ternary {
        question: Token,
        condition: Box<Expression>,
        true_branch: Box<Expression>,
        else_branch: Box<Expression>,
        condition_kind: ConditionOperand,
    },
    IntegerLiteral {
        token: Token,
    },
    FractionLiteral {
        token: Token,
    },
    TextLiteral {
        token: Token,
    },
    BoolLiteral {
        token: Token,
    },
    UnitLiteral {
        token: Token,
    },
    Variable {
        name: Token,
        semantic: VariableSemantic,
    },
    /// `name = value` re-binding an existing variable.
    Bind {
        name: Token,
        value: Box<Expression>,
        semantic: VariableSemantic,
    },
    Call {
        paren: Token,
        callee: Box<Expression>,
        arguments: Vec<Expression>,
        /// Filled by the checker from the callee's function type.
        is_foreign: bool,
    },
    Get {
        member_name: Token,
        object: Box<Expression>,
        member_index: Option<usize>,
    },
    Set {
        member_name: Token,
        object: Box<Expression>,
        value: Box<Expression>,
        member_index: Option<usize>,
    },
    Array {
        bracket: Token,
        elements: Vec<Expression>,
    },
    ArrayGet {
        bracket: Token,
        array: Box<Expression>,
        indices: Vec<Expression>,
    },
    ArraySet {
        bracket: Token,
        array: Box<Expression>,
        indices: Vec<Expression>,
        value: Box<Expression>,
    },
    Closure {
        keyword: Token,
        params: Vec<Token>,
        param_types: Vec<TypeExpr>,
        return_type: TypeExpr,
        body: Box<Statement>,
        /// Environment size visible at creation: inherited cells plus the
        /// enclosing frame's locals defined so far.
        captured_count: usize,
    },
    Construct {
        name: Token,
        arguments: Vec<Expression>,
        kind: Option<ConstructKind>,
    },
    As {
        keyword: Token,
        expr: Box<Expression>,
        target: TypeExpr,
        cast: Option<CastKind>,
    },
}

#[derive(Debug, Serialize)]
pub enum SwitchCase {
    Member {
        keyword: Token,
        variant: Token,
        bindings: Vec<Token>,
        body: Statement,
        /// Variant tag, written by the checker.
        tag: Option<u8>,
    },
    Default {
        keyword: Token,
        body: Statement,
        /// `(tag, arity)` of every variant no explicit case covers,
        /// written by the checker.
        uncovered: Vec<(u8, usize)>,
    },
}

#[derive(Debug, Serialize)]
pub enum Statement {
    Block {
        right_brace: Token,
        statements: Vec<Statement>,
        local_count: usize,
    },
    Simple {
        semicolon: Token,
        expr: Expression,
    },
    Define {
        name: Token,
        annotation: Option<TypeExpr>,
        value: Expression,
        /// `None` for globals; the parser assigns frame-relative slots.
        local_index: Option<usize>,
        is_fixed: bool,
    },
    If {
        keyword: Token,
        condition: Expression,
        true_branch: Box<Statement>,
        else_branch: Option<Box<Statement>>,
        condition_kind: ConditionOperand,
    },
    While {
        keyword: Token,
        condition: Expression,
        body: Box<Statement>,
        condition_kind: ConditionOperand,
    },
    For {
        keyword: Token,
        initializer: Option<Box<Statement>>,
        condition: Option<Expression>,
        increment: Option<Box<Statement>>,
        body: Box<Statement>,
        control_local_count: usize,
        condition_kind: ConditionOperand,
    },
    Break {
        keyword: Token,
        /// Locals to discard before leaving the loop.
        pop_count: usize,
    },
    Continue {
        keyword: Token,
        /// Locals to discard before re-entering the loop.
        pop_count: usize,
    },
    Return {
        keyword: Token,
        value: Expression,
    },
    Struct {
        name: Token,
        members: Vec<(Token, TypeExpr)>,
    },
    Union {
        name: Token,
        variants: Vec<(Token, Vec<TypeExpr>)>,
    },
    Switch {
        keyword: Token,
        scrutinee: Expression,
        cases: Vec<SwitchCase>,
    },
    Foreign {
        name: Token,
        ty: TypeExpr,
        local_index: Option<usize>,
    },
}

/// A parsed program: the top-level statement list.
pub type ProgramTree = Vec<Statement>;

impl Expression {
    /// Source line of the token nearest this expression's head.
    pub fn line(&self) -> u32 {
        match self {
            Expression::Binary { op, .. } => op.line,
            Expression::Unary { op, .. } => op.line,
            Expression::Group { inner } => inner.line(),
            Expression::Ternary { question, .. } => question.line,
            Expression::IntegerLiteral { token }
            | Expression::FractionLiteral { token }
            | Expression::TextLiteral { token }
            | Expression::BoolLiteral { token }
            | Expression::UnitLiteral { token } => token.line,
            Expression::Variable { name, .. } => name.line,
            Expression::Bind { name, .. } => name.line,
            Expression::Call { paren, .. } => paren.line,
            Expression::Get { member_name, .. } => member_name.line,
            Expression::Set { member_name, .. } => member_name.line,
            Expression::Array { bracket, .. } => bracket.line,
            Expression::ArrayGet { bracket, .. } => bracket.line,
            Expression::ArraySet { bracket, .. } => bracket.line,
            Expression::Closure { keyword, .. } => keyword.line,
            Expression::Construct { name, .. } => name.line,
            Expression::As { keyword, .. } => keyword.line,
        }
    }
}
