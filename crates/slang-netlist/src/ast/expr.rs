//! Expression, statement and timing-control kinds of the consumed AST.
//!
//! Every expression node carries the type the checker assigned to it; the
//! lowering relies on those widths rather than re-deriving them.

use serde::{Deserialize, Serialize};

use super::{SourceRange, SymbolId, Type};
use crate::ast::constant::SVInt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    Plus,
    Minus,
    BitwiseNot,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    BitwiseNand,
    BitwiseNor,
    BitwiseXnor,
    LogicalNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Mod,
    BinaryAnd,
    BinaryOr,
    BinaryXor,
    BinaryXnor,
    Equality,
    Inequality,
    CaseEquality,
    CaseInequality,
    WildcardEquality,
    WildcardInequality,
    GreaterThanEqual,
    GreaterThan,
    LessThanEqual,
    LessThan,
    LogicalAnd,
    LogicalOr,
    LogicalImplication,
    LogicalEquivalence,
    LogicalShiftLeft,
    LogicalShiftRight,
    ArithmeticShiftLeft,
    ArithmeticShiftRight,
    Power,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangeSelectionKind {
    Simple,
    IndexedUp,
    IndexedDown,
}

/// One `cond` entry of a conditional expression or statement. Pattern
/// matching conditions are represented but not lowered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalPart {
    pub expr: Expression,
    #[serde(default)]
    pub has_pattern: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CallTarget {
    /// `$display`, `$signed`, `$time`, ...
    System(String),
    /// A user subroutine symbol.
    User(SymbolId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallExpression {
    pub target: CallTarget,
    pub args: Vec<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExprKind {
    NamedValue(SymbolId),
    IntegerLiteral(SVInt),
    StringLiteral(String),
    Unary {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    Binary {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Conversion {
        operand: Box<Expression>,
    },
    RangeSelect {
        kind: RangeSelectionKind,
        value: Box<Expression>,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    ElementSelect {
        value: Box<Expression>,
        selector: Box<Expression>,
    },
    Concatenation {
        operands: Vec<Expression>,
    },
    Replication {
        count: Box<Expression>,
        concat: Box<Expression>,
    },
    Conditional {
        conditions: Vec<ConditionalPart>,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    MemberAccess {
        value: Box<Expression>,
        member: SymbolId,
    },
    Call(CallExpression),
    Assignment {
        non_blocking: bool,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// Placeholder for an unconnected side of a port connection.
    EmptyArgument,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expression {
    pub ty: Type,
    #[serde(default)]
    pub src: SourceRange,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    Sequential,
    Parallel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseCondition {
    Normal,
    WildcardXOrZ,
    WildcardJustZ,
    Inside,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UniquePriorityCheck {
    None,
    Unique,
    Unique0,
    Priority,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseItem {
    pub expressions: Vec<Expression>,
    pub stmt: Statement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeKind {
    None,
    PosEdge,
    NegEdge,
    BothEdges,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TimingControl {
    SignalEvent {
        expr: Expression,
        edge: EdgeKind,
        #[serde(default)]
        iff: Option<Expression>,
    },
    ImplicitEvent,
    EventList(Vec<TimingControl>),
    Delay,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StmtKind {
    Empty,
    Invalid,
    List(Vec<Statement>),
    Block {
        kind: BlockKind,
        body: Box<Statement>,
    },
    VariableDecl(SymbolId),
    ExpressionStatement(Expression),
    Conditional {
        conditions: Vec<ConditionalPart>,
        if_true: Box<Statement>,
        #[serde(default)]
        if_false: Option<Box<Statement>>,
    },
    Case {
        condition: CaseCondition,
        check: UniquePriorityCheck,
        expr: Expression,
        items: Vec<CaseItem>,
        #[serde(default)]
        default_case: Option<Box<Statement>>,
    },
    Timed {
        timing: TimingControl,
        stmt: Box<Statement>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    #[serde(default)]
    pub src: SourceRange,
    #[serde(default)]
    pub attrs: Vec<(String, SVInt)>,
    pub kind: StmtKind,
}
