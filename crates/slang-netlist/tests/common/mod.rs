//! Helpers for building checked-AST fixtures by hand.

#![allow(dead_code)]

use slang_netlist::ast::{
    BinaryOperator, BlockKind, CallExpression, CallTarget, CaseCondition, CaseItem,
    Compilation, ConditionalPart, EdgeKind, ExprKind, Expression, PortDirection,
    ProceduralBlockKind, SourceRange, Statement, StmtKind, SubroutineKind, SVInt, Symbol,
    SymbolId, SymbolKind, TimingControl, Type, UniquePriorityCheck,
};
use slang_netlist::rtlil::{Const, Module, SigSpec, WireId};

pub struct TestModule {
    pub comp: Compilation,
    pub inst: SymbolId,
    pub body: SymbolId,
}

impl TestModule {
    pub fn new(name: &str) -> TestModule {
        let mut comp = Compilation::default();
        let inst = comp.add_symbol(Symbol {
            name: name.to_string(),
            parent: None,
            src: SourceRange::default(),
            attrs: vec![],
            kind: SymbolKind::Instance {
                body: SymbolId(0),
                connections: vec![],
            },
        });
        let body = comp.add_symbol(Symbol {
            name: String::new(),
            parent: Some(inst),
            src: SourceRange::default(),
            attrs: vec![],
            kind: SymbolKind::InstanceBody { members: vec![] },
        });
        if let SymbolKind::Instance { body: b, .. } = &mut comp.symbols[inst.0 as usize].kind {
            *b = body;
        }
        comp.roots.push(inst);
        TestModule { comp, inst, body }
    }

    pub fn add_member(&mut self, name: &str, kind: SymbolKind) -> SymbolId {
        self.add_member_to(self.body, name, kind)
    }

    pub fn add_member_to(&mut self, scope: SymbolId, name: &str, kind: SymbolKind) -> SymbolId {
        let id = self.comp.add_symbol(Symbol {
            name: name.to_string(),
            parent: Some(scope),
            src: SourceRange::default(),
            attrs: vec![],
            kind,
        });
        match &mut self.comp.symbols[scope.0 as usize].kind {
            SymbolKind::InstanceBody { members }
            | SymbolKind::StatementBlock { members }
            | SymbolKind::GenerateBlock { members, .. }
            | SymbolKind::Subroutine { members, .. } => members.push(id),
            _ => panic!("not a scope"),
        }
        id
    }

    pub fn var(&mut self, name: &str, ty: Type) -> SymbolId {
        self.add_member(
            name,
            SymbolKind::Variable {
                ty,
                initializer: None,
            },
        )
    }

    /// Declare a port: the internal value symbol plus the port symbol.
    /// Returns the internal symbol, which is what expressions reference.
    pub fn port(&mut self, name: &str, direction: PortDirection, ty: Type) -> SymbolId {
        let internal = self.var(name, ty);
        self.add_member(
            name,
            SymbolKind::Port {
                internal,
                direction,
            },
        );
        internal
    }

    pub fn read(&self, sym: SymbolId) -> Expression {
        let ty = self
            .comp
            .symbol(sym)
            .value_type()
            .expect("value symbol")
            .clone();
        Expression {
            ty,
            src: SourceRange::default(),
            kind: ExprKind::NamedValue(sym),
        }
    }

    pub fn continuous_assign(&mut self, lhs: Expression, rhs: Expression) {
        let ty = lhs.ty.clone();
        let assign = Expression {
            ty,
            src: SourceRange::default(),
            kind: ExprKind::Assignment {
                non_blocking: false,
                left: Box::new(lhs),
                right: Box::new(rhs),
            },
        };
        self.add_member("", SymbolKind::ContinuousAssign { assign });
    }

    pub fn always_ff(&mut self, edge: EdgeKind, clock: SymbolId, stmt: Statement) {
        let timing = TimingControl::SignalEvent {
            expr: self.read(clock),
            edge,
            iff: None,
        };
        let body = Statement {
            src: SourceRange::default(),
            attrs: vec![],
            kind: StmtKind::Timed {
                timing,
                stmt: Box::new(stmt),
            },
        };
        self.add_member(
            "",
            SymbolKind::ProceduralBlock {
                kind: ProceduralBlockKind::AlwaysFf,
                body,
            },
        );
    }

    pub fn always_comb(&mut self, stmt: Statement) {
        self.add_member(
            "",
            SymbolKind::ProceduralBlock {
                kind: ProceduralBlockKind::AlwaysComb,
                body: stmt,
            },
        );
    }

    /// Declare `function [ret_width-1:0] name(input [arg_width-1:0] arg);`
    /// with the given body built against the returned (arg, retvar) pair.
    pub fn function1(
        &mut self,
        name: &str,
        ret_ty: Type,
        arg_name: &str,
        arg_ty: Type,
        make_body: impl FnOnce(&TestModule, SymbolId, SymbolId) -> Statement,
    ) -> SymbolId {
        let func = self.add_member(
            name,
            SymbolKind::Subroutine {
                kind: SubroutineKind::Function,
                args: vec![],
                return_var: SymbolId(0),
                body: Statement {
                    src: SourceRange::default(),
                    attrs: vec![],
                    kind: StmtKind::Empty,
                },
                members: vec![],
            },
        );
        let arg = self.add_member_to(
            func,
            arg_name,
            SymbolKind::FormalArgument { ty: arg_ty },
        );
        let ret = self.add_member_to(
            func,
            name,
            SymbolKind::Variable {
                ty: ret_ty,
                initializer: None,
            },
        );
        let body = make_body(self, arg, ret);
        if let SymbolKind::Subroutine {
            args,
            return_var,
            body: b,
            ..
        } = &mut self.comp.symbols[func.0 as usize].kind
        {
            args.push(arg);
            *return_var = ret;
            *b = body;
        }
        func
    }

    pub fn lower(&self) -> slang_netlist::Design {
        slang_netlist::lower(&self.comp).expect("elaboration failed")
    }

    pub fn lower_err(&self) -> slang_netlist::LowerError {
        slang_netlist::lower(&self.comp).expect_err("elaboration unexpectedly succeeded")
    }
}

pub fn lit(value: i64, width: u32) -> Expression {
    Expression {
        ty: Type::logic(width),
        src: SourceRange::default(),
        kind: ExprKind::IntegerLiteral(SVInt::new(
            Const::from_int(value, width as usize).bits(),
            false,
        )),
    }
}

pub fn string_lit(text: &str) -> Expression {
    Expression {
        ty: Type::logic(text.len() as u32 * 8),
        src: SourceRange::default(),
        kind: ExprKind::StringLiteral(text.to_string()),
    }
}

pub fn biop(op: BinaryOperator, left: Expression, right: Expression, ty: Type) -> Expression {
    Expression {
        ty,
        src: SourceRange::default(),
        kind: ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
    }
}

pub fn element_select(value: Expression, selector: Expression, ty: Type) -> Expression {
    Expression {
        ty,
        src: SourceRange::default(),
        kind: ExprKind::ElementSelect {
            value: Box::new(value),
            selector: Box::new(selector),
        },
    }
}

pub fn call_user(func: SymbolId, args: Vec<Expression>, ty: Type) -> Expression {
    Expression {
        ty,
        src: SourceRange::default(),
        kind: ExprKind::Call(CallExpression {
            target: CallTarget::User(func),
            args,
        }),
    }
}

pub fn call_system(name: &str, args: Vec<Expression>, ty: Type) -> Expression {
    Expression {
        ty,
        src: SourceRange::default(),
        kind: ExprKind::Call(CallExpression {
            target: CallTarget::System(name.to_string()),
            args,
        }),
    }
}

pub fn stmt(kind: StmtKind) -> Statement {
    Statement {
        src: SourceRange::default(),
        attrs: vec![],
        kind,
    }
}

pub fn assign_stmt(lhs: Expression, rhs: Expression, blocking: bool) -> Statement {
    let ty = lhs.ty.clone();
    stmt(StmtKind::ExpressionStatement(Expression {
        ty,
        src: SourceRange::default(),
        kind: ExprKind::Assignment {
            non_blocking: !blocking,
            left: Box::new(lhs),
            right: Box::new(rhs),
        },
    }))
}

pub fn seq_block(stmts: Vec<Statement>) -> Statement {
    stmt(StmtKind::Block {
        kind: BlockKind::Sequential,
        body: Box::new(stmt(StmtKind::List(stmts))),
    })
}

pub fn if_stmt(cond: Expression, if_true: Statement, if_false: Option<Statement>) -> Statement {
    stmt(StmtKind::Conditional {
        conditions: vec![ConditionalPart {
            expr: cond,
            has_pattern: false,
        }],
        if_true: Box::new(if_true),
        if_false: if_false.map(Box::new),
    })
}

pub fn case_stmt(
    expr: Expression,
    items: Vec<(Vec<Expression>, Statement)>,
    default_case: Option<Statement>,
) -> Statement {
    stmt(StmtKind::Case {
        condition: CaseCondition::Normal,
        check: UniquePriorityCheck::None,
        expr,
        items: items
            .into_iter()
            .map(|(expressions, stmt)| CaseItem { expressions, stmt })
            .collect(),
        default_case: default_case.map(Box::new),
    })
}

pub fn display_stmt(args: Vec<Expression>) -> Statement {
    stmt(StmtKind::ExpressionStatement(call_system(
        "$display",
        args,
        Type::Void,
    )))
}

/// Look up a wire by its unescaped hierarchical path.
pub fn wire(module: &Module, path: &str) -> WireId {
    module
        .wire(&format!("\\{}", path))
        .unwrap_or_else(|| panic!("no wire \\{}", path))
}

pub fn wire_sig(module: &Module, path: &str) -> SigSpec {
    module.wire_sig(wire(module, path))
}

/// All wires whose generated name marks them as staging shadows.
pub fn staging_wires(module: &Module) -> Vec<WireId> {
    module
        .wires
        .iter()
        .enumerate()
        .filter(|(_, w)| w.name.ends_with("$staging"))
        .map(|(i, _)| WireId(i as u32))
        .collect()
}
