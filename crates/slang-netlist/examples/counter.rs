//! Build a small checked AST by hand — an 8-bit resettable counter — run
//! elaboration and print the resulting netlist IR.
//!
//! This is the same structure the `slang` binary receives as JSON from the
//! external driver.

use slang_netlist::ast::{
    BinaryOperator, BlockKind, Compilation, ConditionalPart, EdgeKind, ExprKind, Expression,
    PortDirection, ProceduralBlockKind, SourceRange, Statement, StmtKind, SVInt, Symbol,
    SymbolId, SymbolKind, TimingControl, Type,
};
use slang_netlist::rtlil::Const;

fn sym(name: &str, parent: Option<SymbolId>, kind: SymbolKind) -> Symbol {
    Symbol {
        name: name.to_string(),
        parent,
        src: SourceRange::default(),
        attrs: vec![],
        kind,
    }
}

fn read(comp: &Compilation, id: SymbolId) -> Expression {
    let ty = comp.symbol(id).value_type().expect("value symbol").clone();
    Expression {
        ty,
        src: SourceRange::default(),
        kind: ExprKind::NamedValue(id),
    }
}

fn lit(value: i64, width: u32) -> Expression {
    Expression {
        ty: Type::logic(width),
        src: SourceRange::default(),
        kind: ExprKind::IntegerLiteral(SVInt::new(
            Const::from_int(value, width as usize).bits(),
            false,
        )),
    }
}

fn assign(lhs: Expression, rhs: Expression, non_blocking: bool) -> Statement {
    let ty = lhs.ty.clone();
    Statement {
        src: SourceRange::default(),
        attrs: vec![],
        kind: StmtKind::ExpressionStatement(Expression {
            ty,
            src: SourceRange::default(),
            kind: ExprKind::Assignment {
                non_blocking,
                left: Box::new(lhs),
                right: Box::new(rhs),
            },
        }),
    }
}

fn main() {
    let mut comp = Compilation::default();

    let inst = comp.add_symbol(sym(
        "counter",
        None,
        SymbolKind::Instance {
            body: SymbolId(0),
            connections: vec![],
        },
    ));
    let body = comp.add_symbol(sym(
        "",
        Some(inst),
        SymbolKind::InstanceBody { members: vec![] },
    ));
    if let SymbolKind::Instance { body: b, .. } = &mut comp.symbols[inst.0 as usize].kind {
        *b = body;
    }
    comp.roots.push(inst);

    let mut members = Vec::new();
    let mut value = |comp: &mut Compilation, name: &str, ty: Type| {
        let id = comp.add_symbol(sym(
            name,
            Some(body),
            SymbolKind::Variable {
                ty,
                initializer: None,
            },
        ));
        members.push(id);
        id
    };
    let clk = value(&mut comp, "clk", Type::logic(1));
    let rst = value(&mut comp, "rst", Type::logic(1));
    let count = value(&mut comp, "count", Type::logic(8));
    let out = value(&mut comp, "out", Type::logic(8));

    for (internal, direction) in [
        (clk, PortDirection::In),
        (rst, PortDirection::In),
        (out, PortDirection::Out),
    ] {
        members.push(comp.add_symbol(sym(
            "",
            Some(body),
            SymbolKind::Port {
                internal,
                direction,
            },
        )));
    }

    // always_ff @(posedge clk) if (rst) count <= 0; else count <= count + 1;
    let step = Expression {
        ty: Type::logic(8),
        src: SourceRange::default(),
        kind: ExprKind::Binary {
            op: BinaryOperator::Add,
            left: Box::new(read(&comp, count)),
            right: Box::new(lit(1, 8)),
        },
    };
    let ff_body = Statement {
        src: SourceRange::default(),
        attrs: vec![],
        kind: StmtKind::Block {
            kind: BlockKind::Sequential,
            body: Box::new(Statement {
                src: SourceRange::default(),
                attrs: vec![],
                kind: StmtKind::Conditional {
                    conditions: vec![ConditionalPart {
                        expr: read(&comp, rst),
                        has_pattern: false,
                    }],
                    if_true: Box::new(assign(read(&comp, count), lit(0, 8), true)),
                    if_false: Some(Box::new(assign(read(&comp, count), step, true))),
                },
            }),
        },
    };
    members.push(comp.add_symbol(sym(
        "",
        Some(body),
        SymbolKind::ProceduralBlock {
            kind: ProceduralBlockKind::AlwaysFf,
            body: Statement {
                src: SourceRange::default(),
                attrs: vec![],
                kind: StmtKind::Timed {
                    timing: TimingControl::SignalEvent {
                        expr: read(&comp, clk),
                        edge: EdgeKind::PosEdge,
                        iff: None,
                    },
                    stmt: Box::new(ff_body),
                },
            },
        },
    )));

    // assign out = count;
    let cont = Expression {
        ty: Type::logic(8),
        src: SourceRange::default(),
        kind: ExprKind::Assignment {
            non_blocking: false,
            left: Box::new(read(&comp, out)),
            right: Box::new(read(&comp, count)),
        },
    };
    members.push(comp.add_symbol(sym(
        "",
        Some(body),
        SymbolKind::ContinuousAssign { assign: cont },
    )));

    if let SymbolKind::InstanceBody { members: m } = &mut comp.symbols[body.0 as usize].kind {
        *m = members;
    }

    let design = slang_netlist::lower(&comp).expect("elaboration failed");
    print!("{}", design);
}
