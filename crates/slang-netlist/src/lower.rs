//! Elaboration entry point: walks the instance tree of a checked
//! [`Compilation`] and produces one netlist [`Module`] per instantiated
//! module body.
//!
//! Per body the work is two passes. A wire-adding pre-pass gives every
//! value symbol a wire sized to its bit-stream width (it does not enter
//! child instances). The populating pass then binds ports, lowers
//! continuous assigns, expands child instances into cells and hands every
//! procedural block to the [`proc::ProceduralLowerer`].

mod expr;
mod proc;

use std::collections::BTreeMap;

use log::warn;
use serde::Serialize;
use thiserror::Error;

use crate::ast::{
    Compilation, EdgeKind, ExprKind, ProceduralBlockKind, SourceManager, SourceRange, Statement,
    StmtKind, SVInt, Symbol, SymbolId, SymbolKind, TimingControl,
};
use crate::ast::constant::try_eval;
use crate::builder::NetlistBuilder;
use crate::rtlil::{escape_id, Cell, Const, Design, Module, Process, SigSpec, SyncKind, SyncRule, WireId};

pub(crate) use proc::{Mode, ProcedureContext, ProceduralLowerer};

#[derive(Error, Debug)]
pub enum LowerError {
    #[error(
        "unsupported construct: {feature}\n  at {src}: {line}\n  elaborator {at}\n  node: {dump}"
    )]
    Unsupported {
        feature: &'static str,
        src: String,
        line: String,
        at: String,
        dump: String,
    },

    #[error("unsupported display format ({0})")]
    BadFormat(String),

    #[error("signal width mismatch in {context}: expected {expected} bits, got {got}")]
    WidthMismatch {
        expected: usize,
        got: usize,
        context: &'static str,
    },

    #[error("blocking and non-blocking assignment to the same bit of {signal}")]
    MixedAssignment { signal: String },

    #[error("no wire declared for {path}")]
    UndeclaredWire { path: String },

    #[error("netlist inconsistency: {0}")]
    Inconsistent(String),
}

/// Lower every root instance of the compilation.
pub fn lower(comp: &Compilation) -> Result<Design, LowerError> {
    let mut design = Design::default();
    for &root in &comp.roots {
        lower_instance(comp, root, &mut design)?;
    }
    Ok(design)
}

fn lower_instance(
    comp: &Compilation,
    inst_id: SymbolId,
    design: &mut Design,
) -> Result<(), LowerError> {
    let inst = comp.symbol(inst_id);
    let body_id = match inst.kind {
        SymbolKind::Instance { body, .. } => body,
        _ => {
            return Err(LowerError::Inconsistent(format!(
                "{} is not an instance",
                inst.name
            )))
        }
    };
    if inst.name.is_empty() {
        return Ok(());
    }

    let body = comp.symbol(body_id);
    let mut module = Module::new(escape_id(&comp.hierarchical_path(body_id)));
    transfer_attrs(&comp.sources, body.src, &body.attrs, &mut module.attributes);

    let mut ctx = ModuleCtx { comp, module };
    ctx.add_wires(body_id)?;
    ctx.populate(body_id)?;

    let mut module = ctx.module;
    module.fixup_ports();
    module.check().map_err(LowerError::Inconsistent)?;
    design.add_module(module);

    let mut children = Vec::new();
    collect_child_instances(comp, body_id, &mut children);
    for child in children {
        lower_instance(comp, child, design)?;
    }
    Ok(())
}

fn collect_child_instances(comp: &Compilation, scope: SymbolId, out: &mut Vec<SymbolId>) {
    let members = match &comp.symbol(scope).kind {
        SymbolKind::InstanceBody { members }
        | SymbolKind::StatementBlock { members }
        | SymbolKind::GenerateBlock {
            members,
            uninstantiated: false,
        } => members,
        _ => return,
    };
    for &m in members {
        match &comp.symbol(m).kind {
            SymbolKind::Instance { .. } => out.push(m),
            SymbolKind::StatementBlock { .. } | SymbolKind::GenerateBlock { .. } => {
                collect_child_instances(comp, m, out)
            }
            _ => {}
        }
    }
}

/// Copy the source range and user attributes of an AST node onto an IR
/// attribute map.
pub(crate) fn transfer_attrs(
    sources: &SourceManager,
    src: SourceRange,
    attrs: &[(String, SVInt)],
    target: &mut BTreeMap<String, Const>,
) {
    let rendered = sources.format_range(src);
    if !rendered.is_empty() {
        target.insert("src".to_string(), Const::Str(rendered));
    }
    for (name, value) in attrs {
        target.insert(name.clone(), value.to_const());
    }
}

/// Shared state for lowering one module body.
pub(crate) struct ModuleCtx<'a> {
    pub comp: &'a Compilation,
    pub module: Module,
}

impl<'a> ModuleCtx<'a> {
    pub(crate) fn b(&mut self) -> NetlistBuilder<'_> {
        NetlistBuilder::new(&mut self.module)
    }

    #[track_caller]
    pub(crate) fn unsupported<N: Serialize>(
        &self,
        node: &N,
        src: SourceRange,
        feature: &'static str,
    ) -> LowerError {
        let caller = std::panic::Location::caller();
        LowerError::Unsupported {
            feature,
            src: self.comp.sources.format_range(src),
            line: self.comp.sources.source_line(src).unwrap_or_default(),
            at: format!("{}:{}", caller.file(), caller.line()),
            dump: serde_json::to_string(node).unwrap_or_default(),
        }
    }

    pub(crate) fn wire_id(&self, sym: SymbolId) -> Result<WireId, LowerError> {
        let path = escape_id(&self.comp.hierarchical_path(sym));
        self.module
            .wire(&path)
            .ok_or(LowerError::UndeclaredWire { path })
    }

    pub(crate) fn wire_sig_of(&self, sym: SymbolId) -> Result<SigSpec, LowerError> {
        Ok(self.module.wire_sig(self.wire_id(sym)?))
    }

    /// Tag cells created since `cells_before` with the source range of the
    /// expression or statement that produced them.
    pub(crate) fn src_attr_cells(&mut self, src: SourceRange, cells_before: usize) {
        let rendered = self.comp.sources.format_range(src);
        if rendered.is_empty() {
            return;
        }
        for cell in &mut self.module.cells[cells_before..] {
            cell.attributes
                .entry("src".to_string())
                .or_insert_with(|| Const::Str(rendered.clone()));
        }
    }

    /// Wire-adding pre-pass: every value symbol in the body gets a wire.
    /// Child instances are not entered; subroutine scopes are, so function
    /// locals and return variables get placeholder wires too.
    fn add_wires(&mut self, scope: SymbolId) -> Result<(), LowerError> {
        let comp = self.comp;
        let members = match &comp.symbol(scope).kind {
            SymbolKind::InstanceBody { members }
            | SymbolKind::StatementBlock { members }
            | SymbolKind::Subroutine { members, .. } => members,
            SymbolKind::GenerateBlock {
                members,
                uninstantiated: false,
            } => members,
            _ => return Ok(()),
        };
        for &m in members {
            let sym = comp.symbol(m);
            match &sym.kind {
                SymbolKind::Instance { .. } => {}
                SymbolKind::Net { ty, .. }
                | SymbolKind::Variable { ty, .. }
                | SymbolKind::FormalArgument { ty } => {
                    if !ty.is_fixed_size() {
                        return Err(self.unsupported(sym, sym.src, "dynamically sized value"));
                    }
                    let name = escape_id(&comp.hierarchical_path(m));
                    let id = self.module.add_wire(name, ty.bitstream_width());
                    transfer_attrs(
                        &comp.sources,
                        sym.src,
                        &sym.attrs,
                        &mut self.module.wire_mut(id).attributes,
                    );
                }
                SymbolKind::StatementBlock { .. }
                | SymbolKind::Subroutine { .. }
                | SymbolKind::GenerateBlock { .. } => self.add_wires(m)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn populate(&mut self, scope: SymbolId) -> Result<(), LowerError> {
        let comp = self.comp;
        let members = match &comp.symbol(scope).kind {
            SymbolKind::InstanceBody { members }
            | SymbolKind::StatementBlock { members } => members,
            SymbolKind::GenerateBlock {
                members,
                uninstantiated: false,
            } => members,
            _ => return Ok(()),
        };
        for &m in members {
            let sym = comp.symbol(m);
            match &sym.kind {
                SymbolKind::Parameter { .. }
                | SymbolKind::TypeAlias
                | SymbolKind::NetType
                | SymbolKind::TransparentMember
                | SymbolKind::Subroutine { .. }
                | SymbolKind::Field { .. }
                | SymbolKind::FormalArgument { .. }
                | SymbolKind::Port {
                    direction: crate::ast::PortDirection::Ref,
                    ..
                } => {}

                SymbolKind::StatementBlock { .. }
                | SymbolKind::GenerateBlock { .. }
                | SymbolKind::InstanceBody { .. } => self.populate(m)?,

                SymbolKind::Net { initializer, .. } => {
                    if let Some(init) = initializer {
                        let mut bg = ProcedureContext::default();
                        let rhs = self.evaluate_rhs(init, &mut bg)?;
                        let lhs = self.wire_sig_of(m)?;
                        self.module.connect(lhs, rhs);
                    }
                }

                SymbolKind::Variable { initializer, .. } => {
                    if let Some(init) = initializer {
                        let value = try_eval(comp, init).ok_or_else(|| {
                            self.unsupported(init, init.src, "non-constant variable initializer")
                        })?;
                        let initval = value.to_const();
                        if !initval.is_fully_undef() {
                            let id = self.wire_id(m)?;
                            self.module
                                .wire_mut(id)
                                .attributes
                                .insert("init".to_string(), initval);
                        }
                    }
                }

                SymbolKind::Port {
                    internal,
                    direction,
                } => {
                    let id = self.wire_id(*internal)?;
                    let wire = self.module.wire_mut(id);
                    match direction {
                        crate::ast::PortDirection::In => wire.port_input = true,
                        crate::ast::PortDirection::Out => wire.port_output = true,
                        crate::ast::PortDirection::InOut => {
                            wire.port_input = true;
                            wire.port_output = true;
                        }
                        crate::ast::PortDirection::Ref => unreachable!(),
                    }
                }

                SymbolKind::Instance { .. } => self.populate_instance(m)?,

                SymbolKind::ContinuousAssign { assign } => match &assign.kind {
                    ExprKind::Assignment { left, right, .. } => {
                        let mut bg = ProcedureContext::default();
                        let rhs = self.evaluate_rhs(right, &mut bg)?;
                        let lhs = self.evaluate_lhs(left)?;
                        self.module.connect(lhs, rhs);
                    }
                    _ => {
                        return Err(self.unsupported(
                            assign,
                            assign.src,
                            "continuous assign without assignment expression",
                        ))
                    }
                },

                SymbolKind::ProceduralBlock { kind, body } => {
                    self.populate_procedural(sym, *kind, body)?
                }
            }
        }
        Ok(())
    }

    fn populate_instance(&mut self, inst_id: SymbolId) -> Result<(), LowerError> {
        let comp = self.comp;
        let sym = comp.symbol(inst_id);
        let (body_id, connections) = match &sym.kind {
            SymbolKind::Instance { body, connections } => (*body, connections),
            _ => unreachable!(),
        };
        let mut cell = Cell::new(
            escape_id(&sym.name),
            escape_id(&comp.hierarchical_path(body_id)),
        );
        for conn in connections {
            let Some(conn_expr) = &conn.expr else {
                continue;
            };
            let signal = match &conn_expr.kind {
                ExprKind::Assignment { left, right, .. } => {
                    if !matches!(right.kind, ExprKind::EmptyArgument) {
                        return Err(self.unsupported(
                            conn_expr,
                            conn_expr.src,
                            "port connection shape",
                        ));
                    }
                    self.evaluate_lhs(left)?
                }
                _ => {
                    let mut bg = ProcedureContext::default();
                    self.evaluate_rhs(conn_expr, &mut bg)?
                }
            };
            cell.set_port(&escape_id(&comp.symbol(conn.port).name), signal);
        }
        transfer_attrs(&comp.sources, sym.src, &sym.attrs, &mut cell.attributes);
        self.module.add_cell(cell);
        Ok(())
    }

    fn populate_procedural(
        &mut self,
        sym: &Symbol,
        kind: ProceduralBlockKind,
        body: &Statement,
    ) -> Result<(), LowerError> {
        match kind {
            ProceduralBlockKind::Always | ProceduralBlockKind::AlwaysFf => {
                let (timing, stmt) = match &body.kind {
                    StmtKind::Timed { timing, stmt } => (timing, stmt),
                    _ => {
                        return Err(self.unsupported(
                            body,
                            body.src,
                            "always body without timing control",
                        ))
                    }
                };
                let name = self.module.auto_name();
                let mut proc = Process::new(name);
                transfer_attrs(&self.comp.sources, sym.src, &sym.attrs, &mut proc.attributes);
                self.populate_sync(&mut proc, timing)?;
                let mut lowerer = ProceduralLowerer::new(self, proc, Mode::Always);
                lowerer.visit_stmt(stmt)?;
                lowerer.finish();
            }
            ProceduralBlockKind::AlwaysComb => {
                let name = self.module.auto_name();
                let mut proc = Process::new(name);
                transfer_attrs(&self.comp.sources, sym.src, &sym.attrs, &mut proc.attributes);
                proc.syncs.push(SyncRule {
                    kind: SyncKind::Always,
                    signal: SigSpec::new(),
                    actions: Vec::new(),
                });
                let mut lowerer = ProceduralLowerer::new(self, proc, Mode::Always);
                lowerer.visit_stmt(body)?;
                lowerer.finish();
            }
            ProceduralBlockKind::AlwaysLatch => {
                return Err(self.unsupported(body, body.src, "always_latch block"))
            }
            ProceduralBlockKind::Initial => {
                warn!(
                    "{}: ignoring initial block",
                    self.comp.sources.format_range(sym.src)
                );
            }
            ProceduralBlockKind::Final => {}
        }
        Ok(())
    }

    fn populate_sync(
        &mut self,
        proc: &mut Process,
        timing: &TimingControl,
    ) -> Result<(), LowerError> {
        match timing {
            TimingControl::SignalEvent { expr, edge, iff } => {
                if iff.is_some() {
                    return Err(self.unsupported(timing, expr.src, "iff-qualified sensitivity"));
                }
                let mut bg = ProcedureContext::default();
                let sig = self.evaluate_rhs(expr, &mut bg)?;
                match edge {
                    EdgeKind::None => {
                        warn!(
                            "{}: turning non-edge sensitivity into implicit sensitivity",
                            self.comp.sources.format_range(expr.src)
                        );
                        proc.syncs.push(SyncRule {
                            kind: SyncKind::Always,
                            signal: SigSpec::new(),
                            actions: Vec::new(),
                        });
                    }
                    edge => {
                        if sig.len() != 1 {
                            return Err(self.unsupported(
                                timing,
                                expr.src,
                                "edge sensitivity on a multi-bit signal",
                            ));
                        }
                        let kind = match edge {
                            EdgeKind::PosEdge => SyncKind::Posedge,
                            EdgeKind::NegEdge => SyncKind::Negedge,
                            EdgeKind::BothEdges => SyncKind::EdgeAny,
                            EdgeKind::None => unreachable!(),
                        };
                        proc.syncs.push(SyncRule {
                            kind,
                            signal: sig,
                            actions: Vec::new(),
                        });
                    }
                }
                Ok(())
            }
            TimingControl::ImplicitEvent => {
                proc.syncs.push(SyncRule {
                    kind: SyncKind::Always,
                    signal: SigSpec::new(),
                    actions: Vec::new(),
                });
                Ok(())
            }
            TimingControl::EventList(events) => {
                for event in events {
                    self.populate_sync(proc, event)?;
                }
                Ok(())
            }
            TimingControl::Delay => Err(self.unsupported(
                timing,
                SourceRange::default(),
                "delay timing control",
            )),
        }
    }
}

pub(crate) fn ceil_log2(n: usize) -> usize {
    if n <= 1 {
        0
    } else {
        (usize::BITS - (n - 1).leading_zeros()) as usize
    }
}
