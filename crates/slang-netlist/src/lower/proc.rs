//! Procedural lowering: statements of an always block (or inlined function
//! body) become a priority-ordered case tree plus staging-wire commits.
//!
//! Blocking assignments publish their right-hand side into `rvalue_subs` so
//! later reads in the same procedure see the new value; non-blocking
//! assignments do not. Both write to per-bit staging wires; `finish` emits
//! the root-case defaults (staging <- original) and the per-sync commits
//! (original <- staging) that realize the read-old/write-new semantics.

use std::collections::{BTreeMap, BTreeSet};

use super::{transfer_attrs, LowerError, ModuleCtx};
use crate::ast::{
    CallExpression, CallTarget, CaseCondition, ExprKind, Expression, Statement, StmtKind,
    UniquePriorityCheck,
};
use crate::fmt::{Fmt, FmtArg};
use crate::rtlil::{
    Cell, CaseId, CaseRule, Const, Module, Process, SigBit, SigSpec, State, SwitchRule, SyncKind,
    WireBit,
};
use crate::HashMap;
use log::warn;

/// Mutable evaluation state of one procedure walk.
#[derive(Default)]
pub(crate) struct ProcedureContext {
    /// Wire bits shadowed by blocking assignments, visible to later reads.
    pub rvalue_subs: BTreeMap<WireBit, SigBit>,
    /// Formal-argument bindings of the function being inlined.
    pub args: HashMap<crate::ast::SymbolId, SigSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Always,
    Function,
}

pub(crate) struct ProceduralLowerer<'nc, 'a> {
    nc: &'nc mut ModuleCtx<'a>,
    proc: Process,
    current_case: CaseId,
    ctx: ProcedureContext,
    staging: BTreeMap<WireBit, SigBit>,
    assigned_blocking: BTreeSet<WireBit>,
    assigned_nonblocking: BTreeSet<WireBit>,
    mode: Mode,
    print_priority: i64,
}

impl<'nc, 'a> ProceduralLowerer<'nc, 'a> {
    pub fn new(nc: &'nc mut ModuleCtx<'a>, proc: Process, mode: Mode) -> Self {
        Self::with_context(nc, proc, mode, ProcedureContext::default())
    }

    pub fn with_context(
        nc: &'nc mut ModuleCtx<'a>,
        mut proc: Process,
        mode: Mode,
        ctx: ProcedureContext,
    ) -> Self {
        // All statement-level actions live under a top-level switch so the
        // root case keeps only staging defaults and enable initializers.
        let root = proc.root;
        let top = proc.add_switch(root, SwitchRule::default());
        let current_case = proc.add_case(top, CaseRule::default());
        ProceduralLowerer {
            nc,
            proc,
            current_case,
            ctx,
            staging: BTreeMap::new(),
            assigned_blocking: BTreeSet::new(),
            assigned_nonblocking: BTreeSet::new(),
            mode,
            print_priority: 0,
        }
    }

    pub fn visit_stmt(&mut self, stmt: &Statement) -> Result<(), LowerError> {
        match &stmt.kind {
            StmtKind::Empty | StmtKind::VariableDecl(_) => Ok(()),

            StmtKind::Invalid => Err(LowerError::Inconsistent(
                "invalid statement reached elaboration".to_string(),
            )),

            StmtKind::List(stmts) => {
                for s in stmts {
                    self.visit_stmt(s)?;
                }
                Ok(())
            }

            StmtKind::Block { kind, body } => {
                if *kind != crate::ast::BlockKind::Sequential {
                    return Err(self.nc.unsupported(stmt, stmt.src, "parallel block"));
                }
                self.visit_stmt(body)
            }

            StmtKind::Conditional {
                conditions,
                if_true,
                if_false,
            } => self.lower_conditional(stmt, conditions, if_true, if_false.as_deref()),

            StmtKind::Case {
                condition,
                check,
                expr,
                items,
                default_case,
            } => self.lower_case(stmt, *condition, *check, expr, items, default_case.as_deref()),

            StmtKind::ExpressionStatement(expr) => match &expr.kind {
                ExprKind::Call(call) => self.lower_call_statement(stmt, call),
                ExprKind::Assignment { .. } => self.lower_assignment(stmt, expr),
                _ => Err(self.nc.unsupported(stmt, stmt.src, "expression statement")),
            },

            StmtKind::Timed { .. } => Err(self.nc.unsupported(
                stmt,
                stmt.src,
                "timing control inside a procedure",
            )),
        }
    }

    fn lower_conditional(
        &mut self,
        stmt: &Statement,
        conditions: &[crate::ast::ConditionalPart],
        if_true: &Statement,
        if_false: Option<&Statement>,
    ) -> Result<(), LowerError> {
        if conditions.len() != 1 || conditions[0].has_pattern {
            return Err(self.nc.unsupported(
                stmt,
                stmt.src,
                "conditional with patterns or multiple conditions",
            ));
        }
        let cond = self.nc.evaluate_rhs(&conditions[0].expr, &mut self.ctx)?;
        let cond = self.nc.b().reduce_bool(cond);

        let case_save = self.current_case;
        let mut builder =
            SwitchBuilder::new(&mut self.proc, case_save, &self.ctx.rvalue_subs, cond);
        transfer_attrs(
            &self.nc.comp.sources,
            stmt.src,
            &stmt.attrs,
            &mut self.proc.switch_mut(builder.sw).attributes,
        );

        self.current_case =
            builder.begin_branch(&mut self.proc, vec![SigSpec::from(State::S1)]);
        transfer_attrs(
            &self.nc.comp.sources,
            if_true.src,
            &if_true.attrs,
            &mut self.proc.case_mut(self.current_case).attributes,
        );
        self.visit_stmt(if_true)?;
        builder.end_branch(&mut self.ctx.rvalue_subs);

        if let Some(else_stmt) = if_false {
            self.current_case = builder.begin_branch(&mut self.proc, Vec::new());
            transfer_attrs(
                &self.nc.comp.sources,
                else_stmt.src,
                &else_stmt.attrs,
                &mut self.proc.case_mut(self.current_case).attributes,
            );
            self.visit_stmt(else_stmt)?;
            builder.end_branch(&mut self.ctx.rvalue_subs);
        }

        builder.finish(
            &mut self.nc.module,
            &mut self.proc,
            &mut self.ctx.rvalue_subs,
        );
        self.reopen_after_switch(case_save);
        Ok(())
    }

    fn lower_case(
        &mut self,
        stmt: &Statement,
        condition: CaseCondition,
        check: UniquePriorityCheck,
        expr: &Expression,
        items: &[crate::ast::CaseItem],
        default_case: Option<&Statement>,
    ) -> Result<(), LowerError> {
        if condition != CaseCondition::Normal {
            return Err(self.nc.unsupported(stmt, stmt.src, "wildcard or inside case"));
        }
        if check != UniquePriorityCheck::None {
            warn!(
                "{}: ignoring priority check",
                self.nc.comp.sources.format_range(stmt.src)
            );
        }

        let dispatch = self.nc.evaluate_rhs(expr, &mut self.ctx)?;
        let dispatch_len = dispatch.len();

        let case_save = self.current_case;
        let mut builder =
            SwitchBuilder::new(&mut self.proc, case_save, &self.ctx.rvalue_subs, dispatch);
        transfer_attrs(
            &self.nc.comp.sources,
            stmt.src,
            &stmt.attrs,
            &mut self.proc.switch_mut(builder.sw).attributes,
        );

        for item in items {
            let mut compares = Vec::with_capacity(item.expressions.len());
            for cmp_expr in &item.expressions {
                let compare = self.nc.evaluate_rhs(cmp_expr, &mut self.ctx)?;
                if compare.len() != dispatch_len {
                    return Err(LowerError::WidthMismatch {
                        expected: dispatch_len,
                        got: compare.len(),
                        context: "case compare",
                    });
                }
                compares.push(compare);
            }
            if compares.is_empty() {
                return Err(self.nc.unsupported(stmt, stmt.src, "case item without labels"));
            }
            self.current_case = builder.begin_branch(&mut self.proc, compares);
            transfer_attrs(
                &self.nc.comp.sources,
                item.stmt.src,
                &item.stmt.attrs,
                &mut self.proc.case_mut(self.current_case).attributes,
            );
            self.visit_stmt(&item.stmt)?;
            builder.end_branch(&mut self.ctx.rvalue_subs);
        }

        if let Some(default_stmt) = default_case {
            self.current_case = builder.begin_branch(&mut self.proc, Vec::new());
            transfer_attrs(
                &self.nc.comp.sources,
                default_stmt.src,
                &default_stmt.attrs,
                &mut self.proc.case_mut(self.current_case).attributes,
            );
            self.visit_stmt(default_stmt)?;
            builder.end_branch(&mut self.ctx.rvalue_subs);
        }

        builder.finish(
            &mut self.nc.module,
            &mut self.proc,
            &mut self.ctx.rvalue_subs,
        );
        self.reopen_after_switch(case_save);
        Ok(())
    }

    /// Descend into an empty switch after an if/case so that follow-up
    /// statements land at lower priority than the branches just emitted.
    fn reopen_after_switch(&mut self, parent: CaseId) {
        let dummy = self.proc.add_switch(parent, SwitchRule::default());
        self.current_case = self.proc.add_case(dummy, CaseRule::default());
    }

    fn lower_call_statement(
        &mut self,
        stmt: &Statement,
        call: &CallExpression,
    ) -> Result<(), LowerError> {
        match &call.target {
            CallTarget::System(name) if name == "$display" => self.lower_display(stmt, call),
            // tolerated no-op placeholder some frontends insert
            CallTarget::User(id) if self.nc.comp.symbol(*id).name == "empty_statement" => Ok(()),
            _ => Err(self.nc.unsupported(stmt, stmt.src, "call statement")),
        }
    }

    fn lower_display(
        &mut self,
        stmt: &Statement,
        call: &CallExpression,
    ) -> Result<(), LowerError> {
        let mut fargs = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            match &arg.kind {
                ExprKind::StringLiteral(text) => fargs.push(FmtArg::Str(text.clone())),
                ExprKind::Call(inner) => match &inner.target {
                    CallTarget::System(name) if name == "$time" => {
                        fargs.push(FmtArg::Time { realtime: false })
                    }
                    CallTarget::System(name) if name == "$realtime" => {
                        fargs.push(FmtArg::Time { realtime: true })
                    }
                    _ => fargs.push(FmtArg::Int {
                        sig: self.nc.evaluate_rhs(arg, &mut self.ctx)?,
                        signed: arg.ty.is_signed(),
                    }),
                },
                _ => fargs.push(FmtArg::Int {
                    sig: self.nc.evaluate_rhs(arg, &mut self.ctx)?,
                    signed: arg.ty.is_signed(),
                }),
            }
        }
        let mut fmt = Fmt::parse_display(fargs, 10).map_err(LowerError::BadFormat)?;
        fmt.append_literal("\n");

        self.print_priority -= 1;
        let name = self.nc.module.auto_name();
        let mut cell = Cell::new(name, "print");
        transfer_attrs(
            &self.nc.comp.sources,
            stmt.src,
            &stmt.attrs,
            &mut cell.attributes,
        );
        self.set_print_trigger(&mut cell)?;
        cell.set_param_int("PRIORITY", self.print_priority);
        fmt.emit_to_cell(&mut cell);
        self.nc.module.add_cell(cell);
        Ok(())
    }

    /// Derive the trigger of a `print` cell from the enclosing process's
    /// sync rules and gate it on an enable that is 1 only when control
    /// reaches the current case.
    fn set_print_trigger(&mut self, cell: &mut Cell) -> Result<(), LowerError> {
        let mut implicit = false;
        let mut triggers = SigSpec::new();
        let mut polarity = Vec::new();
        for sync in &self.proc.syncs {
            match sync.kind {
                SyncKind::Posedge | SyncKind::Negedge => {
                    triggers.append(sync.signal.clone());
                    polarity.push(if sync.kind == SyncKind::Posedge {
                        State::S1
                    } else {
                        State::S0
                    });
                }
                SyncKind::Always => implicit = true,
                SyncKind::EdgeAny => {
                    return Err(LowerError::Inconsistent(
                        "print in a dual-edge process".to_string(),
                    ))
                }
            }
        }
        if triggers.is_empty() && !implicit {
            return Err(LowerError::Inconsistent(
                "print outside any sync context".to_string(),
            ));
        }
        if !triggers.is_empty() && implicit {
            return Err(LowerError::Inconsistent(
                "print with mixed edge and implicit sensitivity".to_string(),
            ));
        }
        cell.set_param_bool("TRG_ENABLE", !implicit);
        cell.set_param_int("TRG_WIDTH", triggers.len() as i64);
        cell.set_param("TRG_POLARITY", Const::Bits(polarity));
        cell.set_port("TRG", triggers);
        let enable = self.context_enable();
        cell.set_port("EN", enable.into());
        Ok(())
    }

    /// A 1-bit wire that reads 1 exactly when control reaches the current
    /// case: 0 in the root case, overridden to 1 in the current branch.
    fn context_enable(&mut self) -> SigBit {
        let name = self.nc.module.auto_name();
        let wire = self.nc.module.add_wire(name, 1);
        let bit = SigBit::Wire(WireBit { wire, offset: 0 });
        let root = self.proc.root;
        self.proc
            .case_mut(root)
            .actions
            .push((bit.into(), State::S0.into()));
        self.proc
            .case_mut(self.current_case)
            .actions
            .push((bit.into(), State::S1.into()));
        bit
    }

    fn lower_assignment(
        &mut self,
        stmt: &Statement,
        expr: &Expression,
    ) -> Result<(), LowerError> {
        let (non_blocking, left, right) = match &expr.kind {
            ExprKind::Assignment {
                non_blocking,
                left,
                right,
            } => (*non_blocking, left, right),
            _ => unreachable!(),
        };
        let blocking = !non_blocking;
        if non_blocking && self.mode == Mode::Function {
            return Err(self.nc.unsupported(
                stmt,
                stmt.src,
                "non-blocking assignment in a function",
            ));
        }

        let rvalue = self.nc.evaluate_rhs(right, &mut self.ctx)?;

        // Etch outward through selects and member accesses, growing a
        // (mask, rvalue) pair to the width of the next-larger l-value node.
        let mut raw_lexpr: &Expression = left;
        let mut raw_mask = SigSpec::repeated(State::S1, rvalue.len());
        let mut raw_rvalue = rvalue;
        let mut finished_etching = false;
        while !finished_etching {
            match &raw_lexpr.kind {
                ExprKind::RangeSelect {
                    kind,
                    value,
                    left: sel_left,
                    right: sel_right,
                } => {
                    let (range, stride, raw_left, raw_right) = self
                        .nc
                        .constant_range_select(raw_lexpr, *kind, value, sel_left, sel_right)?;
                    let zeros = SigSpec::repeated(State::S0, stride);
                    let undefs = SigSpec::repeated(State::Sx, stride);
                    let above = range.width() - raw_left - 1;
                    raw_mask = SigSpec::concat([
                        zeros.repeat(above),
                        raw_mask,
                        zeros.repeat(raw_right),
                    ]);
                    raw_rvalue = SigSpec::concat([
                        undefs.repeat(above),
                        raw_rvalue,
                        undefs.repeat(raw_right),
                    ]);
                    raw_lexpr = value;
                }
                ExprKind::ElementSelect { value, selector } => {
                    let range = value.ty.fixed_range().ok_or_else(|| {
                        self.nc.unsupported(
                            raw_lexpr,
                            raw_lexpr.src,
                            "element select on unranged value",
                        )
                    })?;
                    let stride = raw_lexpr.ty.bitstream_width();
                    let (raw_idx, _valid) =
                        self.nc.translate_index(selector, range, &mut self.ctx)?;
                    raw_mask = self.nc.b().demux(raw_mask, raw_idx);
                    raw_mask.extend_u0(stride * range.width(), false);
                    raw_rvalue = raw_rvalue.repeat(range.width());
                    raw_lexpr = value;
                }
                ExprKind::MemberAccess { value, member } => {
                    let offset = match &self.nc.comp.symbol(*member).kind {
                        crate::ast::SymbolKind::Field { bit_offset, .. } => {
                            *bit_offset as usize
                        }
                        _ => {
                            return Err(self.nc.unsupported(
                                raw_lexpr,
                                raw_lexpr.src,
                                "member access on non-field",
                            ))
                        }
                    };
                    let width = raw_lexpr.ty.bitstream_width();
                    let pad = value.ty.bitstream_width() - width - offset;
                    raw_mask = SigSpec::concat([
                        SigSpec::repeated(State::S0, pad),
                        raw_mask,
                        SigSpec::repeated(State::S0, offset),
                    ]);
                    raw_rvalue = SigSpec::concat([
                        SigSpec::repeated(State::Sx, pad),
                        raw_rvalue,
                        SigSpec::repeated(State::Sx, offset),
                    ]);
                    raw_lexpr = value;
                }
                _ => finished_etching = true,
            }
            if raw_mask.len() != raw_lexpr.ty.bitstream_width() {
                return Err(self.nc.unsupported(
                    raw_lexpr,
                    raw_lexpr.src,
                    "assignment target shape",
                ));
            }
        }

        let lvalue_full = self.nc.evaluate_lhs(raw_lexpr)?;
        let keep: Vec<bool> = raw_mask
            .iter()
            .map(|b| *b != SigBit::Const(State::S0))
            .collect();
        let lvalue = crop(&lvalue_full, &keep);
        let mut masked_rvalue = crop(&raw_rvalue, &keep);
        let mask = crop(&raw_mask, &keep);

        if !mask.is_fully_ones() {
            let sampled = lvalue.replaced(&self.ctx.rvalue_subs);
            masked_rvalue = self.nc.b().bwmux(sampled, masked_rvalue, mask);
        }

        if lvalue.len() != masked_rvalue.len() {
            return Err(LowerError::WidthMismatch {
                expected: lvalue.len(),
                got: masked_rvalue.len(),
                context: "assignment",
            });
        }

        let mut dest_bits = Vec::with_capacity(lvalue.len());
        for bit in lvalue.iter() {
            dest_bits.push(bit.wire_bit().ok_or_else(|| {
                LowerError::Inconsistent("assignment to a constant bit".to_string())
            })?);
        }

        if blocking {
            for wb in &dest_bits {
                if self.assigned_nonblocking.contains(wb) {
                    return Err(self.mixed_assignment(*wb));
                }
            }
            for (i, wb) in dest_bits.iter().enumerate() {
                self.ctx.rvalue_subs.insert(*wb, masked_rvalue.bit(i));
                self.assigned_blocking.insert(*wb);
            }
        } else {
            for wb in &dest_bits {
                if self.assigned_blocking.contains(wb) {
                    return Err(self.mixed_assignment(*wb));
                }
            }
            for wb in &dest_bits {
                self.assigned_nonblocking.insert(*wb);
            }
        }

        let staged = self.staging_signal(&lvalue)?;
        self.proc
            .case_mut(self.current_case)
            .actions
            .push((staged, masked_rvalue));
        Ok(())
    }

    fn mixed_assignment(&self, wb: WireBit) -> LowerError {
        LowerError::MixedAssignment {
            signal: self.nc.module.wire_data(wb.wire).name.clone(),
        }
    }

    /// Map destination bits to their per-process staging wires, allocating
    /// a fresh 1-bit staging wire on first use. The mapping is stable for
    /// the rest of the procedure.
    fn staging_signal(&mut self, lvalue: &SigSpec) -> Result<SigSpec, LowerError> {
        for bit in lvalue.iter() {
            let wb = bit.wire_bit().ok_or_else(|| {
                LowerError::Inconsistent("staging a constant bit".to_string())
            })?;
            if !self.staging.contains_key(&wb) {
                let name = self.nc.module.auto_name_suffix("staging");
                let wire = self.nc.module.add_wire(name, 1);
                self.staging
                    .insert(wb, SigBit::Wire(WireBit { wire, offset: 0 }));
            }
        }
        Ok(lvalue.replaced(&self.staging))
    }

    /// Emit the staging defaults and commits, append the finished process
    /// to the module, and hand the staging map to the caller (function
    /// inlining reads the staged return bits through it).
    pub fn finish(self) -> BTreeMap<WireBit, SigBit> {
        let ProceduralLowerer {
            nc,
            mut proc,
            staging,
            ..
        } = self;
        let root = proc.root;
        for (original, shadow) in &staging {
            let original_sig = SigSpec::from(SigBit::Wire(*original));
            let shadow_sig = SigSpec::from(*shadow);
            for sync in &mut proc.syncs {
                sync.actions.push((original_sig.clone(), shadow_sig.clone()));
            }
            proc.case_mut(root).actions.push((shadow_sig, original_sig));
        }
        nc.module.add_process(proc);
        staging
    }
}

fn crop(sig: &SigSpec, keep: &[bool]) -> SigSpec {
    let bits: Vec<SigBit> = sig
        .iter()
        .zip(keep)
        .filter_map(|(bit, k)| if *k { Some(*bit) } else { None })
        .collect();
    SigSpec::from(bits)
}

/// Builds one switch rule and reconciles per-branch divergence of the
/// blocking-substitution map back into the parent scope.
///
/// Each branch runs against a snapshot of `rvalue_subs`; on exit the
/// divergent bits are recorded and the snapshot restored. `finish`
/// allocates one shadow wire per diverged destination bit, defaults it in
/// the parent case to the pre-switch value, overrides it per branch, and
/// re-points `rvalue_subs` at the shadow so enclosing code reads the merged
/// value.
struct SwitchBuilder {
    parent: CaseId,
    sw: crate::rtlil::SwitchId,
    subs_save: BTreeMap<WireBit, SigBit>,
    current_branch: Option<CaseId>,
    branch_updates: Vec<(CaseId, SigSpec, SigSpec)>,
}

impl SwitchBuilder {
    fn new(
        proc: &mut Process,
        parent: CaseId,
        subs: &BTreeMap<WireBit, SigBit>,
        signal: SigSpec,
    ) -> Self {
        let sw = proc.add_switch(
            parent,
            SwitchRule {
                signal,
                ..SwitchRule::default()
            },
        );
        SwitchBuilder {
            parent,
            sw,
            subs_save: subs.clone(),
            current_branch: None,
            branch_updates: Vec::new(),
        }
    }

    fn begin_branch(&mut self, proc: &mut Process, compare: Vec<SigSpec>) -> CaseId {
        let case = proc.add_case(
            self.sw,
            CaseRule {
                compare,
                ..CaseRule::default()
            },
        );
        self.current_branch = Some(case);
        case
    }

    fn end_branch(&mut self, subs: &mut BTreeMap<WireBit, SigBit>) {
        let case = self.current_branch.take().expect("no open branch");
        let mut update = SigSpec::new();
        for (bit, repl) in subs.iter() {
            if self.subs_save.get(bit) != Some(repl) {
                update.push(SigBit::Wire(*bit));
            }
        }
        update.sort_and_unify();
        let update_map = update.replaced(subs);
        self.branch_updates.push((case, update, update_map));
        *subs = self.subs_save.clone();
    }

    fn finish(
        self,
        module: &mut Module,
        proc: &mut Process,
        subs: &mut BTreeMap<WireBit, SigBit>,
    ) {
        let mut updated_anybranch = SigSpec::new();
        for (_, targets, _) in &self.branch_updates {
            updated_anybranch.append(targets.clone());
        }
        updated_anybranch.sort_and_unify();

        for bit in updated_anybranch.iter() {
            let wb = bit.wire_bit().expect("update targets are wire bits");
            let name = module.auto_name();
            let wire = module.add_wire(name, 1);
            let shadow = SigBit::Wire(WireBit { wire, offset: 0 });
            // parent-scope value: an outer shadow if one exists, else the
            // destination wire bit itself
            let default_src = SigSpec::from(SigBit::Wire(wb)).replaced(subs);
            proc.case_mut(self.parent)
                .actions
                .push((shadow.into(), default_src));
            subs.insert(wb, shadow);
        }

        for (case, targets, sources) in self.branch_updates {
            for (i, bit) in targets.iter().enumerate() {
                let wb = bit.wire_bit().expect("update targets are wire bits");
                let shadow = subs[&wb];
                proc.case_mut(case)
                    .actions
                    .push((shadow.into(), sources.extract(i, 1)));
            }
        }
    }
}
