//! Expression lowering: l-values resolve to existing wire bits, r-values
//! may emit cells through the builder and see blocking-assignment shadows
//! from the active procedure context.

use super::{ceil_log2, LowerError, ModuleCtx, ProcedureContext};
use crate::ast::constant::try_eval;
use crate::ast::{
    BinaryOperator, CallExpression, CallTarget, ConstantRange, ExprKind, Expression,
    RangeSelectionKind, SubroutineKind, SymbolKind, UnaryOperator,
};
use crate::rtlil::{Process, SigSpec, State};

impl<'a> ModuleCtx<'a> {
    fn check_width(
        &self,
        expr: &Expression,
        sig: SigSpec,
        context: &'static str,
    ) -> Result<SigSpec, LowerError> {
        let expected = expr.ty.bitstream_width();
        if sig.len() != expected {
            return Err(LowerError::WidthMismatch {
                expected,
                got: sig.len(),
                context,
            });
        }
        Ok(sig)
    }

    /// Resolve an assignment target to existing wire bits. Never creates
    /// logic; selects and member accesses must be constant.
    pub(crate) fn evaluate_lhs(&mut self, expr: &Expression) -> Result<SigSpec, LowerError> {
        if !expr.ty.is_fixed_size() {
            return Err(self.unsupported(expr, expr.src, "dynamically sized l-value"));
        }
        let ret = match &expr.kind {
            ExprKind::NamedValue(sym) => self.wire_sig_of(*sym)?,

            ExprKind::Concatenation { operands } => {
                let mut ret = SigSpec::new();
                for op in operands {
                    let part = self.evaluate_lhs(op)?;
                    ret = SigSpec::concat([ret, part]);
                }
                ret
            }

            ExprKind::RangeSelect {
                kind,
                value,
                left,
                right,
            } => {
                let (_, stride, raw_left, raw_right) =
                    self.constant_range_select(expr, *kind, value, left, right)?;
                let base = self.evaluate_lhs(value)?;
                base.extract(raw_right * stride, stride * (raw_left - raw_right + 1))
            }

            ExprKind::ElementSelect { value, selector } => {
                let idx = try_eval(self.comp, selector)
                    .and_then(|v| v.integer()?.as_i64())
                    .ok_or_else(|| {
                        self.unsupported(expr, expr.src, "non-constant element select target")
                    })? as i32;
                let range = value.ty.fixed_range().ok_or_else(|| {
                    self.unsupported(expr, expr.src, "element select on unranged value")
                })?;
                if !range.contains(idx) {
                    return Err(LowerError::Inconsistent(format!(
                        "constant element select index {} outside [{}:{}]",
                        idx, range.left, range.right
                    )));
                }
                let stride = expr.ty.bitstream_width();
                let raw_idx = range.translate_index(idx) as usize;
                let base = self.evaluate_lhs(value)?;
                base.extract(stride * raw_idx, stride)
            }

            ExprKind::MemberAccess { value, member } => {
                let offset = self.field_offset(expr, *member)?;
                let base = self.evaluate_lhs(value)?;
                base.extract(offset, expr.ty.bitstream_width())
            }

            _ => return Err(self.unsupported(expr, expr.src, "l-value expression kind")),
        };
        self.check_width(expr, ret, "l-value")
    }

    /// Lower an expression to a bit vector, emitting cells as needed.
    /// Constant subtrees fold through the frontend's evaluator first;
    /// named values are read through the blocking-substitution map.
    pub(crate) fn evaluate_rhs(
        &mut self,
        expr: &Expression,
        pctx: &mut ProcedureContext,
    ) -> Result<SigSpec, LowerError> {
        if !expr.ty.is_fixed_size() {
            return Err(self.unsupported(expr, expr.src, "dynamically sized r-value"));
        }

        if let Some(value) = try_eval(self.comp, expr) {
            return self.check_width(expr, value.to_const().into(), "constant r-value");
        }

        let y_width = expr.ty.bitstream_width();
        let ret = match &expr.kind {
            ExprKind::IntegerLiteral(sv) => SigSpec::from(sv.to_const()),

            ExprKind::NamedValue(sym) => match &self.comp.symbol(*sym).kind {
                SymbolKind::Net { .. } | SymbolKind::Variable { .. } => {
                    if self.comp.enclosing_body(*sym).is_none() {
                        return Err(self.unsupported(
                            expr,
                            expr.src,
                            "value outside an instance body",
                        ));
                    }
                    self.wire_sig_of(*sym)?.replaced(&pctx.rvalue_subs)
                }
                SymbolKind::Parameter { value, .. } => value.to_const().into(),
                SymbolKind::FormalArgument { .. } => {
                    pctx.args.get(sym).cloned().ok_or_else(|| {
                        self.unsupported(expr, expr.src, "formal argument outside a call")
                    })?
                }
                _ => return Err(self.unsupported(expr, expr.src, "named value kind")),
            },

            ExprKind::Unary { op, operand } => {
                let a = self.evaluate_rhs(operand, pctx)?;
                let a_signed = operand.ty.is_signed();
                let cells_before = self.module.cells.len();
                let ret = match op {
                    UnaryOperator::Plus => self.b().unop("pos", a, a_signed, y_width),
                    UnaryOperator::Minus => self.b().unop("neg", a, a_signed, y_width),
                    UnaryOperator::BitwiseNot => self.b().unop("not", a, a_signed, y_width),
                    UnaryOperator::LogicalNot => {
                        self.b().unop("logic_not", a, a_signed, y_width)
                    }
                    UnaryOperator::BitwiseAnd => {
                        self.b().unop("reduce_and", a, a_signed, y_width)
                    }
                    UnaryOperator::BitwiseOr => self.b().unop("reduce_or", a, a_signed, y_width),
                    UnaryOperator::BitwiseXor => {
                        self.b().unop("reduce_xor", a, a_signed, y_width)
                    }
                    UnaryOperator::BitwiseXnor => {
                        self.b().unop("reduce_xnor", a, a_signed, y_width)
                    }
                    UnaryOperator::BitwiseNand => {
                        let reduced = self.b().unop("reduce_and", a, a_signed, y_width);
                        self.b().unop("logic_not", reduced, false, y_width)
                    }
                    UnaryOperator::BitwiseNor => {
                        let reduced = self.b().unop("reduce_or", a, a_signed, y_width);
                        self.b().unop("logic_not", reduced, false, y_width)
                    }
                };
                self.src_attr_cells(expr.src, cells_before);
                ret
            }

            ExprKind::Binary { op, left, right } => {
                let a = self.evaluate_rhs(left, pctx)?;
                let b = self.evaluate_rhs(right, pctx)?;
                let opcode = match op {
                    BinaryOperator::Add => "add",
                    BinaryOperator::Subtract => "sub",
                    BinaryOperator::Multiply => "mul",
                    // TODO: revisit divfloor vs div once downstream
                    // conformance on negative division is settled
                    BinaryOperator::Divide => "divfloor",
                    BinaryOperator::Mod => "mod",
                    BinaryOperator::BinaryAnd => "and",
                    BinaryOperator::BinaryOr => "or",
                    BinaryOperator::BinaryXor => "xor",
                    BinaryOperator::BinaryXnor => "xnor",
                    BinaryOperator::Equality => "eq",
                    BinaryOperator::Inequality => "ne",
                    BinaryOperator::GreaterThanEqual => "ge",
                    BinaryOperator::GreaterThan => "gt",
                    BinaryOperator::LessThanEqual => "le",
                    BinaryOperator::LessThan => "lt",
                    BinaryOperator::LogicalAnd => "logic_and",
                    BinaryOperator::LogicalOr => "logic_or",
                    BinaryOperator::LogicalShiftLeft => "sshl",
                    BinaryOperator::LogicalShiftRight => "sshr",
                    BinaryOperator::ArithmeticShiftLeft => "shl",
                    BinaryOperator::ArithmeticShiftRight => "shr",
                    BinaryOperator::Power => "pow",
                    BinaryOperator::CaseEquality
                    | BinaryOperator::CaseInequality
                    | BinaryOperator::WildcardEquality
                    | BinaryOperator::WildcardInequality
                    | BinaryOperator::LogicalImplication
                    | BinaryOperator::LogicalEquivalence => {
                        return Err(self.unsupported(expr, expr.src, "binary operator"))
                    }
                };
                let cells_before = self.module.cells.len();
                let ret = self.b().biop(
                    opcode,
                    a,
                    b,
                    left.ty.is_signed(),
                    right.ty.is_signed(),
                    y_width,
                );
                self.src_attr_cells(expr.src, cells_before);
                ret
            }

            ExprKind::Conversion { operand } => {
                let from = &operand.ty;
                let to = &expr.ty;
                if !from.is_integral() || !to.is_integral() {
                    return Err(self.unsupported(expr, expr.src, "non-integral conversion"));
                }
                if from.is_signed() != to.is_signed()
                    && to.bitstream_width() > from.bitstream_width()
                {
                    return Err(self.unsupported(
                        expr,
                        expr.src,
                        "widening conversion with sign change",
                    ));
                }
                let mut ret = self.evaluate_rhs(operand, pctx)?;
                ret.extend_u0(to.bitstream_width(), to.is_signed());
                ret
            }

            ExprKind::RangeSelect {
                kind,
                value,
                left,
                right,
            } => {
                let (_, stride, raw_left, raw_right) =
                    self.constant_range_select(expr, *kind, value, left, right)?;
                let base = self.evaluate_rhs(value, pctx)?;
                base.extract(raw_right * stride, stride * (raw_left - raw_right + 1))
            }

            ExprKind::ElementSelect { value, selector } => {
                let range = value.ty.fixed_range().ok_or_else(|| {
                    self.unsupported(expr, expr.src, "element select on unranged value")
                })?;
                let stride = expr.ty.bitstream_width();
                let mut base = self.evaluate_rhs(value, pctx)?;
                if stride == 0 || base.len() % stride != 0 {
                    return Err(LowerError::Inconsistent(format!(
                        "element stride {} does not divide base width {}",
                        stride,
                        base.len()
                    )));
                }
                let (raw_idx, valid) = self.translate_index(selector, range, pctx)?;
                let footprint = stride << raw_idx.len();
                base.append(SigSpec::repeated(State::Sx, footprint - base.len()));
                let picked = self.b().bmux(base, raw_idx);
                // out-of-range reads resolve to X
                self.b()
                    .mux(SigSpec::repeated(State::Sx, stride), picked, valid)
            }

            ExprKind::Concatenation { operands } => {
                let mut ret = SigSpec::new();
                for op in operands {
                    let part = self.evaluate_rhs(op, pctx)?;
                    ret = SigSpec::concat([ret, part]);
                }
                ret
            }

            ExprKind::Replication { count, concat } => {
                let reps = try_eval(self.comp, count)
                    .and_then(|v| v.integer()?.as_i64())
                    .ok_or_else(|| {
                        self.unsupported(expr, expr.src, "non-constant replication count")
                    })?;
                let inner = self.evaluate_rhs(concat, pctx)?;
                inner.repeat(reps as usize)
            }

            ExprKind::Conditional {
                conditions,
                left,
                right,
            } => {
                if conditions.len() != 1 || conditions[0].has_pattern {
                    return Err(self.unsupported(
                        expr,
                        expr.src,
                        "conditional with patterns or multiple conditions",
                    ));
                }
                let cond = self.evaluate_rhs(&conditions[0].expr, pctx)?;
                let cond = self.b().reduce_bool(cond);
                let else_val = self.evaluate_rhs(right, pctx)?;
                let then_val = self.evaluate_rhs(left, pctx)?;
                let cells_before = self.module.cells.len();
                let ret = self.b().mux(else_val, then_val, cond);
                self.src_attr_cells(expr.src, cells_before);
                ret
            }

            ExprKind::MemberAccess { value, member } => {
                let offset = self.field_offset(expr, *member)?;
                let base = self.evaluate_rhs(value, pctx)?;
                base.extract(offset, y_width)
            }

            ExprKind::Call(call) => match &call.target {
                CallTarget::System(name) if name == "$signed" => {
                    if call.args.len() != 1 {
                        return Err(self.unsupported(expr, expr.src, "$signed arity"));
                    }
                    self.evaluate_rhs(&call.args[0], pctx)?
                }
                CallTarget::System(_) => {
                    return Err(self.unsupported(expr, expr.src, "system call"))
                }
                CallTarget::User(_) => self.evaluate_function(expr, call, pctx)?,
            },

            ExprKind::StringLiteral(_)
            | ExprKind::Assignment { .. }
            | ExprKind::EmptyArgument => {
                return Err(self.unsupported(expr, expr.src, "r-value expression kind"))
            }
        };
        self.check_width(expr, ret, "r-value")
    }

    /// Decode a simple range select with constant bounds into
    /// `(range, stride, raw_left, raw_right)`.
    pub(crate) fn constant_range_select(
        &self,
        expr: &Expression,
        kind: RangeSelectionKind,
        value: &Expression,
        left: &Expression,
        right: &Expression,
    ) -> Result<(ConstantRange, usize, usize, usize), LowerError> {
        if kind != RangeSelectionKind::Simple {
            return Err(self.unsupported(expr, expr.src, "indexed part select"));
        }
        let eval_bound = |bound: &Expression| {
            try_eval(self.comp, bound).and_then(|v| v.integer()?.as_i64())
        };
        let (lc, rc) = match (eval_bound(left), eval_bound(right)) {
            (Some(l), Some(r)) => (l as i32, r as i32),
            _ => return Err(self.unsupported(expr, expr.src, "non-constant range select")),
        };
        let range = value
            .ty
            .fixed_range()
            .ok_or_else(|| self.unsupported(expr, expr.src, "range select on unranged value"))?;
        if !range.contains(lc) || !range.contains(rc) {
            return Err(LowerError::Inconsistent(format!(
                "range select [{}:{}] outside [{}:{}]",
                lc, rc, range.left, range.right
            )));
        }
        let value_width = value.ty.bitstream_width();
        if value_width % range.width() != 0 {
            return Err(LowerError::Inconsistent(format!(
                "bit-stream width {} not divisible by range width {}",
                value_width,
                range.width()
            )));
        }
        let stride = value_width / range.width();
        let raw_left = range.translate_index(lc);
        let raw_right = range.translate_index(rc);
        if raw_left < raw_right {
            return Err(LowerError::Inconsistent(format!(
                "reversed range select [{}:{}]",
                lc, rc
            )));
        }
        Ok((range, stride, raw_left as usize, raw_right as usize))
    }

    fn field_offset(&self, expr: &Expression, member: crate::ast::SymbolId) -> Result<usize, LowerError> {
        match &self.comp.symbol(member).kind {
            SymbolKind::Field { bit_offset, .. } => Ok(*bit_offset as usize),
            _ => Err(self.unsupported(expr, expr.src, "member access on non-field")),
        }
    }

    /// Normalize a select index against its range: the result is the
    /// zero-based offset at `ceil(log2(width))` bits, paired with a 1-bit
    /// in-bounds flag.
    pub(crate) fn translate_index(
        &mut self,
        idxexpr: &Expression,
        range: ConstantRange,
        pctx: &mut ProcedureContext,
    ) -> Result<(SigSpec, SigSpec), LowerError> {
        let mut idx = self.evaluate_rhs(idxexpr, pctx)?;
        if !idxexpr.ty.is_signed() {
            idx.push(State::S0);
        }

        let upper: SigSpec = crate::rtlil::Const::from_int(range.upper() as i64, 32).into();
        let lower: SigSpec = crate::rtlil::Const::from_int(range.lower() as i64, 32).into();
        let le = self.b().le(idx.clone(), upper, true);
        let ge = self.b().ge(idx.clone(), lower, true);
        let valid = self.b().logic_and(le, ge);

        let right: SigSpec = crate::rtlil::Const::from_int(range.right as i64, 32).into();
        let mut raw_idx = if range.left > range.right {
            self.b().sub(idx, right, true)
        } else {
            self.b().sub(right, idx, true)
        };
        raw_idx.extend_u0(ceil_log2(range.width()), false);
        Ok((raw_idx, valid))
    }

    /// Inline a user function call: a fresh combinational process lowers
    /// the body with the actuals bound to the formals, and the call site
    /// reads the staged return-value bits.
    fn evaluate_function(
        &mut self,
        expr: &Expression,
        call: &CallExpression,
        pctx: &mut ProcedureContext,
    ) -> Result<SigSpec, LowerError> {
        let comp = self.comp;
        let subr_id = match call.target {
            CallTarget::User(id) => id,
            CallTarget::System(_) => unreachable!(),
        };
        let (kind, args, return_var, body) = match &comp.symbol(subr_id).kind {
            SymbolKind::Subroutine {
                kind,
                args,
                return_var,
                body,
                ..
            } => (*kind, args, *return_var, body),
            _ => {
                return Err(LowerError::Inconsistent(format!(
                    "call target {} is not a subroutine",
                    comp.symbol(subr_id).name
                )))
            }
        };
        if kind != SubroutineKind::Function {
            return Err(self.unsupported(expr, expr.src, "task call in expression"));
        }
        if call.args.len() != args.len() {
            return Err(LowerError::Inconsistent(format!(
                "call to {} with {} arguments, expected {}",
                comp.symbol(subr_id).name,
                call.args.len(),
                args.len()
            )));
        }

        let mut fctx = ProcedureContext::default();
        for (&formal, actual) in args.iter().zip(&call.args) {
            let bound = self.evaluate_rhs(actual, pctx)?;
            fctx.args.insert(formal, bound);
        }

        let name = self.module.auto_name();
        let proc = Process::new(name);
        let mut lowerer = super::ProceduralLowerer::with_context(self, proc, super::Mode::Function, fctx);
        lowerer.visit_stmt(body)?;
        let staging = lowerer.finish();

        Ok(self.wire_sig_of(return_var)?.replaced(&staging))
    }
}
