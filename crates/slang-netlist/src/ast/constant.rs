//! Constant values and the expression-level constant evaluator.
//!
//! [`try_eval`] is the frontend's constant folder: it resolves an expression
//! to a [`ConstantValue`] when every leaf is known at elaboration time, and
//! returns `None` otherwise. The lowering calls it before emitting any
//! logic, so a constant subtree never produces cells.

use serde::{Deserialize, Serialize};

use super::{Compilation, Expression, SymbolKind, Type};
use crate::ast::expr::{BinaryOperator, ExprKind, UnaryOperator};
use crate::fold;
use crate::rtlil::{Const, State};

/// A sized four-state integer, LSB first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SVInt {
    pub bits: Vec<State>,
    #[serde(default)]
    pub signed: bool,
}

impl SVInt {
    pub fn new(bits: Vec<State>, signed: bool) -> SVInt {
        SVInt { bits, signed }
    }

    pub fn from_u64(value: u64, width: usize) -> SVInt {
        SVInt {
            bits: Const::from_int(value as i64, width).bits(),
            signed: false,
        }
    }

    pub fn from_i64(value: i64, width: usize) -> SVInt {
        SVInt {
            bits: Const::from_int(value, width).bits(),
            signed: true,
        }
    }

    pub fn width(&self) -> usize {
        self.bits.len()
    }

    pub fn to_const(&self) -> Const {
        Const::Bits(self.bits.clone())
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.to_const().as_int(self.signed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstantValue {
    Integer(SVInt),
    Str(String),
    Unpacked(Vec<ConstantValue>),
}

impl ConstantValue {
    pub fn is_integer(&self) -> bool {
        matches!(self, ConstantValue::Integer(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, ConstantValue::Str(_))
    }

    pub fn is_unpacked(&self) -> bool {
        matches!(self, ConstantValue::Unpacked(_))
    }

    pub fn integer(&self) -> Option<&SVInt> {
        match self {
            ConstantValue::Integer(sv) => Some(sv),
            _ => None,
        }
    }

    pub fn elements(&self) -> &[ConstantValue] {
        match self {
            ConstantValue::Unpacked(els) => els,
            _ => &[],
        }
    }

    pub fn bitstream_width(&self) -> usize {
        match self {
            ConstantValue::Integer(sv) => sv.width(),
            ConstantValue::Str(s) => s.len() * 8,
            ConstantValue::Unpacked(els) => els.iter().map(|e| e.bitstream_width()).sum(),
        }
    }

    /// Flatten into an IR constant. Unpacked elements are laid out with the
    /// first element at the MSB end; strings keep their string flag.
    pub fn to_const(&self) -> Const {
        match self {
            ConstantValue::Integer(sv) => sv.to_const(),
            ConstantValue::Str(s) => Const::Str(s.clone()),
            ConstantValue::Unpacked(els) => {
                let mut bits = Vec::with_capacity(self.bitstream_width());
                for el in els.iter().rev() {
                    bits.extend(el.to_const().bits());
                }
                Const::Bits(bits)
            }
        }
    }

    pub fn is_fully_undef(&self) -> bool {
        self.to_const().is_fully_undef()
    }
}

fn eval_int(comp: &Compilation, expr: &Expression) -> Option<Const> {
    match try_eval(comp, expr)? {
        ConstantValue::Integer(sv) => Some(sv.to_const()),
        _ => None,
    }
}

/// Attempt constant evaluation. `None` means "not a constant expression";
/// an all-X integer is still a successful evaluation.
pub fn try_eval(comp: &Compilation, expr: &Expression) -> Option<ConstantValue> {
    let width = expr.ty.bitstream_width();
    let signed = expr.ty.is_signed();
    let int = |c: Const| -> Option<ConstantValue> {
        Some(ConstantValue::Integer(SVInt::new(c.bits(), signed)))
    };

    match &expr.kind {
        ExprKind::IntegerLiteral(sv) => Some(ConstantValue::Integer(sv.clone())),
        ExprKind::StringLiteral(s) => Some(ConstantValue::Str(s.clone())),
        ExprKind::NamedValue(sym) => match &comp.symbol(*sym).kind {
            SymbolKind::Parameter { value, .. } => Some(value.clone()),
            _ => None,
        },
        ExprKind::Unary { op, operand } => {
            let a = eval_int(comp, operand)?;
            let a_signed = operand.ty.is_signed();
            let folded = match op {
                UnaryOperator::Plus => fold::const_pos(&a, a_signed, width),
                UnaryOperator::Minus => fold::const_neg(&a, a_signed, width),
                UnaryOperator::BitwiseNot => fold::const_not(&a, a_signed, width),
                UnaryOperator::BitwiseAnd => fold::const_reduce_and(&a, width),
                UnaryOperator::BitwiseOr => fold::const_reduce_or(&a, width),
                UnaryOperator::BitwiseXor => fold::const_reduce_xor(&a, width),
                UnaryOperator::BitwiseXnor => fold::const_reduce_xnor(&a, width),
                UnaryOperator::BitwiseNand => {
                    fold::const_logic_not(&fold::const_reduce_and(&a, 1), width)
                }
                UnaryOperator::BitwiseNor => {
                    fold::const_logic_not(&fold::const_reduce_or(&a, 1), width)
                }
                UnaryOperator::LogicalNot => fold::const_logic_not(&a, width),
            };
            int(folded)
        }
        ExprKind::Binary { op, left, right } => {
            let a = eval_int(comp, left)?;
            let b = eval_int(comp, right)?;
            let asg = left.ty.is_signed();
            let bsg = right.ty.is_signed();
            let folded = match op {
                BinaryOperator::Add => fold::const_add(&a, &b, asg, bsg, width),
                BinaryOperator::Subtract => fold::const_sub(&a, &b, asg, bsg, width),
                BinaryOperator::Multiply => fold::const_mul(&a, &b, asg, bsg, width),
                BinaryOperator::Divide => fold::const_div(&a, &b, asg, bsg, width),
                BinaryOperator::Mod => fold::const_mod(&a, &b, asg, bsg, width),
                BinaryOperator::Power => fold::const_pow(&a, &b, asg, bsg, width),
                BinaryOperator::BinaryAnd => fold::const_and(&a, &b, asg, bsg, width),
                BinaryOperator::BinaryOr => fold::const_or(&a, &b, asg, bsg, width),
                BinaryOperator::BinaryXor => fold::const_xor(&a, &b, asg, bsg, width),
                BinaryOperator::BinaryXnor => fold::const_xnor(&a, &b, asg, bsg, width),
                BinaryOperator::Equality => fold::const_eq(&a, &b, asg, bsg, width),
                BinaryOperator::Inequality => fold::const_ne(&a, &b, asg, bsg, width),
                BinaryOperator::LessThan => fold::const_lt(&a, &b, asg, bsg, width),
                BinaryOperator::LessThanEqual => fold::const_le(&a, &b, asg, bsg, width),
                BinaryOperator::GreaterThan => fold::const_gt(&a, &b, asg, bsg, width),
                BinaryOperator::GreaterThanEqual => fold::const_ge(&a, &b, asg, bsg, width),
                BinaryOperator::LogicalAnd => fold::const_logic_and(&a, &b, width),
                BinaryOperator::LogicalOr => fold::const_logic_or(&a, &b, width),
                BinaryOperator::LogicalShiftLeft => fold::const_shl(&a, &b, false, width),
                BinaryOperator::LogicalShiftRight => fold::const_shr(&a, &b, false, width),
                BinaryOperator::ArithmeticShiftLeft => fold::const_shl(&a, &b, asg, width),
                BinaryOperator::ArithmeticShiftRight => fold::const_sshr(&a, &b, asg, width),
                _ => return None,
            };
            int(folded)
        }
        ExprKind::Conversion { operand } => {
            let a = eval_int(comp, operand)?;
            let mut bits = a.bits();
            let fill = if expr.ty.is_signed() {
                bits.last().copied().unwrap_or(State::S0)
            } else {
                State::S0
            };
            bits.resize(width, fill);
            bits.truncate(width);
            int(Const::Bits(bits))
        }
        ExprKind::Conditional {
            conditions,
            left,
            right,
        } => {
            if conditions.len() != 1 || conditions[0].has_pattern {
                return None;
            }
            let cond = eval_int(comp, &conditions[0].expr)?;
            match fold::const_reduce_bool(&cond, 1).bits()[0] {
                State::S1 => try_eval(comp, left),
                State::S0 => try_eval(comp, right),
                _ => None,
            }
        }
        ExprKind::Concatenation { operands } => {
            let mut bits = Vec::new();
            for op in operands.iter().rev() {
                bits.extend(eval_int(comp, op)?.bits());
            }
            int(Const::Bits(bits))
        }
        ExprKind::Replication { count, concat } => {
            let reps = eval_int(comp, count)?.as_int(false)?;
            let inner = eval_int(comp, concat)?.bits();
            let mut bits = Vec::with_capacity(inner.len() * reps as usize);
            for _ in 0..reps {
                bits.extend(inner.iter().copied());
            }
            int(Const::Bits(bits))
        }
        ExprKind::RangeSelect {
            kind: super::RangeSelectionKind::Simple,
            value,
            left,
            right,
        } => {
            let base = eval_int(comp, value)?.bits();
            let range = value.ty.fixed_range()?;
            let left_signed = left.ty.is_signed();
            let right_signed = right.ty.is_signed();
            let left = eval_int(comp, left)?.as_int(left_signed)? as i32;
            let right = eval_int(comp, right)?.as_int(right_signed)? as i32;
            if !range.contains(left) || !range.contains(right) {
                return int(Const::undef(width));
            }
            let raw_left = range.translate_index(left) as usize;
            let raw_right = range.translate_index(right) as usize;
            let stride = value.ty.bitstream_width() / range.width();
            let lo = raw_right * stride;
            let len = stride * (raw_left - raw_right + 1);
            int(Const::Bits(base[lo..lo + len].to_vec()))
        }
        ExprKind::ElementSelect { value, selector } => {
            let base = eval_int(comp, value)?.bits();
            let range = value.ty.fixed_range()?;
            let idx = eval_int(comp, selector)?.as_int(selector.ty.is_signed())? as i32;
            if !range.contains(idx) {
                return int(Const::undef(width));
            }
            let stride = expr.ty.bitstream_width();
            let lo = range.translate_index(idx) as usize * stride;
            int(Const::Bits(base[lo..lo + stride].to_vec()))
        }
        ExprKind::MemberAccess { value, member } => {
            let base = eval_int(comp, value)?.bits();
            let offset = match &comp.symbol(*member).kind {
                SymbolKind::Field { bit_offset, .. } => *bit_offset as usize,
                _ => return None,
            };
            int(Const::Bits(base[offset..offset + width].to_vec()))
        }
        _ => None,
    }
}

/// The power-on default of a type: all-X for four-state data.
pub fn type_default(ty: &Type) -> ConstantValue {
    ConstantValue::Integer(SVInt::new(
        vec![State::Sx; ty.bitstream_width()],
        ty.is_signed(),
    ))
}
