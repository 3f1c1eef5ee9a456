//! Primitive-cell factory with peephole constant folding.
//!
//! Every constructor first tries to decide the result without emitting a
//! cell: full constant evaluation through [`crate::fold`], the three-valued
//! comparison shortcut for the ordering operators, and a handful of
//! structural collapses (`mux` with constant select, `sub` by all-ones,
//! shifts by constant amounts). Only when the result genuinely depends on
//! symbolic bits does a cell get added to the module.

use crate::fold;
use crate::rtlil::{Cell, Module, SigBit, SigSpec, State};

pub struct NetlistBuilder<'m> {
    pub module: &'m mut Module,
}

impl<'m> NetlistBuilder<'m> {
    pub fn new(module: &'m mut Module) -> Self {
        NetlistBuilder { module }
    }

    fn emit_biop(
        &mut self,
        op: &str,
        a: SigSpec,
        b: SigSpec,
        a_signed: bool,
        b_signed: bool,
        y_width: usize,
    ) -> SigSpec {
        // Sign-flag fixups required by the IR: `shr` takes an unsigned shift
        // amount, and `sshl`/`sshr` encode their signedness in the opcode.
        let (a_signed, b_signed) = match op {
            "shr" => (a_signed, false),
            "sshl" | "sshr" => (false, false),
            _ => (a_signed, b_signed),
        };
        let y = self.module.add_auto_wire(y_width);
        let mut cell = Cell::new(self.module.auto_name(), op);
        cell.set_param_int("A_WIDTH", a.len() as i64);
        cell.set_param_int("B_WIDTH", b.len() as i64);
        cell.set_param_bool("A_SIGNED", a_signed);
        cell.set_param_bool("B_SIGNED", b_signed);
        cell.set_param_int("Y_WIDTH", y_width as i64);
        cell.set_port("A", a);
        cell.set_port("B", b);
        cell.set_port("Y", self.module.wire_sig(y));
        self.module.add_cell(cell);
        self.module.wire_sig(y)
    }

    fn emit_unop(&mut self, op: &str, a: SigSpec, a_signed: bool, y_width: usize) -> SigSpec {
        let y = self.module.add_auto_wire(y_width);
        let mut cell = Cell::new(self.module.auto_name(), op);
        cell.set_param_int("A_WIDTH", a.len() as i64);
        cell.set_param_bool("A_SIGNED", a_signed);
        cell.set_param_int("Y_WIDTH", y_width as i64);
        cell.set_port("A", a);
        cell.set_port("Y", self.module.wire_sig(y));
        self.module.add_cell(cell);
        self.module.wire_sig(y)
    }

    pub fn biop(
        &mut self,
        op: &str,
        a: SigSpec,
        b: SigSpec,
        a_signed: bool,
        b_signed: bool,
        y_width: usize,
    ) -> SigSpec {
        if a.is_fully_const() && b.is_fully_const() {
            if let Some(folded) = fold::const_biop(
                op,
                &a.as_const().unwrap(),
                &b.as_const().unwrap(),
                a_signed,
                b_signed,
                y_width,
            ) {
                return folded.into();
            }
        }

        if matches!(op, "le" | "lt" | "gt" | "ge") && !a.is_empty() && !b.is_empty() {
            if let Some(decided) = three_valued::compare(op, &a, &b, a_signed, b_signed) {
                let mut ret = SigSpec::from(State::from_bool(decided));
                ret.extend_u0(y_width, false);
                return ret;
            }
        }

        if op == "logic_and" && (a.is_fully_zero() || b.is_fully_zero()) {
            return SigSpec::repeated(State::S0, y_width);
        }

        if op == "logic_or"
            && ((a.is_fully_const() && a.as_bool()) || (b.is_fully_const() && b.as_bool()))
        {
            let mut ret = SigSpec::from(State::S1);
            ret.extend_u0(y_width, false);
            return ret;
        }

        self.emit_biop(op, a, b, a_signed, b_signed, y_width)
    }

    pub fn unop(&mut self, op: &str, a: SigSpec, a_signed: bool, y_width: usize) -> SigSpec {
        if a.is_fully_const() {
            if let Some(folded) =
                fold::const_unop(op, &a.as_const().unwrap(), a_signed, y_width)
            {
                return folded.into();
            }
        }
        self.emit_unop(op, a, a_signed, y_width)
    }

    pub fn reduce_bool(&mut self, a: SigSpec) -> SigSpec {
        self.unop("reduce_bool", a, false, 1)
    }

    pub fn logic_not(&mut self, a: SigSpec) -> SigSpec {
        self.unop("logic_not", a, false, 1)
    }

    pub fn not(&mut self, a: SigSpec) -> SigSpec {
        let width = a.len();
        self.unop("not", a, false, width)
    }

    pub fn neg(&mut self, a: SigSpec, signed: bool) -> SigSpec {
        let width = a.len() + 1;
        self.unop("neg", a, signed, width)
    }

    pub fn sub(&mut self, a: SigSpec, b: SigSpec, signed: bool) -> SigSpec {
        if b.is_fully_ones() {
            // a - (-1); used by index normalization against an all-ones bound
            return a;
        }
        let width = a.len().max(b.len()) + 1;
        self.biop("sub", a, b, signed, signed, width)
    }

    pub fn eq(&mut self, a: SigSpec, b: SigSpec) -> SigSpec {
        self.biop("eq", a, b, false, false, 1)
    }

    pub fn le(&mut self, a: SigSpec, b: SigSpec, signed: bool) -> SigSpec {
        self.biop("le", a, b, signed, signed, 1)
    }

    pub fn lt(&mut self, a: SigSpec, b: SigSpec, signed: bool) -> SigSpec {
        self.biop("lt", a, b, signed, signed, 1)
    }

    pub fn ge(&mut self, a: SigSpec, b: SigSpec, signed: bool) -> SigSpec {
        self.biop("ge", a, b, signed, signed, 1)
    }

    pub fn logic_and(&mut self, a: SigSpec, b: SigSpec) -> SigSpec {
        if a.is_fully_zero() || b.is_fully_zero() {
            return SigSpec::from(State::S0);
        }
        if a.is_fully_def() && b.len() == 1 {
            return b;
        }
        if b.is_fully_def() && a.len() == 1 {
            return a;
        }
        self.biop("logic_and", a, b, false, false, 1)
    }

    pub fn logic_or(&mut self, a: SigSpec, b: SigSpec) -> SigSpec {
        if a.is_fully_ones() || b.is_fully_ones() {
            return SigSpec::from(State::S1);
        }
        if a.is_fully_zero() && b.is_fully_zero() {
            return SigSpec::from(State::S0);
        }
        self.biop("logic_or", a, b, false, false, 1)
    }

    /// 2:1 mux; `s == 0` selects `a`, `s == 1` selects `b`.
    pub fn mux(&mut self, a: SigSpec, b: SigSpec, s: SigSpec) -> SigSpec {
        assert_eq!(a.len(), b.len());
        assert_eq!(s.len(), 1);
        if s.bit(0) == SigBit::Const(State::S0) {
            return a;
        }
        if s.bit(0) == SigBit::Const(State::S1) {
            return b;
        }
        let y = self.module.add_auto_wire(a.len());
        let mut cell = Cell::new(self.module.auto_name(), "mux");
        cell.set_param_int("WIDTH", a.len() as i64);
        cell.set_port("A", a);
        cell.set_port("B", b);
        cell.set_port("S", s);
        cell.set_port("Y", self.module.wire_sig(y));
        self.module.add_cell(cell);
        self.module.wire_sig(y)
    }

    /// Bit-wise mux: `s[i]` selects between `a[i]` and `b[i]`.
    pub fn bwmux(&mut self, a: SigSpec, b: SigSpec, s: SigSpec) -> SigSpec {
        assert_eq!(a.len(), b.len());
        assert_eq!(a.len(), s.len());
        if s.is_fully_const() {
            let mut result = SigSpec::new();
            for i in 0..a.len() {
                result.push(match s.bit(i) {
                    SigBit::Const(State::S0) => a.bit(i),
                    SigBit::Const(State::S1) => b.bit(i),
                    _ => SigBit::Const(State::Sx),
                });
            }
            return result;
        }
        let y = self.module.add_auto_wire(a.len());
        let mut cell = Cell::new(self.module.auto_name(), "bwmux");
        cell.set_param_int("WIDTH", a.len() as i64);
        cell.set_port("A", a);
        cell.set_port("B", b);
        cell.set_port("S", s);
        cell.set_port("Y", self.module.wire_sig(y));
        self.module.add_cell(cell);
        self.module.wire_sig(y)
    }

    /// Wide mux: selects the `s`-th stride-wide slice of `a`.
    pub fn bmux(&mut self, a: SigSpec, s: SigSpec) -> SigSpec {
        assert_eq!(a.len() % (1 << s.len()), 0);
        assert!(a.len() >= 1 << s.len());
        let stride = a.len() >> s.len();
        if s.is_fully_def() {
            let idx = s.as_int(false).expect("defined select") as usize;
            return a.extract(idx * stride, stride);
        }
        let y = self.module.add_auto_wire(stride);
        let mut cell = Cell::new(self.module.auto_name(), "bmux");
        cell.set_param_int("WIDTH", stride as i64);
        cell.set_param_int("S_WIDTH", s.len() as i64);
        cell.set_port("A", a);
        cell.set_port("S", s);
        cell.set_port("Y", self.module.wire_sig(y));
        self.module.add_cell(cell);
        self.module.wire_sig(y)
    }

    /// One-hot demux: positions `a` at offset `s * |a|` in a `2^|s| * |a|`
    /// wide result, zeros elsewhere.
    pub fn demux(&mut self, a: SigSpec, s: SigSpec) -> SigSpec {
        assert!(s.len() < 24);
        let zeropad = SigSpec::repeated(State::S0, a.len());
        if s.is_fully_const() {
            let idx = s.as_int(false).unwrap_or(0) as usize;
            return SigSpec::concat([
                zeropad.repeat((1 << s.len()) - 1 - idx),
                a,
                zeropad.repeat(idx),
            ]);
        }
        let y_width = a.len() << s.len();
        let y = self.module.add_auto_wire(y_width);
        let mut cell = Cell::new(self.module.auto_name(), "demux");
        cell.set_param_int("WIDTH", a.len() as i64);
        cell.set_param_int("S_WIDTH", s.len() as i64);
        cell.set_port("A", a);
        cell.set_port("S", s);
        cell.set_port("Y", self.module.wire_sig(y));
        self.module.add_cell(cell);
        self.module.wire_sig(y)
    }

    pub fn shift(
        &mut self,
        a: SigSpec,
        a_signed: bool,
        b: SigSpec,
        b_signed: bool,
        result_width: usize,
    ) -> SigSpec {
        if a.is_fully_const() && b.is_fully_const() {
            return fold::const_shift(
                &a.as_const().unwrap(),
                &b.as_const().unwrap(),
                a_signed,
                b_signed,
                result_width,
            )
            .into();
        }

        if b.is_fully_def() && b.len() < 24 {
            assert!(!a.is_empty());
            let shift_amount = b.as_int(b_signed).expect("constant shift amount");
            let mut ret = SigSpec::new();
            let mut i = shift_amount;
            for _ in 0..result_width {
                if a_signed && i >= a.len() as i64 {
                    ret.push(a.msb());
                } else if i >= a.len() as i64 || i < 0 {
                    ret.push(State::S0);
                } else {
                    ret.push(a.bit(i as usize));
                }
                i += 1;
            }
            return ret;
        }

        let y = self.module.add_auto_wire(result_width);
        let mut cell = Cell::new(self.module.auto_name(), "shift");
        cell.set_param_bool("A_SIGNED", a_signed);
        cell.set_param_bool("B_SIGNED", b_signed);
        cell.set_param_int("A_WIDTH", a.len() as i64);
        cell.set_param_int("B_WIDTH", b.len() as i64);
        cell.set_param_int("Y_WIDTH", result_width as i64);
        cell.set_port("A", a);
        cell.set_port("B", b);
        cell.set_port("Y", self.module.wire_sig(y));
        self.module.add_cell(cell);
        self.module.wire_sig(y)
    }

    pub fn shiftx(
        &mut self,
        a: SigSpec,
        s: SigSpec,
        s_signed: bool,
        result_width: usize,
    ) -> SigSpec {
        if a.is_fully_const() && s.is_fully_const() {
            return fold::const_shiftx(
                &a.as_const().unwrap(),
                &s.as_const().unwrap(),
                s_signed,
                result_width,
            )
            .into();
        }
        let y = self.module.add_auto_wire(result_width);
        let mut cell = Cell::new(self.module.auto_name(), "shiftx");
        cell.set_param_bool("A_SIGNED", false);
        cell.set_param_bool("B_SIGNED", s_signed);
        cell.set_param_int("A_WIDTH", a.len() as i64);
        cell.set_param_int("B_WIDTH", s.len() as i64);
        cell.set_param_int("Y_WIDTH", result_width as i64);
        cell.set_port("A", a);
        cell.set_port("B", s);
        cell.set_port("Y", self.module.wire_sig(y));
        self.module.add_cell(cell);
        self.module.wire_sig(y)
    }

    /// Wildcard equality: `b` must be constant; X/Z positions in `b` are
    /// dropped from both operands before comparing.
    pub fn eq_wildcard(&mut self, a: SigSpec, b: SigSpec) -> SigSpec {
        assert_eq!(a.len(), b.len());
        assert!(b.is_fully_const());
        let mut a2 = SigSpec::new();
        let mut b2 = SigSpec::new();
        for i in 0..a.len() {
            match b.bit(i) {
                SigBit::Const(State::Sx) | SigBit::Const(State::Sz) => {}
                bit => {
                    a2.push(a.bit(i));
                    b2.push(bit);
                }
            }
        }
        self.eq(a2, b2)
    }
}

/// Three-valued analysis of the ordering comparisons: a ripple-carry
/// subtraction over {-1, 0, +1} where symbolic and undefined bits collapse
/// to 0. The chain runs one bit past the wider operand so the sign formula
/// at the top cannot be fooled by overflow.
mod three_valued {
    use crate::rtlil::{SigBit, SigSpec, State};

    fn convert(bit: SigBit) -> i32 {
        match bit {
            SigBit::Const(State::S1) => 1,
            SigBit::Const(State::S0) => -1,
            _ => 0,
        }
    }

    fn and(a: i32, b: i32) -> i32 {
        if a < 0 || b < 0 {
            -1
        } else if a > 0 && b > 0 {
            1
        } else {
            0
        }
    }

    fn not(lit: i32) -> i32 {
        -lit
    }

    fn or(a: i32, b: i32) -> i32 {
        not(and(not(a), not(b)))
    }

    fn xor(a: i32, b: i32) -> i32 {
        or(and(a, not(b)), and(not(a), b))
    }

    fn xnor(a: i32, b: i32) -> i32 {
        not(xor(a, b))
    }

    fn carry(a: i32, b: i32, c: i32) -> i32 {
        match c {
            1 => or(a, b),
            -1 => and(a, b),
            _ => or(and(a, b), and(c, or(a, b))),
        }
    }

    pub(super) fn compare(
        op: &str,
        a: &SigSpec,
        b: &SigSpec,
        a_signed: bool,
        b_signed: bool,
    ) -> Option<bool> {
        let signed = a_signed && b_signed;
        let ext = |sig: &SigSpec, i: usize| -> SigBit {
            if i < sig.len() {
                sig.bit(i)
            } else if signed {
                sig.msb()
            } else {
                SigBit::Const(State::S0)
            }
        };

        let width = a.len().max(b.len()) + 1;
        // le/ge start from an incoming borrow: a <= b is a - b - 1 < 0.
        let mut c = if op == "le" || op == "ge" { -1 } else { 1 };
        let (mut al, mut bl) = (0, 0);
        for i in 0..width {
            al = convert(ext(a, i));
            bl = convert(ext(b, i));
            if op == "gt" || op == "ge" {
                std::mem::swap(&mut al, &mut bl);
            }
            if i != width - 1 {
                c = carry(al, not(bl), c);
            }
        }
        let result = xor(c, xnor(al, bl));
        match result {
            r if r < 0 => Some(false),
            r if r > 0 => Some(true),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fold;
    use crate::rtlil::{Const, Module, WireBit, WireId};
    use proptest::prelude::*;

    fn wirebit(n: u32) -> SigBit {
        SigBit::Wire(WireBit {
            wire: WireId(0),
            offset: n,
        })
    }

    fn with_module<R>(f: impl FnOnce(&mut NetlistBuilder) -> R) -> (R, Module) {
        let mut module = Module::new("\\test");
        module.add_wire("\\w", 32);
        let r = f(&mut NetlistBuilder::new(&mut module));
        (r, module)
    }

    #[test]
    fn test_biop_const_fold_emits_nothing() {
        let (y, module) = with_module(|b| {
            b.biop(
                "add",
                Const::from_int(5, 8).into(),
                Const::from_int(3, 8).into(),
                false,
                false,
                8,
            )
        });
        assert_eq!(y.as_int(false), Some(8));
        assert!(module.cells.is_empty());
    }

    #[test]
    fn test_biop_emits_cell_with_fixups() {
        let (_, module) = with_module(|b| {
            let a = SigSpec::from(vec![wirebit(0), wirebit(1)]);
            b.biop("sshr", a, Const::from_int(1, 2).into(), true, true, 2)
        });
        let cell = &module.cells[0];
        assert_eq!(cell.kind, "sshr");
        assert_eq!(cell.parameters["A_SIGNED"], Const::from_bool(false));
        assert_eq!(cell.parameters["B_SIGNED"], Const::from_bool(false));
    }

    #[test]
    fn test_mux_folding() {
        let a = SigSpec::from(vec![wirebit(0), wirebit(1)]);
        let b = SigSpec::from(vec![wirebit(2), wirebit(3)]);
        let (y, module) = with_module(|bld| {
            let y0 = bld.mux(a.clone(), b.clone(), State::S0.into());
            let y1 = bld.mux(a.clone(), b.clone(), State::S1.into());
            (y0, y1)
        });
        assert_eq!(y.0, a);
        assert_eq!(y.1, b);
        assert!(module.cells.is_empty());
    }

    #[test]
    fn test_bwmux_const_select() {
        let a = SigSpec::from(vec![wirebit(0), wirebit(1), wirebit(2)]);
        let b = SigSpec::from(Const::from_int(0b111, 3));
        let s = SigSpec::from(Const::Bits(vec![State::S0, State::S1, State::Sx]));
        let (y, module) = with_module(|bld| bld.bwmux(a.clone(), b, s));
        assert_eq!(y.bit(0), a.bit(0));
        assert_eq!(y.bit(1), SigBit::Const(State::S1));
        assert_eq!(y.bit(2), SigBit::Const(State::Sx));
        assert!(module.cells.is_empty());
    }

    #[test]
    fn test_bmux_const_select_extracts() {
        let a = SigSpec::from(Const::from_int(0b11100100, 8));
        let (y, module) = with_module(|b| b.bmux(a, Const::from_int(2, 2).into()));
        assert_eq!(y.as_int(false), Some(0b10));
        assert!(module.cells.is_empty());
    }

    #[test]
    fn test_demux_const_select_positions() {
        let a = SigSpec::from(Const::from_int(0b11, 2));
        let (y, module) = with_module(|b| b.demux(a, Const::from_int(1, 2).into()));
        assert_eq!(y.len(), 8);
        assert_eq!(y.as_int(false), Some(0b1100));
        assert!(module.cells.is_empty());
    }

    #[test]
    fn test_shift_constant_amount_concatenates() {
        let a = SigSpec::from(vec![wirebit(0), wirebit(1), wirebit(2)]);
        let (y, module) = with_module(|b| {
            b.shift(a.clone(), false, Const::from_int(1, 3).into(), false, 3)
        });
        assert_eq!(y.bit(0), a.bit(1));
        assert_eq!(y.bit(1), a.bit(2));
        assert_eq!(y.bit(2), SigBit::Const(State::S0));
        assert!(module.cells.is_empty());
    }

    #[test]
    fn test_sub_all_ones_collapses() {
        let a = SigSpec::from(vec![wirebit(0), wirebit(1)]);
        let (y, module) = with_module(|b| b.sub(a.clone(), Const::from_int(-1, 2).into(), true));
        assert_eq!(y, a);
        assert!(module.cells.is_empty());
    }

    #[test]
    fn test_eq_wildcard_drops_undef_positions() {
        let a = SigSpec::from(vec![wirebit(0), wirebit(1), wirebit(2)]);
        let b = SigSpec::from(Const::Bits(vec![State::S1, State::Sx, State::Sz]));
        let (_, module) = with_module(|bld| bld.eq_wildcard(a.clone(), b));
        let cell = &module.cells[0];
        assert_eq!(cell.kind, "eq");
        assert_eq!(cell.ports["A"].len(), 1);
        assert_eq!(cell.ports["A"].bit(0), a.bit(0));
    }

    #[test]
    fn test_logic_shortcuts() {
        let w = SigSpec::from(vec![wirebit(0)]);
        let (y, module) = with_module(|b| {
            let z = b.biop(
                "logic_and",
                w.clone(),
                Const::zero(4).into(),
                false,
                false,
                1,
            );
            let o = b.biop("logic_or", w.clone(), Const::from_int(2, 4).into(), false, false, 1);
            (z, o)
        });
        assert!(y.0.is_fully_zero());
        assert_eq!(y.1.as_int(false), Some(1));
        assert!(module.cells.is_empty());
    }

    #[test]
    fn test_tvl_decides_dominated_compare() {
        // any 3-bit unsigned value is <= 7, whatever the symbolic bits are
        let a = SigSpec::from(vec![wirebit(0), wirebit(1), wirebit(2)]);
        let b = SigSpec::from(Const::from_int(-1, 3));
        let (y, module) = with_module(|bld| bld.biop("le", a, b, false, false, 1));
        assert_eq!(y.as_int(false), Some(1));
        assert!(module.cells.is_empty());
    }

    #[test]
    fn test_tvl_indeterminate_emits_cell() {
        let a = SigSpec::from(vec![wirebit(0), wirebit(1)]);
        let b = SigSpec::from(Const::from_int(1, 2));
        let (_, module) = with_module(|bld| bld.biop("lt", a, b, false, false, 1));
        assert_eq!(module.cells.len(), 1);
        assert_eq!(module.cells[0].kind, "lt");
    }

    fn pattern() -> impl Strategy<Value = Vec<u8>> {
        proptest::collection::vec(0..3u8, 1..6)
    }

    fn build(pattern: &[u8]) -> SigSpec {
        let mut sig = SigSpec::new();
        for (i, p) in pattern.iter().enumerate() {
            sig.push(match p {
                0 => SigBit::Const(State::S0),
                1 => SigBit::Const(State::S1),
                _ => wirebit(i as u32),
            });
        }
        sig
    }

    fn concretize(pattern: &[u8], fill: &[bool]) -> Const {
        Const::Bits(
            pattern
                .iter()
                .enumerate()
                .map(|(i, p)| match p {
                    0 => State::S0,
                    1 => State::S1,
                    _ => State::from_bool(fill[i]),
                })
                .collect(),
        )
    }

    proptest! {
        // Soundness of the three-valued shortcut: whenever it decides a
        // comparison, every concrete assignment of the symbolic bits agrees
        // with the constant evaluator.
        #[test]
        fn tvl_compare_is_sound(
            op_idx in 0..4usize,
            apat in pattern(),
            bpat in pattern(),
            afill in proptest::collection::vec(any::<bool>(), 6),
            bfill in proptest::collection::vec(any::<bool>(), 6),
            a_signed: bool,
            b_signed: bool,
        ) {
            let op = ["lt", "le", "gt", "ge"][op_idx];
            let a = build(&apat);
            let b = build(&bpat);
            if let Some(decided) = three_valued::compare(op, &a, &b, a_signed, b_signed) {
                let ac = concretize(&apat, &afill);
                let bc = concretize(&bpat, &bfill);
                let expected = match op {
                    "lt" => fold::const_lt(&ac, &bc, a_signed, b_signed, 1),
                    "le" => fold::const_le(&ac, &bc, a_signed, b_signed, 1),
                    "gt" => fold::const_gt(&ac, &bc, a_signed, b_signed, 1),
                    _ => fold::const_ge(&ac, &bc, a_signed, b_signed, 1),
                };
                prop_assert_eq!(expected, Const::from_bool(decided));
            }
        }
    }
}
