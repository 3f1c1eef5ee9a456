//! Four-state constant evaluation of the primitive operators.
//!
//! These mirror the netlist cell semantics bit for bit: bitwise operators
//! propagate X per position, arithmetic collapses to all-X as soon as any
//! operand bit is undefined, comparisons yield a three-valued boolean.
//! Defined-value arithmetic goes through `BigInt` so any width works.

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, ToPrimitive, Zero};

use crate::rtlil::{Const, State};

/// Dispatch for binary cell opcodes. `None` for opcodes without a constant
/// rule (instantiated module kinds and the like).
pub fn const_biop(
    op: &str,
    a: &Const,
    b: &Const,
    a_signed: bool,
    b_signed: bool,
    y_width: usize,
) -> Option<Const> {
    let c = match op {
        "add" => const_add(a, b, a_signed, b_signed, y_width),
        "sub" => const_sub(a, b, a_signed, b_signed, y_width),
        "mul" => const_mul(a, b, a_signed, b_signed, y_width),
        "divfloor" => const_divfloor(a, b, a_signed, b_signed, y_width),
        "div" => const_div(a, b, a_signed, b_signed, y_width),
        "mod" => const_mod(a, b, a_signed, b_signed, y_width),
        "and" => const_and(a, b, a_signed, b_signed, y_width),
        "or" => const_or(a, b, a_signed, b_signed, y_width),
        "xor" => const_xor(a, b, a_signed, b_signed, y_width),
        "xnor" => const_xnor(a, b, a_signed, b_signed, y_width),
        "eq" => const_eq(a, b, a_signed, b_signed, y_width),
        "ne" => const_ne(a, b, a_signed, b_signed, y_width),
        "lt" => const_lt(a, b, a_signed, b_signed, y_width),
        "le" => const_le(a, b, a_signed, b_signed, y_width),
        "gt" => const_gt(a, b, a_signed, b_signed, y_width),
        "ge" => const_ge(a, b, a_signed, b_signed, y_width),
        "logic_and" => const_logic_and(a, b, y_width),
        "logic_or" => const_logic_or(a, b, y_width),
        "shl" => const_shl(a, b, a_signed, y_width),
        "sshl" => const_shl(a, b, a_signed, y_width),
        "shr" => const_shr(a, b, a_signed, y_width),
        "sshr" => const_sshr(a, b, a_signed, y_width),
        "pow" => const_pow(a, b, a_signed, b_signed, y_width),
        "shift" => const_shift(a, b, a_signed, b_signed, y_width),
        "shiftx" => const_shiftx(a, b, b_signed, y_width),
        _ => return None,
    };
    Some(c)
}

/// Dispatch for unary cell opcodes.
pub fn const_unop(op: &str, a: &Const, a_signed: bool, y_width: usize) -> Option<Const> {
    let c = match op {
        "pos" => const_pos(a, a_signed, y_width),
        "neg" => const_neg(a, a_signed, y_width),
        "not" => const_not(a, a_signed, y_width),
        "logic_not" => const_logic_not(a, y_width),
        "reduce_and" => const_reduce_and(a, y_width),
        "reduce_or" => const_reduce_or(a, y_width),
        "reduce_xor" => const_reduce_xor(a, y_width),
        "reduce_xnor" => const_reduce_xnor(a, y_width),
        "reduce_bool" => const_reduce_bool(a, y_width),
        _ => return None,
    };
    Some(c)
}

fn extended(a: &Const, width: usize, signed: bool) -> Vec<State> {
    let mut bits = a.bits();
    let fill = if signed {
        bits.last().copied().unwrap_or(State::S0)
    } else {
        State::S0
    };
    bits.resize(width, fill);
    bits
}

fn to_bigint(bits: &[State], signed: bool) -> Option<BigInt> {
    let mut bytes = vec![0u8; bits.len().div_ceil(8)];
    for (i, bit) in bits.iter().enumerate() {
        match bit {
            State::S1 => bytes[i / 8] |= 1 << (i % 8),
            State::S0 => {}
            _ => return None,
        }
    }
    let mut value = BigInt::from_biguint(Sign::Plus, BigUint::from_bytes_le(&bytes));
    if signed && bits.last() == Some(&State::S1) {
        value -= BigInt::one() << bits.len();
    }
    Some(value)
}

fn from_bigint(value: &BigInt, width: usize) -> Vec<State> {
    let modulus = BigInt::one() << width;
    let mut v = value % &modulus;
    if v.sign() == Sign::Minus {
        v += &modulus;
    }
    let bytes = v.to_biguint().expect("non-negative").to_bytes_le();
    (0..width)
        .map(|i| {
            let byte = bytes.get(i / 8).copied().unwrap_or(0);
            State::from_bool((byte >> (i % 8)) & 1 != 0)
        })
        .collect()
}

/// Three-valued truthiness of a bit vector.
fn bool3(bits: &[State]) -> State {
    if bits.iter().any(|b| *b == State::S1) {
        State::S1
    } else if bits.iter().all(|b| *b == State::S0) {
        State::S0
    } else {
        State::Sx
    }
}

fn not3(s: State) -> State {
    match s {
        State::S0 => State::S1,
        State::S1 => State::S0,
        _ => State::Sx,
    }
}

/// Pack a three-valued boolean into `y_width` bits (high bits zero).
fn bool_result(s: State, y_width: usize) -> Const {
    let mut bits = vec![State::S0; y_width];
    if y_width > 0 {
        bits[0] = s;
    }
    Const::Bits(bits)
}

fn bitwise(
    a: &Const,
    b: &Const,
    a_signed: bool,
    b_signed: bool,
    y_width: usize,
    f: impl Fn(State, State) -> State,
) -> Const {
    let width = y_width.max(a.len()).max(b.len());
    let av = extended(a, width, a_signed);
    let bv = extended(b, width, b_signed);
    let mut bits: Vec<State> = av.iter().zip(&bv).map(|(x, y)| f(*x, *y)).collect();
    bits.truncate(y_width);
    bits.resize(y_width, State::S0);
    Const::Bits(bits)
}

fn and3(a: State, b: State) -> State {
    if a == State::S0 || b == State::S0 {
        State::S0
    } else if a == State::S1 && b == State::S1 {
        State::S1
    } else {
        State::Sx
    }
}

fn or3(a: State, b: State) -> State {
    not3(and3(not3(a), not3(b)))
}

fn xor3(a: State, b: State) -> State {
    if a.is_def() && b.is_def() {
        State::from_bool(a != b)
    } else {
        State::Sx
    }
}

pub fn const_and(a: &Const, b: &Const, a_signed: bool, b_signed: bool, y_width: usize) -> Const {
    bitwise(a, b, a_signed, b_signed, y_width, and3)
}

pub fn const_or(a: &Const, b: &Const, a_signed: bool, b_signed: bool, y_width: usize) -> Const {
    bitwise(a, b, a_signed, b_signed, y_width, or3)
}

pub fn const_xor(a: &Const, b: &Const, a_signed: bool, b_signed: bool, y_width: usize) -> Const {
    bitwise(a, b, a_signed, b_signed, y_width, xor3)
}

pub fn const_xnor(a: &Const, b: &Const, a_signed: bool, b_signed: bool, y_width: usize) -> Const {
    bitwise(a, b, a_signed, b_signed, y_width, |x, y| not3(xor3(x, y)))
}

fn arith(
    a: &Const,
    b: &Const,
    a_signed: bool,
    b_signed: bool,
    y_width: usize,
    f: impl Fn(BigInt, BigInt) -> Option<BigInt>,
) -> Const {
    let signed = a_signed && b_signed;
    let av = match to_bigint(&a.bits(), signed) {
        Some(v) => v,
        None => return Const::undef(y_width),
    };
    let bv = match to_bigint(&b.bits(), signed) {
        Some(v) => v,
        None => return Const::undef(y_width),
    };
    match f(av, bv) {
        Some(r) => Const::Bits(from_bigint(&r, y_width)),
        None => Const::undef(y_width),
    }
}

pub fn const_add(a: &Const, b: &Const, a_signed: bool, b_signed: bool, y_width: usize) -> Const {
    arith(a, b, a_signed, b_signed, y_width, |x, y| Some(x + y))
}

pub fn const_sub(a: &Const, b: &Const, a_signed: bool, b_signed: bool, y_width: usize) -> Const {
    arith(a, b, a_signed, b_signed, y_width, |x, y| Some(x - y))
}

pub fn const_mul(a: &Const, b: &Const, a_signed: bool, b_signed: bool, y_width: usize) -> Const {
    arith(a, b, a_signed, b_signed, y_width, |x, y| Some(x * y))
}

/// Truncating division; division by zero is all-X.
pub fn const_div(a: &Const, b: &Const, a_signed: bool, b_signed: bool, y_width: usize) -> Const {
    arith(a, b, a_signed, b_signed, y_width, |x, y| {
        if y.is_zero() {
            None
        } else {
            Some(x / y)
        }
    })
}

/// Flooring division; division by zero is all-X.
pub fn const_divfloor(
    a: &Const,
    b: &Const,
    a_signed: bool,
    b_signed: bool,
    y_width: usize,
) -> Const {
    arith(a, b, a_signed, b_signed, y_width, |x, y| {
        if y.is_zero() {
            return None;
        }
        let q = &x / &y;
        let r = &x - &q * &y;
        if !r.is_zero() && (r.sign() == Sign::Minus) != (y.sign() == Sign::Minus) {
            Some(q - 1)
        } else {
            Some(q)
        }
    })
}

/// Remainder with the sign of the dividend (truncating-division remainder).
pub fn const_mod(a: &Const, b: &Const, a_signed: bool, b_signed: bool, y_width: usize) -> Const {
    arith(a, b, a_signed, b_signed, y_width, |x, y| {
        if y.is_zero() {
            None
        } else {
            Some(x % y)
        }
    })
}

pub fn const_pow(a: &Const, b: &Const, a_signed: bool, b_signed: bool, y_width: usize) -> Const {
    arith(a, b, a_signed, b_signed, y_width, |x, y| {
        if y.sign() == Sign::Minus {
            // Integer base to a negative power.
            return if x == BigInt::one() {
                Some(BigInt::one())
            } else if x == -BigInt::one() {
                if (&y % BigInt::from(2)).is_zero() {
                    Some(BigInt::one())
                } else {
                    Some(-BigInt::one())
                }
            } else if x.is_zero() {
                None
            } else {
                Some(BigInt::zero())
            };
        }
        if y_width == 0 {
            return Some(BigInt::zero());
        }
        // Truncated to y_width bits anyway, so exponentiate modulo 2^y_width.
        let modulus = BigInt::one() << y_width;
        let base = ((&x % &modulus) + &modulus) % &modulus;
        Some(base.modpow(&y, &modulus))
    })
}

pub fn const_eq(a: &Const, b: &Const, a_signed: bool, b_signed: bool, y_width: usize) -> Const {
    let signed = a_signed && b_signed;
    let width = a.len().max(b.len());
    let av = extended(a, width, signed);
    let bv = extended(b, width, signed);
    let mut undef = false;
    for (x, y) in av.iter().zip(&bv) {
        if x.is_def() && y.is_def() {
            if x != y {
                return bool_result(State::S0, y_width);
            }
        } else {
            undef = true;
        }
    }
    bool_result(if undef { State::Sx } else { State::S1 }, y_width)
}

pub fn const_ne(a: &Const, b: &Const, a_signed: bool, b_signed: bool, y_width: usize) -> Const {
    let eq = const_eq(a, b, a_signed, b_signed, 1);
    bool_result(not3(eq.bits()[0]), y_width)
}

fn compare(
    a: &Const,
    b: &Const,
    a_signed: bool,
    b_signed: bool,
    y_width: usize,
    f: impl Fn(&BigInt, &BigInt) -> bool,
) -> Const {
    let signed = a_signed && b_signed;
    let (av, bv) = match (to_bigint(&a.bits(), signed), to_bigint(&b.bits(), signed)) {
        (Some(x), Some(y)) => (x, y),
        _ => return bool_result(State::Sx, y_width),
    };
    bool_result(State::from_bool(f(&av, &bv)), y_width)
}

pub fn const_lt(a: &Const, b: &Const, a_signed: bool, b_signed: bool, y_width: usize) -> Const {
    compare(a, b, a_signed, b_signed, y_width, |x, y| x < y)
}

pub fn const_le(a: &Const, b: &Const, a_signed: bool, b_signed: bool, y_width: usize) -> Const {
    compare(a, b, a_signed, b_signed, y_width, |x, y| x <= y)
}

pub fn const_gt(a: &Const, b: &Const, a_signed: bool, b_signed: bool, y_width: usize) -> Const {
    compare(a, b, a_signed, b_signed, y_width, |x, y| x > y)
}

pub fn const_ge(a: &Const, b: &Const, a_signed: bool, b_signed: bool, y_width: usize) -> Const {
    compare(a, b, a_signed, b_signed, y_width, |x, y| x >= y)
}

pub fn const_logic_and(a: &Const, b: &Const, y_width: usize) -> Const {
    bool_result(and3(bool3(&a.bits()), bool3(&b.bits())), y_width)
}

pub fn const_logic_or(a: &Const, b: &Const, y_width: usize) -> Const {
    bool_result(or3(bool3(&a.bits()), bool3(&b.bits())), y_width)
}

pub fn const_logic_not(a: &Const, y_width: usize) -> Const {
    bool_result(not3(bool3(&a.bits())), y_width)
}

pub fn const_not(a: &Const, a_signed: bool, y_width: usize) -> Const {
    let bits = extended(a, y_width, a_signed)
        .into_iter()
        .take(y_width)
        .map(not3)
        .collect();
    Const::Bits(bits)
}

pub fn const_pos(a: &Const, a_signed: bool, y_width: usize) -> Const {
    let mut bits = extended(a, y_width.max(a.len()), a_signed);
    bits.truncate(y_width);
    Const::Bits(bits)
}

pub fn const_neg(a: &Const, a_signed: bool, y_width: usize) -> Const {
    let av = match to_bigint(&a.bits(), a_signed) {
        Some(v) => v,
        None => return Const::undef(y_width),
    };
    Const::Bits(from_bigint(&-av, y_width))
}

pub fn const_reduce_and(a: &Const, y_width: usize) -> Const {
    let bits = a.bits();
    let s = if bits.iter().any(|b| *b == State::S0) {
        State::S0
    } else if bits.iter().all(|b| *b == State::S1) {
        State::S1
    } else {
        State::Sx
    };
    bool_result(s, y_width)
}

pub fn const_reduce_or(a: &Const, y_width: usize) -> Const {
    bool_result(bool3(&a.bits()), y_width)
}

pub fn const_reduce_xor(a: &Const, y_width: usize) -> Const {
    let bits = a.bits();
    if bits.iter().any(|b| !b.is_def()) {
        return bool_result(State::Sx, y_width);
    }
    let ones = bits.iter().filter(|b| **b == State::S1).count();
    bool_result(State::from_bool(ones % 2 == 1), y_width)
}

pub fn const_reduce_xnor(a: &Const, y_width: usize) -> Const {
    let x = const_reduce_xor(a, 1);
    bool_result(not3(x.bits()[0]), y_width)
}

pub fn const_reduce_bool(a: &Const, y_width: usize) -> Const {
    bool_result(bool3(&a.bits()), y_width)
}

fn shift_amount(b: &Const, signed: bool) -> Option<i64> {
    if !b.is_fully_def() {
        return None;
    }
    let v = to_bigint(&b.bits(), signed).expect("defined");
    // Saturate: anything beyond a sane shift range empties the result anyway.
    Some(v.to_i64().unwrap_or(if v.sign() == Sign::Minus {
        i64::MIN / 2
    } else {
        i64::MAX / 2
    }))
}

/// Logical/arithmetic shift left (`shl`/`sshl`): zero fill from the LSB.
pub fn const_shl(a: &Const, b: &Const, a_signed: bool, y_width: usize) -> Const {
    let amount = match shift_amount(b, false) {
        Some(v) => v,
        None => return Const::undef(y_width),
    };
    let av = extended(a, y_width.max(a.len()), a_signed);
    let bits = (0..y_width)
        .map(|j| {
            let i = j as i64 - amount;
            if i < 0 || i as usize >= av.len() {
                State::S0
            } else {
                av[i as usize]
            }
        })
        .collect();
    Const::Bits(bits)
}

/// Logical shift right (`shr`): the operand is extended to the result width
/// first, then shifted with zero fill.
pub fn const_shr(a: &Const, b: &Const, a_signed: bool, y_width: usize) -> Const {
    let amount = match shift_amount(b, false) {
        Some(v) => v,
        None => return Const::undef(y_width),
    };
    let av = extended(a, y_width.max(a.len()), a_signed);
    let bits = (0..y_width)
        .map(|j| {
            let i = j as i64 + amount;
            if i < 0 || i as usize >= av.len() {
                State::S0
            } else {
                av[i as usize]
            }
        })
        .collect();
    Const::Bits(bits)
}

/// Arithmetic shift right (`sshr`): sign fill when the operand is signed.
pub fn const_sshr(a: &Const, b: &Const, a_signed: bool, y_width: usize) -> Const {
    let amount = match shift_amount(b, false) {
        Some(v) => v,
        None => return Const::undef(y_width),
    };
    let av = extended(a, y_width.max(a.len()), a_signed);
    let fill = if a_signed {
        av.last().copied().unwrap_or(State::S0)
    } else {
        State::S0
    };
    let bits = (0..y_width)
        .map(|j| {
            let i = j as i64 + amount;
            if i < 0 || i as usize >= av.len() {
                fill
            } else {
                av[i as usize]
            }
        })
        .collect();
    Const::Bits(bits)
}

/// Variable shifter (`shift`): indexes straight into the operand, sign fill
/// above the operand only when it is signed, zero below.
pub fn const_shift(a: &Const, b: &Const, a_signed: bool, b_signed: bool, y_width: usize) -> Const {
    let amount = match shift_amount(b, b_signed) {
        Some(v) => v,
        None => return Const::undef(y_width),
    };
    let av = a.bits();
    let bits = (0..y_width)
        .map(|j| {
            let i = j as i64 + amount;
            if i >= 0 && (i as usize) < av.len() {
                av[i as usize]
            } else if a_signed && i >= av.len() as i64 {
                *av.last().unwrap_or(&State::S0)
            } else {
                State::S0
            }
        })
        .collect();
    Const::Bits(bits)
}

/// Like `shift` but out-of-range positions read X.
pub fn const_shiftx(a: &Const, b: &Const, b_signed: bool, y_width: usize) -> Const {
    let amount = match shift_amount(b, b_signed) {
        Some(v) => v,
        None => return Const::undef(y_width),
    };
    let av = a.bits();
    let bits = (0..y_width)
        .map(|j| {
            let i = j as i64 + amount;
            if i >= 0 && (i as usize) < av.len() {
                av[i as usize]
            } else {
                State::Sx
            }
        })
        .collect();
    Const::Bits(bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(value: i64, width: usize) -> Const {
        Const::from_int(value, width)
    }

    #[test]
    fn test_add_sub_mul() {
        assert_eq!(const_add(&c(5, 8), &c(3, 8), false, false, 8), c(8, 8));
        assert_eq!(const_sub(&c(3, 8), &c(5, 8), true, true, 8), c(-2, 8));
        assert_eq!(const_mul(&c(-3, 8), &c(4, 8), true, true, 8), c(-12, 8));
        // unsigned wraparound
        assert_eq!(const_add(&c(255, 8), &c(1, 8), false, false, 8), c(0, 8));
    }

    #[test]
    fn test_arith_x_propagation() {
        let x = Const::Bits(vec![State::S1, State::Sx]);
        assert_eq!(const_add(&x, &c(1, 2), false, false, 2), Const::undef(2));
        assert_eq!(const_mul(&c(1, 2), &x, false, false, 4), Const::undef(4));
    }

    #[test]
    fn test_division_flavors() {
        // -7 / 2: truncating -3, flooring -4
        assert_eq!(const_div(&c(-7, 8), &c(2, 8), true, true, 8), c(-3, 8));
        assert_eq!(const_divfloor(&c(-7, 8), &c(2, 8), true, true, 8), c(-4, 8));
        assert_eq!(const_divfloor(&c(7, 8), &c(2, 8), true, true, 8), c(3, 8));
        // remainder takes the dividend's sign
        assert_eq!(const_mod(&c(-7, 8), &c(2, 8), true, true, 8), c(-1, 8));
        assert_eq!(const_mod(&c(7, 8), &c(-2, 8), true, true, 8), c(1, 8));
        // division by zero
        assert_eq!(const_div(&c(7, 8), &c(0, 8), true, true, 8), Const::undef(8));
    }

    #[test]
    fn test_pow() {
        assert_eq!(const_pow(&c(2, 8), &c(10, 8), false, false, 16), c(1024, 16));
        assert_eq!(const_pow(&c(3, 8), &c(0, 8), false, false, 8), c(1, 8));
        assert_eq!(const_pow(&c(-1, 8), &c(3, 8), true, true, 8), c(-1, 8));
        // negative exponent collapses to zero for |base| > 1
        assert_eq!(const_pow(&c(2, 8), &c(-1, 8), true, true, 8), c(0, 8));
        assert_eq!(const_pow(&c(1, 8), &c(-5, 8), true, true, 8), c(1, 8));
        assert_eq!(const_pow(&c(-1, 8), &c(-2, 8), true, true, 8), c(1, 8));
    }

    #[test]
    fn test_bitwise_with_x() {
        let ax = Const::Bits(vec![State::S0, State::S1, State::Sx, State::Sx]);
        let b = Const::Bits(vec![State::S0, State::S1, State::S0, State::S1]);
        assert_eq!(
            const_and(&ax, &b, false, false, 4),
            Const::Bits(vec![State::S0, State::S1, State::S0, State::Sx])
        );
        assert_eq!(
            const_or(&ax, &b, false, false, 4),
            Const::Bits(vec![State::S0, State::S1, State::Sx, State::S1])
        );
        assert_eq!(
            const_xor(&ax, &b, false, false, 4),
            Const::Bits(vec![State::S0, State::S0, State::Sx, State::Sx])
        );
    }

    #[test]
    fn test_eq_ne_three_valued() {
        assert_eq!(const_eq(&c(5, 4), &c(5, 4), false, false, 1), c(1, 1));
        assert_eq!(const_eq(&c(5, 4), &c(6, 4), false, false, 1), c(0, 1));
        let partial = Const::Bits(vec![State::S0, State::Sx, State::S1, State::S0]);
        // differs in a defined position: definitely unequal
        assert_eq!(const_eq(&partial, &c(0, 4), false, false, 1), c(0, 1));
        // agrees on defined bits, undef elsewhere: unknown
        assert_eq!(
            const_eq(&partial, &c(0b0100, 4), false, false, 1),
            Const::Bits(vec![State::Sx])
        );
        assert_eq!(const_ne(&c(5, 4), &c(6, 4), false, false, 1), c(1, 1));
    }

    #[test]
    fn test_compare_signed_unsigned() {
        assert_eq!(const_lt(&c(-1, 4), &c(1, 4), true, true, 1), c(1, 1));
        // same bits compared unsigned: 15 < 1 is false
        assert_eq!(const_lt(&c(-1, 4), &c(1, 4), false, false, 1), c(0, 1));
        assert_eq!(const_ge(&c(3, 4), &c(3, 4), false, false, 1), c(1, 1));
        let x = Const::Bits(vec![State::Sx, State::S0]);
        assert_eq!(
            const_le(&x, &c(1, 2), false, false, 1),
            Const::Bits(vec![State::Sx])
        );
    }

    #[test]
    fn test_logic_ops() {
        assert_eq!(const_logic_and(&c(2, 2), &c(1, 2), 1), c(1, 1));
        assert_eq!(const_logic_and(&c(0, 2), &Const::undef(2), 1), c(0, 1));
        assert_eq!(
            const_logic_or(&c(0, 2), &Const::undef(2), 1),
            Const::Bits(vec![State::Sx])
        );
        assert_eq!(const_logic_or(&c(0, 2), &c(2, 2), 1), c(1, 1));
        assert_eq!(const_logic_not(&c(0, 3), 1), c(1, 1));
    }

    #[test]
    fn test_reductions() {
        assert_eq!(const_reduce_and(&c(0b111, 3), 1), c(1, 1));
        assert_eq!(const_reduce_and(&c(0b101, 3), 1), c(0, 1));
        assert_eq!(const_reduce_or(&c(0, 3), 1), c(0, 1));
        assert_eq!(const_reduce_xor(&c(0b110, 3), 1), c(0, 1));
        assert_eq!(const_reduce_xor(&c(0b100, 3), 1), c(1, 1));
        assert_eq!(const_reduce_xnor(&c(0b100, 3), 1), c(0, 1));
        // X dominates and/xor but not a decided or
        let withx = Const::Bits(vec![State::S1, State::Sx]);
        assert_eq!(const_reduce_or(&withx, 1), c(1, 1));
        assert_eq!(const_reduce_xor(&withx, 1), Const::Bits(vec![State::Sx]));
    }

    #[test]
    fn test_shifts() {
        assert_eq!(const_shl(&c(0b0011, 4), &c(1, 2), false, 4), c(0b0110, 4));
        assert_eq!(const_shr(&c(0b1100, 4), &c(2, 2), false, 4), c(0b0011, 4));
        // sshr sign-fills for signed operands
        assert_eq!(const_sshr(&c(-4, 4), &c(1, 2), true, 4), c(-2, 4));
        assert_eq!(const_sshr(&c(0b1000, 4), &c(1, 2), false, 4), c(0b0100, 4));
        // shr widens the operand to the result width before shifting
        assert_eq!(const_shr(&c(-2, 4), &c(1, 2), true, 8), c(127, 8));
        // undefined shift amount poisons everything
        assert_eq!(
            const_shl(&c(1, 4), &Const::undef(2), false, 4),
            Const::undef(4)
        );
    }

    #[test]
    fn test_shift_and_shiftx() {
        // negative amounts shift left
        assert_eq!(
            const_shift(&c(0b01, 2), &c(-1, 4), false, true, 4),
            c(0b010, 4)
        );
        assert_eq!(const_shift(&c(0b10, 2), &c(1, 4), false, false, 2), c(1, 2));
        let y = const_shiftx(&c(0b10, 2), &c(1, 4), false, 2);
        assert_eq!(y.bits()[0], State::S1);
        assert_eq!(y.bits()[1], State::Sx);
    }

    #[test]
    fn test_neg_not_pos() {
        assert_eq!(const_neg(&c(5, 8), true, 8), c(-5, 8));
        assert_eq!(const_not(&c(0b0101, 4), false, 4), c(0b1010, 4));
        assert_eq!(const_pos(&c(-2, 4), true, 8), c(-2, 8));
        assert_eq!(const_pos(&c(0b1110, 4), false, 8), c(14, 8));
    }
}
