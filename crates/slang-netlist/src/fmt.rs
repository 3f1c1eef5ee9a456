//! Display-format lowering for `print` cells.
//!
//! A `$display` call is a mix of string arguments (which may contain `%`
//! directives) and value arguments. Parsing flattens them into literal and
//! argument parts; rendering packs the parts into the cell's `FORMAT`
//! parameter and concatenates the argument signals onto the `ARGS` port,
//! first argument at the LSB end.
//!
//! The `FORMAT` placeholder syntax is `{<bits>:<base><s|u>[0<width>]}` plus
//! `{time}`/`{realtime}`; braces in literal text are doubled.

use std::collections::VecDeque;

use crate::rtlil::{Cell, Const, SigSpec};

#[derive(Debug, Clone)]
pub enum FmtArg {
    Str(String),
    Int { sig: SigSpec, signed: bool },
    Time { realtime: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FmtPart {
    Literal(String),
    Arg {
        sig: SigSpec,
        signed: bool,
        /// 2, 8, 10 or 16; 0 renders the value as a character.
        base: u8,
        width: Option<usize>,
        zero_pad: bool,
    },
    Time {
        realtime: bool,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Fmt {
    pub parts: Vec<FmtPart>,
}

impl Fmt {
    pub fn append_literal(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(FmtPart::Literal(existing)) = self.parts.last_mut() {
            existing.push_str(text);
        } else {
            self.parts.push(FmtPart::Literal(text.to_string()));
        }
    }

    /// Parse a `$display`-style argument list. String arguments drive the
    /// format; remaining value arguments print in `default_base`.
    pub fn parse_display(args: Vec<FmtArg>, default_base: u8) -> Result<Fmt, String> {
        let mut fmt = Fmt::default();
        let mut queue: VecDeque<FmtArg> = args.into();

        while let Some(arg) = queue.pop_front() {
            match arg {
                FmtArg::Int { sig, signed } => fmt.parts.push(FmtPart::Arg {
                    sig,
                    signed,
                    base: default_base,
                    width: None,
                    zero_pad: false,
                }),
                FmtArg::Time { realtime } => fmt.parts.push(FmtPart::Time { realtime }),
                FmtArg::Str(text) => fmt.parse_directives(&text, &mut queue)?,
            }
        }
        Ok(fmt)
    }

    fn parse_directives(
        &mut self,
        text: &str,
        queue: &mut VecDeque<FmtArg>,
    ) -> Result<(), String> {
        let mut chars = text.chars().peekable();
        let mut literal = String::new();
        while let Some(ch) = chars.next() {
            if ch != '%' {
                literal.push(ch);
                continue;
            }
            let mut zero_pad = false;
            let mut width = None;
            if chars.peek() == Some(&'0') {
                zero_pad = true;
                chars.next();
            }
            let mut digits = String::new();
            while let Some(d) = chars.peek() {
                if d.is_ascii_digit() {
                    digits.push(*d);
                    chars.next();
                } else {
                    break;
                }
            }
            if !digits.is_empty() {
                width = Some(digits.parse::<usize>().map_err(|e| e.to_string())?);
            }
            let conv = chars.next().ok_or("format string ends mid-directive")?;
            match conv {
                '%' => {
                    literal.push('%');
                    continue;
                }
                's' => {
                    match queue.pop_front() {
                        Some(FmtArg::Str(s)) => literal.push_str(&s),
                        _ => return Err("%s expects a string argument".into()),
                    }
                    continue;
                }
                't' => {
                    self.append_literal(&std::mem::take(&mut literal));
                    match queue.pop_front() {
                        Some(FmtArg::Time { realtime }) => {
                            self.parts.push(FmtPart::Time { realtime })
                        }
                        Some(FmtArg::Int { sig, signed }) => self.parts.push(FmtPart::Arg {
                            sig,
                            signed,
                            base: 10,
                            width,
                            zero_pad,
                        }),
                        _ => return Err("%t expects a time or value argument".into()),
                    }
                    continue;
                }
                _ => {}
            }
            let base = match conv {
                'b' | 'B' => 2,
                'o' | 'O' => 8,
                'd' | 'D' => 10,
                'h' | 'H' | 'x' | 'X' => 16,
                'c' => 0,
                other => return Err(format!("unsupported format directive %{}", other)),
            };
            self.append_literal(&std::mem::take(&mut literal));
            match queue.pop_front() {
                Some(FmtArg::Int { sig, signed }) => self.parts.push(FmtPart::Arg {
                    sig,
                    signed,
                    base,
                    width,
                    zero_pad,
                }),
                _ => return Err(format!("%{} expects a value argument", conv)),
            }
        }
        self.append_literal(&literal);
        Ok(())
    }

    /// Install `FORMAT` and `ARGS` on a `print` cell.
    pub fn emit_to_cell(&self, cell: &mut Cell) {
        let mut format = String::new();
        let mut args = SigSpec::new();
        for part in &self.parts {
            match part {
                FmtPart::Literal(text) => {
                    for ch in text.chars() {
                        match ch {
                            '{' => format.push_str("{{"),
                            '}' => format.push_str("}}"),
                            _ => format.push(ch),
                        }
                    }
                }
                FmtPart::Arg {
                    sig,
                    signed,
                    base,
                    width,
                    zero_pad,
                } => {
                    format.push('{');
                    format.push_str(&sig.len().to_string());
                    format.push(':');
                    format.push(match base {
                        2 => 'b',
                        8 => 'o',
                        16 => 'h',
                        0 => 'c',
                        _ => 'd',
                    });
                    format.push(if *signed { 's' } else { 'u' });
                    if let Some(w) = width {
                        if *zero_pad {
                            format.push('0');
                        }
                        format.push_str(&w.to_string());
                    }
                    format.push('}');
                    args.append(sig.clone());
                }
                FmtPart::Time { realtime } => {
                    format.push_str(if *realtime { "{realtime}" } else { "{time}" });
                }
            }
        }
        cell.set_param("FORMAT", Const::Str(format));
        cell.set_param_int("ARGS_WIDTH", args.len() as i64);
        cell.set_port("ARGS", args);
    }
}
