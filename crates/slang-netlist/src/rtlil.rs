//! The netlist IR produced by elaboration.
//!
//! A [`Design`] is a list of [`Module`]s. A module holds named [`Wire`]s,
//! primitive [`Cell`]s, behavioral [`Process`]es and module-level
//! connections. Signals are bit-level: a [`SigSpec`] is an LSB-first list of
//! [`SigBit`]s, each either a four-state constant or a single bit of a wire.
//!
//! The case/switch tree of a process is stored arena-style inside the
//! process ([`CaseId`]/[`SwitchId`] links) so that builders can keep a
//! "current case" cursor without fighting the borrow checker.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{HashMap, HashSet};

/// A four-state logic value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum State {
    S0,
    S1,
    Sx,
    Sz,
}

impl State {
    pub fn is_def(&self) -> bool {
        matches!(self, State::S0 | State::S1)
    }

    pub fn from_bool(b: bool) -> State {
        if b { State::S1 } else { State::S0 }
    }

    fn to_char(self) -> char {
        match self {
            State::S0 => '0',
            State::S1 => '1',
            State::Sx => 'x',
            State::Sz => 'z',
        }
    }
}

/// A constant value: a four-state bit vector or a string.
///
/// String constants are used for `src` attributes and `print` formats;
/// everything arithmetic operates on the bit form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Const {
    Bits(Vec<State>),
    Str(String),
}

impl Const {
    pub fn undef(width: usize) -> Const {
        Const::Bits(vec![State::Sx; width])
    }

    pub fn zero(width: usize) -> Const {
        Const::Bits(vec![State::S0; width])
    }

    /// Two's-complement encoding of `value` at `width` bits, LSB first.
    pub fn from_int(value: i64, width: usize) -> Const {
        let mut bits = Vec::with_capacity(width);
        for i in 0..width {
            let bit = if i < 64 { (value >> i) & 1 != 0 } else { value < 0 };
            bits.push(State::from_bool(bit));
        }
        Const::Bits(bits)
    }

    pub fn from_bool(b: bool) -> Const {
        Const::Bits(vec![State::from_bool(b)])
    }

    /// Bit view. Strings are encoded byte-wise, last character at the LSB,
    /// eight bits per character.
    pub fn bits(&self) -> Vec<State> {
        match self {
            Const::Bits(bits) => bits.clone(),
            Const::Str(s) => {
                let mut bits = Vec::with_capacity(s.len() * 8);
                for byte in s.bytes().rev() {
                    for i in 0..8 {
                        bits.push(State::from_bool((byte >> i) & 1 != 0));
                    }
                }
                bits
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Const::Bits(bits) => bits.len(),
            Const::Str(s) => s.len() * 8,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_fully_def(&self) -> bool {
        self.bits().iter().all(|b| b.is_def())
    }

    pub fn is_fully_undef(&self) -> bool {
        !self.is_empty() && self.bits().iter().all(|b| !b.is_def())
    }

    /// True if any bit is `1`. Undefined bits count as zero.
    pub fn as_bool(&self) -> bool {
        self.bits().iter().any(|b| *b == State::S1)
    }

    /// Interpret as an integer. `None` if any bit is undefined or the value
    /// does not fit an `i64`.
    pub fn as_int(&self, signed: bool) -> Option<i64> {
        let bits = self.bits();
        if bits.iter().any(|b| !b.is_def()) {
            return None;
        }
        let sign = signed && bits.last() == Some(&State::S1);
        let mut value: i64 = if sign { -1 } else { 0 };
        for (i, bit) in bits.iter().enumerate() {
            let set = *bit == State::S1;
            if i >= 63 {
                // Out-of-window bits must match the fill.
                if set != sign {
                    return None;
                }
                continue;
            }
            if set {
                value |= 1 << i;
            } else {
                value &= !(1 << i);
            }
        }
        Some(value)
    }
}

impl fmt::Display for Const {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Const::Bits(bits) => {
                write!(f, "{}'", bits.len())?;
                for bit in bits.iter().rev() {
                    write!(f, "{}", bit.to_char())?;
                }
                Ok(())
            }
            Const::Str(s) => write!(f, "{:?}", s),
        }
    }
}

/// Wire handle, an index into the owning module's wire table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WireId(pub u32);

/// One bit of a named wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WireBit {
    pub wire: WireId,
    pub offset: u32,
}

/// A single signal bit: a constant or a wire bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SigBit {
    Const(State),
    Wire(WireBit),
}

impl SigBit {
    pub fn wire_bit(&self) -> Option<WireBit> {
        match self {
            SigBit::Wire(wb) => Some(*wb),
            SigBit::Const(_) => None,
        }
    }
}

impl From<State> for SigBit {
    fn from(s: State) -> SigBit {
        SigBit::Const(s)
    }
}

impl From<WireBit> for SigBit {
    fn from(wb: WireBit) -> SigBit {
        SigBit::Wire(wb)
    }
}

/// An ordered, concatenable sequence of signal bits, indexable LSB-first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SigSpec(Vec<SigBit>);

impl SigSpec {
    pub fn new() -> SigSpec {
        SigSpec(Vec::new())
    }

    pub fn repeated(state: State, n: usize) -> SigSpec {
        SigSpec(vec![SigBit::Const(state); n])
    }

    /// Concatenate parts given MSB-first (source order of `{a, b, c}`).
    pub fn concat<I: IntoIterator<Item = SigSpec>>(parts: I) -> SigSpec {
        let parts: Vec<SigSpec> = parts.into_iter().collect();
        let mut bits = Vec::new();
        for part in parts.into_iter().rev() {
            bits.extend(part.0);
        }
        SigSpec(bits)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn bit(&self, i: usize) -> SigBit {
        self.0[i]
    }

    pub fn msb(&self) -> SigBit {
        *self.0.last().expect("msb of empty signal")
    }

    pub fn iter(&self) -> impl Iterator<Item = &SigBit> {
        self.0.iter()
    }

    /// Append `other` above the current MSB.
    pub fn append(&mut self, other: impl Into<SigSpec>) {
        self.0.extend(other.into().0);
    }

    pub fn push(&mut self, bit: impl Into<SigBit>) {
        self.0.push(bit.into());
    }

    pub fn extract(&self, offset: usize, len: usize) -> SigSpec {
        SigSpec(self.0[offset..offset + len].to_vec())
    }

    pub fn repeat(&self, n: usize) -> SigSpec {
        let mut bits = Vec::with_capacity(self.0.len() * n);
        for _ in 0..n {
            bits.extend_from_slice(&self.0);
        }
        SigSpec(bits)
    }

    /// Truncate or extend to `width`; extension bits are the sign bit when
    /// `signed` (and the signal is non-empty), zero otherwise.
    pub fn extend_u0(&mut self, width: usize, signed: bool) {
        if self.0.len() > width {
            self.0.truncate(width);
            return;
        }
        let fill = if signed && !self.0.is_empty() {
            *self.0.last().unwrap()
        } else {
            SigBit::Const(State::S0)
        };
        while self.0.len() < width {
            self.0.push(fill);
        }
    }

    pub fn is_fully_const(&self) -> bool {
        self.0.iter().all(|b| matches!(b, SigBit::Const(_)))
    }

    pub fn is_fully_def(&self) -> bool {
        self.0
            .iter()
            .all(|b| matches!(b, SigBit::Const(s) if s.is_def()))
    }

    pub fn is_fully_ones(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|b| *b == SigBit::Const(State::S1))
    }

    pub fn is_fully_zero(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|b| *b == SigBit::Const(State::S0))
    }

    pub fn as_const(&self) -> Option<Const> {
        let mut bits = Vec::with_capacity(self.0.len());
        for b in &self.0 {
            match b {
                SigBit::Const(s) => bits.push(*s),
                SigBit::Wire(_) => return None,
            }
        }
        Some(Const::Bits(bits))
    }

    pub fn as_bool(&self) -> bool {
        self.as_const().map(|c| c.as_bool()).unwrap_or(false)
    }

    pub fn as_int(&self, signed: bool) -> Option<i64> {
        self.as_const().and_then(|c| c.as_int(signed))
    }

    /// Substitute wire bits through `map`; constants pass through.
    pub fn replace(&mut self, map: &BTreeMap<WireBit, SigBit>) {
        for bit in &mut self.0 {
            if let SigBit::Wire(wb) = bit {
                if let Some(repl) = map.get(wb) {
                    *bit = *repl;
                }
            }
        }
    }

    pub fn replaced(&self, map: &BTreeMap<WireBit, SigBit>) -> SigSpec {
        let mut out = self.clone();
        out.replace(map);
        out
    }

    /// Sort into canonical (wire, offset) order and drop duplicates.
    /// Meaningful for signals made of wire bits only.
    pub fn sort_and_unify(&mut self) {
        self.0.sort();
        self.0.dedup();
    }
}

impl From<Const> for SigSpec {
    fn from(c: Const) -> SigSpec {
        SigSpec(c.bits().into_iter().map(SigBit::Const).collect())
    }
}

impl From<State> for SigSpec {
    fn from(s: State) -> SigSpec {
        SigSpec(vec![SigBit::Const(s)])
    }
}

impl From<SigBit> for SigSpec {
    fn from(b: SigBit) -> SigSpec {
        SigSpec(vec![b])
    }
}

impl From<WireBit> for SigSpec {
    fn from(wb: WireBit) -> SigSpec {
        SigSpec(vec![SigBit::Wire(wb)])
    }
}

impl From<Vec<SigBit>> for SigSpec {
    fn from(bits: Vec<SigBit>) -> SigSpec {
        SigSpec(bits)
    }
}

/// Escape a user identifier the way the IR dump expects: public names get a
/// leading backslash, generated names keep their `$` prefix.
pub fn escape_id(name: &str) -> String {
    if name.starts_with('$') || name.starts_with('\\') || name.is_empty() {
        name.to_string()
    } else {
        format!("\\{}", name)
    }
}

#[derive(Debug, Clone)]
pub struct Wire {
    pub name: String,
    pub width: usize,
    pub port_input: bool,
    pub port_output: bool,
    pub port_id: Option<u32>,
    pub attributes: BTreeMap<String, Const>,
}

#[derive(Debug, Clone)]
pub struct Cell {
    pub name: String,
    /// Primitive opcode (`add`, `mux`, ...) or instantiated module name.
    pub kind: String,
    pub ports: BTreeMap<String, SigSpec>,
    pub parameters: BTreeMap<String, Const>,
    pub attributes: BTreeMap<String, Const>,
}

impl Cell {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Cell {
        Cell {
            name: name.into(),
            kind: kind.into(),
            ports: BTreeMap::new(),
            parameters: BTreeMap::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn set_port(&mut self, name: &str, sig: SigSpec) {
        self.ports.insert(name.to_string(), sig);
    }

    pub fn set_param(&mut self, name: &str, value: Const) {
        self.parameters.insert(name.to_string(), value);
    }

    pub fn set_param_int(&mut self, name: &str, value: i64) {
        self.set_param(name, Const::from_int(value, 32));
    }

    pub fn set_param_bool(&mut self, name: &str, value: bool) {
        self.set_param(name, Const::from_bool(value));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CaseId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwitchId(pub u32);

/// One guarded arm: compare values (empty = default), ordered actions and
/// child switches. Later actions override earlier ones for overlapping bits;
/// a parent case's actions execute before any child switch's.
#[derive(Debug, Clone, Default)]
pub struct CaseRule {
    pub compare: Vec<SigSpec>,
    pub actions: Vec<(SigSpec, SigSpec)>,
    pub switches: Vec<SwitchId>,
    pub attributes: BTreeMap<String, Const>,
}

/// A multi-branch dispatch on `signal`. The first matching case wins; a
/// default (empty compare) applies only when nothing else matched.
#[derive(Debug, Clone, Default)]
pub struct SwitchRule {
    pub signal: SigSpec,
    pub attributes: BTreeMap<String, Const>,
    pub cases: Vec<CaseId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncKind {
    Posedge,
    Negedge,
    EdgeAny,
    Always,
}

#[derive(Debug, Clone)]
pub struct SyncRule {
    pub kind: SyncKind,
    /// 1-bit trigger for the edge kinds, empty for `Always`.
    pub signal: SigSpec,
    pub actions: Vec<(SigSpec, SigSpec)>,
}

#[derive(Debug, Clone)]
pub struct Process {
    pub name: String,
    pub attributes: BTreeMap<String, Const>,
    pub root: CaseId,
    pub cases: Vec<CaseRule>,
    pub switches: Vec<SwitchRule>,
    pub syncs: Vec<SyncRule>,
}

impl Process {
    pub fn new(name: impl Into<String>) -> Process {
        Process {
            name: name.into(),
            attributes: BTreeMap::new(),
            root: CaseId(0),
            cases: vec![CaseRule::default()],
            switches: Vec::new(),
            syncs: Vec::new(),
        }
    }

    pub fn case(&self, id: CaseId) -> &CaseRule {
        &self.cases[id.0 as usize]
    }

    pub fn case_mut(&mut self, id: CaseId) -> &mut CaseRule {
        &mut self.cases[id.0 as usize]
    }

    pub fn switch(&self, id: SwitchId) -> &SwitchRule {
        &self.switches[id.0 as usize]
    }

    pub fn switch_mut(&mut self, id: SwitchId) -> &mut SwitchRule {
        &mut self.switches[id.0 as usize]
    }

    /// Append a switch under `parent` and return its id.
    pub fn add_switch(&mut self, parent: CaseId, rule: SwitchRule) -> SwitchId {
        let id = SwitchId(self.switches.len() as u32);
        self.switches.push(rule);
        self.case_mut(parent).switches.push(id);
        id
    }

    /// Append a case under `parent` and return its id.
    pub fn add_case(&mut self, parent: SwitchId, rule: CaseRule) -> CaseId {
        let id = CaseId(self.cases.len() as u32);
        self.cases.push(rule);
        self.switch_mut(parent).cases.push(id);
        id
    }
}

#[derive(Debug, Clone, Default)]
pub struct Module {
    pub name: String,
    pub attributes: BTreeMap<String, Const>,
    pub wires: Vec<Wire>,
    pub cells: Vec<Cell>,
    pub processes: Vec<Process>,
    pub connections: Vec<(SigSpec, SigSpec)>,
    wire_names: HashMap<String, WireId>,
    next_auto: u32,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Module {
        Module {
            name: name.into(),
            ..Module::default()
        }
    }

    pub fn add_wire(&mut self, name: impl Into<String>, width: usize) -> WireId {
        let name = name.into();
        assert!(
            !self.wire_names.contains_key(&name),
            "duplicate wire {}",
            name
        );
        let id = WireId(self.wires.len() as u32);
        self.wire_names.insert(name.clone(), id);
        self.wires.push(Wire {
            name,
            width,
            port_input: false,
            port_output: false,
            port_id: None,
            attributes: BTreeMap::new(),
        });
        id
    }

    pub fn auto_name(&mut self) -> String {
        let n = self.next_auto;
        self.next_auto += 1;
        format!("${}", n)
    }

    pub fn auto_name_suffix(&mut self, suffix: &str) -> String {
        let n = self.next_auto;
        self.next_auto += 1;
        format!("${}${}", n, suffix)
    }

    pub fn add_auto_wire(&mut self, width: usize) -> WireId {
        let name = self.auto_name();
        self.add_wire(name, width)
    }

    pub fn wire(&self, name: &str) -> Option<WireId> {
        self.wire_names.get(name).copied()
    }

    pub fn wire_data(&self, id: WireId) -> &Wire {
        &self.wires[id.0 as usize]
    }

    pub fn wire_mut(&mut self, id: WireId) -> &mut Wire {
        &mut self.wires[id.0 as usize]
    }

    /// The full bit range of a wire as a signal.
    pub fn wire_sig(&self, id: WireId) -> SigSpec {
        let width = self.wire_data(id).width;
        SigSpec::from(
            (0..width as u32)
                .map(|offset| SigBit::Wire(WireBit { wire: id, offset }))
                .collect::<Vec<_>>(),
        )
    }

    pub fn add_cell(&mut self, cell: Cell) {
        self.cells.push(cell);
    }

    pub fn add_process(&mut self, proc: Process) {
        self.processes.push(proc);
    }

    pub fn connect(&mut self, lhs: SigSpec, rhs: SigSpec) {
        assert_eq!(lhs.len(), rhs.len(), "connection width mismatch");
        self.connections.push((lhs, rhs));
    }

    /// Assign port ids to all port-marked wires in creation order.
    pub fn fixup_ports(&mut self) {
        let mut next = 1;
        for wire in &mut self.wires {
            if wire.port_input || wire.port_output {
                wire.port_id = Some(next);
                next += 1;
            } else {
                wire.port_id = None;
            }
        }
    }

    /// Structural sanity checks: width parameters must agree with the bound
    /// port signals, every referenced wire bit must be in range, process
    /// actions and connections must pair equal widths.
    pub fn check(&self) -> Result<(), String> {
        let mut cell_names: HashSet<&str> = HashSet::default();
        for cell in &self.cells {
            if !cell_names.insert(&cell.name) {
                return Err(format!("duplicate cell name {}", cell.name));
            }
            for (port, param) in [
                ("A", "A_WIDTH"),
                ("B", "B_WIDTH"),
                ("S", "S_WIDTH"),
                ("Y", "Y_WIDTH"),
            ] {
                if let (Some(sig), Some(width)) =
                    (cell.ports.get(port), cell.parameters.get(param))
                {
                    if width.as_int(false) != Some(sig.len() as i64) {
                        return Err(format!(
                            "cell {}: port {} width {} does not match parameter {} = {}",
                            cell.name,
                            port,
                            sig.len(),
                            param,
                            width
                        ));
                    }
                }
            }
            for sig in cell.ports.values() {
                self.check_sig(sig)?;
            }
        }
        for (lhs, rhs) in &self.connections {
            if lhs.len() != rhs.len() {
                return Err(format!(
                    "connection width mismatch: {} vs {}",
                    lhs.len(),
                    rhs.len()
                ));
            }
            self.check_sig(lhs)?;
            self.check_sig(rhs)?;
        }
        for proc in &self.processes {
            for case in &proc.cases {
                for (lhs, rhs) in &case.actions {
                    if lhs.len() != rhs.len() {
                        return Err(format!(
                            "process {}: action width mismatch: {} vs {}",
                            proc.name,
                            lhs.len(),
                            rhs.len()
                        ));
                    }
                }
            }
            for sw in &proc.switches {
                for case_id in &sw.cases {
                    for compare in &proc.case(*case_id).compare {
                        if compare.len() != sw.signal.len() {
                            return Err(format!(
                                "process {}: case compare width {} does not match switch width {}",
                                proc.name,
                                compare.len(),
                                sw.signal.len()
                            ));
                        }
                    }
                }
            }
            for sync in &proc.syncs {
                if sync.kind != SyncKind::Always && sync.signal.len() != 1 {
                    return Err(format!(
                        "process {}: edge sync rule must have a 1-bit signal",
                        proc.name
                    ));
                }
                for (lhs, rhs) in &sync.actions {
                    if lhs.len() != rhs.len() {
                        return Err(format!(
                            "process {}: sync action width mismatch",
                            proc.name
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    fn check_sig(&self, sig: &SigSpec) -> Result<(), String> {
        for bit in sig.iter() {
            if let SigBit::Wire(wb) = bit {
                let wire = self
                    .wires
                    .get(wb.wire.0 as usize)
                    .ok_or_else(|| format!("reference to unknown wire #{}", wb.wire.0))?;
                if wb.offset as usize >= wire.width {
                    return Err(format!(
                        "bit {} out of range for wire {} of width {}",
                        wb.offset, wire.name, wire.width
                    ));
                }
            }
        }
        Ok(())
    }

    fn fmt_sig(&self, f: &mut fmt::Formatter<'_>, sig: &SigSpec) -> fmt::Result {
        // Group into chunks of consecutive wire bits / runs of constants.
        enum Chunk {
            Bits(Vec<State>),
            Wire(WireId, u32, u32), // wire, lo, hi (inclusive)
        }
        let mut chunks: Vec<Chunk> = Vec::new();
        for bit in sig.iter() {
            match (bit, chunks.last_mut()) {
                (SigBit::Const(s), Some(Chunk::Bits(bits))) => bits.push(*s),
                (SigBit::Const(s), _) => chunks.push(Chunk::Bits(vec![*s])),
                (SigBit::Wire(wb), Some(Chunk::Wire(w, _, hi)))
                    if *w == wb.wire && wb.offset == *hi + 1 =>
                {
                    *hi = wb.offset;
                }
                (SigBit::Wire(wb), _) => {
                    chunks.push(Chunk::Wire(wb.wire, wb.offset, wb.offset))
                }
            }
        }
        let fmt_chunk = |f: &mut fmt::Formatter<'_>, chunk: &Chunk| -> fmt::Result {
            match chunk {
                Chunk::Bits(bits) => {
                    write!(f, "{}'", bits.len())?;
                    for bit in bits.iter().rev() {
                        write!(f, "{}", bit.to_char())?;
                    }
                    Ok(())
                }
                Chunk::Wire(w, lo, hi) => {
                    let wire = self.wire_data(*w);
                    if *lo == 0 && *hi as usize == wire.width - 1 {
                        write!(f, "{}", wire.name)
                    } else if lo == hi {
                        write!(f, "{} [{}]", wire.name, lo)
                    } else {
                        write!(f, "{} [{}:{}]", wire.name, hi, lo)
                    }
                }
            }
        };
        if chunks.len() == 1 {
            fmt_chunk(f, &chunks[0])
        } else {
            // MSB-first in braces, like source-level concatenation.
            write!(f, "{{")?;
            for chunk in chunks.iter().rev() {
                write!(f, " ")?;
                fmt_chunk(f, chunk)?;
            }
            write!(f, " }}")
        }
    }

    fn fmt_case(
        &self,
        f: &mut fmt::Formatter<'_>,
        proc: &Process,
        case: &CaseRule,
        indent: usize,
    ) -> fmt::Result {
        let pad = "  ".repeat(indent);
        for (lhs, rhs) in &case.actions {
            write!(f, "{}assign ", pad)?;
            self.fmt_sig(f, lhs)?;
            write!(f, " ")?;
            self.fmt_sig(f, rhs)?;
            writeln!(f)?;
        }
        for sw_id in &case.switches {
            let sw = proc.switch(*sw_id);
            write!(f, "{}switch ", pad)?;
            self.fmt_sig(f, &sw.signal)?;
            writeln!(f)?;
            for case_id in &sw.cases {
                let child = proc.case(*case_id);
                write!(f, "{}  case", pad)?;
                for (i, compare) in child.compare.iter().enumerate() {
                    write!(f, "{} ", if i > 0 { "," } else { "" })?;
                    self.fmt_sig(f, compare)?;
                }
                writeln!(f)?;
                self.fmt_case(f, proc, child, indent + 2)?;
            }
            writeln!(f, "{}end", pad)?;
        }
        Ok(())
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.attributes {
            writeln!(f, "attribute {} {}", name, value)?;
        }
        writeln!(f, "module {}", self.name)?;
        for wire in &self.wires {
            for (name, value) in &wire.attributes {
                writeln!(f, "  attribute {} {}", name, value)?;
            }
            write!(f, "  wire width {}", wire.width)?;
            if let Some(id) = wire.port_id {
                if wire.port_input {
                    write!(f, " input {}", id)?;
                }
                if wire.port_output {
                    write!(f, " output {}", id)?;
                }
            }
            writeln!(f, " {}", wire.name)?;
        }
        for cell in &self.cells {
            for (name, value) in &cell.attributes {
                writeln!(f, "  attribute {} {}", name, value)?;
            }
            writeln!(f, "  cell {} {}", cell.kind, cell.name)?;
            for (name, value) in &cell.parameters {
                writeln!(f, "    parameter {} {}", name, value)?;
            }
            for (name, sig) in &cell.ports {
                write!(f, "    connect {} ", name)?;
                self.fmt_sig(f, sig)?;
                writeln!(f)?;
            }
            writeln!(f, "  end")?;
        }
        for proc in &self.processes {
            for (name, value) in &proc.attributes {
                writeln!(f, "  attribute {} {}", name, value)?;
            }
            writeln!(f, "  process {}", proc.name)?;
            self.fmt_case(f, proc, proc.case(proc.root), 2)?;
            for sync in &proc.syncs {
                match sync.kind {
                    SyncKind::Always => writeln!(f, "    sync always")?,
                    kind => {
                        let word = match kind {
                            SyncKind::Posedge => "posedge",
                            SyncKind::Negedge => "negedge",
                            SyncKind::EdgeAny => "edge",
                            SyncKind::Always => unreachable!(),
                        };
                        write!(f, "    sync {} ", word)?;
                        self.fmt_sig(f, &sync.signal)?;
                        writeln!(f)?;
                    }
                }
                for (lhs, rhs) in &sync.actions {
                    write!(f, "      update ")?;
                    self.fmt_sig(f, lhs)?;
                    write!(f, " ")?;
                    self.fmt_sig(f, rhs)?;
                    writeln!(f)?;
                }
            }
            writeln!(f, "  end")?;
        }
        for (lhs, rhs) in &self.connections {
            write!(f, "  connect ")?;
            self.fmt_sig(f, lhs)?;
            write!(f, " ")?;
            self.fmt_sig(f, rhs)?;
            writeln!(f)?;
        }
        writeln!(f, "end")
    }
}

#[derive(Debug, Clone, Default)]
pub struct Design {
    pub modules: Vec<Module>,
}

impl Design {
    pub fn add_module(&mut self, module: Module) {
        assert!(
            self.module(&module.name).is_none(),
            "duplicate module {}",
            module.name
        );
        self.modules.push(module);
    }

    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.name == name)
    }
}

impl fmt::Display for Design {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, module) in self.modules.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", module)?;
        }
        Ok(())
    }
}
