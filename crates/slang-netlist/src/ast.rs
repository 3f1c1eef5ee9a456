//! The consumed abstract syntax tree.
//!
//! This is the shape of the external SystemVerilog frontend's output after
//! parsing, type checking and constant evaluation: a symbol arena rooted in
//! a [`Compilation`], with closed expression/statement/symbol categories.
//! The `slang` driver deserializes it from JSON; tests build it directly.

pub mod constant;
pub mod expr;

use serde::{Deserialize, Serialize};

pub use constant::{try_eval, ConstantValue, SVInt};
pub use expr::{
    BinaryOperator, BlockKind, CallExpression, CallTarget, CaseCondition, CaseItem,
    ConditionalPart, EdgeKind, ExprKind, Expression, RangeSelectionKind, Statement, StmtKind,
    TimingControl, UnaryOperator, UniquePriorityCheck,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceLoc {
    pub file: u32,
    pub line: u32,
    pub col: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceRange {
    pub start: SourceLoc,
    pub end: SourceLoc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    pub name: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceManager {
    pub files: Vec<SourceFile>,
}

impl SourceManager {
    fn file_name(&self, loc: SourceLoc) -> Option<&str> {
        let file = self.files.get(loc.file as usize)?;
        if file.name.is_empty() {
            None
        } else {
            Some(&file.name)
        }
    }

    /// `file:line.col-line.col`, collapsed to a single point when start and
    /// end coincide. Empty when the location is not backed by a file.
    pub fn format_range(&self, range: SourceRange) -> String {
        let Some(name) = self.file_name(range.start) else {
            return String::new();
        };
        if range.start == range.end {
            format!("{}:{}.{}", name, range.start.line, range.start.col)
        } else {
            format!(
                "{}:{}.{}-{}.{}",
                name, range.start.line, range.start.col, range.end.line, range.end.col
            )
        }
    }

    /// The source text line the range starts on, for diagnostics.
    pub fn source_line(&self, range: SourceRange) -> Option<String> {
        let file = self.files.get(range.start.file as usize)?;
        file.text
            .lines()
            .nth(range.start.line.checked_sub(1)? as usize)
            .map(|l| l.to_string())
    }
}

/// Left/right bounds of a packed or unpacked fixed range, as written in the
/// source (`[7:0]` has `left = 7, right = 0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantRange {
    pub left: i32,
    pub right: i32,
}

impl ConstantRange {
    pub fn lower(&self) -> i32 {
        self.left.min(self.right)
    }

    pub fn upper(&self) -> i32 {
        self.left.max(self.right)
    }

    pub fn width(&self) -> usize {
        (self.upper() - self.lower()) as usize + 1
    }

    /// Convert a source-level index into a zero-based offset from the LSB.
    pub fn translate_index(&self, index: i32) -> i32 {
        if self.left >= self.right {
            index - self.lower()
        } else {
            self.upper() - index
        }
    }

    pub fn contains(&self, index: i32) -> bool {
        index >= self.lower() && index <= self.upper()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Type {
    /// A packed vector or scalar.
    Integral {
        width: u32,
        signed: bool,
        #[serde(default)]
        range: Option<ConstantRange>,
    },
    /// A fixed-size unpacked array.
    Array { elem: Box<Type>, range: ConstantRange },
    /// A packed struct; member layout lives on the field symbols.
    Struct { width: u32 },
    Void,
}

impl Type {
    pub fn logic(width: u32) -> Type {
        Type::Integral {
            width,
            signed: false,
            range: None,
        }
    }

    pub fn logic_signed(width: u32) -> Type {
        Type::Integral {
            width,
            signed: true,
            range: None,
        }
    }

    pub fn bitstream_width(&self) -> usize {
        match self {
            Type::Integral { width, .. } => *width as usize,
            Type::Array { elem, range } => elem.bitstream_width() * range.width(),
            Type::Struct { width } => *width as usize,
            Type::Void => 0,
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Type::Integral { signed: true, .. })
    }

    pub fn is_integral(&self) -> bool {
        matches!(self, Type::Integral { .. })
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array { .. })
    }

    pub fn is_fixed_size(&self) -> bool {
        !matches!(self, Type::Void)
    }

    pub fn fixed_range(&self) -> Option<ConstantRange> {
        match self {
            Type::Integral { width, range, .. } => Some(range.unwrap_or(ConstantRange {
                left: *width as i32 - 1,
                right: 0,
            })),
            Type::Array { range, .. } => Some(*range),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortDirection {
    In,
    Out,
    InOut,
    Ref,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProceduralBlockKind {
    Always,
    AlwaysComb,
    AlwaysLatch,
    AlwaysFf,
    Initial,
    Final,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubroutineKind {
    Function,
    Task,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortConnection {
    pub port: SymbolId,
    pub expr: Option<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SymbolKind {
    Instance {
        body: SymbolId,
        #[serde(default)]
        connections: Vec<PortConnection>,
    },
    InstanceBody {
        members: Vec<SymbolId>,
    },
    Net {
        ty: Type,
        #[serde(default)]
        initializer: Option<Expression>,
    },
    Variable {
        ty: Type,
        #[serde(default)]
        initializer: Option<Expression>,
    },
    Parameter {
        ty: Type,
        value: ConstantValue,
    },
    Port {
        internal: SymbolId,
        direction: PortDirection,
    },
    Field {
        ty: Type,
        bit_offset: u32,
    },
    FormalArgument {
        ty: Type,
    },
    Subroutine {
        kind: SubroutineKind,
        args: Vec<SymbolId>,
        return_var: SymbolId,
        body: Statement,
        members: Vec<SymbolId>,
    },
    StatementBlock {
        members: Vec<SymbolId>,
    },
    GenerateBlock {
        members: Vec<SymbolId>,
        #[serde(default)]
        uninstantiated: bool,
    },
    ContinuousAssign {
        assign: Expression,
    },
    ProceduralBlock {
        kind: ProceduralBlockKind,
        body: Statement,
    },
    TypeAlias,
    NetType,
    TransparentMember,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    #[serde(default)]
    pub parent: Option<SymbolId>,
    #[serde(default)]
    pub src: SourceRange,
    #[serde(default)]
    pub attrs: Vec<(String, SVInt)>,
    pub kind: SymbolKind,
}

impl Symbol {
    /// The declared type of a value symbol (net, variable, formal argument).
    pub fn value_type(&self) -> Option<&Type> {
        match &self.kind {
            SymbolKind::Net { ty, .. }
            | SymbolKind::Variable { ty, .. }
            | SymbolKind::FormalArgument { ty } => Some(ty),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Compilation {
    pub symbols: Vec<Symbol>,
    pub roots: Vec<SymbolId>,
    #[serde(default)]
    pub sources: SourceManager,
}

impl Compilation {
    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    pub fn add_symbol(&mut self, sym: Symbol) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(sym);
        id
    }

    /// Dotted path from the design root: instance names plus named scopes.
    pub fn hierarchical_path(&self, id: SymbolId) -> String {
        let mut parts = Vec::new();
        let mut cursor = Some(id);
        let mut leaf = true;
        while let Some(i) = cursor {
            let sym = self.symbol(i);
            let include = if leaf {
                !sym.name.is_empty()
            } else {
                match sym.kind {
                    SymbolKind::Instance { .. } => !sym.name.is_empty(),
                    SymbolKind::StatementBlock { .. }
                    | SymbolKind::GenerateBlock { .. }
                    | SymbolKind::Subroutine { .. } => !sym.name.is_empty(),
                    _ => false,
                }
            };
            if include {
                parts.push(sym.name.as_str());
            }
            leaf = false;
            cursor = sym.parent;
        }
        parts.reverse();
        parts.join(".")
    }

    /// The instance body a symbol is declared under, if any.
    pub fn enclosing_body(&self, id: SymbolId) -> Option<SymbolId> {
        let mut cursor = self.symbol(id).parent;
        while let Some(i) = cursor {
            if matches!(self.symbol(i).kind, SymbolKind::InstanceBody { .. }) {
                return Some(i);
            }
            cursor = self.symbol(i).parent;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_range_translate() {
        // descending [7:0]
        let desc = ConstantRange { left: 7, right: 0 };
        assert_eq!(desc.translate_index(0), 0);
        assert_eq!(desc.translate_index(7), 7);
        assert_eq!(desc.width(), 8);
        // ascending [0:7]
        let asc = ConstantRange { left: 0, right: 7 };
        assert_eq!(asc.translate_index(0), 7);
        assert_eq!(asc.translate_index(7), 0);
        // offset descending [11:4]
        let off = ConstantRange { left: 11, right: 4 };
        assert_eq!(off.translate_index(4), 0);
        assert_eq!(off.translate_index(11), 7);
        assert!(off.contains(4) && off.contains(11) && !off.contains(3));
    }

    #[test]
    fn test_type_queries() {
        let v = Type::logic(8);
        assert_eq!(v.bitstream_width(), 8);
        assert_eq!(v.fixed_range(), Some(ConstantRange { left: 7, right: 0 }));
        assert!(!v.is_signed());
        let arr = Type::Array {
            elem: Box::new(Type::logic(4)),
            range: ConstantRange { left: 0, right: 3 },
        };
        assert_eq!(arr.bitstream_width(), 16);
        assert!(arr.is_array());
    }

    #[test]
    fn test_hierarchical_path() {
        let mut comp = Compilation::default();
        let top_inst = comp.add_symbol(Symbol {
            name: "top".into(),
            parent: None,
            src: SourceRange::default(),
            attrs: vec![],
            kind: SymbolKind::Instance {
                body: SymbolId(0), // patched below
                connections: vec![],
            },
        });
        let top_body = comp.add_symbol(Symbol {
            name: String::new(),
            parent: Some(top_inst),
            src: SourceRange::default(),
            attrs: vec![],
            kind: SymbolKind::InstanceBody { members: vec![] },
        });
        let net = comp.add_symbol(Symbol {
            name: "x".into(),
            parent: Some(top_body),
            src: SourceRange::default(),
            attrs: vec![],
            kind: SymbolKind::Net {
                ty: Type::logic(1),
                initializer: None,
            },
        });
        assert_eq!(comp.hierarchical_path(top_inst), "top");
        assert_eq!(comp.hierarchical_path(top_body), "top");
        assert_eq!(comp.hierarchical_path(net), "top.x");
        assert_eq!(comp.enclosing_body(net), Some(top_body));
    }
}
