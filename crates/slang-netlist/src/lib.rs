mod builder;
mod fold;
mod fmt;

pub mod ast;
pub mod lower;
pub mod rtlil;

pub(crate) use fxhash::FxHashMap as HashMap;
pub(crate) use fxhash::FxHashSet as HashSet;

pub use builder::NetlistBuilder;
pub use lower::{lower, LowerError};
pub use rtlil::Design;
