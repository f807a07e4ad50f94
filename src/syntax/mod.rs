//! Syntax layer: the reader that turns text into symbolic trees.

pub mod parser;
pub mod reader_macro;

pub use parser::{read, read_all, read_all_named, Reader};
pub use reader_macro::{ReaderMacro, ReaderMacroFn};
