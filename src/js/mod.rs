//! JavaScript output: syntax tree and source printer.

pub mod ast;
pub mod printer;

pub use self::ast::{BinOp, JsExpr, JsStmt, SwitchCase, UnaryOp};
pub use self::printer::{print_program, JsPrinter, RenderConfig};
