//! The recompilation engine: JVM method bodies in, JavaScript functions out.
//!
//! Work happens in two phases. [`symbols::SymbolTable::discover`] runs over
//! every input class first, so that call sites can be resolved against classes
//! that appear later in the input. Each method is then partitioned into basic
//! blocks ([`blocks`]), every block is simulated on a symbolic operand stack
//! ([`stack_sim`]), and the blocks are stitched back together into one function
//! ([`assemble`]). [`class_recompiler`] assembles the classes into one module.

pub mod assemble;
pub mod blocks;
pub mod class_recompiler;
pub mod descriptor;
pub mod numeric;
pub mod runtime;
pub mod stack_sim;
pub mod symbols;

use std::fmt;

pub use self::class_recompiler::{recompile, RecompileOptions, Recompiler};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub enum RecompileError {
    /// A type or method descriptor that does not follow the grammar.
    MalformedDescriptor { descriptor: String },
    /// A byte that is not an opcode, or an opcode the engine cannot express.
    UnsupportedOpcode { opcode: u8, offset: u32 },
    /// The instruction starting at `offset` runs past the end of the code.
    UnexpectedEndOfInput { offset: u32 },
    /// The instruction at `offset` pops more values than the stack holds.
    StackUnderflow { offset: u32 },
    /// A constant pool index that is out of range or of the wrong kind.
    BadConstant { index: u16 },
    /// Any of the above, raised while recompiling the named method.
    Method {
        class: String,
        method: String,
        descriptor: String,
        source: Box<RecompileError>,
    },
}

impl RecompileError {
    /// Attach the owning class and method signature.
    pub fn in_method(self, class: &str, method: &str, descriptor: &str) -> Self {
        RecompileError::Method {
            class: class.to_string(),
            method: method.to_string(),
            descriptor: descriptor.to_string(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with method context stripped.
    pub fn root_cause(&self) -> &RecompileError {
        match self {
            RecompileError::Method { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl fmt::Display for RecompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecompileError::MalformedDescriptor { descriptor } => {
                write!(f, "malformed descriptor '{}'", descriptor)
            }
            RecompileError::UnsupportedOpcode { opcode, offset } => {
                write!(f, "unsupported opcode 0x{:02x} at offset {}", opcode, offset)
            }
            RecompileError::UnexpectedEndOfInput { offset } => {
                write!(f, "instruction at offset {} is truncated", offset)
            }
            RecompileError::StackUnderflow { offset } => {
                write!(f, "operand stack underflow at offset {}", offset)
            }
            RecompileError::BadConstant { index } => {
                write!(f, "constant pool entry #{} is missing or of the wrong kind", index)
            }
            RecompileError::Method {
                class,
                method,
                descriptor,
                source,
            } => write!(f, "failed to recompile {}.{}{}: {}", class, method, descriptor, source),
        }
    }
}

impl std::error::Error for RecompileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RecompileError::Method { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

pub type RecompileResult<T> = Result<T, RecompileError>;
