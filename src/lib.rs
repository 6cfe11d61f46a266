//! Recompiles parsed [Java classfiles](https://docs.oracle.com/javase/specs/jvms/se10/html/jvms-4.html)
//! into one self-contained JavaScript module.
//!
//! ```rust
//! use classfile_recompiler::{recompile, ClassAccessFlags, ClassFile, RecompileOptions};
//! use classfile_recompiler::attribute_info::CodeAttribute;
//! use classfile_recompiler::method_info::MethodAccessFlags;
//!
//! let mut class = ClassFile::new(ClassAccessFlags::PUBLIC, "demo/Answer", Some("java/lang/Object"));
//! class.add_method(
//!     MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
//!     "get",
//!     "()I",
//!     // bipush 42; ireturn
//!     Some(CodeAttribute { code: vec![0x10, 42, 0xac], ..Default::default() }),
//! );
//!
//! let source = recompile(&[class], &RecompileOptions::default()).unwrap();
//! assert!(source.contains("return 42;"));
//! ```

#[macro_use]
extern crate bitflags;

pub mod attribute_info;
pub mod constant_info;
pub mod field_info;
pub mod method_info;

pub mod code_attribute;

pub mod js;
pub mod recompile;
pub mod types;

pub use recompile::{recompile, RecompileError, RecompileOptions, RecompileResult, Recompiler};
pub use types::*;
