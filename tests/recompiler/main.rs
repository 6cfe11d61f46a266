use std::fs;
use std::process::Command;

use classfile_recompiler::attribute_info::CodeAttribute;
use classfile_recompiler::method_info::MethodAccessFlags;
use classfile_recompiler::{recompile, ClassAccessFlags, ClassFile, RecompileOptions};

mod constants;
mod dispatch;
mod errors;
mod module;
mod scenarios;

// --- Test helpers ---

const OBJECT: &str = "java/lang/Object";

fn class(name: &str) -> ClassFile {
    ClassFile::new(ClassAccessFlags::PUBLIC, name, Some(OBJECT))
}

fn code(bytes: Vec<u8>) -> Option<CodeAttribute> {
    Some(CodeAttribute {
        max_stack: 4,
        max_locals: 4,
        code: bytes,
        ..Default::default()
    })
}

fn static_method(class: &mut ClassFile, name: &str, desc: &str, bytes: Vec<u8>) {
    class.add_method(MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC, name, desc, code(bytes));
}

fn instance_method(class: &mut ClassFile, name: &str, desc: &str, bytes: Vec<u8>) {
    class.add_method(MethodAccessFlags::PUBLIC, name, desc, code(bytes));
}

/// `aload_0; invokespecial parent.<init>()V; return`
fn default_constructor(class: &mut ClassFile, parent: &str) {
    let index = class.get_or_add_method_ref(parent, "<init>", "()V");
    let [hi, lo] = index.to_be_bytes();
    instance_method(class, "<init>", "()V", vec![0x2a, 0xb7, hi, lo, 0xb1]);
}

fn compile(classes: &[ClassFile]) -> String {
    recompile(classes, &RecompileOptions::default()).expect("recompilation failed")
}

fn node_available() -> bool {
    Command::new("node")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Run the concatenated script parts with node and return trimmed stdout.
fn run_node(test_name: &str, parts: &[&str]) -> String {
    let tmp_dir = std::env::temp_dir().join(format!("classfile_recompile_{}", test_name));
    let _ = fs::remove_dir_all(&tmp_dir);
    fs::create_dir_all(&tmp_dir).unwrap();

    let script = tmp_dir.join("main.js");
    fs::write(&script, parts.join("\n")).expect("failed to write script");

    let run = Command::new("node").arg(&script).output().expect("failed to run node");
    assert!(
        run.status.success(),
        "node failed (exit {}): stderr={}\nscript:\n{}",
        run.status,
        String::from_utf8_lossy(&run.stderr),
        parts.join("\n")
    );
    String::from_utf8_lossy(&run.stdout).trim().to_string()
}
