use super::*;

use std::error::Error;

use classfile_recompiler::RecompileError;

fn failing(name: &str, desc: &str, bytes: Vec<u8>) -> RecompileError {
    let mut a = class("p/A");
    static_method(&mut a, name, desc, bytes);
    recompile(&[a], &RecompileOptions::default()).expect_err("recompilation should fail")
}

#[test]
fn test_invokedynamic_is_rejected() {
    let err = failing("dyn", "()V", vec![0xba, 0x00, 0x01, 0x00, 0x00, 0xb1]);
    assert_eq!(
        err,
        RecompileError::Method {
            class: "p/A".into(),
            method: "dyn".into(),
            descriptor: "()V".into(),
            source: Box::new(RecompileError::UnsupportedOpcode {
                opcode: 0xba,
                offset: 0
            }),
        }
    );
    assert_eq!(
        err.to_string(),
        "failed to recompile p/A.dyn()V: unsupported opcode 0xba at offset 0"
    );
    assert!(err.source().is_some());
}

#[test]
fn test_malformed_bytecode() {
    // bipush without its operand
    let err = failing("cut", "()V", vec![0x10]);
    assert_eq!(err.root_cause(), &RecompileError::UnexpectedEndOfInput { offset: 0 });

    // 0xcb is not an opcode
    let err = failing("bad", "()V", vec![0x00, 0xcb]);
    assert_eq!(
        err.root_cause(),
        &RecompileError::UnsupportedOpcode {
            opcode: 0xcb,
            offset: 1
        }
    );

    // pop on an empty stack
    let err = failing("pop", "()V", vec![0x57, 0xb1]);
    assert_eq!(err.root_cause(), &RecompileError::StackUnderflow { offset: 0 });
}

#[test]
fn test_bad_constant_and_descriptor() {
    // invokestatic #99
    let err = failing("call", "()V", vec![0xb8, 0x00, 99, 0xb1]);
    assert_eq!(err.root_cause(), &RecompileError::BadConstant { index: 99 });

    let err = failing("odd", "(Q)V", vec![0xb1]);
    assert_eq!(
        err.root_cause(),
        &RecompileError::MalformedDescriptor {
            descriptor: "(Q)V".into()
        }
    );
}

#[test]
fn test_unresolved_classes_fall_back_to_raw_names() {
    let mut a = class("p/A");
    let [h, l] = a
        .get_or_add_method_ref("q/Elsewhere", "helper", "(I)I")
        .to_be_bytes();
    // iconst_2; invokestatic q/Elsewhere.helper; ireturn
    static_method(&mut a, "call", "()I", vec![0x05, 0xb8, h, l, 0xac]);
    let source = compile(&[a]);
    assert!(source.contains("return MODULE.q.Elsewhere.helper(2);"), "{}", source);
}
