use super::*;

use classfile_recompiler::recompile::symbols::fingerprint;

// --- Straight-line code ---

#[test]
fn test_constant_return_is_a_single_block() {
    let mut a = class("p/A");
    // iconst_1; ireturn
    static_method(&mut a, "one", "()I", vec![0x04, 0xac]);
    let source = compile(&[a]);

    assert!(source.contains("MODULE.p.A.one = function () {"), "{}", source);
    assert!(source.contains("return 1;"), "{}", source);
    assert_eq!(source.matches("function __lbl").count(), 1, "{}", source);
    assert_eq!(source.matches("__lbl0(").count(), 2, "only the declaration and the entry call:\n{}", source);
}

#[test]
fn test_constant_return_runs() {
    if !node_available() {
        eprintln!("skipping: node not found");
        return;
    }
    let mut a = class("p/A");
    static_method(&mut a, "one", "()I", vec![0x04, 0xac]);
    let output = run_node("constant_return", &[&compile(&[a]), "console.log(jvm.p.A.one());"]);
    assert_eq!(output, "1");
}

// --- Conditionals ---

/// `iload_0; iconst_5; if_icmplt L1; iconst_0; ireturn; L1: iconst_1; ireturn`
fn below_five() -> ClassFile {
    let mut a = class("p/A");
    static_method(
        &mut a,
        "check",
        "(I)I",
        vec![0x1a, 0x08, 0xa1, 0x00, 0x05, 0x03, 0xac, 0x04, 0xac],
    );
    a
}

#[test]
fn test_compare_branch_becomes_conditional() {
    let source = compile(&[below_five()]);
    assert!(source.contains("if (__vars[0] < 5) {"), "{}", source);
    assert!(source.contains("return new __Jump(__lbl7, []);"), "{}", source);
    assert!(source.contains("return new __Jump(__lbl5, []);"), "{}", source);
    assert!(source.contains("return __run(__lbl0());"), "{}", source);
    assert!(source.contains("function __lbl5() {"), "{}", source);
    assert!(source.contains("function __lbl7() {"), "{}", source);
}

#[test]
fn test_compare_branch_runs() {
    if !node_available() {
        eprintln!("skipping: node not found");
        return;
    }
    let output = run_node(
        "compare_branch",
        &[
            &compile(&[below_five()]),
            "console.log(jvm.p.A.check(3), jvm.p.A.check(5), jvm.p.A.check(9));",
        ],
    );
    assert_eq!(output, "1 0 0");
}

// --- Overloads ---

/// `p/B` calls both `p/A.foo` overloads and is listed before `p/A`.
fn overloads() -> Vec<ClassFile> {
    let mut a = class("p/A");
    // iload_0; iconst_1; iadd; ireturn
    static_method(&mut a, "foo", "(I)I", vec![0x1a, 0x04, 0x60, 0xac]);
    // bipush 7; ireturn
    static_method(&mut a, "foo", "(Ljava/lang/String;)I", vec![0x10, 7, 0xac]);

    let mut b = class("p/B");
    let [ihi, ilo] = b.get_or_add_method_ref("p/A", "foo", "(I)I").to_be_bytes();
    let [shi, slo] = b
        .get_or_add_method_ref("p/A", "foo", "(Ljava/lang/String;)I")
        .to_be_bytes();
    let text = b.get_or_add_string("x");
    assert!(text <= u8::MAX as u16);
    // iconst_3; invokestatic; ireturn
    static_method(&mut b, "callInt", "()I", vec![0x06, 0xb8, ihi, ilo, 0xac]);
    // ldc "x"; invokestatic; ireturn
    static_method(&mut b, "callStr", "()I", vec![0x12, text as u8, 0xb8, shi, slo, 0xac]);

    vec![b, a]
}

#[test]
fn test_overloads_get_distinct_names() {
    let source = compile(&overloads());
    let mangled = format!("foo_{}", fingerprint("(Ljava/lang/String;)I"));

    assert!(source.contains("MODULE.p.A.foo = function (p0) {"), "{}", source);
    assert!(
        source.contains(&format!("MODULE.p.A.{} = function (p0) {{", mangled)),
        "{}",
        source
    );
    assert!(source.contains("return MODULE.p.A.foo(3);"), "{}", source);
    assert!(
        source.contains(&format!("return MODULE.p.A.{}(\"x\");", mangled)),
        "{}",
        source
    );
}

#[test]
fn test_overloads_run() {
    if !node_available() {
        eprintln!("skipping: node not found");
        return;
    }
    let output = run_node(
        "overloads",
        &[&compile(&overloads()), "console.log(jvm.p.B.callInt(), jvm.p.B.callStr());"],
    );
    assert_eq!(output, "4 7");
}

// --- Switches ---

/// `lookupswitch {1: 10, 2: 20, default: -1}` on the first argument.
fn lookup() -> ClassFile {
    let mut a = class("p/A");
    let mut bytes = vec![0x1a, 0xab, 0x00, 0x00];
    for word in [33i32, 2, 1, 27, 2, 30] {
        bytes.extend_from_slice(&word.to_be_bytes());
    }
    // 28: bipush 10; ireturn; 31: bipush 20; ireturn; 34: iconst_m1; ireturn
    bytes.extend_from_slice(&[0x10, 10, 0xac, 0x10, 20, 0xac, 0x02, 0xac]);
    static_method(&mut a, "pick", "(I)I", bytes);
    a
}

#[test]
fn test_lookupswitch_cases() {
    let source = compile(&[lookup()]);

    assert!(source.contains("switch (__vars[0]) {"), "{}", source);
    assert_eq!(source.matches("case ").count(), 2, "{}", source);
    assert_eq!(source.matches("default:").count(), 1, "{}", source);
    assert!(source.contains("case 1:"), "{}", source);
    assert!(source.contains("case 2:"), "{}", source);
    for target in [28, 31, 34] {
        assert_eq!(
            source.matches(&format!("function __lbl{}(", target)).count(),
            1,
            "block {} must be emitted exactly once:\n{}",
            target,
            source
        );
    }
}

#[test]
fn test_lookupswitch_runs() {
    if !node_available() {
        eprintln!("skipping: node not found");
        return;
    }
    let output = run_node(
        "lookupswitch",
        &[
            &compile(&[lookup()]),
            "console.log(jvm.p.A.pick(1), jvm.p.A.pick(2), jvm.p.A.pick(5));",
        ],
    );
    assert_eq!(output, "10 20 -1");
}

/// `tableswitch {1: 10, 2: 20, default: -1}` on the first argument.
fn table() -> ClassFile {
    let mut a = class("p/A");
    let mut bytes = vec![0x1a, 0xaa, 0x00, 0x00];
    for word in [29i32, 1, 2, 23, 26] {
        bytes.extend_from_slice(&word.to_be_bytes());
    }
    // 24: bipush 10; ireturn; 27: bipush 20; ireturn; 30: iconst_m1; ireturn
    bytes.extend_from_slice(&[0x10, 10, 0xac, 0x10, 20, 0xac, 0x02, 0xac]);
    static_method(&mut a, "pick", "(I)I", bytes);
    a
}

#[test]
fn test_tableswitch_cases() {
    let source = compile(&[table()]);
    assert!(source.contains("switch (__vars[0]) {"), "{}", source);
    assert!(source.contains("case 1:"), "{}", source);
    assert!(source.contains("case 2:"), "{}", source);
    assert_eq!(source.matches("default:").count(), 1, "{}", source);
    assert!(source.contains("return new __Jump(__lbl30, []);"), "{}", source);
}

#[test]
fn test_tableswitch_runs() {
    if !node_available() {
        eprintln!("skipping: node not found");
        return;
    }
    let output = run_node(
        "tableswitch",
        &[
            &compile(&[table()]),
            "console.log(jvm.p.A.pick(1), jvm.p.A.pick(2), jvm.p.A.pick(5), jvm.p.A.pick(0));",
        ],
    );
    assert_eq!(output, "10 20 -1 -1");
}

// --- Loops ---

/// Sum of 0..n with a backward jump.
fn summing_loop() -> ClassFile {
    let mut a = class("p/A");
    static_method(
        &mut a,
        "sum",
        "(I)I",
        vec![
            0x03, // 0: iconst_0
            0x3c, // 1: istore_1
            0x03, // 2: iconst_0
            0x3d, // 3: istore_2
            0x1c, // 4: iload_2
            0x1a, // 5: iload_0
            0xa2, 0x00, 0x0d, // 6: if_icmpge +13 (-> 19)
            0x1b, // 9: iload_1
            0x1c, // 10: iload_2
            0x60, // 11: iadd
            0x3c, // 12: istore_1
            0x84, 0x02, 0x01, // 13: iinc 2, 1
            0xa7, 0xff, 0xf4, // 16: goto -12 (-> 4)
            0x1b, // 19: iload_1
            0xac, // 20: ireturn
        ],
    );
    a
}

#[test]
fn test_backward_jump_reenters_loop_head() {
    let source = compile(&[summing_loop()]);
    assert!(source.contains("function __lbl4() {"), "{}", source);
    assert!(source.contains("if (__vars[2] >= __vars[0]) {"), "{}", source);
    assert!(source.contains("return new __Jump(__lbl4, []);"), "{}", source);
    assert!(source.contains("__vars[2] = __vars[2] + 1;"), "{}", source);
}

#[test]
fn test_backward_jump_runs() {
    if !node_available() {
        eprintln!("skipping: node not found");
        return;
    }
    let output = run_node(
        "backward_jump",
        &[&compile(&[summing_loop()]), "console.log(jvm.p.A.sum(5), jvm.p.A.sum(0));"],
    );
    assert_eq!(output, "10 0");
}

#[test]
fn test_long_running_loop_keeps_stack_flat() {
    if !node_available() {
        eprintln!("skipping: node not found");
        return;
    }
    let output = run_node(
        "long_running_loop",
        &[&compile(&[summing_loop()]), "console.log(jvm.p.A.sum(50000));"],
    );
    assert_eq!(output, "1249975000");
}

// --- Float compares ---

fn float_compares() -> ClassFile {
    let mut a = class("p/F");
    // fload_0; fload_1; fcmpg; ireturn
    static_method(&mut a, "greater", "(FF)I", vec![0x22, 0x23, 0x96, 0xac]);
    // fload_0; fload_1; fcmpl; ireturn
    static_method(&mut a, "less", "(FF)I", vec![0x22, 0x23, 0x95, 0xac]);
    a
}

#[test]
fn test_nan_biased_compares_run() {
    if !node_available() {
        eprintln!("skipping: node not found");
        return;
    }
    let output = run_node(
        "nan_biased_compares",
        &[
            &compile(&[float_compares()]),
            "const F = jvm.p.F;",
            "console.log(F.greater(NaN, 1), F.less(NaN, 1), F.greater(1, NaN), F.less(1, NaN));",
            "console.log(F.greater(1, 2), F.less(2, 1), F.greater(3, 3), F.less(3, 3));",
        ],
    );
    assert_eq!(output, "1 -1 1 -1\n-1 1 0 0");
}
