use super::*;

/// Pool constants of every loadable kind, each returned by its own method.
fn constants() -> ClassFile {
    let mut k = class("p/K");
    let float = k.get_or_add_float(2.5);
    let class_index = k.get_or_add_class("p/K");
    assert!(float <= u8::MAX as u16 && class_index <= u8::MAX as u16);
    let [lh, ll] = k.get_or_add_long(1 << 40).to_be_bytes();
    let [nh, nl] = k.get_or_add_long(-1).to_be_bytes();
    let [dh, dl] = k.get_or_add_double(0.25).to_be_bytes();

    // ldc; freturn
    static_method(&mut k, "half", "()F", vec![0x12, float as u8, 0xae]);
    // ldc2_w; lreturn
    static_method(&mut k, "big", "()J", vec![0x14, lh, ll, 0xad]);
    static_method(&mut k, "minusOne", "()J", vec![0x14, nh, nl, 0xad]);
    // ldc2_w; dreturn
    static_method(&mut k, "quarter", "()D", vec![0x14, dh, dl, 0xaf]);
    // ldc; areturn
    static_method(&mut k, "self", "()Ljava/lang/Class;", vec![0x12, class_index as u8, 0xb0]);
    k
}

#[test]
fn test_pool_constants_become_literals() {
    let source = compile(&[constants()]);
    assert!(source.contains("MODULE.p.K.half = function () {"), "{}", source);
    assert!(source.contains("return 2.5;"), "{}", source);
    assert!(source.contains("return 1099511627776;"), "{}", source);
    assert!(source.contains("return -1;"), "{}", source);
    assert!(source.contains("return 0.25;"), "{}", source);
    assert!(source.contains("return __getclass(\"p.K\");"), "{}", source);
    assert!(source.contains("function __getclass(name) {"), "{}", source);
}

#[test]
fn test_pool_constants_run() {
    if !node_available() {
        eprintln!("skipping: node not found");
        return;
    }
    let output = run_node(
        "pool_constants",
        &[
            &compile(&[constants()]),
            "const K = jvm.p.K;",
            "console.log(K.half(), K.big(), K.minusOne(), K.quarter());",
            "console.log(K.self() === K.self(), K.self().name);",
        ],
    );
    assert_eq!(output, "2.5 1099511627776 -1 0.25\ntrue p.K");
}
