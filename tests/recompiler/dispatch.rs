use super::*;

// --- Inheritance ---

/// `Use.run()` builds a `Derived` and calls the inherited `describe()`, which
/// dispatches back to the overriding `speak()`, which calls `super.speak()`.
fn hierarchy() -> Vec<ClassFile> {
    let mut base = class("p/Base");
    default_constructor(&mut base, OBJECT);
    // iconst_1; ireturn
    instance_method(&mut base, "speak", "()I", vec![0x04, 0xac]);
    let [sh, sl] = base.get_or_add_method_ref("p/Base", "speak", "()I").to_be_bytes();
    // aload_0; invokevirtual speak; bipush 10; imul; ireturn
    instance_method(
        &mut base,
        "describe",
        "()I",
        vec![0x2a, 0xb6, sh, sl, 0x10, 10, 0x68, 0xac],
    );

    let mut derived = ClassFile::new(ClassAccessFlags::PUBLIC, "p/Derived", Some("p/Base"));
    default_constructor(&mut derived, "p/Base");
    let [ph, pl] = derived.get_or_add_method_ref("p/Base", "speak", "()I").to_be_bytes();
    // aload_0; invokespecial Base.speak; iconst_1; iadd; ireturn
    instance_method(&mut derived, "speak", "()I", vec![0x2a, 0xb7, ph, pl, 0x04, 0x60, 0xac]);

    let mut user = class("p/Use");
    let [ch, cl] = user.get_or_add_class("p/Derived").to_be_bytes();
    let [ih, il] = user.get_or_add_method_ref("p/Derived", "<init>", "()V").to_be_bytes();
    let [dh, dl] = user.get_or_add_method_ref("p/Base", "describe", "()I").to_be_bytes();
    let [bh, bl] = user.get_or_add_class("p/Base").to_be_bytes();
    // new Derived; dup; invokespecial <init>; invokevirtual describe; ireturn
    static_method(
        &mut user,
        "run",
        "()I",
        vec![0xbb, ch, cl, 0x59, 0xb7, ih, il, 0xb6, dh, dl, 0xac],
    );
    // aload_0; instanceof Base; ireturn
    static_method(&mut user, "check", "(Ljava/lang/Object;)I", vec![0x2a, 0xc1, bh, bl, 0xac]);

    vec![user, derived, base]
}

#[test]
fn test_overrides_and_super_calls() {
    let source = compile(&hierarchy());

    assert!(source.contains("MODULE.p.Derived.prototype.speak = function () {"), "{}", source);
    assert!(
        source.contains("return MODULE.p.Base.prototype.speak.call(__vars[0]) + 1;"),
        "{}",
        source
    );
    assert!(source.contains("return __vars[0].speak() * 10;"), "{}", source);
    assert!(
        source.contains("Object.setPrototypeOf(MODULE.p.Derived.prototype, MODULE.p.Base.prototype);"),
        "{}",
        source
    );
    assert!(
        !source.contains("Object.setPrototypeOf(MODULE.p.Base.prototype"),
        "{}",
        source
    );
}

#[test]
fn test_object_creation() {
    let source = compile(&hierarchy());
    assert!(
        source.contains("const __t0 = Object.setPrototypeOf({}, MODULE.p.Derived.prototype);"),
        "{}",
        source
    );
    assert!(source.contains("MODULE.p.Derived.call(__t0);"), "{}", source);
    assert!(source.contains("return __t0.describe();"), "{}", source);
    assert!(source.contains("MODULE.java.lang.Object.call(__vars[0]);"), "{}", source);
    assert!(
        source.contains("return __vars[0] instanceof MODULE.p.Base ? 1 : 0;"),
        "{}",
        source
    );
}

#[test]
fn test_hierarchy_runs() {
    if !node_available() {
        eprintln!("skipping: node not found");
        return;
    }
    let output = run_node(
        "hierarchy",
        &[
            &compile(&hierarchy()),
            "const made = Object.setPrototypeOf({}, jvm.p.Derived.prototype);",
            "console.log(jvm.p.Use.run(), jvm.p.Use.check(made), jvm.p.Use.check({}), jvm.p.Use.check(null));",
        ],
    );
    assert_eq!(output, "20 1 0 0");
}

// --- Wide values and arrays ---

fn numeric() -> ClassFile {
    let mut a = class("p/Num");
    // lload_0; lload_2; lcmp; ireturn
    static_method(&mut a, "cmp", "(JJ)I", vec![0x1e, 0x20, 0x94, 0xac]);
    // iload_0; newarray int; astore_1; aload_1; iconst_0; bipush 5; iastore; aload_1; arraylength; ireturn
    static_method(
        &mut a,
        "fill",
        "(I)I",
        vec![0x1a, 0xbc, 10, 0x4c, 0x2b, 0x03, 0x10, 5, 0x4f, 0x2b, 0xbe, 0xac],
    );
    a
}

#[test]
fn test_wide_parameters_and_arrays() {
    let source = compile(&[numeric()]);
    assert!(source.contains("MODULE.p.Num.cmp = function (p0, p1) {"), "{}", source);
    assert!(source.contains("const __vars = [p0, undefined, p1, undefined];"), "{}", source);
    assert!(source.contains("return __cmp(__vars[0], __vars[2]);"), "{}", source);
    assert!(source.contains("function __cmp(a, b) {"), "{}", source);
    assert!(source.contains("for (let __i = 0; __i < "), "{}", source);
}

#[test]
fn test_wide_parameters_and_arrays_run() {
    if !node_available() {
        eprintln!("skipping: node not found");
        return;
    }
    let output = run_node(
        "wide_and_arrays",
        &[
            &compile(&[numeric()]),
            "console.log(jvm.p.Num.cmp(1, 2), jvm.p.Num.cmp(5, 5), jvm.p.Num.cmp(9, 2), jvm.p.Num.fill(3));",
        ],
    );
    assert_eq!(output, "-1 0 1 3");
}

// --- Interfaces ---

/// `p/Quiet` inherits the default `greet()` of `p/Greeter`, `p/Loud` overrides it.
fn greeters() -> Vec<ClassFile> {
    let mut greeter = ClassFile::new(
        ClassAccessFlags::PUBLIC | ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT,
        "p/Greeter",
        Some(OBJECT),
    );
    // bipush 7; ireturn
    instance_method(&mut greeter, "greet", "()I", vec![0x10, 7, 0xac]);

    let mut quiet = class("p/Quiet");
    quiet.add_interface("p/Greeter");
    default_constructor(&mut quiet, OBJECT);

    let mut loud = class("p/Loud");
    loud.add_interface("p/Greeter");
    default_constructor(&mut loud, OBJECT);
    // bipush 9; ireturn
    instance_method(&mut loud, "greet", "()I", vec![0x10, 9, 0xac]);

    let mut user = class("p/Call");
    let [gh, gl] = user
        .get_or_add_interface_method_ref("p/Greeter", "greet", "()I")
        .to_be_bytes();
    // aload_0; invokeinterface Greeter.greet 1; ireturn
    static_method(
        &mut user,
        "greet",
        "(Lp/Greeter;)I",
        vec![0x2a, 0xb9, gh, gl, 0x01, 0x00, 0xac],
    );

    vec![user, quiet, loud, greeter]
}

#[test]
fn test_default_methods_are_copied_to_implementors() {
    let source = compile(&greeters());
    assert!(source.contains("return __vars[0].greet();"), "{}", source);
    assert!(
        source.contains("MODULE.p.Greeter.prototype.greet = function () {"),
        "{}",
        source
    );
    assert!(
        source.contains(
            "if (!(\"greet\" in MODULE.p.Quiet.prototype)) {\n    \
             MODULE.p.Quiet.prototype.greet = MODULE.p.Greeter.prototype.greet;\n  }"
        ),
        "{}",
        source
    );
    assert!(
        !source.contains("if (!(\"greet\" in MODULE.p.Greeter.prototype))"),
        "{}",
        source
    );
}

#[test]
fn test_default_methods_run() {
    if !node_available() {
        eprintln!("skipping: node not found");
        return;
    }
    let output = run_node(
        "default_methods",
        &[
            &compile(&greeters()),
            "console.log(jvm.p.Call.greet(new jvm.p.Quiet()), jvm.p.Call.greet(new jvm.p.Loud()));",
        ],
    );
    assert_eq!(output, "7 9");
}

// --- Type checks ---

fn casts() -> Vec<ClassFile> {
    let mut user = class("p/Cast");
    let [ah, al] = user.get_or_add_class("p/A").to_be_bytes();
    let [sh, sl] = user.get_or_add_class("java/lang/String").to_be_bytes();
    let [eh, el] = user.get_or_add_class("q/Ext").to_be_bytes();
    // aload_0; checkcast A; areturn
    static_method(&mut user, "asA", "(Ljava/lang/Object;)Lp/A;", vec![0x2a, 0xc0, ah, al, 0xb0]);
    // aload_0; instanceof String; ireturn
    static_method(&mut user, "isString", "(Ljava/lang/Object;)I", vec![0x2a, 0xc1, sh, sl, 0xac]);
    // aload_0; instanceof q/Ext; ireturn
    static_method(&mut user, "isExt", "(Ljava/lang/Object;)I", vec![0x2a, 0xc1, eh, el, 0xac]);
    vec![user, class("p/A"), class("p/B")]
}

#[test]
fn test_checked_casts() {
    let source = compile(&casts());
    assert!(
        source.contains("return __checkcast(__vars[0], MODULE.p.A, \"p.A\");"),
        "{}",
        source
    );
    assert!(source.contains("function __checkcast(value, type, name) {"), "{}", source);
    assert!(
        source.contains("return __instanceof(__vars[0], __lookupclass(\"java/lang/String\")) ? 1 : 0;"),
        "{}",
        source
    );
}

#[test]
fn test_checked_casts_run() {
    if !node_available() {
        eprintln!("skipping: node not found");
        return;
    }
    let output = run_node(
        "checked_casts",
        &[
            "globalThis.jvm = { q: { Ext: class {} } };",
            &compile(&casts()),
            "const C = jvm.p.Cast;",
            "const a = new jvm.p.A();",
            "console.log(C.asA(a) === a, C.asA(null));",
            "try { C.asA(new jvm.p.B()); } catch (e) { console.log(e.message); }",
            "console.log(C.isString({}), C.isString(42), C.isString([1]), C.isString(null));",
            "console.log(C.isExt(new jvm.q.Ext()), C.isExt({}));",
        ],
    );
    assert_eq!(output, "true null\nClassCastException: p.A\n0 0 0 0\n1 0");
}
