use super::*;

use classfile_recompiler::field_info::FieldAccessFlags;

fn position(source: &str, needle: &str) -> usize {
    source
        .find(needle)
        .unwrap_or_else(|| panic!("'{}' not found in:\n{}", needle, source))
}

// --- Evaluation order ---

/// `next()` bumps a static counter; `twice()` is `next()` duplicated and added.
fn counter() -> ClassFile {
    let mut a = class("p/A");
    a.add_field(FieldAccessFlags::STATIC, "count", "I", None);
    let [fh, fl] = a.get_or_add_field_ref("p/A", "count", "I").to_be_bytes();
    let [mh, ml] = a.get_or_add_method_ref("p/A", "next", "()I").to_be_bytes();
    // getstatic count; iconst_1; iadd; putstatic count; getstatic count; ireturn
    static_method(
        &mut a,
        "next",
        "()I",
        vec![0xb2, fh, fl, 0x04, 0x60, 0xb3, fh, fl, 0xb2, fh, fl, 0xac],
    );
    // invokestatic next; dup; iadd; ireturn
    static_method(&mut a, "twice", "()I", vec![0xb8, mh, ml, 0x59, 0x60, 0xac]);
    a
}

#[test]
fn test_duplicated_call_is_evaluated_once() {
    let source = compile(&[counter()]);
    assert_eq!(source.matches("MODULE.p.A.next()").count(), 1, "{}", source);
    assert!(source.contains("const __t0 = MODULE.p.A.next();"), "{}", source);
    assert!(source.contains("return __t0 + __t0;"), "{}", source);
    assert!(source.contains("MODULE.p.A.count = 0;"), "{}", source);
    assert!(source.contains("MODULE.p.A.count = MODULE.p.A.count + 1;"), "{}", source);
}

#[test]
fn test_duplicated_call_runs_once() {
    if !node_available() {
        eprintln!("skipping: node not found");
        return;
    }
    let output = run_node(
        "duplicated_call",
        &[&compile(&[counter()]), "console.log(jvm.p.A.twice(), jvm.p.A.count);"],
    );
    assert_eq!(output, "2 1");
}

// --- Stubs ---

fn natives() -> ClassFile {
    let mut n = class("p/N");
    let flags = MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC | MethodAccessFlags::NATIVE;
    n.add_method(flags, "twice", "(I)I", None);
    n.add_method(flags, "missing", "()V", None);
    n
}

#[test]
fn test_native_methods_consult_the_registry() {
    let source = compile(&[natives()]);
    assert!(source.contains("GLOBAL.implementation(\"p/N.twice(I)I\")"), "{}", source);
    assert!(
        source.contains("throw new Error(\"Native method 'p/N.missing()V' is not implemented\");"),
        "{}",
        source
    );
    assert!(source.contains("MODULE.p.N.twice = function (p0) {"), "{}", source);
}

#[test]
fn test_native_methods_run() {
    if !node_available() {
        eprintln!("skipping: node not found");
        return;
    }
    let output = run_node(
        "native_methods",
        &[
            &compile(&[natives()]),
            r#"globalThis.implementation = (key) => key === "p/N.twice(I)I" ? (x) => x * 2 : undefined;"#,
            "console.log(jvm.p.N.twice(21));",
            "try { jvm.p.N.missing(); } catch (e) { console.log(e.message); }",
        ],
    );
    assert_eq!(output, "42\nNative method 'p/N.missing()V' is not implemented");
}

#[test]
fn test_abstract_methods_and_interfaces() {
    let mut shape = ClassFile::new(
        ClassAccessFlags::PUBLIC | ClassAccessFlags::ABSTRACT,
        "p/Shape",
        Some(OBJECT),
    );
    shape.add_method(MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT, "area", "()I", None);
    let iface = ClassFile::new(
        ClassAccessFlags::PUBLIC | ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT,
        "p/Named",
        Some(OBJECT),
    );
    shape.add_interface("p/Named");

    let source = compile(&[shape, iface]);
    assert!(
        source.contains("MODULE.p.Shape.prototype.area = function () {\n"),
        "{}",
        source
    );
    assert!(source.contains("throw new Error(\"Abstract method called\");"), "{}", source);
    assert!(
        source.contains("MODULE.p.Named = Object.assign(function () {}, MODULE.p.Named || {});"),
        "{}",
        source
    );
    assert!(source.contains("MODULE.p.Shape.$interfaces = [\"p/Named\"];"), "{}", source);
}

// --- Layout ---

#[test]
fn test_namespace_tree_precedes_classes() {
    let source = compile(&[class("a/b/C"), class("a/D")]);
    let root = position(&source, "MODULE.a = MODULE.a || {};");
    let nested = position(&source, "MODULE.a.b = MODULE.a.b || {};");
    let object = position(
        &source,
        "MODULE.java.lang.Object = MODULE.java.lang.Object || function () {};",
    );
    let first_class = position(&source, "MODULE.a.b.C = Object.assign(");
    assert!(root < nested && nested < first_class && object < first_class, "{}", source);
    assert!(source.contains("MODULE.java.lang = MODULE.java.lang || {};"), "{}", source);
    assert!(
        !source.contains("Object.setPrototypeOf(MODULE.a.D.prototype"),
        "undiscovered parents are not linked:\n{}",
        source
    );
}

/// `<clinit>` stores 7 in `value`; `main` hands it to a native `report`.
fn program() -> ClassFile {
    let mut main = class("p/Main");
    main.add_field(FieldAccessFlags::STATIC, "value", "I", None);
    let [fh, fl] = main.get_or_add_field_ref("p/Main", "value", "I").to_be_bytes();
    let [rh, rl] = main.get_or_add_method_ref("p/Main", "report", "(I)V").to_be_bytes();
    main.add_method(
        MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC | MethodAccessFlags::NATIVE,
        "report",
        "(I)V",
        None,
    );
    // getstatic value; invokestatic report; return
    static_method(
        &mut main,
        "main",
        "([Ljava/lang/String;)V",
        vec![0xb2, fh, fl, 0xb8, rh, rl, 0xb1],
    );
    // bipush 7; putstatic value; return
    main.add_method(
        MethodAccessFlags::STATIC,
        "<clinit>",
        "()V",
        code(vec![0x10, 7, 0xb3, fh, fl, 0xb1]),
    );
    main
}

#[test]
fn test_static_init_then_main() {
    let options = RecompileOptions {
        main_class: Some("p.Main".into()),
        ..Default::default()
    };
    let source = recompile(&[program()], &options).unwrap();

    let definition = position(&source, "MODULE.p.Main[\"<clinit>\"] = function () {");
    let init = position(&source, "MODULE.p.Main[\"<clinit>\"]();");
    let entry = position(&source, "MODULE.p.Main.main([]);");
    assert!(definition < init && init < entry, "{}", source);
}

#[test]
fn test_missing_main_is_skipped() {
    let options = RecompileOptions {
        main_class: Some("p/Missing".into()),
        ..Default::default()
    };
    let source = recompile(&[program()], &options).unwrap();
    assert!(!source.contains(".main(["), "{}", source);
    assert!(source.contains("MODULE.p.Main[\"<clinit>\"]();"), "{}", source);
}

#[test]
fn test_static_init_then_main_runs() {
    if !node_available() {
        eprintln!("skipping: node not found");
        return;
    }
    let options = RecompileOptions {
        main_class: Some("p/Main".into()),
        ..Default::default()
    };
    let output = run_node(
        "static_init_then_main",
        &[
            r#"globalThis.implementation = (key) => key === "p/Main.report(I)V" ? (v) => console.log("value", v) : undefined;"#,
            &recompile(&[program()], &options).unwrap(),
        ],
    );
    assert_eq!(output, "value 7");
}
