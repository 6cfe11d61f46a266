//! Module assembly: every input class becomes a constructor function hung off
//! the shared `MODULE` namespace object, and the whole program is wrapped in a
//! single immediately-invoked function.

use std::collections::{BTreeSet, HashSet};

use log::{debug, info, warn};

use crate::field_info::FieldInfo;
use crate::js::printer::{print_program, RenderConfig};
use crate::js::{BinOp, JsExpr, JsStmt, UnaryOp};
use crate::method_info::MethodInfo;
use crate::types::ClassFile;

use super::assemble::{assemble_method, param_name};
use super::descriptor::{parse_field_descriptor, parse_method_descriptor};
use super::runtime::{helper_statements, Helper};
use super::stack_sim::{constant_literal, MethodContext, MethodState};
use super::symbols::{
    class_expr, ClassSymbols, SymbolTable, MODULE_ROOT, OBJECT_CLASS, PRIMARY_CONSTRUCTOR, STATIC_INITIALIZER,
};
use super::{RecompileError, RecompileResult};

/// Descriptor of the entry point invoked for [`RecompileOptions::main_class`].
pub const MAIN_DESCRIPTOR: &str = "([Ljava/lang/String;)V";

/// Name of the second wrapper parameter, bound to `globalThis`.
pub const GLOBAL_ROOT: &str = "GLOBAL";

/// Property of `GLOBAL` consulted for native method implementations.
pub const NATIVE_REGISTRY: &str = "implementation";

/// Options controlling module assembly.
#[derive(Clone, Debug)]
pub struct RecompileOptions {
    /// Class whose `main(String[])` runs after static initialization.
    /// Either `a/b/Main` or `a.b.Main`.
    pub main_class: Option<String>,
    /// Property of `globalThis` that receives the namespace object.
    pub export_name: String,
    pub render: RenderConfig,
}

impl Default for RecompileOptions {
    fn default() -> Self {
        Self {
            main_class: None,
            export_name: "jvm".into(),
            render: RenderConfig::default(),
        }
    }
}

/// Recompiles one set of classes into one JavaScript module.
pub struct Recompiler<'a> {
    classes: &'a [ClassFile],
    options: RecompileOptions,
    symbols: SymbolTable,
    helpers: BTreeSet<Helper>,
}

impl<'a> Recompiler<'a> {
    /// Run discovery over `classes`.
    pub fn new(classes: &'a [ClassFile], options: RecompileOptions) -> RecompileResult<Self> {
        let symbols = SymbolTable::discover(classes)?;
        Ok(Self {
            classes,
            options,
            symbols,
            helpers: BTreeSet::new(),
        })
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Runtime helpers requested by the methods recompiled so far.
    pub fn helpers(&self) -> &BTreeSet<Helper> {
        &self.helpers
    }

    /// Recompile one method into a function expression.
    ///
    /// Native methods become a lookup in `GLOBAL.implementation`, abstract
    /// methods a function that throws. Failures are wrapped with the class
    /// and method signature.
    pub fn recompile_method(&mut self, class: &ClassFile, method: &MethodInfo) -> RecompileResult<JsExpr> {
        let class_name = class.class_name().ok_or(RecompileError::BadConstant {
            index: class.this_class,
        })?;
        let name = class.method_name(method).ok_or(RecompileError::BadConstant {
            index: method.name_index,
        })?;
        let desc = class.method_descriptor(method).ok_or(RecompileError::BadConstant {
            index: method.descriptor_index,
        })?;
        debug!("recompiling {}.{}{}", class_name, name, desc);
        self.method_function(class, class_name, method, name, desc)
            .map_err(|err| err.in_method(class_name, name, desc))
    }

    fn method_function(
        &mut self,
        class: &ClassFile,
        class_name: &str,
        method: &MethodInfo,
        name: &str,
        desc: &str,
    ) -> RecompileResult<JsExpr> {
        let descriptor = parse_method_descriptor(desc)?;
        let params: Vec<String> = (0..descriptor.params.len()).map(param_name).collect();

        if method.is_native() {
            return Ok(native_stub(&format!("{}.{}{}", class_name, name, desc), params));
        }
        let code = match &method.code {
            Some(code) if !method.is_abstract() => code,
            _ => return Ok(abstract_stub(params)),
        };

        let ctx = MethodContext {
            class,
            class_name,
            method_name: name,
            symbols: &self.symbols,
            code: &code.code,
        };
        let mut state = MethodState::default();
        let function = assemble_method(&ctx, &mut state, code, &descriptor, method.is_static())?;
        self.helpers.extend(state.helpers);
        Ok(function)
    }

    /// Statements defining one class: constructor, aliases, fields, methods.
    fn class_statements(&mut self, class: &ClassFile, symbols: &ClassSymbols) -> RecompileResult<Vec<JsStmt>> {
        info!("recompiling class {}", symbols.name);
        let path = class_expr(&symbols.name);
        let prototype = path.clone().member("prototype");
        let mut stmts = Vec::new();

        let mut methods = Vec::with_capacity(class.methods.len());
        for method in &class.methods {
            let name = class.method_name(method).ok_or(RecompileError::BadConstant {
                index: method.name_index,
            })?;
            let desc = class.method_descriptor(method).ok_or(RecompileError::BadConstant {
                index: method.descriptor_index,
            })?;
            let assigned = symbols.members.get(name, desc).unwrap_or(name).to_string();
            methods.push((method, name, assigned));
        }

        // ---- Constructors ----

        let primary = methods
            .iter()
            .find(|(_, _, assigned)| assigned.as_str() == PRIMARY_CONSTRUCTOR)
            .map(|(method, _, _)| *method);
        let constructor = match primary {
            Some(method) => self.recompile_method(class, method)?,
            None => JsExpr::Function {
                params: Vec::new(),
                body: Vec::new(),
            },
        };
        // keep nested classes registered on the namespace object
        stmts.push(JsStmt::assign(
            path.clone(),
            JsExpr::ident("Object").member("assign").call(vec![
                constructor,
                JsExpr::binary(BinOp::Or, path.clone(), JsExpr::Object(Vec::new())),
            ]),
        ));
        for (method, name, assigned) in &methods {
            if *name == PRIMARY_CONSTRUCTOR && assigned.as_str() != PRIMARY_CONSTRUCTOR {
                let function = self.recompile_method(class, method)?;
                stmts.push(JsStmt::assign(path.clone().member(assigned.as_str()), function));
            }
        }

        // ---- Fields ----

        for field in &class.fields {
            let (assigned, value) = self.field_initializer(class, symbols, field)?;
            let target = if field.is_static() { &path } else { &prototype };
            stmts.push(JsStmt::assign(target.clone().member(assigned), value));
        }

        let interfaces = self.symbols.interfaces_of(&symbols.name);
        if !interfaces.is_empty() {
            stmts.push(JsStmt::assign(
                path.clone().member("$interfaces"),
                JsExpr::Array(interfaces.into_iter().map(JsExpr::string).collect()),
            ));
        }

        // ---- Methods ----

        for (method, name, assigned) in &methods {
            if *name == PRIMARY_CONSTRUCTOR {
                continue;
            }
            if method.is_static() || *name == STATIC_INITIALIZER {
                let function = self.recompile_method(class, method)?;
                stmts.push(JsStmt::assign(path.clone().member(assigned.as_str()), function));
            }
        }
        for (method, name, assigned) in &methods {
            if *name == PRIMARY_CONSTRUCTOR || *name == STATIC_INITIALIZER || method.is_static() {
                continue;
            }
            let function = self.recompile_method(class, method)?;
            stmts.push(JsStmt::assign(prototype.clone().member(assigned.as_str()), function));
        }

        Ok(stmts)
    }

    fn field_initializer(
        &self,
        class: &ClassFile,
        symbols: &ClassSymbols,
        field: &FieldInfo,
    ) -> RecompileResult<(String, JsExpr)> {
        let name = class.field_name(field).ok_or(RecompileError::BadConstant {
            index: field.name_index,
        })?;
        let desc = class.field_descriptor(field).ok_or(RecompileError::BadConstant {
            index: field.descriptor_index,
        })?;
        let assigned = symbols.members.get(name, desc).unwrap_or(name).to_string();
        let ty = parse_field_descriptor(desc)?;

        let value = match field.constant_value_index {
            Some(index) if field.is_static() => constant_literal(&class.const_pool, index)
                .map(|value| value.expr)
                .ok_or(RecompileError::BadConstant { index })?,
            _ => ty.default_value(),
        };
        Ok((assigned, value))
    }

    fn class_file(&self, name: &str) -> Option<&'a ClassFile> {
        self.classes.iter().find(|class| class.class_name() == Some(name))
    }

    /// Assigned names of the default methods of a discovered interface.
    fn default_methods(&self, interface: &str) -> RecompileResult<Vec<String>> {
        let (class, symbols) = match (self.class_file(interface), self.symbols.class(interface)) {
            (Some(class), Some(symbols)) if symbols.is_interface => (class, symbols),
            _ => return Ok(Vec::new()),
        };
        let mut names = Vec::new();
        for method in &class.methods {
            if method.is_static() || method.is_abstract() || method.is_private() || method.code.is_none() {
                continue;
            }
            let name = class.method_name(method).ok_or(RecompileError::BadConstant {
                index: method.name_index,
            })?;
            let desc = class.method_descriptor(method).ok_or(RecompileError::BadConstant {
                index: method.descriptor_index,
            })?;
            if name == PRIMARY_CONSTRUCTOR || name == STATIC_INITIALIZER {
                continue;
            }
            if let Some(assigned) = symbols.members.get(name, desc) {
                names.push(assigned.to_string());
            }
        }
        Ok(names)
    }

    /// The program body: namespaces, helpers, classes, then start-up code.
    pub fn module_body(&mut self) -> RecompileResult<Vec<JsStmt>> {
        let mut class_stmts = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for class in self.classes {
            let name = class.class_name().ok_or(RecompileError::BadConstant {
                index: class.this_class,
            })?;
            if !seen.insert(name) {
                continue;
            }
            let symbols = match self.symbols.class(name) {
                Some(symbols) => symbols.clone(),
                None => continue,
            };
            class_stmts.extend(self.class_statements(class, &symbols)?);
        }

        let mut body = Vec::new();
        for container in self.symbols.namespace().containers() {
            let path = class_expr(&container);
            body.push(JsStmt::assign(
                path.clone(),
                JsExpr::binary(BinOp::Or, path, JsExpr::Object(Vec::new())),
            ));
        }
        if !self.symbols.is_discovered(OBJECT_CLASS) {
            let path = class_expr(OBJECT_CLASS);
            body.push(JsStmt::assign(
                path.clone(),
                JsExpr::binary(
                    BinOp::Or,
                    path,
                    JsExpr::Function {
                        params: Vec::new(),
                        body: Vec::new(),
                    },
                ),
            ));
        }
        body.extend(helper_statements(&self.helpers));
        body.extend(class_stmts);

        // ---- Start-up ----

        for symbols in self.symbols.classes() {
            let parent = match &symbols.super_class {
                Some(parent) if self.symbols.is_discovered(parent) => parent,
                _ => continue,
            };
            body.push(JsStmt::Expr(JsExpr::ident("Object").member("setPrototypeOf").call(vec![
                class_expr(&symbols.name).member("prototype"),
                class_expr(parent).member("prototype"),
            ])));
        }
        for symbols in self.symbols.classes() {
            if symbols.is_interface {
                continue;
            }
            let prototype = class_expr(&symbols.name).member("prototype");
            for interface in self.symbols.interfaces_of(&symbols.name) {
                for assigned in self.default_methods(&interface)? {
                    let inherited = class_expr(&interface).member("prototype").member(assigned.as_str());
                    let defined = JsExpr::binary(BinOp::In, JsExpr::string(assigned.as_str()), prototype.clone());
                    body.push(JsStmt::If {
                        cond: JsExpr::unary(UnaryOp::Not, defined),
                        then_body: vec![JsStmt::assign(prototype.clone().member(assigned), inherited)],
                        else_body: Vec::new(),
                    });
                }
            }
        }
        for symbols in self.symbols.classes() {
            if symbols.has_static_init {
                body.push(JsStmt::Expr(
                    class_expr(&symbols.name).member(STATIC_INITIALIZER).call(Vec::new()),
                ));
            }
        }
        if let Some(main_class) = &self.options.main_class {
            let main_class = main_class.replace('.', "/");
            let entry = self
                .symbols
                .class(&main_class)
                .and_then(|symbols| symbols.members.get("main", MAIN_DESCRIPTOR));
            match entry {
                Some(assigned) => body.push(JsStmt::Expr(
                    class_expr(&main_class)
                        .member(assigned)
                        .call(vec![JsExpr::Array(Vec::new())]),
                )),
                None => warn!("main class {} has no main{}, skipping", main_class, MAIN_DESCRIPTOR),
            }
        }
        Ok(body)
    }

    /// The complete module as a list of top-level statements.
    pub fn module(&mut self) -> RecompileResult<Vec<JsStmt>> {
        let body = self.module_body()?;
        let export = JsExpr::ident("globalThis").member(self.options.export_name.as_str());
        let wrapper = JsExpr::Function {
            params: vec![MODULE_ROOT.to_string(), GLOBAL_ROOT.to_string()],
            body,
        };
        Ok(vec![JsStmt::Expr(wrapper.call(vec![
            JsExpr::assign(
                export.clone(),
                JsExpr::binary(BinOp::Or, export, JsExpr::Object(Vec::new())),
            ),
            JsExpr::ident("globalThis"),
        ]))])
    }

    /// Render the complete module to source text.
    pub fn render(&mut self) -> RecompileResult<String> {
        let program = self.module()?;
        Ok(print_program(&program, self.options.render.clone()))
    }
}

/// Recompile `classes` into one self-contained JavaScript module.
pub fn recompile(classes: &[ClassFile], options: &RecompileOptions) -> RecompileResult<String> {
    Recompiler::new(classes, options.clone())?.render()
}

/// Delegates to `GLOBAL.implementation(key)`, throwing when nothing is registered.
fn native_stub(key: &str, params: Vec<String>) -> JsExpr {
    let registry = JsExpr::ident(GLOBAL_ROOT).member(NATIVE_REGISTRY);
    let lookup = JsExpr::conditional(
        JsExpr::binary(
            BinOp::StrictEq,
            JsExpr::unary(UnaryOp::TypeOf, registry.clone()),
            JsExpr::string("function"),
        ),
        registry.call(vec![JsExpr::string(key)]),
        JsExpr::Undefined,
    );
    let implementation = JsExpr::ident("__impl");
    JsExpr::Function {
        params,
        body: vec![
            JsStmt::Const {
                name: "__impl".into(),
                init: lookup,
            },
            JsStmt::If {
                cond: JsExpr::binary(BinOp::LooseEq, implementation.clone(), JsExpr::Null),
                then_body: vec![JsStmt::throw_error(JsExpr::string(format!(
                    "Native method '{}' is not implemented",
                    key
                )))],
                else_body: Vec::new(),
            },
            JsStmt::Return(Some(
                implementation
                    .member("apply")
                    .call(vec![JsExpr::This, JsExpr::ident("arguments")]),
            )),
        ],
    }
}

fn abstract_stub(params: Vec<String>) -> JsExpr {
    JsExpr::Function {
        params,
        body: vec![JsStmt::throw_error(JsExpr::string("Abstract method called"))],
    }
}
