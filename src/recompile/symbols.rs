//! Discovery pass: class registration and member name assignment.
//!
//! Every input class is registered before any method body is looked at, so
//! that a call site may name a class that appears later in the input. The
//! resulting [`SymbolTable`] is read-only for the rest of the run.

use std::collections::{HashMap, HashSet};

use base64::Engine;
use log::warn;

use crate::js::JsExpr;
use crate::types::ClassFile;

use super::{RecompileError, RecompileResult};

pub const OBJECT_CLASS: &str = "java/lang/Object";

/// Assigned name of a class's first declared constructor.
pub const PRIMARY_CONSTRUCTOR: &str = "<init>";

pub const STATIC_INITIALIZER: &str = "<clinit>";

/// Property names that already mean something on a JS function or object.
const RESERVED_NAMES: &[&str] = &[
    "prototype",
    "constructor",
    "length",
    "name",
    "call",
    "apply",
    "bind",
    "arguments",
    "caller",
    "__proto__",
    "$interfaces",
];

/// Characters of the base64 descriptor digest appended to mangled names.
const FINGERPRINT_LEN: usize = 5;

/// Root of the generated module: `MODULE`.
pub const MODULE_ROOT: &str = "MODULE";

/// `MODULE.a.b.C` for the class `a/b/C`.
pub fn class_expr(name: &str) -> JsExpr {
    name.split('/')
        .fold(JsExpr::ident(MODULE_ROOT), |expr, segment| expr.member(segment))
}

/// `a.b.C` for the class `a/b/C`.
pub fn dotted_name(name: &str) -> String {
    name.replace('/', ".")
}

/// Short descriptor digest: the first characters of its base64 encoding.
pub fn fingerprint(descriptor: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(descriptor.as_bytes());
    encoded
        .chars()
        .take(FINGERPRINT_LEN)
        .map(|c| if c == '=' { '_' } else { c })
        .collect()
}

// ---------------------------------------------------------------------------
// Namespace tree
// ---------------------------------------------------------------------------

/// One level of the package tree. Children keep first-seen order.
#[derive(Clone, Debug, Default)]
pub struct Namespace {
    children: Vec<(String, Namespace)>,
}

impl Namespace {
    pub fn register(&mut self, qualified_name: &str) {
        let mut node = self;
        for segment in qualified_name.split('/') {
            let pos = match node.children.iter().position(|(name, _)| name == segment) {
                Some(pos) => pos,
                None => {
                    node.children.push((segment.to_string(), Namespace::default()));
                    node.children.len() - 1
                }
            };
            node = &mut node.children[pos].1;
        }
    }

    /// Slash-separated paths of every node that has children, parents first.
    pub fn containers(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_containers("", &mut out);
        out
    }

    fn collect_containers(&self, prefix: &str, out: &mut Vec<String>) {
        for (name, child) in &self.children {
            if child.children.is_empty() {
                continue;
            }
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", prefix, name)
            };
            out.push(path.clone());
            child.collect_containers(&path, out);
        }
    }
}

// ---------------------------------------------------------------------------
// Member tables
// ---------------------------------------------------------------------------

/// `(raw name, descriptor)` to assigned name, for methods and fields alike.
#[derive(Clone, Debug, Default)]
pub struct MemberTable {
    names: HashMap<(String, String), String>,
    order: Vec<(String, String)>,
}

impl MemberTable {
    pub fn get(&self, name: &str, descriptor: &str) -> Option<&str> {
        self.names
            .get(&(name.to_string(), descriptor.to_string()))
            .map(String::as_str)
    }

    fn insert(&mut self, name: &str, descriptor: &str, assigned: String) {
        let key = (name.to_string(), descriptor.to_string());
        if self.names.insert(key.clone(), assigned).is_none() {
            self.order.push(key);
        }
    }

    /// `(name, descriptor, assigned)` in assignment order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.order.iter().filter_map(move |key| {
            self.names
                .get(key)
                .map(|assigned| (key.0.as_str(), key.1.as_str(), assigned.as_str()))
        })
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct ClassSymbols {
    pub name: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub is_interface: bool,
    pub members: MemberTable,
    /// Constructor descriptors in declaration order.
    pub constructors: Vec<String>,
    pub has_static_init: bool,
    /// Non-private member keys, the ones a subclass can override.
    overridable: HashSet<(String, String)>,
}

/// Where a member reference lands after walking the class hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedMember<'a> {
    /// The discovered class that declares the member.
    pub owner: &'a str,
    pub name: &'a str,
}

// ---------------------------------------------------------------------------
// Symbol table
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    namespace: Namespace,
    classes: HashMap<String, ClassSymbols>,
    order: Vec<String>,
}

impl SymbolTable {
    /// Register every class and compute its member names.
    pub fn discover(inputs: &[ClassFile]) -> RecompileResult<Self> {
        let mut table = SymbolTable::default();
        table.namespace.register(OBJECT_CLASS);

        let mut files: HashMap<String, &ClassFile> = HashMap::new();
        for class in inputs {
            let name = class.class_name().ok_or(RecompileError::BadConstant {
                index: class.this_class,
            })?;
            if files.contains_key(name) {
                warn!("class {} appears more than once, keeping the first", name);
                continue;
            }
            table.namespace.register(name);
            table.order.push(name.to_string());
            files.insert(name.to_string(), class);
        }

        let order = table.order.clone();
        let mut visiting = Vec::new();
        for name in &order {
            table.build_class(name, &files, &mut visiting)?;
        }
        Ok(table)
    }

    fn build_class(
        &mut self,
        name: &str,
        files: &HashMap<String, &ClassFile>,
        visiting: &mut Vec<String>,
    ) -> RecompileResult<()> {
        if self.classes.contains_key(name) {
            return Ok(());
        }
        let class = match files.get(name) {
            Some(class) => *class,
            None => return Ok(()),
        };
        if visiting.iter().any(|v| v == name) {
            warn!("class hierarchy cycle through {}", name);
            return Ok(());
        }

        let super_class = class.super_class_name().map(str::to_string);
        let interfaces: Vec<String> = class
            .interface_names()
            .into_iter()
            .map(str::to_string)
            .collect();

        visiting.push(name.to_string());
        for parent in super_class.iter().chain(interfaces.iter()) {
            self.build_class(parent, files, visiting)?;
        }
        visiting.pop();

        let symbols = self.assign_names(class, name, super_class, interfaces)?;
        self.classes.insert(name.to_string(), symbols);
        Ok(())
    }

    fn assign_names(
        &self,
        class: &ClassFile,
        name: &str,
        super_class: Option<String>,
        interfaces: Vec<String>,
    ) -> RecompileResult<ClassSymbols> {
        // Every name visible through the parents is off limits unless it is
        // being overridden.
        let mut claimed: HashSet<String> = RESERVED_NAMES.iter().map(|s| s.to_string()).collect();
        let mut inherited: HashMap<(String, String), String> = HashMap::new();
        for parent in super_class.iter().chain(interfaces.iter()) {
            for ancestor in self.ancestry(parent) {
                for (raw, desc, assigned) in ancestor.members.entries() {
                    claimed.insert(assigned.to_string());
                    let key = (raw.to_string(), desc.to_string());
                    if ancestor.overridable.contains(&key) {
                        inherited.entry(key).or_insert_with(|| assigned.to_string());
                    }
                }
            }
        }

        let mut members = MemberTable::default();
        let mut local: HashSet<String> = HashSet::new();
        let mut overridable = HashSet::new();
        let mut constructors = Vec::new();
        let mut has_static_init = false;

        let mut methods = Vec::new();
        for method in &class.methods {
            let raw = class
                .method_name(method)
                .ok_or(RecompileError::BadConstant { index: method.name_index })?;
            let desc = class
                .method_descriptor(method)
                .ok_or(RecompileError::BadConstant { index: method.descriptor_index })?;
            methods.push((raw, desc, method.is_private()));
        }

        for &(_, desc, _) in methods.iter().filter(|(raw, _, _)| *raw == PRIMARY_CONSTRUCTOR) {
            let assigned = if constructors.is_empty() {
                PRIMARY_CONSTRUCTOR.to_string()
            } else {
                format!("constructor_{}", constructors.len())
            };
            local.insert(assigned.clone());
            members.insert(PRIMARY_CONSTRUCTOR, desc, assigned);
            constructors.push(desc.to_string());
        }

        for &(raw, desc, is_private) in methods.iter().filter(|(raw, _, _)| *raw != PRIMARY_CONSTRUCTOR) {
            let key = (raw.to_string(), desc.to_string());
            let assigned = if raw == STATIC_INITIALIZER {
                has_static_init = true;
                raw.to_string()
            } else {
                match inherited.get(&key) {
                    Some(name) if !is_private && !local.contains(name) => name.clone(),
                    _ if !is_private && !claimed.contains(raw) && !local.contains(raw) => raw.to_string(),
                    _ => mangle(raw, desc, &claimed, &local),
                }
            };
            if !is_private {
                overridable.insert(key);
            }
            local.insert(assigned.clone());
            members.insert(raw, desc, assigned);
        }

        for field in &class.fields {
            let raw = class
                .field_name(field)
                .ok_or(RecompileError::BadConstant { index: field.name_index })?;
            let desc = class
                .field_descriptor(field)
                .ok_or(RecompileError::BadConstant { index: field.descriptor_index })?;
            let assigned = if claimed.contains(raw) || local.contains(raw) {
                mangle(raw, desc, &claimed, &local)
            } else {
                raw.to_string()
            };
            local.insert(assigned.clone());
            members.insert(raw, desc, assigned);
        }

        Ok(ClassSymbols {
            name: name.to_string(),
            super_class,
            interfaces,
            is_interface: class.is_interface(),
            members,
            constructors,
            has_static_init,
            overridable,
        })
    }

    /// `start` and every discovered class above it, nearest first.
    fn ancestry(&self, start: &str) -> Vec<&ClassSymbols> {
        let mut out: Vec<&ClassSymbols> = Vec::new();
        let mut pending = vec![start];
        while let Some(name) = pending.pop() {
            let symbols = match self.classes.get(name) {
                Some(symbols) => symbols,
                None => continue,
            };
            if out.iter().any(|seen| seen.name == symbols.name) {
                continue;
            }
            out.push(symbols);
            for interface in symbols.interfaces.iter().rev() {
                pending.push(interface);
            }
            if let Some(parent) = &symbols.super_class {
                pending.push(parent);
            }
        }
        out
    }

    // ---- Queries ----

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn is_discovered(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn class(&self, name: &str) -> Option<&ClassSymbols> {
        self.classes.get(name)
    }

    /// Discovered classes in input order.
    pub fn classes(&self) -> impl Iterator<Item = &ClassSymbols> {
        self.order.iter().filter_map(move |name| self.classes.get(name))
    }

    pub fn is_interface(&self, name: &str) -> bool {
        self.classes.get(name).map_or(false, |c| c.is_interface)
    }

    /// Find the class that declares `name`/`descriptor`, starting at `class`
    /// and walking superclasses before superinterfaces.
    pub fn resolve_member(&self, class: &str, name: &str, descriptor: &str) -> Option<ResolvedMember<'_>> {
        self.ancestry(class).into_iter().find_map(|symbols| {
            symbols.members.get(name, descriptor).map(|assigned| ResolvedMember {
                owner: symbols.name.as_str(),
                name: assigned,
            })
        })
    }

    /// Assigned name of the constructor of exactly `class` with `descriptor`.
    pub fn constructor_name(&self, class: &str, descriptor: &str) -> Option<&str> {
        self.classes
            .get(class)?
            .members
            .get(PRIMARY_CONSTRUCTOR, descriptor)
    }

    /// Every interface `class` implements, directly or through a parent.
    pub fn interfaces_of(&self, class: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let mut pending: Vec<String> = vec![class.to_string()];
        let mut seen: HashSet<String> = HashSet::new();
        while let Some(name) = pending.pop() {
            if !seen.insert(name.clone()) {
                continue;
            }
            let symbols = match self.classes.get(&name) {
                Some(symbols) => symbols,
                None => continue,
            };
            for interface in &symbols.interfaces {
                if !out.contains(interface) {
                    out.push(interface.clone());
                }
                pending.push(interface.clone());
            }
            if let Some(parent) = &symbols.super_class {
                pending.push(parent.clone());
            }
        }
        out
    }
}

/// `raw_<fingerprint>`, with a numeric suffix if even that is taken.
fn mangle(raw: &str, descriptor: &str, claimed: &HashSet<String>, local: &HashSet<String>) -> String {
    let base = format!("{}_{}", raw, fingerprint(descriptor));
    let taken = |candidate: &str| claimed.contains(candidate) || local.contains(candidate);
    if !taken(&base) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}_{}", base, n);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
