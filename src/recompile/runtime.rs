//! JavaScript support functions referenced by generated code.
//!
//! Each helper is emitted at most once per module, and only when some
//! method body asked for it.

use std::collections::BTreeSet;

use crate::js::JsStmt;

/// Record returned by a block function to continue at another block.
pub const JUMP_CLASS: &str = "__Jump";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Helper {
    /// Three-way numeric compare for `lcmp` and the `*cmpl`/`*cmpg` pairs.
    Cmp,
    InstanceOf,
    CheckCast,
    GetClass,
    MultiANewArray,
    /// Runs block functions until one returns something other than a jump.
    Trampoline,
    /// Resolves a raw class path at run time.
    LookupClass,
}

impl Helper {
    pub fn name(&self) -> &'static str {
        match self {
            Helper::Cmp => "__cmp",
            Helper::InstanceOf => "__instanceof",
            Helper::CheckCast => "__checkcast",
            Helper::GetClass => "__getclass",
            Helper::MultiANewArray => "__multianewarray",
            Helper::Trampoline => "__run",
            Helper::LookupClass => "__lookupclass",
        }
    }

    /// Helpers this one calls.
    fn requires(&self) -> &'static [Helper] {
        match self {
            Helper::CheckCast => &[Helper::InstanceOf],
            _ => &[],
        }
    }

    fn source(&self) -> &'static str {
        match self {
            Helper::Cmp => CMP_SOURCE,
            Helper::InstanceOf => INSTANCEOF_SOURCE,
            Helper::CheckCast => CHECKCAST_SOURCE,
            Helper::GetClass => GETCLASS_SOURCE,
            Helper::MultiANewArray => MULTIANEWARRAY_SOURCE,
            Helper::Trampoline => TRAMPOLINE_SOURCE,
            Helper::LookupClass => LOOKUPCLASS_SOURCE,
        }
    }
}

const CMP_SOURCE: &str = r#"function __cmp(a, b) {
  return a > b ? 1 : a === b ? 0 : -1;
}"#;

// `type` is a constructor, `Array`, or an interface name. A cast to a class
// that was never seen passes null and always succeeds; an `instanceof` passes
// the `__lookupclass` result, undefined when nothing by that name exists.
const INSTANCEOF_SOURCE: &str = r#"function __instanceof(value, type) {
  if (value === null || value === undefined) {
    return false;
  }
  if (type === null) {
    return true;
  }
  if (type === undefined) {
    return false;
  }
  if (type === Array) {
    return Array.isArray(value);
  }
  if (typeof type === "string") {
    const ctor = value.constructor;
    return ctor !== undefined && ctor !== null && Array.isArray(ctor.$interfaces) && ctor.$interfaces.includes(type);
  }
  return value instanceof type;
}"#;

const CHECKCAST_SOURCE: &str = r#"function __checkcast(value, type, name) {
  if (value === null || value === undefined || __instanceof(value, type)) {
    return value;
  }
  throw new Error("ClassCastException: " + name);
}"#;

const GETCLASS_SOURCE: &str = r#"const __classes = {};
function __getclass(name) {
  if (!(name in __classes)) {
    __classes[name] = { name: name };
  }
  return __classes[name];
}"#;

const MULTIANEWARRAY_SOURCE: &str = r#"function __multianewarray(counts, fill) {
  const build = (depth) => {
    const array = [];
    for (let i = 0; i < counts[depth]; i++) {
      array.push(depth + 1 < counts.length ? build(depth + 1) : fill);
    }
    return array;
  };
  return build(0);
}"#;

const TRAMPOLINE_SOURCE: &str = r#"class __Jump {
  constructor(target, args) {
    this.target = target;
    this.args = args;
  }
}
function __run(next) {
  while (next instanceof __Jump) {
    next = next.target.apply(null, next.args);
  }
  return next;
}"#;

// Walks `MODULE` by path segments; undefined unless a function is found.
const LOOKUPCLASS_SOURCE: &str = r#"function __lookupclass(path) {
  let node = MODULE;
  for (const segment of path.split("/")) {
    if (node === undefined || node === null) {
      return undefined;
    }
    node = node[segment];
  }
  return typeof node === "function" ? node : undefined;
}"#;

/// Close `used` over helper dependencies.
pub fn with_dependencies(used: &BTreeSet<Helper>) -> BTreeSet<Helper> {
    let mut all = used.clone();
    let mut pending: Vec<Helper> = used.iter().copied().collect();
    while let Some(helper) = pending.pop() {
        for &dep in helper.requires() {
            if all.insert(dep) {
                pending.push(dep);
            }
        }
    }
    all
}

/// Declarations for `used` and everything they depend on.
pub fn helper_statements(used: &BTreeSet<Helper>) -> Vec<JsStmt> {
    with_dependencies(used)
        .into_iter()
        .map(|helper| JsStmt::Raw(helper.source().to_string()))
        .collect()
}
