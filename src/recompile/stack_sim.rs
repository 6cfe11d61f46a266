//! Symbolic execution of one basic block.
//!
//! The operand stack holds expression trees instead of values. Pure loads are
//! folded into the expressions that consume them; anything with an effect is
//! either emitted as a statement or hoisted into a `const` temporary before the
//! next statement, so generated code evaluates things in bytecode order.

use std::collections::BTreeSet;

use log::{debug, warn};

use crate::code_attribute::{decode_instruction, Instruction};
use crate::constant_info::{self, ConstantInfo};
use crate::js::{BinOp, JsExpr, JsStmt, UnaryOp};
use crate::types::ClassFile;

use super::blocks::BasicBlock;
use super::descriptor::{self, Category, JvmType};
use super::numeric::{self, NanBias};
use super::runtime::Helper;
use super::symbols::{self, SymbolTable, OBJECT_CLASS, PRIMARY_CONSTRUCTOR};
use super::{RecompileError, RecompileResult};

/// The per-activation local variable array.
pub const LOCALS: &str = "__vars";

/// Name of the block parameter holding the stack entry `depth` from the top.
pub fn stack_param(depth: usize) -> String {
    format!("__s{}", depth)
}

#[derive(Clone, Debug, PartialEq)]
pub struct StackValue {
    pub expr: JsExpr,
    pub category: Category,
}

/// How control leaves a block. Carried stacks are bottom-to-top and contain
/// only trivial expressions.
#[derive(Clone, Debug, PartialEq)]
pub enum Exit {
    /// Unconditional jump, `jsr`, or falling into the next block.
    Goto { target: u32, stack: Vec<StackValue> },
    Branch {
        cond: JsExpr,
        taken: u32,
        fallthrough: u32,
        stack: Vec<StackValue>,
    },
    Switch {
        key: JsExpr,
        cases: Vec<(i32, u32)>,
        default: u32,
        stack: Vec<StackValue>,
    },
    /// `ret`: resume at the return site whose offset `address` holds.
    Ret { address: JsExpr, stack: Vec<StackValue> },
    Return(Option<JsExpr>),
    Throw(JsExpr),
}

#[derive(Clone, Debug, PartialEq)]
pub struct SimulatedBlock {
    pub start: u32,
    pub statements: Vec<JsStmt>,
    pub exit: Exit,
}

/// What the simulator needs to know about the method being compiled.
pub struct MethodContext<'a> {
    pub class: &'a ClassFile,
    pub class_name: &'a str,
    pub method_name: &'a str,
    pub symbols: &'a SymbolTable,
    pub code: &'a [u8],
}

/// State shared by all blocks of one method.
#[derive(Debug, Default)]
pub struct MethodState {
    next_temp: usize,
    pub helpers: BTreeSet<Helper>,
}

impl MethodState {
    fn temp(&mut self) -> String {
        let name = format!("__t{}", self.next_temp);
        self.next_temp += 1;
        name
    }
}

/// Simulate `block`, whose entry stack has the given categories (bottom first).
pub fn simulate_block(
    ctx: &MethodContext<'_>,
    state: &mut MethodState,
    block: &BasicBlock,
    entry: &[Category],
) -> RecompileResult<SimulatedBlock> {
    let depth = entry.len();
    let stack = entry
        .iter()
        .enumerate()
        .map(|(i, &category)| StackValue {
            expr: JsExpr::ident(stack_param(depth - 1 - i)),
            category,
        })
        .collect();
    let mut sim = Simulator {
        ctx,
        state,
        stack,
        statements: Vec::new(),
        pc: block.start,
    };

    let mut pc = block.start;
    while pc < block.end {
        let (instruction, length) = decode_instruction(ctx.code, pc).map_err(|err| decode_error(ctx.code, pc, err))?;
        sim.pc = pc;
        if let Some(exit) = sim.step(&instruction, pc + length)? {
            return Ok(sim.finish(block.start, exit));
        }
        pc += length;
    }

    if block.end as usize >= ctx.code.len() {
        return Err(RecompileError::UnexpectedEndOfInput { offset: block.end });
    }
    let stack = sim.exit_stack();
    Ok(sim.finish(block.start, Exit::Goto { target: block.end, stack }))
}

fn decode_error(code: &[u8], pc: u32, err: binrw::Error) -> RecompileError {
    if err.is_eof() {
        RecompileError::UnexpectedEndOfInput { offset: pc }
    } else {
        RecompileError::UnsupportedOpcode {
            opcode: code.get(pc as usize).copied().unwrap_or_default(),
            offset: pc,
        }
    }
}

/// Numeric and string constants as literals; `None` for any other kind.
pub fn constant_literal(pool: &[ConstantInfo], index: u16) -> Option<StackValue> {
    let (expr, category) = match constant_info::get_entry(pool, index)? {
        ConstantInfo::Integer(c) => (JsExpr::Int(c.value as i64), Category::Single),
        ConstantInfo::Float(c) => (JsExpr::Number(numeric::decode_float(c.bits) as f64), Category::Single),
        ConstantInfo::Long(c) => (JsExpr::Int(numeric::decode_long(c.high, c.low)), Category::Double),
        ConstantInfo::Double(c) => (JsExpr::Number(numeric::decode_double(c.high, c.low)), Category::Double),
        ConstantInfo::String(c) => (
            JsExpr::string(constant_info::get_utf8(pool, c.string_index)?),
            Category::Single,
        ),
        _ => return None,
    };
    Some(StackValue { expr, category })
}

fn local(index: u16) -> JsExpr {
    JsExpr::ident(LOCALS).index(JsExpr::Int(index as i64))
}

fn numeric_literal(expr: &JsExpr) -> Option<f64> {
    match expr {
        JsExpr::Int(v) => Some(*v as f64),
        JsExpr::Number(v) => Some(*v),
        _ => None,
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum InvokeKind {
    Static,
    Virtual,
    Special,
}

/// What an `instanceof` or `checkcast` operand can be tested against.
enum TypeTarget {
    Class(JsExpr),
    Array,
    Interface(String),
    /// Never discovered; resolved by path at run time, if at all.
    Unknown,
}

struct Simulator<'a, 'b> {
    ctx: &'b MethodContext<'a>,
    state: &'b mut MethodState,
    stack: Vec<StackValue>,
    statements: Vec<JsStmt>,
    pc: u32,
}

impl<'a, 'b> Simulator<'a, 'b> {
    fn finish(self, start: u32, exit: Exit) -> SimulatedBlock {
        SimulatedBlock {
            start,
            statements: self.statements,
            exit,
        }
    }

    // ---- Stack ----

    fn push(&mut self, expr: JsExpr, category: Category) {
        self.stack.push(StackValue { expr, category });
    }

    fn push1(&mut self, expr: JsExpr) {
        self.push(expr, Category::Single);
    }

    fn push2(&mut self, expr: JsExpr) {
        self.push(expr, Category::Double);
    }

    fn pop(&mut self) -> RecompileResult<StackValue> {
        self.stack
            .pop()
            .ok_or(RecompileError::StackUnderflow { offset: self.pc })
    }

    fn pop_expr(&mut self) -> RecompileResult<JsExpr> {
        Ok(self.pop()?.expr)
    }

    /// Pop `count` values and return them in push order.
    fn pop_args(&mut self, count: usize) -> RecompileResult<Vec<JsExpr>> {
        if self.stack.len() < count {
            return Err(RecompileError::StackUnderflow { offset: self.pc });
        }
        let args = self.stack.split_off(self.stack.len() - count);
        Ok(args.into_iter().map(|v| v.expr).collect())
    }

    /// Hoist every non-trivial stack entry into a temporary, bottom first.
    fn flush(&mut self) {
        for i in 0..self.stack.len() {
            if self.stack[i].expr.is_trivial() {
                continue;
            }
            let name = self.state.temp();
            let init = std::mem::replace(&mut self.stack[i].expr, JsExpr::ident(name.clone()));
            self.statements.push(JsStmt::Const { name, init });
        }
    }

    fn emit(&mut self, stmt: JsStmt) {
        self.flush();
        self.statements.push(stmt);
    }

    /// Evaluate a discarded value for its effects.
    fn discard(&mut self, value: StackValue) {
        if !value.expr.is_trivial() {
            self.emit(JsStmt::Expr(value.expr));
        }
    }

    fn exit_stack(&mut self) -> Vec<StackValue> {
        self.flush();
        std::mem::take(&mut self.stack)
    }

    // ---- Helpers for instruction families ----

    fn target(&self, offset: i64) -> u32 {
        (self.pc as i64 + offset) as u32
    }

    fn store(&mut self, index: u16) -> RecompileResult<()> {
        let value = self.pop_expr()?;
        self.emit(JsStmt::assign(local(index), value));
        Ok(())
    }

    fn binary(&mut self, op: BinOp) -> RecompileResult<()> {
        let rhs = self.pop_expr()?;
        let lhs = self.pop()?;
        self.push(JsExpr::binary(op, lhs.expr, rhs), lhs.category);
        Ok(())
    }

    /// Integer division truncates toward zero.
    fn int_divide(&mut self) -> RecompileResult<()> {
        let rhs = self.pop_expr()?;
        let lhs = self.pop()?;
        let quotient = JsExpr::binary(BinOp::Div, lhs.expr, rhs);
        let expr = JsExpr::ident("Math").member("trunc").call(vec![quotient]);
        self.push(expr, lhs.category);
        Ok(())
    }

    fn negate(&mut self) -> RecompileResult<()> {
        let value = self.pop()?;
        self.push(JsExpr::unary(UnaryOp::Neg, value.expr), value.category);
        Ok(())
    }

    fn convert(&mut self, category: Category) -> RecompileResult<()> {
        let value = self.pop_expr()?;
        self.push(value, category);
        Ok(())
    }

    fn compare(&mut self, bias: NanBias) -> RecompileResult<()> {
        if bias == NanBias::Greater {
            // operands are passed in swapped order below
            self.flush();
        }
        let rhs = self.pop_expr()?;
        let lhs = self.pop_expr()?;
        if let (Some(a), Some(b)) = (numeric_literal(&lhs), numeric_literal(&rhs)) {
            self.push1(JsExpr::Int(numeric::compare(a, b, bias) as i64));
            return Ok(());
        }
        self.state.helpers.insert(Helper::Cmp);
        let cmp = |a: JsExpr, b: JsExpr| JsExpr::ident(Helper::Cmp.name()).call(vec![a, b]);
        let expr = match bias {
            NanBias::Less => cmp(lhs, rhs),
            // equal operands give 0, never -0
            NanBias::Greater => JsExpr::binary(BinOp::Sub, JsExpr::Int(0), cmp(rhs, lhs)),
        };
        self.push1(expr);
        Ok(())
    }

    fn array_load(&mut self, category: Category) -> RecompileResult<()> {
        let index = self.pop_expr()?;
        let array = self.pop_expr()?;
        self.push(array.index(index), category);
        Ok(())
    }

    fn array_store(&mut self) -> RecompileResult<()> {
        let value = self.pop_expr()?;
        let index = self.pop_expr()?;
        let array = self.pop_expr()?;
        self.emit(JsStmt::assign(array.index(index), value));
        Ok(())
    }

    fn branch_zero(&mut self, op: BinOp, offset: i16, next: u32) -> RecompileResult<Exit> {
        let value = self.pop_expr()?;
        self.branch(JsExpr::binary(op, value, JsExpr::Int(0)), offset, next)
    }

    fn branch_null(&mut self, op: BinOp, offset: i16, next: u32) -> RecompileResult<Exit> {
        let value = self.pop_expr()?;
        self.branch(JsExpr::binary(op, value, JsExpr::Null), offset, next)
    }

    fn branch_compare(&mut self, op: BinOp, offset: i16, next: u32) -> RecompileResult<Exit> {
        let rhs = self.pop_expr()?;
        let lhs = self.pop_expr()?;
        self.branch(JsExpr::binary(op, lhs, rhs), offset, next)
    }

    fn branch(&mut self, cond: JsExpr, offset: i16, next: u32) -> RecompileResult<Exit> {
        let stack = self.exit_stack();
        Ok(Exit::Branch {
            cond,
            taken: self.target(offset as i64),
            fallthrough: next,
            stack,
        })
    }

    fn goto(&mut self, offset: i64) -> Exit {
        let target = self.target(offset);
        let stack = self.exit_stack();
        Exit::Goto { target, stack }
    }

    fn jsr(&mut self, offset: i64, next: u32) -> Exit {
        self.push1(JsExpr::Int(next as i64));
        self.goto(offset)
    }

    fn ret(&mut self, index: u16) -> Exit {
        let stack = self.exit_stack();
        Exit::Ret {
            address: local(index),
            stack,
        }
    }

    fn switch(&mut self, cases: Vec<(i32, u32)>, default: u32) -> RecompileResult<Exit> {
        let key = self.pop_expr()?;
        let stack = self.exit_stack();
        Ok(Exit::Switch {
            key,
            cases,
            default,
            stack,
        })
    }

    fn return_value(&mut self) -> RecompileResult<Exit> {
        let value = self.pop_expr()?;
        self.flush();
        Ok(Exit::Return(Some(value)))
    }

    // ---- Constant pool ----

    fn pool(&self) -> &'a [ConstantInfo] {
        &self.ctx.class.const_pool
    }

    fn class_ref(&self, index: u16) -> RecompileResult<&'a str> {
        constant_info::get_class_name(self.pool(), index).ok_or(RecompileError::BadConstant { index })
    }

    fn member_ref(&self, index: u16) -> RecompileResult<(&'a str, &'a str, &'a str)> {
        constant_info::resolve_ref(self.pool(), index).ok_or(RecompileError::BadConstant { index })
    }

    fn load_constant(&mut self, index: u16) -> RecompileResult<()> {
        let pool = self.pool();
        if let Some(value) = constant_literal(pool, index) {
            self.stack.push(value);
            return Ok(());
        }
        match constant_info::get_entry(pool, index) {
            Some(ConstantInfo::Class(c)) => {
                let name = constant_info::get_utf8(pool, c.name_index)
                    .ok_or(RecompileError::BadConstant { index: c.name_index })?;
                self.state.helpers.insert(Helper::GetClass);
                let expr = JsExpr::ident(Helper::GetClass.name()).call(vec![JsExpr::string(symbols::dotted_name(name))]);
                self.push1(expr);
                Ok(())
            }
            _ => Err(RecompileError::BadConstant { index }),
        }
    }

    // ---- Symbols ----

    fn warn_unresolved(&self, class: &str) {
        warn!(
            "unresolved class {} referenced from {}.{} at offset {}, using raw names",
            class, self.ctx.class_name, self.ctx.method_name, self.pc
        );
    }

    /// Declaring class and assigned name of a member, falling back to the
    /// raw names when the class was never discovered.
    fn resolve(&self, class: &str, name: &str, descriptor: &str) -> (String, String) {
        if !self.ctx.symbols.is_discovered(class) {
            self.warn_unresolved(class);
            return (class.to_string(), name.to_string());
        }
        match self.ctx.symbols.resolve_member(class, name, descriptor) {
            Some(resolved) => (resolved.owner.to_string(), resolved.name.to_string()),
            None => {
                debug!("{}.{}{} is inherited from outside the input", class, name, descriptor);
                (class.to_string(), name.to_string())
            }
        }
    }

    fn type_target(&self, name: &str) -> RecompileResult<TypeTarget> {
        if descriptor::parse_class_operand(name)?.element_type(1).is_some() {
            return Ok(TypeTarget::Array);
        }
        if let Some(symbols) = self.ctx.symbols.class(name) {
            return Ok(if symbols.is_interface {
                TypeTarget::Interface(name.to_string())
            } else {
                TypeTarget::Class(symbols::class_expr(name))
            });
        }
        if name != OBJECT_CLASS {
            self.warn_unresolved(name);
        }
        Ok(TypeTarget::Unknown)
    }

    // ---- Fields and calls ----

    fn get_field(&mut self, index: u16, is_static: bool) -> RecompileResult<()> {
        let (class, name, desc) = self.member_ref(index)?;
        let category = descriptor::parse_field_descriptor(desc)?.category();
        let (owner, assigned) = self.resolve(class, name, desc);
        let object = if is_static {
            symbols::class_expr(&owner)
        } else {
            self.pop_expr()?
        };
        self.push(object.member(assigned), category);
        Ok(())
    }

    fn put_field(&mut self, index: u16, is_static: bool) -> RecompileResult<()> {
        let (class, name, desc) = self.member_ref(index)?;
        descriptor::parse_field_descriptor(desc)?;
        let (owner, assigned) = self.resolve(class, name, desc);
        let value = self.pop_expr()?;
        let object = if is_static {
            symbols::class_expr(&owner)
        } else {
            self.pop_expr()?
        };
        self.emit(JsStmt::assign(object.member(assigned), value));
        Ok(())
    }

    fn invoke(&mut self, kind: InvokeKind, index: u16) -> RecompileResult<()> {
        let (class, name, desc) = self.member_ref(index)?;
        let method = descriptor::parse_method_descriptor(desc)?;
        let args = self.pop_args(method.params.len())?;

        let call = match kind {
            InvokeKind::Static => {
                let (owner, assigned) = self.resolve(class, name, desc);
                symbols::class_expr(&owner).member(assigned).call(args)
            }
            InvokeKind::Virtual => {
                let receiver = self.pop_expr()?;
                let (_, assigned) = self.resolve(class, name, desc);
                receiver.member(assigned).call(args)
            }
            InvokeKind::Special if name == PRIMARY_CONSTRUCTOR => {
                let receiver = self.pop_expr()?;
                let constructor = match self.ctx.symbols.constructor_name(class, desc) {
                    Some(PRIMARY_CONSTRUCTOR) => symbols::class_expr(class),
                    Some(alias) => symbols::class_expr(class).member(alias),
                    None => {
                        if class != OBJECT_CLASS {
                            self.warn_unresolved(class);
                        }
                        symbols::class_expr(class)
                    }
                };
                let mut call_args = vec![receiver];
                call_args.extend(args);
                constructor.member("call").call(call_args)
            }
            InvokeKind::Special => {
                let receiver = self.pop_expr()?;
                let (owner, assigned) = self.resolve(class, name, desc);
                let mut call_args = vec![receiver];
                call_args.extend(args);
                symbols::class_expr(&owner)
                    .member("prototype")
                    .member(assigned)
                    .member("call")
                    .call(call_args)
            }
        };

        if method.ret == JvmType::Void {
            self.emit(JsStmt::Expr(call));
        } else {
            self.push(call, method.ret.category());
        }
        Ok(())
    }

    // ---- Allocation ----

    fn new_object(&mut self, index: u16) -> RecompileResult<()> {
        let class = self.class_ref(index)?;
        if !self.ctx.symbols.is_discovered(class) && class != OBJECT_CLASS {
            self.warn_unresolved(class);
        }
        let expr = JsExpr::ident("Object").member("setPrototypeOf").call(vec![
            JsExpr::Object(Vec::new()),
            symbols::class_expr(class).member("prototype"),
        ]);
        self.push1(expr);
        Ok(())
    }

    /// `const t = []; for (...) t.push(fill);`
    fn new_array(&mut self, fill: JsExpr) -> RecompileResult<()> {
        let count = self.pop_expr()?;
        self.flush();
        let limit = if count.is_trivial() {
            count
        } else {
            let name = self.state.temp();
            self.statements.push(JsStmt::Const {
                name: name.clone(),
                init: count,
            });
            JsExpr::ident(name)
        };
        let array = self.state.temp();
        self.statements.push(JsStmt::Const {
            name: array.clone(),
            init: JsExpr::Array(Vec::new()),
        });
        self.statements.push(JsStmt::CountedFor {
            var: "__i".to_string(),
            limit,
            body: vec![JsStmt::Expr(JsExpr::ident(array.clone()).member("push").call(vec![fill]))],
        });
        self.push1(JsExpr::ident(array));
        Ok(())
    }

    fn new_multi_array(&mut self, index: u16, dimensions: u8) -> RecompileResult<()> {
        let name = self.class_ref(index)?;
        let array_type = descriptor::parse_class_operand(name)?;
        let fill = array_type
            .element_type(dimensions as usize)
            .map_or(JsExpr::Null, JvmType::default_value);
        let counts = self.pop_args(dimensions as usize)?;
        self.state.helpers.insert(Helper::MultiANewArray);
        let expr = JsExpr::ident(Helper::MultiANewArray.name()).call(vec![JsExpr::Array(counts), fill]);
        self.push1(expr);
        Ok(())
    }

    // ---- Type checks ----

    fn instance_of(&mut self, index: u16) -> RecompileResult<()> {
        let name = self.class_ref(index)?;
        let value = self.pop_expr()?;
        if name == OBJECT_CLASS {
            let test = JsExpr::binary(BinOp::LooseNe, value, JsExpr::Null);
            self.push1(JsExpr::conditional(test, JsExpr::Int(1), JsExpr::Int(0)));
            return Ok(());
        }
        let test = match self.type_target(name)? {
            TypeTarget::Class(class) => JsExpr::binary(BinOp::InstanceOf, value, class),
            TypeTarget::Array => JsExpr::ident("Array").member("isArray").call(vec![value]),
            TypeTarget::Interface(interface) => {
                self.state.helpers.insert(Helper::InstanceOf);
                JsExpr::ident(Helper::InstanceOf.name()).call(vec![value, JsExpr::string(interface)])
            }
            TypeTarget::Unknown => {
                self.state.helpers.extend([Helper::InstanceOf, Helper::LookupClass]);
                let class = JsExpr::ident(Helper::LookupClass.name()).call(vec![JsExpr::string(name)]);
                JsExpr::ident(Helper::InstanceOf.name()).call(vec![value, class])
            }
        };
        self.push1(JsExpr::conditional(test, JsExpr::Int(1), JsExpr::Int(0)));
        Ok(())
    }

    fn check_cast(&mut self, index: u16) -> RecompileResult<()> {
        let name = self.class_ref(index)?;
        let value = self.pop_expr()?;
        let target = match self.type_target(name)? {
            TypeTarget::Class(class) => class,
            TypeTarget::Array => JsExpr::ident("Array"),
            TypeTarget::Interface(interface) => JsExpr::string(interface),
            TypeTarget::Unknown => JsExpr::Null,
        };
        self.state.helpers.insert(Helper::CheckCast);
        let expr = JsExpr::ident(Helper::CheckCast.name()).call(vec![
            value,
            target,
            JsExpr::string(symbols::dotted_name(name)),
        ]);
        self.push1(expr);
        Ok(())
    }

    // ---- Stack shuffles ----

    fn pop2(&mut self) -> RecompileResult<()> {
        let top = self.pop()?;
        if top.category == Category::Double {
            self.discard(top);
        } else {
            let below = self.pop()?;
            self.discard(below);
            self.discard(top);
        }
        Ok(())
    }

    fn dup_x1(&mut self) -> RecompileResult<()> {
        let v1 = self.pop()?;
        let v2 = self.pop()?;
        self.stack.extend([v1.clone(), v2, v1]);
        Ok(())
    }

    fn dup_x2(&mut self) -> RecompileResult<()> {
        let v1 = self.pop()?;
        let v2 = self.pop()?;
        if v2.category == Category::Double {
            self.stack.extend([v1.clone(), v2, v1]);
        } else {
            let v3 = self.pop()?;
            self.stack.extend([v1.clone(), v3, v2, v1]);
        }
        Ok(())
    }

    fn dup2(&mut self) -> RecompileResult<()> {
        let v1 = self.pop()?;
        if v1.category == Category::Double {
            self.stack.extend([v1.clone(), v1]);
        } else {
            let v2 = self.pop()?;
            self.stack.extend([v2.clone(), v1.clone(), v2, v1]);
        }
        Ok(())
    }

    fn dup2_x1(&mut self) -> RecompileResult<()> {
        let v1 = self.pop()?;
        if v1.category == Category::Double {
            let v2 = self.pop()?;
            self.stack.extend([v1.clone(), v2, v1]);
        } else {
            let v2 = self.pop()?;
            let v3 = self.pop()?;
            self.stack.extend([v2.clone(), v1.clone(), v3, v2, v1]);
        }
        Ok(())
    }

    fn dup2_x2(&mut self) -> RecompileResult<()> {
        let v1 = self.pop()?;
        let v2 = self.pop()?;
        match (v1.category, v2.category) {
            (Category::Double, Category::Double) => {
                self.stack.extend([v1.clone(), v2, v1]);
            }
            (Category::Double, Category::Single) => {
                let v3 = self.pop()?;
                self.stack.extend([v1.clone(), v3, v2, v1]);
            }
            _ => {
                let v3 = self.pop()?;
                if v3.category == Category::Double {
                    self.stack.extend([v2.clone(), v1.clone(), v3, v2, v1]);
                } else {
                    let v4 = self.pop()?;
                    self.stack.extend([v2.clone(), v1.clone(), v4, v3, v2, v1]);
                }
            }
        }
        Ok(())
    }

    /// Interpret one instruction. Returns the exit when it ends the block.
    fn step(&mut self, instruction: &Instruction, next: u32) -> RecompileResult<Option<Exit>> {
        use Category::{Double, Single};

        match instruction {
            // ============================================================
            // Constants
            // ============================================================
            Instruction::Nop => debug!("nop at {}", self.pc),
            Instruction::Aconstnull => self.push1(JsExpr::Null),
            Instruction::Iconstm1 => self.push1(JsExpr::Int(-1)),
            Instruction::Iconst0 => self.push1(JsExpr::Int(0)),
            Instruction::Iconst1 => self.push1(JsExpr::Int(1)),
            Instruction::Iconst2 => self.push1(JsExpr::Int(2)),
            Instruction::Iconst3 => self.push1(JsExpr::Int(3)),
            Instruction::Iconst4 => self.push1(JsExpr::Int(4)),
            Instruction::Iconst5 => self.push1(JsExpr::Int(5)),
            Instruction::Lconst0 => self.push2(JsExpr::Int(0)),
            Instruction::Lconst1 => self.push2(JsExpr::Int(1)),
            Instruction::Fconst0 => self.push1(JsExpr::Number(0.0)),
            Instruction::Fconst1 => self.push1(JsExpr::Number(1.0)),
            Instruction::Fconst2 => self.push1(JsExpr::Number(2.0)),
            Instruction::Dconst0 => self.push2(JsExpr::Number(0.0)),
            Instruction::Dconst1 => self.push2(JsExpr::Number(1.0)),
            Instruction::Bipush(v) => self.push1(JsExpr::Int(*v as i64)),
            Instruction::Sipush(v) => self.push1(JsExpr::Int(*v as i64)),
            Instruction::Ldc(index) => self.load_constant(*index as u16)?,
            Instruction::LdcW(index) | Instruction::Ldc2W(index) => self.load_constant(*index)?,

            // ============================================================
            // Loads
            // ============================================================
            Instruction::Iload(i) | Instruction::Fload(i) | Instruction::Aload(i) => self.push1(local(*i as u16)),
            Instruction::Lload(i) | Instruction::Dload(i) => self.push2(local(*i as u16)),
            Instruction::IloadWide(i) | Instruction::FloadWide(i) | Instruction::AloadWide(i) => self.push1(local(*i)),
            Instruction::LloadWide(i) | Instruction::DloadWide(i) => self.push2(local(*i)),
            Instruction::Iload0 | Instruction::Fload0 | Instruction::Aload0 => self.push1(local(0)),
            Instruction::Iload1 | Instruction::Fload1 | Instruction::Aload1 => self.push1(local(1)),
            Instruction::Iload2 | Instruction::Fload2 | Instruction::Aload2 => self.push1(local(2)),
            Instruction::Iload3 | Instruction::Fload3 | Instruction::Aload3 => self.push1(local(3)),
            Instruction::Lload0 | Instruction::Dload0 => self.push2(local(0)),
            Instruction::Lload1 | Instruction::Dload1 => self.push2(local(1)),
            Instruction::Lload2 | Instruction::Dload2 => self.push2(local(2)),
            Instruction::Lload3 | Instruction::Dload3 => self.push2(local(3)),

            Instruction::Iaload
            | Instruction::Faload
            | Instruction::Aaload
            | Instruction::Baload
            | Instruction::Caload
            | Instruction::Saload => self.array_load(Single)?,
            Instruction::Laload | Instruction::Daload => self.array_load(Double)?,

            // ============================================================
            // Stores
            // ============================================================
            Instruction::Istore(i)
            | Instruction::Lstore(i)
            | Instruction::Fstore(i)
            | Instruction::Dstore(i)
            | Instruction::Astore(i) => self.store(*i as u16)?,
            Instruction::IstoreWide(i)
            | Instruction::LstoreWide(i)
            | Instruction::FstoreWide(i)
            | Instruction::DstoreWide(i)
            | Instruction::AstoreWide(i) => self.store(*i)?,
            Instruction::Istore0 | Instruction::Lstore0 | Instruction::Fstore0 | Instruction::Dstore0 | Instruction::Astore0 => {
                self.store(0)?
            }
            Instruction::Istore1 | Instruction::Lstore1 | Instruction::Fstore1 | Instruction::Dstore1 | Instruction::Astore1 => {
                self.store(1)?
            }
            Instruction::Istore2 | Instruction::Lstore2 | Instruction::Fstore2 | Instruction::Dstore2 | Instruction::Astore2 => {
                self.store(2)?
            }
            Instruction::Istore3 | Instruction::Lstore3 | Instruction::Fstore3 | Instruction::Dstore3 | Instruction::Astore3 => {
                self.store(3)?
            }

            Instruction::Iastore
            | Instruction::Lastore
            | Instruction::Fastore
            | Instruction::Dastore
            | Instruction::Aastore
            | Instruction::Bastore
            | Instruction::Castore
            | Instruction::Sastore => self.array_store()?,

            // ============================================================
            // Stack
            // ============================================================
            Instruction::Pop => {
                let value = self.pop()?;
                self.discard(value);
            }
            Instruction::Pop2 => self.pop2()?,
            Instruction::Dup => {
                self.flush();
                let top = self.pop()?;
                self.stack.extend([top.clone(), top]);
            }
            Instruction::Dupx1 => {
                self.flush();
                self.dup_x1()?;
            }
            Instruction::Dupx2 => {
                self.flush();
                self.dup_x2()?;
            }
            Instruction::Dup2 => {
                self.flush();
                self.dup2()?;
            }
            Instruction::Dup2x1 => {
                self.flush();
                self.dup2_x1()?;
            }
            Instruction::Dup2x2 => {
                self.flush();
                self.dup2_x2()?;
            }
            Instruction::Swap => {
                self.flush();
                let v1 = self.pop()?;
                let v2 = self.pop()?;
                self.stack.extend([v1, v2]);
            }

            // ============================================================
            // Math
            // ============================================================
            Instruction::Iadd | Instruction::Ladd | Instruction::Fadd | Instruction::Dadd => self.binary(BinOp::Add)?,
            Instruction::Isub | Instruction::Lsub | Instruction::Fsub | Instruction::Dsub => self.binary(BinOp::Sub)?,
            Instruction::Imul | Instruction::Lmul | Instruction::Fmul | Instruction::Dmul => self.binary(BinOp::Mul)?,
            Instruction::Idiv | Instruction::Ldiv => self.int_divide()?,
            Instruction::Fdiv | Instruction::Ddiv => self.binary(BinOp::Div)?,
            Instruction::Irem | Instruction::Lrem | Instruction::Frem | Instruction::Drem => self.binary(BinOp::Rem)?,
            Instruction::Ineg | Instruction::Lneg | Instruction::Fneg | Instruction::Dneg => self.negate()?,
            Instruction::Ishl | Instruction::Lshl => self.binary(BinOp::Shl)?,
            Instruction::Ishr | Instruction::Lshr => self.binary(BinOp::Shr)?,
            Instruction::Iushr | Instruction::Lushr => self.binary(BinOp::Ushr)?,
            Instruction::Iand | Instruction::Land => self.binary(BinOp::BitAnd)?,
            Instruction::Ior | Instruction::Lor => self.binary(BinOp::BitOr)?,
            Instruction::Ixor | Instruction::Lxor => self.binary(BinOp::BitXor)?,
            Instruction::Iinc { index, value } => {
                let sum = JsExpr::binary(BinOp::Add, local(*index as u16), JsExpr::Int(*value as i64));
                self.emit(JsStmt::assign(local(*index as u16), sum));
            }
            Instruction::IincWide { index, value } => {
                let sum = JsExpr::binary(BinOp::Add, local(*index), JsExpr::Int(*value as i64));
                self.emit(JsStmt::assign(local(*index), sum));
            }

            // ============================================================
            // Conversions
            // ============================================================
            Instruction::I2l | Instruction::I2d | Instruction::F2l | Instruction::F2d => self.convert(Double)?,
            Instruction::L2d | Instruction::D2l => self.convert(Double)?,
            Instruction::L2i | Instruction::L2f | Instruction::D2i | Instruction::D2f => self.convert(Single)?,
            Instruction::I2f | Instruction::F2i => self.convert(Single)?,
            Instruction::I2b | Instruction::I2c | Instruction::I2s => self.convert(Single)?,

            // ============================================================
            // Comparisons
            // ============================================================
            Instruction::Lcmp | Instruction::Fcmpl | Instruction::Dcmpl => self.compare(NanBias::Less)?,
            Instruction::Fcmpg | Instruction::Dcmpg => self.compare(NanBias::Greater)?,
            Instruction::Ifeq(off) => return self.branch_zero(BinOp::StrictEq, *off, next).map(Some),
            Instruction::Ifne(off) => return self.branch_zero(BinOp::StrictNe, *off, next).map(Some),
            Instruction::Iflt(off) => return self.branch_zero(BinOp::Lt, *off, next).map(Some),
            Instruction::Ifge(off) => return self.branch_zero(BinOp::Ge, *off, next).map(Some),
            Instruction::Ifgt(off) => return self.branch_zero(BinOp::Gt, *off, next).map(Some),
            Instruction::Ifle(off) => return self.branch_zero(BinOp::Le, *off, next).map(Some),
            Instruction::IfIcmpeq(off) | Instruction::IfAcmpeq(off) => {
                return self.branch_compare(BinOp::StrictEq, *off, next).map(Some)
            }
            Instruction::IfIcmpne(off) | Instruction::IfAcmpne(off) => {
                return self.branch_compare(BinOp::StrictNe, *off, next).map(Some)
            }
            Instruction::IfIcmplt(off) => return self.branch_compare(BinOp::Lt, *off, next).map(Some),
            Instruction::IfIcmpge(off) => return self.branch_compare(BinOp::Ge, *off, next).map(Some),
            Instruction::IfIcmpgt(off) => return self.branch_compare(BinOp::Gt, *off, next).map(Some),
            Instruction::IfIcmple(off) => return self.branch_compare(BinOp::Le, *off, next).map(Some),
            Instruction::Ifnull(off) => return self.branch_null(BinOp::LooseEq, *off, next).map(Some),
            Instruction::Ifnonnull(off) => return self.branch_null(BinOp::LooseNe, *off, next).map(Some),

            // ============================================================
            // Control
            // ============================================================
            Instruction::Goto(off) => return Ok(Some(self.goto(*off as i64))),
            Instruction::GotoW(off) => return Ok(Some(self.goto(*off as i64))),
            Instruction::Jsr(off) => return Ok(Some(self.jsr(*off as i64, next))),
            Instruction::JsrW(off) => return Ok(Some(self.jsr(*off as i64, next))),
            Instruction::Ret(i) => return Ok(Some(self.ret(*i as u16))),
            Instruction::RetWide(i) => return Ok(Some(self.ret(*i))),
            Instruction::Tableswitch {
                default,
                low,
                offsets,
                ..
            } => {
                let cases = offsets
                    .iter()
                    .enumerate()
                    .map(|(i, off)| (low.wrapping_add(i as i32), self.target(*off as i64)))
                    .collect();
                let default = self.target(*default as i64);
                return self.switch(cases, default).map(Some);
            }
            Instruction::Lookupswitch { default, pairs, .. } => {
                let cases = pairs
                    .iter()
                    .map(|(key, off)| (*key, self.target(*off as i64)))
                    .collect();
                let default = self.target(*default as i64);
                return self.switch(cases, default).map(Some);
            }
            Instruction::Ireturn
            | Instruction::Lreturn
            | Instruction::Freturn
            | Instruction::Dreturn
            | Instruction::Areturn => return self.return_value().map(Some),
            Instruction::Return => {
                self.flush();
                return Ok(Some(Exit::Return(None)));
            }

            // ============================================================
            // References
            // ============================================================
            Instruction::Getstatic(index) => self.get_field(*index, true)?,
            Instruction::Putstatic(index) => self.put_field(*index, true)?,
            Instruction::Getfield(index) => self.get_field(*index, false)?,
            Instruction::Putfield(index) => self.put_field(*index, false)?,
            Instruction::Invokevirtual(index) => self.invoke(InvokeKind::Virtual, *index)?,
            Instruction::Invokespecial(index) => self.invoke(InvokeKind::Special, *index)?,
            Instruction::Invokestatic(index) => self.invoke(InvokeKind::Static, *index)?,
            Instruction::Invokeinterface { index, .. } => self.invoke(InvokeKind::Virtual, *index)?,
            Instruction::Invokedynamic { .. } => {
                return Err(RecompileError::UnsupportedOpcode {
                    opcode: 0xba,
                    offset: self.pc,
                })
            }
            Instruction::New(index) => self.new_object(*index)?,
            Instruction::Newarray(atype) => {
                let element = descriptor::newarray_type(*atype).ok_or(RecompileError::UnsupportedOpcode {
                    opcode: 0xbc,
                    offset: self.pc,
                })?;
                self.new_array(element.default_value())?;
            }
            Instruction::Anewarray(index) => {
                self.class_ref(*index)?;
                self.new_array(JsExpr::Null)?;
            }
            Instruction::Multianewarray { index, dimensions } => self.new_multi_array(*index, *dimensions)?,
            Instruction::Arraylength => {
                let array = self.pop_expr()?;
                self.push1(array.member("length"));
            }
            Instruction::Athrow => {
                let value = self.pop_expr()?;
                self.flush();
                return Ok(Some(Exit::Throw(value)));
            }
            Instruction::Checkcast(index) => self.check_cast(*index)?,
            Instruction::Instanceof(index) => self.instance_of(*index)?,
            Instruction::Monitorenter | Instruction::Monitorexit => {
                let value = self.pop()?;
                self.discard(value);
            }

            // ============================================================
            // Reserved
            // ============================================================
            Instruction::Breakpoint => self.emit(JsStmt::Debugger),
        }
        Ok(None)
    }
}
