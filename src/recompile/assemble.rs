//! Stitch simulated blocks into one JavaScript function per method.
//!
//! Every reachable block becomes a nested function `__lbl<offset>`. A control
//! transfer returns a jump record naming the destination block and the live
//! operand stack, top of stack first, so no merge analysis is needed beyond
//! the entry depth of each block. The method body runs the records in a loop
//! (`__run`), which keeps long loops off the JavaScript call stack.

use std::collections::{BTreeMap, VecDeque};

use log::{debug, warn};

use crate::attribute_info::CodeAttribute;
use crate::js::{JsExpr, JsStmt, SwitchCase};

use super::blocks::{self, BlockPartition};
use super::descriptor::{Category, MethodDescriptor};
use super::runtime::{Helper, JUMP_CLASS};
use super::stack_sim::{self, Exit, MethodContext, MethodState, SimulatedBlock, StackValue, LOCALS};
use super::{RecompileError, RecompileResult};

pub fn block_name(start: u32) -> String {
    format!("__lbl{}", start)
}

/// Name of the `index`th declared parameter.
pub fn param_name(index: usize) -> String {
    format!("p{}", index)
}

/// `return new __Jump(__lblT, [top, ..., bottom]);`
fn transfer(target: u32, stack: &[StackValue]) -> JsStmt {
    let args = stack.iter().rev().map(|v| v.expr.clone()).collect();
    JsStmt::Return(Some(JsExpr::New {
        callee: Box::new(JsExpr::ident(JUMP_CLASS)),
        args: vec![JsExpr::ident(block_name(target)), JsExpr::Array(args)],
    }))
}

fn is_terminal(exit: &Exit) -> bool {
    matches!(exit, Exit::Return(_) | Exit::Throw(_))
}

fn categories(stack: &[StackValue]) -> Vec<Category> {
    stack.iter().map(|v| v.category).collect()
}

/// Blocks an exit can continue at, with the stack each one receives.
fn successors(exit: &Exit, partition: &BlockPartition) -> Vec<(u32, Vec<Category>)> {
    match exit {
        Exit::Goto { target, stack } => vec![(*target, categories(stack))],
        Exit::Branch {
            taken,
            fallthrough,
            stack,
            ..
        } => vec![(*taken, categories(stack)), (*fallthrough, categories(stack))],
        Exit::Switch {
            cases, default, stack, ..
        } => cases
            .iter()
            .map(|&(_, target)| target)
            .chain(std::iter::once(*default))
            .map(|target| (target, categories(stack)))
            .collect(),
        Exit::Ret { stack, .. } => partition
            .return_sites
            .iter()
            .map(|&site| (site, categories(stack)))
            .collect(),
        Exit::Return(_) | Exit::Throw(_) => Vec::new(),
    }
}

/// Lower an exit to the statements ending the block function.
fn lower_exit(exit: Exit, partition: &BlockPartition) -> Vec<JsStmt> {
    match exit {
        Exit::Goto { target, stack } => vec![transfer(target, &stack)],
        Exit::Branch {
            cond,
            taken,
            fallthrough,
            stack,
        } => vec![JsStmt::If {
            cond,
            then_body: vec![transfer(taken, &stack)],
            else_body: vec![transfer(fallthrough, &stack)],
        }],
        Exit::Switch {
            key,
            cases,
            default,
            stack,
        } => {
            let mut arms: Vec<SwitchCase> = cases
                .into_iter()
                .map(|(value, target)| SwitchCase {
                    test: Some(JsExpr::Int(value as i64)),
                    body: vec![transfer(target, &stack)],
                })
                .collect();
            arms.push(SwitchCase {
                test: None,
                body: vec![transfer(default, &stack)],
            });
            vec![JsStmt::Switch {
                discriminant: key,
                cases: arms,
            }]
        }
        Exit::Ret { address, stack } => {
            let mut arms: Vec<SwitchCase> = partition
                .return_sites
                .iter()
                .map(|&site| SwitchCase {
                    test: Some(JsExpr::Int(site as i64)),
                    body: vec![transfer(site, &stack)],
                })
                .collect();
            arms.push(SwitchCase {
                test: None,
                body: vec![JsStmt::throw_error(JsExpr::string("Invalid subroutine return address"))],
            });
            vec![JsStmt::Switch {
                discriminant: address,
                cases: arms,
            }]
        }
        Exit::Return(value) => vec![JsStmt::Return(value)],
        Exit::Throw(value) => vec![JsStmt::Throw(value)],
    }
}

/// Simulate every block reachable from the entry or an exception handler.
///
/// Returns the simulated blocks keyed by start offset with their entry stacks.
pub fn simulate_method(
    ctx: &MethodContext<'_>,
    state: &mut MethodState,
    code: &CodeAttribute,
) -> RecompileResult<(BlockPartition, BTreeMap<u32, (Vec<Category>, SimulatedBlock)>)> {
    let partition = blocks::partition(&code.code, &code.exception_table)?;

    let mut entries: BTreeMap<u32, Vec<Category>> = BTreeMap::new();
    let mut worklist: VecDeque<u32> = VecDeque::new();
    entries.insert(0, Vec::new());
    worklist.push_back(0);
    for handler in &code.exception_table {
        let start = handler.handler_pc as u32;
        if !entries.contains_key(&start) {
            // the thrown exception is the only value on the stack
            entries.insert(start, vec![Category::Single]);
            worklist.push_back(start);
        }
    }

    let mut simulated = BTreeMap::new();
    while let Some(start) = worklist.pop_front() {
        if simulated.contains_key(&start) {
            continue;
        }
        let block = partition
            .block_at(start)
            .ok_or(RecompileError::UnexpectedEndOfInput { offset: start })?;
        let entry = entries.get(&start).cloned().unwrap_or_default();
        let result = stack_sim::simulate_block(ctx, state, block, &entry)?;

        for (target, stack) in successors(&result.exit, &partition) {
            match entries.get(&target) {
                Some(existing) if *existing != stack => warn!(
                    "{}.{}: block {} entered with stack depth {} and {}, keeping the first",
                    ctx.class_name,
                    ctx.method_name,
                    target,
                    existing.len(),
                    stack.len()
                ),
                Some(_) => {}
                None => {
                    entries.insert(target, stack);
                    worklist.push_back(target);
                }
            }
        }
        simulated.insert(start, (entry, result));
    }

    for block in &partition.blocks {
        if !simulated.contains_key(&block.start) {
            debug!(
                "{}.{}: block {} is unreachable, skipping",
                ctx.class_name, ctx.method_name, block.start
            );
        }
    }
    Ok((partition, simulated))
}

/// Compile a method body into `function (p0, ...) { ... }`.
pub fn assemble_method(
    ctx: &MethodContext<'_>,
    state: &mut MethodState,
    code: &CodeAttribute,
    descriptor: &MethodDescriptor,
    is_static: bool,
) -> RecompileResult<JsExpr> {
    let (partition, simulated) = simulate_method(ctx, state, code)?;
    let jumps = simulated.values().any(|(_, block)| !is_terminal(&block.exit));

    let params: Vec<String> = (0..descriptor.params.len()).map(param_name).collect();
    let mut slots = Vec::with_capacity(descriptor.param_slots() + 1);
    if !is_static {
        slots.push(JsExpr::This);
    }
    for (param, ty) in params.iter().zip(&descriptor.params) {
        slots.push(JsExpr::ident(param.clone()));
        slots.extend((1..ty.slot_width()).map(|_| JsExpr::Undefined));
    }

    let mut body = vec![JsStmt::Const {
        name: LOCALS.to_string(),
        init: JsExpr::Array(slots),
    }];
    for (start, (entry, block)) in simulated {
        let mut block_body = block.statements;
        block_body.extend(lower_exit(block.exit, &partition));
        body.push(JsStmt::Function {
            name: block_name(start),
            params: (0..entry.len()).map(stack_sim::stack_param).collect(),
            body: block_body,
        });
    }
    let entry = JsExpr::ident(block_name(0)).call(Vec::new());
    if jumps {
        state.helpers.insert(Helper::Trampoline);
        body.push(JsStmt::Return(Some(JsExpr::ident(Helper::Trampoline.name()).call(vec![entry]))));
    } else {
        body.push(JsStmt::Return(Some(entry)));
    }

    Ok(JsExpr::Function { params, body })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::js::printer::print_expr;
    use crate::recompile::descriptor::parse_method_descriptor;
    use crate::recompile::symbols::{SymbolTable, OBJECT_CLASS};
    use crate::types::{ClassAccessFlags, ClassFile};

    fn compile(code: Vec<u8>, descriptor: &str, is_static: bool) -> RecompileResult<String> {
        let class = ClassFile::new(ClassAccessFlags::PUBLIC, "p/A", Some(OBJECT_CLASS));
        let symbols = SymbolTable::discover(std::slice::from_ref(&class))?;
        let ctx = MethodContext {
            class: &class,
            class_name: "p/A",
            method_name: "test",
            symbols: &symbols,
            code: &code,
        };
        let attribute = CodeAttribute {
            code: code.clone(),
            ..Default::default()
        };
        let mut state = MethodState::default();
        let descriptor = parse_method_descriptor(descriptor)?;
        let function = assemble_method(&ctx, &mut state, &attribute, &descriptor, is_static)?;
        Ok(print_expr(&function))
    }

    #[test]
    fn test_single_block_method() {
        let source = compile(vec![0x04, 0xac], "()I", true).unwrap();
        assert_eq!(
            source,
            "function () {\n  const __vars = [];\n  function __lbl0() {\n    return 1;\n  }\n  return __lbl0();\n}"
        );
    }

    #[test]
    fn test_locals_prologue() {
        // return
        let source = compile(vec![0xb1], "(JI)V", false).unwrap();
        assert!(
            source.contains("const __vars = [this, p0, undefined, p1];"),
            "unexpected prologue in {}",
            source
        );
        assert!(source.starts_with("function (p0, p1) {"));
    }

    #[test]
    fn test_branch_passes_stack() {
        // 0: iconst_2; 1: iload_0; 2: ifeq +6 (-> 8); 5: iconst_3; 6: iadd; 7: ireturn; 8: iconst_4; 9: iadd; 10: ireturn
        let code = vec![0x05, 0x1a, 0x99, 0x00, 0x06, 0x06, 0x60, 0xac, 0x07, 0x60, 0xac];
        let source = compile(code, "(I)I", true).unwrap();
        assert!(source.contains("if (__vars[0] === 0) {\n      return new __Jump(__lbl8, [2]);\n    } else {\n      return new __Jump(__lbl5, [2]);\n    }"), "{}", source);
        assert!(source.ends_with("  return __run(__lbl0());\n}"), "{}", source);
        assert!(source.contains("function __lbl5(__s0) {\n    return __s0 + 3;\n  }"), "{}", source);
        assert!(source.contains("function __lbl8(__s0) {\n    return __s0 + 4;\n  }"), "{}", source);
    }

    #[test]
    fn test_unreachable_blocks_are_dropped() {
        // 0: goto +4 (-> 4); 3: nop; 4: return
        let source = compile(vec![0xa7, 0x00, 0x04, 0x00, 0xb1], "()V", true).unwrap();
        assert!(source.contains("function __lbl4()"));
        assert!(!source.contains("__lbl3"), "{}", source);
    }

    #[test]
    fn test_subroutine_return_switch() {
        // 0: jsr +4 (-> 4); 3: return; 4: astore_0; 5: ret 0
        let source = compile(vec![0xa8, 0x00, 0x04, 0xb1, 0x4b, 0xa9, 0x00], "()V", true).unwrap();
        assert!(source.contains("return new __Jump(__lbl4, [3]);"), "{}", source);
        assert!(source.contains("switch (__vars[0]) {\n      case 3:\n        return new __Jump(__lbl3, []);"), "{}", source);
        assert!(source.contains("Invalid subroutine return address"));
    }

    #[test]
    fn test_errors_carry_offsets() {
        assert_eq!(
            compile(vec![0x57, 0xb1], "()V", true),
            Err(RecompileError::StackUnderflow { offset: 0 })
        );
        // falls off the end of the code
        assert_eq!(
            compile(vec![0x00], "()V", true),
            Err(RecompileError::UnexpectedEndOfInput { offset: 1 })
        );
    }
}
