use std::collections::BTreeSet;

use crate::attribute_info::ExceptionEntry;
use crate::code_attribute::{table_len, MAX_CODE_LENGTH};

use super::{RecompileError, RecompileResult};

/// Half-open byte range `[start, end)` of one basic block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BasicBlock {
    pub start: u32,
    pub end: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockPartition {
    /// Blocks in offset order; together they cover the whole method body.
    pub blocks: Vec<BasicBlock>,
    /// Every jump, switch, and `jsr` destination, ascending.
    pub targets: BTreeSet<u32>,
    /// Offsets following each `jsr`, where a `ret` may resume.
    pub return_sites: Vec<u32>,
}

impl BlockPartition {
    pub fn block_at(&self, start: u32) -> Option<&BasicBlock> {
        self.blocks
            .binary_search_by_key(&start, |block| block.start)
            .ok()
            .map(|i| &self.blocks[i])
    }
}

const WIDE: u8 = 0xc4;
const IINC: u8 = 0x84;
const TABLESWITCH: u8 = 0xaa;
const LOOKUPSWITCH: u8 = 0xab;

/// Operand bytes following a fixed-length opcode.
fn operand_length(opcode: u8) -> Option<u32> {
    let len = match opcode {
        0x00..=0x0f => 0,
        0x10 => 1,             // bipush
        0x11 => 2,             // sipush
        0x12 => 1,             // ldc
        0x13 | 0x14 => 2,      // ldc_w, ldc2_w
        0x15..=0x19 => 1,      // loads
        0x1a..=0x35 => 0,
        0x36..=0x3a => 1,      // stores
        0x3b..=0x83 => 0,
        IINC => 2,
        0x85..=0x98 => 0,
        0x99..=0xa8 => 2,      // branches, goto, jsr
        0xa9 => 1,             // ret
        0xac..=0xb1 => 0,      // returns
        0xb2..=0xb8 => 2,      // field access, invokes
        0xb9 | 0xba => 4,      // invokeinterface, invokedynamic
        0xbb => 2,             // new
        0xbc => 1,             // newarray
        0xbd => 2,             // anewarray
        0xbe | 0xbf => 0,
        0xc0 | 0xc1 => 2,      // checkcast, instanceof
        0xc2 | 0xc3 => 0,
        0xc5 => 3,             // multianewarray
        0xc6 | 0xc7 => 2,      // ifnull, ifnonnull
        0xc8 | 0xc9 => 4,      // goto_w, jsr_w
        0xca => 0,             // breakpoint
        _ => return None,
    };
    Some(len)
}

/// How the instruction at some offset leaves its block.
enum Flow {
    Next,
    /// Conditional branch, `goto`, or `jsr`: split at the target(s) and after.
    Jump(Vec<u32>),
    Switch(Vec<u32>),
    /// Return, `ret`, or `athrow`.
    End,
}

struct Scanner<'a> {
    code: &'a [u8],
}

impl Scanner<'_> {
    fn byte(&self, at: u32, start: u32) -> RecompileResult<u8> {
        self.code
            .get(at as usize)
            .copied()
            .ok_or(RecompileError::UnexpectedEndOfInput { offset: start })
    }

    fn i16_at(&self, at: u32, start: u32) -> RecompileResult<i16> {
        Ok(i16::from_be_bytes([self.byte(at, start)?, self.byte(at + 1, start)?]))
    }

    fn i32_at(&self, at: u32, start: u32) -> RecompileResult<i32> {
        Ok(i32::from_be_bytes([
            self.byte(at, start)?,
            self.byte(at + 1, start)?,
            self.byte(at + 2, start)?,
            self.byte(at + 3, start)?,
        ]))
    }

    fn target(&self, start: u32, offset: i64) -> RecompileResult<u32> {
        let target = start as i64 + offset;
        if target < 0 || target >= self.code.len() as i64 {
            return Err(RecompileError::UnexpectedEndOfInput {
                offset: target.max(0) as u32,
            });
        }
        Ok(target as u32)
    }

    /// Length and control flow of the instruction at `pc`.
    fn instruction(&self, pc: u32) -> RecompileResult<(u32, Flow)> {
        let opcode = self.byte(pc, pc)?;
        match opcode {
            WIDE => {
                let inner = self.byte(pc + 1, pc)?;
                let len = match inner {
                    IINC => 6,
                    0x15..=0x19 | 0x36..=0x3a | 0xa9 => 4,
                    _ => return Err(RecompileError::UnsupportedOpcode { opcode: inner, offset: pc + 1 }),
                };
                self.byte(pc + len - 1, pc)?;
                let flow = if inner == 0xa9 { Flow::End } else { Flow::Next };
                Ok((len, flow))
            }
            TABLESWITCH => {
                let base = pc + 1 + (4 - (pc + 1) % 4) % 4;
                let default = self.i32_at(base, pc)?;
                let low = self.i32_at(base + 4, pc)?;
                let high = self.i32_at(base + 8, pc)?;
                let count = table_len(low, high).ok_or(RecompileError::UnexpectedEndOfInput { offset: pc })?;
                let mut targets = vec![self.target(pc, default as i64)?];
                for i in 0..count {
                    let offset = self.i32_at(base + 12 + 4 * i, pc)?;
                    targets.push(self.target(pc, offset as i64)?);
                }
                Ok((base + 12 + 4 * count - pc, Flow::Switch(targets)))
            }
            LOOKUPSWITCH => {
                let base = pc + 1 + (4 - (pc + 1) % 4) % 4;
                let default = self.i32_at(base, pc)?;
                let npairs = self.i32_at(base + 4, pc)?;
                if npairs < 0 || npairs as u32 > MAX_CODE_LENGTH / 8 {
                    return Err(RecompileError::UnexpectedEndOfInput { offset: pc });
                }
                let npairs = npairs as u32;
                let mut targets = vec![self.target(pc, default as i64)?];
                for i in 0..npairs {
                    let offset = self.i32_at(base + 8 + 8 * i + 4, pc)?;
                    targets.push(self.target(pc, offset as i64)?);
                }
                Ok((base + 8 + 8 * npairs - pc, Flow::Switch(targets)))
            }
            _ => {
                let operands = operand_length(opcode)
                    .ok_or(RecompileError::UnsupportedOpcode { opcode, offset: pc })?;
                let len = 1 + operands;
                if operands > 0 {
                    self.byte(pc + operands, pc)?;
                }
                let flow = match opcode {
                    0x99..=0xa8 | 0xc6 | 0xc7 => {
                        let offset = self.i16_at(pc + 1, pc)?;
                        Flow::Jump(vec![self.target(pc, offset as i64)?])
                    }
                    0xc8 | 0xc9 => {
                        let offset = self.i32_at(pc + 1, pc)?;
                        Flow::Jump(vec![self.target(pc, offset as i64)?])
                    }
                    0xa9 | 0xac..=0xb1 | 0xbf => Flow::End,
                    _ => Flow::Next,
                };
                Ok((len, flow))
            }
        }
    }
}

/// Split a method body into basic blocks.
///
/// Blocks start at offset 0, at every jump or switch target, at every
/// exception handler, and after every instruction that leaves the block.
pub fn partition(code: &[u8], handlers: &[ExceptionEntry]) -> RecompileResult<BlockPartition> {
    if code.is_empty() {
        return Err(RecompileError::UnexpectedEndOfInput { offset: 0 });
    }
    let scanner = Scanner { code };
    let len = code.len() as u32;

    let mut starts: BTreeSet<u32> = BTreeSet::new();
    let mut boundaries: BTreeSet<u32> = BTreeSet::new();
    let mut targets: BTreeSet<u32> = BTreeSet::new();
    let mut return_sites = Vec::new();

    boundaries.insert(0);
    let mut pc = 0u32;
    while pc < len {
        starts.insert(pc);
        let (size, flow) = scanner.instruction(pc)?;
        let next = pc + size;
        match flow {
            Flow::Next => {}
            Flow::Jump(to) | Flow::Switch(to) => {
                targets.extend(to.iter().copied());
                boundaries.extend(to);
                boundaries.insert(next);
                if matches!(code[pc as usize], 0xa8 | 0xc9) && next < len {
                    return_sites.push(next);
                }
            }
            Flow::End => {
                boundaries.insert(next);
            }
        }
        pc = next;
    }

    for handler in handlers {
        let handler_pc = handler.handler_pc as u32;
        if handler_pc >= len {
            return Err(RecompileError::UnexpectedEndOfInput { offset: handler_pc });
        }
        boundaries.insert(handler_pc);
    }

    // A target inside an instruction would slice it in half.
    if let Some(&bad) = boundaries.iter().find(|&&b| b < len && !starts.contains(&b)) {
        return Err(RecompileError::UnexpectedEndOfInput { offset: bad });
    }

    let edges: Vec<u32> = boundaries.into_iter().filter(|&b| b < len).collect();
    let blocks = edges
        .iter()
        .enumerate()
        .map(|(i, &start)| BasicBlock {
            start,
            end: edges.get(i + 1).copied().unwrap_or(len),
        })
        .collect();

    Ok(BlockPartition {
        blocks,
        targets,
        return_sites,
    })
}
