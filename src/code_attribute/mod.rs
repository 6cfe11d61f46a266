mod types;

use std::io::Cursor;

use binrw::BinRead;

pub use self::types::*;

/// Longest method body a class file can carry.
pub const MAX_CODE_LENGTH: u32 = 65535;

/// Number of `tableswitch` jump offsets for `low..=high`, or `None` when the
/// bounds are inverted or the table could not fit in a method body.
pub fn table_len(low: i32, high: i32) -> Option<u32> {
    let len = high.checked_sub(low)?.checked_add(1)?;
    if len < 1 || len as u32 > MAX_CODE_LENGTH / 4 {
        return None;
    }
    Some(len as u32)
}

/// Decode the instruction starting at `address` in `code`.
///
/// Returns the instruction and its encoded length in bytes.
pub fn decode_instruction(code: &[u8], address: u32) -> binrw::BinResult<(Instruction, u32)> {
    let start = (address as usize).min(code.len());
    let mut cursor = Cursor::new(&code[start..]);
    let instruction = Instruction::read_args(&mut cursor, binrw::args! { address })?;
    Ok((instruction, cursor.position() as u32))
}
