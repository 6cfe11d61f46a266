/// JVM type descriptor and method descriptor parser.
use super::{RecompileError, RecompileResult};
use crate::js::JsExpr;

/// Represents a JVM type from a descriptor string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JvmType {
    Int,
    Long,
    Float,
    Double,
    Byte,
    Char,
    Short,
    Boolean,
    Void,
    Reference(String),
    Array(Box<JvmType>),
}

/// Number of operand stack words a value occupies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    Single,
    Double,
}

impl JvmType {
    /// Returns true if this type occupies two slots on the JVM stack.
    pub fn is_wide(&self) -> bool {
        matches!(self, JvmType::Long | JvmType::Double)
    }

    pub fn category(&self) -> Category {
        if self.is_wide() {
            Category::Double
        } else {
            Category::Single
        }
    }

    /// Number of local variable slots taken by a parameter of this type.
    pub fn slot_width(&self) -> usize {
        if self.is_wide() {
            2
        } else {
            1
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, JvmType::Reference(_) | JvmType::Array(_))
    }

    /// Returns the JVM descriptor string for this type.
    pub fn to_descriptor(&self) -> String {
        match self {
            JvmType::Int => "I".into(),
            JvmType::Long => "J".into(),
            JvmType::Float => "F".into(),
            JvmType::Double => "D".into(),
            JvmType::Byte => "B".into(),
            JvmType::Char => "C".into(),
            JvmType::Short => "S".into(),
            JvmType::Boolean => "Z".into(),
            JvmType::Void => "V".into(),
            JvmType::Reference(name) => format!("L{};", name),
            JvmType::Array(inner) => format!("[{}", inner.to_descriptor()),
        }
    }

    /// Initial value of a field or array element of this type.
    pub fn default_value(&self) -> JsExpr {
        if self.is_reference() {
            JsExpr::Null
        } else {
            JsExpr::Int(0)
        }
    }

    /// Element type after stripping `dimensions` array levels.
    pub fn element_type(&self, dimensions: usize) -> Option<&JvmType> {
        let mut current = self;
        for _ in 0..dimensions {
            match current {
                JvmType::Array(inner) => current = inner,
                _ => return None,
            }
        }
        Some(current)
    }
}

/// Parameter and return types of a method descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub params: Vec<JvmType>,
    pub ret: JvmType,
}

impl MethodDescriptor {
    /// Local variable slots taken by the parameters, excluding the receiver.
    pub fn param_slots(&self) -> usize {
        self.params.iter().map(JvmType::slot_width).sum()
    }
}

fn malformed(desc: &str) -> RecompileError {
    RecompileError::MalformedDescriptor {
        descriptor: desc.to_string(),
    }
}

/// Parse a single type descriptor starting at position `pos` in `desc`.
/// Returns (JvmType, next_position).
fn parse_type_at(desc: &str, pos: usize) -> RecompileResult<(JvmType, usize)> {
    let bytes = desc.as_bytes();
    let tag = *bytes.get(pos).ok_or_else(|| malformed(desc))?;
    match tag {
        b'B' => Ok((JvmType::Byte, pos + 1)),
        b'C' => Ok((JvmType::Char, pos + 1)),
        b'D' => Ok((JvmType::Double, pos + 1)),
        b'F' => Ok((JvmType::Float, pos + 1)),
        b'I' => Ok((JvmType::Int, pos + 1)),
        b'J' => Ok((JvmType::Long, pos + 1)),
        b'S' => Ok((JvmType::Short, pos + 1)),
        b'Z' => Ok((JvmType::Boolean, pos + 1)),
        b'V' => Ok((JvmType::Void, pos + 1)),
        b'L' => {
            let semi = desc[pos + 1..].find(';').ok_or_else(|| malformed(desc))?;
            let class_name = &desc[pos + 1..pos + 1 + semi];
            if class_name.is_empty() || class_name.contains(&['(', ')', '['][..]) {
                return Err(malformed(desc));
            }
            Ok((JvmType::Reference(class_name.to_string()), pos + 1 + semi + 1))
        }
        b'[' => {
            let (inner, next) = parse_type_at(desc, pos + 1)?;
            if inner == JvmType::Void {
                return Err(malformed(desc));
            }
            Ok((JvmType::Array(Box::new(inner)), next))
        }
        _ => Err(malformed(desc)),
    }
}

/// Parse a field descriptor, e.g. "[Ljava/lang/String;".
pub fn parse_field_descriptor(desc: &str) -> RecompileResult<JvmType> {
    let (ty, next) = parse_type_at(desc, 0)?;
    if next != desc.len() || ty == JvmType::Void {
        return Err(malformed(desc));
    }
    Ok(ty)
}

/// Parse a method descriptor, e.g. "(II)V" -> ([Int, Int], Void)
pub fn parse_method_descriptor(desc: &str) -> RecompileResult<MethodDescriptor> {
    if !desc.starts_with('(') {
        return Err(malformed(desc));
    }
    let close = desc.find(')').ok_or_else(|| malformed(desc))?;
    let mut params = Vec::new();
    let mut pos = 1;
    while pos < close {
        let (ty, next) = parse_type_at(desc, pos)?;
        if ty == JvmType::Void || next > close {
            return Err(malformed(desc));
        }
        params.push(ty);
        pos = next;
    }
    let (ret, next) = parse_type_at(desc, close + 1)?;
    if next != desc.len() {
        return Err(malformed(desc));
    }
    Ok(MethodDescriptor { params, ret })
}

/// Parse a class operand of `anewarray`/`checkcast`/`instanceof`, which is
/// either an internal class name or an array descriptor.
pub fn parse_class_operand(name: &str) -> RecompileResult<JvmType> {
    if name.starts_with('[') {
        parse_field_descriptor(name)
    } else if name.is_empty() {
        Err(malformed(name))
    } else {
        Ok(JvmType::Reference(name.to_string()))
    }
}

/// Convert a newarray type code to JvmType.
pub fn newarray_type(atype: u8) -> Option<JvmType> {
    match atype {
        4 => Some(JvmType::Boolean),
        5 => Some(JvmType::Char),
        6 => Some(JvmType::Float),
        7 => Some(JvmType::Double),
        8 => Some(JvmType::Byte),
        9 => Some(JvmType::Short),
        10 => Some(JvmType::Int),
        11 => Some(JvmType::Long),
        _ => None,
    }
}
