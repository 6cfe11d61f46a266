mod types;

pub use self::types::*;

/// Look up a constant pool entry by 1-based index.
pub fn get_entry(const_pool: &[ConstantInfo], index: u16) -> Option<&ConstantInfo> {
    const_pool.get((index as usize).checked_sub(1)?)
}

/// Look up a UTF-8 constant pool entry by 1-based index.
pub fn get_utf8(const_pool: &[ConstantInfo], index: u16) -> Option<&str> {
    match get_entry(const_pool, index)? {
        ConstantInfo::Utf8(u) => Some(&u.utf8_string),
        _ => None,
    }
}

/// Resolve a Class constant to its name string.
pub fn get_class_name(const_pool: &[ConstantInfo], class_index: u16) -> Option<&str> {
    match get_entry(const_pool, class_index)? {
        ConstantInfo::Class(c) => get_utf8(const_pool, c.name_index),
        _ => None,
    }
}

/// Resolve a NameAndType constant to (name, descriptor).
pub fn get_name_and_type(const_pool: &[ConstantInfo], nat_index: u16) -> Option<(&str, &str)> {
    match get_entry(const_pool, nat_index)? {
        ConstantInfo::NameAndType(nat) => {
            let name = get_utf8(const_pool, nat.name_index)?;
            let desc = get_utf8(const_pool, nat.descriptor_index)?;
            Some((name, desc))
        }
        _ => None,
    }
}

/// Resolve a FieldRef, MethodRef, or InterfaceMethodRef to (class_name, member_name, descriptor).
pub fn resolve_ref(const_pool: &[ConstantInfo], index: u16) -> Option<(&str, &str, &str)> {
    let (class_index, nat_index) = match get_entry(const_pool, index)? {
        ConstantInfo::FieldRef(r) => (r.class_index, r.name_and_type_index),
        ConstantInfo::MethodRef(r) => (r.class_index, r.name_and_type_index),
        ConstantInfo::InterfaceMethodRef(r) => (r.class_index, r.name_and_type_index),
        _ => return None,
    };
    let class_name = get_class_name(const_pool, class_index)?;
    let (name, desc) = get_name_and_type(const_pool, nat_index)?;
    Some((class_name, name, desc))
}
