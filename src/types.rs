use crate::attribute_info::CodeAttribute;
use crate::constant_info::{self, *};
use crate::field_info::{FieldAccessFlags, FieldInfo};
use crate::method_info::{MethodAccessFlags, MethodInfo};
use crate::recompile::numeric;

/// An already-parsed class file, reduced to what the recompiler reads.
///
/// Constant-pool indices are 1-based: entry `n` lives at `const_pool[n - 1]`,
/// and long/double entries are followed by an [`ConstantInfo::Unusable`] slot.
#[derive(Clone, Debug)]
pub struct ClassFile {
    pub access_flags: ClassAccessFlags,
    pub this_class: u16,
    /// Zero when the class has no superclass (`java/lang/Object` itself).
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub const_pool: Vec<ConstantInfo>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
}

impl ClassFile {
    /// Slash-separated qualified name, e.g. `java/lang/String`.
    pub fn class_name(&self) -> Option<&str> {
        constant_info::get_class_name(&self.const_pool, self.this_class)
    }

    pub fn super_class_name(&self) -> Option<&str> {
        if self.super_class == 0 {
            return None;
        }
        constant_info::get_class_name(&self.const_pool, self.super_class)
    }

    pub fn interface_names(&self) -> Vec<&str> {
        self.interfaces
            .iter()
            .filter_map(|&index| constant_info::get_class_name(&self.const_pool, index))
            .collect()
    }

    pub fn method_name(&self, method: &MethodInfo) -> Option<&str> {
        constant_info::get_utf8(&self.const_pool, method.name_index)
    }

    pub fn method_descriptor(&self, method: &MethodInfo) -> Option<&str> {
        constant_info::get_utf8(&self.const_pool, method.descriptor_index)
    }

    pub fn field_name(&self, field: &FieldInfo) -> Option<&str> {
        constant_info::get_utf8(&self.const_pool, field.name_index)
    }

    pub fn field_descriptor(&self, field: &FieldInfo) -> Option<&str> {
        constant_info::get_utf8(&self.const_pool, field.descriptor_index)
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::INTERFACE)
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

impl ClassFile {
    /// An empty class with the given name and superclass.
    pub fn new(access_flags: ClassAccessFlags, name: &str, super_class: Option<&str>) -> Self {
        let mut class = ClassFile {
            access_flags,
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            const_pool: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        };
        class.this_class = class.get_or_add_class(name);
        if let Some(super_name) = super_class {
            class.super_class = class.get_or_add_class(super_name);
        }
        class
    }

    pub fn add_interface(&mut self, name: &str) {
        let index = self.get_or_add_class(name);
        self.interfaces.push(index);
    }

    /// Append a method; `code` of `None` declares it abstract or native.
    pub fn add_method(
        &mut self,
        access_flags: MethodAccessFlags,
        name: &str,
        descriptor: &str,
        code: Option<CodeAttribute>,
    ) {
        let name_index = self.get_or_add_utf8(name);
        let descriptor_index = self.get_or_add_utf8(descriptor);
        self.methods.push(MethodInfo {
            access_flags,
            name_index,
            descriptor_index,
            code,
        });
    }

    pub fn add_field(
        &mut self,
        access_flags: FieldAccessFlags,
        name: &str,
        descriptor: &str,
        constant_value_index: Option<u16>,
    ) {
        let name_index = self.get_or_add_utf8(name);
        let descriptor_index = self.get_or_add_utf8(descriptor);
        self.fields.push(FieldInfo {
            access_flags,
            name_index,
            descriptor_index,
            constant_value_index,
        });
    }

    fn find_constant(&self, wanted: &ConstantInfo) -> Option<u16> {
        self.const_pool
            .iter()
            .position(|entry| entry == wanted)
            .map(|pos| (pos + 1) as u16)
    }

    fn push_constant(&mut self, entry: ConstantInfo) -> u16 {
        if let Some(index) = self.find_constant(&entry) {
            return index;
        }
        let wide = matches!(entry, ConstantInfo::Long(_) | ConstantInfo::Double(_));
        self.const_pool.push(entry);
        let index = self.const_pool.len() as u16;
        if wide {
            self.const_pool.push(ConstantInfo::Unusable);
        }
        index
    }

    pub fn get_or_add_utf8(&mut self, value: &str) -> u16 {
        self.push_constant(ConstantInfo::Utf8(Utf8Constant {
            utf8_string: value.to_string(),
        }))
    }

    pub fn get_or_add_class(&mut self, name: &str) -> u16 {
        let name_index = self.get_or_add_utf8(name);
        self.push_constant(ConstantInfo::Class(ClassConstant { name_index }))
    }

    pub fn get_or_add_string(&mut self, value: &str) -> u16 {
        let string_index = self.get_or_add_utf8(value);
        self.push_constant(ConstantInfo::String(StringConstant { string_index }))
    }

    pub fn get_or_add_integer(&mut self, value: i32) -> u16 {
        self.push_constant(ConstantInfo::Integer(IntegerConstant { value }))
    }

    pub fn get_or_add_float(&mut self, value: f32) -> u16 {
        self.push_constant(ConstantInfo::Float(FloatConstant {
            bits: numeric::encode_float(value),
        }))
    }

    pub fn get_or_add_long(&mut self, value: i64) -> u16 {
        let bits = value as u64;
        self.push_constant(ConstantInfo::Long(LongConstant {
            high: (bits >> 32) as u32,
            low: bits as u32,
        }))
    }

    pub fn get_or_add_double(&mut self, value: f64) -> u16 {
        let (high, low) = numeric::encode_double(value);
        self.push_constant(ConstantInfo::Double(DoubleConstant { high, low }))
    }

    pub fn get_or_add_name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.get_or_add_utf8(name);
        let descriptor_index = self.get_or_add_utf8(descriptor);
        self.push_constant(ConstantInfo::NameAndType(NameAndTypeConstant {
            name_index,
            descriptor_index,
        }))
    }

    pub fn get_or_add_field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.get_or_add_class(class);
        let name_and_type_index = self.get_or_add_name_and_type(name, descriptor);
        self.push_constant(ConstantInfo::FieldRef(FieldRefConstant {
            class_index,
            name_and_type_index,
        }))
    }

    pub fn get_or_add_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.get_or_add_class(class);
        let name_and_type_index = self.get_or_add_name_and_type(name, descriptor);
        self.push_constant(ConstantInfo::MethodRef(MethodRefConstant {
            class_index,
            name_and_type_index,
        }))
    }

    pub fn get_or_add_interface_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.get_or_add_class(class);
        let name_and_type_index = self.get_or_add_name_and_type(name, descriptor);
        self.push_constant(ConstantInfo::InterfaceMethodRef(InterfaceMethodRefConstant {
            class_index,
            name_and_type_index,
        }))
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct ClassAccessFlags(u16);

bitflags! {
    impl ClassAccessFlags: u16 {
        const PUBLIC = 0x0001;     //	Declared public; may be accessed from outside its package.
        const FINAL = 0x0010;      //	Declared final; no subclasses allowed.
        const SUPER = 0x0020;      //	Treat superclass methods specially when invoked by the invokespecial instruction.
        const INTERFACE = 0x0200;  //	Is an interface, not a class.
        const ABSTRACT = 0x0400;   //	Declared abstract; must not be instantiated.
        const SYNTHETIC = 0x1000;  //	Declared synthetic; not present in the source code.
        const ANNOTATION = 0x2000; //	Declared as an annotation type.
        const ENUM = 0x4000;       //	Declared as an enum type.
        const MODULE = 0x8000;     //	Declared as a module type.
    }
}
