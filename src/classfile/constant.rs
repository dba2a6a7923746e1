// Constant pool entries and the pool itself
//
// Indices are JVM style: 1-based, 0 means "no constant". Long and double
// constants take two slots; the second one is `Constant::Unusable`.

use super::{ClassId, MemberId};
use serde::{Deserialize, Serialize};

/// Shared shape of field, method and interface method references
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefConstant {
    pub class_index: u16,
    pub name_and_type_index: u16,
    /// Class declaring the resolved member; falls back to the named class
    #[serde(skip)]
    pub referenced_class: Option<ClassId>,
    #[serde(skip)]
    pub referenced_member: Option<MemberId>,
}

impl RefConstant {
    pub fn new(class_index: u16, name_and_type_index: u16) -> Self {
        Self {
            class_index,
            name_and_type_index,
            referenced_class: None,
            referenced_member: None,
        }
    }
}

/// Shared shape of dynamic and invokedynamic constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicConstant {
    pub bootstrap_method_attribute_index: u16,
    pub name_and_type_index: u16,
    /// Classes named in the descriptor
    #[serde(skip)]
    pub referenced_classes: Vec<Option<ClassId>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constant {
    Unusable,
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String {
        string_index: u16,
        /// Set when the string spells the name of a class in the pool
        #[serde(skip)]
        referenced_class: Option<ClassId>,
    },
    Class {
        name_index: u16,
        #[serde(skip)]
        referenced_class: Option<ClassId>,
    },
    FieldRef(RefConstant),
    MethodRef(RefConstant),
    InterfaceMethodRef(RefConstant),
    NameAndType {
        name_index: u16,
        descriptor_index: u16,
    },
    MethodHandle {
        reference_kind: u8,
        reference_index: u16,
    },
    MethodType {
        descriptor_index: u16,
        #[serde(skip)]
        referenced_classes: Vec<Option<ClassId>>,
    },
    Dynamic(DynamicConstant),
    InvokeDynamic(DynamicConstant),
    Module {
        name_index: u16,
    },
    Package {
        name_index: u16,
    },
}

impl Constant {
    pub fn tag_name(&self) -> &'static str {
        match self {
            Constant::Unusable => "Unusable",
            Constant::Utf8(_) => "Utf8",
            Constant::Integer(_) => "Integer",
            Constant::Float(_) => "Float",
            Constant::Long(_) => "Long",
            Constant::Double(_) => "Double",
            Constant::String { .. } => "String",
            Constant::Class { .. } => "Class",
            Constant::FieldRef(_) => "Fieldref",
            Constant::MethodRef(_) => "Methodref",
            Constant::InterfaceMethodRef(_) => "InterfaceMethodref",
            Constant::NameAndType { .. } => "NameAndType",
            Constant::MethodHandle { .. } => "MethodHandle",
            Constant::MethodType { .. } => "MethodType",
            Constant::Dynamic(_) => "Dynamic",
            Constant::InvokeDynamic(_) => "InvokeDynamic",
            Constant::Module { .. } => "Module",
            Constant::Package { .. } => "Package",
        }
    }

    fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstantPool {
    /// Slot 0 is a placeholder so indices line up with the class file
    entries: Vec<Constant>,
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantPool {
    pub fn new() -> Self {
        Self {
            entries: vec![Constant::Unusable],
        }
    }

    /// Wrap entries that already include the placeholder slot 0
    pub fn from_entries(entries: Vec<Constant>) -> Self {
        if entries.is_empty() {
            Self::new()
        } else {
            Self { entries }
        }
    }

    /// Number of slots, including slot 0
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    pub fn get(&self, index: u16) -> Option<&Constant> {
        if index == 0 {
            return None;
        }
        self.entries.get(index as usize)
    }

    pub fn get_mut(&mut self, index: u16) -> Option<&mut Constant> {
        if index == 0 {
            return None;
        }
        self.entries.get_mut(index as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &Constant)> {
        self.entries
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, constant)| (i as u16, constant))
    }

    pub fn utf8(&self, index: u16) -> Option<&str> {
        match self.get(index)? {
            Constant::Utf8(value) => Some(value),
            _ => None,
        }
    }

    /// Internal name of a class constant
    pub fn class_name(&self, index: u16) -> Option<&str> {
        match self.get(index)? {
            Constant::Class { name_index, .. } => self.utf8(*name_index),
            _ => None,
        }
    }

    /// Resolved class of a class constant
    pub fn referenced_class(&self, index: u16) -> Option<ClassId> {
        match self.get(index)? {
            Constant::Class { referenced_class, .. } => *referenced_class,
            _ => None,
        }
    }

    pub fn name_and_type(&self, index: u16) -> Option<(&str, &str)> {
        match self.get(index)? {
            Constant::NameAndType {
                name_index,
                descriptor_index,
            } => Some((self.utf8(*name_index)?, self.utf8(*descriptor_index)?)),
            _ => None,
        }
    }

    /// Append a constant and return its index
    pub fn add(&mut self, constant: Constant) -> u16 {
        let index = self.entries.len() as u16;
        let wide = constant.is_wide();
        self.entries.push(constant);
        if wide {
            self.entries.push(Constant::Unusable);
        }
        index
    }

    fn find(&self, predicate: impl Fn(&Constant) -> bool) -> Option<u16> {
        self.iter().find(|(_, c)| predicate(c)).map(|(i, _)| i)
    }

    pub fn add_utf8(&mut self, value: &str) -> u16 {
        self.find(|c| matches!(c, Constant::Utf8(v) if v == value))
            .unwrap_or_else(|| self.add(Constant::Utf8(value.to_string())))
    }

    pub fn add_integer(&mut self, value: i32) -> u16 {
        self.find(|c| matches!(c, Constant::Integer(v) if *v == value))
            .unwrap_or_else(|| self.add(Constant::Integer(value)))
    }

    pub fn add_long(&mut self, value: i64) -> u16 {
        self.find(|c| matches!(c, Constant::Long(v) if *v == value))
            .unwrap_or_else(|| self.add(Constant::Long(value)))
    }

    pub fn add_string(&mut self, value: &str) -> u16 {
        let string_index = self.add_utf8(value);
        self.find(|c| matches!(c, Constant::String { string_index: s, .. } if *s == string_index))
            .unwrap_or_else(|| {
                self.add(Constant::String {
                    string_index,
                    referenced_class: None,
                })
            })
    }

    pub fn add_class(&mut self, name: &str) -> u16 {
        let name_index = self.add_utf8(name);
        self.find(|c| matches!(c, Constant::Class { name_index: n, .. } if *n == name_index))
            .unwrap_or_else(|| {
                self.add(Constant::Class {
                    name_index,
                    referenced_class: None,
                })
            })
    }

    pub fn add_name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.add_utf8(name);
        let descriptor_index = self.add_utf8(descriptor);
        self.find(|c| {
            matches!(c, Constant::NameAndType { name_index: n, descriptor_index: d }
                if *n == name_index && *d == descriptor_index)
        })
        .unwrap_or_else(|| {
            self.add(Constant::NameAndType {
                name_index,
                descriptor_index,
            })
        })
    }

    pub fn add_field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let reference = self.ref_constant(class, name, descriptor);
        self.add_if_absent(Constant::FieldRef(reference))
    }

    pub fn add_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let reference = self.ref_constant(class, name, descriptor);
        self.add_if_absent(Constant::MethodRef(reference))
    }

    pub fn add_interface_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let reference = self.ref_constant(class, name, descriptor);
        self.add_if_absent(Constant::InterfaceMethodRef(reference))
    }

    pub fn add_method_handle(&mut self, reference_kind: u8, reference_index: u16) -> u16 {
        self.add_if_absent(Constant::MethodHandle {
            reference_kind,
            reference_index,
        })
    }

    pub fn add_method_type(&mut self, descriptor: &str) -> u16 {
        let descriptor_index = self.add_utf8(descriptor);
        self.add_if_absent(Constant::MethodType {
            descriptor_index,
            referenced_classes: Vec::new(),
        })
    }

    pub fn add_invoke_dynamic(&mut self, bootstrap_method_attribute_index: u16, name: &str, descriptor: &str) -> u16 {
        let name_and_type_index = self.add_name_and_type(name, descriptor);
        self.add_if_absent(Constant::InvokeDynamic(DynamicConstant {
            bootstrap_method_attribute_index,
            name_and_type_index,
            referenced_classes: Vec::new(),
        }))
    }

    pub fn add_dynamic(&mut self, bootstrap_method_attribute_index: u16, name: &str, descriptor: &str) -> u16 {
        let name_and_type_index = self.add_name_and_type(name, descriptor);
        self.add_if_absent(Constant::Dynamic(DynamicConstant {
            bootstrap_method_attribute_index,
            name_and_type_index,
            referenced_classes: Vec::new(),
        }))
    }

    pub fn add_module(&mut self, name: &str) -> u16 {
        let name_index = self.add_utf8(name);
        self.add_if_absent(Constant::Module { name_index })
    }

    pub fn add_package(&mut self, name: &str) -> u16 {
        let name_index = self.add_utf8(name);
        self.add_if_absent(Constant::Package { name_index })
    }

    fn ref_constant(&mut self, class: &str, name: &str, descriptor: &str) -> RefConstant {
        let class_index = self.add_class(class);
        let name_and_type_index = self.add_name_and_type(name, descriptor);
        RefConstant::new(class_index, name_and_type_index)
    }

    fn add_if_absent(&mut self, constant: Constant) -> u16 {
        self.find(|c| *c == constant).unwrap_or_else(|| self.add(constant))
    }
}
