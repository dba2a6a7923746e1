//! In-memory model of a linked class pool
//!
//! The reader that produces this model lives outside this crate; here we only
//! keep what the usage marker walks. Every entity that can carry a usage mark
//! is addressable through an [`Entity`] key, so marks live in a side table owned
//! by the marker while the model itself stays immutable.

pub mod attribute;
pub mod builder;
pub mod constant;
pub mod descriptor;
mod hierarchy;
pub mod instruction;
pub mod kotlin;
mod linker;
pub mod loader;

pub use attribute::{
    Annotation, Attribute, AttributeKind, BootstrapMethod, CodeAttribute, ElementValue,
    ElementValueKind, ExceptionInfo, ExportsInfo, InnerClassesInfo, LineNumberInfo,
    LocalVariableInfo, LocalVariableTypeInfo, ModuleAttribute, OpensInfo, ParameterInfo,
    ProvidesInfo, RecordComponentInfo, RequiresInfo, StackMapFrame, TypeAnnotation,
    VerificationType,
};
pub use builder::{CodeBuilder, ProgramClassBuilder};
pub use constant::{Constant, ConstantPool, DynamicConstant, RefConstant};
pub use hierarchy::{Hierarchy, Relation};
pub use instruction::Instruction;
pub use kotlin::{KotlinMetadata, KotlinNodeId};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// JVM access flags
pub mod access {
    pub const PUBLIC: u16 = 0x0001;
    pub const PRIVATE: u16 = 0x0002;
    pub const PROTECTED: u16 = 0x0004;
    pub const STATIC: u16 = 0x0008;
    pub const FINAL: u16 = 0x0010;
    pub const SYNCHRONIZED: u16 = 0x0020;
    pub const BRIDGE: u16 = 0x0040;
    pub const VARARGS: u16 = 0x0080;
    pub const NATIVE: u16 = 0x0100;
    pub const INTERFACE: u16 = 0x0200;
    pub const ABSTRACT: u16 = 0x0400;
    pub const SYNTHETIC: u16 = 0x1000;
    pub const ANNOTATION: u16 = 0x2000;
    pub const ENUM: u16 = 0x4000;
}

pub const METHOD_NAME_INIT: &str = "<init>";
pub const METHOD_NAME_CLINIT: &str = "<clinit>";
pub const METHOD_TYPE_CLINIT: &str = "()V";

/// Whether a method name denotes a constructor or static initializer
pub fn is_initializer(name: &str) -> bool {
    name == METHOD_NAME_INIT || name == METHOD_NAME_CLINIT
}

/// Index of a class in its [`ClassPool`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ClassId(pub u32);

impl ClassId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A field or method, identified by its class and its index in the class's
/// field or method table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberId {
    pub class: ClassId,
    pub index: u16,
}

impl MemberId {
    pub fn new(class: ClassId, index: u16) -> Self {
        Self { class, index }
    }
}

/// The structure an attribute is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttributeOwner {
    Class,
    Field(u16),
    Method(u16),
    /// Nested attributes of the code attribute of a method
    Code(u16),
    RecordComponent(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttributeId {
    pub class: ClassId,
    pub owner: AttributeOwner,
    pub index: u16,
}

impl AttributeId {
    pub fn new(class: ClassId, owner: AttributeOwner, index: u16) -> Self {
        Self { class, owner, index }
    }
}

/// Anything that can carry a usage mark
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Entity {
    Class(ClassId),
    Field(MemberId),
    Method(MemberId),
    /// Constant pool entry, by JVM (1-based) index
    Constant(ClassId, u16),
    Attribute(AttributeId),
    /// Row of a table attribute (inner classes, bootstrap methods, record
    /// components, nest members, permitted subclasses)
    Entry(AttributeId, u16),
    Kotlin(ClassId, KotlinNodeId),
}

impl Entity {
    /// The class that owns this entity
    pub fn class(&self) -> ClassId {
        match self {
            Entity::Class(class) => *class,
            Entity::Field(member) | Entity::Method(member) => member.class,
            Entity::Constant(class, _) | Entity::Kotlin(class, _) => *class,
            Entity::Attribute(attribute) | Entity::Entry(attribute, _) => attribute.class,
        }
    }

    pub fn is_class_or_member(&self) -> bool {
        matches!(self, Entity::Class(_) | Entity::Field(_) | Entity::Method(_))
    }
}

/// A member of a program class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramMember {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    /// Classes named in the descriptor, in order of appearance
    #[serde(skip)]
    pub referenced_classes: Vec<Option<ClassId>>,
}

impl ProgramMember {
    pub fn new(access_flags: u16, name_index: u16, descriptor_index: u16) -> Self {
        Self {
            access_flags,
            name_index,
            descriptor_index,
            attributes: Vec::new(),
            referenced_classes: Vec::new(),
        }
    }

    pub fn code(&self) -> Option<&CodeAttribute> {
        self.attributes.iter().find_map(|attribute| match &attribute.kind {
            AttributeKind::Code(code) => Some(code),
            _ => None,
        })
    }
}

/// A class whose code is part of the program being shrunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramClass {
    pub access_flags: u16,
    pub constant_pool: ConstantPool,
    pub this_class: u16,
    /// Zero for java/lang/Object and module-info
    #[serde(default)]
    pub super_class: u16,
    #[serde(default)]
    pub interfaces: Vec<u16>,
    #[serde(default)]
    pub fields: Vec<ProgramMember>,
    #[serde(default)]
    pub methods: Vec<ProgramMember>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub kotlin_metadata: Option<KotlinMetadata>,
}

impl ProgramClass {
    pub fn name(&self) -> &str {
        self.constant_pool.class_name(self.this_class).unwrap_or("")
    }

    pub fn super_name(&self) -> Option<&str> {
        self.constant_pool.class_name(self.super_class)
    }

    pub fn member_name(&self, member: &ProgramMember) -> &str {
        self.constant_pool.utf8(member.name_index).unwrap_or("")
    }

    pub fn member_descriptor(&self, member: &ProgramMember) -> &str {
        self.constant_pool.utf8(member.descriptor_index).unwrap_or("")
    }

    pub fn find_method(&self, name: &str, descriptor: &str) -> Option<u16> {
        self.methods
            .iter()
            .position(|m| self.member_name(m) == name && self.member_descriptor(m) == descriptor)
            .map(|i| i as u16)
    }

    pub fn find_field(&self, name: &str, descriptor: &str) -> Option<u16> {
        self.fields
            .iter()
            .position(|f| self.member_name(f) == name && self.member_descriptor(f) == descriptor)
            .map(|i| i as u16)
    }

    /// Superclass, once linked
    pub fn super_class_id(&self) -> Option<ClassId> {
        self.constant_pool.referenced_class(self.super_class)
    }

    /// Resolved interfaces, skipping the ones outside the pool
    pub fn interface_ids(&self) -> Vec<ClassId> {
        self.interfaces
            .iter()
            .filter_map(|&index| self.constant_pool.referenced_class(index))
            .collect()
    }

    /// The attribute list belonging to the given owner, if it exists
    pub fn attributes_of(&self, owner: AttributeOwner) -> Option<&[Attribute]> {
        match owner {
            AttributeOwner::Class => Some(&self.attributes),
            AttributeOwner::Field(index) => self.fields.get(index as usize).map(|f| f.attributes.as_slice()),
            AttributeOwner::Method(index) => self.methods.get(index as usize).map(|m| m.attributes.as_slice()),
            AttributeOwner::Code(index) => self
                .methods
                .get(index as usize)
                .and_then(|m| m.code())
                .map(|code| code.attributes.as_slice()),
            AttributeOwner::RecordComponent(index) => self.attributes.iter().find_map(|attribute| {
                match &attribute.kind {
                    AttributeKind::Record(components) => components
                        .get(index as usize)
                        .map(|component| component.attributes.as_slice()),
                    _ => None,
                }
            }),
        }
    }

    pub fn attribute(&self, id: AttributeId) -> Option<&Attribute> {
        self.attributes_of(id.owner)?.get(id.index as usize)
    }
}

/// A member of a library class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryMember {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
}

/// A precompiled class the program links against; it has no constant pool
/// and is never shrunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryClass {
    pub access_flags: u16,
    pub name: String,
    #[serde(default)]
    pub super_name: Option<String>,
    #[serde(default)]
    pub interface_names: Vec<String>,
    #[serde(default)]
    pub fields: Vec<LibraryMember>,
    #[serde(default)]
    pub methods: Vec<LibraryMember>,
    #[serde(skip)]
    pub super_class: Option<ClassId>,
    #[serde(skip)]
    pub interfaces: Vec<Option<ClassId>>,
}

impl LibraryClass {
    pub fn new(access_flags: u16, name: &str, super_name: Option<&str>) -> Self {
        Self {
            access_flags,
            name: name.to_string(),
            super_name: super_name.map(str::to_string),
            interface_names: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            super_class: None,
            interfaces: Vec::new(),
        }
    }

    pub fn with_interface(mut self, name: &str) -> Self {
        self.interface_names.push(name.to_string());
        self
    }

    pub fn with_field(mut self, access_flags: u16, name: &str, descriptor: &str) -> Self {
        self.fields.push(LibraryMember {
            access_flags,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        });
        self
    }

    pub fn with_method(mut self, access_flags: u16, name: &str, descriptor: &str) -> Self {
        self.methods.push(LibraryMember {
            access_flags,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        });
        self
    }
}

/// Either kind of class in the pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Clazz {
    Program(ProgramClass),
    Library(LibraryClass),
}

impl Clazz {
    pub fn name(&self) -> &str {
        match self {
            Clazz::Program(class) => class.name(),
            Clazz::Library(class) => &class.name,
        }
    }

    pub fn access_flags(&self) -> u16 {
        match self {
            Clazz::Program(class) => class.access_flags,
            Clazz::Library(class) => class.access_flags,
        }
    }

    pub fn is_abstract_or_interface(&self) -> bool {
        self.access_flags() & (access::ABSTRACT | access::INTERFACE) != 0
    }

    pub fn as_program(&self) -> Option<&ProgramClass> {
        match self {
            Clazz::Program(class) => Some(class),
            Clazz::Library(_) => None,
        }
    }

    pub fn as_library(&self) -> Option<&LibraryClass> {
        match self {
            Clazz::Program(_) => None,
            Clazz::Library(class) => Some(class),
        }
    }

    pub fn super_class_id(&self) -> Option<ClassId> {
        match self {
            Clazz::Program(class) => class.super_class_id(),
            Clazz::Library(class) => class.super_class,
        }
    }

    pub fn interface_ids(&self) -> Vec<ClassId> {
        match self {
            Clazz::Program(class) => class.interface_ids(),
            Clazz::Library(class) => class.interfaces.iter().flatten().copied().collect(),
        }
    }

    pub fn field_count(&self) -> usize {
        match self {
            Clazz::Program(class) => class.fields.len(),
            Clazz::Library(class) => class.fields.len(),
        }
    }

    pub fn method_count(&self) -> usize {
        match self {
            Clazz::Program(class) => class.methods.len(),
            Clazz::Library(class) => class.methods.len(),
        }
    }

    pub fn find_method(&self, name: &str, descriptor: &str) -> Option<u16> {
        match self {
            Clazz::Program(class) => class.find_method(name, descriptor),
            Clazz::Library(class) => class
                .methods
                .iter()
                .position(|m| m.name == name && m.descriptor == descriptor)
                .map(|i| i as u16),
        }
    }

    /// Name, descriptor and access flags of a method
    pub fn method_signature(&self, index: u16) -> Option<(&str, &str, u16)> {
        match self {
            Clazz::Program(class) => {
                let method = class.methods.get(index as usize)?;
                Some((class.member_name(method), class.member_descriptor(method), method.access_flags))
            }
            Clazz::Library(class) => {
                let method = class.methods.get(index as usize)?;
                Some((&method.name, &method.descriptor, method.access_flags))
            }
        }
    }

    /// Name, descriptor and access flags of a field
    pub fn field_signature(&self, index: u16) -> Option<(&str, &str, u16)> {
        match self {
            Clazz::Program(class) => {
                let field = class.fields.get(index as usize)?;
                Some((class.member_name(field), class.member_descriptor(field), field.access_flags))
            }
            Clazz::Library(class) => {
                let field = class.fields.get(index as usize)?;
                Some((&field.name, &field.descriptor, field.access_flags))
            }
        }
    }
}

impl From<ProgramClass> for Clazz {
    fn from(class: ProgramClass) -> Self {
        Clazz::Program(class)
    }
}

impl From<LibraryClass> for Clazz {
    fn from(class: LibraryClass) -> Self {
        Clazz::Library(class)
    }
}

/// All classes of a run, linked and indexed
#[derive(Debug)]
pub struct ClassPool {
    classes: Vec<Clazz>,
    by_name: HashMap<String, ClassId>,
    hierarchy: Hierarchy,
}

impl ClassPool {
    /// Index, link and build the hierarchy for the given classes
    pub fn new(mut classes: Vec<Clazz>) -> Self {
        let by_name = linker::link(&mut classes);
        let hierarchy = Hierarchy::build(&classes);

        debug!(
            "Linked class pool: {} classes ({} program)",
            classes.len(),
            classes.iter().filter(|c| c.as_program().is_some()).count()
        );

        Self {
            classes,
            by_name,
            hierarchy,
        }
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn class(&self, id: ClassId) -> Option<&Clazz> {
        self.classes.get(id.index())
    }

    pub fn program_class(&self, id: ClassId) -> Option<&ProgramClass> {
        self.class(id).and_then(Clazz::as_program)
    }

    /// Find a class by internal name (e.g. `com/example/Foo`)
    pub fn find(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClassId, &Clazz)> {
        self.classes
            .iter()
            .enumerate()
            .map(|(i, class)| (ClassId(i as u32), class))
    }

    pub fn program_classes(&self) -> impl Iterator<Item = (ClassId, &ProgramClass)> {
        self.iter()
            .filter_map(|(id, class)| class.as_program().map(|program| (id, program)))
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    /// Human-readable description of an entity, for reports and logs
    pub fn describe(&self, entity: Entity) -> String {
        let class_name = |id: ClassId| {
            self.class(id)
                .map(|class| descriptor::external_class_name(class.name()))
                .unwrap_or_else(|| format!("<class {}>", id.0))
        };

        match entity {
            Entity::Class(id) => class_name(id),
            Entity::Field(member) => match self.class(member.class).and_then(|c| c.field_signature(member.index)) {
                Some((name, desc, _)) => format!(
                    "{}: {} {}",
                    class_name(member.class),
                    descriptor::external_type(desc),
                    name
                ),
                None => format!("{}: <field {}>", class_name(member.class), member.index),
            },
            Entity::Method(member) => match self.class(member.class).and_then(|c| c.method_signature(member.index)) {
                Some((name, desc, _)) => format!(
                    "{}: {}",
                    class_name(member.class),
                    descriptor::external_method(name, desc)
                ),
                None => format!("{}: <method {}>", class_name(member.class), member.index),
            },
            Entity::Constant(id, index) => format!("constant #{} of {}", index, class_name(id)),
            Entity::Attribute(attribute) => {
                format!("{} of {}", self.describe_attribute(attribute), self.describe_owner(attribute))
            }
            Entity::Entry(attribute, row) => format!(
                "entry {} of {} of {}",
                row,
                self.describe_attribute(attribute),
                self.describe_owner(attribute)
            ),
            Entity::Kotlin(id, node) => format!("Kotlin metadata node {} of {}", node.0, class_name(id)),
        }
    }

    fn describe_attribute(&self, attribute: AttributeId) -> String {
        self.program_class(attribute.class)
            .and_then(|class| class.attribute(attribute))
            .map(|a| a.kind.name().to_string())
            .unwrap_or_else(|| format!("attribute {}", attribute.index))
    }

    fn describe_owner(&self, attribute: AttributeId) -> String {
        let class = attribute.class;
        match attribute.owner {
            AttributeOwner::Class => self.describe(Entity::Class(class)),
            AttributeOwner::Field(index) => self.describe(Entity::Field(MemberId::new(class, index))),
            AttributeOwner::Method(index) | AttributeOwner::Code(index) => {
                self.describe(Entity::Method(MemberId::new(class, index)))
            }
            AttributeOwner::RecordComponent(index) => {
                format!("record component {} of {}", index, self.describe(Entity::Class(class)))
            }
        }
    }
}
