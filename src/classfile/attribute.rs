// Class, member and code attributes
//
// Every attribute kind the marker knows about is a variant of `AttributeKind`;
// anything else is kept as `Unknown` with its raw bytes.

use super::{ClassId, Instruction, MemberId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Utf8 constant holding the attribute name
    pub name_index: u16,
    pub kind: AttributeKind,
}

impl Attribute {
    pub fn new(name_index: u16, kind: AttributeKind) -> Self {
        Self { name_index, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Unknown {
        #[serde(default)]
        info: Vec<u8>,
    },
    BootstrapMethods(Vec<BootstrapMethod>),
    SourceFile {
        source_file_index: u16,
    },
    SourceDir {
        source_dir_index: u16,
    },
    InnerClasses(Vec<InnerClassesInfo>),
    EnclosingMethod {
        class_index: u16,
        /// Zero outside of a method
        method_index: u16,
    },
    NestHost {
        host_class_index: u16,
    },
    NestMembers(Vec<u16>),
    PermittedSubclasses(Vec<u16>),
    Deprecated,
    Synthetic,
    Signature {
        signature_index: u16,
        /// Classes named anywhere in the generic signature
        #[serde(skip)]
        referenced_classes: Vec<Option<ClassId>>,
    },
    ConstantValue {
        constant_value_index: u16,
    },
    MethodParameters(Vec<ParameterInfo>),
    Exceptions(Vec<u16>),
    Code(CodeAttribute),
    StackMap(Vec<StackMapFrame>),
    StackMapTable(Vec<StackMapFrame>),
    LineNumberTable(Vec<LineNumberInfo>),
    LocalVariableTable(Vec<LocalVariableInfo>),
    LocalVariableTypeTable(Vec<LocalVariableTypeInfo>),
    Annotations {
        visible: bool,
        annotations: Vec<Annotation>,
    },
    ParameterAnnotations {
        visible: bool,
        parameters: Vec<Vec<Annotation>>,
    },
    TypeAnnotations {
        visible: bool,
        annotations: Vec<TypeAnnotation>,
    },
    AnnotationDefault(ElementValue),
    Module(ModuleAttribute),
    ModuleMainClass {
        main_class_index: u16,
    },
    ModulePackages(Vec<u16>),
    Record(Vec<RecordComponentInfo>),
}

impl AttributeKind {
    /// The attribute name as it appears in a class file
    pub fn name(&self) -> &'static str {
        match self {
            AttributeKind::Unknown { .. } => "Unknown",
            AttributeKind::BootstrapMethods(_) => "BootstrapMethods",
            AttributeKind::SourceFile { .. } => "SourceFile",
            AttributeKind::SourceDir { .. } => "SourceDir",
            AttributeKind::InnerClasses(_) => "InnerClasses",
            AttributeKind::EnclosingMethod { .. } => "EnclosingMethod",
            AttributeKind::NestHost { .. } => "NestHost",
            AttributeKind::NestMembers(_) => "NestMembers",
            AttributeKind::PermittedSubclasses(_) => "PermittedSubclasses",
            AttributeKind::Deprecated => "Deprecated",
            AttributeKind::Synthetic => "Synthetic",
            AttributeKind::Signature { .. } => "Signature",
            AttributeKind::ConstantValue { .. } => "ConstantValue",
            AttributeKind::MethodParameters(_) => "MethodParameters",
            AttributeKind::Exceptions(_) => "Exceptions",
            AttributeKind::Code(_) => "Code",
            AttributeKind::StackMap(_) => "StackMap",
            AttributeKind::StackMapTable(_) => "StackMapTable",
            AttributeKind::LineNumberTable(_) => "LineNumberTable",
            AttributeKind::LocalVariableTable(_) => "LocalVariableTable",
            AttributeKind::LocalVariableTypeTable(_) => "LocalVariableTypeTable",
            AttributeKind::Annotations { visible: true, .. } => "RuntimeVisibleAnnotations",
            AttributeKind::Annotations { visible: false, .. } => "RuntimeInvisibleAnnotations",
            AttributeKind::ParameterAnnotations { visible: true, .. } => "RuntimeVisibleParameterAnnotations",
            AttributeKind::ParameterAnnotations { visible: false, .. } => "RuntimeInvisibleParameterAnnotations",
            AttributeKind::TypeAnnotations { visible: true, .. } => "RuntimeVisibleTypeAnnotations",
            AttributeKind::TypeAnnotations { visible: false, .. } => "RuntimeInvisibleTypeAnnotations",
            AttributeKind::AnnotationDefault(_) => "AnnotationDefault",
            AttributeKind::Module(_) => "Module",
            AttributeKind::ModuleMainClass { .. } => "ModuleMainClass",
            AttributeKind::ModulePackages(_) => "ModulePackages",
            AttributeKind::Record(_) => "Record",
        }
    }

    /// Attributes that only carry debugging information
    pub fn is_debug_info(&self) -> bool {
        matches!(
            self,
            AttributeKind::SourceFile { .. }
                | AttributeKind::SourceDir { .. }
                | AttributeKind::LineNumberTable(_)
                | AttributeKind::LocalVariableTable(_)
                | AttributeKind::LocalVariableTypeTable(_)
                | AttributeKind::MethodParameters(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapMethod {
    pub method_handle_index: u16,
    #[serde(default)]
    pub arguments: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InnerClassesInfo {
    pub inner_class_index: u16,
    #[serde(default)]
    pub outer_class_index: u16,
    #[serde(default)]
    pub inner_name_index: u16,
    #[serde(default)]
    pub inner_class_access_flags: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterInfo {
    /// Zero for a nameless parameter
    pub name_index: u16,
    #[serde(default)]
    pub access_flags: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeAttribute {
    #[serde(default)]
    pub max_stack: u16,
    #[serde(default)]
    pub max_locals: u16,
    pub instructions: Vec<Instruction>,
    #[serde(default)]
    pub exception_table: Vec<ExceptionInfo>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    /// Zero for a catch-all handler
    pub catch_type: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackMapFrame {
    pub frame_type: u8,
    #[serde(default)]
    pub offset_delta: u16,
    #[serde(default)]
    pub locals: Vec<VerificationType>,
    #[serde(default)]
    pub stack: Vec<VerificationType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationType {
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,
    UninitializedThis,
    Object { class_index: u16 },
    Uninitialized { offset: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineNumberInfo {
    pub start_pc: u16,
    pub line_number: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalVariableInfo {
    pub start_pc: u16,
    pub length: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub index: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalVariableTypeInfo {
    pub start_pc: u16,
    pub length: u16,
    pub name_index: u16,
    pub signature_index: u16,
    pub index: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Utf8 constant holding the annotation type descriptor
    pub type_index: u16,
    #[serde(default)]
    pub elements: Vec<ElementValue>,
    #[serde(skip)]
    pub referenced_classes: Vec<Option<ClassId>>,
}

impl Annotation {
    pub fn new(type_index: u16) -> Self {
        Self {
            type_index,
            elements: Vec::new(),
            referenced_classes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeAnnotation {
    pub target_type: u8,
    pub annotation: Annotation,
}

/// A named (or, inside arrays and defaults, unnamed) annotation value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementValue {
    /// Zero when the value has no name
    #[serde(default)]
    pub element_name_index: u16,
    pub value: ElementValueKind,
    /// Annotation interface method this element sets
    #[serde(skip)]
    pub referenced_method: Option<MemberId>,
}

impl ElementValue {
    pub fn new(element_name_index: u16, value: ElementValueKind) -> Self {
        Self {
            element_name_index,
            value,
            referenced_method: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementValueKind {
    Constant {
        tag: char,
        const_value_index: u16,
    },
    EnumConstant {
        type_name_index: u16,
        const_name_index: u16,
        #[serde(skip)]
        referenced_classes: Vec<Option<ClassId>>,
        #[serde(skip)]
        referenced_field: Option<MemberId>,
    },
    Class {
        class_info_index: u16,
        #[serde(skip)]
        referenced_classes: Vec<Option<ClassId>>,
    },
    Annotation(Box<Annotation>),
    Array(Vec<ElementValue>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleAttribute {
    pub module_name_index: u16,
    #[serde(default)]
    pub module_flags: u16,
    #[serde(default)]
    pub module_version_index: u16,
    #[serde(default)]
    pub requires: Vec<RequiresInfo>,
    #[serde(default)]
    pub exports: Vec<ExportsInfo>,
    #[serde(default)]
    pub opens: Vec<OpensInfo>,
    /// Class constants of used services
    #[serde(default)]
    pub uses: Vec<u16>,
    #[serde(default)]
    pub provides: Vec<ProvidesInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiresInfo {
    pub requires_index: u16,
    #[serde(default)]
    pub requires_flags: u16,
    #[serde(default)]
    pub requires_version_index: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportsInfo {
    pub exports_index: u16,
    #[serde(default)]
    pub exports_flags: u16,
    #[serde(default)]
    pub exports_to: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpensInfo {
    pub opens_index: u16,
    #[serde(default)]
    pub opens_flags: u16,
    #[serde(default)]
    pub opens_to: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvidesInfo {
    pub provides_index: u16,
    pub provides_with: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordComponentInfo {
    pub name_index: u16,
    pub descriptor_index: u16,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    /// The private field backing this component
    #[serde(skip)]
    pub referenced_field: Option<MemberId>,
}
