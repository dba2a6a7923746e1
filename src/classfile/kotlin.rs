// Kotlin compiler metadata attached to classes
//
// This is the decoded form of the @kotlin.Metadata annotation. Class names use
// Kotlin's notation (`com/example/Outer.Inner`); the linker maps them to pool
// classes. Every node the marker can mark carries a `KotlinNodeId`, numbered
// per class by the linker.

use super::{ClassId, MemberId};
use serde::{Deserialize, Serialize};

/// Node number, unique within the metadata of one class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct KotlinNodeId(pub u32);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KotlinMetadata {
    Class(KotlinClassMetadata),
    FileFacade(KotlinFileFacadeMetadata),
    SyntheticClass(KotlinSyntheticClassMetadata),
    MultiFileFacade(KotlinMultiFileFacadeMetadata),
    MultiFilePart(KotlinMultiFilePartMetadata),
    /// A metadata kind this model does not describe
    Unsupported {
        kind: u32,
        #[serde(skip)]
        id: KotlinNodeId,
    },
}

impl KotlinMetadata {
    pub fn id(&self) -> KotlinNodeId {
        match self {
            KotlinMetadata::Class(m) => m.id,
            KotlinMetadata::FileFacade(m) => m.id,
            KotlinMetadata::SyntheticClass(m) => m.id,
            KotlinMetadata::MultiFileFacade(m) => m.id,
            KotlinMetadata::MultiFilePart(m) => m.id,
            KotlinMetadata::Unsupported { id, .. } => *id,
        }
    }

    /// The `k` field of @kotlin.Metadata
    pub fn kind(&self) -> u32 {
        match self {
            KotlinMetadata::Class(_) => 1,
            KotlinMetadata::FileFacade(_) => 2,
            KotlinMetadata::SyntheticClass(_) => 3,
            KotlinMetadata::MultiFileFacade(_) => 4,
            KotlinMetadata::MultiFilePart(_) => 5,
            KotlinMetadata::Unsupported { kind, .. } => *kind,
        }
    }

    /// Functions, properties and type aliases, for the kinds that declare them
    pub fn declarations(&self) -> Option<&KotlinDeclarationContainer> {
        match self {
            KotlinMetadata::Class(m) => Some(&m.declarations),
            KotlinMetadata::FileFacade(m) => Some(&m.declarations),
            KotlinMetadata::MultiFilePart(m) => Some(&m.declarations),
            _ => None,
        }
    }
}

/// JVM name and descriptor of the member backing a declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JvmSignature {
    pub name: String,
    pub descriptor: String,
}

impl JvmSignature {
    pub fn new(name: &str, descriptor: &str) -> Self {
        Self {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }
    }
}

/// Declarations shared by classes, file facades and multi-file parts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KotlinDeclarationContainer {
    pub functions: Vec<KotlinFunction>,
    pub properties: Vec<KotlinProperty>,
    pub type_aliases: Vec<KotlinTypeAlias>,
    pub local_delegated_properties: Vec<KotlinProperty>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KotlinClassMetadata {
    #[serde(skip)]
    pub id: KotlinNodeId,
    pub class_name: String,
    pub type_parameters: Vec<KotlinTypeParameter>,
    pub super_types: Vec<KotlinType>,
    pub constructors: Vec<KotlinConstructor>,
    pub declarations: KotlinDeclarationContainer,
    /// Underlying type of an inline class
    pub underlying_type: Option<KotlinType>,
    pub context_receivers: Vec<KotlinType>,
    pub version_requirements: Vec<KotlinVersionRequirement>,
    pub companion_object_name: Option<String>,
    pub nested_class_names: Vec<String>,
    pub sealed_subclass_names: Vec<String>,
    pub enum_entry_names: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KotlinFileFacadeMetadata {
    #[serde(skip)]
    pub id: KotlinNodeId,
    pub declarations: KotlinDeclarationContainer,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KotlinSyntheticFlavor {
    Lambda,
    WhenMappings,
    #[default]
    Regular,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KotlinSyntheticClassMetadata {
    #[serde(skip)]
    pub id: KotlinNodeId,
    pub flavor: KotlinSyntheticFlavor,
    pub functions: Vec<KotlinFunction>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KotlinMultiFileFacadeMetadata {
    #[serde(skip)]
    pub id: KotlinNodeId,
    pub part_class_names: Vec<String>,
    #[serde(skip)]
    pub referenced_part_classes: Vec<Option<ClassId>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KotlinMultiFilePartMetadata {
    #[serde(skip)]
    pub id: KotlinNodeId,
    pub facade_name: String,
    #[serde(skip)]
    pub referenced_facade_class: Option<ClassId>,
    pub declarations: KotlinDeclarationContainer,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KotlinFunction {
    #[serde(skip)]
    pub id: KotlinNodeId,
    pub name: String,
    pub jvm_signature: Option<JvmSignature>,
    #[serde(skip)]
    pub referenced_method: Option<MemberId>,
    pub type_parameters: Vec<KotlinTypeParameter>,
    pub receiver_type: Option<KotlinType>,
    pub context_receivers: Vec<KotlinType>,
    pub value_parameters: Vec<KotlinValueParameter>,
    pub return_type: Option<KotlinType>,
    pub contracts: Vec<KotlinContract>,
    pub version_requirements: Vec<KotlinVersionRequirement>,
    /// Class holding the lambda this function was compiled from
    pub lambda_class_origin_name: Option<String>,
    #[serde(skip)]
    pub referenced_lambda_class: Option<ClassId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KotlinConstructor {
    #[serde(skip)]
    pub id: KotlinNodeId,
    pub jvm_signature: Option<JvmSignature>,
    #[serde(skip)]
    pub referenced_method: Option<MemberId>,
    pub value_parameters: Vec<KotlinValueParameter>,
    pub version_requirements: Vec<KotlinVersionRequirement>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KotlinProperty {
    #[serde(skip)]
    pub id: KotlinNodeId,
    pub name: String,
    pub type_parameters: Vec<KotlinTypeParameter>,
    pub receiver_type: Option<KotlinType>,
    pub context_receivers: Vec<KotlinType>,
    pub setter_parameters: Vec<KotlinValueParameter>,
    #[serde(rename = "type")]
    pub property_type: Option<KotlinType>,
    pub backing_field_signature: Option<JvmSignature>,
    pub getter_signature: Option<JvmSignature>,
    pub setter_signature: Option<JvmSignature>,
    #[serde(skip)]
    pub referenced_backing_field: Option<MemberId>,
    #[serde(skip)]
    pub referenced_getter: Option<MemberId>,
    #[serde(skip)]
    pub referenced_setter: Option<MemberId>,
    pub version_requirements: Vec<KotlinVersionRequirement>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KotlinTypeAlias {
    #[serde(skip)]
    pub id: KotlinNodeId,
    pub name: String,
    pub type_parameters: Vec<KotlinTypeParameter>,
    pub underlying_type: Option<KotlinType>,
    pub expanded_type: Option<KotlinType>,
    pub annotations: Vec<KotlinAnnotation>,
    pub version_requirements: Vec<KotlinVersionRequirement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KotlinClassifier {
    Class {
        name: String,
        #[serde(skip)]
        referenced_class: Option<ClassId>,
    },
    /// Refers to a type parameter by its Kotlin id
    TypeParameter { parameter_id: u32 },
    TypeAlias {
        name: String,
        /// Declaring class and node of the alias
        #[serde(skip)]
        referenced_alias: Option<(ClassId, KotlinNodeId)>,
    },
}

impl Default for KotlinClassifier {
    fn default() -> Self {
        KotlinClassifier::Class {
            name: "kotlin/Any".to_string(),
            referenced_class: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KotlinType {
    #[serde(skip)]
    pub id: KotlinNodeId,
    pub classifier: KotlinClassifier,
    pub arguments: Vec<KotlinTypeProjection>,
    pub outer_type: Option<Box<KotlinType>>,
    pub abbreviation: Option<Box<KotlinType>>,
    pub flexible_upper_bound: Option<Box<KotlinType>>,
    pub annotations: Vec<KotlinAnnotation>,
    pub nullable: bool,
}

impl KotlinType {
    pub fn class(name: &str) -> Self {
        Self {
            classifier: KotlinClassifier::Class {
                name: name.to_string(),
                referenced_class: None,
            },
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KotlinVariance {
    #[default]
    Invariant,
    In,
    Out,
}

/// A type argument; `None` stands for the star projection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KotlinTypeProjection {
    pub variance: KotlinVariance,
    #[serde(rename = "type")]
    pub projected_type: Option<KotlinType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KotlinTypeParameter {
    #[serde(skip)]
    pub id: KotlinNodeId,
    pub parameter_id: u32,
    pub name: String,
    pub variance: KotlinVariance,
    pub upper_bounds: Vec<KotlinType>,
    pub annotations: Vec<KotlinAnnotation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KotlinValueParameter {
    #[serde(skip)]
    pub id: KotlinNodeId,
    pub name: String,
    #[serde(rename = "type")]
    pub parameter_type: Option<KotlinType>,
    pub vararg_element_type: Option<KotlinType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KotlinAnnotation {
    #[serde(skip)]
    pub id: KotlinNodeId,
    pub class_name: String,
    #[serde(skip)]
    pub referenced_class: Option<ClassId>,
    pub arguments: Vec<KotlinAnnotationArgument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KotlinAnnotationArgument {
    pub name: String,
    pub value: KotlinAnnotationValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KotlinAnnotationValue {
    Literal(String),
    ClassRef {
        class_name: String,
        #[serde(skip)]
        referenced_class: Option<ClassId>,
    },
    EnumRef {
        class_name: String,
        entry_name: String,
        #[serde(skip)]
        referenced_class: Option<ClassId>,
    },
    Annotation(KotlinAnnotation),
    Array(Vec<KotlinAnnotationValue>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KotlinVersionKind {
    #[default]
    LanguageVersion,
    CompilerVersion,
    ApiVersion,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KotlinVersionRequirement {
    #[serde(skip)]
    pub id: KotlinNodeId,
    pub kind: KotlinVersionKind,
    pub version: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KotlinContract {
    #[serde(skip)]
    pub id: KotlinNodeId,
    pub effects: Vec<KotlinEffect>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KotlinEffectType {
    #[default]
    ReturnsConstant,
    Calls,
    ReturnsNotNull,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KotlinEffect {
    #[serde(skip)]
    pub id: KotlinNodeId,
    pub effect_type: KotlinEffectType,
    pub constructor_arguments: Vec<KotlinEffectExpression>,
    pub conclusion: Option<KotlinEffectExpression>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KotlinEffectExpression {
    #[serde(skip)]
    pub id: KotlinNodeId,
    pub parameter_index: Option<u32>,
    pub constant_value: Option<String>,
    pub negated: bool,
    /// Type checked by an `is` expression
    pub is_instance_type: Option<KotlinType>,
    pub and_arguments: Vec<KotlinEffectExpression>,
    pub or_arguments: Vec<KotlinEffectExpression>,
}
