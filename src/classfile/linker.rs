// Reference linker
//
// Resolves the symbolic names in a freshly loaded pool to class and member
// ids, and numbers Kotlin metadata nodes. Names that do not resolve leave
// their slot empty; the marker skips empty slots.

use super::constant::{Constant, ConstantPool, RefConstant};
use super::descriptor::{self, classes_in_descriptor, classes_in_signature, kotlin_class_name_to_internal};
use super::kotlin::{
    JvmSignature, KotlinAnnotation, KotlinAnnotationValue, KotlinClassifier, KotlinContract,
    KotlinDeclarationContainer, KotlinEffectExpression, KotlinFunction, KotlinMetadata, KotlinNodeId,
    KotlinProperty, KotlinType, KotlinTypeAlias, KotlinTypeParameter, KotlinValueParameter,
    KotlinVersionRequirement,
};
use super::{
    Annotation, Attribute, AttributeKind, ClassId, Clazz, ElementValue, ElementValueKind, MemberId,
    ProgramClass,
};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Link all classes in place and return the name index
pub(crate) fn link(classes: &mut [Clazz]) -> HashMap<String, ClassId> {
    let by_name = index_names(classes);

    let mut alias_counts = Vec::with_capacity(classes.len());
    for clazz in classes.iter_mut() {
        alias_counts.push(number_type_aliases(clazz));
        resolve_class_names(clazz, &by_name);
    }

    let symbols = Symbols::collect(classes);

    for (i, clazz) in classes.iter_mut().enumerate() {
        if let Clazz::Program(class) = clazz {
            let mut linker = Linker {
                id: ClassId(i as u32),
                by_name: &by_name,
                symbols: &symbols,
                next_node: alias_counts[i] + 1,
            };
            linker.link_program_class(class);
        }
    }

    debug!("Linked {} classes, {} Kotlin type aliases", classes.len(), symbols.type_aliases.len());
    by_name
}

fn index_names(classes: &[Clazz]) -> HashMap<String, ClassId> {
    let mut by_name = HashMap::with_capacity(classes.len());
    for (i, class) in classes.iter().enumerate() {
        let name = class.name();
        if by_name.contains_key(name) {
            warn!("Duplicate class {}, keeping the first definition", name);
            continue;
        }
        by_name.insert(name.to_string(), ClassId(i as u32));
    }
    by_name
}

/// Type aliases can be referenced from other classes, so they are numbered
/// before anything else: the metadata root is node 0, aliases follow
fn number_type_aliases(clazz: &mut Clazz) -> u32 {
    let Clazz::Program(class) = clazz else {
        return 0;
    };
    let Some(declarations) = class.kotlin_metadata.as_mut().and_then(declarations_mut) else {
        return 0;
    };

    let mut count = 0;
    for alias in &mut declarations.type_aliases {
        count += 1;
        alias.id = KotlinNodeId(count);
    }
    count
}

fn declarations_mut(metadata: &mut KotlinMetadata) -> Option<&mut KotlinDeclarationContainer> {
    match metadata {
        KotlinMetadata::Class(m) => Some(&mut m.declarations),
        KotlinMetadata::FileFacade(m) => Some(&mut m.declarations),
        KotlinMetadata::MultiFilePart(m) => Some(&mut m.declarations),
        _ => None,
    }
}

fn resolve_class_names(clazz: &mut Clazz, by_name: &HashMap<String, ClassId>) {
    match clazz {
        Clazz::Program(class) => {
            let pool = &mut class.constant_pool;
            for index in 1..pool.len() as u16 {
                let resolved = pool
                    .class_name(index)
                    .and_then(descriptor::array_element_class)
                    .and_then(|name| by_name.get(name).copied());
                if let Some(Constant::Class { referenced_class, .. }) = pool.get_mut(index) {
                    *referenced_class = resolved;
                }
            }
        }
        Clazz::Library(class) => {
            class.super_class = class
                .super_name
                .as_deref()
                .and_then(|name| by_name.get(name).copied());
            class.interfaces = class
                .interface_names
                .iter()
                .map(|name| by_name.get(name.as_str()).copied())
                .collect();
        }
    }
}

#[derive(Default)]
struct ClassSymbols {
    super_class: Option<ClassId>,
    interfaces: Vec<ClassId>,
    /// name -> [(descriptor, index)]
    fields: HashMap<String, Vec<(String, u16)>>,
    methods: HashMap<String, Vec<(String, u16)>>,
}

impl ClassSymbols {
    fn lookup(table: &HashMap<String, Vec<(String, u16)>>, name: &str, descriptor: &str) -> Option<u16> {
        table
            .get(name)?
            .iter()
            .find(|(d, _)| d == descriptor)
            .map(|(_, index)| *index)
    }
}

/// Member tables of every class, detached from the classes so they can be
/// consulted while a class is being mutated
struct Symbols {
    classes: Vec<ClassSymbols>,
    /// Qualified alias name -> declaring class and node
    type_aliases: HashMap<String, (ClassId, KotlinNodeId)>,
}

impl Symbols {
    fn collect(classes: &[Clazz]) -> Self {
        let mut symbols = Vec::with_capacity(classes.len());
        let mut type_aliases = HashMap::new();

        for (i, clazz) in classes.iter().enumerate() {
            let mut class_symbols = ClassSymbols {
                super_class: clazz.super_class_id(),
                interfaces: clazz.interface_ids(),
                ..Default::default()
            };
            let field_count = match clazz {
                Clazz::Program(c) => c.fields.len(),
                Clazz::Library(c) => c.fields.len(),
            };
            for index in 0..field_count as u16 {
                if let Some((name, desc, _)) = clazz.field_signature(index) {
                    class_symbols
                        .fields
                        .entry(name.to_string())
                        .or_default()
                        .push((desc.to_string(), index));
                }
            }
            for index in 0..clazz.method_count() as u16 {
                if let Some((name, desc, _)) = clazz.method_signature(index) {
                    class_symbols
                        .methods
                        .entry(name.to_string())
                        .or_default()
                        .push((desc.to_string(), index));
                }
            }
            symbols.push(class_symbols);

            if let Some(container) = clazz
                .as_program()
                .and_then(|c| c.kotlin_metadata.as_ref())
                .and_then(KotlinMetadata::declarations)
            {
                let package = clazz.name().rsplit_once('/').map(|(p, _)| p);
                for alias in &container.type_aliases {
                    type_aliases.insert(qualified_alias_name(package, &alias.name), (ClassId(i as u32), alias.id));
                }
            }
        }

        Self {
            classes: symbols,
            type_aliases,
        }
    }

    fn declared_field(&self, class: ClassId, name: &str, descriptor: &str) -> Option<MemberId> {
        let symbols = self.classes.get(class.index())?;
        ClassSymbols::lookup(&symbols.fields, name, descriptor).map(|index| MemberId::new(class, index))
    }

    fn declared_method(&self, class: ClassId, name: &str, descriptor: &str) -> Option<MemberId> {
        let symbols = self.classes.get(class.index())?;
        ClassSymbols::lookup(&symbols.methods, name, descriptor).map(|index| MemberId::new(class, index))
    }

    fn method_by_name(&self, class: ClassId, name: &str) -> Option<MemberId> {
        let symbols = self.classes.get(class.index())?;
        let (_, index) = symbols.methods.get(name)?.first()?;
        Some(MemberId::new(class, *index))
    }

    /// Field resolution: the class, its superinterfaces, then its superclass
    fn field(&self, class: ClassId, name: &str, descriptor: &str) -> Option<MemberId> {
        let mut seen = HashSet::new();
        self.find_field(class, name, descriptor, &mut seen)
    }

    fn find_field(&self, class: ClassId, name: &str, descriptor: &str, seen: &mut HashSet<ClassId>) -> Option<MemberId> {
        if !seen.insert(class) {
            return None;
        }
        if let Some(field) = self.declared_field(class, name, descriptor) {
            return Some(field);
        }
        let symbols = self.classes.get(class.index())?;
        for &interface in &symbols.interfaces {
            if let Some(field) = self.find_field(interface, name, descriptor, seen) {
                return Some(field);
            }
        }
        symbols
            .super_class
            .and_then(|super_class| self.find_field(super_class, name, descriptor, seen))
    }

    /// Method resolution: the class and its superclasses, then all
    /// superinterfaces
    fn method(&self, class: ClassId, name: &str, descriptor: &str) -> Option<MemberId> {
        let mut chain = Vec::new();
        let mut current = Some(class);
        while let Some(c) = current {
            if chain.contains(&c) {
                break;
            }
            if let Some(method) = self.declared_method(c, name, descriptor) {
                return Some(method);
            }
            chain.push(c);
            current = self.classes.get(c.index()).and_then(|s| s.super_class);
        }

        let mut seen = HashSet::new();
        for c in chain {
            let interfaces = self.classes.get(c.index()).map(|s| s.interfaces.as_slice()).unwrap_or_default();
            for &interface in interfaces {
                if let Some(method) = self.find_interface_method(interface, name, descriptor, &mut seen) {
                    return Some(method);
                }
            }
        }
        None
    }

    fn find_interface_method(
        &self,
        class: ClassId,
        name: &str,
        descriptor: &str,
        seen: &mut HashSet<ClassId>,
    ) -> Option<MemberId> {
        if !seen.insert(class) {
            return None;
        }
        if let Some(method) = self.declared_method(class, name, descriptor) {
            return Some(method);
        }
        let symbols = self.classes.get(class.index())?;
        symbols
            .interfaces
            .iter()
            .find_map(|&interface| self.find_interface_method(interface, name, descriptor, seen))
    }
}

fn qualified_alias_name(package: Option<&str>, name: &str) -> String {
    match package {
        Some(package) if !name.contains('/') => format!("{}/{}", package, name),
        _ => name.to_string(),
    }
}

enum ConstantLink {
    None,
    Class(Option<ClassId>),
    Member(Option<ClassId>, Option<MemberId>),
    Classes(Vec<Option<ClassId>>),
}

struct Linker<'a> {
    id: ClassId,
    by_name: &'a HashMap<String, ClassId>,
    symbols: &'a Symbols,
    next_node: u32,
}

impl Linker<'_> {
    fn class(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    fn descriptor_classes(&self, descriptor: &str) -> Vec<Option<ClassId>> {
        classes_in_descriptor(descriptor)
            .into_iter()
            .map(|name| self.class(name))
            .collect()
    }

    fn utf8_descriptor_classes(&self, pool: &ConstantPool, index: u16) -> Vec<Option<ClassId>> {
        pool.utf8(index)
            .map(|descriptor| self.descriptor_classes(descriptor))
            .unwrap_or_default()
    }

    fn link_program_class(&mut self, class: &mut ProgramClass) {
        let ProgramClass {
            constant_pool,
            fields,
            methods,
            attributes,
            kotlin_metadata,
            ..
        } = class;

        self.link_constants(constant_pool);

        for member in fields.iter_mut().chain(methods.iter_mut()) {
            member.referenced_classes = self.utf8_descriptor_classes(constant_pool, member.descriptor_index);
            self.link_attributes(constant_pool, &mut member.attributes);
        }
        self.link_attributes(constant_pool, attributes);

        if let Some(metadata) = kotlin_metadata {
            self.link_kotlin(metadata);
        }
    }

    fn link_constants(&self, pool: &mut ConstantPool) {
        for index in 1..pool.len() as u16 {
            let link = self.constant_link(pool, index);
            let Some(constant) = pool.get_mut(index) else {
                continue;
            };
            match (constant, link) {
                (Constant::String { referenced_class, .. }, ConstantLink::Class(class)) => {
                    *referenced_class = class;
                }
                (
                    Constant::FieldRef(reference) | Constant::MethodRef(reference) | Constant::InterfaceMethodRef(reference),
                    ConstantLink::Member(class, member),
                ) => {
                    reference.referenced_class = class;
                    reference.referenced_member = member;
                }
                (Constant::MethodType { referenced_classes, .. }, ConstantLink::Classes(classes)) => {
                    *referenced_classes = classes;
                }
                (Constant::Dynamic(dynamic) | Constant::InvokeDynamic(dynamic), ConstantLink::Classes(classes)) => {
                    dynamic.referenced_classes = classes;
                }
                _ => {}
            }
        }
    }

    fn constant_link(&self, pool: &ConstantPool, index: u16) -> ConstantLink {
        match pool.get(index) {
            Some(Constant::String { string_index, .. }) => {
                ConstantLink::Class(pool.utf8(*string_index).and_then(|s| self.class_named_by_string(s)))
            }
            Some(Constant::FieldRef(reference)) => self.member_link(pool, reference, false),
            Some(Constant::MethodRef(reference)) | Some(Constant::InterfaceMethodRef(reference)) => {
                self.member_link(pool, reference, true)
            }
            Some(Constant::MethodType { descriptor_index, .. }) => {
                ConstantLink::Classes(self.utf8_descriptor_classes(pool, *descriptor_index))
            }
            Some(Constant::Dynamic(dynamic)) | Some(Constant::InvokeDynamic(dynamic)) => ConstantLink::Classes(
                pool.name_and_type(dynamic.name_and_type_index)
                    .map(|(_, descriptor)| self.descriptor_classes(descriptor))
                    .unwrap_or_default(),
            ),
            _ => ConstantLink::None,
        }
    }

    fn member_link(&self, pool: &ConstantPool, reference: &RefConstant, method: bool) -> ConstantLink {
        let class = pool.referenced_class(reference.class_index);
        let member = match (class, pool.name_and_type(reference.name_and_type_index)) {
            (Some(class), Some((name, descriptor))) if method => self.symbols.method(class, name, descriptor),
            (Some(class), Some((name, descriptor))) => self.symbols.field(class, name, descriptor),
            _ => None,
        };
        ConstantLink::Member(member.map(|m| m.class).or(class), member)
    }

    /// Strings like "com.example.Foo", as passed to Class.forName
    fn class_named_by_string(&self, value: &str) -> Option<ClassId> {
        let looks_like_class = value.contains('.')
            && value
                .chars()
                .all(|c| c.is_alphanumeric() || c == '.' || c == '_' || c == '$');
        if !looks_like_class {
            return None;
        }
        self.class(&descriptor::internal_class_name(value))
    }

    fn link_attributes(&self, pool: &ConstantPool, attributes: &mut [Attribute]) {
        for attribute in attributes {
            match &mut attribute.kind {
                AttributeKind::Code(code) => self.link_attributes(pool, &mut code.attributes),
                AttributeKind::Annotations { annotations, .. } => {
                    for annotation in annotations {
                        self.link_annotation(pool, annotation);
                    }
                }
                AttributeKind::ParameterAnnotations { parameters, .. } => {
                    for annotation in parameters.iter_mut().flatten() {
                        self.link_annotation(pool, annotation);
                    }
                }
                AttributeKind::TypeAnnotations { annotations, .. } => {
                    for type_annotation in annotations {
                        self.link_annotation(pool, &mut type_annotation.annotation);
                    }
                }
                AttributeKind::AnnotationDefault(value) => self.link_element_value(pool, None, value),
                AttributeKind::Signature {
                    signature_index,
                    referenced_classes,
                } => {
                    *referenced_classes = pool
                        .utf8(*signature_index)
                        .map(|signature| {
                            classes_in_signature(signature)
                                .iter()
                                .map(|name| self.class(name))
                                .collect()
                        })
                        .unwrap_or_default();
                }
                AttributeKind::Record(components) => {
                    for component in components {
                        component.referenced_field = match (
                            pool.utf8(component.name_index),
                            pool.utf8(component.descriptor_index),
                        ) {
                            (Some(name), Some(descriptor)) => self.symbols.declared_field(self.id, name, descriptor),
                            _ => None,
                        };
                        self.link_attributes(pool, &mut component.attributes);
                    }
                }
                _ => {}
            }
        }
    }

    fn link_annotation(&self, pool: &ConstantPool, annotation: &mut Annotation) {
        annotation.referenced_classes = self.utf8_descriptor_classes(pool, annotation.type_index);
        let annotation_class = annotation.referenced_classes.first().copied().flatten();
        for element in &mut annotation.elements {
            self.link_element_value(pool, annotation_class, element);
        }
    }

    fn link_element_value(&self, pool: &ConstantPool, annotation_class: Option<ClassId>, element: &mut ElementValue) {
        element.referenced_method = match (annotation_class, pool.utf8(element.element_name_index)) {
            (Some(class), Some(name)) => self.symbols.method_by_name(class, name),
            _ => None,
        };

        match &mut element.value {
            ElementValueKind::Constant { .. } => {}
            ElementValueKind::EnumConstant {
                type_name_index,
                const_name_index,
                referenced_classes,
                referenced_field,
            } => {
                let type_descriptor = pool.utf8(*type_name_index);
                *referenced_classes = type_descriptor
                    .map(|descriptor| self.descriptor_classes(descriptor))
                    .unwrap_or_default();
                *referenced_field = match (
                    referenced_classes.first().copied().flatten(),
                    type_descriptor,
                    pool.utf8(*const_name_index),
                ) {
                    (Some(class), Some(descriptor), Some(name)) => self.symbols.declared_field(class, name, descriptor),
                    _ => None,
                };
            }
            ElementValueKind::Class {
                class_info_index,
                referenced_classes,
            } => {
                *referenced_classes = self.utf8_descriptor_classes(pool, *class_info_index);
            }
            ElementValueKind::Annotation(annotation) => self.link_annotation(pool, annotation),
            ElementValueKind::Array(values) => {
                for value in values {
                    self.link_element_value(pool, annotation_class, value);
                }
            }
        }
    }

    fn number(&mut self, id: &mut KotlinNodeId) {
        *id = KotlinNodeId(self.next_node);
        self.next_node += 1;
    }

    fn kotlin_class(&self, name: &str) -> Option<ClassId> {
        self.class(&kotlin_class_name_to_internal(name))
    }

    fn jvm_method(&self, signature: &Option<JvmSignature>) -> Option<MemberId> {
        let signature = signature.as_ref()?;
        self.symbols.declared_method(self.id, &signature.name, &signature.descriptor)
    }

    fn jvm_field(&self, signature: &Option<JvmSignature>) -> Option<MemberId> {
        let signature = signature.as_ref()?;
        self.symbols.declared_field(self.id, &signature.name, &signature.descriptor)
    }

    fn link_kotlin(&mut self, metadata: &mut KotlinMetadata) {
        match metadata {
            KotlinMetadata::Class(m) => {
                self.link_type_parameters(&mut m.type_parameters);
                self.link_types(&mut m.super_types);
                for constructor in &mut m.constructors {
                    self.number(&mut constructor.id);
                    constructor.referenced_method = self.jvm_method(&constructor.jvm_signature);
                    self.link_value_parameters(&mut constructor.value_parameters);
                    self.link_version_requirements(&mut constructor.version_requirements);
                }
                self.link_declarations(&mut m.declarations);
                if let Some(underlying) = &mut m.underlying_type {
                    self.link_type(underlying);
                }
                self.link_types(&mut m.context_receivers);
                self.link_version_requirements(&mut m.version_requirements);
            }
            KotlinMetadata::FileFacade(m) => self.link_declarations(&mut m.declarations),
            KotlinMetadata::SyntheticClass(m) => {
                for function in &mut m.functions {
                    self.link_function(function);
                }
            }
            KotlinMetadata::MultiFileFacade(m) => {
                m.referenced_part_classes = m
                    .part_class_names
                    .iter()
                    .map(|name| self.kotlin_class(name))
                    .collect();
            }
            KotlinMetadata::MultiFilePart(m) => {
                m.referenced_facade_class = self.kotlin_class(&m.facade_name);
                self.link_declarations(&mut m.declarations);
            }
            KotlinMetadata::Unsupported { .. } => {}
        }
    }

    fn link_declarations(&mut self, declarations: &mut KotlinDeclarationContainer) {
        for function in &mut declarations.functions {
            self.link_function(function);
        }
        for property in declarations
            .properties
            .iter_mut()
            .chain(declarations.local_delegated_properties.iter_mut())
        {
            self.link_property(property);
        }
        for alias in &mut declarations.type_aliases {
            self.link_type_alias(alias);
        }
    }

    fn link_function(&mut self, function: &mut KotlinFunction) {
        self.number(&mut function.id);
        function.referenced_method = self.jvm_method(&function.jvm_signature);
        function.referenced_lambda_class = function
            .lambda_class_origin_name
            .as_deref()
            .and_then(|name| self.kotlin_class(name));
        self.link_type_parameters(&mut function.type_parameters);
        if let Some(receiver) = &mut function.receiver_type {
            self.link_type(receiver);
        }
        self.link_types(&mut function.context_receivers);
        self.link_value_parameters(&mut function.value_parameters);
        if let Some(return_type) = &mut function.return_type {
            self.link_type(return_type);
        }
        for contract in &mut function.contracts {
            self.link_contract(contract);
        }
        self.link_version_requirements(&mut function.version_requirements);
    }

    fn link_property(&mut self, property: &mut KotlinProperty) {
        self.number(&mut property.id);
        property.referenced_backing_field = self.jvm_field(&property.backing_field_signature);
        property.referenced_getter = self.jvm_method(&property.getter_signature);
        property.referenced_setter = self.jvm_method(&property.setter_signature);
        self.link_type_parameters(&mut property.type_parameters);
        if let Some(receiver) = &mut property.receiver_type {
            self.link_type(receiver);
        }
        self.link_types(&mut property.context_receivers);
        self.link_value_parameters(&mut property.setter_parameters);
        if let Some(property_type) = &mut property.property_type {
            self.link_type(property_type);
        }
        self.link_version_requirements(&mut property.version_requirements);
    }

    /// The alias itself was numbered up front
    fn link_type_alias(&mut self, alias: &mut KotlinTypeAlias) {
        self.link_type_parameters(&mut alias.type_parameters);
        if let Some(underlying) = &mut alias.underlying_type {
            self.link_type(underlying);
        }
        if let Some(expanded) = &mut alias.expanded_type {
            self.link_type(expanded);
        }
        self.link_annotations(&mut alias.annotations);
        self.link_version_requirements(&mut alias.version_requirements);
    }

    fn link_types(&mut self, types: &mut [KotlinType]) {
        for kotlin_type in types {
            self.link_type(kotlin_type);
        }
    }

    fn link_type(&mut self, kotlin_type: &mut KotlinType) {
        self.number(&mut kotlin_type.id);
        match &mut kotlin_type.classifier {
            KotlinClassifier::Class { name, referenced_class } => *referenced_class = self.kotlin_class(name),
            KotlinClassifier::TypeAlias { name, referenced_alias } => {
                *referenced_alias = self.symbols.type_aliases.get(name.as_str()).copied();
            }
            KotlinClassifier::TypeParameter { .. } => {}
        }
        for argument in &mut kotlin_type.arguments {
            if let Some(projected) = &mut argument.projected_type {
                self.link_type(projected);
            }
        }
        for nested in [
            kotlin_type.outer_type.as_deref_mut(),
            kotlin_type.abbreviation.as_deref_mut(),
            kotlin_type.flexible_upper_bound.as_deref_mut(),
        ]
        .into_iter()
        .flatten()
        {
            self.link_type(nested);
        }
        self.link_annotations(&mut kotlin_type.annotations);
    }

    fn link_type_parameters(&mut self, parameters: &mut [KotlinTypeParameter]) {
        for parameter in parameters {
            self.number(&mut parameter.id);
            self.link_types(&mut parameter.upper_bounds);
            self.link_annotations(&mut parameter.annotations);
        }
    }

    fn link_value_parameters(&mut self, parameters: &mut [KotlinValueParameter]) {
        for parameter in parameters {
            self.number(&mut parameter.id);
            if let Some(parameter_type) = &mut parameter.parameter_type {
                self.link_type(parameter_type);
            }
            if let Some(vararg) = &mut parameter.vararg_element_type {
                self.link_type(vararg);
            }
        }
    }

    fn link_annotations(&mut self, annotations: &mut [KotlinAnnotation]) {
        for annotation in annotations {
            self.link_annotation_node(annotation);
        }
    }

    fn link_annotation_node(&mut self, annotation: &mut KotlinAnnotation) {
        self.number(&mut annotation.id);
        annotation.referenced_class = self.kotlin_class(&annotation.class_name);
        for argument in &mut annotation.arguments {
            self.link_annotation_value(&mut argument.value);
        }
    }

    fn link_annotation_value(&mut self, value: &mut KotlinAnnotationValue) {
        match value {
            KotlinAnnotationValue::Literal(_) => {}
            KotlinAnnotationValue::ClassRef {
                class_name,
                referenced_class,
            }
            | KotlinAnnotationValue::EnumRef {
                class_name,
                referenced_class,
                ..
            } => *referenced_class = self.kotlin_class(class_name),
            KotlinAnnotationValue::Annotation(annotation) => self.link_annotation_node(annotation),
            KotlinAnnotationValue::Array(values) => {
                for value in values {
                    self.link_annotation_value(value);
                }
            }
        }
    }

    fn link_version_requirements(&mut self, requirements: &mut [KotlinVersionRequirement]) {
        for requirement in requirements {
            self.number(&mut requirement.id);
        }
    }

    fn link_contract(&mut self, contract: &mut KotlinContract) {
        self.number(&mut contract.id);
        for effect in &mut contract.effects {
            self.number(&mut effect.id);
            for argument in &mut effect.constructor_arguments {
                self.link_effect_expression(argument);
            }
            if let Some(conclusion) = &mut effect.conclusion {
                self.link_effect_expression(conclusion);
            }
        }
    }

    fn link_effect_expression(&mut self, expression: &mut KotlinEffectExpression) {
        self.number(&mut expression.id);
        if let Some(instance_type) = &mut expression.is_instance_type {
            self.link_type(instance_type);
        }
        for nested in expression
            .and_arguments
            .iter_mut()
            .chain(expression.or_arguments.iter_mut())
        {
            self.link_effect_expression(nested);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::classfile::kotlin::{KotlinFileFacadeMetadata, KotlinFunction, KotlinTypeAlias};
    use crate::classfile::{access, AttributeKind, ClassPool, Constant, Entity, LibraryClass, MemberId, ProgramClassBuilder};
    use crate::classfile::kotlin::{JvmSignature, KotlinClassifier, KotlinMetadata, KotlinType};

    #[test]
    fn test_method_ref_resolves_to_declaring_superclass() {
        let base = ProgramClassBuilder::new(access::PUBLIC, "a/Base", None)
            .method(access::PUBLIC, "run", "()V")
            .build();
        let mut caller = ProgramClassBuilder::new(access::PUBLIC, "a/Caller", None);
        let index = caller.constant_pool_mut().add_method_ref("a/Sub", "run", "()V");
        let sub = ProgramClassBuilder::new(access::PUBLIC, "a/Sub", Some("a/Base")).build();
        let pool = ClassPool::new(vec![base, caller.build(), sub]);

        let caller = pool.program_class(pool.find("a/Caller").unwrap()).unwrap();
        let base = pool.find("a/Base").unwrap();
        match caller.constant_pool.get(index) {
            Some(Constant::MethodRef(reference)) => {
                assert_eq!(reference.referenced_class, Some(base));
                assert_eq!(reference.referenced_member, Some(MemberId::new(base, 0)));
            }
            other => panic!("unexpected constant {:?}", other),
        }
    }

    #[test]
    fn test_unresolved_names_stay_empty() {
        let mut class = ProgramClassBuilder::new(access::PUBLIC, "a/A", Some("missing/Super"));
        let field = class.constant_pool_mut().add_field_ref("missing/Other", "x", "I");
        let pool = ClassPool::new(vec![class.build()]);
        let a = pool.program_class(pool.find("a/A").unwrap()).unwrap();

        assert_eq!(a.super_class_id(), None);
        match a.constant_pool.get(field) {
            Some(Constant::FieldRef(reference)) => {
                assert!(reference.referenced_class.is_none());
                assert!(reference.referenced_member.is_none());
            }
            other => panic!("unexpected constant {:?}", other),
        }
    }

    #[test]
    fn test_string_naming_a_class_is_linked() {
        let target = ProgramClassBuilder::new(access::PUBLIC, "com/example/Plugin", None).build();
        let mut loader = ProgramClassBuilder::new(access::PUBLIC, "com/example/Loader", None);
        let named = loader.constant_pool_mut().add_string("com.example.Plugin");
        let prose = loader.constant_pool_mut().add_string("hello world");
        let pool = ClassPool::new(vec![target, loader.build()]);
        let loader = pool.program_class(pool.find("com/example/Loader").unwrap()).unwrap();

        assert!(matches!(
            loader.constant_pool.get(named),
            Some(Constant::String { referenced_class: Some(_), .. })
        ));
        assert!(matches!(
            loader.constant_pool.get(prose),
            Some(Constant::String { referenced_class: None, .. })
        ));
    }

    #[test]
    fn test_signature_classes_are_linked() {
        let list = LibraryClass::new(access::PUBLIC | access::INTERFACE, "java/util/List", None);
        let item = ProgramClassBuilder::new(access::PUBLIC, "a/Item", None).build();
        let holder = ProgramClassBuilder::new(access::PUBLIC, "a/Holder", None)
            .attribute(|pool| AttributeKind::Signature {
                signature_index: pool.add_utf8("Ljava/lang/Object;Ljava/lang/Iterable<La/Item;>;Ljava/util/List<La/Item;>;"),
                referenced_classes: vec![],
            })
            .build();
        let pool = ClassPool::new(vec![list.into(), item, holder]);
        let holder = pool.program_class(pool.find("a/Holder").unwrap()).unwrap();
        let item = pool.find("a/Item");

        match &holder.attributes[0].kind {
            AttributeKind::Signature { referenced_classes, .. } => assert_eq!(
                referenced_classes,
                &vec![None, item, None, item, pool.find("java/util/List")]
            ),
            other => panic!("unexpected attribute {:?}", other),
        }
    }

    #[test]
    fn test_library_supertypes_resolve() {
        let object = LibraryClass::new(access::PUBLIC, "java/lang/Object", None);
        let list = LibraryClass::new(access::PUBLIC | access::INTERFACE, "java/util/List", None);
        let array_list =
            LibraryClass::new(access::PUBLIC, "java/util/ArrayList", Some("java/lang/Object")).with_interface("java/util/List");
        let pool = ClassPool::new(vec![object.into(), list.into(), array_list.into()]);
        let array_list = pool.class(pool.find("java/util/ArrayList").unwrap()).unwrap();

        assert_eq!(array_list.super_class_id(), pool.find("java/lang/Object"));
        assert_eq!(array_list.interface_ids(), vec![pool.find("java/util/List").unwrap()]);
    }

    #[test]
    fn test_kotlin_nodes_are_numbered_and_linked() {
        let alias = KotlinTypeAlias {
            name: "Handler".to_string(),
            expanded_type: Some(KotlinType::class("a/Target")),
            ..Default::default()
        };
        let function = KotlinFunction {
            name: "handle".to_string(),
            jvm_signature: Some(JvmSignature::new("handle", "()V")),
            return_type: Some(KotlinType {
                classifier: KotlinClassifier::TypeAlias {
                    name: "a/Handler".to_string(),
                    referenced_alias: None,
                },
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut facade = KotlinFileFacadeMetadata::default();
        facade.declarations.type_aliases.push(alias);
        facade.declarations.functions.push(function);

        let target = ProgramClassBuilder::new(access::PUBLIC, "a/Target", None).build();
        let file = ProgramClassBuilder::new(access::PUBLIC | access::FINAL, "a/HandlersKt", None)
            .method(access::PUBLIC | access::STATIC, "handle", "()V")
            .kotlin_metadata(KotlinMetadata::FileFacade(facade))
            .build();
        let pool = ClassPool::new(vec![target, file]);
        let file_id = pool.find("a/HandlersKt").unwrap();
        let file = pool.program_class(file_id).unwrap();

        let Some(KotlinMetadata::FileFacade(facade)) = &file.kotlin_metadata else {
            panic!("missing metadata");
        };
        let alias = &facade.declarations.type_aliases[0];
        let function = &facade.declarations.functions[0];
        assert_eq!(alias.id.0, 1);
        assert!(function.id.0 > 1);
        assert_eq!(function.referenced_method, Some(MemberId::new(file_id, 0)));
        match &function.return_type.as_ref().unwrap().classifier {
            KotlinClassifier::TypeAlias { referenced_alias, .. } => {
                assert_eq!(*referenced_alias, Some((file_id, alias.id)));
            }
            other => panic!("unexpected classifier {:?}", other),
        }
        assert_ne!(Entity::Kotlin(file_id, alias.id), Entity::Kotlin(file_id, function.id));
    }
}
