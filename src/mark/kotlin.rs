// Usage marking of Kotlin metadata
//
// Declarations are anchored on their JVM members: a function or property is
// kept when the method or field backing it is used. Everything else in the
// metadata hangs off those declarations or off the metadata root.

use super::class_marker::ClassUsageMarker;
use super::usage_mark::Reason;
use super::{MarkError, UsageMarker};
use crate::classfile::descriptor::external_class_name;
use crate::classfile::kotlin::{
    KotlinAnnotation, KotlinAnnotationValue, KotlinClassMetadata, KotlinClassifier, KotlinConstructor,
    KotlinContract, KotlinDeclarationContainer, KotlinEffect, KotlinEffectExpression, KotlinFileFacadeMetadata,
    KotlinFunction, KotlinMetadata, KotlinMultiFileFacadeMetadata, KotlinMultiFilePartMetadata, KotlinNodeId,
    KotlinProperty, KotlinSyntheticClassMetadata, KotlinType, KotlinTypeAlias, KotlinTypeParameter,
    KotlinValueParameter, KotlinVersionRequirement,
};
use crate::classfile::{ClassId, Entity, MemberId, ProgramClass};
use tracing::trace;

/// Marks the metadata nodes of one class
pub struct KotlinUsageMarker<'m, 'p, M: UsageMarker> {
    outer: &'m mut ClassUsageMarker<'p, M>,
    class: ClassId,
    program: &'p ProgramClass,
}

impl<'p, M: UsageMarker> ClassUsageMarker<'p, M> {
    /// Mark whatever the Kotlin metadata of a used class currently needs
    pub fn mark_kotlin_metadata(&mut self, id: ClassId, class: &'p ProgramClass) -> Result<(), MarkError> {
        match &class.kotlin_metadata {
            Some(metadata) => KotlinUsageMarker::new(self, id, class).visit_kotlin_metadata(metadata),
            None => Ok(()),
        }
    }

    /// Mark a type alias, declared in the metadata of another class
    pub(super) fn mark_kotlin_type_alias(&mut self, id: ClassId, node: KotlinNodeId) -> Result<(), MarkError> {
        let pool = self.pool;
        let Some(program) = pool.program_class(id) else {
            return Ok(());
        };
        let alias = program
            .kotlin_metadata
            .as_ref()
            .and_then(KotlinMetadata::declarations)
            .and_then(|declarations| declarations.type_aliases.iter().find(|alias| alias.id == node));

        match alias {
            Some(alias) => KotlinUsageMarker::new(self, id, program).visit_type_alias(alias),
            None => Ok(()),
        }
    }

    /// Synthetic lambda metadata is only kept along with its class
    fn mark_lambda_metadata(&mut self, id: ClassId) -> Result<(), MarkError> {
        if !self.marker.is_used(Entity::Class(id)) {
            return Ok(());
        }
        let pool = self.pool;
        let Some(program) = pool.program_class(id) else {
            return Ok(());
        };
        match &program.kotlin_metadata {
            Some(KotlinMetadata::SyntheticClass(metadata)) => {
                KotlinUsageMarker::new(self, id, program).visit_kotlin_synthetic_class_metadata(metadata)
            }
            _ => Ok(()),
        }
    }
}

impl<'m, 'p, M: UsageMarker> KotlinUsageMarker<'m, 'p, M> {
    pub fn new(outer: &'m mut ClassUsageMarker<'p, M>, class: ClassId, program: &'p ProgramClass) -> Self {
        Self { outer, class, program }
    }

    fn entity(&self, node: KotlinNodeId) -> Entity {
        Entity::Kotlin(self.class, node)
    }

    /// Mark a node; true when its children should be walked
    fn mark(&mut self, node: KotlinNodeId) -> bool {
        let entity = self.entity(node);
        if !self.outer.marker.should_be_marked_as_used(entity) {
            return false;
        }
        self.outer.marker.mark_as_used(entity);
        true
    }

    fn with_reason<R>(&mut self, reason: Reason, producer: Entity, f: impl FnOnce(&mut Self) -> R) -> R {
        if !self.outer.explain {
            return f(self);
        }
        let scope = self.outer.marker.enter(reason, Some(producer));
        let result = f(self);
        self.outer.marker.leave(scope);
        result
    }

    fn visit_class_reference(&mut self, node: KotlinNodeId, class: Option<ClassId>) -> Result<(), MarkError> {
        match class {
            Some(class) => {
                let producer = self.entity(node);
                self.outer.reasoned(Reason::KotlinMetadata, producer, |m| m.visit_class(class))
            }
            None => Ok(()),
        }
    }

    fn used_method(&self, method: Option<MemberId>) -> Option<Entity> {
        method
            .map(Entity::Method)
            .filter(|&entity| self.outer.marker.is_used(entity))
    }

    /// The first used JVM member backing a property
    fn used_property_member(&self, property: &KotlinProperty) -> Option<Entity> {
        property
            .referenced_backing_field
            .map(Entity::Field)
            .into_iter()
            .chain(property.referenced_getter.map(Entity::Method))
            .chain(property.referenced_setter.map(Entity::Method))
            .find(|&entity| self.outer.marker.is_used(entity))
    }

    pub fn visit_kotlin_metadata(&mut self, metadata: &'p KotlinMetadata) -> Result<(), MarkError> {
        match metadata {
            KotlinMetadata::Class(m) => self.visit_kotlin_class_metadata(m),
            KotlinMetadata::FileFacade(m) => self.visit_kotlin_file_facade_metadata(m),
            KotlinMetadata::SyntheticClass(m) => self.visit_kotlin_synthetic_class_metadata(m),
            KotlinMetadata::MultiFileFacade(m) => self.visit_kotlin_multi_file_facade_metadata(m),
            KotlinMetadata::MultiFilePart(m) => self.visit_kotlin_multi_file_part_metadata(m),
            KotlinMetadata::Unsupported { kind, .. } => Err(MarkError::UnsupportedKotlinMetadata {
                class: external_class_name(self.program.name()),
                kind: *kind,
            }),
        }
    }

    pub fn visit_kotlin_class_metadata(&mut self, metadata: &'p KotlinClassMetadata) -> Result<(), MarkError> {
        if self.mark(metadata.id) {
            trace!("Marking Kotlin class metadata of {}", self.program.name());
            self.visit_type_parameters(&metadata.type_parameters)?;
            for super_type in &metadata.super_types {
                self.visit_type(super_type)?;
            }
            if let Some(underlying) = &metadata.underlying_type {
                self.visit_type(underlying)?;
            }
            for receiver in &metadata.context_receivers {
                self.visit_type(receiver)?;
            }
            self.visit_version_requirements(&metadata.version_requirements);
        }

        for constructor in &metadata.constructors {
            if let Some(anchor) = self.used_method(constructor.referenced_method) {
                self.with_reason(Reason::DeclaredBy, anchor, |k| k.visit_constructor(constructor))?;
            }
        }
        self.visit_declaration_container(&metadata.declarations)
    }

    pub fn visit_kotlin_file_facade_metadata(&mut self, metadata: &'p KotlinFileFacadeMetadata) -> Result<(), MarkError> {
        self.mark(metadata.id);
        self.visit_declaration_container(&metadata.declarations)
    }

    pub fn visit_kotlin_synthetic_class_metadata(
        &mut self,
        metadata: &'p KotlinSyntheticClassMetadata,
    ) -> Result<(), MarkError> {
        if self.mark(metadata.id) {
            for function in &metadata.functions {
                self.visit_function(function)?;
            }
        }
        Ok(())
    }

    /// Parts that are used keep their own metadata
    pub fn visit_kotlin_multi_file_facade_metadata(
        &mut self,
        metadata: &'p KotlinMultiFileFacadeMetadata,
    ) -> Result<(), MarkError> {
        self.mark(metadata.id);
        for part in metadata.referenced_part_classes.iter().flatten().copied() {
            if part == self.class || !self.outer.marker.is_used(Entity::Class(part)) {
                continue;
            }
            let pool = self.outer.pool;
            if let Some(program) = pool.program_class(part) {
                self.outer.mark_kotlin_metadata(part, program)?;
            }
        }
        Ok(())
    }

    pub fn visit_kotlin_multi_file_part_metadata(
        &mut self,
        metadata: &'p KotlinMultiFilePartMetadata,
    ) -> Result<(), MarkError> {
        if self.mark(metadata.id) {
            self.visit_class_reference(metadata.id, metadata.referenced_facade_class)?;
        }
        self.visit_declaration_container(&metadata.declarations)
    }

    fn visit_declaration_container(&mut self, declarations: &'p KotlinDeclarationContainer) -> Result<(), MarkError> {
        for function in &declarations.functions {
            if let Some(anchor) = self.used_method(function.referenced_method) {
                self.with_reason(Reason::DeclaredBy, anchor, |k| k.visit_function(function))?;
            }
        }
        for property in &declarations.properties {
            if let Some(anchor) = self.used_property_member(property) {
                self.with_reason(Reason::DeclaredBy, anchor, |k| k.visit_property(property))?;
            }
        }
        // Local delegated properties have no JVM members of their own
        for property in &declarations.local_delegated_properties {
            self.visit_property(property)?;
        }
        Ok(())
    }

    pub fn visit_function(&mut self, function: &'p KotlinFunction) -> Result<(), MarkError> {
        if !self.mark(function.id) {
            return Ok(());
        }
        self.visit_type_parameters(&function.type_parameters)?;
        if let Some(receiver) = &function.receiver_type {
            self.visit_type(receiver)?;
        }
        for receiver in &function.context_receivers {
            self.visit_type(receiver)?;
        }
        self.visit_value_parameters(&function.value_parameters)?;
        if let Some(return_type) = &function.return_type {
            self.visit_type(return_type)?;
        }
        for contract in &function.contracts {
            self.visit_contract(contract)?;
        }
        self.visit_version_requirements(&function.version_requirements);

        if let Some(lambda) = function.referenced_lambda_class {
            self.outer.mark_lambda_metadata(lambda)?;
        }
        Ok(())
    }

    pub fn visit_constructor(&mut self, constructor: &'p KotlinConstructor) -> Result<(), MarkError> {
        if self.mark(constructor.id) {
            self.visit_value_parameters(&constructor.value_parameters)?;
            self.visit_version_requirements(&constructor.version_requirements);
        }
        Ok(())
    }

    pub fn visit_property(&mut self, property: &'p KotlinProperty) -> Result<(), MarkError> {
        if !self.mark(property.id) {
            return Ok(());
        }
        self.visit_type_parameters(&property.type_parameters)?;
        if let Some(receiver) = &property.receiver_type {
            self.visit_type(receiver)?;
        }
        for receiver in &property.context_receivers {
            self.visit_type(receiver)?;
        }
        self.visit_value_parameters(&property.setter_parameters)?;
        if let Some(property_type) = &property.property_type {
            self.visit_type(property_type)?;
        }
        self.visit_version_requirements(&property.version_requirements);
        Ok(())
    }

    pub fn visit_type_alias(&mut self, alias: &'p KotlinTypeAlias) -> Result<(), MarkError> {
        if !self.mark(alias.id) {
            return Ok(());
        }
        self.visit_type_parameters(&alias.type_parameters)?;
        if let Some(underlying) = &alias.underlying_type {
            self.visit_type(underlying)?;
        }
        if let Some(expanded) = &alias.expanded_type {
            self.visit_type(expanded)?;
        }
        for annotation in &alias.annotations {
            self.visit_annotation(annotation)?;
        }
        self.visit_version_requirements(&alias.version_requirements);
        Ok(())
    }

    pub fn visit_type(&mut self, kotlin_type: &'p KotlinType) -> Result<(), MarkError> {
        if !self.mark(kotlin_type.id) {
            return Ok(());
        }

        match &kotlin_type.classifier {
            KotlinClassifier::Class { referenced_class, .. } => {
                self.visit_class_reference(kotlin_type.id, *referenced_class)?;
            }
            KotlinClassifier::TypeAlias {
                referenced_alias: Some((class, node)),
                ..
            } => {
                let (class, node) = (*class, *node);
                let producer = self.entity(kotlin_type.id);
                self.outer
                    .reasoned(Reason::KotlinMetadata, producer, |m| m.mark_kotlin_type_alias(class, node))?;
            }
            KotlinClassifier::TypeAlias { referenced_alias: None, .. } | KotlinClassifier::TypeParameter { .. } => {}
        }

        for argument in &kotlin_type.arguments {
            if let Some(projected) = &argument.projected_type {
                self.visit_type(projected)?;
            }
        }
        for nested in [
            &kotlin_type.outer_type,
            &kotlin_type.abbreviation,
            &kotlin_type.flexible_upper_bound,
        ]
        .into_iter()
        .flatten()
        {
            self.visit_type(nested)?;
        }
        for annotation in &kotlin_type.annotations {
            self.visit_annotation(annotation)?;
        }
        Ok(())
    }

    fn visit_type_parameters(&mut self, parameters: &'p [KotlinTypeParameter]) -> Result<(), MarkError> {
        for parameter in parameters {
            self.visit_type_parameter(parameter)?;
        }
        Ok(())
    }

    pub fn visit_type_parameter(&mut self, parameter: &'p KotlinTypeParameter) -> Result<(), MarkError> {
        if !self.mark(parameter.id) {
            return Ok(());
        }
        for bound in &parameter.upper_bounds {
            self.visit_type(bound)?;
        }
        for annotation in &parameter.annotations {
            self.visit_annotation(annotation)?;
        }
        Ok(())
    }

    fn visit_value_parameters(&mut self, parameters: &'p [KotlinValueParameter]) -> Result<(), MarkError> {
        for parameter in parameters {
            self.visit_value_parameter(parameter)?;
        }
        Ok(())
    }

    pub fn visit_value_parameter(&mut self, parameter: &'p KotlinValueParameter) -> Result<(), MarkError> {
        if !self.mark(parameter.id) {
            return Ok(());
        }
        if let Some(parameter_type) = &parameter.parameter_type {
            self.visit_type(parameter_type)?;
        }
        if let Some(element_type) = &parameter.vararg_element_type {
            self.visit_type(element_type)?;
        }
        Ok(())
    }

    pub fn visit_annotation(&mut self, annotation: &'p KotlinAnnotation) -> Result<(), MarkError> {
        if !self.mark(annotation.id) {
            return Ok(());
        }
        self.visit_class_reference(annotation.id, annotation.referenced_class)?;
        for argument in &annotation.arguments {
            self.visit_annotation_value(annotation.id, &argument.value)?;
        }
        Ok(())
    }

    fn visit_annotation_value(&mut self, node: KotlinNodeId, value: &'p KotlinAnnotationValue) -> Result<(), MarkError> {
        match value {
            KotlinAnnotationValue::Literal(_) => Ok(()),
            KotlinAnnotationValue::ClassRef { referenced_class, .. }
            | KotlinAnnotationValue::EnumRef { referenced_class, .. } => {
                self.visit_class_reference(node, *referenced_class)
            }
            KotlinAnnotationValue::Annotation(annotation) => self.visit_annotation(annotation),
            KotlinAnnotationValue::Array(values) => {
                for value in values {
                    self.visit_annotation_value(node, value)?;
                }
                Ok(())
            }
        }
    }

    fn visit_version_requirements(&mut self, requirements: &'p [KotlinVersionRequirement]) {
        for requirement in requirements {
            self.mark(requirement.id);
        }
    }

    pub fn visit_contract(&mut self, contract: &'p KotlinContract) -> Result<(), MarkError> {
        if self.mark(contract.id) {
            for effect in &contract.effects {
                self.visit_effect(effect)?;
            }
        }
        Ok(())
    }

    fn visit_effect(&mut self, effect: &'p KotlinEffect) -> Result<(), MarkError> {
        if !self.mark(effect.id) {
            return Ok(());
        }
        for argument in &effect.constructor_arguments {
            self.visit_effect_expression(argument)?;
        }
        if let Some(conclusion) = &effect.conclusion {
            self.visit_effect_expression(conclusion)?;
        }
        Ok(())
    }

    fn visit_effect_expression(&mut self, expression: &'p KotlinEffectExpression) -> Result<(), MarkError> {
        if !self.mark(expression.id) {
            return Ok(());
        }
        if let Some(instance_type) = &expression.is_instance_type {
            self.visit_type(instance_type)?;
        }
        for argument in expression.and_arguments.iter().chain(expression.or_arguments.iter()) {
            self.visit_effect_expression(argument)?;
        }
        Ok(())
    }
}
