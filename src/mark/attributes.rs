// Usage marking of attributes and the structures nested in them

use super::class_marker::ClassUsageMarker;
use super::usage_mark::Reason;
use super::{MarkError, MarkingMode, UsageMarker};
use crate::classfile::{
    Annotation, Attribute, AttributeId, AttributeKind, AttributeOwner, ClassId, Clazz, CodeAttribute, ElementValue,
    ElementValueKind, Entity, ExceptionInfo, ExportsInfo, InnerClassesInfo, Instruction, LocalVariableInfo,
    LocalVariableTypeInfo, ModuleAttribute, OpensInfo, ParameterInfo, ProgramClass, ProvidesInfo,
    RecordComponentInfo, RequiresInfo, StackMapFrame, TypeAnnotation, VerificationType,
};

impl<'p, M: UsageMarker> ClassUsageMarker<'p, M> {
    /// Mark an attribute and its name; true when its contents should be
    /// walked
    pub(super) fn mark_attribute_as_used(
        &mut self,
        id: ClassId,
        class: &'p ProgramClass,
        attribute_id: AttributeId,
        attribute: &'p Attribute,
    ) -> Result<bool, MarkError> {
        let entity = Entity::Attribute(attribute_id);
        if !self.marker.should_be_marked_as_used(entity) {
            return Ok(false);
        }
        self.marker.mark_as_used(entity);
        self.mark_constant(id, class, attribute.name_index)?;
        Ok(true)
    }

    pub fn visit_attribute(
        &mut self,
        id: ClassId,
        class: &'p ProgramClass,
        owner: AttributeOwner,
        index: u16,
        attribute: &'p Attribute,
    ) -> Result<(), MarkError> {
        if self.mode == MarkingMode::Obfuscation && attribute.kind.is_debug_info() {
            return Ok(());
        }

        let attribute_id = AttributeId::new(id, owner, index);
        match &attribute.kind {
            // Marked along with the first dynamic constant that needs it
            AttributeKind::BootstrapMethods(_) => {}

            // Rows are marked for used classes only, here and when finishing
            AttributeKind::InnerClasses(rows) => {
                for (row, info) in rows.iter().enumerate() {
                    self.visit_inner_classes_info(id, class, attribute_id, attribute, row as u16, info)?;
                }
            }
            AttributeKind::NestMembers(_) | AttributeKind::PermittedSubclasses(_) => {
                self.mark_attribute_as_used(id, class, attribute_id, attribute)?;
            }

            AttributeKind::Record(components) => {
                if self.mark_attribute_as_used(id, class, attribute_id, attribute)? {
                    for (row, component) in components.iter().enumerate() {
                        self.visit_record_component_info(id, class, attribute_id, row as u16, component)?;
                    }
                }
            }

            AttributeKind::Code(code) => {
                if self.mark_attribute_as_used(id, class, attribute_id, attribute)? {
                    self.visit_code_attribute(id, class, owner, code)?;
                }
            }

            kind => {
                if self.mark_attribute_as_used(id, class, attribute_id, attribute)? {
                    self.mark_attribute_contents(id, class, kind)?;
                }
            }
        }
        Ok(())
    }

    fn mark_attribute_contents(&mut self, id: ClassId, class: &'p ProgramClass, kind: &'p AttributeKind) -> Result<(), MarkError> {
        match kind {
            AttributeKind::Unknown { .. }
            | AttributeKind::Deprecated
            | AttributeKind::Synthetic
            | AttributeKind::LineNumberTable(_)
            | AttributeKind::BootstrapMethods(_)
            | AttributeKind::InnerClasses(_)
            | AttributeKind::NestMembers(_)
            | AttributeKind::PermittedSubclasses(_)
            | AttributeKind::Record(_)
            | AttributeKind::Code(_) => Ok(()),

            AttributeKind::SourceFile { source_file_index: index }
            | AttributeKind::SourceDir { source_dir_index: index }
            | AttributeKind::ConstantValue { constant_value_index: index }
            | AttributeKind::ModuleMainClass { main_class_index: index } => self.mark_constant(id, class, *index),

            // The enclosing method itself is not needed
            AttributeKind::EnclosingMethod {
                class_index,
                method_index,
            } => {
                self.mark_constant(id, class, *class_index)?;
                self.mark_optional_constant(id, class, *method_index)
            }

            AttributeKind::Signature {
                signature_index,
                referenced_classes,
            } => {
                self.mark_constant(id, class, *signature_index)?;

                let producer = Entity::Constant(id, *signature_index);
                for referenced in referenced_classes.iter().flatten().copied() {
                    self.reasoned(Reason::Attribute, producer, |m| m.visit_class(referenced))?;
                }
                Ok(())
            }

            AttributeKind::NestHost { host_class_index } => self.mark_constant(id, class, *host_class_index),

            AttributeKind::MethodParameters(parameters) => {
                for parameter in parameters {
                    self.visit_parameter_info(id, class, parameter)?;
                }
                Ok(())
            }

            AttributeKind::Exceptions(indices) | AttributeKind::ModulePackages(indices) => {
                for &index in indices {
                    self.mark_constant(id, class, index)?;
                }
                Ok(())
            }

            AttributeKind::StackMap(frames) | AttributeKind::StackMapTable(frames) => {
                for frame in frames {
                    self.visit_stack_map_frame(id, class, frame)?;
                }
                Ok(())
            }

            AttributeKind::LocalVariableTable(variables) => {
                for variable in variables {
                    self.visit_local_variable_info(id, class, variable)?;
                }
                Ok(())
            }

            AttributeKind::LocalVariableTypeTable(variables) => {
                for variable in variables {
                    self.visit_local_variable_type_info(id, class, variable)?;
                }
                Ok(())
            }

            AttributeKind::Annotations { annotations, .. } => {
                for annotation in annotations {
                    self.visit_annotation(id, class, annotation)?;
                }
                Ok(())
            }

            AttributeKind::ParameterAnnotations { parameters, .. } => {
                for annotation in parameters.iter().flatten() {
                    self.visit_annotation(id, class, annotation)?;
                }
                Ok(())
            }

            AttributeKind::TypeAnnotations { annotations, .. } => {
                for annotation in annotations {
                    self.visit_type_annotation(id, class, annotation)?;
                }
                Ok(())
            }

            AttributeKind::AnnotationDefault(value) => self.visit_element_value(id, class, value),

            AttributeKind::Module(module) => self.visit_module_attribute(id, class, module),
        }
    }

    fn mark_optional_constant(&mut self, id: ClassId, class: &'p ProgramClass, index: u16) -> Result<(), MarkError> {
        if index == 0 {
            return Ok(());
        }
        self.mark_constant(id, class, index)
    }

    // ---- code ----

    pub fn visit_code_attribute(
        &mut self,
        id: ClassId,
        class: &'p ProgramClass,
        owner: AttributeOwner,
        code: &'p CodeAttribute,
    ) -> Result<(), MarkError> {
        for instruction in &code.instructions {
            self.visit_instruction(id, class, instruction)?;
        }
        for info in &code.exception_table {
            self.visit_exception_info(id, class, info)?;
        }

        let nested_owner = match owner {
            AttributeOwner::Method(method) => AttributeOwner::Code(method),
            other => other,
        };
        for (index, attribute) in code.attributes.iter().enumerate() {
            self.visit_attribute(id, class, nested_owner, index as u16, attribute)?;
        }
        Ok(())
    }

    pub fn visit_instruction(&mut self, id: ClassId, class: &'p ProgramClass, instruction: &'p Instruction) -> Result<(), MarkError> {
        match instruction {
            Instruction::Constant { constant_index, .. } => self.visit_constant_instruction(id, class, *constant_index),
            _ => self.visit_any_instruction(instruction),
        }
    }

    pub fn visit_constant_instruction(&mut self, id: ClassId, class: &'p ProgramClass, constant_index: u16) -> Result<(), MarkError> {
        self.mark_constant(id, class, constant_index)
    }

    /// Instructions without a constant operand reference nothing
    pub fn visit_any_instruction(&mut self, _instruction: &'p Instruction) -> Result<(), MarkError> {
        Ok(())
    }

    pub fn visit_exception_info(&mut self, id: ClassId, class: &'p ProgramClass, info: &'p ExceptionInfo) -> Result<(), MarkError> {
        self.mark_optional_constant(id, class, info.catch_type)
    }

    pub fn visit_stack_map_frame(&mut self, id: ClassId, class: &'p ProgramClass, frame: &'p StackMapFrame) -> Result<(), MarkError> {
        for verification_type in frame.locals.iter().chain(frame.stack.iter()) {
            self.visit_verification_type(id, class, verification_type)?;
        }
        Ok(())
    }

    pub fn visit_verification_type(
        &mut self,
        id: ClassId,
        class: &'p ProgramClass,
        verification_type: &'p VerificationType,
    ) -> Result<(), MarkError> {
        match verification_type {
            VerificationType::Object { class_index } => self.mark_constant(id, class, *class_index),
            _ => Ok(()),
        }
    }

    pub fn visit_local_variable_info(
        &mut self,
        id: ClassId,
        class: &'p ProgramClass,
        variable: &'p LocalVariableInfo,
    ) -> Result<(), MarkError> {
        self.mark_constant(id, class, variable.name_index)?;
        self.mark_constant(id, class, variable.descriptor_index)
    }

    pub fn visit_local_variable_type_info(
        &mut self,
        id: ClassId,
        class: &'p ProgramClass,
        variable: &'p LocalVariableTypeInfo,
    ) -> Result<(), MarkError> {
        self.mark_constant(id, class, variable.name_index)?;
        self.mark_constant(id, class, variable.signature_index)
    }

    pub fn visit_parameter_info(&mut self, id: ClassId, class: &'p ProgramClass, parameter: &'p ParameterInfo) -> Result<(), MarkError> {
        self.mark_optional_constant(id, class, parameter.name_index)
    }

    // ---- class tables ----

    /// An InnerClasses row is needed when it describes this class, or when
    /// its inner class is needed
    pub fn visit_inner_classes_info(
        &mut self,
        id: ClassId,
        class: &'p ProgramClass,
        attribute_id: AttributeId,
        attribute: &'p Attribute,
        row: u16,
        info: &'p InnerClassesInfo,
    ) -> Result<(), MarkError> {
        let entry = Entity::Entry(attribute_id, row);
        if !self.marker.should_be_marked_as_used(entry) {
            return Ok(());
        }

        let describes_this_class = class.constant_pool.class_name(info.inner_class_index) == Some(class.name());
        if !describes_this_class && !self.is_row_class_needed(id, class, info.inner_class_index) {
            return Ok(());
        }

        self.marker.mark_as_used(entry);
        self.mark_attribute_as_used(id, class, attribute_id, attribute)?;
        self.mark_constant(id, class, info.inner_class_index)?;
        self.mark_optional_constant(id, class, info.outer_class_index)?;
        self.mark_optional_constant(id, class, info.inner_name_index)
    }

    /// A NestMembers or PermittedSubclasses row is needed when the class it
    /// names is needed
    pub fn visit_class_table_row(
        &mut self,
        id: ClassId,
        class: &'p ProgramClass,
        attribute_id: AttributeId,
        attribute: &'p Attribute,
        row: u16,
        class_index: u16,
    ) -> Result<(), MarkError> {
        let entry = Entity::Entry(attribute_id, row);
        if !self.marker.should_be_marked_as_used(entry) {
            return Ok(());
        }

        if !self.is_row_class_needed(id, class, class_index) {
            return Ok(());
        }

        self.marker.mark_as_used(entry);
        self.mark_attribute_as_used(id, class, attribute_id, attribute)?;
        self.mark_constant(id, class, class_index)
    }

    /// Library and unresolved classes are always needed; program classes
    /// only once they are used. A class constant that is already used
    /// settles it too.
    fn is_row_class_needed(&self, id: ClassId, class: &'p ProgramClass, class_index: u16) -> bool {
        if self.marker.is_used(Entity::Constant(id, class_index)) {
            return true;
        }
        match class.constant_pool.referenced_class(class_index) {
            Some(named) => match self.pool.class(named) {
                Some(Clazz::Program(_)) => self.marker.is_used(Entity::Class(named)),
                _ => true,
            },
            None => true,
        }
    }

    pub fn visit_record_component_info(
        &mut self,
        id: ClassId,
        class: &'p ProgramClass,
        attribute_id: AttributeId,
        row: u16,
        component: &'p RecordComponentInfo,
    ) -> Result<(), MarkError> {
        let entry = Entity::Entry(attribute_id, row);
        if !self.marker.should_be_marked_as_used(entry) {
            return Ok(());
        }
        self.marker.mark_as_used(entry);

        self.mark_constant(id, class, component.name_index)?;
        self.mark_constant(id, class, component.descriptor_index)?;
        for (index, nested) in component.attributes.iter().enumerate() {
            self.visit_attribute(id, class, AttributeOwner::RecordComponent(row), index as u16, nested)?;
        }
        if let Some(field) = component.referenced_field {
            self.reasoned(Reason::Attribute, entry, |m| m.visit_field(field))?;
        }
        Ok(())
    }

    // ---- annotations ----

    pub fn visit_annotation(&mut self, id: ClassId, class: &'p ProgramClass, annotation: &'p Annotation) -> Result<(), MarkError> {
        self.mark_constant(id, class, annotation.type_index)?;

        let producer = Entity::Constant(id, annotation.type_index);
        for referenced in annotation.referenced_classes.iter().flatten().copied() {
            self.reasoned(Reason::Annotation, producer, |m| m.visit_class(referenced))?;
        }
        for element in &annotation.elements {
            self.visit_element_value(id, class, element)?;
        }
        Ok(())
    }

    pub fn visit_type_annotation(
        &mut self,
        id: ClassId,
        class: &'p ProgramClass,
        annotation: &'p TypeAnnotation,
    ) -> Result<(), MarkError> {
        self.visit_annotation(id, class, &annotation.annotation)
    }

    pub fn visit_element_value(&mut self, id: ClassId, class: &'p ProgramClass, element: &'p ElementValue) -> Result<(), MarkError> {
        self.mark_optional_constant(id, class, element.element_name_index)?;
        if let Some(method) = element.referenced_method {
            let producer = Entity::Constant(id, element.element_name_index);
            self.reasoned(Reason::Annotation, producer, |m| m.visit_method(method))?;
        }

        match &element.value {
            ElementValueKind::Constant { const_value_index, .. } => self.mark_constant(id, class, *const_value_index),
            ElementValueKind::EnumConstant {
                type_name_index,
                const_name_index,
                referenced_classes,
                referenced_field,
            } => {
                self.mark_constant(id, class, *type_name_index)?;
                self.mark_constant(id, class, *const_name_index)?;

                let producer = Entity::Constant(id, *type_name_index);
                for referenced in referenced_classes.iter().flatten().copied() {
                    self.reasoned(Reason::Annotation, producer, |m| m.visit_class(referenced))?;
                }
                if let Some(field) = *referenced_field {
                    self.reasoned(Reason::Annotation, producer, |m| m.visit_field(field))?;
                }
                Ok(())
            }
            ElementValueKind::Class {
                class_info_index,
                referenced_classes,
            } => {
                self.mark_constant(id, class, *class_info_index)?;

                let producer = Entity::Constant(id, *class_info_index);
                for referenced in referenced_classes.iter().flatten().copied() {
                    self.reasoned(Reason::Annotation, producer, |m| m.visit_class(referenced))?;
                }
                Ok(())
            }
            ElementValueKind::Annotation(annotation) => self.visit_annotation(id, class, annotation),
            ElementValueKind::Array(values) => {
                for value in values {
                    self.visit_element_value(id, class, value)?;
                }
                Ok(())
            }
        }
    }

    // ---- modules ----

    pub fn visit_module_attribute(&mut self, id: ClassId, class: &'p ProgramClass, module: &'p ModuleAttribute) -> Result<(), MarkError> {
        self.mark_constant(id, class, module.module_name_index)?;
        self.mark_optional_constant(id, class, module.module_version_index)?;

        for requires in &module.requires {
            self.visit_requires_info(id, class, requires)?;
        }
        for exports in &module.exports {
            self.visit_exports_info(id, class, exports)?;
        }
        for opens in &module.opens {
            self.visit_opens_info(id, class, opens)?;
        }
        for &uses in &module.uses {
            self.mark_constant(id, class, uses)?;
        }
        for provides in &module.provides {
            self.visit_provides_info(id, class, provides)?;
        }
        Ok(())
    }

    pub fn visit_requires_info(&mut self, id: ClassId, class: &'p ProgramClass, requires: &'p RequiresInfo) -> Result<(), MarkError> {
        self.mark_constant(id, class, requires.requires_index)?;
        self.mark_optional_constant(id, class, requires.requires_version_index)
    }

    pub fn visit_exports_info(&mut self, id: ClassId, class: &'p ProgramClass, exports: &'p ExportsInfo) -> Result<(), MarkError> {
        self.mark_constant(id, class, exports.exports_index)?;
        for &module in &exports.exports_to {
            self.mark_constant(id, class, module)?;
        }
        Ok(())
    }

    pub fn visit_opens_info(&mut self, id: ClassId, class: &'p ProgramClass, opens: &'p OpensInfo) -> Result<(), MarkError> {
        self.mark_constant(id, class, opens.opens_index)?;
        for &module in &opens.opens_to {
            self.mark_constant(id, class, module)?;
        }
        Ok(())
    }

    pub fn visit_provides_info(&mut self, id: ClassId, class: &'p ProgramClass, provides: &'p ProvidesInfo) -> Result<(), MarkError> {
        self.mark_constant(id, class, provides.provides_index)?;
        for &implementation in &provides.provides_with {
            self.mark_constant(id, class, implementation)?;
        }
        Ok(())
    }
}
