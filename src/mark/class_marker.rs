// Usage marking of classes, members and constants
//
// Every visit checks `should_be_marked_as_used` before going deeper, so the
// walk terminates on cyclic graphs. Library classes carry no marks; a visited
// set keeps them from being walked twice.

use super::usage_mark::Reason;
use super::{ConstantVisitor, MarkError, MarkingMode, MethodVisitor, UsageMarker};
use crate::classfile::instruction::opcode;
use crate::classfile::{
    access, is_initializer, AttributeId, AttributeKind, AttributeOwner, ClassId, ClassPool, Clazz, Constant,
    Entity, LibraryClass, MemberId, ProgramClass, ProgramMember, METHOD_NAME_CLINIT, METHOD_TYPE_CLINIT,
};
use std::collections::HashSet;
use tracing::{debug, trace};

/// Marks everything reachable from the classes and members it is asked to
/// visit
pub struct ClassUsageMarker<'p, M: UsageMarker> {
    pub(super) pool: &'p ClassPool,
    pub(super) marker: M,
    pub(super) mode: MarkingMode,
    /// Install a reason before each propagation step
    pub(super) explain: bool,
    visited: HashSet<Entity>,
    extra_constant_visitor: Option<Box<dyn ConstantVisitor + 'p>>,
    extra_method_visitor: Option<Box<dyn MethodVisitor + 'p>>,
}

impl<'p, M: UsageMarker> ClassUsageMarker<'p, M> {
    pub fn new(pool: &'p ClassPool, marker: M) -> Self {
        Self::with_mode(pool, marker, MarkingMode::default())
    }

    pub fn with_mode(pool: &'p ClassPool, marker: M, mode: MarkingMode) -> Self {
        Self {
            pool,
            marker,
            mode,
            explain: false,
            visited: HashSet::new(),
            extra_constant_visitor: None,
            extra_method_visitor: None,
        }
    }

    pub fn set_extra_constant_visitor(&mut self, visitor: impl ConstantVisitor + 'p) {
        self.extra_constant_visitor = Some(Box::new(visitor));
    }

    pub fn set_extra_method_visitor(&mut self, visitor: impl MethodVisitor + 'p) {
        self.extra_method_visitor = Some(Box::new(visitor));
    }

    pub fn pool(&self) -> &'p ClassPool {
        self.pool
    }

    pub fn mode(&self) -> MarkingMode {
        self.mode
    }

    pub fn usage_marker(&self) -> &M {
        &self.marker
    }

    pub fn usage_marker_mut(&mut self) -> &mut M {
        &mut self.marker
    }

    pub fn into_usage_marker(self) -> M {
        self.marker
    }

    pub fn is_used(&self, entity: Entity) -> bool {
        self.marker.is_used(entity)
    }

    pub fn is_possibly_used(&self, entity: Entity) -> bool {
        self.marker.is_possibly_used(entity)
    }

    /// Run `f` with `reason`, caused by `producer`, as the marking context
    pub(super) fn reasoned<R>(&mut self, reason: Reason, producer: Entity, f: impl FnOnce(&mut Self) -> R) -> R {
        if !self.explain {
            return f(self);
        }
        let scope = self.marker.enter(reason, Some(producer));
        let result = f(self);
        self.marker.leave(scope);
        result
    }

    /// Run `f` as a root: everything it marks traces back to `reason`
    pub fn mark_root<R>(&mut self, reason: Reason, f: impl FnOnce(&mut Self) -> R) -> R {
        let scope = self.marker.enter_root(reason);
        let result = f(self);
        self.marker.leave(scope);
        result
    }

    // ---- classes ----

    pub fn visit_class(&mut self, id: ClassId) -> Result<(), MarkError> {
        let pool = self.pool;
        match pool.class(id) {
            Some(Clazz::Program(class)) => self.visit_program_class(id, class),
            Some(Clazz::Library(class)) => self.visit_library_class(id, class),
            None => Ok(()),
        }
    }

    pub fn visit_program_class(&mut self, id: ClassId, class: &'p ProgramClass) -> Result<(), MarkError> {
        let entity = Entity::Class(id);
        if self.marker.should_be_marked_as_used(entity) {
            if !self.marker.is_used(entity) {
                debug!("Marking class {}", class.name());
            }
            self.marker.mark_as_used(entity);
            self.mark_program_class_body(id, class)?;
        }
        Ok(())
    }

    pub fn mark_program_class_body(&mut self, id: ClassId, class: &'p ProgramClass) -> Result<(), MarkError> {
        let this = Entity::Class(id);

        self.reasoned(Reason::DeclaredBy, this, |m| m.mark_constant(id, class, class.this_class))?;

        if class.super_class != 0 {
            self.reasoned(Reason::ExtendedBy, this, |m| {
                if let Some(super_class) = class.super_class_id() {
                    m.visit_class(super_class)?;
                }
                m.mark_constant(id, class, class.super_class)
            })?;
        }

        for &interface in &class.interfaces {
            self.reasoned(Reason::ImplementedBy, this, |m| {
                if let Some(interface_class) = class.constant_pool.referenced_class(interface) {
                    m.visit_class(interface_class)?;
                }
                m.mark_constant(id, class, interface)
            })?;
        }

        if let Some(index) = class.find_method(METHOD_NAME_CLINIT, METHOD_TYPE_CLINIT) {
            let trivial = class
                .methods
                .get(index as usize)
                .map_or(true, is_trivial_initializer);
            if !trivial {
                self.reasoned(Reason::MemberOf, this, |m| m.visit_program_method(id, class, index))?;
            }
        }

        // Members that were referenced before the class itself was used
        for index in 0..class.fields.len() as u16 {
            if self.marker.is_possibly_used(Entity::Field(MemberId::new(id, index))) {
                self.visit_program_field(id, class, index)?;
            }
        }
        for index in 0..class.methods.len() as u16 {
            if self.marker.is_possibly_used(Entity::Method(MemberId::new(id, index))) {
                self.visit_program_method(id, class, index)?;
            }
        }

        for (index, attribute) in class.attributes.iter().enumerate() {
            self.reasoned(Reason::DeclaredBy, this, |m| {
                m.visit_attribute(id, class, AttributeOwner::Class, index as u16, attribute)
            })?;
        }

        self.reasoned(Reason::DeclaredBy, this, |m| m.mark_kotlin_metadata(id, class))
    }

    pub fn visit_library_class(&mut self, id: ClassId, class: &'p LibraryClass) -> Result<(), MarkError> {
        let this = Entity::Class(id);
        // Walked once even when explaining, so reasons through a library
        // supertype keep the first chain
        if !self.visited.insert(this) {
            return Ok(());
        }
        trace!("Visiting library class {}", class.name);

        if let Some(super_class) = class.super_class {
            self.reasoned(Reason::ExtendedBy, this, |m| m.visit_class(super_class))?;
        }
        for interface in class.interfaces.iter().flatten().copied() {
            self.reasoned(Reason::ImplementedBy, this, |m| m.visit_class(interface))?;
        }
        for index in 0..class.methods.len() as u16 {
            self.visit_library_method(id, class, index)?;
        }
        Ok(())
    }

    // ---- members ----

    pub fn visit_field(&mut self, member: MemberId) -> Result<(), MarkError> {
        let pool = self.pool;
        match pool.class(member.class) {
            Some(Clazz::Program(class)) => self.visit_program_field(member.class, class, member.index),
            Some(Clazz::Library(class)) => self.visit_library_field(member.class, class, member.index),
            None => Ok(()),
        }
    }

    pub fn visit_method(&mut self, member: MemberId) -> Result<(), MarkError> {
        let pool = self.pool;
        match pool.class(member.class) {
            Some(Clazz::Program(class)) => self.visit_program_method(member.class, class, member.index),
            Some(Clazz::Library(class)) => self.visit_library_method(member.class, class, member.index),
            None => Ok(()),
        }
    }

    pub fn visit_program_field(&mut self, id: ClassId, class: &'p ProgramClass, index: u16) -> Result<(), MarkError> {
        let entity = Entity::Field(MemberId::new(id, index));
        if !self.marker.should_be_marked_as_used(entity) {
            return Ok(());
        }

        if self.marker.is_used(Entity::Class(id)) {
            self.marker.mark_as_used(entity);
            self.mark_program_field_body(id, class, index)?;
        } else if self.marker.should_be_marked_as_possibly_used(entity) {
            self.marker.mark_as_possibly_used(entity);
        }
        Ok(())
    }

    pub fn visit_program_method(&mut self, id: ClassId, class: &'p ProgramClass, index: u16) -> Result<(), MarkError> {
        let member = MemberId::new(id, index);
        let entity = Entity::Method(member);
        if !self.marker.should_be_marked_as_used(entity) {
            return Ok(());
        }

        if self.marker.is_used(Entity::Class(id)) {
            let first = !self.marker.is_used(entity);
            self.marker.mark_as_used(entity);
            if first {
                if let (Some(visitor), Some(method)) = (self.extra_method_visitor.as_mut(), class.methods.get(index as usize)) {
                    visitor.visit_program_method(member, class, method);
                }
            }
            self.mark_program_method_body(id, class, index)?;
            self.mark_method_hierarchy(id, index)?;
        } else if self.marker.should_be_marked_as_possibly_used(entity) {
            self.marker.mark_as_possibly_used(entity);
            self.mark_method_hierarchy(id, index)?;
        }
        Ok(())
    }

    pub fn visit_library_field(&mut self, id: ClassId, _class: &'p LibraryClass, index: u16) -> Result<(), MarkError> {
        self.visited.insert(Entity::Field(MemberId::new(id, index)));
        Ok(())
    }

    pub fn visit_library_method(&mut self, id: ClassId, _class: &'p LibraryClass, index: u16) -> Result<(), MarkError> {
        if self.visited.insert(Entity::Method(MemberId::new(id, index))) {
            self.mark_method_hierarchy(id, index)?;
        }
        Ok(())
    }

    pub fn mark_program_field_body(&mut self, id: ClassId, class: &'p ProgramClass, index: u16) -> Result<(), MarkError> {
        let Some(field) = class.fields.get(index as usize) else {
            return Ok(());
        };
        let producer = Entity::Field(MemberId::new(id, index));
        self.mark_member_body(id, class, field, AttributeOwner::Field(index), producer, Reason::ReferencedByField)
    }

    pub fn mark_program_method_body(&mut self, id: ClassId, class: &'p ProgramClass, index: u16) -> Result<(), MarkError> {
        let Some(method) = class.methods.get(index as usize) else {
            return Ok(());
        };
        let producer = Entity::Method(MemberId::new(id, index));
        self.mark_member_body(id, class, method, AttributeOwner::Method(index), producer, Reason::ReferencedByMethod)
    }

    fn mark_member_body(
        &mut self,
        id: ClassId,
        class: &'p ProgramClass,
        member: &'p ProgramMember,
        owner: AttributeOwner,
        producer: Entity,
        reason: Reason,
    ) -> Result<(), MarkError> {
        self.mark_constant(id, class, member.name_index)?;
        self.mark_constant(id, class, member.descriptor_index)?;

        for (index, attribute) in member.attributes.iter().enumerate() {
            self.reasoned(reason.clone(), producer, |m| m.visit_attribute(id, class, owner, index as u16, attribute))?;
        }

        for referenced in member.referenced_classes.iter().flatten().copied() {
            self.reasoned(reason.clone(), producer, |m| m.visit_class(referenced))?;
        }
        Ok(())
    }

    /// Visit the methods that override, or are overridden by, the given
    /// method, in the first concrete classes at or below its class and in
    /// their super- and subclasses
    pub fn mark_method_hierarchy(&mut self, id: ClassId, index: u16) -> Result<(), MarkError> {
        let pool = self.pool;
        let Some((name, descriptor, flags)) = pool.class(id).and_then(|c| c.method_signature(index)) else {
            return Ok(());
        };
        if flags & (access::PRIVATE | access::STATIC) != 0 || is_initializer(name) {
            return Ok(());
        }

        let mut excluded = access::PRIVATE | access::STATIC;
        if flags & access::PUBLIC != 0 {
            excluded |= access::ABSTRACT;
        }

        let producer = Entity::Method(MemberId::new(id, index));
        for target in pool.hierarchy().method_hierarchy(id) {
            if target == id {
                continue;
            }
            let Some(clazz) = pool.class(target) else {
                continue;
            };
            let Some(target_index) = clazz.find_method(name, descriptor) else {
                continue;
            };
            let Some((_, _, target_flags)) = clazz.method_signature(target_index) else {
                continue;
            };
            if target_flags & excluded != 0 {
                continue;
            }
            self.reasoned(Reason::MethodHierarchy, producer, |m| {
                m.visit_method(MemberId::new(target, target_index))
            })?;
        }
        Ok(())
    }

    // ---- constants ----

    /// Mark a constant and whatever it references
    pub fn mark_constant(&mut self, id: ClassId, class: &'p ProgramClass, index: u16) -> Result<(), MarkError> {
        let Some(constant) = class.constant_pool.get(index) else {
            return Ok(());
        };
        match constant {
            Constant::Unusable => Ok(()),
            Constant::Utf8(_) => self.visit_utf8_constant(id, class, index),
            Constant::Integer(_) | Constant::Float(_) | Constant::Long(_) | Constant::Double(_) => {
                self.visit_primitive_constant(id, class, index)
            }
            Constant::String { .. } => self.visit_string_constant(id, class, index),
            Constant::Class { .. } => self.visit_class_constant(id, class, index),
            Constant::FieldRef(_) => self.visit_field_ref_constant(id, class, index),
            Constant::MethodRef(_) | Constant::InterfaceMethodRef(_) => self.visit_method_ref_constant(id, class, index),
            Constant::NameAndType { .. } => self.visit_name_and_type_constant(id, class, index),
            Constant::MethodHandle { .. } => self.visit_method_handle_constant(id, class, index),
            Constant::MethodType { .. } => self.visit_method_type_constant(id, class, index),
            Constant::Dynamic(_) => self.visit_dynamic_constant(id, class, index),
            Constant::InvokeDynamic(_) => self.visit_invoke_dynamic_constant(id, class, index),
            Constant::Module { .. } => self.visit_module_constant(id, class, index),
            Constant::Package { .. } => self.visit_package_constant(id, class, index),
        }
    }

    /// Mark the constant itself; true when the walk should continue into it
    fn mark_constant_as_used(&mut self, id: ClassId, class: &'p ProgramClass, index: u16) -> bool {
        let entity = Entity::Constant(id, index);
        if !self.marker.should_be_marked_as_used(entity) {
            return false;
        }
        let first = !self.marker.is_used(entity);
        self.marker.mark_as_used(entity);

        if first {
            trace!("Marking constant #{} of {}", index, class.name());
            if let (Some(visitor), Some(constant)) = (self.extra_constant_visitor.as_mut(), class.constant_pool.get(index)) {
                visitor.visit_constant(id, class, index, constant);
            }
        }
        true
    }

    pub fn visit_primitive_constant(&mut self, id: ClassId, class: &'p ProgramClass, index: u16) -> Result<(), MarkError> {
        self.mark_constant_as_used(id, class, index);
        Ok(())
    }

    pub fn visit_utf8_constant(&mut self, id: ClassId, class: &'p ProgramClass, index: u16) -> Result<(), MarkError> {
        self.mark_constant_as_used(id, class, index);
        Ok(())
    }

    pub fn visit_string_constant(&mut self, id: ClassId, class: &'p ProgramClass, index: u16) -> Result<(), MarkError> {
        let Some(Constant::String {
            string_index,
            referenced_class,
        }) = class.constant_pool.get(index)
        else {
            return Ok(());
        };

        if self.mark_constant_as_used(id, class, index) {
            self.mark_constant(id, class, *string_index)?;
            if let Some(referenced) = *referenced_class {
                self.reasoned(Reason::StringConstant, Entity::Constant(id, index), |m| m.visit_class(referenced))?;
            }
        }
        Ok(())
    }

    pub fn visit_class_constant(&mut self, id: ClassId, class: &'p ProgramClass, index: u16) -> Result<(), MarkError> {
        let Some(Constant::Class {
            name_index,
            referenced_class,
        }) = class.constant_pool.get(index)
        else {
            return Ok(());
        };

        if self.mark_constant_as_used(id, class, index) {
            self.mark_constant(id, class, *name_index)?;
            if let Some(referenced) = *referenced_class {
                self.reasoned(Reason::ClassConstant, Entity::Constant(id, index), |m| m.visit_class(referenced))?;
            }
        }
        Ok(())
    }

    pub fn visit_field_ref_constant(&mut self, id: ClassId, class: &'p ProgramClass, index: u16) -> Result<(), MarkError> {
        self.visit_ref_constant(id, class, index)
    }

    /// Method and interface method references
    pub fn visit_method_ref_constant(&mut self, id: ClassId, class: &'p ProgramClass, index: u16) -> Result<(), MarkError> {
        self.visit_ref_constant(id, class, index)
    }

    fn visit_ref_constant(&mut self, id: ClassId, class: &'p ProgramClass, index: u16) -> Result<(), MarkError> {
        let (reference, is_method) = match class.constant_pool.get(index) {
            Some(Constant::FieldRef(reference)) => (reference, false),
            Some(Constant::MethodRef(reference)) | Some(Constant::InterfaceMethodRef(reference)) => (reference, true),
            _ => return Ok(()),
        };

        if self.mark_constant_as_used(id, class, index) {
            self.mark_constant(id, class, reference.class_index)?;
            self.mark_constant(id, class, reference.name_and_type_index)?;

            let producer = Entity::Constant(id, index);
            if let Some(referenced) = reference.referenced_class {
                self.reasoned(Reason::MemberReference, producer, |m| m.visit_class(referenced))?;
            }
            if let Some(member) = reference.referenced_member {
                self.reasoned(Reason::MemberReference, producer, |m| {
                    if is_method {
                        m.visit_method(member)
                    } else {
                        m.visit_field(member)
                    }
                })?;
            }
        }
        Ok(())
    }

    pub fn visit_name_and_type_constant(&mut self, id: ClassId, class: &'p ProgramClass, index: u16) -> Result<(), MarkError> {
        let Some(Constant::NameAndType {
            name_index,
            descriptor_index,
        }) = class.constant_pool.get(index)
        else {
            return Ok(());
        };

        if self.mark_constant_as_used(id, class, index) {
            self.mark_constant(id, class, *name_index)?;
            self.mark_constant(id, class, *descriptor_index)?;
        }
        Ok(())
    }

    pub fn visit_method_handle_constant(&mut self, id: ClassId, class: &'p ProgramClass, index: u16) -> Result<(), MarkError> {
        let Some(Constant::MethodHandle { reference_index, .. }) = class.constant_pool.get(index) else {
            return Ok(());
        };

        if self.mark_constant_as_used(id, class, index) {
            self.mark_constant(id, class, *reference_index)?;
        }
        Ok(())
    }

    pub fn visit_method_type_constant(&mut self, id: ClassId, class: &'p ProgramClass, index: u16) -> Result<(), MarkError> {
        let Some(Constant::MethodType {
            descriptor_index,
            referenced_classes,
        }) = class.constant_pool.get(index)
        else {
            return Ok(());
        };

        if self.mark_constant_as_used(id, class, index) {
            self.mark_constant(id, class, *descriptor_index)?;
            for referenced in referenced_classes.iter().flatten().copied() {
                self.reasoned(Reason::MethodType, Entity::Constant(id, index), |m| m.visit_class(referenced))?;
            }
        }
        Ok(())
    }

    pub fn visit_dynamic_constant(&mut self, id: ClassId, class: &'p ProgramClass, index: u16) -> Result<(), MarkError> {
        self.visit_any_dynamic_constant(id, class, index)
    }

    pub fn visit_invoke_dynamic_constant(&mut self, id: ClassId, class: &'p ProgramClass, index: u16) -> Result<(), MarkError> {
        self.visit_any_dynamic_constant(id, class, index)
    }

    fn visit_any_dynamic_constant(&mut self, id: ClassId, class: &'p ProgramClass, index: u16) -> Result<(), MarkError> {
        let dynamic = match class.constant_pool.get(index) {
            Some(Constant::Dynamic(dynamic)) | Some(Constant::InvokeDynamic(dynamic)) => dynamic,
            _ => return Ok(()),
        };

        if self.mark_constant_as_used(id, class, index) {
            self.mark_constant(id, class, dynamic.name_and_type_index)?;

            let producer = Entity::Constant(id, index);
            for referenced in dynamic.referenced_classes.iter().flatten().copied() {
                self.reasoned(Reason::DynamicConstant, producer, |m| m.visit_class(referenced))?;
            }
            self.reasoned(Reason::DynamicConstant, producer, |m| {
                m.mark_bootstrap_method(id, class, dynamic.bootstrap_method_attribute_index)
            })?;
        }
        Ok(())
    }

    /// Mark one entry of the BootstrapMethods attribute, with the attribute
    /// itself, the method handle and the static arguments
    fn mark_bootstrap_method(&mut self, id: ClassId, class: &'p ProgramClass, bootstrap_index: u16) -> Result<(), MarkError> {
        let Some((attribute_index, attribute, methods)) =
            class
                .attributes
                .iter()
                .enumerate()
                .find_map(|(i, attribute)| match &attribute.kind {
                    AttributeKind::BootstrapMethods(methods) => Some((i, attribute, methods)),
                    _ => None,
                })
        else {
            return Ok(());
        };

        let attribute_id = AttributeId::new(id, AttributeOwner::Class, attribute_index as u16);
        self.mark_attribute_as_used(id, class, attribute_id, attribute)?;

        let Some(method) = methods.get(bootstrap_index as usize) else {
            return Ok(());
        };
        let entry = Entity::Entry(attribute_id, bootstrap_index);
        if self.marker.should_be_marked_as_used(entry) {
            self.marker.mark_as_used(entry);
            self.mark_constant(id, class, method.method_handle_index)?;
            for &argument in &method.arguments {
                self.mark_constant(id, class, argument)?;
            }
        }
        Ok(())
    }

    pub fn visit_module_constant(&mut self, id: ClassId, class: &'p ProgramClass, index: u16) -> Result<(), MarkError> {
        let Some(Constant::Module { name_index }) = class.constant_pool.get(index) else {
            return Ok(());
        };
        if self.mark_constant_as_used(id, class, index) {
            self.mark_constant(id, class, *name_index)?;
        }
        Ok(())
    }

    pub fn visit_package_constant(&mut self, id: ClassId, class: &'p ProgramClass, index: u16) -> Result<(), MarkError> {
        let Some(Constant::Package { name_index }) = class.constant_pool.get(index) else {
            return Ok(());
        };
        if self.mark_constant_as_used(id, class, index) {
            self.mark_constant(id, class, *name_index)?;
        }
        Ok(())
    }
}

/// A static initializer that only returns
fn is_trivial_initializer(method: &ProgramMember) -> bool {
    method.code().map_or(true, |code| {
        code.instructions
            .iter()
            .all(|instruction| instruction.opcode() == opcode::RETURN)
    })
}
