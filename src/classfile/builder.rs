// Programmatic construction of program classes
//
// The builder grows the constant pool as names are added, so tests and
// benchmarks can describe classes by name instead of by constant index.

use super::attribute::{BootstrapMethod, CodeAttribute, ExceptionInfo};
use super::instruction::opcode;
use super::{
    Attribute, AttributeKind, Clazz, ConstantPool, Instruction, KotlinMetadata, ProgramClass, ProgramMember,
};

/// Builds a [`ProgramClass`]
pub struct ProgramClassBuilder {
    class: ProgramClass,
}

impl ProgramClassBuilder {
    pub fn new(access_flags: u16, name: &str, super_name: Option<&str>) -> Self {
        let mut constant_pool = ConstantPool::new();
        let this_class = constant_pool.add_class(name);
        let super_class = super_name.map(|s| constant_pool.add_class(s)).unwrap_or(0);

        Self {
            class: ProgramClass {
                access_flags,
                constant_pool,
                this_class,
                super_class,
                interfaces: Vec::new(),
                fields: Vec::new(),
                methods: Vec::new(),
                attributes: Vec::new(),
                kotlin_metadata: None,
            },
        }
    }

    pub fn constant_pool_mut(&mut self) -> &mut ConstantPool {
        &mut self.class.constant_pool
    }

    pub fn interface(mut self, name: &str) -> Self {
        let index = self.class.constant_pool.add_class(name);
        self.class.interfaces.push(index);
        self
    }

    pub fn field(self, access_flags: u16, name: &str, descriptor: &str) -> Self {
        self.field_with(access_flags, name, descriptor, |_| Vec::new())
    }

    /// Add a field whose attributes are built against the constant pool
    pub fn field_with(
        mut self,
        access_flags: u16,
        name: &str,
        descriptor: &str,
        attributes: impl FnOnce(&mut ConstantPool) -> Vec<Attribute>,
    ) -> Self {
        let mut field = self.member(access_flags, name, descriptor);
        field.attributes = attributes(&mut self.class.constant_pool);
        self.class.fields.push(field);
        self
    }

    /// Add a method without code (abstract, native, or library-like)
    pub fn method(self, access_flags: u16, name: &str, descriptor: &str) -> Self {
        self.method_with(access_flags, name, descriptor, |_| Vec::new())
    }

    pub fn method_with(
        mut self,
        access_flags: u16,
        name: &str,
        descriptor: &str,
        attributes: impl FnOnce(&mut ConstantPool) -> Vec<Attribute>,
    ) -> Self {
        let mut method = self.member(access_flags, name, descriptor);
        method.attributes = attributes(&mut self.class.constant_pool);
        self.class.methods.push(method);
        self
    }

    /// Add a method with a code attribute
    pub fn method_with_code(
        mut self,
        access_flags: u16,
        name: &str,
        descriptor: &str,
        code: impl FnOnce(&mut CodeBuilder<'_>),
    ) -> Self {
        let mut method = self.member(access_flags, name, descriptor);
        let mut builder = CodeBuilder::new(&mut self.class.constant_pool);
        code(&mut builder);
        method.attributes.push(builder.finish());
        self.class.methods.push(method);
        self
    }

    /// Add a class-level attribute
    pub fn attribute(mut self, build: impl FnOnce(&mut ConstantPool) -> AttributeKind) -> Self {
        let kind = build(&mut self.class.constant_pool);
        let name_index = self.class.constant_pool.add_utf8(kind.name());
        self.class.attributes.push(Attribute::new(name_index, kind));
        self
    }

    /// Append a bootstrap method and return its index in the
    /// BootstrapMethods attribute, creating the attribute if needed
    pub fn add_bootstrap_method(&mut self, method_handle_index: u16, arguments: Vec<u16>) -> u16 {
        let entry = BootstrapMethod {
            method_handle_index,
            arguments,
        };
        for attribute in &mut self.class.attributes {
            if let AttributeKind::BootstrapMethods(methods) = &mut attribute.kind {
                methods.push(entry);
                return (methods.len() - 1) as u16;
            }
        }
        let name_index = self.class.constant_pool.add_utf8("BootstrapMethods");
        self.class
            .attributes
            .push(Attribute::new(name_index, AttributeKind::BootstrapMethods(vec![entry])));
        0
    }

    pub fn kotlin_metadata(mut self, metadata: KotlinMetadata) -> Self {
        self.class.kotlin_metadata = Some(metadata);
        self
    }

    pub fn build_program(self) -> ProgramClass {
        self.class
    }

    pub fn build(self) -> Clazz {
        Clazz::Program(self.class)
    }

    fn member(&mut self, access_flags: u16, name: &str, descriptor: &str) -> ProgramMember {
        let name_index = self.class.constant_pool.add_utf8(name);
        let descriptor_index = self.class.constant_pool.add_utf8(descriptor);
        ProgramMember::new(access_flags, name_index, descriptor_index)
    }
}

/// Builds the code attribute of one method
pub struct CodeBuilder<'a> {
    pool: &'a mut ConstantPool,
    instructions: Vec<Instruction>,
    exception_table: Vec<ExceptionInfo>,
    attributes: Vec<Attribute>,
}

impl<'a> CodeBuilder<'a> {
    fn new(pool: &'a mut ConstantPool) -> Self {
        Self {
            pool,
            instructions: Vec::new(),
            exception_table: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn pool(&mut self) -> &mut ConstantPool {
        &mut *self.pool
    }

    pub fn instruction(&mut self, instruction: Instruction) -> &mut Self {
        self.instructions.push(instruction);
        self
    }

    fn constant_instruction(&mut self, opcode: u8, constant_index: u16) -> &mut Self {
        self.instruction(Instruction::constant(opcode, constant_index))
    }

    pub fn aload_0(&mut self) -> &mut Self {
        self.instruction(Instruction::simple(opcode::ALOAD_0))
    }

    pub fn dup(&mut self) -> &mut Self {
        self.instruction(Instruction::simple(opcode::DUP))
    }

    pub fn pop(&mut self) -> &mut Self {
        self.instruction(Instruction::simple(opcode::POP))
    }

    pub fn return_(&mut self) -> &mut Self {
        self.instruction(Instruction::simple(opcode::RETURN))
    }

    pub fn areturn(&mut self) -> &mut Self {
        self.instruction(Instruction::simple(opcode::ARETURN))
    }

    pub fn athrow(&mut self) -> &mut Self {
        self.instruction(Instruction::simple(opcode::ATHROW))
    }

    pub fn new_instance(&mut self, class: &str) -> &mut Self {
        let index = self.pool.add_class(class);
        self.constant_instruction(opcode::NEW, index)
    }

    pub fn checkcast(&mut self, class: &str) -> &mut Self {
        let index = self.pool.add_class(class);
        self.constant_instruction(opcode::CHECKCAST, index)
    }

    pub fn instanceof(&mut self, class: &str) -> &mut Self {
        let index = self.pool.add_class(class);
        self.constant_instruction(opcode::INSTANCEOF, index)
    }

    pub fn ldc_string(&mut self, value: &str) -> &mut Self {
        let index = self.pool.add_string(value);
        self.constant_instruction(opcode::LDC, index)
    }

    pub fn ldc_class(&mut self, class: &str) -> &mut Self {
        let index = self.pool.add_class(class);
        self.constant_instruction(opcode::LDC, index)
    }

    pub fn getstatic(&mut self, class: &str, name: &str, descriptor: &str) -> &mut Self {
        let index = self.pool.add_field_ref(class, name, descriptor);
        self.constant_instruction(opcode::GETSTATIC, index)
    }

    pub fn putstatic(&mut self, class: &str, name: &str, descriptor: &str) -> &mut Self {
        let index = self.pool.add_field_ref(class, name, descriptor);
        self.constant_instruction(opcode::PUTSTATIC, index)
    }

    pub fn getfield(&mut self, class: &str, name: &str, descriptor: &str) -> &mut Self {
        let index = self.pool.add_field_ref(class, name, descriptor);
        self.constant_instruction(opcode::GETFIELD, index)
    }

    pub fn putfield(&mut self, class: &str, name: &str, descriptor: &str) -> &mut Self {
        let index = self.pool.add_field_ref(class, name, descriptor);
        self.constant_instruction(opcode::PUTFIELD, index)
    }

    pub fn invokevirtual(&mut self, class: &str, name: &str, descriptor: &str) -> &mut Self {
        let index = self.pool.add_method_ref(class, name, descriptor);
        self.constant_instruction(opcode::INVOKEVIRTUAL, index)
    }

    pub fn invokespecial(&mut self, class: &str, name: &str, descriptor: &str) -> &mut Self {
        let index = self.pool.add_method_ref(class, name, descriptor);
        self.constant_instruction(opcode::INVOKESPECIAL, index)
    }

    pub fn invokestatic(&mut self, class: &str, name: &str, descriptor: &str) -> &mut Self {
        let index = self.pool.add_method_ref(class, name, descriptor);
        self.constant_instruction(opcode::INVOKESTATIC, index)
    }

    pub fn invokeinterface(&mut self, class: &str, name: &str, descriptor: &str) -> &mut Self {
        let index = self.pool.add_interface_method_ref(class, name, descriptor);
        self.instruction(Instruction::Constant {
            opcode: opcode::INVOKEINTERFACE,
            constant_index: index,
            constant: 1,
        })
    }

    pub fn invokedynamic(&mut self, bootstrap_method_index: u16, name: &str, descriptor: &str) -> &mut Self {
        let index = self.pool.add_invoke_dynamic(bootstrap_method_index, name, descriptor);
        self.constant_instruction(opcode::INVOKEDYNAMIC, index)
    }

    /// Exception handler over the current instructions; `None` catches all
    pub fn catch(&mut self, start_pc: u16, end_pc: u16, handler_pc: u16, class: Option<&str>) -> &mut Self {
        let catch_type = class.map(|c| self.pool.add_class(c)).unwrap_or(0);
        self.exception_table.push(ExceptionInfo {
            start_pc,
            end_pc,
            handler_pc,
            catch_type,
        });
        self
    }

    /// Nested attribute of the code attribute (stack map, line numbers, ...)
    pub fn attribute(&mut self, build: impl FnOnce(&mut ConstantPool) -> AttributeKind) -> &mut Self {
        let kind = build(&mut *self.pool);
        let name_index = self.pool.add_utf8(kind.name());
        self.attributes.push(Attribute::new(name_index, kind));
        self
    }

    fn finish(self) -> Attribute {
        let name_index = self.pool.add_utf8("Code");
        Attribute::new(
            name_index,
            AttributeKind::Code(CodeAttribute {
                max_stack: 4,
                max_locals: 4,
                instructions: self.instructions,
                exception_table: self.exception_table,
                attributes: self.attributes,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::{access, Constant};

    #[test]
    fn test_builder_adds_constants() {
        let class = ProgramClassBuilder::new(access::PUBLIC, "a/A", Some("java/lang/Object"))
            .interface("java/io/Serializable")
            .field(access::PRIVATE, "name", "Ljava/lang/String;")
            .build_program();

        assert_eq!(class.name(), "a/A");
        assert_eq!(class.super_name(), Some("java/lang/Object"));
        assert_eq!(class.constant_pool.class_name(class.interfaces[0]), Some("java/io/Serializable"));
        assert_eq!(class.member_name(&class.fields[0]), "name");
    }

    #[test]
    fn test_method_with_code() {
        let class = ProgramClassBuilder::new(access::PUBLIC, "a/A", None)
            .method_with_code(access::PUBLIC, "make", "()La/B;", |code| {
                code.new_instance("a/B").dup().invokespecial("a/B", "<init>", "()V").areturn();
            })
            .build_program();

        let code = class.methods[0].code().unwrap();
        assert_eq!(code.instructions.len(), 4);
        let new_index = code.instructions[0].constant_index().unwrap();
        assert_eq!(class.constant_pool.class_name(new_index), Some("a/B"));
        assert!(matches!(
            class.constant_pool.get(code.instructions[2].constant_index().unwrap()),
            Some(Constant::MethodRef(_))
        ));
    }

    #[test]
    fn test_bootstrap_methods_share_one_attribute() {
        let mut builder = ProgramClassBuilder::new(access::PUBLIC, "a/A", None);
        let handle = {
            let pool = builder.constant_pool_mut();
            let target = pool.add_method_ref("a/A", "lambda$0", "()V");
            pool.add_method_handle(6, target)
        };
        let first = builder.add_bootstrap_method(handle, vec![]);
        let second = builder.add_bootstrap_method(handle, vec![]);
        let class = builder.build_program();

        assert_eq!((first, second), (0, 1));
        assert_eq!(class.attributes.len(), 1);
    }
}
