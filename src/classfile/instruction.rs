// Decoded bytecode instructions
//
// Only constant instructions reference anything the marker cares about;
// the other shapes are kept so code attributes round-trip.

use serde::{Deserialize, Serialize};

/// Opcodes used by the builder and by tests
pub mod opcode {
    pub const NOP: u8 = 0x00;
    pub const ACONST_NULL: u8 = 0x01;
    pub const ICONST_0: u8 = 0x03;
    pub const ICONST_1: u8 = 0x04;
    pub const LDC: u8 = 0x12;
    pub const LDC_W: u8 = 0x13;
    pub const LDC2_W: u8 = 0x14;
    pub const ILOAD: u8 = 0x15;
    pub const ALOAD: u8 = 0x19;
    pub const ALOAD_0: u8 = 0x2a;
    pub const ALOAD_1: u8 = 0x2b;
    pub const ASTORE: u8 = 0x3a;
    pub const POP: u8 = 0x57;
    pub const DUP: u8 = 0x59;
    pub const IFEQ: u8 = 0x99;
    pub const GOTO: u8 = 0xa7;
    pub const TABLESWITCH: u8 = 0xaa;
    pub const LOOKUPSWITCH: u8 = 0xab;
    pub const IRETURN: u8 = 0xac;
    pub const ARETURN: u8 = 0xb0;
    pub const RETURN: u8 = 0xb1;
    pub const GETSTATIC: u8 = 0xb2;
    pub const PUTSTATIC: u8 = 0xb3;
    pub const GETFIELD: u8 = 0xb4;
    pub const PUTFIELD: u8 = 0xb5;
    pub const INVOKEVIRTUAL: u8 = 0xb6;
    pub const INVOKESPECIAL: u8 = 0xb7;
    pub const INVOKESTATIC: u8 = 0xb8;
    pub const INVOKEINTERFACE: u8 = 0xb9;
    pub const INVOKEDYNAMIC: u8 = 0xba;
    pub const NEW: u8 = 0xbb;
    pub const ANEWARRAY: u8 = 0xbd;
    pub const ATHROW: u8 = 0xbf;
    pub const CHECKCAST: u8 = 0xc0;
    pub const INSTANCEOF: u8 = 0xc1;
    pub const MULTIANEWARRAY: u8 = 0xc5;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Instruction {
    Simple {
        opcode: u8,
    },
    /// Instruction with a constant pool operand (ldc, field and method
    /// access, invocations, new, checkcast, ...)
    Constant {
        opcode: u8,
        constant_index: u16,
        /// Extra operand: dimensions of multianewarray, count of invokeinterface
        #[serde(default)]
        constant: u32,
    },
    Variable {
        opcode: u8,
        variable_index: u16,
        #[serde(default)]
        constant: i32,
    },
    Branch {
        opcode: u8,
        offset: i32,
    },
    Switch {
        opcode: u8,
        default_offset: i32,
        #[serde(default)]
        cases: Vec<(i32, i32)>,
    },
}

impl Instruction {
    pub fn simple(opcode: u8) -> Self {
        Instruction::Simple { opcode }
    }

    pub fn constant(opcode: u8, constant_index: u16) -> Self {
        Instruction::Constant {
            opcode,
            constant_index,
            constant: 0,
        }
    }

    pub fn opcode(&self) -> u8 {
        match self {
            Instruction::Simple { opcode }
            | Instruction::Constant { opcode, .. }
            | Instruction::Variable { opcode, .. }
            | Instruction::Branch { opcode, .. }
            | Instruction::Switch { opcode, .. } => *opcode,
        }
    }

    pub fn is_return(&self) -> bool {
        (opcode::IRETURN..=opcode::RETURN).contains(&self.opcode())
    }

    /// Constant pool operand, if any
    pub fn constant_index(&self) -> Option<u16> {
        match self {
            Instruction::Constant { constant_index, .. } => Some(*constant_index),
            _ => None,
        }
    }
}
