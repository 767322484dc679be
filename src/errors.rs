//! Error taxonomy for class loading and execution.
//!
//! Four families: malformed input (`ParseError`), failed cross-class
//! or member lookup (`ResolveError`), faults raised while running
//! bytecode (`ExecutionError`) and the binary-level umbrella
//! (`VmError`). Nothing is caught internally; user bytecode has no
//! way to observe or handle any of these.

use thiserror::Error;

/// A malformed class file. Fatal to the load that encountered it.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("class file ends prematurely at offset {offset}")]
    UnexpectedEof { offset: usize },

    #[error("invalid magic bytes: {0:#010x}")]
    BadMagic(u32),

    #[error("constant pool entry {index} is not valid utf-8")]
    InvalidUtf8 { index: u16 },

    #[error("unknown constant pool tag {tag:#04x} at index {index}")]
    UnknownConstantTag { tag: u8, index: u16 },

    #[error("method {class}.{name} has no Code attribute")]
    MissingCode { class: String, name: String },
}

/// A reference that cannot be satisfied by the registry. Fatal to the
/// whole run.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("class {0} is not loaded")]
    ClassNotFound(String),

    #[error("class {0} is already registered")]
    DuplicateClass(String),

    #[error("method {name}{descriptor} not found in class {class}")]
    MethodNotFound {
        class: String,
        name: String,
        descriptor: String,
    },

    #[error("field {name} not found in class {class}")]
    FieldNotFound { class: String, name: String },

    #[error("no loaded class declares a main method")]
    MainNotFound,
}

/// A fault raised while interpreting bytecode.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("operand stack overflow (limit {limit})")]
    StackOverflow { limit: usize },

    #[error("operand stack underflow")]
    StackUnderflow,

    #[error("unknown opcode {opcode:#04x} at pc {pc}")]
    UnknownOpcode { opcode: u8, pc: usize },

    #[error("code for method {0} ends inside an instruction")]
    TruncatedCode(String),

    #[error("branch target {target} outside method bounds")]
    BadBranchTarget { target: isize },

    #[error("ldc of unsupported constant at pool index {0}")]
    BadConstant(u16),

    #[error("local variable index {index} out of range (max {max})")]
    LocalOutOfRange { index: usize, max: usize },

    #[error("expected {expected} on the operand stack, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("array index {index} out of bounds (length {length})")]
    IndexOutOfBounds { index: i32, length: usize },

    #[error("negative array length {0}")]
    NegativeArrayLength(i32),

    #[error("class {0} has no constant pool")]
    MissingPool(String),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Top-level error for the binary: everything that can end a run.
#[derive(Debug, Error)]
pub enum VmError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}
