//! lungo is a miniature Java virtual machine. It parses a compiled
//! class file and every class it references, merges them with a
//! small set of host-provided classes in a shared registry, and
//! interprets the bytecode of the first `main` method it finds.

pub mod attribute;
pub mod builtins;
pub mod bytecode;
pub mod class;
pub mod descriptor;
pub mod errors;
pub mod fields;
pub mod object;
pub mod pool;
pub mod reader;
pub mod runtime;
pub mod stack;
pub mod variant;
