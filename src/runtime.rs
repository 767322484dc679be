//! The frame machine: opcode dispatch, method invocation, static
//! initialization, and allocation.
//!
//! Execution is strictly single-threaded. A method runs to completion
//! (or faults) before control returns to its caller; built-in
//! callbacks are treated as one atomic step.

use std::rc::Rc;

use log::debug;

use crate::bytecode::OpCode;
use crate::class::{ClassId, Classes, Method, MethodBody};
use crate::errors::{ExecutionError, ResolveError, VmError};
use crate::object::{Heap, ObjectId};
use crate::pool::{ConstantPool, CpInfo};
use crate::stack::OperandStack;
use crate::variant::{Reference, Variant};

/// Per-invocation state: program counter, operand stack bounded by
/// the method's `max_stack`, and a local-variable array sized to its
/// `max_locals`.
#[derive(Debug)]
pub struct Frame {
    pub pc: usize,
    pub stack: OperandStack,
    pub locals: Vec<Variant>,
}

impl Frame {
    pub fn new(max_stack: u16, max_locals: u16) -> Self {
        Self {
            pc: 0,
            stack: OperandStack::new(max_stack as usize),
            locals: vec![Variant::None; max_locals as usize],
        }
    }

    pub fn local(&self, index: usize) -> Result<&Variant, ExecutionError> {
        self.locals.get(index).ok_or(ExecutionError::LocalOutOfRange {
            index,
            max: self.locals.len(),
        })
    }

    pub fn set_local(&mut self, index: usize, value: Variant) -> Result<(), ExecutionError> {
        let max = self.locals.len();
        let slot = self
            .locals
            .get_mut(index)
            .ok_or(ExecutionError::LocalOutOfRange { index, max })?;
        *slot = value;
        Ok(())
    }
}

/// The machine: the closed class registry plus the heap of objects
/// and arrays allocated while running. Everything lives until the
/// machine is dropped.
pub struct Interpreter {
    pub classes: Classes,
    pub heap: Heap,
}

impl Interpreter {
    pub fn new(classes: Classes) -> Self {
        Self {
            classes,
            heap: Heap::new(),
        }
    }

    /// Locates the `main` method and runs it in a fresh frame.
    pub fn run(&mut self) -> Result<(), VmError> {
        let main = self
            .classes
            .main_method()
            .ok_or(ResolveError::MainNotFound)?;
        debug!(
            "executing main from class {}",
            self.classes.get(main.owner).name
        );
        let mut frame = Frame::new(main.max_stack, main.max_locals);
        self.call(&main, &mut frame)?;
        Ok(())
    }

    /// Dispatches a method into its frame: host callback for
    /// built-ins, the bytecode loop for parsed methods.
    pub fn call(&mut self, method: &Method, frame: &mut Frame) -> Result<(), ExecutionError> {
        match &method.body {
            MethodBody::Native(callback) => callback(self, method, frame),
            MethodBody::Bytecode(code) => {
                let code = Rc::clone(code);
                self.execute(method, &code, frame)
            }
        }
    }

    fn execute(
        &mut self,
        method: &Method,
        code: &[u8],
        frame: &mut Frame,
    ) -> Result<(), ExecutionError> {
        frame.pc = 0;
        while frame.pc < code.len() {
            let opcode_pc = frame.pc;
            let byte = code[opcode_pc];
            frame.pc += 1;
            let op = OpCode::decode(byte).ok_or(ExecutionError::UnknownOpcode {
                opcode: byte,
                pc: opcode_pc,
            })?;

            match op {
                OpCode::IconstM1
                | OpCode::Iconst0
                | OpCode::Iconst1
                | OpCode::Iconst2
                | OpCode::Iconst3
                | OpCode::Iconst4
                | OpCode::Iconst5 => frame.stack.push_int(i32::from(byte) - 3)?,
                // The operand byte is pushed zero-extended; real JVMs
                // sign-extend here.
                OpCode::BiPush => {
                    let value = fetch_u8(code, frame, method)?;
                    frame.stack.push_int(i32::from(value))?;
                }
                OpCode::SiPush => {
                    let value = fetch_i16(code, frame, method)?;
                    frame.stack.push_int(i32::from(value))?;
                }
                OpCode::Ldc => {
                    let index = u16::from(fetch_u8(code, frame, method)?);
                    self.ldc(method.owner, index, frame)?;
                }
                OpCode::ILoad | OpCode::ALoad => {
                    let index = usize::from(fetch_u8(code, frame, method)?);
                    let value = frame.local(index)?.clone();
                    frame.stack.push(value)?;
                }
                OpCode::ILoad0 | OpCode::ILoad1 | OpCode::ILoad2 | OpCode::ILoad3 => {
                    let value = frame.local(usize::from(byte) - 26)?.clone();
                    frame.stack.push(value)?;
                }
                OpCode::ALoad0 | OpCode::ALoad1 | OpCode::ALoad2 | OpCode::ALoad3 => {
                    let value = frame.local(usize::from(byte) - 42)?.clone();
                    frame.stack.push(value)?;
                }
                OpCode::AALoad => {
                    let index = frame.stack.pop()?.as_int()?;
                    let array = frame.stack.pop()?.as_array()?;
                    let value = self.heap.array(array).get(index)?.clone();
                    frame.stack.push(value)?;
                }
                OpCode::IStore | OpCode::AStore => {
                    let index = usize::from(fetch_u8(code, frame, method)?);
                    let value = frame.stack.pop()?;
                    frame.set_local(index, value)?;
                }
                OpCode::IStore0 | OpCode::IStore1 | OpCode::IStore2 | OpCode::IStore3 => {
                    let value = frame.stack.pop()?;
                    frame.set_local(usize::from(byte) - 59, value)?;
                }
                OpCode::AStore0 | OpCode::AStore1 | OpCode::AStore2 | OpCode::AStore3 => {
                    let value = frame.stack.pop()?;
                    frame.set_local(usize::from(byte) - 75, value)?;
                }
                OpCode::AAStore => {
                    let value = frame.stack.pop()?;
                    let index = frame.stack.pop()?.as_int()?;
                    let array = frame.stack.pop()?.as_array()?;
                    self.heap.array_mut(array).set(index, value)?;
                }
                OpCode::Pop => {
                    frame.stack.pop()?;
                }
                OpCode::Dup => frame.stack.dup()?,
                OpCode::IAdd => {
                    let a = frame.stack.pop()?.as_int()?;
                    let b = frame.stack.pop()?.as_int()?;
                    frame.stack.push_int(a.wrapping_add(b))?;
                }
                OpCode::IInc => {
                    let index = usize::from(fetch_u8(code, frame, method)?);
                    let delta = fetch_u8(code, frame, method)? as i8;
                    let current = frame.local(index)?.as_int()?;
                    frame.set_local(index, Variant::Int(current.wrapping_add(i32::from(delta))))?;
                }
                OpCode::IfICmpEq
                | OpCode::IfICmpNe
                | OpCode::IfICmpLt
                | OpCode::IfICmpGe
                | OpCode::IfICmpGt
                | OpCode::IfICmpLe => {
                    let offset = fetch_i16(code, frame, method)?;
                    let v2 = frame.stack.pop()?.as_int()?;
                    let v1 = frame.stack.pop()?.as_int()?;
                    let taken = match op {
                        OpCode::IfICmpEq => v1 == v2,
                        OpCode::IfICmpNe => v1 != v2,
                        OpCode::IfICmpLt => v1 < v2,
                        OpCode::IfICmpGe => v1 >= v2,
                        OpCode::IfICmpGt => v1 > v2,
                        _ => v1 <= v2,
                    };
                    if taken {
                        branch(frame, opcode_pc, offset, code.len())?;
                    }
                }
                OpCode::Goto => {
                    let offset = fetch_i16(code, frame, method)?;
                    branch(frame, opcode_pc, offset, code.len())?;
                }
                // The caller collects any return value from this
                // frame's stack.
                OpCode::IReturn | OpCode::Return => break,
                OpCode::GetStatic => {
                    let index = fetch_u16(code, frame, method)?;
                    self.get_static(method.owner, index, frame)?;
                }
                OpCode::PutStatic => {
                    let index = fetch_u16(code, frame, method)?;
                    self.put_static(method.owner, index, frame)?;
                }
                OpCode::GetField => {
                    let index = fetch_u16(code, frame, method)?;
                    self.get_field(method.owner, index, frame)?;
                }
                OpCode::PutField => {
                    let index = fetch_u16(code, frame, method)?;
                    self.put_field(method.owner, index, frame)?;
                }
                OpCode::InvokeVirtual | OpCode::InvokeSpecial => {
                    let index = fetch_u16(code, frame, method)?;
                    self.invoke(method.owner, index, frame)?;
                }
                OpCode::InvokeDynamic => {
                    let _ = fetch_u16(code, frame, method)?;
                    let _ = fetch_u16(code, frame, method)?;
                }
                OpCode::New => {
                    let index = fetch_u16(code, frame, method)?;
                    let class_id = self.class_at(method.owner, index)?;
                    let object = self.heap.alloc_object(self.classes.get(class_id));
                    frame.stack.push_object(object)?;
                }
                OpCode::ANewArray => {
                    let index = fetch_u16(code, frame, method)?;
                    let class_id = self.class_at(method.owner, index)?;
                    let count = frame.stack.pop()?.as_int()?;
                    if count < 0 {
                        return Err(ExecutionError::NegativeArrayLength(count));
                    }
                    let array = self.heap.alloc_array(class_id, count as usize);
                    frame.stack.push_ref(Reference::Array(array))?;
                }
                OpCode::ArrayLength => {
                    let array = frame.stack.pop()?.as_array()?;
                    frame.stack.push_int(self.heap.array(array).len() as i32)?;
                }
            }
        }
        Ok(())
    }

    /// Resolves a MethodRef and transfers control per the invocation
    /// ABI: a fresh frame sized by the target, arguments popped
    /// right-to-left into locals `1..=argc`, the receiver popped last
    /// into local 0, and a non-void result moved back to the caller.
    fn invoke(
        &mut self,
        caller: ClassId,
        index: u16,
        frame: &mut Frame,
    ) -> Result<(), ExecutionError> {
        let (target_class, name, descriptor) = {
            let pool = self.pool_of(caller)?;
            let target_class = self.classes.by_index(pool, index)?;
            (
                target_class,
                pool.resolve_field_name(index).to_string(),
                pool.resolve_descriptor(index).to_string(),
            )
        };

        let class = self.classes.get(target_class);
        let method = class
            .method(&name, &descriptor)
            .cloned()
            .ok_or_else(|| ResolveError::MethodNotFound {
                class: class.name.clone(),
                name,
                descriptor,
            })?;
        debug!(
            "invoking {}.{}{}",
            self.classes.get(target_class).name,
            method.name,
            method.descriptors.raw
        );

        let mut callee = Frame::new(method.max_stack, method.max_locals);
        let argc = method.descriptors.argument_count();
        if argc + 1 > callee.locals.len() {
            return Err(ExecutionError::LocalOutOfRange {
                index: argc,
                max: callee.locals.len(),
            });
        }
        for slot in (1..=argc).rev() {
            callee.locals[slot] = frame.stack.pop()?;
        }
        callee.locals[0] = frame.stack.pop()?;

        self.call(&method, &mut callee)?;

        if method.descriptors.returns_value() {
            let value = callee.stack.pop()?;
            frame.stack.push(value)?;
        }
        Ok(())
    }

    /// First static access of a class with static fields flips the
    /// initialized flag, then runs `<clinit>()V` if the class has
    /// one. The flag flips first so reentrant accesses from inside
    /// `<clinit>` do not recurse.
    fn ensure_static_init(&mut self, id: ClassId) -> Result<(), ExecutionError> {
        {
            let class = self.classes.get(id);
            if class.static_fields.is_empty() || class.static_initialized {
                return Ok(());
            }
        }
        self.classes.get_mut(id).static_initialized = true;
        if let Some(clinit) = self.classes.get(id).method("<clinit>", "()V").cloned() {
            debug!("running <clinit> of {}", self.classes.get(id).name);
            let mut frame = Frame::new(clinit.max_stack, clinit.max_locals);
            self.call(&clinit, &mut frame)?;
        }
        Ok(())
    }

    fn get_static(
        &mut self,
        owner: ClassId,
        index: u16,
        frame: &mut Frame,
    ) -> Result<(), ExecutionError> {
        let (class_id, name) = self.static_target(owner, index)?;
        self.ensure_static_init(class_id)?;
        let class = self.classes.get(class_id);
        let field = class
            .static_field(&name)
            .ok_or_else(|| ResolveError::FieldNotFound {
                class: class.name.clone(),
                name,
            })?;
        frame.stack.push(field.value.clone())
    }

    fn put_static(
        &mut self,
        owner: ClassId,
        index: u16,
        frame: &mut Frame,
    ) -> Result<(), ExecutionError> {
        let (class_id, name) = self.static_target(owner, index)?;
        self.ensure_static_init(class_id)?;
        let value = frame.stack.pop()?;
        let class = self.classes.get_mut(class_id);
        let class_name = class.name.clone();
        let field = class
            .static_field_mut(&name)
            .ok_or(ResolveError::FieldNotFound {
                class: class_name,
                name,
            })?;
        field.value = value;
        Ok(())
    }

    fn get_field(
        &mut self,
        owner: ClassId,
        index: u16,
        frame: &mut Frame,
    ) -> Result<(), ExecutionError> {
        let name = self.pool_of(owner)?.resolve_field_name(index).to_string();
        let object_id = frame.stack.pop()?.as_object()?;
        let object = self.heap.object(object_id);
        let value = object
            .field(&name)
            .map(|field| field.value.clone())
            .ok_or_else(|| ResolveError::FieldNotFound {
                class: self.classes.get(object.class).name.clone(),
                name,
            })?;
        frame.stack.push(value)
    }

    fn put_field(
        &mut self,
        owner: ClassId,
        index: u16,
        frame: &mut Frame,
    ) -> Result<(), ExecutionError> {
        let name = self.pool_of(owner)?.resolve_field_name(index).to_string();
        let value = frame.stack.pop()?;
        let object_id = frame.stack.pop()?.as_object()?;
        let class_id = self.heap.object(object_id).class;
        match self.heap.object_mut(object_id).field_mut(&name) {
            Some(field) => {
                field.value = value;
                Ok(())
            }
            None => Err(ResolveError::FieldNotFound {
                class: self.classes.get(class_id).name.clone(),
                name,
            }
            .into()),
        }
    }

    fn ldc(&mut self, owner: ClassId, index: u16, frame: &mut Frame) -> Result<(), ExecutionError> {
        let entry = self.pool_of(owner)?.get(index).clone();
        match entry {
            CpInfo::Int(value) => frame.stack.push_int(value as i32),
            CpInfo::String { utf8_index } => {
                let text: Rc<str> = Rc::from(self.pool_of(owner)?.resolve_string(utf8_index));
                let object = self.new_string(text)?;
                frame.stack.push_object(object)
            }
            CpInfo::Utf8(text) => frame.stack.push_ref(Reference::Bytes(Rc::from(text.as_str()))),
            _ => Err(ExecutionError::BadConstant(index)),
        }
    }

    /// Materializes a `java/lang/String` instance around a host byte
    /// string.
    fn new_string(&mut self, text: Rc<str>) -> Result<ObjectId, ExecutionError> {
        let class_id = self
            .classes
            .by_name("java/lang/String")
            .ok_or_else(|| ResolveError::ClassNotFound("java/lang/String".into()))?;
        let object = self.heap.alloc_object(self.classes.get(class_id));
        if let Some(field) = self.heap.object_mut(object).field_mut("value") {
            field.value = Variant::Ref(Reference::Bytes(text));
        }
        Ok(object)
    }

    fn static_target(
        &self,
        owner: ClassId,
        index: u16,
    ) -> Result<(ClassId, String), ExecutionError> {
        let pool = self.pool_of(owner)?;
        let class_id = self.classes.by_index(pool, index)?;
        Ok((class_id, pool.resolve_field_name(index).to_string()))
    }

    fn class_at(&self, owner: ClassId, index: u16) -> Result<ClassId, ExecutionError> {
        let pool = self.pool_of(owner)?;
        Ok(self.classes.by_index(pool, index)?)
    }

    fn pool_of(&self, class: ClassId) -> Result<&ConstantPool, ExecutionError> {
        let class = self.classes.get(class);
        class
            .pool
            .as_ref()
            .ok_or_else(|| ExecutionError::MissingPool(class.name.clone()))
    }
}

fn fetch_u8(code: &[u8], frame: &mut Frame, method: &Method) -> Result<u8, ExecutionError> {
    let byte = code
        .get(frame.pc)
        .copied()
        .ok_or_else(|| ExecutionError::TruncatedCode(method.name.to_string()))?;
    frame.pc += 1;
    Ok(byte)
}

fn fetch_u16(code: &[u8], frame: &mut Frame, method: &Method) -> Result<u16, ExecutionError> {
    let hi = fetch_u8(code, frame, method)?;
    let lo = fetch_u8(code, frame, method)?;
    Ok(u16::from_be_bytes([hi, lo]))
}

fn fetch_i16(code: &[u8], frame: &mut Frame, method: &Method) -> Result<i16, ExecutionError> {
    Ok(fetch_u16(code, frame, method)? as i16)
}

/// Branch offsets are relative to the opcode's own position.
fn branch(
    frame: &mut Frame,
    opcode_pc: usize,
    offset: i16,
    code_len: usize,
) -> Result<(), ExecutionError> {
    let target = opcode_pc as isize + isize::from(offset);
    if target < 0 || target as usize > code_len {
        return Err(ExecutionError::BadBranchTarget { target });
    }
    frame.pc = target as usize;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins;
    use crate::class::Class;
    use crate::descriptor::Descriptors;

    fn machine() -> Interpreter {
        let mut classes = Classes::new();
        builtins::register(&mut classes).unwrap();
        Interpreter::new(classes)
    }

    fn bytecode_method(
        owner: ClassId,
        name: &str,
        descriptor: &str,
        max_stack: u16,
        max_locals: u16,
        code: Vec<u8>,
    ) -> Method {
        Method {
            owner,
            name: Rc::from(name),
            flags: 0,
            descriptors: Rc::new(Descriptors::parse(descriptor)),
            max_stack,
            max_locals,
            body: MethodBody::Bytecode(Rc::from(code.as_slice())),
        }
    }

    #[test]
    fn iconst_iadd_ireturn_leaves_the_sum() {
        let mut interp = machine();
        // iconst_2, iconst_3, iadd, ireturn
        let method = bytecode_method(ClassId(0), "add", "()I", 2, 0, vec![5, 6, 96, 172]);
        let mut frame = Frame::new(2, 0);
        interp.call(&method, &mut frame).unwrap();
        assert_eq!(frame.stack.pop().unwrap(), Variant::Int(5));
    }

    #[test]
    fn bipush_is_unsigned() {
        let mut interp = machine();
        let method = bytecode_method(ClassId(0), "push", "()I", 1, 0, vec![16, 0xF6, 172]);
        let mut frame = Frame::new(1, 0);
        interp.call(&method, &mut frame).unwrap();
        assert_eq!(frame.stack.pop().unwrap(), Variant::Int(246));
    }

    #[test]
    fn sipush_is_signed() {
        let mut interp = machine();
        let method = bytecode_method(ClassId(0), "push", "()I", 1, 0, vec![17, 0xFF, 0xF6, 172]);
        let mut frame = Frame::new(1, 0);
        interp.call(&method, &mut frame).unwrap();
        assert_eq!(frame.stack.pop().unwrap(), Variant::Int(-10));
    }

    #[test]
    fn iinc_loop_counts_to_ten() {
        let mut interp = machine();
        //  0: iload_0
        //  1: sipush 10
        //  4: if_icmpge +9  -> 13
        //  7: iinc 0, 1
        // 10: goto -10      -> 0
        // 13: return
        let code = vec![26, 17, 0, 10, 162, 0, 9, 132, 0, 1, 167, 0xFF, 0xF6, 177];
        let method = bytecode_method(ClassId(0), "count", "()V", 2, 1, code);
        let mut frame = Frame::new(2, 1);
        frame.set_local(0, Variant::Int(0)).unwrap();
        interp.call(&method, &mut frame).unwrap();
        assert_eq!(*frame.local(0).unwrap(), Variant::Int(10));
        assert!(frame.stack.is_empty());
    }

    #[test]
    fn instance_field_round_trip() {
        let mut interp = machine();
        let mut class = Class::new(ClassId(0), "Point", 0);
        class.instance_fields = vec!["x".into()];
        class.pool = Some(ConstantPool::from_entries(vec![
            CpInfo::Utf8("Point".into()),
            CpInfo::Class { name_index: 1 },
            CpInfo::Utf8("x".into()),
            CpInfo::Utf8("I".into()),
            CpInfo::NameAndType {
                name_index: 3,
                descriptor_index: 4,
            },
            CpInfo::FieldRef {
                class_index: 2,
                name_and_type_index: 5,
            },
        ]));
        let id = interp.classes.add(class).unwrap();

        // new #2, dup, dup, bipush 7, putfield #6, getfield #6, ireturn
        let code = vec![187, 0, 2, 89, 89, 16, 7, 181, 0, 6, 180, 0, 6, 172];
        let method = bytecode_method(id, "roundTrip", "()I", 4, 0, code);
        let mut frame = Frame::new(4, 0);
        interp.call(&method, &mut frame).unwrap();
        assert_eq!(frame.stack.pop().unwrap(), Variant::Int(7));
    }

    #[test]
    fn object_array_round_trip() {
        let mut interp = machine();
        let mut class = Class::new(ClassId(0), "Arrays", 0);
        class.pool = Some(ConstantPool::from_entries(vec![
            CpInfo::Utf8("java/lang/Object".into()),
            CpInfo::Class { name_index: 1 },
        ]));
        let id = interp.classes.add(class).unwrap();

        // iconst_3, anewarray #2, astore_0,
        // then for indices 0..3: aload_0, iconst_i, new #2, aastore,
        // aload_0, iconst_1, aaload, astore_1,
        // aload_0, arraylength, ireturn
        let code = vec![
            6, 189, 0, 2, 75, //
            42, 3, 187, 0, 2, 83, //
            42, 4, 187, 0, 2, 83, //
            42, 5, 187, 0, 2, 83, //
            42, 4, 50, 76, //
            42, 190, 172,
        ];
        let method = bytecode_method(id, "fill", "()I", 3, 2, code);
        let mut frame = Frame::new(3, 2);
        interp.call(&method, &mut frame).unwrap();

        assert_eq!(frame.stack.pop().unwrap(), Variant::Int(3));
        let array = frame.local(0).unwrap().as_array().unwrap();
        let elements = &interp.heap.array(array).elements;
        assert_eq!(elements.len(), 3);
        let ids: Vec<ObjectId> = elements.iter().map(|v| v.as_object().unwrap()).collect();
        assert_ne!(ids[0], ids[1]);
        assert_ne!(ids[1], ids[2]);
        assert_eq!(frame.local(1).unwrap().as_object().unwrap(), ids[1]);
    }

    /// Builds a class with statics `n` and `count` whose `<clinit>`
    /// bumps the counter and stores 42 into `n`.
    fn settings_class(interp: &mut Interpreter) -> ClassId {
        let mut class = Class::new(ClassId(0), "Settings", 0);
        class.pool = Some(ConstantPool::from_entries(vec![
            CpInfo::Utf8("Settings".into()),
            CpInfo::Class { name_index: 1 },
            CpInfo::Utf8("n".into()),
            CpInfo::Utf8("I".into()),
            CpInfo::NameAndType {
                name_index: 3,
                descriptor_index: 4,
            },
            CpInfo::FieldRef {
                class_index: 2,
                name_and_type_index: 5,
            },
            CpInfo::Utf8("count".into()),
            CpInfo::NameAndType {
                name_index: 7,
                descriptor_index: 4,
            },
            CpInfo::FieldRef {
                class_index: 2,
                name_and_type_index: 8,
            },
        ]));
        class.static_fields = vec![
            crate::fields::Field::new("n"),
            crate::fields::Field {
                name: "count".into(),
                value: Variant::Int(0),
            },
        ];
        // getstatic #9, iconst_1, iadd, putstatic #9,
        // bipush 42, putstatic #6, return
        class.methods.push(bytecode_method(
            ClassId(0),
            "<clinit>",
            "()V",
            2,
            0,
            vec![178, 0, 9, 4, 96, 179, 0, 9, 16, 42, 179, 0, 6, 177],
        ));
        interp.classes.add(class).unwrap()
    }

    #[test]
    fn static_init_runs_exactly_once() {
        let mut interp = machine();
        let id = settings_class(&mut interp);

        // getstatic n, pop, getstatic n, pop, getstatic count, ireturn
        let code = vec![178, 0, 6, 87, 178, 0, 6, 87, 178, 0, 9, 172];
        let method = bytecode_method(id, "probe", "()I", 1, 0, code);
        let mut frame = Frame::new(1, 0);
        interp.call(&method, &mut frame).unwrap();
        assert_eq!(frame.stack.pop().unwrap(), Variant::Int(1));

        let class = interp.classes.get(id);
        assert!(class.static_initialized);
        assert_eq!(class.static_field("n").unwrap().value, Variant::Int(42));

        // A later access must not rerun <clinit>.
        let mut frame = Frame::new(1, 0);
        interp.call(&method, &mut frame).unwrap();
        assert_eq!(frame.stack.pop().unwrap(), Variant::Int(1));
    }

    #[test]
    fn invokevirtual_moves_the_return_value() {
        let mut interp = machine();
        let mut class = Class::new(ClassId(0), "Five", 0);
        class.pool = Some(ConstantPool::from_entries(vec![
            CpInfo::Utf8("Five".into()),
            CpInfo::Class { name_index: 1 },
            CpInfo::Utf8("five".into()),
            CpInfo::Utf8("()I".into()),
            CpInfo::NameAndType {
                name_index: 3,
                descriptor_index: 4,
            },
            CpInfo::MethodRef {
                class_index: 2,
                name_and_type_index: 5,
            },
        ]));
        class
            .methods
            .push(bytecode_method(ClassId(0), "five", "()I", 1, 1, vec![8, 172]));
        let id = interp.classes.add(class).unwrap();

        // new #2, invokevirtual #6, ireturn
        let code = vec![187, 0, 2, 182, 0, 6, 172];
        let method = bytecode_method(id, "caller", "()I", 2, 0, code);
        let mut frame = Frame::new(2, 0);
        interp.call(&method, &mut frame).unwrap();

        // Receiver consumed, one return value produced.
        assert_eq!(frame.stack.len(), 1);
        assert_eq!(frame.stack.pop().unwrap(), Variant::Int(5));
    }

    #[test]
    fn arguments_fill_locals_right_to_left() {
        let mut interp = machine();
        let mut class = Class::new(ClassId(0), "Args", 0);
        class.pool = Some(ConstantPool::from_entries(vec![
            CpInfo::Utf8("Args".into()),
            CpInfo::Class { name_index: 1 },
            CpInfo::Utf8("first".into()),
            CpInfo::Utf8("(II)I".into()),
            CpInfo::NameAndType {
                name_index: 3,
                descriptor_index: 4,
            },
            CpInfo::MethodRef {
                class_index: 2,
                name_and_type_index: 5,
            },
        ]));
        // iload_1, ireturn
        class
            .methods
            .push(bytecode_method(ClassId(0), "first", "(II)I", 1, 3, vec![27, 172]));
        let id = interp.classes.add(class).unwrap();

        // new #2, bipush 8, bipush 9, invokevirtual #6, ireturn
        let code = vec![187, 0, 2, 16, 8, 16, 9, 182, 0, 6, 172];
        let method = bytecode_method(id, "caller", "()I", 3, 0, code);
        let mut frame = Frame::new(3, 0);
        interp.call(&method, &mut frame).unwrap();
        assert_eq!(frame.stack.pop().unwrap(), Variant::Int(8));
    }

    #[test]
    fn invokespecial_init_marks_objects_initialized() {
        let mut interp = machine();
        let mut class = Class::new(ClassId(0), "Widget", 0);
        class.pool = Some(ConstantPool::from_entries(vec![
            CpInfo::Utf8("Widget".into()),
            CpInfo::Class { name_index: 1 },
            CpInfo::Utf8("java/lang/Object".into()),
            CpInfo::Class { name_index: 3 },
            CpInfo::Utf8("<init>".into()),
            CpInfo::Utf8("()V".into()),
            CpInfo::NameAndType {
                name_index: 5,
                descriptor_index: 6,
            },
            CpInfo::MethodRef {
                class_index: 4,
                name_and_type_index: 7,
            },
        ]));
        let id = interp.classes.add(class).unwrap();

        // new #2, dup, invokespecial #8, return
        let code = vec![187, 0, 2, 89, 183, 0, 8, 177];
        let method = bytecode_method(id, "make", "()V", 2, 0, code);
        let mut frame = Frame::new(2, 0);
        interp.call(&method, &mut frame).unwrap();

        let object = frame.stack.pop().unwrap().as_object().unwrap();
        assert!(interp.heap.object(object).initialized);
    }

    #[test]
    fn getstatic_system_out_yields_a_printstream() {
        let mut interp = machine();
        let mut class = Class::new(ClassId(0), "UsesOut", 0);
        class.pool = Some(ConstantPool::from_entries(vec![
            CpInfo::Utf8("java/lang/System".into()),
            CpInfo::Class { name_index: 1 },
            CpInfo::Utf8("out".into()),
            CpInfo::Utf8("Ljava/io/PrintStream;".into()),
            CpInfo::NameAndType {
                name_index: 3,
                descriptor_index: 4,
            },
            CpInfo::FieldRef {
                class_index: 2,
                name_and_type_index: 5,
            },
        ]));
        let id = interp.classes.add(class).unwrap();

        let code = vec![178, 0, 6, 177];
        let method = bytecode_method(id, "peek", "()V", 1, 0, code);
        let mut frame = Frame::new(1, 0);
        interp.call(&method, &mut frame).unwrap();

        let object = frame.stack.pop().unwrap().as_object().unwrap();
        let printstream = interp.classes.by_name("java/io/PrintStream").unwrap();
        assert_eq!(interp.heap.object(object).class, printstream);
    }

    #[test]
    fn ldc_pushes_ints_strings_and_bytes() {
        let mut interp = machine();
        let mut class = Class::new(ClassId(0), "Consts", 0);
        class.pool = Some(ConstantPool::from_entries(vec![
            CpInfo::Utf8("hello".into()),
            CpInfo::String { utf8_index: 1 },
            CpInfo::Int(7),
        ]));
        let id = interp.classes.add(class).unwrap();

        let method = bytecode_method(id, "int", "()I", 1, 0, vec![18, 3, 172]);
        let mut frame = Frame::new(1, 0);
        interp.call(&method, &mut frame).unwrap();
        assert_eq!(frame.stack.pop().unwrap(), Variant::Int(7));

        let method = bytecode_method(id, "string", "()V", 1, 0, vec![18, 2, 177]);
        let mut frame = Frame::new(1, 0);
        interp.call(&method, &mut frame).unwrap();
        let object = frame.stack.pop().unwrap().as_object().unwrap();
        let value = &interp.heap.object(object).field("value").unwrap().value;
        assert_eq!(*value, Variant::Ref(Reference::Bytes(Rc::from("hello"))));

        let method = bytecode_method(id, "bytes", "()V", 1, 0, vec![18, 1, 177]);
        let mut frame = Frame::new(1, 0);
        interp.call(&method, &mut frame).unwrap();
        assert_eq!(
            frame.stack.pop().unwrap(),
            Variant::Ref(Reference::Bytes(Rc::from("hello")))
        );
    }

    #[test]
    fn unknown_opcode_aborts() {
        let mut interp = machine();
        let method = bytecode_method(ClassId(0), "bad", "()V", 1, 0, vec![0]);
        let mut frame = Frame::new(1, 0);
        match interp.call(&method, &mut frame) {
            Err(ExecutionError::UnknownOpcode { opcode: 0, pc: 0 }) => {}
            other => panic!("expected unknown-opcode fault, got {other:?}"),
        }
    }

    #[test]
    fn stack_limits_are_enforced() {
        let mut interp = machine();
        let method = bytecode_method(ClassId(0), "deep", "()V", 1, 0, vec![3, 3, 177]);
        let mut frame = Frame::new(1, 0);
        assert!(matches!(
            interp.call(&method, &mut frame),
            Err(ExecutionError::StackOverflow { .. })
        ));

        let method = bytecode_method(ClassId(0), "empty", "()V", 1, 0, vec![87, 177]);
        let mut frame = Frame::new(1, 0);
        assert!(matches!(
            interp.call(&method, &mut frame),
            Err(ExecutionError::StackUnderflow)
        ));
    }

    #[test]
    fn truncated_operands_fault() {
        let mut interp = machine();
        let method = bytecode_method(ClassId(0), "cut", "()V", 1, 0, vec![16]);
        let mut frame = Frame::new(1, 0);
        assert!(matches!(
            interp.call(&method, &mut frame),
            Err(ExecutionError::TruncatedCode(_))
        ));
    }
}
