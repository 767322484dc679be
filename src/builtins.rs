//! Host-provided stand-ins for the standard classes user bytecode
//! touches. Each class is described by a compile-time table and
//! converted into a registry [`Class`] at startup, shaped exactly
//! like a parsed class minus the constant pool.

use std::rc::Rc;

use log::warn;

use crate::class::{Class, ClassId, Classes, Method, MethodBody, NativeFn};
use crate::descriptor::Descriptors;
use crate::errors::{ExecutionError, ResolveError};
use crate::fields::{Field, ACC_STATIC};
use crate::runtime::{Frame, Interpreter};
use crate::variant::{Reference, Variant};

pub struct BuiltinField {
    pub name: &'static str,
    pub flags: u16,
}

pub struct BuiltinMethod {
    pub name: &'static str,
    pub descriptor: &'static str,
    pub max_stack: u16,
    pub callback: NativeFn,
}

pub struct BuiltinClass {
    pub name: &'static str,
    pub parent: Option<&'static str>,
    pub fields: &'static [BuiltinField],
    pub methods: &'static [BuiltinMethod],
    /// Frame sizing defaults for this class's methods.
    pub max_stack: u16,
    pub max_locals: u16,
}

pub const BUILTIN_CLASSES: &[BuiltinClass] = &[
    BuiltinClass {
        name: "java/lang/Object",
        parent: None,
        fields: &[],
        methods: &[BuiltinMethod {
            name: "<init>",
            descriptor: "()V",
            max_stack: 1,
            callback: object_init,
        }],
        max_stack: 1,
        max_locals: 4,
    },
    BuiltinClass {
        name: "java/util/Objects",
        parent: Some("java/lang/Object"),
        fields: &[],
        methods: &[BuiltinMethod {
            name: "requireNonNull",
            descriptor: "(Ljava/lang/Object;)Ljava/lang/Object;",
            max_stack: 1,
            callback: objects_require_non_null,
        }],
        max_stack: 1,
        max_locals: 4,
    },
    BuiltinClass {
        name: "java/lang/System",
        parent: Some("java/lang/Object"),
        fields: &[BuiltinField {
            name: "out",
            flags: ACC_STATIC,
        }],
        methods: &[BuiltinMethod {
            name: "<clinit>",
            descriptor: "()V",
            max_stack: 1,
            callback: system_clinit,
        }],
        max_stack: 1,
        max_locals: 4,
    },
    BuiltinClass {
        name: "java/io/PrintStream",
        parent: Some("java/lang/Object"),
        fields: &[],
        methods: &[
            BuiltinMethod {
                name: "println",
                descriptor: "(Ljava/lang/String;)V",
                max_stack: 1,
                callback: println_string,
            },
            BuiltinMethod {
                name: "println",
                descriptor: "(I)V",
                max_stack: 1,
                callback: println_int,
            },
        ],
        max_stack: 1,
        max_locals: 4,
    },
    BuiltinClass {
        name: "java/lang/String",
        parent: Some("java/lang/Object"),
        fields: &[BuiltinField {
            name: "value",
            flags: 0,
        }],
        methods: &[],
        max_stack: 1,
        max_locals: 4,
    },
    // Registered so pool references resolve without a file load; the
    // interpreter treats invokedynamic as a no-op.
    BuiltinClass {
        name: "java/lang/invoke/StringConcatFactory",
        parent: Some("java/lang/Object"),
        fields: &[],
        methods: &[],
        max_stack: 1,
        max_locals: 4,
    },
];

/// Converts every built-in table into a registered class. Must run
/// before any parsed class loads so parents and references resolve.
pub fn register(classes: &mut Classes) -> Result<(), ResolveError> {
    for def in BUILTIN_CLASSES {
        let mut class = Class::new(ClassId(0), def.name, 0);
        class.built_in = true;
        class.parent = def.parent.and_then(|name| classes.by_name(name));

        for field in def.fields {
            if field.flags & ACC_STATIC != 0 {
                class.static_fields.push(Field::new(field.name));
            } else {
                class.instance_fields.push(field.name.to_string());
            }
        }

        for method in def.methods {
            class.methods.push(Method {
                owner: ClassId(0),
                name: Rc::from(method.name),
                flags: 0,
                descriptors: Rc::new(Descriptors::parse(method.descriptor)),
                max_stack: method.max_stack,
                max_locals: def.max_locals,
                body: MethodBody::Native(method.callback),
            });
        }

        classes.add(class)?;
    }
    Ok(())
}

/// `java/lang/Object.<init>()V` — marks the receiver initialized.
fn object_init(
    interp: &mut Interpreter,
    _method: &Method,
    frame: &mut Frame,
) -> Result<(), ExecutionError> {
    let receiver = frame.local(0)?.as_object()?;
    interp.heap.object_mut(receiver).initialized = true;
    Ok(())
}

/// `java/util/Objects.requireNonNull` — warns on an uninitialized
/// object and returns the argument unchanged.
fn objects_require_non_null(
    interp: &mut Interpreter,
    _method: &Method,
    frame: &mut Frame,
) -> Result<(), ExecutionError> {
    let value = frame.local(1)?.clone();
    if let Variant::Object(id) = &value {
        if !interp.heap.object(*id).initialized {
            warn!("requireNonNull observed an uninitialized object");
        }
    }
    frame.stack.push(value)
}

/// `java/lang/System.<clinit>()V` — allocates a PrintStream and
/// stores it in the static field `out`.
fn system_clinit(
    interp: &mut Interpreter,
    method: &Method,
    _frame: &mut Frame,
) -> Result<(), ExecutionError> {
    let printstream = interp
        .classes
        .by_name("java/io/PrintStream")
        .ok_or_else(|| ResolveError::ClassNotFound("java/io/PrintStream".into()))?;
    let out = interp.heap.alloc_object(interp.classes.get(printstream));

    let owner = interp.classes.get_mut(method.owner);
    let owner_name = owner.name.clone();
    let field = owner
        .static_field_mut("out")
        .ok_or(ResolveError::FieldNotFound {
            class: owner_name,
            name: "out".into(),
        })?;
    field.value = Variant::Object(out);
    Ok(())
}

/// `println(Ljava/lang/String;)V` — accepts a String object (reads
/// its `value` field) or a raw byte-string reference.
fn println_string(
    interp: &mut Interpreter,
    _method: &Method,
    frame: &mut Frame,
) -> Result<(), ExecutionError> {
    let text = match frame.local(1)? {
        Variant::Object(id) => match interp.heap.object(*id).field("value").map(|f| &f.value) {
            Some(Variant::Ref(Reference::Bytes(text))) => Rc::clone(text),
            _ => Rc::from(""),
        },
        Variant::Ref(Reference::Bytes(text)) => Rc::clone(text),
        other => {
            return Err(ExecutionError::TypeMismatch {
                expected: "string",
                found: other.tag(),
            })
        }
    };
    println!("{text}");
    Ok(())
}

/// `println(I)V`.
fn println_int(
    _interp: &mut Interpreter,
    _method: &Method,
    frame: &mut Frame,
) -> Result<(), ExecutionError> {
    println!("{}", frame.local(1)?.as_int()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> Interpreter {
        let mut classes = Classes::new();
        register(&mut classes).unwrap();
        Interpreter::new(classes)
    }

    #[test]
    fn registers_every_builtin_once() {
        let interp = machine();
        for def in BUILTIN_CLASSES {
            let id = interp.classes.by_name(def.name).expect(def.name);
            assert!(interp.classes.get(id).built_in);
        }
        assert_eq!(interp.classes.len(), BUILTIN_CLASSES.len());
    }

    #[test]
    fn parents_resolve_to_object() {
        let interp = machine();
        let object = interp.classes.by_name("java/lang/Object").unwrap();
        let system = interp.classes.by_name("java/lang/System").unwrap();
        assert_eq!(interp.classes.get(system).parent, Some(object));
        assert_eq!(interp.classes.get(object).parent, None);
    }

    #[test]
    fn fields_partition_by_static_flag() {
        let interp = machine();
        let system = interp.classes.get(interp.classes.by_name("java/lang/System").unwrap());
        assert_eq!(system.static_fields.len(), 1);
        assert_eq!(system.static_fields[0].name, "out");

        let string = interp.classes.get(interp.classes.by_name("java/lang/String").unwrap());
        assert!(string.static_fields.is_empty());
        assert_eq!(string.instance_fields, vec!["value".to_string()]);
    }

    #[test]
    fn println_overloads_resolve_by_descriptor() {
        let interp = machine();
        let printstream = interp
            .classes
            .get(interp.classes.by_name("java/io/PrintStream").unwrap());
        assert!(printstream
            .method("println", "(Ljava/lang/String;)V")
            .is_some());
        assert!(printstream.method("println", "(I)V").is_some());
        assert!(printstream.method("println", "(J)V").is_none());
    }

    #[test]
    fn object_init_flips_the_flag() {
        let mut interp = machine();
        let object_class = interp.classes.by_name("java/lang/Object").unwrap();
        let id = interp.heap.alloc_object(interp.classes.get(object_class));
        let init = interp
            .classes
            .get(object_class)
            .method("<init>", "()V")
            .cloned()
            .unwrap();

        let mut frame = Frame::new(init.max_stack, init.max_locals);
        frame.set_local(0, Variant::Object(id)).unwrap();
        interp.call(&init, &mut frame).unwrap();
        assert!(interp.heap.object(id).initialized);
    }

    #[test]
    fn require_non_null_returns_its_argument() {
        let mut interp = machine();
        let object_class = interp.classes.by_name("java/lang/Object").unwrap();
        let id = interp.heap.alloc_object(interp.classes.get(object_class));
        let method = interp
            .classes
            .get(interp.classes.by_name("java/util/Objects").unwrap())
            .method("requireNonNull", "(Ljava/lang/Object;)Ljava/lang/Object;")
            .cloned()
            .unwrap();

        let mut frame = Frame::new(method.max_stack, method.max_locals);
        frame.set_local(1, Variant::Object(id)).unwrap();
        interp.call(&method, &mut frame).unwrap();
        assert_eq!(frame.stack.pop().unwrap(), Variant::Object(id));
    }
}
