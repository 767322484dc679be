//! Classes, the registry that owns them, and the class-file loader.
//!
//! Parsed and built-in classes share one shape and live side by side
//! in the [`Classes`] registry. Every cross-class reference is a
//! dense [`ClassId`] into the registry, so teardown is dropping one
//! vector.

use std::io;
use std::path::PathBuf;
use std::rc::Rc;

use log::debug;

use crate::attribute::Attributes;
use crate::descriptor::Descriptors;
use crate::errors::{ExecutionError, ParseError, ResolveError, VmError};
use crate::fields::{Field, Fields};
use crate::pool::ConstantPool;
use crate::reader::Reader;
use crate::runtime::{Frame, Interpreter};

pub const CLASS_FILE_MAGIC: u32 = 0xCAFE_BABE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(pub usize);

/// Host callback implementing a built-in method. The frame arrives
/// with locals populated per the invocation ABI and an empty stack;
/// a return value is left on top of that stack.
pub type NativeFn = fn(&mut Interpreter, &Method, &mut Frame) -> Result<(), ExecutionError>;

#[derive(Debug, Clone)]
pub enum MethodBody {
    Bytecode(Rc<[u8]>),
    Native(NativeFn),
}

/// A method bound to its owning class. Cheap to clone so invocation
/// can snapshot the target before touching the registry or heap.
#[derive(Debug, Clone)]
pub struct Method {
    pub owner: ClassId,
    pub name: Rc<str>,
    pub flags: u16,
    pub descriptors: Rc<Descriptors>,
    pub max_stack: u16,
    pub max_locals: u16,
    pub body: MethodBody,
}

impl Method {
    pub fn is_native(&self) -> bool {
        matches!(self.body, MethodBody::Native(_))
    }
}

#[derive(Debug)]
pub struct Class {
    pub id: ClassId,
    pub name: String,
    pub flags: u16,
    pub parent: Option<ClassId>,
    pub built_in: bool,
    /// Parsed classes only; built-ins carry no pool.
    pub pool: Option<ConstantPool>,
    /// Interface names, retained but unused by dispatch.
    pub interfaces: Vec<String>,
    pub methods: Vec<Method>,
    pub static_fields: Vec<Field>,
    pub static_initialized: bool,
    /// Template for instance allocation: declared non-static field
    /// names, in declaration order.
    pub instance_fields: Vec<String>,
}

impl Class {
    pub fn new(id: ClassId, name: impl Into<String>, flags: u16) -> Self {
        Self {
            id,
            name: name.into(),
            flags,
            parent: None,
            built_in: false,
            pool: None,
            interfaces: Vec::new(),
            methods: Vec::new(),
            static_fields: Vec::new(),
            static_initialized: false,
            instance_fields: Vec::new(),
        }
    }

    /// Exact-match lookup on `(name, descriptor)`.
    pub fn method(&self, name: &str, descriptor: &str) -> Option<&Method> {
        self.methods
            .iter()
            .find(|method| &*method.name == name && method.descriptors.raw == descriptor)
    }

    pub fn static_field(&self, name: &str) -> Option<&Field> {
        self.static_fields.iter().find(|field| field.name == name)
    }

    pub fn static_field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.static_fields
            .iter_mut()
            .find(|field| field.name == name)
    }
}

/// The process-wide table of loaded classes, in registration order.
#[derive(Debug, Default)]
pub struct Classes {
    classes: Vec<Class>,
    pub main_class: Option<ClassId>,
}

impl Classes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a class under the next dense id. Names are unique:
    /// once registered (built-in or parsed), a class cannot be
    /// overwritten.
    pub fn add(&mut self, mut class: Class) -> Result<ClassId, ResolveError> {
        if self.by_name(&class.name).is_some() {
            return Err(ResolveError::DuplicateClass(class.name));
        }
        let id = ClassId(self.classes.len());
        class.id = id;
        for method in &mut class.methods {
            method.owner = id;
        }
        self.classes.push(class);
        Ok(id)
    }

    pub fn get(&self, id: ClassId) -> &Class {
        &self.classes[id.0]
    }

    pub fn get_mut(&mut self, id: ClassId) -> &mut Class {
        &mut self.classes[id.0]
    }

    pub fn by_name(&self, name: &str) -> Option<ClassId> {
        self.classes
            .iter()
            .find(|class| class.name == name)
            .map(|class| class.id)
    }

    /// Resolves the class a pool entry refers to and looks it up.
    pub fn by_index(&self, pool: &ConstantPool, index: u16) -> Result<ClassId, ResolveError> {
        let name = pool.resolve_class_name(index);
        self.by_name(name)
            .ok_or_else(|| ResolveError::ClassNotFound(name.to_string()))
    }

    /// Scans for a method named exactly `main`; the first match wins
    /// and its class becomes the registry's main class.
    pub fn main_method(&mut self) -> Option<Method> {
        for class in &self.classes {
            if let Some(method) = class.methods.iter().find(|method| &*method.name == "main") {
                self.main_class = Some(class.id);
                return Some(method.clone());
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Byte source for named class files.
pub trait ClassSource {
    fn read_all(&self, filename: &str) -> io::Result<Vec<u8>>;
}

/// Reads `<name>.class` files from a directory.
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ClassSource for DirSource {
    fn read_all(&self, filename: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.root.join(filename))
    }
}

/// Parses class files into the registry, chasing referenced classes
/// until the registry is closed.
pub struct ClassLoader<'a> {
    classes: &'a mut Classes,
    source: &'a dyn ClassSource,
}

impl<'a> ClassLoader<'a> {
    pub fn new(classes: &'a mut Classes, source: &'a dyn ClassSource) -> Self {
        Self { classes, source }
    }

    /// Loads `<name>.class`, registers the class, then transitively
    /// loads every class its constant pool references. Failure to
    /// load a referenced class fails the whole load.
    pub fn load(&mut self, name: &str) -> Result<ClassId, VmError> {
        let filename = format!("{name}.class");
        let bytes = self
            .source
            .read_all(&filename)
            .map_err(|source| VmError::Io {
                path: filename,
                source,
            })?;
        let class = self.parse(&bytes)?;
        debug!("loaded class {}", class.name);
        let id = self.classes.add(class)?;
        self.resolve_unknowns(id)?;
        Ok(id)
    }

    fn parse(&self, bytes: &[u8]) -> Result<Class, VmError> {
        let mut reader = Reader::new(bytes);

        let magic = reader.read_u32_be()?;
        if magic != CLASS_FILE_MAGIC {
            return Err(ParseError::BadMagic(magic).into());
        }
        let _minor_version = reader.read_u16_be()?;
        let _major_version = reader.read_u16_be()?;

        let pool = ConstantPool::parse(&mut reader)?;
        let flags = reader.read_u16_be()?;
        let this_index = reader.read_u16_be()?;
        let super_index = reader.read_u16_be()?;
        let name = pool.resolve_string(this_index).to_string();
        // The parent must already be registered; built-ins are, and
        // referenced classes load depth-first below.
        let parent = self.classes.by_name(pool.resolve_string(super_index));

        let interfaces_count = reader.read_u16_be()?;
        let mut interfaces = Vec::with_capacity(interfaces_count as usize);
        for _ in 0..interfaces_count {
            let index = reader.read_u16_be()?;
            interfaces.push(pool.resolve_string(index).to_string());
        }

        let field_table = Fields::parse(&mut reader, &pool)?;
        let method_table = Fields::parse(&mut reader, &pool)?;
        let _class_attributes = Attributes::parse(&mut reader, &pool)?;

        let mut static_fields = Vec::new();
        let mut instance_fields = Vec::new();
        for info in field_table.iter() {
            if info.is_static() {
                static_fields.push(Field::new(info.name.clone()));
            } else {
                instance_fields.push(info.name.clone());
            }
        }

        let mut methods = Vec::with_capacity(method_table.entries.len());
        for info in method_table.iter() {
            let (max_stack, max_locals, code) =
                info.attributes.code().ok_or_else(|| ParseError::MissingCode {
                    class: name.clone(),
                    name: info.name.clone(),
                })?;
            methods.push(Method {
                // Patched when the class is registered.
                owner: ClassId(0),
                name: Rc::from(info.name.as_str()),
                flags: info.access_flags,
                descriptors: Rc::new(Descriptors::parse(&info.descriptor)),
                max_stack,
                max_locals,
                body: MethodBody::Bytecode(Rc::from(code)),
            });
        }

        let mut class = Class::new(ClassId(0), name, flags);
        class.parent = parent;
        class.pool = Some(pool);
        class.interfaces = interfaces;
        class.methods = methods;
        class.static_fields = static_fields;
        class.instance_fields = instance_fields;
        Ok(class)
    }

    /// Walks the pool of a freshly registered class and loads every
    /// referenced class the registry does not know yet. Registering
    /// before walking terminates reference cycles.
    fn resolve_unknowns(&mut self, id: ClassId) -> Result<(), VmError> {
        let class = self.classes.get(id);
        let Some(pool) = &class.pool else {
            return Ok(());
        };
        let own_name = class.name.clone();
        let referenced: Vec<String> = pool.class_references().map(str::to_string).collect();

        for raw in referenced {
            let name = strip_reference_markers(&raw);
            if name.is_empty() || name == own_name {
                continue;
            }
            if self.classes.by_name(name).is_some() {
                continue;
            }
            debug!("resolving referenced class {name}");
            self.load(name)?;
        }
        Ok(())
    }
}

/// Peels the array marker (`[`) and object wrapper (`L…;`) off a
/// pool-referenced class name.
fn strip_reference_markers(name: &str) -> &str {
    let name = name.trim_start_matches('[');
    name.strip_prefix('L')
        .and_then(|inner| inner.strip_suffix(';'))
        .unwrap_or(name)
}
