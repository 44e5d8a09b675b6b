//! Object model
//!
//! This module defines every object variant that can live on the managed
//! heap. `HeapObject` is a closed enum: the tracer and the sweeper match on it
//! exhaustively, so an unhandled variant is a compile error rather than a
//! runtime failure.
//!
//! | Variant  | Outgoing references                          |
//! |----------|----------------------------------------------|
//! | String   | none                                         |
//! | Function | name, every object-valued constant           |
//! | Native   | none                                         |
//! | Closure  | function, each captured upvalue              |
//! | Upvalue  | the closed-over value, once closed           |

use crate::gc::ObjId;
use crate::value::Value;
use std::fmt;
use std::mem::size_of;

/// Discriminant of a heap object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjKind {
    /// Interned string
    String,
    /// Compiled function
    Function,
    /// Host function wrapper
    Native,
    /// Function plus captured upvalues
    Closure,
    /// Captured variable
    Upvalue,
}

/// Host function callable from bytecode
pub type NativeFn = fn(args: &[Value]) -> Value;

/// Immutable string object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjString {
    /// String contents
    pub chars: String,
}

impl ObjString {
    /// Create a string object
    pub fn new(chars: impl Into<String>) -> Self {
        Self {
            chars: chars.into(),
        }
    }

    /// Get the contents
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.chars
    }
}

/// Bytecode container owned by a function
///
/// The GC only reads `constants`; code and line tables are opaque to it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chunk {
    /// Instruction bytes
    pub code: Vec<u8>,
    /// Source line for each instruction byte
    pub lines: Vec<u32>,
    /// Constant pool
    pub constants: Vec<Value>,
}

impl Chunk {
    /// Create an empty chunk
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one instruction byte
    pub fn write(&mut self, byte: u8, line: u32) {
        self.code.push(byte);
        self.lines.push(line);
    }

    /// Append a constant and return its index
    pub fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    /// Bytes owned by the chunk's buffers
    pub fn payload_size(&self) -> usize {
        self.code.capacity()
            + self.lines.capacity() * size_of::<u32>()
            + self.constants.capacity() * size_of::<Value>()
    }
}

/// Compiled function object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjFunction {
    /// Number of parameters
    pub arity: u8,
    /// Number of upvalues closures over this function capture
    pub upvalue_count: usize,
    /// Bytecode and constants
    pub chunk: Chunk,
    /// Function name; `None` for the top-level script
    pub name: Option<ObjId>,
}

impl ObjFunction {
    /// Create an empty function
    pub fn new(name: Option<ObjId>) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }
}

/// Native function wrapper
#[derive(Clone, Copy)]
pub struct ObjNative {
    /// Host function pointer
    pub function: NativeFn,
}

impl fmt::Debug for ObjNative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjNative({:#x})", self.function as usize)
    }
}

/// Closure object
#[derive(Debug, Clone, PartialEq)]
pub struct ObjClosure {
    /// Underlying function
    pub function: ObjId,
    /// Captured upvalues; slots stay empty until the VM fills them in
    pub upvalues: Vec<Option<ObjId>>,
}

impl ObjClosure {
    /// Create a closure with `upvalue_count` empty capture slots
    pub fn new(function: ObjId, upvalue_count: usize) -> Self {
        Self {
            function,
            upvalues: vec![None; upvalue_count],
        }
    }
}

/// Where an upvalue's variable currently lives
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpvalueLocation {
    /// Still on the operand stack at this slot
    Open(usize),
    /// Hoisted off the stack
    Closed(Value),
}

/// Captured variable
#[derive(Debug, Clone, PartialEq)]
pub struct ObjUpvalue {
    /// Current location of the variable
    pub location: UpvalueLocation,
    /// Next entry in the VM's open-upvalue list
    pub next: Option<ObjId>,
}

impl ObjUpvalue {
    /// Create an open upvalue pointing at a stack slot
    pub fn open(slot: usize) -> Self {
        Self {
            location: UpvalueLocation::Open(slot),
            next: None,
        }
    }

    /// Stack slot, while the upvalue is open
    pub fn open_slot(&self) -> Option<usize> {
        match self.location {
            UpvalueLocation::Open(slot) => Some(slot),
            UpvalueLocation::Closed(_) => None,
        }
    }

    /// Closed-over value, once the upvalue is closed
    pub fn closed_value(&self) -> Option<Value> {
        match self.location {
            UpvalueLocation::Open(_) => None,
            UpvalueLocation::Closed(value) => Some(value),
        }
    }
}

/// An object stored on the managed heap
#[derive(Debug, Clone)]
pub enum HeapObject {
    /// String object
    String(ObjString),
    /// Function object
    Function(ObjFunction),
    /// Native function object
    Native(ObjNative),
    /// Closure object
    Closure(ObjClosure),
    /// Upvalue object
    Upvalue(ObjUpvalue),
}

impl HeapObject {
    /// Get the variant discriminant
    pub fn kind(&self) -> ObjKind {
        match self {
            HeapObject::String(_) => ObjKind::String,
            HeapObject::Function(_) => ObjKind::Function,
            HeapObject::Native(_) => ObjKind::Native,
            HeapObject::Closure(_) => ObjKind::Closure,
            HeapObject::Upvalue(_) => ObjKind::Upvalue,
        }
    }

    /// Bytes accounted to this object: the record plus its owned buffers
    pub fn size(&self) -> usize {
        let payload = match self {
            HeapObject::String(s) => s.chars.capacity(),
            HeapObject::Function(f) => f.chunk.payload_size(),
            HeapObject::Closure(c) => c.upvalues.capacity() * size_of::<Option<ObjId>>(),
            HeapObject::Native(_) | HeapObject::Upvalue(_) => 0,
        };
        size_of::<HeapObject>() + payload
    }

    /// Get as string
    pub fn as_string(&self) -> Option<&ObjString> {
        match self {
            HeapObject::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as function
    pub fn as_function(&self) -> Option<&ObjFunction> {
        match self {
            HeapObject::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Get as mutable function
    pub fn as_function_mut(&mut self) -> Option<&mut ObjFunction> {
        match self {
            HeapObject::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Get as native
    pub fn as_native(&self) -> Option<&ObjNative> {
        match self {
            HeapObject::Native(n) => Some(n),
            _ => None,
        }
    }

    /// Get as closure
    pub fn as_closure(&self) -> Option<&ObjClosure> {
        match self {
            HeapObject::Closure(c) => Some(c),
            _ => None,
        }
    }

    /// Get as mutable closure
    pub fn as_closure_mut(&mut self) -> Option<&mut ObjClosure> {
        match self {
            HeapObject::Closure(c) => Some(c),
            _ => None,
        }
    }

    /// Get as upvalue
    pub fn as_upvalue(&self) -> Option<&ObjUpvalue> {
        match self {
            HeapObject::Upvalue(u) => Some(u),
            _ => None,
        }
    }

    /// Get as mutable upvalue
    pub fn as_upvalue_mut(&mut self) -> Option<&mut ObjUpvalue> {
        match self {
            HeapObject::Upvalue(u) => Some(u),
            _ => None,
        }
    }
}

impl From<ObjString> for HeapObject {
    fn from(s: ObjString) -> Self {
        HeapObject::String(s)
    }
}

impl From<ObjFunction> for HeapObject {
    fn from(f: ObjFunction) -> Self {
        HeapObject::Function(f)
    }
}

impl From<ObjNative> for HeapObject {
    fn from(n: ObjNative) -> Self {
        HeapObject::Native(n)
    }
}

impl From<ObjClosure> for HeapObject {
    fn from(c: ObjClosure) -> Self {
        HeapObject::Closure(c)
    }
}

impl From<ObjUpvalue> for HeapObject {
    fn from(u: ObjUpvalue) -> Self {
        HeapObject::Upvalue(u)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn native_nil(_args: &[Value]) -> Value {
        Value::Nil
    }

    #[test]
    fn test_kind() {
        assert_eq!(HeapObject::from(ObjString::new("a")).kind(), ObjKind::String);
        assert_eq!(HeapObject::from(ObjFunction::new(None)).kind(), ObjKind::Function);
        assert_eq!(
            HeapObject::from(ObjNative { function: native_nil }).kind(),
            ObjKind::Native
        );
        assert_eq!(HeapObject::from(ObjUpvalue::open(0)).kind(), ObjKind::Upvalue);
    }

    #[test]
    fn test_size_includes_payload() {
        let short = HeapObject::from(ObjString::new("a"));
        let long = HeapObject::from(ObjString::new("a".repeat(256)));
        assert!(long.size() >= short.size() + 255);
        assert!(short.size() >= size_of::<HeapObject>());
    }

    #[test]
    fn test_upvalue_location() {
        let mut upvalue = ObjUpvalue::open(3);
        assert_eq!(upvalue.open_slot(), Some(3));
        assert_eq!(upvalue.closed_value(), None);

        upvalue.location = UpvalueLocation::Closed(Value::number(1.0));
        assert_eq!(upvalue.open_slot(), None);
        assert_eq!(upvalue.closed_value(), Some(Value::number(1.0)));
    }

    #[test]
    fn test_chunk_constants() {
        let mut chunk = Chunk::new();
        assert_eq!(chunk.add_constant(Value::number(1.0)), 0);
        assert_eq!(chunk.add_constant(Value::nil()), 1);
        chunk.write(0x01, 7);
        assert_eq!(chunk.code, vec![0x01]);
        assert_eq!(chunk.lines, vec![7]);
    }

    #[test]
    fn test_closure_slots_start_empty() {
        let function = ObjId::new(0, 0);
        let closure = ObjClosure::new(function, 2);
        assert_eq!(closure.upvalues, vec![None, None]);
    }
}
