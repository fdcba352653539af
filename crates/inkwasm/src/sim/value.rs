//! Script values of the simulated engine.
//!
//! A small subset of JavaScript value semantics: property access with a
//! one-level prototype lookup, loose and strict equality, truthiness, and
//! typed arrays backed by little-endian bytes.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::kind::ObjectType;

/// A thrown script exception.
pub type Thrown = String;

/// Native function body: `(this, arguments) -> value`.
pub type NativeFn = dyn Fn(&Value, &[Value]) -> Result<Value, Thrown>;

/// Element type of a typed array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl ElementKind {
    pub const ALL: [ElementKind; 10] = [
        ElementKind::U8,
        ElementKind::I8,
        ElementKind::U16,
        ElementKind::I16,
        ElementKind::U32,
        ElementKind::I32,
        ElementKind::U64,
        ElementKind::I64,
        ElementKind::F32,
        ElementKind::F64,
    ];

    pub fn size(self) -> usize {
        match self {
            ElementKind::U8 | ElementKind::I8 => 1,
            ElementKind::U16 | ElementKind::I16 => 2,
            ElementKind::U32 | ElementKind::I32 | ElementKind::F32 => 4,
            ElementKind::U64 | ElementKind::I64 | ElementKind::F64 => 8,
        }
    }

    /// Name of the global constructor.
    pub fn constructor(self) -> &'static str {
        match self {
            ElementKind::U8 => "Uint8Array",
            ElementKind::I8 => "Int8Array",
            ElementKind::U16 => "Uint16Array",
            ElementKind::I16 => "Int16Array",
            ElementKind::U32 => "Uint32Array",
            ElementKind::I32 => "Int32Array",
            ElementKind::U64 => "BigUint64Array",
            ElementKind::I64 => "BigInt64Array",
            ElementKind::F32 => "Float32Array",
            ElementKind::F64 => "Float64Array",
        }
    }

    fn read(self, b: &[u8]) -> Value {
        fn arr<const N: usize>(b: &[u8]) -> [u8; N] {
            let mut out = [0; N];
            out.copy_from_slice(&b[..N]);
            out
        }
        match self {
            ElementKind::U8 => Value::Number(f64::from(b[0])),
            ElementKind::I8 => Value::Number(f64::from(b[0] as i8)),
            ElementKind::U16 => Value::Number(f64::from(u16::from_le_bytes(arr(b)))),
            ElementKind::I16 => Value::Number(f64::from(i16::from_le_bytes(arr(b)))),
            ElementKind::U32 => Value::Number(f64::from(u32::from_le_bytes(arr(b)))),
            ElementKind::I32 => Value::Number(f64::from(i32::from_le_bytes(arr(b)))),
            ElementKind::U64 => Value::BigInt(i128::from(u64::from_le_bytes(arr(b)))),
            ElementKind::I64 => Value::BigInt(i128::from(i64::from_le_bytes(arr(b)))),
            ElementKind::F32 => Value::Number(f64::from(f32::from_le_bytes(arr(b)))),
            ElementKind::F64 => Value::Number(f64::from_le_bytes(arr(b))),
        }
    }

    fn write(self, out: &mut [u8], value: &Value) -> Result<(), Thrown> {
        let bytes: Vec<u8> = match self {
            ElementKind::U64 | ElementKind::I64 => match value {
                Value::BigInt(v) => (*v as u64).to_le_bytes().to_vec(),
                other => return Err(format!("cannot convert {} to a BigInt", other.to_display())),
            },
            _ => {
                let n = value.to_number()?;
                match self {
                    ElementKind::U8 => vec![n as i64 as u8],
                    ElementKind::I8 => vec![n as i64 as i8 as u8],
                    ElementKind::U16 => (n as i64 as u16).to_le_bytes().to_vec(),
                    ElementKind::I16 => (n as i64 as i16).to_le_bytes().to_vec(),
                    ElementKind::U32 => (n as i64 as u32).to_le_bytes().to_vec(),
                    ElementKind::I32 => (n as i64 as i32).to_le_bytes().to_vec(),
                    ElementKind::F32 => (n as f32).to_le_bytes().to_vec(),
                    _ => n.to_le_bytes().to_vec(),
                }
            }
        };
        out[..bytes.len()].copy_from_slice(&bytes);
        Ok(())
    }
}

/// A typed array: element kind plus its bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedArray {
    pub kind: ElementKind,
    pub bytes: Vec<u8>,
}

impl TypedArray {
    pub fn len(&self) -> usize {
        self.bytes.len() / self.kind.size()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        let size = self.kind.size();
        self.bytes.get(index * size..(index + 1) * size).map(|b| self.kind.read(b))
    }

    fn set(&mut self, index: usize, value: &Value) -> Result<(), Thrown> {
        let size = self.kind.size();
        match self.bytes.get_mut(index * size..(index + 1) * size) {
            Some(slot) => self.kind.write(slot, value),
            // Out-of-bounds writes are dropped.
            None => Ok(()),
        }
    }

    /// Element values in order.
    pub fn values(&self) -> Vec<Value> {
        (0..self.len()).filter_map(|i| self.get(i)).collect()
    }
}

/// A native function with its own properties.
pub struct Function {
    pub name: String,
    pub properties: RefCell<BTreeMap<String, Value>>,
    body: Box<NativeFn>,
}

impl Function {
    pub fn call(&self, this: &Value, args: &[Value]) -> Result<Value, Thrown> {
        (self.body)(this, args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function {}()", self.name)
    }
}

/// A plain object. `class` is the constructor it was created by.
#[derive(Debug, Default)]
pub struct ObjectData {
    pub properties: BTreeMap<String, Value>,
    pub class: Option<Rc<Function>>,
}

/// One script value. Reference variants share identity through `Rc`.
#[derive(Debug, Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    BigInt(i128),
    String(Rc<str>),
    Symbol(Rc<str>),
    Function(Rc<Function>),
    Object(Rc<RefCell<ObjectData>>),
    Array(Rc<RefCell<Vec<Value>>>),
    Typed(Rc<RefCell<TypedArray>>),
}

impl Value {
    pub fn string(s: &str) -> Value {
        Value::String(Rc::from(s))
    }

    pub fn symbol(description: &str) -> Value {
        Value::Symbol(Rc::from(description))
    }

    /// An empty plain object.
    pub fn object() -> Value {
        Value::Object(Rc::default())
    }

    pub fn array(values: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(values)))
    }

    pub fn typed(kind: ElementKind, bytes: Vec<u8>) -> Value {
        Value::Typed(Rc::new(RefCell::new(TypedArray { kind, bytes })))
    }

    pub fn function(name: &str, body: impl Fn(&Value, &[Value]) -> Result<Value, Thrown> + 'static) -> Value {
        Value::Function(Rc::new(Function {
            name: name.to_string(),
            properties: RefCell::default(),
            body: Box::new(body),
        }))
    }

    /// An object holding `properties`.
    pub fn object_with(properties: impl IntoIterator<Item = (&'static str, Value)>) -> Value {
        let data = ObjectData {
            properties: properties.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            class: None,
        };
        Value::Object(Rc::new(RefCell::new(data)))
    }

    pub fn type_of(&self) -> ObjectType {
        match self {
            Value::Undefined => ObjectType::Undefined,
            Value::Null => ObjectType::Null,
            Value::Bool(_) => ObjectType::Boolean,
            Value::Number(_) => ObjectType::Number,
            Value::BigInt(_) => ObjectType::BigInt,
            Value::String(_) => ObjectType::String,
            Value::Symbol(_) => ObjectType::Symbol,
            Value::Function(_) => ObjectType::Function,
            Value::Object(_) | Value::Array(_) | Value::Typed(_) => ObjectType::Object,
        }
    }

    /// Length carried in the Object handle: UTF-16 units for strings,
    /// elements for arrays, bytes for typed arrays.
    pub fn handle_len(&self) -> u32 {
        match self {
            Value::String(s) => s.encode_utf16().count() as u32,
            Value::Array(a) => a.borrow().len() as u32,
            Value::Typed(t) => t.borrow().bytes.len() as u32,
            _ => 0,
        }
    }

    fn is_object_like(&self) -> bool {
        matches!(
            self,
            Value::Function(_) | Value::Object(_) | Value::Array(_) | Value::Typed(_)
        )
    }

    /// `obj[key]`.
    pub fn get(&self, key: &str) -> Result<Value, Thrown> {
        let index = key.parse::<usize>().ok();
        Ok(match self {
            Value::Undefined | Value::Null => {
                return Err(format!("cannot read properties of {} (reading '{key}')", self.to_display()))
            }
            Value::String(s) => match (key, index) {
                ("length", _) => Value::Number(s.encode_utf16().count() as f64),
                (_, Some(i)) => utf16_at(s, i),
                _ => Value::Undefined,
            },
            Value::Function(f) => match f.properties.borrow().get(key) {
                Some(v) => v.clone(),
                None if key == "name" => Value::string(&f.name),
                None => Value::Undefined,
            },
            Value::Object(o) => {
                let data = o.borrow();
                match data.properties.get(key) {
                    Some(v) => v.clone(),
                    None => match &data.class {
                        Some(class) => class
                            .properties
                            .borrow()
                            .get("prototype")
                            .map(|proto| proto.get(key))
                            .transpose()?
                            .unwrap_or(Value::Undefined),
                        None => Value::Undefined,
                    },
                }
            }
            Value::Array(a) => match (key, index) {
                ("length", _) => Value::Number(a.borrow().len() as f64),
                (_, Some(i)) => a.borrow().get(i).cloned().unwrap_or(Value::Undefined),
                _ => Value::Undefined,
            },
            Value::Typed(t) => match (key, index) {
                ("length", _) => Value::Number(t.borrow().len() as f64),
                ("byteLength", _) => Value::Number(t.borrow().bytes.len() as f64),
                (_, Some(i)) => t.borrow().get(i).unwrap_or(Value::Undefined),
                _ => Value::Undefined,
            },
            Value::Bool(_) | Value::Number(_) | Value::BigInt(_) | Value::Symbol(_) => Value::Undefined,
        })
    }

    /// `obj[key] = value`.
    pub fn set(&self, key: &str, value: Value) -> Result<(), Thrown> {
        let index = key.parse::<usize>().ok();
        match self {
            Value::Undefined | Value::Null => {
                return Err(format!("cannot set properties of {} (setting '{key}')", self.to_display()))
            }
            Value::Function(f) => {
                f.properties.borrow_mut().insert(key.to_string(), value);
            }
            Value::Object(o) => {
                o.borrow_mut().properties.insert(key.to_string(), value);
            }
            Value::Array(a) => {
                let mut a = a.borrow_mut();
                match (key, index) {
                    ("length", _) => {
                        let n = value.to_number()?;
                        if n < 0.0 || n.fract() != 0.0 {
                            return Err("invalid array length".into());
                        }
                        a.resize(n as usize, Value::Undefined);
                    }
                    (_, Some(i)) => {
                        if i >= a.len() {
                            a.resize(i + 1, Value::Undefined);
                        }
                        a[i] = value;
                    }
                    // Named properties on arrays are not modelled.
                    _ => {}
                }
            }
            Value::Typed(t) => {
                if let Some(i) = index {
                    t.borrow_mut().set(i, &value)?;
                }
            }
            // Writes to primitives are silently dropped.
            Value::Bool(_) | Value::Number(_) | Value::BigInt(_) | Value::String(_) | Value::Symbol(_) => {}
        }
        Ok(())
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::BigInt(v) => *v != 0,
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// `===`.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Typed(a), Value::Typed(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// `==`.
    pub fn loose_equals(&self, other: &Value) -> bool {
        use Value::*;
        if self.type_of() == other.type_of() {
            return self.strict_equals(other);
        }
        match (self, other) {
            (Undefined | Null, Undefined | Null) => true,
            (Undefined | Null, _) | (_, Undefined | Null) => false,
            (Number(n), String(s)) | (String(s), Number(n)) => *n == string_to_number(s),
            (BigInt(v), String(s)) | (String(s), BigInt(v)) => s.trim().parse::<i128>().is_ok_and(|p| p == *v),
            (BigInt(v), Number(n)) | (Number(n), BigInt(v)) => n.is_finite() && n.fract() == 0.0 && *v as f64 == *n,
            (Bool(b), _) => Number(f64::from(u8::from(*b))).loose_equals(other),
            (_, Bool(b)) => self.loose_equals(&Number(f64::from(u8::from(*b)))),
            (a, b) if b.is_object_like() && !a.is_object_like() => a.loose_equals(&b.to_primitive()),
            (a, b) if a.is_object_like() && !b.is_object_like() => a.to_primitive().loose_equals(b),
            _ => false,
        }
    }

    fn to_primitive(&self) -> Value {
        if self.is_object_like() {
            Value::string(&self.to_display())
        } else {
            self.clone()
        }
    }

    /// `Number(value)`; BigInts and Symbols throw.
    pub fn to_number(&self) -> Result<f64, Thrown> {
        match self {
            Value::Undefined => Ok(f64::NAN),
            Value::Null => Ok(0.0),
            Value::Bool(b) => Ok(f64::from(u8::from(*b))),
            Value::Number(n) => Ok(*n),
            Value::String(s) => Ok(string_to_number(s)),
            Value::BigInt(_) => Err("cannot mix BigInt and other types".into()),
            Value::Symbol(_) => Err("cannot convert a Symbol value to a number".into()),
            other => Ok(string_to_number(&other.to_display())),
        }
    }

    /// `String(value)`.
    pub fn to_display(&self) -> String {
        match self {
            Value::Undefined => "undefined".into(),
            Value::Null => "null".into(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => number_to_string(*n),
            Value::BigInt(v) => v.to_string(),
            Value::String(s) => s.to_string(),
            Value::Symbol(d) => format!("Symbol({d})"),
            Value::Function(f) => format!("function {}() {{ [native code] }}", f.name),
            Value::Object(_) => "[object Object]".into(),
            Value::Array(a) => join(&a.borrow()),
            Value::Typed(t) => join(&t.borrow().values()),
        }
    }
}

fn join(values: &[Value]) -> String {
    values
        .iter()
        .map(|v| match v {
            Value::Undefined | Value::Null => String::new(),
            other => other.to_display(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn utf16_at(s: &str, index: usize) -> Value {
    match s.encode_utf16().nth(index) {
        Some(unit) => Value::string(&String::from_utf16_lossy(&[unit])),
        None => Value::Undefined,
    }
}

fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".into()
    } else if n.is_infinite() {
        String::from(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i128)
    } else {
        format!("{n}")
    }
}

fn string_to_number(s: &str) -> f64 {
    let t = s.trim();
    match t {
        "" => 0.0,
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if t.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => f64::NAN,
        _ => t.parse().unwrap_or(f64::NAN),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loose_equality() {
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(!Value::Null.loose_equals(&Value::Number(0.0)));
        assert!(Value::Number(1.0).loose_equals(&Value::string("1")));
        assert!(Value::Number(0.0).loose_equals(&Value::string("")));
        assert!(Value::Bool(true).loose_equals(&Value::string("1")));
        assert!(Value::BigInt(10).loose_equals(&Value::Number(10.0)));
        assert!(Value::array(vec![Value::Number(1.0), Value::Number(2.0)]).loose_equals(&Value::string("1,2")));
        assert!(!Value::Number(f64::NAN).loose_equals(&Value::Number(f64::NAN)));
        assert!(!Value::string("abc").loose_equals(&Value::Number(f64::NAN)));
    }

    #[test]
    fn strict_equality_uses_identity_for_objects() {
        let a = Value::object();
        assert!(a.strict_equals(&a.clone()));
        assert!(!a.strict_equals(&Value::object()));
        assert!(Value::string("x").strict_equals(&Value::string("x")));
        assert!(!Value::Number(1.0).strict_equals(&Value::string("1")));
        let s = Value::symbol("s");
        assert!(!s.strict_equals(&Value::symbol("s")));
    }

    #[test]
    fn typed_array_elements() {
        let t = Value::typed(ElementKind::I16, vec![0; 6]);
        t.set("1", Value::Number(-2.0)).unwrap();
        assert!(t.get("1").unwrap().strict_equals(&Value::Number(-2.0)));
        assert!(t.get("length").unwrap().strict_equals(&Value::Number(3.0)));
        assert_eq!(t.handle_len(), 6);

        let big = Value::typed(ElementKind::U64, vec![0; 8]);
        assert!(big.set("0", Value::Number(1.0)).is_err());
        big.set("0", Value::BigInt(7)).unwrap();
        assert!(big.get("0").unwrap().strict_equals(&Value::BigInt(7)));
    }

    #[test]
    fn property_errors_on_nullish() {
        assert!(Value::Undefined.get("x").unwrap_err().contains("undefined"));
        assert!(Value::Null.set("x", Value::Null).is_err());
        assert!(matches!(Value::Number(1.0).get("x").unwrap(), Value::Undefined));
    }

    #[test]
    fn display_and_numbers() {
        assert_eq!(Value::Number(3.0).to_display(), "3");
        assert_eq!(Value::Number(-0.0).to_display(), "0");
        assert_eq!(Value::Number(0.5).to_display(), "0.5");
        assert_eq!(Value::string(" 12 ").to_number().unwrap(), 12.0);
        assert!(Value::string("inf").to_number().unwrap().is_nan());
        assert!(Value::BigInt(1).to_number().is_err());
    }
}
