//! In-process simulated script engine.
//!
//! [`SimEngine`] implements [`Boundary`] over a reference table with the
//! same handle semantics as the JavaScript runtime: every reference-holding
//! Object handed to the host owns one table slot until it is released.
//! Allocations, releases, and double releases are counted so tests can
//! check that host code balances its references.
//!
//! Exceptions raised by script functions are reported through `tracing`
//! under the `inkwasm::console` target, the way the browser runtime writes
//! them to the console.

mod value;

use std::cell::RefCell;
use std::rc::Rc;

pub use value::{ElementKind, Function, NativeFn, ObjectData, Thrown, TypedArray, Value};

use crate::abi::EncodedArgs;
use crate::args::Arg;
use crate::kind::ObjectType;
use crate::object::Object;
use crate::runtime::Boundary;

/// Reference accounting counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// References handed out.
    pub allocations: u64,
    /// References released.
    pub releases: u64,
    /// Releases of an already released reference.
    pub double_releases: u64,
    /// Script exceptions reported to the console.
    pub exceptions: u64,
}

impl Stats {
    /// References currently held by the host.
    pub fn live(&self) -> u64 {
        self.allocations - self.releases
    }
}

#[derive(Default)]
struct Table {
    slots: Vec<Option<Value>>,
    free_indices: Vec<u32>,
    stats: Stats,
}

impl Table {
    fn retain(&mut self, value: Value) -> u32 {
        self.stats.allocations += 1;
        match self.free_indices.pop() {
            Some(index) => {
                self.slots[index as usize] = Some(value);
                index
            }
            None => {
                self.slots.push(Some(value));
                (self.slots.len() - 1) as u32
            }
        }
    }

    fn release(&mut self, index: u32) {
        match self.slots.get_mut(index as usize).and_then(Option::take) {
            Some(_) => {
                self.stats.releases += 1;
                self.free_indices.push(index);
            }
            None => {
                self.stats.double_releases += 1;
                tracing::warn!(target: "inkwasm::console", reference = index, "release of a released reference");
            }
        }
    }
}

/// The simulated engine. Clones share the same engine state, so a test can
/// keep a handle after installing one.
#[derive(Clone)]
pub struct SimEngine {
    global: Value,
    table: Rc<RefCell<Table>>,
}

impl Default for SimEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SimEngine {
    /// An engine whose global object carries `Object`, `Array`, `Error`,
    /// the typed-array constructors, and `console`.
    pub fn new() -> Self {
        let global = Value::object();
        let engine = SimEngine {
            global,
            table: Rc::default(),
        };
        engine.install_builtins();
        engine
    }

    fn install_builtins(&self) {
        let define = |name: &str, value: Value| self.define(name, value);

        define("Object", Value::function("Object", |_, _| Ok(Value::Undefined)));
        define(
            "Array",
            Value::function("Array", |_, args| match args {
                [Value::Number(n)] if *n >= 0.0 && n.fract() == 0.0 => {
                    Ok(Value::array(vec![Value::Undefined; *n as usize]))
                }
                [Value::Number(_)] => Err("invalid array length".into()),
                _ => Ok(Value::array(args.to_vec())),
            }),
        );
        define(
            "Error",
            Value::function("Error", |this, args| {
                let message = args.first().map(Value::to_display).unwrap_or_default();
                this.set("message", Value::string(&message))?;
                Ok(Value::Undefined)
            }),
        );
        for kind in ElementKind::ALL {
            define(
                kind.constructor(),
                Value::function(kind.constructor(), move |_, args| typed_from(kind, args.first())),
            );
        }
        let log = |level: &'static str| {
            move |_: &Value, args: &[Value]| {
                let line = args.iter().map(Value::to_display).collect::<Vec<_>>().join(" ");
                match level {
                    "error" => tracing::error!(target: "inkwasm::console", "{line}"),
                    _ => tracing::info!(target: "inkwasm::console", "{line}"),
                }
                Ok::<_, Thrown>(Value::Undefined)
            }
        };
        define(
            "console",
            Value::object_with([
                ("log", Value::function("log", log("log"))),
                ("error", Value::function("error", log("error"))),
            ]),
        );
    }

    /// Set a property on the global object.
    pub fn define(&self, name: &str, value: Value) {
        // The global object is a plain object; setting never throws.
        let _ = self.global.set(name, value);
    }

    /// The global object.
    pub fn global_value(&self) -> Value {
        self.global.clone()
    }

    pub fn stats(&self) -> Stats {
        self.table.borrow().stats
    }

    /// The value behind an Object, `None` for released references.
    pub fn value_of(&self, object: &Object) -> Option<Value> {
        self.resolve(object).ok()
    }

    fn resolve(&self, object: &Object) -> Result<Value, Thrown> {
        Ok(match object.type_of() {
            ObjectType::Undefined => Value::Undefined,
            ObjectType::Null => Value::Null,
            ObjectType::Boolean | ObjectType::Number => inline_value(object),
            _ => {
                let reference = object.reference().unwrap_or(u32::MAX);
                self.table
                    .borrow()
                    .slots
                    .get(reference as usize)
                    .and_then(Option::clone)
                    .ok_or_else(|| format!("reference {reference} was released"))?
            }
        })
    }

    fn to_object(&self, value: Value) -> Object {
        match value {
            Value::Undefined => Object::inline(ObjectType::Undefined),
            Value::Null => Object::inline(ObjectType::Null),
            Value::Bool(b) => Object::boolean(b),
            Value::Number(n) => Object::number(n),
            other => {
                let typ = other.type_of();
                let len = other.handle_len();
                let reference = self.table.borrow_mut().retain(other);
                Object::from_reference(typ, reference, len)
            }
        }
    }

    fn convert(&self, arg: &Arg<'_>) -> Result<Value, Thrown> {
        fn typed<T: bytemuck::Pod>(kind: ElementKind, values: &[T]) -> Value {
            Value::typed(kind, bytemuck::cast_slice(values).to_vec())
        }
        Ok(match *arg {
            Arg::Object(ref object) => self.resolve(object)?,
            Arg::Str(s) => Value::string(s),
            Arg::F32(v) => Value::Number(f64::from(v)),
            Arg::F64(v) => Value::Number(v),
            Arg::Bool(v) => Value::Bool(v),
            Arg::I8(v) => Value::Number(f64::from(v)),
            Arg::I16(v) => Value::Number(f64::from(v)),
            Arg::I32(v) => Value::Number(f64::from(v)),
            Arg::U8(v) => Value::Number(f64::from(v)),
            Arg::U16(v) => Value::Number(f64::from(v)),
            Arg::U32(v) => Value::Number(f64::from(v)),
            Arg::Isize(v) => Value::Number(v as f64),
            Arg::Usize(v) | Arg::Ptr(v) => Value::Number(v as f64),
            Arg::I64(v) => Value::BigInt(i128::from(v)),
            Arg::U64(v) => Value::BigInt(i128::from(v)),
            Arg::I128(v) => Value::BigInt(v),
            Arg::U128(v) => i128::try_from(v).map(Value::BigInt).unwrap_or(Value::Number(v as f64)),
            Arg::U8s(s) => typed(ElementKind::U8, s),
            Arg::I8s(s) => typed(ElementKind::I8, s),
            Arg::U16s(s) => typed(ElementKind::U16, s),
            Arg::I16s(s) => typed(ElementKind::I16, s),
            Arg::U32s(s) => typed(ElementKind::U32, s),
            Arg::I32s(s) => typed(ElementKind::I32, s),
            Arg::U64s(s) => typed(ElementKind::U64, s),
            Arg::I64s(s) => typed(ElementKind::I64, s),
        })
    }

    fn decode(&self, args: &EncodedArgs<'_>) -> Result<Vec<Value>, Thrown> {
        args.iter().map(|arg| self.convert(&arg)).collect()
    }

    /// Report an exception or hand the value to the host.
    fn finish(&self, outcome: Result<Value, Thrown>) -> Option<Object> {
        match outcome {
            Ok(value) => Some(self.to_object(value)),
            Err(thrown) => {
                self.report(&thrown);
                None
            }
        }
    }

    fn report(&self, thrown: &str) {
        self.table.borrow_mut().stats.exceptions += 1;
        tracing::warn!(target: "inkwasm::console", "uncaught exception: {thrown}");
    }

    fn apply(callee: &Value, this: &Value, args: &[Value]) -> Result<Value, Thrown> {
        match callee {
            Value::Function(f) => f.call(this, args),
            other => Err(format!("{} is not a function", other.to_display())),
        }
    }

    fn construct_value(callee: &Value, args: &[Value]) -> Result<Value, Thrown> {
        let Value::Function(class) = callee else {
            return Err(format!("{} is not a constructor", callee.to_display()));
        };
        let instance = Value::Object(Rc::new(RefCell::new(ObjectData {
            properties: Default::default(),
            class: Some(Rc::clone(class)),
        })));
        match class.call(&instance, args)? {
            made @ (Value::Object(_) | Value::Array(_) | Value::Typed(_) | Value::Function(_)) => Ok(made),
            _ => Ok(instance),
        }
    }

    fn bool_outcome(&self, outcome: Result<bool, Thrown>) -> bool {
        outcome.unwrap_or_else(|thrown| {
            self.report(&thrown);
            false
        })
    }
}

fn inline_value(object: &Object) -> Value {
    match object.type_of() {
        ObjectType::Boolean => Value::Bool(object.as_bool().unwrap_or(false)),
        _ => Value::Number(object.as_float().unwrap_or(f64::NAN)),
    }
}

fn typed_from(kind: ElementKind, source: Option<&Value>) -> Result<Value, Thrown> {
    let values = match source {
        None => Vec::new(),
        Some(Value::Number(n)) => {
            return Ok(Value::typed(kind, vec![0; *n as usize * kind.size()]));
        }
        Some(Value::Array(a)) => a.borrow().clone(),
        Some(Value::Typed(t)) => t.borrow().values(),
        Some(other) => return Err(format!("cannot construct {} from {}", kind.constructor(), other.to_display())),
    };
    let out = Value::typed(kind, vec![0; values.len() * kind.size()]);
    for (i, v) in values.into_iter().enumerate() {
        out.set(&i.to_string(), v)?;
    }
    Ok(out)
}

impl Boundary for SimEngine {
    fn global(&self) -> Object {
        self.to_object(self.global.clone())
    }

    fn free(&self, reference: u32) {
        self.table.borrow_mut().release(reference);
    }

    fn make(&self, args: &EncodedArgs<'_>) -> Option<Object> {
        let outcome = self.decode(args).map(|values| {
            if values.is_empty() {
                Value::object()
            } else {
                Value::array(values)
            }
        });
        self.finish(outcome)
    }

    fn call(&self, target: &Object, method: &str, args: &EncodedArgs<'_>) -> Option<Object> {
        let outcome = (|| {
            let this = self.resolve(target)?;
            let args = self.decode(args)?;
            let callee = this.get(method)?;
            Self::apply(&callee, &this, &args)
        })();
        self.finish(outcome)
    }

    fn invoke(&self, target: &Object, args: &EncodedArgs<'_>) -> Option<Object> {
        let outcome = (|| {
            let callee = self.resolve(target)?;
            let args = self.decode(args)?;
            Self::apply(&callee, &Value::Undefined, &args)
        })();
        self.finish(outcome)
    }

    fn construct(&self, target: &Object, args: &EncodedArgs<'_>) -> Option<Object> {
        let outcome = (|| {
            let callee = self.resolve(target)?;
            let args = self.decode(args)?;
            Self::construct_value(&callee, &args)
        })();
        self.finish(outcome)
    }

    fn get_property(&self, target: &Object, name: &str) -> Option<Object> {
        let outcome = self.resolve(target).and_then(|v| v.get(name));
        self.finish(outcome)
    }

    fn get_index(&self, target: &Object, index: u32) -> Option<Object> {
        let outcome = self.resolve(target).and_then(|v| v.get(&index.to_string()));
        self.finish(outcome)
    }

    fn set_property(&self, target: &Object, name: &str, value: &Arg<'_>) -> bool {
        let outcome = (|| {
            let this = self.resolve(target)?;
            this.set(name, self.convert(value)?)
        })();
        self.bool_outcome(outcome.map(|()| true))
    }

    fn encode_string(&self, target: &Object) -> Option<Object> {
        let outcome = self.resolve(target).and_then(|v| match v {
            Value::String(s) => Ok(Value::typed(ElementKind::U8, s.as_bytes().to_vec())),
            other => Err(format!("{} is not a string", other.to_display())),
        });
        self.finish(outcome)
    }

    fn copy_bytes(&self, source: &Object, buf: &mut [u8]) -> usize {
        let bytes = match self.resolve(source) {
            Ok(Value::Typed(t)) => t.borrow().bytes.clone(),
            Ok(Value::Array(a)) => a
                .borrow()
                .iter()
                .map(|v| v.to_number().map(|n| n as i64 as u8).unwrap_or(0))
                .collect(),
            _ => return 0,
        };
        let n = bytes.len().min(buf.len());
        buf[..n].copy_from_slice(&bytes[..n]);
        n
    }

    fn instance_of(&self, target: &Object, constructor: &Object) -> bool {
        let outcome = (|| {
            let value = self.resolve(target)?;
            let Value::Function(class) = self.resolve(constructor)? else {
                return Err("right-hand side of 'instanceof' is not callable".to_string());
            };
            Ok(match &value {
                Value::Object(o) => {
                    class.name == "Object" || o.borrow().class.as_ref().is_some_and(|c| Rc::ptr_eq(c, &class))
                }
                Value::Array(_) => class.name == "Array" || class.name == "Object",
                Value::Typed(t) => class.name == t.borrow().kind.constructor() || class.name == "Object",
                Value::Function(_) => class.name == "Function" || class.name == "Object",
                _ => false,
            })
        })();
        self.bool_outcome(outcome)
    }

    fn equal(&self, a: &Object, b: &Object) -> bool {
        let outcome = self.resolve(a).and_then(|a| Ok(a.loose_equals(&self.resolve(b)?)));
        self.bool_outcome(outcome)
    }

    fn strict_equal(&self, a: &Object, b: &Object) -> bool {
        let outcome = self.resolve(a).and_then(|a| Ok(a.strict_equals(&self.resolve(b)?)));
        self.bool_outcome(outcome)
    }

    fn truthy(&self, target: &Object) -> bool {
        let outcome = self.resolve(target).map(|v| v.truthy());
        self.bool_outcome(outcome)
    }

    fn bigint(&self, target: &Object) -> Option<i128> {
        match self.resolve(target) {
            Ok(Value::BigInt(v)) => Some(v),
            _ => None,
        }
    }
}
