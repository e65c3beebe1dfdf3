//! Dynamically typed tagged values.
//!
//! [`Variant`] holds exactly one of a closed set of kinds: scalars inline,
//! cheaply clonable shared payloads for strings, byte blobs and big
//! integers, and reference-counted containers for lists, maps, promises,
//! functions and user objects — cloning a variant shares the payload, and
//! the payload is freed when the last holder drops. [`Json`] is the same
//! value viewed as a JSON document (see [`crate::json`] for the text
//! codec and [`crate::bin`] for the binary one).
//!
//! Typed getters never fail: they coerce between the numeric kinds, parse
//! numeric strings, and fall back to the caller's default. The conversion
//! protocol in [`convert`] bridges arbitrary Rust types at compile time;
//! the capability traits in [`object`] make any list-like or map-like
//! payload uniformly indexable.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use bytes::Bytes;
use ethnum::I256;

use crate::map::OrdMap;
use crate::sync::Shared;

pub mod convert;
pub mod object;

pub use convert::{json_from, variant_from, FromJson, FromVariant, ToJson, ToVariant};
pub use object::{Collection, Dictionary, Promise, VariantObject, WeakRef};

/// Shared list payload; all holding variants see one vector.
pub type VariantList = Shared<Vec<Variant>>;

/// Shared map payload, ordered by key.
pub type VariantMap = Shared<OrdMap<String, Variant>>;

/// Callable payload.
pub type VariantFn = dyn Fn(&[Variant]) -> Variant + Send + Sync;

/// Microsecond-resolution instant counted from the Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Time {
    micros: i64,
}

impl Time {
    pub const fn from_micros(micros: i64) -> Self {
        Time { micros }
    }

    pub const fn micros(self) -> i64 {
        self.micros
    }

    /// Converts from a [`hifitime::Epoch`]; exact at whole-microsecond
    /// resolution near the present era.
    pub fn from_epoch(epoch: hifitime::Epoch) -> Self {
        Time {
            micros: (epoch.to_unix_seconds() * 1_000_000.0).round() as i64,
        }
    }

    pub fn to_epoch(self) -> hifitime::Epoch {
        hifitime::Epoch::from_unix_seconds(self.micros as f64 / 1_000_000.0)
    }
}

impl From<hifitime::Epoch> for Time {
    fn from(epoch: hifitime::Epoch) -> Self {
        Time::from_epoch(epoch)
    }
}

impl fmt::Debug for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Time({}us)", self.micros)
    }
}

/// 12-byte identifier, rendered as 24 lowercase hex digits.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ObjectId(pub [u8; 12]);

impl ObjectId {
    pub fn from_hex(text: &str) -> Option<Self> {
        let bytes = hex::decode(text).ok()?;
        Some(ObjectId(bytes.try_into().ok()?))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", hex::encode(self.0))
    }
}

/// One-byte wire tag; fully determines how a payload is read.
///
/// `String16`/`String32` exist for wire compatibility with UTF-16/UTF-32
/// producers — in memory every string is UTF-8 and tagged `String8`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(u8)]
pub enum VariantType {
    Null = 0,
    Int32 = 1,
    Uint32 = 2,
    Int64 = 3,
    Uint64 = 4,
    Float = 5,
    Double = 6,
    Boolean = 7,
    String8 = 8,
    String16 = 9,
    String32 = 10,
    Time = 12,
    Pointer = 13,
    ObjectId = 14,
    Memory = 15,
    BigInt = 16,
    List = 17,
    Map = 18,
    Object = 20,
    Promise = 21,
    Function = 22,
    Weak = 30,
}

impl VariantType {
    pub fn from_u8(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => VariantType::Null,
            1 => VariantType::Int32,
            2 => VariantType::Uint32,
            3 => VariantType::Int64,
            4 => VariantType::Uint64,
            5 => VariantType::Float,
            6 => VariantType::Double,
            7 => VariantType::Boolean,
            8 => VariantType::String8,
            9 => VariantType::String16,
            10 => VariantType::String32,
            12 => VariantType::Time,
            13 => VariantType::Pointer,
            14 => VariantType::ObjectId,
            15 => VariantType::Memory,
            16 => VariantType::BigInt,
            17 => VariantType::List,
            18 => VariantType::Map,
            20 => VariantType::Object,
            21 => VariantType::Promise,
            22 => VariantType::Function,
            30 => VariantType::Weak,
            _ => return None,
        })
    }
}

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Variant {
    #[default]
    Null,
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    String(Arc<str>),
    Time(Time),
    /// Opaque address-sized token; carried but never serialized.
    Pointer(usize),
    ObjectId(ObjectId),
    Memory(Bytes),
    BigInt(I256),
    List(VariantList),
    Map(VariantMap),
    Object(Arc<dyn VariantObject>),
    Promise(Arc<Promise>),
    Function(Arc<VariantFn>),
    Weak(WeakRef),
}

fn same_arc<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl Variant {
    /// An empty shared list.
    pub fn new_list() -> Variant {
        Variant::List(Shared::new(Vec::new()))
    }

    /// An empty shared map.
    pub fn new_map() -> Variant {
        Variant::Map(Shared::new(OrdMap::new()))
    }

    pub fn function(f: impl Fn(&[Variant]) -> Variant + Send + Sync + 'static) -> Variant {
        Variant::Function(Arc::new(f))
    }

    pub fn object(o: impl VariantObject) -> Variant {
        Variant::Object(Arc::new(o))
    }

    pub fn variant_type(&self) -> VariantType {
        match self {
            Variant::Null => VariantType::Null,
            Variant::Int32(_) => VariantType::Int32,
            Variant::UInt32(_) => VariantType::Uint32,
            Variant::Int64(_) => VariantType::Int64,
            Variant::UInt64(_) => VariantType::Uint64,
            Variant::Float(_) => VariantType::Float,
            Variant::Double(_) => VariantType::Double,
            Variant::Boolean(_) => VariantType::Boolean,
            Variant::String(_) => VariantType::String8,
            Variant::Time(_) => VariantType::Time,
            Variant::Pointer(_) => VariantType::Pointer,
            Variant::ObjectId(_) => VariantType::ObjectId,
            Variant::Memory(_) => VariantType::Memory,
            Variant::BigInt(_) => VariantType::BigInt,
            Variant::List(_) => VariantType::List,
            Variant::Map(_) => VariantType::Map,
            Variant::Object(_) => VariantType::Object,
            Variant::Promise(_) => VariantType::Promise,
            Variant::Function(_) => VariantType::Function,
            Variant::Weak(_) => VariantType::Weak,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Variant::Null)
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, Variant::Boolean(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(
            self,
            Variant::Int32(_)
                | Variant::UInt32(_)
                | Variant::Int64(_)
                | Variant::UInt64(_)
                | Variant::Float(_)
                | Variant::Double(_)
        )
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Variant::String(_))
    }

    pub fn is_time(&self) -> bool {
        matches!(self, Variant::Time(_))
    }

    pub fn is_memory(&self) -> bool {
        matches!(self, Variant::Memory(_))
    }

    pub fn is_bigint(&self) -> bool {
        matches!(self, Variant::BigInt(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Variant::List(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Variant::Map(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Variant::Object(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Variant::Function(_))
    }

    pub fn is_promise(&self) -> bool {
        matches!(self, Variant::Promise(_))
    }

    pub fn is_weak(&self) -> bool {
        matches!(self, Variant::Weak(_))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Variant::Pointer(_))
    }

    /// `true` for the reference-counted payload kinds.
    pub fn is_ref(&self) -> bool {
        matches!(
            self,
            Variant::List(_)
                | Variant::Map(_)
                | Variant::Object(_)
                | Variant::Promise(_)
                | Variant::Function(_)
        )
    }

    fn parse_i64(text: &str) -> Option<i64> {
        let text = text.trim();
        if let Ok(v) = text.parse::<i64>() {
            return Some(v);
        }
        text.parse::<f64>().ok().map(|v| v as i64)
    }

    fn parse_u64(text: &str) -> Option<u64> {
        let text = text.trim();
        if let Ok(v) = text.parse::<u64>() {
            return Some(v);
        }
        text.parse::<f64>().ok().map(|v| v as u64)
    }

    pub(crate) fn coerce_i64(&self) -> Option<i64> {
        match self {
            Variant::Int32(v) => Some(*v as i64),
            Variant::UInt32(v) => Some(*v as i64),
            Variant::Int64(v) => Some(*v),
            Variant::UInt64(v) => i64::try_from(*v).ok(),
            Variant::Float(v) => Some(*v as i64),
            Variant::Double(v) => Some(*v as i64),
            Variant::Boolean(v) => Some(*v as i64),
            Variant::String(s) => Self::parse_i64(s),
            Variant::Time(t) => Some(t.micros()),
            Variant::BigInt(v) => {
                if *v >= I256::from(i64::MIN) && *v <= I256::from(i64::MAX) {
                    Some(v.as_i64())
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub(crate) fn coerce_u64(&self) -> Option<u64> {
        match self {
            Variant::Int32(v) => u64::try_from(*v).ok(),
            Variant::UInt32(v) => Some(*v as u64),
            Variant::Int64(v) => u64::try_from(*v).ok(),
            Variant::UInt64(v) => Some(*v),
            Variant::Float(v) => Some(*v as u64),
            Variant::Double(v) => Some(*v as u64),
            Variant::Boolean(v) => Some(*v as u64),
            Variant::String(s) => Self::parse_u64(s),
            Variant::Time(t) => u64::try_from(t.micros()).ok(),
            Variant::BigInt(v) => {
                if *v >= I256::ZERO && *v <= I256::from(u64::MAX) {
                    Some(v.as_u64())
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub(crate) fn coerce_f64(&self) -> Option<f64> {
        match self {
            Variant::Int32(v) => Some(*v as f64),
            Variant::UInt32(v) => Some(*v as f64),
            Variant::Int64(v) => Some(*v as f64),
            Variant::UInt64(v) => Some(*v as f64),
            Variant::Float(v) => Some(*v as f64),
            Variant::Double(v) => Some(*v),
            Variant::Boolean(v) => Some(*v as u8 as f64),
            Variant::String(s) => s.trim().parse::<f64>().ok(),
            Variant::Time(t) => Some(t.micros() as f64),
            Variant::BigInt(v) => Some(v.as_f64()),
            _ => None,
        }
    }

    pub(crate) fn coerce_bool(&self) -> Option<bool> {
        match self {
            Variant::Boolean(v) => Some(*v),
            Variant::Int32(v) => Some(*v != 0),
            Variant::UInt32(v) => Some(*v != 0),
            Variant::Int64(v) => Some(*v != 0),
            Variant::UInt64(v) => Some(*v != 0),
            Variant::String(s) => match s.trim() {
                "true" | "1" | "yes" => Some(true),
                "false" | "0" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub(crate) fn coerce_string(&self) -> Option<String> {
        match self {
            Variant::String(s) => Some(s.to_string()),
            Variant::Boolean(v) => Some(v.to_string()),
            Variant::Int32(v) => Some(v.to_string()),
            Variant::UInt32(v) => Some(v.to_string()),
            Variant::Int64(v) => Some(v.to_string()),
            Variant::UInt64(v) => Some(v.to_string()),
            Variant::Float(v) => Some(v.to_string()),
            Variant::Double(v) => Some(v.to_string()),
            Variant::Time(t) => Some(t.micros().to_string()),
            Variant::BigInt(v) => Some(v.to_string()),
            Variant::ObjectId(id) => Some(id.to_string()),
            _ => None,
        }
    }

    pub fn get_bool(&self, def: bool) -> bool {
        self.coerce_bool().unwrap_or(def)
    }

    pub fn get_i32(&self, def: i32) -> i32 {
        self.coerce_i64().map(|v| v as i32).unwrap_or(def)
    }

    pub fn get_u32(&self, def: u32) -> u32 {
        self.coerce_u64().map(|v| v as u32).unwrap_or(def)
    }

    pub fn get_i64(&self, def: i64) -> i64 {
        self.coerce_i64().unwrap_or(def)
    }

    pub fn get_u64(&self, def: u64) -> u64 {
        self.coerce_u64().unwrap_or(def)
    }

    pub fn get_f32(&self, def: f32) -> f32 {
        self.coerce_f64().map(|v| v as f32).unwrap_or(def)
    }

    pub fn get_f64(&self, def: f64) -> f64 {
        self.coerce_f64().unwrap_or(def)
    }

    pub fn get_string(&self, def: &str) -> String {
        self.coerce_string().unwrap_or_else(|| def.to_string())
    }

    /// The string payload without coercion.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn get_time(&self) -> Option<Time> {
        match self {
            Variant::Time(t) => Some(*t),
            Variant::Int64(micros) => Some(Time::from_micros(*micros)),
            _ => None,
        }
    }

    pub fn get_memory(&self) -> Option<Bytes> {
        match self {
            Variant::Memory(m) => Some(m.clone()),
            _ => None,
        }
    }

    pub fn get_object_id(&self) -> Option<ObjectId> {
        match self {
            Variant::ObjectId(id) => Some(*id),
            Variant::String(s) => ObjectId::from_hex(s),
            _ => None,
        }
    }

    pub fn get_bigint(&self) -> Option<I256> {
        match self {
            Variant::BigInt(v) => Some(*v),
            Variant::Int32(v) => Some(I256::from(*v)),
            Variant::UInt32(v) => Some(I256::from(*v)),
            Variant::Int64(v) => Some(I256::from(*v)),
            Variant::UInt64(v) => Some(I256::from(*v)),
            _ => None,
        }
    }

    pub fn get_list(&self) -> Option<VariantList> {
        match self {
            Variant::List(l) => Some(l.clone()),
            _ => None,
        }
    }

    pub fn get_map(&self) -> Option<VariantMap> {
        match self {
            Variant::Map(m) => Some(m.clone()),
            _ => None,
        }
    }

    fn collection(&self) -> Option<&dyn Collection> {
        match self {
            Variant::List(l) => Some(l),
            Variant::Object(o) => o.as_collection(),
            _ => None,
        }
    }

    fn dictionary(&self) -> Option<&dyn Dictionary> {
        match self {
            Variant::Map(m) => Some(m),
            Variant::Object(o) => o.as_dictionary(),
            _ => None,
        }
    }

    /// Element or entry count of a list-like or map-like payload; zero
    /// otherwise.
    pub fn element_count(&self) -> usize {
        if let Some(collection) = self.collection() {
            collection.len()
        } else if let Some(dictionary) = self.dictionary() {
            dictionary.len()
        } else {
            0
        }
    }

    /// Indexed read through the [`Collection`] capability; `Null` when the
    /// payload is not list-like or the index is out of range.
    pub fn element(&self, index: usize) -> Variant {
        self.collection()
            .map(|c| c.element(index))
            .unwrap_or(Variant::Null)
    }

    pub fn set_element(&self, index: usize, value: Variant) -> bool {
        self.collection()
            .map(|c| c.set_element(index, value))
            .unwrap_or(false)
    }

    pub fn add_element(&self, value: Variant) -> bool {
        self.collection()
            .map(|c| c.add_element(value))
            .unwrap_or(false)
    }

    /// Keyed read through the [`Dictionary`] capability; `Null` when the
    /// payload is not map-like or the key is absent.
    pub fn item(&self, key: &str) -> Variant {
        self.dictionary()
            .map(|d| d.item(key))
            .unwrap_or(Variant::Null)
    }

    pub fn put_item(&self, key: &str, value: Variant) -> bool {
        self.dictionary()
            .map(|d| d.put_item(key, value))
            .unwrap_or(false)
    }

    pub fn remove_item(&self, key: &str) -> bool {
        self.dictionary()
            .map(|d| d.remove_item(key))
            .unwrap_or(false)
    }

    /// Calls a function payload; `Null` for every other kind.
    pub fn call(&self, args: &[Variant]) -> Variant {
        match self {
            Variant::Function(f) => f(args),
            _ => Variant::Null,
        }
    }

    /// Weak handle to a list or map payload; `None` for other kinds.
    pub fn downgrade(&self) -> Option<Variant> {
        match self {
            Variant::List(l) => Some(Variant::Weak(WeakRef::List(l.downgrade()))),
            Variant::Map(m) => Some(Variant::Weak(WeakRef::Map(m.downgrade()))),
            _ => None,
        }
    }

    /// Restores a strong variant from a weak payload while it is alive.
    pub fn upgrade(&self) -> Option<Variant> {
        match self {
            Variant::Weak(w) => w.upgrade(),
            _ => None,
        }
    }
}

impl PartialEq for Variant {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Variant::Null, Variant::Null) => true,
            (Variant::Int32(a), Variant::Int32(b)) => a == b,
            (Variant::UInt32(a), Variant::UInt32(b)) => a == b,
            (Variant::Int64(a), Variant::Int64(b)) => a == b,
            (Variant::UInt64(a), Variant::UInt64(b)) => a == b,
            (Variant::Float(a), Variant::Float(b)) => a == b,
            (Variant::Double(a), Variant::Double(b)) => a == b,
            (Variant::Boolean(a), Variant::Boolean(b)) => a == b,
            (Variant::String(a), Variant::String(b)) => a == b,
            (Variant::Time(a), Variant::Time(b)) => a == b,
            (Variant::Pointer(a), Variant::Pointer(b)) => a == b,
            (Variant::ObjectId(a), Variant::ObjectId(b)) => a == b,
            (Variant::Memory(a), Variant::Memory(b)) => a == b,
            (Variant::BigInt(a), Variant::BigInt(b)) => a == b,
            (Variant::List(a), Variant::List(b)) => {
                a.ptr_eq(b) || a.with(|x| b.with(|y| x == y))
            }
            (Variant::Map(a), Variant::Map(b)) => {
                a.ptr_eq(b) || a.with(|x| b.with(|y| x == y))
            }
            (Variant::Object(a), Variant::Object(b)) => same_arc(a, b),
            (Variant::Promise(a), Variant::Promise(b)) => same_arc(a, b),
            (Variant::Function(a), Variant::Function(b)) => same_arc(a, b),
            (Variant::Weak(a), Variant::Weak(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Null => f.write_str("Null"),
            Variant::Int32(v) => f.debug_tuple("Int32").field(v).finish(),
            Variant::UInt32(v) => f.debug_tuple("UInt32").field(v).finish(),
            Variant::Int64(v) => f.debug_tuple("Int64").field(v).finish(),
            Variant::UInt64(v) => f.debug_tuple("UInt64").field(v).finish(),
            Variant::Float(v) => f.debug_tuple("Float").field(v).finish(),
            Variant::Double(v) => f.debug_tuple("Double").field(v).finish(),
            Variant::Boolean(v) => f.debug_tuple("Boolean").field(v).finish(),
            Variant::String(v) => f.debug_tuple("String").field(v).finish(),
            Variant::Time(v) => fmt::Debug::fmt(v, f),
            Variant::Pointer(v) => write!(f, "Pointer({v:#x})"),
            Variant::ObjectId(v) => fmt::Debug::fmt(v, f),
            Variant::Memory(m) => {
                if m.len() <= 16 {
                    write!(f, "Memory({})", hex::encode(m))
                } else {
                    write!(f, "Memory({}.. {} bytes)", hex::encode(&m[..16]), m.len())
                }
            }
            Variant::BigInt(v) => f.debug_tuple("BigInt").field(v).finish(),
            Variant::List(l) => l.with(|items| f.debug_list().entries(items.iter()).finish()),
            Variant::Map(m) => m.with(|map| f.debug_map().entries(map.iter()).finish()),
            Variant::Object(_) => f.write_str("<object>"),
            Variant::Promise(p) => fmt::Debug::fmt(p, f),
            Variant::Function(_) => f.write_str("<fn>"),
            Variant::Weak(w) => fmt::Debug::fmt(w, f),
        }
    }
}

impl From<i8> for Variant {
    fn from(v: i8) -> Self {
        Variant::Int32(v as i32)
    }
}

impl From<i16> for Variant {
    fn from(v: i16) -> Self {
        Variant::Int32(v as i32)
    }
}

impl From<i32> for Variant {
    fn from(v: i32) -> Self {
        Variant::Int32(v)
    }
}

impl From<i64> for Variant {
    fn from(v: i64) -> Self {
        Variant::Int64(v)
    }
}

impl From<u8> for Variant {
    fn from(v: u8) -> Self {
        Variant::UInt32(v as u32)
    }
}

impl From<u16> for Variant {
    fn from(v: u16) -> Self {
        Variant::UInt32(v as u32)
    }
}

impl From<u32> for Variant {
    fn from(v: u32) -> Self {
        Variant::UInt32(v)
    }
}

impl From<u64> for Variant {
    fn from(v: u64) -> Self {
        Variant::UInt64(v)
    }
}

impl From<f32> for Variant {
    fn from(v: f32) -> Self {
        Variant::Float(v)
    }
}

impl From<f64> for Variant {
    fn from(v: f64) -> Self {
        Variant::Double(v)
    }
}

impl From<bool> for Variant {
    fn from(v: bool) -> Self {
        Variant::Boolean(v)
    }
}

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Variant::String(Arc::from(v))
    }
}

impl From<String> for Variant {
    fn from(v: String) -> Self {
        Variant::String(Arc::from(v))
    }
}

impl From<Arc<str>> for Variant {
    fn from(v: Arc<str>) -> Self {
        Variant::String(v)
    }
}

impl From<Time> for Variant {
    fn from(v: Time) -> Self {
        Variant::Time(v)
    }
}

impl From<ObjectId> for Variant {
    fn from(v: ObjectId) -> Self {
        Variant::ObjectId(v)
    }
}

impl From<Bytes> for Variant {
    fn from(v: Bytes) -> Self {
        Variant::Memory(v)
    }
}

impl From<I256> for Variant {
    fn from(v: I256) -> Self {
        Variant::BigInt(v)
    }
}

impl From<Vec<Variant>> for Variant {
    fn from(v: Vec<Variant>) -> Self {
        Variant::List(Shared::new(v))
    }
}

impl From<VariantList> for Variant {
    fn from(v: VariantList) -> Self {
        Variant::List(v)
    }
}

impl From<OrdMap<String, Variant>> for Variant {
    fn from(v: OrdMap<String, Variant>) -> Self {
        Variant::Map(Shared::new(v))
    }
}

impl From<VariantMap> for Variant {
    fn from(v: VariantMap) -> Self {
        Variant::Map(v)
    }
}

/// A [`Variant`] viewed as a JSON document.
#[derive(Clone, PartialEq, Default)]
#[repr(transparent)]
pub struct Json(pub Variant);

impl Json {
    pub fn null() -> Json {
        Json(Variant::Null)
    }

    pub fn new_list() -> Json {
        Json(Variant::new_list())
    }

    pub fn new_map() -> Json {
        Json(Variant::new_map())
    }

    pub fn into_variant(self) -> Variant {
        self.0
    }
}

impl Deref for Json {
    type Target = Variant;

    fn deref(&self) -> &Variant {
        &self.0
    }
}

impl DerefMut for Json {
    fn deref_mut(&mut self) -> &mut Variant {
        &mut self.0
    }
}

impl From<Variant> for Json {
    fn from(v: Variant) -> Self {
        Json(v)
    }
}

impl From<Json> for Variant {
    fn from(j: Json) -> Self {
        j.0
    }
}

impl fmt::Debug for Json {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Json").field(&self.0).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_stable() {
        assert_eq!(VariantType::Null as u8, 0);
        assert_eq!(VariantType::Boolean as u8, 7);
        assert_eq!(VariantType::String8 as u8, 8);
        assert_eq!(VariantType::Time as u8, 12);
        assert_eq!(VariantType::Object as u8, 20);
        assert_eq!(VariantType::Weak as u8, 30);
        for tag in 0..=40u8 {
            if let Some(t) = VariantType::from_u8(tag) {
                assert_eq!(t as u8, tag);
            }
        }
    }

    #[test]
    fn numeric_coercion() {
        assert_eq!(Variant::from(42i32).get_i64(0), 42);
        assert_eq!(Variant::from(42u64).get_i32(0), 42);
        assert_eq!(Variant::from(2.75f64).get_i32(0), 2);
        assert_eq!(Variant::from(true).get_i32(0), 1);
        assert_eq!(Variant::from("17").get_i32(0), 17);
        assert_eq!(Variant::from("2.5").get_f64(0.0), 2.5);
        assert_eq!(Variant::from("junk").get_i32(-1), -1);
        assert_eq!(Variant::Null.get_u64(9), 9);
    }

    #[test]
    fn string_coercion() {
        assert_eq!(Variant::from(5i32).get_string("x"), "5");
        assert_eq!(Variant::from("s").get_string("x"), "s");
        assert_eq!(Variant::new_list().get_string("x"), "x");
        assert_eq!(Variant::from(true).get_string(""), "true");
    }

    #[test]
    fn bool_coercion() {
        assert!(Variant::from("true").get_bool(false));
        assert!(!Variant::from("no").get_bool(true));
        assert!(Variant::from(3i32).get_bool(false));
        assert!(Variant::from("?").get_bool(true));
    }

    #[test]
    fn list_capability() {
        let list = Variant::new_list();
        assert!(list.add_element(Variant::from(1)));
        assert!(list.add_element(Variant::from("two")));
        assert_eq!(list.element_count(), 2);
        assert_eq!(list.element(1).get_string(""), "two");
        assert!(list.set_element(0, Variant::from(10)));
        assert_eq!(list.element(0).get_i32(0), 10);
        assert!(!list.set_element(9, Variant::Null));
        assert!(list.element(9).is_null());

        // Scalars expose no collection capability.
        assert!(!Variant::from(1).add_element(Variant::Null));
        assert_eq!(Variant::from(1).element_count(), 0);
    }

    #[test]
    fn map_capability() {
        let map = Variant::new_map();
        assert!(map.put_item("a", Variant::from(1)));
        assert!(map.put_item("b", Variant::from(2)));
        assert_eq!(map.element_count(), 2);
        assert_eq!(map.item("a").get_i32(0), 1);
        assert!(map.item("missing").is_null());
        assert!(map.remove_item("a"));
        assert!(!map.remove_item("a"));
        assert_eq!(map.element_count(), 1);
    }

    #[test]
    fn clone_shares_payload() {
        let list = Variant::new_list();
        let alias = list.clone();
        alias.add_element(Variant::from(1));
        assert_eq!(list.element_count(), 1);
        assert_eq!(list, alias);
    }

    #[test]
    fn equality_is_deep_for_fresh_payloads() {
        let a = Variant::new_list();
        a.add_element(Variant::from(1));
        let b = Variant::new_list();
        b.add_element(Variant::from(1));
        assert_eq!(a, b);
        b.add_element(Variant::from(2));
        assert_ne!(a, b);
        assert_ne!(a, Variant::from(1));
    }

    #[test]
    fn weak_payloads() {
        let list = Variant::new_list();
        list.add_element(Variant::from(5));
        let weak = list.downgrade().unwrap();
        let strong = weak.upgrade().unwrap();
        assert_eq!(strong.element(0).get_i32(0), 5);
        drop(list);
        drop(strong);
        assert!(weak.upgrade().is_none());
        assert!(Variant::from(1).downgrade().is_none());
    }

    #[test]
    fn function_payload() {
        let double = Variant::function(|args| {
            Variant::from(args.first().map(|a| a.get_i32(0) * 2).unwrap_or(0))
        });
        assert_eq!(double.call(&[Variant::from(21)]).get_i32(0), 42);
        assert!(Variant::Null.call(&[]).is_null());
        assert_eq!(double, double.clone());
    }

    #[test]
    fn time_round_trip_through_epoch() {
        let t = Time::from_micros(1_700_000_000_000_000);
        let epoch = t.to_epoch();
        assert_eq!(Time::from_epoch(epoch), t);
    }

    #[test]
    fn object_id_hex() {
        let id = ObjectId([0xAB; 12]);
        assert_eq!(id.to_string(), "ab".repeat(12));
        assert_eq!(ObjectId::from_hex(&id.to_string()), Some(id));
        assert_eq!(ObjectId::from_hex("zz"), None);
        assert_eq!(ObjectId::from_hex("abcd"), None);
    }
}
