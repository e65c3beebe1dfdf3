//! Conversion protocol between Rust types and [`Variant`]/[`Json`].
//!
//! Implement [`ToVariant`]/[`FromVariant`] for a type and the `Json`
//! pair comes for free through blanket impls — the capability is
//! resolved entirely at compile time. `FromVariant` follows the same
//! coercion rules as the typed getters: the numeric kinds interconvert,
//! numeric strings parse, and an unconvertible payload yields `None`.

use std::sync::Arc;

use bytes::Bytes;
use ethnum::I256;
use hifitime::Epoch;

use crate::hash::HashMap;
use crate::map::OrdMap;
use crate::sync::Shared;
use crate::variant::{Dictionary, Json, ObjectId, Time, Variant};

pub trait ToVariant {
    fn to_variant(&self) -> Variant;
}

pub trait FromVariant: Sized {
    fn from_variant(v: &Variant) -> Option<Self>;
}

pub trait ToJson {
    fn to_json(&self) -> Json;
}

pub trait FromJson: Sized {
    fn from_json(j: &Json) -> Option<Self>;
}

impl<T: ToVariant + ?Sized> ToJson for T {
    fn to_json(&self) -> Json {
        Json(self.to_variant())
    }
}

impl<T: FromVariant> FromJson for T {
    fn from_json(j: &Json) -> Option<Self> {
        T::from_variant(&j.0)
    }
}

/// Free-function entry point: `variant_from(&value)`.
pub fn variant_from<T: ToVariant + ?Sized>(value: &T) -> Variant {
    value.to_variant()
}

/// Free-function entry point: `json_from(&value)`.
pub fn json_from<T: ToVariant + ?Sized>(value: &T) -> Json {
    value.to_json()
}

impl ToVariant for Variant {
    fn to_variant(&self) -> Variant {
        self.clone()
    }
}

impl FromVariant for Variant {
    fn from_variant(v: &Variant) -> Option<Self> {
        Some(v.clone())
    }
}

impl ToVariant for Json {
    fn to_variant(&self) -> Variant {
        self.0.clone()
    }
}

impl FromVariant for Json {
    fn from_variant(v: &Variant) -> Option<Self> {
        Some(Json(v.clone()))
    }
}

macro_rules! signed_conversions {
    ($($t:ty),*) => {$(
        impl ToVariant for $t {
            fn to_variant(&self) -> Variant {
                Variant::from(*self)
            }
        }

        impl FromVariant for $t {
            fn from_variant(v: &Variant) -> Option<Self> {
                <$t>::try_from(v.coerce_i64()?).ok()
            }
        }
    )*};
}

signed_conversions!(i8, i16, i32, i64);

macro_rules! unsigned_conversions {
    ($($t:ty),*) => {$(
        impl ToVariant for $t {
            fn to_variant(&self) -> Variant {
                Variant::from(*self)
            }
        }

        impl FromVariant for $t {
            fn from_variant(v: &Variant) -> Option<Self> {
                <$t>::try_from(v.coerce_u64()?).ok()
            }
        }
    )*};
}

unsigned_conversions!(u8, u16, u32, u64);

impl ToVariant for f32 {
    fn to_variant(&self) -> Variant {
        Variant::Float(*self)
    }
}

impl FromVariant for f32 {
    fn from_variant(v: &Variant) -> Option<Self> {
        v.coerce_f64().map(|value| value as f32)
    }
}

impl ToVariant for f64 {
    fn to_variant(&self) -> Variant {
        Variant::Double(*self)
    }
}

impl FromVariant for f64 {
    fn from_variant(v: &Variant) -> Option<Self> {
        v.coerce_f64()
    }
}

impl ToVariant for bool {
    fn to_variant(&self) -> Variant {
        Variant::Boolean(*self)
    }
}

impl FromVariant for bool {
    fn from_variant(v: &Variant) -> Option<Self> {
        v.coerce_bool()
    }
}

impl ToVariant for str {
    fn to_variant(&self) -> Variant {
        Variant::from(self)
    }
}

impl ToVariant for &str {
    fn to_variant(&self) -> Variant {
        Variant::from(*self)
    }
}

impl ToVariant for String {
    fn to_variant(&self) -> Variant {
        Variant::from(self.as_str())
    }
}

impl FromVariant for String {
    fn from_variant(v: &Variant) -> Option<Self> {
        v.coerce_string()
    }
}

impl ToVariant for Arc<str> {
    fn to_variant(&self) -> Variant {
        Variant::String(Arc::clone(self))
    }
}

impl FromVariant for Arc<str> {
    fn from_variant(v: &Variant) -> Option<Self> {
        match v {
            Variant::String(s) => Some(Arc::clone(s)),
            _ => v.coerce_string().map(Arc::from),
        }
    }
}

impl ToVariant for Time {
    fn to_variant(&self) -> Variant {
        Variant::Time(*self)
    }
}

impl FromVariant for Time {
    fn from_variant(v: &Variant) -> Option<Self> {
        v.get_time()
    }
}

impl ToVariant for Epoch {
    fn to_variant(&self) -> Variant {
        Variant::Time(Time::from_epoch(*self))
    }
}

impl FromVariant for Epoch {
    fn from_variant(v: &Variant) -> Option<Self> {
        v.get_time().map(Time::to_epoch)
    }
}

impl ToVariant for ObjectId {
    fn to_variant(&self) -> Variant {
        Variant::ObjectId(*self)
    }
}

impl FromVariant for ObjectId {
    fn from_variant(v: &Variant) -> Option<Self> {
        v.get_object_id()
    }
}

impl ToVariant for Bytes {
    fn to_variant(&self) -> Variant {
        Variant::Memory(self.clone())
    }
}

impl FromVariant for Bytes {
    fn from_variant(v: &Variant) -> Option<Self> {
        v.get_memory()
    }
}

impl ToVariant for I256 {
    fn to_variant(&self) -> Variant {
        Variant::BigInt(*self)
    }
}

impl FromVariant for I256 {
    fn from_variant(v: &Variant) -> Option<Self> {
        v.get_bigint()
    }
}

impl<T: ToVariant> ToVariant for Option<T> {
    fn to_variant(&self) -> Variant {
        match self {
            Some(value) => value.to_variant(),
            None => Variant::Null,
        }
    }
}

impl<T: FromVariant> FromVariant for Option<T> {
    fn from_variant(v: &Variant) -> Option<Self> {
        if v.is_null() {
            Some(None)
        } else {
            T::from_variant(v).map(Some)
        }
    }
}

impl<T: ToVariant> ToVariant for [T] {
    fn to_variant(&self) -> Variant {
        Variant::List(Shared::new(self.iter().map(T::to_variant).collect()))
    }
}

impl<T: ToVariant> ToVariant for Vec<T> {
    fn to_variant(&self) -> Variant {
        self.as_slice().to_variant()
    }
}

impl<T: FromVariant> FromVariant for Vec<T> {
    fn from_variant(v: &Variant) -> Option<Self> {
        match v {
            Variant::List(list) => list.with(|items| items.iter().map(T::from_variant).collect()),
            _ => None,
        }
    }
}

impl<T: ToVariant> ToVariant for OrdMap<String, T> {
    fn to_variant(&self) -> Variant {
        let mut out = OrdMap::new();
        for (key, value) in self.iter() {
            out.put(key.clone(), value.to_variant());
        }
        Variant::Map(Shared::new(out))
    }
}

impl<T: FromVariant> FromVariant for OrdMap<String, T> {
    fn from_variant(v: &Variant) -> Option<Self> {
        let entries = match v {
            Variant::Map(map) => map.entries(),
            _ => return None,
        };
        let mut out = OrdMap::new();
        for (key, value) in entries {
            out.put(key, T::from_variant(&value)?);
        }
        Some(out)
    }
}

impl<T: ToVariant> ToVariant for HashMap<String, T> {
    fn to_variant(&self) -> Variant {
        let mut out = OrdMap::new();
        for (key, value) in self.iter() {
            out.put(key.clone(), value.to_variant());
        }
        Variant::Map(Shared::new(out))
    }
}

impl<T: FromVariant> FromVariant for HashMap<String, T> {
    fn from_variant(v: &Variant) -> Option<Self> {
        let entries = match v {
            Variant::Map(map) => map.entries(),
            _ => return None,
        };
        let mut out = HashMap::new();
        for (key, value) in entries {
            out.put(key, T::from_variant(&value)?);
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_round_trips() {
        assert_eq!(i32::from_variant(&42i32.to_variant()), Some(42));
        assert_eq!(u16::from_variant(&7u16.to_variant()), Some(7));
        assert_eq!(f64::from_variant(&1.25f64.to_variant()), Some(1.25));
        assert_eq!(bool::from_variant(&true.to_variant()), Some(true));
        assert_eq!(
            String::from_variant(&"hi".to_variant()),
            Some("hi".to_string())
        );
    }

    #[test]
    fn narrowing_checks_range() {
        assert_eq!(i8::from_variant(&1000i32.to_variant()), None);
        assert_eq!(u8::from_variant(&Variant::from(-1i32)), None);
        assert_eq!(i32::from_variant(&Variant::new_list()), None);
    }

    #[test]
    fn option_maps_null() {
        assert_eq!(Option::<i32>::from_variant(&Variant::Null), Some(None));
        assert_eq!(
            Option::<i32>::from_variant(&Variant::from(3)),
            Some(Some(3))
        );
        assert!(None::<i32>.to_variant().is_null());
    }

    #[test]
    fn vec_round_trip() {
        let v = vec![1i32, 2, 3];
        let variant = v.to_variant();
        assert!(variant.is_list());
        assert_eq!(Vec::<i32>::from_variant(&variant), Some(v));

        // One bad element poisons the whole conversion.
        variant.add_element(Variant::from("x"));
        assert_eq!(Vec::<i32>::from_variant(&variant), None);
    }

    #[test]
    fn map_round_trip() {
        let mut m = OrdMap::new();
        m.put("a".to_string(), 1i64);
        m.put("b".to_string(), 2i64);
        let variant = m.to_variant();
        assert!(variant.is_map());
        assert_eq!(variant.item("b").get_i64(0), 2);
        assert_eq!(OrdMap::<String, i64>::from_variant(&variant), Some(m));
    }

    #[test]
    fn hash_map_round_trip() {
        let mut m = HashMap::new();
        m.put("x".to_string(), 9u32);
        let variant = m.to_variant();
        let back = HashMap::<String, u32>::from_variant(&variant).unwrap();
        assert_eq!(back.get("x"), Some(&9));
        assert_eq!(back.len(), 1);
    }

    #[test]
    fn epoch_round_trip() {
        let epoch = Epoch::from_unix_seconds(1_700_000_000.0);
        let variant = epoch.to_variant();
        assert!(variant.is_time());
        assert_eq!(Epoch::from_variant(&variant), Some(epoch));
    }

    #[test]
    fn json_blankets_follow_variant() {
        let j = 5i32.to_json();
        assert_eq!(j.get_i32(0), 5);
        assert_eq!(i32::from_json(&j), Some(5));
        assert_eq!(json_from("s").get_string(""), "s");
        assert_eq!(variant_from(&3u64).get_u64(0), 3);
    }

    /// A user type wired into the protocol by hand.
    #[derive(Debug, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    impl ToVariant for Point {
        fn to_variant(&self) -> Variant {
            let map = Variant::new_map();
            map.put_item("x", self.x.to_variant());
            map.put_item("y", self.y.to_variant());
            map
        }
    }

    impl FromVariant for Point {
        fn from_variant(v: &Variant) -> Option<Self> {
            if !v.is_map() {
                return None;
            }
            Some(Point {
                x: i32::from_variant(&v.item("x"))?,
                y: i32::from_variant(&v.item("y"))?,
            })
        }
    }

    #[test]
    fn user_type_round_trip() {
        let p = Point { x: 3, y: -4 };
        let v = p.to_variant();
        assert_eq!(Point::from_variant(&v), Some(p));
        assert_eq!(Point::from_variant(&Variant::from(1)), None);
    }
}
