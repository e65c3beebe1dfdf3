//! Compact binary codec for [`Variant`].
//!
//! Wire shape: one [`VariantType`] tag byte, then a type-specific
//! payload. Scalars are fixed-width little-endian; counts and lengths
//! are CVLI ([`crate::codec::cvli`]); lists and maps recurse. Kinds
//! with no wire form (pointers, promises, functions, weak handles,
//! opaque objects) serialize as the single `Null` tag byte. The decoder
//! additionally accepts `String16`/`String32` payloads from UTF-16/32
//! producers, transcoding them to UTF-8.

use std::{error, fmt};

use bytes::Bytes;
use ethnum::I256;

use crate::codec::{cvli, Reader, Writer};
use crate::map::OrdMap;
use crate::sync::Shared;
use crate::variant::{ObjectId, Time, Variant, VariantType};

/// Deep-nesting guard for untrusted input.
const MAX_DEPTH: usize = 512;

/// A decode failure at a byte offset. The output value is never
/// partially constructed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodeError {
    pub offset: usize,
    pub message: &'static str,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "decode error at byte {}: {}", self.offset, self.message)
    }
}

impl error::Error for DecodeError {}

fn write_str(out: &mut Writer, text: &str) {
    cvli::encode_u64(out, text.len() as u64);
    out.write_bytes(text.as_bytes());
}

fn write_variant(value: &Variant, out: &mut Writer) {
    match value {
        Variant::Null
        | Variant::Pointer(_)
        | Variant::Promise(_)
        | Variant::Function(_)
        | Variant::Weak(_) => out.write_u8(VariantType::Null as u8),
        Variant::Int32(v) => {
            out.write_u8(VariantType::Int32 as u8);
            out.write_i32(*v);
        }
        Variant::UInt32(v) => {
            out.write_u8(VariantType::Uint32 as u8);
            out.write_u32(*v);
        }
        Variant::Int64(v) => {
            out.write_u8(VariantType::Int64 as u8);
            out.write_i64(*v);
        }
        Variant::UInt64(v) => {
            out.write_u8(VariantType::Uint64 as u8);
            out.write_u64(*v);
        }
        Variant::Float(v) => {
            out.write_u8(VariantType::Float as u8);
            out.write_f32(*v);
        }
        Variant::Double(v) => {
            out.write_u8(VariantType::Double as u8);
            out.write_f64(*v);
        }
        Variant::Boolean(v) => {
            out.write_u8(VariantType::Boolean as u8);
            out.write_u8(*v as u8);
        }
        Variant::String(s) => {
            out.write_u8(VariantType::String8 as u8);
            write_str(out, s);
        }
        Variant::Time(t) => {
            out.write_u8(VariantType::Time as u8);
            out.write_i64(t.micros());
        }
        Variant::ObjectId(id) => {
            out.write_u8(VariantType::ObjectId as u8);
            out.write_bytes(&id.0);
        }
        Variant::Memory(m) => {
            out.write_u8(VariantType::Memory as u8);
            cvli::encode_u64(out, m.len() as u64);
            out.write_bytes(m);
        }
        Variant::BigInt(v) => {
            out.write_u8(VariantType::BigInt as u8);
            let bytes = v.to_le_bytes();
            // Minimal two's-complement width: drop bytes that are pure
            // sign extension.
            let negative = *v < I256::ZERO;
            let mut len = bytes.len();
            if negative {
                while len > 1 && bytes[len - 1] == 0xFF && bytes[len - 2] & 0x80 != 0 {
                    len -= 1;
                }
            } else {
                while len > 1 && bytes[len - 1] == 0 && bytes[len - 2] & 0x80 == 0 {
                    len -= 1;
                }
            }
            cvli::encode_u64(out, len as u64);
            out.write_bytes(&bytes[..len]);
        }
        Variant::List(list) => {
            out.write_u8(VariantType::List as u8);
            list.with(|items| {
                cvli::encode_u64(out, items.len() as u64);
                for item in items.iter() {
                    write_variant(item, out);
                }
            });
        }
        Variant::Map(map) => {
            out.write_u8(VariantType::Map as u8);
            map.with(|entries| {
                cvli::encode_u64(out, entries.len() as u64);
                for (key, item) in entries.iter() {
                    write_str(out, key);
                    write_variant(item, out);
                }
            });
        }
        Variant::Object(object) => match object.to_json() {
            Some(json) => write_variant(&json.0, out),
            None => out.write_u8(VariantType::Null as u8),
        },
    }
}

/// Encodes a value into a fresh buffer.
pub fn serialize(value: &Variant) -> Vec<u8> {
    let mut out = Writer::new();
    write_variant(value, &mut out);
    out.into_bytes()
}

fn fail<T>(r: &Reader<'_>, message: &'static str) -> Result<T, DecodeError> {
    Err(DecodeError {
        offset: r.position(),
        message,
    })
}

fn read_count(r: &mut Reader<'_>) -> Result<usize, DecodeError> {
    match cvli::decode_u64(r) {
        Some(v) => usize::try_from(v).or_else(|_| fail(r, "count overflows this platform")),
        None => fail(r, "truncated or overlong count"),
    }
}

/// A claimed count that cannot fit in the remaining input is rejected
/// before any allocation happens.
fn check_count(r: &Reader<'_>, count: usize, min_item_size: usize) -> Result<(), DecodeError> {
    if count.saturating_mul(min_item_size) > r.remaining() {
        return fail(r, "count exceeds input");
    }
    Ok(())
}

fn read_str(r: &mut Reader<'_>) -> Result<String, DecodeError> {
    let len = read_count(r)?;
    check_count(r, len, 1)?;
    let Some(bytes) = r.read_bytes(len) else {
        return fail(r, "truncated string");
    };
    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(text.to_string()),
        Err(_) => fail(r, "invalid utf-8"),
    }
}

fn read_variant(r: &mut Reader<'_>, depth: usize) -> Result<Variant, DecodeError> {
    if depth >= MAX_DEPTH {
        return fail(r, "nesting too deep");
    }
    let Some(tag) = r.read_u8() else {
        return fail(r, "truncated input");
    };
    let Some(tag) = VariantType::from_u8(tag) else {
        return fail(r, "unknown type tag");
    };
    match tag {
        VariantType::Null => Ok(Variant::Null),
        VariantType::Int32 => match r.read_i32() {
            Some(v) => Ok(Variant::Int32(v)),
            None => fail(r, "truncated input"),
        },
        VariantType::Uint32 => match r.read_u32() {
            Some(v) => Ok(Variant::UInt32(v)),
            None => fail(r, "truncated input"),
        },
        VariantType::Int64 => match r.read_i64() {
            Some(v) => Ok(Variant::Int64(v)),
            None => fail(r, "truncated input"),
        },
        VariantType::Uint64 => match r.read_u64() {
            Some(v) => Ok(Variant::UInt64(v)),
            None => fail(r, "truncated input"),
        },
        VariantType::Float => match r.read_f32() {
            Some(v) => Ok(Variant::Float(v)),
            None => fail(r, "truncated input"),
        },
        VariantType::Double => match r.read_f64() {
            Some(v) => Ok(Variant::Double(v)),
            None => fail(r, "truncated input"),
        },
        VariantType::Boolean => match r.read_u8() {
            Some(0) => Ok(Variant::Boolean(false)),
            Some(1) => Ok(Variant::Boolean(true)),
            Some(_) => fail(r, "invalid boolean"),
            None => fail(r, "truncated input"),
        },
        VariantType::String8 => Ok(Variant::from(read_str(r)?)),
        VariantType::String16 => {
            let count = read_count(r)?;
            check_count(r, count, 2)?;
            let mut units = Vec::with_capacity(count);
            for _ in 0..count {
                match r.read_u16() {
                    Some(u) => units.push(u),
                    None => return fail(r, "truncated string"),
                }
            }
            match String::from_utf16(&units) {
                Ok(text) => Ok(Variant::from(text)),
                Err(_) => fail(r, "invalid utf-16"),
            }
        }
        VariantType::String32 => {
            let count = read_count(r)?;
            check_count(r, count, 4)?;
            let mut text = String::with_capacity(count);
            for _ in 0..count {
                let Some(unit) = r.read_u32() else {
                    return fail(r, "truncated string");
                };
                match char::from_u32(unit) {
                    Some(c) => text.push(c),
                    None => return fail(r, "invalid utf-32"),
                }
            }
            Ok(Variant::from(text))
        }
        VariantType::Time => match r.read_i64() {
            Some(micros) => Ok(Variant::Time(Time::from_micros(micros))),
            None => fail(r, "truncated input"),
        },
        VariantType::ObjectId => match r.read_bytes(12) {
            Some(bytes) => Ok(Variant::ObjectId(ObjectId(bytes.try_into().unwrap()))),
            None => fail(r, "truncated input"),
        },
        VariantType::Memory => {
            let len = read_count(r)?;
            check_count(r, len, 1)?;
            match r.read_bytes(len) {
                Some(bytes) => Ok(Variant::Memory(Bytes::copy_from_slice(bytes))),
                None => fail(r, "truncated input"),
            }
        }
        VariantType::BigInt => {
            let len = read_count(r)?;
            if len == 0 || len > 32 {
                return fail(r, "invalid big integer width");
            }
            let Some(bytes) = r.read_bytes(len) else {
                return fail(r, "truncated input");
            };
            let mut full = if bytes[len - 1] & 0x80 != 0 {
                [0xFFu8; 32]
            } else {
                [0u8; 32]
            };
            full[..len].copy_from_slice(bytes);
            Ok(Variant::BigInt(I256::from_le_bytes(full)))
        }
        VariantType::List => {
            let count = read_count(r)?;
            check_count(r, count, 1)?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(read_variant(r, depth + 1)?);
            }
            Ok(Variant::List(Shared::new(items)))
        }
        VariantType::Map => {
            let count = read_count(r)?;
            check_count(r, count, 2)?;
            let mut map = OrdMap::new();
            for _ in 0..count {
                let key = read_str(r)?;
                let value = read_variant(r, depth + 1)?;
                map.put(key, value);
            }
            Ok(Variant::Map(Shared::new(map)))
        }
        VariantType::Pointer
        | VariantType::Object
        | VariantType::Promise
        | VariantType::Function
        | VariantType::Weak => fail(r, "unsupported type tag"),
    }
}

/// Decodes one value, returning it and the number of bytes consumed.
pub fn deserialize(bytes: &[u8]) -> Result<(Variant, usize), DecodeError> {
    let mut r = Reader::new(bytes);
    let value = read_variant(&mut r, 0)?;
    Ok((value, r.position()))
}

impl Variant {
    /// Binary-encodes this value; see [`crate::bin`] for the wire shape.
    pub fn serialize(&self) -> Vec<u8> {
        serialize(self)
    }

    /// Decodes one binary value and the consumed byte count.
    pub fn deserialize(bytes: &[u8]) -> Result<(Variant, usize), DecodeError> {
        deserialize(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn round_trip(value: &Variant) -> Variant {
        let bytes = serialize(value);
        let (back, used) = deserialize(&bytes).expect("decodes");
        assert_eq!(used, bytes.len());
        back
    }

    #[test]
    fn scalar_round_trips() {
        for v in [
            Variant::Null,
            Variant::Int32(-5),
            Variant::UInt32(u32::MAX),
            Variant::Int64(i64::MIN),
            Variant::UInt64(u64::MAX),
            Variant::Float(1.5),
            Variant::Double(-0.25),
            Variant::Boolean(true),
            Variant::Boolean(false),
            Variant::from("hello"),
            Variant::from(""),
            Variant::Time(Time::from_micros(1_700_000_000_000_000)),
            Variant::ObjectId(ObjectId([7; 12])),
            Variant::Memory(Bytes::from_static(b"\x00\x01\x02")),
        ] {
            assert_eq!(round_trip(&v), v);
        }
    }

    #[test]
    fn wire_layout_is_tagged_little_endian() {
        assert_eq!(serialize(&Variant::Null), [0]);
        assert_eq!(serialize(&Variant::Int32(1)), [1, 1, 0, 0, 0]);
        assert_eq!(serialize(&Variant::Boolean(true)), [7, 1]);
        assert_eq!(serialize(&Variant::from("ab")), [8, 2, b'a', b'b']);
    }

    #[test]
    fn bigint_uses_minimal_width() {
        let small = Variant::BigInt(I256::from(1i32));
        assert_eq!(serialize(&small), [16, 1, 1]);
        let negative = Variant::BigInt(I256::from(-1i32));
        assert_eq!(serialize(&negative), [16, 1, 0xFF]);
        // 128 needs a sign byte to stay non-negative.
        let edge = Variant::BigInt(I256::from(128i32));
        assert_eq!(serialize(&edge), [16, 2, 0x80, 0x00]);
        for v in [
            I256::ZERO,
            I256::from(-128i32),
            I256::MAX,
            I256::MIN,
            I256::from(i128::MAX),
        ] {
            assert_eq!(round_trip(&Variant::BigInt(v)), Variant::BigInt(v));
        }
    }

    #[test]
    fn nested_containers_round_trip() {
        let list = Variant::new_list();
        list.add_element(Variant::from(1));
        list.add_element(Variant::from("two"));
        let map = Variant::new_map();
        map.put_item("list", list);
        map.put_item("flag", Variant::from(false));
        let inner = Variant::new_map();
        inner.put_item("x", Variant::Double(2.5));
        map.put_item("inner", inner);

        assert_eq!(round_trip(&map), map);
    }

    #[test]
    fn unsupported_kinds_collapse_to_null() {
        let f = Variant::function(|_| Variant::Null);
        assert_eq!(serialize(&f), [0]);
        assert_eq!(serialize(&Variant::Pointer(12)), [0]);
        let p = Variant::Promise(std::sync::Arc::new(crate::variant::Promise::new()));
        assert_eq!(round_trip(&p), Variant::Null);
    }

    #[test]
    fn utf16_and_utf32_strings_decode() {
        // "hé" as UTF-16LE: tag 9, two units.
        let bytes = [9u8, 2, 0x68, 0x00, 0xE9, 0x00];
        let (v, used) = deserialize(&bytes).unwrap();
        assert_eq!(used, bytes.len());
        assert_eq!(v, Variant::from("hé"));

        // "A" as UTF-32LE: tag 10, one unit.
        let bytes = [10u8, 1, 0x41, 0x00, 0x00, 0x00];
        let (v, _) = deserialize(&bytes).unwrap();
        assert_eq!(v, Variant::from("A"));

        // Lone surrogate fails.
        let bytes = [9u8, 1, 0x00, 0xD8];
        assert_eq!(deserialize(&bytes).unwrap_err().message, "invalid utf-16");
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert!(deserialize(&[]).is_err());
        assert_eq!(deserialize(&[99]).unwrap_err().message, "unknown type tag");
        assert_eq!(deserialize(&[1, 0, 0]).unwrap_err().message, "truncated input");
        assert_eq!(deserialize(&[7, 3]).unwrap_err().message, "invalid boolean");
        assert_eq!(
            deserialize(&[8, 0x85, 0x02, b'x']).unwrap_err().message,
            "count exceeds input"
        );
        // A huge claimed list count must fail before allocating.
        let huge = [17u8, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        assert_eq!(deserialize(&huge).unwrap_err().message, "count exceeds input");
        // Invalid UTF-8 in a string payload.
        assert_eq!(
            deserialize(&[8, 1, 0xFF]).unwrap_err().message,
            "invalid utf-8"
        );
    }

    #[test]
    fn depth_limit_holds() {
        // 600 nested single-element lists.
        let mut bytes = Vec::new();
        for _ in 0..600 {
            bytes.push(17u8);
            bytes.push(1u8);
        }
        bytes.push(0u8);
        assert_eq!(
            deserialize(&bytes).unwrap_err().message,
            "nesting too deep"
        );
    }

    #[test]
    fn trailing_bytes_are_reported() {
        let mut bytes = serialize(&Variant::from(5));
        bytes.extend_from_slice(&[1, 2, 3]);
        let (v, used) = deserialize(&bytes).unwrap();
        assert_eq!(v, Variant::from(5));
        assert_eq!(used, bytes.len() - 3);
    }

    fn arb_variant() -> impl Strategy<Value = Variant> {
        let leaf = prop_oneof![
            Just(Variant::Null),
            any::<i32>().prop_map(Variant::Int32),
            any::<u32>().prop_map(Variant::UInt32),
            any::<i64>().prop_map(Variant::Int64),
            any::<u64>().prop_map(Variant::UInt64),
            any::<f32>().prop_map(|v| Variant::Float(if v.is_nan() { 0.0 } else { v })),
            any::<f64>().prop_map(|v| Variant::Double(if v.is_nan() { 0.0 } else { v })),
            any::<bool>().prop_map(Variant::Boolean),
            ".*".prop_map(|s: String| Variant::from(s)),
            any::<i64>().prop_map(|m| Variant::Time(Time::from_micros(m))),
            any::<[u8; 12]>().prop_map(|b| Variant::ObjectId(ObjectId(b))),
            prop::collection::vec(any::<u8>(), 0..48)
                .prop_map(|b| Variant::Memory(Bytes::from(b))),
            any::<i128>().prop_map(|v| Variant::BigInt(I256::from(v))),
        ];
        leaf.prop_recursive(3, 48, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6)
                    .prop_map(|items| Variant::List(Shared::new(items))),
                prop::collection::btree_map(".*", inner, 0..6).prop_map(|entries| {
                    let mut map = OrdMap::new();
                    for (k, v) in entries {
                        map.put(k, v);
                    }
                    Variant::Map(Shared::new(map))
                }),
            ]
        })
    }

    proptest! {
        #[test]
        fn every_value_round_trips(value in arb_variant()) {
            prop_assert_eq!(round_trip(&value), value);
        }
    }
}
