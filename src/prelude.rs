//! Re-exports of the commonly used surface. Intended to be glob
//! imported as `use coffer::prelude::*;`.

pub use crate::bin::{deserialize, serialize, DecodeError};
pub use crate::hash::{HashMap, HashSet};
pub use crate::json::{ParseError, ParseOptions};
pub use crate::map::{OrdMap, OrdSet};
pub use crate::sync::{Atomic, AtomicCounter, Shared, SharedWeak, SpinLock};
pub use crate::variant::{
    json_from, variant_from, Collection, Dictionary, FromJson, FromVariant, Json, ObjectId,
    Promise, Time, ToJson, ToVariant, Variant, VariantFn, VariantList, VariantMap, VariantObject,
    VariantType, WeakRef,
};
