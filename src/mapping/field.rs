use super::entity::Entity;
use crate::core::{FieldKind, Result, StoreError, WireValue};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Field name to encoded value, as written to a single hash.
pub type FlatFieldMap = BTreeMap<String, WireValue>;

/// Primitive field types with a wire encoding.
pub trait Primitive: Sized {
    const KIND: FieldKind;

    fn encode(&self) -> WireValue;

    /// Parses a stored value, `None` when it is not a valid `Self`.
    fn decode(raw: &str) -> Option<Self>;
}

macro_rules! signed_primitive {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Primitive for $ty {
                const KIND: FieldKind = FieldKind::$kind;

                fn encode(&self) -> WireValue {
                    WireValue::Text(self.to_string())
                }

                fn decode(raw: &str) -> Option<Self> {
                    raw.parse().ok()
                }
            }
        )*
    };
}

macro_rules! unsigned_primitive {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Primitive for $ty {
                const KIND: FieldKind = FieldKind::$kind;

                fn encode(&self) -> WireValue {
                    WireValue::Unsigned(*self as u64)
                }

                fn decode(raw: &str) -> Option<Self> {
                    raw.parse().ok()
                }
            }
        )*
    };
}

signed_primitive!(i8 => I8, i16 => I16, i32 => I32, i64 => I64, isize => Isize);
unsigned_primitive!(u8 => U8, u16 => U16, u32 => U32, u64 => U64, usize => Usize);

impl Primitive for String {
    const KIND: FieldKind = FieldKind::String;

    fn encode(&self) -> WireValue {
        WireValue::Text(self.clone())
    }

    fn decode(raw: &str) -> Option<Self> {
        Some(raw.to_string())
    }
}

impl Primitive for f32 {
    const KIND: FieldKind = FieldKind::F32;

    fn encode(&self) -> WireValue {
        WireValue::Float(f64::from(*self))
    }

    fn decode(raw: &str) -> Option<Self> {
        let value = parse_float(raw)?;
        let narrowed = value as f32;
        if narrowed.is_infinite() && value.is_finite() {
            return None;
        }
        Some(narrowed)
    }
}

impl Primitive for f64 {
    const KIND: FieldKind = FieldKind::F64;

    fn encode(&self) -> WireValue {
        WireValue::Float(*self)
    }

    fn decode(raw: &str) -> Option<Self> {
        parse_float(raw)
    }
}

/// Parses a float, rejecting finite text that overflows to infinity.
fn parse_float(raw: &str) -> Option<f64> {
    let value = raw.parse::<f64>().ok()?;
    if value.is_infinite() {
        let literal = raw.trim_start_matches(['+', '-']);
        if !literal.eq_ignore_ascii_case("inf") && !literal.eq_ignore_ascii_case("infinity") {
            return None;
        }
    }
    Some(value)
}

impl Primitive for bool {
    const KIND: FieldKind = FieldKind::Bool;

    fn encode(&self) -> WireValue {
        WireValue::Text(if *self { "1" } else { "0" }.to_string())
    }

    fn decode(raw: &str) -> Option<Self> {
        match raw {
            "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
            "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
            _ => None,
        }
    }
}

type EncodeFn<E> = fn(&E) -> WireValue;
type DecodeFn<E> = fn(&mut E, &str) -> Option<()>;

/// One mapped field of an entity: its stored name, declared kind and codec.
pub struct FieldDescriptor<E> {
    name: &'static str,
    kind: FieldKind,
    codec: Option<(EncodeFn<E>, DecodeFn<E>)>,
}

impl<E> FieldDescriptor<E> {
    pub fn new(name: &'static str, kind: FieldKind, encode: EncodeFn<E>, decode: DecodeFn<E>) -> Self {
        Self {
            name,
            kind,
            codec: Some((encode, decode)),
        }
    }

    /// A field whose kind has no wire encoding. Encoding it always fails.
    pub fn unsupported(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            codec: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn encode(&self, entity: &E) -> Result<WireValue> {
        match &self.codec {
            Some((encode, _)) => Ok(encode(entity)),
            None => Err(self.conversion_error()),
        }
    }

    pub fn decode(&self, entity: &mut E, raw: &str) -> Result<()> {
        let Some((_, decode)) = &self.codec else {
            return Err(self.conversion_error());
        };
        decode(entity, raw).ok_or_else(|| StoreError::Decode {
            field: self.name.to_string(),
            kind: self.kind,
            value: raw.to_string(),
        })
    }

    fn conversion_error(&self) -> StoreError {
        StoreError::Conversion {
            field: self.name.to_string(),
            kind: self.kind,
        }
    }
}

impl<E> fmt::Debug for FieldDescriptor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("supported", &self.codec.is_some())
            .finish()
    }
}

/// Converts entities to and from their flat field representation.
pub struct FieldMapper;

impl FieldMapper {
    /// Encodes every mapped field. Fails on the first field without a wire
    /// encoding; nothing of a failed encoding is returned.
    pub fn encode<E: Entity>(entity: &E) -> Result<FlatFieldMap> {
        let mut map = FlatFieldMap::new();
        for field in E::fields() {
            map.insert(field.name().to_string(), field.encode(entity)?);
        }
        Ok(map)
    }

    /// Copies stored values into `entity`. Fields absent from `stored` keep
    /// their current value; stored fields the entity does not map are ignored.
    pub fn decode<E: Entity>(stored: &HashMap<String, String>, entity: &mut E) -> Result<()> {
        for field in E::fields() {
            if let Some(raw) = stored.get(field.name()) {
                field.decode(entity, raw)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::identity::Identity;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Sample {
        id: String,
        score: i32,
        hits: u16,
        ratio: f32,
        active: bool,
    }

    impl Identity for Sample {
        fn key(&self) -> &str {
            &self.id
        }

        fn set_key(&mut self, key: String) {
            self.id = key;
        }
    }

    impl Entity for Sample {
        fn type_name() -> &'static str {
            "Sample"
        }

        fn fields() -> Vec<FieldDescriptor<Self>> {
            vec![
                FieldDescriptor::new(
                    "id",
                    <String as Primitive>::KIND,
                    |e: &Self| Primitive::encode(&e.id),
                    |e: &mut Self, raw: &str| {
                        e.id = <String as Primitive>::decode(raw)?;
                        Some(())
                    },
                ),
                FieldDescriptor::new(
                    "score",
                    <i32 as Primitive>::KIND,
                    |e: &Self| Primitive::encode(&e.score),
                    |e: &mut Self, raw: &str| {
                        e.score = <i32 as Primitive>::decode(raw)?;
                        Some(())
                    },
                ),
                FieldDescriptor::new(
                    "hits",
                    <u16 as Primitive>::KIND,
                    |e: &Self| Primitive::encode(&e.hits),
                    |e: &mut Self, raw: &str| {
                        e.hits = <u16 as Primitive>::decode(raw)?;
                        Some(())
                    },
                ),
                FieldDescriptor::new(
                    "ratio",
                    <f32 as Primitive>::KIND,
                    |e: &Self| Primitive::encode(&e.ratio),
                    |e: &mut Self, raw: &str| {
                        e.ratio = <f32 as Primitive>::decode(raw)?;
                        Some(())
                    },
                ),
                FieldDescriptor::new(
                    "active",
                    <bool as Primitive>::KIND,
                    |e: &Self| Primitive::encode(&e.active),
                    |e: &mut Self, raw: &str| {
                        e.active = <bool as Primitive>::decode(raw)?;
                        Some(())
                    },
                ),
            ]
        }
    }

    fn stored(map: &FlatFieldMap) -> HashMap<String, String> {
        map.iter()
            .map(|(k, v)| (k.clone(), v.to_wire_string()))
            .collect()
    }

    #[test]
    fn test_encode_follows_wire_rules() {
        let sample = Sample {
            id: "s1".into(),
            score: -7,
            hits: 3,
            ratio: 0.5,
            active: true,
        };
        let map = FieldMapper::encode(&sample).unwrap();

        assert_eq!(map["id"], WireValue::Text("s1".into()));
        assert_eq!(map["score"], WireValue::Text("-7".into()));
        assert_eq!(map["hits"], WireValue::Unsigned(3));
        assert_eq!(map["ratio"], WireValue::Float(0.5));
        assert_eq!(map["active"], WireValue::Text("1".into()));
    }

    #[test]
    fn test_decode_restores_encoded_values() {
        let sample = Sample {
            id: "s2".into(),
            score: i32::MIN,
            hits: u16::MAX,
            ratio: 1.234,
            active: false,
        };
        let map = FieldMapper::encode(&sample).unwrap();

        let mut decoded = Sample::default();
        FieldMapper::decode(&stored(&map), &mut decoded).unwrap();
        assert_eq!(decoded, sample);
    }

    #[test]
    fn test_decode_tolerates_missing_fields() {
        let mut decoded = Sample::default();
        let raw = HashMap::from([("score".to_string(), "12".to_string())]);
        FieldMapper::decode(&raw, &mut decoded).unwrap();

        assert_eq!(decoded.score, 12);
        assert_eq!(decoded.hits, 0);
        assert!(decoded.id.is_empty());
    }

    #[test]
    fn test_decode_rejects_unparseable_value() {
        let mut decoded = Sample::default();
        let raw = HashMap::from([("hits".to_string(), "-1".to_string())]);
        let err = FieldMapper::decode(&raw, &mut decoded).unwrap_err();
        assert!(matches!(err, StoreError::Decode { kind: FieldKind::U16, .. }));
    }

    #[test]
    fn test_decode_rejects_out_of_range_float() {
        assert_eq!(f32::decode("1e40"), None);
        assert_eq!(f32::decode("-1e40"), None);
        assert_eq!(f64::decode("1e400"), None);
        assert_eq!(f32::decode("3.4e38"), Some(3.4e38));
        assert_eq!(f64::decode("-inf"), Some(f64::NEG_INFINITY));
        assert_eq!(f32::decode("Infinity"), Some(f32::INFINITY));

        let mut decoded = Sample::default();
        let raw = HashMap::from([("ratio".to_string(), "1e40".to_string())]);
        let err = FieldMapper::decode(&raw, &mut decoded).unwrap_err();
        assert!(matches!(err, StoreError::Decode { kind: FieldKind::F32, .. }));
        assert_eq!(decoded.ratio, 0.0);
    }

    #[test]
    fn test_bool_accepts_textual_forms() {
        assert_eq!(bool::decode("true"), Some(true));
        assert_eq!(bool::decode("0"), Some(false));
        assert_eq!(bool::decode("yes"), None);
    }

    #[test]
    fn test_unsupported_descriptor_fails_both_ways() {
        let field = FieldDescriptor::<Sample>::unsupported("nested", FieldKind::Struct);
        let mut sample = Sample::default();
        assert!(matches!(
            field.encode(&sample),
            Err(StoreError::Conversion { kind: FieldKind::Struct, .. })
        ));
        assert!(field.decode(&mut sample, "{}").is_err());
    }
}
