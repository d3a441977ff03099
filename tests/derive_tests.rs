/// Entity derive tests
///
/// Field selection, naming attributes and kind classification generated by
/// `#[derive(Entity)]`.
/// Run with: cargo test --test derive_tests
use hashstore::{
    Entity, EntityStore, ErrorKind, FieldKind, FieldMapper, Identity, StoreConfig, WireValue,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Entity, Debug, Default, Clone, PartialEq)]
#[entity(name = "user")]
struct Account {
    #[entity(key)]
    pub id: String,
    #[entity(rename = "login")]
    pub username: String,
    pub karma: i16,
    pub visits: u64,
    pub ratio: f64,
    pub verified: bool,
    #[entity(skip)]
    pub session_token: String,
    password_hash: String,
}

#[derive(Entity, Debug, Default, Clone, PartialEq)]
struct Gauge {
    #[entity(key)]
    id: String,
    pub r#type: String,
    pub reading: f32,
}

#[derive(Entity, Debug, Default)]
struct Unsupported {
    #[entity(key)]
    pub id: String,
    pub tags: Vec<String>,
    pub window: [u8; 4],
    pub labels: HashMap<String, String>,
    pub ordered: BTreeMap<String, i32>,
    pub parent: Option<String>,
    pub boxed: Box<i32>,
    pub shared: Arc<String>,
    pub wide: i128,
}

/// Implements `Identity` by hand, keyed outside the mapped fields.
#[derive(Entity, Debug, Default, Clone, PartialEq)]
struct Note {
    key: String,
    pub body: String,
}

impl Identity for Note {
    fn key(&self) -> &str {
        &self.key
    }

    fn set_key(&mut self, key: String) {
        self.key = key;
    }
}

#[test]
fn test_type_name_defaults_to_struct_name() {
    assert_eq!(Gauge::type_name(), "Gauge");
    assert_eq!(Note::type_name(), "Note");
}

#[test]
fn test_type_name_override() {
    assert_eq!(Account::type_name(), "user");
}

#[test]
fn test_only_public_unskipped_fields_are_mapped() {
    let names: Vec<_> = Account::fields().iter().map(|f| f.name()).collect();
    assert_eq!(
        names,
        vec!["id", "login", "karma", "visits", "ratio", "verified"]
    );
}

#[test]
fn test_private_key_field_is_not_stored() {
    let names: Vec<_> = Gauge::fields().iter().map(|f| f.name()).collect();
    assert_eq!(names, vec!["type", "reading"]);
}

#[test]
fn test_key_attribute_derives_identity() {
    let mut account = Account::default();
    assert_eq!(account.key(), "");
    account.set_key("42".to_string());
    assert_eq!(account.id, "42");
    assert_eq!(account.key(), "42");
}

#[test]
fn test_primitive_kinds() {
    let kinds: Vec<_> = Account::fields().iter().map(|f| f.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            FieldKind::String,
            FieldKind::String,
            FieldKind::I16,
            FieldKind::U64,
            FieldKind::F64,
            FieldKind::Bool,
        ]
    );
}

#[test]
fn test_unsupported_kinds_are_classified() {
    let kinds: Vec<_> = Unsupported::fields()
        .iter()
        .map(|f| (f.name(), f.kind()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("id", FieldKind::String),
            ("tags", FieldKind::Slice),
            ("window", FieldKind::Slice),
            ("labels", FieldKind::Map),
            ("ordered", FieldKind::Map),
            ("parent", FieldKind::Pointer),
            ("boxed", FieldKind::Pointer),
            ("shared", FieldKind::Pointer),
            ("wide", FieldKind::Struct),
        ]
    );
}

#[test]
fn test_encode_wire_values() {
    let account = Account {
        id: "7".into(),
        username: "grace".into(),
        karma: -3,
        visits: u64::MAX,
        ratio: 0.1,
        verified: true,
        session_token: "secret".into(),
        password_hash: "hash".into(),
    };

    let encoded = FieldMapper::encode(&account).unwrap();
    assert_eq!(encoded["login"], WireValue::Text("grace".into()));
    assert_eq!(encoded["karma"], WireValue::Text("-3".into()));
    assert_eq!(encoded["visits"], WireValue::Unsigned(u64::MAX));
    assert_eq!(encoded["ratio"], WireValue::Float(0.1));
    assert_eq!(encoded["verified"], WireValue::Text("1".into()));
    assert!(!encoded.contains_key("session_token"));
    assert!(!encoded.contains_key("password_hash"));
}

#[test]
fn test_encode_fails_on_first_unsupported_field() {
    let err = FieldMapper::encode(&Unsupported::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conversion);
    assert_eq!(
        err.to_string(),
        "store: cannot convert field tags of kind slice"
    );
}

#[test]
fn test_decode_uses_renamed_fields() {
    let stored: HashMap<String, String> = [
        ("login", "ada"),
        ("username", "ignored"),
        ("karma", "12"),
        ("verified", "true"),
        ("session_token", "ignored"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    let mut account = Account {
        visits: 5,
        ..Default::default()
    };
    FieldMapper::decode(&stored, &mut account).unwrap();
    assert_eq!(account.username, "ada");
    assert_eq!(account.karma, 12);
    assert!(account.verified);
    assert_eq!(account.visits, 5);
    assert!(account.session_token.is_empty());
}

#[tokio::test]
async fn test_derived_entities_round_trip_through_store() {
    let store = EntityStore::in_memory(StoreConfig::new()).await.unwrap();

    let mut account = Account {
        username: "linus".into(),
        karma: i16::MAX,
        visits: 1 << 40,
        ratio: std::f64::consts::PI,
        verified: true,
        session_token: "not stored".into(),
        ..Default::default()
    };
    store.write(&mut account).await.unwrap();

    let mut loaded = Account {
        id: account.id.clone(),
        ..Default::default()
    };
    store.read(&mut loaded).await.unwrap();
    assert_eq!(
        loaded,
        Account {
            session_token: String::new(),
            ..account.clone()
        }
    );
    assert_eq!(store.key_for(&account).unwrap(), format!("user:{}", account.id));

    let mut gauge = Gauge {
        r#type: "pressure".into(),
        reading: -0.5,
        ..Default::default()
    };
    store.write(&mut gauge).await.unwrap();
    let mut notes = vec![Note {
        body: "remember".into(),
        ..Default::default()
    }];
    store.write_multiple(&mut notes).await.unwrap();

    let mut gauges: Vec<Gauge> = store.list().await.unwrap();
    store.read_multiple(&mut gauges).await.unwrap();
    assert_eq!(gauges, vec![gauge]);

    let mut listed: Vec<Note> = store.list().await.unwrap();
    store.read_multiple(&mut listed).await.unwrap();
    assert_eq!(listed, notes);
}
