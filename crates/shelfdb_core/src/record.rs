//! The record contract every stored entity type satisfies.
//!
//! A stored type implements [`Entity`]: it carries a stable [`RecordId`],
//! produces a canonical text encoding, and knows how to parse that
//! encoding back. The impl itself is the per-type descriptor; its
//! [`Entity::PARTITION`] names both the schema entry and the on-disk
//! subdirectory.
//!
//! [`TextRecord`] and [`TextFields`] implement the brace-delimited
//! `{ key: value , key: value }` encoding used by the bundled entity types.

use crate::error::{CoreError, CoreResult};
use std::any::{type_name, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Identifier of a record within its partition.
///
/// Identifiers are positive, allocated by the owning set and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(pub u64);

impl RecordId {
    /// Creates a record identifier.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the following identifier.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for RecordId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl FromStr for RecordId {
    type Err = CoreError;

    /// Parses a positive id. Zero is never assigned, so it is rejected.
    fn from_str(s: &str) -> CoreResult<Self> {
        match s.parse::<u64>() {
            Ok(0) => Err(CoreError::decode("record id must be positive")),
            Ok(raw) => Ok(Self(raw)),
            Err(e) => Err(CoreError::decode(format!("invalid record id {s:?}: {e}"))),
        }
    }
}

/// Trait for types that can be stored in a shelfdb partition.
///
/// Implementors must provide:
/// - `PARTITION`: the partition (and directory) name for the type
/// - `id()`: the stable, immutable record identifier
/// - `serialize()`: the canonical text encoding
/// - `deserialize()`: the inverse of `serialize`
///
/// Two records are the same stored entity iff their identifiers match.
///
/// # Example
///
/// ```rust
/// use shelfdb_core::{CoreResult, Entity, RecordId, TextFields, TextRecord};
///
/// #[derive(Debug, Clone, PartialEq)]
/// struct Dog {
///     id: RecordId,
///     name: String,
/// }
///
/// impl Entity for Dog {
///     const PARTITION: &'static str = "Dog";
///
///     fn id(&self) -> RecordId {
///         self.id
///     }
///
///     fn serialize(&self) -> String {
///         TextRecord::new()
///             .field("id", self.id.as_u64())
///             .field("name", &self.name)
///             .finish()
///     }
///
///     fn deserialize(text: &str) -> CoreResult<Self> {
///         let fields = TextFields::parse(text)?;
///         Ok(Dog {
///             id: fields.id()?,
///             name: fields.get("name")?.to_string(),
///         })
///     }
/// }
///
/// let dog = Dog { id: RecordId::new(3), name: "Rex".into() };
/// assert_eq!(dog.serialize(), "{ id: 3 , name: Rex }");
/// assert_eq!(Dog::deserialize(&dog.serialize()).unwrap(), dog);
/// ```
pub trait Entity: Clone + Send + Sync + 'static {
    /// The partition name for this type.
    const PARTITION: &'static str;

    /// Returns the record's identifier.
    fn id(&self) -> RecordId;

    /// Encodes the record as text.
    ///
    /// The encoding must be deterministic and must round-trip through
    /// [`Entity::deserialize`].
    fn serialize(&self) -> String;

    /// Decodes a record from its text encoding.
    fn deserialize(text: &str) -> CoreResult<Self>;
}

/// Explicit type identity attached to every schema entry.
#[derive(Debug, Clone, Copy)]
pub struct TypeTag {
    name: &'static str,
    type_id: TypeId,
}

impl TypeTag {
    /// Returns the tag of `T`.
    #[must_use]
    pub fn of<T: 'static>() -> Self {
        Self {
            name: type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }

    /// Returns the readable type name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for TypeTag {}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Builder for the `{ key: value , key: value }` text encoding.
///
/// Keys are emitted in sorted order so encodings are canonical. Values
/// have whitespace and the delimiters `{ } , : %` percent-escaped.
#[derive(Debug, Clone, Default)]
pub struct TextRecord {
    fields: BTreeMap<String, String>,
}

impl TextRecord {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field. A repeated key replaces the earlier value.
    #[must_use]
    pub fn field(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.fields.insert(key.to_string(), value.to_string());
        self
    }

    /// Produces the encoded text.
    #[must_use]
    pub fn finish(self) -> String {
        if self.fields.is_empty() {
            return "{ }".to_string();
        }
        let body = self
            .fields
            .iter()
            .map(|(k, v)| format!("{k}: {}", escape(v)))
            .collect::<Vec<_>>()
            .join(" , ");
        format!("{{ {body} }}")
    }
}

/// Fields parsed from a `{ key: value , ... }` encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFields {
    fields: BTreeMap<String, String>,
}

impl TextFields {
    /// Parses an encoded record.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Decode`] if the text is not enclosed in braces,
    /// a field has no `:` separator or an empty key, a key repeats, or a
    /// value contains a malformed escape.
    pub fn parse(text: &str) -> CoreResult<Self> {
        let inner = text
            .trim()
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .ok_or_else(|| CoreError::decode("expected a record enclosed in braces"))?
            .trim();

        let mut fields = BTreeMap::new();
        if inner.is_empty() {
            return Ok(Self { fields });
        }

        for pair in inner.split(',') {
            let (key, value) = pair
                .split_once(':')
                .ok_or_else(|| CoreError::decode(format!("field {:?} has no ':'", pair.trim())))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(CoreError::decode("field with empty key"));
            }
            let value = unescape(value.trim())?;
            if fields.insert(key.to_string(), value).is_some() {
                return Err(CoreError::decode(format!("duplicate field {key:?}")));
            }
        }
        Ok(Self { fields })
    }

    /// Returns a required field.
    pub fn get(&self, key: &str) -> CoreResult<&str> {
        self.fields
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| CoreError::decode(format!("missing field {key:?}")))
    }

    /// Parses a required field.
    pub fn parse_field<T>(&self, key: &str) -> CoreResult<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let raw = self.get(key)?;
        raw.parse()
            .map_err(|e| CoreError::decode(format!("field {key:?} = {raw:?}: {e}")))
    }

    /// Parses the `id` field.
    pub fn id(&self) -> CoreResult<RecordId> {
        self.get("id")?.parse()
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn needs_escape(c: char) -> bool {
    c.is_whitespace() || matches!(c, '{' | '}' | ',' | ':' | '%')
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if needs_escape(c) {
            let mut buf = [0u8; 4];
            for b in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{b:02X}"));
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn unescape(value: &str) -> CoreResult<String> {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = value
                .get(i + 1..i + 3)
                .ok_or_else(|| CoreError::decode("truncated escape sequence"))?;
            let b = u8::from_str_radix(hex, 16)
                .map_err(|_| CoreError::decode(format!("invalid escape %{hex}")))?;
            out.push(b);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| CoreError::decode("escaped value is not UTF-8"))
}
