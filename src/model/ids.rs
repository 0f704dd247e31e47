//! Serde helpers for 64-bit ids and permission bitsets.
//!
//! Discord sends snowflakes and permission sets as decimal strings, while
//! some producers emit plain numbers. Both forms are accepted; strings are
//! written back out.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

struct Raw(u64);

impl Serialize for Raw {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Raw {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RawVisitor;

        impl Visitor<'_> for RawVisitor {
            type Value = Raw;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an unsigned integer or a decimal string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Raw, E> {
                Ok(Raw(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Raw, E> {
                u64::try_from(v)
                    .map(Raw)
                    .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Raw, E> {
                v.parse()
                    .map(Raw)
                    .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_any(RawVisitor)
    }
}

pub fn serialize<S: Serializer>(id: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    Raw(*id).serialize(serializer)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    Raw::deserialize(deserializer).map(|raw| raw.0)
}

/// Same as the parent module, for `Option<u64>` fields.
pub mod option {
    use super::*;

    pub fn serialize<S: Serializer>(id: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
        match id {
            Some(id) => serializer.serialize_some(&Raw(*id)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
        Option::<Raw>::deserialize(deserializer).map(|raw| raw.map(|r| r.0))
    }
}

/// Same as the parent module, for `Vec<u64>` fields.
pub mod vec {
    use super::*;

    pub fn serialize<S: Serializer>(ids: &[u64], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(ids.iter().map(|id| Raw(*id)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u64>, D::Error> {
        Vec::<Raw>::deserialize(deserializer).map(|raw| raw.into_iter().map(|r| r.0).collect())
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Holder {
        #[serde(with = "super")]
        id: u64,
        #[serde(default, with = "super::option")]
        parent: Option<u64>,
        #[serde(default, with = "super::vec")]
        roles: Vec<u64>,
    }

    #[test]
    fn test_accepts_strings_and_numbers() {
        let holder: Holder =
            serde_json::from_str(r#"{"id": "81384788765712384", "parent": 5, "roles": ["1", 2]}"#)
                .unwrap();

        assert_eq!(holder.id, 81384788765712384);
        assert_eq!(holder.parent, Some(5));
        assert_eq!(holder.roles, vec![1, 2]);
    }

    #[test]
    fn test_writes_strings() {
        let holder = Holder { id: 7, parent: None, roles: vec![3] };
        let json = serde_json::to_value(&holder).unwrap();

        assert_eq!(json["id"], "7");
        assert!(json["parent"].is_null());
        assert_eq!(json["roles"][0], "3");
    }

    #[test]
    fn test_rejects_negative_ids() {
        assert!(serde_json::from_str::<Holder>(r#"{"id": -1}"#).is_err());
    }
}
