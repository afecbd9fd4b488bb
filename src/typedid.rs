use std::cmp::Ordering;
use std::fmt::{Debug, Display};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::str::FromStr;

use mongodb::bson::Bson;
use serde::{de::Error, Deserialize, Serialize};
use uuid::Uuid;

/// Marks a record type that owns a family of ids, e.g. `CMP-...` for campaigns.
pub trait TypedIdMarker {
    fn tag() -> &'static str;
}

/// A uuid that carries the record type it identifies and renders with that
/// type's tag prefix.
pub struct TypedId<T: TypedIdMarker>(Uuid, PhantomData<T>);

impl<T: TypedIdMarker> TypedId<T> {
    pub fn new() -> TypedId<T> {
        TypedId(Uuid::new_v4(), PhantomData)
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl<T: TypedIdMarker> Default for TypedId<T> {
    fn default() -> TypedId<T> {
        TypedId::new()
    }
}

impl<T: TypedIdMarker> Copy for TypedId<T> {}

impl<T: TypedIdMarker> Clone for TypedId<T> {
    fn clone(&self) -> TypedId<T> {
        *self
    }
}

impl<T: TypedIdMarker> PartialEq for TypedId<T> {
    fn eq(&self, other: &TypedId<T>) -> bool {
        self.0 == other.0
    }
}

impl<T: TypedIdMarker> Eq for TypedId<T> {}

impl<T: TypedIdMarker> Hash for TypedId<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl<T: TypedIdMarker> PartialOrd for TypedId<T> {
    fn partial_cmp(&self, other: &TypedId<T>) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: TypedIdMarker> Ord for TypedId<T> {
    fn cmp(&self, other: &TypedId<T>) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl<T: TypedIdMarker> Display for TypedId<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}-{:X}", T::tag(), self.0.simple())
    }
}

impl<T: TypedIdMarker> Debug for TypedId<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        Display::fmt(self, f)
    }
}

impl<T: TypedIdMarker> FromStr for TypedId<T> {
    type Err = TypedIdParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tag, id) = s.split_once('-').ok_or(TypedIdParseError::InvalidFormat)?;

        if tag != T::tag() {
            return Err(TypedIdParseError::InvalidTag {
                expected: T::tag(),
            });
        }

        let uuid = Uuid::from_str(id).map_err(|_| TypedIdParseError::InvalidUuid)?;

        Ok(TypedId(uuid, PhantomData))
    }
}

impl<T: TypedIdMarker> Serialize for TypedId<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de, T: TypedIdMarker> Deserialize<'de> for TypedId<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        TypedId::from_str(&s).map_err(D::Error::custom)
    }
}

impl<T: TypedIdMarker> From<TypedId<T>> for Bson {
    fn from(id: TypedId<T>) -> Bson {
        id.to_string().into()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TypedIdParseError {
    InvalidFormat,
    InvalidTag { expected: &'static str },
    InvalidUuid,
}

impl Display for TypedIdParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            TypedIdParseError::InvalidFormat => write!(f, "expected an id of the form TAG-HEX"),
            TypedIdParseError::InvalidTag { expected } => {
                write!(f, "expected an id with the {} tag", expected)
            }
            TypedIdParseError::InvalidUuid => write!(f, "id does not contain a valid uuid"),
        }
    }
}

impl std::error::Error for TypedIdParseError {}
