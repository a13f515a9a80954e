use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Tri-state selection value.
///
/// Leaves only ever hold [`Selected`](Self::Selected) or
/// [`Unselected`](Self::Unselected); [`Mixed`](Self::Mixed) is the derived
/// folder value for "some but not all descendants selected". The serialized
/// form is the JSON union `true` / `false` / `"mixed"`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SelectState {
    /// Fully selected.
    Selected,
    /// Not selected.
    #[default]
    Unselected,
    /// Partially selected (folder-derived).
    Mixed,
}

impl SelectState {
    /// Returns `true` only for [`Self::Selected`] — `Mixed` does not count.
    #[inline]
    #[must_use]
    pub const fn is_selected(self) -> bool {
        matches!(self, Self::Selected)
    }

    /// Returns `true` for [`Self::Mixed`].
    #[inline]
    #[must_use]
    pub const fn is_mixed(self) -> bool {
        matches!(self, Self::Mixed)
    }
}

impl From<bool> for SelectState {
    fn from(selected: bool) -> Self {
        if selected { Self::Selected } else { Self::Unselected }
    }
}

impl From<SelectState> for serde_json::Value {
    fn from(state: SelectState) -> Self {
        match state {
            SelectState::Selected => Self::Bool(true),
            SelectState::Unselected => Self::Bool(false),
            SelectState::Mixed => Self::String("mixed".to_owned()),
        }
    }
}

impl Serialize for SelectState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Selected => serializer.serialize_bool(true),
            Self::Unselected => serializer.serialize_bool(false),
            Self::Mixed => serializer.serialize_str("mixed"),
        }
    }
}

struct SelectStateVisitor;

impl Visitor<'_> for SelectStateVisitor {
    type Value = SelectState;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a boolean or the string \"mixed\"")
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> Result<Self::Value, E> {
        Ok(SelectState::from(value))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        if value == "mixed" {
            Ok(SelectState::Mixed)
        } else {
            Err(E::invalid_value(de::Unexpected::Str(value), &self))
        }
    }
}

impl<'de> Deserialize<'de> for SelectState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(SelectStateVisitor)
    }
}
