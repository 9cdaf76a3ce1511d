//! Stable identity tokens.
//!
//! Views, patches and link lists never hold references into a [`Group`](crate::Group).
//! They hold these keys and resolve them against whichever group they are used with.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a table within a group. Stable across group clones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableKey(pub u32);

/// Identifies a column within a table (its position in the table schema).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColKey(pub usize);

/// Identifies an object within a table. Never reused after deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjKey(pub i64);

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

impl fmt::Display for ColKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0)
    }
}

impl fmt::Display for ObjKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "O{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes() {
        assert_eq!(TableKey(3).to_string(), "T3");
        assert_eq!(ColKey(0).to_string(), "C0");
        assert_eq!(ObjKey(42).to_string(), "O42");
    }

    #[test]
    fn keys_serialize_transparently_enough() {
        let json = serde_json::to_string(&ObjKey(7)).unwrap();
        assert_eq!(json, "7");
        let parsed: ObjKey = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ObjKey(7));
    }
}
