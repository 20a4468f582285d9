//! Fixed-width screen identities.

use std::fmt;

use serde::{Serialize, Serializer};

/// Width of the identity field in the output structures.
pub const SCREEN_ID_LEN: usize = 32;

/// A screen identity stored in a fixed 32-byte, NUL-padded field.
///
/// Identities longer than the field are cut at the last UTF-8 boundary
/// that fits. A full-width identity has no terminating NUL.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScreenId([u8; SCREEN_ID_LEN]);

impl ScreenId {
    pub fn new(identity: &str) -> Self {
        let mut end = identity.len().min(SCREEN_ID_LEN);
        while !identity.is_char_boundary(end) {
            end -= 1;
        }
        let mut buf = [0u8; SCREEN_ID_LEN];
        buf[..end].copy_from_slice(&identity.as_bytes()[..end]);
        Self(buf)
    }

    pub fn as_bytes(&self) -> &[u8; SCREEN_ID_LEN] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(SCREEN_ID_LEN);
        // built from a &str cut on a char boundary
        std::str::from_utf8(&self.0[..len]).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.0[0] == 0
    }
}

impl fmt::Debug for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScreenId({:?})", self.as_str())
    }
}

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ScreenId {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

/// The attached screens, in attachment order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScreenList {
    pub ids: Vec<ScreenId>,
}

impl ScreenList {
    pub fn count(&self) -> usize {
        self.ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_ids_are_padded() {
        let id = ScreenId::new("0001:03eb:8a2e");
        assert_eq!(id.as_str(), "0001:03eb:8a2e");
        assert_eq!(&id.as_bytes()[14..], &[0u8; 18]);
    }

    #[test]
    fn long_ids_fill_the_field() {
        let long = "x".repeat(40);
        let id = ScreenId::new(&long);
        assert_eq!(id.as_str(), &long[..SCREEN_ID_LEN]);
        assert!(id.as_bytes().iter().all(|&b| b == b'x'));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        // 31 ASCII bytes then a 2-byte char that would straddle the edge
        let s = format!("{}é", "a".repeat(31));
        let id = ScreenId::new(&s);
        assert_eq!(id.as_str(), "a".repeat(31));
    }

    #[test]
    fn empty_default() {
        assert!(ScreenId::default().is_empty());
        assert_eq!(ScreenId::default().as_str(), "");
    }
}
