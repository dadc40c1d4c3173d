//! Grain identity types.

use std::fmt;


/// Opaque key addressing one logical grain instance.
///
/// Identical keys always reach the same state; distinct keys never share
/// state. Keys are scoped to a single [`GrainRuntime`](super::GrainRuntime),
/// so two grain types may reuse the same string.
///
/// # Examples
///
/// ```rust
/// use grainbot::grain::GrainKey;
///
/// let per_user = GrainKey::new("hello world|42");
/// let singleton = GrainKey::new("dadjoke");
/// assert_ne!(per_user, singleton);
/// ```
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub struct GrainKey(String);

impl GrainKey {
    /// Create a key from any string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GrainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GrainKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for GrainKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Unique identifier for one activation of a grain.
///
/// A key that is evicted and later called again gets a new activation with
/// a new id, which distinguishes the two lifetimes in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActivationId(pub u64);

impl fmt::Display for ActivationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "act-{:016x}", self.0)
    }
}
