use ulid::Ulid;

/// Generates a new ULID-based ID with the given prefix.
///
/// # Examples
/// ```
/// let id = clover_common::id::prefixed_ulid("cn");
/// assert!(id.starts_with("cn_"));
/// ```
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new())
}

/// Marker trait for types that represent a prefixed ID.
pub trait PrefixedId {
    const PREFIX: &'static str;

    fn generate() -> String {
        prefixed_ulid(Self::PREFIX)
    }
}

/// Well-known ID prefixes.
pub mod prefix {
    /// Gateway connections (one per live socket).
    pub const CONNECTION: &str = "cn";
    pub const USER: &str = "usr";
    pub const MAIL: &str = "mail";
}
