//! Naming rules for the key the pet collection is persisted under.

/// Key the collection blob is stored under unless configured otherwise.
pub const DEFAULT_STORAGE_KEY: &str = "pet_shelter.pets";

/// Keys double as file names, so only `[A-Za-z0-9._-]` is allowed and no leading dot.
pub fn is_valid_storage_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('.')
        && key.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}
