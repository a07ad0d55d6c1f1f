//! Content-addressed hashing for derived object names.
//!
//! Derived volumes (config-map and secret mounts) need names that stay stable
//! across reconciliation passes without persisting any bookkeeping: the same
//! mount declaration must always produce the same name, so the engine can
//! recognize an already-applied volume by name alone. This module hashes a
//! canonical serialization of the declaring value with 32-bit FNV-1a and
//! renders the result as a decimal string.

use serde::Serialize;

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// Hash arbitrary serializable content into a stable decimal string.
///
/// The value is canonicalized through `serde_json::Value` before hashing:
/// map keys are sorted and all ownership indirection is flattened away, so
/// two structurally equal values hash identically regardless of how they are
/// allocated. The serialized form is prefixed with the value's declared type
/// name, so structurally identical values of *different* types do not
/// collide. This means renaming a hashed type changes every name derived
/// from it; that coupling is intentional and must be preserved, because
/// already-deployed clusters depend on the names it produces.
///
/// Never fails: a value that cannot pass through `serde_json::Value` is
/// hashed as its type name alone.
pub fn hash_object<T: Serialize>(value: &T) -> String {
    let mut bytes = short_type_name::<T>().as_bytes().to_vec();
    if let Ok(canonical) = serde_json::to_value(value) {
        // serde_json maps are key-sorted, so this rendering is canonical.
        if let Ok(text) = serde_json::to_string(&canonical) {
            bytes.extend_from_slice(text.as_bytes());
        }
    }
    fnv1a32(&bytes).to_string()
}

/// Derive a stable volume name of the form `<base>-<suffix>`.
///
/// The suffix is the first four characters of the decimal FNV-1a hash of
/// `content` (hashes shorter than four digits are used whole). Identical
/// content always yields an identical suffix, which is what lets repeated
/// reconciliation cycles reuse the same derived name for the same mount
/// declaration.
pub fn derived_name<T: Serialize>(base: &str, content: &T) -> String {
    let digest = hash_object(content);
    let suffix = &digest[..digest.len().min(4)];
    format!("{}-{}", base, suffix)
}

/// FNV-1a over raw bytes, 32-bit variant.
fn fnv1a32(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in bytes {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// The unqualified name of `T`, without its module path.
fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}
