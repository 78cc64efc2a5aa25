//! FNV-1a hashes used by resource containers
//!
//! Two widths are in use:
//!
//! - 32-bit over the *lowercased* identifier, stored in front of every
//!   string in a blang table
//! - 64-bit over the *raw* bytes of a resource path, used as the key of the
//!   resource-data side file
//!
//! The 64-bit path hash performs no case folding even though paths are
//! compared case-insensitively elsewhere. Lookups must hash the path
//! exactly as the side file's producer did.

const FNV32_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV32_PRIME: u32 = 0x0100_0193;
const FNV64_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV64_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Compute the 32-bit FNV-1a hash of `data`
///
/// # Examples
///
/// ```
/// use resforge_crypto::fnv::fnv1a32;
///
/// assert_eq!(fnv1a32(b""), 0x811c_9dc5);
/// ```
pub fn fnv1a32(data: &[u8]) -> u32 {
    data.iter().fold(FNV32_OFFSET_BASIS, |hash, &byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV32_PRIME)
    })
}

/// Compute the 64-bit FNV-1a hash of `data`
pub fn fnv1a64(data: &[u8]) -> u64 {
    data.iter().fold(FNV64_OFFSET_BASIS, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV64_PRIME)
    })
}

/// Hash a blang string identifier
///
/// The identifier is lowercased before hashing, so the stored hash never
/// depends on the casing a mod author used.
pub fn string_hash(identifier: &str) -> u32 {
    fnv1a32(identifier.to_lowercase().as_bytes())
}

/// Hash a resource path for resource-data lookups
pub fn resource_path_hash(path: &str) -> u64 {
    fnv1a64(path.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv1a32_reference_vectors() {
        assert_eq!(fnv1a32(b""), 0x811c_9dc5);
        assert_eq!(fnv1a32(b"a"), 0xe40c_292c);
        assert_eq!(fnv1a32(b"foobar"), 0xbf9c_f968);
    }

    #[test]
    fn test_fnv1a64_reference_vectors() {
        assert_eq!(fnv1a64(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a64(b"a"), 0xaf63_dc4c_8601_ec8c);
        assert_eq!(fnv1a64(b"foobar"), 0x8594_4171_f739_67e8);
    }

    #[test]
    fn test_string_hash_is_case_insensitive() {
        assert_eq!(string_hash("#str_MENU_Title"), string_hash("#str_menu_title"));
        assert_eq!(string_hash("ABC"), fnv1a32(b"abc"));
    }

    #[test]
    fn test_resource_path_hash_is_case_sensitive() {
        assert_ne!(
            resource_path_hash("generated/decls/Foo.decl"),
            resource_path_hash("generated/decls/foo.decl")
        );
        assert_eq!(resource_path_hash("a"), fnv1a64(b"a"));
    }
}
