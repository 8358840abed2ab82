//! Shared key handling for storage backends.
//!
//! Key format: `{owner_id}/{token}_{original_filename}`. The part after the
//! owner prefix is the "bare" name.

use crate::traits::{StorageError, StorageResult};
use uuid::Uuid;

/// Derive a fresh storage key for `original_filename` owned by `owner`.
pub fn derive_key(owner: Uuid, original_filename: &str) -> String {
    format!("{}/{}_{}", owner, Uuid::new_v4(), original_filename)
}

/// Full key for a bare name of `owner`.
pub fn full_key(owner: Uuid, bare_name: &str) -> String {
    format!("{}/{}", owner, bare_name)
}

/// Leading segment up to the first `/`, if any.
pub fn owner_prefix(key: &str) -> Option<&str> {
    key.split_once('/').map(|(prefix, _)| prefix)
}

/// Last path segment of a key.
pub fn basename(key: &str) -> &str {
    key.rsplit_once('/').map_or(key, |(_, name)| name)
}

/// Split a bare name into `(token, original)` on the first `_`.
///
/// Names without `_` have an empty token and are their own original.
pub fn split_stored_name(name: &str) -> (&str, &str) {
    match name.split_once('_') {
        Some((token, original)) => (token, original),
        None => ("", name),
    }
}

/// Whether `segment` looks like a generated token.
pub fn is_token(segment: &str) -> bool {
    Uuid::parse_str(segment).is_ok()
}

/// Reject original filenames that could escape the owner namespace.
pub fn validate_original_filename(name: &str) -> StorageResult<()> {
    if name.trim().is_empty() {
        return Err(StorageError::InvalidKey("File name is empty".to_string()));
    }
    if name.contains('/') || name.contains('\\') || name.contains('\0') || name == ".." {
        return Err(StorageError::InvalidKey(format!(
            "File name '{}' contains path separators",
            name
        )));
    }
    Ok(())
}

/// Bare name for a client-supplied file name of `owner`.
///
/// A leading owner prefix is stripped when it names `owner`; a prefix naming
/// anyone else is reported as not found. The remaining name must be a single
/// path segment.
pub fn bare_name_for_owner(owner: Uuid, file_name: &str) -> StorageResult<String> {
    let bare = match file_name.split_once('/') {
        Some((prefix, rest)) => {
            if prefix.is_empty() || prefix == "." || prefix == ".." {
                return Err(StorageError::InvalidKey(format!(
                    "'{}' is not a valid file name",
                    file_name
                )));
            }
            if prefix != owner.to_string() {
                return Err(StorageError::NotFound(file_name.to_string()));
            }
            rest
        }
        None => file_name,
    };
    if bare.is_empty()
        || bare == "."
        || bare == ".."
        || bare.contains('/')
        || bare.contains('\\')
        || bare.contains('\0')
    {
        return Err(StorageError::InvalidKey(format!(
            "'{}' is not a valid file name",
            file_name
        )));
    }
    Ok(bare.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_key_layout() {
        let owner = Uuid::new_v4();
        let key = derive_key(owner, "report.pdf");
        assert_eq!(owner_prefix(&key), Some(owner.to_string().as_str()));

        let (token, original) = split_stored_name(basename(&key));
        assert!(is_token(token));
        assert_eq!(original, "report.pdf");
    }

    #[test]
    fn test_derived_keys_differ() {
        let owner = Uuid::new_v4();
        assert_ne!(derive_key(owner, "a.png"), derive_key(owner, "a.png"));
    }

    #[test]
    fn test_split_keeps_underscores_in_original() {
        assert_eq!(
            split_stored_name("abc_my_file_v2.pdf"),
            ("abc", "my_file_v2.pdf")
        );
        assert_eq!(split_stored_name("plain.pdf"), ("", "plain.pdf"));
    }

    #[test]
    fn test_bare_name_for_owner() {
        let owner = Uuid::new_v4();
        assert_eq!(bare_name_for_owner(owner, "t_a.pdf").unwrap(), "t_a.pdf");
        assert_eq!(
            bare_name_for_owner(owner, &full_key(owner, "t_a.pdf")).unwrap(),
            "t_a.pdf"
        );

        let other = full_key(Uuid::new_v4(), "t_a.pdf");
        assert!(matches!(
            bare_name_for_owner(owner, &other),
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            bare_name_for_owner(owner, &format!("{}/../x", owner)),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            bare_name_for_owner(owner, ".."),
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_bare_name_rejects_relative_prefixes() {
        let owner = Uuid::new_v4();
        for name in ["../x", "./x", "/x", "../secret"] {
            assert!(
                matches!(
                    bare_name_for_owner(owner, name),
                    Err(StorageError::InvalidKey(_))
                ),
                "{} was accepted",
                name
            );
        }
        assert!(matches!(
            bare_name_for_owner(owner, &format!("{}/../x", owner)),
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_validate_original_filename() {
        assert!(validate_original_filename("report.pdf").is_ok());
        assert!(validate_original_filename("../etc/passwd").is_err());
        assert!(validate_original_filename("  ").is_err());
    }
}
