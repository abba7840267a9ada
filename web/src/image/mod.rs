//! Hybrid image storage: small uploads live inside the user record, large
//! ones in the uploads directory with only their path recorded.

pub mod decision;
pub mod migration;
pub mod retrieval;

pub use decision::{classify, ImageStorage, StagedUpload, StagingFile};
pub use migration::{migrate, MigrationReport};
pub use retrieval::{retrieve, ImageBody, ImageContent};

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// The declared MIME type when it is a plausible `type/subtype[; params]`,
/// [`DEFAULT_CONTENT_TYPE`] otherwise.
pub fn content_type_or_default(declared: Option<&str>) -> String {
    match declared {
        Some(value) if is_mime(value) => value.trim().to_owned(),
        _ => DEFAULT_CONTENT_TYPE.to_owned(),
    }
}

fn is_mime(value: &str) -> bool {
    if !value.bytes().all(|b| b == b'\t' || (0x20..0x7f).contains(&b)) {
        return false;
    }
    let essence = value.split(';').next().unwrap_or_default().trim();
    match essence.split_once('/') {
        Some((kind, subtype)) => is_token(kind) && is_token(subtype),
        None => false,
    }
}

fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$&-^_.+".contains(&b))
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_declared_type_is_kept() {
        assert_eq!("image/png", content_type_or_default(Some("image/png")));
        assert_eq!(
            "image/svg+xml; charset=utf-8",
            content_type_or_default(Some(" image/svg+xml; charset=utf-8 "))
        );
    }

    #[test]
    fn test_missing_or_invalid_type_defaults() {
        for declared in [
            None,
            Some(""),
            Some("   "),
            Some("png"),
            Some("image/"),
            Some("a/b\n"),
            Some("image/png\r\nX-Injected: 1"),
        ] {
            assert_eq!(DEFAULT_CONTENT_TYPE, content_type_or_default(declared));
        }
    }
}
