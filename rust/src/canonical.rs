//! Show-name canonicalization.

/// Turn a human-readable show name into a lowercase, hyphen-separated ASCII
/// token usable as a CRID path segment.
///
/// Deterministic and idempotent. Names without any alphanumeric content
/// canonicalize to an empty string.
pub fn canonicalize_show(raw: &str) -> String {
    slug::slugify(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_non_ascii() {
        assert_eq!(canonicalize_show("à suivre #42"), "a-suivre-42");
        assert_eq!(canonicalize_show("Der Morgen"), "der-morgen");
        assert_eq!(
            canonicalize_show("Grüezi Wohl, Frau Stirnimaa!"),
            "gruezi-wohl-frau-stirnimaa"
        );
    }

    #[test]
    fn test_canonicalize_idempotent() {
        for name in ["à suivre #42", "Info", "  Klang   Becken  ", "test"] {
            let once = canonicalize_show(name);
            assert_eq!(canonicalize_show(&once), once);
        }
    }

    #[test]
    fn test_canonicalize_empty() {
        assert_eq!(canonicalize_show(""), "");
        assert_eq!(canonicalize_show("###"), "");
    }
}
