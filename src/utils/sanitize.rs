use std::sync::LazyLock;

use regex::Regex;

static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9.\-]").unwrap());
static REPEATED_UNDERSCORES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_{2,}").unwrap());

/// Strips markup from free text written by reviewers before it is stored.
///
/// Uses ammonia's whitelist, so harmless formatting survives while
/// `<script>` blocks and event-handler attributes are removed.
pub fn clean_text(input: &str) -> String {
    ammonia::clean(input.trim())
}

/// Reduces a client-supplied file name to a safe display form.
///
/// Directory components are dropped, anything outside `[A-Za-z0-9.-]`
/// becomes `_`, and runs of underscores collapse to one.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let replaced = UNSAFE_FILENAME_CHARS.replace_all(base, "_");
    let collapsed = REPEATED_UNDERSCORES.replace_all(&replaced, "_");
    let trimmed = collapsed.trim_matches('_');

    if trimmed.is_empty() {
        "document".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Lowercased extension including the leading dot, e.g. `.pdf`.
pub fn extension_of(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    base.rfind('.')
        .filter(|&idx| idx + 1 < base.len())
        .map(|idx| base[idx..].to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_tags_are_removed() {
        assert_eq!(clean_text("<b>ok</b><script>alert(1)</script>"), "<b>ok</b>");
    }

    #[test]
    fn filenames_lose_paths_and_odd_characters() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\docs\\my scan (1).PNG"), "my_scan_1_.PNG");
        assert_eq!(sanitize_filename("___"), "document");
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(extension_of("Scan.JPEG").as_deref(), Some(".jpeg"));
        assert_eq!(extension_of("archive.tar.gz").as_deref(), Some(".gz"));
        assert_eq!(extension_of("README"), None);
        assert_eq!(extension_of("trailing."), None);
    }
}
