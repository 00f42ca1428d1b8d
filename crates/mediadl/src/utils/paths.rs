//! Filename sanitizing and base-directory containment.

use std::path::{Component, Path, PathBuf};

/// Fallback name for empty or unusable filenames.
pub const DEFAULT_FILENAME: &str = "downloaded_file";

/// Sanitize a string for use as a filename.
///
/// Path separators, reserved characters and control whitespace become `_`.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\r' | '\n' | '\t' => '_',
            c => c,
        })
        .collect();

    if cleaned.is_empty() {
        DEFAULT_FILENAME.to_string()
    } else {
        cleaned
    }
}

/// Best-effort filename from the last path segment of a URL.
pub fn guess_filename_from_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or_default();
    let tail = without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    // "http://host" leaves the authority as the only segment
    if tail.is_empty() || without_query.trim_end_matches('/').ends_with(':') {
        return DEFAULT_FILENAME.to_string();
    }
    sanitize_filename(tail)
}

/// Resolve `.` and `..` components without touching the filesystem.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Resolve symlinks in the longest existing prefix of `path`.
///
/// The not-yet-existing remainder is appended unchanged, so a destination
/// that will be created later still resolves to where it will really land.
pub fn resolve_symlinks(path: &Path) -> PathBuf {
    let path = normalize_lexically(path);
    let mut existing = path.as_path();
    let mut missing = Vec::new();
    loop {
        if let Ok(mut resolved) = std::fs::canonicalize(existing) {
            resolved.extend(missing.iter().rev());
            return resolved;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name);
                existing = parent;
            }
            _ => return path.clone(),
        }
    }
}

/// Check that `target` lies inside `base` once both are normalized.
///
/// Purely lexical; resolve both sides with [`resolve_symlinks`] first when
/// they may contain links.
///
/// Returns the normalized target.
pub fn ensure_within_base(base: &Path, target: &Path) -> Option<PathBuf> {
    let base = normalize_lexically(base);
    let target = normalize_lexically(target);
    if target.starts_with(&base) {
        Some(target)
    } else {
        None
    }
}

/// Sibling path with an extra extension inserted before the real one:
/// `clip.mp4` + `normalized` → `clip.normalized.mp4`.
pub fn with_infix(path: &Path, infix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}.{}.{}", stem, infix, ext.to_string_lossy()),
        None => format!("{}.{}", stem, infix),
    };
    path.with_file_name(name)
}

/// Path with `suffix` appended to the full filename: `clip.mp4` → `clip.mp4.part`.
pub fn with_appended_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("clip.mp4"), "clip.mp4");
        assert_eq!(sanitize_filename("a/b\\c:d"), "a_b_c_d");
        assert_eq!(sanitize_filename("  what?.mp4 "), "what_.mp4");
        assert_eq!(sanitize_filename("   "), DEFAULT_FILENAME);
        assert_eq!(sanitize_filename(""), DEFAULT_FILENAME);
    }

    #[test]
    fn test_guess_filename_from_url() {
        assert_eq!(guess_filename_from_url("http://x/a.mp4"), "a.mp4");
        assert_eq!(
            guess_filename_from_url("https://cdn.example.com/v/clip.mov?token=abc"),
            "clip.mov"
        );
        assert_eq!(guess_filename_from_url("https://x/dir/"), "dir");
        assert_eq!(guess_filename_from_url("https://example.com"), "example.com");
        assert_eq!(guess_filename_from_url("https://"), DEFAULT_FILENAME);
    }

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(
            normalize_lexically(Path::new("/media/./a/../b.mp4")),
            PathBuf::from("/media/b.mp4")
        );
    }

    #[test]
    fn test_ensure_within_base() {
        let base = Path::new("/media/downloads");
        assert_eq!(
            ensure_within_base(base, Path::new("/media/downloads/sub/a.mp4")),
            Some(PathBuf::from("/media/downloads/sub/a.mp4"))
        );
        assert!(ensure_within_base(base, Path::new("/media/downloads/../etc/passwd")).is_none());
        assert!(ensure_within_base(base, Path::new("/media/downloads2/a.mp4")).is_none());
    }

    #[test]
    fn test_resolve_symlinks_keeps_missing_tail() {
        let dir = tempfile::TempDir::new().unwrap();
        let real = std::fs::canonicalize(dir.path()).unwrap();
        assert_eq!(
            resolve_symlinks(&dir.path().join("new/sub/a.mp4")),
            real.join("new/sub/a.mp4")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_symlinks_follows_links() {
        let base = tempfile::TempDir::new().unwrap();
        let outside = tempfile::TempDir::new().unwrap();
        let link = base.path().join("link");
        std::os::unix::fs::symlink(outside.path(), &link).unwrap();

        let resolved = resolve_symlinks(&link.join("a.mp4"));
        assert_eq!(
            resolved,
            std::fs::canonicalize(outside.path()).unwrap().join("a.mp4")
        );
        assert!(ensure_within_base(&resolve_symlinks(base.path()), &resolved).is_none());
    }

    #[test]
    fn test_with_infix() {
        assert_eq!(
            with_infix(Path::new("/m/clip.mp4"), "normalized"),
            PathBuf::from("/m/clip.normalized.mp4")
        );
        assert_eq!(
            with_infix(Path::new("/m/clip"), "thumb"),
            PathBuf::from("/m/clip.thumb")
        );
    }

    #[test]
    fn test_with_appended_suffix() {
        assert_eq!(
            with_appended_suffix(Path::new("/m/clip.mp4"), ".part"),
            PathBuf::from("/m/clip.mp4.part")
        );
    }
}
