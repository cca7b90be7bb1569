//! File type tags and the file extensions they imply.

use std::path::Path;

/// Extension a type tag requires, including the leading dot.
pub fn extension_for(type_tag: &str) -> Option<&'static str> {
    let ext = match type_tag.to_lowercase().as_str() {
        "txt" | "text" => ".txt",
        "py" | "python" => ".py",
        "js" | "javascript" => ".js",
        "html" => ".html",
        "css" => ".css",
        "md" | "markdown" => ".md",
        "json" => ".json",
        "xml" => ".xml",
        "csv" => ".csv",
        "yml" => ".yml",
        "yaml" => ".yaml",
        "pdf" => ".pdf",
        "png" => ".png",
        "jpg" => ".jpg",
        "jpeg" => ".jpeg",
        "gif" => ".gif",
        _ => return None,
    };
    Some(ext)
}

/// Type tag guessed from a file name's extension, `unknown` when unmapped.
pub fn infer_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "py" => "python",
        "txt" => "text",
        "md" => "markdown",
        "html" => "html",
        "css" => "css",
        "js" => "javascript",
        "json" => "json",
        "csv" => "csv",
        _ => "unknown",
    }
}

/// Returns the file name carrying the extension `type_tag` implies.
///
/// Names that already end with it (case-insensitively) are kept; a different
/// extension is replaced; a missing one is appended. Unknown tags leave the
/// name alone.
pub fn normalize_file_name(file_name: &str, type_tag: &str) -> String {
    let Some(expected) = extension_for(type_tag) else {
        return file_name.to_string();
    };

    if file_name.to_lowercase().ends_with(expected) {
        return file_name.to_string();
    }

    match Path::new(file_name).file_stem().and_then(|s| s.to_str()) {
        Some(stem) if Path::new(file_name).extension().is_some() => format!("{stem}{expected}"),
        _ => format!("{file_name}{expected}"),
    }
}

/// Suffixes that mark a bare string result as a file path.
pub const PATH_SUFFIXES: [&str; 7] = [".txt", ".py", ".json", ".html", ".css", ".md", ".csv"];

pub fn looks_like_path(s: &str) -> bool {
    PATH_SUFFIXES.iter().any(|ext| s.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_appends_missing_extension() {
        assert_eq!(normalize_file_name("report", "json"), "report.json");
        assert_eq!(normalize_file_name("notes", "markdown"), "notes.md");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        assert_eq!(normalize_file_name("report.json", "json"), "report.json");
        assert_eq!(normalize_file_name("REPORT.JSON", "json"), "REPORT.JSON");
        let once = normalize_file_name("script", "python");
        assert_eq!(normalize_file_name(&once, "python"), once);
    }

    #[test]
    fn test_normalize_replaces_other_extension() {
        assert_eq!(normalize_file_name("data.txt", "csv"), "data.csv");
        assert_eq!(normalize_file_name("archive.tar.gz", "yaml"), "archive.tar.yaml");
    }

    #[test]
    fn test_unknown_tag_leaves_name_alone() {
        assert_eq!(normalize_file_name("thing.bin", "unknown"), "thing.bin");
        assert_eq!(normalize_file_name("thing", "docx"), "thing");
    }

    #[test]
    fn test_dotfile_gets_extension_appended() {
        assert_eq!(normalize_file_name(".env", "text"), ".env.txt");
    }

    #[test]
    fn test_infer_type() {
        assert_eq!(infer_type(Path::new("/a/b/main.py")), "python");
        assert_eq!(infer_type(Path::new("README.MD")), "markdown");
        assert_eq!(infer_type(Path::new("logo.png")), "unknown");
        assert_eq!(infer_type(Path::new("Makefile")), "unknown");
    }

    #[test]
    fn test_looks_like_path() {
        assert!(looks_like_path("out/result.csv"));
        assert!(!looks_like_path("just some words"));
        assert!(!looks_like_path("image.png"));
    }
}
