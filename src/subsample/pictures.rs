use super::CacheError;
use std::path::Path;
use walkdir::WalkDir;

/// Extensions served as pictures. Matching is exact, so `.Jpg` is not one.
pub const PICTURE_EXTENSIONS: [&str; 4] = [".jpg", ".jpeg", ".JPG", ".JPEG"];

pub fn is_picture(path: &str) -> bool {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name.rfind('.') {
        // A leading dot is a hidden file name, not an extension
        Some(index) if index > 0 => PICTURE_EXTENSIONS.contains(&&file_name[index..]),
        _ => false,
    }
}

/// Accept only clean relative paths: forward slashes, no empty, `.` or `..`
/// components, no leading slash.
pub fn sanitize_relative_path(path: &str) -> Result<&str, CacheError> {
    if path.is_empty() || path.starts_with('/') || path.contains('\\') {
        return Err(CacheError::InvalidPath);
    }

    if path
        .split('/')
        .any(|component| component.is_empty() || component == "." || component == "..")
    {
        return Err(CacheError::InvalidPath);
    }

    Ok(path)
}

/// Relative paths of every picture below `root`, in walk order.
pub fn walk_pictures(root: &Path) -> Vec<String> {
    WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let relative = entry.path().strip_prefix(root).ok()?;
            let components: Option<Vec<&str>> = relative
                .components()
                .map(|component| component.as_os_str().to_str())
                .collect();
            Some(components?.join("/"))
        })
        .filter(|relative| is_picture(relative))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_picture() {
        assert!(is_picture("a.jpg"));
        assert!(is_picture("album/b.JPEG"));
        assert!(is_picture("album/été/c.JPG"));
        assert!(is_picture("d.jpeg"));

        assert!(!is_picture("e.Jpg"));
        assert!(!is_picture("f.png"));
        assert!(!is_picture("album.jpg/readme"));
        assert!(!is_picture(".jpg"));
        assert!(!is_picture("noext"));
    }

    #[test]
    fn test_sanitize_relative_path() {
        assert_eq!(sanitize_relative_path("a/b.jpg").unwrap(), "a/b.jpg");
        assert_eq!(sanitize_relative_path("été/Ω.jpg").unwrap(), "été/Ω.jpg");

        for bad in ["", "/etc/passwd", "../x.jpg", "a/../b.jpg", "a//b.jpg", "./a.jpg", "a/", "a\\b.jpg"] {
            assert!(
                matches!(sanitize_relative_path(bad), Err(CacheError::InvalidPath)),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_walk_pictures() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("2021/summer")).unwrap();
        std::fs::write(root.join("top.jpg"), b"x").unwrap();
        std::fs::write(root.join("2021/summer/beach.JPG"), b"x").unwrap();
        std::fs::write(root.join("2021/summer/notes.txt"), b"x").unwrap();
        std::fs::write(root.join("2021/cover.jpeg"), b"x").unwrap();

        let pictures = walk_pictures(root);
        assert_eq!(
            pictures,
            vec!["2021/cover.jpeg", "2021/summer/beach.JPG", "top.jpg"]
        );
    }
}
