use std::fs;
use std::io;
use std::path::Path;

/// Renames `from` to `to`, copying across filesystems (tmpfs staging to disk).
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) if from.is_file() => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
        Err(e) => Err(e),
    }
}

/// Removes a file, treating "already gone" as success.
pub fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"))
        .unwrap_or(false)
}

/// Image files directly inside `dir`, sorted by file name.
pub fn list_images(dir: &Path) -> io::Result<Vec<std::path::PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut images = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_image_extension(&path) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_creates_target_dir() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("a.jpg");
        let to = dir.path().join("out/thumb/b.jpg");
        fs::write(&from, b"jpeg").unwrap();

        move_file(&from, &to).unwrap();
        assert!(!from.exists());
        assert_eq!(fs::read(&to).unwrap(), b"jpeg");
    }

    #[test]
    fn test_remove_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        remove_if_exists(&dir.path().join("missing.wav")).unwrap();
    }

    #[test]
    fn test_list_images_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["spread_IR.jpg", "spread_221.JPG", "notes.txt", "a.png"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let names: Vec<String> = list_images(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.png", "spread_221.JPG", "spread_IR.jpg"]);
    }
}
