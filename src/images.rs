use crate::error::Result;
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use tracing::{debug, warn};
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

/// Fixed placeholder image served in the downloadable template archive.
pub const DEFAULT_IMAGE: &[u8] = include_bytes!("../assets/default_image.png");

/// Extracts an uploaded zip archive into per-item folders under the upload
/// root. Returns the number of files written.
///
/// Entries whose resolved path would escape the upload root are skipped
/// without being reported; the upload is best-effort, the guard is not.
pub fn extract_archive(upload_root: &Path, bytes: &[u8]) -> Result<usize> {
    fs::create_dir_all(upload_root)?;

    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut written = 0;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        // enclosed_name rejects absolute paths and any `..` traversal
        let relative = match entry.enclosed_name() {
            Some(path) => path.to_path_buf(),
            None => {
                warn!(entry = %entry.name(), "Skipping zip entry that escapes the upload root");
                continue;
            }
        };

        let destination = upload_root.join(relative);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut output = fs::File::create(&destination)?;
        std::io::copy(&mut entry, &mut output)?;
        written += 1;
        debug!(path = %destination.display(), "Extracted image");
    }
    Ok(written)
}

/// Builds the downloadable image-template archive: one `<id>/default.jpg`
/// entry per staged menu item, each holding the placeholder image.
pub fn template_archive(menu_item_ids: &[String]) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Stored);

    for id in menu_item_ids {
        writer.start_file(format!("{id}/default.jpg"), options)?;
        writer.write_all(DEFAULT_IMAGE)?;
    }

    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}

/// First image file in a menu item's upload folder, by name, or None when
/// the folder is missing or empty.
pub fn first_image(item_dir: &Path) -> Result<Option<String>> {
    if !item_dir.is_dir() {
        return Ok(None);
    }

    let mut names: Vec<String> = fs::read_dir(item_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();
    Ok(names.into_iter().next())
}

/// Web-style path for a committed image, relative to the served upload root.
pub fn web_path(item_id: &str, file_name: &str) -> String {
    format!("/uploads/{item_id}/{file_name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn archive_with(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, bytes) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn extracts_entries_into_item_folders() {
        let root = tempdir().unwrap();
        let bytes = archive_with(&[("item-1/photo.jpg", b"jpg"), ("item-2/shot.png", b"png")]);

        let written = extract_archive(root.path(), &bytes).unwrap();

        assert_eq!(written, 2);
        assert_eq!(fs::read(root.path().join("item-1/photo.jpg")).unwrap(), b"jpg");
        assert_eq!(fs::read(root.path().join("item-2/shot.png")).unwrap(), b"png");
    }

    #[test]
    fn traversal_entries_are_skipped() {
        let root = tempdir().unwrap();
        let bytes = archive_with(&[("../../etc/passwd", b"oops"), ("safe/ok.jpg", b"ok")]);

        let written = extract_archive(root.path(), &bytes).unwrap();

        assert_eq!(written, 1);
        assert!(root.path().join("safe/ok.jpg").exists());
        assert!(!root.path().parent().unwrap().join("etc/passwd").exists());
    }

    #[test]
    fn template_contains_one_entry_per_item() {
        let ids = vec!["m1".to_string(), "m2".to_string()];
        let bytes = template_archive(&ids).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert!(names.contains(&"m1/default.jpg".to_string()));
        assert!(names.contains(&"m2/default.jpg".to_string()));
    }

    #[test]
    fn first_image_picks_lexicographically_first_file() {
        let root = tempdir().unwrap();
        let dir = root.path().join("item");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("b.jpg"), b"b").unwrap();
        fs::write(dir.join("a.jpg"), b"a").unwrap();

        assert_eq!(first_image(&dir).unwrap().as_deref(), Some("a.jpg"));
        assert_eq!(first_image(&root.path().join("missing")).unwrap(), None);
    }
}
