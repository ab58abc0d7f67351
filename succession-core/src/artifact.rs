//! Atomic artifact writes
//!
//! Every output artifact is written to a temporary file in its destination
//! directory and renamed into place, so an interrupted analysis never leaves a
//! truncated image or manifest behind.

use crate::{Error, Result};
use image::{ImageFormat, RgbImage};
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Writes `bytes` to `path` via write-then-rename
pub fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = temp_file_beside(path)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

/// Encodes `image` as PNG and writes it to `path` via write-then-rename
pub fn write_png_atomic(path: &Path, image: &RgbImage) -> Result<()> {
    let file = temp_file_beside(path)?;
    {
        let mut writer = BufWriter::new(file.as_file());
        image.write_to(&mut writer, ImageFormat::Png)?;
        writer.flush()?;
    }
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

fn temp_file_beside(path: &Path) -> Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Ok(NamedTempFile::new_in(dir)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use tempfile::tempdir;

    #[test]
    fn test_write_bytes_replaces_existing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "old").unwrap();

        write_bytes_atomic(&path, b"new").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_png_is_decodable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let img = RgbImage::from_pixel(4, 3, Rgb([10, 20, 30]));

        write_png_atomic(&path, &img).unwrap();

        let decoded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (4, 3));
        assert_eq!(decoded.get_pixel(2, 1), &Rgb([10, 20, 30]));
    }
}
