// Photo import: per-file read + extract + preview, joined per batch.
use crate::exif_extract::{Extraction, TagReader, extract};
use crate::photo::{IdGenerator, Photo, file_extension, mime_for_extension};
use crate::preview::PreviewRegistry;
use chrono::{DateTime, Local, NaiveDateTime};
use futures_util::future::join_all;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub enum FileSource {
    Memory(Vec<u8>),
    Path(PathBuf),
}

/// One file handed over by the UI layer.
#[derive(Debug, Clone)]
pub struct RawFile {
    pub name: String,
    pub source: FileSource,
    /// Last-modified time, the capture time fallback
    pub modified: Option<NaiveDateTime>,
}

impl RawFile {
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>, modified: Option<NaiveDateTime>) -> Self {
        Self { name: name.into(), source: FileSource::Memory(bytes), modified }
    }

    /// Path-backed file; bytes are read when the batch runs.
    pub async fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let modified = match tokio::fs::metadata(path).await.and_then(|m| m.modified()) {
            Ok(t) => Some(DateTime::<Local>::from(t).naive_local()),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no modification time");
                None
            }
        };
        Self { name, source: FileSource::Path(path.to_path_buf()), modified }
    }
}

/// Whether `name` has one of the accepted extensions (case-insensitive).
pub fn is_accepted(name: &str, extensions: &[String]) -> bool {
    let ext = file_extension(name);
    !ext.is_empty() && extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext))
}

/// Import a batch. All files are processed together and the result is only
/// returned once every file has settled. A file that cannot be read or
/// decoded is still part of the batch, without a location.
pub async fn import_batch<R: TagReader + ?Sized>(
    reader: &R,
    previews: &PreviewRegistry,
    ids: &mut IdGenerator,
    files: Vec<RawFile>,
) -> Vec<Photo> {
    let tasks: Vec<_> = files
        .into_iter()
        .map(|file| {
            let (id, stamp) = ids.next_id(&file.name);
            import_one(reader, previews, file, id, stamp)
        })
        .collect();
    let photos = join_all(tasks).await;
    debug!(
        count = photos.len(),
        located = photos.iter().filter(|p| p.has_location()).count(),
        "import batch settled"
    );
    photos
}

async fn import_one<R: TagReader + ?Sized>(
    reader: &R,
    previews: &PreviewRegistry,
    file: RawFile,
    id: String,
    imported_at: i64,
) -> Photo {
    let file_extension = file_extension(&file.name);
    let mime = mime_for_extension(&file_extension);

    let bytes = match read_source(file.source).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(name = %file.name, error = %e, "failed to read file");
            Vec::new()
        }
    };

    let extraction = if bytes.is_empty() {
        Extraction::fallback(file.modified)
    } else {
        extract(reader, &bytes, file.modified)
    };

    Photo {
        id,
        name: file.name,
        preview: previews.create(mime, bytes),
        location: extraction.location,
        captured_at: extraction.captured_at,
        formatted_date: extraction.formatted_date,
        file_extension,
        mime: mime.to_string(),
        imported_at,
    }
}

async fn read_source(source: FileSource) -> std::io::Result<Vec<u8>> {
    match source {
        FileSource::Memory(bytes) => Ok(bytes),
        FileSource::Path(path) => tokio::fs::read(&path).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractError;
    use crate::exif_types::{ExifValue, TAG_GPS_LATITUDE, TAG_GPS_LONGITUDE, TagTable};

    struct GpsReader;

    impl TagReader for GpsReader {
        fn read_tags(&self, bytes: &[u8]) -> Result<TagTable, ExtractError> {
            if bytes != b"gps" {
                return Err(ExtractError::Decode(exif::Error::NotFound("test")));
            }
            let mut tags = TagTable::new();
            tags.insert(TAG_GPS_LATITUDE, ExifValue::Floats(vec![10.0, 30.0, 0.0]));
            tags.insert(TAG_GPS_LONGITUDE, ExifValue::Floats(vec![20.0, 0.0, 0.0]));
            Ok(tags)
        }
    }

    #[tokio::test]
    async fn test_batch_keeps_failed_files() {
        let previews = PreviewRegistry::new();
        let mut ids = IdGenerator::new();
        let dir = tempfile::tempdir().unwrap();
        let on_disk = dir.path().join("disk.png");
        tokio::fs::write(&on_disk, b"gps").await.unwrap();

        let files = vec![
            RawFile::from_bytes("a.jpg", b"gps".to_vec(), None),
            RawFile::from_bytes("b.jpg", b"nothing".to_vec(), None),
            RawFile::from_path(&dir.path().join("missing.jpg")).await,
            RawFile::from_path(&on_disk).await,
        ];
        let photos = import_batch(&GpsReader, &previews, &mut ids, files).await;

        assert_eq!(photos.len(), 4);
        assert_eq!(photos.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(), ["a.jpg", "b.jpg", "missing.jpg", "disk.png"]);
        let located: Vec<bool> = photos.iter().map(|p| p.has_location()).collect();
        assert_eq!(located, [true, false, false, true]);
        assert_eq!(photos[0].location.unwrap().latitude, 10.5);
        assert!(photos[2].preview.bytes().is_empty());
        assert_eq!(photos[3].mime, "image/png");
        // Path-backed files fall back to the filesystem timestamp
        assert!(photos[3].captured_at.is_some());
        assert_eq!(previews.live(), 4);
    }

    #[tokio::test]
    async fn test_ids_follow_batch_order() {
        let previews = PreviewRegistry::new();
        let mut ids = IdGenerator::new();
        let files = vec![
            RawFile::from_bytes("same.jpg", vec![], None),
            RawFile::from_bytes("same.jpg", vec![], None),
        ];
        let photos = import_batch(&GpsReader, &previews, &mut ids, files).await;
        assert_ne!(photos[0].id, photos[1].id);
        assert!(photos[0].imported_at < photos[1].imported_at);
    }

    #[test]
    fn test_is_accepted() {
        let exts: Vec<String> = ["jpg", "jpeg", "png", "heic"].iter().map(|s| s.to_string()).collect();
        assert!(is_accepted("IMG_1.HEIC", &exts));
        assert!(is_accepted("a.jpeg", &exts));
        assert!(!is_accepted("notes.txt", &exts));
        assert!(!is_accepted("jpg", &exts));
    }
}
