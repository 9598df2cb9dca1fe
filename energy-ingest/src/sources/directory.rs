use std::path::{Path, PathBuf};

use super::{FileSource, SourceError, SourceFile};

/// Loads every `*.xml` file of a directory, or a single file.
///
/// Files are returned sorted by name so that the ESL union (last file wins)
/// is reproducible between runs.
pub struct DirectorySource {
    path: PathBuf,
}

impl DirectorySource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

fn io_error(path: &Path, source: std::io::Error) -> SourceError {
    SourceError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn is_xml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
}

async fn read_file(path: &Path) -> Result<SourceFile, SourceError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| io_error(path, e))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(SourceFile::new(filename, bytes))
}

#[async_trait::async_trait]
impl FileSource for DirectorySource {
    async fn load(&self) -> Result<Vec<SourceFile>, SourceError> {
        let meta = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| io_error(&self.path, e))?;
        if meta.is_file() {
            return Ok(vec![read_file(&self.path).await?]);
        }

        let mut paths = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.path)
            .await
            .map_err(|e| io_error(&self.path, e))?;
        while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(&self.path, e))? {
            let path = entry.path();
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if is_file && is_xml(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut files = Vec::with_capacity(paths.len());
        for path in &paths {
            files.push(read_file(path).await?);
        }
        tracing::debug!(dir = %self.path.display(), files = files.len(), "xml files loaded");
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn scratch_dir(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let dir = std::env::temp_dir().join(format!("energy-ingest-{tag}-{}-{nanos}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("create scratch dir");
        dir
    }

    #[tokio::test]
    async fn loads_xml_files_sorted_by_name() {
        let dir = scratch_dir("sorted");
        std::fs::write(dir.join("b.xml"), b"<b/>").expect("write");
        std::fs::write(dir.join("a.XML"), b"<a/>").expect("write");
        std::fs::write(dir.join("notes.txt"), b"ignored").expect("write");
        std::fs::create_dir_all(dir.join("nested.xml")).expect("mkdir");

        let files = DirectorySource::new(&dir).load().await.expect("load");
        let names: Vec<_> = files.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, vec!["a.XML", "b.xml"]);
        assert_eq!(files[0].bytes, b"<a/>");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn single_file_path_is_loaded_directly() {
        let dir = scratch_dir("single");
        let path = dir.join("only.xml");
        std::fs::write(&path, b"<only/>").expect("write");

        let files = DirectorySource::new(&path).load().await.expect("load");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename, "only.xml");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn missing_path_is_an_error() {
        let err = DirectorySource::new("/definitely/not/here").load().await.unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
    }
}
