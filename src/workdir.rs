use std::path::Path;

use tempfile::TempDir;

use crate::error::PipelineError;

/// File name used for the image of the row at `index`.
///
/// The fetcher writes `img_<index>.part` first and renames it once complete.
pub fn image_file_name(index: usize, extension: &str) -> String {
    format!("img_{}.{}", index, extension)
}

/// Scoped temporary storage for one generation run.
///
/// The directory and everything in it is removed when this value is dropped,
/// whether the run succeeded or not.
#[derive(Debug)]
pub struct WorkingDir {
    dir: TempDir,
}

impl WorkingDir {
    /// Create a fresh working directory under the system temp location
    pub fn create() -> Result<Self, PipelineError> {
        Self::create_in(std::env::temp_dir())
    }

    /// Create a fresh working directory under `parent`
    pub fn create_in(parent: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let parent = parent.as_ref();
        let dir = tempfile::Builder::new()
            .prefix("photo-report-")
            .tempdir_in(parent)
            .map_err(|source| PipelineError::WorkingDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        log::debug!("Created working directory {:?}", dir.path());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory now and report any failure
    pub fn close(self) -> std::io::Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        log::debug!("Removed working directory {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_removed_on_drop() {
        let parent = tempfile::tempdir().unwrap();
        let path = {
            let work = WorkingDir::create_in(parent.path()).unwrap();
            std::fs::write(work.path().join(image_file_name(0, "png")), b"x").unwrap();
            work.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_close_removes_contents() {
        let work = WorkingDir::create().unwrap();
        let file = work.path().join(image_file_name(7, "jpg"));
        std::fs::write(&file, b"data").unwrap();
        assert!(file.ends_with("img_7.jpg"));
        let path = work.path().to_path_buf();
        work.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_image_file_name() {
        assert_eq!(image_file_name(0, "png"), "img_0.png");
        assert_eq!(image_file_name(41, "part"), "img_41.part");
    }

    #[test]
    fn test_unusable_parent_is_fatal() {
        let parent = tempfile::tempdir().unwrap();
        let not_a_dir = parent.path().join("file");
        std::fs::write(&not_a_dir, b"x").unwrap();
        assert!(matches!(
            WorkingDir::create_in(&not_a_dir),
            Err(PipelineError::WorkingDirectory { .. })
        ));
    }
}
