use std::path::PathBuf;

/// A file accepted by the upload endpoint and sitting in the upload
/// directory until its pipeline finishes.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub original_name: String,
    pub size: u64,
    pub path: PathBuf,
}
