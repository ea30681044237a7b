use crate::utils::get_extension;

/// How a stored file is routed through the pipeline, decided purely by its
/// extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
    Other,
}

impl MediaKind {
    pub fn from_filename(filename: &str) -> Self {
        match get_extension(filename).as_str() {
            "mp3" | "m4a" | "wav" => MediaKind::Audio,
            "mp4" | "mov" | "avi" => MediaKind::Video,
            _ => MediaKind::Other,
        }
    }
}
