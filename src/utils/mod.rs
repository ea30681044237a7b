use std::path::Path;

use rand::Rng;

// Lower-cased extension without the dot, empty if there is none.
pub fn get_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// Builds the on-disk name for an upload: `file-<millis>-<random><.ext>`.
///
/// The original extension is kept verbatim (including case) so that the
/// stored name still reflects what the client sent.
pub fn generate_stored_name(original_name: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    let ext = Path::new(original_name)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .map(|e| format!(".{}", e))
        .unwrap_or_default();
    format!("file-{}-{}{}", millis, suffix, ext)
}

/// Accepts only a bare file name, rejecting anything that could escape the
/// directory it is joined onto.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name)
}

pub fn format_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;

    if bytes as f64 >= MB {
        format!("{:.2}MiB", bytes as f64 / MB)
    } else if bytes as f64 >= KB {
        format!("{:.2}kb", bytes as f64 / KB)
    } else {
        format!("{}b", bytes)
    }
}
