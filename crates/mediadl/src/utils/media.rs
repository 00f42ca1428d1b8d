//! Media type detection for downloaded artifacts.
//!
//! An artifact counts as video only when it is in a container the
//! post-processing plans can write back: H.264 video with an attached cover
//! picture. Other video formats (WebM, AVI, ...) are treated as plain files.

use std::path::Path;

use tracing::debug;

/// Container of a video artifact, chosen by extension or sniffed content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Mp4,
    QuickTime,
    Matroska,
}

impl Container {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "mp4" | "m4v" => Some(Self::Mp4),
            "mov" => Some(Self::QuickTime),
            "mkv" => Some(Self::Matroska),
            _ => None,
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "video/mp4" | "video/x-m4v" => Some(Self::Mp4),
            "video/quicktime" => Some(Self::QuickTime),
            "video/x-matroska" => Some(Self::Matroska),
            _ => None,
        }
    }

    /// ffmpeg muxer name, passed with `-f` so output names need no extension.
    pub fn muxer(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::QuickTime => "mov",
            Self::Matroska => "matroska",
        }
    }

    /// Extension first, then content.
    pub fn detect(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
            .or_else(|| sniff_mime(path).and_then(Self::from_mime))
    }
}

/// Sniff the file header for a MIME type.
pub fn sniff_mime(path: &Path) -> Option<&'static str> {
    match infer::get_from_path(path) {
        Ok(kind) => kind.map(|k| k.mime_type()),
        Err(e) => {
            debug!("Could not inspect {}: {}", path.display(), e);
            None
        }
    }
}

/// Whether the artifact at `path` is a video the pipeline can post-process.
pub fn is_video(path: &Path) -> bool {
    Container::detect(path).is_some()
}
