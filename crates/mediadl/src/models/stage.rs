//! Stage identifiers shared by the status aggregate, events and the pipeline.

use serde::{Deserialize, Serialize};

/// A unit of work whose activity is reflected in the status aggregate.
///
/// The declaration order is the order stages appear in `active_processes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Downloading,
    Probing,
    Normalizing,
    Thumbnail,
    Resizing,
    FileDeleting,
    DirDeleting,
}

impl Stage {
    /// All stages in declaration order.
    pub const ALL: [Stage; 7] = [
        Stage::Downloading,
        Stage::Probing,
        Stage::Normalizing,
        Stage::Thumbnail,
        Stage::Resizing,
        Stage::FileDeleting,
        Stage::DirDeleting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Downloading => "downloading",
            Self::Probing => "probing",
            Self::Normalizing => "normalizing",
            Self::Thumbnail => "thumbnail",
            Self::Resizing => "resizing",
            Self::FileDeleting => "file_deleting",
            Self::DirDeleting => "dir_deleting",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|stage| stage.as_str() == s)
    }

    /// Whether this stage belongs to the download pipeline (as opposed to
    /// the standalone delete operations).
    pub fn is_pipeline_stage(&self) -> bool {
        !matches!(self, Self::FileDeleting | Self::DirDeleting)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
