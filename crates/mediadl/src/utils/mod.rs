//! Shared helpers.

pub mod media;
pub mod paths;

pub use media::{is_video, Container};
pub use paths::{ensure_within_base, guess_filename_from_url, resolve_symlinks, sanitize_filename};
