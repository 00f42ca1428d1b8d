//! Job pipeline states and allowed transitions.

use std::fmt;

use crate::models::{JobOutcome, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Queued,
    Downloading,
    Probing,
    Normalizing,
    EmbeddingThumbnail,
    Resizing,
    Completed,
    Failed,
    Interrupted,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Probing => "probing",
            Self::Normalizing => "normalizing",
            Self::EmbeddingThumbnail => "embedding_thumbnail",
            Self::Resizing => "resizing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Interrupted => "interrupted",
        }
    }

    /// State that runs `stage`, if it is a pipeline stage.
    pub fn for_stage(stage: Stage) -> Option<Self> {
        match stage {
            Stage::Downloading => Some(Self::Downloading),
            Stage::Probing => Some(Self::Probing),
            Stage::Normalizing => Some(Self::Normalizing),
            Stage::Thumbnail => Some(Self::EmbeddingThumbnail),
            Stage::Resizing => Some(Self::Resizing),
            Stage::FileDeleting | Stage::DirDeleting => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Interrupted)
    }

    pub fn outcome(&self) -> JobOutcome {
        match self {
            Self::Completed => JobOutcome::Completed,
            Self::Failed => JobOutcome::Failed,
            Self::Interrupted => JobOutcome::Interrupted,
            _ => JobOutcome::Pending,
        }
    }

    /// Whether the pipeline may move from `self` to `next`.
    ///
    /// Any running state may fail or be interrupted. Non-video downloads go
    /// straight to `Completed`, and resizing is optional after the thumbnail.
    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;

        if self.is_terminal() {
            return false;
        }
        if matches!(next, Failed | Interrupted) {
            return true;
        }
        matches!(
            (self, next),
            (Queued, Downloading)
                | (Downloading, Probing)
                | (Downloading, Completed)
                | (Probing, Normalizing)
                | (Normalizing, EmbeddingThumbnail)
                | (EmbeddingThumbnail, Resizing)
                | (EmbeddingThumbnail, Completed)
                | (Resizing, Completed)
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            PipelineState::Queued,
            PipelineState::Downloading,
            PipelineState::Probing,
            PipelineState::Normalizing,
            PipelineState::EmbeddingThumbnail,
            PipelineState::Resizing,
            PipelineState::Completed,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_skips_and_illegal_moves() {
        assert!(PipelineState::Downloading.can_transition_to(PipelineState::Completed));
        assert!(PipelineState::EmbeddingThumbnail.can_transition_to(PipelineState::Completed));
        assert!(!PipelineState::Downloading.can_transition_to(PipelineState::Normalizing));
        assert!(!PipelineState::Probing.can_transition_to(PipelineState::Completed));
        assert!(!PipelineState::Queued.can_transition_to(PipelineState::Probing));
    }

    #[test]
    fn test_terminal_states_are_final() {
        for terminal in [
            PipelineState::Completed,
            PipelineState::Failed,
            PipelineState::Interrupted,
        ] {
            assert!(terminal.is_terminal());
            assert!(terminal.outcome().is_terminal());
            assert!(!terminal.can_transition_to(PipelineState::Failed));
            assert!(!terminal.can_transition_to(PipelineState::Interrupted));
        }
    }

    #[test]
    fn test_any_running_state_can_fail() {
        for state in [
            PipelineState::Queued,
            PipelineState::Downloading,
            PipelineState::Resizing,
        ] {
            assert!(state.can_transition_to(PipelineState::Failed));
            assert!(state.can_transition_to(PipelineState::Interrupted));
        }
    }

    #[test]
    fn test_for_stage() {
        assert_eq!(
            PipelineState::for_stage(Stage::Thumbnail),
            Some(PipelineState::EmbeddingThumbnail)
        );
        assert_eq!(PipelineState::for_stage(Stage::DirDeleting), None);
    }
}
