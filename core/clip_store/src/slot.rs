use crate::{clip::Clip, error::LoadError};

/// One configured soundboard item, before normalization.
///
/// A slot keeps its position even when decoding failed, so button indices and
/// clip indices stay aligned.
#[derive(Debug, Clone, PartialEq)]
pub enum ClipSlot {
    Present { label: String, clip: Clip },
    Absent { label: String },
}

impl ClipSlot {
    pub fn present(label: impl Into<String>, clip: Clip) -> Self {
        Self::Present {
            label: label.into(),
            clip,
        }
    }

    pub fn absent(label: impl Into<String>) -> Self {
        Self::Absent {
            label: label.into(),
        }
    }

    /// Turns a loader result into a slot. Failures are logged and become `Absent`.
    pub fn from_load(label: impl Into<String>, result: Result<Clip, LoadError>) -> Self {
        let label = label.into();
        match result {
            Ok(clip) => Self::Present { label, clip },
            Err(e) => {
                log::warn!("Failed to load clip '{label}': {e}");
                Self::Absent { label }
            }
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Present { label, .. } | Self::Absent { label } => label,
        }
    }

    pub fn clip(&self) -> Option<&Clip> {
        match self {
            Self::Present { clip, .. } => Some(clip),
            Self::Absent { .. } => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present { .. })
    }
}
