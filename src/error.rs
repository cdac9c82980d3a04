// Crate-level error aggregating the module errors

use crate::audio::export::WavError;
use crate::command::CommandError;
use crate::config::ConfigError;
use crate::history::HistoryError;
use crate::project::ProjectError;
use crate::render::RenderError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Project(#[from] ProjectError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Wav(#[from] WavError),

    #[error("{0}")]
    Usage(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_transparent() {
        let err = Error::from(HistoryError::LastClipDeletion);
        assert_eq!(err.to_string(), "Cannot delete the last clip");

        let err = Error::from(CommandError::UndoStackExhausted("redo"));
        assert_eq!(err.to_string(), "Nothing to redo");
    }
}
