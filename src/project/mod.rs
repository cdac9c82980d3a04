// Project persistence
// ZIP container: manifest.json + history.ron + WAV media

pub mod manager;
pub mod migration;
pub mod serialization;
pub mod types;

pub use manager::{ProjectError, ProjectLoadOptions, ProjectManager, ProjectResult};
pub use types::{Project, ProjectHistory, ProjectMetadata, ProjectVersion};

use crate::history::RecordBody;

/// Helper function to validate project structure
pub fn validate_project_structure(project: &Project) -> Result<(), ProjectError> {
    let metadata = &project.metadata;

    if metadata.name.trim().is_empty() {
        return Err(ProjectError::InvalidStructure(
            "Project name cannot be empty".to_string(),
        ));
    }

    if metadata.name.len() > 255 {
        return Err(ProjectError::InvalidStructure(
            "Project name cannot exceed 255 characters".to_string(),
        ));
    }

    if metadata.version.major < 1 {
        return Err(ProjectError::InvalidStructure(
            "Invalid project version".to_string(),
        ));
    }

    if !(8_000..=384_000).contains(&metadata.sample_rate) {
        return Err(ProjectError::InvalidStructure(
            "Sample rate must be between 8000 and 384000 Hz".to_string(),
        ));
    }

    if metadata.channels == 0 {
        return Err(ProjectError::InvalidStructure(
            "Project must have at least one channel".to_string(),
        ));
    }

    // Base timeline must match the declared format
    let base = project.history.base();
    if base.pool().sample_rate() != metadata.sample_rate {
        return Err(ProjectError::InvalidStructure(format!(
            "Base audio is {} Hz but the project declares {} Hz",
            base.pool().sample_rate(),
            metadata.sample_rate
        )));
    }
    base.graph()
        .validate(base.pool().len())
        .map_err(|e| ProjectError::InvalidStructure(format!("Base clip graph: {}", e)))?;

    // Every snapshot must be a well-formed, non-empty timeline
    for record in project.history.log().iter() {
        if let RecordBody::Structural { snapshot, .. } = &record.body {
            if snapshot.graph().is_empty() {
                return Err(ProjectError::InvalidStructure(format!(
                    "Record {} leaves the timeline without clips",
                    record.id
                )));
            }
            snapshot.graph().validate(snapshot.pool().len()).map_err(|e| {
                ProjectError::InvalidStructure(format!("Record {} snapshot: {}", record.id, e))
            })?;
        }
    }

    Ok(())
}
