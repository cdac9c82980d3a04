// Project format migration system
// Handles version upgrades and backward compatibility

use crate::project::types::{AllocatorState, ProjectDocument, ProjectVersion};
use crate::project::ProjectError;
use std::path::{Path, PathBuf};

/// Migration result
#[derive(Debug, Clone)]
pub struct MigrationResult {
    /// Migrated document
    pub document: ProjectDocument,
    /// Whether migration was performed
    pub migrated: bool,
    /// Migration messages/warnings
    pub messages: Vec<String>,
}

/// Compatibility information for project versions
#[derive(Debug, Clone)]
pub struct CompatibilityInfo {
    /// Whether the project can be loaded
    pub can_load: bool,
    /// Whether migration is needed
    pub needs_migration: bool,
    /// Optional warning message
    pub warning: Option<String>,
}

/// Project format migrator
pub struct ProjectMigrator;

impl ProjectMigrator {
    /// Migrate a document to the current version
    pub fn migrate_to_current(mut document: ProjectDocument) -> Result<MigrationResult, ProjectError> {
        let mut messages = Vec::new();
        let mut migrated = false;

        let current_version = ProjectVersion::current();
        let project_version = document.metadata.version.clone();

        if project_version == current_version {
            return Ok(MigrationResult {
                document,
                migrated: false,
                messages: vec!["Project is already at current version".to_string()],
            });
        }

        if project_version.major < 1 {
            return Err(ProjectError::InvalidVersion);
        }

        if project_version.major == 1 && project_version.minor < 1 {
            messages.push("Migrating from v1.0 to v1.1...".to_string());
            document = Self::migrate_1_0_to_1_1(document)?;
            migrated = true;
        }

        document.metadata.version = current_version.clone();

        if migrated {
            messages.push(format!("Successfully migrated to v{}", current_version));
        }

        Ok(MigrationResult {
            document,
            migrated,
            messages,
        })
    }

    /// Check if a project can be loaded
    pub fn check_compatibility(version: &ProjectVersion) -> CompatibilityInfo {
        let current = ProjectVersion::current();

        // Major version too new - cannot load
        if version.major > current.major {
            return CompatibilityInfo {
                can_load: false,
                needs_migration: false,
                warning: Some(format!(
                    "Project version v{} is newer than current v{}",
                    version, current
                )),
            };
        }

        if *version == current {
            return CompatibilityInfo {
                can_load: true,
                needs_migration: false,
                warning: None,
            };
        }

        // Older version - can load with migration
        CompatibilityInfo {
            can_load: true,
            needs_migration: true,
            warning: Some(format!(
                "Project version v{} will be migrated to v{}",
                version, current
            )),
        }
    }

    /// v1.0 did not store allocator positions: derive them from the log
    fn migrate_1_0_to_1_1(mut document: ProjectDocument) -> Result<ProjectDocument, ProjectError> {
        let history = &mut document.history;
        if history.allocators.is_none() {
            let next_record = history.records.iter().map(|r| r.id.0).max().map_or(1, |id| id + 1);
            let next_order = history
                .records
                .iter()
                .map(|r| r.created_order)
                .max()
                .map_or(1, |order| order + 1);
            let next_clip = history.max_clip_id().map_or(1, |id| id + 1);
            history.allocators = Some(AllocatorState {
                next_clip,
                next_record,
                next_order,
            });
        }
        Ok(document)
    }

    /// Copy the project file next to itself before migrating
    pub fn create_backup(path: &Path) -> Result<PathBuf, ProjectError> {
        let backup_path = path.with_extension("glitch.backup");

        std::fs::copy(path, &backup_path).map_err(|e| {
            ProjectError::FileSystemError(format!("Failed to create backup: {}", e))
        })?;

        Ok(backup_path)
    }
}
