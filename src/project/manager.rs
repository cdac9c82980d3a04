// Project manager for loading and saving projects
//
// Archive layout:
//   manifest.json   project metadata
//   history.ron     base timeline, operation log, allocators
//   media/NNNN.wav  32-bit float audio referenced by history.ron

use crate::audio::buffer::SampleBuffer;
use crate::audio::export::{ExportSettings, WavError, decode_wav, encode_wav, export_wav};
use crate::command::HistoryState;
use crate::config::EngineConfig;
use crate::history::record::RecordId;
use crate::history::{HistoryController, HistoryError};
use crate::project::migration::{MigrationResult, ProjectMigrator};
use crate::project::serialization::*;
use crate::project::types::*;
use crate::render::engine::RenderEngine;
use crate::timeline::{ClipIdAllocator, TimelineState};
use chrono::Utc;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;
use std::sync::Arc;
use zip::{ZipArchive, ZipWriter};

const MANIFEST_FILE: &str = "manifest.json";
const HISTORY_FILE: &str = "history.ron";

/// Project error types
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("File system error: {0}")]
    FileSystemError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid project structure: {0}")]
    InvalidStructure(String),

    #[error("Invalid project format version")]
    InvalidVersion,

    #[error("Missing file in project: {0}")]
    MissingFile(String),

    #[error("Project validation failed: {0}")]
    ValidationFailed(String),

    #[error("{} record(s) target clips that no longer exist", .0.len())]
    OrphanedRecords(Vec<RecordId>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RON error: {0}")]
    Ron(#[from] ron::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] WavError),

    #[error("History error: {0}")]
    History(HistoryError),

    #[error("Migration error: {0}")]
    MigrationError(String),
}

impl From<HistoryError> for ProjectError {
    fn from(err: HistoryError) -> Self {
        match err {
            HistoryError::OrphanedRecords(ids) => ProjectError::OrphanedRecords(ids),
            other => ProjectError::History(other),
        }
    }
}

pub type ProjectResult<T> = Result<T, ProjectError>;

/// Options for loading a project
#[derive(Debug, Clone)]
pub struct ProjectLoadOptions {
    /// Whether to validate the project structure
    pub validate: bool,
    /// Render once after loading (warms the cache, reports orphans)
    pub verify_render: bool,
}

impl Default for ProjectLoadOptions {
    fn default() -> Self {
        Self {
            validate: true,
            verify_render: false,
        }
    }
}

/// Project manager - handles saving/loading projects
pub struct ProjectManager {
    config: EngineConfig,
    engine: Arc<RenderEngine>,
}

impl ProjectManager {
    /// Create a new project manager; every project it opens shares one engine
    pub fn new(config: EngineConfig) -> Self {
        let engine = Arc::new(RenderEngine::new(
            Arc::new(config.registry()),
            config.render_settings(),
        ));
        Self { config, engine }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<RenderEngine> {
        &self.engine
    }

    /// Create a new project over `base`
    ///
    /// An empty base starts with an empty timeline waiting for a ClipAdd.
    pub fn create_new_project(&self, name: impl Into<String>, base: SampleBuffer) -> Project {
        let metadata = ProjectMetadata {
            name: name.into(),
            sample_rate: base.sample_rate(),
            channels: base.channel_count().min(u16::MAX as usize) as u16,
            ..ProjectMetadata::default()
        };

        let mut ids = ClipIdAllocator::default();
        let base = Arc::new(TimelineState::from_base(base, &mut ids));
        let state = HistoryState::new(base, ids, Arc::clone(&self.engine));

        Project {
            metadata,
            history: HistoryController::from_state(state, self.config.undo_capacity),
        }
    }

    /// Save project to a ZIP file
    ///
    /// The archive is written next to the target and renamed over it once
    /// complete.
    pub fn save_project<P: AsRef<Path>>(&self, project: &mut Project, project_path: P) -> ProjectResult<()> {
        let project_path = project_path.as_ref();
        crate::project::validate_project_structure(project)?;

        if let Some(parent) = project_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                ProjectError::FileSystemError(format!("Failed to create project directory: {}", e))
            })?;
        }

        project.metadata.modified = Utc::now();

        let mut media = MediaStore::new();
        let history = history_to_stored(project.history.state(), &mut media);
        let manifest_json = serialize_metadata_to_json(&project.metadata)?;
        let history_ron = serialize_history_to_ron(&history)?;

        let temp_path = project_path.with_extension("glitch.tmp");
        let zip_file = File::create(&temp_path).map_err(|e| {
            ProjectError::FileSystemError(format!("Failed to create ZIP file: {}", e))
        })?;
        let mut zip_writer = ZipWriter::new(BufWriter::new(zip_file));

        write_entry(&mut zip_writer, MANIFEST_FILE, manifest_json.as_bytes())?;
        write_entry(&mut zip_writer, HISTORY_FILE, history_ron.as_bytes())?;
        for (name, buffer) in media.files() {
            write_entry(&mut zip_writer, name, &encode_wav(buffer)?)?;
        }

        let mut inner = zip_writer.finish()?;
        inner.flush()?;
        drop(inner);

        std::fs::rename(&temp_path, project_path).map_err(|e| {
            ProjectError::FileSystemError(format!("Failed to move project into place: {}", e))
        })?;

        log::info!(
            "Saved project '{}' to {:?} ({} records, {} media files)",
            project.metadata.name,
            project_path,
            history.records.len(),
            media.len()
        );
        Ok(())
    }

    /// Load project from a ZIP file
    pub fn load_project<P: AsRef<Path>>(
        &self,
        project_path: P,
        options: &ProjectLoadOptions,
    ) -> ProjectResult<Project> {
        let project_path = project_path.as_ref();

        let zip_file = File::open(project_path).map_err(|e| {
            ProjectError::FileSystemError(format!("Failed to open project file: {}", e))
        })?;
        let mut archive = ZipArchive::new(BufReader::new(zip_file))?;

        let metadata = deserialize_metadata_from_json(&read_text(&mut archive, MANIFEST_FILE)?)?;
        let history = deserialize_history_from_ron(&read_text(&mut archive, HISTORY_FILE)?)?;
        let document = ProjectDocument { metadata, history };

        // Check version compatibility and migrate if needed
        let compatibility = ProjectMigrator::check_compatibility(&document.metadata.version);
        if !compatibility.can_load {
            if let Some(warning) = &compatibility.warning {
                log::error!("{}", warning);
            }
            return Err(ProjectError::InvalidVersion);
        }

        let migration = if compatibility.needs_migration {
            let backup_path = ProjectMigrator::create_backup(project_path)?;
            log::info!("Created backup at {:?}", backup_path);
            ProjectMigrator::migrate_to_current(document)?
        } else {
            MigrationResult {
                document,
                migrated: false,
                messages: vec!["No migration needed".to_string()],
            }
        };
        if migration.migrated {
            for message in &migration.messages {
                log::info!("Migration: {}", message);
            }
        }
        let ProjectDocument { metadata, history } = migration.document;

        let mut media = HashMap::new();
        for name in history.media_refs() {
            if !media.contains_key(name) {
                let bytes = read_bytes(&mut archive, name)?;
                media.insert(name.clone(), decode_wav(&bytes)?);
            }
        }

        let (base, log, allocators) = history_from_stored(&history, &media)?;
        let clip_ids = clip_allocator(&history, &allocators);
        let state = HistoryState::from_parts(
            base,
            log,
            clip_ids,
            allocators.next_record,
            allocators.next_order,
            Arc::clone(&self.engine),
        );
        let project = Project {
            metadata,
            history: HistoryController::from_state(state, self.config.undo_capacity),
        };

        if options.validate {
            crate::project::validate_project_structure(&project)
                .map_err(|e| ProjectError::ValidationFailed(e.to_string()))?;
        }

        if options.verify_render {
            let output = project.history.render()?;
            if output.has_orphans() {
                log::warn!(
                    "Project '{}' has {} orphaned record(s)",
                    project.metadata.name,
                    output.orphaned.len()
                );
            }
        }

        log::info!(
            "Loaded project '{}' from {:?} ({} records)",
            project.metadata.name,
            project_path,
            project.history.log().len()
        );
        Ok(project)
    }

    /// Render the project and write it as WAV; refused while records are orphaned
    pub fn export_project_audio<P: AsRef<Path>>(
        &self,
        project: &Project,
        path: P,
        settings: &ExportSettings,
    ) -> ProjectResult<()> {
        let buffer = project.history.export_render()?;
        export_wav(&buffer, path, settings)?;
        Ok(())
    }
}

impl Default for ProjectManager {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

fn write_entry<W: Write + Seek>(
    zip_writer: &mut ZipWriter<W>,
    name: &str,
    bytes: &[u8],
) -> ProjectResult<()> {
    let options: zip::write::FileOptions<()> = zip::write::FileOptions::default();
    zip_writer.start_file(name, options)?;
    zip_writer.write_all(bytes)?;
    Ok(())
}

fn read_bytes<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> ProjectResult<Vec<u8>> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(ProjectError::MissingFile(name.to_string()));
        }
        Err(e) => return Err(e.into()),
    };
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn read_text<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> ProjectResult<String> {
    String::from_utf8(read_bytes(archive, name)?)
        .map_err(|e| ProjectError::SerializationError(format!("{} is not UTF-8: {}", name, e)))
}
