// Notifications du worker de rendu vers les consommateurs (UI, CLI)

use chrono::{DateTime, Utc};

/// Niveau de sévérité d'une notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// Issue d'une requête de rendu en arrière-plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// Rendu terminé et publié
    Completed { samples: usize, orphaned: usize },
    /// Remplacé par une requête plus récente
    Superseded,
    Failed,
}

impl RenderStatus {
    /// Niveau affiché pour ce statut
    pub fn level(self) -> NotificationLevel {
        match self {
            RenderStatus::Completed { orphaned: 0, .. } | RenderStatus::Superseded => {
                NotificationLevel::Info
            }
            RenderStatus::Completed { .. } => NotificationLevel::Warning,
            RenderStatus::Failed => NotificationLevel::Error,
        }
    }
}

/// Fin d'une génération de rendu
#[derive(Debug, Clone)]
pub struct Notification {
    pub generation: u64,
    pub status: RenderStatus,
    pub level: NotificationLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn render(generation: u64, status: RenderStatus, message: String) -> Self {
        Self {
            generation,
            status,
            level: status.level(),
            message,
            timestamp: Utc::now(),
        }
    }

    /// Vérifie si la notification a moins de `max_age_ms` millisecondes
    pub fn is_recent(&self, max_age_ms: i64) -> bool {
        (Utc::now() - self.timestamp).num_milliseconds() < max_age_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_levels() {
        let ok = Notification::render(
            3,
            RenderStatus::Completed { samples: 10, orphaned: 0 },
            "done".to_string(),
        );
        let orphans = Notification::render(
            4,
            RenderStatus::Completed { samples: 10, orphaned: 2 },
            "done".to_string(),
        );
        let failed = Notification::render(5, RenderStatus::Failed, "boom".to_string());

        assert_eq!(ok.level, NotificationLevel::Info);
        assert_eq!(ok.generation, 3);
        assert_eq!(orphans.level, NotificationLevel::Warning);
        assert_eq!(failed.level, NotificationLevel::Error);
        assert_eq!(RenderStatus::Superseded.level(), NotificationLevel::Info);
    }

    #[test]
    fn test_is_recent() {
        let notif = Notification::render(1, RenderStatus::Superseded, String::new());
        assert!(notif.is_recent(10_000));
    }
}
