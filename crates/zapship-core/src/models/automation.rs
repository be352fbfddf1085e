use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

/// Media kind of an automation step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "step_kind", rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Text,
    Image,
    Audio,
    Video,
    File,
}

impl Display for StepKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StepKind::Text => write!(f, "text"),
            StepKind::Image => write!(f, "image"),
            StepKind::Audio => write!(f, "audio"),
            StepKind::Video => write!(f, "video"),
            StepKind::File => write!(f, "file"),
        }
    }
}

impl FromStr for StepKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(StepKind::Text),
            "image" => Ok(StepKind::Image),
            "audio" => Ok(StepKind::Audio),
            "video" => Ok(StepKind::Video),
            "file" => Ok(StepKind::File),
            _ => Err(anyhow::anyhow!("Invalid step kind: {}", s)),
        }
    }
}

/// Tenant-authored automation row for one trigger key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AutomationConfig {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Trigger key (`boas_vindas`, `envio_rastreio`, or a normalized status).
    pub trigger: String,
    pub active: bool,
    /// Single fallback message, used when no steps are configured.
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Ordered step of an automation. Steps are executed sequentially by
/// ascending `position`, each through the gateway method matching its kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AutomationStep {
    pub id: Uuid,
    pub config_id: Uuid,
    pub position: i32,
    pub kind: StepKind,
    /// Text body or media caption, rendered through the template renderer.
    pub content: Option<String>,
    pub media_url: Option<String>,
}

/// Effective automation settings for one trigger key after merging
/// tenant rows over the compiled-in defaults.
#[derive(Debug, Clone)]
pub struct AutomationSettings {
    pub active: bool,
    pub message: Option<String>,
    pub steps: Vec<AutomationStep>,
}

impl AutomationSettings {
    /// Default settings for a known trigger with no tenant row.
    pub fn with_default_message(message: &str) -> Self {
        Self {
            active: true,
            message: Some(message.to_string()),
            steps: Vec::new(),
        }
    }
}
