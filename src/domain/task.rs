use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::SessionId;

/// One recorded dispatch of a prompt into a session's input stream.
///
/// Tasks are immutable once created and are never removed from history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchTask {
    pub id: Uuid,
    pub target_session_id: SessionId,
    pub prompt: String,
    pub created_at: DateTime<Utc>,
}

impl DispatchTask {
    pub fn new(target_session_id: SessionId, prompt: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            target_session_id,
            prompt: prompt.into(),
            created_at: Utc::now(),
        }
    }
}
