use crate::errors::{AppError, AppResult};
use crate::models::UserId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// In-memory login sessions keyed by opaque token.
#[derive(Clone, Default)]
pub struct SessionManager {
    sessions: Arc<Mutex<HashMap<String, UserId>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn open_session(&self, user_id: UserId) -> String {
        let token = Uuid::new_v4().to_string();
        let mut sessions = self.sessions.lock().await;
        sessions.insert(token.clone(), user_id);
        token
    }

    pub async fn user_id(&self, token: &str) -> AppResult<UserId> {
        let sessions = self.sessions.lock().await;
        sessions
            .get(token)
            .copied()
            .ok_or_else(|| AppError::Unauthorized("Login required".to_string()))
    }

    pub async fn close_session(&self, token: &str) -> bool {
        let mut sessions = self.sessions.lock().await;
        sessions.remove(token).is_some()
    }
}
