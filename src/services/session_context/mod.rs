mod memory_store;
mod redis_store;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::config::{SessionBackendKind, Settings};
use crate::core::redis::RedisHandle;
use crate::core::security;
use crate::services::question_catalog::QuestionKey;

pub(crate) use memory_store::MemorySessionBackend;
pub(crate) use redis_store::RedisSessionBackend;

const EXAMINEE_FIELD: &str = "examinee_id";

#[derive(Debug, Error)]
pub(crate) enum SessionError {
    #[error("session backend failure: {0}")]
    Backend(#[from] redis::RedisError),
}

/// Key-value storage for per-session fields. Every write refreshes the TTL
/// of the whole session.
#[async_trait]
pub(crate) trait SessionBackend: Send + Sync {
    async fn write(
        &self,
        key: &str,
        fields: Vec<(String, String)>,
        ttl_seconds: u64,
    ) -> Result<(), SessionError>;

    /// One slot per requested field, `None` when absent or expired.
    async fn read(&self, key: &str, fields: &[String]) -> Result<Vec<Option<String>>, SessionError>;

    async fn remove(&self, key: &str) -> Result<(), SessionError>;
}

/// A resolved session: the storage key and the examinee it was opened for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExamineeSession {
    key: String,
    examinee_id: i64,
}

impl ExamineeSession {
    pub(crate) fn examinee_id(&self) -> i64 {
        self.examinee_id
    }

    /// Storage key; derived from the token hash, safe to persist.
    pub(crate) fn key(&self) -> &str {
        &self.key
    }
}

#[derive(Clone)]
pub(crate) struct SessionStore {
    backend: Arc<dyn SessionBackend>,
    secret_key: Arc<str>,
    ttl_seconds: u64,
}

impl SessionStore {
    pub(crate) fn new(
        backend: Arc<dyn SessionBackend>,
        secret_key: &str,
        ttl_seconds: u64,
    ) -> Self {
        Self { backend, secret_key: Arc::from(secret_key), ttl_seconds }
    }

    pub(crate) fn from_settings(settings: &Settings, redis: RedisHandle) -> Self {
        let backend: Arc<dyn SessionBackend> = match settings.session().backend {
            SessionBackendKind::Redis => Arc::new(RedisSessionBackend::new(redis)),
            SessionBackendKind::Memory => Arc::new(MemorySessionBackend::default()),
        };

        Self::new(backend, &settings.security().secret_key, settings.session().ttl_seconds())
    }

    fn storage_key(&self, token: &str) -> String {
        format!("session:{}", security::hash_session_token(&self.secret_key, token))
    }

    /// Starts a session for the examinee and returns the bearer token.
    pub(crate) async fn open(
        &self,
        examinee_id: i64,
    ) -> Result<(String, ExamineeSession), SessionError> {
        let token = security::generate_session_token();
        let key = self.storage_key(&token);

        let fields = vec![(EXAMINEE_FIELD.to_string(), examinee_id.to_string())];
        self.backend.write(&key, fields, self.ttl_seconds).await?;

        Ok((token, ExamineeSession { key, examinee_id }))
    }

    pub(crate) async fn resolve(&self, token: &str) -> Result<Option<ExamineeSession>, SessionError> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(None);
        }

        let key = self.storage_key(token);
        let values = self.backend.read(&key, &[EXAMINEE_FIELD.to_string()]).await?;
        let Some(raw) = values.into_iter().next().flatten() else {
            return Ok(None);
        };

        match raw.parse::<i64>() {
            Ok(examinee_id) => Ok(Some(ExamineeSession { key, examinee_id })),
            Err(_) => {
                tracing::warn!(value = %raw, "Session holds an unreadable examinee id");
                Ok(None)
            }
        }
    }

    pub(crate) async fn close(&self, session: &ExamineeSession) -> Result<(), SessionError> {
        self.backend.remove(&session.key).await
    }

    pub(crate) async fn remembered_attempt(
        &self,
        session: &ExamineeSession,
        exam_id: i64,
    ) -> Result<Option<i64>, SessionError> {
        let field = attempt_field(exam_id);
        let values = self.backend.read(&session.key, std::slice::from_ref(&field)).await?;

        Ok(values.into_iter().next().flatten().and_then(|raw| raw.parse::<i64>().ok()))
    }

    pub(crate) async fn remember_attempt(
        &self,
        session: &ExamineeSession,
        exam_id: i64,
        attempt_id: i64,
    ) -> Result<(), SessionError> {
        self.backend
            .write(
                &session.key,
                vec![(attempt_field(exam_id), attempt_id.to_string())],
                self.ttl_seconds,
            )
            .await
    }

    pub(crate) async fn cache_answers(
        &self,
        session: &ExamineeSession,
        answers: &[(QuestionKey, String)],
    ) -> Result<(), SessionError> {
        if answers.is_empty() {
            return Ok(());
        }

        let fields =
            answers.iter().map(|(key, value)| (answer_field(*key), value.clone())).collect();
        self.backend.write(&session.key, fields, self.ttl_seconds).await
    }

    pub(crate) async fn cached_answers(
        &self,
        session: &ExamineeSession,
        keys: &[QuestionKey],
    ) -> Result<HashMap<QuestionKey, String>, SessionError> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let fields: Vec<String> = keys.iter().map(|key| answer_field(*key)).collect();
        let values = self.backend.read(&session.key, &fields).await?;

        Ok(keys
            .iter()
            .zip(values)
            .filter_map(|(key, value)| value.map(|value| (*key, value)))
            .collect())
    }
}

fn attempt_field(exam_id: i64) -> String {
    format!("attempt_exam_{exam_id}")
}

fn answer_field(key: QuestionKey) -> String {
    format!("answer_{}_{}", key.variant.as_str(), key.id)
}
