//! Workspace context extracted from request headers.
//!
//! The BFF authenticates the dashboard user and forwards the active workspace
//! as `X-Workspace-ID` and the acting user as `X-User-ID`.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use service_core::error::AppError;
use uuid::Uuid;

pub const WORKSPACE_ID_HEADER: &str = "X-Workspace-ID";
pub const USER_ID_HEADER: &str = "X-User-ID";

#[derive(Debug, Clone)]
pub struct WorkspaceContext {
    pub workspace_id: Uuid,
    pub user_id: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for WorkspaceContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let workspace_id = parts
            .headers
            .get(WORKSPACE_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::AuthError(anyhow::anyhow!(
                    "Missing X-Workspace-ID header (required from BFF)"
                ))
            })?
            .parse::<Uuid>()
            .map_err(|_| AppError::AuthError(anyhow::anyhow!("Invalid X-Workspace-ID header")))?;

        let user_id = user_id(&parts.headers);

        let span = tracing::Span::current();
        span.record("workspace_id", workspace_id.to_string().as_str());
        if let Some(ref uid) = user_id {
            span.record("user_id", uid.as_str());
        }

        Ok(WorkspaceContext {
            workspace_id,
            user_id,
        })
    }
}

/// Acting user, when the BFF forwarded one.
fn user_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}
