//! Shared application state for axum handlers.

use std::sync::Arc;

use fog_app::hooks::HookManager;
use fog_app::ports::RecordRepository;
use fog_app::services::auth_service::AuthService;
use fog_app::services::record_service::RecordService;
use fog_app::services::tasking::TaskingService;

/// Application state shared across all axum handlers.
///
/// Generic over the record repository to avoid dynamic dispatch.
/// `Clone` is implemented manually so the repository itself does not
/// need to be `Clone` — only the `Arc` wrappers are cloned.
pub struct AppState<R> {
    /// Generic CRUD over catalog classes.
    pub records: Arc<RecordService<R>>,
    /// Task creation, listing and cancellation.
    pub tasking: Arc<TaskingService<R>>,
    /// Token and credential checks.
    pub auth: Arc<AuthService<R>>,
    /// Prefix every API route is served under, without a trailing `/`.
    pub base_path: Arc<str>,
}

impl<R> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
            tasking: Arc::clone(&self.tasking),
            auth: Arc::clone(&self.auth),
            base_path: Arc::clone(&self.base_path),
        }
    }
}

impl<R> AppState<R>
where
    R: RecordRepository + Send + Sync + 'static,
{
    /// Build every service over one repository and hook manager.
    pub fn new(repo: Arc<R>, hooks: Arc<HookManager>, base_path: &str) -> Self {
        Self {
            records: Arc::new(RecordService::new(Arc::clone(&repo), Arc::clone(&hooks))),
            tasking: Arc::new(TaskingService::new(Arc::clone(&repo), hooks)),
            auth: Arc::new(AuthService::new(repo)),
            base_path: Arc::from(base_path.trim_end_matches('/')),
        }
    }
}
