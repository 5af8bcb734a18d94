//! The explicitly passed chat session.
//!
//! A `Session` owns the service client used by a screen or command, plus
//! any background tasks started on its behalf. It is created once by the
//! composing code and closed when that code is done with it.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::models::User;
use crate::sdk::{ChatService, ServiceError, ServiceResult};

pub struct Session {
    service: Arc<dyn ChatService>,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    pub fn new(service: Arc<dyn ChatService>) -> Self {
        tracing::debug!(user = service.current_user_id(), "session opened");
        Self {
            service,
            tasks: Vec::new(),
        }
    }

    pub fn service(&self) -> Arc<dyn ChatService> {
        Arc::clone(&self.service)
    }

    pub fn user_id(&self) -> &str {
        self.service.current_user_id()
    }

    /// Profile of the session's user.
    pub async fn current_user(&self) -> ServiceResult<User> {
        let id = self.user_id();
        self.service
            .get_user(id)
            .await?
            .ok_or_else(|| ServiceError::user_not_found(id))
    }

    /// Run `task` until the session closes.
    pub fn spawn_background<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.push(tokio::spawn(task));
    }

    /// Stop background work. Subscriptions held by screens are released
    /// when the screens drop them, before this is called.
    pub async fn close(mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
            let _ = task.await;
        }
        tracing::debug!(user = self.user_id(), "session closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
