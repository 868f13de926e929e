//! Semaphore utilities for resource management
//!
//! This module provides helper functions for managing semaphores with
//! consistent error handling across modsite.

use modsite_errors::{Error, QueueError};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Acquire a semaphore permit with proper error handling
///
/// # Arguments
///
/// * `semaphore` - The semaphore to acquire a permit from
/// * `operation` - Description of the operation for error reporting
///
/// # Errors
///
/// Returns an error if the semaphore is closed or acquisition fails
pub async fn acquire_semaphore_permit(
    semaphore: Arc<Semaphore>,
    operation: &str,
) -> Result<OwnedSemaphorePermit, Error> {
    semaphore.acquire_owned().await.map_err(|_| {
        tracing::debug!(operation, "semaphore closed while waiting");
        QueueError::Closed.into()
    })
}

/// Create a semaphore with a specified number of permits
#[must_use]
pub fn create_semaphore(permits: usize) -> Arc<Semaphore> {
    Arc::new(Semaphore::new(permits.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn permits_are_bounded() {
        let sem = create_semaphore(1);
        let held = acquire_semaphore_permit(sem.clone(), "test").await.unwrap();
        assert_eq!(sem.available_permits(), 0);
        drop(held);
        assert!(acquire_semaphore_permit(sem.clone(), "test").await.is_ok());
        assert_eq!(create_semaphore(0).available_permits(), 1);
    }

    #[tokio::test]
    async fn closed_semaphore_errors() {
        let sem = create_semaphore(1);
        sem.close();
        assert!(acquire_semaphore_permit(sem.clone(), "test").await.is_err());
    }
}
