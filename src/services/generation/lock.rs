use dashmap::DashSet;
use std::sync::Arc;

use crate::models::UserId;

/// Presence set of users with a generation job in flight
#[derive(Clone, Default)]
pub struct GenerationLocks {
    active: Arc<DashSet<UserId>>,
}

impl GenerationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `user_id` as generating, or returns `None` if a job already holds it.
    ///
    /// The marker is removed when the returned guard is dropped.
    pub fn try_acquire(&self, user_id: UserId) -> Option<GenerationGuard> {
        if self.active.insert(user_id) {
            Some(GenerationGuard {
                active: self.active.clone(),
                user_id,
            })
        } else {
            None
        }
    }

    pub fn is_locked(&self, user_id: UserId) -> bool {
        self.active.contains(&user_id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct GenerationGuard {
    active: Arc<DashSet<UserId>>,
    user_id: UserId,
}

impl GenerationGuard {
    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

impl Drop for GenerationGuard {
    fn drop(&mut self) {
        self.active.remove(&self.user_id);
        tracing::debug!(user_id = %self.user_id, "Released generation lock");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_second_acquire_is_rejected() {
        let locks = GenerationLocks::new();
        let user = Uuid::new_v4();

        let guard = locks.try_acquire(user);
        assert!(guard.is_some());
        assert!(locks.try_acquire(user).is_none());
        assert!(locks.is_locked(user));

        drop(guard);
        assert!(!locks.is_locked(user));
        assert!(locks.try_acquire(user).is_some());
    }

    #[test]
    fn test_locks_are_per_user() {
        let locks = GenerationLocks::new();
        let _a = locks.try_acquire(Uuid::new_v4()).unwrap();
        let _b = locks.try_acquire(Uuid::new_v4()).unwrap();
        assert_eq!(locks.active_count(), 2);
    }

    #[test]
    fn test_independent_lock_sets_do_not_interfere() {
        let user = Uuid::new_v4();
        let first = GenerationLocks::new();
        let second = GenerationLocks::new();

        let _guard = first.try_acquire(user).unwrap();
        assert!(second.try_acquire(user).is_some());
    }

    #[tokio::test]
    async fn test_guard_released_when_task_panics() {
        let locks = GenerationLocks::new();
        let user = Uuid::new_v4();
        let guard = locks.try_acquire(user).unwrap();

        let handle = tokio::spawn(async move {
            let _guard = guard;
            panic!("generation blew up");
        });
        assert!(handle.await.is_err());
        assert!(!locks.is_locked(user));
    }
}
