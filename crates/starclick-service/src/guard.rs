//! Single writer per player.
//!
//! The [`ConcurrencyGuard`] hands out at most one [`PlayerLease`] per player
//! at a time. Commands for different players never contend; commands for
//! the same player either queue until the command deadline or are rejected
//! immediately, depending on the configured [`GuardPolicy`].
//!
//! A lease is released when it is dropped, on every exit path. The entry
//! for a player is removed from the lock table once the last holder or
//! waiter is gone, so the table only ever holds players with in-flight
//! commands.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use starclick_core::GuardPolicy;
use starclick_types::PlayerId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::Instant;

use crate::error::ServiceError;

type LockTable = Arc<Mutex<HashMap<PlayerId, Arc<AsyncMutex<()>>>>>;

/// Per-player mutual exclusion for state mutations.
#[derive(Debug, Clone)]
pub struct ConcurrencyGuard {
    policy: GuardPolicy,
    locks: LockTable,
}

/// Exclusive right to mutate one player's state.
#[derive(Debug)]
pub struct PlayerLease {
    player_id: PlayerId,
    locks: LockTable,
    _held: OwnedMutexGuard<()>,
}

impl ConcurrencyGuard {
    /// Create a guard with the given contention policy.
    pub fn new(policy: GuardPolicy) -> Self {
        Self {
            policy,
            locks: Arc::default(),
        }
    }

    /// The contention policy in use.
    pub const fn policy(&self) -> GuardPolicy {
        self.policy
    }

    /// Players with a command in flight or queued.
    pub fn active_players(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Take the player's lease.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Timeout`] if `deadline` passes while queued under
    /// [`GuardPolicy::Queue`]; [`ServiceError::Busy`] if the lease is held
    /// under [`GuardPolicy::Reject`].
    pub async fn acquire(
        &self,
        player_id: PlayerId,
        deadline: Instant,
    ) -> Result<PlayerLease, ServiceError> {
        let slot = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(player_id).or_default())
        };

        let held = match self.policy {
            GuardPolicy::Queue => tokio::time::timeout_at(deadline, slot.lock_owned())
                .await
                .ok(),
            GuardPolicy::Reject => slot.try_lock_owned().ok(),
        };

        let Some(held) = held else {
            self.release_slot(player_id);
            return Err(match self.policy {
                GuardPolicy::Queue => {
                    tracing::warn!(%player_id, "Timed out waiting for player lock");
                    ServiceError::Timeout { player_id }
                }
                GuardPolicy::Reject => {
                    tracing::debug!(%player_id, "Player lock busy");
                    ServiceError::Busy { player_id }
                }
            });
        };

        Ok(PlayerLease {
            player_id,
            locks: Arc::clone(&self.locks),
            _held: held,
        })
    }

    /// Drop the table entry if nobody else references it.
    fn release_slot(&self, player_id: PlayerId) {
        remove_if_unused(&self.locks, player_id, 1);
    }
}

impl PlayerLease {
    /// The player this lease covers.
    pub const fn player_id(&self) -> PlayerId {
        self.player_id
    }
}

impl Drop for PlayerLease {
    fn drop(&mut self) {
        // The table and this lease's guard account for two references.
        remove_if_unused(&self.locks, self.player_id, 2);
    }
}

/// Remove `player_id`'s slot when only `expected` references remain.
///
/// References are only cloned under the table lock, so the count cannot
/// grow while it is being checked.
fn remove_if_unused(locks: &LockTable, player_id: PlayerId, expected: usize) {
    let mut table = locks.lock().unwrap_or_else(PoisonError::into_inner);
    if table
        .get(&player_id)
        .is_some_and(|slot| Arc::strong_count(slot) <= expected)
    {
        table.remove(&player_id);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn soon() -> Instant {
        Instant::now()
            .checked_add(Duration::from_millis(50))
            .unwrap()
    }

    #[tokio::test]
    async fn lease_is_exclusive_per_player() {
        let guard = ConcurrencyGuard::new(GuardPolicy::Reject);
        let player = PlayerId::new();

        let lease = guard.acquire(player, soon()).await.unwrap();
        assert_eq!(lease.player_id(), player);
        assert!(matches!(
            guard.acquire(player, soon()).await,
            Err(ServiceError::Busy { .. })
        ));

        // A different player is unaffected.
        let other = guard.acquire(PlayerId::new(), soon()).await.unwrap();
        assert_eq!(guard.active_players(), 2);

        drop(lease);
        drop(other);
        assert_eq!(guard.active_players(), 0);
        assert!(guard.acquire(player, soon()).await.is_ok());
    }

    #[tokio::test]
    async fn queued_waiter_times_out() {
        let guard = ConcurrencyGuard::new(GuardPolicy::Queue);
        let player = PlayerId::new();
        let _lease = guard.acquire(player, soon()).await.unwrap();

        let result = guard.acquire(player, soon()).await;
        assert!(matches!(result, Err(ServiceError::Timeout { .. })));
        assert_eq!(guard.active_players(), 1);
    }

    #[tokio::test]
    async fn queued_waiter_gets_lease_after_release() {
        let guard = ConcurrencyGuard::new(GuardPolicy::Queue);
        let player = PlayerId::new();
        let lease = guard.acquire(player, soon()).await.unwrap();

        let waiter = {
            let guard = guard.clone();
            tokio::spawn(async move {
                let deadline = Instant::now()
                    .checked_add(Duration::from_secs(5))
                    .unwrap();
                guard.acquire(player, deadline).await.map(|l| l.player_id())
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(lease);

        assert_eq!(waiter.await.unwrap().unwrap(), player);
        assert_eq!(guard.active_players(), 0);
    }
}
