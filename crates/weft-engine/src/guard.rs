//! Per-user single-flight guard for pattern operations.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::debug;
use weft_core::UserId;

use crate::error::EngineError;

/// Allows at most one in-flight pattern operation per user.
#[derive(Clone, Default)]
pub struct SingleFlight {
    active: Arc<Mutex<HashSet<UserId>>>,
    disabled: bool,
}

impl SingleFlight {
    pub fn new(enabled: bool) -> Self {
        Self {
            active: Arc::default(),
            disabled: !enabled,
        }
    }

    /// Claim the user's slot, failing with [`EngineError::Busy`] if taken.
    /// The slot is released when the returned guard drops.
    pub fn try_acquire(&self, user: &UserId) -> Result<FlightGuard, EngineError> {
        if self.disabled {
            return Ok(FlightGuard {
                active: None,
                user: user.clone(),
            });
        }
        let mut active = self
            .active
            .lock()
            .map_err(|e| EngineError::Store(format!("guard mutex poisoned: {}", e)))?;
        if !active.insert(user.clone()) {
            debug!(user = %user, "Rejecting concurrent pattern operation");
            return Err(EngineError::Busy(user.to_string()));
        }
        Ok(FlightGuard {
            active: Some(Arc::clone(&self.active)),
            user: user.clone(),
        })
    }

    pub fn is_active(&self, user: &UserId) -> bool {
        self.active
            .lock()
            .map(|a| a.contains(user))
            .unwrap_or(false)
    }
}

/// Holds a user's single-flight slot until dropped.
pub struct FlightGuard {
    active: Option<Arc<Mutex<HashSet<UserId>>>>,
    user: UserId,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            if let Ok(mut set) = active.lock() {
                set.remove(&self.user);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_busy() {
        let flight = SingleFlight::new(true);
        let user = UserId::new("1");
        let _guard = flight.try_acquire(&user).unwrap();
        assert!(matches!(flight.try_acquire(&user), Err(EngineError::Busy(_))));
        assert!(flight.is_active(&user));
    }

    #[test]
    fn test_release_on_drop() {
        let flight = SingleFlight::new(true);
        let user = UserId::new("1");
        drop(flight.try_acquire(&user).unwrap());
        assert!(!flight.is_active(&user));
        assert!(flight.try_acquire(&user).is_ok());
    }

    #[test]
    fn test_users_independent() {
        let flight = SingleFlight::new(true);
        let _a = flight.try_acquire(&UserId::new("a")).unwrap();
        assert!(flight.try_acquire(&UserId::new("b")).is_ok());
    }

    #[test]
    fn test_disabled_never_blocks() {
        let flight = SingleFlight::new(false);
        let user = UserId::new("1");
        let _a = flight.try_acquire(&user).unwrap();
        assert!(flight.try_acquire(&user).is_ok());
    }
}
