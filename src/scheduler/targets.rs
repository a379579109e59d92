//! The set of monitored targets.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;

use crate::probe::has_port;
use crate::store::{ProbeKind, Target, MAX_TIMEOUT};

/// A target definition that was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    #[error("target name must not be empty")]
    EmptyName,
    #[error("target address must not be empty")]
    EmptyAddress,
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("timeout must be positive and at most {} seconds", MAX_TIMEOUT.as_secs())]
    InvalidTimeout,
    #[error("target already exists: {0}")]
    DuplicateName(String),
    #[error("target not found: {0}")]
    NotFound(String),
}

/// Check a target definition before it is registered.
pub fn validate_target(target: &Target) -> Result<(), TargetError> {
    if target.name.trim().is_empty() {
        return Err(TargetError::EmptyName);
    }
    let address = target.address.trim();
    if address.is_empty() {
        return Err(TargetError::EmptyAddress);
    }
    if target.timeout.is_zero() || target.timeout > MAX_TIMEOUT {
        return Err(TargetError::InvalidTimeout);
    }

    match &target.kind {
        ProbeKind::Http { expected_status } => {
            if !(100..=599).contains(expected_status) {
                return Err(TargetError::InvalidAddress(format!(
                    "expected status {} is not an HTTP status",
                    expected_status
                )));
            }
            if address.chars().any(char::is_whitespace) {
                return Err(TargetError::InvalidAddress(target.address.clone()));
            }
        }
        ProbeKind::Tcp => {
            let addr = address.strip_prefix("tcp://").unwrap_or(address);
            if !has_port(addr) {
                return Err(TargetError::InvalidAddress(format!(
                    "expected host:port, got {}",
                    target.address
                )));
            }
        }
    }

    Ok(())
}

/// Registered targets.
///
/// Updates replace the whole list, so a reader holding a [`list`] snapshot
/// is never affected by a later change.
///
/// [`list`]: TargetRegistry::list
#[derive(Default)]
pub struct TargetRegistry {
    targets: RwLock<Arc<Vec<Target>>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new target. Names are unique.
    pub fn add(&self, target: Target) -> Result<(), TargetError> {
        validate_target(&target)?;

        let mut guard = self.targets.write().unwrap_or_else(PoisonError::into_inner);
        if guard.iter().any(|t| t.name == target.name) {
            return Err(TargetError::DuplicateName(target.name));
        }

        tracing::info!(target_name = %target.name, address = %target.address, kind = target.kind.name(), "Target added");
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        next.push(target);
        *guard = Arc::new(next);
        Ok(())
    }

    /// Unregister a target by name, returning it.
    pub fn remove(&self, name: &str) -> Result<Target, TargetError> {
        let mut guard = self.targets.write().unwrap_or_else(PoisonError::into_inner);
        let Some(pos) = guard.iter().position(|t| t.name == name) else {
            return Err(TargetError::NotFound(name.to_string()));
        };

        let mut next = guard.as_ref().clone();
        let removed = next.remove(pos);
        *guard = Arc::new(next);

        tracing::info!(target_name = %removed.name, "Target removed");
        Ok(removed)
    }

    /// Swap in a new list. Nothing changes unless every target is valid and
    /// names are unique.
    pub fn replace_all(&self, targets: Vec<Target>) -> Result<(), TargetError> {
        for (i, target) in targets.iter().enumerate() {
            validate_target(target)?;
            if targets[..i].iter().any(|t| t.name == target.name) {
                return Err(TargetError::DuplicateName(target.name.clone()));
            }
        }

        let count = targets.len();
        *self.targets.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(targets);
        tracing::info!(count, "Target list replaced");
        Ok(())
    }

    /// Current targets in insertion order.
    pub fn list(&self) -> Arc<Vec<Target>> {
        self.targets.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.list().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
