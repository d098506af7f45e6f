//! Key pool with priority-order selection and quota exhaustion tracking

use crate::config::KeyEntry;
use crate::keys::credential::{ActiveKey, Credential};
use crate::HarvestError;
use std::time::{Duration, Instant};

/// Ordered set of API keys
///
/// Selection scans forward from the currently active key in the order the keys
/// were supplied, wrapping around at the end, and returns the first key that is
/// not benched. The pool does no I/O.
#[derive(Debug, Clone)]
pub struct KeyPool {
    credentials: Vec<Credential>,
    active: Option<usize>,
}

impl KeyPool {
    /// Creates a pool from credentials in priority order
    pub fn new(credentials: Vec<Credential>) -> Self {
        Self {
            credentials,
            active: None,
        }
    }

    /// Creates a pool from the `[[keys]]` configuration entries
    pub fn from_config(keys: &[KeyEntry]) -> Self {
        Self::new(
            keys.iter()
                .map(|entry| Credential::new(entry.label.clone(), entry.token.clone()))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// Labels in priority order
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.credentials.iter().map(|c| c.label())
    }

    /// Label of the key most recently handed out
    pub fn active_label(&self) -> Option<&str> {
        self.active.map(|idx| self.credentials[idx].label())
    }

    /// Returns true if at least one key is usable right now
    pub fn has_available(&self) -> bool {
        self.has_available_at(Instant::now())
    }

    pub fn has_available_at(&self, now: Instant) -> bool {
        self.credentials.iter().any(|c| c.is_available(now))
    }

    /// Number of keys usable right now
    pub fn available_count(&self) -> usize {
        let now = Instant::now();
        self.credentials
            .iter()
            .filter(|c| c.is_available(now))
            .count()
    }

    /// Selects the key for the next call
    ///
    /// # Returns
    ///
    /// * `Ok(ActiveKey)` - The first usable key at or after the active position
    /// * `Err(HarvestError::QuotaExhausted)` - Every key is benched
    pub fn next_available(&mut self) -> Result<ActiveKey, HarvestError> {
        self.next_available_at(Instant::now())
    }

    pub fn next_available_at(&mut self, now: Instant) -> Result<ActiveKey, HarvestError> {
        let start = self.active.unwrap_or(0);
        self.select_at(now, start, &[])
    }

    /// Moves off the active key after it hit quota
    ///
    /// The scan starts just past the active key and never returns a key in
    /// `tried`, even one whose cooldown has already elapsed.
    ///
    /// # Returns
    ///
    /// * `Ok(ActiveKey)` - The next usable key not yet tried
    /// * `Err(HarvestError::QuotaExhausted)` - No untried key is usable
    pub fn rotate(&mut self, tried: &[usize]) -> Result<ActiveKey, HarvestError> {
        self.rotate_at(tried, Instant::now())
    }

    pub fn rotate_at(&mut self, tried: &[usize], now: Instant) -> Result<ActiveKey, HarvestError> {
        let start = self.active.map_or(0, |idx| idx + 1);
        self.select_at(now, start, tried)
    }

    fn select_at(
        &mut self,
        now: Instant,
        start: usize,
        skip: &[usize],
    ) -> Result<ActiveKey, HarvestError> {
        let count = self.credentials.len();

        for offset in 0..count {
            let idx = (start + offset) % count;
            if skip.contains(&idx) {
                continue;
            }
            let credential = &mut self.credentials[idx];
            credential.refresh(now);

            if credential.is_available(now) {
                if self.active != Some(idx) {
                    tracing::debug!("Key '{}' is now active", credential.label());
                }
                self.active = Some(idx);
                return Ok(ActiveKey::from_credential(idx, credential));
            }
        }

        self.active = None;
        Err(HarvestError::QuotaExhausted { keys: count })
    }

    /// Benches a key after a quota error
    ///
    /// `cooldown` of `None` benches the key for the rest of the run.
    /// Returns false if no key has that label.
    pub fn mark_exhausted(&mut self, label: &str, cooldown: Option<Duration>) -> bool {
        self.mark_exhausted_at(label, cooldown, Instant::now())
    }

    pub fn mark_exhausted_at(
        &mut self,
        label: &str,
        cooldown: Option<Duration>,
        now: Instant,
    ) -> bool {
        match self.credentials.iter_mut().find(|c| c.label() == label) {
            Some(credential) => {
                credential.exhaust(cooldown, now);
                match cooldown {
                    Some(cooldown) => tracing::info!(
                        "Key '{}' benched for {}s",
                        label,
                        cooldown.as_secs()
                    ),
                    None => tracing::info!("Key '{}' benched for the rest of the run", label),
                }
                true
            }
            None => false,
        }
    }
}
