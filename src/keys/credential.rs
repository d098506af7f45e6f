/// Credential definitions for the key pool
use std::fmt;
use std::time::{Duration, Instant};

/// How long a credential stays out of rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exhaustion {
    /// Usable again once this instant has passed
    Until(Instant),

    /// Out for the rest of the run
    Indefinite,
}

/// A labelled API token
///
/// The token never appears in `Debug` output.
#[derive(Clone)]
pub struct Credential {
    label: String,
    token: String,
    exhausted_until: Option<Exhaustion>,
}

impl Credential {
    /// Creates a credential that is available immediately
    pub fn new(label: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            token: token.into(),
            exhausted_until: None,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn exhausted_until(&self) -> Option<Exhaustion> {
        self.exhausted_until
    }

    /// Returns true if the credential may be used at `now`
    pub fn is_available(&self, now: Instant) -> bool {
        match self.exhausted_until {
            None => true,
            Some(Exhaustion::Until(until)) => now >= until,
            Some(Exhaustion::Indefinite) => false,
        }
    }

    /// Benches the credential for `cooldown`, or indefinitely when unknown
    pub(crate) fn exhaust(&mut self, cooldown: Option<Duration>, now: Instant) {
        self.exhausted_until = Some(match cooldown {
            Some(cooldown) => Exhaustion::Until(now + cooldown),
            None => Exhaustion::Indefinite,
        });
    }

    /// Clears a cooldown that has already elapsed
    pub(crate) fn refresh(&mut self, now: Instant) {
        if let Some(Exhaustion::Until(until)) = self.exhausted_until {
            if now >= until {
                self.exhausted_until = None;
            }
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("label", &self.label)
            .field("token", &"<redacted>")
            .field("exhausted_until", &self.exhausted_until)
            .finish()
    }
}

/// The key selected by the pool for the next call
#[derive(Clone, PartialEq, Eq)]
pub struct ActiveKey {
    index: usize,
    label: String,
    token: String,
}

impl ActiveKey {
    pub(crate) fn from_credential(index: usize, credential: &Credential) -> Self {
        Self {
            index,
            label: credential.label.clone(),
            token: credential.token.clone(),
        }
    }

    /// Position of the key in the configured priority order
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for ActiveKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveKey")
            .field("index", &self.index)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_credential_is_available() {
        let credential = Credential::new("primary", "secret");
        assert!(credential.is_available(Instant::now()));
        assert_eq!(credential.exhausted_until(), None);
    }

    #[test]
    fn test_cooldown_elapses() {
        let now = Instant::now();
        let mut credential = Credential::new("primary", "secret");
        credential.exhaust(Some(Duration::from_secs(60)), now);

        assert!(!credential.is_available(now));
        assert!(!credential.is_available(now + Duration::from_secs(59)));
        assert!(credential.is_available(now + Duration::from_secs(60)));

        credential.refresh(now + Duration::from_secs(61));
        assert_eq!(credential.exhausted_until(), None);
    }

    #[test]
    fn test_indefinite_exhaustion_never_clears() {
        let now = Instant::now();
        let mut credential = Credential::new("primary", "secret");
        credential.exhaust(None, now);

        let much_later = now + Duration::from_secs(86_400);
        credential.refresh(much_later);
        assert!(!credential.is_available(much_later));
    }

    #[test]
    fn test_debug_redacts_token() {
        let credential = Credential::new("primary", "AIza-very-secret");
        let rendered = format!("{:?}", credential);
        assert!(rendered.contains("primary"));
        assert!(!rendered.contains("AIza-very-secret"));

        let active = ActiveKey::from_credential(0, &credential);
        assert!(!format!("{:?}", active).contains("AIza-very-secret"));
    }
}
