//! Simulated device linking
//!
//! There is no real handshake: a registered number moves to `Linking`, and the
//! automation driver completes the link after a fixed delay.

/// Country prefix applied to local numbers
pub const COUNTRY_PREFIX: &str = "+244";

/// Minimum digits a local number must carry
const MIN_DIGITS: usize = 9;

/// Transient phase of the link flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkPhase {
    #[default]
    Unlinked,
    /// QR scan in progress
    Linking,
    Linked,
}

/// Global link flag plus the associated contact number
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkState {
    pub is_linked: bool,
    pub phone_number: String,
    linking: bool,
}

impl LinkState {
    #[must_use]
    pub fn new(is_linked: bool, phone_number: impl Into<String>) -> Self {
        Self {
            is_linked,
            phone_number: phone_number.into(),
            linking: false,
        }
    }

    #[must_use]
    pub const fn phase(&self) -> LinkPhase {
        if self.is_linked {
            LinkPhase::Linked
        } else if self.linking {
            LinkPhase::Linking
        } else {
            LinkPhase::Unlinked
        }
    }

    /// Start linking `raw` as the instance number
    ///
    /// Returns the normalized number, or `None` when the input is not a valid
    /// number or the instance is already linked or linking.
    pub fn request_link(&mut self, raw: &str) -> Option<&str> {
        if self.phase() != LinkPhase::Unlinked {
            return None;
        }
        self.phone_number = normalize_number(raw)?;
        self.linking = true;
        Some(&self.phone_number)
    }

    /// Finish a pending link; `false` when nothing was pending
    pub fn complete_link(&mut self) -> bool {
        if !self.linking {
            return false;
        }
        self.linking = false;
        self.is_linked = true;
        true
    }

    /// Drop the link immediately; `false` when already unlinked
    pub fn unlink(&mut self) -> bool {
        let was_active = self.is_linked || self.linking;
        self.is_linked = false;
        self.linking = false;
        was_active
    }
}

/// Normalize an operator-typed number
///
/// Numbers already carrying a `+` prefix are kept as typed; local numbers get
/// [`COUNTRY_PREFIX`]. Fewer than nine digits is rejected.
#[must_use]
pub fn normalize_number(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let digits = raw.chars().filter(char::is_ascii_digit).count();
    if digits < MIN_DIGITS {
        return None;
    }
    if raw.starts_with('+') {
        Some(raw.to_string())
    } else {
        Some(format!("{COUNTRY_PREFIX} {raw}"))
    }
}
