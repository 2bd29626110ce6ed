//! Which network name and passphrase the access point advertises, over time.
//!
//! [`IdentityRotation`] is a plain state machine fed with `embassy_time::Instant`s, so it
//! runs the same on the device and in host tests, as does the [`dhcp`] server that gives
//! joining clients an address. The radio side lives in `radio` (firmware only).
pub mod dhcp;
#[cfg(all(feature = "wifi", not(feature = "host")))]
pub mod radio;

use embassy_time::{Duration, Instant};

/// Address of the player on its own network.
pub const AP_ADDRESS: [u8; 4] = [192, 168, 4, 1];
/// Prefix length of the access-point subnet.
pub const AP_PREFIX_LEN: u8 = 24;
/// HTTP port.
pub const HTTP_PORT: u16 = 80;

/// One advertised network.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ApIdentity {
    /// Network name.
    pub ssid: &'static str,
    /// WPA2 passphrase (8 to 63 characters).
    pub passphrase: &'static str,
}

impl ApIdentity {
    /// Pair a network name with its passphrase.
    #[must_use]
    pub const fn new(ssid: &'static str, passphrase: &'static str) -> Self {
        assert!(!ssid.is_empty() && ssid.len() <= 32, "SSID must be 1-32 bytes");
        assert!(
            passphrase.len() >= 8 && passphrase.len() <= 63,
            "WPA2 passphrase must be 8-63 characters"
        );
        Self { ssid, passphrase }
    }
}

/// Cycles through a fixed list of identities, one step per `period`.
///
/// ```rust
/// use embassy_time::{Duration, Instant};
/// use matrix_player::access_point::{ApIdentity, IdentityRotation};
///
/// const IDENTITIES: [ApIdentity; 2] = [
///     ApIdentity::new("Matrix-A", "password-a"),
///     ApIdentity::new("Matrix-B", "password-b"),
/// ];
///
/// let start = Instant::from_millis(0);
/// let mut rotation = IdentityRotation::new(&IDENTITIES, Duration::from_secs(60), start);
/// assert_eq!(rotation.current().ssid, "Matrix-A");
/// assert!(rotation.poll(Instant::from_millis(59_999)).is_none());
/// assert_eq!(rotation.poll(Instant::from_millis(60_000)).map(|id| id.ssid), Some("Matrix-B"));
/// ```
#[derive(Clone, Debug)]
pub struct IdentityRotation<'a> {
    identities: &'a [ApIdentity],
    index: usize,
    period: Duration,
    switched_at: Instant,
}

impl<'a> IdentityRotation<'a> {
    /// Start on the first identity at `now`.
    ///
    /// # Panics
    ///
    /// Panics if `identities` is empty.
    #[must_use]
    pub fn new(identities: &'a [ApIdentity], period: Duration, now: Instant) -> Self {
        assert!(!identities.is_empty(), "at least one AP identity is required");
        Self {
            identities,
            index: 0,
            period,
            switched_at: now,
        }
    }

    /// The identity currently advertised.
    #[must_use]
    pub fn current(&self) -> &'a ApIdentity {
        &self.identities[self.index]
    }

    /// Index of [`current`](Self::current) in the list.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// When the next switch is due.
    #[must_use]
    pub fn next_switch(&self) -> Instant {
        self.switched_at + self.period
    }

    /// Advance if a period has elapsed since the last switch, returning the new identity.
    ///
    /// At most one step is taken per call, however late the call is; the next period is
    /// measured from `now`. A single identity never switches.
    pub fn poll(&mut self, now: Instant) -> Option<&'a ApIdentity> {
        if self.identities.len() < 2 || now < self.next_switch() {
            return None;
        }
        self.index = (self.index + 1) % self.identities.len();
        self.switched_at = now;
        let identity = self.current();
        info!("AP identity -> {}", identity.ssid);
        Some(identity)
    }
}
