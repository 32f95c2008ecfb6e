//! PIN-gated Diffie-Hellman pairing.
//!
//! Both peers exchange a 16-byte random. Each random is encrypted with an
//! AES key derived from the PIN (SHA-256 of the little-endian PIN, first 16
//! bytes) and read as a big-endian exponent. The shared DH key is
//!
//! ```text
//! k = (5 ^ E(pin, local) mod p) ^ E(pin, remote) mod p
//! ```
//!
//! truncated to its 16 least-significant bytes, which is symmetric in the
//! two randoms. The peripheral then seals a 32-byte session secret
//! (`key ‖ nonce`) under `k` in block mode and the host opens it.
//!
//! There is no key confirmation: peers with different PINs silently derive
//! different keys and their traffic decrypts to garbage.

use crate::error::{constants, ProtocolError, Result};
use crate::utils::crypto::{self, KEY_LEN};
use crate::utils::metrics::{global_metrics, Timer};
use num_bigint::BigUint;
use once_cell::sync::Lazy;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::{debug, instrument, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// DH generator
pub const GENERATOR: u32 = 5;

/// Length of each peer's pairing random
pub const RANDOM_LEN: usize = 16;

/// Length of the sealed session secret (`key ‖ nonce`)
pub const SECRET_LEN: usize = 2 * KEY_LEN;

/// RFC 2409 Oakley Group 2 prime (1024-bit MODP)
const MODULUS_HEX: &str = concat!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD1",
    "29024E088A67CC74020BBEA63B139B22514A08798E3404DD",
    "EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245",
    "E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED",
    "EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE65381",
    "FFFFFFFFFFFFFFFF"
);

static MODULUS: Lazy<Option<BigUint>> = Lazy::new(|| BigUint::parse_bytes(MODULUS_HEX.as_bytes(), 16));

fn modulus() -> Result<&'static BigUint> {
    MODULUS
        .as_ref()
        .ok_or_else(|| ProtocolError::HandshakeError("invalid DH modulus".into()))
}

/// Session key material agreed by pairing
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey {
    key: [u8; KEY_LEN],
    nonce: [u8; KEY_LEN],
}

impl SessionKey {
    pub fn new(nonce: [u8; KEY_LEN], key: [u8; KEY_LEN]) -> Self {
        Self { key, nonce }
    }

    /// Fresh random key material, as chosen by the peripheral
    pub fn generate() -> Result<Self> {
        let mut key = [0u8; KEY_LEN];
        let mut nonce = [0u8; KEY_LEN];
        crypto::fill_random(&mut key)?;
        crypto::fill_random(&mut nonce)?;
        Ok(Self { key, nonce })
    }

    pub fn key(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    pub fn nonce(&self) -> &[u8; KEY_LEN] {
        &self.nonce
    }

    fn to_secret(&self) -> [u8; SECRET_LEN] {
        let mut out = [0u8; SECRET_LEN];
        out[..KEY_LEN].copy_from_slice(&self.key);
        out[KEY_LEN..].copy_from_slice(&self.nonce);
        out
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKey").finish_non_exhaustive()
    }
}

/// Draw a pairing random
pub fn generate_random() -> [u8; RANDOM_LEN] {
    rand::random()
}

/// Draw a PIN with at most `digits` decimal digits
pub fn generate_pin(digits: u32) -> Result<u32> {
    let bound = 10u32
        .checked_pow(digits)
        .ok_or_else(|| ProtocolError::HandshakeError(constants::ERR_PIN_OUT_OF_RANGE.into()))?;
    Ok(rand::rng().random_range(0..bound))
}

/// AES key derived from the PIN
pub fn pin_key(pin: u32) -> [u8; KEY_LEN] {
    let digest = Sha256::digest(pin.to_le_bytes());
    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&digest[..KEY_LEN]);
    key
}

/// Encrypt a pairing random under the PIN key (block mode)
pub fn encrypt_random(random: &[u8], pin: u32) -> Result<Vec<u8>> {
    let mut key = pin_key(pin);
    let out = crypto::block_encrypt(&key, random);
    key.zeroize();
    out
}

/// DH key shared by both peers; swapping `local` and `remote` gives the same key
#[instrument(skip_all)]
pub fn derive_shared_key(pin: u32, local: &[u8], remote: &[u8]) -> Result<[u8; KEY_LEN]> {
    let _timer = Timer::start("derive_shared_key");
    let p = modulus()?;
    let a = BigUint::from_bytes_be(&encrypt_random(local, pin)?);
    let b = BigUint::from_bytes_be(&encrypt_random(remote, pin)?);

    let shared = BigUint::from(GENERATOR).modpow(&a, p).modpow(&b, p);
    let bytes = shared.to_bytes_le();

    let mut key = [0u8; KEY_LEN];
    let n = bytes.len().min(KEY_LEN);
    key[..n].copy_from_slice(&bytes[..n]);
    debug!("Derived DH key");
    Ok(key)
}

/// Host side: open the peer-supplied sealed secret into the session key
#[instrument(skip_all)]
pub fn derive_session_key(
    pin: u32,
    local: &[u8],
    remote: &[u8],
    peer_secret: &[u8],
) -> Result<SessionKey> {
    if peer_secret.len() != SECRET_LEN {
        return Err(ProtocolError::HandshakeError(format!(
            "session secret must be {SECRET_LEN} bytes, got {}",
            peer_secret.len()
        )));
    }
    let mut dh = derive_shared_key(pin, local, remote)?;
    let mut opened = crypto::block_decrypt(&dh, peer_secret)?;
    dh.zeroize();

    let mut key = [0u8; KEY_LEN];
    let mut nonce = [0u8; KEY_LEN];
    key.copy_from_slice(&opened[..KEY_LEN]);
    nonce.copy_from_slice(&opened[KEY_LEN..]);
    opened.zeroize();

    debug!("Session key derived");
    Ok(SessionKey { key, nonce })
}

/// Peripheral side: seal `session` for the peer
#[instrument(skip_all)]
pub fn seal_session_secret(
    pin: u32,
    local: &[u8],
    remote: &[u8],
    session: &SessionKey,
) -> Result<Vec<u8>> {
    let mut dh = derive_shared_key(pin, local, remote)?;
    let mut secret = session.to_secret();
    let sealed = crypto::block_encrypt(&dh, &secret);
    dh.zeroize();
    secret.zeroize();
    sealed
}

/// Per-pairing state, passed through the exchange and wiped on drop
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct PairingState {
    pin: u32,
    local: [u8; RANDOM_LEN],
    remote: Option<[u8; RANDOM_LEN]>,
}

impl PairingState {
    /// Start pairing with a fresh local random
    pub fn new(pin: u32) -> Self {
        Self::with_random(pin, generate_random())
    }

    pub fn with_random(pin: u32, local: [u8; RANDOM_LEN]) -> Self {
        Self {
            pin,
            local,
            remote: None,
        }
    }

    /// Random to send to the peer
    pub fn local_random(&self) -> [u8; RANDOM_LEN] {
        self.local
    }

    pub fn receive_peer_random(&mut self, remote: [u8; RANDOM_LEN]) {
        self.remote = Some(remote);
    }

    fn remote(&self) -> Result<[u8; RANDOM_LEN]> {
        self.remote
            .ok_or_else(|| ProtocolError::HandshakeError(constants::ERR_PEER_RANDOM_NOT_SET.into()))
    }

    pub fn shared_key(&self) -> Result<[u8; KEY_LEN]> {
        derive_shared_key(self.pin, &self.local, &self.remote()?)
    }

    /// Host: open the peer's sealed secret
    #[instrument(skip_all)]
    pub fn finish(self, peer_secret: &[u8]) -> Result<SessionKey> {
        record_outcome(
            self.remote()
                .and_then(|remote| derive_session_key(self.pin, &self.local, &remote, peer_secret)),
        )
    }

    /// Peripheral: choose a session key and seal it for the host
    #[instrument(skip_all)]
    pub fn seal(self) -> Result<(SessionKey, Vec<u8>)> {
        record_outcome(self.remote().and_then(|remote| {
            let session = SessionKey::generate()?;
            let sealed = seal_session_secret(self.pin, &self.local, &remote, &session)?;
            Ok((session, sealed))
        }))
    }
}

fn record_outcome<T>(result: Result<T>) -> Result<T> {
    let metrics = global_metrics();
    metrics.handshake_attempt();
    match &result {
        Ok(_) => metrics.handshake_success(),
        Err(e) => {
            metrics.handshake_failed();
            warn!(error = %e, "Pairing failed");
        }
    }
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_modulus_is_1024_bits() {
        assert_eq!(modulus().unwrap().bits(), 1024);
    }

    #[test]
    fn test_pin_key_depends_on_pin() {
        assert_eq!(pin_key(123_456), pin_key(123_456));
        assert_ne!(pin_key(123_456), pin_key(123_457));
    }

    #[test]
    fn test_shared_key_symmetric() {
        let a = generate_random();
        let b = generate_random();
        assert_eq!(
            derive_shared_key(4321, &a, &b).unwrap(),
            derive_shared_key(4321, &b, &a).unwrap()
        );
    }

    #[test]
    fn test_random_must_be_whole_blocks() {
        assert!(matches!(
            derive_shared_key(1, &[0u8; 10], &[0u8; 16]),
            Err(ProtocolError::InvalidBlockLength(10))
        ));
    }

    #[test]
    fn test_wrong_secret_length() {
        let a = generate_random();
        assert!(matches!(
            derive_session_key(1, &a, &a, &[0u8; 16]),
            Err(ProtocolError::HandshakeError(_))
        ));
    }

    #[test]
    fn test_finish_without_peer_random() {
        let state = PairingState::new(1);
        assert!(matches!(
            state.finish(&[0u8; SECRET_LEN]),
            Err(ProtocolError::HandshakeError(_))
        ));
    }

    #[test]
    fn test_generate_pin_bounds() {
        for _ in 0..100 {
            assert!(generate_pin(6).unwrap() < 1_000_000);
        }
        assert!(generate_pin(12).is_err());
    }

    #[test]
    fn test_session_key_debug_is_redacted() {
        let key = SessionKey::new([1; KEY_LEN], [2; KEY_LEN]);
        assert_eq!(format!("{key:?}"), "SessionKey { .. }");
    }
}
