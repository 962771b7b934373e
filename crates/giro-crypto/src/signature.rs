//! ECDSA signature operations using secp256k1

use crate::{keccak256, CryptoError};
use giro_primitives::{Address, H256};
use k256::ecdsa::{RecoveryId, Signature as K256Signature, SigningKey, VerifyingKey};

/// Half of the secp256k1 curve order (n/2)
/// n   = 0xFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141
/// n/2 = 0x7FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF5D576E7357A4501DDFE92F46681B20A0
const SECP256K1_N_DIV_2: [u8; 32] = [
    0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0x5D, 0x57, 0x6E, 0x73, 0x57, 0xA4, 0x50, 0x1D,
    0xDF, 0xE9, 0x2F, 0x46, 0x68, 0x1B, 0x20, 0xA0,
];

/// Full secp256k1 curve order (n)
const SECP256K1_N: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE,
    0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B,
    0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36, 0x41, 0x41,
];

/// Length of a compressed SEC1 public key
pub const COMPRESSED_PUBKEY_LEN: usize = 33;

/// ECDSA signature with recovery ID.
///
/// The wire format everywhere (votes, mint commands, destination calls) is
/// the 65-byte `r || s || v` layout with `v` stored as 27/28.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    /// r component (32 bytes)
    pub r: [u8; 32],
    /// s component (32 bytes)
    pub s: [u8; 32],
    /// recovery id (0 or 1, stored as 27 or 28 for Ethereum compatibility)
    pub v: u8,
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Signature(r=0x{}, s=0x{}, v={})",
            hex::encode(self.r),
            hex::encode(self.s),
            self.v
        )
    }
}

/// Public key (secp256k1 verifying key)
pub type PublicKey = VerifyingKey;

/// Private key (secp256k1 signing key)
pub type PrivateKey = SigningKey;

impl Signature {
    /// Create a signature from r, s, v components
    pub fn new(r: [u8; 32], s: [u8; 32], v: u8) -> Self {
        Signature { r, s, v }
    }

    /// Get the recovery ID (0 or 1), accepting both raw and 27/28 forms
    pub fn recovery_id(&self) -> u8 {
        if self.v >= 27 {
            self.v - 27
        } else {
            self.v
        }
    }

    /// Normalized `v` in the 27/28 form destination contracts expect
    pub fn v_normalized(&self) -> u8 {
        self.recovery_id() + 27
    }

    /// Convert to the 65-byte representation (r || s || v), v as 27/28
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut bytes = [0u8; 65];
        bytes[..32].copy_from_slice(&self.r);
        bytes[32..64].copy_from_slice(&self.s);
        bytes[64] = self.v_normalized();
        bytes
    }

    /// Parse from the 65-byte representation
    pub fn from_bytes(bytes: &[u8; 65]) -> Self {
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Signature { r, s, v: bytes[64] }
    }

    /// Parse from a slice, rejecting anything but 65 bytes
    pub fn from_slice(slice: &[u8]) -> Result<Self, CryptoError> {
        let arr: &[u8; 65] = slice
            .try_into()
            .map_err(|_| CryptoError::InvalidSignature(format!("expected 65 bytes, got {}", slice.len())))?;
        Ok(Self::from_bytes(arr))
    }

    /// Check if the signature has a low-s value (EIP-2 compliant)
    pub fn is_low_s(&self) -> bool {
        compare_bytes(&self.s, &SECP256K1_N_DIV_2) != std::cmp::Ordering::Greater
    }
}

/// Compare two 32-byte arrays as big-endian integers
fn compare_bytes(a: &[u8; 32], b: &[u8; 32]) -> std::cmp::Ordering {
    for i in 0..32 {
        match a[i].cmp(&b[i]) {
            std::cmp::Ordering::Equal => continue,
            other => return other,
        }
    }
    std::cmp::Ordering::Equal
}

/// Subtract s from the secp256k1 order: s' = n - s
fn subtract_from_n(s: &[u8; 32]) -> [u8; 32] {
    let mut result = [0u8; 32];
    let mut borrow: u16 = 0;

    for i in (0..32).rev() {
        let diff = (SECP256K1_N[i] as u16)
            .wrapping_sub(s[i] as u16)
            .wrapping_sub(borrow);
        result[i] = diff as u8;
        borrow = if diff > 255 { 1 } else { 0 };
    }

    result
}

/// Sign a message hash with a private key (low-s normalized per EIP-2)
pub fn sign(message_hash: &H256, private_key: &PrivateKey) -> Result<Signature, CryptoError> {
    let (signature, mut recovery_id) = private_key
        .sign_prehash_recoverable(message_hash.as_bytes())
        .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;

    let r_bytes: [u8; 32] = signature.r().to_bytes().into();
    let mut s_bytes: [u8; 32] = signature.s().to_bytes().into();

    // EIP-2: if s > n/2, replace s with n - s and flip the recovery id
    if compare_bytes(&s_bytes, &SECP256K1_N_DIV_2) == std::cmp::Ordering::Greater {
        s_bytes = subtract_from_n(&s_bytes);
        recovery_id = RecoveryId::try_from(recovery_id.to_byte() ^ 1).map_err(|_| {
            CryptoError::SigningFailed("invalid recovery id after normalization".to_string())
        })?;
    }

    Ok(Signature {
        r: r_bytes,
        s: s_bytes,
        v: recovery_id.to_byte() + 27,
    })
}

/// Verify a signature against a message hash and public key
pub fn verify(
    message_hash: &H256,
    signature: &Signature,
    public_key: &PublicKey,
) -> Result<bool, CryptoError> {
    // Reject non-low-s signatures per EIP-2
    if !signature.is_low_s() {
        return Ok(false);
    }

    let r: k256::FieldBytes = signature.r.into();
    let s: k256::FieldBytes = signature.s.into();
    let k256_sig = K256Signature::from_scalars(r, s)
        .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;

    use k256::ecdsa::signature::hazmat::PrehashVerifier;
    Ok(public_key
        .verify_prehash(message_hash.as_bytes(), &k256_sig)
        .is_ok())
}

/// Recover the public key from a signature and message hash
pub fn recover_public_key(
    message_hash: &H256,
    signature: &Signature,
) -> Result<PublicKey, CryptoError> {
    let r: k256::FieldBytes = signature.r.into();
    let s: k256::FieldBytes = signature.s.into();
    let k256_sig = K256Signature::from_scalars(r, s)
        .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;

    let recovery_id = RecoveryId::try_from(signature.recovery_id())
        .map_err(|_| CryptoError::InvalidRecoveryId(signature.recovery_id()))?;

    VerifyingKey::recover_from_prehash(message_hash.as_bytes(), &k256_sig, recovery_id)
        .map_err(|e| CryptoError::RecoveryFailed(e.to_string()))
}

/// Recover the signer address directly.
///
/// This is the verification primitive both the hub and destination ledgers
/// use: recover, derive the address, compare against the registered set.
pub fn recover_signer(message_hash: &H256, signature: &Signature) -> Result<Address, CryptoError> {
    let pubkey = recover_public_key(message_hash, signature)?;
    Ok(public_key_to_address(&pubkey))
}

/// Derive the Ethereum-style address from a public key
pub fn public_key_to_address(public_key: &PublicKey) -> Address {
    // Uncompressed key is 65 bytes: 0x04 || x || y; hash the 64-byte tail
    let encoded = public_key.to_encoded_point(false);
    let hash = keccak256(&encoded.as_bytes()[1..]);

    let mut addr_bytes = [0u8; 20];
    addr_bytes.copy_from_slice(&hash.as_bytes()[12..]);
    Address::from_bytes(addr_bytes)
}

/// Encode a public key as 33-byte compressed SEC1 (the registry format)
pub fn encode_pubkey(public_key: &PublicKey) -> [u8; 33] {
    let point = public_key.to_encoded_point(true);
    let mut out = [0u8; 33];
    out.copy_from_slice(point.as_bytes());
    out
}

/// Decode a public key from compressed SEC1 bytes
pub fn decode_pubkey(bytes: &[u8]) -> Result<PublicKey, CryptoError> {
    VerifyingKey::from_sec1_bytes(bytes)
        .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
}
