//! The portable search kernel: one attempt per work-item.
//!
//! This module is the CPU-side twin of the WGSL kernel in `shaders/`; both
//! derive the same seed, key, and address bytes for a given (host seed,
//! work-item) pair.

pub mod base58;
pub mod fe;
pub mod ge;
pub mod rng;
pub mod sha512;

use base58::MAX_ENCODED_LEN;
use ge::Ge;
use rng::Xorshift128Plus;

/// One derived keypair candidate.
pub struct Candidate {
    pub seed: [u8; 32],
    pub public_key: [u8; 32],
    address: [u8; MAX_ENCODED_LEN],
    address_len: usize,
}

impl Candidate {
    pub fn address(&self) -> &[u8] {
        &self.address[..self.address_len]
    }
}

/// Restrict a hash half to the Ed25519 scalar subgroup.
pub fn clamp(mut scalar: [u8; 32]) -> [u8; 32] {
    scalar[0] &= 248;
    scalar[31] &= 127;
    scalar[31] |= 64;
    scalar
}

/// seed -> SHA-512 -> clamp -> scalar*G -> compressed point.
pub fn derive_public_key(seed: &[u8; 32]) -> [u8; 32] {
    let hash = sha512::digest32(seed);
    let scalar = clamp(hash[..32].try_into().expect("32-byte hash half"));
    Ge::scalarmult_base(&scalar).compress()
}

/// Run the full per-work-item pipeline for one attempt.
pub fn candidate(host_seed: [u64; 2], work_item: u32) -> Candidate {
    let mut rng = Xorshift128Plus::for_work_item(host_seed, work_item);
    let seed = rng.seed_bytes();
    let public_key = derive_public_key(&seed);
    let mut address = [0u8; MAX_ENCODED_LEN];
    let address_len = base58::encode_32(&public_key, &mut address);
    Candidate {
        seed,
        public_key,
        address,
        address_len,
    }
}

/// The 64-byte wallet-file form: seed followed by the compressed public key.
pub fn keypair_bytes(seed: &[u8; 32], public_key: &[u8; 32]) -> [u8; 64] {
    let mut out = [0u8; 64];
    out[..32].copy_from_slice(seed);
    out[32..].copy_from_slice(public_key);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;

    // RFC 8032 §7.1 vectors 1-3: (seed, public key)
    const RFC8032: [(&str, &str); 3] = [
        (
            "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60",
            "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a",
        ),
        (
            "4ccd089b28ff96da9db6c346ec114e0f5b8a319f35aba624da8cf6ed4fb8a6fb",
            "3d4017c3e843895a92b70aa74d1b7ebc9c982ccf2ec4968cc0cd55f12af4660c",
        ),
        (
            "c5aa8df43f9f837bedb7442f31dcb7b166d38535076f094b85ce3a2e0b4458f7",
            "fc51cd8e6218a1a38da47ed00230f0580816ed13ba3303ac5deb911548908025",
        ),
    ];

    fn seed_from_hex(s: &str) -> [u8; 32] {
        hex::decode(s).unwrap().try_into().unwrap()
    }

    #[test]
    fn rfc8032_public_keys() {
        for (seed_hex, pk_hex) in RFC8032 {
            let seed = seed_from_hex(seed_hex);
            let expected = seed_from_hex(pk_hex);
            assert_eq!(derive_public_key(&seed), expected);
        }
    }

    #[test]
    fn rfc8032_vector_one_address_matches_reference_encoder() {
        let seed = seed_from_hex(RFC8032[0].0);
        let pk = derive_public_key(&seed);
        let mut buf = [0u8; MAX_ENCODED_LEN];
        let len = base58::encode_32(&pk, &mut buf);
        assert_eq!(
            std::str::from_utf8(&buf[..len]).unwrap(),
            bs58::encode(&pk).into_string()
        );
    }

    #[test]
    fn matches_dalek_on_arbitrary_seeds() {
        let mut seed = [0u8; 32];
        for round in 0u8..16 {
            for (i, b) in seed.iter_mut().enumerate() {
                *b = (i as u8).wrapping_mul(41) ^ round.wrapping_mul(0x6d);
            }
            let expected = SigningKey::from_bytes(&seed).verifying_key().to_bytes();
            assert_eq!(derive_public_key(&seed), expected, "round {round}");
        }
    }

    #[test]
    fn clamping_law() {
        let mut rng = Xorshift128Plus::for_work_item([3, 17], 99);
        for _ in 0..64 {
            let seed = rng.seed_bytes();
            let hash = sha512::digest32(&seed);
            let scalar = clamp(hash[..32].try_into().unwrap());
            assert_eq!(scalar[0] & 7, 0);
            assert_eq!(scalar[31] & 0xc0, 0x40);
        }
    }

    #[test]
    fn candidate_is_deterministic_and_consistent() {
        let a = candidate([11, 22], 333);
        let b = candidate([11, 22], 333);
        assert_eq!(a.seed, b.seed);
        assert_eq!(a.public_key, b.public_key);
        assert_eq!(a.address(), b.address());
        // the address is the Base58 form of the key
        assert_eq!(
            std::str::from_utf8(a.address()).unwrap(),
            bs58::encode(&a.public_key).into_string()
        );
        // and the key re-derives from the seed
        assert_eq!(derive_public_key(&a.seed), a.public_key);
    }

    #[test]
    fn keypair_layout_is_seed_then_public_key() {
        let c = candidate([5, 6], 7);
        let kp = keypair_bytes(&c.seed, &c.public_key);
        assert_eq!(&kp[..32], &c.seed);
        assert_eq!(&kp[32..], &c.public_key);
    }
}
