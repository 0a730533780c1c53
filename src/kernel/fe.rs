//! Arithmetic in GF(2^255 - 19), five 51-bit limbs over u64.
//!
//! Limbs are kept weakly reduced: after any public operation each limb is
//! below 2^52. Only `to_bytes` produces the canonical representative.

const MASK: u64 = (1 << 51) - 1;

#[derive(Clone, Copy, Debug)]
pub struct Fe(pub(crate) [u64; 5]);

impl Fe {
    pub const ZERO: Fe = Fe([0, 0, 0, 0, 0]);
    pub const ONE: Fe = Fe([1, 0, 0, 0, 0]);

    /// Load a 32-byte little-endian field element. Bit 255 is ignored.
    pub fn from_bytes(bytes: &[u8; 32]) -> Fe {
        let load8 = |s: &[u8]| u64::from_le_bytes(s[..8].try_into().expect("8-byte window"));
        Fe([
            load8(&bytes[0..]) & MASK,
            (load8(&bytes[6..]) >> 3) & MASK,
            (load8(&bytes[12..]) >> 6) & MASK,
            (load8(&bytes[19..]) >> 1) & MASK,
            (load8(&bytes[24..]) >> 12) & MASK,
        ])
    }

    /// Serialize the canonical representative, little-endian.
    pub fn to_bytes(&self) -> [u8; 32] {
        let mut h = self.reduce().0;

        // h is now below 2^255; fold in +19 once to detect h >= p.
        let mut q = (h[0] + 19) >> 51;
        q = (h[1] + q) >> 51;
        q = (h[2] + q) >> 51;
        q = (h[3] + q) >> 51;
        q = (h[4] + q) >> 51;

        h[0] += 19 * q;
        let mut carry = h[0] >> 51;
        h[0] &= MASK;
        h[1] += carry;
        carry = h[1] >> 51;
        h[1] &= MASK;
        h[2] += carry;
        carry = h[2] >> 51;
        h[2] &= MASK;
        h[3] += carry;
        carry = h[3] >> 51;
        h[3] &= MASK;
        h[4] += carry;
        h[4] &= MASK;

        let mut out = [0u8; 32];
        out[0..8].copy_from_slice(&(h[0] | (h[1] << 51)).to_le_bytes());
        out[8..16].copy_from_slice(&((h[1] >> 13) | (h[2] << 38)).to_le_bytes());
        out[16..24].copy_from_slice(&((h[2] >> 26) | (h[3] << 25)).to_le_bytes());
        out[24..32].copy_from_slice(&((h[3] >> 39) | (h[4] << 12)).to_le_bytes());
        out
    }

    /// Weak reduction: carries propagated, the 2^255 overflow folded back as *19.
    pub fn reduce(&self) -> Fe {
        let mut l = self.0;
        let mut c = l[0] >> 51;
        l[0] &= MASK;
        l[1] += c;
        c = l[1] >> 51;
        l[1] &= MASK;
        l[2] += c;
        c = l[2] >> 51;
        l[2] &= MASK;
        l[3] += c;
        c = l[3] >> 51;
        l[3] &= MASK;
        l[4] += c;
        c = l[4] >> 51;
        l[4] &= MASK;
        l[0] += c * 19;
        c = l[0] >> 51;
        l[0] &= MASK;
        l[1] += c;
        Fe(l)
    }

    pub fn add(&self, rhs: &Fe) -> Fe {
        let a = &self.0;
        let b = &rhs.0;
        Fe([a[0] + b[0], a[1] + b[1], a[2] + b[2], a[3] + b[3], a[4] + b[4]]).reduce()
    }

    /// a - b, biased by 16p so every lane stays non-negative.
    pub fn sub(&self, rhs: &Fe) -> Fe {
        const P16: [u64; 5] = [
            36028797018963664, // 16 * (2^51 - 19)
            36028797018963952, // 16 * (2^51 - 1)
            36028797018963952,
            36028797018963952,
            36028797018963952,
        ];
        let a = &self.0;
        let b = &rhs.0;
        Fe([
            a[0] + P16[0] - b[0],
            a[1] + P16[1] - b[1],
            a[2] + P16[2] - b[2],
            a[3] + P16[3] - b[3],
            a[4] + P16[4] - b[4],
        ])
        .reduce()
    }

    pub fn mul(&self, rhs: &Fe) -> Fe {
        let a = &self.0;
        let b = &rhs.0;
        let m = |x: u64, y: u64| (x as u128) * (y as u128);

        let b1_19 = b[1] * 19;
        let b2_19 = b[2] * 19;
        let b3_19 = b[3] * 19;
        let b4_19 = b[4] * 19;

        // Schoolbook cross-products, 2^255 = 19 folding the high half down.
        let mut c0 = m(a[0], b[0]) + m(a[4], b1_19) + m(a[3], b2_19) + m(a[2], b3_19) + m(a[1], b4_19);
        let mut c1 = m(a[1], b[0]) + m(a[0], b[1]) + m(a[4], b2_19) + m(a[3], b3_19) + m(a[2], b4_19);
        let mut c2 = m(a[2], b[0]) + m(a[1], b[1]) + m(a[0], b[2]) + m(a[4], b3_19) + m(a[3], b4_19);
        let mut c3 = m(a[3], b[0]) + m(a[2], b[1]) + m(a[1], b[2]) + m(a[0], b[3]) + m(a[4], b4_19);
        let mut c4 = m(a[4], b[0]) + m(a[3], b[1]) + m(a[2], b[2]) + m(a[1], b[3]) + m(a[0], b[4]);

        let mut out = [0u64; 5];
        c1 += (c0 >> 51) as u64 as u128;
        out[0] = (c0 as u64) & MASK;
        c2 += (c1 >> 51) as u64 as u128;
        out[1] = (c1 as u64) & MASK;
        c3 += (c2 >> 51) as u64 as u128;
        out[2] = (c2 as u64) & MASK;
        c4 += (c3 >> 51) as u64 as u128;
        out[3] = (c3 as u64) & MASK;
        let carry = (c4 >> 51) as u64;
        out[4] = (c4 as u64) & MASK;

        out[0] += carry * 19;
        let carry = out[0] >> 51;
        out[0] &= MASK;
        out[1] += carry;
        Fe(out)
    }

    pub fn square(&self) -> Fe {
        let a = &self.0;
        let m = |x: u64, y: u64| (x as u128) * (y as u128);

        let a3_19 = a[3] * 19;
        let a4_19 = a[4] * 19;
        let d0 = a[0] * 2;
        let d1 = a[1] * 2;
        let d2 = a[2] * 2;
        let d3 = a[3] * 2;

        let mut c0 = m(a[0], a[0]) + m(d1, a4_19) + m(d2, a3_19);
        let mut c1 = m(d0, a[1]) + m(d2, a4_19) + m(a[3], a3_19);
        let mut c2 = m(d0, a[2]) + m(a[1], a[1]) + m(d3, a4_19);
        let mut c3 = m(d0, a[3]) + m(d1, a[2]) + m(a[4], a4_19);
        let mut c4 = m(d0, a[4]) + m(d1, a[3]) + m(a[2], a[2]);

        let mut out = [0u64; 5];
        c1 += (c0 >> 51) as u64 as u128;
        out[0] = (c0 as u64) & MASK;
        c2 += (c1 >> 51) as u64 as u128;
        out[1] = (c1 as u64) & MASK;
        c3 += (c2 >> 51) as u64 as u128;
        out[2] = (c2 as u64) & MASK;
        c4 += (c3 >> 51) as u64 as u128;
        out[3] = (c3 as u64) & MASK;
        let carry = (c4 >> 51) as u64;
        out[4] = (c4 as u64) & MASK;

        out[0] += carry * 19;
        let carry = out[0] >> 51;
        out[0] &= MASK;
        out[1] += carry;
        Fe(out)
    }

    fn pow2k(&self, k: u32) -> Fe {
        let mut t = *self;
        for _ in 0..k {
            t = t.square();
        }
        t
    }

    /// z^(p-2) by the standard ed25519 addition chain.
    pub fn invert(&self) -> Fe {
        let (t19, t3) = self.pow22501();
        t19.pow2k(5).mul(&t3) // 2^255 - 21
    }

    /// z^((p-5)/8) = z^(2^252 - 3), used where a square root is needed.
    #[allow(dead_code)]
    pub fn pow22523(&self) -> Fe {
        let (t19, _) = self.pow22501();
        t19.pow2k(2).mul(self)
    }

    // Returns (z^(2^250 - 1), z^11), the shared tail of both chains.
    fn pow22501(&self) -> (Fe, Fe) {
        let z2 = self.square();
        let z9 = z2.pow2k(2).mul(self);
        let z11 = z9.mul(&z2);
        let z_5_0 = z11.square().mul(&z9);
        let z_10_0 = z_5_0.pow2k(5).mul(&z_5_0);
        let z_20_0 = z_10_0.pow2k(10).mul(&z_10_0);
        let z_40_0 = z_20_0.pow2k(20).mul(&z_20_0);
        let z_50_0 = z_40_0.pow2k(10).mul(&z_10_0);
        let z_100_0 = z_50_0.pow2k(50).mul(&z_50_0);
        let z_200_0 = z_100_0.pow2k(100).mul(&z_100_0);
        let z_250_0 = z_200_0.pow2k(50).mul(&z_50_0);
        (z_250_0, z11)
    }

    /// Sign of the canonical representative (its low bit).
    pub fn is_negative(&self) -> bool {
        self.to_bytes()[0] & 1 == 1
    }
}
