//! Ed25519 group operations in extended twisted-Edwards coordinates.
//!
//! A point (X:Y:Z:T) maps to affine (X/Z, Y/Z) with T = XY/Z. Scalar
//! multiplication is plain LSB-first double-and-add; vanity search reveals
//! the public key anyway, so no timing discipline applies.

use super::fe::Fe;

/// Base point x coordinate, little-endian.
const BASE_X: [u8; 32] = [
    0x1a, 0xd5, 0x25, 0x8f, 0x60, 0x2d, 0x56, 0xc9, 0xb2, 0xa7, 0x25, 0x95, 0x60, 0xc7, 0x2c,
    0x69, 0x5c, 0xdc, 0xd6, 0xfd, 0x31, 0xe2, 0xa4, 0xc0, 0xfe, 0x53, 0x6e, 0xcd, 0xd3, 0x36,
    0x69, 0x21,
];

/// Base point y coordinate (4/5 mod p), little-endian.
const BASE_Y: [u8; 32] = [
    0x58, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66,
    0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66,
    0x66, 0x66,
];

/// Curve constant d = -121665/121666 mod p, little-endian.
#[allow(dead_code)]
const D: [u8; 32] = [
    0xa3, 0x78, 0x59, 0x13, 0xca, 0x4d, 0xeb, 0x75, 0xab, 0xd8, 0x41, 0x41, 0x4d, 0x0a, 0x70,
    0x00, 0x98, 0xe8, 0x79, 0x77, 0x79, 0x40, 0xc7, 0x8c, 0x73, 0xfe, 0x6f, 0x2b, 0xee, 0x6c,
    0x03, 0x52,
];

/// 2d mod p, little-endian.
const D2: [u8; 32] = [
    0x59, 0xf1, 0xb2, 0x26, 0x94, 0x9b, 0xd6, 0xeb, 0x56, 0xb1, 0x83, 0x82, 0x9a, 0x14, 0xe0,
    0x00, 0x30, 0xd1, 0xf3, 0xee, 0xf2, 0x80, 0x8e, 0x19, 0xe7, 0xfc, 0xdf, 0x56, 0xdc, 0xd9,
    0x06, 0x24,
];

#[derive(Clone, Copy)]
pub struct Ge {
    x: Fe,
    y: Fe,
    z: Fe,
    t: Fe,
}

impl Ge {
    pub fn identity() -> Ge {
        Ge {
            x: Fe::ZERO,
            y: Fe::ONE,
            z: Fe::ONE,
            t: Fe::ZERO,
        }
    }

    pub fn basepoint() -> Ge {
        let x = Fe::from_bytes(&BASE_X);
        let y = Fe::from_bytes(&BASE_Y);
        Ge {
            x,
            y,
            z: Fe::ONE,
            t: x.mul(&y),
        }
    }

    #[cfg(test)]
    pub(crate) fn curve_d() -> Fe {
        Fe::from_bytes(&D)
    }

    pub fn double(&self) -> Ge {
        let a = self.x.square();
        let b = self.y.square();
        let zz = self.z.square();
        let c = zz.add(&zz);
        let e = self.x.add(&self.y).square().sub(&a).sub(&b);
        let g = b.sub(&a);
        let f = c.sub(&g);
        let h = a.add(&b);
        Ge {
            x: e.mul(&f),
            y: h.mul(&g),
            z: f.mul(&g),
            t: e.mul(&h),
        }
    }

    pub fn add(&self, q: &Ge) -> Ge {
        let d2 = Fe::from_bytes(&D2);
        let a = self.y.sub(&self.x).mul(&q.y.sub(&q.x));
        let b = self.y.add(&self.x).mul(&q.y.add(&q.x));
        let c = self.t.mul(&q.t).mul(&d2);
        let d = self.z.mul(&q.z);
        let d = d.add(&d);
        let e = b.sub(&a);
        let f = d.sub(&c);
        let g = d.add(&c);
        let h = b.add(&a);
        Ge {
            x: e.mul(&f),
            y: g.mul(&h),
            z: f.mul(&g),
            t: e.mul(&h),
        }
    }

    /// scalar * G over the 256 scalar bits, least significant first.
    pub fn scalarmult_base(scalar: &[u8; 32]) -> Ge {
        let mut r = Ge::identity();
        let mut q = Ge::basepoint();
        for i in 0..256 {
            if (scalar[i >> 3] >> (i & 7)) & 1 == 1 {
                r = r.add(&q);
            }
            q = q.double();
        }
        r
    }

    /// (y, sign(x)) encoding: y bytes with sign(x) in bit 7 of byte 31.
    pub fn compress(&self) -> [u8; 32] {
        let zinv = self.z.invert();
        let x = self.x.mul(&zinv);
        let y = self.y.mul(&zinv);
        let mut bytes = y.to_bytes();
        bytes[31] ^= (x.is_negative() as u8) << 7;
        bytes
    }
}
