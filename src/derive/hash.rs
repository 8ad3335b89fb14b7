//! String key → 32-bit seed.
//!
//! cyrb128 with its four lanes folded into a single word. Input is consumed
//! as UTF-16 code units so a browser running the same mixer on
//! `charCodeAt` produces the same seed.

const M1: u32 = 597_399_067;
const M2: u32 = 2_869_860_233;
const M3: u32 = 951_274_213;
const M4: u32 = 2_716_044_179;

/// Hash an arbitrary key into a seed
pub fn seed_hash(key: &str) -> u32 {
    let mut h1: u32 = 1_779_033_703;
    let mut h2: u32 = 3_144_134_277;
    let mut h3: u32 = 1_013_904_242;
    let mut h4: u32 = 2_773_480_762;

    for unit in key.encode_utf16() {
        let k = unit as u32;
        h1 = h2 ^ (h1 ^ k).wrapping_mul(M1);
        h2 = h3 ^ (h2 ^ k).wrapping_mul(M2);
        h3 = h4 ^ (h3 ^ k).wrapping_mul(M3);
        h4 = h1 ^ (h4 ^ k).wrapping_mul(M4);
    }

    h1 = (h3 ^ (h1 >> 18)).wrapping_mul(M1);
    h2 = (h4 ^ (h2 >> 22)).wrapping_mul(M2);
    h3 = (h1 ^ (h3 >> 17)).wrapping_mul(M3);
    h4 = (h2 ^ (h4 >> 19)).wrapping_mul(M4);

    h1 ^ h2 ^ h3 ^ h4
}
