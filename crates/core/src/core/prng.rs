// Minimal PRNG (no external crates).
//
// This is NOT cryptographically secure.
// It drives record id generation and the synthetic fallback classifier only.

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone)]
pub struct Prng {
    state: u64,
}

impl Prng {
    pub fn new(seed: u64) -> Self {
        // Avoid a zero state.
        let seed = if seed == 0 { 0x9E3779B97F4A7C15 } else { seed };
        Self { state: seed }
    }

    /// Seeded from the wall clock; distinct per process start.
    pub fn from_entropy() -> Self {
        let nanos = chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_default() as u64;
        Self::new(nanos ^ 0xD1B54A32D192ED03)
    }

    /// Derives an independent generator, advancing `self`.
    pub fn fork(&mut self) -> Prng {
        Prng::new(self.next_u64() ^ 0x94D049BB133111EB)
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        // xorshift64*
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    #[inline]
    pub fn next_f64_01(&mut self) -> f64 {
        // Convert to [0,1).
        let x = self.next_u32();
        (x as f64) / (u32::MAX as f64 + 1.0)
    }

    #[inline]
    pub fn gen_range_f64(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.next_f64_01()
    }

    #[inline]
    pub fn gen_range_usize(&mut self, low: usize, high: usize) -> usize {
        if high <= low {
            return low;
        }
        let span = (high - low) as u32;
        let v = self.next_u32() % span;
        low + v as usize
    }

    /// Lowercase base-36 token of `len` characters.
    pub fn base36(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| BASE36[self.gen_range_usize(0, BASE36.len())] as char)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = Prng::new(7);
        let mut b = Prng::new(7);
        for _ in 0..32 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn ranges_stay_in_bounds() {
        let mut p = Prng::new(0);
        for _ in 0..1000 {
            let f = p.gen_range_f64(0.85, 0.97);
            assert!((0.85..0.97).contains(&f));
            assert!(p.gen_range_usize(0, 4) < 4);
        }
        assert_eq!(p.gen_range_usize(3, 3), 3);
    }

    #[test]
    fn base36_tokens_have_requested_shape() {
        let mut p = Prng::new(42);
        let id = p.base36(9);
        assert_eq!(id.len(), 9);
        assert!(id.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert_ne!(id, p.base36(9));
    }
}
