//! # Summary
//!
//! The seeded shuffle used for role assignment. Every peer must
//! produce the bit-identical permutation from the same seed, so the
//! generator is hand-specified rather than drawn from `rand`: it is
//! the 48-bit linear congruential generator underlying
//! `java.util.Random` and its many reimplementations, whose bit
//! stream is a stable, documented contract rather than an
//! implementation detail that could drift between crate versions.

const MULTIPLIER: u64 = 0x5DEECE66D;
const INCREMENT: u64 = 0xB;
const MASK: u64 = (1 << 48) - 1;

struct Lcg {
    state: u64,
}

impl Lcg {
    fn seeded(seed: i64) -> Self {
        let seed = seed as u64;
        Lcg { state: (seed ^ MULTIPLIER) & MASK }
    }

    fn next_u32(&mut self) -> u32 {
        self.state = (self.state.wrapping_mul(MULTIPLIER).wrapping_add(INCREMENT)) & MASK;
        (self.state >> 16) as u32
    }
}

/// Deterministically permutes `ids` in place, seeded by `seed`. Equal
/// to producing a random key per element and sorting by `(key,
/// original_index)`, which is what makes the result reproducible
/// across peers that compute the same seed from the same input.
pub fn shuffle(ids: &mut Vec<i32>, seed: i64) {
    let mut rng = Lcg::seeded(seed);
    let mut keyed: Vec<(u32, usize, i32)> =
        ids.iter().enumerate().map(|(i, &id)| (rng.next_u32(), i, id)).collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
    *ids = keyed.into_iter().map(|(_, _, id)| id).collect();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shuffle_is_a_pure_function_of_the_seed() {
        let mut a = vec![101, 202, 303, 404, 505];
        let mut b = a.clone();
        shuffle(&mut a, 606);
        shuffle(&mut b, 606);
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_usually_produce_different_orders() {
        let base = vec![1, 2, 3, 4, 5, 6, 7, 8];
        let mut a = base.clone();
        let mut b = base.clone();
        shuffle(&mut a, 1);
        shuffle(&mut b, 2);
        assert_ne!(a, b);
    }

    #[test]
    fn shuffle_is_a_permutation_not_a_resample() {
        let mut a = vec![10, 20, 30, 40];
        let original = a.clone();
        shuffle(&mut a, 42);
        let mut sorted = a.clone();
        sorted.sort();
        let mut expected = original;
        expected.sort();
        assert_eq!(sorted, expected);
    }
}
