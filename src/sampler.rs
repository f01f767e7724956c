// =============================================================================
// sampler.rs — THE ROULETTE WHEEL
// =============================================================================
//
// Weighted random sampling without replacement, A-ES flavor
// (Efraimidis & Spirakis, "Weighted random sampling with a reservoir", 2006).
//
// The naive way to pick k things by weight without repeats is to draw one,
// remove it, renormalize, draw again, k times over. A-ES does it in a single
// pass instead:
//
//   1. For every item i draw u_i uniformly from the open interval (0, 1).
//   2. Compute its priority key v_i = u_i ^ (1 / w_i).
//   3. Keep the k items with the largest keys.
//
// Heavier items raise u to a smaller power, which drags their key towards 1,
// so they tend to float to the top. The resulting distribution is the same as
// the draw-remove-renormalize dance.
//
// Weights <= 0 are treated as 1 when computing the key. A zero weight would
// mean 1/0 in the exponent, and a negative one flips the exponent's sign so
// that u^(1/w) > 1 and the item beats every positively weighted item. Weight 1
// gives those items a plain, neutral key instead. The caller's weights are
// never touched.
//
// Output is ordered by ascending key: the single most favored pick comes LAST.
// =============================================================================

use rand::distributions::{Distribution, Open01};
use rand::Rng;
use thiserror::Error;
use tracing::warn;

/// Reasons a sampling request is refused. Each one is checked before a single
/// random number is drawn.
#[derive(Debug, Error, PartialEq)]
pub enum SampleError {
    #[error("population must not be empty")]
    EmptyPopulation,

    #[error("weights must not be empty")]
    EmptyWeights,

    #[error("sample size must be a positive integer greater than zero")]
    ZeroSampleSize,

    #[error("population and weights must be equal length (population: {population}, weights: {weights})")]
    LengthMismatch { population: usize, weights: usize },

    #[error("weight #{index} ({weight}) is not a whole number")]
    NonIntegerWeight { index: usize, weight: f64 },
}

/// Draw `k` distinct items from `population`, biased by `weights`, using a
/// caller-supplied generator.
///
/// `weights[i]` belongs to `population[i]` and must be a whole number; values
/// `<= 0` count as 1. Returns `min(k, population.len())` items ordered by
/// ascending priority key, so the item the wheel liked best is last. Asking
/// for more items than there are returns all of them in weighted random order.
pub fn sample_with_rng<T, R>(
    population: &[T],
    weights: &[f64],
    k: usize,
    rng: &mut R,
) -> Result<Vec<T>, SampleError>
where
    T: Clone,
    R: Rng + ?Sized,
{
    validate(population.len(), weights, k)?;

    let mut keyed: Vec<(f64, usize)> = weights
        .iter()
        .enumerate()
        .map(|(index, &weight)| {
            let u: f64 = Open01.sample(&mut *rng);
            (priority_key(u, weight), index)
        })
        .collect();

    let n = keyed.len();
    let take = k.min(n);
    if take < k {
        warn!(requested = k, available = n, "Sample size exceeds population, returning everything");
    }

    // Partition so the `take` largest keys sit at the tail, then order just
    // those. No need to sort the whole population.
    let by_key = |a: &(f64, usize), b: &(f64, usize)| a.0.total_cmp(&b.0);
    let split = n - take;
    if split > 0 {
        keyed.select_nth_unstable_by(split, by_key);
    }
    let top = &mut keyed[split..];
    top.sort_unstable_by(by_key);

    Ok(top.iter().map(|&(_, index)| population[index].clone()).collect())
}

/// The A-ES priority key for a uniform draw `u` in (0, 1) and a weight.
fn priority_key(u: f64, weight: f64) -> f64 {
    let weight = if weight <= 0.0 { 1.0 } else { weight };
    u.powf(weight.recip())
}

fn validate(population: usize, weights: &[f64], k: usize) -> Result<(), SampleError> {
    if population == 0 {
        return Err(SampleError::EmptyPopulation);
    }
    if weights.is_empty() {
        return Err(SampleError::EmptyWeights);
    }
    if k == 0 {
        return Err(SampleError::ZeroSampleSize);
    }
    if population != weights.len() {
        return Err(SampleError::LengthMismatch {
            population,
            weights: weights.len(),
        });
    }
    if let Some((index, &weight)) = weights
        .iter()
        .enumerate()
        .find(|(_, w)| !w.is_finite() || w.fract() != 0.0)
    {
        return Err(SampleError::NonIntegerWeight { index, weight });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};
    use std::collections::HashSet;
    use std::io;
    use std::sync::{Arc, Mutex};

    fn sample<T: Clone>(population: &[T], weights: &[f64], k: usize) -> Result<Vec<T>, SampleError> {
        sample_with_rng(population, weights, k, &mut StdRng::seed_from_u64(0))
    }

    fn one_to_nine() -> (Vec<u32>, Vec<f64>) {
        let population: Vec<u32> = (1..10).collect();
        let weights = population.iter().map(|&i| f64::from(i)).collect();
        (population, weights)
    }

    #[test]
    fn test_sample_size_and_membership() {
        let (population, weights) = one_to_nine();
        let mut rng = StdRng::seed_from_u64(1);
        for k in 1..=population.len() {
            let picked = sample_with_rng(&population, &weights, k, &mut rng).unwrap();
            assert_eq!(picked.len(), k);
            assert!(picked.iter().all(|p| population.contains(p)));
            let unique: HashSet<_> = picked.iter().collect();
            assert_eq!(unique.len(), k, "duplicate in {picked:?}");
        }
    }

    #[test]
    fn test_works_through_a_trait_object() {
        let (population, weights) = one_to_nine();
        let mut rng: Box<dyn RngCore> = Box::new(rand::thread_rng());
        let picked = sample_with_rng(&population, &weights, 5, &mut *rng).unwrap();
        assert_eq!(picked.len(), 5);
    }

    #[test]
    fn test_k_equal_to_population_returns_everything() {
        let (population, weights) = one_to_nine();
        let picked = sample(&population, &weights, population.len()).unwrap();
        let got: HashSet<_> = picked.into_iter().collect();
        let want: HashSet<_> = population.into_iter().collect();
        assert_eq!(got, want);
    }

    #[test]
    fn test_large_k_returns_everything() {
        let (population, weights) = one_to_nine();
        let picked = sample(&population, &weights, 5000).unwrap();
        assert_eq!(picked.len(), population.len());
        let got: HashSet<_> = picked.into_iter().collect();
        assert_eq!(got.len(), population.len());
    }

    /// Collects whatever the fmt subscriber writes.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn warnings_while(f: impl FnOnce()) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_shortfall_is_a_warning() {
        let (population, weights) = one_to_nine();

        let logged = warnings_while(|| {
            sample(&population, &weights, 50).unwrap();
        });
        assert!(logged.contains("WARN"), "got: {logged:?}");
        assert!(logged.contains("Sample size exceeds population"));
        assert!(logged.contains("requested=50"));
        assert!(logged.contains("available=9"));

        let quiet = warnings_while(|| {
            sample(&population, &weights, 9).unwrap();
        });
        assert!(quiet.is_empty(), "got: {quiet:?}");
    }

    #[test]
    fn test_output_is_ascending_by_key() {
        let (population, weights) = one_to_nine();
        let seed = 42;

        // Replay the exact draws the sampler will make.
        let mut replay = StdRng::seed_from_u64(seed);
        let mut expected: Vec<(f64, u32)> = population
            .iter()
            .zip(&weights)
            .map(|(&item, &w)| {
                let u: f64 = Open01.sample(&mut replay);
                (priority_key(u, w), item)
            })
            .collect();
        expected.sort_by(|a, b| a.0.total_cmp(&b.0));
        let expected_top3: Vec<u32> = expected[expected.len() - 3..].iter().map(|&(_, i)| i).collect();

        let mut rng = StdRng::seed_from_u64(seed);
        let picked = sample_with_rng(&population, &weights, 3, &mut rng).unwrap();
        assert_eq!(picked, expected_top3);
    }

    #[test]
    fn test_same_seed_same_sample() {
        let (population, weights) = one_to_nine();
        let a = sample_with_rng(&population, &weights, 4, &mut StdRng::seed_from_u64(9)).unwrap();
        let b = sample_with_rng(&population, &weights, 4, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_population() {
        let (_, weights) = one_to_nine();
        let empty: Vec<u32> = vec![];
        assert_eq!(sample(&empty, &weights, 1), Err(SampleError::EmptyPopulation));
    }

    #[test]
    fn test_empty_weights() {
        let (population, _) = one_to_nine();
        assert_eq!(sample(&population, &[], 5), Err(SampleError::EmptyWeights));
    }

    #[test]
    fn test_zero_k() {
        let (population, weights) = one_to_nine();
        assert_eq!(sample(&population, &weights, 0), Err(SampleError::ZeroSampleSize));
    }

    #[test]
    fn test_length_mismatch() {
        assert_eq!(
            sample(&["a", "b"], &[1.0], 1),
            Err(SampleError::LengthMismatch { population: 2, weights: 1 })
        );
    }

    #[test]
    fn test_fractional_weight_is_rejected() {
        assert_eq!(
            sample(&["a", "b"], &[1.0, 2.5], 1),
            Err(SampleError::NonIntegerWeight { index: 1, weight: 2.5 })
        );
        assert!(matches!(
            sample(&["a"], &[f64::NAN], 1),
            Err(SampleError::NonIntegerWeight { index: 0, .. })
        ));
        assert!(matches!(
            sample(&["a"], &[f64::INFINITY], 1),
            Err(SampleError::NonIntegerWeight { index: 0, .. })
        ));
    }

    #[test]
    fn test_nonpositive_weights_get_a_neutral_key() {
        assert_eq!(priority_key(0.25, 0.0), 0.25);
        assert_eq!(priority_key(0.25, -5.0), 0.25);
        assert_eq!(priority_key(0.25, 1.0), 0.25);
        assert!((priority_key(0.25, 2.0) - 0.5).abs() < 1e-12);
        assert!(priority_key(0.25, -5.0) < 1.0);
    }

    #[test]
    fn test_all_nonpositive_weights_are_uniform() {
        let population = ["a", "b", "c", "d"];
        let weights = [0.0, -3.0, -100.0, 0.0];
        let mut rng = StdRng::seed_from_u64(2024);
        let trials = 20_000;
        let mut counts = [0usize; 4];
        for _ in 0..trials {
            let picked = sample_with_rng(&population, &weights, 1, &mut rng).unwrap();
            let index = population.iter().position(|p| *p == picked[0]).unwrap();
            counts[index] += 1;
        }
        // Expect ~5000 each; the standard deviation is ~61.
        for count in counts {
            assert!((4_500..=5_500).contains(&count), "counts were {counts:?}");
        }
    }

    #[test]
    fn test_negative_weight_does_not_dominate() {
        let population = ["heavy", "negative"];
        let weights = [1_000_000.0, -5.0];
        let mut rng = StdRng::seed_from_u64(77);
        let trials = 10_000;
        let heavy = (0..trials)
            .filter(|_| sample_with_rng(&population, &weights, 1, &mut rng).unwrap()[0] == "heavy")
            .count();
        // The negative item should win about once in a million draws.
        assert!(heavy >= trials - 10, "heavy won only {heavy}/{trials}");
    }

    #[test]
    fn test_weights_bias_selection() {
        let population = ["light", "heavy"];
        let weights = [1.0, 9.0];
        let mut rng = StdRng::seed_from_u64(5);
        let trials = 10_000;
        let heavy = (0..trials)
            .filter(|_| sample_with_rng(&population, &weights, 1, &mut rng).unwrap()[0] == "heavy")
            .count();
        let share = heavy as f64 / trials as f64;
        assert!((0.87..=0.93).contains(&share), "heavy share was {share}");
    }

    #[test]
    fn test_favorite_comes_last() {
        // With k = 2 from {light, heavy}, the heavy one should usually be last.
        let population = ["light", "heavy"];
        let weights = [1.0, 1_000.0];
        let mut rng = StdRng::seed_from_u64(11);
        let last_is_heavy = (0..1_000)
            .filter(|_| sample_with_rng(&population, &weights, 2, &mut rng).unwrap()[1] == "heavy")
            .count();
        assert!(last_is_heavy > 990, "heavy last only {last_is_heavy}/1000");
    }
}
