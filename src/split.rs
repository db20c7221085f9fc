use log::info;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::check_test_fraction;
use crate::error::Result;
use crate::sampler::take_slots;
use crate::types::{Sample, SampleSet, SplitName};

/// Number of samples that land in the training set: `floor(n * (1 - f))`.
pub fn split_point(n: usize, test_fraction: f64) -> usize {
    ((n as f64 * (1.0 - test_fraction)).floor() as usize).min(n)
}

/// Shuffle `0..n` and cut it into training and testing index lists.
pub fn split_indices<R: Rng + ?Sized>(
    n: usize,
    test_fraction: f64,
    rng: &mut R,
) -> Result<(Vec<usize>, Vec<usize>)> {
    check_test_fraction(test_fraction)?;

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    let testing = indices.split_off(split_point(n, test_fraction));
    Ok((indices, testing))
}

/// Partition samples into training and testing sets.
///
/// Each set holds its samples in shuffled order.
pub fn split_samples<R: Rng + ?Sized>(
    samples: Vec<Sample>,
    test_fraction: f64,
    rng: &mut R,
) -> Result<(SampleSet, SampleSet)> {
    let (train_idx, test_idx) = split_indices(samples.len(), test_fraction, rng)?;

    let mut slots: Vec<Option<Sample>> = samples.into_iter().map(Some).collect();
    let training = SampleSet::from_samples(SplitName::Training, take_slots(&mut slots, &train_idx));
    let testing = SampleSet::from_samples(SplitName::Testing, take_slots(&mut slots, &test_idx));

    info!(
        "Split into {} training and {} testing samples",
        training.len(),
        testing.len()
    );
    Ok((training, testing))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::Pixels;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn numbered(n: usize) -> Vec<Sample> {
        (0..n)
            .map(|i| Sample::new(Pixels::Flat(vec![i as u8]), format!("label{}", i % 3)))
            .collect()
    }

    #[test]
    fn split_point_floors() {
        assert_eq!(split_point(20, 0.25), 15);
        assert_eq!(split_point(10, 0.33), 6);
        assert_eq!(split_point(7, 0.0), 7);
        assert_eq!(split_point(0, 0.5), 0);
        assert_eq!(split_point(3, 0.99), 0);
    }

    #[test]
    fn indices_cover_everything_once() {
        let mut rng = StdRng::seed_from_u64(42);
        let (train, test) = split_indices(20, 0.25, &mut rng).unwrap();
        assert_eq!(train.len(), 15);
        assert_eq!(test.len(), 5);

        let mut all: Vec<_> = train.iter().chain(test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn zero_test_fraction_keeps_everything_for_training() {
        let mut rng = StdRng::seed_from_u64(5);
        let (training, testing) = split_samples(numbered(12), 0.0, &mut rng).unwrap();
        assert_eq!(training.len(), 12);
        assert!(testing.is_empty());
        assert_eq!(training.name(), SplitName::Training);
        assert_eq!(testing.name(), SplitName::Testing);
    }

    #[test]
    fn split_keeps_pixels_and_labels_together() {
        let mut rng = StdRng::seed_from_u64(11);
        let (training, testing) = split_samples(numbered(30), 0.33, &mut rng).unwrap();
        assert_eq!(training.len(), 20);
        assert_eq!(testing.len(), 10);

        for set in [&training, &testing] {
            for (pixels, label) in set.iter() {
                let i = pixels.as_slice()[0] as usize;
                assert_eq!(label, format!("label{}", i % 3));
            }
        }
    }

    #[test]
    fn split_is_shuffled_and_reproducible() {
        let (a, _) = split_samples(numbered(50), 0.2, &mut StdRng::seed_from_u64(8)).unwrap();
        let (b, _) = split_samples(numbered(50), 0.2, &mut StdRng::seed_from_u64(8)).unwrap();
        assert_eq!(a, b);

        let order: Vec<u8> = a.data().iter().map(|p| p.as_slice()[0]).collect();
        let sorted: Vec<u8> = (0..40).collect();
        assert_ne!(order, sorted);
    }

    #[test]
    fn rejects_out_of_range_fraction() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            split_indices(10, 1.0, &mut rng),
            Err(Error::InvalidConfig(_))
        ));
    }
}
