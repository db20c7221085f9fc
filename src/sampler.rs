//! Per-label quota sampling.
//!
//! Random draws happen in a fixed order so a seeded generator reproduces the
//! same selection: labels are visited in sorted order, each qualifying label
//! draws its subset, and one shuffle over the concatenated selection comes
//! last.

use std::collections::BTreeMap;

use log::{debug, info};
use rand::seq::{index, SliceRandom};
use rand::Rng;

use crate::error::{Error, Result};
use crate::types::Sample;

/// Choose which sample indices survive the per-label quota.
///
/// With `equal_samples` unset every index is kept in its original order.
/// Otherwise each label with at least `min_faces` samples contributes exactly
/// `min_faces` randomly drawn indices, and smaller labels are dropped.
pub fn stratified_indices<S, R>(
    labels: &[S],
    min_faces: usize,
    equal_samples: bool,
    rng: &mut R,
) -> Result<Vec<usize>>
where
    S: AsRef<str>,
    R: Rng + ?Sized,
{
    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, label) in labels.iter().enumerate() {
        groups.entry(label.as_ref()).or_default().push(i);
    }

    if labels.is_empty() {
        return Err(Error::InsufficientSamples {
            min_faces,
            labels: 0,
        });
    }

    if !equal_samples {
        return Ok((0..labels.len()).collect());
    }

    let mut sampled = Vec::with_capacity(groups.len() * min_faces);
    let mut kept = 0;
    for (label, members) in &groups {
        if members.len() < min_faces {
            debug!(
                "Dropping label '{}': {} faces, need {}",
                label,
                members.len(),
                min_faces
            );
            continue;
        }
        let picks = index::sample(rng, members.len(), min_faces);
        sampled.extend(picks.iter().map(|i| members[i]));
        kept += 1;
    }

    if sampled.is_empty() {
        return Err(Error::InsufficientSamples {
            min_faces,
            labels: groups.len(),
        });
    }

    sampled.shuffle(rng);
    info!(
        "Kept {} of {} labels at {} faces each",
        kept,
        groups.len(),
        min_faces
    );
    Ok(sampled)
}

/// Move the samples at `indices` out of `slots`, in `indices` order.
///
/// A slot can only be taken once; repeated or out-of-range indices are ignored.
pub(crate) fn take_slots(slots: &mut [Option<Sample>], indices: &[usize]) -> Vec<Sample> {
    indices
        .iter()
        .filter_map(|&i| slots.get_mut(i).and_then(Option::take))
        .collect()
}

pub(crate) fn take_indices(samples: Vec<Sample>, indices: &[usize]) -> Vec<Sample> {
    let mut slots: Vec<Option<Sample>> = samples.into_iter().map(Some).collect();
    take_slots(&mut slots, indices)
}

/// Apply [`stratified_indices`] to whole samples.
pub fn stratified_sample<R: Rng + ?Sized>(
    samples: Vec<Sample>,
    min_faces: usize,
    equal_samples: bool,
    rng: &mut R,
) -> Result<Vec<Sample>> {
    let labels: Vec<&str> = samples.iter().map(|s| s.label.as_str()).collect();
    let indices = stratified_indices(&labels, min_faces, equal_samples, rng)?;
    Ok(take_indices(samples, &indices))
}
