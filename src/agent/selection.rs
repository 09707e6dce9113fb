//! Fair preset selection across a day's history

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use uuid::Uuid;

use crate::models::Preset;

/// Pick up to `count` distinct presets.
///
/// Presets unused today and outside the freshness window come first, then
/// presets merely unused today, then the whole pool. The chosen pool is
/// shuffled before taking from it.
pub fn select_presets<R: Rng + ?Sized>(
    all: &[Preset],
    count: usize,
    used_today: &HashSet<Uuid>,
    recently_used: &HashSet<Uuid>,
    rng: &mut R,
) -> Vec<Preset> {
    let unused: Vec<&Preset> = all.iter().filter(|p| !used_today.contains(&p.id)).collect();
    let fresh: Vec<&Preset> = unused
        .iter()
        .copied()
        .filter(|p| !recently_used.contains(&p.id))
        .collect();

    let mut pool = if fresh.len() >= count {
        fresh
    } else if unused.len() >= count {
        unused
    } else {
        all.iter().collect()
    };

    pool.shuffle(rng);

    let mut seen = HashSet::with_capacity(count);
    pool.into_iter()
        .filter(|p| seen.insert(p.id))
        .take(count)
        .cloned()
        .collect()
}
