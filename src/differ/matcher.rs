//! Pairing of removed and added resources that are really one resource
//! under a new identifier

use crate::constants::MOVE_SIMILARITY_THRESHOLD;
use crate::models::Resource;

use super::compare::same_configuration;

/// Normalised similarity of two strings in `[0, 1]`, from edit distance
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(&a, &b) as f64 / longest as f64
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// Pair each removed resource with the most similar unpaired added resource
/// of the same type and identical configuration. Returns index pairs
/// `(removed, added)`; candidates are visited in input order.
pub fn match_moves(removed: &[&Resource], added: &[&Resource]) -> Vec<(usize, usize)> {
    let mut taken = vec![false; added.len()];
    let mut pairs = Vec::new();

    for (ri, old) in removed.iter().enumerate() {
        let mut best: Option<(usize, f64)> = None;
        for (ai, new) in added.iter().enumerate() {
            if taken[ai] || old.resource_type != new.resource_type {
                continue;
            }
            let score = name_similarity(&old.name, &new.name);
            if score <= MOVE_SIMILARITY_THRESHOLD || !same_configuration(old, new) {
                continue;
            }
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((ai, score));
            }
        }
        if let Some((ai, _)) = best {
            taken[ai] = true;
            pairs.push((ri, ai));
        }
    }
    pairs
}
