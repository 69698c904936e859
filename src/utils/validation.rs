//! Pre-flight checks and post-hoc diagnostics for transform sets.
//!
//! Nothing here aborts a search. Findings are logged and returned so callers
//! can surface them.

use crate::matrix::{Fingerprint, TransformSet};
use crate::utils::tolerance::{contains_matrix, digits_from_tolerance, nearly_equal_matrix, singularity_epsilon};
use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Number of duplicate pairs echoed to the log by [`set_statistics`]
const LOGGED_DUPLICATES: usize = 10;

/// Whether `|det(matrix)| < epsilon`. A NaN determinant counts as singular.
pub fn is_singular(matrix: &Matrix4<f32>, epsilon: f32) -> bool {
    !(matrix.determinant().abs() >= epsilon)
}

/// Indices of transforms whose determinant magnitude is below `epsilon`.
pub fn find_singular(set: &TransformSet, epsilon: f32) -> Vec<usize> {
    set.iter()
        .enumerate()
        .filter(|(_, t)| is_singular(t.original(), epsilon))
        .map(|(i, _)| i)
        .collect()
}

/// Pairs `(first, later)` of indices sharing a fingerprint.
///
/// Linear in the set size; uses the set's fingerprint-to-first-index map.
pub fn find_duplicates(set: &TransformSet) -> Vec<(usize, usize)> {
    set.iter()
        .enumerate()
        .filter_map(|(i, t)| match set.first_index_of(t.fingerprint()) {
            Some(first) if first != i => Some((first, i)),
            _ => None,
        })
        .collect()
}

/// Every pair `(i, j)`, `i < j`, of nearly equal matrices. Quadratic.
pub fn find_duplicates_exhaustive(matrices: &[Matrix4<f32>], abs_tol: f32, rel_tol: f32) -> Vec<(usize, usize)> {
    let mut duplicates = Vec::new();
    for i in 0..matrices.len() {
        for j in (i + 1)..matrices.len() {
            if nearly_equal_matrix(&matrices[i], &matrices[j], abs_tol, rel_tol) {
                duplicates.push((i, j));
            }
        }
    }
    duplicates
}

/// Summary of a transform set at a given tolerance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetStatistics {
    pub name: String,
    pub count: usize,
    pub digits: u32,
    pub min_determinant: f32,
    pub max_determinant: f32,
    pub avg_determinant: f32,
    pub singular: Vec<usize>,
    pub duplicates: Vec<(usize, usize)>,
    pub unique_fingerprints: usize,
}

/// Compute and log statistics for `set`.
///
/// Determinant figures are all zero for an empty set.
pub fn set_statistics(name: &str, set: &TransformSet, tolerance: f32) -> SetStatistics {
    let digits = digits_from_tolerance(tolerance);

    let (min_det, max_det, avg_det) = if set.is_empty() {
        (0.0, 0.0, 0.0)
    } else {
        let (min, max, sum) = set.iter().map(|t| t.determinant()).fold(
            (f32::INFINITY, f32::NEG_INFINITY, 0.0f32),
            |(min, max, sum), det| (min.min(det), max.max(det), sum + det),
        );
        (min, max, sum / set.len() as f32)
    };

    let stats = SetStatistics {
        name: name.to_string(),
        count: set.len(),
        digits,
        min_determinant: min_det,
        max_determinant: max_det,
        avg_determinant: avg_det,
        singular: find_singular(set, singularity_epsilon(digits)),
        duplicates: find_duplicates(set),
        unique_fingerprints: set.unique_fingerprints(),
    };

    tracing::info!(
        set = name,
        count = stats.count,
        digits = digits,
        "Determinants: min={:.6}, max={:.6}, avg={:.6}",
        min_det,
        max_det,
        avg_det
    );

    if stats.singular.is_empty() {
        tracing::info!(set = name, "All matrices are non-singular");
    } else {
        tracing::warn!(
            set = name,
            "Singular matrices: {} (indices: {:?})",
            stats.singular.len(),
            stats.singular
        );
    }

    if stats.duplicates.is_empty() {
        tracing::info!(set = name, "No duplicates found by rounded fingerprint");
    } else {
        tracing::warn!(
            set = name,
            "Duplicate matrices found by rounded fingerprint: {} pairs",
            stats.duplicates.len()
        );
        for (first, later) in stats.duplicates.iter().take(LOGGED_DUPLICATES) {
            tracing::info!(set = name, "  Duplicates: [{}] ~ [{}] (digits={})", first, later, digits);
        }
    }

    stats
}

/// Quick feasibility check before a search.
///
/// Fails when either set is empty or `model[0]` is singular at the
/// tolerance's precision. A space smaller than the model only warns.
pub fn feasibility_check(model: &TransformSet, space: &TransformSet, tolerance: f32) -> bool {
    if model.is_empty() {
        tracing::error!("Model is empty");
        return false;
    }
    if space.is_empty() {
        tracing::error!("Space is empty");
        return false;
    }

    if space.len() < model.len() {
        tracing::warn!(
            "Space ({}) has fewer matrices than model ({}); offsets may be rare",
            space.len(),
            model.len()
        );
    }

    let digits = digits_from_tolerance(tolerance);
    if is_singular(model[0].original(), singularity_epsilon(digits)) {
        tracing::error!(
            determinant = model[0].determinant(),
            "First model matrix is singular; no offset can be computed"
        );
        return false;
    }

    let unique: HashSet<Fingerprint> = space.iter().map(|t| t.fingerprint()).collect();
    tracing::info!(
        "Space unique rounded fingerprints: {}/{} (digits={})",
        unique.len(),
        space.len(),
        digits
    );
    tracing::info!(
        "Quick feasibility check passed: model={}, space={}",
        model.len(),
        space.len()
    );
    true
}

/// Per-element disagreement between the two membership tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    pub model_index: usize,
    pub by_fingerprint: bool,
    pub by_tolerance: bool,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |found: bool| if found { "Y" } else { "N" };
        write!(
            f,
            "m[{}]: hash={}, nearly={}",
            self.model_index,
            flag(self.by_fingerprint),
            flag(self.by_tolerance)
        )
    }
}

/// Agreement report for one candidate offset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OffsetDiagnosis {
    pub label: String,
    pub model_len: usize,
    pub fingerprint_matches: usize,
    pub tolerance_matches: usize,
    /// Elements accepted by exactly one of the two tests
    pub divergent: usize,
    pub digits: u32,
    pub tolerance: f32,
    /// First elements where at least one test failed
    pub mismatches: Vec<Mismatch>,
}

impl OffsetDiagnosis {
    pub fn has_divergence(&self) -> bool {
        self.divergent > 0
    }
}

/// Evaluate `candidate * m` for every model element with both the
/// fingerprint lookup and the direct tolerance comparison, and log the
/// counts plus the first `max_reported` elements where either test failed.
///
/// Fingerprints are taken at `space.digits()`, the same precision the
/// search engine looks up at.
pub fn diagnose_offset(
    label: &str,
    candidate: &Matrix4<f32>,
    model: &TransformSet,
    space: &TransformSet,
    tolerance: f32,
    max_reported: usize,
) -> OffsetDiagnosis {
    let digits = space.digits();
    let space_originals = space.originals();
    let mut fingerprint_matches = 0;
    let mut tolerance_matches = 0;
    let mut divergent = 0;
    let mut mismatches = Vec::new();

    for (model_index, m) in model.iter().enumerate() {
        let transformed = candidate * m.original();

        let by_fingerprint = space.contains(Fingerprint::of(&transformed, digits));
        let by_tolerance = contains_matrix(&space_originals, &transformed, tolerance, tolerance);
        fingerprint_matches += by_fingerprint as usize;
        tolerance_matches += by_tolerance as usize;
        divergent += (by_fingerprint != by_tolerance) as usize;

        if (!by_fingerprint || !by_tolerance) && mismatches.len() < max_reported {
            mismatches.push(Mismatch {
                model_index,
                by_fingerprint,
                by_tolerance,
            });
        }
    }

    tracing::info!(
        "[Diag:{}] matches: hash={}/{}, nearly={}/{}, digits={}, tol={}",
        label,
        fingerprint_matches,
        model.len(),
        tolerance_matches,
        model.len(),
        digits,
        tolerance
    );
    if !mismatches.is_empty() {
        let listed: Vec<String> = mismatches.iter().map(|m| m.to_string()).collect();
        tracing::info!("[Diag:{}] first mismatches: {}", label, listed.join("; "));
    }

    OffsetDiagnosis {
        label: label.to_string(),
        model_len: model.len(),
        fingerprint_matches,
        tolerance_matches,
        divergent,
        digits,
        tolerance,
        mismatches,
    }
}
