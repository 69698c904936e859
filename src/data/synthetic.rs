//! Reproducible synthetic model/space pairs.
//!
//! Model elements and ground-truth offsets are drawn from the lattice of
//! axis-aligned rotations and integer translations, so every product is
//! exact in f32 and the planted offsets are recoverable at any tolerance.
//! Decoys use arbitrary rotation angles and fractional translations.

use nalgebra::{Matrix4, Vector3};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// (cos, sin) for quarter turns 0, 90, 180 and 270 degrees
const QUARTER_TURNS: [(f32, f32); 4] = [(1.0, 0.0), (0.0, 1.0), (-1.0, 0.0), (0.0, -1.0)];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticParams {
    pub model_size: usize,
    /// Number of planted offsets
    pub offsets: usize,
    /// Number of random transforms mixed into space
    pub decoys: usize,
    /// Integer translations are drawn from `-translation_range..=translation_range`
    pub translation_range: i32,
}

impl Default for SyntheticParams {
    fn default() -> Self {
        Self {
            model_size: 8,
            offsets: 4,
            decoys: 200,
            translation_range: 100,
        }
    }
}

/// Generated scene with its ground truth
#[derive(Debug, Clone)]
pub struct SyntheticScene {
    pub model: Vec<Matrix4<f32>>,
    pub space: Vec<Matrix4<f32>>,
    /// Planted offsets; `offsets[k] * model[j]` is in `space` for every `j`
    pub offsets: Vec<Matrix4<f32>>,
}

impl SyntheticScene {
    pub fn generate(params: &SyntheticParams, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let range = params.translation_range.max(1);

        let model: Vec<Matrix4<f32>> = (0..params.model_size)
            .map(|_| lattice_transform(&mut rng, range))
            .collect();
        let offsets: Vec<Matrix4<f32>> = (0..params.offsets)
            .map(|_| lattice_transform(&mut rng, range))
            .collect();

        let mut space: Vec<Matrix4<f32>> = offsets
            .iter()
            .flat_map(|o| model.iter().map(move |m| o * m))
            .collect();
        space.extend((0..params.decoys).map(|_| decoy_transform(&mut rng, range as f32)));
        space.shuffle(&mut rng);

        tracing::debug!(
            model = model.len(),
            space = space.len(),
            offsets = offsets.len(),
            seed = seed,
            "Generated synthetic scene"
        );

        Self {
            model,
            space,
            offsets,
        }
    }
}

/// Axis-aligned rotation followed by an integer translation
fn lattice_transform(rng: &mut StdRng, range: i32) -> Matrix4<f32> {
    let rotation = axis_rotation(0, rng.gen_range(0..4))
        * axis_rotation(1, rng.gen_range(0..4))
        * axis_rotation(2, rng.gen_range(0..4));
    let translation = Vector3::new(
        rng.gen_range(-range..=range) as f32,
        rng.gen_range(-range..=range) as f32,
        rng.gen_range(-range..=range) as f32,
    );
    Matrix4::new_translation(&translation) * rotation
}

/// Quarter-turn rotation about `axis` (0 = x, 1 = y, 2 = z) with exact entries
fn axis_rotation(axis: usize, quarter_turns: usize) -> Matrix4<f32> {
    let (c, s) = QUARTER_TURNS[quarter_turns % 4];
    let (i, j) = match axis {
        0 => (1, 2),
        1 => (2, 0),
        _ => (0, 1),
    };
    let mut m = Matrix4::identity();
    m[(i, i)] = c;
    m[(i, j)] = -s;
    m[(j, i)] = s;
    m[(j, j)] = c;
    m
}

fn decoy_transform(rng: &mut StdRng, range: f32) -> Matrix4<f32> {
    let tau = std::f32::consts::TAU;
    let rotation = Matrix4::from_euler_angles(
        rng.gen_range(0.0..tau),
        rng.gen_range(0.0..tau),
        rng.gen_range(0.0..tau),
    );
    let translation = Vector3::new(
        rng.gen_range(-range..range),
        rng.gen_range(-range..range),
        rng.gen_range(-range..range),
    );
    Matrix4::new_translation(&translation) * rotation
}
