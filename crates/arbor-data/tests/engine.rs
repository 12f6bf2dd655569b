//! End-to-end exercises of the data engine: a mixed-type table driven the
//! way a tree builder drives it — bootstrap, split, narrow, repeat.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use arbor_data::{Feature, FeatureTable};

/// A small mixed table: numeric target, one feature of each kind, some
/// missing values, contrasts enabled.
fn mixed_table() -> FeatureTable {
    let target = Feature::numeric(
        "target",
        vec![1.0, 2.0, 3.0, 4.0, f64::NAN, 10.0, 11.0, 12.0, 13.0, 14.0],
    );
    let size = Feature::numeric(
        "size",
        vec![0.1, 0.2, 0.3, 0.4, 0.5, 5.1, 5.2, f64::NAN, 5.4, 5.5],
    );
    let region = Feature::categorical(
        "region",
        &["north", "north", "north", "north", "south", "south", "south", "south", "east", "east"],
    );
    let notes = Feature::textual(
        "notes",
        &[
            "small unit", "small unit", "small parcel", "small parcel", "small lot",
            "large unit", "large unit", "large parcel", "large parcel", "large lot",
        ],
    );
    FeatureTable::new(
        vec![target, size, region, notes],
        Some((0..10).map(|i| format!("S{i:02}")).collect()),
        true,
    )
    .unwrap()
}

#[test]
fn public_count_hides_contrasts() {
    let table = mixed_table();
    assert_eq!(table.feature_count(), 4);
    assert_eq!(table.sample_count(), 10);
    // Contrast columns remain addressable by index and by name.
    assert_eq!(table.feature_index("size_CONTRAST"), Some(5));
    assert_eq!(table.feature_name(5), "size_CONTRAST");
}

#[test]
fn raw_values_roundtrip_all_kinds() {
    let table = mixed_table();
    for idx in 0..table.feature_count() {
        let first = table.raw_values(idx).unwrap();
        let second = table.raw_values(idx).unwrap();
        assert_eq!(first, second);
    }
    assert_eq!(table.raw_value(2, 0).unwrap(), "north");
    assert_eq!(table.raw_value(0, 4).unwrap(), "NaN");
    // Textual features read as missing through the numeric lens.
    assert_eq!(table.raw_value(3, 0).unwrap(), "NaN");
}

#[test]
fn bootstrap_then_split_then_narrow() {
    let table = mixed_table();
    let target = table.feature_index("target").unwrap();
    let size = table.feature_index("size").unwrap();

    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let draw = table
        .bootstrap_from_real(&mut rng, false, 1.0, target)
        .unwrap();
    // Sample 4 has a missing target, so the real set is everything else.
    assert_eq!(draw.in_bag, vec![0, 1, 2, 3, 5, 6, 7, 8, 9]);
    assert!(draw.out_of_bag.is_empty());

    let mut node_samples = draw.in_bag;
    let split = table
        .numeric_split(target, size, 2, &mut node_samples)
        .unwrap();
    // Sample 7 misses "size"; the rest separate cleanly at 0.4 | 5.1.
    assert_eq!(split.left, vec![0, 1, 2, 3]);
    assert_eq!(split.right, vec![5, 6, 8, 9]);
    assert!(split.delta_impurity > 0.0);
    assert!((split.split_value - 0.4).abs() < f64::EPSILON);

    // Narrow into the right child and evaluate the categorical feature.
    let region = table.feature_index("region").unwrap();
    let mut child = split.right;
    let child_split = table.categorical_split(target, region, 1, &mut child);
    if let Some(child_split) = &child_split {
        let n_child: usize = child_split.left.len() + child_split.right.len();
        assert_eq!(n_child, 4);
        assert!(child_split.left_categories.is_disjoint(&child_split.right_categories));
    }
}

#[test]
fn categorical_partition_covers_filtered_categories() {
    let table = mixed_table();
    let target = table.feature_index("target").unwrap();
    let region = table.feature_index("region").unwrap();

    let mut samples: Vec<usize> = (0..table.sample_count()).collect();
    let split = table
        .categorical_split(target, region, 1, &mut samples)
        .unwrap();

    // Every category present after filtering appears on exactly one side.
    let mut seen = std::collections::BTreeSet::new();
    for &idx in &samples {
        seen.insert(table.value(region, idx) as u32);
    }
    let union: std::collections::BTreeSet<u32> = split
        .left_categories
        .union(&split.right_categories)
        .copied()
        .collect();
    assert_eq!(seen, union);
    assert!(split.left_categories.is_disjoint(&split.right_categories));
}

#[test]
fn textual_candidate_pool_drives_membership_split() {
    let table = mixed_table();
    let target = table.feature_index("target").unwrap();
    let notes = table.feature_index("notes").unwrap();

    // Materialize trial tokens the way a trainer would: pick from random
    // samples' token sets via deterministic selection keys.
    let mut rng = ChaCha8Rng::seed_from_u64(9);
    let mut best: Option<(f64, u32)> = None;
    for _ in 0..16 {
        let sample = rng.gen_range(0..table.sample_count());
        let key = rng.r#gen::<usize>();
        let Some(token) = table.token_at(notes, sample, key) else {
            continue;
        };
        let mut samples: Vec<usize> = (0..table.sample_count()).collect();
        if let Some(split) = table.textual_split(target, notes, token, 2, &mut samples) {
            if best.is_none_or(|(di, _)| split.delta_impurity > di) {
                best = Some((split.delta_impurity, token));
            }
        }
    }

    // "small" vs "large" perfectly separates low and high targets, and
    // both words are in the candidate pool of every sample.
    let (best_di, best_token) = best.expect("some candidate token must split");
    let mut samples: Vec<usize> = (0..table.sample_count()).collect();
    let split = table
        .textual_split(target, notes, best_token, 2, &mut samples)
        .unwrap();
    assert!((split.delta_impurity - best_di).abs() < 1e-12);
    assert_eq!(split.left.len() + split.right.len(), 9);
}

#[test]
fn textual_entropy_reflects_token_spread() {
    let table = mixed_table();
    let notes = table.feature_index("notes").unwrap();
    let entropy = table.feature_entropy(notes).unwrap();
    // Tokens "small"/"large" each cover half the samples, "unit"/"parcel"
    // 40%, "lot" 20%: all contribute positive binary entropy.
    assert!(entropy > 0.0);
    assert!(table.feature_entropy(0).is_none());
}

#[test]
fn permuted_contrasts_stay_aligned_with_originals() {
    let mut table = mixed_table();
    let mut rng = ChaCha8Rng::seed_from_u64(1234);
    table.permute_contrasts(&mut rng);

    for i in 0..table.feature_count() {
        let shadow = table.feature_count() + i;
        // Missing pattern intact, marginal distribution intact.
        let mut original: Vec<f64> = Vec::new();
        let mut permuted: Vec<f64> = Vec::new();
        for s in 0..table.sample_count() {
            let a = table.value(i, s);
            let b = table.value(shadow, s);
            assert_eq!(a.is_nan(), b.is_nan());
            if !a.is_nan() {
                original.push(a);
                permuted.push(b);
            }
        }
        original.sort_by(f64::total_cmp);
        permuted.sort_by(f64::total_cmp);
        assert_eq!(original, permuted);
    }
}

#[test]
fn seeded_runs_reproduce() {
    let run = |seed: u64| {
        let mut table = mixed_table();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        table.permute_contrasts(&mut rng);
        let draw = table.bootstrap_from_real(&mut rng, true, 0.8, 0).unwrap();
        let mut samples = draw.in_bag.clone();
        let split = table.numeric_split(0, 1, 1, &mut samples);
        (draw.in_bag, draw.out_of_bag, split.map(|s| (s.left, s.right)))
    };
    assert_eq!(run(77), run(77));
}
