use super::*;
use rand::{rngs::StdRng, SeedableRng};

#[test]
fn never_repeats_the_previous_color() {
    let mut last = None;
    for _ in 0..1000 {
        let color = pick_color(last);
        assert_ne!(Some(color), last);
        last = Some(color);
    }
}

#[test]
fn every_palette_color_can_follow_any_other() {
    let mut rng = StdRng::seed_from_u64(7);
    for forbidden in PALETTE {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            let color = pick_color_with(&mut rng, Some(forbidden));
            assert_ne!(color, forbidden);
            seen.insert(color);
        }
        assert_eq!(seen.len(), PALETTE.len() - 1);
    }
}

#[test]
fn seeded_rng_is_reproducible() {
    let mut a = StdRng::seed_from_u64(42);
    let mut b = StdRng::seed_from_u64(42);
    for _ in 0..32 {
        assert_eq!(pick_color_with(&mut a, None), pick_color_with(&mut b, None));
    }
}
