use rand::Rng;
use shared::domain::Color;

pub const PALETTE: [Color; 8] = Color::ALL;

/// Picks a random palette color that differs from `last`.
pub fn pick_color(last: Option<Color>) -> Color {
    pick_color_with(&mut rand::rng(), last)
}

/// Same as [`pick_color`] with an explicit random source.
pub fn pick_color_with<R: Rng + ?Sized>(rng: &mut R, last: Option<Color>) -> Color {
    loop {
        let candidate = PALETTE[rng.random_range(0..PALETTE.len())];
        if Some(candidate) != last {
            return candidate;
        }
    }
}

#[cfg(test)]
#[path = "tests/palette_tests.rs"]
mod tests;
