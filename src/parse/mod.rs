//! Token-level helpers shared by the grammar leaves.

mod error;
pub mod literal;

pub use error::LiteralError;

/// Split rule text into whitespace-delimited tokens.
#[must_use]
pub fn tokenize(raw: &str) -> Vec<&str> {
    raw.split_whitespace().collect()
}

/// Iterate over every adjacent `(token, next)` pair with the index of the
/// first token.
pub fn pair_iter<'a, 't>(
    tokens: &'a [&'t str],
) -> impl Iterator<Item = (usize, &'t str, &'t str)> + 'a {
    tokens
        .windows(2)
        .enumerate()
        .map(|(i, w)| (i, w[0], w[1]))
}
