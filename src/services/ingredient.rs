//! Heuristic parser for free-text ingredient lines.
//!
//! Used on lines taken from embedded recipe metadata ("350g sushi rice",
//! "2 cups flour", "Fine sea salt"). This is not a unit-of-measure grammar:
//! ranges ("2-3 cups") and fractions ("1/2 cup") are left untouched and land
//! whole in the ingredient name.

use crate::models::Ingredient;

/// Parse one ingredient line into name/quantity/unit.
///
/// First matching rule wins:
/// 1. Leading token like "350g": numeric run + unit suffix fused together.
/// 2. Leading token purely numeric with at least three tokens total:
///    quantity, unit, then name.
/// 3. Anything else: the whole line is the name.
pub fn parse_line(line: &str) -> Ingredient {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.is_empty() {
        return Ingredient::named(line);
    }

    let first = tokens[0];

    if let Some((quantity, unit)) = split_fused_quantity(first) {
        let name = tokens[1..].join(" ");
        if !name.is_empty() {
            return Ingredient {
                name,
                grocery_item: None,
                quantity: Some(quantity.to_string()),
                unit: Some(unit.to_string()),
            };
        }
    }

    if is_plain_number(first) && tokens.len() >= 3 {
        return Ingredient {
            name: tokens[2..].join(" "),
            grocery_item: None,
            quantity: Some(first.to_string()),
            unit: Some(tokens[1].to_string()),
        };
    }

    Ingredient::named(line)
}

/// Split tokens like "350g" into ("350", "g"). The token must start with a
/// digit or decimal point, and the suffix must contain no further digits or
/// separators ("2-3" and "1/2" fail here and fall through).
fn split_fused_quantity(token: &str) -> Option<(&str, &str)> {
    let first_char = token.chars().next()?;
    if !first_char.is_ascii_digit() && first_char != '.' {
        return None;
    }

    let split_at = token
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit() && *c != '.')
        .map(|(i, _)| i)?;

    let (quantity, unit) = token.split_at(split_at);
    if quantity.is_empty() || unit.is_empty() {
        return None;
    }
    if unit.chars().any(|c| !c.is_alphabetic()) {
        return None;
    }
    Some((quantity, unit))
}

/// Digits with at most one decimal point and an optional leading minus.
fn is_plain_number(token: &str) -> bool {
    let body = token.strip_prefix('-').unwrap_or(token);
    if body.is_empty() {
        return false;
    }
    let mut seen_dot = false;
    for c in body.chars() {
        match c {
            '0'..='9' => {}
            '.' if !seen_dot => seen_dot = true,
            _ => return false,
        }
    }
    body.chars().any(|c| c.is_ascii_digit())
}
