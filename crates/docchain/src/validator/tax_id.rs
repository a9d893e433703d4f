//! Taxpayer id (INN) normalization and checksum.

const WEIGHTS_10: [u32; 9] = [2, 4, 10, 3, 5, 9, 4, 6, 8];
const WEIGHTS_12_FIRST: [u32; 10] = [7, 2, 4, 10, 3, 5, 9, 4, 6, 8];
const WEIGHTS_12_SECOND: [u32; 11] = [3, 7, 2, 4, 10, 3, 5, 9, 4, 6, 8];

/// Keeps only the ASCII digits of a tax id.
pub fn normalize(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Whether the check digits of a 10- or 12-digit id match. Any other length
/// is never valid.
pub fn checksum_valid(digits: &str) -> bool {
    let values: Option<Vec<u32>> = digits.chars().map(|c| c.to_digit(10)).collect();
    let Some(values) = values else {
        return false;
    };

    match values.len() {
        10 => check_digit(&values, &WEIGHTS_10) == values[9],
        12 => {
            check_digit(&values, &WEIGHTS_12_FIRST) == values[10]
                && check_digit(&values, &WEIGHTS_12_SECOND) == values[11]
        }
        _ => false,
    }
}

fn check_digit(values: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = values.iter().zip(weights).map(|(v, w)| v * w).sum();
    sum % 11 % 10
}
