// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Parsing and formatting for money and quantity cells. Money is integer
//! kopecks end to end; user input accepts both `.` and `,` as the decimal
//! separator because the catalog data originated on a ru-RU locale.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    InvalidMoney,
    NegativeMoney,
    InvalidQuantity,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidMoney => f.write_str("invalid money value"),
            Self::NegativeMoney => f.write_str("negative money value"),
            Self::InvalidQuantity => f.write_str("invalid quantity value"),
        }
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

pub fn parse_kopecks(input: &str) -> ValidationResult<i64> {
    let clean = input.trim().replace(',', ".").replace(' ', "");
    if clean.is_empty() {
        return Err(ValidationError::InvalidMoney);
    }
    if clean.starts_with('-') {
        return Err(ValidationError::NegativeMoney);
    }

    let parts = clean.split('.').collect::<Vec<_>>();
    if parts.len() > 2 {
        return Err(ValidationError::InvalidMoney);
    }

    let whole = parse_digits(parts[0], true)?;
    if whole > i64::MAX / 100 {
        return Err(ValidationError::InvalidMoney);
    }

    let mut frac = 0i64;
    if parts.len() == 2 {
        if parts[1].len() > 2 {
            return Err(ValidationError::InvalidMoney);
        }
        frac = parse_digits(parts[1], false)?;
        if parts[1].len() == 1 {
            frac *= 10;
        }
    }

    Ok(whole * 100 + frac)
}

pub fn parse_quantity(input: &str) -> ValidationResult<f64> {
    let clean = input.trim().replace(',', ".");
    if clean.is_empty() {
        return Err(ValidationError::InvalidQuantity);
    }
    let value = clean
        .parse::<f64>()
        .map_err(|_| ValidationError::InvalidQuantity)?;
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::InvalidQuantity);
    }
    Ok(value)
}

pub fn format_kopecks(kopecks: i64) -> String {
    let (sign, kopecks) = if kopecks < 0 {
        ("-", -kopecks)
    } else {
        ("", kopecks)
    };
    let rubles = kopecks / 100;
    let remainder = kopecks % 100;
    format!("{sign}{}.{remainder:02}", group_thousands(rubles))
}

pub fn format_quantity(quantity: f64) -> String {
    if quantity == 0.0 {
        return String::new();
    }
    let text = format!("{quantity:.2}");
    text.trim_end_matches('0').trim_end_matches('.').to_owned()
}

fn parse_digits(input: &str, allow_empty: bool) -> ValidationResult<i64> {
    if input.is_empty() {
        return if allow_empty {
            Ok(0)
        } else {
            Err(ValidationError::InvalidMoney)
        };
    }
    if !input.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(ValidationError::InvalidMoney);
    }
    input.parse().map_err(|_| ValidationError::InvalidMoney)
}

fn group_thousands(value: i64) -> String {
    let digits = value.to_string();
    let mut output = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            output.push(' ');
        }
        output.push(ch);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::{ValidationError, format_kopecks, format_quantity, parse_kopecks, parse_quantity};

    #[test]
    fn parse_kopecks_accepts_dot_and_comma() {
        assert_eq!(parse_kopecks("1234.56"), Ok(123_456));
        assert_eq!(parse_kopecks("1234,56"), Ok(123_456));
        assert_eq!(parse_kopecks("1 234,5"), Ok(123_450));
        assert_eq!(parse_kopecks("0"), Ok(0));
    }

    #[test]
    fn parse_kopecks_rejects_garbage() {
        assert_eq!(parse_kopecks(""), Err(ValidationError::InvalidMoney));
        assert_eq!(parse_kopecks("12.345"), Err(ValidationError::InvalidMoney));
        assert_eq!(parse_kopecks("-5"), Err(ValidationError::NegativeMoney));
        assert_eq!(parse_kopecks("abc"), Err(ValidationError::InvalidMoney));
    }

    #[test]
    fn parse_quantity_accepts_comma_separator() {
        assert_eq!(parse_quantity("2,5"), Ok(2.5));
        assert_eq!(parse_quantity("3"), Ok(3.0));
        assert_eq!(parse_quantity("-1"), Err(ValidationError::InvalidQuantity));
        assert_eq!(parse_quantity("x"), Err(ValidationError::InvalidQuantity));
    }

    #[test]
    fn format_kopecks_groups_thousands() {
        assert_eq!(format_kopecks(123_456), "1 234.56");
        assert_eq!(format_kopecks(5), "0.05");
        assert_eq!(format_kopecks(100_000_000), "1 000 000.00");
    }

    #[test]
    fn format_quantity_trims_trailing_zeroes() {
        assert_eq!(format_quantity(2.5), "2.5");
        assert_eq!(format_quantity(3.0), "3");
        assert_eq!(format_quantity(0.0), "");
    }
}
