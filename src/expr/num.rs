use std::borrow::Cow;
use std::fmt;

/// The conversion letter of a numeric format specifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum FormatSpecifier {
    /// `u`: unsigned decimal digits
    Unsigned,
    /// `d`: optionally signed decimal digits
    #[default]
    Signed,
    /// `x`: lowercase hexadecimal digits
    HexLower,
    /// `X`: uppercase hexadecimal digits
    HexUpper,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum InvalidNumberFormatError {
    #[error("expected precision digits after '.'")]
    MissingPrecision,
    #[error("precision is limited to at most 19 digits")]
    PrecisionTooLarge,
    #[error("unrecognized conversion specifier '{0}'")]
    UnrecognizedConversion(char),
}

/// The format of a numeric capture or substitution: conversion and
/// precision, e.g. `%.8X`.
///
/// A precision of zero means "any number of digits".
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct NumberFormat {
    pub specifier: FormatSpecifier,
    pub precision: u8,
}

impl NumberFormat {
    /// Parse the format portion of a numeric substitution block, i.e. the
    /// text between `#` and `,` in `[[#%.8X,NAME:]]`.
    ///
    /// The grammar is `%? ('.' digits)? [udxX]?`, every piece optional.
    pub fn parse_spec(spec: &str) -> Result<Self, InvalidNumberFormatError> {
        let mut rest = spec.strip_prefix('%').unwrap_or(spec);
        let mut format = Self::default();
        if let Some(precision) = rest.strip_prefix('.') {
            let digits: String = precision.chars().take_while(char::is_ascii_digit).collect();
            if digits.is_empty() {
                return Err(InvalidNumberFormatError::MissingPrecision);
            }
            format.precision = digits
                .parse::<u8>()
                .ok()
                .filter(|p| *p <= 19)
                .ok_or(InvalidNumberFormatError::PrecisionTooLarge)?;
            rest = &precision[digits.len()..];
        }
        match rest {
            "" => Ok(format),
            "u" => {
                format.specifier = FormatSpecifier::Unsigned;
                Ok(format)
            }
            "d" => {
                format.specifier = FormatSpecifier::Signed;
                Ok(format)
            }
            "x" => {
                format.specifier = FormatSpecifier::HexLower;
                Ok(format)
            }
            "X" => {
                format.specifier = FormatSpecifier::HexUpper;
                Ok(format)
            }
            other => Err(InvalidNumberFormatError::UnrecognizedConversion(
                other.chars().next().unwrap(),
            )),
        }
    }

    /// The regex fragment matching a value in this format.
    ///
    /// The unbounded forms are capped at the number of digits that can
    /// appear in an `i64`, so a match can always be converted.
    pub fn pattern(&self) -> Cow<'static, str> {
        match (self.specifier, self.precision) {
            (FormatSpecifier::Unsigned, 0) => Cow::Borrowed("[0-9]{1,19}"),
            (FormatSpecifier::Unsigned, n) => Cow::Owned(format!("[0-9]{{{n}}}")),
            (FormatSpecifier::Signed, 0) => Cow::Borrowed("[+-]?[0-9]{1,19}"),
            (FormatSpecifier::Signed, n) => Cow::Owned(format!("[+-]?[0-9]{{{n}}}")),
            (FormatSpecifier::HexLower, 0) => Cow::Borrowed("[0-9a-f]{1,16}"),
            (FormatSpecifier::HexLower, n) => Cow::Owned(format!("[0-9a-f]{{{n}}}")),
            (FormatSpecifier::HexUpper, 0) => Cow::Borrowed("[0-9A-F]{1,16}"),
            (FormatSpecifier::HexUpper, n) => Cow::Owned(format!("[0-9A-F]{{{n}}}")),
        }
    }

    /// Convert matched digits to a value, honoring the conversion's radix.
    pub fn value_from_str(&self, digits: &str) -> Result<i64, std::num::ParseIntError> {
        match self.specifier {
            FormatSpecifier::HexLower | FormatSpecifier::HexUpper => {
                i64::from_str_radix(digits, 16)
            }
            FormatSpecifier::Unsigned | FormatSpecifier::Signed => {
                digits.strip_prefix('+').unwrap_or(digits).parse()
            }
        }
    }

    /// Render a value the way this format would have matched it, e.g. for
    /// substituting a numeric variable back into a pattern.
    pub fn render(&self, value: i64) -> String {
        let width = self.precision as usize;
        let magnitude = value.unsigned_abs();
        let digits = match self.specifier {
            FormatSpecifier::Unsigned | FormatSpecifier::Signed => {
                format!("{magnitude:0width$}")
            }
            FormatSpecifier::HexLower => format!("{magnitude:0width$x}"),
            FormatSpecifier::HexUpper => format!("{magnitude:0width$X}"),
        };
        if value < 0 {
            format!("-{digits}")
        } else {
            digits
        }
    }
}

impl fmt::Display for NumberFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("%")?;
        if self.precision > 0 {
            write!(f, ".{}", self.precision)?;
        }
        match self.specifier {
            FormatSpecifier::Unsigned => f.write_str("u"),
            FormatSpecifier::Signed => f.write_str("d"),
            FormatSpecifier::HexLower => f.write_str("x"),
            FormatSpecifier::HexUpper => f.write_str("X"),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parse_spec_defaults() {
        assert_eq!(
            NumberFormat::parse_spec("").unwrap(),
            NumberFormat {
                specifier: FormatSpecifier::Signed,
                precision: 0
            }
        );
        assert_eq!(
            NumberFormat::parse_spec("%.8X").unwrap(),
            NumberFormat {
                specifier: FormatSpecifier::HexUpper,
                precision: 8
            }
        );
        assert_eq!(
            NumberFormat::parse_spec("%.3").unwrap(),
            NumberFormat {
                specifier: FormatSpecifier::Signed,
                precision: 3
            }
        );
        assert_eq!(
            NumberFormat::parse_spec("u").unwrap(),
            NumberFormat {
                specifier: FormatSpecifier::Unsigned,
                precision: 0
            }
        );
    }

    #[test]
    fn parse_spec_rejects_garbage() {
        assert!(NumberFormat::parse_spec("%.").is_err());
        assert!(NumberFormat::parse_spec("%q").is_err());
        assert!(NumberFormat::parse_spec("%.999").is_err());
    }

    #[test]
    fn value_round_trips_through_format() {
        let format = NumberFormat::parse_spec("%.3d").unwrap();
        let value = format.value_from_str("-100").unwrap();
        assert_eq!(value, -100);
        assert_eq!(format.render(value), "-100");

        let format = NumberFormat::parse_spec("%.8X").unwrap();
        let value = format.value_from_str("FF00FF00").unwrap();
        assert_eq!(value, 0xFF00FF00);
        assert_eq!(format.render(value), "FF00FF00");
    }

    #[test]
    fn render_pads_to_precision() {
        let format = NumberFormat::parse_spec("%.3d").unwrap();
        assert_eq!(format.render(-5), "-005");
        assert_eq!(format.render(7), "007");
        let format = NumberFormat::parse_spec("x").unwrap();
        assert_eq!(format.render(255), "ff");
    }
}
