// src/gps/nmea.rs
//! NMEA position sentence parsing

use super::data::{Coordinate, SentenceInventory};
use crate::error::{GpsError, Result};

/// Integer degree digits in a DDM latitude (`ddmm.mmmm`)
pub const LATITUDE_DEGREE_WIDTH: usize = 2;
/// Integer degree digits in a DDM longitude (`dddmm.mmmm`)
pub const LONGITUDE_DEGREE_WIDTH: usize = 3;

/// Field layout of a position-bearing sentence, keyed by its formatter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentenceKind {
    /// Fix data: `$xxGGA,time,lat,N,lon,E,quality,...`
    Gga,
    /// Recommended minimum: `$xxRMC,time,status,lat,N,lon,E,...`
    Rmc,
    /// Geographic position: `$xxGLL,lat,N,lon,E,time,status,...`
    Gll,
}

impl SentenceKind {
    /// Work out the layout from an identifier such as `$GPGGA` or `$GNRMC`
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        let formatter = identifier.get(identifier.len().checked_sub(3)?..)?;
        match formatter {
            "GGA" => Some(SentenceKind::Gga),
            "RMC" => Some(SentenceKind::Rmc),
            "GLL" => Some(SentenceKind::Gll),
            _ => None,
        }
    }

    /// Indices of (latitude, N/S, longitude, E/W)
    fn position_fields(self) -> (usize, usize, usize, usize) {
        match self {
            SentenceKind::Gga => (2, 3, 4, 5),
            SentenceKind::Rmc => (3, 4, 5, 6),
            SentenceKind::Gll => (1, 2, 3, 4),
        }
    }

    fn passes_gate(self, parts: &[&str]) -> Option<bool> {
        let valid = match self {
            SentenceKind::Gga => matches!(field(parts, 6)?, "1" | "2"),
            SentenceKind::Rmc => field(parts, 2)? == "A",
            SentenceKind::Gll => field(parts, 6)? == "A",
        };
        Some(valid)
    }
}

/// What a single line turned out to be
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// A valid position from the inventory slot `slot`
    Fix { slot: usize, coordinate: Coordinate },
    /// A consultable sentence that failed its validity gate or was malformed
    Skipped { slot: usize, kind: SentenceKind },
    /// Not a sentence this inventory is allowed to consult
    Ignored,
}

impl LineOutcome {
    /// Inventory slot the line belonged to, if any
    pub fn slot(&self) -> Option<usize> {
        match self {
            LineOutcome::Fix { slot, .. } | LineOutcome::Skipped { slot, .. } => Some(*slot),
            LineOutcome::Ignored => None,
        }
    }
}

/// Decode one line into a coordinate if it is a valid, consultable sentence
pub fn parse(line: &str, inventory: &SentenceInventory) -> Option<Coordinate> {
    match classify(line, inventory) {
        LineOutcome::Fix { coordinate, .. } => Some(coordinate),
        _ => None,
    }
}

/// Decode one line, reporting skips separately from unrelated lines.
///
/// The secondary slot is only consulted once two slots are bound and the
/// tertiary slot only once all three are. A receiver that emits nothing but
/// the tertiary type is therefore never parsed.
pub fn classify(line: &str, inventory: &SentenceInventory) -> LineOutcome {
    let bound = inventory.bound_count();
    let allowed = [true, bound >= 2, bound == 3];

    let matched = (0..allowed.len()).find_map(|slot| {
        inventory
            .slot(slot)
            .filter(|identifier| allowed[slot] && line.starts_with(identifier))
            .map(|identifier| (slot, identifier))
    });

    let Some((slot, identifier)) = matched else {
        return LineOutcome::Ignored;
    };
    let Some(kind) = SentenceKind::from_identifier(identifier) else {
        return LineOutcome::Ignored;
    };

    match parse_position(kind, line) {
        Some(coordinate) => LineOutcome::Fix { slot, coordinate },
        None => LineOutcome::Skipped { slot, kind },
    }
}

fn parse_position(kind: SentenceKind, line: &str) -> Option<Coordinate> {
    let parts: Vec<&str> = line.trim_end().split(',').collect();
    if !kind.passes_gate(&parts)? {
        return None;
    }

    let (lat, ns, lon, ew) = kind.position_fields();
    let latitude = to_decimal(field(&parts, lat)?, hemisphere(&parts, ns)?, LATITUDE_DEGREE_WIDTH).ok()?;
    let longitude = to_decimal(field(&parts, lon)?, hemisphere(&parts, ew)?, LONGITUDE_DEGREE_WIDTH).ok()?;

    Some(Coordinate::new(latitude, longitude))
}

/// Field at `index` with any trailing `*hh` checksum removed
fn field<'a>(parts: &[&'a str], index: usize) -> Option<&'a str> {
    parts.get(index).and_then(|value| value.split('*').next())
}

fn hemisphere(parts: &[&str], index: usize) -> Option<char> {
    field(parts, index)?.chars().next()
}

/// Convert a degrees-decimal-minutes value to signed decimal degrees.
///
/// The first `degree_width` characters are whole degrees and the rest are
/// minutes. South and West are negative. The result is rounded to 6 places.
pub fn to_decimal(value: &str, hemisphere: char, degree_width: usize) -> Result<f64> {
    let (degrees, minutes) = match (value.get(..degree_width), value.get(degree_width..)) {
        (Some(degrees), Some(minutes)) if !minutes.is_empty() => (degrees, minutes),
        _ => {
            return Err(GpsError::Parse(format!(
                "'{}' is too short for {} degree digits",
                value, degree_width
            )))
        }
    };

    let degrees: u32 = degrees
        .parse()
        .map_err(|_| GpsError::Parse(format!("Invalid degrees in '{}'", value)))?;
    let minutes: f64 = minutes
        .parse()
        .map_err(|_| GpsError::Parse(format!("Invalid minutes in '{}'", value)))?;

    let mut decimal = degrees as f64 + minutes / 60.0;
    if matches!(hemisphere, 'S' | 'W') {
        decimal = -decimal;
    }

    Ok((decimal * 1_000_000.0).round() / 1_000_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GGA: &str = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";
    const RMC: &str = "$GPRMC,123519,A,3519.2344,N,12059.9621,W,022.4,084.4,230394,003.1,W*6A";
    const GLL: &str = "$GPGLL,4807.038,N,01131.000,E,013604,A,A*54";

    fn full_inventory() -> SentenceInventory {
        SentenceInventory::from_slots([Some("$GPGGA"), Some("$GPRMC"), Some("$GPGLL")])
    }

    #[test]
    fn test_to_decimal() {
        let lat = to_decimal("4807.038", 'N', LATITUDE_DEGREE_WIDTH).unwrap();
        let lon = to_decimal("01131.000", 'E', LONGITUDE_DEGREE_WIDTH).unwrap();
        assert!((lat - 48.1173).abs() < 0.0001);
        assert!((lon - 11.5167).abs() < 0.0001);
    }

    #[test]
    fn test_to_decimal_signs_and_rounding() {
        let lat = to_decimal("3519.2344", 'S', LATITUDE_DEGREE_WIDTH).unwrap();
        let lon = to_decimal("12059.9621", 'W', LONGITUDE_DEGREE_WIDTH).unwrap();
        assert_eq!(lat, -35.320573);
        assert_eq!(lon, -120.999368);
    }

    #[test]
    fn test_to_decimal_rejects_malformed() {
        assert!(to_decimal("", 'N', LATITUDE_DEGREE_WIDTH).is_err());
        assert!(to_decimal("48", 'N', LATITUDE_DEGREE_WIDTH).is_err());
        assert!(to_decimal("4x07.038", 'N', LATITUDE_DEGREE_WIDTH).is_err());
    }

    #[test]
    fn test_sentence_kind_from_identifier() {
        assert_eq!(SentenceKind::from_identifier("$GNGGA"), Some(SentenceKind::Gga));
        assert_eq!(SentenceKind::from_identifier("$GPRMC"), Some(SentenceKind::Rmc));
        assert_eq!(SentenceKind::from_identifier("$GPGLL"), Some(SentenceKind::Gll));
        assert_eq!(SentenceKind::from_identifier("$GPGSV"), None);
        assert_eq!(SentenceKind::from_identifier("GG"), None);
    }

    #[test]
    fn test_gga_parsing() {
        let coordinate = parse(GGA, &full_inventory()).unwrap();
        assert!((coordinate.latitude - 48.1173).abs() < 0.0001);
        assert!((coordinate.longitude - 11.5167).abs() < 0.0001);
    }

    #[test]
    fn test_gga_fix_quality_gate() {
        let no_fix = "$GPGGA,123519,4807.038,N,01131.000,E,0,00,,,M,,M,,*47";
        assert_eq!(classify(no_fix, &full_inventory()), LineOutcome::Skipped { slot: 0, kind: SentenceKind::Gga });

        let dgps = "$GPGGA,123519,4807.038,N,01131.000,E,2,08,0.9,545.4,M,46.9,M,,*47";
        assert!(parse(dgps, &full_inventory()).is_some());
    }

    #[test]
    fn test_rmc_parsing() {
        let coordinate = parse(RMC, &full_inventory()).unwrap();
        assert_eq!(coordinate, Coordinate::new(35.320573, -120.999368));
    }

    #[test]
    fn test_rmc_void_is_skipped() {
        let void = "$GPRMC,123519,V,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A";
        assert_eq!(classify(void, &full_inventory()), LineOutcome::Skipped { slot: 1, kind: SentenceKind::Rmc });
    }

    #[test]
    fn test_gll_parsing() {
        let coordinate = parse(GLL, &full_inventory()).unwrap();
        assert!((coordinate.latitude - 48.1173).abs() < 0.0001);
    }

    #[test]
    fn test_truncated_sentence_is_skipped() {
        let truncated = "$GPGGA,123519,4807.038,N";
        assert_eq!(classify(truncated, &full_inventory()), LineOutcome::Skipped { slot: 0, kind: SentenceKind::Gga });
    }

    #[test]
    fn test_secondary_needs_two_slots() {
        let primary_only = SentenceInventory::from_slots([Some("$GPGGA"), None, None]);
        assert_eq!(classify(RMC, &primary_only), LineOutcome::Ignored);

        let two = SentenceInventory::from_slots([Some("$GPGGA"), Some("$GPRMC"), None]);
        assert!(parse(RMC, &two).is_some());
    }

    #[test]
    fn test_tertiary_needs_all_slots() {
        let two = SentenceInventory::from_slots([Some("$GPGGA"), Some("$GPRMC"), None]);
        assert_eq!(classify(GLL, &two), LineOutcome::Ignored);

        // Only the tertiary type was seen: it is never consulted.
        let tertiary_only = SentenceInventory::from_slots([None, None, Some("$GPGLL")]);
        assert_eq!(classify(GLL, &tertiary_only), LineOutcome::Ignored);
    }

    #[test]
    fn test_invalid_sentence() {
        assert_eq!(classify("$INVALID,123,456", &full_inventory()), LineOutcome::Ignored);
        assert_eq!(parse("", &full_inventory()), None);
    }
}
