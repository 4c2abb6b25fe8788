//! Minimal NMEA 0183 decoding for GGA (fix data) sentences.

use crate::{Error, Result};

/// Returns true for GGA sentences from the GPS or multi-GNSS talker.
pub fn is_gga(line: &str) -> bool {
    line.starts_with("$GPGGA") || line.starts_with("$GNGGA")
}

/// XOR of all characters between `$` and `*`.
pub fn checksum(body: &str) -> u8 {
    body.bytes().fold(0u8, |acc, b| acc ^ b)
}

/// Decodes a GGA sentence into (latitude, longitude) in signed decimal degrees.
///
/// Returns [`Error::NoFix`] when the receiver reports fix quality 0 or leaves
/// the position fields empty.
pub fn parse_gga(line: &str) -> Result<(f64, f64)> {
    let line = line.trim();
    let rest = line
        .strip_prefix('$')
        .ok_or_else(|| Error::InvalidSentence(line.to_string()))?;

    let (body, sum) = rest
        .split_once('*')
        .ok_or_else(|| Error::InvalidSentence(format!("missing checksum: {}", line)))?;
    let actual = u8::from_str_radix(sum, 16)
        .map_err(|_| Error::InvalidSentence(format!("bad checksum field: {}", line)))?;
    let expected = checksum(body);
    if actual != expected {
        return Err(Error::Checksum { expected, actual });
    }

    let fields: Vec<&str> = body.split(',').collect();
    if fields.len() < 7 || !fields[0].ends_with("GGA") {
        return Err(Error::InvalidSentence(line.to_string()));
    }

    let quality = fields[6];
    if quality.is_empty() || quality == "0" {
        return Err(Error::NoFix);
    }
    if fields[2].is_empty() || fields[4].is_empty() {
        return Err(Error::NoFix);
    }

    let latitude = parse_coordinate(fields[2], fields[3], 'S')?;
    let longitude = parse_coordinate(fields[4], fields[5], 'W')?;
    Ok((latitude, longitude))
}

/// Converts `[d]ddmm.mmmm` plus hemisphere to signed decimal degrees.
fn parse_coordinate(value: &str, hemisphere: &str, negative: char) -> Result<f64> {
    let raw: f64 = value
        .parse()
        .map_err(|_| Error::InvalidSentence(format!("bad coordinate: {}", value)))?;
    let degrees = (raw / 100.0).trunc();
    let minutes = raw - degrees * 100.0;
    let decimal = degrees + minutes / 60.0;

    let mut chars = hemisphere.chars();
    match (chars.next(), chars.next()) {
        (Some(h), None) if h == negative => Ok(-decimal),
        (Some('N' | 'S' | 'E' | 'W'), None) => Ok(decimal),
        _ => Err(Error::InvalidSentence(format!(
            "bad hemisphere: {:?}",
            hemisphere
        ))),
    }
}
