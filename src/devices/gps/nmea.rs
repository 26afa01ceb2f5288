//! Streaming NMEA-0183 sentence parser
//!
//! Only the two sentences a tracker needs are understood:
//! - **GGA**: fix quality, position, satellites, HDOP, altitude
//! - **RMC**: status, speed over ground, UTC time
//!
//! Both GPS-only (`GP`) and multi-constellation (`GN`) talkers are accepted.
//! The trailing `*hh` checksum is stripped but not verified.

use heapless::Vec;

/// Longest sentence accepted, excluding `$` and the line terminator
///
/// NMEA caps sentences at 82 characters; a little slack covers receivers
/// that pad fields.
pub const MAX_SENTENCE_LEN: usize = 96;

/// Separators required before a GGA sentence is trusted
const GGA_MIN_SEPARATORS: usize = 14;

/// Separators required before an RMC sentence is trusted
const RMC_MIN_SEPARATORS: usize = 11;

const KNOTS_TO_KMH: f64 = 1.852;

/// Sentence types the parser extracts data from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SentenceKind {
    /// Global positioning system fix data
    Gga,
    /// Recommended minimum specific GNSS data
    Rmc,
}

/// Errors from interpreting a sentence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NmeaError {
    /// Talker or sentence type the tracker does not use
    Unsupported,
    /// Too few fields for the sentence type
    MalformedSentence,
}

impl core::fmt::Display for NmeaError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            NmeaError::Unsupported => write!(f, "unsupported sentence"),
            NmeaError::MalformedSentence => write!(f, "malformed sentence"),
        }
    }
}

/// Latest navigation solution assembled from GGA and RMC sentences
///
/// `latitude`/`longitude` are only meaningful while `valid` is set. Losing
/// the fix keeps the last coordinates in place.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Fix {
    /// GGA fix quality was non-zero in the last GGA sentence
    pub valid: bool,
    /// Latitude in degrees, south negative
    pub latitude: f32,
    /// Longitude in degrees, west negative
    pub longitude: f32,
    /// Altitude above mean sea level in meters
    pub altitude_m: f32,
    /// Speed over ground in km/h
    pub speed_kmh: f32,
    /// Satellites used in the solution
    pub satellites: u8,
    /// Horizontal dilution of precision
    pub hdop: f32,
    /// UTC time of day in milliseconds, from RMC
    pub timestamp_ms: u32,
}

/// Result of applying a sentence to a [`Fix`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixChange {
    /// Sentence type that was applied
    pub kind: SentenceKind,
    /// `Fix::valid` flipped
    pub validity_changed: bool,
}

/// One complete sentence, without the leading `$` and line terminator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    bytes: Vec<u8, MAX_SENTENCE_LEN>,
}

impl Sentence {
    /// Sentence text, if it is valid ASCII/UTF-8
    pub fn as_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.bytes).ok()
    }

    /// Sentence type, if the talker and type are supported
    pub fn kind(&self) -> Option<SentenceKind> {
        let header = self.as_str()?.split(',').next()?;
        if header.len() != 5 || !header.is_ascii() {
            return None;
        }
        let (talker, kind) = header.split_at(2);
        if talker != "GP" && talker != "GN" {
            return None;
        }
        match kind {
            "GGA" => Some(SentenceKind::Gga),
            "RMC" => Some(SentenceKind::Rmc),
            _ => None,
        }
    }
}

/// Byte-at-a-time sentence reassembler
#[derive(Debug, Default)]
pub struct NmeaParser {
    buffer: Vec<u8, MAX_SENTENCE_LEN>,
    in_sentence: bool,
}

impl NmeaParser {
    /// Create an idle parser
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte; returns a sentence when a terminator completes one
    ///
    /// `$` always starts a fresh sentence, discarding any partial one. A
    /// sentence longer than [`MAX_SENTENCE_LEN`] is dropped and the parser
    /// waits for the next `$`.
    pub fn feed(&mut self, byte: u8) -> Option<Sentence> {
        match byte {
            b'$' => {
                self.buffer.clear();
                self.in_sentence = true;
                None
            }
            b'\r' | b'\n' => {
                if !self.in_sentence {
                    return None;
                }
                self.in_sentence = false;
                if self.buffer.is_empty() {
                    return None;
                }
                let sentence = Sentence {
                    bytes: self.buffer.clone(),
                };
                self.buffer.clear();
                Some(sentence)
            }
            _ if self.in_sentence => {
                if self.buffer.push(byte).is_err() {
                    crate::log_debug!("NMEA: Sentence overflow, discarding");
                    self.buffer.clear();
                    self.in_sentence = false;
                }
                None
            }
            _ => None,
        }
    }
}

/// Apply a sentence to `fix`
///
/// # Errors
///
/// - [`NmeaError::Unsupported`] for talkers other than GP/GN and sentence
///   types other than GGA/RMC
/// - [`NmeaError::MalformedSentence`] when the sentence has fewer field
///   separators than its type requires; `fix` is left untouched
pub fn parse_fix(sentence: &Sentence, fix: &mut Fix) -> Result<FixChange, NmeaError> {
    let kind = sentence.kind().ok_or(NmeaError::Unsupported)?;
    let text = sentence.as_str().ok_or(NmeaError::Unsupported)?;
    let body = match text.split_once('*') {
        Some((body, _checksum)) => body,
        None => text,
    };

    let separators = body.bytes().filter(|b| *b == b',').count();
    let required = match kind {
        SentenceKind::Gga => GGA_MIN_SEPARATORS,
        SentenceKind::Rmc => RMC_MIN_SEPARATORS,
    };
    if separators < required {
        return Err(NmeaError::MalformedSentence);
    }

    let mut fields: Vec<&str, 24> = Vec::new();
    for field in body.split(',') {
        if fields.push(field).is_err() {
            break;
        }
    }

    let was_valid = fix.valid;
    match kind {
        SentenceKind::Gga => apply_gga(&fields, fix),
        SentenceKind::Rmc => apply_rmc(&fields, fix),
    }

    Ok(FixChange {
        kind,
        validity_changed: was_valid != fix.valid,
    })
}

fn apply_gga(fields: &[&str], fix: &mut Fix) {
    let quality: u8 = fields[6].parse().unwrap_or(0);
    if quality == 0 {
        fix.valid = false;
        return;
    }

    fix.valid = true;
    fix.latitude = to_degrees(fields[2], fields[3]);
    fix.longitude = to_degrees(fields[4], fields[5]);
    fix.satellites = fields[7].parse().unwrap_or(0);
    fix.hdop = number(fields[8]) as f32;
    fix.altitude_m = number(fields[9]) as f32;
}

fn apply_rmc(fields: &[&str], fix: &mut Fix) {
    if fields[2] != "A" {
        return;
    }

    fix.speed_kmh = (number(fields[7]) * KNOTS_TO_KMH) as f32;
    fix.timestamp_ms = time_of_day_ms(fields[1]);
}

/// Malformed numbers read as zero
fn number(field: &str) -> f64 {
    field.trim().parse().unwrap_or(0.0)
}

/// `dddmm.mmmm` plus hemisphere to signed decimal degrees
fn to_degrees(value: &str, hemisphere: &str) -> f32 {
    let raw = number(value);
    let degrees = (raw / 100.0) as i32 as f64;
    let minutes = raw - degrees * 100.0;
    let decimal = degrees + minutes / 60.0;

    match hemisphere {
        "S" | "W" => -decimal as f32,
        _ => decimal as f32,
    }
}

/// `hhmmss.sss` to milliseconds since UTC midnight
fn time_of_day_ms(field: &str) -> u32 {
    if field.len() < 6 || !field.is_char_boundary(2) || !field.is_char_boundary(4) {
        return 0;
    }
    let hours: u32 = field[0..2].parse().unwrap_or(0);
    let minutes: u32 = field[2..4].parse().unwrap_or(0);
    let seconds = number(&field[4..]);

    // Out-of-range fields make the whole time unreadable
    if hours >= 24 || minutes >= 60 || !(0.0..60.0).contains(&seconds) {
        return 0;
    }

    (hours * 3600 + minutes * 60) * 1000 + (seconds * 1000.0 + 0.5) as u32
}
