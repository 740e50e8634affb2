//! Incremental NMEA sentence parser
//!
//! Consumes the receiver's plain-text output one character at a time,
//! reassembles `$`-delimited sentences, verifies the running XOR checksum
//! against the two transmitted hex digits, and dispatches supported
//! sentences to their decoders to maintain a [`PositionFix`].
//!
//! The parser holds its assembly state across calls, so the stream may be
//! fed in any chunking - byte by byte or buffer at a time - with identical
//! results.

use crate::core::position::PositionFix;
use heapless::{String, Vec};

/// Maximum characters a sentence may span before it is abandoned
///
/// Slightly above the longest legal sentence (a full GGA); a sentence still
/// incomplete past this limit is garbage on the line.
pub const SENTENCE_LIMIT: usize = 90;

/// Maximum number of comma-separated segments in a sentence
const MAX_SEGMENTS: usize = 20;
/// Maximum characters per segment
const SEGMENT_SIZE: usize = 16;

/// Sentence types the parser decodes
///
/// Each is accepted from the GPS, GLONASS and combined-GNSS talkers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SentenceKind {
    /// Recommended minimum data: time, validity, position
    Rmc,
    /// Fix data: time, position, fix quality
    Gga,
    /// Geographic position: position, time, validity
    Gll,
}

impl SentenceKind {
    /// Look up a sentence header (the first segment, e.g. `GPRMC`)
    fn from_header(header: &str) -> Option<Self> {
        match header {
            "GPRMC" | "GLRMC" | "GNRMC" => Some(SentenceKind::Rmc),
            "GPGGA" | "GLGGA" | "GNGGA" => Some(SentenceKind::Gga),
            "GPGLL" | "GLGLL" | "GNGLL" => Some(SentenceKind::Gll),
            _ => None,
        }
    }
}

/// Stream statistics for monitoring and diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ParserStats {
    /// Sentences whose transmitted checksum did not match
    pub crc_fails: u32,
    /// Sentences received intact (checksum verified)
    pub clean_sentences: u32,
    /// Clean sentences that were recognized and decoded
    pub parsed_sentences: u32,
}

/// Incremental sentence parser
///
/// Feed every received character to [`update`](NmeaParser::update); when a
/// supported sentence completes cleanly the return value names it and the
/// position snapshot has been refreshed.
#[derive(Debug)]
pub struct NmeaParser {
    sentence_active: bool,
    process_crc: bool,
    crc_xor: u8,
    char_count: usize,
    segments: Vec<String<SEGMENT_SIZE>, MAX_SEGMENTS>,
    stats: ParserStats,
    fix: PositionFix,
}

impl NmeaParser {
    /// Create a parser with no fix held
    pub fn new() -> Self {
        Self {
            sentence_active: false,
            process_crc: false,
            crc_xor: 0,
            char_count: 0,
            segments: Vec::new(),
            stats: ParserStats::default(),
            fix: PositionFix::default(),
        }
    }

    /// Current position snapshot
    pub fn position(&self) -> PositionFix {
        self.fix
    }

    /// Stream statistics
    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    /// Reset assembly state for a new sentence
    fn new_sentence(&mut self) {
        self.segments.clear();
        self.segments.push(String::new()).ok();
        self.crc_xor = 0;
        self.sentence_active = true;
        self.process_crc = true;
        self.char_count = 0;
    }

    /// Abandon the sentence in progress
    fn abandon(&mut self) {
        self.sentence_active = false;
    }

    /// Process one input character
    ///
    /// `now_ms` is the monotonic timestamp stamped onto the fix if this
    /// character completes a valid position update. Returns the sentence
    /// kind when a supported sentence was decoded, `None` otherwise.
    pub fn update(&mut self, byte: u8, now_ms: u64) -> Option<SentenceKind> {
        // Only printable characters participate; noise bytes are dropped
        if !(10..=126).contains(&byte) {
            return None;
        }
        self.char_count += 1;

        if byte == b'$' {
            self.new_sentence();
            return None;
        }

        if !self.sentence_active {
            return None;
        }

        let mut checksum_verified = false;

        match byte {
            // End of data segments; the next two characters are the
            // transmitted checksum and are excluded from accumulation
            b'*' => {
                self.process_crc = false;
                if self.segments.push(String::new()).is_err() {
                    self.abandon();
                }
                return None;
            }
            // Segment separator (included in the checksum)
            b',' => {
                if self.segments.push(String::new()).is_err() {
                    self.abandon();
                    return None;
                }
            }
            _ => {
                let Some(segment) = self.segments.last_mut() else {
                    self.abandon();
                    return None;
                };
                if segment.push(byte as char).is_err() {
                    self.abandon();
                    return None;
                }

                // With accumulation off, two hex digits complete the sentence
                if !self.process_crc && segment.len() == 2 {
                    if let Ok(transmitted) = u8::from_str_radix(segment.as_str(), 16) {
                        if transmitted == self.crc_xor {
                            checksum_verified = true;
                        } else {
                            self.stats.crc_fails += 1;
                        }
                    }
                    // A deformed checksum field cannot have been correct;
                    // the sentence is dropped without a CRC-fail count
                }
            }
        }

        if self.process_crc {
            self.crc_xor ^= byte;
        }

        if checksum_verified {
            self.stats.clean_sentences += 1;
            self.sentence_active = false;

            let kind = self
                .segments
                .first()
                .and_then(|header| SentenceKind::from_header(header));
            if let Some(kind) = kind {
                let decoded = match kind {
                    SentenceKind::Rmc => self.decode_rmc(now_ms),
                    SentenceKind::Gga => self.decode_gga(now_ms),
                    SentenceKind::Gll => self.decode_gll(now_ms),
                };
                if decoded {
                    self.stats.parsed_sentences += 1;
                    return Some(kind);
                }
            }
        }

        // A sentence that keeps growing without completing is garbage
        if self.char_count > SENTENCE_LIMIT {
            self.abandon();
        }

        None
    }

    fn segment(&self, index: usize) -> &str {
        self.segments.get(index).map(|s| s.as_str()).unwrap_or("")
    }

    /// Decode RMC: `$GPRMC,hhmmss,A,ddmm.mmmm,N,dddmm.mmmm,E,...`
    fn decode_rmc(&mut self, now_ms: u64) -> bool {
        let Ok(utc_time) = self.segment(1).parse::<f64>() else {
            return false;
        };

        if self.segment(2) == "A" {
            let Some(latitude) = parse_coordinate(self.segment(3), self.segment(4), "N") else {
                return false;
            };
            let Some(longitude) = parse_coordinate(self.segment(5), self.segment(6), "E") else {
                return false;
            };
            self.commit_fix(latitude, longitude, utc_time, now_ms);
        } else {
            self.fix.utc_time = utc_time;
            self.fix.invalidate();
        }
        true
    }

    /// Decode GLL: `$GPGLL,ddmm.mmmm,N,dddmm.mmmm,E,hhmmss,A,...`
    fn decode_gll(&mut self, now_ms: u64) -> bool {
        let Ok(utc_time) = self.segment(5).parse::<f64>() else {
            return false;
        };

        if self.segment(6) == "A" {
            let Some(latitude) = parse_coordinate(self.segment(1), self.segment(2), "N") else {
                return false;
            };
            let Some(longitude) = parse_coordinate(self.segment(3), self.segment(4), "E") else {
                return false;
            };
            self.commit_fix(latitude, longitude, utc_time, now_ms);
        } else {
            self.fix.utc_time = utc_time;
            self.fix.invalidate();
        }
        true
    }

    /// Decode GGA: `$GPGGA,hhmmss,ddmm.mmmm,N,dddmm.mmmm,E,q,...`
    ///
    /// GGA carries a numeric fix-quality indicator instead of the A/V flag;
    /// quality zero clears the position without being a decode failure.
    fn decode_gga(&mut self, now_ms: u64) -> bool {
        let Ok(utc_time) = self.segment(1).parse::<f64>() else {
            return false;
        };
        let Ok(fix_quality) = self.segment(6).parse::<u32>() else {
            return false;
        };

        if fix_quality != 0 {
            let Some(latitude) = parse_coordinate(self.segment(2), self.segment(3), "N") else {
                return false;
            };
            let Some(longitude) = parse_coordinate(self.segment(4), self.segment(5), "E") else {
                return false;
            };
            self.commit_fix(latitude, longitude, utc_time, now_ms);
        } else {
            self.fix.utc_time = utc_time;
            self.fix.invalidate();
        }
        true
    }

    /// Replace the whole snapshot in one step so readers never observe a
    /// partially-updated position
    fn commit_fix(&mut self, latitude: f64, longitude: f64, utc_time: f64, now_ms: u64) {
        self.fix = PositionFix {
            latitude,
            longitude,
            utc_time,
            valid: true,
            fix_time_ms: now_ms,
        };
    }
}

impl Default for NmeaParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a degrees-minutes field and its hemisphere letter to signed
/// decimal degrees
///
/// Latitude is `ddmm.mmmm` (two degree digits), longitude `dddmm.mmmm`
/// (three); which is selected by `positive`, the hemisphere letter that
/// yields a positive sign (`"N"` or `"E"`). The hemisphere must be one of
/// N/S/E/W and the numeric parts well-formed, else the value is a decode
/// failure.
fn parse_coordinate(value: &str, hemisphere: &str, positive: &str) -> Option<f64> {
    let degree_digits = if positive == "N" { 2 } else { 3 };
    if !matches!(hemisphere, "N" | "S" | "E" | "W") {
        return None;
    }
    if value.len() < degree_digits {
        return None;
    }

    let degrees: u32 = value[..degree_digits].parse().ok()?;
    let minutes: f64 = value[degree_digits..].parse().ok()?;
    let magnitude = degrees as f64 + minutes / 60.0;

    Some(if hemisphere == positive {
        magnitude
    } else {
        -magnitude
    })
}
