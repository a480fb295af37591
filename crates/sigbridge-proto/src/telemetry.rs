//! Packed coprocessor telemetry word.
//!
//! One full telemetry sample does not fit a single RPC round trip, so the
//! coprocessor splits it across two "pages" selected by the top bit of the
//! 64-bit word:
//!
//! ```text
//! bit 63    62..58      57..38       37..18       17..0
//! page=0 | flags[5] | volt[20]   | curr[20]   | unused
//!
//! bit 63    62..43        42..23       22..0
//! page=1 | curr_set[20] | temp[20]  | unused
//! ```
//!
//! All 20-bit fields are two's-complement and must be sign-extended; the
//! flags field is unsigned. A [`SampleMerge`] accumulates fields from both
//! pages and yields a [`TelemetrySample`] only once all five are present,
//! then resets so a stale page can never be merged with a fresh one.

/// Sign-extend an unsigned field of `bits` width (two's complement).
///
/// A raw value with its high bit set is reinterpreted as negative by
/// subtracting `2^bits`.
#[must_use]
pub fn sign_extend(raw: u64, bits: u32) -> i64 {
    debug_assert!(bits > 0 && bits < 64 && raw < (1 << bits));
    if raw >= 1 << (bits - 1) { raw as i64 - (1i64 << bits) } else { raw as i64 }
}

/// Width of every signed telemetry field.
const FIELD_BITS: u32 = 20;

/// Mask for a 20-bit field.
const FIELD_MASK: u64 = 0xF_FFFF;

/// One decoded telemetry page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryPage {
    /// Page 0: status flags plus measured voltage/current.
    Measured {
        /// 5-bit status flag field (bit 0 = external enable).
        flags: u8,
        /// Raw voltage, centivolts.
        volt_raw: i64,
        /// Raw current, centiamps.
        curr_raw: i64,
    },

    /// Page 1: commanded current and temperature.
    Setpoint {
        /// Raw current setpoint, centiamps.
        curr_set_raw: i64,
        /// Raw temperature.
        temp_raw: i64,
    },
}

impl TelemetryPage {
    /// Decode one RPC poll word.
    #[must_use]
    pub fn decode(word: u64) -> Self {
        if (word >> 63) & 1 == 0 {
            Self::Measured {
                flags: ((word >> 58) & 0x1F) as u8,
                volt_raw: sign_extend((word >> 38) & FIELD_MASK, FIELD_BITS),
                curr_raw: sign_extend((word >> 18) & FIELD_MASK, FIELD_BITS),
            }
        } else {
            Self::Setpoint {
                curr_set_raw: sign_extend((word >> 43) & FIELD_MASK, FIELD_BITS),
                temp_raw: sign_extend((word >> 23) & FIELD_MASK, FIELD_BITS),
            }
        }
    }
}

/// One complete telemetry sample, merged from both pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetrySample {
    /// 5-bit status flag field.
    pub flags: u8,
    /// Raw measured voltage, centivolts.
    pub volt_raw: i64,
    /// Raw measured current, centiamps.
    pub curr_raw: i64,
    /// Raw current setpoint, centiamps.
    pub curr_set_raw: i64,
    /// Raw temperature.
    pub temp_raw: i64,
}

impl TelemetrySample {
    /// External-enable flag (bit 0 of the flag field).
    #[must_use]
    pub fn extern_enable(&self) -> bool {
        self.flags & 1 != 0
    }

    /// Measured voltage in volts, rounded to 2 decimals.
    #[must_use]
    pub fn volt(&self) -> f64 {
        centi_round(self.volt_raw)
    }

    /// Measured current in amps, rounded to 2 decimals.
    #[must_use]
    pub fn curr(&self) -> f64 {
        centi_round(self.curr_raw)
    }
}

/// `raw / 100.0` rounded to 2 decimals.
fn centi_round(raw: i64) -> f64 {
    ((raw as f64 / 100.0) * 100.0).round() / 100.0
}

/// Accumulates pages until a full sample is available.
///
/// `absorb` returns `Some` exactly when the last missing field arrives and
/// clears the buffer, so both pages must arrive again before the next
/// sample. Partial or stale merges are never published.
#[derive(Debug, Default)]
pub struct SampleMerge {
    flags: Option<u8>,
    volt_raw: Option<i64>,
    curr_raw: Option<i64>,
    curr_set_raw: Option<i64>,
    temp_raw: Option<i64>,
}

impl SampleMerge {
    /// Create an empty merge buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one page in; yields a sample once both pages have arrived.
    pub fn absorb(&mut self, page: TelemetryPage) -> Option<TelemetrySample> {
        match page {
            TelemetryPage::Measured { flags, volt_raw, curr_raw } => {
                self.flags = Some(flags);
                self.volt_raw = Some(volt_raw);
                self.curr_raw = Some(curr_raw);
            },
            TelemetryPage::Setpoint { curr_set_raw, temp_raw } => {
                self.curr_set_raw = Some(curr_set_raw);
                self.temp_raw = Some(temp_raw);
            },
        }

        let sample = TelemetrySample {
            flags: self.flags?,
            volt_raw: self.volt_raw?,
            curr_raw: self.curr_raw?,
            curr_set_raw: self.curr_set_raw?,
            temp_raw: self.temp_raw?,
        };

        *self = Self::default();
        Some(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a page-0 word from unsigned raw fields.
    fn page0(flags: u64, volt: u64, curr: u64) -> u64 {
        (flags & 0x1F) << 58 | (volt & FIELD_MASK) << 38 | (curr & FIELD_MASK) << 18
    }

    /// Build a page-1 word from unsigned raw fields.
    fn page1(curr_set: u64, temp: u64) -> u64 {
        1 << 63 | (curr_set & FIELD_MASK) << 43 | (temp & FIELD_MASK) << 23
    }

    #[test]
    fn sign_extension_edge_values() {
        assert_eq!(sign_extend(0xF_FFFF, 20), -1);
        assert_eq!(sign_extend(0x7_FFFF, 20), (1 << 19) - 1);
        assert_eq!(sign_extend(0x8_0000, 20), -(1 << 19));
        assert_eq!(sign_extend(0, 20), 0);
        assert_eq!(sign_extend(500, 20), 500);
    }

    #[test]
    fn decodes_measured_page() {
        let word = page0(0b00101, 500, 0xF_FFFF);
        assert_eq!(
            TelemetryPage::decode(word),
            TelemetryPage::Measured { flags: 0b00101, volt_raw: 500, curr_raw: -1 }
        );
    }

    #[test]
    fn decodes_setpoint_page() {
        let word = page1(0x8_0000, 2150);
        assert_eq!(
            TelemetryPage::decode(word),
            TelemetryPage::Setpoint { curr_set_raw: -(1 << 19), temp_raw: 2150 }
        );
    }

    #[test]
    fn merge_commits_only_with_both_pages() {
        let mut merge = SampleMerge::new();

        assert!(merge.absorb(TelemetryPage::decode(page0(1, 500, 120))).is_none());
        // Same page again: still no commit
        assert!(merge.absorb(TelemetryPage::decode(page0(1, 501, 121))).is_none());

        let sample = merge
            .absorb(TelemetryPage::decode(page1(300, 2150)))
            .expect("second page completes the sample");
        assert_eq!(sample.flags, 1);
        assert_eq!(sample.volt_raw, 501);
        assert_eq!(sample.curr_raw, 121);
        assert_eq!(sample.curr_set_raw, 300);
        assert_eq!(sample.temp_raw, 2150);

        // Buffer cleared: a lone page does not commit again
        assert!(merge.absorb(TelemetryPage::decode(page1(300, 2150))).is_none());
    }

    #[test]
    fn sample_derivations() {
        let sample =
            TelemetrySample { flags: 0b10, volt_raw: 500, curr_raw: -37, curr_set_raw: 0, temp_raw: 0 };
        assert!(!sample.extern_enable());
        assert!((sample.volt() - 5.0).abs() < 1e-9);
        assert!((sample.curr() + 0.37).abs() < 1e-9);

        let sample = TelemetrySample { flags: 1, ..sample };
        assert!(sample.extern_enable());
    }
}
