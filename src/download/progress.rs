//! Point-in-time transfer measurements.

/// How far a transfer has progressed.
///
/// `percent` is on a 0-100 scale with two decimals. `percent` and
/// `total_bytes` are `None` when the transport cannot tell the total size
/// ahead of time, which is different from a total of zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    /// Completion percentage, if the total is known.
    pub percent: Option<f64>,
    /// Bytes received so far.
    pub bytes_written: u64,
    /// Total size of the resource, if known.
    pub total_bytes: Option<u64>,
}

impl ProgressSnapshot {
    /// Builds a snapshot from a byte count and an optional declared total.
    ///
    /// A declared total of zero is treated as unknown.
    pub fn from_bytes(bytes_written: u64, total_bytes: Option<u64>) -> Self {
        let total_bytes = total_bytes.filter(|total| *total > 0);
        let percent =
            total_bytes.map(|total| round_percent(bytes_written as f64 / total as f64 * 100.0));

        Self {
            percent,
            bytes_written,
            total_bytes,
        }
    }

    /// Builds a snapshot from a transport's own `0..=1` completion fraction.
    pub fn from_fraction(fraction: f64, bytes_written: u64, total_bytes: u64) -> Self {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };

        Self {
            percent: Some(round_percent(fraction * 100.0)),
            bytes_written,
            total_bytes: Some(total_bytes),
        }
    }

    /// Returns `true` once every declared byte has been received.
    pub fn is_complete(&self) -> bool {
        matches!(self.total_bytes, Some(total) if self.bytes_written >= total)
    }
}

/// Rounds a percentage to two decimals.
pub(crate) fn round_percent(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Number of peers serving a download.
///
/// Only reported by the content and torrent transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PeerCount {
    pub count: u32,
}

impl PeerCount {
    pub fn new(count: u32) -> Self {
        Self { count }
    }
}
