//! Progress reporting for a single transfer.

/// Progress of a transfer as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Whole-number percentage in `0..=100`.
    Percent(u8),
    /// Total size is unknown.
    Indeterminate,
}

impl Progress {
    /// Compute progress from bytes written and the (optional) total size.
    ///
    /// The percentage is floored and clamped to 100 so that a server sending
    /// more than it declared cannot push the bar past the end.
    pub fn from_bytes(downloaded: u64, total: Option<u64>) -> Self {
        match total {
            Some(0) => Self::Percent(100),
            Some(total) => {
                let pct = (downloaded as u128 * 100) / total as u128;
                Self::Percent(pct.min(100) as u8)
            }
            None => Self::Indeterminate,
        }
    }

    /// The percentage, if known.
    pub fn percent(&self) -> Option<u8> {
        match self {
            Self::Percent(p) => Some(*p),
            Self::Indeterminate => None,
        }
    }
}

/// Emitted after every chunk written to the partial file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Bytes held in the partial file, including resumed bytes.
    pub bytes_downloaded: u64,
    /// Total artifact size, when known.
    pub total_bytes: Option<u64>,
    /// Derived percentage or indeterminate marker.
    pub progress: Progress,
}
