use serde::Serialize;

/// Paper state reported by the printer. The device speaks in numeric codes;
/// anything outside the three documented codes decodes to `Invalid` rather
/// than an error, so a confused printer can never fail a status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperStatus {
    Empty,
    NearEnd,
    Plenty,
    Invalid,
}

impl PaperStatus {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => PaperStatus::Empty,
            1 => PaperStatus::NearEnd,
            2 => PaperStatus::Plenty,
            _ => PaperStatus::Invalid,
        }
    }
}
