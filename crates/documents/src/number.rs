//! Human-facing document numbers: `PREFIX-YEAR-NNN`.

use serde::{Deserialize, Serialize};

use stockflow_core::{DomainError, ValueObject};

use crate::document::DocumentKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentNumber {
    pub kind: DocumentKind,
    pub year: i32,
    pub sequence: u32,
}

impl ValueObject for DocumentNumber {}

impl DocumentNumber {
    pub fn prefix(kind: DocumentKind) -> &'static str {
        match kind {
            DocumentKind::Receipt => "RCV",
            DocumentKind::Transfer => "TRF",
            DocumentKind::WriteOff => "WOF",
            DocumentKind::Adjustment => "ADJ",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let invalid = || DomainError::validation(format!("malformed document number '{raw}'"));

        let mut parts = raw.trim().splitn(3, '-');
        let (Some(prefix), Some(year), Some(sequence)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        let kind = [
            DocumentKind::Receipt,
            DocumentKind::Transfer,
            DocumentKind::WriteOff,
            DocumentKind::Adjustment,
        ]
        .into_iter()
        .find(|k| Self::prefix(*k) == prefix)
        .ok_or_else(invalid)?;

        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let sequence = sequence.parse::<u32>().map_err(|_| invalid())?;
        if sequence == 0 {
            return Err(invalid());
        }

        Ok(Self {
            kind,
            year,
            sequence,
        })
    }

    /// Next number for `kind` in `year`, one past the highest already issued.
    ///
    /// Strings that do not parse, or belong to another kind or year, are ignored.
    pub fn next<'a, I>(kind: DocumentKind, year: i32, existing: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let sequence = existing
            .into_iter()
            .filter_map(|raw| Self::parse(raw).ok())
            .filter(|n| n.kind == kind && n.year == year)
            .map(|n| n.sequence)
            .max()
            .unwrap_or(0)
            + 1;

        Self {
            kind,
            year,
            sequence,
        }
    }
}

impl core::fmt::Display for DocumentNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}-{}-{:03}",
            Self::prefix(self.kind),
            self.year,
            self.sequence
        )
    }
}
