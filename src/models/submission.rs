use regex::Regex;

use crate::models::position::Position;

/// One row of the submission spreadsheet, carried through the whole run.
///
/// The original cells are kept verbatim (aligned with the input header row)
/// so the report can replay them unchanged; the cleansed fields are only
/// present when the submitted values survived format validation.
#[derive(Debug, Clone)]
pub struct Submission {
    /// Zero-based row index in the input file, the key results are matched by
    pub index: usize,
    /// All original cells, in input header order
    pub cells: Vec<String>,
    pub original_signature: String,
    pub original_wallet: Option<String>,
    pub cleansed_signature: Option<String>,
    pub cleansed_wallet: Option<String>,
    /// Position address discovered by the classifier, if any
    pub position: Option<String>,
}

/// Result of resolving a submission to a position.
///
/// Replaces the reference implementation's hand-nulled 70-field record: the
/// assembler projects whichever variant into the fixed output schema.
#[derive(Debug, Clone)]
pub enum PositionOutcome {
    /// Reconstructed and fully USD-priced
    Valued(Box<Position>),
    /// Reconstructed, but at least one price quote was unavailable
    Unpriced(Box<Position>),
    /// No position could be resolved for the submitted signature
    NotFound,
}

impl PositionOutcome {
    pub fn from_position(position: Position) -> Self {
        if position.usd.is_some() {
            Self::Valued(Box::new(position))
        } else {
            Self::Unpriced(Box::new(position))
        }
    }

    pub fn position(&self) -> Option<&Position> {
        match self {
            Self::Valued(p) | Self::Unpriced(p) => Some(p),
            Self::NotFound => None,
        }
    }
}

/// Strip any `https://<host>/.../` prefix a submitter pasted around the
/// bare signature or wallet (e.g. a solscan link)
pub fn cleanse_submitted_value(value: &str) -> String {
    // Same pattern the reference tool applies to both columns.
    let re = Regex::new(r"https://([^/]+/)+").expect("invalid cleansing regex");
    re.replace(value.trim(), "").to_string()
}

/// A submitted signature must be base58 and 86-88 characters long
pub fn is_valid_signature(signature: &str) -> bool {
    if signature.len() < 86 || signature.len() > 88 {
        return false;
    }
    bs58::decode(signature).into_vec().is_ok()
}

/// A submitted wallet must be base58 and 43-44 characters long
pub fn is_valid_wallet(wallet: &str) -> bool {
    if wallet.len() < 43 || wallet.len() > 44 {
        return false;
    }
    bs58::decode(wallet).into_vec().is_ok()
}

impl Submission {
    /// Build a submission from one CSV row, cleansing and validating the
    /// signature/wallet columns. Rows that fail validation keep their
    /// original cells but no cleansed values, and pass through to the
    /// report with empty position fields.
    pub fn from_row(
        index: usize,
        cells: Vec<String>,
        signature_column: usize,
        wallet_column: Option<usize>,
    ) -> Self {
        let original_signature = cells.get(signature_column).cloned().unwrap_or_default();
        let original_wallet = wallet_column.and_then(|col| cells.get(col).cloned());

        let cleansed_signature = {
            let cleansed = cleanse_submitted_value(&original_signature);
            is_valid_signature(&cleansed).then_some(cleansed)
        };
        let cleansed_wallet = original_wallet.as_deref().and_then(|wallet| {
            let cleansed = cleanse_submitted_value(wallet);
            is_valid_wallet(&cleansed).then_some(cleansed)
        });

        // A row only proceeds to transaction fetch when the signature is
        // usable; when wallet matching is configured the wallet must also
        // survive cleansing, mirroring the reference behavior.
        let (cleansed_signature, cleansed_wallet) =
            if wallet_column.is_some() && cleansed_wallet.is_none() {
                (None, None)
            } else {
                (cleansed_signature, cleansed_wallet)
            };

        Self {
            index,
            cells,
            original_signature,
            original_wallet,
            cleansed_signature,
            cleansed_wallet,
            position: None,
        }
    }
}
