//! Wire file parsing.
//!
//! Format: comma-separated lines of `name,amount,routing,account,rail`,
//! with an optional header. Fields may not themselves contain commas —
//! these files come from back-office templates, not free-form exports.
//! The raw routing/account columns exist only until tokenization.

use clearhold_types::{BankDetails, ClearholdError, PaymentRail, Result};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

/// One validated line, bank details still raw (pre-tokenization).
#[derive(Debug, Clone)]
pub struct ParsedLine {
    /// 1-based data line number (header excluded).
    pub line_number: u32,
    pub name: String,
    pub amount: Decimal,
    pub bank: BankDetails,
    pub rail: PaymentRail,
}

/// SHA-256 over the raw uploaded content, for tamper detection.
#[must_use]
pub fn content_hash(contents: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"clearhold:wirefile:v1:");
    hasher.update(contents.as_bytes());
    hasher.finalize().into()
}

/// Parse a wire file into validated line items.
///
/// Zero-amount lines are accepted here and skipped at execution time;
/// negative amounts are a parse error.
pub fn parse_wire_file(contents: &str) -> Result<Vec<ParsedLine>> {
    let mut lines = Vec::new();
    let mut line_number: u32 = 0;

    for raw in contents.lines() {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        // Header detection: first non-empty line naming the columns.
        if line_number == 0 && raw.to_ascii_lowercase().starts_with("name,") {
            continue;
        }
        line_number += 1;

        let fields: Vec<&str> = raw.split(',').map(str::trim).collect();
        if fields.len() != 5 {
            return Err(ClearholdError::BatchParse {
                line: line_number,
                reason: format!("expected 5 fields, got {}", fields.len()),
            });
        }

        let name = fields[0];
        if name.is_empty() {
            return Err(ClearholdError::BatchParse {
                line: line_number,
                reason: "recipient name is empty".into(),
            });
        }

        let amount: Decimal = fields[1].parse().map_err(|_| ClearholdError::BatchParse {
            line: line_number,
            reason: format!("bad amount: {}", fields[1]),
        })?;
        if amount < Decimal::ZERO {
            return Err(ClearholdError::BatchParse {
                line: line_number,
                reason: format!("negative amount: {amount}"),
            });
        }

        if fields[2].is_empty() || fields[3].is_empty() {
            return Err(ClearholdError::BatchParse {
                line: line_number,
                reason: "missing routing or account number".into(),
            });
        }

        let rail: PaymentRail = fields[4].parse().map_err(|e: String| {
            ClearholdError::BatchParse {
                line: line_number,
                reason: e,
            }
        })?;

        lines.push(ParsedLine {
            line_number,
            name: name.to_string(),
            amount,
            bank: BankDetails {
                account_holder: name.to_string(),
                routing_number: fields[2].to_string(),
                account_number: fields[3].to_string(),
            },
            rail,
        });
    }

    Ok(lines)
}
