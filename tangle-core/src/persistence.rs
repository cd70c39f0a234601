//! Line-oriented transaction log
//!
//! One record per line, comma separated:
//!
//! ```text
//! id,sender,receiver,amount,fee,timestamp,hash[,parent_hash...]
//! ```
//!
//! The timestamp is unix seconds. Adjacency is never stored; it is rebuilt
//! from each record's parent list on load. Malformed lines are skipped and
//! reported, they never abort a load.

use crate::{
    error::{ParseError, Result},
    types::{AccountId, Transaction, TxHash, TxId},
};
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use std::{
    fs::{self, File},
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
    str::FromStr,
};

const FIXED_FIELDS: usize = 7;

/// Records read back from a log
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Successfully decoded records, in file order
    pub records: Vec<Transaction>,

    /// Lines that could not be decoded
    pub skipped: Vec<ParseError>,
}

/// Flat file store for transaction records
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionLog;

impl TransactionLog {
    /// Write every record, replacing the file. Returns the number written.
    pub fn save<'a, I>(path: impl AsRef<Path>, records: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }

        // Id order keeps diffs between saves readable
        let mut records: Vec<&Transaction> = records.into_iter().collect();
        records.sort_by_key(|tx| tx.id());

        let mut writer = BufWriter::new(File::create(path)?);
        for tx in &records {
            writeln!(writer, "{}", to_log_line(tx))?;
        }
        writer.flush()?;

        tracing::info!(path = %path.display(), records = records.len(), "Saved transaction log");
        Ok(records.len())
    }

    /// Read a log, skipping blank and malformed lines
    pub fn load(path: impl AsRef<Path>) -> Result<LoadReport> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let mut report = LoadReport::default();

        for (index, raw) in reader.split(b'\n').enumerate() {
            let raw = raw?;
            let decoded = String::from_utf8(raw).map_err(|e| {
                ParseError::new(format!("line is not valid UTF-8: {}", e.utf8_error()))
            });
            let parsed = decoded.and_then(|line| {
                if line.trim().is_empty() {
                    Ok(None)
                } else {
                    from_log_line(&line).map(Some)
                }
            });
            match parsed {
                Ok(None) => {}
                Ok(Some(tx)) => report.records.push(tx),
                Err(e) => {
                    let e = e.at_line(index + 1);
                    tracing::warn!(line = e.line, reason = %e.reason, "Skipping malformed log line");
                    report.skipped.push(e);
                }
            }
        }

        tracing::info!(
            path = %path.display(),
            records = report.records.len(),
            skipped = report.skipped.len(),
            "Loaded transaction log"
        );
        Ok(report)
    }
}

/// Encode one record as a log line (no trailing newline)
pub fn to_log_line(tx: &Transaction) -> String {
    let mut fields = vec![
        tx.id().to_string(),
        tx.sender().to_string(),
        tx.receiver().to_string(),
        tx.amount().to_string(),
        tx.fee().to_string(),
        tx.timestamp().timestamp().to_string(),
        tx.hash().to_hex(),
    ];
    fields.extend(tx.parents().iter().map(TxHash::to_hex));
    fields.join(",")
}

/// Decode one log line.
///
/// The hash is recomputed from the fields and must match the stored one.
pub fn from_log_line(line: &str) -> std::result::Result<Transaction, ParseError> {
    let fields: Vec<&str> = line.trim_end_matches(&['\r', '\n'][..]).split(',').collect();
    if fields.len() < FIXED_FIELDS {
        return Err(ParseError::new(format!(
            "expected at least {} fields, found {}",
            FIXED_FIELDS,
            fields.len()
        )));
    }

    let id: u64 = fields[0]
        .trim()
        .parse()
        .map_err(|e| ParseError::new(format!("bad id {:?}: {}", fields[0], e)))?;
    let amount = parse_decimal("amount", fields[3])?;
    let fee = parse_decimal("fee", fields[4])?;
    let secs: i64 = fields[5]
        .trim()
        .parse()
        .map_err(|e| ParseError::new(format!("bad timestamp {:?}: {}", fields[5], e)))?;
    let timestamp = Utc
        .timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| ParseError::new(format!("timestamp {} out of range", secs)))?;
    let stored: TxHash = fields[6].parse()?;

    let parents = fields[FIXED_FIELDS..]
        .iter()
        .filter(|f| !f.trim().is_empty())
        .map(|f| f.parse::<TxHash>())
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let tx = Transaction::create(
        TxId::new(id),
        AccountId::new(fields[1]),
        AccountId::new(fields[2]),
        amount,
        fee,
        timestamp,
        parents,
    )
    .map_err(|e| ParseError::new(e.to_string()))?;

    if tx.hash() != stored {
        return Err(ParseError::new(format!(
            "hash mismatch for id {}: stored {}, computed {}",
            id,
            stored,
            tx.hash()
        )));
    }

    Ok(tx)
}

fn parse_decimal(name: &str, field: &str) -> std::result::Result<Decimal, ParseError> {
    Decimal::from_str(field.trim()).map_err(|e| ParseError::new(format!("bad {} {:?}: {}", name, field, e)))
}
