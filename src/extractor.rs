use std::path::Path;

use crate::categorizer::categorize;
use crate::error::{FinwiseError, Result};
use crate::models::{Category, ExtractedTransaction, FileType, TransactionType};

pub trait StatementExtractor {
    fn extract(&self, file_path: &Path, file_type: FileType) -> Result<Vec<ExtractedTransaction>>;
}

/// Remote service when a URL is configured, local CSV parsing otherwise.
pub fn extractor_for(url: Option<&str>) -> Box<dyn StatementExtractor> {
    match url {
        #[cfg(feature = "remote-extractor")]
        Some(url) => Box::new(RemoteExtractor::new(url)),
        #[cfg(not(feature = "remote-extractor"))]
        Some(url) => {
            log::warn!("Ignoring extractor URL {url}: built without remote-extractor");
            Box::new(CsvExtractor)
        }
        None => Box::new(CsvExtractor),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn parse_amount(raw: &str) -> Option<f64> {
    let s = raw.replace([',', '"', '$'], "");
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return inner.trim().parse::<f64>().ok().map(|v| -v);
    }
    s.parse().ok()
}

/// Accepts ISO (`2025-01-15`, `2025/01/15`) and US (`01/15/2025`) dates.
pub fn parse_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"]
        .iter()
        .find_map(|fmt| chrono::NaiveDate::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.format("%Y-%m-%d").to_string())
}

fn parse_kind(raw: &str) -> Option<TransactionType> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "income" | "credit" | "cr" | "deposit" => Some(TransactionType::Income),
        "expense" | "debit" | "dr" | "withdrawal" => Some(TransactionType::Expense),
        _ => None,
    }
}

#[derive(Debug, Default)]
struct Columns {
    date: Option<usize>,
    description: Option<usize>,
    amount: Option<usize>,
    debit: Option<usize>,
    credit: Option<usize>,
    kind: Option<usize>,
    category: Option<usize>,
}

impl Columns {
    fn from_header(record: &csv::StringRecord) -> Option<Self> {
        let mut cols = Columns::default();
        for (i, field) in record.iter().enumerate() {
            match field.trim().to_ascii_lowercase().as_str() {
                "date" | "transaction date" | "posting date" | "posted date" => {
                    cols.date.get_or_insert(i);
                }
                "description" | "payee" | "memo" | "details" | "narrative" | "name" => {
                    cols.description.get_or_insert(i);
                }
                "amount" | "transaction amount" => {
                    cols.amount.get_or_insert(i);
                }
                "debit" | "withdrawal" | "withdrawals" => {
                    cols.debit.get_or_insert(i);
                }
                "credit" | "deposit" | "deposits" => {
                    cols.credit.get_or_insert(i);
                }
                "type" | "transaction type" => {
                    cols.kind.get_or_insert(i);
                }
                "category" => {
                    cols.category.get_or_insert(i);
                }
                _ => {}
            }
        }
        let has_amount = cols.amount.is_some() || cols.debit.is_some() || cols.credit.is_some();
        (cols.date.is_some() && cols.description.is_some() && has_amount).then_some(cols)
    }

    fn field<'r>(record: &'r csv::StringRecord, idx: Option<usize>) -> Option<&'r str> {
        idx.and_then(|i| record.get(i)).map(str::trim).filter(|s| !s.is_empty())
    }

    fn row(&self, record: &csv::StringRecord) -> Option<ExtractedTransaction> {
        let date = parse_date(Self::field(record, self.date)?)?;
        let description = Self::field(record, self.description)?.to_string();
        if description.to_ascii_lowercase().contains("beginning balance") {
            return None;
        }

        let (signed, from_split_columns) = match Self::field(record, self.amount).and_then(parse_amount) {
            Some(amount) => (amount, false),
            None => {
                let debit = Self::field(record, self.debit).and_then(parse_amount);
                let credit = Self::field(record, self.credit).and_then(parse_amount);
                match (debit, credit) {
                    (Some(d), _) if d != 0.0 => (-d.abs(), true),
                    (_, Some(c)) if c != 0.0 => (c.abs(), true),
                    _ => return None,
                }
            }
        };
        if signed == 0.0 || !signed.is_finite() {
            return None;
        }

        let explicit_kind = Self::field(record, self.kind).and_then(parse_kind);
        let kind = match explicit_kind {
            Some(kind) if !from_split_columns => kind,
            _ if signed < 0.0 => TransactionType::Expense,
            _ => TransactionType::Income,
        };
        let category = Self::field(record, self.category)
            .and_then(Category::from_name)
            .unwrap_or_else(|| categorize(&description, kind));

        Some(ExtractedTransaction {
            date,
            description,
            amount: signed.abs(),
            kind,
            category,
        })
    }
}

// ---------------------------------------------------------------------------
// CsvExtractor
// ---------------------------------------------------------------------------

/// Local extraction for CSV exports. Bank preambles before the header row are skipped.
pub struct CsvExtractor;

impl CsvExtractor {
    pub fn parse_reader<R: std::io::Read>(reader: R) -> Result<Vec<ExtractedTransaction>> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        let mut columns: Option<Columns> = None;
        let mut rows = Vec::new();
        let mut unreadable = 0usize;

        for result in rdr.byte_records() {
            let raw = match result {
                Ok(raw) => raw,
                Err(e) => {
                    log::warn!("Skipping unreadable statement row: {e}");
                    unreadable += 1;
                    continue;
                }
            };
            // Lossy decode keeps rows from non-UTF-8 exports.
            let record: csv::StringRecord = raw.iter().map(String::from_utf8_lossy).collect();
            match &columns {
                None => columns = Columns::from_header(&record),
                Some(cols) => {
                    if let Some(txn) = cols.row(&record) {
                        rows.push(txn);
                    }
                }
            }
        }

        if unreadable > 0 {
            log::warn!("{unreadable} statement row(s) could not be read");
        }
        if columns.is_none() {
            return Err(FinwiseError::Extraction(
                "no header row with date, description and amount columns".into(),
            ));
        }
        Ok(rows)
    }
}

impl StatementExtractor for CsvExtractor {
    fn extract(&self, file_path: &Path, file_type: FileType) -> Result<Vec<ExtractedTransaction>> {
        match file_type {
            FileType::Csv => {
                let file = std::fs::File::open(file_path)?;
                Self::parse_reader(std::io::BufReader::new(file))
            }
            FileType::Pdf => Err(FinwiseError::UnsupportedFile(
                "PDF statements need an extraction service (set FINWISE_EXTRACTOR_URL)".into(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// RemoteExtractor
// ---------------------------------------------------------------------------

#[cfg(feature = "remote-extractor")]
pub use remote::RemoteExtractor;

#[cfg(feature = "remote-extractor")]
mod remote {
    use std::path::Path;

    use reqwest::blocking::{multipart, Client};
    use serde::Deserialize;

    use super::StatementExtractor;
    use crate::error::{FinwiseError, Result};
    use crate::models::{ExtractedTransaction, FileType};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ExtractResponse {
        Bare(Vec<ExtractedTransaction>),
        Wrapped { transactions: Vec<ExtractedTransaction> },
    }

    pub struct RemoteExtractor {
        url: String,
        client: Client,
    }

    impl RemoteExtractor {
        pub fn new(url: &str) -> Self {
            Self {
                url: url.to_string(),
                client: Client::new(),
            }
        }

        pub fn decode(body: &str) -> Result<Vec<ExtractedTransaction>> {
            let response: ExtractResponse = serde_json::from_str(body)
                .map_err(|e| FinwiseError::Extraction(format!("unexpected response: {e}")))?;
            let txns = match response {
                ExtractResponse::Bare(txns) => txns,
                ExtractResponse::Wrapped { transactions } => transactions,
            };
            Ok(txns
                .into_iter()
                .filter(|t| t.amount.is_finite())
                .map(|mut t| {
                    t.amount = t.amount.abs();
                    t
                })
                .collect())
        }
    }

    impl StatementExtractor for RemoteExtractor {
        fn extract(&self, file_path: &Path, file_type: FileType) -> Result<Vec<ExtractedTransaction>> {
            let bytes = std::fs::read(file_path)?;
            let file_name = file_path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("statement")
                .to_string();
            let part = multipart::Part::bytes(bytes)
                .file_name(file_name)
                .mime_str(file_type.mime())?;
            let form = multipart::Form::new()
                .text("fileType", file_type.key())
                .part("file", part);

            log::debug!("posting {} to {}", file_path.display(), self.url);
            let response = self.client.post(&self.url).multipart(form).send()?;
            let status = response.status();
            let body = response.text()?;
            if !status.is_success() {
                log::error!("Extraction service returned {status}");
                return Err(FinwiseError::Extraction(format!("service returned {status}")));
            }
            Self::decode(&body)
        }
    }
}
