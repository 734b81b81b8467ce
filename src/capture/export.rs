use chrono::{DateTime, Local};
use log::{error, info};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::models::transaction::Transaction;
use crate::utils::error::{AppError, AppResult};

/// Width of the rule under each entry header
const RULE_WIDTH: usize = 60;

/// Width of the rule between exported entries
const SEPARATOR_WIDTH: usize = 80;

/// Bytes added per entry by the batch separator
pub const SEPARATOR_OVERHEAD: usize = SEPARATOR_WIDTH + 4;

/// Text placed between entries in a batch export
pub fn batch_separator() -> String {
    format!("\n\n{}\n\n", "=".repeat(SEPARATOR_WIDTH))
}

/// Render one transaction as a text block
pub fn format(transaction: &Transaction) -> String {
    let rule = "-".repeat(RULE_WIDTH);
    let mut lines = vec![
        format!(
            "ENTRY #{} | {} | {}",
            transaction.sequence_number, transaction.method, transaction.url
        ),
        rule.clone(),
        transaction.request_header_block.clone(),
        String::new(),
        transaction.request_body.clone(),
    ];

    if transaction.has_response() {
        lines.push(format!("\n{}\nRESPONSE\n{}", rule, rule));
        lines.push(transaction.response_header_block.clone());
        lines.push(String::new());
        lines.push(transaction.response_body.clone());
    }

    lines.join("\n")
}

/// Render transactions in order, separated by a rule of '=' characters
pub fn format_batch(transactions: &[Transaction]) -> String {
    transactions
        .iter()
        .map(format)
        .collect::<Vec<_>>()
        .join(&batch_separator())
}

/// Bytes one transaction contributes to an export
pub fn estimate_size(transaction: &Transaction) -> usize {
    format(transaction).len() + SEPARATOR_OVERHEAD
}

/// Bytes an export of these transactions would take
pub fn estimate_total<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> usize {
    transactions.into_iter().map(estimate_size).sum()
}

/// Human-readable byte count
pub fn format_size(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// File name for an export made at `now`
pub fn export_file_name(filtered: bool, now: DateTime<Local>) -> String {
    let prefix = if filtered { "export_filtered" } else { "export" };
    format!("{}_{}.txt", prefix, now.format("%Y%m%d_%H%M%S"))
}

/// Default export path inside `dir`
pub fn default_export_path(dir: &Path, filtered: bool) -> PathBuf {
    dir.join(export_file_name(filtered, Local::now()))
}

/// Write a batch export to `path`. The parent directory must already exist.
/// Returns the number of bytes written.
pub fn write_export(path: &Path, transactions: &[Transaction]) -> AppResult<usize> {
    let text = format_batch(transactions);

    let result = File::create(path).and_then(|file| {
        let mut writer = BufWriter::new(file);
        writer.write_all(text.as_bytes())?;
        writer.flush()
    });

    match result {
        Ok(()) => {
            info!(
                "Exported {} transaction(s) ({}) to {}",
                transactions.len(),
                format_size(text.len()),
                path.display()
            );
            Ok(text.len())
        }
        Err(e) => {
            error!("Export to {} failed: {}", path.display(), e);
            Err(AppError::ExportError(format!("{}: {}", path.display(), e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::store::tests::transaction;
    use chrono::TimeZone;

    fn numbered(id: u64, status: u16) -> Transaction {
        let mut t = transaction("GET", &format!("http://a.com/{}", id), status, "HTML", "<p>hi</p>");
        t.sequence_number = id;
        t
    }

    #[test]
    fn test_format_with_response() {
        let text = format(&numbered(3, 200));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "ENTRY #3 | GET | http://a.com/3");
        assert_eq!(lines[1], "-".repeat(60));
        assert!(text.contains(&format!("\n\n{}\nRESPONSE\n{}\n", "-".repeat(60), "-".repeat(60))));
        assert!(text.ends_with("\n\n<p>hi</p>"));
    }

    #[test]
    fn test_format_without_response() {
        let mut t = numbered(1, 0);
        t.request_body = "a=1".to_string();
        let text = format(&t);
        assert!(!text.contains("RESPONSE"));
        assert_eq!(
            text,
            format!("ENTRY #1 | GET | http://a.com/1\n{}\nGET / HTTP/1.1\r\nHost: a.com\n\na=1", "-".repeat(60))
        );
    }

    #[test]
    fn test_batch_splits_back_into_entries() {
        let batch: Vec<Transaction> = (1..=4).map(|id| numbered(id, 200)).collect();
        let text = format_batch(&batch);
        assert_eq!(text.split(&batch_separator()).count(), 4);
        assert_eq!(format_batch(&batch[..1]), format(&batch[0]));
        assert_eq!(format_batch(&[]), "");
    }

    #[test]
    fn test_size_estimates() {
        let t = numbered(1, 200);
        assert_eq!(estimate_size(&t), format(&t).len() + 84);
        assert_eq!(estimate_total([&t, &t]), 2 * estimate_size(&t));
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
    }

    #[test]
    fn test_export_file_names() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(export_file_name(false, now), "export_20240309_140507.txt");
        assert_eq!(export_file_name(true, now), "export_filtered_20240309_140507.txt");
    }

    #[test]
    fn test_write_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let batch = vec![numbered(1, 200), numbered(2, 404)];
        let written = write_export(&path, &batch).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, contents.len());
        assert_eq!(contents, format_batch(&batch));
    }

    #[test]
    fn test_write_export_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.txt");
        let result = write_export(&path, &[numbered(1, 200)]);
        assert!(matches!(result, Err(AppError::ExportError(_))));
        assert!(!dir.path().join("missing").exists());
    }
}
