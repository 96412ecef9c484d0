// Document text extraction for knowledge ingestion
// Supported formats match what training-file uploads accept: txt, md,
// json, jsonl, csv, pdf.

use crate::types::{AppError, AppResult};
use std::path::Path;
use tracing::debug;

/// Plain text pulled out of one uploaded file, tagged with its source
/// filename so chunk metadata can point back at it.
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub source: String,
    pub content: String,
}

pub fn extract_files(paths: &[std::path::PathBuf]) -> AppResult<Vec<ExtractedDocument>> {
    paths.iter().map(|p| extract_file(p)).collect()
}

pub fn extract_file(path: &Path) -> AppResult<ExtractedDocument> {
    let source = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let content = match ext.as_str() {
        "txt" | "md" | "markdown" => std::fs::read_to_string(path)
            .map_err(|e| AppError::Validation(format!("cannot read {source}: {e}")))?,
        "json" => {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| AppError::Validation(format!("cannot read {source}: {e}")))?;
            let value: serde_json::Value = serde_json::from_str(&raw)
                .map_err(|e| AppError::Validation(format!("invalid JSON in {source}: {e}")))?;
            collect_json_text(&value)
        }
        "jsonl" => {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| AppError::Validation(format!("cannot read {source}: {e}")))?;
            raw.lines()
                .filter(|line| !line.trim().is_empty())
                .map(|line| {
                    serde_json::from_str::<serde_json::Value>(line)
                        .map(|v| collect_json_text(&v))
                        .map_err(|e| {
                            AppError::Validation(format!("invalid JSON line in {source}: {e}"))
                        })
                })
                .collect::<AppResult<Vec<_>>>()?
                .join("\n")
        }
        "csv" => extract_csv(path, &source)?,
        "pdf" => extract_pdf(path, &source)?,
        other => {
            return Err(AppError::Validation(format!(
                "unsupported training file type: .{other}"
            )))
        }
    };

    debug!(source, chars = content.chars().count(), "Extracted document");
    Ok(ExtractedDocument { source, content })
}

/// Every string leaf in the document, in order. Training JSON has no fixed
/// schema, so text is wherever the strings are.
fn collect_json_text(value: &serde_json::Value) -> String {
    let mut out = Vec::new();
    collect_strings(value, &mut out);
    out.join("\n")
}

fn collect_strings(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) => {
            if !s.trim().is_empty() {
                out.push(s.trim().to_string());
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                collect_strings(item, out);
            }
        }
        serde_json::Value::Object(map) => {
            for item in map.values() {
                collect_strings(item, out);
            }
        }
        _ => {}
    }
}

/// One line per row, `header: value` pairs joined with commas, so chunks
/// keep column context.
fn extract_csv(path: &Path, source: &str) -> AppResult<String> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| AppError::Validation(format!("cannot read {source}: {e}")))?;
    let headers = reader
        .headers()
        .map_err(|e| AppError::Validation(format!("invalid CSV in {source}: {e}")))?
        .clone();

    let mut lines = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| AppError::Validation(format!("invalid CSV in {source}: {e}")))?;
        let line = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| format!("{h}: {v}"))
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

fn extract_pdf(path: &Path, source: &str) -> AppResult<String> {
    let doc = lopdf::Document::load(path)
        .map_err(|e| AppError::Validation(format!("cannot parse PDF {source}: {e}")))?;
    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    doc.extract_text(&pages)
        .map_err(|e| AppError::Validation(format!("cannot extract text from {source}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("agentforge-test-{name}"));
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents).unwrap();
        path
    }

    #[test]
    fn test_extract_txt() {
        let path = temp_file("doc.txt", b"plain text body");
        let doc = extract_file(&path).unwrap();
        assert_eq!(doc.content, "plain text body");
        assert_eq!(doc.source, "agentforge-test-doc.txt");
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_extract_json_string_leaves() {
        let path = temp_file(
            "doc.json",
            br#"{"texts": ["first", "second"], "meta": {"note": "third"}, "count": 3}"#,
        );
        let doc = extract_file(&path).unwrap();
        assert!(doc.content.contains("first"));
        assert!(doc.content.contains("second"));
        assert!(doc.content.contains("third"));
        assert!(!doc.content.contains('3'));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_extract_csv_rows_keep_headers() {
        let path = temp_file("doc.csv", b"name,policy\nreturns,30 days\nshipping,5 days\n");
        let doc = extract_file(&path).unwrap();
        assert!(doc.content.contains("name: returns, policy: 30 days"));
        assert!(doc.content.contains("name: shipping, policy: 5 days"));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_unsupported_extension_rejected() {
        let path = temp_file("doc.exe", b"binary");
        let error = extract_file(&path).unwrap_err();
        assert!(matches!(error, AppError::Validation(_)));
        std::fs::remove_file(path).ok();
    }
}
