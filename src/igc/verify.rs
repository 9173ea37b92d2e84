//! # G-Record Verifier
//!
//! Re-reads an IGC file produced by the writer, recomputes the digest bank
//! over its B records and checks the trailing G records.

use super::digest::DigestBank;
use super::encoder::encode_g_records;
use super::protocol::*;
use crate::error::{IgcLoggerError, Result};

/// Summary of a successfully verified file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    /// H and I lines between the A record and the first fix
    pub header_lines: usize,
    /// B records covered by the trailer
    pub fix_count: usize,
    /// Trailer layout, `None` for a header-only file
    pub layout: Option<GRecordLayout>,
}

fn fail(message: impl Into<String>) -> IgcLoggerError {
    IgcLoggerError::Verification(message.into())
}

/// Verify the G records of a complete IGC file
///
/// # Arguments
///
/// * `contents` - Raw file bytes
///
/// # Returns
///
/// * `Result<VerifyReport>` - Line counts, or error if the file is malformed
///
/// # Errors
///
/// Returns error if:
/// - The file does not start with an A record
/// - A line is not terminated by CRLF
/// - Records appear out of order
/// - Fixes are present without a 2 or 8 line G trailer
/// - The G records do not match the recomputed digests
pub fn verify(contents: &[u8]) -> Result<VerifyReport> {
    if !contents.ends_with(IGC_EOL) {
        return Err(fail("file does not end with CRLF"));
    }

    let body = &contents[..contents.len() - IGC_EOL.len()];
    let lines: Vec<&[u8]> = split_crlf(body);

    if lines.first().map(|l| l.first()) != Some(Some(&b'A')) {
        return Err(fail("first record is not an A record"));
    }

    let mut header_lines = 0;
    let mut fixes: Vec<&[u8]> = Vec::new();
    let mut g_lines: Vec<&[u8]> = Vec::new();

    for (index, line) in lines.iter().copied().enumerate().skip(1) {
        match line.first() {
            Some(b'H') | Some(b'I') if fixes.is_empty() && g_lines.is_empty() => header_lines += 1,
            Some(b'B') if g_lines.is_empty() => fixes.push(line),
            Some(b'G') => g_lines.push(line),
            _ => {
                return Err(fail(format!(
                    "unexpected record on line {}: {:?}",
                    index + 1,
                    String::from_utf8_lossy(line)
                )))
            }
        }
    }

    if fixes.is_empty() && g_lines.is_empty() {
        return Ok(VerifyReport {
            header_lines,
            fix_count: 0,
            layout: None,
        });
    }

    let layout = GRecordLayout::from_line_count(g_lines.len())
        .ok_or_else(|| fail(format!("expected 2 or 8 G records, found {}", g_lines.len())))?;

    let mut bank = DigestBank::new();
    for fix in &fixes {
        if fix.len() != FIX_RECORD_LEN {
            return Err(fail(format!("fix record has {} bytes, expected {}", fix.len(), FIX_RECORD_LEN)));
        }
        bank.update(fix);
    }

    let expected = encode_g_records(&bank.snapshot(), layout);
    for (want, got) in expected.iter().zip(&g_lines) {
        if want.as_bytes() != *got {
            return Err(fail(format!(
                "G record mismatch: expected {}, found {}",
                want,
                String::from_utf8_lossy(got)
            )));
        }
    }

    Ok(VerifyReport {
        header_lines,
        fix_count: fixes.len(),
        layout: Some(layout),
    })
}

/// Split on CRLF; a bare LF or CR stays inside its line
fn split_crlf(body: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i + 1 < body.len() {
        if body[i] == b'\r' && body[i + 1] == b'\n' {
            lines.push(&body[start..i]);
            i += 2;
            start = i;
        } else {
            i += 1;
        }
    }
    lines.push(&body[start..]);
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_file(fixes: &[&str], layout: GRecordLayout) -> Vec<u8> {
        let mut out = b"AXLK001\r\nHFDTE150221\r\nI023638FXA3940SIU\r\n".to_vec();
        let mut bank = DigestBank::new();
        for fix in fixes {
            out.extend_from_slice(fix.as_bytes());
            out.extend_from_slice(IGC_EOL);
            bank.update(fix.as_bytes());
        }
        if !fixes.is_empty() {
            for line in encode_g_records(&bank.snapshot(), layout) {
                out.extend_from_slice(line.as_bytes());
                out.extend_from_slice(IGC_EOL);
            }
        }
        out
    }

    const FIX_1: &str = "B1200005230000N00515000EA001000010401008";
    const FIX_2: &str = "B1200025230000N00515000EA001010010501008";

    #[test]
    fn test_verify_compact() {
        let file = build_file(&[FIX_1, FIX_2], GRecordLayout::Compact);
        let report = verify(&file).unwrap();
        assert_eq!(report.header_lines, 2);
        assert_eq!(report.fix_count, 2);
        assert_eq!(report.layout, Some(GRecordLayout::Compact));
    }

    #[test]
    fn test_verify_per_digest() {
        let file = build_file(&[FIX_1], GRecordLayout::PerDigest);
        let report = verify(&file).unwrap();
        assert_eq!(report.fix_count, 1);
        assert_eq!(report.layout, Some(GRecordLayout::PerDigest));
    }

    #[test]
    fn test_verify_header_only() {
        let file = build_file(&[], GRecordLayout::Compact);
        let report = verify(&file).unwrap();
        assert_eq!(report.fix_count, 0);
        assert_eq!(report.layout, None);
    }

    #[test]
    fn test_tampered_fix_is_detected() {
        let mut file = build_file(&[FIX_1, FIX_2], GRecordLayout::Compact);
        // Bump one altitude digit in the first fix
        let pos = file.windows(5).position(|w| w == b"00100").unwrap();
        file[pos + 4] = b'9';
        let err = verify(&file).unwrap_err();
        assert!(err.to_string().contains("G record mismatch"));
    }

    #[test]
    fn test_missing_trailer_is_detected() {
        let mut file = build_file(&[], GRecordLayout::Compact);
        file.extend_from_slice(FIX_1.as_bytes());
        file.extend_from_slice(IGC_EOL);
        assert!(verify(&file).is_err());
    }

    #[test]
    fn test_torn_tail_is_detected() {
        let mut file = build_file(&[FIX_1], GRecordLayout::Compact);
        file.truncate(file.len() - 5);
        assert!(verify(&file).is_err());
    }

    #[test]
    fn test_missing_a_record() {
        assert!(verify(b"HFDTE150221\r\n").is_err());
    }

    #[test]
    fn test_fix_after_trailer_is_rejected() {
        let mut file = build_file(&[FIX_1], GRecordLayout::Compact);
        file.extend_from_slice(FIX_2.as_bytes());
        file.extend_from_slice(IGC_EOL);
        assert!(verify(&file).is_err());
    }
}
