//! Output Comparator: hash-based comparison between a user's output file
//! and the test case's expected-output hashes. Exact semantics (rstrip vs
//! whole-whitespace-strip, CRLF normalization) are load-bearing — grounded
//! on `_compare_output` in the original judge client.

use std::path::Path;

use crate::config::MAX_READ_BYTES;
use crate::error::{JudgeError, JudgeResult};
use crate::types::{TestCase, Verdict};

fn md5_hex(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

fn rstrip(bytes: &[u8]) -> &[u8] {
    let mut end = bytes.len();
    while end > 0 && bytes[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    &bytes[..end]
}

/// Removes every byte matching POSIX `\s` ([ \t\n\v\f\r]). `is_ascii_whitespace`
/// excludes vertical tab (0x0B), so it's checked separately.
fn strip_all_whitespace(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().copied().filter(|b| !(b.is_ascii_whitespace() || *b == 0x0B)).collect()
}

/// Computes both expected-output hashes for a freshly-materialized test
/// case, matching the manifest-generation formula in §6: CRLF is folded to
/// LF before whitespace is stripped for the presentation-error hash, but
/// the raw hash is computed directly off `rstrip(output)`.
pub fn compute_expected_hashes(output: &[u8]) -> (String, String) {
    let output_md5 = md5_hex(rstrip(output));
    let lf: Vec<u8> = {
        let mut v = Vec::with_capacity(output.len());
        let mut it = output.iter().peekable();
        while let Some(&b) = it.next() {
            if b == b'\r' && it.peek() == Some(&&b'\n') {
                continue;
            }
            v.push(b);
        }
        v
    };
    let stripped_output_md5 = md5_hex(&strip_all_whitespace(&lf));
    (output_md5, stripped_output_md5)
}

/// Compares `user_output_path`'s contents against `expected`'s precomputed
/// hashes. Returns the raw (rstripped) hash alongside the verdict.
pub fn compare(user_output_path: &Path, expected: &TestCase) -> JudgeResult<(String, Verdict)> {
    let bytes = std::fs::read(user_output_path)
        .map_err(|e| JudgeError::JudgeClientError(format!("failed to read user output: {e}")))?;
    let bytes = if bytes.len() > MAX_READ_BYTES { &bytes[..MAX_READ_BYTES] } else { &bytes[..] };

    let output_md5 = md5_hex(rstrip(bytes));
    let stripped_output_md5 = md5_hex(&strip_all_whitespace(bytes));

    if output_md5 == expected.output_md5 {
        Ok((output_md5, Verdict::Accepted))
    } else if stripped_output_md5 == expected.stripped_output_md5 {
        Ok((output_md5, Verdict::PresentationError))
    } else {
        Ok((output_md5, Verdict::WrongAnswer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(output_md5: &str, stripped: &str) -> TestCase {
        TestCase {
            input_name: "1.in".into(),
            output_name: "1.out".into(),
            input_size: 0,
            output_size: 0,
            output_md5: output_md5.into(),
            stripped_output_md5: stripped.into(),
            is_sample: false,
        }
    }

    #[test]
    fn exact_match_is_accepted() {
        let (expected_md5, expected_stripped) = compute_expected_hashes(b"3\n");
        let tc = case(&expected_md5, &expected_stripped);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out");
        std::fs::write(&path, b"3\n").unwrap();
        let (_, verdict) = compare(&path, &tc).unwrap();
        assert_eq!(verdict, Verdict::Accepted);
    }

    #[test]
    fn trailing_newline_difference_is_accepted() {
        let (expected_md5, expected_stripped) = compute_expected_hashes(b"3");
        let tc = case(&expected_md5, &expected_stripped);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out");
        std::fs::write(&path, b"3\n").unwrap();
        let (_, verdict) = compare(&path, &tc).unwrap();
        assert_eq!(verdict, Verdict::Accepted);
    }

    #[test]
    fn interior_whitespace_difference_is_presentation_error() {
        let (expected_md5, expected_stripped) = compute_expected_hashes(b"3\n");
        let tc = case(&expected_md5, &expected_stripped);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out");
        std::fs::write(&path, b" 3 \n").unwrap();
        let (_, verdict) = compare(&path, &tc).unwrap();
        assert_eq!(verdict, Verdict::PresentationError);
    }

    #[test]
    fn wrong_digits_is_wrong_answer() {
        let (expected_md5, expected_stripped) = compute_expected_hashes(b"3\n");
        let tc = case(&expected_md5, &expected_stripped);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out");
        std::fs::write(&path, b"4\n").unwrap();
        let (_, verdict) = compare(&path, &tc).unwrap();
        assert_eq!(verdict, Verdict::WrongAnswer);
    }
}
