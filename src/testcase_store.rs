//! Test-Case Store: reads a preloaded bundle's `info` manifest, or
//! materializes one from inline `(input, output)` pairs supplied directly
//! in the judge request.

use std::path::{Path, PathBuf};

use crate::comparator::compute_expected_hashes;
use crate::config::JudgeConfig;
use crate::error::{JudgeError, JudgeResult};
use crate::types::{InlineTestCase, Manifest, TestCase};

/// Loads `<bundle_dir>/info` and parses it into a [`Manifest`].
pub fn load_manifest(bundle_dir: &Path) -> JudgeResult<Manifest> {
    let info_path = bundle_dir.join("info");
    let raw = std::fs::read_to_string(&info_path)
        .map_err(|_| JudgeError::JudgeClientError("Test case not found".into()))?;
    serde_json::from_str(&raw).map_err(|_| JudgeError::JudgeClientError("Bad test case config".into()))
}

/// Resolves a stored bundle's directory from its id.
pub fn bundle_dir(config: &JudgeConfig, test_case_id: &str) -> PathBuf {
    config.test_case_dir.join(test_case_id)
}

/// Writes inline test cases into `dest_dir` and returns the synthesized
/// manifest, following the exact numbering (1-indexed, stringified) and
/// hash formulas the judge request's inline path uses.
pub fn materialize_inline(dest_dir: &Path, cases: &[InlineTestCase], is_spj: bool) -> JudgeResult<Manifest> {
    std::fs::create_dir_all(dest_dir)
        .map_err(|e| JudgeError::JudgeClientError(format!("failed to create test case dir: {e}")))?;

    let mut manifest = Manifest {
        test_case_number: cases.len(),
        spj: is_spj,
        test_cases: Default::default(),
    };

    for (i, case) in cases.iter().enumerate() {
        let id = (i + 1).to_string();
        let input_name = format!("{id}.in");
        let output_name = format!("{id}.out");

        let input_bytes = case.input.as_bytes();
        std::fs::write(dest_dir.join(&input_name), input_bytes)
            .map_err(|e| JudgeError::JudgeClientError(format!("failed to write input: {e}")))?;

        let output_bytes = case.output.as_bytes();
        std::fs::write(dest_dir.join(&output_name), output_bytes)
            .map_err(|e| JudgeError::JudgeClientError(format!("failed to write output: {e}")))?;

        let (output_md5, stripped_output_md5) = compute_expected_hashes(output_bytes);

        manifest.test_cases.insert(
            id,
            TestCase {
                input_name,
                output_name,
                input_size: input_bytes.len() as u64,
                output_size: output_bytes.len() as u64,
                output_md5,
                stripped_output_md5,
                is_sample: false,
            },
        );
    }

    let manifest_json = serde_json::to_string(&manifest)
        .map_err(|e| JudgeError::JudgeClientError(format!("failed to encode manifest: {e}")))?;
    std::fs::write(dest_dir.join("info"), manifest_json)
        .map_err(|e| JudgeError::JudgeClientError(format!("failed to write manifest: {e}")))?;

    Ok(manifest)
}
