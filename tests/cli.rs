//! CLI test cases.
//!
//! Most of these avoid starting a recognition engine, so they run without
//! `tesseract` or Poppler installed. Tests that need the real tools are
//! ignored by default.

use std::{fs, path::Path, process::Command};

use assert_cmd::prelude::*;
use predicates::prelude::*;

/// Create a new `Command` with our binary.
fn cmd() -> Command {
    Command::cargo_bin("scan-text").unwrap()
}

/// An `ocr` command that will never download anything.
fn ocr_cmd(dir: &Path) -> Command {
    let mut cmd = cmd();
    cmd.arg("ocr")
        .arg("--no-download")
        .arg("--model-dir")
        .arg(dir.join("models"));
    cmd
}

#[test]
fn test_help() {
    cmd().arg("--help").assert().success();
}

#[test]
fn test_version() {
    cmd().arg("--version").assert().success();
}

#[test]
fn test_languages_lists_codes_and_models() {
    cmd()
        .arg("languages")
        .assert()
        .success()
        .stdout(predicate::str::contains("zh_sim"))
        .stdout(predicate::str::contains("chi_sim"))
        .stdout(predicate::str::contains("ja"));
}

#[test]
fn test_log_filter_can_come_from_dotenv() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(".env"), "RUST_LOG=scan_text=debug\n").unwrap();

    cmd()
        .current_dir(dir.path())
        .env_remove("RUST_LOG")
        .arg("languages")
        .assert()
        .success()
        .stderr(predicate::str::contains("Parsed options"));
}

#[test]
fn test_ocr_requires_inputs() {
    let dir = tempfile::tempdir().unwrap();
    ocr_cmd(dir.path()).assert().failure();
}

#[test]
fn test_ocr_rejects_path_like_language_codes() {
    let dir = tempfile::tempdir().unwrap();
    ocr_cmd(dir.path())
        .arg("-l")
        .arg("../escape")
        .arg(dir.path().join("missing.png"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid language code"));
    assert!(!dir.path().join("escape.traineddata").exists());
}

#[test]
fn test_ocr_unsupported_file_type() {
    let dir = tempfile::tempdir().unwrap();
    let docx = dir.path().join("x.docx");
    fs::write(&docx, "not a scan").unwrap();

    ocr_cmd(dir.path())
        .arg(&docx)
        .assert()
        .success()
        .stdout("[error] Failed to process x.docx: Unsupported file type: .docx\n");
}

#[test]
fn test_ocr_reports_every_file() {
    let dir = tempfile::tempdir().unwrap();
    let docx = dir.path().join("x.docx");
    fs::write(&docx, "not a scan").unwrap();

    ocr_cmd(dir.path())
        .arg(&docx)
        .arg(dir.path().join("missing.png"))
        .assert()
        .success()
        .stdout(
            "[error] Failed to process x.docx: Unsupported file type: .docx\n\n\
             [warning] File not found: missing.png\n",
        );
}

#[test]
fn test_ocr_files_from_skips_unresolvable_records() {
    let dir = tempfile::tempdir().unwrap();
    let list = dir.path().join("files.jsonl");
    let gone = dir.path().join("gone.png");
    fs::write(
        &list,
        format!(
            "{}\n{{}}\n",
            serde_json::json!({ "name": gone, "size": 12 })
        ),
    )
    .unwrap();

    ocr_cmd(dir.path())
        .arg("--files-from")
        .arg(&list)
        .assert()
        .success()
        .stdout("[warning] File not found: gone.png\n");
}

#[test]
fn test_ocr_json_output() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.jsonl");

    ocr_cmd(dir.path())
        .arg("--format")
        .arg("json")
        .arg("--out")
        .arg(&out)
        .arg(dir.path().join("missing.pdf"))
        .assert()
        .success();

    let written = fs::read_to_string(&out).unwrap();
    let record: serde_json::Value = serde_json::from_str(written.trim()).unwrap();
    assert_eq!(record["status"], "missing");
    assert_eq!(record["error"], "File not found: missing.pdf");
}

#[test]
#[ignore = "Requires tesseract to be installed and network access for models"]
fn test_ocr_reads_printed_lines() {
    let dir = tempfile::tempdir().unwrap();

    cmd()
        .arg("ocr")
        .arg("--model-dir")
        .arg(dir.path().join("models"))
        .arg("tests/fixtures/hello_world.png")
        .assert()
        .success()
        .stdout("HELLO WORLD\nSECOND\n");
}

#[test]
#[ignore = "Requires tesseract to be installed and network access for models"]
fn test_ocr_blank_image_has_no_text() {
    let dir = tempfile::tempdir().unwrap();
    let png = dir.path().join("blank.png");
    image::RgbImage::from_pixel(200, 100, image::Rgb([255, 255, 255]))
        .save(&png)
        .unwrap();

    cmd()
        .arg("ocr")
        .arg("--model-dir")
        .arg(dir.path().join("models"))
        .arg(&png)
        .assert()
        .success()
        .stdout("(No text detected)\n");
}
