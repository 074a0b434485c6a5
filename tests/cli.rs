use std::fs;
use std::process::Command;

use tempfile::TempDir;

#[test]
fn reports_created_pdf() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("document.md"), "# Report\n\nDone.\n").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_mdpdf"))
        .current_dir(dir.path())
        .output()
        .expect("failed to run mdpdf");

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "PDF created: document.pdf\n");

    let pdf = fs::read(dir.path().join("document.pdf")).unwrap();
    assert!(pdf.starts_with(b"%PDF"));
}

#[test]
fn missing_document_fails_without_output() {
    let dir = TempDir::new().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_mdpdf"))
        .current_dir(dir.path())
        .output()
        .expect("failed to run mdpdf");

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to read document.md"));
    assert!(!dir.path().join("document.pdf").exists());
}
