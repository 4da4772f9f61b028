//! CLI integration tests

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn ontime(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ontime"))
        .args(args)
        .env("HOME", home)
        .env_remove("ONTIME_API_URL")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute command")
}

/// Small corpus where GOL morning flights run late and AZU afternoon flights do not
fn write_dataset(dir: &Path) -> std::path::PathBuf {
    let mut csv = String::from(
        "Voos,Companhia.Aerea,Codigo.Tipo.Linha,Partida.Prevista,Partida.Real,Chegada.Prevista,Chegada.Real,Situacao.Voo,Codigo.Justificativa,Aeroporto.Origem,Cidade.Origem,Estado.Origem,Pais.Origem,Aeroporto.Destino\n",
    );
    for day in 1..=20 {
        csv.push_str(&format!(
            "GLO-{day},GLO,Nacional,2024-03-{day:02}T08:00:00Z,2024-03-{day:02}T08:45:00Z,,,Realizado,,SBGR,Guarulhos,SP,Brasil,SBRJ\n"
        ));
        csv.push_str(&format!(
            "AZU-{day},AZU,Nacional,2024-03-{day:02}T14:00:00Z,2024-03-{day:02}T14:02:00Z,,,Realizado,,SBKP,Campinas,SP,Brasil,SBRJ\n"
        ));
    }
    csv.push_str("TAM-1,TAM,Nacional,2024-03-05T10:00:00Z,,,,Cancelado,XN,SBGR,Guarulhos,SP,Brasil,SBPA\n");

    let path = dir.join("flights.csv");
    std::fs::write(&path, csv).unwrap();
    path
}

#[test]
fn test_cli_help() {
    let home = TempDir::new().unwrap();
    let output = ontime(home.path(), &["--help"]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Flight On Time"), "Should show app name");
    for command in ["train", "predict", "inspect", "health"] {
        assert!(stdout.contains(command), "Should show {command} command");
    }
}

#[test]
fn test_cli_version() {
    let home = TempDir::new().unwrap();
    let output = ontime(home.path(), &["--version"]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("ontime"), "Should show binary name");
}

#[test]
fn test_predict_help_lists_flight_fields() {
    let home = TempDir::new().unwrap();
    let output = ontime(home.path(), &["predict", "--help"]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    for flag in ["--airline", "--origin", "--destination", "--departure", "--bundle"] {
        assert!(stdout.contains(flag), "Should show {flag}");
    }
}

#[test]
fn test_train_predict_inspect() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let data = write_dataset(work.path());
    let bundle = work.path().join("models").join("flight_model.json");
    let bundle_arg = bundle.to_str().unwrap();

    let output = ontime(
        home.path(),
        &[
            "train",
            "--data",
            data.to_str().unwrap(),
            "--output",
            bundle_arg,
            "--format",
            "json",
        ],
    );
    assert!(
        output.status.success(),
        "train failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(bundle.exists());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["records_read"], 41);
    assert_eq!(report["training_rows"], 40);
    assert_eq!(report["skipped"]["not_completed"], 1);
    assert_eq!(report["checksum"].as_str().unwrap().len(), 64);

    let output = ontime(
        home.path(),
        &[
            "predict",
            "--bundle",
            bundle_arg,
            "--airline",
            "GLO",
            "--origin",
            "SBGR",
            "--destination",
            "SBRJ",
            "--departure",
            "2024-04-02T08:00:00",
            "--format",
            "json",
        ],
    );
    assert!(output.status.success());
    let prediction: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let probability = prediction["probability"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&probability));
    assert!(prediction["isLikelyLate"].is_boolean());
    assert_eq!(prediction["features"].as_array().unwrap().len(), 13);

    let output = ontime(
        home.path(),
        &["inspect", "--bundle", bundle_arg, "--format", "json"],
    );
    assert!(output.status.success());
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["scorer"], "boosted");
    assert_eq!(summary["decision_threshold"], 0.53);
    assert_eq!(summary["vocabulary"]["airline"], 2);
    assert_eq!(summary["checksum"], report["checksum"]);
}

#[test]
fn test_predict_rejects_bad_departure() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let data = write_dataset(work.path());
    let bundle = work.path().join("flight_model.json");
    let bundle_arg = bundle.to_str().unwrap();

    let output = ontime(
        home.path(),
        &["train", "--data", data.to_str().unwrap(), "--output", bundle_arg],
    );
    assert!(output.status.success());

    let output = ontime(
        home.path(),
        &[
            "predict",
            "--bundle",
            bundle_arg,
            "--airline",
            "GLO",
            "--origin",
            "SBGR",
            "--destination",
            "SBRJ",
            "--departure",
            "next tuesday",
        ],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("next tuesday"));
}

#[test]
fn test_train_missing_dataset_fails() {
    let home = TempDir::new().unwrap();
    let output = ontime(
        home.path(),
        &["train", "--data", "/nonexistent/flights.csv"],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to read dataset"));
}
