use std::fs;
use std::path::Path;
use std::process::Command;

use serde_json::Value;
use tempfile::TempDir;

fn pucleus_command() -> Command {
    Command::new(env!("CARGO_BIN_EXE_pucleus"))
}

fn write_gaussian_spectrum(path: &Path) {
    let counts: Vec<f64> = (0..1024)
        .map(|channel| {
            let x = (channel as f64 - 500.0) / 8.0;
            10.0 + 10000.0 * (-0.5 * x * x).exp()
        })
        .collect();
    let document = serde_json::json!({ "counts": counts, "totalTime": 120.0 });
    fs::write(path, document.to_string()).expect("spectrum fixture should be written");
}

#[test]
fn peaks_command_reports_calibrated_matches_as_json() {
    let temp = TempDir::new().expect("tempdir should be created");
    let spectrum_path = temp.path().join("run.json");
    let library_path = temp.path().join("sources.csv");
    write_gaussian_spectrum(&spectrum_path);
    fs::write(&library_path, "Test-1,977.0\nFar-2,2100.0\n")
        .expect("library fixture should be written");

    let output = pucleus_command()
        .arg("peaks")
        .arg(&spectrum_path)
        .args(["--algorithm", "simple-compare", "--k", "1.2", "--m", "5"])
        .args(["--calibrate", "0=0", "--calibrate", "512=1000"])
        .arg("--library")
        .arg(&library_path)
        .arg("--json")
        .output()
        .expect("peaks command should run");

    assert!(
        output.status.success(),
        "command should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: Value = serde_json::from_slice(&output.stdout).expect("report JSON should parse");
    assert_eq!(report["calibrated"], Value::Bool(true));
    assert_eq!(report["channels"], Value::from(1024));

    let peaks = report["peaks"].as_array().expect("peaks should be an array");
    assert_eq!(peaks.len(), 1, "exactly one peak expected: {report}");
    let peak = &peaks[0];
    let position = peak["position"].as_f64().expect("position should be a number");
    assert!(
        (480.0..520.0).contains(&position),
        "apex should sit near channel 500, got {position}"
    );
    let energy = peak["energy"].as_f64().expect("energy should be present");
    assert!(
        (energy - 977.0).abs() < 5.0,
        "energy should follow the two-point calibration, got {energy}"
    );
    assert_eq!(peak["matches"][0], Value::from("sources:Test-1"));
    assert!(
        peak["netArea"].as_f64().expect("net area") > 0.0,
        "net area should be positive"
    );
}

#[test]
fn peaks_command_runs_uncalibrated_without_energies() {
    let temp = TempDir::new().expect("tempdir should be created");
    let spectrum_path = temp.path().join("run.json");
    write_gaussian_spectrum(&spectrum_path);

    let output = pucleus_command()
        .arg("peaks")
        .arg(&spectrum_path)
        .args(["--k", "1.2", "--m", "5", "--json"])
        .output()
        .expect("peaks command should run");

    assert!(output.status.success());
    let report: Value = serde_json::from_slice(&output.stdout).expect("report JSON should parse");
    assert_eq!(report["calibrated"], Value::Bool(false));
    assert!(report["peaks"][0].get("energy").is_none());
}

#[test]
fn smooth_command_writes_the_filtered_spectrum() {
    let temp = TempDir::new().expect("tempdir should be created");
    let input_path = temp.path().join("raw.txt");
    let output_path = temp.path().join("smooth.txt");
    fs::write(&input_path, "0\n3\n6\n9\n12\n").expect("input fixture should be written");

    let output = pucleus_command()
        .arg("smooth")
        .arg(&input_path)
        .arg(&output_path)
        .args(["--method", "moving-average", "--width", "3"])
        .output()
        .expect("smooth command should run");

    assert!(
        output.status.success(),
        "command should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(
        String::from_utf8_lossy(&output.stdout).contains("3-point moving average"),
        "stdout should name the applied filter"
    );

    // A linear series is a fixed point of the flat mean.
    let written = fs::read_to_string(&output_path).expect("output should be readable");
    let counts: Vec<f64> = written
        .lines()
        .filter(|line| !line.starts_with('#') && !line.trim().is_empty())
        .map(|line| line.trim().parse().expect("count should parse"))
        .collect();
    assert_eq!(counts, vec![0.0, 3.0, 6.0, 9.0, 12.0]);
}

#[test]
fn histogram_command_bins_pulse_amplitudes() {
    let temp = TempDir::new().expect("tempdir should be created");
    let pulses_path = temp.path().join("pulses.txt");
    let output_path = temp.path().join("spectrum.json");
    fs::write(&pulses_path, "0.2\n1.7\n1.1\n3.0\n9.9\n").expect("pulse fixture should be written");

    let output = pucleus_command()
        .arg("histogram")
        .arg(&pulses_path)
        .arg(&output_path)
        .args(["--channels", "4"])
        .output()
        .expect("histogram command should run");

    assert!(
        output.status.success(),
        "command should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let document: Value = serde_json::from_str(
        &fs::read_to_string(&output_path).expect("output should be readable"),
    )
    .expect("output JSON should parse");
    let counts = document["counts"].as_array().expect("counts array");
    let counts: Vec<f64> = counts
        .iter()
        .map(|value| value.as_f64().expect("count"))
        .collect();
    // Overflow amplitude 9.9 saturates into the top channel.
    assert_eq!(counts, vec![1.0, 2.0, 0.0, 2.0]);
}

#[test]
fn invalid_range_is_a_usage_error_with_exit_code_2() {
    let temp = TempDir::new().expect("tempdir should be created");
    let spectrum_path = temp.path().join("run.json");
    write_gaussian_spectrum(&spectrum_path);

    let output = pucleus_command()
        .arg("peaks")
        .arg(&spectrum_path)
        .args(["--range", "banana"])
        .output()
        .expect("peaks command should run");

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("ERROR: [INPUT.CLI_USAGE]"),
        "stderr should carry the usage diagnostic, stderr: {stderr}"
    );
    assert!(
        stderr.contains("FATAL EXIT CODE: 2"),
        "stderr should carry the fatal exit summary, stderr: {stderr}"
    );
}

#[test]
fn missing_spectrum_file_maps_to_io_exit_code_3() {
    let temp = TempDir::new().expect("tempdir should be created");
    let missing = temp.path().join("nope.json");

    let output = pucleus_command()
        .arg("info")
        .arg(&missing)
        .output()
        .expect("info command should run");

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("[IO.SPECTRUM]"),
        "stderr should carry the spectrum I/O placeholder, stderr: {stderr}"
    );
}
