//! Integration tests for command mode (-c/--command flag)

use std::process::Command;

fn run_command(args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_calctable"))
        // Tests must not depend on a user's ~/.config/calctable/config.toml.
        .arg("--no-config")
        .args(args)
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let exit_code = output.status.code().unwrap_or(-1);

    (stdout, stderr, exit_code)
}

#[test]
fn test_basic_arithmetic() {
    let (stdout, _, code) = run_command(&["-c", "5 + 3"]);
    assert_eq!(stdout.trim(), "8");
    assert_eq!(code, 0);
}

#[test]
fn test_leading_equals_is_accepted() {
    let (stdout, _, code) = run_command(&["-c", "=2 * (3 + 4)"]);
    assert_eq!(stdout.trim(), "14");
    assert_eq!(code, 0);
}

#[test]
fn test_functions_and_constants() {
    let (stdout, _, code) = run_command(&["-c", "sqrt(16) + cos(0)"]);
    assert_eq!(stdout.trim(), "5");
    assert_eq!(code, 0);
}

#[test]
fn test_bound_columns_carry_units() {
    let (stdout, _, code) = run_command(&[
        "--bind", "d=10:m", "--bind", "t=2:s", "-c", "{d} / {t}",
    ]);
    assert_eq!(stdout.trim(), "5 m/s");
    assert_eq!(code, 0);
}

#[test]
fn test_unit_mismatch_is_an_error() {
    let (stdout, _, code) = run_command(&[
        "--bind", "d=10:m", "--bind", "t=2:s", "-c", "{d} + {t}",
    ]);
    assert!(stdout.starts_with("#ERR"), "got {:?}", stdout);
    assert_eq!(code, 1);
}

#[test]
fn test_division_by_zero_is_an_error() {
    let (stdout, _, code) = run_command(&["-c", "1 / 0"]);
    assert!(stdout.starts_with("#ERR"), "got {:?}", stdout);
    assert_eq!(code, 1);
}

#[test]
fn test_unknown_reference_is_an_error() {
    let (stdout, _, code) = run_command(&["-c", "{missing} * 2"]);
    assert!(stdout.starts_with("#ERR"), "got {:?}", stdout);
    assert_eq!(code, 1);
}

#[test]
fn test_disallowed_constructs_are_rejected() {
    for formula in ["__import__('os')", "[1, 2][0]", "x = 1"] {
        let (stdout, _, code) = run_command(&["-c", formula]);
        assert!(stdout.starts_with("#ERR"), "{} gave {:?}", formula, stdout);
        assert_eq!(code, 1);
    }
}

#[test]
fn test_sigma_propagates_uncertainty() {
    let (stdout, _, code) = run_command(&[
        "--bind", "d=10:m", "--sigma", "d=0.1", "--bind", "t=2:s", "--sigma", "t=0.05", "-c",
        "{d} / {t}",
    ]);
    // sqrt((0.1 / 2)^2 + (10 / 4 * 0.05)^2)
    assert_eq!(stdout.trim(), "5 ± 0.134629 m/s");
    assert_eq!(code, 0);
}

#[test]
fn test_sigma_without_binding_is_an_error() {
    let (stdout, _, code) = run_command(&["--sigma", "x=0.1", "-c", "2"]);
    assert!(stdout.starts_with("#ERR"), "got {:?}", stdout);
    assert_eq!(code, 1);
}

#[test]
fn test_workspace_constants() {
    let (stdout, _, code) = run_command(&[
        "--const", "g=9.81:m/s^2", "--bind", "t=2:s", "-c", "g * {t}**2 / 2",
    ]);
    assert_eq!(stdout.trim(), "19.62 m");
    assert_eq!(code, 0);
}

#[test]
fn test_precision_flag() {
    let (stdout, _, code) = run_command(&["-p", "3", "-c", "1 / 3"]);
    assert_eq!(stdout.trim(), "0.333");
    assert_eq!(code, 0);
}

#[test]
fn test_config_file_sets_precision() {
    let path = std::env::temp_dir().join("calctable-cli-precision.toml");
    std::fs::write(&path, "default_precision = 2\n").unwrap();
    let (stdout, _, code) = run_command(&["--config", path.to_str().unwrap(), "-c", "2 / 3"]);
    std::fs::remove_file(&path).unwrap();
    assert_eq!(stdout.trim(), "0.67");
    assert_eq!(code, 0);
}

#[test]
fn test_bad_config_file_fails() {
    let path = std::env::temp_dir().join("calctable-cli-bad.toml");
    std::fs::write(&path, "no_such_key = 1\n").unwrap();
    let (_, stderr, code) = run_command(&["--config", path.to_str().unwrap(), "-c", "1"]);
    std::fs::remove_file(&path).unwrap();
    assert!(stderr.contains("Error"), "got {:?}", stderr);
    assert_eq!(code, 1);
}

#[test]
fn test_usage_errors() {
    let (_, stderr, code) = run_command(&["--bind", "oops"]);
    assert!(stderr.contains("NAME=VALUE"));
    assert_eq!(code, 1);

    let (_, stderr, code) = run_command(&[]);
    assert!(stderr.contains("No formula"));
    assert_eq!(code, 1);

    let (_, _, code) = run_command(&["--help"]);
    assert_eq!(code, 0);
}
