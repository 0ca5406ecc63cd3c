use assert_cmd::Command;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use icn_gateway_common::SensorFrame;
use predicates::prelude::*;
use std::io::Write;

fn icngw() -> Command {
    let mut cmd = Command::cargo_bin("icngw").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_encode_data_frame() {
    let expected = SensorFrame::data("/sensor/1/temp", &b"23.5"[..])
        .encode()
        .unwrap();

    icngw()
        .args(["frame", "encode", "--name", "/sensor/1/temp", "--content", "23.5"])
        .assert()
        .success()
        .stdout(predicate::str::contains(BASE64_STANDARD.encode(&expected)));
}

#[test]
fn test_encode_interest_with_tx_line() {
    icngw()
        .args([
            "frame",
            "encode",
            "--signal",
            "interest",
            "--name",
            "/sensor/1/temp",
            "--dest",
            "AA:BB:CC:DD:EE:01",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("TX:AA:BB:CC:DD:EE:01|"));
}

#[test]
fn test_encode_rejects_long_name() {
    let name = format!("/{}", "n".repeat(120));
    icngw()
        .args(["frame", "encode", "--name", &name])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot encode frame"));
}

#[test]
fn test_decode_rx_line() {
    let frame = SensorFrame::data("/sensor/1/temp", &b"23.5"[..])
        .encode()
        .unwrap();
    let line = format!(
        "RX:AA:BB:CC:DD:EE:01|{}|{}",
        frame.len(),
        BASE64_STANDARD.encode(&frame)
    );

    icngw()
        .args(["frame", "decode", &line])
        .assert()
        .success()
        .stdout(predicate::str::contains("Mesh address: AA:BB:CC:DD:EE:01"))
        .stdout(predicate::str::contains("Signal code:  DATA"))
        .stdout(predicate::str::contains("Content name: /sensor/1/temp"))
        .stdout(predicate::str::contains("Content:      23.5"));
}

#[test]
fn test_decode_rejects_short_frame() {
    icngw()
        .args(["frame", "decode", &BASE64_STANDARD.encode(b"DATA")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Malformed frame"));
}

#[test]
fn test_decode_rejects_invalid_base64() {
    icngw()
        .args(["frame", "decode", "not base64!"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid base64"));
}

#[test]
fn test_show_config_reads_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[mesh]\nendpoint = \"tcp://10.1.1.1:4000\"\n").unwrap();

    icngw()
        .arg("--config")
        .arg(file.path())
        .arg("show-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("tcp://10.1.1.1:4000"))
        .stdout(predicate::str::contains("\"max_virtual_depth\": 3"));
}

#[test]
fn test_run_fails_without_mesh_link() {
    icngw()
        .args(["run", "--mesh", "tcp://127.0.0.1:1", "--icn", "127.0.0.1:1"])
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Gateway failed to start"));
}

#[test]
fn test_missing_config_file() {
    icngw()
        .args(["--config", "/nonexistent/icngw.toml", "show-config"])
        .assert()
        .failure();
}
