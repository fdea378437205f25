use std::time::Duration;

use tokio::{net::UdpSocket, sync::oneshot};
use rama::telemetry::tracing;
use tracing_test::traced_test;

use super::{parse_args, read_gz_lines};
use crate::{run_with_args, utils::test::unique_empty_temp_dir};

#[tokio::test]
#[traced_test]
async fn test_scenario_udp_with_count() {
    let dir = unique_empty_temp_dir("test_e2e_scenario_udp").unwrap();
    let scenario = dir.join("scenario.log");
    std::fs::write(&scenario, "x\ny\nz\n").unwrap();

    let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = receiver.local_addr().unwrap().to_string();

    let args = parse_args(&[
        "scenario",
        scenario.to_str().unwrap(),
        "--addr",
        &addr,
        "--count",
        "10",
    ]);
    run_with_args(std::future::pending::<()>(), args)
        .await
        .unwrap();

    let mut buf = [0u8; 64];
    let mut received = Vec::new();
    for _ in 0..10 {
        let n = tokio::time::timeout(Duration::from_secs(5), receiver.recv(&mut buf))
            .await
            .unwrap()
            .unwrap();
        received.push(String::from_utf8(buf[..n].to_vec()).unwrap());
    }
    assert_eq!(
        received,
        vec!["x\n", "y\n", "z\n", "x\n", "y\n", "z\n", "x\n", "y\n", "z\n", "x\n"]
    );
    assert!(logs_contain("scenario replay finished"));
}

#[tokio::test]
async fn test_scenario_until_shutdown_finalizes_gzip_file() {
    let dir = unique_empty_temp_dir("test_e2e_scenario_shutdown").unwrap();
    let scenario = dir.join("scenario.log.gz");
    {
        use std::io::Write as _;

        let mut encoder = flate2::write::GzEncoder::new(
            std::fs::File::create(&scenario).unwrap(),
            flate2::Compression::default(),
        );
        encoder.write_all(b"first\nsecond\n").unwrap();
        encoder.finish().unwrap();
    }
    let output = dir.join("out.gz");

    let args = parse_args(&[
        "scenario",
        scenario.to_str().unwrap(),
        "--file",
        output.to_str().unwrap(),
        "--delay",
        "1ms",
        "--graceful",
        "5",
    ]);

    let (tx, rx) = oneshot::channel::<()>();
    let h = tokio::spawn(run_with_args(
        async move {
            let _ = rx.await;
        },
        args,
    ));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!h.is_finished());
    tx.send(()).unwrap();

    h.await.unwrap().unwrap();

    let lines = read_gz_lines(&output);
    assert!(!lines.is_empty());
    for (i, line) in lines.iter().enumerate() {
        let expected = if i % 2 == 0 { "first" } else { "second" };
        assert_eq!(line, expected);
    }
}

#[tokio::test]
async fn test_scenario_without_destination_fails() {
    let dir = unique_empty_temp_dir("test_e2e_scenario_no_destination").unwrap();
    let scenario = dir.join("scenario.log");
    std::fs::write(&scenario, "x\n").unwrap();

    let args = parse_args(&["scenario", scenario.to_str().unwrap()]);
    assert!(
        run_with_args(std::future::pending::<()>(), args)
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_scenario_missing_or_empty_file_fails() {
    let dir = unique_empty_temp_dir("test_e2e_scenario_missing").unwrap();
    let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = receiver.local_addr().unwrap().to_string();

    let empty = dir.join("empty.log");
    std::fs::write(&empty, "").unwrap();

    for path in [dir.join("missing.log"), empty] {
        let args = parse_args(&["scenario", path.to_str().unwrap(), "--addr", &addr]);
        assert!(
            run_with_args(std::future::pending::<()>(), args)
                .await
                .is_err(),
            "{path:?}"
        );
    }
}
