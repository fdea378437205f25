use std::io::Write as _;

use flate2::{Compression, write::GzEncoder};
use rama::telemetry::tracing;
use tracing_test::traced_test;

use super::{parse_args, read_gz_lines};
use crate::{run_with_args, utils::test::unique_empty_temp_dir};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[traced_test]
async fn test_replay_directory_into_gzip_file() {
    let dir = unique_empty_temp_dir("test_e2e_replay_dir").unwrap();
    let input = dir.join("input");
    std::fs::create_dir(&input).unwrap();

    let mut expected = Vec::new();
    for i in 0..4 {
        let lines: Vec<String> = (0..100).map(|j| format!("file{i}-line{j}")).collect();
        let content = lines.join("\n") + "\n";
        if i % 2 == 0 {
            let mut encoder = GzEncoder::new(
                std::fs::File::create(input.join(format!("{i}.log.gz"))).unwrap(),
                Compression::default(),
            );
            encoder.write_all(content.as_bytes()).unwrap();
            encoder.finish().unwrap();
        } else {
            std::fs::write(input.join(format!("{i}.log")), content).unwrap();
        }
        expected.extend(lines);
    }
    // unreadable unit: not gzip despite its extension
    std::fs::write(input.join("broken.gz"), "not gzip at all").unwrap();

    let output = dir.join("out.gz");
    let args = parse_args(&[
        "replay",
        input.to_str().unwrap(),
        "--file",
        output.to_str().unwrap(),
        "--workers",
        "2",
        "--json",
    ]);
    run_with_args(std::future::pending::<()>(), args)
        .await
        .unwrap();

    let mut lines = read_gz_lines(&output);
    lines.sort();
    expected.sort();
    assert_eq!(lines, expected);
    assert!(logs_contain("skip work unit"));
}

#[tokio::test]
async fn test_replay_single_file_twice_appends() {
    let dir = unique_empty_temp_dir("test_e2e_replay_append").unwrap();
    let input = dir.join("input.log");
    std::fs::write(&input, "a\nb\nc\n").unwrap();
    let output = dir.join("out.gz");

    for _ in 0..2 {
        let args = parse_args(&[
            "replay",
            input.to_str().unwrap(),
            "--file",
            output.to_str().unwrap(),
        ]);
        run_with_args(std::future::pending::<()>(), args)
            .await
            .unwrap();
    }

    assert_eq!(read_gz_lines(&output), vec!["a", "b", "c", "a", "b", "c"]);
}

#[tokio::test]
async fn test_replay_missing_path_fails() {
    let dir = unique_empty_temp_dir("test_e2e_replay_missing").unwrap();
    let args = parse_args(&[
        "replay",
        dir.join("missing").to_str().unwrap(),
        "--file",
        dir.join("out.gz").to_str().unwrap(),
    ]);
    assert!(
        run_with_args(std::future::pending::<()>(), args)
            .await
            .is_err()
    );
}
