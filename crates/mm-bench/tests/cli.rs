use std::process::{Command, Output};

fn matmul_bench(args: &[&str], env: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_matmul-bench"));
    cmd.args(args).env("RUST_LOG", "warn");
    for (k, v) in env {
        cmd.env(k, v);
    }
    cmd.output().expect("failed to run matmul-bench")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

#[test]
fn test_list_devices() {
    let out = matmul_bench(&["--list"], &[]);
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("0: host-parallel"), "{text}");
    assert!(text.contains("1: host-serial"), "{text}");
    assert!(!text.contains("MFLOPS"));
}

#[test]
fn test_invalid_device_index_fails_without_running() {
    let out = matmul_bench(&["--device", "99"], &[("MATMUL_ORDER", "8")]);
    assert!(!out.status.success());
    assert!(stderr(&out).contains("invalid device index 99"), "{}", stderr(&out));
    assert!(!stdout(&out).contains("MFLOPS"));
}

#[test]
fn test_small_run_reports_every_repetition() {
    let out = matmul_bench(
        &["-d", "0"],
        &[
            ("MATMUL_ORDER", "16"),
            ("MATMUL_TEAM_SIZE", "4"),
            ("MATMUL_COUNT", "2"),
        ],
    );
    assert!(out.status.success(), "{}", stderr(&out));
    let text = stdout(&out);
    assert_eq!(text.matches("MFLOPS").count(), 6, "{text}");
    assert!(text.contains("Sequential, matrix mult (dot prod), order 16"));
    assert!(text.contains("C(i,j) per work item, order 16"));
    assert!(text.contains("C row per work item"));
    assert!(!text.contains("Errors in multiplication"));
}

#[test]
fn test_invalid_order_fails() {
    let out = matmul_bench(&[], &[("MATMUL_ORDER", "0")]);
    assert!(!out.status.success());
    assert!(stderr(&out).contains("invalid configuration"), "{}", stderr(&out));
    assert!(!stdout(&out).contains("MFLOPS"));
}
