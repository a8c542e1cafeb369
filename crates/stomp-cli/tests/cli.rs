use assert_cmd::Command;
use std::net::TcpListener;

fn stomp(dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("stomp").unwrap();
    cmd.arg("--config").arg(dir.path().join("config.toml"));
    cmd
}

#[test]
fn rejects_commands_before_login() {
    let dir = tempfile::tempdir().unwrap();
    let output = stomp(&dir)
        .write_stdin("join police\nsummary police out.txt\nfly away\n")
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "please login first\nplease login first\nInvalid command\n"
    );
    assert!(!dir.path().join("out.txt").exists());
}

#[test]
fn reports_usage_for_malformed_login() {
    let dir = tempfile::tempdir().unwrap();
    let output = stomp(&dir)
        .write_stdin("login localhost:notaport alice pw\nlogin alice\n")
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "illegal port 'notaport'\nlogin command needs 3 args: {host:port} {username} {password}\n"
    );
}

#[test]
fn refused_connection_is_reported() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let dir = tempfile::tempdir().unwrap();
    let output = stomp(&dir)
        .write_stdin(format!("login 127.0.0.1:{port} alice pw\njoin police\n"))
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<_> = stdout.lines().collect();
    assert_eq!(lines.len(), 2, "{stdout}");
    assert!(lines[0].starts_with(&format!("Could not connect to server 127.0.0.1:{port}")));
    assert_eq!(lines[1], "please login first");
}

#[test]
fn malformed_config_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("config.toml"), "[session\n").unwrap();

    let output = stomp(&dir).write_stdin("logout\n").output().unwrap();

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "please login first\n");
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to parse config"));
}
