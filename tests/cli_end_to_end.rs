#![cfg(unix)]

use assert_cmd::Command;
use predicates::prelude::*;
use serial_test::serial;
use std::process::Output;
use tempfile::TempDir;

struct TempHome {
    dir: TempDir,
}

impl TempHome {
    fn new() -> Self {
        Self {
            dir: TempDir::new().expect("temp dir"),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("doit").expect("binary built");
        cmd.env("HOME", self.dir.path());
        cmd.env("XDG_CONFIG_HOME", self.dir.path().join(".config"));
        cmd.env_remove("DOIT_MAX_JOBS");
        cmd.env_remove("DOIT_PROMPT");
        cmd.env_remove("DOIT_TABLE_FULL_POLICY");
        cmd.env("DOIT_LOG", "off");
        cmd
    }

    fn run_script(&self, args: &[&str], script: &str) -> Output {
        self.command()
            .args(args)
            .write_stdin(script)
            .output()
            .expect("doit runs")
    }
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Pid printed in the `[n] pid` registration line.
fn registered_pid(stdout: &str, job: usize) -> u32 {
    let marker = format!("[{}] ", job);
    let start = stdout.find(&marker).expect("registration line") + marker.len();
    stdout[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .expect("numeric pid")
}

/// First `wall-clock time` value after `from`.
fn wall_ms_after(stdout: &str, from: usize) -> f64 {
    stdout[from..]
        .lines()
        .find(|line| line.contains("wall-clock time"))
        .and_then(|line| line.split(':').next())
        .and_then(|value| value.trim().parse().ok())
        .expect("wall-clock line")
}

#[test]
#[serial]
fn background_job_is_announced_and_reaped_asynchronously() {
    let home = TempHome::new();
    let output = home.run_script(&[], "sleep 1 &\nsleep 2\nexit\n");
    assert!(output.status.success());

    let stdout = stdout_of(&output);
    let pid = registered_pid(&stdout, 1);
    let completed = format!("[1] {} Completed", pid);
    let completed_at = stdout.find(&completed).expect("completion notice");

    // The notice arrives while the foreground `sleep 2` is still running.
    let foreground_banner = stdout
        .rfind("***************** sleep ****************")
        .unwrap();
    assert!(completed_at < foreground_banner);

    let wall_ms = wall_ms_after(&stdout, completed_at);
    assert!(
        (900.0..1900.0).contains(&wall_ms),
        "background wall time was {}ms",
        wall_ms
    );
}

#[test]
fn missing_program_is_reported_and_loop_continues() {
    let home = TempHome::new();
    let output = home.run_script(&[], "doesnotexist\njobs\necho still-here\nexit\n");
    assert!(output.status.success());

    let stderr = stderr_of(&output);
    assert!(stderr.contains("doit: doesnotexist: "), "stderr: {}", stderr);

    let stdout = stdout_of(&output);
    assert!(!stdout.contains("[1]"));
    assert!(stdout.contains("still-here"));
}

#[test]
fn full_table_rejects_extra_background_job() {
    let home = TempHome::new();
    let output = home.run_script(
        &["--max-jobs", "2"],
        "sleep 2 &\nsleep 2 &\nsleep 2 &\njobs\nexit\n",
    );
    assert!(output.status.success());

    let stderr = stderr_of(&output);
    assert!(stderr.contains("job table full (2 jobs)"), "stderr: {}", stderr);

    let stdout = stdout_of(&output);
    let listed: Vec<&str> = stdout
        .lines()
        .filter(|line| line.trim_start_matches(">>>").starts_with('[') && line.ends_with(" sleep"))
        .collect();
    assert_eq!(listed.len(), 2, "stdout: {}", stdout);
    assert!(!stdout.contains("[3]"));
}

#[test]
fn full_table_can_run_the_job_in_the_foreground() {
    let home = TempHome::new();
    let output = home.run_script(
        &["--max-jobs", "1", "--table-full-policy", "foreground"],
        "sleep 1 &\ntrue &\nexit\n",
    );
    assert!(output.status.success());

    let stdout = stdout_of(&output);
    assert!(stdout.contains("***************** true ****************"));
    assert!(!stdout.contains("[2]"));
}

#[test]
fn cd_to_missing_directory_keeps_the_current_directory() {
    let home = TempHome::new();
    let workdir = TempDir::new().unwrap();
    let output = home
        .command()
        .current_dir(workdir.path())
        .write_stdin("cd /nonexistent\npwd\nexit\n")
        .output()
        .unwrap();
    assert!(output.status.success());

    let stderr = stderr_of(&output);
    assert!(stderr.contains("doit: cd: /nonexistent: "), "stderr: {}", stderr);

    let expected = workdir.path().canonicalize().unwrap();
    assert!(stdout_of(&output).contains(expected.to_str().unwrap()));
}

#[test]
fn cd_then_pwd_shows_the_new_directory() {
    let home = TempHome::new();
    let target = TempDir::new().unwrap();
    let target_path = target.path().canonicalize().unwrap();
    let script = format!("cd {}\npwd\nexit\n", target_path.display());

    home.command()
        .write_stdin(script)
        .assert()
        .success()
        .stdout(predicate::str::contains(target_path.to_str().unwrap()));
}

#[test]
fn foreground_command_prints_banner_and_report() {
    let home = TempHome::new();
    home.command()
        .write_stdin("echo hello\nquit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("hello"))
        .stdout(predicate::str::contains("***************** echo ****************"))
        .stdout(predicate::str::contains(": CPU time used"))
        .stdout(predicate::str::contains(": Number of page reclaims."));
}

#[test]
fn single_shot_runs_one_command_without_prompt() {
    let home = TempHome::new();
    home.command()
        .args(["echo", "one-shot"])
        .assert()
        .success()
        .stdout(predicate::str::contains("one-shot"))
        .stdout(predicate::str::contains("***************** echo ****************"))
        .stdout(predicate::str::contains(">>>").not());
}

#[test]
fn end_of_input_exits_cleanly() {
    let home = TempHome::new();
    home.command().write_stdin("").assert().success();
}

#[test]
fn custom_prompt_is_used() {
    let home = TempHome::new();
    home.command()
        .args(["--prompt", "doit% "])
        .write_stdin("exit\n")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("doit% "));
}

#[test]
fn invalid_capacity_fails_at_startup() {
    let home = TempHome::new();
    home.command()
        .args(["--max-jobs", "0"])
        .write_stdin("exit\n")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("max_jobs"));
}

#[test]
fn config_file_sets_the_prompt() {
    let home = TempHome::new();
    let config = home.dir.path().join("doit.toml");
    std::fs::write(&config, "prompt = \"cfg> \"\n").unwrap();

    home.command()
        .arg("--config")
        .arg(&config)
        .write_stdin("exit\n")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("cfg> "));
}
