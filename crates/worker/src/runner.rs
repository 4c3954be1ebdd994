use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use scorebox_core::{Check, Outcome};

/// Reserved exit code recorded when a probe had to be killed at the timeout.
pub const EXIT_KILLED: i32 = -1;

/// Reserved exit code recorded when a probe's command could not be started
/// at all (missing script, bad permissions).
pub const EXIT_SPAWN_FAILED: i32 = -2;

/// Execute one probe command with a hard wall-clock bound and classify its
/// termination.
///
/// - spawn failure: immediate `Timeout` with [`EXIT_SPAWN_FAILED`], no wait
/// - deadline elapses first: the child is killed, `Timeout` with
///   [`EXIT_KILLED`]
/// - child exits first: exit code 0 is `Pass`, 1 is `Partial`, anything else
///   `Fail`
///
/// Probe stdout/stderr are discarded; scripts communicate through their exit
/// code alone.
pub async fn run_check(check: &Check, timeout: Duration) -> (Outcome, i32) {
    let spawned = Command::new(&check.command)
        .args(&check.args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            warn!(
                command = %check.command,
                team = check.team_id,
                service = check.service_id,
                error = %e,
                "probe failed to start"
            );
            return (Outcome::Timeout, EXIT_SPAWN_FAILED);
        }
    };

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => match status.code() {
            Some(code) => {
                debug!(
                    command = %check.command,
                    team = check.team_id,
                    service = check.service_id,
                    exit_code = code,
                    "probe exited"
                );
                (Outcome::from_exit_code(code), code)
            }
            // Terminated by a signal before producing an exit code.
            None => (Outcome::Timeout, EXIT_KILLED),
        },
        Ok(Err(e)) => {
            warn!(
                command = %check.command,
                team = check.team_id,
                service = check.service_id,
                error = %e,
                "probe wait failed"
            );
            (Outcome::Timeout, EXIT_SPAWN_FAILED)
        }
        Err(_) => {
            warn!(
                command = %check.command,
                team = check.team_id,
                service = check.service_id,
                timeout_secs = timeout.as_secs_f64(),
                "probe timed out, killing"
            );
            if let Err(e) = child.start_kill() {
                warn!(error = %e, "failed to kill timed-out probe");
            }
            // Reap so the child doesn't linger as a zombie.
            let _ = child.wait().await;
            (Outcome::Timeout, EXIT_KILLED)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell_check(script: &str) -> Check {
        Check {
            team_id: 1,
            service_id: 1,
            command: "sh".into(),
            args: vec!["-c".into(), script.into()],
        }
    }

    #[tokio::test]
    async fn exit_zero_is_pass() {
        let (outcome, code) = run_check(&shell_check("exit 0"), Duration::from_secs(5)).await;
        assert_eq!(outcome, Outcome::Pass);
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn exit_one_is_partial() {
        let (outcome, code) = run_check(&shell_check("exit 1"), Duration::from_secs(5)).await;
        assert_eq!(outcome, Outcome::Partial);
        assert_eq!(code, 1);
    }

    #[tokio::test]
    async fn other_exit_codes_are_fail() {
        let (outcome, code) = run_check(&shell_check("exit 3"), Duration::from_secs(5)).await;
        assert_eq!(outcome, Outcome::Fail);
        assert_eq!(code, 3);
    }

    #[tokio::test]
    async fn overrunning_probe_is_killed_as_timeout() {
        let check = shell_check("sleep 10");
        let started = std::time::Instant::now();
        let (outcome, code) = run_check(&check, Duration::from_millis(200)).await;
        assert_eq!(outcome, Outcome::Timeout);
        assert_eq!(code, EXIT_KILLED);
        assert!(started.elapsed() < Duration::from_secs(5), "must not wait out the sleep");
    }

    #[tokio::test]
    async fn missing_binary_is_timeout_without_waiting() {
        let check = Check {
            team_id: 1,
            service_id: 1,
            command: "/nonexistent/probe-script".into(),
            args: vec![],
        };
        let (outcome, code) = run_check(&check, Duration::from_secs(5)).await;
        assert_eq!(outcome, Outcome::Timeout);
        assert_eq!(code, EXIT_SPAWN_FAILED);
    }
}
