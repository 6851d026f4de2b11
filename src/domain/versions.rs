//! Component version resolution.
//!
//! Each external component reports its version in its own format. The parsers
//! here are pure and return [`Parsed`]; the `resolve_*` functions run the
//! component, parse, log, and fall back to `"N/A"`. The expected identifier
//! always comes from the build.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::error::{ProbeError, ProbeResult};
use super::snapshot::{ComponentVersion, NOT_AVAILABLE};
use super::sources::{CommandRunner, ContainerdClient, ServerVersion};

const TINI_PREFIX: &str = "tini version ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    Recognized(String),
    Unrecognized,
}

impl Parsed {
    fn non_empty(id: &str) -> Self {
        if id.is_empty() {
            Parsed::Unrecognized
        } else {
            Parsed::Recognized(id.to_string())
        }
    }
}

/// Runtime output is three lines; the second is `commit: <id>`.
///
/// ```text
/// runc version 1.1.12
/// commit: v1.1.12-0-g51d5e94
/// spec: 1.0.2-dev
/// ```
pub fn parse_runtime_version(output: &str) -> Parsed {
    let lines: Vec<&str> = output.trim().split('\n').collect();
    if lines.len() != 3 {
        return Parsed::Unrecognized;
    }
    let parts: Vec<&str> = lines[1].split(": ").collect();
    if parts.len() != 2 {
        return Parsed::Unrecognized;
    }
    Parsed::non_empty(parts[1].trim())
}

/// Init output is `tini version <ver> - git.<sha>`.
///
/// Release builds (expected id starting with `v`) report `v<ver>`; commit
/// builds report `<sha>`.
pub fn parse_init_version(output: &str, expected: &str) -> Parsed {
    let parts: Vec<&str> = output.trim().split(" - ").collect();
    if parts.len() != 2 {
        return Parsed::Unrecognized;
    }

    if expected.starts_with('v') {
        let version = parts[0].strip_prefix(TINI_PREFIX).unwrap_or(parts[0]);
        return Parsed::Recognized(format!("v{version}"));
    }

    let git_parts: Vec<&str> = parts[1].split('.').collect();
    if git_parts.len() != 2 || git_parts[0] != "git" {
        return Parsed::Unrecognized;
    }
    Parsed::non_empty(git_parts[1])
}

/// containerd output is `containerd <package> <version> <revision>`.
pub fn parse_containerd_version(output: &str) -> Parsed {
    match output.split_whitespace().collect::<Vec<_>>().as_slice() {
        ["containerd", _, _, revision] => Parsed::non_empty(revision),
        _ => Parsed::Unrecognized,
    }
}

/// Shorten `expected` to the length of an observed short commit id so the
/// two compare like for like.
pub fn truncate_expected(expected: &str, observed: &str) -> String {
    expected.chars().take(observed.chars().count()).collect()
}

// ── Resolution ─────────────────────────────────────────────

pub async fn resolve_containerd(client: &dyn ContainerdClient, expected: &str) -> ComponentVersion {
    match client.server_version().await {
        Ok(sv) => {
            debug!(version = %sv.version, revision = %sv.revision, "containerd responded");
            ComponentVersion {
                expected: expected.to_string(),
                observed: sv.revision,
            }
        }
        Err(e) => {
            warn!(error = %e, "failed to retrieve containerd version");
            ComponentVersion::unavailable(expected)
        }
    }
}

pub async fn resolve_runtime(
    runner: &dyn CommandRunner,
    binary: &Path,
    expected: &str,
) -> ComponentVersion {
    let output = match runner.version_output(binary).await {
        Ok(output) => output,
        Err(e) => {
            warn!(binary = %binary.display(), error = %e, "failed to retrieve runtime version");
            return ComponentVersion::unavailable(expected);
        }
    };

    match parse_runtime_version(&output) {
        Parsed::Recognized(id) => ComponentVersion {
            expected: expected.to_string(),
            observed: id,
        },
        Parsed::Unrecognized => {
            warn!(binary = %binary.display(), output = %output, "failed to retrieve runtime version: unknown output format");
            ComponentVersion::unavailable(expected)
        }
    }
}

pub async fn resolve_init(
    runner: &dyn CommandRunner,
    binary: &Path,
    expected: &str,
) -> ComponentVersion {
    let output = match runner.version_output(binary).await {
        Ok(output) => output,
        Err(e) => {
            warn!(binary = %binary.display(), error = %e, "failed to retrieve init version");
            return ComponentVersion::unavailable(expected);
        }
    };

    match parse_init_version(&output, expected) {
        Parsed::Recognized(id) if expected.starts_with('v') => ComponentVersion {
            expected: expected.to_string(),
            observed: id,
        },
        Parsed::Recognized(id) => ComponentVersion {
            expected: truncate_expected(expected, &id),
            observed: id,
        },
        Parsed::Unrecognized => {
            warn!(binary = %binary.display(), output = %output, "failed to retrieve init version: unknown output format");
            ComponentVersion::unavailable(expected)
        }
    }
}

// ── Process-backed collaborators ───────────────────────────

/// Runs binaries with `tokio::process`. No timeout is applied.
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn version_output(&self, program: &Path) -> ProbeResult<String> {
        let output = Command::new(program)
            .arg("--version")
            .output()
            .await
            .map_err(|source| ProbeError::Command {
                program: program.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(ProbeError::ExitStatus {
                program: program.display().to_string(),
                status: output.status,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// containerd client that asks the `containerd` binary for its version.
pub struct ContainerdCli {
    binary: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl ContainerdCli {
    pub fn new(binary: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            binary: binary.into(),
            runner,
        }
    }
}

#[async_trait]
impl ContainerdClient for ContainerdCli {
    async fn server_version(&self) -> ProbeResult<ServerVersion> {
        let output = self.runner.version_output(&self.binary).await?;
        let version = output
            .split_whitespace()
            .nth(2)
            .unwrap_or(NOT_AVAILABLE)
            .to_string();
        match parse_containerd_version(&output) {
            Parsed::Recognized(revision) => Ok(ServerVersion { version, revision }),
            Parsed::Unrecognized => Err(ProbeError::parse("containerd version", output)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn runtime_takes_second_field_of_second_line() {
        assert_eq!(
            parse_runtime_version("a\nb: c\nd"),
            Parsed::Recognized("c".into())
        );
        assert_eq!(
            parse_runtime_version(
                "runc version 1.1.12\ncommit: v1.1.12-0-g51d5e94\nspec: 1.0.2-dev\n"
            ),
            Parsed::Recognized("v1.1.12-0-g51d5e94".into())
        );
    }

    #[test]
    fn runtime_rejects_wrong_line_count() {
        assert_eq!(parse_runtime_version("a\nb: c"), Parsed::Unrecognized);
        assert_eq!(parse_runtime_version("a\nb: c\nd\ne"), Parsed::Unrecognized);
        assert_eq!(parse_runtime_version(""), Parsed::Unrecognized);
    }

    #[test]
    fn runtime_rejects_missing_separator() {
        assert_eq!(parse_runtime_version("a\nb c\nd"), Parsed::Unrecognized);
        assert_eq!(parse_runtime_version("a\nb:c\nd"), Parsed::Unrecognized);
        assert_eq!(parse_runtime_version("a\nb: c: e\nd"), Parsed::Unrecognized);
        assert_eq!(parse_runtime_version("a\nb:  \nd"), Parsed::Unrecognized);
    }

    #[test]
    fn init_release_build_reports_tagged_version() {
        assert_eq!(
            parse_init_version("tini version 0.9.0 - git.abc123", "v0.19.0"),
            Parsed::Recognized("v0.9.0".into())
        );
    }

    #[test]
    fn init_commit_build_reports_sha() {
        assert_eq!(
            parse_init_version("0.9.0 - git.abc123", "949e6facb77383876aeff8a6944dde66b3089574"),
            Parsed::Recognized("abc123".into())
        );
    }

    #[test]
    fn init_rejects_unexpected_shapes() {
        let sha = "949e6facb77383876aeff8a6944dde66b3089574";
        assert_eq!(parse_init_version("tini version 0.9.0", sha), Parsed::Unrecognized);
        assert_eq!(parse_init_version("0.9.0 - abc123", sha), Parsed::Unrecognized);
        assert_eq!(parse_init_version("0.9.0 - git.abc.123", sha), Parsed::Unrecognized);
        assert_eq!(parse_init_version("0.9.0 - svn.abc123", sha), Parsed::Unrecognized);
        assert_eq!(parse_init_version("a - b - c", "v1"), Parsed::Unrecognized);
    }

    #[test]
    fn containerd_takes_revision_field() {
        assert_eq!(
            parse_containerd_version(
                "containerd github.com/containerd/containerd v1.7.13 7c3aca7a610df76212171d200ca3811ff6096eb8\n"
            ),
            Parsed::Recognized("7c3aca7a610df76212171d200ca3811ff6096eb8".into())
        );
        assert_eq!(parse_containerd_version("containerd v1.7.13"), Parsed::Unrecognized);
    }

    #[test]
    fn truncate_expected_counts_chars() {
        assert_eq!(truncate_expected("949e6facb773", "abc123"), "949e6f");
        assert_eq!(truncate_expected("abc", "abcdef"), "abc");
    }

    // ── resolvers ──

    struct FakeRunner(HashMap<PathBuf, Result<String, String>>);

    impl FakeRunner {
        fn with(binary: &str, result: Result<&str, &str>) -> Self {
            Self(HashMap::from([(
                PathBuf::from(binary),
                result.map(str::to_string).map_err(str::to_string),
            )]))
        }
    }

    #[async_trait]
    impl CommandRunner for FakeRunner {
        async fn version_output(&self, program: &Path) -> ProbeResult<String> {
            match self.0.get(program) {
                Some(Ok(out)) => Ok(out.clone()),
                Some(Err(msg)) => Err(ProbeError::parse("fake", msg.clone())),
                None => Err(ProbeError::Command {
                    program: program.display().to_string(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                }),
            }
        }
    }

    #[tokio::test]
    async fn init_commit_build_truncates_expected() {
        let runner = FakeRunner::with("docker-init", Ok("0.9.0 - git.abc123\n"));
        let v = resolve_init(
            &runner,
            Path::new("docker-init"),
            "949e6facb77383876aeff8a6944dde66b3089574",
        )
        .await;
        assert_eq!(v.observed, "abc123");
        assert_eq!(v.expected, "949e6f");
    }

    #[tokio::test]
    async fn init_release_build_keeps_expected() {
        let runner = FakeRunner::with("docker-init", Ok("tini version 0.19.0 - git.de40ad0\n"));
        let v = resolve_init(&runner, Path::new("docker-init"), "v0.19.0").await;
        assert_eq!(v.observed, "v0.19.0");
        assert_eq!(v.expected, "v0.19.0");
    }

    #[tokio::test]
    async fn missing_binary_is_not_available() {
        let runner = FakeRunner(HashMap::new());
        let runtime = resolve_runtime(&runner, Path::new("runc"), "v1.1.12").await;
        let init = resolve_init(&runner, Path::new("docker-init"), "de40ad0").await;
        assert_eq!(runtime, ComponentVersion::unavailable("v1.1.12"));
        assert_eq!(init, ComponentVersion::unavailable("de40ad0"));
    }

    #[tokio::test]
    async fn unrecognized_runtime_output_is_not_available() {
        let runner = FakeRunner::with("runc", Ok("runc 1.1.12\n"));
        let v = resolve_runtime(&runner, Path::new("runc"), "v1.1.12").await;
        assert_eq!(v.observed, NOT_AVAILABLE);
        assert_eq!(v.expected, "v1.1.12");
    }

    #[tokio::test]
    async fn containerd_cli_resolves_revision() {
        let runner: Arc<dyn CommandRunner> = Arc::new(FakeRunner::with(
            "containerd",
            Ok("containerd github.com/containerd/containerd v1.7.13 7c3aca7\n"),
        ));
        let client = ContainerdCli::new("containerd", runner);
        let v = resolve_containerd(&client, "7c3aca7a610df76212171d200ca3811ff6096eb8").await;
        assert_eq!(v.observed, "7c3aca7");
        assert_eq!(v.expected, "7c3aca7a610df76212171d200ca3811ff6096eb8");

        let sv = client.server_version().await.unwrap();
        assert_eq!(sv.version, "v1.7.13");
    }

    #[tokio::test]
    async fn containerd_failure_is_not_available() {
        let runner: Arc<dyn CommandRunner> =
            Arc::new(FakeRunner::with("containerd", Err("connection refused")));
        let client = ContainerdCli::new("containerd", runner);
        let v = resolve_containerd(&client, "7c3aca7").await;
        assert_eq!(v, ComponentVersion::unavailable("7c3aca7"));
    }

    #[cfg(unix)]
    fn script(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_runner_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let runc = script(
            &dir,
            "runc",
            r#"[ "$1" = "--version" ] || exit 2
printf 'runc version 1.1.12\ncommit: v1.1.12-0-g51d5e94\nspec: 1.0.2-dev\n'"#,
        );
        let v = resolve_runtime(&ProcessRunner, &runc, "v1.1.12-0-g51d5e94").await;
        assert_eq!(v.observed, "v1.1.12-0-g51d5e94");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_runner_reports_exit_status() {
        let dir = tempfile::tempdir().unwrap();
        let broken = script(&dir, "docker-init", "echo boom >&2; exit 3");
        let err = ProcessRunner.version_output(&broken).await.unwrap_err();
        assert!(matches!(err, ProbeError::ExitStatus { .. }), "{err}");

        let v = resolve_init(&ProcessRunner, &broken, "v0.19.0").await;
        assert_eq!(v.observed, NOT_AVAILABLE);
    }

    #[tokio::test]
    async fn process_runner_reports_missing_binary() {
        let err = ProcessRunner
            .version_output(Path::new("/nonexistent/diagsnap-test-binary"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Command { .. }), "{err}");
    }
}
