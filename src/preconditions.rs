//! Environment gating performed once before any setting runs.
//!
//! - Host platform must be macOS
//! - Host OS major version must be in the supported list
//! - The executable's minisign signature must verify, when a public key is
//!   configured and `minisign` is installed
//! - Administrator credentials are cached before privileged settings run

use anyhow::{Context, Result};
use colored::Colorize;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::config::Config;
use crate::interrupt::is_interrupted;
use crate::output::Output;
use crate::shim::{CommandRunner, Invocation};

/// Major macOS versions lockdown has been checked against.
pub const SUPPORTED_MAJOR_VERSIONS: &[u32] = &[13, 14, 15, 26];

/// A parsed `sw_vers -productVersion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct OsVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d+)(?:\.(\d+))?(?:\.(\d+))?$").expect("version regex is valid")
    })
}

impl OsVersion {
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = version_regex().captures(raw.trim())?;
        let part = |i: usize| -> Option<u32> {
            match caps.get(i) {
                Some(m) => m.as_str().parse().ok(),
                None => Some(0),
            }
        };
        Some(Self {
            major: part(1)?,
            minor: part(2)?,
            patch: part(3)?,
        })
    }
}

impl fmt::Display for OsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.patch == 0 {
            write!(f, "{}.{}", self.major, self.minor)
        } else {
            write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
        }
    }
}

/// What lockdown knows about the machine it runs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    /// `std::env::consts::OS` of the running binary
    pub os: String,
    /// `sw_vers -productName` ("macOS")
    pub product_name: Option<String>,
    pub version: Option<OsVersion>,
    /// `uname -m` ("arm64" or "x86_64")
    pub arch: String,
    pub has_t2: bool,
    /// `id -u` printed 0
    pub is_root: bool,
}

impl Host {
    pub async fn detect(runner: &dyn CommandRunner) -> Result<Self> {
        Self::detect_on(std::env::consts::OS, runner).await
    }

    async fn detect_on(os: &str, runner: &dyn CommandRunner) -> Result<Self> {
        if os != "macos" {
            return Ok(Self {
                os: os.to_string(),
                product_name: None,
                version: None,
                arch: std::env::consts::ARCH.to_string(),
                has_t2: false,
                is_root: false,
            });
        }

        let product_name = stdout_of(runner, Invocation::new("sw_vers").arg("-productName")).await?;
        let version = stdout_of(runner, Invocation::new("sw_vers").arg("-productVersion"))
            .await?
            .and_then(|v| OsVersion::parse(&v));
        let arch = stdout_of(runner, Invocation::new("uname").arg("-m"))
            .await?
            .unwrap_or_else(|| std::env::consts::ARCH.to_string());

        // Only Intel Macs can carry a T2; Apple silicon never needs the probe
        let has_t2 = if arch == "x86_64" {
            stdout_of(
                runner,
                Invocation::new("system_profiler").arg("SPiBridgeDataType"),
            )
            .await?
            .is_some_and(|report| report.contains("T2"))
        } else {
            false
        };

        let is_root = stdout_of(runner, Invocation::new("id").arg("-u"))
            .await?
            .is_some_and(|uid| uid == "0");

        Ok(Self {
            os: os.to_string(),
            product_name,
            version,
            arch,
            has_t2,
            is_root,
        })
    }

    pub fn is_macos(&self) -> bool {
        self.os == "macos"
    }

    pub fn is_intel(&self) -> bool {
        self.arch == "x86_64"
    }

    #[cfg(test)]
    pub fn mac(version: &str, arch: &str, has_t2: bool) -> Self {
        Self {
            os: "macos".to_string(),
            product_name: Some("macOS".to_string()),
            version: OsVersion::parse(version),
            arch: arch.to_string(),
            has_t2,
            is_root: false,
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.product_name.as_deref().unwrap_or(&self.os))?;
        if let Some(version) = self.version {
            write!(f, " {}", version)?;
        }
        write!(f, " ({}", self.arch)?;
        if self.has_t2 {
            write!(f, ", T2")?;
        }
        write!(f, ")")
    }
}

/// Trimmed stdout of a successful invocation; `None` if it exited non-zero
/// or printed nothing. A program that cannot be started is an environment failure.
async fn stdout_of(runner: &dyn CommandRunner, invocation: Invocation) -> Result<Option<String>> {
    let output = match runner.run(&invocation).await {
        Ok(output) => output,
        Err(e) if is_interrupted(&e) => return Err(e),
        Err(e) => {
            return Err(PreconditionError::DetectionFailed {
                command: invocation.to_string(),
                detail: format!("{:#}", e),
            }
            .into())
        }
    };
    let stdout = output.stdout.trim();
    if !output.success || stdout.is_empty() {
        return Ok(None);
    }
    Ok(Some(stdout.to_string()))
}

/// A failed environment check. Always fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    UnsupportedPlatform { os: String },
    UnrecognizedProduct { name: Option<String> },
    UnknownVersion,
    /// A host detection command could not be started
    DetectionFailed { command: String, detail: String },
    UnsupportedVersion { found: OsVersion, supported: Vec<u32> },
    SignatureInvalid { path: PathBuf, detail: String },
    CredentialsUnavailable,
}

impl fmt::Display for PreconditionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreconditionError::UnsupportedPlatform { os } => {
                write!(f, "lockdown requires macOS (this host is {})", os)
            }
            PreconditionError::UnrecognizedProduct { name: Some(name) } => {
                write!(f, "lockdown requires macOS (sw_vers reports '{}')", name)
            }
            PreconditionError::UnrecognizedProduct { name: None } => {
                write!(f, "lockdown requires macOS (sw_vers did not report a product name)")
            }
            PreconditionError::UnknownVersion => {
                write!(f, "Could not determine the macOS version from sw_vers")
            }
            PreconditionError::DetectionFailed { command, detail } => {
                write!(f, "Could not inspect this host: `{}` failed ({})", command, detail)
            }
            PreconditionError::UnsupportedVersion { found, supported } => {
                let list = supported
                    .iter()
                    .map(u32::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(
                    f,
                    "macOS {} is not supported (supported major versions: {}).\n\
                     Hint: set [preconditions] supported_versions in lockdown.toml to override.",
                    found, list
                )
            }
            PreconditionError::SignatureInvalid { path, detail } => write!(
                f,
                "Signature verification failed for {}: {}",
                path.display(),
                detail
            ),
            PreconditionError::CredentialsUnavailable => write!(
                f,
                "Administrator credentials are required to fix settings (sudo -v failed)"
            ),
        }
    }
}

impl std::error::Error for PreconditionError {}

pub fn check_platform(host: &Host) -> Result<(), PreconditionError> {
    if !host.is_macos() {
        return Err(PreconditionError::UnsupportedPlatform {
            os: host.os.clone(),
        });
    }
    match host.product_name.as_deref() {
        Some("macOS") | Some("Mac OS X") => Ok(()),
        other => Err(PreconditionError::UnrecognizedProduct {
            name: other.map(str::to_string),
        }),
    }
}

pub fn check_version(host: &Host, supported: &[u32]) -> Result<(), PreconditionError> {
    let version = host.version.ok_or(PreconditionError::UnknownVersion)?;
    if supported.contains(&version.major) {
        Ok(())
    } else {
        Err(PreconditionError::UnsupportedVersion {
            found: version,
            supported: supported.to_vec(),
        })
    }
}

/// Inputs for a minisign verification of the running executable.
#[derive(Debug, Clone)]
pub struct SignatureCheck<'a> {
    pub minisign: &'a str,
    pub public_key: &'a str,
    pub executable: &'a Path,
    pub signature: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureStatus {
    Verified,
    /// minisign is not installed; verification was not attempted
    ToolMissing,
}

/// `<executable>.minisig`, next to the binary.
pub fn default_signature_path(executable: &Path) -> PathBuf {
    let mut name = executable.as_os_str().to_os_string();
    name.push(".minisig");
    PathBuf::from(name)
}

pub async fn verify_signature(
    runner: &dyn CommandRunner,
    check: &SignatureCheck<'_>,
) -> Result<SignatureStatus> {
    let invocation = Invocation::new(check.minisign)
        .args(["-V", "-q", "-m"])
        .arg(check.executable.display().to_string())
        .arg("-x")
        .arg(check.signature.display().to_string())
        .arg("-P")
        .arg(check.public_key);

    let output = match runner.run(&invocation).await {
        Ok(output) => output,
        Err(e) if is_interrupted(&e) => return Err(e),
        Err(_) => return Ok(SignatureStatus::ToolMissing),
    };

    if !output.success {
        let detail = match output.stderr.trim() {
            "" => output.failure_summary(),
            stderr => stderr.to_string(),
        };
        return Err(PreconditionError::SignatureInvalid {
            path: check.executable.to_path_buf(),
            detail,
        }
        .into());
    }
    Ok(SignatureStatus::Verified)
}

/// Run every environment check and return the detected host.
pub async fn check(runner: &dyn CommandRunner, config: &Config, output: &Output) -> Result<Host> {
    let host = Host::detect(runner).await?;
    check_platform(&host)?;
    check_version(&host, &config.supported_versions())?;
    output.verbose(&format!("lockdown: host {}", host));

    let Some(public_key) = config.signature_public_key() else {
        output.verbose("lockdown: no signing key configured, skipping signature check");
        return Ok(host);
    };

    let executable = std::env::current_exe().context("Failed to locate the lockdown executable")?;
    let signature = config
        .signature_path()
        .map(PathBuf::from)
        .unwrap_or_else(|| default_signature_path(&executable));
    let minisign = config.minisign_path();

    let status = verify_signature(
        runner,
        &SignatureCheck {
            minisign: &minisign,
            public_key,
            executable: &executable,
            signature,
        },
    )
    .await?;

    match status {
        SignatureStatus::Verified => output.verbose("lockdown: signature verified"),
        SignatureStatus::ToolMissing => output.warn(&format!(
            "{} {} not found; skipping signature verification",
            "⚠".yellow(),
            minisign
        )),
    }

    Ok(host)
}

/// Prompt for the sudo password once so privileged settings don't each ask.
///
/// Returns whether credentials are now cached.
pub async fn cache_credentials(runner: &dyn CommandRunner, sudo: &str) -> Result<bool> {
    runner
        .succeeds(&Invocation::new(sudo).arg("-v").interactive())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shim::testing::FakeRunner;
    use crate::shim::CommandOutput;

    fn intel_runner(bridge: &str) -> FakeRunner {
        FakeRunner::new()
            .respond("sw_vers -productName", CommandOutput::ok("macOS\n"))
            .respond("sw_vers -productVersion", CommandOutput::ok("14.6.1\n"))
            .respond("uname -m", CommandOutput::ok("x86_64\n"))
            .respond("system_profiler SPiBridgeDataType", CommandOutput::ok(bridge))
    }

    #[test]
    fn test_os_version_parse() {
        assert_eq!(
            OsVersion::parse("14.6.1"),
            Some(OsVersion {
                major: 14,
                minor: 6,
                patch: 1
            })
        );
        assert_eq!(OsVersion::parse("15\n").map(|v| v.major), Some(15));
        assert_eq!(OsVersion::parse("15.0").map(|v| v.to_string()).as_deref(), Some("15.0"));
        assert_eq!(OsVersion::parse("fifteen"), None);
        assert_eq!(OsVersion::parse("15.0 beta"), None);
    }

    #[tokio::test]
    async fn test_detect_non_macos_runs_nothing() {
        let runner = FakeRunner::new();
        let host = Host::detect_on("linux", &runner).await.unwrap();
        assert!(!host.is_macos());
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_detect_intel_with_t2() {
        let runner = intel_runner("Controller Information:\n  Model Name: Apple T2 Security Chip\n");
        let host = Host::detect_on("macos", &runner).await.unwrap();
        assert_eq!(host.product_name.as_deref(), Some("macOS"));
        assert_eq!(host.version.map(|v| v.major), Some(14));
        assert!(host.is_intel());
        assert!(host.has_t2);
        assert!(!host.is_root);
        assert_eq!(host.to_string(), "macOS 14.6.1 (x86_64, T2)");
    }

    #[tokio::test]
    async fn test_detect_root() {
        let runner = intel_runner("").respond("id -u", CommandOutput::ok("0\n"));
        let host = Host::detect_on("macos", &runner).await.unwrap();
        assert!(host.is_root);

        let runner = intel_runner("").respond("id -u", CommandOutput::ok("501\n"));
        let host = Host::detect_on("macos", &runner).await.unwrap();
        assert!(!host.is_root);
    }

    #[tokio::test]
    async fn test_detection_tool_missing_is_an_environment_error() {
        let runner = intel_runner("").missing("sw_vers");
        let err = Host::detect_on("macos", &runner).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PreconditionError>(),
            Some(PreconditionError::DetectionFailed { .. })
        ));
        assert!(err.to_string().contains("`sw_vers -productName` failed"));
    }

    #[tokio::test]
    async fn test_detect_intel_without_t2() {
        let runner = intel_runner("");
        let host = Host::detect_on("macos", &runner).await.unwrap();
        assert!(!host.has_t2);
    }

    #[tokio::test]
    async fn test_detect_apple_silicon_skips_bridge_probe() {
        let runner = FakeRunner::new()
            .respond("sw_vers -productName", CommandOutput::ok("macOS\n"))
            .respond("sw_vers -productVersion", CommandOutput::ok("15.1\n"))
            .respond("uname -m", CommandOutput::ok("arm64\n"));
        let host = Host::detect_on("macos", &runner).await.unwrap();
        assert!(!host.is_intel());
        assert!(!runner
            .call_lines()
            .iter()
            .any(|l| l.starts_with("system_profiler")));
    }

    #[test]
    fn test_check_platform() {
        assert!(check_platform(&Host::mac("14.5", "arm64", false)).is_ok());

        let mut linux = Host::mac("14.5", "x86_64", false);
        linux.os = "linux".to_string();
        let err = check_platform(&linux).unwrap_err();
        assert_eq!(err.to_string(), "lockdown requires macOS (this host is linux)");

        let mut server = Host::mac("14.5", "x86_64", false);
        server.product_name = Some("iPadOS".to_string());
        assert!(matches!(
            check_platform(&server),
            Err(PreconditionError::UnrecognizedProduct { .. })
        ));
    }

    #[test]
    fn test_check_version() {
        let host = Host::mac("14.5", "arm64", false);
        assert!(check_version(&host, SUPPORTED_MAJOR_VERSIONS).is_ok());

        let old = Host::mac("12.7", "x86_64", false);
        let err = check_version(&old, SUPPORTED_MAJOR_VERSIONS).unwrap_err();
        assert!(err.to_string().contains("macOS 12.7 is not supported"));

        let mut unknown = Host::mac("14.5", "arm64", false);
        unknown.version = None;
        assert_eq!(
            check_version(&unknown, SUPPORTED_MAJOR_VERSIONS),
            Err(PreconditionError::UnknownVersion)
        );
    }

    fn signature_check(exe: &Path) -> SignatureCheck<'_> {
        SignatureCheck {
            minisign: "minisign",
            public_key: "RWTESTKEY",
            executable: exe,
            signature: default_signature_path(exe),
        }
    }

    #[test]
    fn test_default_signature_path() {
        assert_eq!(
            default_signature_path(Path::new("/usr/local/bin/lockdown")),
            PathBuf::from("/usr/local/bin/lockdown.minisig")
        );
    }

    #[tokio::test]
    async fn test_signature_tool_missing_is_not_fatal() {
        let runner = FakeRunner::new().missing("minisign");
        let exe = PathBuf::from("/usr/local/bin/lockdown");
        let status = verify_signature(&runner, &signature_check(&exe)).await.unwrap();
        assert_eq!(status, SignatureStatus::ToolMissing);
    }

    #[tokio::test]
    async fn test_signature_verified() {
        let runner = FakeRunner::new().respond(
            "minisign -V -q -m /usr/local/bin/lockdown -x /usr/local/bin/lockdown.minisig -P RWTESTKEY",
            CommandOutput::ok(""),
        );
        let exe = PathBuf::from("/usr/local/bin/lockdown");
        let status = verify_signature(&runner, &signature_check(&exe)).await.unwrap();
        assert_eq!(status, SignatureStatus::Verified);
    }

    #[tokio::test]
    async fn test_signature_mismatch_is_fatal() {
        let runner = FakeRunner::new().respond(
            "minisign -V -q -m /usr/local/bin/lockdown -x /usr/local/bin/lockdown.minisig -P RWTESTKEY",
            CommandOutput::failed(1).with_stderr("Signature verification failed\n"),
        );
        let exe = PathBuf::from("/usr/local/bin/lockdown");
        let err = verify_signature(&runner, &signature_check(&exe))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PreconditionError>(),
            Some(PreconditionError::SignatureInvalid { .. })
        ));
    }

    #[tokio::test]
    async fn test_cache_credentials_is_interactive() {
        let runner = FakeRunner::new().respond("/usr/bin/sudo -v", CommandOutput::ok(""));
        assert!(cache_credentials(&runner, "/usr/bin/sudo").await.unwrap());
        assert!(runner.calls()[0].interactive);
    }
}
