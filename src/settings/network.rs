//! Per-service network configuration via `networksetup`.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use crate::registry::{Check, Remedy};
use crate::shim::{CommandRunner, Invocation};

/// Service names from `networksetup -listallnetworkservices`.
///
/// The first line is an explanatory header; disabled services carry a
/// leading `*` and are still returned.
pub fn parse_network_services(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter(|line| !line.starts_with("An asterisk"))
        .map(|line| line.trim_start_matches('*').trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// The `IPv6:` line of `networksetup -getinfo <service>`.
pub fn parse_ipv6_mode(stdout: &str) -> Option<&str> {
    stdout
        .lines()
        .find_map(|line| line.trim().strip_prefix("IPv6:"))
        .map(str::trim)
}

async fn list_services(runner: &dyn CommandRunner) -> Result<Vec<String>> {
    let invocation = Invocation::new("networksetup").arg("-listallnetworkservices");
    let output = runner.run(&invocation).await?;
    if !output.success {
        bail!("`{}` failed ({})", invocation, output.failure_summary());
    }
    Ok(parse_network_services(&output.stdout))
}

/// IPv6 is off on every network service.
pub struct Ipv6Off;

#[async_trait]
impl Check for Ipv6Off {
    async fn check(&self, runner: &dyn CommandRunner) -> Result<bool> {
        for service in list_services(runner).await? {
            let output = runner
                .run(&Invocation::new("networksetup").arg("-getinfo").arg(&service))
                .await?;
            if !output.success {
                return Ok(false);
            }
            // Services without an IP configuration (e.g. Thunderbolt Bridge
            // with no cable) print no IPv6 line at all
            match parse_ipv6_mode(&output.stdout) {
                Some(mode) if !mode.eq_ignore_ascii_case("off") => return Ok(false),
                _ => {}
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl Remedy for Ipv6Off {
    async fn remediate(&self, runner: &dyn CommandRunner) -> Result<()> {
        for service in list_services(runner).await? {
            let invocation = Invocation::new("networksetup")
                .arg("-setv6off")
                .arg(&service)
                .privileged(true);
            let output = runner
                .run(&invocation)
                .await
                .with_context(|| format!("Failed to disable IPv6 on {}", service))?;
            if !output.success {
                bail!("`{}` failed ({})", invocation, output.failure_summary());
            }
        }
        Ok(())
    }

    fn privileged(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shim::testing::FakeRunner;
    use crate::shim::CommandOutput;

    const SERVICES: &str = "An asterisk (*) denotes that a network service is disabled.\n\
                            Wi-Fi\n\
                            *Thunderbolt Bridge\n\
                            USB 10/100 LAN\n";

    fn services() -> FakeRunner {
        FakeRunner::new().respond(
            "networksetup -listallnetworkservices",
            CommandOutput::ok(SERVICES),
        )
    }

    #[test]
    fn test_parse_network_services() {
        assert_eq!(
            parse_network_services(SERVICES),
            vec!["Wi-Fi", "Thunderbolt Bridge", "USB 10/100 LAN"]
        );
    }

    #[test]
    fn test_parse_ipv6_mode() {
        let info = "DHCP Configuration\nIP address: 192.168.1.20\nIPv6: Automatic\nIPv6 IP address: none\n";
        assert_eq!(parse_ipv6_mode(info), Some("Automatic"));
        assert_eq!(parse_ipv6_mode("IPv6: Off\n"), Some("Off"));
        assert_eq!(parse_ipv6_mode("Wi-Fi ID: aa:bb\n"), None);
    }

    #[tokio::test]
    async fn test_ipv6_off_everywhere_passes() {
        let runner = services()
            .respond("networksetup -getinfo Wi-Fi", CommandOutput::ok("IPv6: Off\n"))
            .respond(
                "networksetup -getinfo Thunderbolt Bridge",
                CommandOutput::ok("IPv6: Off\n"),
            )
            .respond(
                "networksetup -getinfo USB 10/100 LAN",
                CommandOutput::ok("IPv6: Off\n"),
            );
        assert!(Ipv6Off.check(&runner).await.unwrap());
    }

    #[tokio::test]
    async fn test_one_automatic_service_fails() {
        let runner = services()
            .respond("networksetup -getinfo Wi-Fi", CommandOutput::ok("IPv6: Off\n"))
            .respond(
                "networksetup -getinfo Thunderbolt Bridge",
                CommandOutput::ok("IPv6: Automatic\n"),
            );
        assert!(!Ipv6Off.check(&runner).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_failure_is_an_error() {
        let runner = FakeRunner::new();
        assert!(Ipv6Off.check(&runner).await.is_err());
    }

    #[tokio::test]
    async fn test_remediate_each_service() {
        let runner = services()
            .respond("networksetup -setv6off Wi-Fi", CommandOutput::ok(""))
            .respond(
                "networksetup -setv6off Thunderbolt Bridge",
                CommandOutput::ok(""),
            )
            .respond(
                "networksetup -setv6off USB 10/100 LAN",
                CommandOutput::ok(""),
            );

        Ipv6Off.remediate(&runner).await.unwrap();

        let setters: Vec<_> = runner
            .calls()
            .into_iter()
            .filter(|c| c.args[0] == "-setv6off")
            .collect();
        assert_eq!(setters.len(), 3);
        assert!(setters.iter().all(|c| c.privileged));
    }
}
