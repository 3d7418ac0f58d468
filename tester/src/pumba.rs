//! Pumba `netem` command builder for network fault injection.
//!
//! Builds the argument list of a Pumba container that applies `tc netem`
//! rules to a target container, optionally scoped to traffic towards a set
//! of IPs. Pumba runs the rules from a helper image (`--tc-image`), so the
//! target does not need `iproute2` itself.

use std::net::IpAddr;
use std::time::Duration;

/// Image of the Pumba chaos tool.
pub const PUMBA_IMAGE: &str = "gaiaadm/pumba:0.7.2";

/// Helper image providing `tc` for Pumba.
pub const TC_IMAGE: &str = "gaiadocker/iproute2";

/// Network fault applied by `pumba netem`.
#[derive(Debug, Clone, PartialEq)]
pub enum FaultProfile {
    /// Drop packets.
    Loss {
        /// Loss percentage (0–100).
        percent: f32,
        /// Correlation with the previous packet, for burst loss.
        correlation: Option<f32>,
    },
    /// Delay packets.
    Delay {
        /// Fixed delay.
        time: Duration,
        /// Random variation around `time`.
        jitter: Option<Duration>,
    },
    /// Limit bandwidth.
    Rate {
        /// Bandwidth limit in kbit/s.
        kbit: u64,
    },
    /// Duplicate packets.
    Duplicate {
        /// Duplication percentage.
        percent: f32,
    },
    /// Corrupt packets.
    Corrupt {
        /// Corruption percentage.
        percent: f32,
    },
}

impl Default for FaultProfile {
    fn default() -> Self {
        Self::partition()
    }
}

impl FaultProfile {
    /// Full partition: 100% packet loss.
    pub fn partition() -> Self {
        FaultProfile::Loss {
            percent: 100.0,
            correlation: None,
        }
    }

    /// Random packet loss.
    pub fn loss(percent: f32) -> Self {
        FaultProfile::Loss {
            percent,
            correlation: None,
        }
    }

    /// Fixed latency.
    pub fn delay(time: Duration) -> Self {
        FaultProfile::Delay { time, jitter: None }
    }

    /// Pumba sub-command and its flags.
    pub fn to_args(&self) -> Vec<String> {
        match self {
            FaultProfile::Loss {
                percent,
                correlation,
            } => {
                let mut args = vec!["loss".into(), format!("--percent={}", percent)];
                if let Some(corr) = correlation {
                    args.push(format!("--correlation={}", corr));
                }
                args
            }
            FaultProfile::Delay { time, jitter } => {
                let mut args = vec!["delay".into(), format!("--time={}", time.as_millis())];
                if let Some(jitter) = jitter {
                    args.push(format!("--jitter={}", jitter.as_millis()));
                }
                args
            }
            FaultProfile::Rate { kbit } => vec!["rate".into(), format!("--rate={}kbit", kbit)],
            FaultProfile::Duplicate { percent } => {
                vec!["duplicate".into(), format!("--percent={}", percent)]
            }
            FaultProfile::Corrupt { percent } => {
                vec!["corrupt".into(), format!("--percent={}", percent)]
            }
        }
    }
}

/// Format a duration the way Pumba's Go flag parser expects (`100m`, `30s`).
pub fn go_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let nanos = duration.subsec_nanos();
    if nanos % 1_000 != 0 {
        return format!("{}ns", duration.as_nanos());
    }
    if nanos % 1_000_000 != 0 {
        return format!("{}us", duration.as_micros());
    }
    if nanos != 0 {
        return format!("{}ms", duration.as_millis());
    }
    if secs != 0 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs != 0 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

/// `pumba netem` invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct NetemCommand {
    /// Pumba log level.
    pub log_level: String,
    /// How long the fault stays active.
    pub duration: Duration,
    /// Interface inside the target, `None` for Pumba's default (`eth0`).
    pub interface: Option<String>,
    /// Only affect traffic to these IPs; empty means all traffic.
    pub targets: Vec<IpAddr>,
    /// Helper image providing `tc`.
    pub tc_image: Option<String>,
    /// Fault to apply.
    pub profile: FaultProfile,
    /// Name of the container the rules are installed in.
    pub container: String,
}

impl NetemCommand {
    /// Full partition of `container` for `duration`.
    pub fn new(container: &str, duration: Duration) -> Self {
        Self {
            log_level: "debug".into(),
            duration,
            interface: None,
            targets: Vec::new(),
            tc_image: Some(TC_IMAGE.into()),
            profile: FaultProfile::partition(),
            container: container.into(),
        }
    }

    /// Restrict the fault to traffic towards `targets`.
    pub fn targets(mut self, targets: impl IntoIterator<Item = IpAddr>) -> Self {
        self.targets = targets.into_iter().collect();
        self
    }

    /// Set the fault profile.
    pub fn profile(mut self, profile: FaultProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Set the network interface.
    pub fn interface(mut self, iface: &str) -> Self {
        self.interface = Some(iface.into());
        self
    }

    /// Set the Pumba log level.
    pub fn log_level(mut self, level: &str) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set or clear the `tc` helper image.
    pub fn tc_image(mut self, image: Option<&str>) -> Self {
        self.tc_image = image.map(Into::into);
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            format!("--log-level={}", self.log_level),
            "netem".into(),
            format!("--duration={}", go_duration(self.duration)),
        ];

        if let Some(iface) = &self.interface {
            args.push(format!("--interface={}", iface));
        }

        for ip in &self.targets {
            args.push(format!("--target={}", ip));
        }

        if let Some(image) = &self.tc_image {
            args.push(format!("--tc-image={}", image));
        }

        args.extend(self.profile.to_args());
        args.push(self.container.clone());
        args
    }

    /// Build the full command string (for logging/debugging).
    pub fn build_command(&self) -> String {
        format!("pumba {}", self.build_args().join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn partition_command() {
        let cmd = NetemCommand::new("peer-1", Duration::from_secs(100 * 60))
            .targets([ip("172.18.0.3"), ip("172.18.0.4")]);

        assert_eq!(
            cmd.build_args(),
            vec![
                "--log-level=debug",
                "netem",
                "--duration=100m",
                "--target=172.18.0.3",
                "--target=172.18.0.4",
                "--tc-image=gaiadocker/iproute2",
                "loss",
                "--percent=100",
                "peer-1",
            ]
        );
    }

    #[test]
    fn delay_with_jitter_args() {
        let profile = FaultProfile::Delay {
            time: Duration::from_millis(200),
            jitter: Some(Duration::from_millis(50)),
        };
        assert_eq!(profile.to_args(), vec!["delay", "--time=200", "--jitter=50"]);
    }

    #[test]
    fn burst_loss_args() {
        let profile = FaultProfile::Loss {
            percent: 10.0,
            correlation: Some(25.0),
        };
        assert_eq!(profile.to_args(), vec!["loss", "--percent=10", "--correlation=25"]);
        assert_eq!(FaultProfile::loss(5.5).to_args(), vec!["loss", "--percent=5.5"]);
    }

    #[test]
    fn rate_duplicate_corrupt_args() {
        assert_eq!(FaultProfile::Rate { kbit: 56 }.to_args(), vec!["rate", "--rate=56kbit"]);
        assert_eq!(
            FaultProfile::Duplicate { percent: 1.0 }.to_args(),
            vec!["duplicate", "--percent=1"]
        );
        assert_eq!(
            FaultProfile::Corrupt { percent: 2.5 }.to_args(),
            vec!["corrupt", "--percent=2.5"]
        );
    }

    #[test]
    fn go_duration_formats() {
        assert_eq!(go_duration(Duration::from_secs(6000)), "100m");
        assert_eq!(go_duration(Duration::from_secs(7200)), "2h");
        assert_eq!(go_duration(Duration::from_secs(45)), "45s");
        assert_eq!(go_duration(Duration::from_millis(1500)), "1500ms");
        assert_eq!(go_duration(Duration::ZERO), "0s");
    }

    #[test]
    fn go_duration_keeps_sub_millisecond_precision() {
        assert_eq!(go_duration(Duration::from_micros(250)), "250us");
        assert_eq!(go_duration(Duration::from_micros(1_500)), "1500us");
        assert_eq!(go_duration(Duration::from_nanos(1_500)), "1500ns");
        assert_eq!(go_duration(Duration::from_nanos(1)), "1ns");
    }

    #[test]
    fn interface_and_no_tc_image() {
        let cmd = NetemCommand::new("peer-2", Duration::from_secs(30))
            .interface("eth1")
            .tc_image(None)
            .log_level("info")
            .profile(FaultProfile::delay(Duration::from_millis(300)));

        assert_eq!(
            cmd.build_command(),
            "pumba --log-level=info netem --duration=30s --interface=eth1 delay --time=300 peer-2"
        );
    }

    #[test]
    fn untargeted_command_has_no_target_flags() {
        let cmd = NetemCommand::new("peer-3", Duration::from_secs(60));
        assert!(cmd.build_args().iter().all(|a| !a.starts_with("--target=")));
    }
}
