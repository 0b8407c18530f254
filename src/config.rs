use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::gmp::Transport;
use crate::resolve::LookupMode;
use crate::workflow::ScanPlan;

/// XML report format shipped with every gvmd installation.
pub const XML_REPORT_FORMAT_ID: &str = "c1645568-627a-11e3-a660-406186ea4fc5";

/// gvm-scan-rs: run one vulnerability scan through a Greenbone management daemon and save
/// the report.
///
/// Every option can also be given through the environment variable shown in its help.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "gvm-scan-rs",
    version,
    about = "Run one vulnerability scan through a Greenbone management daemon and save the report.",
    long_about = None
)]
pub struct Settings {
    /// GMP user name.
    #[arg(long = "user", env = "GMP_USER")]
    pub user: String,

    /// GMP password.
    #[arg(long, env = "GMP_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Hosts to scan, in any form the daemon accepts (IPs, ranges, CIDRs, names).
    #[arg(long = "targets", env = "SCAN_TARGETS")]
    pub targets: String,

    /// Path of the daemon's Unix socket.
    #[arg(
        long = "socket-path",
        env = "GMP_SOCKET_PATH",
        default_value = "/run/gvmd/gvmd.sock"
    )]
    pub socket_path: PathBuf,

    /// Directory reports are written to.
    #[arg(long = "report-dir", env = "REPORT_DIR", default_value = "openvas_reports")]
    pub report_dir: PathBuf,

    /// Seconds between task status polls.
    #[arg(long = "poll-interval", env = "POLL_INTERVAL", default_value_t = 10)]
    pub poll_interval: u64,

    /// Task names are "<prefix> (<targets>)".
    #[arg(
        long = "task-name-prefix",
        env = "TASK_NAME_PREFIX",
        default_value = "GitHub Actions Scan"
    )]
    pub task_name_prefix: String,

    /// Target names are "<prefix>: <targets>".
    #[arg(long = "target-name-prefix", env = "TARGET_NAME_PREFIX", default_value = "GA Target")]
    pub target_name_prefix: String,

    /// Port list used when a target has to be created.
    #[arg(long = "port-list", env = "GMP_PORT_LIST", default_value = "OpenVAS Default")]
    pub port_list: String,

    /// Scan configuration the task runs with.
    #[arg(long = "scan-config", env = "GMP_SCAN_CONFIG", default_value = "Full and fast")]
    pub scan_config: String,

    /// Scanner for the task. The daemon's default scanner when omitted.
    #[arg(long = "scanner-id", env = "GMP_SCANNER_ID")]
    pub scanner_id: Option<String>,

    /// Alive test for newly created targets.
    #[arg(long = "alive-test", env = "GMP_ALIVE_TEST", default_value = "Consider Alive")]
    pub alive_test: String,

    /// Report format id used to fetch the report.
    #[arg(
        long = "report-format-id",
        env = "REPORT_FORMAT_ID",
        default_value = XML_REPORT_FORMAT_ID
    )]
    pub report_format_id: String,

    /// Require exact-name matches for the port list and scan config instead of falling back
    /// to the first available.
    #[arg(long = "strict-lookup", env = "GMP_STRICT_LOOKUP", default_value_t = false)]
    pub strict_lookup: bool,

    /// Give up after this many seconds of polling. Polls forever when omitted.
    #[arg(long = "max-wait", env = "SCAN_MAX_WAIT")]
    pub max_wait: Option<u64>,

    /// Connect over TLS to this host instead of the Unix socket.
    #[arg(long = "host", env = "GMP_HOST")]
    pub host: Option<String>,

    /// TLS port of the daemon.
    #[arg(long = "port", env = "GMP_PORT", default_value_t = 9390)]
    pub port: u16,

    /// Accept self-signed or otherwise invalid daemon certificates.
    #[arg(long = "tls-insecure", env = "GMP_TLS_INSECURE", default_value_t = false)]
    pub tls_insecure: bool,

    /// Write a JSON summary of the run to this path.
    #[arg(long)]
    pub summary: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Settings {
    pub fn transport(&self) -> Transport {
        match &self.host {
            Some(host) => Transport::Tls {
                host: host.clone(),
                port: self.port,
                accept_invalid_certs: self.tls_insecure,
            },
            None => Transport::Unix(self.socket_path.clone()),
        }
    }

    pub fn plan(&self) -> ScanPlan {
        ScanPlan {
            username: self.user.clone(),
            password: self.password.clone(),
            hosts: self.targets.clone(),
            target_name: format!("{}: {}", self.target_name_prefix, self.targets),
            task_name: format!("{} ({})", self.task_name_prefix, self.targets),
            port_list_name: self.port_list.clone(),
            scan_config_name: self.scan_config.clone(),
            scanner_id: self.scanner_id.clone(),
            alive_test: self.alive_test.clone(),
            report_format_id: self.report_format_id.clone(),
            report_dir: self.report_dir.clone(),
            poll_interval: Duration::from_secs(self.poll_interval),
            max_wait: self.max_wait.map(Duration::from_secs),
            lookup: if self.strict_lookup {
                LookupMode::Strict
            } else {
                LookupMode::Fallback
            },
        }
    }

    /// Default tracing filter for the verbosity count.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
