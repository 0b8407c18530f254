#![allow(dead_code)]
//! Scripted stand-in for the management daemon, recording every request it sees.
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gvm_scan_rs::gmp::GmpClient;
use gvm_scan_rs::resolve::LookupMode;
use gvm_scan_rs::workflow::ScanPlan;
use gvm_scan_rs::xml::{esc, Element, ResponseFramer};
use tokio::io::{duplex, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

pub const REPORT_ID: &str = "report-1";
pub const TASK_ID: &str = "task-1";
pub const NEW_TARGET_ID: &str = "target-new";

#[derive(Debug, Clone)]
pub struct StubDaemon {
    pub user: String,
    pub password: String,
    pub targets: Vec<(String, String)>,
    pub port_lists: Vec<(String, String)>,
    pub configs: Vec<(String, String)>,
    pub statuses: VecDeque<String>,
    pub report_inner: String,
    /// Answer filtered listings with every row, as a loose daemon-side match would.
    pub ignore_filter: bool,
}

impl Default for StubDaemon {
    fn default() -> Self {
        Self {
            user: "admin".into(),
            password: "secret".into(),
            targets: Vec::new(),
            port_lists: vec![pair("pl-default", "OpenVAS Default")],
            configs: vec![pair("cfg-full", "Full and fast")],
            statuses: ["Running", "Done"].iter().map(|s| s.to_string()).collect(),
            report_inner: "<report id=\"report-1\"><results/></report>".into(),
            ignore_filter: false,
        }
    }
}

pub fn pair(id: &str, name: &str) -> (String, String) {
    (id.to_string(), name.to_string())
}

pub type RequestLog = Arc<Mutex<Vec<Element>>>;

/// Number of recorded requests for `command`.
pub fn count(log: &RequestLog, command: &str) -> usize {
    log.lock().unwrap().iter().filter(|e| e.name == command).count()
}

pub fn first(log: &RequestLog, command: &str) -> Option<Element> {
    log.lock().unwrap().iter().find(|e| e.name == command).cloned()
}

/// Connect a client to a stub served over an in-memory duplex stream.
pub fn connect(stub: StubDaemon) -> (GmpClient<DuplexStream>, RequestLog, JoinHandle<()>) {
    let (client_end, daemon_end) = duplex(64 * 1024);
    let log = RequestLog::default();
    let handle = tokio::spawn(serve(daemon_end, stub, log.clone()));
    (GmpClient::new(client_end), log, handle)
}

pub fn plan(report_dir: &Path) -> ScanPlan {
    ScanPlan {
        username: "admin".into(),
        password: "secret".into(),
        hosts: "10.0.0.5".into(),
        target_name: "GA Target: 10.0.0.5".into(),
        task_name: "GitHub Actions Scan (10.0.0.5)".into(),
        port_list_name: "OpenVAS Default".into(),
        scan_config_name: "Full and fast".into(),
        scanner_id: None,
        alive_test: "Consider Alive".into(),
        report_format_id: "c1645568-627a-11e3-a660-406186ea4fc5".into(),
        report_dir: report_dir.to_path_buf(),
        poll_interval: Duration::from_millis(1),
        max_wait: None,
        lookup: LookupMode::Fallback,
    }
}

pub async fn serve<S>(mut stream: S, mut stub: StubDaemon, log: RequestLog)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut chunk = vec![0u8; 4096];
    loop {
        let mut framer = ResponseFramer::new();
        let mut buf = Vec::new();
        loop {
            let n = match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            buf.extend_from_slice(&chunk[..n]);
            if framer.is_complete(&buf).unwrap() {
                break;
            }
        }
        let request = Element::parse(std::str::from_utf8(&buf).unwrap()).unwrap();
        let response = stub.respond(&request);
        log.lock().unwrap().push(request);
        if stream.write_all(response.as_bytes()).await.is_err() {
            return;
        }
    }
}

impl StubDaemon {
    fn respond(&mut self, req: &Element) -> String {
        match req.name.as_str() {
            "get_version" => {
                r#"<get_version_response status="200" status_text="OK"><version>22.4</version></get_version_response>"#.into()
            }
            "authenticate" => {
                let creds = req.child("credentials");
                let user = creds.and_then(|c| c.child_text("username"));
                let password = creds.and_then(|c| c.child_text("password"));
                if user == Some(self.user.as_str()) && password == Some(self.password.as_str()) {
                    r#"<authenticate_response status="200" status_text="OK"><role>Admin</role></authenticate_response>"#.into()
                } else {
                    r#"<authenticate_response status="400" status_text="Authentication failed"/>"#.into()
                }
            }
            "get_port_lists" => self.listing(req, "port_list", &self.port_lists),
            "get_configs" => self.listing(req, "config", &self.configs),
            "get_targets" => self.listing(req, "target", &self.targets),
            "create_target" => format!(
                r#"<create_target_response status="201" status_text="OK, resource created" id="{NEW_TARGET_ID}"/>"#
            ),
            "create_task" => format!(
                r#"<create_task_response status="201" status_text="OK, resource created" id="{TASK_ID}"/>"#
            ),
            "start_task" => format!(
                r#"<start_task_response status="202" status_text="OK, request submitted"><report_id>{REPORT_ID}</report_id></start_task_response>"#
            ),
            "get_tasks" => {
                let status = if self.statuses.len() > 1 {
                    self.statuses.pop_front().unwrap_or_default()
                } else {
                    self.statuses.front().cloned().unwrap_or_default()
                };
                let progress = if status == "Done" { 100 } else { 50 };
                format!(
                    r#"<get_tasks_response status="200" status_text="OK"><task id="{TASK_ID}"><name>scan</name><status>{status}</status><progress>{progress}</progress></task></get_tasks_response>"#
                )
            }
            "get_reports" => format!(
                r#"<get_reports_response status="200" status_text="OK"><report id="{REPORT_ID}" format_id="c1645568-627a-11e3-a660-406186ea4fc5" extension="xml" content_type="text/xml">{}</report><filters id=""/></get_reports_response>"#,
                self.report_inner
            ),
            other => format!(r#"<{other}_response status="400" status_text="Bogus command name"/>"#),
        }
    }

    /// Answer a listing request, honouring a `name="..."` filter unless `ignore_filter` is set.
    fn listing(&self, req: &Element, element: &str, rows: &[(String, String)]) -> String {
        let wanted = req
            .attr("filter")
            .filter(|_| !self.ignore_filter)
            .and_then(|f| f.strip_prefix("name=\""))
            .and_then(|f| f.strip_suffix('"'));
        let body: String = rows
            .iter()
            .filter(|(_, name)| wanted.map_or(true, |w| w == name.as_str()))
            .map(|(id, name)| {
                format!(r#"<{element} id="{id}"><name>{}</name></{element}>"#, esc(name))
            })
            .collect();
        format!(
            r#"<{cmd}_response status="200" status_text="OK">{body}</{cmd}_response>"#,
            cmd = req.name
        )
    }
}
