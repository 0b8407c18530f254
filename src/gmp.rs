//! GMP client: one XML request per command, one framed XML response back.
use std::path::{Path, PathBuf};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use crate::error::GmpError;
use crate::types::{Resource, TaskProgress, TaskStatus};
use crate::xml::{esc, report_body, root_element, Element, ResponseFramer};

/// Any byte stream a GMP session can run over.
pub trait GmpStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> GmpStream for T {}

/// Where the management daemon listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    Unix(PathBuf),
    Tls {
        host: String,
        port: u16,
        accept_invalid_certs: bool,
    },
}

/// Open a session over the configured transport.
pub async fn connect(transport: &Transport) -> Result<GmpClient<Box<dyn GmpStream>>, GmpError> {
    let stream: Box<dyn GmpStream> = match transport {
        Transport::Unix(path) => connect_unix(path).await?,
        Transport::Tls {
            host,
            port,
            accept_invalid_certs,
        } => {
            let connector = native_tls::TlsConnector::builder()
                .danger_accept_invalid_certs(*accept_invalid_certs)
                .build()?;
            let connector = tokio_native_tls::TlsConnector::from(connector);
            let tcp = TcpStream::connect((host.as_str(), *port)).await?;
            Box::new(connector.connect(host, tcp).await?)
        }
    };
    debug!(?transport, "connected to management daemon");
    Ok(GmpClient::new(stream))
}

#[cfg(unix)]
async fn connect_unix(path: &Path) -> Result<Box<dyn GmpStream>, GmpError> {
    Ok(Box::new(tokio::net::UnixStream::connect(path).await?))
}

#[cfg(not(unix))]
async fn connect_unix(path: &Path) -> Result<Box<dyn GmpStream>, GmpError> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        format!("unix sockets are not available here: {}", path.display()),
    )
    .into())
}

/// Named resource families that can be listed and filtered by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    PortList,
    ScanConfig,
    Target,
}

impl ResourceKind {
    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::PortList => "port list",
            ResourceKind::ScanConfig => "scan config",
            ResourceKind::Target => "target",
        }
    }

    fn command(self) -> &'static str {
        match self {
            ResourceKind::PortList => "get_port_lists",
            ResourceKind::ScanConfig => "get_configs",
            ResourceKind::Target => "get_targets",
        }
    }

    fn element(self) -> &'static str {
        match self {
            ResourceKind::PortList => "port_list",
            ResourceKind::ScanConfig => "config",
            ResourceKind::Target => "target",
        }
    }
}

/// Filter string matching a resource by exact name.
pub fn name_filter(name: &str) -> String {
    format!("name=\"{name}\"")
}

#[derive(Debug, Clone)]
pub struct NewTarget<'a> {
    pub name: &'a str,
    pub hosts: &'a str,
    pub port_list_id: &'a str,
    pub alive_test: &'a str,
}

#[derive(Debug, Clone)]
pub struct NewTask<'a> {
    pub name: &'a str,
    pub config_id: &'a str,
    pub target_id: &'a str,
    pub scanner_id: Option<&'a str>,
}

pub fn list_request(kind: ResourceKind, filter: Option<&str>) -> String {
    let mut req = format!("<{}", kind.command());
    if kind == ResourceKind::ScanConfig {
        req.push_str(" usage_type=\"scan\"");
    }
    if let Some(f) = filter {
        req.push_str(&format!(" filter=\"{}\"", esc(f)));
    }
    req.push_str("/>");
    req
}

pub fn create_target_request(t: &NewTarget<'_>) -> String {
    format!(
        concat!(
            "<create_target><name>{}</name><hosts>{}</hosts>",
            "<port_list id=\"{}\"/><alive_tests>{}</alive_tests></create_target>"
        ),
        esc(t.name),
        esc(t.hosts),
        esc(t.port_list_id),
        esc(t.alive_test)
    )
}

pub fn create_task_request(t: &NewTask<'_>) -> String {
    let scanner = t
        .scanner_id
        .map(|id| format!("<scanner id=\"{}\"/>", esc(id)))
        .unwrap_or_default();
    format!(
        concat!(
            "<create_task><name>{}</name><usage_type>scan</usage_type>",
            "<config id=\"{}\"/><target id=\"{}\"/>{}</create_task>"
        ),
        esc(t.name),
        esc(t.config_id),
        esc(t.target_id),
        scanner
    )
}

/// An open GMP session. Dropping it closes the underlying stream.
pub struct GmpClient<S> {
    stream: S,
}

impl<S: GmpStream> GmpClient<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    /// Write one request and read back one complete response document.
    async fn send_raw(&mut self, command: &str, request: &str) -> Result<String, GmpError> {
        debug!(command, "sending GMP command");
        self.stream.write_all(request.as_bytes()).await?;
        self.stream.flush().await?;

        let mut framer = ResponseFramer::new();
        let mut buf = Vec::new();
        let mut chunk = vec![0u8; 16 * 1024];
        loop {
            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(GmpError::ConnectionClosed);
            }
            buf.extend_from_slice(&chunk[..n]);
            if framer.is_complete(&buf)? {
                break;
            }
        }
        trace!(command, bytes = buf.len(), "received GMP response");
        String::from_utf8(buf)
            .map_err(|e| GmpError::Malformed(format!("response is not UTF-8: {e}")))
    }

    async fn send(&mut self, command: &str, request: &str) -> Result<Element, GmpError> {
        let doc = self.send_raw(command, request).await?;
        let root = Element::parse(&doc)?;
        check_status(command, &root)?;
        Ok(root)
    }

    pub async fn get_version(&mut self) -> Result<String, GmpError> {
        let root = self.send("get_version", "<get_version/>").await?;
        root.child_text("version")
            .map(str::to_string)
            .ok_or_else(|| GmpError::Malformed("get_version response has no version".into()))
    }

    pub async fn authenticate(&mut self, username: &str, password: &str) -> Result<(), GmpError> {
        let req = format!(
            concat!(
                "<authenticate><credentials><username>{}</username>",
                "<password>{}</password></credentials></authenticate>"
            ),
            esc(username),
            esc(password)
        );
        self.send("authenticate", &req).await?;
        Ok(())
    }

    /// List resources of one kind, optionally narrowed by a GMP filter string.
    pub async fn list(
        &mut self,
        kind: ResourceKind,
        filter: Option<&str>,
    ) -> Result<Vec<Resource>, GmpError> {
        let root = self.send(kind.command(), &list_request(kind, filter)).await?;
        Ok(root
            .children_named(kind.element())
            .filter_map(|el| {
                let id = el.attr("id")?;
                Some(Resource {
                    id: id.to_string(),
                    name: el.child_text("name").unwrap_or_default().to_string(),
                })
            })
            .collect())
    }

    pub async fn create_target(&mut self, target: &NewTarget<'_>) -> Result<String, GmpError> {
        let root = self
            .send("create_target", &create_target_request(target))
            .await?;
        created_id("create_target", &root)
    }

    pub async fn create_task(&mut self, task: &NewTask<'_>) -> Result<String, GmpError> {
        let root = self.send("create_task", &create_task_request(task)).await?;
        created_id("create_task", &root)
    }

    /// Start a task and return the id of the report it produces.
    pub async fn start_task(&mut self, task_id: &str) -> Result<String, GmpError> {
        let req = format!("<start_task task_id=\"{}\"/>", esc(task_id));
        let root = self.send("start_task", &req).await?;
        root.child_text("report_id")
            .filter(|s| !s.is_empty())
            .or_else(|| root.child("report").and_then(|r| r.attr("id")))
            .map(str::to_string)
            .ok_or_else(|| GmpError::Malformed("start_task response has no report id".into()))
    }

    pub async fn get_task(&mut self, task_id: &str) -> Result<TaskProgress, GmpError> {
        let req = format!("<get_tasks task_id=\"{}\" details=\"1\"/>", esc(task_id));
        let root = self.send("get_tasks", &req).await?;
        let task = root
            .child("task")
            .ok_or_else(|| {
                GmpError::Malformed(format!("get_tasks response has no task {task_id}"))
            })?;
        let status = task
            .child_text("status")
            .ok_or_else(|| GmpError::Malformed("task has no status".into()))?;
        let progress = task
            .child_text("progress")
            .ok_or_else(|| GmpError::Malformed("task has no progress".into()))?;
        let progress = progress
            .parse::<i32>()
            .map_err(|e| GmpError::Malformed(format!("task progress {progress:?}: {e}")))?;
        Ok(TaskProgress {
            status: TaskStatus::parse(status),
            progress,
        })
    }

    /// Fetch a report rendered with the given report format.
    pub async fn get_report(
        &mut self,
        report_id: &str,
        format_id: &str,
    ) -> Result<String, GmpError> {
        let req = format!(
            concat!(
                "<get_reports report_id=\"{}\" format_id=\"{}\"",
                " details=\"1\" ignore_pagination=\"1\"/>"
            ),
            esc(report_id),
            esc(format_id)
        );
        let doc = self.send_raw("get_reports", &req).await?;
        check_status("get_reports", &root_element(&doc)?)?;
        report_body(&doc)
    }

    /// Close the session.
    pub async fn disconnect(mut self) -> Result<(), GmpError> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

fn check_status(command: &str, root: &Element) -> Result<(), GmpError> {
    let status = root
        .attr("status")
        .ok_or_else(|| GmpError::Malformed(format!("{command} response has no status")))?;
    if status.starts_with('2') {
        Ok(())
    } else {
        Err(GmpError::Response {
            command: command.to_string(),
            status: status.to_string(),
            text: root.attr("status_text").unwrap_or_default().to_string(),
        })
    }
}

fn created_id(command: &str, root: &Element) -> Result<String, GmpError> {
    root.attr("id")
        .map(str::to_string)
        .ok_or_else(|| GmpError::Malformed(format!("{command} response has no id")))
}
