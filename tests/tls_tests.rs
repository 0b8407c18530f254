mod common;

use common::{count, RequestLog, StubDaemon, REPORT_ID};
use gvm_scan_rs::error::GmpError;
use gvm_scan_rs::gmp::{connect, Transport};
use gvm_scan_rs::workflow::run_scan;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

// Self-signed for localhost / 127.0.0.1.
const CERT: &[u8] = include_bytes!("fixtures/gvmd-cert.pem");
const KEY: &[u8] = include_bytes!("fixtures/gvmd-key.pem");

/// Serve one TLS connection with the stub daemon on a loopback port.
async fn tls_daemon() -> (u16, RequestLog, JoinHandle<()>) {
    let identity = native_tls::Identity::from_pkcs8(CERT, KEY).unwrap();
    let acceptor =
        tokio_native_tls::TlsAcceptor::from(native_tls::TlsAcceptor::new(identity).unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let log = RequestLog::default();

    let daemon_log = log.clone();
    let handle = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        if let Ok(stream) = acceptor.accept(tcp).await {
            common::serve(stream, StubDaemon::default(), daemon_log).await;
        }
    });
    (port, log, handle)
}

#[tokio::test]
async fn scan_runs_over_tls_with_self_signed_daemon() {
    let (port, log, daemon) = tls_daemon().await;
    let tmp = tempfile::tempdir().unwrap();

    let transport = Transport::Tls {
        host: "127.0.0.1".into(),
        port,
        accept_invalid_certs: true,
    };
    let mut client = connect(&transport).await.unwrap();
    let summary = run_scan(&mut client, &common::plan(tmp.path())).await.unwrap();
    client.disconnect().await.unwrap();
    daemon.await.unwrap();

    assert_eq!(summary.report_path, tmp.path().join(format!("{REPORT_ID}.xml")));
    assert_eq!(count(&log, "authenticate"), 1);
    assert_eq!(count(&log, "get_reports"), 1);
}

#[tokio::test]
async fn untrusted_certificate_is_rejected_by_default() {
    let (port, log, daemon) = tls_daemon().await;

    let transport = Transport::Tls {
        host: "127.0.0.1".into(),
        port,
        accept_invalid_certs: false,
    };
    let err = connect(&transport).await.err().unwrap();
    daemon.await.unwrap();

    assert!(matches!(err, GmpError::Tls(_)));
    assert_eq!(log.lock().unwrap().len(), 0);
}
