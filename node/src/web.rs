use std::{net::Ipv4Addr, sync::Arc, time::Duration};

use drybox_common::{
    page::{render_page, RESPONSE_HEAD},
    Fault, SharedReadingState,
};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    time::{sleep, timeout},
};
use tracing::{error, info, warn};

use crate::faults::log_fault;

const TASK: &str = "web";
const MAX_REQUEST_BYTES: u64 = 8 * 1024;
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

// Serves the status page on every interface. A bind failure parks the task
// so the other tasks keep running.
pub async fn run_web_server(
    port: u16,
    state: Arc<SharedReadingState>,
    request_timeout: Duration,
) {
    let listener = match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("failed to bind web server on port {port}: {err}");
            return std::future::pending().await;
        }
    };

    info!("web server listening on port {port}");
    serve(listener, state, request_timeout).await
}

pub async fn serve(
    listener: TcpListener,
    state: Arc<SharedReadingState>,
    request_timeout: Duration,
) {
    loop {
        let (stream, _peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!("web accept failed: {err}");
                sleep(ACCEPT_RETRY_DELAY).await;
                continue;
            }
        };

        let state = state.clone();
        tokio::spawn(async move {
            if let Err(fault) = handle_connection(stream, &state, request_timeout).await {
                log_fault(TASK, &fault);
            }
        });
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    state: &SharedReadingState,
    request_timeout: Duration,
) -> Result<(), Fault> {
    let (reader, mut writer) = stream.split();
    let mut reader = BufReader::new(reader.take(MAX_REQUEST_BYTES));

    timeout(request_timeout, skip_request_head(&mut reader))
        .await
        .map_err(|_| Fault::request("timed out waiting for request headers"))??;

    let page = render_page(&state.snapshot());
    writer
        .write_all(RESPONSE_HEAD.as_bytes())
        .await
        .map_err(Fault::request)?;
    writer.write_all(page.as_bytes()).await.map_err(Fault::request)?;
    writer.flush().await.map_err(Fault::request)?;
    writer.shutdown().await.map_err(Fault::request)
}

async fn skip_request_head<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<(), Fault> {
    let mut line = Vec::new();

    // request line
    next_line(reader, &mut line).await?;

    loop {
        next_line(reader, &mut line).await?;
        if line == b"\r\n" || line == b"\n" {
            return Ok(());
        }
    }
}

async fn next_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    line: &mut Vec<u8>,
) -> Result<(), Fault> {
    line.clear();
    reader.read_until(b'\n', line).await.map_err(Fault::request)?;

    if line.last() != Some(&b'\n') {
        return Err(Fault::request("connection ended before end of headers"));
    }
    Ok(())
}
