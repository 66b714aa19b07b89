//! HTTP CONNECT tunnel

use super::consts::MAX_HTTP_LINE_LEN;
use super::TargetAddr;
use crate::config::ProxyCredentials;
use crate::error::{ProxyError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

fn build_request(target: &TargetAddr, credentials: Option<&ProxyCredentials>) -> String {
    let mut request = format!("CONNECT {} HTTP/1.0\r\n", target.authority());
    if let Some(credentials) = credentials {
        let token = STANDARD.encode(format!("{}:{}", credentials.username, credentials.password));
        request.push_str(&format!("Proxy-Authorization: Basic {}\r\n", token));
    }
    request.push_str("\r\n");
    request
}

/// Read one CRLF (or LF) terminated line, byte by byte so nothing past
/// the header block is consumed
async fn read_line<S>(stream: &mut S) -> Result<String, ProxyError>
where
    S: AsyncRead + Unpin,
{
    let mut line = Vec::new();
    loop {
        let byte = stream.read_u8().await?;
        if byte == b'\n' {
            break;
        }
        line.push(byte);
        if line.len() > MAX_HTTP_LINE_LEN {
            return Err(ProxyError::Malformed("header line too long".to_string()));
        }
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Ok(String::from_utf8_lossy(&line).into_owned())
}

fn status_is_success(status_line: &str) -> Result<bool, ProxyError> {
    let mut parts = status_line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(version), Some(code)) if version.starts_with("HTTP/") => code
            .parse::<u16>()
            .map(|code| (200..300).contains(&code))
            .map_err(|_| ProxyError::Malformed(status_line.to_string())),
        _ => Err(ProxyError::Malformed(status_line.to_string())),
    }
}

/// Open a tunnel with `CONNECT host:port HTTP/1.0`
///
/// Header lines are read up to the blank line; any non-2xx status fails.
pub async fn http_connect<S>(
    stream: &mut S,
    target: &TargetAddr,
    credentials: Option<&ProxyCredentials>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = build_request(target, credentials);
    stream
        .write_all(request.as_bytes())
        .await
        .map_err(ProxyError::Io)?;
    stream.flush().await.map_err(ProxyError::Io)?;

    let status_line = read_line(stream).await?;
    let ok = status_is_success(&status_line)?;

    loop {
        let line = read_line(stream).await?;
        if line.is_empty() {
            break;
        }
        tracing::trace!("proxy header: {}", line);
    }

    if !ok {
        return Err(ProxyError::HttpStatus(status_line).into());
    }
    tracing::debug!("HTTP CONNECT tunnel to {} established", target);
    Ok(())
}
