//! SOCKS5 client handshake
//!
//! Method negotiation, optional RFC 1929 username/password
//! sub-negotiation, then a CONNECT request.

use super::consts::*;
use super::TargetAddr;
use crate::config::ProxyCredentials;
use crate::error::{ProxyError, Result, Socks5ReplyCode};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Offer methods and return the one the server picked
async fn negotiate_method<S>(stream: &mut S, with_password: bool) -> Result<u8, ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let greeting: &[u8] = if with_password {
        &[
            SOCKS5_VERSION,
            2,
            SOCKS5_AUTH_METHOD_NONE,
            SOCKS5_AUTH_METHOD_PASSWORD,
        ]
    } else {
        &[SOCKS5_VERSION, 1, SOCKS5_AUTH_METHOD_NONE]
    };
    stream.write_all(greeting).await?;
    stream.flush().await?;

    let mut reply = [0u8; 2];
    stream.read_exact(&mut reply).await?;
    if reply[0] != SOCKS5_VERSION {
        return Err(ProxyError::UnexpectedVersion(reply[0]));
    }

    match reply[1] {
        SOCKS5_AUTH_METHOD_NONE => Ok(SOCKS5_AUTH_METHOD_NONE),
        SOCKS5_AUTH_METHOD_PASSWORD if with_password => Ok(SOCKS5_AUTH_METHOD_PASSWORD),
        SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE => Err(ProxyError::NoAcceptableMethod),
        other => Err(ProxyError::UnsupportedMethod(other)),
    }
}

/// RFC 1929 username/password sub-negotiation
///
/// ```text
/// +----+------+----------+------+----------+
/// |VER | ULEN |  UNAME   | PLEN |  PASSWD  |
/// +----+------+----------+------+----------+
/// | 1  |  1   | 1 to 255 |  1   | 1 to 255 |
/// +----+------+----------+------+----------+
/// ```
async fn authenticate<S>(stream: &mut S, credentials: &ProxyCredentials) -> Result<(), ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let username = credentials.username.as_bytes();
    let password = credentials.password.as_bytes();
    if username.len() > MAX_CREDENTIAL_LEN || password.len() > MAX_CREDENTIAL_LEN {
        return Err(ProxyError::CredentialsTooLong);
    }

    let mut request = Vec::with_capacity(3 + username.len() + password.len());
    request.push(SOCKS5_AUTH_VERSION);
    request.push(username.len() as u8);
    request.extend_from_slice(username);
    request.push(password.len() as u8);
    request.extend_from_slice(password);
    stream.write_all(&request).await?;
    stream.flush().await?;

    let mut reply = [0u8; 2];
    stream.read_exact(&mut reply).await?;
    if reply[0] != SOCKS5_AUTH_VERSION {
        return Err(ProxyError::UnexpectedVersion(reply[0]));
    }
    if reply[1] != SOCKS5_AUTH_SUCCESS {
        return Err(ProxyError::AuthFailed);
    }
    Ok(())
}

/// Read and discard the bound address of a connect reply
async fn skip_bound_address<S>(stream: &mut S, addr_type: u8) -> Result<(), ProxyError>
where
    S: AsyncRead + Unpin,
{
    let len = match addr_type {
        SOCKS5_ADDR_TYPE_IPV4 => 4,
        SOCKS5_ADDR_TYPE_IPV6 => 16,
        SOCKS5_ADDR_TYPE_DOMAIN => {
            let mut len = [0u8; 1];
            stream.read_exact(&mut len).await?;
            len[0] as usize
        }
        other => return Err(ProxyError::AddressTypeNotSupported(other)),
    };
    // address + port
    let mut rest = vec![0u8; len + 2];
    stream.read_exact(&mut rest).await?;
    Ok(())
}

/// Perform a SOCKS5 CONNECT to `target`
///
/// Credentials are offered only when present; the no-auth path never
/// sends a sub-negotiation frame.
pub async fn socks5_connect<S>(
    stream: &mut S,
    target: &TargetAddr,
    credentials: Option<&ProxyCredentials>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let method = negotiate_method(stream, credentials.is_some()).await?;
    if method == SOCKS5_AUTH_METHOD_PASSWORD {
        if let Some(credentials) = credentials {
            authenticate(stream, credentials).await?;
        }
    }

    let mut request = vec![SOCKS5_VERSION, SOCKS5_CMD_TCP_CONNECT, SOCKS5_RESERVED];
    request.extend_from_slice(&target.to_socks5_bytes()?);
    stream.write_all(&request).await.map_err(ProxyError::Io)?;
    stream.flush().await.map_err(ProxyError::Io)?;

    // VER REP RSV ATYP
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await.map_err(ProxyError::Io)?;
    if header[0] != SOCKS5_VERSION {
        return Err(ProxyError::UnexpectedVersion(header[0]).into());
    }
    let code = Socks5ReplyCode::try_from(header[1])?;
    if code != Socks5ReplyCode::Succeeded {
        return Err(ProxyError::Socks5Reply(code).into());
    }
    skip_bound_address(stream, header[3]).await?;

    tracing::debug!("SOCKS5 tunnel to {} established", target);
    Ok(())
}
