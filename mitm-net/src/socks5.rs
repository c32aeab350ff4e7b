//! SOCKS5 client and inbound server-side handshake (§4.F), RFC 1928,
//! no-auth only.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::error::NetError;

const VERSION: u8 = 0x05;
const NO_AUTH: u8 = 0x00;
const CMD_CONNECT: u8 = 0x01;
const ATYP_V4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_V6: u8 = 0x04;

/// The canonical RFC 1928 "general SOCKS server failure" reply, used when an
/// inbound greeting or request is malformed and we bail before a real status
/// is known.
const GENERIC_FAILURE_REPLY: [u8; 10] = [VERSION, 0x01, 0x00, ATYP_V4, 0, 0, 0, 0, 0, 0];

fn success_reply() -> [u8; 10] {
    [VERSION, 0x00, 0x00, ATYP_V4, 0, 0, 0, 0, 0, 0]
}

fn address_bytes(host: &str) -> Result<Vec<u8>, NetError> {
    if let Ok(v4) = Ipv4Addr::from_str(host) {
        let mut out = vec![ATYP_V4];
        out.extend_from_slice(&v4.octets());
        return Ok(out);
    }
    if let Ok(v6) = Ipv6Addr::from_str(host) {
        let mut out = vec![ATYP_V6];
        out.extend_from_slice(&v6.octets());
        return Ok(out);
    }
    let len = u8::try_from(host.len())
        .map_err(|_| NetError::RequestFailed("domain name too long for SOCKS5"))?;
    let mut out = vec![ATYP_DOMAIN, len];
    out.extend_from_slice(host.as_bytes());
    Ok(out)
}

/// Dial `target_host:target_port` through the SOCKS5 proxy at `proxy_addr`
/// (§4.F outbound client).
///
/// # Errors
/// Returns [`NetError`] on a transport failure, an unsupported or rejected
/// auth method, or a non-success `REP` status from the proxy.
pub async fn connect(
    proxy_addr: impl ToSocketAddrs,
    target_host: &str,
    target_port: u16,
) -> Result<TcpStream, NetError> {
    let mut stream = TcpStream::connect(proxy_addr).await?;

    stream.write_all(&[VERSION, 0x01, NO_AUTH]).await?;
    let mut method_reply = [0u8; 2];
    stream.read_exact(&mut method_reply).await?;
    if method_reply[0] != VERSION {
        return Err(NetError::VersionMismatch(method_reply[0]));
    }
    match method_reply[1] {
        0xFF => return Err(NetError::NoAcceptableAuthMethod),
        NO_AUTH => {}
        other => return Err(NetError::UnsupportedAuthMethod(other)),
    }

    let mut request = vec![VERSION, CMD_CONNECT, 0x00];
    request.extend(address_bytes(target_host)?);
    request.extend_from_slice(&target_port.to_be_bytes());
    stream.write_all(&request).await?;

    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await?;
    if header[0] != VERSION {
        return Err(NetError::VersionMismatch(header[0]));
    }
    let status = header[1];
    match header[3] {
        ATYP_V4 => {
            let mut rest = [0u8; 4 + 2];
            stream.read_exact(&mut rest).await?;
        }
        ATYP_DOMAIN => {
            let len = stream.read_u8().await? as usize;
            let mut rest = vec![0u8; len + 2];
            stream.read_exact(&mut rest).await?;
        }
        ATYP_V6 => {
            let mut rest = [0u8; 16 + 2];
            stream.read_exact(&mut rest).await?;
        }
        other => return Err(NetError::UnsupportedAddressType(other)),
    }

    NetError::from_reply_status(status)?;
    Ok(stream)
}

/// Perform the inbound SOCKS5 greeting and `CONNECT` request on an accepted
/// client connection, returning the address the client asked to reach
/// (§4.F inbound server greeting).
///
/// # Errors
/// Returns [`NetError`] if the greeting or request is malformed, or if the
/// client requested IPv6 (treated as not-implemented on this path, rather
/// than truncated to 4 bytes as the source does).
pub async fn server_handshake<S: AsyncRead + AsyncWrite + Unpin>(
    client: &mut S,
) -> Result<(String, u16), NetError> {
    let mut greeting = [0u8; 3];
    client.read_exact(&mut greeting).await?;
    if greeting != [VERSION, 0x01, NO_AUTH] {
        client.write_all(&[VERSION, 0xFF]).await?;
        return Err(NetError::NoAcceptableAuthMethod);
    }
    client.write_all(&[VERSION, NO_AUTH]).await?;

    let mut request = [0u8; 3];
    client.read_exact(&mut request).await?;
    if request != [VERSION, CMD_CONNECT, 0x00] {
        client.write_all(&GENERIC_FAILURE_REPLY).await?;
        return Err(NetError::RequestFailed("general SOCKS server failure"));
    }

    let atyp = client.read_u8().await?;
    let host = match atyp {
        ATYP_V4 => {
            let mut octets = [0u8; 4];
            client.read_exact(&mut octets).await?;
            Ipv4Addr::from(octets).to_string()
        }
        ATYP_DOMAIN => {
            let len = client.read_u8().await? as usize;
            let mut bytes = vec![0u8; len];
            client.read_exact(&mut bytes).await?;
            String::from_utf8(bytes)
                .map_err(|_| NetError::RequestFailed("domain name was not valid UTF-8"))?
        }
        ATYP_V6 => {
            client.write_all(&GENERIC_FAILURE_REPLY).await?;
            return Err(NetError::UnsupportedAddressType(ATYP_V6));
        }
        other => {
            client.write_all(&GENERIC_FAILURE_REPLY).await?;
            return Err(NetError::UnsupportedAddressType(other));
        }
    };

    client.write_all(&success_reply()).await?;
    let mut port_bytes = [0u8; 2];
    client.read_exact(&mut port_bytes).await?;
    let port = u16::from_be_bytes(port_bytes);

    Ok((host, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_v4_then_v6_then_domain() {
        assert_eq!(address_bytes("127.0.0.1").unwrap(), vec![ATYP_V4, 127, 0, 0, 1]);
        assert_eq!(
            address_bytes("::1").unwrap(),
            [vec![ATYP_V6], Ipv6Addr::LOCALHOST.octets().to_vec()].concat()
        );
        assert_eq!(
            address_bytes("example.com").unwrap(),
            [vec![ATYP_DOMAIN, 11], b"example.com".to_vec()].concat()
        );
    }

    #[test]
    fn domain_boundary_lengths() {
        let short = "a".repeat(0);
        assert_eq!(address_bytes(&short).unwrap(), vec![ATYP_DOMAIN, 0]);
        let max = "a".repeat(255);
        let encoded = address_bytes(&max).unwrap();
        assert_eq!(encoded[0], ATYP_DOMAIN);
        assert_eq!(encoded[1], 255);
        let too_long = "a".repeat(256);
        assert!(address_bytes(&too_long).is_err());
    }

    #[tokio::test]
    async fn server_handshake_parses_domain_connect() {
        let (mut client_end, mut server_end) = tokio::io::duplex(256);
        let server_task = tokio::spawn(async move { server_handshake(&mut server_end).await });

        client_end.write_all(&[VERSION, 0x01, NO_AUTH]).await.unwrap();
        let mut method_reply = [0u8; 2];
        client_end.read_exact(&mut method_reply).await.unwrap();
        assert_eq!(method_reply, [VERSION, NO_AUTH]);

        let mut request = vec![VERSION, CMD_CONNECT, 0x00, ATYP_DOMAIN, 11];
        request.extend_from_slice(b"example.com");
        request.extend_from_slice(&80u16.to_be_bytes());
        client_end.write_all(&request).await.unwrap();

        let mut reply = [0u8; 10];
        client_end.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, success_reply());

        let (host, port) = server_task.await.unwrap().unwrap();
        assert_eq!(host, "example.com");
        assert_eq!(port, 80);
    }

    #[tokio::test]
    async fn server_handshake_rejects_bad_greeting() {
        let (mut client_end, mut server_end) = tokio::io::duplex(256);
        let server_task = tokio::spawn(async move { server_handshake(&mut server_end).await });

        client_end.write_all(&[0x04, 0x01, NO_AUTH]).await.unwrap();
        let mut reply = [0u8; 2];
        client_end.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, [VERSION, 0xFF]);

        assert!(server_task.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn server_handshake_rejects_ipv6() {
        let (mut client_end, mut server_end) = tokio::io::duplex(256);
        let server_task = tokio::spawn(async move { server_handshake(&mut server_end).await });

        client_end.write_all(&[VERSION, 0x01, NO_AUTH]).await.unwrap();
        let mut method_reply = [0u8; 2];
        client_end.read_exact(&mut method_reply).await.unwrap();

        client_end
            .write_all(&[VERSION, CMD_CONNECT, 0x00, ATYP_V6])
            .await
            .unwrap();
        client_end.write_all(&[0u8; 16]).await.unwrap();
        client_end.write_all(&80u16.to_be_bytes()).await.unwrap();

        let mut reply = [0u8; 10];
        client_end.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, GENERIC_FAILURE_REPLY);

        assert!(matches!(
            server_task.await.unwrap(),
            Err(NetError::UnsupportedAddressType(ATYP_V6))
        ));
    }
}
