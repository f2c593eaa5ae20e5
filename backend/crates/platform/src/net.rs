//! TCP socket setup shared by the server and the client.
//!
//! Tokio exposes SO_KEEPALIVE as an on/off switch only; a zero keep-alive
//! duration disables it, any other value enables it with the OS probe
//! interval.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpSocket, TcpStream, lookup_host};

const LISTEN_BACKLOG: u32 = 1024;

fn socket_for(addr: &SocketAddr, keep_alive: Duration) -> io::Result<TcpSocket> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_keepalive(!keep_alive.is_zero())?;
    Ok(socket)
}

async fn resolve(addr: &str) -> io::Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = lookup_host(addr).await?.collect();
    if addrs.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("{addr} did not resolve to any address"),
        ));
    }
    Ok(addrs)
}

/// Bind a listener on the first address `addr` resolves to.
///
/// Accepted sockets inherit the listener's keep-alive setting.
pub async fn listen(addr: &str, keep_alive: Duration) -> io::Result<TcpListener> {
    let target = resolve(addr).await?[0];
    let socket = socket_for(&target, keep_alive)?;
    socket.set_reuseaddr(true)?;
    socket.bind(target)?;
    socket.listen(LISTEN_BACKLOG)
}

/// Connect to the first address of `addr` that accepts the connection.
pub async fn connect(addr: &str, keep_alive: Duration) -> io::Result<TcpStream> {
    let mut last_err = None;
    for target in resolve(addr).await? {
        let socket = socket_for(&target, keep_alive)?;
        match socket.connect(target).await {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::from(io::ErrorKind::AddrNotAvailable)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_listen_and_connect_loopback() {
        let listener = listen("127.0.0.1:0", Duration::from_secs(15)).await.unwrap();
        let target = listener.local_addr().unwrap().to_string();

        let (client, accepted) = tokio::join!(
            connect(&target, Duration::ZERO),
            listener.accept()
        );
        let client = client.unwrap();
        let (_server_side, peer) = accepted.unwrap();
        assert_eq!(client.local_addr().unwrap(), peer);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port nobody listens on.
        let listener = listen("127.0.0.1:0", Duration::ZERO).await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        assert!(connect(&addr.to_string(), Duration::ZERO).await.is_err());
    }

    #[tokio::test]
    async fn test_unresolvable_address() {
        assert!(listen("not an address", Duration::ZERO).await.is_err());
    }
}
