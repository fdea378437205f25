use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use rama::{
    error::{BoxError, ErrorContext as _},
    telemetry::tracing,
};
use tokio::net::UdpSocket;

use super::RecordSink;

/// Sends every record as a single datagram to a fixed remote address.
///
/// Fire and forget: there is no acknowledgement and failed sends are not retried.
#[derive(Debug)]
pub struct UdpSink {
    socket: UdpSocket,
    peer: SocketAddr,
    buf: Vec<u8>,
}

impl UdpSink {
    /// Resolve the given `host:port` and connect a fresh socket to it.
    pub async fn connect(addr: &str) -> Result<Self, BoxError> {
        let peer = tokio::net::lookup_host(addr)
            .await
            .context("resolve udp destination")
            .context_str_field("address", addr)?
            .next()
            .context("udp destination resolved to no address")
            .context_str_field("address", addr)?;

        let local: SocketAddr = if peer.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(local)
            .await
            .context("bind local udp socket")
            .context_debug_field("local", local)?;
        socket
            .connect(peer)
            .await
            .context("connect udp socket")
            .context_debug_field("peer", peer)?;

        tracing::debug!(%peer, "udp sink connected");
        Ok(Self {
            socket,
            peer,
            buf: Vec::with_capacity(1024),
        })
    }
}

impl RecordSink for UdpSink {
    async fn write_record(&mut self, record: &[u8]) -> Result<(), BoxError> {
        self.buf.clear();
        self.buf.extend_from_slice(record);
        self.buf.push(b'\n');

        let sent = self
            .socket
            .send(&self.buf)
            .await
            .context("send udp datagram")?;
        if sent != self.buf.len() {
            return Err(BoxError::from(format!(
                "udp datagram truncated: sent {sent} of {} bytes",
                self.buf.len()
            )));
        }
        Ok(())
    }

    async fn close(self) -> Result<(), BoxError> {
        tracing::debug!(peer = %self.peer, "udp sink closed");
        Ok(())
    }
}
