//! DataLink ring-server client.
//!
//! The client keeps only the list of streams the server offers. Each fetch
//! opens its own [`DataLinkConnection`], positions it just before the
//! requested window, streams packets until the window is covered, and drops
//! the connection.

mod protocol;
mod streams;

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

pub use protocol::{MAX_PAYLOAD, Packet, Reply, write_frame};
pub use streams::{parse_stream_list, stream_key};

use crate::client::Client;
use crate::config::DataLinkConfig;
use crate::request::Request;
use crate::unpack::unpack;
use crate::waveform::Waveform;
use crate::{Result, WaveError};

const CLIENT_TYPE: &str = "DataLink";

/// What the next read on a streaming connection produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Collected {
    Packet(Packet),
    /// The server sent ENDSTREAM or closed the connection.
    Ended,
    /// No packet arrived within the connection timeout.
    NoPacket,
}

/// An open DataLink session. Closed on drop.
#[derive(Debug)]
pub struct DataLinkConnection {
    stream: TcpStream,
    timeout: Duration,
    server_id: String,
}

impl DataLinkConnection {
    /// Connect and exchange identification.
    pub fn connect(address: &str, client_name: &str, timeout: Duration) -> Result<Self> {
        let mut last_error = None;
        let mut connected = None;
        for addr in address.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    connected = Some(stream);
                    break;
                }
                Err(e) => last_error = Some(e),
            }
        }
        let stream = match (connected, last_error) {
            (Some(stream), _) => stream,
            (None, Some(e)) => return Err(e.into()),
            (None, None) => {
                return Err(WaveError::InvalidArgument(format!(
                    "{address} does not resolve"
                )));
            }
        };
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;

        let mut connection = Self {
            stream,
            timeout,
            server_id: String::new(),
        };
        match connection.command(&format!("ID {client_name}"), &[])? {
            Reply::Id(id) => connection.server_id = id,
            other => {
                return Err(WaveError::Protocol(format!(
                    "expected server ID, got {other:?}"
                )));
            }
        }
        log::debug!("connected to {address}: {}", connection.server_id);
        Ok(connection)
    }

    /// The server's identification header.
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    fn send(&mut self, header: &str, payload: &[u8]) -> Result<()> {
        write_frame(&mut self.stream, header, payload)
    }

    fn command(&mut self, header: &str, payload: &[u8]) -> Result<Reply> {
        self.send(header, payload)?;
        Reply::read_from(&mut self.stream)
    }

    fn expect_ok(&mut self, header: &str, payload: &[u8]) -> Result<i64> {
        match self.command(header, payload)? {
            Reply::Ok { value, .. } => Ok(value),
            Reply::Error { message, .. } => Err(WaveError::Protocol(format!(
                "{header} rejected: {message}"
            ))),
            other => Err(WaveError::Protocol(format!(
                "unexpected reply to {header}: {other:?}"
            ))),
        }
    }

    /// `INFO <kind>`; returns the XML document.
    pub fn info(&mut self, kind: &str) -> Result<Vec<u8>> {
        let header = format!("INFO {kind}");
        match self.command(&header, &[])? {
            Reply::Info { payload, .. } => Ok(payload),
            Reply::Error { message, .. } => Err(WaveError::Protocol(format!(
                "{header} rejected: {message}"
            ))),
            other => Err(WaveError::Protocol(format!(
                "unexpected reply to {header}: {other:?}"
            ))),
        }
    }

    /// Restrict streaming to stream IDs matching `pattern`.
    pub fn set_match(&mut self, pattern: &str) -> Result<()> {
        self.expect_ok(&format!("MATCH {}", pattern.len()), pattern.as_bytes())?;
        Ok(())
    }

    /// Position the read cursor at the first packet with data after `time`
    /// (microseconds since the epoch). Returns the packet ID.
    pub fn position_after(&mut self, time: i64) -> Result<i64> {
        self.expect_ok(&format!("POSITION AFTER {time}"), &[])
    }

    /// Switch to streaming; packets follow without further commands.
    pub fn start_stream(&mut self) -> Result<()> {
        self.send("STREAM", &[])
    }

    /// Read the next streamed packet, waiting at most the connection
    /// timeout. Keepalives do not extend the wait.
    pub fn collect(&mut self) -> Result<Collected> {
        let deadline = Instant::now() + self.timeout;
        let collected = self.collect_until(deadline);
        self.stream.set_read_timeout(Some(self.timeout))?;
        collected
    }

    fn collect_until(&mut self, deadline: Instant) -> Result<Collected> {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(Collected::NoPacket);
            }
            self.stream.set_read_timeout(Some(remaining))?;
            let reply = match Reply::read_from(&mut self.stream) {
                Ok(reply) => reply,
                Err(WaveError::Io(e)) => {
                    return match e.kind() {
                        ErrorKind::WouldBlock | ErrorKind::TimedOut => Ok(Collected::NoPacket),
                        ErrorKind::UnexpectedEof
                        | ErrorKind::ConnectionReset
                        | ErrorKind::ConnectionAborted => Ok(Collected::Ended),
                        _ => Err(WaveError::Io(e)),
                    };
                }
                Err(e) => return Err(e),
            };
            match reply {
                Reply::Packet(packet) => return Ok(Collected::Packet(packet)),
                Reply::EndStream => return Ok(Collected::Ended),
                // keepalive
                Reply::Id(_) => continue,
                Reply::Error { message, .. } => return Err(WaveError::Protocol(message)),
                other => {
                    return Err(WaveError::Protocol(format!(
                        "unexpected reply while streaming: {other:?}"
                    )));
                }
            }
        }
    }
}

/// Fetches miniSEED packets from a DataLink ring server.
///
/// ```no_run
/// use waveserver::{Client, DataLinkClient, Request};
///
/// let client = DataLinkClient::new("ringserver.example.org:16000", "waveserver").unwrap();
/// println!("{} streams", client.streams().len());
/// let request = Request::from_seconds("UU", "FORK", "HHZ", 1_700_000_000.0, 1_700_000_060.0)
///     .unwrap()
///     .with_location_code("01")
///     .unwrap();
/// let waveform = client.get_data(&request).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct DataLinkClient {
    address: String,
    client_name: String,
    timeout: Duration,
    lookback: i64,
    streams: BTreeSet<String>,
}

impl DataLinkClient {
    /// Connect to `address` (`host:port`) with default timeouts and load the
    /// stream list.
    pub fn new(address: &str, client_name: &str) -> Result<Self> {
        Self::from_config(&DataLinkConfig {
            address: address.to_string(),
            client_name: client_name.to_string(),
            ..DataLinkConfig::default()
        })
    }

    pub fn from_config(config: &DataLinkConfig) -> Result<Self> {
        if config.address.trim().is_empty() {
            return Err(WaveError::InvalidArgument("address is empty".into()));
        }
        if config.client_name.trim().is_empty() {
            return Err(WaveError::InvalidArgument("client name is empty".into()));
        }
        if config.timeout_secs == 0 {
            return Err(WaveError::InvalidArgument("timeout must be positive".into()));
        }
        let lookback = i64::try_from(config.lookback_secs)
            .ok()
            .and_then(|secs| secs.checked_mul(1_000_000))
            .ok_or_else(|| WaveError::InvalidArgument("lookback is too large".into()))?;

        let mut client = Self {
            address: config.address.trim().to_string(),
            client_name: config.client_name.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            lookback,
            streams: BTreeSet::new(),
        };
        client.refresh_streams()?;
        Ok(client)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Stream IDs offered by the server, as of the last refresh.
    pub fn streams(&self) -> &BTreeSet<String> {
        &self.streams
    }

    /// Re-read the server's stream list.
    ///
    /// Fails only when the server cannot be reached; an unusable listing
    /// leaves the set empty.
    pub fn refresh_streams(&mut self) -> Result<()> {
        let mut connection = self.connect()?;
        let listing = connection.info("STREAMS");
        drop(connection);

        self.streams = match listing.and_then(|document| parse_stream_list(&document)) {
            Ok(streams) => streams,
            Err(e) => {
                log::warn!("failed to create stream list for {}: {e}", self.address);
                BTreeSet::new()
            }
        };
        log::info!("found {} streams at {}", self.streams.len(), self.address);
        Ok(())
    }

    fn connect(&self) -> Result<DataLinkConnection> {
        log::debug!("connecting to DataLink server at {}", self.address);
        DataLinkConnection::connect(&self.address, &self.client_name, self.timeout)
    }

    /// Stream packets covering `[start, end]` into one buffer.
    fn collect_window(&self, key: &str, start: i64, end: i64) -> Result<Vec<u8>> {
        let mut connection = self.connect()?;
        log::debug!("querying data for {key}");
        connection.set_match(key)?;
        connection.position_after(start)?;
        connection.start_stream()?;

        let mut buffer = Vec::new();
        let mut kept = 0usize;
        loop {
            match connection.collect() {
                Ok(Collected::Packet(packet)) => {
                    log::debug!("packet {} received for {}", packet.packet_id, packet.stream_id);
                    if !packet.data.is_empty()
                        && packet.data_start <= end
                        && packet.data_end >= start
                    {
                        buffer.extend_from_slice(&packet.data);
                        kept += 1;
                    }
                    if packet.data_end >= end {
                        break;
                    }
                }
                Ok(Collected::Ended) => {
                    log::warn!("connection terminated for {key}");
                    break;
                }
                Ok(Collected::NoPacket) => {
                    log::debug!("no packet received for {key}");
                    break;
                }
                Err(e) => {
                    log::debug!("collect failed for {key}: {e}");
                    break;
                }
            }
        }
        log::debug!("read {kept} packets from DataLink");
        Ok(buffer)
    }
}

impl Client for DataLinkClient {
    fn get_data(&self, request: &Request) -> Result<Waveform> {
        let key = stream_key(request);
        if !self.streams.contains(&key) {
            log::warn!("stream {key} not in DataLink server {}", self.address);
            return Err(WaveError::UnknownStream(key));
        }

        let start = request.start_time().saturating_sub(self.lookback);
        let buffer = self.collect_window(&key, start, request.end_time())?;

        let mut waveform = unpack(&buffer)?;
        waveform.merge_segments();
        if waveform.is_empty() {
            waveform.backfill_identity(request);
        } else {
            log::info!("found data for {key}");
        }
        Ok(waveform)
    }

    fn client_type(&self) -> &str {
        CLIENT_TYPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mseed::{self, MseedRecord, NanoTime, Samples};
    use std::io::Read;
    use std::net::TcpListener;
    use std::sync::{Arc, Mutex};
    use std::thread;

    const T0: i64 = 1_704_067_200_000_000;
    const SECOND: i64 = 1_000_000;
    const KEY: &str = "UU_FORK_01_HHZ/MSEED";

    #[derive(Clone, Copy)]
    enum Finish {
        EndStream,
        Hold,
        /// Send an ID frame every 200 ms until the client hangs up.
        Keepalive,
    }

    struct FakeRing {
        address: String,
        commands: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
        handle: thread::JoinHandle<()>,
    }

    fn read_command(stream: &mut TcpStream) -> std::io::Result<(String, Vec<u8>)> {
        let mut lead = [0u8; 3];
        stream.read_exact(&mut lead)?;
        let mut header = vec![0u8; usize::from(lead[2])];
        stream.read_exact(&mut header)?;
        let header = String::from_utf8(header).unwrap();
        let mut payload = Vec::new();
        if let Some(size) = header.strip_prefix("MATCH ") {
            payload = vec![0u8; size.parse().unwrap()];
            stream.read_exact(&mut payload)?;
        }
        Ok((header, payload))
    }

    fn serve(
        mut stream: TcpStream,
        listing: &str,
        packets: &[Packet],
        finish: Finish,
        commands: &Mutex<Vec<(String, Vec<u8>)>>,
    ) -> Result<()> {
        while let Ok((header, payload)) = read_command(&mut stream) {
            commands.lock().unwrap().push((header.clone(), payload));
            if header.starts_with("ID ") {
                write_frame(&mut stream, "ID DataLink 2018.078 :: DLPROTO:1.0", &[])?;
            } else if header == "INFO STREAMS" {
                let header = format!("INFO STREAMS {}", listing.len());
                write_frame(&mut stream, &header, listing.as_bytes())?;
            } else if header.starts_with("MATCH ") {
                write_frame(&mut stream, "OK 1 0", &[])?;
            } else if header.starts_with("POSITION AFTER ") {
                write_frame(&mut stream, "OK 7 0", &[])?;
            } else if header == "STREAM" {
                for p in packets {
                    let header = format!(
                        "PACKET {} {} {} {} {} {}",
                        p.stream_id,
                        p.packet_id,
                        p.packet_time,
                        p.data_start,
                        p.data_end,
                        p.data.len()
                    );
                    write_frame(&mut stream, &header, &p.data)?;
                }
                match finish {
                    Finish::EndStream => write_frame(&mut stream, "ENDSTREAM", &[])?,
                    Finish::Hold => {}
                    Finish::Keepalive => loop {
                        thread::sleep(Duration::from_millis(200));
                        write_frame(&mut stream, "ID DataLink 2018.078", &[])?;
                    },
                }
            }
        }
        Ok(())
    }

    fn fake_ring(connections: usize, packets: Vec<Packet>, finish: Finish) -> FakeRing {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let commands = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&commands);
        let listing = format!(
            r#"<DataLink><StreamList><Stream Name="{KEY}"/><Stream Name="UU_CTU__EHZ/MSEED"/></StreamList></DataLink>"#
        );
        let handle = thread::spawn(move || {
            for _ in 0..connections {
                let (stream, _) = listener.accept().unwrap();
                // The client may hang up mid-stream.
                let _ = serve(stream, &listing, &packets, finish, &seen);
            }
        });
        FakeRing {
            address,
            commands,
            handle,
        }
    }

    fn config(address: &str, timeout_secs: u64) -> DataLinkConfig {
        DataLinkConfig {
            address: address.to_string(),
            client_name: "tester".into(),
            timeout_secs,
            ..DataLinkConfig::default()
        }
    }

    /// One second of 50 Hz data starting `second` seconds after T0.
    fn packet(id: u64, second: i64) -> Packet {
        let data = mseed::encode(
            &MseedRecord::new()
                .with_nslc("UU", "FORK", "01", "HHZ")
                .with_start_time(NanoTime {
                    year: 2024,
                    day: 1,
                    hour: 0,
                    minute: 0,
                    second: second as u8,
                    nanosecond: 0,
                })
                .with_sample_rate(50.0)
                .with_samples(Samples::Int(vec![second as i32; 50])),
        )
        .unwrap();
        let data_start = T0 + second * SECOND;
        Packet {
            stream_id: KEY.into(),
            packet_id: id,
            packet_time: data_start,
            data_start,
            data_end: data_start + 980_000,
            data,
        }
    }

    fn request(start: i64, end: i64) -> Request {
        Request::new("UU", "FORK", "HHZ", T0 + start * SECOND, T0 + end * SECOND)
            .unwrap()
            .with_location_code("01")
            .unwrap()
    }

    #[test]
    fn test_construction_lists_streams() {
        let ring = fake_ring(1, Vec::new(), Finish::EndStream);
        let client = DataLinkClient::from_config(&config(&ring.address, 5)).unwrap();
        ring.handle.join().unwrap();

        assert_eq!(client.client_type(), "DataLink");
        assert!(client.streams().contains(KEY));
        assert!(client.streams().contains("UU_CTU__EHZ/MSEED"));
        let commands = ring.commands.lock().unwrap();
        assert_eq!(commands[0].0, "ID tester");
        assert_eq!(commands[1].0, "INFO STREAMS");
    }

    #[test]
    fn test_unknown_stream() {
        let ring = fake_ring(1, Vec::new(), Finish::EndStream);
        let client = DataLinkClient::from_config(&config(&ring.address, 5)).unwrap();
        ring.handle.join().unwrap();

        let r = Request::new("UU", "FORK", "HHZ", T0, T0 + SECOND).unwrap();
        let err = client.get_data(&r).unwrap_err();
        assert!(matches!(&err, WaveError::UnknownStream(key) if key == "UU_FORK__HHZ/MSEED"));
        assert!(err.is_precondition());
    }

    #[test]
    fn test_fetch_window() {
        // Packet 1 ends before the lookback, packet 5 covers the end, and
        // packet 6 must never be read.
        let packets = vec![
            packet(1, 0),
            packet(2, 12),
            packet(3, 13),
            packet(4, 14),
            packet(5, 15),
            packet(6, 16),
        ];
        let ring = fake_ring(2, packets, Finish::Hold);
        let client = DataLinkClient::from_config(&config(&ring.address, 5)).unwrap();
        let waveform = client.get_data(&request(13, 15)).unwrap();
        ring.handle.join().unwrap();

        assert_eq!(waveform.network(), Some("UU"));
        assert_eq!(waveform.location_code(), Some("01"));
        assert_eq!(waveform.number_of_segments(), 1);
        assert_eq!(waveform.start_time(), Some(T0 + 12 * SECOND));
        assert_eq!(waveform.number_of_samples(), 4 * 50);

        let commands = ring.commands.lock().unwrap();
        let position = format!("POSITION AFTER {}", T0 + 3 * SECOND);
        let stream_commands: Vec<_> = commands[2..].iter().map(|(h, _)| h.as_str()).collect();
        assert_eq!(
            stream_commands,
            ["ID tester", "MATCH 20", position.as_str(), "STREAM"]
        );
        assert_eq!(commands[3].1, KEY.as_bytes());
    }

    #[test]
    fn test_fetch_stops_at_end_of_stream() {
        let ring = fake_ring(2, vec![packet(1, 12), packet(2, 14)], Finish::EndStream);
        let client = DataLinkClient::from_config(&config(&ring.address, 5)).unwrap();
        let waveform = client.get_data(&request(12, 20)).unwrap();
        ring.handle.join().unwrap();

        // 12..13 and 14..15 do not join.
        assert_eq!(waveform.number_of_segments(), 2);
    }

    #[test]
    fn test_fetch_stops_on_timeout() {
        let ring = fake_ring(2, Vec::new(), Finish::Hold);
        let client = DataLinkClient::from_config(&config(&ring.address, 1)).unwrap();
        let waveform = client.get_data(&request(0, 1)).unwrap();
        ring.handle.join().unwrap();

        assert!(waveform.is_empty());
        assert_eq!(waveform.station(), Some("FORK"));
    }

    #[test]
    fn test_keepalives_do_not_extend_the_timeout() {
        let ring = fake_ring(2, vec![packet(1, 12)], Finish::Keepalive);
        let client = DataLinkClient::from_config(&config(&ring.address, 1)).unwrap();
        let started = Instant::now();
        let waveform = client.get_data(&request(12, 20)).unwrap();
        assert!(started.elapsed() < Duration::from_secs(3));
        ring.handle.join().unwrap();

        assert_eq!(waveform.number_of_samples(), 50);
    }

    #[test]
    fn test_connection_handshake() {
        let ring = fake_ring(1, Vec::new(), Finish::EndStream);
        let mut connection =
            DataLinkConnection::connect(&ring.address, "tester", Duration::from_secs(5)).unwrap();
        assert_eq!(connection.server_id(), "ID DataLink 2018.078 :: DLPROTO:1.0");
        assert_eq!(connection.position_after(T0).unwrap(), 7);
        drop(connection);
        ring.handle.join().unwrap();
    }

    #[test]
    fn test_invalid_config() {
        assert!(DataLinkClient::new("", "tester").unwrap_err().is_precondition());
        assert!(DataLinkClient::new("127.0.0.1:1", " ").unwrap_err().is_precondition());
        assert!(
            DataLinkClient::from_config(&config("127.0.0.1:1", 0))
                .unwrap_err()
                .is_precondition()
        );
    }

    #[test]
    fn test_unreachable_server() {
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let err = DataLinkClient::from_config(&config(&format!("127.0.0.1:{port}"), 1))
            .unwrap_err();
        assert!(err.is_transport(), "{err}");
    }
}
