// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::future::Future;
use std::pin::Pin;

use base64::Engine;
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::time::{timeout, Duration};
use tokio_serial::{
    ClearBuffer, DataBits, Parity, SerialPort, SerialPortBuilderExt, SerialStream, StopBits,
};
use tracing::{debug, warn};

use crate::error::ModbusError;

pub type ModbusFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ModbusError>> + Send + 'a>>;

/// Carries raw RTU ADUs (unit id, PDU, CRC) to a Modbus bus and back.
pub trait ModbusTransport: Send {
    fn connect(&mut self) -> ModbusFuture<'_, ()>;

    /// Send one request ADU and return the complete response ADU.
    fn send<'a>(&'a mut self, adu: &'a [u8]) -> ModbusFuture<'a, Vec<u8>>;

    fn close(&mut self);

    /// Human readable endpoint, used in log messages.
    fn describe(&self) -> String;
}

/// Local RTU bus on a serial port, 8N1.
pub struct RtuSerial {
    path: String,
    baud: u32,
    timeout: Duration,
    port: Option<SerialStream>,
}

impl RtuSerial {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

    pub fn new(path: &str, baud: u32) -> Self {
        Self {
            path: path.to_string(),
            baud,
            timeout: Self::DEFAULT_TIMEOUT,
            port: None,
        }
    }
}

impl ModbusTransport for RtuSerial {
    fn connect(&mut self) -> ModbusFuture<'_, ()> {
        Box::pin(async move {
            let port = tokio_serial::new(&self.path, self.baud)
                .data_bits(DataBits::Eight)
                .parity(Parity::None)
                .stop_bits(StopBits::One)
                .timeout(self.timeout)
                .open_native_async()
                .map_err(|e| ModbusError::Open {
                    port: self.path.clone(),
                    reason: e.to_string(),
                })?;
            self.port = Some(port);
            Ok(())
        })
    }

    fn send<'a>(&'a mut self, adu: &'a [u8]) -> ModbusFuture<'a, Vec<u8>> {
        Box::pin(async move {
            let port = self.port.as_mut().ok_or(ModbusError::NotConnected)?;
            discard_stale_input(&self.path, port.clear(ClearBuffer::Input));
            port.write_all(adu).await?;
            port.flush().await?;
            let frame = timeout(self.timeout, read_frame(port))
                .await
                .map_err(|_| ModbusError::Timeout)??;
            debug!("modbus {} -> {:02x?} <- {:02x?}", self.path, adu, frame);
            Ok(frame)
        })
    }

    fn close(&mut self) {
        self.port = None;
    }

    fn describe(&self) -> String {
        self.path.clone()
    }
}

/// Drop any stale bytes left by an earlier timed-out exchange. A failed
/// clear is logged and the exchange goes ahead.
fn discard_stale_input(path: &str, cleared: tokio_serial::Result<()>) -> bool {
    match cleared {
        Ok(()) => true,
        Err(e) => {
            warn!("modbus {}: clearing input buffer: {}", path, e);
            false
        }
    }
}

/// Total RTU response length derived from the function code and the byte
/// following it.
fn frame_length(function: u8, third: u8) -> usize {
    if function & 0x80 != 0 {
        return 5;
    }
    match function {
        1..=4 => 5 + third as usize,
        _ => 8,
    }
}

/// Read exactly one RTU response frame.
pub(crate) async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, ModbusError> {
    let mut frame = vec![0u8; 3];
    reader.read_exact(&mut frame).await?;
    let len = frame_length(frame[1], frame[2]);
    frame.resize(len, 0);
    reader.read_exact(&mut frame[3..]).await?;
    Ok(frame)
}

/// Remote bus reached through an HTTP proxy that relays raw ADUs.
pub struct HttpTunnel {
    url: String,
    username: Option<String>,
    password: Option<String>,
    timeout: Duration,
    client: Option<reqwest::Client>,
}

#[derive(Debug, Deserialize)]
struct TunnelResponse {
    #[serde(rename = "ADUResponse", default)]
    adu_response: Option<String>,
    #[serde(rename = "Error", default)]
    error: String,
}

impl HttpTunnel {
    pub fn new(url: &str, username: Option<String>, password: Option<String>) -> Self {
        Self {
            url: url.to_string(),
            username,
            password,
            timeout: RtuSerial::DEFAULT_TIMEOUT,
            client: None,
        }
    }
}

/// Decode the proxy reply body into a response ADU.
pub(crate) fn parse_tunnel_response(body: &[u8]) -> Result<Vec<u8>, ModbusError> {
    let reply: TunnelResponse = serde_json::from_slice(body).map_err(ModbusError::tunnel)?;
    if !reply.error.is_empty() {
        return Err(ModbusError::Tunnel(reply.error));
    }
    match reply.adu_response {
        Some(encoded) => base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(ModbusError::tunnel),
        None => Ok(Vec::new()),
    }
}

impl ModbusTransport for HttpTunnel {
    fn connect(&mut self) -> ModbusFuture<'_, ()> {
        Box::pin(async move {
            let client = reqwest::Client::builder()
                .timeout(self.timeout)
                .build()
                .map_err(|e| ModbusError::Open {
                    port: self.url.clone(),
                    reason: e.to_string(),
                })?;
            self.client = Some(client);
            Ok(())
        })
    }

    fn send<'a>(&'a mut self, adu: &'a [u8]) -> ModbusFuture<'a, Vec<u8>> {
        Box::pin(async move {
            let client = self.client.as_ref().ok_or(ModbusError::NotConnected)?;
            let mut request = client
                .post(&self.url)
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .body(adu.to_vec());
            if let Some(username) = &self.username {
                request = request.basic_auth(username, self.password.as_deref());
            }
            let response = request.send().await.map_err(ModbusError::tunnel)?;
            let status = response.status();
            let body = response.bytes().await.map_err(ModbusError::tunnel)?;
            if !status.is_success() {
                return Err(ModbusError::Tunnel(format!(
                    "bad status code: {}: {}",
                    status,
                    String::from_utf8_lossy(&body)
                )));
            }
            parse_tunnel_response(&body)
        })
    }

    fn close(&mut self) {
        self.client = None;
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};

    use super::*;

    pub fn crc16(data: &[u8]) -> u16 {
        let mut crc: u16 = 0xFFFF;
        for byte in data {
            crc ^= *byte as u16;
            for _ in 0..8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xA001;
                } else {
                    crc >>= 1;
                }
            }
        }
        crc
    }

    pub fn with_crc(mut frame: Vec<u8>) -> Vec<u8> {
        let crc = crc16(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());
        frame
    }

    fn pack_bits(bits: &[bool]) -> Vec<u8> {
        bits.chunks(8)
            .map(|chunk| {
                chunk
                    .iter()
                    .enumerate()
                    .fold(0u8, |acc, (i, bit)| acc | ((*bit as u8) << i))
            })
            .collect()
    }

    /// Register image served by the mock device.
    #[derive(Debug, Default, Clone)]
    pub struct Device {
        pub input_registers: Vec<u16>,
        pub holding_registers: Vec<u16>,
        pub coils: Vec<bool>,
        pub discrete_inputs: Vec<bool>,
    }

    /// In-memory slave that answers reads from a register image and records
    /// every request it sees.
    pub struct MockTransport {
        pub device: Arc<Mutex<Device>>,
        pub requests: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl MockTransport {
        pub fn new(device: Device) -> Self {
            Self {
                device: Arc::new(Mutex::new(device)),
                requests: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn respond(&self, adu: &[u8]) -> Vec<u8> {
            let unit = adu[0];
            let function = adu[1];
            let addr = u16::from_be_bytes([adu[2], adu[3]]) as usize;
            let count = u16::from_be_bytes([adu[4], adu[5]]) as usize;
            let mut device = self.device.lock().expect("device mutex poisoned");
            match function {
                1 | 2 => {
                    let source = if function == 1 {
                        &device.coils
                    } else {
                        &device.discrete_inputs
                    };
                    let bits: Vec<bool> = (addr..addr + count)
                        .map(|i| source.get(i).copied().unwrap_or(false))
                        .collect();
                    let bytes = pack_bits(&bits);
                    let mut frame = vec![unit, function, bytes.len() as u8];
                    frame.extend(bytes);
                    with_crc(frame)
                }
                3 | 4 => {
                    let source = if function == 3 {
                        &device.holding_registers
                    } else {
                        &device.input_registers
                    };
                    let mut frame = vec![unit, function, (count * 2) as u8];
                    for i in addr..addr + count {
                        frame.extend(source.get(i).copied().unwrap_or(0).to_be_bytes());
                    }
                    with_crc(frame)
                }
                5 => {
                    let on = adu[4] == 0xFF;
                    if device.coils.len() <= addr {
                        device.coils.resize(addr + 1, false);
                    }
                    device.coils[addr] = on;
                    adu.to_vec()
                }
                _ => with_crc(vec![unit, function | 0x80, 1]),
            }
        }
    }

    impl ModbusTransport for MockTransport {
        fn connect(&mut self) -> ModbusFuture<'_, ()> {
            Box::pin(async { Ok(()) })
        }

        fn send<'a>(&'a mut self, adu: &'a [u8]) -> ModbusFuture<'a, Vec<u8>> {
            Box::pin(async move {
                self.requests
                    .lock()
                    .expect("requests mutex poisoned")
                    .push(adu.to_vec());
                Ok(self.respond(adu))
            })
        }

        fn close(&mut self) {}

        fn describe(&self) -> String {
            "mock".to_string()
        }
    }
}
