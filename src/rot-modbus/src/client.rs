// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use rmodbus::client::ModbusRequest;
use rmodbus::ModbusProto;

use crate::error::ModbusError;
use crate::transport::ModbusTransport;

/// Unpack Modbus bit data: first bit is the LSB of the first byte.
pub fn bytes_to_bits(bytes: &[u8]) -> Vec<bool> {
    bytes
        .iter()
        .flat_map(|byte| (0..8).map(move |i| (byte >> i) & 1 == 1))
        .collect()
}

/// RTU master for a single unit behind a transport.
pub struct ModbusClient {
    unit_id: u8,
    transport: Box<dyn ModbusTransport>,
    connected: bool,
}

impl ModbusClient {
    pub fn new(unit_id: u8, transport: Box<dyn ModbusTransport>) -> Self {
        Self {
            unit_id,
            transport,
            connected: false,
        }
    }

    pub async fn connect(&mut self) -> Result<(), ModbusError> {
        self.transport.connect().await?;
        self.connected = true;
        Ok(())
    }

    pub fn close(&mut self) {
        self.transport.close();
        self.connected = false;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn describe(&self) -> String {
        self.transport.describe()
    }

    fn request(&self) -> ModbusRequest {
        ModbusRequest::new(self.unit_id, ModbusProto::Rtu)
    }

    async fn transact(&mut self, adu: &[u8]) -> Result<Vec<u8>, ModbusError> {
        if !self.connected {
            return Err(ModbusError::NotConnected);
        }
        let response = self.transport.send(adu).await?;
        if response.len() < 5 {
            return Err(ModbusError::FrameTooShort(response.len()));
        }
        Ok(response)
    }

    async fn read_words(&mut self, holding: bool, reg: u16, count: u16) -> Result<Vec<u16>, ModbusError> {
        let mut request = self.request();
        let mut adu = Vec::new();
        let generated = if holding {
            request.generate_get_holdings(reg, count, &mut adu)
        } else {
            request.generate_get_inputs(reg, count, &mut adu)
        };
        generated.map_err(ModbusError::exception)?;
        let response = self.transact(&adu).await?;
        let mut values = Vec::new();
        request
            .parse_u16(&response, &mut values)
            .map_err(ModbusError::exception)?;
        Ok(values)
    }

    async fn read_bits(&mut self, coils: bool, reg: u16, count: u16) -> Result<Vec<bool>, ModbusError> {
        let mut request = self.request();
        let mut adu = Vec::new();
        let generated = if coils {
            request.generate_get_coils(reg, count, &mut adu)
        } else {
            request.generate_get_discretes(reg, count, &mut adu)
        };
        generated.map_err(ModbusError::exception)?;
        let response = self.transact(&adu).await?;
        request.parse_ok(&response).map_err(ModbusError::exception)?;
        let data = response
            .get(3..response.len() - 2)
            .ok_or(ModbusError::FrameTooShort(response.len()))?;
        let mut bits = bytes_to_bits(data);
        if bits.len() < count as usize {
            return Err(ModbusError::FrameTooShort(response.len()));
        }
        bits.truncate(count as usize);
        Ok(bits)
    }

    pub async fn read_input_registers(&mut self, reg: u16, count: u16) -> Result<Vec<u16>, ModbusError> {
        self.read_words(false, reg, count).await
    }

    pub async fn read_holding_registers(&mut self, reg: u16, count: u16) -> Result<Vec<u16>, ModbusError> {
        self.read_words(true, reg, count).await
    }

    pub async fn read_coils(&mut self, reg: u16, count: u16) -> Result<Vec<bool>, ModbusError> {
        self.read_bits(true, reg, count).await
    }

    pub async fn read_discrete_inputs(&mut self, reg: u16, count: u16) -> Result<Vec<bool>, ModbusError> {
        self.read_bits(false, reg, count).await
    }

    /// Write one coil (0xFF00 on, 0x0000 off).
    pub async fn write_single_coil(&mut self, reg: u16, value: bool) -> Result<(), ModbusError> {
        let mut request = self.request();
        let mut adu = Vec::new();
        request
            .generate_set_coil(reg, value, &mut adu)
            .map_err(ModbusError::exception)?;
        let response = self.transact(&adu).await?;
        request.parse_ok(&response).map_err(ModbusError::exception)?;
        Ok(())
    }
}
