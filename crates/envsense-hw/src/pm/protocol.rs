//! SDS011 serial protocol.
//!
//! Protocol structure:
//! - Command packets: 19 bytes, `AA B4 <13 data bytes> FF FF <checksum> AB`
//! - Data frames: 10 bytes, `AA C0 pm25_lo pm25_hi pm10_lo pm10_hi id_lo id_hi <checksum> AB`
//! - Checksums are the wrapping sum of the data bytes

use crate::{Error, Result};

/// Frame head byte.
pub const HEAD: u8 = 0xAA;

/// Frame tail byte.
pub const TAIL: u8 = 0xAB;

/// Command ID for host-to-sensor packets.
pub const COMMAND_ID: u8 = 0xB4;

/// Command ID of a measurement data frame.
pub const DATA_ID: u8 = 0xC0;

/// Data byte 1 of a "query data" command.
pub const QUERY_DATA: u8 = 0x04;

/// Size of a command packet.
pub const COMMAND_SIZE: usize = 19;

/// Size of a data frame.
pub const FRAME_SIZE: usize = 10;

/// Calculates the checksum over a frame's data bytes.
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &x| acc.wrapping_add(x))
}

/// Builds the "query data" command addressed to all sensors (device ID FFFF).
pub fn build_query_packet() -> [u8; COMMAND_SIZE] {
    let mut packet = [0u8; COMMAND_SIZE];
    packet[0] = HEAD;
    packet[1] = COMMAND_ID;
    packet[2] = QUERY_DATA;
    packet[15] = 0xFF;
    packet[16] = 0xFF;
    packet[17] = checksum(&packet[2..17]);
    packet[18] = TAIL;
    packet
}

/// Decodes a data frame into (PM2.5, PM10) in µg/m³.
pub fn parse_frame(frame: &[u8; FRAME_SIZE]) -> Result<(f32, f32)> {
    if frame[0] != HEAD || frame[9] != TAIL {
        return Err(Error::InvalidFrame(format!(
            "bad framing {:02X}..{:02X}",
            frame[0], frame[9]
        )));
    }
    if frame[1] != DATA_ID {
        return Err(Error::InvalidFrame(format!(
            "unexpected command {:02X}",
            frame[1]
        )));
    }

    let expected = checksum(&frame[2..8]);
    if frame[8] != expected {
        return Err(Error::Checksum {
            expected,
            actual: frame[8],
        });
    }

    let pm2_5 = u16::from_le_bytes([frame[2], frame[3]]) as f32 / 10.0;
    let pm10 = u16::from_le_bytes([frame[4], frame[5]]) as f32 / 10.0;
    Ok((pm2_5, pm10))
}
