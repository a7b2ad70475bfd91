// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! JSON messages exchanged with status feed clients.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use rot_ephem::{Body, Star};

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("not authorized")]
    Unauthorized,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("{0} not configured")]
    NotConfigured(&'static str),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("device error: {0}")]
    Device(String),
}

impl From<rot_core::RotatorError> for CommandError {
    fn from(e: rot_core::RotatorError) -> Self {
        CommandError::Device(e.to_string())
    }
}

impl From<rot_modbus::ModbusError> for CommandError {
    fn from(e: rot_modbus::ModbusError) -> Self {
        CommandError::Device(e.to_string())
    }
}

/// Star definition carried by `add_star`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StarMessage {
    pub starname: String,
    pub catalog: String,
    pub starnumber: i64,
    /// Right ascension, hours.
    pub ra: f64,
    /// Declination, degrees.
    pub dec: f64,
    /// Proper motion in RA, mas/yr.
    pub promora: f64,
    /// Proper motion in declination, mas/yr.
    pub promodec: f64,
    /// Parallax, mas.
    pub parallax: f64,
    /// Radial velocity, km/s.
    pub radialvelocity: f64,
}

impl From<StarMessage> for Body {
    fn from(star: StarMessage) -> Self {
        Body::Star(Star {
            name: star.starname,
            catalog: star.catalog,
            number: star.starnumber,
            ra_hours: star.ra,
            dec_deg: star.dec,
            pm_ra: star.promora,
            pm_dec: star.promodec,
            parallax: star.parallax,
            radial_velocity: star.radialvelocity,
        })
    }
}

/// Flat client message as it appears on the wire. Fields a command does not
/// use are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientMessage {
    pub command: String,
    pub seq: u64,
    pub register: usize,
    pub value: u16,
    pub position: f64,
    pub velocity: f64,
    pub body: usize,
    pub star: Option<StarMessage>,
    pub band: usize,
    pub enabled: bool,
}

/// A decoded client command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Ack(u64),
    Track(usize),
    Write { register: usize, value: u16 },
    SetAzimuthPosition(f64),
    SetElevationPosition(f64),
    SetAzimuthVelocity(f64),
    SetElevationVelocity(f64),
    Stop,
    StopHard,
    ExitShutdown,
    SetAzimuthOffset(f64),
    SetElevationOffset(f64),
    AddStar(StarMessage),
    SetBandTx { band: usize, enabled: bool },
    SetBandRx { band: usize, enabled: bool },
}

impl Command {
    /// Commands that hand the antenna back to manual control.
    pub fn is_manual_move(&self) -> bool {
        matches!(
            self,
            Command::SetAzimuthPosition(_)
                | Command::SetElevationPosition(_)
                | Command::SetAzimuthVelocity(_)
                | Command::SetElevationVelocity(_)
                | Command::Stop
                | Command::StopHard
        )
    }
}

impl TryFrom<ClientMessage> for Command {
    type Error = CommandError;

    fn try_from(msg: ClientMessage) -> Result<Self, Self::Error> {
        let command = match msg.command.as_str() {
            "ack" => Command::Ack(msg.seq),
            "track" => Command::Track(msg.body),
            "write" => Command::Write {
                register: msg.register,
                value: msg.value,
            },
            "set_azimuth_position" => Command::SetAzimuthPosition(msg.position),
            "set_elevation_position" => Command::SetElevationPosition(msg.position),
            "set_azimuth_velocity" => Command::SetAzimuthVelocity(msg.velocity),
            "set_elevation_velocity" => Command::SetElevationVelocity(msg.velocity),
            "stop" => Command::Stop,
            "stop_hard" => Command::StopHard,
            "exit_shutdown" => Command::ExitShutdown,
            "set_azimuth_offset" => Command::SetAzimuthOffset(msg.position),
            "set_elevation_offset" => Command::SetElevationOffset(msg.position),
            "add_star" => Command::AddStar(
                msg.star
                    .ok_or_else(|| CommandError::InvalidArgument("add_star needs star".into()))?,
            ),
            "set_band_tx" => Command::SetBandTx {
                band: msg.band,
                enabled: msg.enabled,
            },
            "set_band_rx" => Command::SetBandRx {
                band: msg.band,
                enabled: msg.enabled,
            },
            other => return Err(CommandError::UnknownCommand(other.to_string())),
        };
        Ok(command)
    }
}

/// Reply sent to the issuing client when a command fails.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReply {
    pub error: String,
    pub seq: u64,
}

/// A decoded command with the sequence number its replies carry.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub seq: u64,
    pub command: Command,
}

impl Request {
    pub fn reply(&self, error: &CommandError) -> ErrorReply {
        ErrorReply {
            error: error.to_string(),
            seq: self.seq,
        }
    }
}

/// Decode one text frame, keeping the sequence number for the error reply.
pub fn decode(text: &str) -> Result<Request, ErrorReply> {
    let msg: ClientMessage = serde_json::from_str(text).map_err(|e| ErrorReply {
        error: format!("parsing json: {}", e),
        seq: 0,
    })?;
    let seq = msg.seq;
    match Command::try_from(msg) {
        Ok(command) => Ok(Request { seq, command }),
        Err(e) => Err(ErrorReply {
            error: e.to_string(),
            seq,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(text: &str) -> Command {
        decode(text).expect("decode").command
    }

    #[test]
    fn decodes_flat_messages() {
        assert_eq!(command(r#"{"command":"ack","seq":7}"#), Command::Ack(7));
        assert_eq!(
            command(r#"{"command":"set_azimuth_position","position":-10.5,"seq":3}"#),
            Command::SetAzimuthPosition(-10.5)
        );
        assert_eq!(
            command(r#"{"command":"write","register":10,"value":1}"#),
            Command::Write {
                register: 10,
                value: 1
            }
        );
        assert_eq!(
            command(r#"{"command":"set_band_rx","band":2,"enabled":true}"#),
            Command::SetBandRx {
                band: 2,
                enabled: true
            }
        );
        assert_eq!(command(r#"{"command":"track","body":4}"#), Command::Track(4));
    }

    #[test]
    fn decodes_add_star() {
        let cmd = command(
            r#"{"command":"add_star","star":{"starname":"Deneb","catalog":"HR","starnumber":7924,"ra":20.69,"dec":45.28}}"#,
        );
        let Command::AddStar(star) = cmd else {
            panic!("expected add_star");
        };
        let body = Body::from(star);
        assert_eq!(body.name(), "Deneb");
        assert!(decode(r#"{"command":"add_star"}"#).is_err());
    }

    #[test]
    fn requests_keep_their_sequence_number() {
        let request = decode(r#"{"command":"track","body":99,"seq":41}"#).expect("decode");
        assert_eq!(request.seq, 41);
        let reply = request.reply(&CommandError::InvalidArgument("no body 99".into()));
        assert_eq!(reply.seq, 41);
        assert_eq!(reply.error, "invalid argument: no body 99");
        assert_eq!(decode(r#"{"command":"stop"}"#).expect("decode").seq, 0);
    }

    #[test]
    fn errors_carry_sequence_number() {
        let err = decode(r#"{"command":"fly","seq":12}"#).expect_err("unknown");
        assert_eq!(err.seq, 12);
        assert!(err.error.contains("fly"));
        let err = decode("not json").expect_err("bad json");
        assert_eq!(err.seq, 0);
        let json = serde_json::to_value(&err).expect("encode");
        assert!(json.get("error").is_some());
    }

    #[test]
    fn manual_moves() {
        assert!(Command::Stop.is_manual_move());
        assert!(Command::SetElevationVelocity(1.0).is_manual_move());
        assert!(!Command::Track(1).is_manual_move());
        assert!(!Command::SetAzimuthOffset(1.0).is_manual_move());
    }
}
