// Протокол: один байт - одна команда, ответы строками ASCII с `\n`

use std::fmt;

use embedded_hal::serial;
use thiserror::Error;

use crate::valve_state::ValveState;
use crate::variant::Variant;

pub const BAUD_RATE: u32 = 9600;
pub const QUERY: u8 = b'?';

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Select(ValveState),
    Query,
}

#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unknown command byte 0x{0:02x}")]
    Unknown(u8),
}

impl Command {
    pub fn decode(byte: u8, variant: &Variant) -> Result<Self, ProtocolError> {
        if byte == QUERY {
            return Ok(Command::Query);
        }
        variant
            .decode(byte)
            .map(Command::Select)
            .ok_or(ProtocolError::Unknown(byte))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Response {
    Ready,
    Ok(ValveState),
    State(ValveState),
    // без запроса, клапан переключен кнопкой
    Button(ValveState),
    Error(ProtocolError),
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Ready => write!(f, "READY"),
            Response::Ok(state) => write!(f, "OK:{state}"),
            Response::State(state) => write!(f, "STATE:{state}"),
            Response::Button(state) => write!(f, "BTN:{state}"),
            Response::Error(ProtocolError::Unknown(_)) => write!(f, "ERR:UNKNOWN"),
        }
    }
}

/// Takes one pending byte off the port, if any.
pub fn read_byte<P, E>(port: &mut P) -> Result<Option<u8>, E>
where
    P: serial::Read<u8, Error = E>,
{
    match port.read() {
        Ok(b) => Ok(Some(b)),
        Err(nb::Error::WouldBlock) => Ok(None),
        Err(nb::Error::Other(e)) => Err(e),
    }
}

pub fn write_response<P, E>(port: &mut P, response: &Response) -> Result<(), E>
where
    P: serial::Write<u8, Error = E>,
{
    let line = response.to_string();
    for b in line.bytes() {
        nb::block!(port.write(b))?;
    }
    nb::block!(port.write(b'\n'))?;
    nb::block!(port.flush())?;
    Ok(())
}
