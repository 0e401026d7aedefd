//! Hardware bridge: binary framing, serial transport, and the
//! connection that multiplexes command/response exchanges with
//! unsolicited device notifications.

mod actuator;
mod connection;
mod frame;
mod transport;

pub use {
    actuator::BridgeActuator,
    connection::{BridgeConnection, ConnectionState, DEFAULT_RESPONSE_TIMEOUT},
    frame::{
        FrameDecoder, InboundFrame, OutboundFrame, PROTOCOL_VERSION, button_code,
        click_phase_code, key_phase_code,
    },
    transport::{DEFAULT_BAUD, READ_TIMEOUT, SerialIo, SerialTransport, SystemSerial},
};
