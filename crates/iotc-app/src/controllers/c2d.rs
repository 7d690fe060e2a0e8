//! Cloud-to-device message handling.

use core::fmt;

use heapless::String;
use log::{info, warn};

use crate::config::{MAX_COMMAND_LEN, MAX_FILE_NAME_LEN, MAX_URL_LEN};
use crate::controllers::command::{CommandError, parse_command};
use crate::controllers::json::{FieldError, find_string_field};
use crate::domain::tunables::{CommandSender, ControlCommand};
use crate::infrastructure::tasks::ota::{OtaRequest, OtaSender};

#[allow(clippy::large_enum_variant)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum C2dMessage {
    Ota(OtaRequest),
    Command(ControlCommand),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum C2dError {
    NotUtf8,
    Field(&'static str, FieldError),
    Command(CommandError),
    /// The target queue is full
    Busy,
}

impl fmt::Display for C2dError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            C2dError::NotUtf8 => write!(f, "payload is not utf-8"),
            C2dError::Field(name, e) => write!(f, "{}: {}", name, e),
            C2dError::Command(e) => write!(f, "{}", e),
            C2dError::Busy => write!(f, "queue full"),
        }
    }
}

/// Classify a command payload.
///
/// A `url` field makes it an OTA request, which then also needs
/// `fileName`. Otherwise the `cmd` field, or the whole payload when there
/// is none, is parsed as a tunables command.
pub fn parse_c2d_message(payload: &[u8]) -> Result<C2dMessage, C2dError> {
    let text = core::str::from_utf8(payload).map_err(|_| C2dError::NotUtf8)?;

    match find_string_field::<MAX_URL_LEN>(text, "url") {
        Ok(url) => {
            let file_name = find_string_field::<MAX_FILE_NAME_LEN>(text, "fileName")
                .map_err(|e| C2dError::Field("fileName", e))?;
            return Ok(C2dMessage::Ota(OtaRequest { url, file_name }));
        }
        Err(FieldError::Missing) => {}
        Err(e) => return Err(C2dError::Field("url", e)),
    }

    let command = match find_string_field::<MAX_COMMAND_LEN>(text, "cmd") {
        Ok(cmd) => parse_command(&cmd),
        Err(FieldError::Missing) => parse_command(text),
        Err(e) => return Err(C2dError::Field("cmd", e)),
    };
    command.map(C2dMessage::Command).map_err(C2dError::Command)
}

/// Routes cloud messages to the OTA task and the telemetry task.
pub struct C2dController<'a> {
    ota: OtaSender<'a>,
    commands: CommandSender<'a>,
}

impl<'a> C2dController<'a> {
    pub fn new(ota: OtaSender<'a>, commands: CommandSender<'a>) -> Self {
        Self { ota, commands }
    }

    /// Handle one message from the command topic.
    pub fn on_message(&self, payload: &[u8]) -> Result<(), C2dError> {
        let message = parse_c2d_message(payload).inspect_err(|e| {
            warn!("control: rejected message: {}", e);
        })?;

        match message {
            C2dMessage::Ota(request) => {
                info!("control: ota of {} requested", request.file_name);
                self.ota.try_send(request).map_err(|_| {
                    warn!("control: ota already pending, request dropped");
                    C2dError::Busy
                })
            }
            C2dMessage::Command(command) => {
                info!("control: {:?}", command);
                self.commands.try_send(command).map_err(|_| {
                    warn!("control: command queue full, command dropped");
                    C2dError::Busy
                })
            }
        }
    }
}
