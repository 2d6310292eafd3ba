//! Hardware MIDI output through midir, on a dedicated thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use fermata_midi::short;
use midir::{MidiOutput, MidiOutputConnection};
use tracing::{debug, warn};

use super::DeviceSink;
use crate::error::{Error, Result};

const CLIENT_NAME: &str = "fermata";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiOutputDevice {
    pub index: usize,
    pub name: String,
}

enum OutputCommand {
    Send(Vec<u8>),
    Shutdown,
}

/// Sink writing to a midir output port.
///
/// The connection lives on its own thread, so the player never blocks on
/// the OS MIDI API. Messages are forwarded in order.
pub struct MidirSink {
    command_sender: Sender<OutputCommand>,
    is_connected: Arc<AtomicBool>,
    port_name: String,
    thread: Option<JoinHandle<()>>,
}

impl MidirSink {
    pub fn list_devices() -> Vec<MidiOutputDevice> {
        let mut devices = Vec::new();
        if let Ok(midi_output) = MidiOutput::new("fermata-device-list") {
            let ports = midi_output.ports();
            for (index, port) in ports.iter().enumerate() {
                let name = midi_output
                    .port_name(port)
                    .unwrap_or_else(|_| format!("Unknown Device {}", index));
                devices.push(MidiOutputDevice { index, name });
            }
        }
        devices
    }

    /// Connect to the output port at `device_index`.
    pub fn connect(device_index: usize) -> Result<Self> {
        let (command_sender, command_receiver) = unbounded();
        let (reply_tx, reply_rx) = bounded::<Result<String>>(1);
        let is_connected = Arc::new(AtomicBool::new(false));
        let is_connected_clone = Arc::clone(&is_connected);

        let thread = thread::Builder::new()
            .name("fermata-midi-output".to_string())
            .spawn(move || {
                let connection = match connect_to_device(device_index) {
                    Ok((connection, name)) => {
                        is_connected_clone.store(true, Ordering::SeqCst);
                        let _ = reply_tx.send(Ok(name));
                        connection
                    }
                    Err(e) => {
                        let _ = reply_tx.send(Err(e));
                        return;
                    }
                };
                output_thread(connection, command_receiver, is_connected_clone);
            })?;

        let port_name = reply_rx
            .recv()
            .map_err(|_| Error::Sink("MIDI output thread exited".to_string()))??;
        debug!("Connected MIDI output {}: {}", device_index, port_name);

        Ok(Self {
            command_sender,
            is_connected,
            port_name,
            thread: Some(thread),
        })
    }

    /// Connect to the first port whose name contains `name`, ignoring case.
    pub fn connect_by_name(name: &str) -> Result<Self> {
        let devices = Self::list_devices();
        let device = devices
            .iter()
            .find(|d| d.name.to_lowercase().contains(&name.to_lowercase()))
            .ok_or_else(|| {
                Error::Sink(format!("No MIDI output device found matching '{}'", name))
            })?;
        Self::connect(device.index)
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    fn forward(&self, bytes: Vec<u8>) -> Result<()> {
        self.command_sender
            .send(OutputCommand::Send(bytes))
            .map_err(|_| Error::Sink("MIDI output thread not running".to_string()))
    }
}

impl DeviceSink for MidirSink {
    fn send_short(&mut self, msg: u32) -> Result<()> {
        let (bytes, len) = short::to_bytes(msg);
        self.forward(bytes[..len].to_vec())
    }

    fn send_long(&mut self, data: &[u8]) -> Result<()> {
        self.forward(data.to_vec())
    }

    fn is_ready(&self) -> bool {
        self.is_connected.load(Ordering::SeqCst)
    }
}

impl Drop for MidirSink {
    fn drop(&mut self) {
        let _ = self.command_sender.send(OutputCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn connect_to_device(device_index: usize) -> Result<(MidiOutputConnection, String)> {
    let midi_output = MidiOutput::new(CLIENT_NAME)?;

    let ports = midi_output.ports();
    let port = ports.get(device_index).ok_or_else(|| {
        Error::Sink(format!("MIDI output device {} not found", device_index))
    })?;

    let port_name = midi_output
        .port_name(port)
        .unwrap_or_else(|_| format!("Device {}", device_index));

    let connection = midi_output.connect(port, "fermata-output")?;

    Ok((connection, port_name))
}

fn output_thread(
    mut connection: MidiOutputConnection,
    command_receiver: Receiver<OutputCommand>,
    is_connected: Arc<AtomicBool>,
) {
    while let Ok(command) = command_receiver.recv() {
        match command {
            OutputCommand::Send(bytes) => {
                if let Err(e) = connection.send(&bytes) {
                    warn!("MIDI output send failed: {}", e);
                }
            }
            OutputCommand::Shutdown => break,
        }
    }
    is_connected.store(false, Ordering::SeqCst);
    let _ = connection.close();
}
