// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Driver for the RCI servo controller register protocol.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration, Instant};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use rot_core::rotator::{
    MoveBlocker, RegisterWriter, RotatorAccessMethod, RotatorInfo, ShutdownControl,
};
use rot_core::{Rotator, RotatorError, RotatorStatus, StatusCallback};

pub mod registers;

use registers::*;

const QUIESCENT_VELOCITY: f64 = 0.2;
const QUIESCENT_TIME: Duration = Duration::from_secs(1);
const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const SHUTDOWN_TOGGLE_DWELL: Duration = Duration::from_millis(200);

#[derive(Default)]
struct State {
    link: Option<mpsc::UnboundedSender<String>>,
    read_registers: [u16; READ_REGISTERS],
    write_registers: [u16; WRITE_REGISTERS],
    last_diag: u16,
    last_move: Option<Instant>,
    /// Axis modes captured while moves are blocked; `Some` while blocking.
    blocked: Option<BTreeMap<usize, u16>>,
}

struct Shared {
    state: Mutex<State>,
    acceptable_shutdowns: Mutex<HashSet<u8>>,
    callback: StatusCallback,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("rci state mutex poisoned")
    }

    fn status(state: &mut State) -> RotatorStatus {
        let mut write = state.write_registers;
        if let Some(blocked) = &state.blocked {
            // Report blocked moves as if they were running.
            for (register, value) in blocked {
                write[*register] = *value;
            }
        }
        let mut status = decode(&state.read_registers, &write);

        let blocking = state.blocked.as_ref().is_some_and(|b| !b.is_empty());
        let commanded = status.command_az_flags.is_active() || status.command_el_flags.is_active();
        let moving = blocking
            || (commanded && status.shutdown_error != 0)
            || status.az_vel.abs() > QUIESCENT_VELOCITY
            || status.el_vel.abs() > QUIESCENT_VELOCITY;
        let now = Instant::now();
        if moving {
            state.last_move = Some(now);
        }
        status.moving = state
            .last_move
            .is_some_and(|last| now.duration_since(last) < QUIESCENT_TIME);
        status.moving_disabled = state.blocked.is_some();
        status
    }

    fn notify(&self, state: &mut State) {
        let status = Self::status(state);
        (self.callback)(status);
    }

    fn write_locked(
        state: &mut State,
        register: usize,
        values: &[u16],
    ) -> Result<(), RotatorError> {
        if register + values.len() > WRITE_REGISTERS {
            return Err(RotatorError::RegisterOutOfRange {
                register,
                count: values.len(),
                limit: WRITE_REGISTERS,
            });
        }
        let link = state.link.clone().ok_or(RotatorError::NotConnected)?;
        let mut sent = Vec::with_capacity(values.len());
        for (i, value) in values.iter().enumerate() {
            let reg = register + i;
            let mut value = *value;
            if let Some(blocked) = state.blocked.as_mut() {
                if reg == AZ_MODE || reg == EL_MODE {
                    if value == SERVO_NONE {
                        blocked.remove(&reg);
                    } else {
                        blocked.insert(reg, value);
                        value = SERVO_NONE;
                    }
                }
            }
            state.write_registers[reg] = value;
            sent.push(value);
        }
        let line = format_write(register, &sent);
        debug!("rci: writing {}", line.trim_end());
        if link.send(line).is_err() {
            warn!("rci: link closed while writing register {}", register);
        }
        Ok(())
    }

    fn write(&self, register: usize, values: &[u16]) -> Result<(), RotatorError> {
        let mut state = self.lock();
        Self::write_locked(&mut state, register, values)?;
        self.notify(&mut state);
        Ok(())
    }

    /// Bump the diagnostic counter and issue a sequence of single-register
    /// writes as one command.
    fn command(&self, writes: &[(usize, u16)]) {
        let mut state = self.lock();
        state.last_diag = state.last_diag.wrapping_add(1);
        let diag = state.last_diag;
        let result = Self::write_locked(&mut state, DIAG, &[diag]).and_then(|_| {
            writes
                .iter()
                .try_for_each(|(reg, value)| Self::write_locked(&mut state, *reg, &[*value]))
        });
        match result {
            Ok(()) => self.notify(&mut state),
            Err(e) => debug!("rci: command dropped: {}", e),
        }
    }

    fn set_moving_disabled(&self, disabled: bool) {
        let mut state = self.lock();
        if disabled && state.blocked.is_none() {
            let captured: BTreeMap<usize, u16> = [AZ_MODE, EL_MODE]
                .into_iter()
                .map(|reg| (reg, state.write_registers[reg]))
                .collect();
            state.blocked = Some(captured.clone());
            for (reg, value) in captured {
                if let Err(e) = Self::write_locked(&mut state, reg, &[value]) {
                    debug!("rci: block write dropped: {}", e);
                }
            }
            info!("rci: moves disabled");
        } else if !disabled {
            let Some(blocked) = state.blocked.take() else {
                return;
            };
            if !blocked.is_empty() {
                state.last_diag = state.last_diag.wrapping_add(1);
                let diag = state.last_diag;
                let result = Self::write_locked(&mut state, DIAG, &[diag]).and_then(|_| {
                    blocked
                        .iter()
                        .try_for_each(|(reg, value)| Self::write_locked(&mut state, *reg, &[*value]))
                });
                if let Err(e) = result {
                    debug!("rci: restore dropped: {}", e);
                }
            }
            info!("rci: moves enabled");
        } else {
            return;
        }
        self.notify(&mut state);
    }

    /// Toggle the shutdown-exit control bit 0, 1, 0.
    fn spawn_exit_shutdown(self: &Arc<Self>) -> JoinHandle<()> {
        let shared = self.clone();
        tokio::spawn(async move {
            for (i, value) in [0u16, 1, 0].into_iter().enumerate() {
                if i > 0 {
                    sleep(SHUTDOWN_TOGGLE_DWELL).await;
                }
                if let Err(e) = shared.write(SHUTDOWN_CONTROL, &[value]) {
                    warn!("rci: exit shutdown: {}", e);
                    return;
                }
            }
        })
    }

    fn handle_line(self: &Arc<Self>, line: &str, exiting_shutdown: &mut bool) {
        let line = line.trim_end();
        if line.is_empty() {
            return;
        }
        if let Some(message) = line.strip_prefix('!') {
            info!("rci: {}", message);
            return;
        }
        let Some(body) = line.strip_prefix('r') else {
            warn!("rci: unknown input: {}", line);
            return;
        };
        let registers = match parse_read_line(body) {
            Ok(registers) => registers,
            Err(e) => {
                warn!("rci: failed to parse {:?}: {}", line, e);
                return;
            }
        };
        let shutdown = {
            let mut state = self.lock();
            state.read_registers = registers;
            let status = Self::status(&mut state);
            let shutdown = status.shutdown_error;
            (self.callback)(status);
            shutdown
        };
        let acceptable = shutdown != 0
            && self
                .acceptable_shutdowns
                .lock()
                .expect("rci shutdown set mutex poisoned")
                .contains(&shutdown);
        if acceptable {
            if !*exiting_shutdown {
                *exiting_shutdown = true;
                info!(
                    "rci: acceptable shutdown {}; automatically exiting shutdown",
                    shutdown
                );
                self.spawn_exit_shutdown();
            }
        } else {
            *exiting_shutdown = false;
        }
    }

    fn open_link(&self) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().link = Some(tx);
        rx
    }

    async fn serve<S>(
        self: Arc<Self>,
        stream: S,
        mut outgoing: mpsc::UnboundedReceiver<String>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, mut writer) = tokio::io::split(stream);
        let mut lines = BufReader::new(reader).lines();
        let mut exiting_shutdown = false;
        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => self.handle_line(&line, &mut exiting_shutdown),
                    Ok(None) => {
                        warn!("rci: link closed");
                        break;
                    }
                    Err(e) => {
                        warn!("rci: reading link: {}", e);
                        break;
                    }
                },
                out = outgoing.recv() => match out {
                    Some(out) => {
                        if let Err(e) = writer.write_all(out.as_bytes()).await {
                            warn!("rci: writing link: {}", e);
                            break;
                        }
                    }
                    None => break,
                },
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
        self.lock().link = None;
    }
}

/// RCI servo controller on a serial line.
pub struct Rci {
    info: RotatorInfo,
    shared: Arc<Shared>,
}

impl Rci {
    /// Create a driver with no link attached.
    pub fn new(info: RotatorInfo, callback: StatusCallback) -> Self {
        Self {
            info,
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                acceptable_shutdowns: Mutex::new(HashSet::new()),
                callback,
            }),
        }
    }

    /// Create a driver and keep a serial link to `path` open, retrying every
    /// second until shutdown.
    pub fn connect(
        path: &str,
        baud: u32,
        callback: StatusCallback,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let rci = Self::new(
            RotatorInfo {
                manufacturer: "Sigmet".to_string(),
                model: "RCI".to_string(),
                access: RotatorAccessMethod::Serial {
                    path: path.to_string(),
                    baud,
                },
            },
            callback,
        );
        tokio::spawn(reconnect_loop(
            rci.shared.clone(),
            path.to_string(),
            baud,
            shutdown_rx,
        ));
        rci
    }

    /// Drive the controller over an already open byte stream.
    pub fn attach<S>(&self, stream: S, shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let outgoing = self.shared.open_link();
        tokio::spawn(self.shared.clone().serve(stream, outgoing, shutdown_rx))
    }

    pub fn is_connected(&self) -> bool {
        self.shared.lock().link.is_some()
    }
}

async fn reconnect_loop(
    shared: Arc<Shared>,
    path: String,
    baud: u32,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = sleep(RECONNECT_DELAY) => {}
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
        let port = match tokio_serial::new(&path, baud).open_native_async() {
            Ok(port) => port,
            Err(e) => {
                warn!("rci: opening {:?}: {}", path, e);
                continue;
            }
        };
        info!("rci: opened {:?}", path);
        let outgoing = shared.open_link();
        shared
            .clone()
            .serve(port, outgoing, shutdown_rx.clone())
            .await;
        if *shutdown_rx.borrow() {
            break;
        }
    }
}

impl Rotator for Rci {
    fn info(&self) -> &RotatorInfo {
        &self.info
    }

    fn stop(&self) {
        self.shared
            .command(&[(AZ_MODE, SERVO_NONE), (EL_MODE, SERVO_NONE)]);
    }

    fn set_azimuth_position(&self, angle: f64) {
        self.shared.command(&[
            (AZ_POSITION, angle_to_register(angle)),
            (AZ_MODE, SERVO_POSITION),
        ]);
    }

    fn set_elevation_position(&self, angle: f64) {
        self.shared.command(&[
            (EL_POSITION, angle_to_register(angle)),
            (EL_MODE, SERVO_POSITION),
        ]);
    }

    fn set_azimuth_velocity(&self, velocity: f64) {
        self.shared.command(&[
            (AZ_VELOCITY, angle_to_register(velocity)),
            (AZ_MODE, SERVO_VELOCITY),
        ]);
    }

    fn set_elevation_velocity(&self, velocity: f64) {
        self.shared.command(&[
            (EL_VELOCITY, angle_to_register(velocity)),
            (EL_MODE, SERVO_VELOCITY),
        ]);
    }

    fn as_register_writer(&self) -> Option<&dyn RegisterWriter> {
        Some(self)
    }

    fn as_shutdown_control(&self) -> Option<&dyn ShutdownControl> {
        Some(self)
    }

    fn as_move_blocker(&self) -> Option<&dyn MoveBlocker> {
        Some(self)
    }
}

impl RegisterWriter for Rci {
    fn write(&self, register: usize, values: &[u16]) -> Result<(), RotatorError> {
        self.shared.write(register, values)
    }
}

impl ShutdownControl for Rci {
    fn set_acceptable_shutdowns(&self, codes: HashSet<u8>) {
        *self
            .shared
            .acceptable_shutdowns
            .lock()
            .expect("rci shutdown set mutex poisoned") = codes;
    }

    fn exit_shutdown(&self) {
        self.stop();
        self.shared.spawn_exit_shutdown();
    }
}

impl MoveBlocker for Rci {
    fn set_moving_disabled(&self, disabled: bool) {
        self.shared.set_moving_disabled(disabled);
    }
}
