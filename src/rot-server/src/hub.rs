// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Status hub: owns the rotator and peripherals, merges their status into
//! one snapshot and serializes every outbound device command.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use rot_core::{normalize, Rotator, RotatorError, RotatorStatus, StatusCallback};
use rot_ephem::{default_catalog, Body, Ephemeris, Observer};
use rot_modbus::{AmplidyneCallback, AmplidyneStatus, Cps20, Sequencer, SequencerCallback, SequencerStatus};

use crate::protocol::{Command, CommandError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthorizedClient {
    pub remote_addr: String,
    pub name: String,
}

/// Everything the status feed publishes, serialized flat with PascalCase keys.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AggregateStatus {
    /// Per-connection frame counter, filled in by the sender.
    pub sequence_number: u64,
    #[serde(flatten)]
    pub rotator: RotatorStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_move_time: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub last_move: Option<Instant>,
    pub sequencer: SequencerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amplidynes: Option<AmplidyneStatus>,
    pub command_tracking_body: usize,
    pub bodies: Vec<String>,
    /// Whether the receiving connection may issue commands.
    pub authorized: bool,
    pub authorized_clients: Vec<AuthorizedClient>,
    pub latitude: f64,
    pub longitude: f64,
}

/// Whether the amplidynes should be switched off: hardware present and
/// commanded on, nothing tracked, and no command for `spindown`.
pub fn spin_down_due(status: &AggregateStatus, spindown: Duration) -> bool {
    let Some(amplidynes) = status.amplidynes else {
        return false;
    };
    status.command_tracking_body == 0
        && amplidynes.commanded_on()
        && status.last_move.map_or(true, |at| at.elapsed() > spindown)
}

#[derive(Debug, Clone)]
pub struct HubOptions {
    pub observer: Observer,
    pub passwords: Vec<String>,
    pub spindown: Duration,
    pub tracking_interval: Duration,
    pub acceptable_shutdowns: HashSet<u8>,
}

pub struct Hub {
    options: HubOptions,
    ephemeris: Box<dyn Ephemeris>,
    status: RwLock<AggregateStatus>,
    generation: watch::Sender<u64>,
    /// Serializes outbound device commands.
    commands: Mutex<()>,
    catalog: RwLock<Vec<Body>>,
    rotator: OnceLock<Box<dyn Rotator>>,
    sequencer: OnceLock<Sequencer>,
    amplidynes: OnceLock<Cps20>,
}

impl Hub {
    pub fn new(options: HubOptions, ephemeris: Box<dyn Ephemeris>) -> Arc<Self> {
        let catalog = default_catalog();
        let status = AggregateStatus {
            bodies: body_names(&catalog),
            latitude: options.observer.latitude,
            longitude: options.observer.longitude,
            ..Default::default()
        };
        let (generation, _) = watch::channel(0);
        Arc::new(Self {
            options,
            ephemeris,
            status: RwLock::new(status),
            generation,
            commands: Mutex::new(()),
            catalog: RwLock::new(catalog),
            rotator: OnceLock::new(),
            sequencer: OnceLock::new(),
            amplidynes: OnceLock::new(),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, AggregateStatus> {
        self.status.read().expect("hub status lock poisoned")
    }

    /// Mutate the aggregate and wake every subscriber.
    fn update(&self, apply: impl FnOnce(&mut AggregateStatus)) {
        {
            let mut status = self.status.write().expect("hub status lock poisoned");
            apply(&mut status);
        }
        self.generation.send_modify(|generation| *generation += 1);
    }

    /// Deep copy of the current aggregate.
    pub fn snapshot(&self) -> AggregateStatus {
        self.read().clone()
    }

    /// Generation counter bumped on every change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    pub fn rotator(&self) -> Option<&dyn Rotator> {
        self.rotator.get().map(|r| r.as_ref())
    }

    pub fn tracking_body(&self) -> usize {
        self.read().command_tracking_body
    }

    /// Callback handed to the rotator backend.
    pub fn rotator_callback(self: &Arc<Self>) -> StatusCallback {
        let hub = Arc::downgrade(self);
        Arc::new(move |status: RotatorStatus| {
            if let Some(hub) = hub.upgrade() {
                hub.update(|s| s.rotator = status);
            }
        })
    }

    pub fn sequencer_callback(self: &Arc<Self>) -> SequencerCallback {
        let hub = Arc::downgrade(self);
        Arc::new(move |status: SequencerStatus| {
            if let Some(hub) = hub.upgrade() {
                hub.update(|s| s.sequencer = status);
            }
        })
    }

    /// Amplidyne status also drives the move interlock: the rotator is
    /// blocked whenever the amplidynes are not running.
    pub fn amplidyne_callback(self: &Arc<Self>) -> AmplidyneCallback {
        let hub = Arc::downgrade(self);
        Arc::new(move |status: AmplidyneStatus| {
            let Some(hub) = hub.upgrade() else {
                return;
            };
            if let Some(blocker) = hub.rotator().and_then(|r| r.as_move_blocker()) {
                blocker.set_moving_disabled(!status.amplidynes_active);
            }
            hub.update(|s| s.amplidynes = Some(status));
        })
    }

    pub fn attach_rotator(&self, rotator: Box<dyn Rotator>) -> Result<(), CommandError> {
        if let Some(control) = rotator.as_shutdown_control() {
            control.set_acceptable_shutdowns(self.options.acceptable_shutdowns.clone());
        }
        let info = rotator.info().clone();
        self.rotator
            .set(rotator)
            .map_err(|_| CommandError::InvalidArgument("rotator already attached".into()))?;
        info!("hub: rotator {} {} attached", info.manufacturer, info.model);
        Ok(())
    }

    pub fn attach_sequencer(&self, sequencer: Sequencer) -> Result<(), CommandError> {
        self.sequencer
            .set(sequencer)
            .map_err(|_| CommandError::InvalidArgument("sequencer already attached".into()))
    }

    pub fn attach_amplidynes(&self, cps20: Cps20) -> Result<(), CommandError> {
        self.amplidynes
            .set(cps20)
            .map_err(|_| CommandError::InvalidArgument("amplidynes already attached".into()))?;
        self.update(|s| s.amplidynes = Some(AmplidyneStatus::default()));
        Ok(())
    }

    /// Password carried in the WebSocket subprotocol, if it is one of ours.
    pub fn match_password(&self, subprotocol: Option<&str>) -> Option<String> {
        let offered = subprotocol?;
        self.options
            .passwords
            .iter()
            .find(|p| p.as_str() == offered)
            .cloned()
    }

    pub fn is_local(peer: Option<SocketAddr>) -> bool {
        peer.is_some_and(|addr| addr.ip().is_loopback())
    }

    pub fn add_client(&self, client: AuthorizedClient) {
        self.update(|s| s.authorized_clients.push(client));
    }

    pub fn remove_client(&self, client: &AuthorizedClient) {
        self.update(|s| {
            if let Some(index) = s.authorized_clients.iter().position(|c| c == client) {
                s.authorized_clients.remove(index);
            }
        });
    }

    fn set_tracking(&self, body: usize) {
        self.update(|s| s.command_tracking_body = body);
    }

    async fn set_amplidynes_enabled(&self, enabled: bool) {
        let Some(cps20) = self.amplidynes.get() else {
            return;
        };
        if enabled {
            let (now, wall) = (Instant::now(), Utc::now());
            self.update(|s| {
                s.last_move = Some(now);
                s.last_move_time = Some(wall);
            });
        } else if let Some(blocker) = self.rotator().and_then(|r| r.as_move_blocker()) {
            blocker.set_moving_disabled(true);
        }
        if let Err(e) = cps20.set_amplidynes_enabled(enabled).await {
            warn!("hub: switching amplidynes {}: {}", if enabled { "on" } else { "off" }, e);
        }
    }

    /// Run `apply` on the rotator with tracking cancelled, under the command
    /// lock.
    pub async fn manual<F>(&self, apply: F) -> Result<(), CommandError>
    where
        F: FnOnce(&dyn Rotator),
    {
        let _guard = self.commands.lock().await;
        let rotator = self.rotator().ok_or(CommandError::NotConfigured("rotator"))?;
        self.set_tracking(0);
        apply(rotator);
        Ok(())
    }

    /// Execute a client command. Every authorized command spins the
    /// amplidynes up first.
    pub async fn execute(&self, command: Command, authorized: bool) -> Result<(), CommandError> {
        if let Command::Ack(_) = command {
            return Ok(());
        }
        if !authorized {
            warn!("hub: unauthorized connection tried to {:?}", command);
            return Err(CommandError::Unauthorized);
        }
        debug!("hub: executing {:?}", command);
        let _guard = self.commands.lock().await;
        self.set_amplidynes_enabled(true).await;
        if command.is_manual_move() {
            self.set_tracking(0);
        }
        match command {
            Command::Ack(_) => {}
            Command::Track(body) => {
                let known = self.catalog.read().expect("catalog lock poisoned").len();
                if body > known {
                    return Err(CommandError::InvalidArgument(format!(
                        "body {} out of range 0..={}",
                        body, known
                    )));
                }
                self.set_tracking(body);
            }
            Command::Write { register, value } => {
                let writer = self
                    .require_rotator()?
                    .as_register_writer()
                    .ok_or(RotatorError::NotSupported("register writes"))?;
                writer.write(register, &[value])?;
            }
            Command::SetAzimuthPosition(angle) => {
                self.require_rotator()?.set_azimuth_position(normalize(angle))
            }
            Command::SetElevationPosition(angle) => {
                self.require_rotator()?.set_elevation_position(normalize(angle))
            }
            Command::SetAzimuthVelocity(velocity) => {
                self.require_rotator()?.set_azimuth_velocity(velocity)
            }
            Command::SetElevationVelocity(velocity) => {
                self.require_rotator()?.set_elevation_velocity(velocity)
            }
            Command::Stop => self.require_rotator()?.stop(),
            Command::StopHard => {
                let rotator = self.require_rotator()?;
                rotator.set_azimuth_velocity(0.0);
                rotator.set_elevation_velocity(0.0);
            }
            Command::ExitShutdown => self
                .require_rotator()?
                .as_shutdown_control()
                .ok_or(RotatorError::NotSupported("shutdown control"))?
                .exit_shutdown(),
            Command::SetAzimuthOffset(offset) => self
                .require_rotator()?
                .as_offsetter()
                .ok_or(RotatorError::NotSupported("offsets"))?
                .set_azimuth_offset(offset),
            Command::SetElevationOffset(offset) => self
                .require_rotator()?
                .as_offsetter()
                .ok_or(RotatorError::NotSupported("offsets"))?
                .set_elevation_offset(offset),
            Command::AddStar(star) => {
                let body = Body::from(star);
                info!("hub: adding {}", body.name());
                let names = {
                    let mut catalog = self.catalog.write().expect("catalog lock poisoned");
                    catalog.push(body);
                    body_names(&catalog)
                };
                self.update(|s| s.bodies = names);
            }
            Command::SetBandTx { band, enabled } => {
                self.require_sequencer()?.set_band_tx(band, enabled).await?
            }
            Command::SetBandRx { band, enabled } => {
                let sequencer = self.require_sequencer()?;
                sequencer.set_band_tx(band, false).await?;
                sequencer.set_band_rx(band, enabled).await?;
            }
        }
        Ok(())
    }

    fn require_rotator(&self) -> Result<&dyn Rotator, CommandError> {
        self.rotator().ok_or(CommandError::NotConfigured("rotator"))
    }

    fn require_sequencer(&self) -> Result<&Sequencer, CommandError> {
        self.sequencer
            .get()
            .ok_or(CommandError::NotConfigured("sequencer"))
    }

    /// One tracking tick: apply the spin-down policy, then point at the
    /// tracked body.
    pub async fn track_once(&self, now: DateTime<Utc>) {
        let _guard = self.commands.lock().await;
        let (body, spin_down) = {
            let status = self.read();
            (
                status.command_tracking_body,
                self.amplidynes.get().is_some() && spin_down_due(&status, self.options.spindown),
            )
        };
        if spin_down {
            info!("hub: no movement for {:?}, spinning down amplidynes", self.options.spindown);
            self.set_amplidynes_enabled(false).await;
        }
        if body == 0 {
            return;
        }
        let target = {
            let catalog = self.catalog.read().expect("catalog lock poisoned");
            catalog.get(body - 1).cloned()
        };
        let (Some(target), Some(rotator)) = (target, self.rotator()) else {
            return;
        };
        let position = self
            .ephemeris
            .topocentric(&target, &self.options.observer, now);
        debug!(
            "hub: tracking {} at az {:.3} el {:.3}",
            target.name(),
            position.azimuth,
            position.elevation
        );
        rotator.set_azimuth_position(position.azimuth);
        rotator.set_elevation_position(position.elevation);
    }

    pub fn spawn_tracking(self: &Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        let hub = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(hub.options.tracking_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => hub.track_once(Utc::now()).await,
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }
}

fn body_names(catalog: &[Body]) -> Vec<String> {
    std::iter::once("NONE".to_string())
        .chain(catalog.iter().map(Body::name))
        .collect()
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use rot_core::rotator::{MoveBlocker, RotatorAccessMethod, RotatorInfo};
    use rot_ephem::Horizontal;

    use super::*;

    /// Rotator that records every call and echoes positions back.
    pub struct Recording {
        info: RotatorInfo,
        pub calls: Arc<Mutex<Vec<String>>>,
        callback: StatusCallback,
        status: Mutex<RotatorStatus>,
    }

    impl Recording {
        pub fn new(callback: StatusCallback) -> Self {
            Self {
                info: RotatorInfo {
                    manufacturer: "Test".to_string(),
                    model: "recording".to_string(),
                    access: RotatorAccessMethod::Simulated,
                },
                calls: Arc::new(Mutex::new(Vec::new())),
                callback,
                status: Mutex::new(RotatorStatus::default()),
            }
        }

        fn push(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn echo(&self, apply: impl FnOnce(&mut RotatorStatus)) {
            let mut status = self.status.lock().unwrap();
            apply(&mut status);
            (self.callback)(status.clone());
        }
    }

    impl Rotator for Recording {
        fn info(&self) -> &RotatorInfo {
            &self.info
        }
        fn stop(&self) {
            self.push("stop".to_string());
        }
        fn set_azimuth_position(&self, angle: f64) {
            self.push(format!("az {angle}"));
            self.echo(|s| s.az_pos = angle);
        }
        fn set_elevation_position(&self, angle: f64) {
            self.push(format!("el {angle}"));
            self.echo(|s| s.el_pos = angle);
        }
        fn set_azimuth_velocity(&self, velocity: f64) {
            self.push(format!("azv {velocity}"));
        }
        fn set_elevation_velocity(&self, velocity: f64) {
            self.push(format!("elv {velocity}"));
        }
        fn as_move_blocker(&self) -> Option<&dyn MoveBlocker> {
            Some(self)
        }
    }

    impl MoveBlocker for Recording {
        fn set_moving_disabled(&self, disabled: bool) {
            self.push(format!("disabled {disabled}"));
        }
    }

    /// Ephemeris that puts every body at the same spot.
    pub struct Fixed(pub Horizontal);

    impl Ephemeris for Fixed {
        fn topocentric(&self, _body: &Body, _observer: &Observer, _time: DateTime<Utc>) -> Horizontal {
            self.0
        }
    }

    pub fn options() -> HubOptions {
        HubOptions {
            observer: Observer {
                latitude: 42.360326,
                longitude: -71.089324,
                height: 100.0,
                temperature: 15.0,
                pressure: 1010.0,
            },
            passwords: vec!["secret".to_string()],
            spindown: Duration::from_secs(600),
            tracking_interval: Duration::from_millis(250),
            acceptable_shutdowns: HashSet::from([11]),
        }
    }

    /// Hub with a recording rotator attached.
    pub fn hub() -> (Arc<Hub>, Arc<Mutex<Vec<String>>>) {
        let hub = Hub::new(
            options(),
            Box::new(Fixed(Horizontal {
                azimuth: 123.0,
                elevation: 45.0,
            })),
        );
        let rotator = Recording::new(hub.rotator_callback());
        let calls = rotator.calls.clone();
        hub.attach_rotator(Box::new(rotator)).expect("attach");
        (hub, calls)
    }
}

#[cfg(test)]
mod tests {
    use rot_modbus::BandStatus;

    use super::testing::*;
    use super::*;
    use crate::protocol::StarMessage;

    fn calls(calls: &Arc<std::sync::Mutex<Vec<String>>>) -> Vec<String> {
        calls.lock().unwrap().clone()
    }

    #[test]
    fn catalog_starts_with_none() {
        let (hub, _) = hub();
        let status = hub.snapshot();
        assert_eq!(status.bodies.len(), 14);
        assert_eq!(status.bodies[0], "NONE");
        assert_eq!(status.bodies[1], "Sun");
        assert_eq!(status.bodies[13], "Cygnus A");
        assert_eq!(status.latitude, 42.360326);
    }

    #[tokio::test]
    async fn rotator_status_bumps_generation() {
        let (hub, _) = hub();
        let mut generation = hub.subscribe();
        generation.borrow_and_update();
        hub.manual(|r| r.set_azimuth_position(42.0))
            .await
            .expect("manual");
        assert!(generation.has_changed().expect("open"));
        assert_eq!(hub.snapshot().rotator.az_pos, 42.0);
    }

    #[tokio::test]
    async fn manual_command_cancels_tracking() {
        let (hub, recorded) = hub();
        hub.execute(Command::Track(3), true).await.expect("track");
        assert_eq!(hub.tracking_body(), 3);

        hub.execute(Command::SetAzimuthPosition(-10.0), true)
            .await
            .expect("move");
        assert_eq!(hub.tracking_body(), 0);
        assert_eq!(calls(&recorded), vec!["az 350"]);
    }

    #[tokio::test]
    async fn offsets_do_not_cancel_tracking() {
        let (hub, _) = hub();
        hub.execute(Command::Track(2), true).await.expect("track");
        let err = hub
            .execute(Command::SetAzimuthOffset(1.0), true)
            .await
            .expect_err("no offsetter");
        assert!(matches!(err, CommandError::Device(_)));
        assert_eq!(hub.tracking_body(), 2);
    }

    #[tokio::test]
    async fn unauthorized_commands_are_rejected() {
        let (hub, recorded) = hub();
        assert_eq!(
            hub.execute(Command::Stop, false).await,
            Err(CommandError::Unauthorized)
        );
        assert_eq!(hub.execute(Command::Ack(5), false).await, Ok(()));
        assert!(calls(&recorded).is_empty());
    }

    #[tokio::test]
    async fn stop_hard_zeroes_both_axes() {
        let (hub, recorded) = hub();
        hub.execute(Command::StopHard, true).await.expect("stop");
        assert_eq!(calls(&recorded), vec!["azv 0", "elv 0"]);
    }

    #[tokio::test]
    async fn missing_capabilities_and_peripherals_are_errors() {
        let (hub, _) = hub();
        assert!(hub
            .execute(Command::Write { register: 1, value: 2 }, true)
            .await
            .is_err());
        assert!(hub.execute(Command::ExitShutdown, true).await.is_err());
        assert_eq!(
            hub.execute(Command::SetBandTx { band: 0, enabled: true }, true)
                .await,
            Err(CommandError::NotConfigured("sequencer"))
        );
        assert!(matches!(
            hub.execute(Command::Track(99), true).await,
            Err(CommandError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn add_star_extends_catalog() {
        let (hub, recorded) = hub();
        let star = StarMessage {
            starname: "Deneb".to_string(),
            catalog: "HR".to_string(),
            starnumber: 7924,
            ra: 20.69,
            dec: 45.28,
            ..Default::default()
        };
        hub.execute(Command::AddStar(star), true).await.expect("add");
        let bodies = hub.snapshot().bodies;
        assert_eq!(bodies.len(), 15);
        assert_eq!(bodies[14], "Deneb");

        hub.execute(Command::Track(14), true).await.expect("track");
        hub.track_once(Utc::now()).await;
        assert_eq!(calls(&recorded), vec!["az 123", "el 45"]);
    }

    #[tokio::test(start_paused = true)]
    async fn tracking_loop_points_at_body() {
        let (hub, recorded) = hub();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = hub.spawn_tracking(shutdown_rx);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(calls(&recorded).is_empty());

        hub.execute(Command::Track(1), true).await.expect("track");
        tokio::time::sleep(Duration::from_millis(300)).await;
        let seen = calls(&recorded);
        assert!(seen.starts_with(&["az 123".to_string(), "el 45".to_string()]));
        let status = hub.snapshot();
        assert_eq!(status.rotator.az_pos, 123.0);
        assert_eq!(status.rotator.el_pos, 45.0);

        shutdown_tx.send(true).expect("shutdown");
        handle.await.expect("join");
    }

    #[test]
    fn amplidyne_status_drives_interlock() {
        let (hub, recorded) = hub();
        let callback = hub.amplidyne_callback();
        callback(AmplidyneStatus::default());
        callback(AmplidyneStatus {
            amplidynes_active: true,
            ..Default::default()
        });
        assert_eq!(calls(&recorded), vec!["disabled true", "disabled false"]);
        assert_eq!(
            hub.snapshot().amplidynes.map(|a| a.amplidynes_active),
            Some(true)
        );
    }

    #[test]
    fn sequencer_status_is_replaced() {
        let (hub, _) = hub();
        let callback = hub.sequencer_callback();
        callback(SequencerStatus {
            error: true,
            bands: vec![BandStatus::default(); 3],
        });
        callback(SequencerStatus {
            error: false,
            bands: vec![BandStatus::default()],
        });
        let status = hub.snapshot().sequencer;
        assert!(!status.error);
        assert_eq!(status.bands.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn spin_down_policy() {
        let spindown = Duration::from_secs(600);
        let mut status = AggregateStatus::default();
        assert!(!spin_down_due(&status, spindown));

        status.amplidynes = Some(AmplidyneStatus {
            command_az_enabled: true,
            ..Default::default()
        });
        assert!(spin_down_due(&status, spindown));

        status.last_move = Some(Instant::now());
        assert!(!spin_down_due(&status, spindown));
        tokio::time::advance(Duration::from_secs(601)).await;
        assert!(spin_down_due(&status, spindown));

        status.command_tracking_body = 1;
        assert!(!spin_down_due(&status, spindown));

        status.command_tracking_body = 0;
        status.amplidynes = Some(AmplidyneStatus::default());
        assert!(!spin_down_due(&status, spindown));
    }

    #[test]
    fn authorization_by_password_or_loopback() {
        let (hub, _) = hub();
        assert_eq!(hub.match_password(Some("secret")), Some("secret".to_string()));
        assert_eq!(hub.match_password(Some("guess")), None);
        assert_eq!(hub.match_password(None), None);
        assert!(Hub::is_local("127.0.0.1:5000".parse().ok()));
        assert!(Hub::is_local("[::1]:5000".parse().ok()));
        assert!(!Hub::is_local("192.0.2.1:5000".parse().ok()));
        assert!(!Hub::is_local(None));
    }

    #[test]
    fn authorized_clients_are_listed() {
        let (hub, _) = hub();
        let alice = AuthorizedClient {
            remote_addr: "127.0.0.1:5000".to_string(),
            name: "console".to_string(),
        };
        hub.add_client(alice.clone());
        assert_eq!(hub.snapshot().authorized_clients, vec![alice.clone()]);
        hub.remove_client(&alice);
        assert!(hub.snapshot().authorized_clients.is_empty());
    }

    #[test]
    fn aggregate_serializes_flat() {
        let (hub, _) = hub();
        let json = serde_json::to_value(hub.snapshot()).expect("encode");
        for key in ["SequenceNumber", "AzPos", "CommandAzFlags", "Sequencer", "Bodies", "AuthorizedClients", "Latitude"] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
        assert!(json.get("Amplidynes").is_none());
        assert!(json.get("LastMove").is_none());
    }
}
