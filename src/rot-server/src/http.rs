// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! HTTP status endpoint and the WebSocket status feed.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use actix_web::dev::Server;
use actix_web::http::header::{self, HeaderValue};
use actix_web::{get, web, App, Error, HttpRequest, HttpResponse, HttpServer, Responder};
use actix_ws::{Message, MessageStream, Session};
use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

use crate::hub::{AuthorizedClient, Hub};
use crate::protocol::{self, Command, CommandError, ErrorReply};
use crate::throttle::ThrottledTimer;

/// Pacing applied to every feed connection.
#[derive(Debug, Clone, Copy)]
pub struct FeedSettings {
    pub period: Duration,
    pub max_in_flight: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    #[serde(default)]
    client: String,
    highres: Option<String>,
    throttle: Option<String>,
}

/// Query flags count as set when they carry a non-empty value.
fn flag(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

/// First offered WebSocket subprotocol.
fn first_subprotocol(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(header::SEC_WEBSOCKET_PROTOCOL)?
        .to_str()
        .ok()?
        .split(',')
        .map(str::trim)
        .find(|p| !p.is_empty())
        .map(str::to_string)
}

pub fn spawn(
    addr: SocketAddr,
    hub: Arc<Hub>,
    settings: FeedSettings,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let server = match build_server(addr, hub, settings) {
            Ok(server) => server,
            Err(e) => {
                error!("HTTP server error: {:?}", e);
                return;
            }
        };
        let handle = server.handle();
        tokio::spawn(async move {
            while shutdown_rx.changed().await.is_ok() && !*shutdown_rx.borrow() {}
            handle.stop(false).await;
        });
        info!("http status feed listening on {}", addr);
        if let Err(e) = server.await {
            error!("HTTP server error: {:?}", e);
        }
    })
}

fn build_server(addr: SocketAddr, hub: Arc<Hub>, settings: FeedSettings) -> std::io::Result<Server> {
    let hub = web::Data::new(hub);
    let settings = web::Data::new(settings);
    let server = HttpServer::new(move || {
        App::new()
            .app_data(hub.clone())
            .app_data(settings.clone())
            .configure(configure)
    })
    .shutdown_timeout(1)
    .disable_signals()
    .bind(addr)?
    .run();
    Ok(server)
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(status_api).service(status_ws);
}

#[get("/api/status")]
pub async fn status_api(hub: web::Data<Arc<Hub>>) -> impl Responder {
    HttpResponse::Ok().json(hub.snapshot())
}

#[get("/api/ws")]
pub async fn status_ws(
    req: HttpRequest,
    body: web::Payload,
    query: web::Query<FeedQuery>,
    hub: web::Data<Arc<Hub>>,
    settings: web::Data<FeedSettings>,
) -> Result<HttpResponse, Error> {
    let password = hub.match_password(first_subprotocol(&req).as_deref());
    let authorized = password.is_some() || Hub::is_local(req.peer_addr());
    let highres = flag(&query.highres);
    let throttle = flag(&query.throttle);
    let remote = req
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_default();

    let (mut response, session, mut msg_stream) = actix_ws::handle(&req, body)?;
    if let Some(value) = password.and_then(|p| HeaderValue::from_str(&p).ok()) {
        response
            .headers_mut()
            .insert(header::SEC_WEBSOCKET_PROTOCOL, value);
    }

    info!(
        "new client {:?} from {}, authorized: {}, highres: {}, throttle: {}",
        query.client, remote, authorized, highres, throttle
    );
    let client = AuthorizedClient {
        remote_addr: remote,
        name: query.client.clone(),
    };
    if authorized {
        hub.add_client(client.clone());
    }

    let hub = hub.get_ref().clone();
    let timer = Arc::new(ThrottledTimer::new(
        settings.period,
        throttle,
        settings.max_in_flight,
    ));

    actix_web::rt::spawn(async move {
        let writer = actix_web::rt::spawn(feed(
            hub.clone(),
            session.clone(),
            timer.clone(),
            authorized,
            highres,
        ));
        let reader = read_commands(
            hub.clone(),
            session.clone(),
            msg_stream,
            timer,
            authorized,
            client.remote_addr.clone(),
        );
        until_either_ends(reader, writer).await;

        debug!("client {} disconnected", client.remote_addr);
        if authorized {
            hub.remove_client(&client);
        }
        let _ = session.close(None).await;
    });

    Ok(response)
}

/// Run the reader until it or the writer finishes, then stop the writer.
async fn until_either_ends(reader: impl Future<Output = ()>, mut writer: JoinHandle<()>) {
    tokio::select! {
        _ = reader => {}
        _ = &mut writer => {}
    }
    writer.abort();
}

async fn read_commands(
    hub: Arc<Hub>,
    mut session: Session,
    mut msg_stream: MessageStream,
    timer: Arc<ThrottledTimer>,
    authorized: bool,
    remote: String,
) {
    while let Some(Ok(msg)) = msg_stream.recv().await {
        match msg {
            Message::Text(text) => {
                let Some(reply) = handle_text(&hub, &timer, &text, authorized, &remote).await else {
                    continue;
                };
                let text = match serde_json::to_string(&reply) {
                    Ok(text) => text,
                    Err(e) => {
                        error!("encoding reply: {}", e);
                        continue;
                    }
                };
                if session.text(text).await.is_err() {
                    break;
                }
            }
            Message::Ping(bytes) => {
                if session.pong(&bytes).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
}

/// Act on one inbound text frame. Returns the reply owed to the client
/// when decoding or the command failed.
async fn handle_text(
    hub: &Hub,
    timer: &ThrottledTimer,
    text: &str,
    authorized: bool,
    remote: &str,
) -> Option<ErrorReply> {
    let request = match protocol::decode(text) {
        Ok(request) => request,
        Err(reply) => {
            warn!("bad message from {}: {}", remote, reply.error);
            return Some(reply);
        }
    };
    if let Command::Ack(seq) = request.command {
        timer.ack(seq);
        return None;
    }
    match hub.execute(request.command.clone(), authorized).await {
        Ok(()) | Err(CommandError::Unauthorized) => None,
        Err(e) => {
            warn!("command from {} failed: {}", remote, e);
            Some(request.reply(&e))
        }
    }
}

/// Outbound half of a feed connection.
trait FeedSink {
    /// Deliver one frame. False once the peer is gone.
    async fn send_text(&mut self, text: String) -> bool;
}

impl FeedSink for Session {
    async fn send_text(&mut self, text: String) -> bool {
        self.text(text).await.is_ok()
    }
}

/// Push a snapshot on every hub change, numbering frames per connection.
/// Changes that land while paced are coalesced into the next frame.
async fn feed<S: FeedSink>(
    hub: Arc<Hub>,
    mut sink: S,
    timer: Arc<ThrottledTimer>,
    authorized: bool,
    highres: bool,
) {
    let mut generation = hub.subscribe();
    let mut sent: u64 = 0;
    loop {
        generation.borrow_and_update();
        let mut status = hub.snapshot();
        status.sequence_number = sent;
        status.authorized = authorized;
        sent += 1;
        let text = match serde_json::to_string(&status) {
            Ok(text) => text,
            Err(e) => {
                error!("encoding status: {}", e);
                return;
            }
        };
        if !sink.send_text(text).await {
            return;
        }
        if !highres {
            timer.wait(sent).await;
        }
        if generation.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use actix_web::test;
    use rot_core::RotatorStatus;
    use tokio::sync::mpsc;
    use tokio::task::{spawn_local, LocalSet};
    use tokio::time::{sleep, timeout};

    use super::*;
    use crate::hub::testing::hub;

    impl FeedSink for mpsc::UnboundedSender<String> {
        async fn send_text(&mut self, text: String) -> bool {
            self.send(text).is_ok()
        }
    }

    fn frame_seq(frame: &str) -> u64 {
        let json: serde_json::Value = serde_json::from_str(frame).expect("frame json");
        json["SequenceNumber"].as_u64().expect("sequence number")
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<u64> {
        let mut seqs = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            seqs.push(frame_seq(&frame));
        }
        seqs
    }

    fn moved_to(azimuth: f64) -> RotatorStatus {
        RotatorStatus {
            az_pos: azimuth,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn highres_feed_numbers_frames_without_gaps() {
        let (hub, _) = hub();
        let timer = Arc::new(ThrottledTimer::new(Duration::from_millis(25), false, 5));
        let (tx, mut rx) = mpsc::unbounded_channel();
        LocalSet::new()
            .run_until(async move {
                let writer = spawn_local(feed(hub.clone(), tx, timer, true, true));
                let callback = hub.rotator_callback();

                let first = rx.recv().await.expect("first frame");
                let json: serde_json::Value = serde_json::from_str(&first).expect("json");
                assert_eq!(json["Authorized"], true);
                let mut seqs = vec![frame_seq(&first)];
                for step in 1..=5 {
                    callback(moved_to(step as f64));
                    let frame = timeout(Duration::from_secs(1), rx.recv())
                        .await
                        .expect("frame in time")
                        .expect("frame");
                    seqs.push(frame_seq(&frame));
                }
                assert_eq!(seqs, (0..=5).collect::<Vec<u64>>());
                writer.abort();
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn throttled_feed_holds_at_in_flight_bound() {
        let (hub, _) = hub();
        let timer = Arc::new(ThrottledTimer::new(Duration::from_millis(25), true, 2));
        let (tx, mut rx) = mpsc::unbounded_channel();
        LocalSet::new()
            .run_until(async move {
                let writer = spawn_local(feed(hub.clone(), tx, timer.clone(), false, false));
                let callback = hub.rotator_callback();

                for step in 0..20 {
                    callback(moved_to(step as f64));
                    sleep(Duration::from_millis(50)).await;
                }
                assert_eq!(drain(&mut rx), vec![0, 1]);

                timer.ack(2);
                for step in 0..8 {
                    callback(moved_to(step as f64));
                    sleep(Duration::from_millis(50)).await;
                }
                assert_eq!(drain(&mut rx), vec![2, 3]);
                writer.abort();
            })
            .await;
    }

    #[tokio::test]
    async fn closed_feed_ends_the_connection() {
        let (hub, _) = hub();
        let timer = Arc::new(ThrottledTimer::new(Duration::from_millis(25), false, 5));
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        LocalSet::new()
            .run_until(async move {
                let writer = spawn_local(feed(hub, tx, timer, true, true));
                timeout(
                    Duration::from_secs(1),
                    until_either_ends(std::future::pending(), writer),
                )
                .await
                .expect("reader cancelled when the feed ends");
            })
            .await;
    }

    #[tokio::test]
    async fn finished_reader_stops_the_feed() {
        let (alive, mut gone) = mpsc::channel::<()>(1);
        LocalSet::new()
            .run_until(async move {
                let writer = spawn_local(async move {
                    let _alive = alive;
                    std::future::pending::<()>().await
                });
                until_either_ends(async {}, writer).await;
                assert!(gone.recv().await.is_none());
            })
            .await;
    }

    #[tokio::test]
    async fn failed_commands_echo_their_sequence_number() {
        let (hub, _) = hub();
        let timer = ThrottledTimer::new(Duration::from_millis(25), true, 5);

        let reply = handle_text(&hub, &timer, r#"{"command":"track","body":99,"seq":17}"#, true, "peer")
            .await
            .expect("error reply");
        assert_eq!(reply.seq, 17);

        let reply = handle_text(&hub, &timer, "{", true, "peer")
            .await
            .expect("error reply");
        assert_eq!(reply.seq, 0);

        assert!(handle_text(&hub, &timer, r#"{"command":"stop","seq":3}"#, false, "peer")
            .await
            .is_none());
        assert!(handle_text(&hub, &timer, r#"{"command":"ack","seq":9}"#, false, "peer")
            .await
            .is_none());
        assert_eq!(timer.acked(), 9);
    }

    #[actix_web::test]
    async fn status_endpoint_returns_snapshot() {
        let (hub, _) = hub();
        hub.manual(|r| r.set_azimuth_position(12.5))
            .await
            .expect("manual");
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(hub))
                .service(status_api),
        )
        .await;
        let req = test::TestRequest::get().uri("/api/status").to_request();
        let json: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(json["AzPos"], 12.5);
        assert_eq!(json["Bodies"][0], "NONE");
        assert_eq!(json["Authorized"], false);
    }

    #[::core::prelude::v1::test]
    fn query_flags() {
        assert!(flag(&Some("1".to_string())));
        assert!(!flag(&Some(String::new())));
        assert!(!flag(&None));
    }

    #[::core::prelude::v1::test]
    fn subprotocol_takes_first_offer() {
        let req = test::TestRequest::default()
            .insert_header((header::SEC_WEBSOCKET_PROTOCOL, "secret, other"))
            .to_http_request();
        assert_eq!(first_subprotocol(&req), Some("secret".to_string()));
        let req = test::TestRequest::default().to_http_request();
        assert_eq!(first_subprotocol(&req), None);
    }
}
