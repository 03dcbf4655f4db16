//! voxroom loopback session

mod args;

use std::f64::consts::TAU;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use voxroom_adapter::{
    ChatroomNetwork, LoopbackHub, LoopbackTransport, NetworkSettings, SettingsError,
    TransportEvent,
};
use voxroom_common::{AudioSegment, ChatroomEvent, ChatroomEventKind, PeerId, SendTarget};

use args::Args;

/// Room every peer of the session meets in
const ROOM_NAME: &str = "loopback";

/// Test tone frequency
const TONE_HZ: f64 = 440.0;

/// Test tone peak amplitude
const TONE_AMPLITUDE: f64 = 0.25;

/// How long to wait for a room request to be answered
const ROOM_TIMEOUT: Duration = Duration::from_secs(2);

/// Grace period for in-flight segments after the last send
const SETTLE_TIME: Duration = Duration::from_millis(100);

/// One participant of the session
struct Peer {
    network: Arc<ChatroomNetwork>,
    transport: Arc<LoopbackTransport>,
    pump: JoinHandle<()>,
    received: Arc<AtomicU64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let settings = match load_settings(&args) {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("Failed to load settings: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&args, settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Load settings from `--config`, or from the platform default location
fn load_settings(args: &Args) -> Result<NetworkSettings, SettingsError> {
    match &args.config {
        Some(path) => NetworkSettings::load(path),
        None => {
            let settings = NetworkSettings::load_or_default();
            settings.validate()?;
            Ok(settings)
        }
    }
}

async fn run(args: &Args, settings: NetworkSettings) -> Result<(), String> {
    let hub = LoopbackHub::with_loss(args.loss);
    let peers: Vec<Peer> = (0..args.peers)
        .map(|_| connect_peer(&hub, settings.clone()))
        .collect::<Result<_, _>>()?;

    let Some((host, guests)) = peers.split_first() else {
        return Err("no peers to run".to_string());
    };

    open_room(&host.network, true).await?;
    for guest in guests {
        open_room(&guest.network, false).await?;
    }

    let host_id = host
        .network
        .own_id()
        .ok_or_else(|| "host is not in the room".to_string())?;
    log::info!(
        "Streaming {} segment(s) of {} ms from peer {} to {} guest(s)",
        args.segments,
        args.frame_ms,
        host_id,
        guests.len()
    );

    let mut ticker = tokio::time::interval(Duration::from_millis(u64::from(args.frame_ms)));
    for index in 0..args.segments {
        ticker.tick().await;
        let segment = tone_segment(index, args.sample_rate, args.channels, args.frame_ms);
        if let Err(e) = host.network.send_audio_segment(SendTarget::Others, &segment) {
            return Err(format!("failed to send segment {}: {}", index, e));
        }
    }

    tokio::time::sleep(SETTLE_TIME).await;
    report(args, host_id, guests, &hub);

    // Disposing leaves the room
    for peer in peers {
        peer.network.dispose();
        peer.transport.disconnect();
        if let Err(e) = peer.pump.await {
            log::warn!("Event pump ended abnormally: {}", e);
        }
    }

    Ok(())
}

/// Connect one participant to the hub and start pumping its callbacks
fn connect_peer(hub: &LoopbackHub, settings: NetworkSettings) -> Result<Peer, String> {
    let (transport, rx) = hub.connect();
    let transport = Arc::new(transport);
    let network = Arc::new(ChatroomNetwork::new(settings, transport.clone()));
    network
        .start()
        .map_err(|e| format!("failed to start peer {}: {}", transport.peer_id(), e))?;

    let received = Arc::new(AtomicU64::new(0));
    let counter = received.clone();
    network.subscribe(ChatroomEventKind::AudioReceived, move |_| {
        counter.fetch_add(1, Ordering::Relaxed);
    });

    let pump = spawn_pump(network.clone(), rx);
    Ok(Peer {
        network,
        transport,
        pump,
        received,
    })
}

/// Feed transport callbacks into the adapter until the hub drops the queue
fn spawn_pump(
    network: Arc<ChatroomNetwork>,
    mut rx: mpsc::UnboundedReceiver<TransportEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Err(e) = network.handle(event) {
                log::debug!("Transport event rejected: {}", e);
            }
        }
    })
}

/// Host or join the session room and wait for the outcome
async fn open_room(network: &ChatroomNetwork, host: bool) -> Result<(), String> {
    let (listener, mut rx) = network.subscribe_channel();

    let request = if host {
        network.host_chatroom(ROOM_NAME)
    } else {
        network.join_chatroom(ROOM_NAME)
    };
    let outcome = match request {
        Ok(()) => tokio::time::timeout(ROOM_TIMEOUT, room_outcome(&mut rx))
            .await
            .unwrap_or_else(|_| Err("timed out waiting for the room".to_string())),
        Err(e) => Err(e.to_string()),
    };

    network.unsubscribe(listener);
    outcome.map_err(|reason| {
        format!(
            "failed to {} '{}': {}",
            if host { "host" } else { "join" },
            ROOM_NAME,
            reason
        )
    })
}

async fn room_outcome(rx: &mut mpsc::UnboundedReceiver<ChatroomEvent>) -> Result<(), String> {
    while let Some(event) = rx.recv().await {
        match event {
            ChatroomEvent::Created { .. } | ChatroomEvent::Joined { .. } => return Ok(()),
            ChatroomEvent::CreationFailed { reason } | ChatroomEvent::JoinFailed { reason } => {
                return Err(reason);
            }
            _ => {}
        }
    }
    Err("event channel closed".to_string())
}

/// Generate segment `index` of a continuous sine tone
fn tone_segment(index: u32, sample_rate: u32, channels: u16, frame_ms: u32) -> AudioSegment {
    let frames = u64::from(sample_rate) * u64::from(frame_ms) / 1000;
    let first = u64::from(index) * frames;
    let rate = f64::from(sample_rate);

    let mut samples = Vec::with_capacity(frames as usize * usize::from(channels));
    for frame in first..first + frames {
        let value = TONE_AMPLITUDE * (TAU * TONE_HZ * frame as f64 / rate).sin();
        samples.extend(std::iter::repeat_n(value as f32, usize::from(channels)));
    }

    // Argument ranges keep these within i32
    AudioSegment::new(
        index as i32,
        sample_rate as i32,
        i32::from(channels),
        samples,
    )
}

fn report(args: &Args, host_id: PeerId, guests: &[Peer], hub: &LoopbackHub) {
    println!(
        "Sent {} segment(s) to {} guest(s), loss {:.1}%",
        args.segments,
        guests.len(),
        args.loss * 100.0
    );
    for guest in guests {
        let id = guest.transport.peer_id();
        let received = guest.received.load(Ordering::Relaxed);
        match guest.network.sequence_stats(host_id) {
            Some(stats) => println!(
                "  peer {}: received {}/{}, {} missing, {} late",
                id,
                received,
                args.segments,
                stats.missing(),
                stats.late()
            ),
            None => println!("  peer {}: received {}/{}", id, received, args.segments),
        }
    }
    println!("Dropped by loopback: {}", hub.dropped());
}
