mod cli;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use structopt::StructOpt;

use paxos::{Driver, MonotonicClock, NodeId};
use werewolf::Game;
use werewolf_net::{Event, Transport, PEER_TIMEOUT};

use cli::LocalCommand;

#[derive(StructOpt)]
#[structopt(name = "werewolf-node")]
struct Opt {
    /// Unique node ID, distinct across the group with high probability
    #[structopt(short = "i", long = "id")]
    id: NodeId,

    /// Display name shown to other peers
    #[structopt(short = "n", long = "name")]
    name: String,

    /// Address to listen on for peer datagrams
    #[structopt(short = "l", long = "listen")]
    listen: SocketAddr,

    /// Peer addresses to connect to at startup
    #[structopt(short = "p", long = "peer")]
    peers: Vec<SocketAddr>,

    /// Logging level: -v info, -vv debug, -vvv trace
    #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
    verbosity: u8,
}

fn setup_logging(id: NodeId, verbosity: u8) {
    let level = match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!("[{}][{}][{}]: {}", id, record.level(), record.target(), message))
        })
        .level_for("paxos", level)
        .level_for("werewolf", level)
        .level_for("werewolf_net", level)
        .chain(std::io::stdout())
        .apply()
        .expect("[INTERNAL ERROR]: a logger is already installed");
}

fn main() {
    let opt = Opt::from_args();
    setup_logging(opt.id, opt.verbosity);

    let mut transport = Transport::bind(opt.listen, opt.id, opt.name.clone())
        .unwrap_or_else(|error| panic!("failed to bind {}: {}", opt.listen, error));

    // Every configured peer starts out pending until its handshake
    // completes (Welcome) or is definitively refused (Reject); a
    // pending peer is re-sent Hello on a jittered backoff so a lost
    // initial datagram doesn't strand this node connected to nobody.
    let mut pending_handshakes: HashMap<SocketAddr, Instant> = HashMap::new();
    for peer in &opt.peers {
        if let Err(error) = transport.connect(*peer) {
            warn!("failed to reach {}: {}", peer, error);
        }
        let backoff = Duration::from_millis(transport.retry_backoff_millis());
        pending_handshakes.insert(*peer, Instant::now() + backoff);
    }

    let mut driver = Driver::<MonotonicClock>::new(opt.id, opt.peers.len() + 1);
    let mut game = Game::new(std::iter::once(opt.id).collect());

    let (input_tx, input_rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match stdin.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {
                    if input_tx.send(line.clone()).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    info!("listening on {} as {:?} ({})", transport.local_addr().unwrap(), opt.id, opt.name);
    cli::usage();

    loop {
        for event in transport.poll(game.phase() == werewolf::Phase::Lobby) {
            handle_transport_event(event, &mut driver, &mut transport, &mut game, opt.id, &mut pending_handshakes);
        }

        for event in transport.expire_stale_peers(Instant::now(), PEER_TIMEOUT) {
            handle_transport_event(event, &mut driver, &mut transport, &mut game, opt.id, &mut pending_handshakes);
        }

        retry_pending_handshakes(&transport, &mut pending_handshakes);

        while let Ok(line) = input_rx.try_recv() {
            handle_local_command(&line, &mut driver, &mut transport, &mut game, opt.id);
        }

        thread::sleep(Duration::from_millis(20));
    }
}

/// Re-sends Hello to any peer whose handshake deadline has elapsed,
/// rescheduling it with a fresh jittered backoff.
fn retry_pending_handshakes(transport: &Transport, pending: &mut HashMap<SocketAddr, Instant>) {
    let now = Instant::now();
    for (&addr, deadline) in pending.iter_mut() {
        if now < *deadline {
            continue;
        }
        debug!("retrying handshake with {}", addr);
        if let Err(error) = transport.connect(addr) {
            warn!("failed to reach {}: {}", addr, error);
        }
        *deadline = now + Duration::from_millis(transport.retry_backoff_millis());
    }
}

fn handle_transport_event(
    event: Event,
    driver: &mut Driver<MonotonicClock>,
    transport: &mut Transport,
    game: &mut Game,
    local_id: NodeId,
    pending_handshakes: &mut HashMap<SocketAddr, Instant>,
) {
    match event {
        Event::Consensus(bytes) => match driver.receive(&bytes) {
            Ok(outcome) => {
                for bytes in &outcome.outbound {
                    if let Err(error) = transport.broadcast(bytes) {
                        warn!("broadcast failed: {}", error);
                    }
                }
                for applied in outcome.applied {
                    info!("slot {} decided: {}", applied.slot, applied.command);
                    let intents = game.apply(&applied.command);
                    for intent in intents {
                        if intent.issuer == local_id {
                            submit(driver, transport, intent.command.encode());
                        }
                    }
                }
            }
            Err(error) => warn!("failed to process inbound frame: {}", error),
        },
        Event::PeerJoined { node_id, name, addr } => {
            info!("peer {} ({}) joined", node_id, name);
            pending_handshakes.remove(&addr);
            game.add_known_player(node_id);
            driver.set_peer_count(transport.peer_count() + 1);
        }
        Event::PeerRejected { addr, reason } => {
            warn!("handshake with {} rejected: {}", addr, reason);
            pending_handshakes.remove(&addr);
        }
        // Liveness only ever shrinks the quorum denominator; the game's
        // own alive set stays a pure function of the decided log, so it
        // is untouched here (a peer may be gone from the network yet
        // still win or lose the game via commands already in the log).
        Event::PeerDisconnected { node_id } => {
            warn!("peer {} timed out, shrinking quorum", node_id);
            driver.set_peer_count(transport.peer_count() + 1);
        }
        Event::Discovered { addr } => {
            debug!("discovery advertisement from {}", addr);
        }
    }
}

fn handle_local_command(
    line: &str,
    driver: &mut Driver<MonotonicClock>,
    transport: &mut Transport,
    game: &mut Game,
    local_id: NodeId,
) {
    let command = match line.trim().parse::<LocalCommand>() {
        Ok(command) => command,
        Err(()) => {
            println!("[ERROR]: could not parse command, try 'help'");
            return;
        }
    };
    match command {
        LocalCommand::Ready => {
            submit(driver, transport, werewolf::Command::VoteStart(local_id).encode());
        }
        LocalCommand::Vote { target } => match cli::active_kind(game.phase()) {
            Some(kind) => {
                let command = werewolf::Command::Vote { voter: local_id, target, kind };
                submit(driver, transport, command.encode());
            }
            None => println!("[ERROR]: no active vote session"),
        },
        LocalCommand::Reset => game.reset_game(),
        LocalCommand::Help => cli::usage(),
    }
}

fn submit(driver: &mut Driver<MonotonicClock>, transport: &mut Transport, command: String) {
    match driver.submit(command) {
        Ok(outcome) => {
            for bytes in &outcome.outbound {
                if let Err(error) = transport.broadcast(bytes) {
                    warn!("broadcast failed: {}", error);
                }
            }
        }
        Err(error) => println!("[ERROR]: {}", error),
    }
}
