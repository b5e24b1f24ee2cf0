//! Entry point for `gbn`.
//!
//! Parses CLI arguments and dispatches into **simulate**, **send** or
//! **receive** mode.  All protocol work is delegated to library modules;
//! `main.rs` owns only process setup (logging, argument parsing).

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use go_back_n::config::{self, ProtocolConfig};
use go_back_n::connection::{ReceiverEndpoint, SenderEndpoint};
use go_back_n::fault::{FaultConfig, FaultModel};
use go_back_n::packet::{Message, PAYLOAD_LEN};
use go_back_n::rtt::RttSampling;
use go_back_n::simulator::{Simulator, SimulatorConfig};
use go_back_n::socket::Socket;

/// Go-Back-N reliable transfer, simulated or over UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Run a deterministic simulated session and print a summary.
    Simulate {
        /// Messages produced by the application on side A.
        #[arg(short, long, default_value_t = 20)]
        messages: usize,
        /// Probability a packet is lost.
        #[arg(long, default_value_t = 0.0)]
        loss: f64,
        /// Probability a packet is corrupted.
        #[arg(long, default_value_t = 0.0)]
        corrupt: f64,
        /// Minimum one-way delay.
        #[arg(long, default_value_t = 1.0)]
        delay: f64,
        /// Extra uniform one-way delay.
        #[arg(long, default_value_t = 9.0)]
        jitter: f64,
        /// Mean gap between application messages.
        #[arg(long, default_value_t = 50.0)]
        interval: f64,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[command(flatten)]
        protocol: ProtocolArgs,
        /// Abandon the run after this much simulated time.
        #[arg(long, default_value_t = 1_000_000.0)]
        max_time: f64,
    },
    /// Send messages to a receiver and wait until all are acknowledged.
    Send {
        /// Receiver address (e.g. 127.0.0.1:9000).
        #[arg(short, long)]
        peer: SocketAddr,
        /// Local address to bind.
        #[arg(short, long, default_value = "0.0.0.0:0")]
        bind: SocketAddr,
        /// Send this many generated messages.
        #[arg(short, long, conflicts_with = "text")]
        count: Option<usize>,
        /// Send this text, split into 20-byte messages.
        #[arg(short, long)]
        text: Option<String>,
        /// Probability an outgoing packet is dropped.
        #[arg(long, default_value_t = 0.0)]
        loss: f64,
        /// Probability an outgoing packet is corrupted.
        #[arg(long, default_value_t = 0.0)]
        corrupt: f64,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[command(flatten)]
        protocol: ProtocolArgs,
    },
    /// Receive messages and print them in order.
    Receive {
        /// Local address to bind (e.g. 0.0.0.0:9000).
        #[arg(short, long, default_value = "0.0.0.0:9000")]
        bind: SocketAddr,
        /// Stop after this many messages; serve forever if omitted.
        #[arg(short, long)]
        count: Option<usize>,
        /// Keep answering retransmissions this long after the last message.
        #[arg(long, default_value_t = 500)]
        linger_ms: u64,
    },
}

#[derive(clap::Args)]
struct ProtocolArgs {
    /// Sender window size.
    #[arg(short, long, default_value_t = config::WINDOW_SIZE)]
    window: usize,
    /// Initial RTT estimate (simulated time units, or ms over UDP).
    #[arg(long, default_value_t = config::INITIAL_RTT)]
    initial_rtt: f64,
    /// Skip RTT samples from retransmitted packets (Karn's rule).
    #[arg(long)]
    karn: bool,
}

impl ProtocolArgs {
    fn to_config(&self) -> anyhow::Result<ProtocolConfig> {
        let sampling = if self.karn {
            RttSampling::SkipRetransmitted
        } else {
            RttSampling::EveryAck
        };
        let config = ProtocolConfig::default()
            .with_window_size(self.window)
            .with_initial_rtt(self.initial_rtt)
            .with_rtt_sampling(sampling);
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();

    match cli.mode {
        Mode::Simulate {
            messages,
            loss,
            corrupt,
            delay,
            jitter,
            interval,
            seed,
            protocol,
            max_time,
        } => {
            let config = SimulatorConfig {
                messages,
                message_interval: interval,
                delay,
                jitter,
                faults: FaultConfig {
                    loss_rate: loss,
                    corrupt_rate: corrupt,
                    seed,
                },
                max_time,
            };
            let mut sim = Simulator::new(config, &protocol.to_config()?)?;
            let report = sim.run();
            println!("{report}");
            if !report.completed {
                bail!("simulation stopped before every message was delivered");
            }
        }
        Mode::Send {
            peer,
            bind,
            count,
            text,
            loss,
            corrupt,
            seed,
            protocol,
        } => {
            let messages = match (text, count) {
                (Some(text), _) => text_messages(&text),
                (None, count) => generated_messages(count.unwrap_or(20)),
            };
            let faults = FaultModel::new(FaultConfig {
                loss_rate: loss,
                corrupt_rate: corrupt,
                seed,
            })?;
            let socket = Socket::bind(bind)
                .await
                .with_context(|| format!("binding {bind}"))?
                .with_faults(faults);
            log::info!("Sending from {} to {peer}", socket.local_addr);

            let mut endpoint = SenderEndpoint::new(socket, peer, &protocol.to_config()?)?;
            let stats = endpoint.send_all(messages).await?;
            println!(
                "sent {} message(s): transmissions={} retransmissions={} timeouts={} estimated_rtt={:.3}ms",
                stats.accepted,
                stats.transmissions,
                stats.retransmissions,
                stats.timeouts,
                endpoint.sender().estimated_rtt()
            );
        }
        Mode::Receive {
            bind,
            count,
            linger_ms,
        } => {
            let socket = Socket::bind(bind)
                .await
                .with_context(|| format!("binding {bind}"))?;
            log::info!("Receiving on {}", socket.local_addr);

            let mut endpoint =
                ReceiverEndpoint::new(socket).with_linger(Duration::from_millis(linger_ms));
            let delivered = endpoint
                .receive(count, |m| println!("{m}"))
                .await?;
            log::info!("Delivered {delivered} message(s)");
        }
    }

    Ok(())
}

/// `count` messages of one repeated letter each, cycling through the alphabet.
fn generated_messages(count: usize) -> Vec<Message> {
    (0..count).map(|i| Message::filled(b'a' + (i % 26) as u8)).collect()
}

/// Split `text` into payload-sized messages.
fn text_messages(text: &str) -> Vec<Message> {
    text.as_bytes()
        .chunks(PAYLOAD_LEN)
        .map(Message::from_slice)
        .collect()
}
