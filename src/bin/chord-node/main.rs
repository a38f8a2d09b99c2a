//! Run a Chord node and drive it from stdin.

mod command;
mod crypto;

use std::io::{self, BufRead, Write};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use clap::Parser;
use tracing::Level;

use chord_dht::Dht;

use command::{Command, Outcome};
use crypto::{Secret, SECRET_SIZE};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// IP address to listen on and advertise
    #[arg(short = 'a', long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    address: IpAddr,
    /// Port to listen on, 0 picks a random one
    #[arg(short = 'p', long, default_value_t = 0)]
    port: u16,
    /// IP address of a node to join through
    #[arg(long, requires = "join_port")]
    join_address: Option<IpAddr>,
    /// Port of the node to join through
    #[arg(long, requires = "join_address")]
    join_port: Option<u16>,
    /// Milliseconds between stabilize rounds
    #[arg(long, default_value_t = 500, value_parser = clap::value_parser!(u64).range(1..=60000))]
    stabilize_ms: u64,
    /// Milliseconds between finger table rebuilds
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..=60000))]
    fix_fingers_ms: u64,
    /// Milliseconds between predecessor checks
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..=60000))]
    check_predecessor_ms: u64,
    /// Number of successors to keep
    #[arg(short = 'r', long, default_value_t = chord_dht::rpc::DEFAULT_SUCCESSORS)]
    successors: usize,
    /// Bits of the identifier space, must match the rest of the ring
    #[arg(short = 'm', long, default_value_t = 64)]
    ring_bits: u8,
    /// Human readable name of this node
    #[arg(short = 'i', long)]
    label: Option<String>,
    /// 32 bytes secret used to encrypt stored files
    #[arg(long)]
    secret: Option<String>,
    /// Log at DEBUG level
    #[arg(short, long)]
    verbose: bool,
}

enum Input {
    Line(String),
    Stop,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .init();

    let secret = match cli.secret.as_deref().map(|s| Secret::new(s.as_bytes())).transpose() {
        Ok(secret) => secret,
        Err(error) => {
            eprintln!("{error} (expected {SECRET_SIZE} bytes)");
            return ExitCode::FAILURE;
        }
    };

    let mut builder = Dht::builder();
    builder
        .address(SocketAddr::new(cli.address, cli.port))
        .stabilize_interval(Duration::from_millis(cli.stabilize_ms))
        .fix_fingers_interval(Duration::from_millis(cli.fix_fingers_ms))
        .check_predecessor_interval(Duration::from_millis(cli.check_predecessor_ms))
        .successors(cli.successors)
        .ring_bits(cli.ring_bits);

    if let (Some(ip), Some(port)) = (cli.join_address, cli.join_port) {
        builder.bootstrap(SocketAddr::new(ip, port));
    }
    if let Some(label) = &cli.label {
        builder.label(label);
    }

    let dht = match builder.build() {
        Ok(dht) => dht,
        Err(error) => {
            eprintln!("Failed to start node: {error}");
            return ExitCode::FAILURE;
        }
    };

    println!("Created node {}", dht.info().describe(&dht.node()));

    let (sender, inputs) = flume::unbounded::<Input>();

    let interrupt = sender.clone();
    if let Err(error) = ctrlc::set_handler(move || {
        let _ = interrupt.send(Input::Stop);
    }) {
        eprintln!("Failed to set Ctrl-C handler: {error}");
    }

    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if sender.send(Input::Line(line)).is_err() {
                        return;
                    }
                }
                Err(_) => break,
            }
        }

        let _ = sender.send(Input::Stop);
    });

    prompt();

    while let Ok(Input::Line(line)) = inputs.recv() {
        if line.trim().is_empty() {
            prompt();
            continue;
        }

        let outcome = line
            .parse::<Command>()
            .and_then(|command| command.execute(&dht, secret.as_ref()));

        match outcome {
            Ok(Outcome::Quit) => break,
            Ok(Outcome::Continue) => {}
            Err(error) => println!("{error}"),
        }

        prompt();
    }

    dht.shutdown();
    println!("Quitting!");

    ExitCode::SUCCESS
}

fn prompt() {
    println!("Enter Command: i.e. StoreFile <file name>");
    print!("> ");
    let _ = io::stdout().flush();
}
