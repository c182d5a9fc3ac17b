#![forbid(unsafe_code)]

//! `opi-ctl`: command-line OPI client for `opi-server`.
//!
//! Sends one protocol command over TCP and prints every reply line.
//! Useful for bench-testing a device without a perimetry host.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::Duration;

use clap::{Parser, Subcommand};
use opi_server::models::stimulus::StimulusHeader;
use opi_server::protocol::command::{CLOSE, GET_METRICS, PRESENT, SET_BACKGROUND};
use opi_server::protocol::OK;

#[derive(Debug, Parser)]
#[command(
    name = "opi-ctl",
    about = "Command-line client for opi-server",
    version,
    long_about = None
)]
struct Cli {
    /// Server address as `host:port`.
    #[arg(long, default_value = "127.0.0.1:50008")]
    addr: String,

    /// Seconds to wait for each reply line; 0 waits forever. A presentation
    /// result is given the response window `w` on top of this.
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the nine device metrics.
    Metrics,

    /// Replace the background (18 tokens).
    Background {
        /// bgEye bgLum bgCol×4 fixEye fixType fixCx fixCy fixSx fixSy fixTheta fixLum fixCol×4
        #[arg(num_args = 18, allow_hyphen_values = true)]
        tokens: Vec<String>,
    },

    /// Present a stimulus and print the outcome.
    Present {
        /// Global parameters: "nSteps d w".
        #[arg(long)]
        global: String,

        /// One step line of 13 tokens; repeat once per step.
        #[arg(long = "step")]
        steps: Vec<String>,
    },

    /// Reset the background and end the session.
    Close,

    /// Send an arbitrary line and print the replies that arrive.
    Raw {
        /// Line to send.
        line: String,

        /// Number of reply lines to wait for.
        #[arg(long, default_value_t = 1)]
        replies: usize,
    },
}

/// Blocking line client for one OPI session.
struct Client {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    timeout: Option<Duration>,
}

impl Client {
    fn connect(addr: &str, timeout: Option<Duration>) -> std::io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(timeout)?;
        stream.set_nodelay(true)?;
        let writer = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(stream),
            writer,
            timeout,
        })
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> std::io::Result<()> {
        self.reader.get_ref().set_read_timeout(timeout)
    }

    fn send(&mut self, line: &str) -> std::io::Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }

    fn read_reply(&mut self) -> std::io::Result<String> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "server closed the connection",
            ));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_owned())
    }

    fn read_replies(&mut self, count: usize) -> std::io::Result<Vec<String>> {
        (0..count).map(|_| self.read_reply()).collect()
    }
}

fn main() {
    let args = Cli::parse();
    let timeout = (args.timeout > 0).then(|| Duration::from_secs(args.timeout));

    let result = Client::connect(&args.addr, timeout)
        .and_then(|mut client| run(&mut client, &args.command));

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("opi-ctl: {err}");
            eprintln!("Is opi-server listening on '{}'?", args.addr);
            std::process::exit(1);
        }
    }
}

/// Run one command; returns whether the server accepted it.
fn run(client: &mut Client, command: &Command) -> std::io::Result<bool> {
    match command {
        Command::Metrics => {
            client.send(GET_METRICS)?;
            let labels = [
                "width", "height", "xdpi", "ydpi", "fovLeft", "fovRight", "fovUp", "fovDown",
                "light",
            ];
            for (label, value) in labels.iter().zip(client.read_replies(labels.len())?) {
                println!("{label}: {value}");
            }
            Ok(true)
        }
        Command::Background { tokens } => {
            client.send(&format!("{SET_BACKGROUND} {}", tokens.join(" ")))?;
            Ok(report(&client.read_reply()?))
        }
        Command::Present { global, steps } => present(client, global, steps),
        Command::Close => {
            client.send(CLOSE)?;
            Ok(report(&client.read_reply()?))
        }
        Command::Raw { line, replies } => {
            client.send(line)?;
            for reply in client.read_replies(*replies)? {
                println!("{reply}");
            }
            Ok(true)
        }
    }
}

fn present(client: &mut Client, global: &str, steps: &[String]) -> std::io::Result<bool> {
    client.send(&format!("{PRESENT} {global}"))?;
    if !report(&client.read_reply()?) {
        return Ok(false);
    }
    for step in steps {
        client.send(step)?;
        if !report(&client.read_reply()?) {
            return Ok(false);
        }
    }

    client.set_read_timeout(result_timeout(client.timeout, global))?;
    let [error, seen, latency]: [String; 3] = client
        .read_replies(3)?
        .try_into()
        .map_err(|_| std::io::Error::other("incomplete presentation result"))?;
    if !error.is_empty() {
        eprintln!("Error: {error}");
        return Ok(false);
    }
    println!("seen: {seen}");
    println!("latency_ms: {latency}");
    Ok(true)
}

/// Read timeout for a presentation result: the reply timeout plus the
/// response window `w`, since the server answers only once the trial ends.
fn result_timeout(reply_timeout: Option<Duration>, global: &str) -> Option<Duration> {
    let tokens: Vec<&str> = global.split_whitespace().collect();
    match StimulusHeader::parse(&tokens) {
        Ok(header) => reply_timeout.map(|t| t.saturating_add(header.window)),
        Err(_) => reply_timeout,
    }
}

/// Print a single-line reply; `OK` counts as success.
fn report(reply: &str) -> bool {
    if reply == OK {
        println!("{reply}");
        true
    } else {
        eprintln!("Error: {reply}");
        false
    }
}
