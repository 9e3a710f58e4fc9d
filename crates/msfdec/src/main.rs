use std::io;
use std::io::Read;

use anyhow::{anyhow, Context};
use clap::Parser;
use log::{info, warn, LevelFilter};

use msftime::{MsfReceiverBuilder, SimulatedRadio};

mod cli;

use cli::{Args, CliError};

// checksum failure is distinguishable from usage/io errors
const EXIT_CHECKSUM_FAILED: i32 = 2;

fn main() {
    match msfdec() {
        Ok(()) => {}
        Err(cli_error) => cli_error.exit(),
    }
}

fn msfdec() -> Result<(), CliError> {
    // Parse options and start logging
    let args = Args::try_parse()?;
    log_setup(&args);

    // read the whole tape up front; replay is virtual-time anyway
    let stdin = io::stdin();
    let stdin_handle = stdin.lock();
    let mut inbuf = file_setup(&args, stdin_handle)?;
    let tape = read_tape(&mut inbuf)?;
    info!(
        "tape: {} samples at {} Hz ({:.1} s)",
        tape.len(),
        args.rate,
        tape.len() as f64 / args.rate as f64
    );

    // replay through the pipeline against the virtual clock
    let radio = SimulatedRadio::with_rate(tape, args.rate);
    let mut rx = MsfReceiverBuilder::new()
        .with_sample_period_ms(args.sample_period)
        .with_vote_threshold_pct(args.vote_threshold)
        .build(radio.clone(), radio.carrier());

    let time = rx.acquire_once();

    if time.checksum_passed {
        if !args.quiet {
            println!("{}", time);
        }
        Ok(())
    } else {
        warn!("decoded {} but the checksum failed", time);
        Err(CliError::new(
            anyhow!("checksum failed: tape did not decode to a valid timestamp"),
            EXIT_CHECKSUM_FAILED,
        ))
    }
}

fn log_setup(args: &Args) {
    if args.quiet {
        // no logging
        return;
    } else if std::env::var_os("RUST_LOG").is_none() {
        // parameter controls
        let log_filter = match args.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        pretty_env_logger::formatted_builder()
            .filter_module("msftime", log_filter)
            .filter_module("msfdec", log_filter)
            .init();
    } else {
        // environment controls
        pretty_env_logger::init();
    }
}

fn file_setup<'stdin>(
    args: &Args,
    stdin: std::io::StdinLock<'stdin>,
) -> Result<Box<dyn io::BufRead + 'stdin>, anyhow::Error> {
    if args.input_is_stdin() {
        info!("MSF decoder reading standard input");
        if !is_terminal(&std::io::stdin()) {
            Ok(Box::new(io::BufReader::new(stdin)))
        } else {
            Err(anyhow!(
                "cowardly refusing to read a carrier tape from a terminal.

Pipe in an ASCII '0'/'1' tape, or record one from your receiver
module and pass it with --file."
            ))
        }
    } else {
        info!("MSF decoder reading file: \"{}\"", &args.file);
        Ok(Box::new(io::BufReader::new(
            std::fs::File::open(&args.file)
                .with_context(|| format!("Unable to open --file \"{}\"", args.file))?,
        )))
    }
}

// Parse an ASCII tape: '1' carrier, '0' silence, whitespace ignored
fn read_tape<R>(input: &mut R) -> Result<Vec<bool>, anyhow::Error>
where
    R: io::BufRead,
{
    let mut tape = Vec::new();
    for (position, byte) in input.by_ref().bytes().enumerate() {
        let byte = byte.context("tape read failed")?;
        match byte {
            b'0' => tape.push(false),
            b'1' => tape.push(true),
            b' ' | b'\t' | b'\r' | b'\n' => {}
            other => {
                return Err(anyhow!(
                    "bad tape byte 0x{:02x} at offset {}: expected '0', '1', or whitespace",
                    other,
                    position
                ))
            }
        }
    }

    if tape.is_empty() {
        return Err(anyhow!("tape is empty"));
    }
    Ok(tape)
}

#[cfg(not(target_os = "windows"))]
fn is_terminal<S>(stream: &S) -> bool
where
    S: std::os::fd::AsRawFd,
{
    terminal_size::terminal_size_using_fd(stream.as_raw_fd()).is_some()
}

#[cfg(target_os = "windows")]
fn is_terminal<S>(stream: &S) -> bool
where
    S: std::os::windows::io::AsRawHandle,
{
    terminal_size::terminal_size_using_handle(stream.as_raw_handle()).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_tape() {
        let mut input = io::Cursor::new("10 1\n01\t1");
        let tape = read_tape(&mut input).expect("valid tape");
        assert_eq!(vec![true, false, true, false, true, true], tape);
    }

    #[test]
    fn test_read_tape_rejects_garbage() {
        let mut input = io::Cursor::new("101x01");
        assert!(read_tape(&mut input).is_err());
    }

    #[test]
    fn test_read_tape_rejects_empty() {
        let mut input = io::Cursor::new("  \n ");
        assert!(read_tape(&mut input).is_err());
    }

    #[test]
    fn test_decode_synthetic_tape() {
        // a synthesized broadcast decodes end to end
        let mut tape = vec![true; 2000];
        for _ in 0..3 {
            tape.extend(msftime::waveform::encode_minute(24, 3, 17, 6, 14, 5));
        }

        let radio = SimulatedRadio::new(tape);
        let mut rx = MsfReceiverBuilder::new().build(radio.clone(), radio.carrier());
        let time = rx.acquire_once();

        assert!(time.checksum_passed);
        assert_eq!("2024-03-17 14:05:00", time.to_string());
    }
}
