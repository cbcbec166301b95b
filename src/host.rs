// Контроллер на симулированной плате
// stdin вместо UART: каждый байт строки - команда, строка `!<n>` нажимает кнопку n
// Ответы в stdout, лог в stderr

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use embedded_hal::serial;
use tracing_subscriber::filter::LevelFilter;

use valvectl::coils::CoilDriver;
use valvectl::sim::{Board, SimButton, SimDelay, SimOutput};
use valvectl::storage::FileCell;
use valvectl::{Config, Controller, Timing, Variant};

const POLL_PERIOD: Duration = Duration::from_millis(1);

type HostController = Controller<SimOutput, SimOutput, SimOutput, SimDelay, FileCell, SimButton>;

#[derive(Parser, Debug)]
#[command(version, about = "Valve controller running on a simulated board")]
struct Args {
    /// bistable, tristate-cycle or tristate-select
    #[arg(long, default_value = "bistable")]
    variant: Variant,
    /// File holding the persisted state byte
    #[arg(long, default_value = "valve-state.bin")]
    cell: PathBuf,
    #[arg(long, default_value_t = 200)]
    debounce_ms: u64,
    #[arg(long, default_value_t = 400)]
    guard_ms: u64,
    #[arg(long, default_value_t = 5)]
    settle_ms: u64,
    /// Log only transitions and errors, not every pin write
    #[arg(long)]
    quiet: bool,
}

enum HostInput {
    Byte(u8),
    Press(usize),
}

/// `rx` is filled by the main loop.
struct StdioPort {
    rx: VecDeque<u8>,
    out: io::Stdout,
}

impl serial::Read<u8> for StdioPort {
    type Error = io::Error;

    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        self.rx.pop_front().ok_or(nb::Error::WouldBlock)
    }
}

impl serial::Write<u8> for StdioPort {
    type Error = io::Error;

    fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
        self.out.write_all(&[word]).map_err(nb::Error::Other)
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        self.out.flush().map_err(nb::Error::Other)
    }
}

pub fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.quiet {
            LevelFilter::INFO
        } else {
            LevelFilter::DEBUG
        })
        .with_writer(io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))?;

    let timing = Timing {
        debounce: Duration::from_millis(args.debounce_ms),
        guard: Duration::from_millis(args.guard_ms),
        settle: Duration::from_millis(args.settle_ms),
    };
    let config = Config::new(args.variant, timing)?;

    let board = Board::new();

    let driver = CoilDriver::new(
        board.coil_a_pin(),
        board.coil_b_pin(),
        board.indicator_pin(),
        board.delay(),
        config.timing.settle_ms(),
    )?;
    let buttons: Vec<SimButton> = config
        .variant
        .button_targets()
        .iter()
        .map(|_| SimButton::new())
        .collect();

    let mut controller = Controller::boot(
        config,
        driver,
        FileCell::new(args.cell),
        buttons.clone(),
        Instant::now(),
    )?;

    let (tx, rx) = channel::unbounded();
    thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || stdin_pump(tx))?;

    let mut port = StdioPort {
        rx: VecDeque::new(),
        out: io::stdout(),
    };
    controller.announce(&mut port);

    run_loop(&mut controller, &mut port, &buttons, rx);
    Ok(())
}

fn run_loop(
    controller: &mut HostController,
    port: &mut StdioPort,
    buttons: &[SimButton],
    rx: Receiver<HostInput>,
) {
    loop {
        for button in buttons {
            button.release();
        }

        match rx.try_recv() {
            Ok(HostInput::Byte(b)) => port.rx.push_back(b),
            Ok(HostInput::Press(n)) => match buttons.get(n) {
                Some(button) => button.press(),
                None => log::warn!("no button {n}, this board has {}", buttons.len()),
            },
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                if port.rx.is_empty() {
                    break;
                }
            }
        }

        controller.tick(Instant::now(), port);
        thread::sleep(POLL_PERIOD);
    }
}

fn stdin_pump(tx: Sender<HostInput>) {
    for line in io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                log::error!("stdin: {e}");
                break;
            }
        };

        let inputs: Vec<HostInput> = match line.strip_prefix('!') {
            Some(index) => match index.trim().parse() {
                Ok(n) => vec![HostInput::Press(n)],
                Err(_) => {
                    log::warn!("expected a button number after '!', got \"{index}\"");
                    continue;
                }
            },
            None => line.bytes().map(HostInput::Byte).collect(),
        };

        for input in inputs {
            if tx.send(input).is_err() {
                return;
            }
        }
    }
}
