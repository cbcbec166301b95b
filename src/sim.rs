// Плата на хосте: те же embedded-hal трейты, что и на ESP32
// Общий журнал событий, отслеживает одновременное включение катушек

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::digital::v2::{InputPin, OutputPin};
use embedded_hal::serial;

use crate::storage::StateCell;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoardEvent {
    CoilA(bool),
    CoilB(bool),
    Indicator(bool),
    Settle(u32),
    Persist(u8),
}

#[derive(Debug, Default)]
struct BoardState {
    coil_a: bool,
    coil_b: bool,
    indicator: bool,
    overlap_seen: bool,
    events: Vec<BoardEvent>,
}

impl BoardState {
    fn record(&mut self, event: BoardEvent) {
        match event {
            BoardEvent::CoilA(on) => self.coil_a = on,
            BoardEvent::CoilB(on) => self.coil_b = on,
            BoardEvent::Indicator(on) => self.indicator = on,
            BoardEvent::Settle(_) | BoardEvent::Persist(_) => {}
        }
        if self.coil_a && self.coil_b {
            self.overlap_seen = true;
        }
        log::debug!("board: {event:?}");
        self.events.push(event);
    }
}

#[derive(Clone, Debug, Default)]
pub struct Board(Rc<RefCell<BoardState>>);

#[derive(Clone, Copy)]
enum Line {
    CoilA,
    CoilB,
    Indicator,
}

pub struct SimOutput {
    board: Board,
    line: Line,
}

pub struct SimDelay {
    board: Board,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn coil_a_pin(&self) -> SimOutput {
        self.pin(Line::CoilA)
    }

    pub fn coil_b_pin(&self) -> SimOutput {
        self.pin(Line::CoilB)
    }

    pub fn indicator_pin(&self) -> SimOutput {
        self.pin(Line::Indicator)
    }

    fn pin(&self, line: Line) -> SimOutput {
        SimOutput {
            board: self.clone(),
            line,
        }
    }

    pub fn delay(&self) -> SimDelay {
        SimDelay {
            board: self.clone(),
        }
    }

    /// Byte cell whose writes land in this board's event log.
    pub fn cell(&self, value: Option<u8>) -> MemoryCell {
        MemoryCell {
            value,
            writes: 0,
            board: Some(self.clone()),
        }
    }

    pub fn coil_a(&self) -> bool {
        self.0.borrow().coil_a
    }

    pub fn coil_b(&self) -> bool {
        self.0.borrow().coil_b
    }

    pub fn indicator(&self) -> bool {
        self.0.borrow().indicator
    }

    pub fn overlap_seen(&self) -> bool {
        self.0.borrow().overlap_seen
    }

    pub fn events(&self) -> Vec<BoardEvent> {
        self.0.borrow().events.clone()
    }

    pub fn clear_events(&self) {
        self.0.borrow_mut().events.clear();
    }

    fn record(&self, event: BoardEvent) {
        self.0.borrow_mut().record(event);
    }
}

impl OutputPin for SimOutput {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(true);
        Ok(())
    }
}

impl SimOutput {
    fn set(&self, on: bool) {
        let event = match self.line {
            Line::CoilA => BoardEvent::CoilA(on),
            Line::CoilB => BoardEvent::CoilB(on),
            Line::Indicator => BoardEvent::Indicator(on),
        };
        self.board.record(event);
    }
}

impl DelayMs<u32> for SimDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.board.record(BoardEvent::Settle(ms));
    }
}

/// Pressed reads low.
#[derive(Clone, Default)]
pub struct SimButton(Rc<Cell<bool>>);

impl SimButton {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&self) {
        self.0.set(true);
    }

    pub fn release(&self) {
        self.0.set(false);
    }
}

impl InputPin for SimButton {
    type Error = Infallible;

    fn is_high(&self) -> Result<bool, Self::Error> {
        Ok(!self.0.get())
    }

    fn is_low(&self) -> Result<bool, Self::Error> {
        Ok(self.0.get())
    }
}

#[derive(Default)]
pub struct SimSerial {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
}

impl SimSerial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes);
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Drains every complete line written so far.
    pub fn take_lines(&mut self) -> Vec<String> {
        let end = match self.tx.iter().rposition(|b| *b == b'\n') {
            Some(i) => i + 1,
            None => return vec![],
        };
        let text: Vec<u8> = self.tx.drain(..end).collect();
        String::from_utf8_lossy(&text)
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl serial::Read<u8> for SimSerial {
    type Error = Infallible;

    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        self.rx.pop_front().ok_or(nb::Error::WouldBlock)
    }
}

impl serial::Write<u8> for SimSerial {
    type Error = Infallible;

    fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
        self.tx.push(word);
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryCell {
    value: Option<u8>,
    writes: usize,
    board: Option<Board>,
}

impl MemoryCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(value: Option<u8>) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }

    pub fn value(&self) -> Option<u8> {
        self.value
    }

    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl StateCell for MemoryCell {
    type Error = Infallible;

    fn read(&mut self) -> Result<Option<u8>, Self::Error> {
        Ok(self.value)
    }

    fn write(&mut self, value: u8) -> Result<(), Self::Error> {
        self.value = Some(value);
        self.writes += 1;
        if let Some(board) = &self.board {
            board.record(BoardEvent::Persist(value));
        }
        Ok(())
    }
}
