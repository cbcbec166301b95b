// Владеет текущим состоянием клапана
// Принимает нажатия кнопок и команды с последовательного порта
// Сначала сохраняет состояние, потом переключает катушки

use std::fmt::Debug;
use std::time::Instant;

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::digital::v2::{InputPin, OutputPin};
use embedded_hal::serial;

use crate::buttons::{GuardWindow, InputChannel};
use crate::coils::CoilDriver;
use crate::config::{Config, ConfigError};
use crate::protocol::{self, Command, Response};
use crate::storage::{PersistentStore, StateCell};
use crate::valve_state::ValveState;

pub struct Controller<A, B, L, D, C, P> {
    config: Config,
    driver: CoilDriver<A, B, L, D>,
    store: PersistentStore<C>,
    buttons: Vec<InputChannel<P>>,
    guard: GuardWindow,
    state: ValveState,
}

impl<E, A, B, L, D, C, P> Controller<A, B, L, D, C, P>
where
    A: OutputPin<Error = E>,
    B: OutputPin<Error = E>,
    L: OutputPin<Error = E>,
    D: DelayMs<u32>,
    E: Debug,
    C: StateCell,
    P: InputPin,
    P::Error: Debug,
{
    /// Restores the persisted state and drives the coils to it.
    ///
    /// `button_pins` are matched in order with the variant's button targets.
    pub fn boot(
        config: Config,
        driver: CoilDriver<A, B, L, D>,
        cell: C,
        button_pins: Vec<P>,
        now: Instant,
    ) -> Result<Self, ConfigError> {
        let targets = config.variant.button_targets();
        if button_pins.len() != targets.len() {
            return Err(ConfigError::ButtonCount {
                expected: targets.len(),
                actual: button_pins.len(),
            });
        }
        let buttons = button_pins
            .into_iter()
            .zip(targets.iter())
            .map(|(pin, target)| InputChannel::new(pin, *target))
            .collect();

        let mut store = PersistentStore::new(cell, config.variant.clone());
        let state = match store.load() {
            Some(state) => {
                log::info!("restored state {state}");
                state
            }
            None => {
                let state = config.variant.default_state();
                log::info!("no stored state, starting at default {state}");
                state
            }
        };

        let mut controller = Self {
            config,
            driver,
            store,
            buttons,
            guard: GuardWindow::new(),
            state,
        };
        controller.drive(state);
        controller.guard.open(now, controller.config.timing.guard);

        Ok(controller)
    }

    pub fn state(&self) -> ValveState {
        self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn guard(&self) -> &GuardWindow {
        &self.guard
    }

    pub fn store(&self) -> &PersistentStore<C> {
        &self.store
    }

    /// Tells the host the device is up. Call once, before the first tick.
    pub fn announce<S, SE>(&mut self, port: &mut S)
    where
        S: serial::Write<u8, Error = SE>,
        SE: Debug,
    {
        Self::send(port, Response::Ready);
    }

    /// One pass of the control loop: buttons first, then at most one
    /// command byte.
    ///
    /// A button transition in this pass leaves the pending byte in the port
    /// for the next pass, so a single pass never commits twice.
    pub fn tick<S, SE>(&mut self, now: Instant, port: &mut S)
    where
        S: serial::Read<u8, Error = SE> + serial::Write<u8, Error = SE>,
        SE: Debug,
    {
        if let Some(state) = self.poll_buttons(now) {
            Self::send(port, Response::Button(state));
            return;
        }

        match protocol::read_byte(port) {
            Ok(Some(byte)) => {
                let response = self.handle_byte(byte, now);
                Self::send(port, response);
            }
            Ok(None) => {}
            Err(e) => log::warn!("serial read failed: {e:?}"),
        }
    }

    /// Samples every button; commits the first accepted press.
    ///
    /// The guard window opened by that commit masks the remaining buttons
    /// for the rest of the pass.
    pub fn poll_buttons(&mut self, now: Instant) -> Option<ValveState> {
        let debounce = self.config.timing.debounce;
        let mut committed = None;

        for i in 0..self.buttons.len() {
            if let Some(target) = self.buttons[i].poll(now, &self.guard, debounce) {
                let next = self.config.variant.resolve(target, self.state);
                log::info!("button {i} ({target:?}) -> {next}");
                self.commit(next, now);
                committed = Some(next);
            }
        }

        committed
    }

    /// Executes one command byte and returns the reply line.
    pub fn handle_byte(&mut self, byte: u8, now: Instant) -> Response {
        match Command::decode(byte, &self.config.variant) {
            Ok(Command::Query) => Response::State(self.state),
            Ok(Command::Select(state)) => {
                log::info!("host -> {state}");
                self.commit(state, now);
                Response::Ok(self.state)
            }
            Err(e) => {
                log::debug!("{e}");
                Response::Error(e)
            }
        }
    }

    fn commit(&mut self, next: ValveState, now: Instant) {
        if next != self.state {
            self.store.save(next);
        }
        self.drive(next);
        self.state = next;
        self.guard.open(now, self.config.timing.guard);
    }

    fn drive(&mut self, state: ValveState) {
        if let Err(e) = self.driver.apply(state) {
            log::error!("failed to drive coils to {state}: {e:?}");
        }
    }

    fn send<S, SE>(port: &mut S, response: Response)
    where
        S: serial::Write<u8, Error = SE>,
        SE: Debug,
    {
        if let Err(e) = protocol::write_response(port, &response) {
            log::warn!("failed to send {response}: {e:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::Timing;
    use crate::sim::{Board, BoardEvent, MemoryCell, SimButton, SimDelay, SimOutput, SimSerial};
    use crate::variant::Variant;

    type TestController = Controller<SimOutput, SimOutput, SimOutput, SimDelay, MemoryCell, SimButton>;

    fn boot(variant: Variant, stored: Option<u8>, t0: Instant) -> (TestController, Board, Vec<SimButton>) {
        let board = Board::new();
        let config = Config::new(variant, Timing::default()).unwrap();
        let driver = CoilDriver::new(
            board.coil_a_pin(),
            board.coil_b_pin(),
            board.indicator_pin(),
            board.delay(),
            config.timing.settle_ms(),
        )
        .unwrap();
        let buttons: Vec<SimButton> = config
            .variant
            .button_targets()
            .iter()
            .map(|_| SimButton::new())
            .collect();
        let controller =
            Controller::boot(config, driver, board.cell(stored), buttons.clone(), t0).unwrap();
        (controller, board, buttons)
    }

    fn ms(t0: Instant, ms: u64) -> Instant {
        t0 + Duration::from_millis(ms)
    }

    #[rstest::rstest]
    #[test]
    #[case(ValveState::A, Variant::bistable(), None)]
    #[case(ValveState::A, Variant::bistable(), Some(b'C'))]
    #[case(ValveState::B, Variant::bistable(), Some(b'B'))]
    #[case(ValveState::Center, Variant::tristate_select(), Some(0xff))]
    #[case(ValveState::Center, Variant::tristate_cycle(), Some(b'x'))]
    #[case(ValveState::A, Variant::tristate_cycle(), Some(b'A'))]
    fn boot_state(#[case] expect: ValveState, #[case] variant: Variant, #[case] stored: Option<u8>) {
        let (controller, _board, _buttons) = boot(variant, stored, Instant::now());
        assert_eq!(expect, controller.state());
    }

    #[test]
    fn boot_drives_outputs_without_writing_the_cell() {
        let (controller, board, _buttons) = boot(Variant::tristate_select(), Some(b'B'), Instant::now());
        assert!(board.coil_b());
        assert!(!board.coil_a());
        assert!(board.indicator());
        assert_eq!(0, controller.store().cell().writes());
    }

    #[test]
    fn wrong_button_count_is_rejected() {
        let board = Board::new();
        let config = Config::new(Variant::tristate_select(), Timing::default()).unwrap();
        let driver = CoilDriver::new(
            board.coil_a_pin(),
            board.coil_b_pin(),
            board.indicator_pin(),
            board.delay(),
            5,
        )
        .unwrap();
        let result = Controller::boot(
            config,
            driver,
            MemoryCell::new(),
            vec![SimButton::new()],
            Instant::now(),
        );
        assert!(matches!(
            result,
            Err(ConfigError::ButtonCount {
                expected: 3,
                actual: 1
            })
        ));
    }

    #[test]
    fn persists_before_driving_and_reopens_guard() {
        let t0 = Instant::now();
        let (mut controller, board, _buttons) = boot(Variant::bistable(), None, t0);
        board.clear_events();

        assert_eq!(Response::Ok(ValveState::B), controller.handle_byte(b'B', ms(t0, 1000)));

        assert_eq!(Some(b'B'), controller.store().cell().value());
        assert_eq!(
            vec![
                BoardEvent::Persist(b'B'),
                BoardEvent::CoilA(false),
                BoardEvent::Indicator(false),
                BoardEvent::Settle(5),
                BoardEvent::CoilB(true),
                BoardEvent::Indicator(true)
            ],
            board.events()
        );
        assert_eq!(Some(ms(t0, 1400)), controller.guard().deadline());
    }

    #[test]
    fn button_commit_persists_before_first_coil_write() {
        let t0 = Instant::now();
        let (mut controller, board, buttons) = boot(Variant::tristate_select(), Some(b'A'), t0);
        board.clear_events();

        buttons[1].press();
        assert_eq!(Some(ValveState::Center), controller.poll_buttons(ms(t0, 1000)));

        let events = board.events();
        let persisted = events.iter().position(|e| *e == BoardEvent::Persist(b'C'));
        let first_coil = events
            .iter()
            .position(|e| matches!(e, BoardEvent::CoilA(_) | BoardEvent::CoilB(_)));
        assert_eq!(Some(0), persisted);
        assert!(persisted < first_coil, "{events:?}");
    }

    #[test]
    fn repeated_command_is_idempotent() {
        let t0 = Instant::now();
        let (mut controller, board, _buttons) = boot(Variant::bistable(), Some(b'A'), t0);
        board.clear_events();

        assert_eq!(Response::Ok(ValveState::A), controller.handle_byte(b'A', ms(t0, 1000)));

        assert_eq!(0, controller.store().cell().writes());
        assert!(board.coil_a());
        assert!(!board.events().contains(&BoardEvent::CoilA(false)));
    }

    #[test]
    fn unknown_byte_changes_nothing() {
        let t0 = Instant::now();
        let (mut controller, board, _buttons) = boot(Variant::bistable(), Some(b'B'), t0);
        board.clear_events();

        let response = controller.handle_byte(b'C', ms(t0, 1000));

        assert_eq!("ERR:UNKNOWN", response.to_string());
        assert_eq!(ValveState::B, controller.state());
        assert!(board.events().is_empty());
    }

    #[test]
    fn button_press_defers_pending_byte() {
        let t0 = Instant::now();
        let (mut controller, _board, buttons) = boot(Variant::bistable(), None, t0);
        let mut port = SimSerial::new();
        port.send(b"?");

        buttons[1].press();
        controller.tick(ms(t0, 1000), &mut port);
        assert_eq!(vec!["BTN:B"], port.take_lines());
        assert_eq!(1, port.pending());

        buttons[1].release();
        controller.tick(ms(t0, 1001), &mut port);
        assert_eq!(vec!["STATE:B"], port.take_lines());
    }

    #[test]
    fn simultaneous_presses_commit_once() {
        let t0 = Instant::now();
        let (mut controller, board, buttons) = boot(Variant::tristate_select(), None, t0);
        for button in &buttons {
            button.press();
        }

        assert_eq!(Some(ValveState::A), controller.poll_buttons(ms(t0, 1000)));
        assert_eq!(ValveState::A, controller.state());
        assert!(!board.overlap_seen());
    }
}
