// Две катушки клапана и индикатор "под током".
// Перед включением катушки противоположная выключается вместе с индикатором,
// затем пауза settle_ms: обе катушки никогда не включены одновременно.

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::digital::v2::OutputPin;

use crate::valve_state::ValveState;

pub struct CoilDriver<A, B, L, D> {
    coil_a: A,
    coil_b: B,
    indicator: L,
    delay: D,
    settle_ms: u32,
    energized: Option<ValveState>,
}

impl<E, A, B, L, D> CoilDriver<A, B, L, D>
where
    A: OutputPin<Error = E>,
    B: OutputPin<Error = E>,
    L: OutputPin<Error = E>,
    D: DelayMs<u32>,
{
    pub fn new(
        mut coil_a: A,
        mut coil_b: B,
        mut indicator: L,
        delay: D,
        settle_ms: u32,
    ) -> Result<Self, E> {
        coil_a.set_low()?;
        coil_b.set_low()?;
        indicator.set_low()?;

        Ok(Self {
            coil_a,
            coil_b,
            indicator,
            delay,
            settle_ms,
            energized: None,
        })
    }

    pub fn apply(&mut self, state: ValveState) -> Result<(), E> {
        // unknown until every write of this call succeeded
        let was = self.energized.take();

        match state {
            ValveState::A => {
                self.coil_b.set_low()?;
                if was != Some(ValveState::A) {
                    self.indicator.set_low()?;
                }
                self.delay.delay_ms(self.settle_ms);
                self.coil_a.set_high()?;
                self.indicator.set_high()?;
            }
            ValveState::B => {
                self.coil_a.set_low()?;
                if was != Some(ValveState::B) {
                    self.indicator.set_low()?;
                }
                self.delay.delay_ms(self.settle_ms);
                self.coil_b.set_high()?;
                self.indicator.set_high()?;
            }
            ValveState::Center => {
                self.coil_a.set_low()?;
                self.coil_b.set_low()?;
                self.indicator.set_low()?;
                return Ok(());
            }
        }

        self.energized = Some(state);
        Ok(())
    }
}
