// Кнопки с подтяжкой к питанию, нажатие = низкий уровень
// Фронт отпущена -> нажата принимается не чаще debounce
// После каждого переключения катушек кнопки игнорируются до конца guard-окна

use std::fmt::Debug;
use std::time::{Duration, Instant};

use embedded_hal::digital::v2::InputPin;

use crate::variant::ButtonTarget;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GuardWindow {
    deadline: Option<Instant>,
}

impl GuardWindow {
    pub const fn new() -> Self {
        Self { deadline: None }
    }

    pub fn open(&mut self, now: Instant, length: Duration) {
        self.deadline = Some(now + length);
    }

    pub fn is_active(&self, now: Instant) -> bool {
        matches!(self.deadline, Some(deadline) if now < deadline)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

pub struct InputChannel<P> {
    pin: P,
    target: ButtonTarget,
    previous_pressed: bool,
    last_accepted: Option<Instant>,
}

impl<P> InputChannel<P>
where
    P: InputPin,
    P::Error: Debug,
{
    pub fn new(pin: P, target: ButtonTarget) -> Self {
        Self {
            pin,
            target,
            previous_pressed: false,
            last_accepted: None,
        }
    }

    pub fn target(&self) -> ButtonTarget {
        self.target
    }

    /// Samples the button once; returns the target of an accepted press.
    pub fn poll(
        &mut self,
        now: Instant,
        guard: &GuardWindow,
        debounce: Duration,
    ) -> Option<ButtonTarget> {
        let pressed = match self.pin.is_low() {
            Ok(pressed) => pressed,
            Err(e) => {
                log::warn!("failed to sample {:?} button: {e:?}", self.target);
                return None;
            }
        };
        let was_pressed = std::mem::replace(&mut self.previous_pressed, pressed);

        if guard.is_active(now) {
            if pressed && !was_pressed {
                log::debug!("{:?} press inside guard window ignored", self.target);
            }
            return None;
        }

        if !pressed || was_pressed {
            return None;
        }

        if let Some(last) = self.last_accepted {
            if now.saturating_duration_since(last) <= debounce {
                log::debug!("{:?} press bounced", self.target);
                return None;
            }
        }

        self.last_accepted = Some(now);
        Some(self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimButton;
    use crate::valve_state::ValveState;

    const DEBOUNCE: Duration = Duration::from_millis(200);
    const TARGET: ButtonTarget = ButtonTarget::Select(ValveState::B);

    fn ms(t0: Instant, ms: u64) -> Instant {
        t0 + Duration::from_millis(ms)
    }

    /// Presses at `at`, samples, releases and samples again 10 ms later.
    fn click(
        channel: &mut InputChannel<SimButton>,
        button: &SimButton,
        guard: &GuardWindow,
        at: Instant,
    ) -> Option<ButtonTarget> {
        button.press();
        let result = channel.poll(at, guard, DEBOUNCE);
        button.release();
        channel.poll(at + Duration::from_millis(10), guard, DEBOUNCE);
        result
    }

    #[test]
    fn guard_window_bounds() {
        let t0 = Instant::now();
        let mut guard = GuardWindow::new();
        assert!(!guard.is_active(t0));

        guard.open(t0, Duration::from_millis(400));
        assert!(guard.is_active(t0));
        assert!(guard.is_active(ms(t0, 399)));
        assert!(!guard.is_active(ms(t0, 400)));
    }

    #[test]
    fn press_is_accepted_once() {
        let t0 = Instant::now();
        let button = SimButton::new();
        let mut channel = InputChannel::new(button.clone(), TARGET);
        let guard = GuardWindow::new();

        button.press();
        assert_eq!(Some(TARGET), channel.poll(t0, &guard, DEBOUNCE));
        assert_eq!(None, channel.poll(ms(t0, 300), &guard, DEBOUNCE));
    }

    #[rstest::rstest]
    #[test]
    #[case(None, 150)]
    #[case(None, 200)]
    #[case(Some(TARGET), 201)]
    #[case(Some(TARGET), 500)]
    fn debounce_interval(#[case] expect: Option<ButtonTarget>, #[case] second: u64) {
        let t0 = Instant::now();
        let button = SimButton::new();
        let mut channel = InputChannel::new(button.clone(), TARGET);
        let guard = GuardWindow::new();

        assert_eq!(Some(TARGET), click(&mut channel, &button, &guard, t0));
        assert_eq!(expect, click(&mut channel, &button, &guard, ms(t0, second)));
    }

    #[test]
    fn guard_hides_edges_but_tracks_level() {
        let t0 = Instant::now();
        let button = SimButton::new();
        let mut channel = InputChannel::new(button.clone(), TARGET);
        let mut guard = GuardWindow::new();
        guard.open(t0, Duration::from_millis(400));

        // Held down across the end of the guard: no edge once it closes.
        button.press();
        assert_eq!(None, channel.poll(ms(t0, 100), &guard, DEBOUNCE));
        assert_eq!(None, channel.poll(ms(t0, 450), &guard, DEBOUNCE));

        button.release();
        assert_eq!(None, channel.poll(ms(t0, 460), &guard, DEBOUNCE));
        button.press();
        assert_eq!(Some(TARGET), channel.poll(ms(t0, 470), &guard, DEBOUNCE));
    }
}
