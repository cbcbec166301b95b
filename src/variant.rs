// Исполнения клапана: допустимые состояния, кнопки, порядок перебора,
// состояние по умолчанию

use std::str::FromStr;

use crate::config::ConfigError;
use crate::valve_state::ValveState;

/// What a physical button requests when it is pressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonTarget {
    Select(ValveState),
    Cycle,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Variant {
    name: &'static str,
    legal_states: &'static [ValveState],
    button_targets: &'static [ButtonTarget],
    cycle_order: Option<&'static [ValveState]>,
    default_state: ValveState,
}

static TWO_POSITION: [ValveState; 2] = [ValveState::A, ValveState::B];
static THREE_POSITION: [ValveState; 3] = [ValveState::A, ValveState::Center, ValveState::B];
static CENTER_FIRST_CYCLE: [ValveState; 3] = [ValveState::Center, ValveState::A, ValveState::B];

static BISTABLE_BUTTONS: [ButtonTarget; 2] = [
    ButtonTarget::Select(ValveState::A),
    ButtonTarget::Select(ValveState::B),
];
static CYCLE_BUTTON: [ButtonTarget; 1] = [ButtonTarget::Cycle];
static SELECT_BUTTONS: [ButtonTarget; 3] = [
    ButtonTarget::Select(ValveState::A),
    ButtonTarget::Select(ValveState::Center),
    ButtonTarget::Select(ValveState::B),
];

impl Variant {
    pub const NAMES: [&'static str; 3] = ["bistable", "tristate-cycle", "tristate-select"];

    pub fn bistable() -> Self {
        Self {
            name: "bistable",
            legal_states: &TWO_POSITION,
            button_targets: &BISTABLE_BUTTONS,
            cycle_order: None,
            default_state: ValveState::A,
        }
    }

    /// `Center -> A -> B` by one button.
    pub fn tristate_cycle() -> Self {
        Self {
            name: "tristate-cycle",
            legal_states: &THREE_POSITION,
            button_targets: &CYCLE_BUTTON,
            cycle_order: Some(&CENTER_FIRST_CYCLE),
            default_state: ValveState::Center,
        }
    }

    pub fn tristate_select() -> Self {
        Self {
            name: "tristate-select",
            legal_states: &THREE_POSITION,
            button_targets: &SELECT_BUTTONS,
            cycle_order: None,
            default_state: ValveState::Center,
        }
    }

    /// Builds a custom variant, checking that every state it can reach is legal.
    pub fn new(
        name: &'static str,
        legal_states: &'static [ValveState],
        button_targets: &'static [ButtonTarget],
        cycle_order: Option<&'static [ValveState]>,
        default_state: ValveState,
    ) -> Result<Self, ConfigError> {
        let variant = Self {
            name,
            legal_states,
            button_targets,
            cycle_order,
            default_state,
        };
        variant.validate()?;
        Ok(variant)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if !self.is_legal(self.default_state) {
            return Err(ConfigError::IllegalDefault(self.default_state));
        }
        if self.button_targets.is_empty() {
            return Err(ConfigError::NoButtons);
        }
        if let Some(order) = self.cycle_order {
            if order.is_empty() {
                return Err(ConfigError::EmptyCycle);
            }
            if let Some(state) = order.iter().find(|s| !self.is_legal(**s)) {
                return Err(ConfigError::IllegalCycleState(*state));
            }
        }
        for target in self.button_targets {
            match *target {
                ButtonTarget::Select(state) if !self.is_legal(state) => {
                    return Err(ConfigError::IllegalButtonTarget(state))
                }
                ButtonTarget::Cycle if self.cycle_order.is_none() => {
                    return Err(ConfigError::CycleWithoutOrder)
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn legal_states(&self) -> &'static [ValveState] {
        self.legal_states
    }

    pub fn button_targets(&self) -> &'static [ButtonTarget] {
        self.button_targets
    }

    pub fn cycle_order(&self) -> Option<&'static [ValveState]> {
        self.cycle_order
    }

    pub fn default_state(&self) -> ValveState {
        self.default_state
    }

    pub fn is_legal(&self, state: ValveState) -> bool {
        self.legal_states.contains(&state)
    }

    pub fn decode(&self, tag: u8) -> Option<ValveState> {
        ValveState::from_tag(tag).filter(|s| self.is_legal(*s))
    }

    /// The state one cycle step after `current`.
    ///
    /// A state missing from the cycle order restarts the cycle from its head.
    pub fn next_in_cycle(&self, current: ValveState) -> ValveState {
        let order = match self.cycle_order {
            Some(order) if !order.is_empty() => order,
            _ => return current,
        };
        match order.iter().position(|s| *s == current) {
            Some(i) => order[(i + 1) % order.len()],
            None => order[0],
        }
    }

    pub fn resolve(&self, target: ButtonTarget, current: ValveState) -> ValveState {
        match target {
            ButtonTarget::Select(state) => state,
            ButtonTarget::Cycle => self.next_in_cycle(current),
        }
    }
}

impl FromStr for Variant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bistable" => Ok(Self::bistable()),
            "tristate-cycle" => Ok(Self::tristate_cycle()),
            "tristate-select" => Ok(Self::tristate_select()),
            other => Err(ConfigError::UnknownVariant(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ValveState::*;

    #[rstest::rstest]
    #[test]
    #[case(Variant::bistable(), A)]
    #[case(Variant::tristate_cycle(), Center)]
    #[case(Variant::tristate_select(), Center)]
    fn builtin_variants_are_valid(#[case] variant: Variant, #[case] default: ValveState) {
        assert_eq!(Ok(()), variant.validate());
        assert_eq!(default, variant.default_state());
    }

    #[rstest::rstest]
    #[test]
    #[case(A, Center)]
    #[case(B, A)]
    #[case(Center, B)]
    fn cycle_advances_one_step(#[case] expect: ValveState, #[case] current: ValveState) {
        assert_eq!(expect, Variant::tristate_cycle().next_in_cycle(current));
    }

    #[test]
    fn bistable_rejects_center_letter() {
        let variant = Variant::bistable();
        assert_eq!(None, variant.decode(b'C'));
        assert_eq!(Some(B), variant.decode(b'B'));
        assert_eq!(Some(Center), Variant::tristate_select().decode(b'C'));
    }

    #[test]
    fn parse_names() {
        for name in Variant::NAMES {
            assert_eq!(name, name.parse::<Variant>().unwrap().name());
        }
        assert_eq!(
            Err(ConfigError::UnknownVariant("four-way".to_string())),
            "four-way".parse::<Variant>()
        );
    }

    #[test]
    fn button_outside_legal_set_is_a_config_error() {
        static TARGETS: [ButtonTarget; 1] = [ButtonTarget::Select(Center)];
        assert_eq!(
            Err(ConfigError::IllegalButtonTarget(Center)),
            Variant::new("broken", &TWO_POSITION, &TARGETS, None, A)
        );
    }

    #[test]
    fn cycle_button_needs_an_order() {
        assert_eq!(
            Err(ConfigError::CycleWithoutOrder),
            Variant::new("broken", &THREE_POSITION, &CYCLE_BUTTON, None, Center)
        );
        assert_eq!(
            Err(ConfigError::IllegalCycleState(Center)),
            Variant::new(
                "broken",
                &TWO_POSITION,
                &CYCLE_BUTTON,
                Some(&CENTER_FIRST_CYCLE),
                A
            )
        );
    }

    #[test]
    fn default_must_be_legal() {
        assert_eq!(
            Err(ConfigError::IllegalDefault(Center)),
            Variant::new("broken", &TWO_POSITION, &BISTABLE_BUTTONS, None, Center)
        );
    }
}
