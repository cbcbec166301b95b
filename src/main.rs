#[cfg(target_os = "espidf")]
mod firmware {
    use std::time::{Duration, Instant};

    use esp_idf_hal::delay::Ets;
    use esp_idf_hal::gpio::{AnyIOPin, AnyInputPin, Input, InputPin, PinDriver, Pull};
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_hal::prelude::*;
    use esp_idf_hal::uart;
    use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs};

    use esp_idf_sys as _;

    use valvectl::coils::CoilDriver;
    use valvectl::protocol;
    use valvectl::storage::NvsCell;
    use valvectl::{Config, Controller, Timing, Variant};

    /// Selected at build time: `VALVE_VARIANT=tristate-cycle cargo build`.
    const VARIANT: &str = match option_env!("VALVE_VARIANT") {
        Some(v) => v,
        None => "bistable",
    };

    const NVS_NAMESPACE: &str = "valvectl";
    const NVS_KEY: &str = "state";

    const POLL_PERIOD: Duration = Duration::from_millis(2);

    pub fn run() -> anyhow::Result<()> {
        // It is necessary to call this function once. Otherwise some patches to the runtime
        // implemented by esp-idf-sys might not link properly.
        esp_idf_sys::link_patches();
        esp_idf_svc::log::EspLogger::initialize_default();

        let config = Config::new(VARIANT.parse::<Variant>()?, Timing::default())?;
        log::info!("Valve variant: {}", config.variant.name());

        let dp = Peripherals::take()?;

        let driver = CoilDriver::new(
            PinDriver::output(dp.pins.gpio12)?,
            PinDriver::output(dp.pins.gpio14)?,
            PinDriver::output(dp.pins.gpio2)?,
            Ets,
            config.timing.settle_ms(),
        )?;

        let mut button_pins = vec![
            dp.pins.gpio32.downgrade_input(),
            dp.pins.gpio33.downgrade_input(),
            dp.pins.gpio25.downgrade_input(),
        ];
        button_pins.truncate(config.variant.button_targets().len());
        let buttons = button_pins
            .into_iter()
            .map(create_button)
            .collect::<anyhow::Result<Vec<_>>>()?;

        let nvs = EspNvs::new(EspDefaultNvsPartition::take()?, NVS_NAMESPACE, true)?;
        let cell = NvsCell::new(nvs, NVS_KEY);

        let uart_config = uart::config::Config::new().baudrate(Hertz(protocol::BAUD_RATE));
        let mut uart = uart::UartDriver::new(
            dp.uart2,
            dp.pins.gpio17,
            dp.pins.gpio16,
            Option::<AnyIOPin>::None,
            Option::<AnyIOPin>::None,
            &uart_config,
        )?;

        let mut controller = Controller::boot(config, driver, cell, buttons, Instant::now())?;
        controller.announce(&mut uart);

        log::info!("Ready!");

        loop {
            controller.tick(Instant::now(), &mut uart);
            std::thread::sleep(POLL_PERIOD);
        }
    }

    fn create_button(
        pin: AnyInputPin,
    ) -> anyhow::Result<PinDriver<'static, AnyInputPin, Input>> {
        let mut button = PinDriver::input(pin)?;
        button.set_pull(Pull::Up)?;
        Ok(button)
    }
}

#[cfg(not(target_os = "espidf"))]
mod host;

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    firmware::run()
}

#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    host::run()
}
