// Сохраненное состояние: один байт, буква последнего состояния
// Любое другое значение = "не задано", стартуем с состояния по умолчанию

use std::fmt::Debug;
use std::io;
use std::path::PathBuf;

use crate::valve_state::ValveState;
use crate::variant::Variant;

pub trait StateCell {
    type Error: Debug;

    /// `Ok(None)` when the cell has never been written.
    fn read(&mut self) -> Result<Option<u8>, Self::Error>;
    fn write(&mut self, value: u8) -> Result<(), Self::Error>;
}

pub struct PersistentStore<C> {
    cell: C,
    variant: Variant,
}

impl<C: StateCell> PersistentStore<C> {
    pub fn new(cell: C, variant: Variant) -> Self {
        Self { cell, variant }
    }

    pub fn load(&mut self) -> Option<ValveState> {
        match self.cell.read() {
            Ok(Some(tag)) => {
                let state = self.variant.decode(tag);
                if state.is_none() {
                    log::debug!("persisted byte 0x{tag:02x} is not a {} state", self.variant.name());
                }
                state
            }
            Ok(None) => None,
            Err(e) => {
                log::warn!("failed to read persisted state: {e:?}");
                None
            }
        }
    }

    /// Writes the state tag unless the cell already holds it.
    pub fn save(&mut self, state: ValveState) {
        let tag = state.tag();
        if let Ok(Some(stored)) = self.cell.read() {
            if stored == tag {
                return;
            }
        }
        if let Err(e) = self.cell.write(tag) {
            log::error!("failed to persist state {state}: {e:?}");
        }
    }

    pub fn cell(&self) -> &C {
        &self.cell
    }
}

pub struct FileCell {
    path: PathBuf,
}

impl FileCell {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StateCell for FileCell {
    type Error = io::Error;

    fn read(&mut self) -> Result<Option<u8>, Self::Error> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(bytes.first().copied()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&mut self, value: u8) -> Result<(), Self::Error> {
        std::fs::write(&self.path, [value])
    }
}

/// Cell stored under one key of an ESP-IDF NVS namespace.
#[cfg(target_os = "espidf")]
pub struct NvsCell {
    nvs: esp_idf_svc::nvs::EspNvs<esp_idf_svc::nvs::NvsDefault>,
    key: &'static str,
}

#[cfg(target_os = "espidf")]
impl NvsCell {
    pub fn new(
        nvs: esp_idf_svc::nvs::EspNvs<esp_idf_svc::nvs::NvsDefault>,
        key: &'static str,
    ) -> Self {
        Self { nvs, key }
    }
}

#[cfg(target_os = "espidf")]
impl StateCell for NvsCell {
    type Error = esp_idf_sys::EspError;

    fn read(&mut self) -> Result<Option<u8>, Self::Error> {
        self.nvs.get_u8(self.key)
    }

    fn write(&mut self, value: u8) -> Result<(), Self::Error> {
        self.nvs.set_u8(self.key, value)
    }
}
