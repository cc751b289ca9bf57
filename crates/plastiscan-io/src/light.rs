//! Excitation light control.
//!
//! The sample is lit by LEDs on GPIO pins while it is photographed.
//! [`Illuminated`] ties the lit period to a scope so the LEDs are
//! switched off on every exit path, including early returns and
//! capture errors.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// GPIO pins wired to the excitation LEDs: general, 3 mm and diffuse.
pub const DEFAULT_PINS: [u32; 3] = [23, 24, 27];

/// Time the LEDs need to reach stable output after switching on.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(250);

/// Default sysfs GPIO root.
pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// Errors that can occur while switching lights.
#[derive(Debug, thiserror::Error)]
pub enum LightError {
    /// A GPIO control file could not be written.
    #[error("failed to write {value} to {}: {source}", .path.display())]
    Write {
        /// Control file.
        path: PathBuf,
        /// Value being written.
        value: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// A switchable light source.
pub trait LightSource {
    /// Switch on and wait until the output is stable.
    ///
    /// # Errors
    ///
    /// Returns a [`LightError`] if the hardware could not be driven.
    fn on(&mut self) -> Result<(), LightError>;

    /// Switch off.
    ///
    /// # Errors
    ///
    /// Returns a [`LightError`] if the hardware could not be driven.
    fn off(&mut self) -> Result<(), LightError>;
}

/// LEDs driven through the Linux sysfs GPIO interface.
#[derive(Debug, Clone)]
pub struct SysfsLeds {
    root: PathBuf,
    pins: Vec<u32>,
    settle: Duration,
}

impl Default for SysfsLeds {
    fn default() -> Self {
        Self::new(SYSFS_GPIO_ROOT, DEFAULT_PINS.to_vec())
    }
}

impl SysfsLeds {
    /// LEDs on `pins` under the sysfs GPIO directory `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, pins: Vec<u32>) -> Self {
        Self {
            root: root.into(),
            pins,
            settle: DEFAULT_SETTLE,
        }
    }

    /// Override the settle delay after switching on.
    #[must_use]
    pub const fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Configured pins.
    #[must_use]
    pub fn pins(&self) -> &[u32] {
        &self.pins
    }

    fn pin_dir(&self, pin: u32) -> PathBuf {
        self.root.join(format!("gpio{pin}"))
    }

    /// Export `pin` if needed and configure it as an output.
    fn prepare(&self, pin: u32) -> Result<(), LightError> {
        if !self.pin_dir(pin).exists() {
            write(&self.root.join("export"), &pin.to_string())?;
        }
        write(&self.pin_dir(pin).join("direction"), "out")
    }

    /// Write `level` to every pin, even after a failure, and return the
    /// first error.
    fn set_all(&self, level: &str) -> Result<(), LightError> {
        let mut first = None;
        for &pin in &self.pins {
            if let Err(e) = write(&self.pin_dir(pin).join("value"), level) {
                tracing::warn!(pin, error = %e, "failed to set pin");
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }
}

impl LightSource for SysfsLeds {
    fn on(&mut self) -> Result<(), LightError> {
        for &pin in &self.pins {
            self.prepare(pin)?;
        }
        self.set_all("1")?;
        tracing::info!(pins = ?self.pins, "illuminating sample");
        std::thread::sleep(self.settle);
        Ok(())
    }

    fn off(&mut self) -> Result<(), LightError> {
        self.set_all("0")?;
        tracing::info!(pins = ?self.pins, "illumination off");
        Ok(())
    }
}

fn write(path: &Path, value: &str) -> Result<(), LightError> {
    std::fs::write(path, value).map_err(|source| LightError::Write {
        path: path.to_path_buf(),
        value: value.to_owned(),
        source,
    })
}

/// Scope guard holding a light source on.
///
/// Dropping the guard switches the light off; a failure at that point
/// is logged. Call [`Illuminated::finish`] to observe it instead.
pub struct Illuminated<'a, L: LightSource + ?Sized> {
    light: &'a mut L,
    lit: bool,
}

impl<'a, L: LightSource + ?Sized> Illuminated<'a, L> {
    /// Switch `light` on for the lifetime of the guard.
    ///
    /// # Errors
    ///
    /// Returns the error from [`LightSource::on`]. The light is switched
    /// off again before returning.
    pub fn new(light: &'a mut L) -> Result<Self, LightError> {
        if let Err(e) = light.on() {
            if let Err(off) = light.off() {
                tracing::warn!(error = %off, "failed to switch light off after failed switch-on");
            }
            return Err(e);
        }
        Ok(Self { light, lit: true })
    }

    /// Switch off now and report the outcome.
    ///
    /// # Errors
    ///
    /// Returns the error from [`LightSource::off`].
    pub fn finish(mut self) -> Result<(), LightError> {
        self.lit = false;
        self.light.off()
    }
}

impl<L: LightSource + ?Sized> Drop for Illuminated<'_, L> {
    fn drop(&mut self) {
        if self.lit
            && let Err(e) = self.light.off()
        {
            tracing::warn!(error = %e, "failed to switch light off");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct MockLight {
        log: Vec<&'static str>,
        fail_on: bool,
    }

    impl LightSource for MockLight {
        fn on(&mut self) -> Result<(), LightError> {
            self.log.push("on");
            if self.fail_on {
                return Err(LightError::Write {
                    path: PathBuf::from("mock"),
                    value: "1".into(),
                    source: std::io::Error::other("mock failure"),
                });
            }
            Ok(())
        }

        fn off(&mut self) -> Result<(), LightError> {
            self.log.push("off");
            Ok(())
        }
    }

    fn fails() -> Result<(), &'static str> {
        Err("capture failed")
    }

    #[test]
    fn guard_switches_off_on_drop() {
        let mut light = MockLight::default();
        {
            let _guard = Illuminated::new(&mut light).unwrap();
        }
        assert_eq!(light.log, ["on", "off"]);
    }

    #[test]
    fn guard_switches_off_on_early_return() {
        let mut light = MockLight::default();
        let run = |light: &mut MockLight| -> Result<(), &'static str> {
            let _guard = Illuminated::new(light).map_err(|_| "light")?;
            fails()?;
            Ok(())
        };
        assert!(run(&mut light).is_err());
        assert_eq!(light.log, ["on", "off"]);
    }

    #[test]
    fn finish_switches_off_once() {
        let mut light = MockLight::default();
        let guard = Illuminated::new(&mut light).unwrap();
        guard.finish().unwrap();
        assert_eq!(light.log, ["on", "off"]);
    }

    #[test]
    fn failed_switch_on_still_switches_off() {
        let mut light = MockLight {
            fail_on: true,
            ..MockLight::default()
        };
        assert!(Illuminated::new(&mut light).is_err());
        assert_eq!(light.log, ["on", "off"]);
    }

    #[test]
    fn guard_works_through_trait_object() {
        let mut light = MockLight::default();
        let dyn_light: &mut dyn LightSource = &mut light;
        drop(Illuminated::new(dyn_light).unwrap());
        assert_eq!(light.log, ["on", "off"]);
    }

    fn sysfs_fixture(pins: &[u32]) -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        for pin in pins {
            std::fs::create_dir(root.path().join(format!("gpio{pin}"))).unwrap();
        }
        root
    }

    fn read(root: &Path, pin: u32, file: &str) -> String {
        std::fs::read_to_string(root.join(format!("gpio{pin}")).join(file)).unwrap()
    }

    #[test]
    fn sysfs_leds_drive_every_pin() {
        let root = sysfs_fixture(&DEFAULT_PINS);
        let mut leds =
            SysfsLeds::new(root.path(), DEFAULT_PINS.to_vec()).with_settle(Duration::ZERO);

        leds.on().unwrap();
        for pin in DEFAULT_PINS {
            assert_eq!(read(root.path(), pin, "direction"), "out");
            assert_eq!(read(root.path(), pin, "value"), "1");
        }

        leds.off().unwrap();
        for pin in DEFAULT_PINS {
            assert_eq!(read(root.path(), pin, "value"), "0");
        }
    }

    #[test]
    fn off_reaches_every_pin_past_a_broken_one() {
        let root = sysfs_fixture(&[24, 27]);
        for pin in [24, 27] {
            std::fs::write(root.path().join(format!("gpio{pin}")).join("value"), "1").unwrap();
        }
        // gpio23 has no directory, so its write fails first.
        let mut leds = SysfsLeds::new(root.path(), DEFAULT_PINS.to_vec());

        let err = leds.off().unwrap_err();
        assert!(matches!(err, LightError::Write { ref path, .. } if path.ends_with("gpio23/value")));
        assert_eq!(read(root.path(), 24, "value"), "0");
        assert_eq!(read(root.path(), 27, "value"), "0");
    }

    #[test]
    fn unexported_pin_is_exported() {
        let root = tempfile::tempdir().unwrap();
        let leds = SysfsLeds::new(root.path(), vec![23]).with_settle(Duration::ZERO);
        // The export file is written, but nothing creates gpio23 here.
        assert!(leds.prepare(23).is_err());
        assert_eq!(
            std::fs::read_to_string(root.path().join("export")).unwrap(),
            "23"
        );
    }

    #[test]
    fn default_pins() {
        assert_eq!(SysfsLeds::default().pins(), &[23, 24, 27]);
    }
}
