//! GPIO LED indicator for ESP32 boards.

use super::{Indicator, IndicatorResult};
use esp_idf_hal::gpio::{AnyOutputPin, Output, PinDriver};
use esp_idf_sys::EspError;

/// On-board LED driven through a GPIO output.
pub struct LedIndicator {
    pin: PinDriver<'static, AnyOutputPin, Output>,
}

impl LedIndicator {
    /// Take ownership of `pin` and switch the LED off.
    pub fn new(pin: AnyOutputPin) -> Result<Self, EspError> {
        let mut pin = PinDriver::output(pin)?;
        pin.set_low()?;
        Ok(Self { pin })
    }
}

impl Indicator for LedIndicator {
    fn set(&mut self, on: bool) -> IndicatorResult {
        if on {
            self.pin.set_high()?;
        } else {
            self.pin.set_low()?;
        }
        Ok(())
    }
}
