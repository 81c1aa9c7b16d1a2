//! Generic `DeviceSensor` trait for multi-channel input devices (spacemice,
//! gamepads, keyboards, …) served by the input daemon.

/// One station of the input daemon.
///
/// A station exposes numbered analog values and numbered buttons.  Indices
/// the device does not provide return `None`.
pub trait DeviceSensor: Send + Sync {
    /// Daemon station name, e.g. `"device-spacemouse"`.
    fn station(&self) -> &str;

    /// `false` while the daemon does not serve this station.
    fn is_available(&self) -> bool;

    /// Current value of analog channel `index`.
    fn value(&self, index: usize) -> Option<f64>;

    /// Current state of button `index`.
    fn button(&self, index: usize) -> Option<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockSensor {
        values: Vec<f64>,
        buttons: Vec<bool>,
    }

    impl DeviceSensor for MockSensor {
        fn station(&self) -> &str {
            "device-mock"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn value(&self, index: usize) -> Option<f64> {
            self.values.get(index).copied()
        }

        fn button(&self, index: usize) -> Option<bool> {
            self.buttons.get(index).copied()
        }
    }

    #[test]
    fn mock_sensor_out_of_range_is_none() {
        let sensor = MockSensor {
            values: vec![0.5],
            buttons: vec![true],
        };
        assert_eq!(sensor.station(), "device-mock");
        assert_eq!(sensor.value(0), Some(0.5));
        assert_eq!(sensor.value(1), None);
        assert_eq!(sensor.button(0), Some(true));
        assert_eq!(sensor.button(3), None);
    }
}
