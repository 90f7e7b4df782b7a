//! Application callbacks invoked from inside the attribute handlers.
//!
//! Both are optional. An unset `led_set` makes LED writes a no-op after
//! validation; an unset `button_get` makes button reads return no bytes.

/// The two hooks the application can register.
#[derive(Clone, Copy, Debug, Default)]
pub struct Callbacks {
    /// Drive the LED; `true` is on.
    pub led_set: Option<fn(bool)>,
    /// Sample the button; `true` is pressed.
    pub button_get: Option<fn() -> bool>,
}

impl Callbacks {
    /// No callbacks registered.
    pub const NONE: Callbacks = Callbacks {
        led_set: None,
        button_get: None,
    };

    pub const fn new(led_set: fn(bool), button_get: fn() -> bool) -> Self {
        Self {
            led_set: Some(led_set),
            button_get: Some(button_get),
        }
    }

    /// Forward an LED state. Returns `false` if nothing is registered.
    pub fn set_led(&self, on: bool) -> bool {
        match self.led_set {
            Some(f) => {
                f(on);
                true
            }
            None => false,
        }
    }

    /// Sample the button, if a sampler is registered.
    pub fn get_button(&self) -> Option<bool> {
        self.button_get.map(|f| f())
    }
}
