//! Echo components, built as a shared library and loaded by name
//!
//! Declared in a factory document as
//!
//! ```toml
//! [[instance]]
//! name = "echo"
//! class = "echo::Repeater"
//! library = "echo_plugin"
//! ```

use parking_lot::Mutex;
use weave_core::prelude::*;
use weave_core_macros::Component;

#[derive(Component, Default)]
#[component(class = "echo::Repeater")]
#[property(name = "phrase", text = Repeater::set_phrase)]
#[property(name = "times", integer = Repeater::set_times)]
#[hook(name = "done", call = Repeater::validate)]
pub struct Repeater {
    phrase: Mutex<String>,
    times: Mutex<i32>,
}

impl Repeater {
    fn set_phrase(&self, phrase: &str) {
        *self.phrase.lock() = phrase.to_string();
    }

    fn set_times(&self, times: i32) {
        *self.times.lock() = times;
    }

    fn validate(&self) -> anyhow::Result<()> {
        if *self.times.lock() < 1 {
            return Err(anyhow!("'{}' must be repeated at least once", self.phrase.lock()));
        }
        Ok(())
    }

    pub fn echo(&self) -> String {
        vec![self.phrase.lock().as_str(); *self.times.lock() as usize].join(" ")
    }
}

weave_core::export_components!();
