//! Keyboard translation: SDL events into terminal bytes.
//!
//! Printable characters arrive through SDL text input; control keys are
//! translated here. Every byte goes through the terminal's router, which
//! picks the line or raw-key channel under the device lock.

use lumen_core::device::Terminal;
use sdl2::event::Event;
use sdl2::keyboard::Keycode;

/// Feed one SDL event into the terminal. Returns true if consumed.
pub fn route_event(terminal: &Terminal, event: &Event) -> bool {
    match event {
        Event::TextInput { text, .. } => {
            for b in text.bytes() {
                terminal.route_host_key(b);
            }
            true
        }
        Event::KeyDown {
            keycode: Some(key), ..
        } => match *key {
            Keycode::Return | Keycode::KpEnter => {
                terminal.route_host_key(b'\n');
                true
            }
            Keycode::Backspace => {
                terminal.route_host_key(0x08);
                true
            }
            Keycode::Tab => {
                terminal.route_host_key(b'\t');
                true
            }
            Keycode::Escape => false, // handled by the main loop
            _ => false,
        },
        _ => false,
    }
}
