use std::sync::mpsc::Sender;
use std::thread;

use anyhow::Context;
use chip8_vm::Key;
use log::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    KeyDown(Key),
    KeyUp(Key),
    Quit,
}

/// Host layout to CHIP-8 keypad:
///
/// ```text
/// 1 2 3 4    ->    1 2 3 C
/// Q W E R    ->    4 5 6 D
/// A S D F    ->    7 8 9 E
/// Z X C V    ->    A 0 B F
/// ```
pub fn map_key(key: rdev::Key) -> Option<Key> {
    use rdev::Key as Host;

    let key = match key {
        Host::Num1 => Key::Key1,
        Host::Num2 => Key::Key2,
        Host::Num3 => Key::Key3,
        Host::Num4 => Key::KeyC,
        Host::KeyQ => Key::Key4,
        Host::KeyW => Key::Key5,
        Host::KeyE => Key::Key6,
        Host::KeyR => Key::KeyD,
        Host::KeyA => Key::Key7,
        Host::KeyS => Key::Key8,
        Host::KeyD => Key::Key9,
        Host::KeyF => Key::KeyE,
        Host::KeyZ => Key::KeyA,
        Host::KeyX => Key::Key0,
        Host::KeyC => Key::KeyB,
        Host::KeyV => Key::KeyF,
        _ => return None,
    };
    Some(key)
}

pub fn translate(event_type: rdev::EventType) -> Option<InputEvent> {
    match event_type {
        rdev::EventType::KeyPress(rdev::Key::Escape) => Some(InputEvent::Quit),
        rdev::EventType::KeyPress(key) => map_key(key).map(InputEvent::KeyDown),
        rdev::EventType::KeyRelease(key) => map_key(key).map(InputEvent::KeyUp),
        _ => None,
    }
}

/// Starts a global keyboard listener on its own thread. Key edges are sent
/// over `tx`; the listener stops forwarding once the receiver is gone.
pub fn spawn_listener(tx: Sender<InputEvent>) {
    thread::spawn(move || {
        let result = rdev::listen(move |event| {
            if let Some(input) = translate(event.event_type) {
                let _ = tx.send(input);
            }
        });
        if let Err(e) = result {
            error!("keyboard listener stopped: {e:?}");
        }
    });
}

/// Turns SIGINT and SIGTERM into `InputEvent::Quit`, so the frame loop can
/// restore the terminal before exiting.
pub fn install_signal_handler(tx: Sender<InputEvent>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        let _ = tx.send(InputEvent::Quit);
    })
    .context("failed to install signal handler")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_covers_all_sixteen_keys() {
        let host = [
            rdev::Key::Num1,
            rdev::Key::Num2,
            rdev::Key::Num3,
            rdev::Key::Num4,
            rdev::Key::KeyQ,
            rdev::Key::KeyW,
            rdev::Key::KeyE,
            rdev::Key::KeyR,
            rdev::Key::KeyA,
            rdev::Key::KeyS,
            rdev::Key::KeyD,
            rdev::Key::KeyF,
            rdev::Key::KeyZ,
            rdev::Key::KeyX,
            rdev::Key::KeyC,
            rdev::Key::KeyV,
        ];
        let mut codes: Vec<u8> = host
            .into_iter()
            .map(|k| map_key(k).unwrap().code())
            .collect();
        codes.sort_unstable();
        assert_eq!(codes, (0..16).collect::<Vec<u8>>());
    }

    #[test]
    fn escape_quits_and_other_keys_are_ignored() {
        use rdev::EventType;

        assert_eq!(
            translate(EventType::KeyPress(rdev::Key::Escape)),
            Some(InputEvent::Quit)
        );
        assert_eq!(
            translate(EventType::KeyPress(rdev::Key::KeyX)),
            Some(InputEvent::KeyDown(Key::Key0))
        );
        assert_eq!(
            translate(EventType::KeyRelease(rdev::Key::Num4)),
            Some(InputEvent::KeyUp(Key::KeyC))
        );
        assert_eq!(translate(EventType::KeyPress(rdev::Key::KeyP)), None);
    }

    #[cfg(unix)]
    #[test]
    fn sigterm_becomes_quit() {
        use std::sync::mpsc;
        use std::time::Duration;

        let (tx, rx) = mpsc::channel();
        install_signal_handler(tx).unwrap();

        let status = std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)),
            Ok(InputEvent::Quit)
        );
    }
}
