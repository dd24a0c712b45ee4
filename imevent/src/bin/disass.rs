//! Disassembles an `MTrk` payload from stdin.
use imevent::{read_var, Event};
use std::io::Read;

pub fn main() {
    let mut buf = Vec::new();
    if let Err(err) = std::io::stdin().read_to_end(&mut buf) {
        eprintln!("read error: {}", err);
        std::process::exit(1);
    }

    let mut buf = buf.as_slice();
    let mut pos = 0u32;
    loop {
        let (delta, size) = match read_var(buf) {
            Ok(var) => var,
            Err(err) => {
                println!("delta time: {}", err);
                break;
            }
        };
        buf = &buf[size..];
        pos = pos.wrapping_add(delta);

        let (event, size) = match Event::read(buf) {
            Ok(event) => event,
            Err(err) => {
                println!("{:>8}: {}", pos, err);
                break;
            }
        };
        buf = &buf[size..];

        println!("{:>8}: {:x?}", pos, event);
        if event.is_end() {
            break;
        }
    }
}
