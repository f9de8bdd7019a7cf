//! Generate a fresh settings-store secret

use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;

fn main() {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let secret = STANDARD.encode(bytes);

    println!("{secret}");
    eprintln!();
    eprintln!("Put this under [settings] secret in config.toml.");
    eprintln!("Changing it makes previously encrypted settings unreadable.");
}
