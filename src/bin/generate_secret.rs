//! Link-signing secret generator.
//!
//! Writes 32 random bytes, hex-encoded, to a file with 0600 permissions.
//! Point `ONCODESK_SECRET_KEY_FILE` at the result (or mount it at
//! `/run/secrets/oncodesk_secret_key`).
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin generate_secret -- --out <path> [--force]
//! ```
//!
//! Rotating the secret invalidates every approval link already sent.

use rand::rngs::OsRng;
use rand::RngCore;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::io::Write;
use zeroize::{Zeroize, Zeroizing};

const USAGE: &str = "Usage: generate_secret --out <path> [--force]";

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn main() {
    let mut args = std::env::args().skip(1);
    let mut out_path: Option<std::path::PathBuf> = None;
    let mut force = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--out" => {
                let p = args.next().unwrap_or_default();
                if p.is_empty() {
                    eprintln!("{USAGE}");
                    std::process::exit(2);
                }
                out_path = Some(std::path::PathBuf::from(p));
            }
            "--force" => force = true,
            "-h" | "--help" => {
                println!(
                    "{USAGE}\n\nWrites a hex-encoded 256-bit link-signing secret to <path> with 0600 permissions. Prints only its fingerprint."
                );
                return;
            }
            _ => {
                eprintln!("Unknown arg: {arg}\n{USAGE}");
                std::process::exit(2);
            }
        }
    }

    let Some(out_path) = out_path else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };

    if out_path.exists() && !force {
        eprintln!("Refusing to overwrite existing file {out_path:?}. Use --force.");
        std::process::exit(3);
    }

    let mut secret = [0u8; 32];
    OsRng.fill_bytes(&mut secret);
    let encoded = Zeroizing::new(to_hex(&secret));
    secret.zeroize();

    if let Some(parent) = out_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let mut opts = std::fs::OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        opts.mode(0o600);
    }

    let mut file = opts.open(&out_path).unwrap_or_else(|e| {
        eprintln!("Failed to open {out_path:?}: {e}");
        std::process::exit(4);
    });

    if let Err(e) = file
        .write_all(encoded.as_bytes())
        .and_then(|()| file.write_all(b"\n"))
    {
        eprintln!("Failed to write {out_path:?}: {e}");
        std::process::exit(4);
    }

    let fingerprint =
        oncodesk::domain::SigningSecret::from_bytes(encoded.as_bytes().to_vec()).fingerprint();
    println!("Wrote link-signing secret to {out_path:?}");
    println!("Fingerprint: {fingerprint}");
}
