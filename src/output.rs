use std::io::Write;
use std::path::PathBuf;

use console::Style;

use crate::search::{Found, SearchError};

pub struct Styles {
    pub dim: Style,
    pub green: Style,
    pub yellow: Style,
    pub cyan: Style,
    pub red: Style,
    pub value: Style,
}

impl Styles {
    pub fn new() -> Self {
        Self {
            dim: Style::new().dim(),
            green: Style::new().color256(114).bold(),
            yellow: Style::new().color256(220).bold(),
            cyan: Style::new().color256(81),
            red: Style::new().color256(203).bold(),
            value: Style::new().white().bold(),
        }
    }
}

/// Re-encode the reported compressed key with the reference encoder and
/// compare byte-for-byte. Cheap, and pins kernel correctness on the host.
pub fn verify(found: &Found) -> Result<(), SearchError> {
    let reencoded = bs58::encode(&found.public_key).into_string();
    if reencoded != found.address {
        return Err(SearchError::Verification(found.address.clone()));
    }
    Ok(())
}

/// Write `<address>.json` in the working directory: the 64-byte keypair as
/// one JSON array line.
pub fn save_keypair(found: &Found) -> std::io::Result<PathBuf> {
    let path = PathBuf::from(format!("{}.json", found.address));
    write_keypair_file(&path, &found.keypair)?;
    Ok(path)
}

fn write_keypair_file(path: &std::path::Path, keypair: &[u8; 64]) -> std::io::Result<()> {
    let body = serde_json::to_string(&keypair[..]).expect("byte array serializes");
    let mut file = std::fs::File::create(path)?;
    writeln!(file, "{body}")
}

pub fn print_match(found: &Found, index: u64, target: u64, saved: Option<&PathBuf>, s: &Styles) {
    println!(
        "{}",
        s.green.apply_to(format!("*** FOUND MATCH {index}/{target}! ***"))
    );
    println!("Address: {}", s.value.apply_to(&found.address));
    println!("Public Key (Base58): {}", found.address);
    println!("{}", s.green.apply_to("VERIFIED: Address matches Base58(PublicKey)"));
    if let Some(path) = saved {
        println!("Saved: {}", path.display());
    }
    println!(
        "{}",
        s.dim.apply_to(format!(
            "{} attempts  ·  {}  ·  {}/s",
            fmt_count(found.attempts),
            fmt_duration(found.elapsed.as_secs_f64()),
            fmt_rate(found.attempts as f64 / found.elapsed.as_secs_f64().max(0.001)),
        ))
    );
}

pub fn fmt_count(n: u64) -> String {
    let s = n.to_string();
    let bytes = s.as_bytes();
    let mut out = String::with_capacity(s.len() + s.len() / 3);
    for (i, &b) in bytes.iter().enumerate() {
        if i > 0 && (bytes.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(b as char);
    }
    out
}

pub fn fmt_duration(secs: f64) -> String {
    if secs < 60.0 {
        format!("{secs:.0}s")
    } else if secs < 3600.0 {
        let m = (secs / 60.0) as u64;
        let s = (secs % 60.0) as u64;
        format!("{m}m {s:02}s")
    } else if secs < 86400.0 {
        let h = (secs / 3600.0) as u64;
        let m = ((secs % 3600.0) / 60.0) as u64;
        format!("{h}h {m:02}m")
    } else {
        let d = (secs / 86400.0) as u64;
        let h = ((secs % 86400.0) / 3600.0) as u64;
        format!("{d}d {h:02}h")
    }
}

pub fn human(n: f64) -> String {
    match n {
        n if n >= 1e12 => format!("{:.1}T", n / 1e12),
        n if n >= 1e9 => format!("{:.1}B", n / 1e9),
        n if n >= 1e6 => format!("{:.1}M", n / 1e6),
        n if n >= 1e3 => format!("{:.1}K", n / 1e3),
        n => format!("{n:.0}"),
    }
}

pub fn fmt_rate(rate: f64) -> String {
    human(rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn dummy_found() -> Found {
        let seed = [7u8; 32];
        let public_key = crate::kernel::derive_public_key(&seed);
        Found {
            work_item: 0,
            public_key,
            keypair: crate::kernel::keypair_bytes(&seed, &public_key),
            address: bs58::encode(&public_key).into_string(),
            attempts: 1234,
            elapsed: Duration::from_secs(1),
        }
    }

    #[test]
    fn verify_accepts_consistent_results() {
        assert!(verify(&dummy_found()).is_ok());
    }

    #[test]
    fn verify_rejects_tampered_address() {
        let mut f = dummy_found();
        f.address = format!("1{}", &f.address[1..]);
        assert!(matches!(verify(&f), Err(SearchError::Verification(_))));
    }

    #[test]
    fn keypair_file_is_one_json_line() {
        let f = dummy_found();
        let path = std::env::temp_dir().join(format!("keygrind-test-{}.json", f.address));
        write_keypair_file(&path, &f.keypair).unwrap();
        let body = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert!(body.ends_with('\n'));
        let line = body.trim_end();
        assert_eq!(line.lines().count(), 1);
        let parsed: Vec<u8> = serde_json::from_str(line).unwrap();
        assert_eq!(parsed, f.keypair.to_vec());
    }

    #[test]
    fn count_formatting_groups_thousands() {
        assert_eq!(fmt_count(0), "0");
        assert_eq!(fmt_count(999), "999");
        assert_eq!(fmt_count(65536), "65,536");
        assert_eq!(fmt_count(1_336_336), "1,336,336");
    }

    #[test]
    fn duration_formatting_scales() {
        assert_eq!(fmt_duration(5.0), "5s");
        assert_eq!(fmt_duration(125.0), "2m 05s");
        assert_eq!(fmt_duration(3725.0), "1h 02m");
        assert_eq!(fmt_duration(90000.0), "1d 01h");
    }
}
