//! Shield CLI Tool
//!
//! Command-line access to the hashing, password and TOTP primitives, for
//! operators checking stored hashes or enrolling authenticator apps.

use anyhow::{anyhow, bail, Context, Result};
use eventshield_core::{Clock, ShieldConfig, SystemClock, TotpConfig};
use eventshield_crypto::{hash, hmac, password, totp};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process;

/// JSON output for digest commands
#[derive(Debug, Serialize)]
struct DigestOutput {
    algorithm: &'static str,
    digest: String,
}

/// JSON output for verification commands
#[derive(Debug, Serialize)]
struct VerifyOutput {
    valid: bool,
    message: String,
}

/// JSON output for TOTP generation
#[derive(Debug, Serialize)]
struct TotpOutput {
    token: String,
    step_secs: u64,
    digits: u32,
    unix_secs: u64,
}

/// Parsed `--flag value` pairs plus boolean switches.
struct Options {
    values: HashMap<String, String>,
    json: bool,
}

impl Options {
    fn parse(args: &[String]) -> Result<Self> {
        let mut values = HashMap::new();
        let mut json = false;

        let mut i = 0;
        while i < args.len() {
            let arg = args[i].as_str();
            if arg == "--json" {
                json = true;
            } else if let Some(name) = arg.strip_prefix("--") {
                i += 1;
                let value = args
                    .get(i)
                    .ok_or_else(|| anyhow!("Missing value for --{}", name))?;
                values.insert(name.to_string(), value.clone());
            } else {
                bail!("Unexpected argument: {}", arg);
            }
            i += 1;
        }

        Ok(Self { values, json })
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    fn require(&self, name: &str) -> Result<&str> {
        self.get(name)
            .ok_or_else(|| anyhow!("Missing --{} argument", name))
    }

    fn parse_or<T: std::str::FromStr>(&self, name: &str, default: T) -> Result<T> {
        match self.get(name) {
            Some(raw) => raw
                .parse()
                .map_err(|_| anyhow!("Invalid value for --{}: {}", name, raw)),
            None => Ok(default),
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_config(opts: &Options) -> Result<ShieldConfig> {
    match opts.get("config") {
        Some(path) => ShieldConfig::from_file(PathBuf::from(path))
            .with_context(|| format!("Failed to load config from {}", path)),
        None => Ok(ShieldConfig::default()),
    }
}

fn cmd_digest(opts: &Options, algorithm: &'static str) -> Result<()> {
    let text = opts.require("text")?;
    let digest = match algorithm {
        "sha1" => hash::sha1_hex(text),
        _ => hash::sha256_hex(text),
    };

    if opts.json {
        print_json(&DigestOutput { algorithm, digest })
    } else {
        println!("{}", digest);
        Ok(())
    }
}

fn cmd_hmac(opts: &Options) -> Result<()> {
    let key = opts.require("key")?;
    let text = opts.require("text")?;
    let digest = hmac::hmac_sha256_hex(key, text);

    if opts.json {
        print_json(&DigestOutput {
            algorithm: "hmac-sha256",
            digest,
        })
    } else {
        println!("{}", digest);
        Ok(())
    }
}

fn cmd_hash_password(opts: &Options) -> Result<()> {
    let config = load_config(opts)?;
    let secret = opts.require("password")?;
    let iterations = opts.parse_or("iterations", config.password.iterations)?;

    let hashed = match opts.get("salt") {
        Some(salt) => password::hash_password(secret, salt, iterations)?,
        None => {
            let salt = password::generate_salt(&mut rand::thread_rng(), config.password.salt_length);
            password::hash_password(secret, &salt, iterations)?
        }
    };

    if opts.json {
        #[derive(Serialize)]
        struct HashOutput {
            salt: String,
            iterations: u32,
            hash: String,
            combined: String,
        }

        print_json(&HashOutput {
            combined: hashed.to_string(),
            salt: hashed.salt,
            iterations: hashed.iterations,
            hash: hashed.hash,
        })
    } else {
        println!("{}", hashed);
        Ok(())
    }
}

fn report_verification(opts: &Options, valid: bool, what: &str) -> Result<()> {
    let message = if valid {
        format!("{} is valid", what)
    } else {
        format!("{} is invalid", what)
    };

    if opts.json {
        print_json(&VerifyOutput { valid, message })?;
    } else if valid {
        println!("✓ {}", message);
    } else {
        println!("✗ {}", message);
    }

    if valid {
        Ok(())
    } else {
        bail!("{} verification failed", what)
    }
}

fn cmd_verify_password(opts: &Options) -> Result<()> {
    let valid = password::verify_password(opts.require("password")?, opts.require("hash")?);
    report_verification(opts, valid, "Password")
}

fn totp_settings(opts: &Options) -> Result<TotpConfig> {
    let base = load_config(opts)?.totp;
    Ok(TotpConfig {
        step_secs: opts.parse_or("step", base.step_secs)?,
        digits: opts.parse_or("digits", base.digits)?,
        window: opts.parse_or("window", base.window)?,
        ..base
    })
}

fn cmd_totp_secret(opts: &Options) -> Result<()> {
    let config = load_config(opts)?;
    let length = opts.parse_or("length", config.totp.secret_length)?;
    let secret = totp::generate_secret(&mut rand::thread_rng(), length);

    if opts.json {
        print_json(&serde_json::json!({ "secret": secret }))
    } else {
        println!("{}", secret);
        Ok(())
    }
}

fn cmd_totp(opts: &Options) -> Result<()> {
    let settings = totp_settings(opts)?;
    let secret = opts.require("secret")?;
    let unix_secs = opts.parse_or("time", SystemClock.now_secs())?;
    let token = totp::generate_totp(secret, unix_secs, settings.step_secs, settings.digits)?;

    if opts.json {
        print_json(&TotpOutput {
            token,
            step_secs: settings.step_secs,
            digits: settings.digits,
            unix_secs,
        })
    } else {
        println!("{}", token);
        Ok(())
    }
}

fn cmd_verify_totp(opts: &Options) -> Result<()> {
    let settings = totp_settings(opts)?;
    let unix_secs = opts.parse_or("time", SystemClock.now_secs())?;
    let valid = totp::verify_totp(
        opts.require("token")?,
        opts.require("secret")?,
        unix_secs,
        settings.window,
        settings.step_secs,
        settings.digits,
    );
    report_verification(opts, valid, "Token")
}

fn cmd_backup_codes(opts: &Options) -> Result<()> {
    let config = load_config(opts)?;
    let count = opts.parse_or("count", config.totp.backup_code_count)?;
    let codes = totp::generate_backup_codes(&mut rand::thread_rng(), count);

    if opts.json {
        print_json(&serde_json::json!({ "codes": codes }))
    } else {
        for code in codes {
            println!("{}", code);
        }
        Ok(())
    }
}

fn cmd_otpauth_uri(opts: &Options) -> Result<()> {
    let config = load_config(opts)?;
    let issuer = opts.get("issuer").unwrap_or(config.totp.issuer.as_str());
    let uri = totp::provisioning_uri(opts.require("secret")?, opts.require("account")?, issuer);

    if opts.json {
        print_json(&serde_json::json!({ "uri": uri }))
    } else {
        println!("{}", uri);
        Ok(())
    }
}

fn parse_args() -> Result<(String, Vec<String>)> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        bail!("Usage: shield-cli <command> [options]");
    }

    Ok((args[1].clone(), args[2..].to_vec()))
}

fn print_usage() {
    println!("Shield CLI - Hashing, password and TOTP utilities");
    println!();
    println!("USAGE:");
    println!("    shield-cli sha256 --text <text> [--json]");
    println!("    shield-cli sha1 --text <text> [--json]");
    println!("    shield-cli hmac --key <key> --text <text> [--json]");
    println!("    shield-cli hash-password --password <pw> [--salt <salt>] [--iterations <n>] [--json]");
    println!("    shield-cli verify-password --password <pw> --hash <salt$iter$hash> [--json]");
    println!("    shield-cli totp-secret [--length <n>] [--json]");
    println!("    shield-cli totp --secret <base32> [--time <unix>] [--step <s>] [--digits <n>] [--json]");
    println!("    shield-cli verify-totp --token <code> --secret <base32> [--time <unix>] [--window <n>] [--json]");
    println!("    shield-cli backup-codes [--count <n>] [--json]");
    println!("    shield-cli otpauth-uri --secret <base32> --account <name> [--issuer <name>] [--json]");
    println!();
    println!("All commands accept --config <file.toml> to override defaults.");
    println!();
    println!("EXAMPLES:");
    println!("    shield-cli sha256 --text abc");
    println!("    shield-cli totp --secret GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ --time 59 --digits 8");
}

fn run(command: &str, args: &[String]) -> Result<()> {
    let opts = Options::parse(args)?;

    match command {
        "sha256" => cmd_digest(&opts, "sha256"),
        "sha1" => cmd_digest(&opts, "sha1"),
        "hmac" => cmd_hmac(&opts),
        "hash-password" => cmd_hash_password(&opts),
        "verify-password" => cmd_verify_password(&opts),
        "totp-secret" => cmd_totp_secret(&opts),
        "totp" => cmd_totp(&opts),
        "verify-totp" => cmd_verify_totp(&opts),
        "backup-codes" => cmd_backup_codes(&opts),
        "otpauth-uri" => cmd_otpauth_uri(&opts),
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => Err(anyhow!("Unknown command: {}", other)),
    }
}

fn main() {
    eventshield_core::logging::init();

    let (command, args) = match parse_args() {
        Ok(cmd) => cmd,
        Err(e) => {
            eprintln!("Error: {}", e);
            println!();
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = run(&command, &args) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
