// CLI module - command-line argument parsing and config handlers
//
// Without a subcommand the dashboard runs (or headless watch when the TUI is
// disabled). Project and account commands live in commands.rs; this file
// only handles `config`, which needs no network or session.

use crate::config::{Config, VERSION};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::net::SocketAddr;

/// Awakener - keep an eye on your projects' uptime from the terminal
#[derive(Parser, Debug)]
#[command(name = "awakener")]
#[command(version = VERSION)]
#[command(about = "Uptime dashboard for your monitored projects", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in and remember the session
    Login {
        #[arg(long)]
        email: String,

        /// Falls back to AWAKENER_PASSWORD, then a prompt
        #[arg(long, env = "AWAKENER_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Create an account and log in
    Signup {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        /// Falls back to AWAKENER_PASSWORD, then a prompt
        #[arg(long, env = "AWAKENER_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Forget the stored session
    Logout,

    /// Print all projects with their latest status
    List,

    /// Start monitoring a URL
    Add {
        #[arg(long)]
        name: String,

        #[arg(long)]
        url: String,
    },

    /// Rename a project or change its URL
    Edit {
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        url: Option<String>,
    },

    /// Stop monitoring one or more projects
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Poll without the TUI, one line per refresh
    Watch,

    /// Run the local demo backend
    Demo {
        /// Address to listen on (default from [demo] bind_addr)
        #[arg(long)]
        bind: Option<SocketAddr>,
    },

    /// Manage configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Reset config file to defaults
        #[arg(long)]
        reset: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

/// Handle `awakener config`
pub fn handle_config(show: bool, reset: bool, path: bool) -> Result<()> {
    if path {
        let path = Config::config_path().context("Could not determine config path")?;
        println!("{}", path.display());
    } else if show {
        handle_config_show();
    } else if reset {
        handle_config_reset()?;
    } else {
        println!("Usage: awakener config [--show|--reset|--path]");
        println!();
        println!("Options:");
        println!("  --show    Display effective configuration");
        println!("  --reset   Reset config file to defaults");
        println!("  --path    Show config file path");
    }
    Ok(())
}

fn handle_config_show() {
    let config = Config::from_env();

    println!("# Effective configuration (env > file > defaults)");
    println!();
    print!("{}", config.to_toml());
    println!("# enable_tui = {}", config.enable_tui);

    println!();
    match Config::config_path() {
        Some(path) if path.exists() => println!("# Source: {}", path.display()),
        _ => println!("# Source: defaults (no config file)"),
    }
}

fn handle_config_reset() -> Result<()> {
    let path = Config::config_path().context("Could not determine config path")?;

    if path.exists() {
        eprint!(
            "Config file exists at {}. Overwrite? [y/N] ",
            path.display()
        );
        std::io::stderr().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    Config::default()
        .save()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Config reset to defaults: {}", path.display());
    Ok(())
}

/// Prompt for a password on stderr and read it from stdin
pub fn prompt_password() -> Result<String> {
    eprint!("Password: ");
    std::io::stderr().flush()?;

    let mut input = String::new();
    std::io::stdin()
        .read_line(&mut input)
        .context("Failed to read password")?;
    let password = input.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("Password is required");
    }
    Ok(password)
}
