use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use inquire::Select;
use itertools::Itertools;
use netflix_handoff::api::NetflixClient;
use netflix_handoff::config::Config;
use netflix_handoff::flow::{DiscoveryFlow, DiscoveryState, UiSink};
use netflix_handoff::qr::{CodeArtifact, QrEncoder};
use netflix_handoff::relay::{HandoffError, RelayClient};
use netflix_handoff::schema::ProfileDescriptor;

#[derive(Parser)]
struct Opts {
    /// Optional TOML config; defaults are used when absent.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Where to persist captured cookies between runs (overrides the config).
    #[arg(long)]
    cookie_store: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let opts = Opts::parse();
    let mut config = match &opts.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(path) = opts.cookie_store {
        config.cookie_store_path = Some(path);
    }

    let mut client = NetflixClient::new(config.cookie_store_path.clone())?;
    let relay = RelayClient::new(config.relay_url.clone())?;
    let encoder = QrEncoder;
    let mut flow = DiscoveryFlow::new(TerminalUi);

    if flow.discover(&mut client).await != DiscoveryState::ProfilesShown {
        return Ok(());
    }

    loop {
        let options = flow
            .profiles()
            .iter()
            .map(|profile| profile.name.to_string())
            .chain(["(quit)".to_owned()])
            .collect_vec();
        let choice = Select::new("Select a profile to hand off:", options)
            .raw_prompt()
            .context("Profile selection aborted")?;
        if choice.index == flow.profiles().len() {
            return Ok(());
        }
        let uid = flow.profiles()[choice.index].uid.clone();
        flow.select_profile(&mut client, &relay, &encoder, &uid)
            .await;
    }
}

struct TerminalUi;

impl UiSink for TerminalUi {
    fn show_loading(&mut self) {
        println!("Fetching Netflix profiles...");
    }

    fn show_profiles(&mut self, profiles: &[ProfileDescriptor]) {
        println!("Found {} profiles:", profiles.len());
        for profile in profiles {
            println!("  {} ({})", profile.name, profile.uid);
        }
    }

    fn show_error(&mut self, message: &str) {
        println!("{message}");
    }

    fn show_code(&mut self, profile: &ProfileDescriptor, code: &CodeArtifact) {
        println!("Scan this code to add {} on the other device:", profile.name);
        println!("{}", code.to_terminal_string());
    }

    fn show_handoff_error(&mut self, profile: &ProfileDescriptor, error: &HandoffError) {
        println!("Could not hand off {}: {error}", profile.name);
    }
}
