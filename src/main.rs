// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Chronograph Link console application

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chronograph_link::bluetooth::RfcommConnector;
use chronograph_link::config::Config;
use chronograph_link::controller::Controller;
use chronograph_link::state::AppState;
use chronograph_link::ui::{self, ConsoleDisplay, UserAction};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chronograph_link=info".parse()?),
        )
        .init();

    info!("Starting Chronograph Link v{}...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::load()?;
    info!(
        "Configuration loaded, device {} channel {}",
        config.bluetooth.device_address, config.bluetooth.rfcomm_channel
    );

    let state = AppState::new();
    let connector = RfcommConnector::from_config(&config.bluetooth);
    let controller = Controller::new(connector, ConsoleDisplay::stdout(), state.clone(), config);

    let (action_tx, action_rx) = mpsc::unbounded_channel();
    let _console = ui::run_console(state, action_tx.clone())?;

    // Ctrl-C goes through the same queue so the link is closed cleanly.
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            let _ = action_tx.send(UserAction::Quit);
        }
    });

    controller.run(action_rx).await?;

    info!("Chronograph Link stopped");
    Ok(())
}
