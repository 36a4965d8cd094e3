// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::env;
use std::process::ExitCode;

use coach_session::{ClientConfig, CoachClient, LogFormat, Phase};
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Optional credentials for a login at startup.
const EMAIL_ENV: &str = "COACH_EMAIL";
const PASSWORD_ENV: &str = "COACH_PASSWORD";

const DEFAULT_FILTER: &str = "info,coach_session=debug";

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(config.log_format());
    info!(
        api = %config.api_base_url(),
        data_dir = %config.data_dir().display(),
        "Starting coach session client"
    );

    let client = match CoachClient::from_config(&config) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Failed to build client");
            return ExitCode::FAILURE;
        }
    };

    let session = client.session().clone();
    session.bootstrap().await;

    if session.phase() != Phase::Authenticated {
        if let (Ok(email), Ok(password)) = (env::var(EMAIL_ENV), env::var(PASSWORD_ENV)) {
            if !session.login(&email, &password).await {
                warn!(%email, "Login failed");
            }
        }
    }

    let state = session.state();
    match &state.user {
        Some(user) => info!(
            phase = %state.phase,
            email = %user.email,
            role = %user.role,
            admin = user.is_admin(),
            "Session ready"
        ),
        None => info!(phase = %state.phase, "Session ready"),
    }

    if state.phase == Phase::Authenticated {
        let mut updates = session.subscribe();
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted; keeping stored credential");
            }
            _ = updates.wait_for(|s| s.phase == Phase::Anonymous) => {
                info!("Session ended");
            }
        }
    }

    client.shutdown().await;
    ExitCode::SUCCESS
}
