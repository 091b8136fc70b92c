//! Waypoint server and local simulator

use async_trait::async_trait;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use waypoint::config::{Cli, Command};
use waypoint::delegation::{
    DelegationRequest, Planner, PlannerPolicy, SessionState, Specialist, SpecialistInvoker,
    TurnOutcome,
};
use waypoint::{api, AppState};

/// Stands in for the LLM call when simulating
struct EchoInvoker;

#[async_trait]
impl SpecialistInvoker for EchoInvoker {
    async fn invoke(&self, specialist: &Specialist, state: &SessionState) -> anyhow::Result<String> {
        Ok(format!(
            "{} planned activity #{}",
            specialist.name,
            state.delegations() + 1
        ))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "waypoint=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let registry = cli.load_registry()?;

    if let Command::Specialists = cli.command {
        for s in registry.specialists() {
            println!("{:<20} {}", s.name, s.capability);
        }
        return Ok(());
    }

    let store = cli.open_store().await?;
    let planner = Planner::new(PlannerPolicy::new(registry), store);

    match cli.command {
        Command::Serve { bind } => {
            let state = AppState::new(planner);
            let app = api::router(state)
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive());

            let listener = tokio::net::TcpListener::bind(bind).await?;
            tracing::info!("Server listening on {}", listener.local_addr()?);

            axum::serve(listener, app).await?;
        }
        Command::Simulate { requests } => simulate(&planner, &requests).await?,
        Command::Specialists => {}
    }

    Ok(())
}

async fn simulate(planner: &Planner, requests: &[String]) -> anyhow::Result<()> {
    let session = planner.open_session(None).await?;
    let session_id = session.session_id();
    println!("Session {}", session_id);

    for (i, raw) in requests.iter().enumerate() {
        println!();
        println!("Turn {}: requested {}", i + 1, raw);

        let request = match DelegationRequest::parse(raw) {
            Ok(request) => request,
            Err(e) => {
                println!("  error: {}", e);
                continue;
            }
        };

        match planner.run_turn(session_id, &request, &EchoInvoker).await {
            Ok(TurnOutcome::Completed { output, .. }) => println!("  allowed: {}", output),
            Ok(TurnOutcome::Refused {
                reason,
                alternatives,
                ..
            }) => {
                let alternatives: Vec<String> =
                    alternatives.iter().map(|c| c.to_string()).collect();
                println!("  refused: {}", reason);
                println!("  try instead: {}", alternatives.join(", "));
            }
            Err(e) => println!("  error: {}", e),
        }
    }

    println!();
    println!("{}", planner.instruction(session_id).await?);

    Ok(())
}
