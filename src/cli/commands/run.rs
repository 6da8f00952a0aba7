//! Run command implementation.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use trading_broker::{HttpExchange, Trader, TraderSummary};
use trading_config::{load_config, AppConfig, ObserverKind, PipelineMode};
use trading_core::{Clock, SystemClock};
use trading_data::{
    probe_latency, start, LatencyOffset, MarketDataSource, PollTarget, PollingSource,
    StreamingSource, WsConnector,
};
use trading_engine::{Observer, SignalDispatcher};
use trading_strategies::StrategyRegistry;

use crate::cli::RunArgs;

pub async fn run(args: RunArgs, config_path: &Path) -> Result<()> {
    let mut config = load_config(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    if let Some(strategy) = args.strategy {
        config.strategy.name = strategy;
    }
    if let Some(market) = args.market {
        config.exchange.market = market;
    }
    if let Some(traders) = args.traders {
        config.trader.traders = traders;
    }
    if args.single_trade {
        config.trader.observer = ObserverKind::SingleTrade;
    }
    config.validate()?;

    let exchange = Arc::new(HttpExchange::new(
        &config.exchange.name,
        config.exchange.http.clone(),
    )?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let strategy = StrategyRegistry::new()
        .create(&config.strategy.name, config.strategy_params())
        .context("Failed to create strategy")?;
    let mut dispatcher = SignalDispatcher::new(strategy);
    for trader_config in config.trader_configs()? {
        let trader = Trader::new(trader_config, exchange.clone(), clock.clone())?;
        dispatcher.attach_observer(match config.trader.observer {
            ObserverKind::Standard => Observer::Standard(trader),
            ObserverKind::SingleTrade => Observer::SingleTrade(trader),
        });
    }

    let latency = if config.exchange.http.server_time.is_some() {
        probe_latency(exchange.as_ref(), clock.as_ref(), config.pipeline.latency_samples)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Latency probe failed, using exchange time as-is");
                LatencyOffset::zero()
            })
    } else {
        LatencyOffset::zero()
    };

    info!(
        exchange = %config.exchange.name,
        market = %config.exchange.market,
        strategy = %config.strategy.name,
        traders = config.trader.traders,
        observer = ?config.trader.observer,
        mode = ?config.pipeline.mode,
        "Starting"
    );

    let summaries = match config.pipeline.mode {
        PipelineMode::Polling => {
            let source = PollingSource::new(
                exchange.clone(),
                PollTarget::Market(config.exchange.market.clone()),
            )
            .with_interval(config.pipeline.poll_interval())
            .with_clock(clock.clone())
            .with_latency(latency);
            run_until_interrupted(source, dispatcher).await?
        }
        PipelineMode::Streaming => {
            let source = streaming_source(&config)
                .with_clock(clock.clone())
                .with_latency(latency);
            run_until_interrupted(source, dispatcher).await?
        }
    };

    for summary in summaries {
        info!(
            market = %summary.market,
            balance = %summary.balance,
            assets = %summary.assets,
            committed = %summary.committed,
            state = ?summary.state,
            "Final account"
        );
    }
    Ok(())
}

fn streaming_source(config: &AppConfig) -> StreamingSource {
    let mut connector = WsConnector::new(&config.pipeline.websocket_url);
    if let Some(payload) = &config.pipeline.subscribe {
        connector = connector.with_subscription(payload.as_str());
    }
    StreamingSource::new(
        &config.exchange.market,
        Box::new(connector),
        Box::new(config.pipeline.decoder()),
    )
    .with_settings(config.pipeline.streaming())
}

async fn run_until_interrupted<S>(
    source: S,
    dispatcher: SignalDispatcher,
) -> Result<Vec<TraderSummary>>
where
    S: MarketDataSource + 'static,
{
    let handle = start(source, dispatcher);
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    info!("Shutting down");
    handle.stop();
    let finished = handle.join().await?;
    finished.result?;
    Ok(finished.handler.summaries())
}
